//! Ember+ client layer
//!
//! [`Connection`] owns the transport and the framing state: it pumps
//! inbound frames into decoded Glow roots, batches outbound root elements,
//! and keeps the link alive. [`Device`] sits on top and mirrors the remote
//! tree, dispatching observer callbacks as updates arrive.

pub mod connection;
pub mod device;
pub mod error;
pub mod tree;

pub use connection::Connection;
pub use device::{Device, DirectoryEvent, SubscriptionId};
pub use error::{EmberError, EmberResult};
pub use tree::{NodeEntry, ParameterEntry, Property, PropertyValue, TreeEntry};

#[cfg(test)]
pub(crate) mod testing;
