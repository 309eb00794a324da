//! Transport layer for the Ember+ protocol
//!
//! The protocol core is transport-agnostic: everything above this crate
//! talks to a [`TransportLayer`] trait object. TCP is the implementation
//! providers actually expose.

pub mod error;
pub mod stream;
pub mod tcp;

pub use error::{EmberError, EmberResult};
pub use stream::TransportLayer;
pub use tcp::{TcpSettings, TcpTransport};
