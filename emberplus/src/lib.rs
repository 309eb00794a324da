//! Rust implementation of the Ember+ device control protocol
//!
//! Ember+ is a tree-based control protocol: a provider (mixing console,
//! router, processor) exposes a tree of nodes and parameters, and a
//! consumer browses the tree, observes values and writes them back.
//!
//! This library is organized as a workspace with multiple crates:
//!
//! - `ember-core`: Core types, numeric paths, error handling
//! - `ember-asn1`: BER encoding/decoding and the Glow schema types
//! - `ember-s101`: S101 framing (byte stuffing, CRC, fragmentation)
//! - `ember-transport`: Transport layer (TCP)
//! - `ember-client`: Consumer implementation (connection, tree mirror)
//!
//! # Usage
//!
//! ```no_run
//! use emberplus::transport::TcpTransport;
//! use emberplus::{Connection, Device, PathKey};
//!
//! # async fn example() -> emberplus::EmberResult<()> {
//! let transport = TcpTransport::connect("10.9.8.7:9000").await?;
//! let mut device = Device::new(Connection::new(transport)).await?;
//!
//! device.observe_path(&PathKey::parse("1.3.2")?, |event| {
//!     println!("{} available: {}", event.path, !event.removed);
//! })?;
//! device.run().await
//! # }
//! ```

// Re-export core types
pub use ember_core::{EmberError, EmberResult, MinMax, PathKey, Value};

// Re-export the consumer API
pub use ember_client::{
    Connection, Device, DirectoryEvent, NodeEntry, ParameterEntry, Property, PropertyValue,
    SubscriptionId, TreeEntry,
};

// Re-export the Glow schema types
pub mod glow {
    pub use ember_asn1::glow::*;
    pub use ember_asn1::{Tag, TagClass, Tlv, TlvValue};
}

// Re-export framing
pub mod s101 {
    pub use ember_s101::*;
}

// Re-export transports
pub mod transport {
    pub use ember_transport::*;
}
