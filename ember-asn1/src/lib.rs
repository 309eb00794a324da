//! BER codec and Glow schema types for the Ember+ protocol
//!
//! This crate implements the ASN.1 BER subset used by Ember+ (the "Glow"
//! DTD): primitive codecs, a generic TLV engine, and the typed Glow
//! application types built on top of it.

pub mod ber;
pub mod error;
pub mod glow;

pub use ber::{Tag, TagClass, Tlv, TlvValue};
pub use error::{EmberError, EmberResult};
pub use glow::{
    CommandType, GlowCommand, GlowElement, GlowNode, GlowNodeContents, GlowParameter,
    GlowParameterContents, GlowQualifiedNode, GlowQualifiedParameter, GlowRoot, GlowRootElement,
    GlowStreamEntry, ParameterAccess, ParameterType, StreamDescription, StreamFormat,
    StringIntegerPair,
};
