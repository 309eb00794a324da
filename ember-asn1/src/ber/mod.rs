//! BER (X.690) subset codec
//!
//! Only the encodings Ember+ actually uses are implemented: the universal
//! types below in definite-length primitive form, constructed values in
//! definite-length form (indefinite length accepted on decode), and
//! context/application tagged wrappers.

pub mod integer;
pub mod oid;
pub mod real;
pub mod tlv;

pub use tlv::{Tag, TagClass, Tlv, TlvValue};

/// Universal tag numbers used by Ember+
pub const TYPE_EOC: u32 = 0;
pub const TYPE_BOOLEAN: u32 = 1;
pub const TYPE_INTEGER: u32 = 2;
pub const TYPE_OCTETSTRING: u32 = 4;
pub const TYPE_NULL: u32 = 5;
pub const TYPE_REAL: u32 = 9;
pub const TYPE_UTF8STRING: u32 = 12;
pub const TYPE_RELATIVE_OID: u32 = 13;
pub const TYPE_SEQUENCE: u32 = 16;
pub const TYPE_SET: u32 = 17;
