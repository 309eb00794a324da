//! S101 framing and the Ember+ message layer
//!
//! S101 is the byte-stuffed, CRC-checked stream framing Ember+ rides on.
//! This crate covers the frame codec, the CRC16, and the per-frame message
//! header (keepalives, payload packet flags, fragment reassembly).

pub mod crc;
pub mod error;
pub mod frame;
pub mod message;

pub use crc::Crc16;
pub use error::{EmberError, EmberResult};
pub use frame::{encode_frame, FrameDecoder};
pub use message::{
    encode_ember_payload, encode_keepalive_request, encode_keepalive_response, parse_message,
    FragmentReassembler, S101Message,
};
