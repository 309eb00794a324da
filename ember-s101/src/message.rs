//! Ember+ message layer
//!
//! Each S101 frame carries one message: a four byte header (slot, message
//! type, command, version), then for Ember payloads a packet-flags byte,
//! the DTD marker and two application bytes before the BER data. Large
//! payloads arrive split over several packets and are reassembled here.

use crate::error::{EmberError, EmberResult};
use crate::frame::encode_frame;
use bytes::{Bytes, BytesMut};

const SLOT: u8 = 0x00;
const MESSAGE_TYPE_EMBER: u8 = 0x0E;
const VERSION: u8 = 0x01;

const COMMAND_EMBER: u8 = 0x00;
const COMMAND_KEEPALIVE_REQUEST: u8 = 0x01;
const COMMAND_KEEPALIVE_RESPONSE: u8 = 0x02;

const FLAG_SINGLE: u8 = 0xC0;
const FLAG_EMPTY: u8 = 0x20;
const FLAG_FIRST: u8 = 0x80;
const FLAG_CONTINUATION: u8 = 0x00;
const FLAG_LAST: u8 = 0x40;

const DTD_GLOW: u8 = 0x01;
const APP_BYTES: [u8; 2] = [0x1F, 0x02];

/// One decoded S101 message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum S101Message {
    KeepaliveRequest,
    KeepaliveResponse,
    /// Payload packet with the empty flag; carries nothing.
    Empty,
    /// Complete payload in one packet.
    Single(Bytes),
    /// First packet of a multi-packet payload.
    First(Bytes),
    /// Middle packet of a multi-packet payload.
    Continuation(Bytes),
    /// Final packet of a multi-packet payload.
    Last(Bytes),
}

/// Parse the message inside a decoded frame payload.
pub fn parse_message(frame: &[u8]) -> EmberResult<S101Message> {
    if frame.len() < 4 {
        return Err(EmberError::ProtocolViolation(format!(
            "Message header truncated: {} bytes",
            frame.len()
        )));
    }

    if frame[0] != SLOT {
        return Err(EmberError::ProtocolViolation(format!(
            "Unexpected slot: 0x{:02X}",
            frame[0]
        )));
    }
    if frame[1] != MESSAGE_TYPE_EMBER {
        return Err(EmberError::ProtocolViolation(format!(
            "Unexpected message type: 0x{:02X}",
            frame[1]
        )));
    }
    let command = frame[2];
    if frame[3] != VERSION {
        return Err(EmberError::ProtocolViolation(format!(
            "Unexpected protocol version: 0x{:02X}",
            frame[3]
        )));
    }

    match command {
        COMMAND_KEEPALIVE_REQUEST => Ok(S101Message::KeepaliveRequest),
        COMMAND_KEEPALIVE_RESPONSE => Ok(S101Message::KeepaliveResponse),
        COMMAND_EMBER => parse_payload_packet(frame),
        other => Err(EmberError::ProtocolViolation(format!(
            "Unknown message command: 0x{:02X}",
            other
        ))),
    }
}

fn parse_payload_packet(frame: &[u8]) -> EmberResult<S101Message> {
    if frame.len() < 7 {
        return Err(EmberError::ProtocolViolation(format!(
            "Payload packet header truncated: {} bytes",
            frame.len()
        )));
    }

    let flags = frame[4];

    if frame[5] != DTD_GLOW {
        return Err(EmberError::ProtocolViolation(format!(
            "Unexpected DTD: 0x{:02X}",
            frame[5]
        )));
    }

    // application bytes are skipped, only their count is checked
    let app_bytes = frame[6] as usize;
    if app_bytes != APP_BYTES.len() {
        return Err(EmberError::ProtocolViolation(format!(
            "Unexpected application bytes count: {}",
            app_bytes
        )));
    }
    if frame.len() < 7 + app_bytes {
        return Err(EmberError::ProtocolViolation(
            "Payload packet shorter than its application bytes".to_string(),
        ));
    }

    let payload = Bytes::copy_from_slice(&frame[7 + app_bytes..]);

    match flags {
        FLAG_EMPTY => Ok(S101Message::Empty),
        FLAG_SINGLE => Ok(S101Message::Single(payload)),
        FLAG_FIRST => Ok(S101Message::First(payload)),
        FLAG_CONTINUATION => Ok(S101Message::Continuation(payload)),
        FLAG_LAST => Ok(S101Message::Last(payload)),
        other => Err(EmberError::ProtocolViolation(format!(
            "Unknown packet flags: 0x{:02X}",
            other
        ))),
    }
}

/// Reassembles multi-packet payloads in arrival order.
///
/// Start/continuation/end packets must pair up; a continuation without an
/// open sequence, or a new start over one, means the peer lost track and
/// the connection state is unusable.
pub struct FragmentReassembler {
    fragments: Option<BytesMut>,
}

impl FragmentReassembler {
    pub fn new() -> Self {
        Self { fragments: None }
    }

    /// Feed one message; returns a complete payload when one closes.
    pub fn handle(&mut self, message: S101Message) -> EmberResult<Option<Bytes>> {
        match message {
            S101Message::Single(payload) => Ok(Some(payload)),
            S101Message::First(payload) => {
                if self.fragments.is_some() {
                    return Err(EmberError::ProtocolViolation(
                        "Multi-packet message started over an open one".to_string(),
                    ));
                }
                self.fragments = Some(BytesMut::from(&payload[..]));
                Ok(None)
            }
            S101Message::Continuation(payload) => {
                match self.fragments.as_mut() {
                    Some(fragments) => fragments.extend_from_slice(&payload),
                    None => {
                        return Err(EmberError::ProtocolViolation(
                            "Continuation packet without an open message".to_string(),
                        ));
                    }
                }
                Ok(None)
            }
            S101Message::Last(payload) => match self.fragments.take() {
                Some(mut fragments) => {
                    fragments.extend_from_slice(&payload);
                    Ok(Some(fragments.freeze()))
                }
                None => Err(EmberError::ProtocolViolation(
                    "Final packet without an open message".to_string(),
                )),
            },
            S101Message::Empty
            | S101Message::KeepaliveRequest
            | S101Message::KeepaliveResponse => Ok(None),
        }
    }
}

impl Default for FragmentReassembler {
    fn default() -> Self {
        Self::new()
    }
}

/// Encode a keepalive request frame.
pub fn encode_keepalive_request() -> EmberResult<Vec<u8>> {
    encode_frame(&[SLOT, MESSAGE_TYPE_EMBER, COMMAND_KEEPALIVE_REQUEST, VERSION])
}

/// Encode a keepalive response frame.
pub fn encode_keepalive_response() -> EmberResult<Vec<u8>> {
    encode_frame(&[SLOT, MESSAGE_TYPE_EMBER, COMMAND_KEEPALIVE_RESPONSE, VERSION])
}

/// Encode a BER payload as a single-packet Ember message frame.
pub fn encode_ember_payload(payload: &[u8]) -> EmberResult<Vec<u8>> {
    let mut message = Vec::with_capacity(9 + payload.len());
    message.extend_from_slice(&[
        SLOT,
        MESSAGE_TYPE_EMBER,
        COMMAND_EMBER,
        VERSION,
        FLAG_SINGLE,
        DTD_GLOW,
        APP_BYTES.len() as u8,
    ]);
    message.extend_from_slice(&APP_BYTES);
    message.extend_from_slice(payload);

    encode_frame(&message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::FrameDecoder;

    const GET_DIRECTORY_TLV: [u8; 13] = [
        0x60, 0x0B, 0x6B, 0x09, 0xA0, 0x07, 0x62, 0x05, 0xA0, 0x03, 0x02, 0x01, 0x20,
    ];

    #[test]
    fn test_get_directory_frame_bytes() {
        let frame = encode_ember_payload(&GET_DIRECTORY_TLV).unwrap();
        let expected = [
            0xFE, 0x00, 0x0E, 0x00, 0x01, 0xC0, 0x01, 0x02, 0x1F, 0x02, 0x60, 0x0B, 0x6B, 0x09,
            0xA0, 0x07, 0x62, 0x05, 0xA0, 0x03, 0x02, 0x01, 0x20, 0xB4, 0xEC, 0xFF,
        ];
        assert_eq!(frame, expected);

        let mut decoder = FrameDecoder::new();
        decoder.feed(&frame);
        let body = decoder.parse().unwrap().unwrap();
        match parse_message(&body).unwrap() {
            S101Message::Single(payload) => assert_eq!(&payload[..], GET_DIRECTORY_TLV),
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn test_keepalive_frames() {
        let frame = encode_keepalive_request().unwrap();
        let mut decoder = FrameDecoder::new();
        decoder.feed(&frame);
        let body = decoder.parse().unwrap().unwrap();
        assert_eq!(&body[..4], [0x00, 0x0E, 0x01, 0x01]);
        assert_eq!(parse_message(&body).unwrap(), S101Message::KeepaliveRequest);

        let frame = encode_keepalive_response().unwrap();
        decoder.feed(&frame);
        let body = decoder.parse().unwrap().unwrap();
        assert_eq!(parse_message(&body).unwrap(), S101Message::KeepaliveResponse);
    }

    #[test]
    fn test_header_validation() {
        // bad slot
        assert!(parse_message(&[0x01, 0x0E, 0x01, 0x01]).is_err());
        // bad message type
        assert!(parse_message(&[0x00, 0x0F, 0x01, 0x01]).is_err());
        // bad version
        assert!(parse_message(&[0x00, 0x0E, 0x01, 0x02]).is_err());
        // unknown command
        assert!(parse_message(&[0x00, 0x0E, 0x07, 0x01]).is_err());
        // truncated
        assert!(parse_message(&[0x00, 0x0E]).is_err());
        // bad DTD
        assert!(parse_message(&[0x00, 0x0E, 0x00, 0x01, 0xC0, 0x02, 0x02, 0x1F, 0x02]).is_err());
        // unknown flags
        assert!(parse_message(&[0x00, 0x0E, 0x00, 0x01, 0x60, 0x01, 0x02, 0x1F, 0x02]).is_err());
    }

    #[test]
    fn test_empty_packet_ignored() {
        let message =
            parse_message(&[0x00, 0x0E, 0x00, 0x01, 0x20, 0x01, 0x02, 0x1F, 0x02]).unwrap();
        assert_eq!(message, S101Message::Empty);
        assert_eq!(FragmentReassembler::new().handle(message).unwrap(), None);
    }

    fn packet(flags: u8, payload: &[u8]) -> Vec<u8> {
        let mut frame = vec![0x00, 0x0E, 0x00, 0x01, flags, 0x01, 0x02, 0x1F, 0x02];
        frame.extend_from_slice(payload);
        frame
    }

    #[test]
    fn test_multi_packet_reassembly() {
        let mut reassembler = FragmentReassembler::new();

        let first = parse_message(&packet(FLAG_FIRST, &[1, 2])).unwrap();
        assert_eq!(reassembler.handle(first).unwrap(), None);

        let middle = parse_message(&packet(FLAG_CONTINUATION, &[3])).unwrap();
        assert_eq!(reassembler.handle(middle).unwrap(), None);

        let last = parse_message(&packet(FLAG_LAST, &[4, 5])).unwrap();
        let payload = reassembler.handle(last).unwrap().unwrap();
        assert_eq!(&payload[..], [1, 2, 3, 4, 5]);

        // the sequence is closed; a stray end is a violation
        let stray = parse_message(&packet(FLAG_LAST, &[9])).unwrap();
        assert!(reassembler.handle(stray).is_err());
    }

    #[test]
    fn test_fragment_state_violations() {
        let mut reassembler = FragmentReassembler::new();
        let continuation = parse_message(&packet(FLAG_CONTINUATION, &[1])).unwrap();
        assert!(reassembler.handle(continuation).is_err());

        let mut reassembler = FragmentReassembler::new();
        let first = parse_message(&packet(FLAG_FIRST, &[1])).unwrap();
        reassembler.handle(first).unwrap();
        let second_first = parse_message(&packet(FLAG_FIRST, &[2])).unwrap();
        assert!(reassembler.handle(second_first).is_err());
    }
}
