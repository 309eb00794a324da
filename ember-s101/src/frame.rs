//! S101 frame codec
//!
//! A frame is BOF, the byte-stuffed payload, two stuffed CRC bytes, EOF.
//! Every payload byte at or above 0xF8 is replaced by the escape marker
//! followed by the byte XOR 0x20, keeping the control bytes unique on the
//! wire.

use crate::crc::Crc16;
use crate::error::{EmberError, EmberResult};
use bytes::{Bytes, BytesMut};

pub const BOF: u8 = 0xFE;
pub const EOF: u8 = 0xFF;
pub const CE: u8 = 0xFD;

const ESCAPE_XOR: u8 = 0x20;
const ESCAPE_THRESHOLD: u8 = 0xF8;

/// Encode `payload` into a complete S101 frame.
///
/// The output length is computed up front; the final write offset must
/// land exactly on it.
pub fn encode_frame(payload: &[u8]) -> EmberResult<Vec<u8>> {
    let mut crc = Crc16::new();
    crc.update_bytes(payload);
    let checksum = crc.frame_bytes();

    let escapes = payload
        .iter()
        .chain(checksum.iter())
        .filter(|&&byte| byte >= ESCAPE_THRESHOLD)
        .count();
    let length = payload.len() + checksum.len() + escapes + 2;

    let mut buf = vec![0u8; length];
    buf[0] = BOF;
    let mut pos = 1;

    for &byte in payload.iter().chain(checksum.iter()) {
        if byte >= ESCAPE_THRESHOLD {
            buf[pos] = CE;
            buf[pos + 1] = byte ^ ESCAPE_XOR;
            pos += 2;
        } else {
            buf[pos] = byte;
            pos += 1;
        }
    }

    buf[pos] = EOF;
    pos += 1;

    if pos != length {
        return Err(EmberError::ProtocolViolation(format!(
            "Frame encoding offset mismatch: wrote {} of {} bytes",
            pos, length
        )));
    }

    Ok(buf)
}

/// Incremental S101 frame decoder over an accumulating byte buffer.
///
/// `feed` appends received bytes; `parse` yields at most one frame per
/// call and leaves partial frames buffered for the next read.
pub struct FrameDecoder {
    buf: BytesMut,
    pos: usize,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self {
            buf: BytesMut::new(),
            pos: 0,
        }
    }

    /// Append received bytes, dropping the already-consumed prefix first
    /// when the cursor has caught up with the buffer.
    pub fn feed(&mut self, data: &[u8]) {
        if self.pos >= self.buf.len() {
            self.buf.clear();
            self.pos = 0;
        }
        self.buf.extend_from_slice(data);
    }

    /// Try to extract the next frame's payload (CRC stripped).
    ///
    /// Returns `None` when no complete frame is buffered yet. The buffer
    /// at the cursor must start with BOF; anything else means the stream
    /// lost sync, which is unrecoverable.
    pub fn parse(&mut self) -> EmberResult<Option<Bytes>> {
        if self.pos >= self.buf.len() {
            return Ok(None);
        }

        if self.buf[self.pos] != BOF {
            return Err(EmberError::ProtocolViolation(format!(
                "Expected frame start 0x{:02X}, got 0x{:02X}",
                BOF, self.buf[self.pos]
            )));
        }

        let body_start = self.pos + 1;
        let end = match self.buf[body_start..].iter().position(|&byte| byte == EOF) {
            Some(offset) => body_start + offset,
            None => return Ok(None),
        };

        let raw = &self.buf[body_start..end];
        let escapes = raw.iter().filter(|&&byte| byte == CE).count();

        let body = if escapes == 0 {
            raw.to_vec()
        } else {
            let mut body = Vec::with_capacity(raw.len() - escapes);
            let mut iter = raw.iter();
            while let Some(&byte) = iter.next() {
                if byte == CE {
                    let &escaped = iter.next().ok_or_else(|| {
                        EmberError::ProtocolViolation(
                            "Escape marker at end of frame".to_string(),
                        )
                    })?;
                    body.push(escaped ^ ESCAPE_XOR);
                } else {
                    body.push(byte);
                }
            }
            body
        };

        if body.len() < 2 {
            return Err(EmberError::ProtocolViolation(
                "Frame too short for its checksum".to_string(),
            ));
        }

        let mut crc = Crc16::new();
        crc.update_bytes(&body);
        crc.validate()?;

        self.pos = end + 1;
        if self.pos >= self.buf.len() {
            self.buf.clear();
            self.pos = 0;
        }

        let mut frame = body;
        frame.truncate(frame.len() - 2);
        Ok(Some(Bytes::from(frame)))
    }
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_one(frame: &[u8]) -> Bytes {
        let mut decoder = FrameDecoder::new();
        decoder.feed(frame);
        decoder.parse().unwrap().unwrap()
    }

    #[test]
    fn test_round_trip_plain() {
        let payload = [0x00, 0x0E, 0x01, 0x01];
        let frame = encode_frame(&payload).unwrap();
        assert_eq!(frame[0], BOF);
        assert_eq!(*frame.last().unwrap(), EOF);
        assert_eq!(&decode_one(&frame)[..], payload);
    }

    #[test]
    fn test_round_trip_with_escapes() {
        // every byte in the escape range, plus the control bytes themselves
        let payload: Vec<u8> = (0xF8..=0xFF).chain(0x00..0x10).collect();
        let frame = encode_frame(&payload).unwrap();

        // no raw control byte may appear inside the frame body
        for &byte in &frame[1..frame.len() - 1] {
            assert!(byte < ESCAPE_THRESHOLD);
        }
        assert_eq!(&decode_one(&frame)[..], &payload[..]);
    }

    #[test]
    fn test_byte_at_a_time_feeding() {
        let payload = [0x60, 0xFE, 0x02, 0xFF, 0x20];
        let frame = encode_frame(&payload).unwrap();

        let mut decoder = FrameDecoder::new();
        for &byte in &frame[..frame.len() - 1] {
            decoder.feed(&[byte]);
            assert!(decoder.parse().unwrap().is_none());
        }
        decoder.feed(&frame[frame.len() - 1..]);
        assert_eq!(&decoder.parse().unwrap().unwrap()[..], payload);
    }

    #[test]
    fn test_two_frames_in_one_feed() {
        let mut data = encode_frame(&[1, 2, 3]).unwrap();
        data.extend_from_slice(&encode_frame(&[4, 5]).unwrap());

        let mut decoder = FrameDecoder::new();
        decoder.feed(&data);
        assert_eq!(&decoder.parse().unwrap().unwrap()[..], [1, 2, 3]);
        assert_eq!(&decoder.parse().unwrap().unwrap()[..], [4, 5]);
        assert!(decoder.parse().unwrap().is_none());
    }

    #[test]
    fn test_missing_bof_is_fatal() {
        let mut decoder = FrameDecoder::new();
        decoder.feed(&[0x00, 0x0E]);
        assert!(decoder.parse().is_err());
    }

    #[test]
    fn test_corrupted_crc_rejected() {
        let mut frame = encode_frame(&[1, 2, 3]).unwrap();
        frame[1] ^= 0x01;

        let mut decoder = FrameDecoder::new();
        decoder.feed(&frame);
        assert!(decoder.parse().is_err());
    }
}
