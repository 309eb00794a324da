//! INTEGER primitive codec
//!
//! Minimal-length two's complement encoding as required by BER. The signed
//! codec covers 1 to 8 content bytes; the unsigned variant is used for REAL
//! mantissas, which are always non-negative.

use crate::error::{EmberError, EmberResult};

/// Number of content bytes a minimal encoding of `value` occupies.
pub fn integer_encoded_length(value: i64) -> usize {
    let mut length = 1;

    while length < 8 {
        let bits = 8 * length as u32;
        let min = -(1i64 << (bits - 1));
        let max = (1i64 << (bits - 1)) - 1;

        if value >= min && value <= max {
            return length;
        }
        length += 1;
    }

    8
}

/// Encode `value` at `pos` using exactly `length` content bytes.
pub fn integer_encode_with_length(buf: &mut [u8], pos: usize, value: i64, length: usize) -> usize {
    let be = value.to_be_bytes();
    buf[pos..pos + length].copy_from_slice(&be[8 - length..]);
    pos + length
}

/// Encode `value` at `pos` using the minimal number of content bytes.
pub fn integer_encode(buf: &mut [u8], pos: usize, value: i64) -> usize {
    let length = integer_encoded_length(value);
    integer_encode_with_length(buf, pos, value, length)
}

/// Decode a two's complement integer of `length` content bytes, sign
/// extending to 64 bits.
pub fn integer_decode(buf: &[u8], pos: usize, length: usize) -> EmberResult<i64> {
    if length == 0 || length > 8 {
        return Err(EmberError::MalformedEncoding(format!(
            "Bad INTEGER content length: {}",
            length
        )));
    }
    if pos + length > buf.len() {
        return Err(EmberError::MalformedEncoding(
            "Truncated INTEGER content".to_string(),
        ));
    }

    let mut value: i64 = if buf[pos] & 0x80 != 0 { -1 } else { 0 };

    for &byte in &buf[pos..pos + length] {
        value = (value << 8) | byte as i64;
    }

    Ok(value)
}

/// Number of content bytes a minimal unsigned encoding of `value` occupies.
///
/// Unlike the signed encoding there is no sign bit to spend, so the full
/// eight bytes cover all of `u64`.
pub fn unsigned_encoded_length(value: u64) -> usize {
    let mut length = 1;

    while length < 8 && value >> (8 * length) != 0 {
        length += 1;
    }

    length
}

/// Encode a non-negative `value` at `pos` using the minimal number of
/// content bytes.
pub fn unsigned_encode(buf: &mut [u8], pos: usize, value: u64) -> usize {
    let length = unsigned_encoded_length(value);
    let be = value.to_be_bytes();
    buf[pos..pos + length].copy_from_slice(&be[8 - length..]);
    pos + length
}

/// Decode an unsigned integer of `length` content bytes.
///
/// A zero-length content is 0; this arises for REAL mantissa fields only.
pub fn unsigned_decode(buf: &[u8], pos: usize, length: usize) -> EmberResult<u64> {
    if length > 8 {
        return Err(EmberError::MalformedEncoding(format!(
            "Bad unsigned content length: {}",
            length
        )));
    }
    if pos + length > buf.len() {
        return Err(EmberError::MalformedEncoding(
            "Truncated unsigned content".to_string(),
        ));
    }

    let mut value: u64 = 0;

    for &byte in &buf[pos..pos + length] {
        value = (value << 8) | byte as u64;
    }

    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(value: i64) -> (usize, i64) {
        let length = integer_encoded_length(value);
        let mut buf = vec![0u8; length];
        assert_eq!(integer_encode(&mut buf, 0, value), length);
        (length, integer_decode(&buf, 0, length).unwrap())
    }

    #[test]
    fn test_boundary_lengths() {
        // ±(2^n - 1) and the adjacent power for n = 7, 15, 23, 31, 39, 47
        for (n, expect) in [(7u32, 1), (15, 2), (23, 3), (31, 4), (39, 5), (47, 6)] {
            let max = (1i64 << n) - 1;
            assert_eq!(round_trip(max), (expect, max));
            assert_eq!(round_trip(-max), (expect, -max));
            // one past the positive boundary needs one more byte
            assert_eq!(round_trip(max + 1), (expect + 1, max + 1));
            // the negative boundary itself still fits
            assert_eq!(round_trip(-max - 1), (expect, -max - 1));
        }
    }

    #[test]
    fn test_extremes() {
        assert_eq!(round_trip(0), (1, 0));
        assert_eq!(round_trip(-1), (1, -1));
        assert_eq!(round_trip(i64::MAX), (8, i64::MAX));
        assert_eq!(round_trip(i64::MIN), (8, i64::MIN));
    }

    #[test]
    fn test_sign_extension() {
        // 0xFF at every length decodes to a negative value
        for length in 1..=8usize {
            let buf = vec![0xFFu8; length];
            assert_eq!(integer_decode(&buf, 0, length).unwrap(), -1);
        }
        // high bit clear stays positive
        let buf = [0x7F, 0xFF, 0xFF];
        assert_eq!(integer_decode(&buf, 0, 3).unwrap(), 0x7FFFFF);
    }

    #[test]
    fn test_decode_rejects_bad_lengths() {
        let buf = [0u8; 16];
        assert!(integer_decode(&buf, 0, 0).is_err());
        assert!(integer_decode(&buf, 0, 9).is_err());
        assert!(integer_decode(&buf, 12, 8).is_err());
    }

    #[test]
    fn test_unsigned() {
        assert_eq!(unsigned_encoded_length(0), 1);
        assert_eq!(unsigned_encoded_length(0xFF), 1);
        assert_eq!(unsigned_encoded_length(0x100), 2);
        assert_eq!(unsigned_encoded_length(u64::MAX), 8);

        let mut buf = [0u8; 8];
        let end = unsigned_encode(&mut buf, 0, 0x1_0000);
        assert_eq!(end, 3);
        assert_eq!(unsigned_decode(&buf, 0, 3).unwrap(), 0x1_0000);

        // zero-length content decodes to 0
        assert_eq!(unsigned_decode(&buf, 0, 0).unwrap(), 0);
        assert!(unsigned_decode(&buf, 0, 9).is_err());
    }
}
