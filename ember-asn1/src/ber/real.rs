//! REAL primitive codec
//!
//! X.690 binary encoding, base 2 only. Zero content length is `+0.0`; the
//! single-byte sentinels cover the special values; everything else is an
//! info byte, a two's complement exponent and an unsigned mantissa.
//!
//! The encoder always normalizes the mantissa by stripping trailing zero
//! bits, producing the shortest valid encoding. This is required for
//! round-trip minimality, not just cosmetics.

use crate::ber::integer::{
    integer_decode, integer_encode_with_length, integer_encoded_length, unsigned_decode,
    unsigned_encode, unsigned_encoded_length,
};
use crate::error::{EmberError, EmberResult};

const REAL_PLUS_INFINITY: u8 = 0x40;
const REAL_MINUS_INFINITY: u8 = 0x41;
const REAL_NAN: u8 = 0x42;
const REAL_MINUS_ZERO: u8 = 0x43;

const REAL_ENCODING_MASK: u8 = 0x80;
const REAL_SIGN_MASK: u8 = 0x40;
const REAL_BASE_MASK: u8 = 0x30;
const REAL_SCALE_MASK: u8 = 0x0C;
const REAL_EXPONENT_LENGTH_MASK: u8 = 0x03;

/// Split a finite non-zero double into sign, exponent and normalized
/// mantissa such that `value == ±mantissa * 2^exponent` and the mantissa
/// has no trailing zero bits.
pub fn split_float64(value: f64) -> (bool, i32, u64) {
    let bits = value.to_bits();
    let sign = bits >> 63 != 0;
    let biased = ((bits >> 52) & 0x7FF) as i32;
    let fraction = bits & 0x000F_FFFF_FFFF_FFFF;

    let (mut exponent, mut mantissa) = if biased == 0 {
        // subnormal: no implicit leading bit
        (-1074, fraction)
    } else {
        (biased - 1075, fraction | (1 << 52))
    };

    if mantissa != 0 {
        let tz = mantissa.trailing_zeros();
        mantissa >>= tz;
        exponent += tz as i32;
    }

    (sign, exponent, mantissa)
}

/// Reconstruct a double from sign, exponent and mantissa.
///
/// Scaling happens in two steps so that subnormal results stay exact
/// instead of underflowing in a single multiplication.
pub fn join_float64(sign: bool, exponent: i32, mantissa: u64) -> f64 {
    let half = exponent / 2;
    let value = mantissa as f64 * 2f64.powi(half) * 2f64.powi(exponent - half);

    if sign {
        -value
    } else {
        value
    }
}

/// Number of content bytes `real_encode` will emit for `value`.
pub fn real_encoded_length(value: f64) -> usize {
    if value == 0.0 {
        // +0.0 is the empty encoding, -0.0 a sentinel byte
        return if value.is_sign_negative() { 1 } else { 0 };
    }
    if value.is_nan() || value.is_infinite() {
        return 1;
    }

    let (_, exponent, mantissa) = split_float64(value);

    1 + integer_encoded_length(exponent as i64) + unsigned_encoded_length(mantissa)
}

/// Encode `value` at `pos`, returning the new position.
pub fn real_encode(buf: &mut [u8], pos: usize, value: f64) -> usize {
    if value == 0.0 {
        if value.is_sign_negative() {
            buf[pos] = REAL_MINUS_ZERO;
            return pos + 1;
        }
        return pos;
    }
    if value.is_nan() {
        buf[pos] = REAL_NAN;
        return pos + 1;
    }
    if value.is_infinite() {
        buf[pos] = if value > 0.0 {
            REAL_PLUS_INFINITY
        } else {
            REAL_MINUS_INFINITY
        };
        return pos + 1;
    }

    let (sign, exponent, mantissa) = split_float64(value);
    let exponent_length = integer_encoded_length(exponent as i64);

    let mut info = REAL_ENCODING_MASK;
    if sign {
        info |= REAL_SIGN_MASK;
    }
    // base 2, scale factor 0, exponent length is 1 or 2 for any f64
    buf[pos] = info | (exponent_length as u8 - 1);

    let pos = integer_encode_with_length(buf, pos + 1, exponent as i64, exponent_length);
    unsigned_encode(buf, pos, mantissa)
}

/// Decode a REAL of `length` content bytes starting at `pos`.
pub fn real_decode(buf: &[u8], pos: usize, length: usize) -> EmberResult<f64> {
    if length == 0 {
        return Ok(0.0);
    }
    if pos + length > buf.len() {
        return Err(EmberError::MalformedEncoding(
            "Truncated REAL content".to_string(),
        ));
    }

    if length == 1 {
        return match buf[pos] {
            REAL_PLUS_INFINITY => Ok(f64::INFINITY),
            REAL_MINUS_INFINITY => Ok(f64::NEG_INFINITY),
            REAL_NAN => Ok(f64::NAN),
            REAL_MINUS_ZERO => Ok(-0.0),
            byte => Err(EmberError::MalformedEncoding(format!(
                "Malformed REAL sentinel: 0x{:02X}",
                byte
            ))),
        };
    }

    let start = pos;
    let info = buf[pos];
    let mut pos = pos + 1;

    if info & REAL_ENCODING_MASK == 0 {
        return Err(EmberError::MalformedEncoding(
            "REAL only supports binary encoding".to_string(),
        ));
    }
    if info & REAL_BASE_MASK != 0 {
        return Err(EmberError::MalformedEncoding(
            "REAL only supports base-2 encoding".to_string(),
        ));
    }

    let sign = info & REAL_SIGN_MASK != 0;
    let mut exponent_length = (info & REAL_EXPONENT_LENGTH_MASK) as usize + 1;

    if exponent_length == 4 {
        // explicit exponent length byte
        exponent_length = buf[pos] as usize;
        pos += 1;
    }

    // the exponent must leave at least one mantissa byte inside the content
    let content_end = start + length;
    if exponent_length == 0 || pos + exponent_length >= content_end {
        return Err(EmberError::MalformedEncoding(format!(
            "REAL exponent of {} bytes runs past the content",
            exponent_length
        )));
    }

    let scale = ((info & REAL_SCALE_MASK) >> 2) as i64;
    let exponent = integer_decode(buf, pos, exponent_length)?.saturating_add(scale);
    pos += exponent_length;

    if exponent < i32::MIN as i64 || exponent > i32::MAX as i64 {
        return Err(EmberError::MalformedEncoding(
            "REAL exponent out of range".to_string(),
        ));
    }

    let mantissa = unsigned_decode(buf, pos, content_end - pos)?;

    Ok(join_float64(sign, exponent as i32, mantissa))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(value: f64) -> Vec<u8> {
        let length = real_encoded_length(value);
        let mut buf = vec![0u8; length];
        let end = real_encode(&mut buf, 0, value);
        assert_eq!(end, length);
        buf
    }

    fn round_trip(value: f64) -> f64 {
        let buf = encode(value);
        real_decode(&buf, 0, buf.len()).unwrap()
    }

    #[test]
    fn test_split() {
        assert_eq!(split_float64(0.5), (false, -1, 1));
        assert_eq!(split_float64(2.0), (false, 1, 1));
        assert_eq!(split_float64(-3.0), (true, 0, 3));
        assert_eq!(split_float64(5e-324), (false, -1074, 1));
        assert_eq!(split_float64(f64::EPSILON), (false, -52, 1));
        assert_eq!(split_float64(f64::MIN_POSITIVE), (false, -1022, 1));
    }

    #[test]
    fn test_join_exact() {
        assert_eq!(join_float64(false, -1, 1), 0.5);
        assert_eq!(join_float64(true, 0, 3), -3.0);
        assert_eq!(join_float64(false, -1074, 1), 5e-324);
        assert_eq!(join_float64(false, -1022, 1), f64::MIN_POSITIVE);
    }

    #[test]
    fn test_sentinels() {
        assert_eq!(encode(0.0), Vec::<u8>::new());
        assert_eq!(encode(-0.0), vec![0x43]);
        assert_eq!(encode(f64::INFINITY), vec![0x40]);
        assert_eq!(encode(f64::NEG_INFINITY), vec![0x41]);
        assert_eq!(encode(f64::NAN), vec![0x42]);

        assert_eq!(round_trip(0.0).to_bits(), 0.0f64.to_bits());
        assert_eq!(round_trip(-0.0).to_bits(), (-0.0f64).to_bits());
        assert!(round_trip(f64::NAN).is_nan());
        assert_eq!(round_trip(f64::INFINITY), f64::INFINITY);
        assert_eq!(round_trip(f64::NEG_INFINITY), f64::NEG_INFINITY);
    }

    #[test]
    fn test_minimal_encoding() {
        // 0.5 = 1 * 2^-1: info byte, one exponent byte, one mantissa byte
        assert_eq!(encode(0.5), vec![0x80, 0xFF, 0x01]);
        assert_eq!(encode(2.0), vec![0x80, 0x01, 0x01]);
        assert_eq!(encode(-0.5), vec![0xC0, 0xFF, 0x01]);
        // mantissa has no trailing zero byte after normalization
        for value in [1.0, 96.0, 0.1, 1234.5678, f64::MAX] {
            let buf = encode(value);
            assert_ne!(buf[buf.len() - 1], 0, "trailing zero for {}", value);
        }
    }

    #[test]
    fn test_round_trip_exact() {
        for value in [
            1.0,
            -1.0,
            0.1,
            -1234.5678,
            f64::MAX,
            f64::MIN,
            f64::MIN_POSITIVE,
            f64::EPSILON,
            5e-324,
            -5e-324,
            2.2250738585072004e-308, // largest subnormal
        ] {
            let out = round_trip(value);
            assert_eq!(out.to_bits(), value.to_bits(), "mismatch for {:e}", value);
        }
    }

    #[test]
    fn test_decode_errors() {
        // unknown sentinel
        assert!(real_decode(&[0x44], 0, 1).is_err());
        // decimal encoding bit clear
        assert!(real_decode(&[0x00, 0x01, 0x01], 0, 3).is_err());
        // non-zero base bits
        assert!(real_decode(&[0x90, 0x01, 0x01], 0, 3).is_err());
    }

    #[test]
    fn test_exponent_must_fit_content() {
        // two exponent bytes declared, one byte of content left (the bytes
        // past the content length belong to whatever follows on the wire)
        assert!(real_decode(&[0x81, 0x00, 0x00, 0x00], 0, 2).is_err());
        // explicit exponent length larger than the content
        assert!(real_decode(&[0x83, 0x09, 0x01, 0x01], 0, 4).is_err());
        // explicit exponent length of zero
        assert!(real_decode(&[0x83, 0x00, 0x01, 0x01], 0, 4).is_err());
        // exponent consuming the content leaves no mantissa
        assert!(real_decode(&[0x80, 0x01], 0, 2).is_err());
        // scale factor pushing the exponent past i32::MAX
        assert!(real_decode(&[0x87, 0x04, 0x7F, 0xFF, 0xFF, 0xFF, 0x01], 0, 7).is_err());
    }

    #[test]
    fn test_scale_factor_applied() {
        // F = 1 shifts the exponent by one: 1 * 2^0 * 2^1 = 2.0
        let buf = [0x84, 0x00, 0x01];
        assert_eq!(real_decode(&buf, 0, 3).unwrap(), 2.0);
    }
}
