//! RELATIVE-OID primitive codec
//!
//! Ember+ uses relative object identifiers for qualified element paths.
//! Each component is base-128, big-endian, with the continuation bit set on
//! all bytes but the last one of a component.

use crate::error::{EmberError, EmberResult};

/// Number of content bytes the encoding of `components` occupies.
pub fn relative_oid_encoded_length(components: &[u32]) -> usize {
    let mut length = 0;

    for &n in components {
        let mut n = n;
        loop {
            length += 1;
            n >>= 7;
            if n == 0 {
                break;
            }
        }
    }

    length
}

/// Encode `components` at `pos`, returning the new position.
pub fn relative_oid_encode(buf: &mut [u8], pos: usize, components: &[u32]) -> usize {
    let mut pos = pos;

    for &n in components {
        // emit base-128 groups most significant first
        let mut shift = 28;
        while shift > 0 && n >> shift == 0 {
            shift -= 7;
        }

        while shift > 0 {
            buf[pos] = 0x80 | ((n >> shift) & 0x7F) as u8;
            pos += 1;
            shift -= 7;
        }

        buf[pos] = (n & 0x7F) as u8;
        pos += 1;
    }

    pos
}

/// Decode `length` content bytes starting at `pos` into components.
pub fn relative_oid_decode(buf: &[u8], pos: usize, length: usize) -> EmberResult<Vec<u32>> {
    if pos + length > buf.len() {
        return Err(EmberError::MalformedEncoding(
            "Truncated RELATIVE-OID content".to_string(),
        ));
    }

    let mut components = Vec::new();
    let mut acc: u32 = 0;

    for (i, &byte) in buf[pos..pos + length].iter().enumerate() {
        if acc >> 25 != 0 {
            return Err(EmberError::MalformedEncoding(
                "RELATIVE-OID component overflow".to_string(),
            ));
        }
        acc = (acc << 7) | (byte & 0x7F) as u32;

        if byte & 0x80 == 0 {
            components.push(acc);
            acc = 0;
        } else if i == length - 1 {
            return Err(EmberError::MalformedEncoding(
                "Unterminated RELATIVE-OID".to_string(),
            ));
        }
    }

    Ok(components)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(components: &[u32]) -> Vec<u8> {
        let length = relative_oid_encoded_length(components);
        let mut buf = vec![0u8; length];
        let end = relative_oid_encode(&mut buf, 0, components);
        assert_eq!(end, length);
        buf
    }

    #[test]
    fn test_single_byte_components() {
        assert_eq!(encode(&[0]), vec![0x00]);
        assert_eq!(encode(&[127]), vec![0x7F]);
        assert_eq!(encode(&[1, 3, 2]), vec![0x01, 0x03, 0x02]);
    }

    #[test]
    fn test_multi_byte_components() {
        assert_eq!(encode(&[128]), vec![0x81, 0x00]);
        assert_eq!(encode(&[0xFFFF]), vec![0x83, 0xFF, 0x7F]);
        assert_eq!(encode(&[0xFF_FFFF]), vec![0x87, 0xFF, 0xFF, 0x7F]);
    }

    #[test]
    fn test_round_trip() {
        for components in [
            vec![0u32],
            vec![127],
            vec![128],
            vec![0xFFFF],
            vec![0xFF_FFFF],
            vec![u32::MAX],
            vec![1, 200, 3, 70000],
        ] {
            let buf = encode(&components);
            assert_eq!(
                relative_oid_decode(&buf, 0, buf.len()).unwrap(),
                components
            );
        }
    }

    #[test]
    fn test_unterminated() {
        // trailing byte with continuation bit set
        assert!(relative_oid_decode(&[0x81], 0, 1).is_err());
        assert!(relative_oid_decode(&[0x01, 0x83, 0xFF], 0, 3).is_err());
    }

    #[test]
    fn test_overflow() {
        // six continuation groups exceed u32
        let buf = [0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x7F];
        assert!(relative_oid_decode(&buf, 0, buf.len()).is_err());
    }
}
