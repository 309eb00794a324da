//! Generic TLV engine
//!
//! A [`Tlv`] is a tagged value: either a constructed sequence of child TLVs
//! or a typed primitive payload. Encoding always uses definite-length form
//! with a minimal-width length field; decoding additionally accepts the
//! indefinite form for constructed values.

use crate::ber::integer::{integer_decode, integer_encode, integer_encoded_length};
use crate::ber::oid::{relative_oid_decode, relative_oid_encode, relative_oid_encoded_length};
use crate::ber::real::{real_decode, real_encode, real_encoded_length};
use crate::ber::{
    TYPE_BOOLEAN, TYPE_EOC, TYPE_INTEGER, TYPE_NULL, TYPE_OCTETSTRING, TYPE_REAL,
    TYPE_RELATIVE_OID, TYPE_SEQUENCE, TYPE_SET, TYPE_UTF8STRING,
};
use crate::error::{EmberError, EmberResult};
use std::cell::Cell;

/// BER tag class
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagClass {
    Universal,
    Application,
    Context,
    Private,
}

impl TagClass {
    fn from_bits(bits: u8) -> Self {
        match bits & 0x03 {
            0 => TagClass::Universal,
            1 => TagClass::Application,
            2 => TagClass::Context,
            _ => TagClass::Private,
        }
    }

    fn bits(self) -> u8 {
        match self {
            TagClass::Universal => 0,
            TagClass::Application => 1,
            TagClass::Context => 2,
            TagClass::Private => 3,
        }
    }
}

/// A BER tag: class, constructed flag and tag number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tag {
    pub class: TagClass,
    pub constructed: bool,
    pub number: u32,
}

impl Tag {
    pub fn universal(number: u32) -> Self {
        Tag {
            class: TagClass::Universal,
            constructed: false,
            number,
        }
    }

    pub fn universal_constructed(number: u32) -> Self {
        Tag {
            class: TagClass::Universal,
            constructed: true,
            number,
        }
    }

    pub fn application(number: u32) -> Self {
        Tag {
            class: TagClass::Application,
            constructed: true,
            number,
        }
    }

    pub fn context(number: u32) -> Self {
        Tag {
            class: TagClass::Context,
            constructed: true,
            number,
        }
    }

    /// Number of bytes the identifier octets occupy.
    fn encoded_length(&self) -> usize {
        if self.number < 31 {
            return 1;
        }

        let mut length = 2;
        let mut n = self.number >> 7;
        while n != 0 {
            length += 1;
            n >>= 7;
        }
        length
    }

    fn encode(&self, buf: &mut [u8], pos: usize) -> usize {
        let leading = (self.class.bits() << 6) | if self.constructed { 0x20 } else { 0 };

        if self.number < 31 {
            buf[pos] = leading | self.number as u8;
            return pos + 1;
        }

        buf[pos] = leading | 31;
        let mut pos = pos + 1;

        let mut shift = 28;
        while shift > 0 && self.number >> shift == 0 {
            shift -= 7;
        }
        while shift > 0 {
            buf[pos] = 0x80 | ((self.number >> shift) & 0x7F) as u8;
            pos += 1;
            shift -= 7;
        }
        buf[pos] = (self.number & 0x7F) as u8;
        pos + 1
    }
}

/// The payload of a TLV.
#[derive(Debug, Clone, PartialEq)]
pub enum TlvValue {
    /// Children of a constructed TLV, in encoding order.
    Children(Vec<Tlv>),
    Boolean(bool),
    Integer(i64),
    Real(f64),
    Utf8String(String),
    OctetString(Vec<u8>),
    RelativeOid(Vec<u32>),
    Null,
    /// End-of-contents marker, only produced while decoding indefinite
    /// length values.
    Eoc,
}

/// A tagged BER value.
///
/// The content length is computed lazily on first use and cached; the
/// cached value must match the actual encoded byte count exactly, which
/// `encode` enforces with a final offset self-check.
#[derive(Debug, Clone)]
pub struct Tlv {
    pub tag: Tag,
    pub value: TlvValue,
    cached_length: Cell<Option<usize>>,
}

impl PartialEq for Tlv {
    fn eq(&self, other: &Self) -> bool {
        self.tag == other.tag && self.value == other.value
    }
}

impl Tlv {
    pub fn new(tag: Tag, value: TlvValue) -> Self {
        Self {
            tag,
            value,
            cached_length: Cell::new(None),
        }
    }

    pub fn integer(value: i64) -> Self {
        Self::new(Tag::universal(TYPE_INTEGER), TlvValue::Integer(value))
    }

    pub fn boolean(value: bool) -> Self {
        Self::new(Tag::universal(TYPE_BOOLEAN), TlvValue::Boolean(value))
    }

    pub fn real(value: f64) -> Self {
        Self::new(Tag::universal(TYPE_REAL), TlvValue::Real(value))
    }

    pub fn utf8(value: impl Into<String>) -> Self {
        Self::new(
            Tag::universal(TYPE_UTF8STRING),
            TlvValue::Utf8String(value.into()),
        )
    }

    pub fn octets(value: Vec<u8>) -> Self {
        Self::new(Tag::universal(TYPE_OCTETSTRING), TlvValue::OctetString(value))
    }

    pub fn relative_oid(components: Vec<u32>) -> Self {
        Self::new(
            Tag::universal(TYPE_RELATIVE_OID),
            TlvValue::RelativeOid(components),
        )
    }

    pub fn null() -> Self {
        Self::new(Tag::universal(TYPE_NULL), TlvValue::Null)
    }

    pub fn sequence(children: Vec<Tlv>) -> Self {
        Self::new(
            Tag::universal_constructed(TYPE_SEQUENCE),
            TlvValue::Children(children),
        )
    }

    /// Universal SET whose present fields are wrapped in context tags by
    /// their position. Absent fields are omitted entirely.
    pub fn set(fields: Vec<Option<Tlv>>) -> Self {
        let children = fields
            .into_iter()
            .enumerate()
            .filter_map(|(i, field)| field.map(|tlv| Tlv::context(i as u32, tlv)))
            .collect();

        Self::new(Tag::universal_constructed(TYPE_SET), TlvValue::Children(children))
    }

    /// Context-tagged wrapper around a single child.
    pub fn context(number: u32, child: Tlv) -> Self {
        Self::new(Tag::context(number), TlvValue::Children(vec![child]))
    }

    /// Application-tagged constructed value.
    pub fn application(number: u32, children: Vec<Tlv>) -> Self {
        Self::new(Tag::application(number), TlvValue::Children(children))
    }

    pub fn is_constructed(&self) -> bool {
        matches!(self.value, TlvValue::Children(_))
    }

    pub fn is_universal(&self) -> bool {
        self.tag.class == TagClass::Universal
    }

    pub fn is_application(&self) -> bool {
        self.tag.class == TagClass::Application
    }

    pub fn is_context(&self) -> bool {
        self.tag.class == TagClass::Context
    }

    pub fn is_eoc(&self) -> bool {
        self.is_universal() && self.tag.number == TYPE_EOC
    }

    /// The application id, failing for non-application tags.
    pub fn application_id(&self) -> EmberResult<u32> {
        if !self.is_application() {
            return Err(EmberError::MalformedEncoding(
                "Not an application tag".to_string(),
            ));
        }
        Ok(self.tag.number)
    }

    /// The context tag number, failing for non-context tags.
    pub fn context_number(&self) -> EmberResult<u32> {
        if !self.is_context() {
            return Err(EmberError::MalformedEncoding(
                "Not a context tag".to_string(),
            ));
        }
        Ok(self.tag.number)
    }

    /// The children of a constructed TLV.
    pub fn children(&self) -> EmberResult<&[Tlv]> {
        match &self.value {
            TlvValue::Children(children) => Ok(children),
            _ => Err(EmberError::MalformedEncoding(
                "Expected constructed TLV".to_string(),
            )),
        }
    }

    /// The single child of a context or application wrapper.
    pub fn single_child(&self) -> EmberResult<&Tlv> {
        let children = self.children()?;

        if children.len() != 1 {
            return Err(EmberError::MalformedEncoding(format!(
                "Expected one child in wrapper, got {}",
                children.len()
            )));
        }
        Ok(&children[0])
    }

    /// Content length in bytes, computed once and cached.
    pub fn value_length(&self) -> EmberResult<usize> {
        if let Some(length) = self.cached_length.get() {
            return Ok(length);
        }

        let length = match &self.value {
            TlvValue::Children(children) => {
                let mut total = 0;
                for child in children {
                    total += child.encoded_length()?;
                }
                total
            }
            TlvValue::Boolean(_) => 1,
            TlvValue::Integer(value) => integer_encoded_length(*value),
            TlvValue::Real(value) => real_encoded_length(*value),
            TlvValue::Utf8String(text) => text.len(),
            TlvValue::OctetString(octets) => octets.len(),
            TlvValue::RelativeOid(components) => relative_oid_encoded_length(components),
            TlvValue::Null | TlvValue::Eoc => 0,
        };

        self.cached_length.set(Some(length));
        Ok(length)
    }

    /// Total encoded length: identifier, length field and content.
    pub fn encoded_length(&self) -> EmberResult<usize> {
        let length = self.value_length()?;
        Ok(self.tag.encoded_length() + length_field_encoded_length(length)? + length)
    }

    /// Encode into `buf` at `pos`, returning the position past the value.
    pub fn encode_to(&self, buf: &mut [u8], pos: usize) -> EmberResult<usize> {
        if self.tag.constructed != self.is_constructed() {
            return Err(EmberError::MalformedEncoding(
                "Constructed flag does not match value".to_string(),
            ));
        }

        let pos = self.tag.encode(buf, pos);
        let pos = encode_length_field(buf, pos, self.value_length()?)?;

        match &self.value {
            TlvValue::Children(children) => {
                let mut pos = pos;
                for child in children {
                    pos = child.encode_to(buf, pos)?;
                }
                Ok(pos)
            }
            TlvValue::Boolean(value) => {
                buf[pos] = if *value { 0xFF } else { 0 };
                Ok(pos + 1)
            }
            TlvValue::Integer(value) => Ok(integer_encode(buf, pos, *value)),
            TlvValue::Real(value) => Ok(real_encode(buf, pos, *value)),
            TlvValue::Utf8String(text) => {
                buf[pos..pos + text.len()].copy_from_slice(text.as_bytes());
                Ok(pos + text.len())
            }
            TlvValue::OctetString(octets) => {
                buf[pos..pos + octets.len()].copy_from_slice(octets);
                Ok(pos + octets.len())
            }
            TlvValue::RelativeOid(components) => Ok(relative_oid_encode(buf, pos, components)),
            TlvValue::Null | TlvValue::Eoc => Ok(pos),
        }
    }

    /// Encode into a freshly allocated buffer of exactly the right size.
    ///
    /// The final offset is checked against the declared length; a mismatch
    /// means the cached length went stale and is a hard error.
    pub fn encode(&self) -> EmberResult<Vec<u8>> {
        let length = self.encoded_length()?;
        let mut buf = vec![0u8; length];

        let pos = self.encode_to(&mut buf, 0)?;

        if pos != length {
            return Err(EmberError::ProtocolViolation(format!(
                "Encoding offset mismatch: wrote {} of {} bytes",
                pos, length
            )));
        }

        Ok(buf)
    }

    /// Decode one TLV starting at `pos`, returning it and the position
    /// just past it.
    pub fn decode_from(buf: &[u8], pos: usize) -> EmberResult<(Tlv, usize)> {
        let identifier = read_u8(buf, pos)?;
        let mut pos = pos + 1;

        let class = TagClass::from_bits(identifier >> 6);
        let constructed = identifier & 0x20 != 0;
        let mut number = (identifier & 31) as u32;

        if number == 31 {
            // multi-byte tag number, base-128 with continuation bits
            number = 0;
            loop {
                let byte = read_u8(buf, pos)?;
                pos += 1;

                if number >> 25 != 0 {
                    return Err(EmberError::MalformedEncoding(
                        "Tag number overflow".to_string(),
                    ));
                }
                number = (number << 7) | (byte & 0x7F) as u32;

                if byte & 0x80 == 0 {
                    break;
                }
            }
        }

        let tag = Tag {
            class,
            constructed,
            number,
        };

        // length field: short, long or indefinite
        let first = read_u8(buf, pos)?;
        pos += 1;

        let length: Option<usize> = if first < 128 {
            Some(first as usize)
        } else if first == 128 {
            None
        } else if first == 255 {
            return Err(EmberError::MalformedEncoding(
                "Reserved value in length field".to_string(),
            ));
        } else {
            let count = (first & 127) as usize;
            if count > 4 {
                return Err(EmberError::MalformedEncoding(
                    "Length field overflow".to_string(),
                ));
            }

            let mut length: usize = 0;
            for _ in 0..count {
                length = (length << 8) | read_u8(buf, pos)? as usize;
                pos += 1;
            }
            Some(length)
        };

        if constructed {
            let mut children = Vec::new();

            match length {
                None => {
                    // indefinite form, terminated by EOC
                    loop {
                        let (child, next) = Tlv::decode_from(buf, pos)?;
                        pos = next;

                        if child.is_eoc() {
                            break;
                        }
                        children.push(child);
                    }
                }
                Some(length) => {
                    let end = pos + length;
                    if end > buf.len() {
                        return Err(EmberError::MalformedEncoding(
                            "Truncated constructed value".to_string(),
                        ));
                    }

                    while pos < end {
                        let (child, next) = Tlv::decode_from(buf, pos)?;
                        pos = next;
                        children.push(child);
                    }

                    if pos != end {
                        return Err(EmberError::MalformedEncoding(
                            "Bad length field in constructed value".to_string(),
                        ));
                    }
                }
            }

            return Ok((Tlv::new(tag, TlvValue::Children(children)), pos));
        }

        if class != TagClass::Universal {
            return Err(EmberError::MalformedEncoding(
                "Primitive TLV in non-universal class".to_string(),
            ));
        }

        let length = length.ok_or_else(|| {
            EmberError::MalformedEncoding("Indefinite length on primitive".to_string())
        })?;

        let value = match number {
            TYPE_EOC => {
                if length != 0 {
                    return Err(EmberError::MalformedEncoding(
                        "Bad length field for EOC".to_string(),
                    ));
                }
                TlvValue::Eoc
            }
            TYPE_BOOLEAN => {
                if length != 1 {
                    return Err(EmberError::MalformedEncoding(
                        "Bad length field for BOOLEAN".to_string(),
                    ));
                }
                let value = read_u8(buf, pos)? != 0;
                pos += 1;
                TlvValue::Boolean(value)
            }
            TYPE_INTEGER => {
                let value = integer_decode(buf, pos, length)?;
                pos += length;
                TlvValue::Integer(value)
            }
            TYPE_OCTETSTRING => {
                let octets = read_bytes(buf, pos, length)?.to_vec();
                pos += length;
                TlvValue::OctetString(octets)
            }
            TYPE_NULL => {
                if length != 0 {
                    return Err(EmberError::MalformedEncoding(
                        "Bad length field for NULL".to_string(),
                    ));
                }
                TlvValue::Null
            }
            TYPE_REAL => {
                let value = real_decode(buf, pos, length)?;
                pos += length;
                TlvValue::Real(value)
            }
            TYPE_UTF8STRING => {
                let bytes = read_bytes(buf, pos, length)?;
                let text = std::str::from_utf8(bytes).map_err(|_| {
                    EmberError::MalformedEncoding("Invalid UTF-8 in UTF8STRING".to_string())
                })?;
                pos += length;
                TlvValue::Utf8String(text.to_string())
            }
            TYPE_RELATIVE_OID => {
                if length == 0 {
                    return Err(EmberError::MalformedEncoding(
                        "Bad length field for RELATIVE-OID".to_string(),
                    ));
                }
                let components = relative_oid_decode(buf, pos, length)?;
                pos += length;
                TlvValue::RelativeOid(components)
            }
            _ => {
                return Err(EmberError::MalformedEncoding(format!(
                    "Unsupported primitive type {}",
                    number
                )));
            }
        };

        Ok((Tlv::new(tag, value), pos))
    }
}

fn read_u8(buf: &[u8], pos: usize) -> EmberResult<u8> {
    buf.get(pos).copied().ok_or_else(|| {
        EmberError::MalformedEncoding("Unexpected end of input".to_string())
    })
}

fn read_bytes(buf: &[u8], pos: usize, length: usize) -> EmberResult<&[u8]> {
    buf.get(pos..pos + length).ok_or_else(|| {
        EmberError::MalformedEncoding("Unexpected end of input".to_string())
    })
}

fn length_field_encoded_length(length: usize) -> EmberResult<usize> {
    if length < 128 {
        Ok(1)
    } else if length <= 0xFF {
        Ok(2)
    } else if length <= 0xFFFF {
        Ok(3)
    } else if length <= 0xFFFF_FFFF {
        Ok(5)
    } else {
        Err(EmberError::MalformedEncoding("Length overflow".to_string()))
    }
}

fn encode_length_field(buf: &mut [u8], pos: usize, length: usize) -> EmberResult<usize> {
    if length < 128 {
        buf[pos] = length as u8;
        Ok(pos + 1)
    } else if length <= 0xFF {
        buf[pos] = 0x81;
        buf[pos + 1] = length as u8;
        Ok(pos + 2)
    } else if length <= 0xFFFF {
        buf[pos] = 0x82;
        buf[pos + 1..pos + 3].copy_from_slice(&(length as u16).to_be_bytes());
        Ok(pos + 3)
    } else if length <= 0xFFFF_FFFF {
        buf[pos] = 0x84;
        buf[pos + 1..pos + 5].copy_from_slice(&(length as u32).to_be_bytes());
        Ok(pos + 5)
    } else {
        Err(EmberError::MalformedEncoding("Length overflow".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(tlv: &Tlv) -> Tlv {
        let buf = tlv.encode().unwrap();
        let (decoded, pos) = Tlv::decode_from(&buf, 0).unwrap();
        assert_eq!(pos, buf.len());
        assert_eq!(&decoded, tlv);
        // re-encoding reproduces the same bytes
        assert_eq!(decoded.encode().unwrap(), buf);
        decoded
    }

    #[test]
    fn test_primitives_round_trip() {
        round_trip(&Tlv::integer(0));
        round_trip(&Tlv::integer(-129));
        round_trip(&Tlv::integer(i64::MAX));
        round_trip(&Tlv::boolean(true));
        round_trip(&Tlv::boolean(false));
        round_trip(&Tlv::real(-1234.5678));
        round_trip(&Tlv::utf8("identifier"));
        round_trip(&Tlv::octets(vec![0, 1, 2, 0xFF]));
        round_trip(&Tlv::relative_oid(vec![1, 200, 70000]));
        round_trip(&Tlv::null());
    }

    #[test]
    fn test_known_bytes() {
        assert_eq!(Tlv::integer(32).encode().unwrap(), vec![0x02, 0x01, 0x20]);
        assert_eq!(
            Tlv::boolean(true).encode().unwrap(),
            vec![0x01, 0x01, 0xFF]
        );
        assert_eq!(
            Tlv::utf8("ab").encode().unwrap(),
            vec![0x0C, 0x02, b'a', b'b']
        );
    }

    #[test]
    fn test_constructed_round_trip() {
        let tlv = Tlv::application(
            11,
            vec![Tlv::context(0, Tlv::integer(1)), Tlv::context(1, Tlv::utf8("x"))],
        );
        let decoded = round_trip(&tlv);
        assert_eq!(decoded.children().unwrap().len(), 2);
    }

    #[test]
    fn test_set_skips_absent_fields() {
        let tlv = Tlv::set(vec![
            Some(Tlv::utf8("name")),
            None,
            Some(Tlv::boolean(true)),
            None,
        ]);
        let children = tlv.children().unwrap();
        assert_eq!(children.len(), 2);
        assert_eq!(children[0].context_number().unwrap(), 0);
        assert_eq!(children[1].context_number().unwrap(), 2);
        round_trip(&tlv);
    }

    #[test]
    fn test_long_form_length() {
        // 200-byte string needs the 0x81 long form
        let tlv = Tlv::utf8("x".repeat(200));
        let buf = tlv.encode().unwrap();
        assert_eq!(buf[1], 0x81);
        assert_eq!(buf[2], 200);
        round_trip(&tlv);

        // 70000-byte string needs the 0x84 long form
        let tlv = Tlv::octets(vec![7; 70000]);
        let buf = tlv.encode().unwrap();
        assert_eq!(buf[1], 0x84);
        round_trip(&tlv);
    }

    #[test]
    fn test_indefinite_length_decode() {
        // SEQUENCE { INTEGER 5 } in indefinite form
        let buf = [0x30, 0x80, 0x02, 0x01, 0x05, 0x00, 0x00];
        let (tlv, pos) = Tlv::decode_from(&buf, 0).unwrap();
        assert_eq!(pos, buf.len());
        assert_eq!(tlv.children().unwrap(), &[Tlv::integer(5)]);
    }

    #[test]
    fn test_multi_byte_tag_number() {
        let tlv = Tlv::new(
            Tag {
                class: TagClass::Context,
                constructed: true,
                number: 300,
            },
            TlvValue::Children(vec![Tlv::integer(1)]),
        );
        let buf = tlv.encode().unwrap();
        // leading byte has the all-ones tag field
        assert_eq!(buf[0] & 31, 31);
        assert_eq!(&buf[1..3], &[0x82, 0x2C]);
        round_trip(&tlv);
    }

    #[test]
    fn test_decode_errors() {
        // reserved length byte
        assert!(Tlv::decode_from(&[0x02, 0xFF, 0x00], 0).is_err());
        // indefinite length on a primitive
        assert!(Tlv::decode_from(&[0x02, 0x80, 0x00, 0x00], 0).is_err());
        // constructed children overshoot the declared length
        assert!(Tlv::decode_from(&[0x30, 0x02, 0x02, 0x01, 0x05], 0).is_err());
        // context-class primitive
        assert!(Tlv::decode_from(&[0x82, 0x01, 0x05], 0).is_err());
        // truncated content
        assert!(Tlv::decode_from(&[0x0C, 0x05, b'a'], 0).is_err());
        // bad BOOLEAN length
        assert!(Tlv::decode_from(&[0x01, 0x02, 0x00, 0x00], 0).is_err());
    }

    #[test]
    fn test_cached_length_stability() {
        let tlv = Tlv::sequence(vec![Tlv::integer(1), Tlv::utf8("abc")]);
        let first = tlv.value_length().unwrap();
        assert_eq!(tlv.value_length().unwrap(), first);
        assert_eq!(tlv.encode().unwrap().len(), tlv.encoded_length().unwrap());
    }
}
