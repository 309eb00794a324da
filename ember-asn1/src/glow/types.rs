//! Glow enumerations and small leaf types

use crate::ber::{Tlv, TlvValue};
use crate::error::{EmberError, EmberResult};
use crate::glow::{
    app_struct, expect_app, expect_integer, expect_utf8, struct_fields, type_mismatch,
    APP_STREAM_DESCRIPTION, APP_STRING_INTEGER_PAIR,
};
use ember_core::{MinMax, Value};

/// Parameter value type reported by a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterType {
    Integer,
    Real,
    String,
    Boolean,
    Trigger,
    Enum,
    Octets,
}

impl ParameterType {
    pub fn from_wire(value: i64) -> EmberResult<Self> {
        match value {
            0 => Ok(ParameterType::Integer),
            1 => Ok(ParameterType::Real),
            2 => Ok(ParameterType::String),
            3 => Ok(ParameterType::Boolean),
            4 => Ok(ParameterType::Trigger),
            5 => Ok(ParameterType::Enum),
            6 => Ok(ParameterType::Octets),
            _ => Err(EmberError::MalformedEncoding(format!(
                "Unknown parameter type: {}",
                value
            ))),
        }
    }

    pub fn to_wire(self) -> i64 {
        match self {
            ParameterType::Integer => 0,
            ParameterType::Real => 1,
            ParameterType::String => 2,
            ParameterType::Boolean => 3,
            ParameterType::Trigger => 4,
            ParameterType::Enum => 5,
            ParameterType::Octets => 6,
        }
    }
}

/// Parameter access rights.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterAccess {
    None,
    Read,
    Write,
    ReadWrite,
}

impl ParameterAccess {
    pub fn from_wire(value: i64) -> EmberResult<Self> {
        match value {
            0 => Ok(ParameterAccess::None),
            1 => Ok(ParameterAccess::Read),
            2 => Ok(ParameterAccess::Write),
            3 => Ok(ParameterAccess::ReadWrite),
            _ => Err(EmberError::MalformedEncoding(format!(
                "Unknown parameter access: {}",
                value
            ))),
        }
    }

    pub fn to_wire(self) -> i64 {
        match self {
            ParameterAccess::None => 0,
            ParameterAccess::Read => 1,
            ParameterAccess::Write => 2,
            ParameterAccess::ReadWrite => 3,
        }
    }

    pub fn is_writable(self) -> bool {
        matches!(self, ParameterAccess::Write | ParameterAccess::ReadWrite)
    }
}

/// Command numbers sent to a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandType {
    Subscribe,
    Unsubscribe,
    GetDirectory,
}

impl CommandType {
    pub fn from_wire(value: i64) -> EmberResult<Self> {
        match value {
            30 => Ok(CommandType::Subscribe),
            31 => Ok(CommandType::Unsubscribe),
            32 => Ok(CommandType::GetDirectory),
            _ => Err(EmberError::MalformedEncoding(format!(
                "Unknown command: {}",
                value
            ))),
        }
    }

    pub fn to_wire(self) -> i64 {
        match self {
            CommandType::Subscribe => 30,
            CommandType::Unsubscribe => 31,
            CommandType::GetDirectory => 32,
        }
    }
}

/// Sample format of a stream carried as octets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamFormat {
    UnsignedInt8,
    UnsignedInt16BigEndian,
    UnsignedInt16LittleEndian,
    UnsignedInt32BigEndian,
    UnsignedInt32LittleEndian,
    UnsignedInt64BigEndian,
    UnsignedInt64LittleEndian,
    SignedInt8,
    SignedInt16BigEndian,
    SignedInt16LittleEndian,
    SignedInt32BigEndian,
    SignedInt32LittleEndian,
    SignedInt64BigEndian,
    SignedInt64LittleEndian,
    IeeeFloat32BigEndian,
    IeeeFloat32LittleEndian,
    IeeeFloat64BigEndian,
    IeeeFloat64LittleEndian,
}

impl StreamFormat {
    pub fn from_wire(value: i64) -> EmberResult<Self> {
        match value {
            0 => Ok(StreamFormat::UnsignedInt8),
            2 => Ok(StreamFormat::UnsignedInt16BigEndian),
            3 => Ok(StreamFormat::UnsignedInt16LittleEndian),
            4 => Ok(StreamFormat::UnsignedInt32BigEndian),
            5 => Ok(StreamFormat::UnsignedInt32LittleEndian),
            6 => Ok(StreamFormat::UnsignedInt64BigEndian),
            7 => Ok(StreamFormat::UnsignedInt64LittleEndian),
            8 => Ok(StreamFormat::SignedInt8),
            10 => Ok(StreamFormat::SignedInt16BigEndian),
            11 => Ok(StreamFormat::SignedInt16LittleEndian),
            12 => Ok(StreamFormat::SignedInt32BigEndian),
            13 => Ok(StreamFormat::SignedInt32LittleEndian),
            14 => Ok(StreamFormat::SignedInt64BigEndian),
            15 => Ok(StreamFormat::SignedInt64LittleEndian),
            20 => Ok(StreamFormat::IeeeFloat32BigEndian),
            21 => Ok(StreamFormat::IeeeFloat32LittleEndian),
            22 => Ok(StreamFormat::IeeeFloat64BigEndian),
            23 => Ok(StreamFormat::IeeeFloat64LittleEndian),
            _ => Err(EmberError::MalformedEncoding(format!(
                "Unknown stream format: {}",
                value
            ))),
        }
    }

    pub fn to_wire(self) -> i64 {
        match self {
            StreamFormat::UnsignedInt8 => 0,
            StreamFormat::UnsignedInt16BigEndian => 2,
            StreamFormat::UnsignedInt16LittleEndian => 3,
            StreamFormat::UnsignedInt32BigEndian => 4,
            StreamFormat::UnsignedInt32LittleEndian => 5,
            StreamFormat::UnsignedInt64BigEndian => 6,
            StreamFormat::UnsignedInt64LittleEndian => 7,
            StreamFormat::SignedInt8 => 8,
            StreamFormat::SignedInt16BigEndian => 10,
            StreamFormat::SignedInt16LittleEndian => 11,
            StreamFormat::SignedInt32BigEndian => 12,
            StreamFormat::SignedInt32LittleEndian => 13,
            StreamFormat::SignedInt64BigEndian => 14,
            StreamFormat::SignedInt64LittleEndian => 15,
            StreamFormat::IeeeFloat32BigEndian => 20,
            StreamFormat::IeeeFloat32LittleEndian => 21,
            StreamFormat::IeeeFloat64BigEndian => 22,
            StreamFormat::IeeeFloat64LittleEndian => 23,
        }
    }
}

/// Layout of a parameter's value within a stream packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamDescription {
    pub format: Option<StreamFormat>,
    pub offset: Option<i64>,
}

impl StreamDescription {
    pub fn encode(&self) -> Tlv {
        app_struct(
            APP_STREAM_DESCRIPTION,
            vec![
                self.format.map(|format| Tlv::integer(format.to_wire())),
                self.offset.map(Tlv::integer),
            ],
        )
    }

    pub fn decode(tlv: &Tlv) -> EmberResult<Self> {
        expect_app(tlv, APP_STREAM_DESCRIPTION)?;

        let mut description = StreamDescription {
            format: None,
            offset: None,
        };

        for (position, field) in struct_fields(tlv)? {
            match position {
                0 => description.format = Some(StreamFormat::from_wire(expect_integer(field)?)?),
                1 => description.offset = Some(expect_integer(field)?),
                _ => {}
            }
        }

        Ok(description)
    }
}

/// One entry of a parameter's enumeration map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StringIntegerPair {
    pub name: String,
    pub value: i64,
}

impl StringIntegerPair {
    pub fn encode(&self) -> Tlv {
        app_struct(
            APP_STRING_INTEGER_PAIR,
            vec![
                Some(Tlv::utf8(self.name.clone())),
                Some(Tlv::integer(self.value)),
            ],
        )
    }

    pub fn decode(tlv: &Tlv) -> EmberResult<Self> {
        expect_app(tlv, APP_STRING_INTEGER_PAIR)?;

        let mut name = None;
        let mut value = None;

        for (position, field) in struct_fields(tlv)? {
            match position {
                0 => name = Some(expect_utf8(field)?),
                1 => value = Some(expect_integer(field)?),
                _ => {}
            }
        }

        match (name, value) {
            (Some(name), Some(value)) => Ok(StringIntegerPair { name, value }),
            _ => Err(EmberError::MalformedEncoding(
                "Incomplete string-integer pair".to_string(),
            )),
        }
    }
}

/// Encode a dynamic value by its native type.
pub fn encode_value(value: &Value) -> Tlv {
    match value {
        Value::Integer(n) => Tlv::integer(*n),
        Value::Real(r) => Tlv::real(*r),
        Value::String(s) => Tlv::utf8(s.clone()),
        Value::Bool(b) => Tlv::boolean(*b),
        Value::Octets(o) => Tlv::octets(o.clone()),
    }
}

/// Decode a value choice: INTEGER, REAL, UTF8STRING, BOOLEAN or OCTETSTRING.
pub fn decode_value(tlv: &Tlv) -> EmberResult<Value> {
    if !tlv.is_universal() {
        return Err(type_mismatch("value choice", tlv));
    }

    match &tlv.value {
        TlvValue::Integer(n) => Ok(Value::Integer(*n)),
        TlvValue::Real(r) => Ok(Value::Real(*r)),
        TlvValue::Utf8String(s) => Ok(Value::String(s.clone())),
        TlvValue::Boolean(b) => Ok(Value::Bool(*b)),
        TlvValue::OctetString(o) => Ok(Value::Octets(o.clone())),
        _ => Err(type_mismatch("value choice", tlv)),
    }
}

pub fn encode_min_max(value: &MinMax) -> Tlv {
    match value {
        MinMax::Integer(n) => Tlv::integer(*n),
        MinMax::Real(r) => Tlv::real(*r),
    }
}

/// Decode a minimum/maximum choice: INTEGER or REAL only.
pub fn decode_min_max(tlv: &Tlv) -> EmberResult<MinMax> {
    if !tlv.is_universal() {
        return Err(type_mismatch("min/max choice", tlv));
    }

    match &tlv.value {
        TlvValue::Integer(n) => Ok(MinMax::Integer(*n)),
        TlvValue::Real(r) => Ok(MinMax::Real(*r)),
        _ => Err(type_mismatch("min/max choice", tlv)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_wire_values() {
        assert_eq!(CommandType::Subscribe.to_wire(), 30);
        assert_eq!(CommandType::Unsubscribe.to_wire(), 31);
        assert_eq!(CommandType::GetDirectory.to_wire(), 32);
        assert_eq!(
            CommandType::from_wire(32).unwrap(),
            CommandType::GetDirectory
        );
        assert!(CommandType::from_wire(0).is_err());
    }

    #[test]
    fn test_stream_format_gaps_rejected() {
        assert!(StreamFormat::from_wire(1).is_err());
        assert!(StreamFormat::from_wire(9).is_err());
        assert!(StreamFormat::from_wire(16).is_err());
        assert!(StreamFormat::from_wire(24).is_err());
        assert_eq!(
            StreamFormat::from_wire(23).unwrap(),
            StreamFormat::IeeeFloat64LittleEndian
        );
    }

    #[test]
    fn test_string_integer_pair_round_trip() {
        let pair = StringIntegerPair {
            name: "on".to_string(),
            value: 1,
        };
        assert_eq!(StringIntegerPair::decode(&pair.encode()).unwrap(), pair);
    }

    #[test]
    fn test_stream_description_round_trip() {
        let description = StreamDescription {
            format: Some(StreamFormat::IeeeFloat32BigEndian),
            offset: Some(4),
        };
        assert_eq!(
            StreamDescription::decode(&description.encode()).unwrap(),
            description
        );
    }

    #[test]
    fn test_value_choice() {
        for value in [
            Value::Integer(-7),
            Value::Real(0.25),
            Value::String("db".to_string()),
            Value::Bool(true),
            Value::Octets(vec![1, 2, 3]),
        ] {
            assert_eq!(decode_value(&encode_value(&value)).unwrap(), value);
        }
        assert!(decode_value(&Tlv::null()).is_err());
        assert!(decode_min_max(&Tlv::utf8("nope")).is_err());
    }
}
