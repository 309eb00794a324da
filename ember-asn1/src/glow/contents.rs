//! Node and parameter contents sets
//!
//! Both are anonymous structs on the wire: a universal SET whose fields are
//! context-wrapped by position. Everything is optional; a provider sends
//! only what changed.

use crate::ber::Tlv;
use crate::error::EmberResult;
use crate::glow::types::{decode_min_max, decode_value, encode_min_max, encode_value};
use crate::glow::{
    expect_boolean, expect_integer, expect_utf8, sequence_elements, struct_fields,
    wrap_sequence_elements, ParameterAccess, ParameterType, StreamDescription,
    StringIntegerPair, APP_STRING_INTEGER_COLLECTION,
};
use ember_core::{MinMax, Value};

/// Contents set of a Node element.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GlowNodeContents {
    pub identifier: Option<String>,
    pub description: Option<String>,
    pub is_root: Option<bool>,
    pub is_online: Option<bool>,
}

impl GlowNodeContents {
    pub fn encode(&self) -> Tlv {
        Tlv::set(vec![
            self.identifier.as_ref().map(Tlv::utf8),
            self.description.as_ref().map(Tlv::utf8),
            self.is_root.map(Tlv::boolean),
            self.is_online.map(Tlv::boolean),
        ])
    }

    pub fn decode(tlv: &Tlv) -> EmberResult<Self> {
        let mut contents = GlowNodeContents::default();

        for (position, field) in struct_fields(tlv)? {
            match position {
                0 => contents.identifier = Some(expect_utf8(field)?),
                1 => contents.description = Some(expect_utf8(field)?),
                2 => contents.is_root = Some(expect_boolean(field)?),
                3 => contents.is_online = Some(expect_boolean(field)?),
                _ => {}
            }
        }

        Ok(contents)
    }
}

/// Contents set of a Parameter element, positions 0 through 16.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GlowParameterContents {
    pub identifier: Option<String>,
    pub description: Option<String>,
    pub value: Option<Value>,
    pub minimum: Option<MinMax>,
    pub maximum: Option<MinMax>,
    pub access: Option<ParameterAccess>,
    pub format: Option<String>,
    pub enumeration: Option<String>,
    pub factor: Option<i64>,
    pub is_online: Option<bool>,
    pub formula: Option<String>,
    pub step: Option<i64>,
    pub default: Option<Value>,
    pub parameter_type: Option<ParameterType>,
    pub stream_identifier: Option<i64>,
    pub enum_map: Option<Vec<StringIntegerPair>>,
    pub stream_descriptor: Option<StreamDescription>,
}

impl GlowParameterContents {
    /// Contents carrying only a value, as sent by `set_value`.
    pub fn with_value(value: Value) -> Self {
        GlowParameterContents {
            value: Some(value),
            ..Default::default()
        }
    }

    pub fn encode(&self) -> Tlv {
        Tlv::set(vec![
            self.identifier.as_ref().map(Tlv::utf8),
            self.description.as_ref().map(Tlv::utf8),
            self.value.as_ref().map(encode_value),
            self.minimum.as_ref().map(encode_min_max),
            self.maximum.as_ref().map(encode_min_max),
            self.access.map(|access| Tlv::integer(access.to_wire())),
            self.format.as_ref().map(Tlv::utf8),
            self.enumeration.as_ref().map(Tlv::utf8),
            self.factor.map(Tlv::integer),
            self.is_online.map(Tlv::boolean),
            self.formula.as_ref().map(Tlv::utf8),
            self.step.map(Tlv::integer),
            self.default.as_ref().map(encode_value),
            self.parameter_type
                .map(|kind| Tlv::integer(kind.to_wire())),
            self.stream_identifier.map(Tlv::integer),
            self.enum_map.as_ref().map(|pairs| {
                let elements = pairs.iter().map(StringIntegerPair::encode).collect();
                Tlv::application(
                    APP_STRING_INTEGER_COLLECTION,
                    wrap_sequence_elements(elements),
                )
            }),
            self.stream_descriptor
                .as_ref()
                .map(StreamDescription::encode),
        ])
    }

    pub fn decode(tlv: &Tlv) -> EmberResult<Self> {
        let mut contents = GlowParameterContents::default();

        for (position, field) in struct_fields(tlv)? {
            match position {
                0 => contents.identifier = Some(expect_utf8(field)?),
                1 => contents.description = Some(expect_utf8(field)?),
                2 => contents.value = Some(decode_value(field)?),
                3 => contents.minimum = Some(decode_min_max(field)?),
                4 => contents.maximum = Some(decode_min_max(field)?),
                5 => {
                    contents.access =
                        Some(ParameterAccess::from_wire(expect_integer(field)?)?)
                }
                6 => contents.format = Some(expect_utf8(field)?),
                7 => contents.enumeration = Some(expect_utf8(field)?),
                8 => contents.factor = Some(expect_integer(field)?),
                9 => contents.is_online = Some(expect_boolean(field)?),
                10 => contents.formula = Some(expect_utf8(field)?),
                11 => contents.step = Some(expect_integer(field)?),
                12 => contents.default = Some(decode_value(field)?),
                13 => {
                    contents.parameter_type =
                        Some(ParameterType::from_wire(expect_integer(field)?)?)
                }
                14 => contents.stream_identifier = Some(expect_integer(field)?),
                15 => {
                    let mut pairs = Vec::new();
                    for element in sequence_elements(field)? {
                        pairs.push(StringIntegerPair::decode(element)?);
                    }
                    contents.enum_map = Some(pairs);
                }
                16 => {
                    contents.stream_descriptor = Some(StreamDescription::decode(field)?)
                }
                _ => {}
            }
        }

        Ok(contents)
    }
}
