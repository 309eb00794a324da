//! Glow schema types
//!
//! The Ember+ application layer: typed structs and choices over the TLV
//! engine. Struct fields are positional; a present field is encoded as a
//! context-constructed wrapper whose tag number is the field position.
//! Decoding tolerates any subset and order of fields and skips unknown
//! context tag numbers, so newer providers stay readable.

mod contents;
mod elements;
mod types;

pub use contents::{GlowNodeContents, GlowParameterContents};
pub use elements::{
    GlowCommand, GlowElement, GlowNode, GlowParameter, GlowQualifiedNode, GlowQualifiedParameter,
    GlowRoot, GlowRootElement, GlowStreamEntry,
};
pub use types::{
    CommandType, ParameterAccess, ParameterType, StreamDescription, StreamFormat,
    StringIntegerPair,
};

use crate::ber::{Tlv, TlvValue};
use crate::error::{EmberError, EmberResult};
use ember_core::PathKey;

/// Application tag numbers of the Glow types
pub const APP_ROOT: u32 = 0;
pub const APP_PARAMETER: u32 = 1;
pub const APP_COMMAND: u32 = 2;
pub const APP_NODE: u32 = 3;
pub const APP_ELEMENT_COLLECTION: u32 = 4;
pub const APP_STREAM_ENTRY: u32 = 5;
pub const APP_STREAM_COLLECTION: u32 = 6;
pub const APP_STRING_INTEGER_PAIR: u32 = 7;
pub const APP_STRING_INTEGER_COLLECTION: u32 = 8;
pub const APP_QUALIFIED_PARAMETER: u32 = 9;
pub const APP_QUALIFIED_NODE: u32 = 10;
pub const APP_ROOT_ELEMENT_COLLECTION: u32 = 11;
pub const APP_STREAM_DESCRIPTION: u32 = 12;

/// Application-tagged struct: present fields become context wrappers
/// directly under the application tag, numbered by position.
pub(crate) fn app_struct(id: u32, fields: Vec<Option<Tlv>>) -> Tlv {
    let children = fields
        .into_iter()
        .enumerate()
        .filter_map(|(position, field)| field.map(|tlv| Tlv::context(position as u32, tlv)))
        .collect();

    Tlv::application(id, children)
}

/// Validate the whole identifier of an application-tagged value.
pub(crate) fn expect_app(tlv: &Tlv, id: u32) -> EmberResult<()> {
    if tlv.application_id()? != id {
        return Err(EmberError::MalformedEncoding(format!(
            "Expected application {}, got {}",
            id, tlv.tag.number
        )));
    }
    Ok(())
}

/// Collect the context-tagged fields of a struct TLV as (position, inner)
/// pairs in wire order. Every child must be a context wrapper with exactly
/// one inner TLV.
pub(crate) fn struct_fields(tlv: &Tlv) -> EmberResult<Vec<(u32, &Tlv)>> {
    let mut fields = Vec::new();

    for child in tlv.children()? {
        fields.push((child.context_number()?, child.single_child()?));
    }

    Ok(fields)
}

/// Unwrap the elements of a sequence-of collection, preserving wire order.
/// Wrappers may carry any context tag number.
pub(crate) fn sequence_elements(tlv: &Tlv) -> EmberResult<Vec<&Tlv>> {
    let mut elements = Vec::new();

    for child in tlv.children()? {
        child.context_number()?;
        elements.push(child.single_child()?);
    }

    Ok(elements)
}

/// Wrap collection elements for encoding.
pub(crate) fn wrap_sequence_elements(elements: Vec<Tlv>) -> Vec<Tlv> {
    elements
        .into_iter()
        .map(|element| Tlv::context(0, element))
        .collect()
}

pub(crate) fn type_mismatch(expected: &str, tlv: &Tlv) -> EmberError {
    EmberError::MalformedEncoding(format!(
        "Expected {} field, got tag {:?}",
        expected, tlv.tag
    ))
}

pub(crate) fn expect_integer(tlv: &Tlv) -> EmberResult<i64> {
    match tlv.value {
        TlvValue::Integer(value) if tlv.is_universal() => Ok(value),
        _ => Err(type_mismatch("INTEGER", tlv)),
    }
}

pub(crate) fn expect_utf8(tlv: &Tlv) -> EmberResult<String> {
    match &tlv.value {
        TlvValue::Utf8String(text) if tlv.is_universal() => Ok(text.clone()),
        _ => Err(type_mismatch("UTF8STRING", tlv)),
    }
}

pub(crate) fn expect_boolean(tlv: &Tlv) -> EmberResult<bool> {
    match tlv.value {
        TlvValue::Boolean(value) if tlv.is_universal() => Ok(value),
        _ => Err(type_mismatch("BOOLEAN", tlv)),
    }
}

/// Element numbers are 1-based sibling positions and must fit a u32.
pub(crate) fn expect_number(tlv: &Tlv) -> EmberResult<u32> {
    let value = expect_integer(tlv)?;

    u32::try_from(value).map_err(|_| {
        EmberError::MalformedEncoding(format!("Element number out of range: {}", value))
    })
}

pub(crate) fn expect_path(tlv: &Tlv) -> EmberResult<PathKey> {
    match &tlv.value {
        TlvValue::RelativeOid(components) if tlv.is_universal() => {
            Ok(PathKey::new(components))
        }
        _ => Err(type_mismatch("RELATIVE-OID", tlv)),
    }
}
