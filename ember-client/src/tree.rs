//! Local mirror of the remote Ember+ tree
//!
//! Entries live in an arena keyed by numeric path; a node stores the set
//! of child numbers, not child pointers. An entry's path is assigned once
//! at creation and never changes; a changed identity means the entry is
//! torn down and recreated by the device.

use crate::error::{EmberError, EmberResult};
use ember_asn1::{
    GlowNodeContents, GlowParameterContents, ParameterAccess, ParameterType, StreamDescription,
    StringIntegerPair,
};
use ember_core::{MinMax, PathKey, Value};
use std::collections::BTreeSet;

/// Observable property of a node or parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Property {
    Identifier,
    Description,
    IsRoot,
    IsOnline,
    Value,
    Minimum,
    Maximum,
    Access,
    Format,
    Enumeration,
    Factor,
    Formula,
    Step,
    Default,
    Type,
    StreamIdentifier,
    EnumMap,
    StreamDescriptor,
}

/// A property's current value, as handed to observer callbacks.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    String(String),
    Bool(bool),
    Integer(i64),
    Value(Value),
    MinMax(MinMax),
    Access(ParameterAccess),
    Type(ParameterType),
    EnumMap(Vec<StringIntegerPair>),
    StreamDescriptor(StreamDescription),
    /// The property has no value, e.g. an effective enum lookup out of
    /// range.
    None,
}

/// An entry of the tree mirror.
#[derive(Debug)]
pub enum TreeEntry {
    Node(NodeEntry),
    Parameter(ParameterEntry),
}

impl TreeEntry {
    pub fn path(&self) -> &PathKey {
        match self {
            TreeEntry::Node(node) => &node.path,
            TreeEntry::Parameter(parameter) => &parameter.path,
        }
    }

    pub fn identifier(&self) -> Option<&str> {
        match self {
            TreeEntry::Node(node) => node.identifier.as_deref(),
            TreeEntry::Parameter(parameter) => parameter.identifier.as_deref(),
        }
    }

    pub fn as_node(&self) -> Option<&NodeEntry> {
        match self {
            TreeEntry::Node(node) => Some(node),
            TreeEntry::Parameter(_) => None,
        }
    }

    pub fn as_node_mut(&mut self) -> Option<&mut NodeEntry> {
        match self {
            TreeEntry::Node(node) => Some(node),
            TreeEntry::Parameter(_) => None,
        }
    }

    pub fn as_parameter(&self) -> Option<&ParameterEntry> {
        match self {
            TreeEntry::Node(_) => None,
            TreeEntry::Parameter(parameter) => Some(parameter),
        }
    }

    pub fn as_parameter_mut(&mut self) -> Option<&mut ParameterEntry> {
        match self {
            TreeEntry::Node(_) => None,
            TreeEntry::Parameter(parameter) => Some(parameter),
        }
    }
}

/// An internal node: the root (empty path) or any node below it.
#[derive(Debug)]
pub struct NodeEntry {
    pub(crate) path: PathKey,
    pub(crate) identifier: Option<String>,
    pub(crate) description: Option<String>,
    pub(crate) is_root: Option<bool>,
    pub(crate) is_online: bool,
    /// Numbers of the children received so far, sparse and ordered.
    pub(crate) children: BTreeSet<u32>,
    pub(crate) children_received: bool,
}

impl NodeEntry {
    pub(crate) fn root() -> Self {
        Self::new(PathKey::root(), None)
    }

    pub(crate) fn new(path: PathKey, contents: Option<&GlowNodeContents>) -> Self {
        let mut node = Self {
            path,
            identifier: None,
            description: None,
            is_root: None,
            is_online: true,
            children: BTreeSet::new(),
            children_received: false,
        };
        if let Some(contents) = contents {
            node.update_from(contents);
        }
        node
    }

    pub fn path(&self) -> &PathKey {
        &self.path
    }

    pub fn identifier(&self) -> Option<&str> {
        self.identifier.as_deref()
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn is_root(&self) -> bool {
        self.is_root.unwrap_or(false)
    }

    /// A node never reported offline counts as online.
    pub fn is_online(&self) -> bool {
        self.is_online
    }

    pub fn children(&self) -> impl Iterator<Item = u32> + '_ {
        self.children.iter().copied()
    }

    /// Whether a directory fetch for this node has completed.
    pub fn children_received(&self) -> bool {
        self.children_received
    }

    /// Apply a contents update, returning the fields that changed.
    pub(crate) fn update_from(
        &mut self,
        contents: &GlowNodeContents,
    ) -> Vec<(Property, PropertyValue)> {
        let mut changed = Vec::new();

        if let Some(identifier) = &contents.identifier {
            if self.identifier.as_ref() != Some(identifier) {
                self.identifier = Some(identifier.clone());
                changed.push((Property::Identifier, PropertyValue::String(identifier.clone())));
            }
        }
        if let Some(description) = &contents.description {
            if self.description.as_ref() != Some(description) {
                self.description = Some(description.clone());
                changed.push((
                    Property::Description,
                    PropertyValue::String(description.clone()),
                ));
            }
        }
        if let Some(is_root) = contents.is_root {
            if self.is_root != Some(is_root) {
                self.is_root = Some(is_root);
                changed.push((Property::IsRoot, PropertyValue::Bool(is_root)));
            }
        }
        if let Some(is_online) = contents.is_online {
            if self.is_online != is_online {
                self.is_online = is_online;
                changed.push((Property::IsOnline, PropertyValue::Bool(is_online)));
            }
        }

        changed
    }
}

/// A leaf parameter.
#[derive(Debug)]
pub struct ParameterEntry {
    pub(crate) path: PathKey,
    pub(crate) identifier: Option<String>,
    pub(crate) description: Option<String>,
    pub(crate) value: Option<Value>,
    pub(crate) minimum: Option<MinMax>,
    pub(crate) maximum: Option<MinMax>,
    pub(crate) access: Option<ParameterAccess>,
    pub(crate) format: Option<String>,
    pub(crate) enumeration: Option<String>,
    pub(crate) factor: Option<i64>,
    pub(crate) is_online: bool,
    pub(crate) formula: Option<String>,
    pub(crate) step: Option<i64>,
    pub(crate) default: Option<Value>,
    pub(crate) parameter_type: Option<ParameterType>,
    pub(crate) stream_identifier: Option<i64>,
    pub(crate) enum_map: Option<Vec<StringIntegerPair>>,
    pub(crate) stream_descriptor: Option<StreamDescription>,
}

impl ParameterEntry {
    pub(crate) fn new(path: PathKey, contents: Option<&GlowParameterContents>) -> Self {
        let mut parameter = Self {
            path,
            identifier: None,
            description: None,
            value: None,
            minimum: None,
            maximum: None,
            access: None,
            format: None,
            enumeration: None,
            factor: None,
            is_online: true,
            formula: None,
            step: None,
            default: None,
            parameter_type: None,
            stream_identifier: None,
            enum_map: None,
            stream_descriptor: None,
        };
        if let Some(contents) = contents {
            parameter.update_from(contents);
        }
        parameter
    }

    pub fn path(&self) -> &PathKey {
        &self.path
    }

    pub fn identifier(&self) -> Option<&str> {
        self.identifier.as_deref()
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn value(&self) -> Option<&Value> {
        self.value.as_ref()
    }

    pub fn minimum(&self) -> Option<&MinMax> {
        self.minimum.as_ref()
    }

    pub fn maximum(&self) -> Option<&MinMax> {
        self.maximum.as_ref()
    }

    pub fn access(&self) -> Option<ParameterAccess> {
        self.access
    }

    pub fn format(&self) -> Option<&str> {
        self.format.as_deref()
    }

    pub fn enumeration(&self) -> Option<&str> {
        self.enumeration.as_deref()
    }

    pub fn factor(&self) -> Option<i64> {
        self.factor
    }

    pub fn is_online(&self) -> bool {
        self.is_online
    }

    pub fn formula(&self) -> Option<&str> {
        self.formula.as_deref()
    }

    pub fn step(&self) -> Option<i64> {
        self.step
    }

    pub fn default(&self) -> Option<&Value> {
        self.default.as_ref()
    }

    pub fn parameter_type(&self) -> Option<ParameterType> {
        self.parameter_type
    }

    pub fn stream_identifier(&self) -> Option<i64> {
        self.stream_identifier
    }

    pub fn enum_map(&self) -> Option<&[StringIntegerPair]> {
        self.enum_map.as_deref()
    }

    pub fn stream_descriptor(&self) -> Option<&StreamDescription> {
        self.stream_descriptor.as_ref()
    }

    /// The raw value with the parameter's transform applied: scaled down
    /// by `factor`, or looked up in the `enumeration` line list. Absent
    /// raw values fall back to the untransformed default.
    pub fn effective_value(&self) -> Option<Value> {
        match &self.value {
            Some(value) => self.to_effective(value),
            None => self.default.clone(),
        }
    }

    /// The minimum with the same transform applied.
    pub fn effective_minimum(&self) -> Option<Value> {
        let minimum = self.minimum.as_ref()?;
        self.to_effective(&minimum.to_value())
    }

    /// The maximum with the same transform applied.
    pub fn effective_maximum(&self) -> Option<Value> {
        let maximum = self.maximum.as_ref()?;
        self.to_effective(&maximum.to_value())
    }

    pub(crate) fn to_effective(&self, value: &Value) -> Option<Value> {
        if let Some(factor) = self.factor {
            if factor != 0 {
                return Some(Value::Real(value.as_f64()? / factor as f64));
            }
        }

        if let Some(enumeration) = &self.enumeration {
            let index = usize::try_from(value.as_i64()?).ok()?;
            return enumeration
                .split('\n')
                .nth(index)
                .map(|name| Value::String(name.to_string()));
        }

        Some(value.clone())
    }

    /// The inverse transform: scale up by `factor` (integral results
    /// become INTEGER on the wire), or look an enumeration name up.
    pub fn from_effective_value(&self, value: &Value) -> EmberResult<Value> {
        if let Some(factor) = self.factor {
            if factor != 0 {
                let scaled = value.as_f64().ok_or_else(|| {
                    EmberError::UsageError(format!(
                        "Expected a numeric value for {}",
                        self.path
                    ))
                })? * factor as f64;

                return Ok(if scaled.fract() == 0.0 {
                    Value::Integer(scaled as i64)
                } else {
                    Value::Real(scaled)
                });
            }
        }

        if let Some(enumeration) = &self.enumeration {
            let name = value.as_str().ok_or_else(|| {
                EmberError::UsageError(format!(
                    "Expected an enumeration name for {}",
                    self.path
                ))
            })?;

            let index = enumeration
                .split('\n')
                .position(|entry| entry == name)
                .ok_or_else(|| {
                    EmberError::UsageError(format!("Unknown enum entry: {}", name))
                })?;

            return Ok(Value::Integer(index as i64));
        }

        Ok(value.clone())
    }

    /// Apply a contents update, returning the fields that changed.
    pub(crate) fn update_from(
        &mut self,
        contents: &GlowParameterContents,
    ) -> Vec<(Property, PropertyValue)> {
        let mut changed = Vec::new();

        macro_rules! apply {
            ($field:ident, $property:ident, $variant:ident) => {
                if let Some(value) = &contents.$field {
                    if self.$field.as_ref() != Some(value) {
                        self.$field = Some(value.clone());
                        changed.push((
                            Property::$property,
                            PropertyValue::$variant(value.clone()),
                        ));
                    }
                }
            };
        }
        macro_rules! apply_copy {
            ($field:ident, $property:ident, $variant:ident) => {
                if let Some(value) = contents.$field {
                    if self.$field != Some(value) {
                        self.$field = Some(value);
                        changed.push((Property::$property, PropertyValue::$variant(value)));
                    }
                }
            };
        }

        apply!(identifier, Identifier, String);
        apply!(description, Description, String);
        apply!(value, Value, Value);
        apply!(minimum, Minimum, MinMax);
        apply!(maximum, Maximum, MinMax);
        apply_copy!(access, Access, Access);
        apply!(format, Format, String);
        apply!(enumeration, Enumeration, String);
        apply_copy!(factor, Factor, Integer);

        if let Some(is_online) = contents.is_online {
            if self.is_online != is_online {
                self.is_online = is_online;
                changed.push((Property::IsOnline, PropertyValue::Bool(is_online)));
            }
        }

        apply!(formula, Formula, String);
        apply_copy!(step, Step, Integer);
        apply!(default, Default, Value);
        apply_copy!(parameter_type, Type, Type);
        apply_copy!(stream_identifier, StreamIdentifier, Integer);
        apply!(enum_map, EnumMap, EnumMap);
        apply_copy!(stream_descriptor, StreamDescriptor, StreamDescriptor);

        changed
    }

    /// Overwrite the value unconditionally, as stream entries do.
    pub(crate) fn update_value(&mut self, value: Value) -> (Property, PropertyValue) {
        self.value = Some(value.clone());
        (Property::Value, PropertyValue::Value(value))
    }
}
