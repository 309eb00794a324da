//! Glow elements and the top-level Root choice

use crate::ber::Tlv;
use crate::error::{EmberError, EmberResult};
use crate::glow::{
    app_struct, expect_app, expect_integer, expect_number, expect_path, sequence_elements,
    struct_fields, wrap_sequence_elements, CommandType, GlowNodeContents, GlowParameterContents,
    APP_COMMAND, APP_ELEMENT_COLLECTION, APP_NODE, APP_PARAMETER, APP_QUALIFIED_NODE,
    APP_QUALIFIED_PARAMETER, APP_ROOT, APP_ROOT_ELEMENT_COLLECTION, APP_STREAM_COLLECTION,
    APP_STREAM_ENTRY,
};
use crate::glow::types::{decode_value, encode_value};
use ember_core::{PathKey, Value};

/// A command addressed to the element it is nested under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlowCommand {
    pub number: CommandType,
    pub options: Option<i64>,
}

impl GlowCommand {
    pub fn new(number: CommandType) -> Self {
        GlowCommand {
            number,
            options: None,
        }
    }

    pub fn encode(&self) -> Tlv {
        app_struct(
            APP_COMMAND,
            vec![
                Some(Tlv::integer(self.number.to_wire())),
                self.options.map(Tlv::integer),
            ],
        )
    }

    pub fn decode(tlv: &Tlv) -> EmberResult<Self> {
        expect_app(tlv, APP_COMMAND)?;

        let mut number = None;
        let mut options = None;

        for (position, field) in struct_fields(tlv)? {
            match position {
                0 => number = Some(CommandType::from_wire(expect_integer(field)?)?),
                1 => options = Some(expect_integer(field)?),
                _ => {}
            }
        }

        let number = number.ok_or_else(|| {
            EmberError::MalformedEncoding("Command without a number".to_string())
        })?;

        Ok(GlowCommand { number, options })
    }
}

/// A positional node element: number relative to its parent.
#[derive(Debug, Clone, PartialEq)]
pub struct GlowNode {
    pub number: u32,
    pub contents: Option<GlowNodeContents>,
    pub children: Option<Vec<GlowElement>>,
}

impl GlowNode {
    pub fn encode(&self) -> Tlv {
        app_struct(
            APP_NODE,
            vec![
                Some(Tlv::integer(self.number as i64)),
                self.contents.as_ref().map(GlowNodeContents::encode),
                self.children.as_deref().map(encode_element_collection),
            ],
        )
    }

    pub fn decode(tlv: &Tlv) -> EmberResult<Self> {
        expect_app(tlv, APP_NODE)?;

        let mut number = None;
        let mut contents = None;
        let mut children = None;

        for (position, field) in struct_fields(tlv)? {
            match position {
                0 => number = Some(expect_number(field)?),
                1 => contents = Some(GlowNodeContents::decode(field)?),
                2 => children = Some(decode_element_collection(field)?),
                _ => {}
            }
        }

        let number = number.ok_or_else(|| {
            EmberError::MalformedEncoding("Node without a number".to_string())
        })?;

        Ok(GlowNode {
            number,
            contents,
            children,
        })
    }
}

/// A positional parameter element.
#[derive(Debug, Clone, PartialEq)]
pub struct GlowParameter {
    pub number: u32,
    pub contents: Option<GlowParameterContents>,
    pub children: Option<Vec<GlowElement>>,
}

impl GlowParameter {
    pub fn encode(&self) -> Tlv {
        app_struct(
            APP_PARAMETER,
            vec![
                Some(Tlv::integer(self.number as i64)),
                self.contents.as_ref().map(GlowParameterContents::encode),
                self.children.as_deref().map(encode_element_collection),
            ],
        )
    }

    pub fn decode(tlv: &Tlv) -> EmberResult<Self> {
        expect_app(tlv, APP_PARAMETER)?;

        let mut number = None;
        let mut contents = None;
        let mut children = None;

        for (position, field) in struct_fields(tlv)? {
            match position {
                0 => number = Some(expect_number(field)?),
                1 => contents = Some(GlowParameterContents::decode(field)?),
                2 => children = Some(decode_element_collection(field)?),
                _ => {}
            }
        }

        let number = number.ok_or_else(|| {
            EmberError::MalformedEncoding("Parameter without a number".to_string())
        })?;

        Ok(GlowParameter {
            number,
            contents,
            children,
        })
    }
}

/// A node addressed by its absolute numeric path.
#[derive(Debug, Clone, PartialEq)]
pub struct GlowQualifiedNode {
    pub path: PathKey,
    pub contents: Option<GlowNodeContents>,
    pub children: Option<Vec<GlowElement>>,
}

impl GlowQualifiedNode {
    pub fn encode(&self) -> Tlv {
        app_struct(
            APP_QUALIFIED_NODE,
            vec![
                Some(Tlv::relative_oid(self.path.numbers().to_vec())),
                self.contents.as_ref().map(GlowNodeContents::encode),
                self.children.as_deref().map(encode_element_collection),
            ],
        )
    }

    pub fn decode(tlv: &Tlv) -> EmberResult<Self> {
        expect_app(tlv, APP_QUALIFIED_NODE)?;

        let mut path = None;
        let mut contents = None;
        let mut children = None;

        for (position, field) in struct_fields(tlv)? {
            match position {
                0 => path = Some(expect_path(field)?),
                1 => contents = Some(GlowNodeContents::decode(field)?),
                2 => children = Some(decode_element_collection(field)?),
                _ => {}
            }
        }

        let path = path.ok_or_else(|| {
            EmberError::MalformedEncoding("Qualified node without a path".to_string())
        })?;

        Ok(GlowQualifiedNode {
            path,
            contents,
            children,
        })
    }
}

/// A parameter addressed by its absolute numeric path.
#[derive(Debug, Clone, PartialEq)]
pub struct GlowQualifiedParameter {
    pub path: PathKey,
    pub contents: Option<GlowParameterContents>,
    pub children: Option<Vec<GlowElement>>,
}

impl GlowQualifiedParameter {
    pub fn encode(&self) -> Tlv {
        app_struct(
            APP_QUALIFIED_PARAMETER,
            vec![
                Some(Tlv::relative_oid(self.path.numbers().to_vec())),
                self.contents.as_ref().map(GlowParameterContents::encode),
                self.children.as_deref().map(encode_element_collection),
            ],
        )
    }

    pub fn decode(tlv: &Tlv) -> EmberResult<Self> {
        expect_app(tlv, APP_QUALIFIED_PARAMETER)?;

        let mut path = None;
        let mut contents = None;
        let mut children = None;

        for (position, field) in struct_fields(tlv)? {
            match position {
                0 => path = Some(expect_path(field)?),
                1 => contents = Some(GlowParameterContents::decode(field)?),
                2 => children = Some(decode_element_collection(field)?),
                _ => {}
            }
        }

        let path = path.ok_or_else(|| {
            EmberError::MalformedEncoding("Qualified parameter without a path".to_string())
        })?;

        Ok(GlowQualifiedParameter {
            path,
            contents,
            children,
        })
    }
}

/// A value update addressed by stream identifier.
#[derive(Debug, Clone, PartialEq)]
pub struct GlowStreamEntry {
    pub stream_identifier: i64,
    pub value: Value,
}

impl GlowStreamEntry {
    pub fn encode(&self) -> Tlv {
        app_struct(
            APP_STREAM_ENTRY,
            vec![
                Some(Tlv::integer(self.stream_identifier)),
                Some(encode_value(&self.value)),
            ],
        )
    }

    pub fn decode(tlv: &Tlv) -> EmberResult<Self> {
        expect_app(tlv, APP_STREAM_ENTRY)?;

        let mut stream_identifier = None;
        let mut value = None;

        for (position, field) in struct_fields(tlv)? {
            match position {
                0 => stream_identifier = Some(expect_integer(field)?),
                1 => value = Some(decode_value(field)?),
                _ => {}
            }
        }

        match (stream_identifier, value) {
            (Some(stream_identifier), Some(value)) => Ok(GlowStreamEntry {
                stream_identifier,
                value,
            }),
            _ => Err(EmberError::MalformedEncoding(
                "Incomplete stream entry".to_string(),
            )),
        }
    }
}

/// Element choice inside an element collection.
#[derive(Debug, Clone, PartialEq)]
pub enum GlowElement {
    Parameter(GlowParameter),
    Node(GlowNode),
    Command(GlowCommand),
}

impl GlowElement {
    pub fn encode(&self) -> Tlv {
        match self {
            GlowElement::Parameter(parameter) => parameter.encode(),
            GlowElement::Node(node) => node.encode(),
            GlowElement::Command(command) => command.encode(),
        }
    }

    pub fn decode(tlv: &Tlv) -> EmberResult<Self> {
        match tlv.application_id()? {
            APP_PARAMETER => Ok(GlowElement::Parameter(GlowParameter::decode(tlv)?)),
            APP_NODE => Ok(GlowElement::Node(GlowNode::decode(tlv)?)),
            APP_COMMAND => Ok(GlowElement::Command(GlowCommand::decode(tlv)?)),
            id => Err(EmberError::MalformedEncoding(format!(
                "Unexpected element type: application {}",
                id
            ))),
        }
    }
}

/// Element choice at the root, adding the path-qualified kinds.
#[derive(Debug, Clone, PartialEq)]
pub enum GlowRootElement {
    Parameter(GlowParameter),
    Node(GlowNode),
    Command(GlowCommand),
    QualifiedParameter(GlowQualifiedParameter),
    QualifiedNode(GlowQualifiedNode),
}

impl GlowRootElement {
    pub fn encode(&self) -> Tlv {
        match self {
            GlowRootElement::Parameter(parameter) => parameter.encode(),
            GlowRootElement::Node(node) => node.encode(),
            GlowRootElement::Command(command) => command.encode(),
            GlowRootElement::QualifiedParameter(parameter) => parameter.encode(),
            GlowRootElement::QualifiedNode(node) => node.encode(),
        }
    }

    pub fn decode(tlv: &Tlv) -> EmberResult<Self> {
        match tlv.application_id()? {
            APP_PARAMETER => Ok(GlowRootElement::Parameter(GlowParameter::decode(tlv)?)),
            APP_NODE => Ok(GlowRootElement::Node(GlowNode::decode(tlv)?)),
            APP_COMMAND => Ok(GlowRootElement::Command(GlowCommand::decode(tlv)?)),
            APP_QUALIFIED_PARAMETER => Ok(GlowRootElement::QualifiedParameter(
                GlowQualifiedParameter::decode(tlv)?,
            )),
            APP_QUALIFIED_NODE => Ok(GlowRootElement::QualifiedNode(
                GlowQualifiedNode::decode(tlv)?,
            )),
            id => Err(EmberError::MalformedEncoding(format!(
                "Unexpected root element type: application {}",
                id
            ))),
        }
    }
}

/// Top-level message payload: a collection of root elements or of stream
/// entries.
#[derive(Debug, Clone, PartialEq)]
pub enum GlowRoot {
    Elements(Vec<GlowRootElement>),
    Streams(Vec<GlowStreamEntry>),
}

impl GlowRoot {
    pub fn encode(&self) -> Tlv {
        let collection = match self {
            GlowRoot::Elements(elements) => Tlv::application(
                APP_ROOT_ELEMENT_COLLECTION,
                wrap_sequence_elements(
                    elements.iter().map(GlowRootElement::encode).collect(),
                ),
            ),
            GlowRoot::Streams(entries) => Tlv::application(
                APP_STREAM_COLLECTION,
                wrap_sequence_elements(entries.iter().map(GlowStreamEntry::encode).collect()),
            ),
        };

        Tlv::application(APP_ROOT, vec![collection])
    }

    pub fn decode(tlv: &Tlv) -> EmberResult<Self> {
        expect_app(tlv, APP_ROOT)?;
        let collection = tlv.single_child()?;

        match collection.application_id()? {
            APP_ROOT_ELEMENT_COLLECTION => {
                let mut elements = Vec::new();
                for element in sequence_elements(collection)? {
                    elements.push(GlowRootElement::decode(element)?);
                }
                Ok(GlowRoot::Elements(elements))
            }
            APP_STREAM_COLLECTION => {
                let mut entries = Vec::new();
                for entry in sequence_elements(collection)? {
                    entries.push(GlowStreamEntry::decode(entry)?);
                }
                Ok(GlowRoot::Streams(entries))
            }
            id => Err(EmberError::MalformedEncoding(format!(
                "Unexpected root collection: application {}",
                id
            ))),
        }
    }
}

fn encode_element_collection(children: &[GlowElement]) -> Tlv {
    Tlv::application(
        APP_ELEMENT_COLLECTION,
        wrap_sequence_elements(children.iter().map(GlowElement::encode).collect()),
    )
}

fn decode_element_collection(tlv: &Tlv) -> EmberResult<Vec<GlowElement>> {
    expect_app(tlv, APP_ELEMENT_COLLECTION)?;

    let mut elements = Vec::new();
    for element in sequence_elements(tlv)? {
        elements.push(GlowElement::decode(element)?);
    }

    Ok(elements)
}
