//! Messages as they are sent to and received from a queue.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Declared type of a message attribute, mirroring the SQS data types.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq, Deserialize, Serialize)]
pub enum AttributeDataType {
    #[default]
    String,
    Number,
    Binary,
}

impl AttributeDataType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "String",
            Self::Number => "Number",
            Self::Binary => "Binary",
        }
    }

    /// Parses an SQS data type, ignoring any custom suffix such as the
    /// `.uuid` in `String.uuid`.
    ///
    /// Unknown types are treated as strings.
    pub fn from_sqs(data_type: &str) -> Self {
        match data_type.split('.').next().unwrap_or_default() {
            "Number" => Self::Number,
            "Binary" => Self::Binary,
            _ => Self::String,
        }
    }
}

/// A typed custom attribute value.
#[derive(Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct MessageAttribute {
    #[serde(rename = "StringValue")]
    pub value: String,
    pub data_type: AttributeDataType,
}

impl MessageAttribute {
    pub fn string(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            data_type: AttributeDataType::String,
        }
    }

    pub fn number(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            data_type: AttributeDataType::Number,
        }
    }
}

/// A single queue message.
///
/// The identifier only has to be unique within one [`Batch`][crate::Batch];
/// the queue assigns its own message id on send.
#[derive(Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Message {
    id: String,
    #[serde(rename = "MessageBody")]
    body: String,
    #[serde(rename = "MessageAttributes", default)]
    attributes: BTreeMap<String, MessageAttribute>,
}

impl Message {
    pub fn new(id: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            body: body.into(),
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_attribute(mut self, name: impl Into<String>, attribute: MessageAttribute) -> Self {
        self.attributes.insert(name.into(), attribute);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn attributes(&self) -> &BTreeMap<String, MessageAttribute> {
        &self.attributes
    }

    pub fn attribute(&self, name: &str) -> Option<&MessageAttribute> {
        self.attributes.get(name)
    }

    /// Returns the value of the attribute `name`, if present.
    pub fn attribute_value(&self, name: &str) -> Option<&str> {
        self.attribute(name).map(|a| a.value.as_str())
    }
}
