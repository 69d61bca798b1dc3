//! Lenient decoding of the JSON wire form.
//!
//! Decoding never fails as a whole because of one bad node: an object with an
//! unknown or missing `type`, a payload that does not fit its tag, or a child
//! that is neither a string nor an object is dropped together with its subtree,
//! and the drop is reported alongside the decoded tree.

use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};

use super::{DocItem, DocNode, TypeTag};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("unknown node type `{0}`")]
    UnknownType(String),
    #[error("node has no string `type` field")]
    MissingType,
    #[error("invalid variant for `{tag}`: {message}")]
    InvalidVariant { tag: TypeTag, message: String },
    #[error("expected a string or an object, found {0}")]
    UnexpectedValue(&'static str),
}

/// A node skipped during decoding. `path` holds child indices in the input,
/// from the decoded root down to the dropped node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DroppedNode {
    pub path: Vec<usize>,
    pub error: DecodeError,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoded {
    /// `None` only when the top-level value itself was dropped.
    pub item: Option<DocItem>,
    pub dropped: Vec<DroppedNode>,
}

impl Decoded {
    pub fn is_clean(&self) -> bool {
        self.dropped.is_empty()
    }
}

/// Decodes a wire value, collecting every dropped node.
pub fn decode_lenient(value: &Value) -> Decoded {
    let mut dropped = Vec::new();
    let mut path = Vec::new();
    let item = match decode_item(value, &mut path, &mut dropped) {
        Ok(item) => Some(item),
        Err(error) => {
            tracing::warn!(%error, "dropping top-level node");
            dropped.push(DroppedNode {
                path: Vec::new(),
                error,
            });
            None
        }
    };
    Decoded { item, dropped }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn decode_item(
    value: &Value,
    path: &mut Vec<usize>,
    dropped: &mut Vec<DroppedNode>,
) -> Result<DocItem, DecodeError> {
    match value {
        Value::String(text) => Ok(DocItem::Text(text.clone())),
        Value::Object(map) => decode_node(map, path, dropped).map(DocItem::Node),
        other => Err(DecodeError::UnexpectedValue(value_kind(other))),
    }
}

fn decode_node(
    map: &Map<String, Value>,
    path: &mut Vec<usize>,
    dropped: &mut Vec<DroppedNode>,
) -> Result<DocNode, DecodeError> {
    let tag: TypeTag = match map.get("type") {
        Some(Value::String(name)) => name.parse()?,
        _ => return Err(DecodeError::MissingType),
    };
    let variant = tag
        .spec()
        .payload
        .decode(map.get("variant"))
        .map_err(|err| DecodeError::InvalidVariant {
            tag,
            message: err.to_string(),
        })?;

    let mut children = Vec::new();
    if let Some(Value::Array(items)) = map.get("children") {
        for (index, child) in items.iter().enumerate() {
            path.push(index);
            match decode_item(child, path, dropped) {
                Ok(item) => children.push(item),
                Err(error) => {
                    tracing::warn!(%error, path = ?path, "dropping node");
                    dropped.push(DroppedNode {
                        path: path.clone(),
                        error,
                    });
                }
            }
            path.pop();
        }
    }

    Ok(DocNode {
        tag,
        variant,
        children,
    })
}

impl TryFrom<Value> for DocItem {
    type Error = DecodeError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        decode_item(&value, &mut Vec::new(), &mut Vec::new())
    }
}

impl TryFrom<Value> for DocNode {
    type Error = DecodeError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(map) => decode_node(&map, &mut Vec::new(), &mut Vec::new()),
            other => Err(DecodeError::UnexpectedValue(value_kind(&other))),
        }
    }
}

impl<'de> Deserialize<'de> for DocItem {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        DocItem::try_from(value).map_err(serde::de::Error::custom)
    }
}

impl<'de> Deserialize<'de> for DocNode {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        DocNode::try_from(value).map_err(serde::de::Error::custom)
    }
}
