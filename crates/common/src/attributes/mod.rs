// Attribute pool and attribute-span encoding.

mod encoder;
mod pool;

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::changeset::ChangesetError;

pub use encoder::{encode_spans, AttributeSpan};
pub use pool::{AttributePool, PoolSnapshot};

/// Dense pool-local id of one `(key, value)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttributeId(u32);

impl AttributeId {
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    pub const fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for AttributeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "*{}", self.0)
    }
}

/// A formatting attribute. Serialized as a `[key, value]` pair; an empty
/// value clears the key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "(String, String)", into = "(String, String)")]
pub struct Attribute {
    pub key: String,
    pub value: String,
}

impl Attribute {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self { key: key.into(), value: value.into() }
    }

    pub fn is_clear(&self) -> bool {
        self.value.is_empty()
    }
}

impl From<(String, String)> for Attribute {
    fn from((key, value): (String, String)) -> Self {
        Self { key, value }
    }
}

impl From<Attribute> for (String, String) {
    fn from(attribute: Attribute) -> Self {
        (attribute.key, attribute.value)
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AttributeError {
    #[error("attribute id {0} was never allocated by this pool")]
    UnknownAttributeId(AttributeId),

    #[error("spans cover {actual} characters but the document has {expected}")]
    SpanCoverageMismatch { expected: usize, actual: usize },

    #[error("invalid attribute pool snapshot: {0}")]
    InvalidSnapshot(String),

    #[error(transparent)]
    Changeset(#[from] ChangesetError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attribute_serializes_as_a_pair() {
        let attribute = Attribute::new("color", "red");
        let json = serde_json::to_string(&attribute).unwrap();
        assert_eq!(json, r#"["color","red"]"#);
        assert_eq!(serde_json::from_str::<Attribute>(&json).unwrap(), attribute);
    }

    #[test]
    fn attribute_id_is_a_bare_number_on_the_wire() {
        assert_eq!(serde_json::to_string(&AttributeId::new(7)).unwrap(), "7");
        assert_eq!(AttributeId::new(7).to_string(), "*7");
    }
}
