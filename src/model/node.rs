//! Stored graph element.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{PropertyMap, Value};

/// Opaque storage identifier.
///
/// Distinct from `uuid`: a logical element keeps its `uuid` across records
/// (e.g. through a kind change), while every stored record gets a fresh id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u64);

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Labels marking the role a stored element plays in the versioned graph.
pub mod labels {
    pub const NODE: &str = "Node";
    pub const ATTRIBUTE: &str = "Attribute";
    pub const ATTRIBUTE_VALUE: &str = "AttributeValue";
    pub const BOOLEAN: &str = "Boolean";
    pub const ROOT: &str = "Root";
    pub const SCHEMA_NODE: &str = "SchemaNode";
}

/// A stored element of the versioned graph.
///
/// Data nodes, attributes, attribute values, boolean flag nodes, schema
/// nodes and the root anchor are all stored this way; the role lives in
/// `labels` and the payload in `properties`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    /// Logical identity, stable across re-labelings.
    pub uuid: Uuid,
    pub labels: Vec<String>,
    pub properties: PropertyMap,
}

impl Node {
    pub fn new(id: NodeId, uuid: Uuid) -> Self {
        Self {
            id,
            uuid,
            labels: Vec::new(),
            properties: PropertyMap::new(),
        }
    }

    pub fn with_labels(mut self, labels: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.labels = labels.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn has_label(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l == label)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }

    /// The `kind` property of a data node, if present.
    pub fn kind(&self) -> Option<&str> {
        self.get("kind").and_then(Value::as_str)
    }

    /// The `name` property, used by attributes and schema nodes.
    pub fn name(&self) -> Option<&str> {
        self.get("name").and_then(Value::as_str)
    }
}
