//! # Logical Schema
//!
//! Descriptions of node kinds, their attributes and relationships. The
//! schema itself is stored in the graph as versioned elements (SchemaNode
//! records), which is what makes schema changes transactional and
//! branch-aware like any other mutation; the types here are the in-memory
//! form migrations are constructed from.

use serde::{Deserialize, Serialize};

use crate::model::{Direction, Value};
use crate::{Error, Result};

// ============================================================================
// Branch support
// ============================================================================

/// How an element participates in branching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BranchSupport {
    /// Versioned per-branch; the normal case.
    Aware,
    /// Shared by all branches; visible everywhere.
    Agnostic,
    /// Pinned to the branch that created it; never propagates defaults
    /// across branches.
    Local,
}

impl BranchSupport {
    pub fn as_str(&self) -> &'static str {
        match self {
            BranchSupport::Aware => "aware",
            BranchSupport::Agnostic => "agnostic",
            BranchSupport::Local => "local",
        }
    }
}

// ============================================================================
// Schema elements
// ============================================================================

/// Schema of one attribute on a node kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeSchema {
    pub name: String,
    /// Value kind, e.g. `"Text"`, `"Number"`, `"Boolean"`.
    pub kind: String,
    #[serde(default)]
    pub default_value: Option<serde_json::Value>,
    pub branch: BranchSupport,
    #[serde(default)]
    pub optional: bool,
}

impl AttributeSchema {
    pub fn new(name: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
            default_value: None,
            branch: BranchSupport::Aware,
            optional: false,
        }
    }

    pub fn with_default(mut self, value: serde_json::Value) -> Self {
        self.default_value = Some(value);
        self
    }

    pub fn with_branch(mut self, branch: BranchSupport) -> Self {
        self.branch = branch;
        self
    }

    /// The stored default: the configured value, or the NULL sentinel.
    pub fn default_as_value(&self) -> Value {
        self.default_value.clone().map(Value::from).unwrap_or(Value::Null)
    }
}

/// Schema of one relationship on a node kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationshipSchema {
    pub name: String,
    /// Stable relationship identifier, shared by both ends.
    pub identifier: String,
    /// Kind of the peer node.
    pub peer: String,
    pub direction: Direction,
    pub branch: BranchSupport,
}

/// Schema of a node kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSchema {
    pub namespace: String,
    pub kind: String,
    pub branch: BranchSupport,
    #[serde(default)]
    pub attributes: Vec<AttributeSchema>,
    #[serde(default)]
    pub relationships: Vec<RelationshipSchema>,
}

impl NodeSchema {
    pub fn new(namespace: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            kind: kind.into(),
            branch: BranchSupport::Aware,
            attributes: Vec::new(),
            relationships: Vec::new(),
        }
    }

    pub fn with_attribute(mut self, attribute: AttributeSchema) -> Self {
        self.attributes.push(attribute);
        self
    }

    pub fn attribute(&self, name: &str) -> Option<&AttributeSchema> {
        self.attributes.iter().find(|a| a.name == name)
    }

    pub fn relationship(&self, name: &str) -> Option<&RelationshipSchema> {
        self.relationships.iter().find(|r| r.name == name)
    }
}

// ============================================================================
// Schema path
// ============================================================================

/// Pointer to the field a schema change applies to: which field on which
/// kind changed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaPath {
    /// Node kind the change applies to, e.g. `"TestCar"`.
    pub kind: String,
    /// Attribute or relationship name, when the change targets a field.
    pub field_name: Option<String>,
}

impl SchemaPath {
    pub fn kind_only(kind: impl Into<String>) -> Self {
        Self { kind: kind.into(), field_name: None }
    }

    pub fn field(kind: impl Into<String>, field_name: impl Into<String>) -> Self {
        Self { kind: kind.into(), field_name: Some(field_name.into()) }
    }

    /// The field name, or an eager error for paths that require one.
    ///
    /// Raised at migration-construction time, before any I/O, so a
    /// malformed migration never reaches a transaction.
    pub fn require_field(&self) -> Result<&str> {
        self.field_name
            .as_deref()
            .ok_or_else(|| Error::SchemaPath(format!("field_name is not defined on {}", self.kind)))
    }

    /// Resolve the attribute this path names on `schema`, eagerly.
    pub fn resolve_attribute<'a>(&self, schema: &'a NodeSchema) -> Result<&'a AttributeSchema> {
        let field = self.require_field()?;
        schema.attribute(field).ok_or_else(|| {
            Error::SchemaPath(format!(
                "attribute {field} is not defined on schema {}{}",
                schema.namespace, schema.kind
            ))
        })
    }
}
