//! Versioned edge records — the fundamental unit of history.

use serde::{Deserialize, Serialize};

use super::Timestamp;
use crate::model::NodeId;

/// Opaque edge-record identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EdgeId(pub u64);

impl std::fmt::Display for EdgeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Traversal direction, relative to a node of interest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Outgoing,
    Incoming,
    Both,
}

/// The relationship vocabulary of the versioned graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EdgeKind {
    /// Node → Attribute ownership.
    HasAttribute,
    /// Attribute → AttributeValue.
    HasValue,
    /// Attribute → owner property node.
    HasOwner,
    /// Attribute → source property node.
    HasSource,
    /// Attribute → Boolean flag node.
    IsProtected,
    /// Attribute → Boolean flag node.
    IsVisible,
    /// Node → Root liveness anchor.
    IsPartOf,
    /// Node ↔ Node user-level relationship (via a relationship element).
    IsRelated,
}

impl EdgeKind {
    /// Canonical wire/storage form.
    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeKind::HasAttribute => "HAS_ATTRIBUTE",
            EdgeKind::HasValue => "HAS_VALUE",
            EdgeKind::HasOwner => "HAS_OWNER",
            EdgeKind::HasSource => "HAS_SOURCE",
            EdgeKind::IsProtected => "IS_PROTECTED",
            EdgeKind::IsVisible => "IS_VISIBLE",
            EdgeKind::IsPartOf => "IS_PART_OF",
            EdgeKind::IsRelated => "IS_RELATED",
        }
    }

    /// Every kind that can be incident to an `Attribute` element, with the
    /// direction as seen from the attribute. Used by attribute migrations to
    /// sweep "every currently-active edge incident to that attribute".
    pub fn attribute_kinds() -> &'static [(EdgeKind, Direction)] {
        &[
            (EdgeKind::HasAttribute, Direction::Incoming),
            (EdgeKind::HasValue, Direction::Outgoing),
            (EdgeKind::HasOwner, Direction::Outgoing),
            (EdgeKind::HasSource, Direction::Outgoing),
            (EdgeKind::IsProtected, Direction::Outgoing),
            (EdgeKind::IsVisible, Direction::Outgoing),
        ]
    }

    /// Every kind that can be incident to a data `Node` element, with the
    /// direction as seen from the node. Used by node migrations to re-point
    /// or tear down a node's edge set.
    pub fn node_kinds() -> &'static [(EdgeKind, Direction)] {
        &[
            (EdgeKind::HasAttribute, Direction::Outgoing),
            (EdgeKind::IsPartOf, Direction::Outgoing),
            (EdgeKind::IsRelated, Direction::Both),
        ]
    }
}

impl std::fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Liveness of an edge record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeStatus {
    Active,
    Deleted,
}

/// One record in the append-only history of a logical edge.
///
/// A logical relationship between two elements is a *sequence* of these
/// records. The persisted property set is exactly
/// `{branch, branch_level, status, from, to}` — changing these names or
/// semantics requires a graph-format migration, not a schema migration.
///
/// Mutation rules: records are appended, never rewritten; the single
/// permitted in-place change is stamping `to` when the record is ended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeRecord {
    pub id: EdgeId,
    pub source: NodeId,
    pub target: NodeId,
    pub kind: EdgeKind,
    /// Branch on which this record is visible.
    pub branch: String,
    /// Hierarchy level of `branch` at creation time. Tie-breaker: the
    /// deeper branch wins when several records could apply.
    pub branch_level: u32,
    pub status: EdgeStatus,
    /// Instant from which this record is visible.
    pub from: Timestamp,
    /// Instant at which this record stopped being visible; `None` while
    /// still current.
    pub to: Option<Timestamp>,
}

impl EdgeRecord {
    /// True while the record has not been ended.
    pub fn is_open(&self) -> bool {
        self.to.is_none()
    }

    /// The endpoint on the far side from `node`, if `node` is an endpoint.
    pub fn peer_of(&self, node: NodeId) -> Option<NodeId> {
        if node == self.source {
            Some(self.target)
        } else if node == self.target {
            Some(self.source)
        } else {
            None
        }
    }

    /// Direction of this record as seen from `node`.
    pub fn direction_from(&self, node: NodeId) -> Option<Direction> {
        match (node == self.source, node == self.target) {
            (true, true) => Some(Direction::Both),
            (true, false) => Some(Direction::Outgoing),
            (false, true) => Some(Direction::Incoming),
            (false, false) => None,
        }
    }
}
