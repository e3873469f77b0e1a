//! Branch — a named, hierarchical fork of the versioned graph.

use serde::{Deserialize, Serialize};

use super::Timestamp;

/// Name of the default branch. Hierarchy level 0, no origin.
pub const DEFAULT_BRANCH: &str = "main";

/// A named version-control unit over the graph.
///
/// Branching does not copy data: the branch is a logical fork point used
/// purely in filter predicates. History before `branched_from` is the
/// origin branch's history at that same time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Branch {
    pub name: String,
    /// The branch this one was created from. `None` for the default branch.
    pub origin_branch: Option<String>,
    /// Timestamp of the fork point.
    pub branched_from: Timestamp,
    /// Depth in the branch hierarchy: default branch = 0, branches off it = 1.
    pub hierarchy_level: u32,
    pub is_default: bool,
}

impl Branch {
    /// The default branch, rooted at `branched_from`.
    pub fn main(branched_from: Timestamp) -> Self {
        Self {
            name: DEFAULT_BRANCH.to_string(),
            origin_branch: None,
            branched_from,
            hierarchy_level: 0,
            is_default: true,
        }
    }

    /// Fork a new branch off this one at the given instant.
    pub fn fork(&self, name: impl Into<String>, at: Timestamp) -> Self {
        Self {
            name: name.into(),
            origin_branch: Some(self.name.clone()),
            branched_from: at,
            hierarchy_level: self.hierarchy_level + 1,
            is_default: false,
        }
    }
}
