//! Physical-format migrations, gated by `Root.graph_version`.
//!
//! Unlike schema migrations these are global — not branch-parameterized —
//! and additive: `get_graph_migrations` silently skips every migration the
//! recorded version has already passed, so "already applied" is a no-op,
//! not an error. They run in ascending `minimum_version` order because
//! later migrations assume the graph shape earlier ones produced.

pub mod root_anchor;
pub mod schema_nodes;
pub mod schema_documentation;

use async_trait::async_trait;

use crate::migrations::MigrationResult;
use crate::model::Node;
use crate::query::ops;
use crate::storage::GraphStore;

pub use root_anchor::RootAnchorMigration;
pub use schema_documentation::SchemaDocumentationMigration;
pub use schema_nodes::CoreSchemaNodeMigration;

/// The current physical format version. A freshly initialized root starts
/// at 1 and is advanced by the caller as migrations are applied.
pub const GRAPH_VERSION: i64 = 4;

/// A physical-format rewrite: a named operation plus the version below
/// which it still needs to run.
#[async_trait]
pub trait GraphMigration<S: GraphStore>: Send + Sync {
    fn name(&self) -> &'static str;

    /// The `Root.graph_version` below which this migration must run.
    fn minimum_version(&self) -> i64;

    /// Run the migration inside one transaction: commit on success, full
    /// rollback on the first error. Never advances the recorded version —
    /// that is caller policy.
    async fn execute(&self, store: &S) -> MigrationResult;

    /// Post-hoc consistency check. Not invoked by `execute`.
    async fn validate_migration(&self, store: &S) -> MigrationResult;
}

/// Every known graph migration, in ascending `minimum_version` order.
pub fn all_graph_migrations<S: GraphStore>() -> Vec<Box<dyn GraphMigration<S>>> {
    vec![
        Box::new(RootAnchorMigration),
        Box::new(CoreSchemaNodeMigration),
        Box::new(SchemaDocumentationMigration),
    ]
}

/// The migrations `root` still needs: every one whose `minimum_version` is
/// at or above the recorded `graph_version`, ascending.
pub fn get_graph_migrations<S: GraphStore>(root: &Node) -> Vec<Box<dyn GraphMigration<S>>> {
    let recorded = ops::graph_version(root);
    let mut pending: Vec<Box<dyn GraphMigration<S>>> = all_graph_migrations::<S>()
        .into_iter()
        .filter(|m| m.minimum_version() >= recorded)
        .collect();
    pending.sort_by_key(|m| m.minimum_version());
    pending
}
