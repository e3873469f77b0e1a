//! # Migration Engine
//!
//! Transactional rewrites of the versioned graph. Two families:
//!
//! - [`SchemaMigration`] — logical-schema changes (attribute add/remove/
//!   rename, node kind rename, node removal), branch-parameterized.
//! - [`graph::GraphMigration`] — physical-format changes, global, gated by
//!   `Root.graph_version`.
//!
//! Both run their queries strictly in order inside one transaction per
//! migration: the first failure aborts the rest, the transaction rolls
//! back, and the error surfaces as a string in [`MigrationResult`].
//! Migrations that already committed are never touched by a later
//! migration's failure.

pub mod graph;
pub mod schema;

use tracing::{debug, info, warn};

use crate::model::{Branch, Timestamp};
use crate::query::{BranchFilter, Query, QueryStats};
use crate::registry::RegistryContext;
use crate::schema::{AttributeSchema, NodeSchema, SchemaPath};
use crate::storage::GraphStore;
use crate::tx::TxMode;
use crate::{Error, Result};

use self::schema::{
    AttributeNameUpdateQuery, NodeAttributeAddQuery, NodeAttributeRemoveQuery,
    NodeKindUpdateQuery, NodeRemoveQuery,
};

// ============================================================================
// MigrationResult
// ============================================================================

/// Outcome of one migration: a list of error strings. Success is the
/// absence of errors — callers needing finer-grained handling inspect the
/// strings or re-run validation separately.
#[derive(Debug, Clone, Default)]
pub struct MigrationResult {
    pub errors: Vec<String>,
}

impl MigrationResult {
    pub fn success(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn from_error(error: impl std::fmt::Display) -> Self {
        Self { errors: vec![error.to_string()] }
    }
}

// ============================================================================
// Engine
// ============================================================================

/// Run `queries` in list order inside one transaction.
///
/// Later queries may depend on rows created by earlier ones, so each waits
/// for the previous to complete — no pipelining. The first error skips the
/// remaining queries and rolls the transaction back; nothing from a failed
/// run stays visible.
pub async fn execute_queries<S: GraphStore>(
    store: &S,
    queries: &mut [Box<dyn Query<S>>],
) -> MigrationResult {
    let mut tx = match store.begin_tx(TxMode::ReadWrite).await {
        Ok(tx) => tx,
        Err(e) => return MigrationResult::from_error(e),
    };

    for query in queries.iter_mut() {
        debug!(query = query.name(), "executing migration query");
        if let Err(e) = query.execute(store, &mut tx).await {
            warn!(query = query.name(), error = %e, "migration query failed, rolling back");
            let result = MigrationResult::from_error(&e);
            if let Err(rollback_err) = store.rollback_tx(tx).await {
                warn!(error = %rollback_err, "rollback failed");
            }
            return result;
        }
    }

    match store.commit_tx(tx).await {
        Ok(()) => MigrationResult::default(),
        Err(e) => MigrationResult::from_error(e),
    }
}

// ============================================================================
// SchemaMigration
// ============================================================================

/// The concrete rewrite a schema migration performs.
#[derive(Debug, Clone)]
pub enum SchemaMigrationKind {
    AttributeAdd {
        node_kind: String,
        attribute: AttributeSchema,
    },
    AttributeRemove {
        node_kind: String,
        attribute_name: String,
    },
    AttributeNameUpdate {
        node_kind: String,
        previous_name: String,
        new_name: String,
    },
    KindUpdate {
        previous_kind: String,
        new_kind: String,
        new_namespace: String,
    },
    NodeRemove {
        kind: String,
    },
}

/// An immutable description of one logical-schema change: a named
/// operation plus the ordered queries that implement it.
///
/// Construction validates the schema path eagerly — a malformed migration
/// never reaches a transaction.
#[derive(Debug, Clone)]
pub struct SchemaMigration {
    pub name: String,
    pub kind: SchemaMigrationKind,
    pub new_node_schema: Option<NodeSchema>,
    pub previous_node_schema: Option<NodeSchema>,
    pub schema_path: SchemaPath,
}

impl SchemaMigration {
    /// `node.attribute.add`: the attribute named by `path` now exists on
    /// the kind and must be materialized on every live node.
    pub fn node_attribute_add(path: SchemaPath, new_schema: NodeSchema) -> Result<Self> {
        let attribute = path.resolve_attribute(&new_schema)?.clone();
        Ok(Self {
            name: "node.attribute.add".into(),
            kind: SchemaMigrationKind::AttributeAdd {
                node_kind: new_schema.kind.clone(),
                attribute,
            },
            new_node_schema: Some(new_schema),
            previous_node_schema: None,
            schema_path: path,
        })
    }

    /// `node.attribute.remove`: the attribute named by `path` no longer
    /// exists and its edges must be ended on the acting branch.
    pub fn node_attribute_remove(path: SchemaPath, previous_schema: NodeSchema) -> Result<Self> {
        let attribute = path.resolve_attribute(&previous_schema)?.clone();
        Ok(Self {
            name: "node.attribute.remove".into(),
            kind: SchemaMigrationKind::AttributeRemove {
                node_kind: previous_schema.kind.clone(),
                attribute_name: attribute.name,
            },
            new_node_schema: None,
            previous_node_schema: Some(previous_schema),
            schema_path: path,
        })
    }

    /// `attribute.name.update`: `path` names the attribute in the NEW
    /// schema; the previous name is the one attribute of the previous
    /// schema that no longer appears in the new one.
    pub fn attribute_name_update(
        path: SchemaPath,
        new_schema: NodeSchema,
        previous_schema: NodeSchema,
    ) -> Result<Self> {
        let new_attribute = path.resolve_attribute(&new_schema)?.clone();
        let mut removed = previous_schema
            .attributes
            .iter()
            .filter(|a| new_schema.attribute(&a.name).is_none());
        let previous = removed.next().ok_or_else(|| {
            Error::SchemaPath(format!(
                "no renamed attribute found on schema {}{}",
                previous_schema.namespace, previous_schema.kind
            ))
        })?;
        if removed.next().is_some() {
            return Err(Error::SchemaPath(format!(
                "ambiguous rename on schema {}{}: several attributes disappeared",
                previous_schema.namespace, previous_schema.kind
            )));
        }
        let previous_name = previous.name.clone();
        Ok(Self {
            name: "attribute.name.update".into(),
            kind: SchemaMigrationKind::AttributeNameUpdate {
                node_kind: previous_schema.kind.clone(),
                previous_name,
                new_name: new_attribute.name,
            },
            new_node_schema: Some(new_schema),
            previous_node_schema: Some(previous_schema),
            schema_path: path,
        })
    }

    /// `node.name.update` / `node.namespace.update`: every node of the
    /// previous kind is re-labeled, preserving its uuid.
    pub fn node_kind_update(
        path: SchemaPath,
        new_schema: NodeSchema,
        previous_schema: NodeSchema,
    ) -> Result<Self> {
        if new_schema.kind == previous_schema.kind
            && new_schema.namespace == previous_schema.namespace
        {
            return Err(Error::SchemaPath(format!(
                "kind update on {}{} changes neither kind nor namespace",
                new_schema.namespace, new_schema.kind
            )));
        }
        Ok(Self {
            name: "node.name.update".into(),
            kind: SchemaMigrationKind::KindUpdate {
                previous_kind: previous_schema.kind.clone(),
                new_kind: new_schema.kind.clone(),
                new_namespace: new_schema.namespace.clone(),
            },
            new_node_schema: Some(new_schema),
            previous_node_schema: Some(previous_schema),
            schema_path: path,
        })
    }

    /// `node.remove`: tear down every node of the previous kind on the
    /// acting branch.
    pub fn node_remove(path: SchemaPath, previous_schema: NodeSchema) -> Result<Self> {
        Ok(Self {
            name: "node.remove".into(),
            kind: SchemaMigrationKind::NodeRemove { kind: previous_schema.kind.clone() },
            new_node_schema: None,
            previous_node_schema: Some(previous_schema),
            schema_path: path,
        })
    }

    /// The ordered queries implementing this migration.
    fn build_queries<S: GraphStore>(
        &self,
        registry: &RegistryContext,
        branch: &Branch,
        at: Timestamp,
    ) -> Result<Vec<Box<dyn Query<S>>>> {
        let filter = BranchFilter::build(branch, registry, Some(at))?;
        let queries: Vec<Box<dyn Query<S>>> = match &self.kind {
            SchemaMigrationKind::AttributeAdd { node_kind, attribute } => {
                vec![Box::new(NodeAttributeAddQuery::new(
                    node_kind.clone(),
                    attribute.clone(),
                    branch.clone(),
                    filter,
                    at,
                ))]
            }
            SchemaMigrationKind::AttributeRemove { node_kind, attribute_name } => {
                vec![Box::new(NodeAttributeRemoveQuery::new(
                    node_kind.clone(),
                    attribute_name.clone(),
                    branch.clone(),
                    filter,
                    at,
                ))]
            }
            SchemaMigrationKind::AttributeNameUpdate { node_kind, previous_name, new_name } => {
                vec![Box::new(AttributeNameUpdateQuery::new(
                    node_kind.clone(),
                    previous_name.clone(),
                    new_name.clone(),
                    branch.clone(),
                    filter,
                    at,
                ))]
            }
            SchemaMigrationKind::KindUpdate { previous_kind, new_kind, new_namespace } => {
                vec![Box::new(NodeKindUpdateQuery::new(
                    previous_kind.clone(),
                    new_kind.clone(),
                    new_namespace.clone(),
                    branch.clone(),
                    filter,
                    at,
                ))]
            }
            SchemaMigrationKind::NodeRemove { kind } => {
                vec![Box::new(NodeRemoveQuery::new(
                    kind.clone(),
                    branch.clone(),
                    filter,
                    at,
                ))]
            }
        };
        Ok(queries)
    }

    /// Execute this migration on `branch` as of `at` (defaults to now),
    /// inside its own transaction.
    pub async fn execute<S: GraphStore>(
        &self,
        store: &S,
        registry: &RegistryContext,
        branch: &Branch,
        at: Option<Timestamp>,
    ) -> MigrationResult {
        let at = Timestamp::resolve(at);
        let mut queries = match self.build_queries::<S>(registry, branch, at) {
            Ok(queries) => queries,
            Err(e) => return MigrationResult::from_error(e),
        };

        let result = execute_queries(store, &mut queries).await;

        let mut stats = QueryStats::default();
        for query in &queries {
            stats.absorb(query.stats());
        }
        info!(
            migration = %self.name,
            branch = %branch.name,
            processed = stats.nbr_processed,
            nodes_created = stats.nodes_created,
            edges_created = stats.edges_created,
            edges_ended = stats.edges_ended,
            success = result.success(),
            "schema migration finished"
        );
        result
    }
}
