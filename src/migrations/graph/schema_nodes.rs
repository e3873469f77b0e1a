//! Graph format v2 → v3: internal schema nodes.

use async_trait::async_trait;

use crate::migrations::{execute_queries, MigrationResult};
use crate::model::labels;
use crate::model::{Branch, PropertyMap, Timestamp, Value};
use crate::query::{ops, BranchFilter, Query, QueryStats, QueryType};
use crate::storage::GraphStore;
use crate::tx::TxMode;
use crate::Result;

use super::GraphMigration;

/// Kind carried by every internal schema node.
pub const SCHEMA_NODE_KIND: &str = "SchemaNode";

/// The built-in element kinds the internal schema describes.
pub const CORE_SCHEMA_NAMES: &[&str] = &["Node", "Attribute", "Relationship"];

/// Materialize the internal SchemaNode records for the built-in kinds.
///
/// The schema is versioned like any other data, so it needs graph elements
/// of its own; later migrations (and the schema-management subsystem)
/// assume these exist. Existing records are skipped, keeping the migration
/// re-runnable.
pub struct CoreSchemaNodeMigration;

#[async_trait]
impl<S: GraphStore> GraphMigration<S> for CoreSchemaNodeMigration {
    fn name(&self) -> &'static str {
        "core_schema_nodes"
    }

    fn minimum_version(&self) -> i64 {
        2
    }

    async fn execute(&self, store: &S) -> MigrationResult {
        let mut queries: Vec<Box<dyn Query<S>>> = vec![Box::new(CoreSchemaNodeQuery::new())];
        execute_queries(store, &mut queries).await
    }

    async fn validate_migration(&self, store: &S) -> MigrationResult {
        let mut result = MigrationResult::default();
        let check = async {
            let tx = store.begin_tx(TxMode::ReadOnly).await?;
            let filter = BranchFilter::isolated(&Branch::main(Timestamp::now()), None)?;
            let alive = ops::active_nodes_of_kind(store, &tx, &filter, SCHEMA_NODE_KIND).await?;
            let mut errors = Vec::new();
            for name in CORE_SCHEMA_NAMES {
                if !alive.iter().any(|n| n.name() == Some(name)) {
                    errors.push(format!("internal schema node {name} is missing"));
                }
            }
            Ok::<_, crate::Error>(errors)
        };
        match check.await {
            Ok(errors) => result.errors = errors,
            Err(e) => result.errors.push(e.to_string()),
        }
        result
    }
}

struct CoreSchemaNodeQuery {
    branch: Branch,
    at: Timestamp,
    stats: QueryStats,
}

impl CoreSchemaNodeQuery {
    fn new() -> Self {
        let at = Timestamp::now();
        Self {
            branch: Branch::main(at),
            at,
            stats: QueryStats::default(),
        }
    }
}

#[async_trait]
impl<S: GraphStore> Query<S> for CoreSchemaNodeQuery {
    fn name(&self) -> &'static str {
        "core_schema_nodes_create"
    }

    fn query_type(&self) -> QueryType {
        QueryType::Write
    }

    async fn execute(&mut self, store: &S, tx: &mut S::Tx) -> Result<()> {
        let existing = store
            .nodes_by_property(tx, labels::NODE, "kind", &Value::from(SCHEMA_NODE_KIND))
            .await?;
        for name in CORE_SCHEMA_NAMES {
            if existing.iter().any(|n| n.name() == Some(name)) {
                continue;
            }
            let mut props = PropertyMap::new();
            props.insert("name".into(), Value::from(*name));
            ops::create_anchored_node(
                store,
                tx,
                &self.branch,
                self.at,
                &[labels::NODE, labels::SCHEMA_NODE],
                props,
                SCHEMA_NODE_KIND,
                "Internal",
                &mut self.stats,
            )
            .await?;
            self.stats.nbr_processed += 1;
        }
        Ok(())
    }

    fn stats(&self) -> &QueryStats {
        &self.stats
    }
}
