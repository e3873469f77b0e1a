//! Graph format v1 → v2: Root singleton + liveness anchors.

use async_trait::async_trait;

use crate::migrations::{execute_queries, MigrationResult};
use crate::model::labels;
use crate::model::{Branch, Direction, EdgeKind, Timestamp};
use crate::query::{ops, Query, QueryStats, QueryType};
use crate::storage::{EdgeSpec, GraphStore};
use crate::tx::TxMode;
use crate::Result;

use super::GraphMigration;

/// Ensure the Root anchor exists and every Node is attached to it.
///
/// Early graph formats stored nodes without a liveness anchor; this
/// migration creates the Root singleton and gives every never-anchored
/// node an active `IS_PART_OF` record on the default branch. Nodes whose
/// anchor was deliberately ended are left alone — only nodes with no
/// anchor history at all are backfilled.
pub struct RootAnchorMigration;

#[async_trait]
impl<S: GraphStore> GraphMigration<S> for RootAnchorMigration {
    fn name(&self) -> &'static str {
        "root_anchor"
    }

    fn minimum_version(&self) -> i64 {
        1
    }

    async fn execute(&self, store: &S) -> MigrationResult {
        let mut queries: Vec<Box<dyn Query<S>>> = vec![Box::new(RootAnchorQuery::new())];
        execute_queries(store, &mut queries).await
    }

    async fn validate_migration(&self, store: &S) -> MigrationResult {
        let mut result = MigrationResult::default();
        let check = async {
            let tx = store.begin_tx(TxMode::ReadOnly).await?;
            if ops::root_node(store, &tx).await?.is_none() {
                return Ok::<_, crate::Error>(vec!["no Root node present".to_string()]);
            }
            let mut missing = Vec::new();
            for node in store.nodes_by_label(&tx, labels::NODE).await? {
                let anchors = store
                    .edges_of(&tx, node.id, Direction::Outgoing, &[EdgeKind::IsPartOf])
                    .await?;
                if anchors.is_empty() {
                    missing.push(format!("node {} has no IS_PART_OF anchor", node.uuid));
                }
            }
            Ok(missing)
        };
        match check.await {
            Ok(errors) => result.errors = errors,
            Err(e) => result.errors.push(e.to_string()),
        }
        result
    }
}

struct RootAnchorQuery {
    branch: Branch,
    at: Timestamp,
    stats: QueryStats,
}

impl RootAnchorQuery {
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
impl<S: GraphStore> Query<S> for RootAnchorQuery {
    fn name(&self) -> &'static str {
        "root_anchor_backfill"
    }

    fn query_type(&self) -> QueryType {
        QueryType::Write
    }

    async fn execute(&mut self, store: &S, tx: &mut S::Tx) -> Result<()> {
        let root = ops::ensure_root(store, tx).await?;
        for node in store.nodes_by_label(tx, labels::NODE).await? {
            let anchors = store
                .edges_of(tx, node.id, Direction::Outgoing, &[EdgeKind::IsPartOf])
                .await?;
            if !anchors.is_empty() {
                continue;
            }
            store
                .add_edge(
                    tx,
                    EdgeSpec::active(node.id, root.id, EdgeKind::IsPartOf, &self.branch, self.at),
                )
                .await?;
            self.stats.edges_created += 1;
            self.stats.nbr_processed += 1;
        }
        Ok(())
    }

    fn stats(&self) -> &QueryStats {
        &self.stats
    }
}
