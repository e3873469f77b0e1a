//! Tear down every node of a kind on the acting branch.

use async_trait::async_trait;

use crate::model::{Branch, EdgeKind, Timestamp};
use crate::query::ops::{
    active_incident_edges, active_nodes_of_kind, end_if_acting_branch, mirror_deleted,
};
use crate::query::{BranchFilter, Query, QueryStats, QueryType};
use crate::storage::GraphStore;
use crate::Result;

/// Symmetric teardown: for every active node of `kind`, each active
/// incident edge (both directions) gets a deleted-status mirror and the
/// acting branch's record is ended. No replacement node is created; the
/// node stops being live because its `IS_PART_OF` anchor ends with the
/// rest.
pub struct NodeRemoveQuery {
    kind: String,
    branch: Branch,
    filter: BranchFilter,
    at: Timestamp,
    stats: QueryStats,
}

impl NodeRemoveQuery {
    pub fn new(kind: String, branch: Branch, filter: BranchFilter, at: Timestamp) -> Self {
        Self {
            kind,
            branch,
            filter,
            at,
            stats: QueryStats::default(),
        }
    }
}

#[async_trait]
impl<S: GraphStore> Query<S> for NodeRemoveQuery {
    fn name(&self) -> &'static str {
        "node_remove"
    }

    fn query_type(&self) -> QueryType {
        QueryType::Write
    }

    async fn execute(&mut self, store: &S, tx: &mut S::Tx) -> Result<()> {
        let nodes = active_nodes_of_kind(store, tx, &self.filter, &self.kind).await?;
        for node in nodes {
            let edges =
                active_incident_edges(store, tx, &self.filter, node.id, EdgeKind::node_kinds())
                    .await?;
            for edge in &edges {
                mirror_deleted(store, tx, &self.branch, self.at, edge, &mut self.stats).await?;
                end_if_acting_branch(store, tx, &self.branch, self.at, edge, &mut self.stats)
                    .await?;
            }
            self.stats.nbr_processed += 1;
        }
        Ok(())
    }

    fn stats(&self) -> &QueryStats {
        &self.stats
    }
}
