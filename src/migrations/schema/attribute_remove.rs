//! End an attribute's edges on the acting branch without destroying its
//! history.

use async_trait::async_trait;

use crate::model::{Branch, EdgeKind, Timestamp};
use crate::query::ops::{
    active_attribute, active_incident_edges, active_nodes_of_kind, end_if_acting_branch,
    mirror_deleted,
};
use crate::query::{BranchFilter, Query, QueryStats, QueryType};
use crate::storage::GraphStore;
use crate::Result;

/// For every node of `node_kind` with an active attribute named
/// `attribute_name`: every currently-active edge incident to that
/// attribute (any kind of the attribute set, regardless of direction) gets
/// a deleted-status mirror with the same endpoints, and the old record is
/// ended iff it belongs to the acting branch. Other branches' records are
/// left untouched — the attribute becomes invisible here while its history
/// stays queryable everywhere.
pub struct NodeAttributeRemoveQuery {
    node_kind: String,
    attribute_name: String,
    branch: Branch,
    filter: BranchFilter,
    at: Timestamp,
    stats: QueryStats,
}

impl NodeAttributeRemoveQuery {
    pub fn new(
        node_kind: String,
        attribute_name: String,
        branch: Branch,
        filter: BranchFilter,
        at: Timestamp,
    ) -> Self {
        Self {
            node_kind,
            attribute_name,
            branch,
            filter,
            at,
            stats: QueryStats::default(),
        }
    }
}

#[async_trait]
impl<S: GraphStore> Query<S> for NodeAttributeRemoveQuery {
    fn name(&self) -> &'static str {
        "node_attribute_remove"
    }

    fn query_type(&self) -> QueryType {
        QueryType::Write
    }

    async fn execute(&mut self, store: &S, tx: &mut S::Tx) -> Result<()> {
        let nodes = active_nodes_of_kind(store, tx, &self.filter, &self.node_kind).await?;
        for node in nodes {
            let Some((_, attribute)) =
                active_attribute(store, tx, &self.filter, node.id, &self.attribute_name).await?
            else {
                continue;
            };
            let edges = active_incident_edges(
                store,
                tx,
                &self.filter,
                attribute.id,
                EdgeKind::attribute_kinds(),
            )
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
