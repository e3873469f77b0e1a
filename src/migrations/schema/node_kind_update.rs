//! Re-label every node of a kind, preserving logical identity.

use async_trait::async_trait;

use crate::model::labels;
use crate::model::{Branch, EdgeKind, PropertyMap, Timestamp, Value};
use crate::query::ops::{
    active_incident_edges, active_nodes_of_kind, end_if_acting_branch, repoint,
};
use crate::query::{BranchFilter, Query, QueryStats, QueryType};
use crate::storage::GraphStore;
use crate::Result;

/// For every active node of `previous_kind`: create a new Node record
/// carrying the **same uuid** but the new kind/namespace, re-point every
/// active incident edge onto it (whichever side the old node occupied),
/// and end the old node's records on the acting branch. A re-labeling,
/// not a delete-and-recreate — the uuid is the identity that survives.
pub struct NodeKindUpdateQuery {
    previous_kind: String,
    new_kind: String,
    new_namespace: String,
    branch: Branch,
    filter: BranchFilter,
    at: Timestamp,
    stats: QueryStats,
}

impl NodeKindUpdateQuery {
    pub fn new(
        previous_kind: String,
        new_kind: String,
        new_namespace: String,
        branch: Branch,
        filter: BranchFilter,
        at: Timestamp,
    ) -> Self {
        Self {
            previous_kind,
            new_kind,
            new_namespace,
            branch,
            filter,
            at,
            stats: QueryStats::default(),
        }
    }
}

#[async_trait]
impl<S: GraphStore> Query<S> for NodeKindUpdateQuery {
    fn name(&self) -> &'static str {
        "node_kind_update"
    }

    fn query_type(&self) -> QueryType {
        QueryType::Write
    }

    async fn execute(&mut self, store: &S, tx: &mut S::Tx) -> Result<()> {
        let nodes = active_nodes_of_kind(store, tx, &self.filter, &self.previous_kind).await?;
        for node in nodes {
            let mut props = PropertyMap::new();
            props.insert("kind".into(), Value::from(self.new_kind.as_str()));
            props.insert("namespace".into(), Value::from(self.new_namespace.as_str()));
            // Same uuid: identity is preserved across the kind change.
            let new_id = store.create_node(tx, node.uuid, &[labels::NODE], props).await?;
            self.stats.nodes_created += 1;

            let edges =
                active_incident_edges(store, tx, &self.filter, node.id, EdgeKind::node_kinds())
                    .await?;
            for edge in &edges {
                let source = if edge.source == node.id { new_id } else { edge.source };
                let target = if edge.target == node.id { new_id } else { edge.target };
                repoint(store, tx, &self.branch, self.at, edge, source, target, &mut self.stats)
                    .await?;
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
