//! Rename an attribute by re-linking its edges onto a fresh element.

use async_trait::async_trait;

use crate::model::labels;
use crate::model::{Branch, EdgeKind, NodeId, PropertyMap, Timestamp, Value};
use crate::query::ops::{
    active_attribute, active_incident_edges, active_nodes_of_kind, end_if_acting_branch,
    mirror_deleted, repoint,
};
use crate::query::{BranchFilter, Query, QueryStats, QueryType};
use crate::storage::GraphStore;
use crate::Result;

/// For every node with an active attribute named `previous_name`: create a
/// brand-new Attribute element named `new_name` with the same branch
/// support, and re-link every active incident edge onto it — the value,
/// flags and owner/source relationships keep their exact targets, only the
/// attribute element (and hence the name) changes.
///
/// On the default branch the old records belonging to the acting branch
/// are ended. On non-default branches they are left active and shadowed by
/// parallel deleted-status records instead, so the branch can still
/// resolve the old name's history if it never diverged.
pub struct AttributeNameUpdateQuery {
    node_kind: String,
    previous_name: String,
    new_name: String,
    branch: Branch,
    filter: BranchFilter,
    at: Timestamp,
    stats: QueryStats,
    new_attribute_ids: Vec<NodeId>,
}

impl AttributeNameUpdateQuery {
    pub fn new(
        node_kind: String,
        previous_name: String,
        new_name: String,
        branch: Branch,
        filter: BranchFilter,
        at: Timestamp,
    ) -> Self {
        Self {
            node_kind,
            previous_name,
            new_name,
            branch,
            filter,
            at,
            stats: QueryStats::default(),
            new_attribute_ids: Vec::new(),
        }
    }

    /// The replacement attribute elements created by this query.
    pub fn new_attribute_ids(&self) -> &[NodeId] {
        &self.new_attribute_ids
    }
}

#[async_trait]
impl<S: GraphStore> Query<S> for AttributeNameUpdateQuery {
    fn name(&self) -> &'static str {
        "attribute_name_update"
    }

    fn query_type(&self) -> QueryType {
        QueryType::Write
    }

    async fn execute(&mut self, store: &S, tx: &mut S::Tx) -> Result<()> {
        let nodes = active_nodes_of_kind(store, tx, &self.filter, &self.node_kind).await?;
        for node in nodes {
            let Some((_, old_attribute)) =
                active_attribute(store, tx, &self.filter, node.id, &self.previous_name).await?
            else {
                continue;
            };

            let mut props = PropertyMap::new();
            props.insert("name".into(), Value::from(self.new_name.as_str()));
            if let Some(support) = old_attribute.get("branch_support") {
                props.insert("branch_support".into(), support.clone());
            }
            let new_id = store
                .create_node(tx, store.generate_uuid(), &[labels::ATTRIBUTE], props)
                .await?;
            self.stats.nodes_created += 1;

            let edges = active_incident_edges(
                store,
                tx,
                &self.filter,
                old_attribute.id,
                EdgeKind::attribute_kinds(),
            )
            .await?;
            for edge in &edges {
                let source = if edge.source == old_attribute.id { new_id } else { edge.source };
                let target = if edge.target == old_attribute.id { new_id } else { edge.target };
                repoint(store, tx, &self.branch, self.at, edge, source, target, &mut self.stats)
                    .await?;
                if self.branch.is_default {
                    end_if_acting_branch(store, tx, &self.branch, self.at, edge, &mut self.stats)
                        .await?;
                } else {
                    mirror_deleted(store, tx, &self.branch, self.at, edge, &mut self.stats)
                        .await?;
                }
            }

            self.new_attribute_ids.push(new_id);
            self.stats.nbr_processed += 1;
        }
        Ok(())
    }

    fn stats(&self) -> &QueryStats {
        &self.stats
    }
}
