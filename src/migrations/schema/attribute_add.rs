//! Materialize a newly added attribute on every live node of a kind.

use async_trait::async_trait;

use crate::model::{Branch, Timestamp};
use crate::query::ops::{active_attribute, active_nodes_of_kind, create_attribute_subtree};
use crate::query::{BranchFilter, Query, QueryStats, QueryType};
use crate::schema::{AttributeSchema, BranchSupport};
use crate::storage::GraphStore;
use crate::Result;

/// For every live node of `node_kind` that does not already have an active
/// attribute named after the schema, create the attribute subtree (value,
/// protected/visible flags) wired with active edges from `at`.
///
/// Off the default branch the attribute's branch support is forced to
/// `Local`: local-only attributes cannot propagate schema defaults across
/// branches.
pub struct NodeAttributeAddQuery {
    node_kind: String,
    attribute: AttributeSchema,
    branch: Branch,
    filter: BranchFilter,
    at: Timestamp,
    stats: QueryStats,
}

impl NodeAttributeAddQuery {
    pub fn new(
        node_kind: String,
        attribute: AttributeSchema,
        branch: Branch,
        filter: BranchFilter,
        at: Timestamp,
    ) -> Self {
        Self {
            node_kind,
            attribute,
            branch,
            filter,
            at,
            stats: QueryStats::default(),
        }
    }

    fn branch_support(&self) -> BranchSupport {
        if self.branch.is_default {
            self.attribute.branch
        } else {
            BranchSupport::Local
        }
    }
}

#[async_trait]
impl<S: GraphStore> Query<S> for NodeAttributeAddQuery {
    fn name(&self) -> &'static str {
        "node_attribute_add"
    }

    fn query_type(&self) -> QueryType {
        QueryType::Write
    }

    async fn execute(&mut self, store: &S, tx: &mut S::Tx) -> Result<()> {
        let branch_support = self.branch_support();
        let nodes = active_nodes_of_kind(store, tx, &self.filter, &self.node_kind).await?;
        for node in nodes {
            let existing =
                active_attribute(store, tx, &self.filter, node.id, &self.attribute.name).await?;
            if existing.is_some() {
                continue;
            }
            create_attribute_subtree(
                store,
                tx,
                &self.branch,
                self.at,
                node.id,
                &self.attribute,
                branch_support,
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
