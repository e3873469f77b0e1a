//! Shared fixtures for the integration suites.
//!
//! Builds small versioned graphs at fixed timestamps so every suite can
//! assert against an exact history.

#![allow(dead_code)]

use branchgraph::query::filter::BranchFilter;
use branchgraph::query::ops;
use branchgraph::query::{resolve_active, QueryStats};
use branchgraph::schema::AttributeSchema;
use branchgraph::storage::EdgeSpec;
use branchgraph::{
    Direction, EdgeKind, GraphStore, MemoryStore, Node, NodeId, PropertyMap, RegistryContext,
    Timestamp, TxMode, Value,
};

/// Epoch all fixture timestamps are relative to.
pub const EPOCH: &str = "2025-06-01T00:00:00Z";

pub fn ts(s: &str) -> Timestamp {
    Timestamp::parse(s).unwrap()
}

/// `EPOCH` shifted by whole minutes (negative = in the past relative to
/// the fixture's "now").
pub fn minutes(offset: i64) -> Timestamp {
    ts(EPOCH).add_seconds(offset * 60)
}

pub struct Fixture {
    pub store: MemoryStore,
    pub registry: RegistryContext,
}

impl Fixture {
    /// Store + registry with the default branch rooted one day before
    /// `EPOCH`.
    pub fn new() -> Self {
        Self {
            store: MemoryStore::new(),
            registry: RegistryContext::with_default_branch(ts(EPOCH).add_seconds(-86_400)),
        }
    }

    pub fn filter(&self, branch: &str, at: Timestamp) -> BranchFilter {
        let branch = self.registry.get_branch(branch).unwrap();
        BranchFilter::build(branch, &self.registry, Some(at)).unwrap()
    }

    /// Create a data node of `kind`, anchored to Root, with one attribute
    /// subtree per (name, default) pair — all on `branch` from `at`.
    pub async fn create_node_with_attributes(
        &self,
        branch: &str,
        at: Timestamp,
        kind: &str,
        attributes: &[(&str, serde_json::Value)],
    ) -> NodeId {
        let branch = self.registry.get_branch(branch).unwrap().clone();
        let mut tx = self.store.begin_tx(TxMode::ReadWrite).await.unwrap();
        let mut stats = QueryStats::default();

        let node = ops::create_anchored_node(
            &self.store,
            &mut tx,
            &branch,
            at,
            &["Node"],
            PropertyMap::new(),
            kind,
            "Test",
            &mut stats,
        )
        .await
        .unwrap();

        for (name, default) in attributes {
            let attribute = AttributeSchema::new(*name, "Text").with_default(default.clone());
            ops::create_attribute_subtree(
                &self.store,
                &mut tx,
                &branch,
                at,
                node,
                &attribute,
                attribute.branch,
                &mut stats,
            )
            .await
            .unwrap();
        }

        self.store.commit_tx(tx).await.unwrap();
        node
    }

    /// The active attribute element named `name` on `node`, as seen from
    /// (`branch`, `at`).
    pub async fn attribute_node(
        &self,
        branch: &str,
        at: Timestamp,
        node: NodeId,
        name: &str,
    ) -> Option<Node> {
        let filter = self.filter(branch, at);
        let tx = self.store.begin_tx(TxMode::ReadOnly).await.unwrap();
        let found = ops::active_attribute(&self.store, &tx, &filter, node, name)
            .await
            .unwrap()
            .map(|(_, attribute)| attribute);
        self.store.commit_tx(tx).await.unwrap();
        found
    }

    /// The active value of attribute `name` on `node`, as seen from
    /// (`branch`, `at`).
    pub async fn attribute_value(
        &self,
        branch: &str,
        at: Timestamp,
        node: NodeId,
        name: &str,
    ) -> Option<Value> {
        let attribute = self.attribute_node(branch, at, node, name).await?;
        let filter = self.filter(branch, at);
        let tx = self.store.begin_tx(TxMode::ReadOnly).await.unwrap();

        let records = self
            .store
            .edges_of(&tx, attribute.id, Direction::Outgoing, &[EdgeKind::HasValue])
            .await
            .unwrap();
        // Single-valued kind: the winner is resolved across every record of
        // (attribute, HAS_VALUE) — the target IS the value.
        let mut value = None;
        if let Some(winner) = resolve_active(&records, &filter) {
            let value_node = self.store.get_node(&tx, winner.target).await.unwrap().unwrap();
            value = value_node.get("value").cloned();
        }
        self.store.commit_tx(tx).await.unwrap();
        value
    }

    /// Update attribute `name` on `node` to `value` at `at`, on `branch`:
    /// end the current record if it belongs to the acting branch, then
    /// append a record pointing at a fresh AttributeValue element.
    pub async fn set_attribute_value(
        &self,
        branch: &str,
        at: Timestamp,
        node: NodeId,
        name: &str,
        value: Value,
    ) {
        let branch = self.registry.get_branch(branch).unwrap().clone();
        let filter = BranchFilter::build(&branch, &self.registry, Some(at)).unwrap();
        let mut tx = self.store.begin_tx(TxMode::ReadWrite).await.unwrap();
        let mut stats = QueryStats::default();

        let (_, attribute) = ops::active_attribute(&self.store, &tx, &filter, node, name)
            .await
            .unwrap()
            .expect("attribute must be active to update it");
        let records = self
            .store
            .edges_of(&tx, attribute.id, Direction::Outgoing, &[EdgeKind::HasValue])
            .await
            .unwrap();
        let current = resolve_active(&records, &filter)
            .cloned()
            .expect("attribute must carry a value");
        ops::end_if_acting_branch(&self.store, &mut tx, &branch, at, &current, &mut stats)
            .await
            .unwrap();

        let mut props = PropertyMap::new();
        props.insert("value".into(), value);
        let value_node = self
            .store
            .create_node(&mut tx, self.store.generate_uuid(), &["AttributeValue"], props)
            .await
            .unwrap();
        self.store
            .add_edge(
                &mut tx,
                EdgeSpec::active(attribute.id, value_node, EdgeKind::HasValue, &branch, at),
            )
            .await
            .unwrap();

        self.store.commit_tx(tx).await.unwrap();
    }

    /// Flip the IS_VISIBLE flag of `attribute` at `at` on `branch`.
    pub async fn flip_visible(&self, branch: &str, at: Timestamp, attribute: NodeId) {
        let branch = self.registry.get_branch(branch).unwrap().clone();
        let filter = BranchFilter::build(&branch, &self.registry, Some(at)).unwrap();
        let mut tx = self.store.begin_tx(TxMode::ReadWrite).await.unwrap();
        let mut stats = QueryStats::default();

        let records = self
            .store
            .edges_of(&tx, attribute, Direction::Outgoing, &[EdgeKind::IsVisible])
            .await
            .unwrap();
        let current = resolve_active(&records, &filter)
            .cloned()
            .expect("attribute must carry a visibility flag");
        let flag = self.store.get_node(&tx, current.target).await.unwrap().unwrap();
        let flipped = !flag.get("value").and_then(Value::as_bool).unwrap();

        ops::end_if_acting_branch(&self.store, &mut tx, &branch, at, &current, &mut stats)
            .await
            .unwrap();
        let target = ops::ensure_boolean_node(&self.store, &mut tx, flipped).await.unwrap();
        self.store
            .add_edge(
                &mut tx,
                EdgeSpec::active(attribute, target, EdgeKind::IsVisible, &branch, at),
            )
            .await
            .unwrap();

        self.store.commit_tx(tx).await.unwrap();
    }
}
