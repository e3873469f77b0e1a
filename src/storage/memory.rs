//! In-memory storage backend.
//!
//! This is the reference implementation of `GraphStore`. Base state lives
//! in RwLock-protected maps; every write transaction carries an overlay
//! (created nodes/edges, touched nodes, `to`-stamps) that is merged into
//! the base on commit and simply dropped on rollback.
//!
//! Reads through a transaction merge base + overlay, so a migration's later
//! queries see rows its earlier queries created before anything commits.
//!
//! ## Limitations
//!
//! - **Single-writer**: overlapping write transactions are not detected;
//!   the caller is expected to hold the advisory lock that serializes
//!   structurally conflicting operations.
//! - **No property indexes**: label scans are index-backed, property
//!   lookups do a full scan.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::debug;
use uuid::Uuid;

use super::{EdgeSpec, GraphStore};
use crate::model::*;
use crate::tx::{Transaction, TxId, TxMode};
use crate::{Error, Result};

// ============================================================================
// MemoryStore
// ============================================================================

/// In-memory versioned graph storage.
pub struct MemoryStore {
    inner: Arc<MemoryInner>,
}

struct MemoryInner {
    nodes: RwLock<HashMap<NodeId, Node>>,
    edges: RwLock<HashMap<EdgeId, EdgeRecord>>,
    /// node id → incident edge record ids
    adjacency: RwLock<HashMap<NodeId, Vec<EdgeId>>>,
    /// label → node ids
    label_index: RwLock<HashMap<String, Vec<NodeId>>>,
    next_node_id: AtomicU64,
    next_edge_id: AtomicU64,
    next_tx_id: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MemoryInner {
                nodes: RwLock::new(HashMap::new()),
                edges: RwLock::new(HashMap::new()),
                adjacency: RwLock::new(HashMap::new()),
                label_index: RwLock::new(HashMap::new()),
                next_node_id: AtomicU64::new(1),
                next_edge_id: AtomicU64::new(1),
                next_tx_id: AtomicU64::new(1),
            }),
        }
    }

    /// A base edge record with the transaction's pending `to`-stamp applied.
    fn materialize_base(&self, tx: &MemoryTx, id: EdgeId) -> Option<EdgeRecord> {
        let record = self.inner.edges.read().get(&id).cloned()?;
        match tx.ended.get(&id) {
            Some(to) => Some(EdgeRecord { to: Some(*to), ..record }),
            None => Some(record),
        }
    }

    fn require_write(tx: &MemoryTx) -> Result<()> {
        if tx.mode != TxMode::ReadWrite {
            return Err(Error::Tx("write attempted in a read-only transaction".into()));
        }
        Ok(())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// MemoryTx
// ============================================================================

/// Transaction overlay: everything written since `begin_tx`, applied to the
/// base on commit, dropped on rollback.
pub struct MemoryTx {
    id: TxId,
    mode: TxMode,
    /// Nodes created or touched (property upserts) in this transaction.
    nodes: HashMap<NodeId, Node>,
    /// Edge records created in this transaction.
    edges: HashMap<EdgeId, EdgeRecord>,
    /// `to`-stamps pending against base records.
    ended: HashMap<EdgeId, Timestamp>,
    /// Adjacency additions for edges created in this transaction.
    adjacency: HashMap<NodeId, Vec<EdgeId>>,
}

impl Transaction for MemoryTx {
    fn mode(&self) -> TxMode {
        self.mode
    }

    fn id(&self) -> TxId {
        self.id
    }
}

// ============================================================================
// GraphStore impl
// ============================================================================

#[async_trait]
impl GraphStore for MemoryStore {
    type Tx = MemoryTx;

    async fn shutdown(&self) -> Result<()> {
        Ok(())
    }

    async fn begin_tx(&self, mode: TxMode) -> Result<MemoryTx> {
        let id = TxId(self.inner.next_tx_id.fetch_add(1, Ordering::Relaxed));
        debug!(tx = id.0, ?mode, "begin transaction");
        Ok(MemoryTx {
            id,
            mode,
            nodes: HashMap::new(),
            edges: HashMap::new(),
            ended: HashMap::new(),
            adjacency: HashMap::new(),
        })
    }

    async fn commit_tx(&self, tx: MemoryTx) -> Result<()> {
        debug!(
            tx = tx.id.0,
            nodes = tx.nodes.len(),
            edges = tx.edges.len(),
            ended = tx.ended.len(),
            "commit transaction"
        );

        let mut nodes = self.inner.nodes.write();
        let mut edges = self.inner.edges.write();
        let mut adjacency = self.inner.adjacency.write();
        let mut label_index = self.inner.label_index.write();

        for (id, node) in tx.nodes {
            if !nodes.contains_key(&id) {
                for label in &node.labels {
                    label_index.entry(label.clone()).or_default().push(id);
                }
                adjacency.entry(id).or_default();
            }
            nodes.insert(id, node);
        }
        for (id, to) in tx.ended {
            if let Some(record) = edges.get_mut(&id) {
                record.to = Some(to);
            }
        }
        for (id, record) in tx.edges {
            adjacency.entry(record.source).or_default().push(id);
            if record.source != record.target {
                adjacency.entry(record.target).or_default().push(id);
            }
            edges.insert(id, record);
        }

        Ok(())
    }

    async fn rollback_tx(&self, tx: MemoryTx) -> Result<()> {
        debug!(tx = tx.id.0, "rollback transaction");
        // Overlay is dropped; base state was never touched.
        Ok(())
    }

    // ========================================================================
    // Node operations
    // ========================================================================

    async fn create_node(
        &self,
        tx: &mut MemoryTx,
        uuid: Uuid,
        labels: &[&str],
        props: PropertyMap,
    ) -> Result<NodeId> {
        Self::require_write(tx)?;
        let id = NodeId(self.inner.next_node_id.fetch_add(1, Ordering::Relaxed));
        let node = Node {
            id,
            uuid,
            labels: labels.iter().map(|l| l.to_string()).collect(),
            properties: props,
        };
        tx.nodes.insert(id, node);
        Ok(id)
    }

    async fn get_node(&self, tx: &MemoryTx, id: NodeId) -> Result<Option<Node>> {
        if let Some(node) = tx.nodes.get(&id) {
            return Ok(Some(node.clone()));
        }
        Ok(self.inner.nodes.read().get(&id).cloned())
    }

    async fn nodes_by_label(&self, tx: &MemoryTx, label: &str) -> Result<Vec<Node>> {
        let base_ids = self
            .inner
            .label_index
            .read()
            .get(label)
            .cloned()
            .unwrap_or_default();
        let nodes = self.inner.nodes.read();

        let mut result = Vec::new();
        for id in base_ids {
            // Overlay copy wins for touched nodes.
            match tx.nodes.get(&id) {
                Some(touched) => result.push(touched.clone()),
                None => {
                    if let Some(node) = nodes.get(&id) {
                        result.push(node.clone());
                    }
                }
            }
        }
        for node in tx.nodes.values() {
            if !nodes.contains_key(&node.id) && node.has_label(label) {
                result.push(node.clone());
            }
        }
        result.sort_by_key(|n| n.id);
        Ok(result)
    }

    async fn nodes_by_property(
        &self,
        tx: &MemoryTx,
        label: &str,
        key: &str,
        value: &Value,
    ) -> Result<Vec<Node>> {
        let all = self.nodes_by_label(tx, label).await?;
        Ok(all.into_iter().filter(|n| n.get(key) == Some(value)).collect())
    }

    async fn set_node_property(
        &self,
        tx: &mut MemoryTx,
        id: NodeId,
        key: &str,
        val: Value,
    ) -> Result<()> {
        Self::require_write(tx)?;
        if let Some(node) = tx.nodes.get_mut(&id) {
            node.properties.insert(key.to_string(), val);
            return Ok(());
        }
        let base = self
            .inner
            .nodes
            .read()
            .get(&id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("Node {id}")))?;
        let mut touched = base;
        touched.properties.insert(key.to_string(), val);
        tx.nodes.insert(id, touched);
        Ok(())
    }

    // ========================================================================
    // Versioned edge operations
    // ========================================================================

    async fn add_edge(&self, tx: &mut MemoryTx, spec: EdgeSpec) -> Result<EdgeId> {
        Self::require_write(tx)?;

        for endpoint in [spec.source, spec.target] {
            if self.get_node(tx, endpoint).await?.is_none() {
                return Err(Error::NotFound(format!("Edge endpoint node {endpoint}")));
            }
        }

        let id = EdgeId(self.inner.next_edge_id.fetch_add(1, Ordering::Relaxed));
        let record = EdgeRecord {
            id,
            source: spec.source,
            target: spec.target,
            kind: spec.kind,
            branch: spec.branch,
            branch_level: spec.branch_level,
            status: spec.status,
            from: spec.from,
            to: None,
        };
        tx.adjacency.entry(record.source).or_default().push(id);
        if record.source != record.target {
            tx.adjacency.entry(record.target).or_default().push(id);
        }
        tx.edges.insert(id, record);
        Ok(id)
    }

    async fn end_edge(&self, tx: &mut MemoryTx, id: EdgeId, to: Timestamp) -> Result<()> {
        Self::require_write(tx)?;

        if let Some(record) = tx.edges.get_mut(&id) {
            if record.to.is_some() {
                return Err(Error::Storage(format!("edge record {id} is already ended")));
            }
            record.to = Some(to);
            return Ok(());
        }

        let base = self.inner.edges.read();
        let record = base
            .get(&id)
            .ok_or_else(|| Error::NotFound(format!("Edge record {id}")))?;
        if record.to.is_some() || tx.ended.contains_key(&id) {
            return Err(Error::Storage(format!("edge record {id} is already ended")));
        }
        drop(base);
        tx.ended.insert(id, to);
        Ok(())
    }

    async fn get_edge(&self, tx: &MemoryTx, id: EdgeId) -> Result<Option<EdgeRecord>> {
        if let Some(record) = tx.edges.get(&id) {
            return Ok(Some(record.clone()));
        }
        Ok(self.materialize_base(tx, id))
    }

    async fn edges_of(
        &self,
        tx: &MemoryTx,
        node: NodeId,
        dir: Direction,
        kinds: &[EdgeKind],
    ) -> Result<Vec<EdgeRecord>> {
        let mut ids = self
            .inner
            .adjacency
            .read()
            .get(&node)
            .cloned()
            .unwrap_or_default();
        if let Some(pending) = tx.adjacency.get(&node) {
            ids.extend(pending.iter().copied());
        }

        let mut result = Vec::new();
        for id in ids {
            let record = match tx.edges.get(&id) {
                Some(r) => r.clone(),
                None => match self.materialize_base(tx, id) {
                    Some(r) => r,
                    None => continue,
                },
            };
            let matches_dir = match dir {
                Direction::Outgoing => record.source == node,
                Direction::Incoming => record.target == node,
                Direction::Both => true,
            };
            let matches_kind = kinds.is_empty() || kinds.contains(&record.kind);
            if matches_dir && matches_kind {
                result.push(record);
            }
        }
        result.sort_by_key(|r| r.id);
        Ok(result)
    }

    async fn edges_by_kind(&self, tx: &MemoryTx, kind: EdgeKind) -> Result<Vec<EdgeRecord>> {
        let mut result: Vec<EdgeRecord> = self
            .inner
            .edges
            .read()
            .values()
            .filter(|r| r.kind == kind)
            .cloned()
            .collect();
        for record in result.iter_mut() {
            if let Some(to) = tx.ended.get(&record.id) {
                record.to = Some(*to);
            }
        }
        result.extend(tx.edges.values().filter(|r| r.kind == kind).cloned());
        result.sort_by_key(|r| r.id);
        Ok(result)
    }

    // ========================================================================
    // Introspection
    // ========================================================================

    async fn node_count(&self, tx: &MemoryTx) -> Result<u64> {
        let base = self.inner.nodes.read();
        let pending = tx.nodes.keys().filter(|id| !base.contains_key(id)).count();
        Ok((base.len() + pending) as u64)
    }

    async fn edge_count(&self, tx: &MemoryTx) -> Result<u64> {
        Ok((self.inner.edges.read().len() + tx.edges.len()) as u64)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(s: &str) -> Timestamp {
        Timestamp::parse(s).unwrap()
    }

    async fn node(store: &MemoryStore, tx: &mut MemoryTx, label: &str) -> NodeId {
        store
            .create_node(tx, store.generate_uuid(), &[label], PropertyMap::new())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_commit_publishes_writes() {
        let store = MemoryStore::new();
        let mut tx = store.begin_tx(TxMode::ReadWrite).await.unwrap();

        let a = node(&store, &mut tx, "Node").await;
        let b = node(&store, &mut tx, "Node").await;
        store
            .add_edge(
                &mut tx,
                EdgeSpec {
                    source: a,
                    target: b,
                    kind: EdgeKind::IsRelated,
                    branch: "main".into(),
                    branch_level: 0,
                    status: EdgeStatus::Active,
                    from: ts("2025-01-01T00:00:00Z"),
                },
            )
            .await
            .unwrap();
        store.commit_tx(tx).await.unwrap();

        let tx = store.begin_tx(TxMode::ReadOnly).await.unwrap();
        assert_eq!(store.node_count(&tx).await.unwrap(), 2);
        assert_eq!(store.edge_count(&tx).await.unwrap(), 1);
        let edges = store.edges_of(&tx, a, Direction::Outgoing, &[]).await.unwrap();
        assert_eq!(edges.len(), 1);
        assert!(edges[0].is_open());
    }

    #[tokio::test]
    async fn test_rollback_discards_writes() {
        let store = MemoryStore::new();
        let mut tx = store.begin_tx(TxMode::ReadWrite).await.unwrap();
        node(&store, &mut tx, "Node").await;
        store.rollback_tx(tx).await.unwrap();

        let tx = store.begin_tx(TxMode::ReadOnly).await.unwrap();
        assert_eq!(store.node_count(&tx).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_read_your_own_writes() {
        let store = MemoryStore::new();
        let mut tx = store.begin_tx(TxMode::ReadWrite).await.unwrap();

        let a = node(&store, &mut tx, "Attribute").await;
        // Visible inside the same transaction, before commit.
        assert!(store.get_node(&tx, a).await.unwrap().is_some());
        assert_eq!(store.nodes_by_label(&tx, "Attribute").await.unwrap().len(), 1);

        // Not visible to an independent transaction.
        let other = store.begin_tx(TxMode::ReadOnly).await.unwrap();
        assert!(store.nodes_by_label(&other, "Attribute").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_end_edge_is_buffered_until_commit() {
        let store = MemoryStore::new();
        let mut tx = store.begin_tx(TxMode::ReadWrite).await.unwrap();
        let a = node(&store, &mut tx, "Node").await;
        let b = node(&store, &mut tx, "Node").await;
        let edge = store
            .add_edge(
                &mut tx,
                EdgeSpec {
                    source: a,
                    target: b,
                    kind: EdgeKind::HasAttribute,
                    branch: "main".into(),
                    branch_level: 0,
                    status: EdgeStatus::Active,
                    from: ts("2025-01-01T00:00:00Z"),
                },
            )
            .await
            .unwrap();
        store.commit_tx(tx).await.unwrap();

        let mut tx = store.begin_tx(TxMode::ReadWrite).await.unwrap();
        store.end_edge(&mut tx, edge, ts("2025-01-02T00:00:00Z")).await.unwrap();

        // The stamp is visible inside the transaction...
        let seen = store.get_edge(&tx, edge).await.unwrap().unwrap();
        assert_eq!(seen.to, Some(ts("2025-01-02T00:00:00Z")));

        // ...but not outside until commit.
        let other = store.begin_tx(TxMode::ReadOnly).await.unwrap();
        assert!(store.get_edge(&other, edge).await.unwrap().unwrap().is_open());

        store.commit_tx(tx).await.unwrap();
        let after = store.begin_tx(TxMode::ReadOnly).await.unwrap();
        assert!(!store.get_edge(&after, edge).await.unwrap().unwrap().is_open());
    }

    #[tokio::test]
    async fn test_end_edge_twice_fails() {
        let store = MemoryStore::new();
        let mut tx = store.begin_tx(TxMode::ReadWrite).await.unwrap();
        let a = node(&store, &mut tx, "Node").await;
        let b = node(&store, &mut tx, "Node").await;
        let edge = store
            .add_edge(
                &mut tx,
                EdgeSpec {
                    source: a,
                    target: b,
                    kind: EdgeKind::HasValue,
                    branch: "main".into(),
                    branch_level: 0,
                    status: EdgeStatus::Active,
                    from: ts("2025-01-01T00:00:00Z"),
                },
            )
            .await
            .unwrap();
        store.end_edge(&mut tx, edge, ts("2025-01-02T00:00:00Z")).await.unwrap();
        assert!(store.end_edge(&mut tx, edge, ts("2025-01-03T00:00:00Z")).await.is_err());
    }

    #[tokio::test]
    async fn test_write_in_read_only_tx_fails() {
        let store = MemoryStore::new();
        let mut tx = store.begin_tx(TxMode::ReadOnly).await.unwrap();
        let result = store
            .create_node(&mut tx, store.generate_uuid(), &["Node"], PropertyMap::new())
            .await;
        assert!(matches!(result, Err(Error::Tx(_))));
    }
}
