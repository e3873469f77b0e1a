//! # Storage Trait
//!
//! This is THE contract between the versioning core and any graph engine.
//! Every primitive the branch-aware store needs is defined here.
//!
//! The edge operations encode the append-only model directly: records are
//! added via `add_edge` and ended via `end_edge`; there is no update or
//! delete. Branch/time visibility is NOT the backend's job — the query
//! layer filters records in process (or renders the equivalent predicate
//! for statement-based drivers).
//!
//! ## Implementations
//!
//! | Backend | Module | Description |
//! |---------|--------|-------------|
//! | `MemoryStore` | `memory` | In-memory with overlay transactions |

pub mod memory;

use async_trait::async_trait;
use uuid::Uuid;

use crate::model::*;
use crate::tx::{Transaction, TxMode};
use crate::Result;

pub use memory::MemoryStore;

// ============================================================================
// Edge specification
// ============================================================================

/// Everything needed to append one edge record.
///
/// `to` is intentionally absent: new records are always open. Ending a
/// record is a separate operation (`end_edge`) — the only in-place
/// mutation the store permits.
#[derive(Debug, Clone)]
pub struct EdgeSpec {
    pub source: NodeId,
    pub target: NodeId,
    pub kind: EdgeKind,
    pub branch: String,
    pub branch_level: u32,
    pub status: EdgeStatus,
    pub from: Timestamp,
}

impl EdgeSpec {
    /// An active record on the given branch, visible from `from`.
    pub fn active(
        source: NodeId,
        target: NodeId,
        kind: EdgeKind,
        branch: &Branch,
        from: Timestamp,
    ) -> Self {
        Self {
            source,
            target,
            kind,
            branch: branch.name.clone(),
            branch_level: branch.hierarchy_level,
            status: EdgeStatus::Active,
            from,
        }
    }

    /// A deleted-status record — the tombstone half of the
    /// duplicate-as-deleted pattern.
    pub fn deleted(
        source: NodeId,
        target: NodeId,
        kind: EdgeKind,
        branch: &Branch,
        from: Timestamp,
    ) -> Self {
        Self {
            status: EdgeStatus::Deleted,
            ..Self::active(source, target, kind, branch, from)
        }
    }
}

// ============================================================================
// GraphStore Trait
// ============================================================================

/// The universal storage contract.
///
/// Any engine that implements this trait can carry the versioned graph.
/// All operations are awaitable; every call is a suspension point.
#[async_trait]
pub trait GraphStore: Send + Sync + 'static {
    /// The transaction type for this backend.
    type Tx: Transaction;

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Shut down the backend, flushing any pending writes.
    async fn shutdown(&self) -> Result<()>;

    /// Generate a UUID usable inside a write. Some engines require ids to
    /// be generated query-side; the trait makes that the universal path.
    fn generate_uuid(&self) -> Uuid {
        Uuid::new_v4()
    }

    // ========================================================================
    // Transactions
    // ========================================================================

    /// Begin a new transaction.
    async fn begin_tx(&self, mode: TxMode) -> Result<Self::Tx>;

    /// Commit a transaction, publishing its writes.
    async fn commit_tx(&self, tx: Self::Tx) -> Result<()>;

    /// Roll back a transaction, discarding its writes.
    async fn rollback_tx(&self, tx: Self::Tx) -> Result<()>;

    // ========================================================================
    // Node operations
    // ========================================================================

    /// Create a node with the given labels and properties.
    async fn create_node(
        &self,
        tx: &mut Self::Tx,
        uuid: Uuid,
        labels: &[&str],
        props: PropertyMap,
    ) -> Result<NodeId>;

    /// Get a node by storage id. Returns None if not found.
    async fn get_node(&self, tx: &Self::Tx, id: NodeId) -> Result<Option<Node>>;

    /// Find all nodes with a given label.
    async fn nodes_by_label(&self, tx: &Self::Tx, label: &str) -> Result<Vec<Node>>;

    /// Find nodes by label + property value.
    async fn nodes_by_property(
        &self,
        tx: &Self::Tx,
        label: &str,
        key: &str,
        value: &Value,
    ) -> Result<Vec<Node>>;

    /// Set a property on a node (upsert). Reserved for non-versioned
    /// bookkeeping (e.g. `Root.graph_version`) — versioned data always
    /// goes through edge records.
    async fn set_node_property(
        &self,
        tx: &mut Self::Tx,
        id: NodeId,
        key: &str,
        val: Value,
    ) -> Result<()>;

    // ========================================================================
    // Versioned edge operations
    // ========================================================================

    /// Append one edge record.
    async fn add_edge(&self, tx: &mut Self::Tx, spec: EdgeSpec) -> Result<EdgeId>;

    /// Stamp `to` on an existing record, ending its visibility.
    ///
    /// Fails if the record is already ended — an ended record is immutable.
    async fn end_edge(&self, tx: &mut Self::Tx, id: EdgeId, to: Timestamp) -> Result<()>;

    /// Get an edge record by id.
    async fn get_edge(&self, tx: &Self::Tx, id: EdgeId) -> Result<Option<EdgeRecord>>;

    /// All records incident to a node, historical ones included, filtered
    /// by direction and (optionally) kinds. Empty `kinds` means all kinds.
    async fn edges_of(
        &self,
        tx: &Self::Tx,
        node: NodeId,
        dir: Direction,
        kinds: &[EdgeKind],
    ) -> Result<Vec<EdgeRecord>>;

    /// All records of a given kind, historical ones included.
    async fn edges_by_kind(&self, tx: &Self::Tx, kind: EdgeKind) -> Result<Vec<EdgeRecord>>;

    // ========================================================================
    // Introspection
    // ========================================================================

    /// Total number of nodes.
    async fn node_count(&self, tx: &Self::Tx) -> Result<u64>;

    /// Total number of edge records (including historical ones).
    async fn edge_count(&self, tx: &Self::Tx) -> Result<u64>;
}
