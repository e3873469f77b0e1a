//! Diff queries: what changed on a branch inside a time window.
//!
//! Diffs are branch-local by design — they report what changed *on* the
//! target branch, never inherited history, so the filter here is a plain
//! branch-name match rather than the ancestry filter reads use. Because
//! the store is append-only, every change event is enumerated by a record
//! whose `from` lies in the half-open window `[diff_from, diff_to)`;
//! end-stamps always pair with a creation or a tombstone on the same
//! branch and are not counted separately.

use tracing::debug;

use crate::model::{Branch, EdgeKind, EdgeRecord, Timestamp};
use crate::query::{QueryStats, QueryType};
use crate::storage::GraphStore;
use crate::tx::TxMode;
use crate::Result;

/// Edge kinds that carry node-to-node relationships.
const RELATIONSHIP_KINDS: &[EdgeKind] = &[EdgeKind::IsRelated];

/// Edge kinds that carry the properties of an attribute or relationship:
/// value, ownership and the protected/visible flags. A flag flip counts as
/// its own diff entry even when the relationship itself did not change.
const PROPERTY_KINDS: &[EdgeKind] = &[
    EdgeKind::HasValue,
    EdgeKind::HasOwner,
    EdgeKind::HasSource,
    EdgeKind::IsProtected,
    EdgeKind::IsVisible,
];

// ============================================================================
// Window scan (shared by both queries)
// ============================================================================

#[derive(Debug, Clone)]
struct DiffScan {
    branch: Branch,
    diff_from: Timestamp,
    diff_to: Timestamp,
    results: Vec<EdgeRecord>,
    stats: QueryStats,
}

impl DiffScan {
    fn new(branch: Branch, diff_from: Option<Timestamp>, diff_to: Option<Timestamp>) -> Self {
        // Default window: everything since this branch was created.
        let diff_from = diff_from.unwrap_or(branch.branched_from);
        let diff_to = Timestamp::resolve(diff_to);
        Self {
            branch,
            diff_from,
            diff_to,
            results: Vec::new(),
            stats: QueryStats::default(),
        }
    }

    fn in_window(&self, record: &EdgeRecord) -> bool {
        record.branch == self.branch.name
            && record.from >= self.diff_from
            && record.from < self.diff_to
    }

    async fn collect<S: GraphStore>(&mut self, store: &S, kinds: &[EdgeKind]) -> Result<()> {
        let tx = store.begin_tx(TxMode::ReadOnly).await?;
        let mut found = Vec::new();
        for kind in kinds {
            let records = store.edges_by_kind(&tx, *kind).await?;
            found.extend(records.into_iter().filter(|r| self.in_window(r)));
        }
        store.commit_tx(tx).await?;

        found.sort_by_key(|r| (r.from, r.id));
        self.stats.nbr_processed = found.len() as u64;
        debug!(
            branch = %self.branch.name,
            from = %self.diff_from,
            to = %self.diff_to,
            entries = found.len(),
            "diff scan"
        );
        self.results = found;
        Ok(())
    }
}

// ============================================================================
// DiffRelationshipQuery
// ============================================================================

/// Relationship-edge records that changed on `branch` within the window.
#[derive(Debug, Clone)]
pub struct DiffRelationshipQuery {
    scan: DiffScan,
}

impl DiffRelationshipQuery {
    /// `diff_from` defaults to the branch's fork point, `diff_to` to now.
    pub fn new(branch: Branch, diff_from: Option<Timestamp>, diff_to: Option<Timestamp>) -> Self {
        Self { scan: DiffScan::new(branch, diff_from, diff_to) }
    }

    pub fn query_type(&self) -> QueryType {
        QueryType::Read
    }

    pub async fn execute<S: GraphStore>(&mut self, store: &S) -> Result<()> {
        self.scan.collect(store, RELATIONSHIP_KINDS).await
    }

    /// The result rows, in deterministic (`from`, id) order.
    pub fn results(&self) -> impl Iterator<Item = &EdgeRecord> {
        self.scan.results.iter()
    }

    pub fn stats(&self) -> &QueryStats {
        &self.scan.stats
    }

    /// The effective half-open window `[diff_from, diff_to)`.
    pub fn window(&self) -> (Timestamp, Timestamp) {
        (self.scan.diff_from, self.scan.diff_to)
    }
}

// ============================================================================
// DiffRelationshipPropertyQuery
// ============================================================================

/// Property-level changes on `branch` within the window: value, owner,
/// source and flag records, each reported as its own entry.
#[derive(Debug, Clone)]
pub struct DiffRelationshipPropertyQuery {
    scan: DiffScan,
}

impl DiffRelationshipPropertyQuery {
    /// `diff_from` defaults to the branch's fork point, `diff_to` to now.
    pub fn new(branch: Branch, diff_from: Option<Timestamp>, diff_to: Option<Timestamp>) -> Self {
        Self { scan: DiffScan::new(branch, diff_from, diff_to) }
    }

    pub fn query_type(&self) -> QueryType {
        QueryType::Read
    }

    pub async fn execute<S: GraphStore>(&mut self, store: &S) -> Result<()> {
        self.scan.collect(store, PROPERTY_KINDS).await
    }

    /// The result rows, in deterministic (`from`, id) order.
    pub fn results(&self) -> impl Iterator<Item = &EdgeRecord> {
        self.scan.results.iter()
    }

    pub fn stats(&self) -> &QueryStats {
        &self.scan.stats
    }

    /// The effective half-open window `[diff_from, diff_to)`.
    pub fn window(&self) -> (Timestamp, Timestamp) {
        (self.scan.diff_from, self.scan.diff_to)
    }
}
