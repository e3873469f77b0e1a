//! # Query Layer
//!
//! Branch/time-filtered reads and writes over the versioned edge store.
//! Every read or write against the versioned graph goes through here: the
//! filter decides which records are visible, `resolve_current` decides
//! which one wins, and the write helpers implement the append-only
//! end-and-recreate patterns migrations are built from.
//!
//! Query objects are constructed without I/O — plan construction is
//! separated from execution so migrations can compose several queries
//! inside one transaction without intermediate commits.

pub mod filter;
pub mod ops;
pub mod diff;

use async_trait::async_trait;

use crate::model::{EdgeRecord, EdgeStatus};
use crate::storage::GraphStore;
use crate::Result;

pub use filter::{BranchFilter, FilterClause};

// ============================================================================
// Query classification & stats
// ============================================================================

/// Whether a query may mutate the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryType {
    Read,
    Write,
}

/// Execution counters, reported without re-querying the store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueryStats {
    pub nodes_created: u64,
    pub edges_created: u64,
    pub edges_ended: u64,
    /// Elements this query processed — the migration progress counter.
    pub nbr_processed: u64,
}

impl QueryStats {
    pub fn absorb(&mut self, other: &QueryStats) {
        self.nodes_created += other.nodes_created;
        self.edges_created += other.edges_created;
        self.edges_ended += other.edges_ended;
        self.nbr_processed += other.nbr_processed;
    }
}

// ============================================================================
// Query trait
// ============================================================================

/// One executable unit of a migration.
///
/// Constructors do no I/O; all storage access happens in `execute`, against
/// the transaction the migration engine owns.
#[async_trait]
pub trait Query<S: GraphStore>: Send {
    fn name(&self) -> &'static str;

    fn query_type(&self) -> QueryType;

    async fn execute(&mut self, store: &S, tx: &mut S::Tx) -> Result<()>;

    fn stats(&self) -> &QueryStats;

    /// Number of elements this query rewrote, for progress reporting.
    fn nbr_migrations_executed(&self) -> u64 {
        self.stats().nbr_processed
    }
}

// ============================================================================
// Current-record resolution
// ============================================================================

/// Resolve "the current record" among the history of ONE logical edge.
///
/// Tie-break: `branch_level DESC, from DESC` (record id as the final
/// stable tie-break), taken over filter-visible records only. The winner
/// is returned regardless of status; use [`resolve_active`] when only an
/// active winner counts.
pub fn resolve_current<'a>(
    records: impl IntoIterator<Item = &'a EdgeRecord>,
    filter: &BranchFilter,
) -> Option<&'a EdgeRecord> {
    records
        .into_iter()
        .filter(|r| filter.matches(r))
        .max_by_key(|r| (r.branch_level, r.from, r.id))
}

/// [`resolve_current`], then require `status = active` — the full
/// definition of "the current value".
pub fn resolve_active<'a>(
    records: impl IntoIterator<Item = &'a EdgeRecord>,
    filter: &BranchFilter,
) -> Option<&'a EdgeRecord> {
    resolve_current(records, filter).filter(|r| r.status == EdgeStatus::Active)
}
