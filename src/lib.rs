//! # branchgraph — Branch-Aware Temporal Property Graph Store
//!
//! A property graph store in which every edge is versioned across named
//! branches and time, plus the schema-migration machinery that rewrites
//! that versioned graph safely.
//!
//! ## Design Principles
//!
//! 1. **Trait-first**: `GraphStore` is the contract between the versioning
//!    core and any storage engine
//! 2. **Append-only history**: edge records are never mutated in place —
//!    the single exception is stamping `to` when a record is ended
//! 3. **Filters are pure**: branch/time visibility is a pure function of
//!    (branch ancestry, timestamp), evaluable in-process or rendered as a
//!    parameterized predicate for statement-based drivers
//! 4. **Migrations are transactional**: one transaction per migration,
//!    full rollback on the first failing query
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use branchgraph::{MemoryStore, RegistryContext};
//! use branchgraph::query::diff::DiffRelationshipQuery;
//!
//! # async fn example() -> branchgraph::Result<()> {
//! let store = MemoryStore::new();
//! let registry = RegistryContext::init();
//!
//! let branch = registry.get_branch("main")?;
//! let mut diff = DiffRelationshipQuery::new(branch.clone(), None, None);
//! diff.execute(&store).await?;
//!
//! for change in diff.results() {
//!     println!("{:?}", change);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Storage Backends
//!
//! | Backend | Description |
//! |---------|-------------|
//! | Memory | In-memory store with overlay transactions, for testing/embedding |

// ============================================================================
// Modules
// ============================================================================

pub mod model;
pub mod schema;
pub mod tx;
pub mod storage;
pub mod query;
pub mod migrations;
pub mod registry;

// ============================================================================
// Re-exports: Model
// ============================================================================

pub use model::{
    Branch, Direction, EdgeId, EdgeKind, EdgeRecord, EdgeStatus, Node, NodeId,
    PropertyMap, Timestamp, Value,
};

// ============================================================================
// Re-exports: Schema
// ============================================================================

pub use schema::{
    AttributeSchema, BranchSupport, NodeSchema, RelationshipSchema, SchemaPath,
};

// ============================================================================
// Re-exports: Storage
// ============================================================================

pub use storage::{EdgeSpec, GraphStore, MemoryStore};

// ============================================================================
// Re-exports: Transactions
// ============================================================================

pub use tx::{Transaction, TxId, TxMode};

// ============================================================================
// Re-exports: Migrations & Registry
// ============================================================================

pub use migrations::{MigrationResult, SchemaMigration};
pub use migrations::graph::GraphMigration;
pub use registry::RegistryContext;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Schema path error: {0}")]
    SchemaPath(String),

    #[error("Branch error: {0}")]
    Branch(String),

    #[error("Timestamp parse error: {0}")]
    Timestamp(String),

    #[error("Migration error: {0}")]
    Migration(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Transaction error: {0}")]
    Tx(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Type error: expected {expected}, got {got}")]
    Type { expected: String, got: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
