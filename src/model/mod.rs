//! # Versioned Graph Model
//!
//! Pure data types for the branch-aware temporal graph: timestamps,
//! branches, stored elements and the versioned edge records all history is
//! made of.
//!
//! Design rule: this module is pure data — no I/O, no state, no async.

pub mod timestamp;
pub mod branch;
pub mod node;
pub mod edge;
pub mod value;

pub use timestamp::Timestamp;
pub use branch::{Branch, DEFAULT_BRANCH};
pub use node::{labels, Node, NodeId};
pub use edge::{Direction, EdgeId, EdgeKind, EdgeRecord, EdgeStatus};
pub use value::{PropertyMap, Value};
