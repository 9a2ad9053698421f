//! GBDT model representations
//!
//! Two serialized forms of the same trained ensemble:
//!
//! - **Native** (`model::Model`): JSON, full structure, column names and
//!   frozen importance; the required form every artifact carries.
//! - **Optimized** (`flat::FlatModel`): bincode structure-of-arrays arena,
//!   execution-only; produced best-effort for lower-latency serving.
//!
//! Both forms are immutable once written and score identically.

pub mod flat;
pub mod model;
pub mod tree;

pub use flat::FlatModel;
pub use model::{Model, MODEL_FORMAT_VERSION};
pub use tree::{Node, Tree};
