//! Model artifact store, registry, and promotion policy
//!
//! Persists each trained model as an immutable versioned artifact directory,
//! tracks artifact metadata as append-only registry rows, and owns the
//! champion/challenger promotion gate with its single-promoted-row
//! invariant and atomically-swapped active pointer.

pub mod artifact;
pub mod errors;
pub mod registry;
pub mod storage;
pub mod types;

pub use artifact::{generate_feature_descriptions, ArtifactStore, WrittenArtifact};
pub use errors::{RegistryError, Result};
pub use registry::ModelRegistry;
pub use storage::RegistryStorage;
pub use types::{ModelRecord, RegistryConfig};

/// Crate version string for metadata and reports
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
