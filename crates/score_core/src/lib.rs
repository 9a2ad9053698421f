//! Core model representation and inference for the riskscore pipeline
//!
//! Everything the training and serving sides share lives here:
//!
//! - `schema`: versioned, ordered feature schema and serve-time reconciliation
//! - `transform`: fit-once / apply-anywhere feature engineering
//! - `gbdt`: native and optimized forms of the trained ensemble
//! - `artifact`: the on-disk artifact directory contract and active pointer
//! - `engine`: the concurrent-read, swap-on-reload scoring engine
//! - `metrics`: evaluation metrics frozen per artifact

pub mod artifact;
pub mod engine;
pub mod errors;
pub mod gbdt;
pub mod metrics;
pub mod schema;
pub mod transform;

pub use artifact::{ActivePointer, ArtifactPaths, FeatureManifest};
pub use engine::{scale, EngineHealth, ModelBackend, ScoredResult, ScoringEngine};
pub use errors::{CoreError, Result};
pub use gbdt::{FlatModel, Model, Node, Tree};
pub use metrics::ModelMetrics;
pub use schema::FeatureSchema;
pub use transform::{TransformConfig, TransformSpec, TRANSFORM_VERSION};

/// Crate version string for metadata and reports
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
