//! Offline GBDT training pipeline for riskscore
//!
//! Deterministic dataset construction, leakage-safe temporal splitting,
//! boosted-tree training with early stopping, evaluation, and the pipeline
//! that writes and (conditionally) promotes versioned model artifacts.

pub mod cart;
pub mod dataset;
pub mod deterministic;
pub mod errors;
pub mod evaluate;
pub mod gbdt;
pub mod pipeline;
pub mod split;

pub use dataset::{
    Dataset, DatasetBuilder, DatasetBuilderConfig, FeatureSnapshot, JsonlOutcomeSource,
    JsonlSnapshotSource, OutcomeRecord, OutcomeSource, SnapshotSource, TrainingExample,
    HARD_MIN_ROWS,
};
pub use deterministic::{LcgRng, SplitTieBreaker};
pub use errors::TrainerError;
pub use evaluate::{evaluate, pr_auc, roc_auc};
pub use gbdt::{GbdtConfig, GbdtTrainer, TrainingDiagnostics};
pub use pipeline::{PipelineConfig, TrainingPipeline, TrainingRunReport};
pub use split::{temporal_split, SplitReport};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
