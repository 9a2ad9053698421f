//! Errors returned by the offline training pipeline.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TrainerError {
    /// Too few labeled rows to train anything; the run aborts before any
    /// artifact is written.
    #[error("insufficient training data: {found} rows, {required} required")]
    InsufficientData { found: usize, required: usize },

    #[error("dataset error: {0}")]
    Dataset(String),

    #[error("training error: {0}")]
    Training(String),

    #[error("evaluation error: {0}")]
    Evaluation(String),

    #[error("registry error: {0}")]
    Registry(#[from] riskscore_registry::RegistryError),

    #[error("core error: {0}")]
    Core(#[from] riskscore_core::CoreError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for trainer operations
pub type Result<T> = std::result::Result<T, TrainerError>;
