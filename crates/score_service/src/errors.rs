//! Error types for the serving layer

use thiserror::Error;

/// Errors that can occur in the serving layer
#[derive(Error, Debug)]
pub enum ServiceError {
    /// No model is loaded; serving cannot proceed
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    /// A scoring call exceeded its bounded timeout
    #[error("Scoring timed out after {timeout_ms} ms")]
    Timeout { timeout_ms: u64 },

    /// Scoring a single subject failed
    #[error("Scoring failed: {0}")]
    Scoring(String),

    /// Persisting a score failed
    #[error("Score sink error: {0}")]
    Sink(String),

    /// Core error
    #[error("Core error: {0}")]
    Core(#[from] riskscore_core::CoreError),
}

/// Result type for serving operations
pub type Result<T> = std::result::Result<T, ServiceError>;
