//! Error types for the core module

use thiserror::Error;

/// Errors that can occur in the core module
#[derive(Error, Debug)]
pub enum CoreError {
    /// No backend could be loaded for the active artifact
    #[error("Model unavailable: {0}")]
    ModelUnavailable(String),

    /// Model structure failed validation
    #[error("Model validation failed: {0}")]
    InvalidModel(String),

    /// Artifact directory is missing a required file or pointer
    #[error("Artifact error: {0}")]
    Artifact(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Binary encoding error
    #[error("Encoding error: {0}")]
    Encoding(String),
}

/// Result type for core operations
pub type Result<T> = std::result::Result<T, CoreError>;
