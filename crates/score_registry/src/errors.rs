//! Error types for the registry module

use thiserror::Error;

/// Errors that can occur in the registry module
#[derive(Error, Debug)]
pub enum RegistryError {
    /// Model not found
    #[error("Model not found: {0}")]
    ModelNotFound(String),

    /// Promotion could not be applied as a whole
    #[error("Promotion conflict: {0}")]
    PromotionConflict(String),

    /// Artifact write failed
    #[error("Artifact store error: {0}")]
    ArtifactStore(String),

    /// Storage backend error
    #[error("Storage error: {0}")]
    Storage(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Core error
    #[error("Core error: {0}")]
    Core(#[from] riskscore_core::CoreError),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type for registry operations
pub type Result<T> = std::result::Result<T, RegistryError>;
