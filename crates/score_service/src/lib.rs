//! Serving layer for riskscore
//!
//! The composition root that owns the inference engine, the wire types of
//! the scoring surface, the bounded-timeout scoring client, and the batch
//! worker that scores subject populations with per-subject failure
//! isolation.

pub mod client;
pub mod errors;
pub mod service;
pub mod types;
pub mod worker;

#[cfg(test)]
pub(crate) mod test_support;

pub use client::{EngineClient, ScoreClient};
pub use errors::{Result, ServiceError};
pub use service::ScoringService;
pub use types::{
    BatchScoringRequest, BatchScoringResponse, FeatureImpact, HealthResponse, ScoringRequest,
    ScoringResponse,
};
pub use worker::{
    BatchStats, BatchWorker, BatchWorkerConfig, NullSink, ScoreSink, SubjectFeatureSource,
};

/// Crate version string for health and reports
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
