//! Wire types for the scoring surface
//!
//! Field names are the external contract; the HTTP layer that carries them
//! lives outside this crate.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Single scoring request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringRequest {
    pub subject_id: String,
    pub features: BTreeMap<String, f64>,
    /// Whether the caller wants the score persisted downstream
    #[serde(default)]
    pub persist: bool,
}

/// One feature with its impact on the score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureImpact {
    pub feature: String,
    pub impact: f64,
}

/// Single scoring response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringResponse {
    pub subject_id: String,
    /// Published risk score, integer in [0, 100]
    pub score: i32,
    /// Raw model output (log-odds)
    pub raw_output: f64,
    /// Up to five highest-impact features
    pub top_features: Vec<FeatureImpact>,
}

/// Batch scoring request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchScoringRequest {
    pub items: Vec<ScoringRequest>,
}

/// Batch scoring response (order matches the request)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchScoringResponse {
    pub results: Vec<ScoringResponse>,
    pub batch_size: usize,
    pub processing_time_ms: f64,
}

/// Health probe response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub model_loaded: bool,
    pub version_tag: Option<String>,
    pub backend: Option<String>,
}
