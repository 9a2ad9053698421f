//! Scoring service composition root
//!
//! Owns the injected engine and answers the scoring surface. Reload is an
//! explicit method call here, not an implicit global refresh; the engine
//! swaps state only after the replacement is fully loaded.

use crate::errors::{Result, ServiceError};
use crate::types::{
    BatchScoringRequest, BatchScoringResponse, FeatureImpact, HealthResponse, ScoringRequest,
    ScoringResponse,
};
use riskscore_core::ScoringEngine;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// How many top features each response carries
const TOP_FEATURES: usize = 5;

/// Serving facade over one engine instance
pub struct ScoringService {
    engine: Arc<ScoringEngine>,
}

impl ScoringService {
    pub fn new(engine: Arc<ScoringEngine>) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &Arc<ScoringEngine> {
        &self.engine
    }

    /// Top-impact features from the loaded model's importance ranking
    fn top_features(&self) -> Vec<FeatureImpact> {
        let importance = self.engine.feature_importance();
        let schema = self.engine.schema_features();

        let position = |name: &str| {
            schema.iter().position(|f| f == name).unwrap_or(usize::MAX)
        };

        let mut ranked: Vec<(String, f64)> = importance.into_iter().collect();
        ranked.sort_by(|a, b| {
            b.1.total_cmp(&a.1)
                .then_with(|| position(&a.0).cmp(&position(&b.0)))
        });

        ranked
            .into_iter()
            .take(TOP_FEATURES)
            .map(|(feature, impact)| FeatureImpact { feature, impact })
            .collect()
    }

    /// Score one subject
    pub fn score(&self, request: &ScoringRequest) -> ScoringResponse {
        let result = self.engine.score(&request.features);
        if !result.missing_features.is_empty() {
            warn!(
                subject = %request.subject_id,
                missing = result.missing_features.len(),
                "Scored with zero-filled features"
            );
        }

        ScoringResponse {
            subject_id: request.subject_id.clone(),
            score: result.score,
            raw_output: result.raw_output,
            top_features: self.top_features(),
        }
    }

    /// Score a batch; result order matches request order.
    pub fn score_batch(&self, request: &BatchScoringRequest) -> BatchScoringResponse {
        let start = Instant::now();

        let feature_maps: Vec<_> = request
            .items
            .iter()
            .map(|item| item.features.clone())
            .collect();
        let scored = self.engine.score_batch(&feature_maps);
        let top_features = self.top_features();

        let results: Vec<ScoringResponse> = request
            .items
            .iter()
            .zip(scored)
            .map(|(item, result)| ScoringResponse {
                subject_id: item.subject_id.clone(),
                score: result.score,
                raw_output: result.raw_output,
                top_features: top_features.clone(),
            })
            .collect();

        BatchScoringResponse {
            batch_size: results.len(),
            processing_time_ms: start.elapsed().as_secs_f64() * 1000.0,
            results,
        }
    }

    /// Health probe: whether a model is loaded and which one
    pub fn health(&self) -> HealthResponse {
        let health = self.engine.health();
        HealthResponse {
            model_loaded: health.model_loaded,
            version_tag: Some(health.version_tag),
            backend: Some(health.backend.to_string()),
        }
    }

    /// Explicitly reload the engine from the active pointer
    pub fn reload(&self) -> Result<()> {
        let outcome = self
            .engine
            .reload()
            .map_err(|e| ServiceError::Unavailable(e.to_string()))?;
        if outcome.swapped {
            info!(
                previous = %outcome.previous_version,
                current = %outcome.current_version,
                "Serving reloaded onto new model"
            );
        }
        Ok(())
    }
}
