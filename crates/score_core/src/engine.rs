//! Inference engine serving the currently active artifact.
//!
//! The engine is an explicitly constructed object owned by the serving
//! process's composition root; there is no process-global instance. Once
//! constructed it supports unlimited concurrent readers against one
//! immutable loaded-model state. Reload is the only writer: it builds the
//! replacement state fully off to the side and swaps a single `Arc` under a
//! write lock, so in-flight predictions finish against a consistent model.

use crate::artifact::{self, ActivePointer, ArtifactPaths, FeatureManifest};
use crate::errors::{CoreError, Result};
use crate::gbdt::{FlatModel, Model};
use crate::metrics::ModelMetrics;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};
use tracing::{debug, info, warn};

/// Loaded model backend, selected in priority order.
///
/// The optimized form is tried first; any load error falls back to the
/// native form. Both backends score identically; they differ in traversal
/// cost and in whether they carry an importance payload.
#[derive(Debug)]
pub enum ModelBackend {
    Optimized(FlatModel),
    Native(Model),
}

impl ModelBackend {
    /// Try backends in priority order for one artifact directory.
    pub fn load(paths: &ArtifactPaths) -> Result<Self> {
        let optimized_path = paths.optimized_model();
        if optimized_path.exists() {
            match FlatModel::load(&optimized_path) {
                Ok(flat) => {
                    info!(path = %optimized_path.display(), "Loaded optimized model backend");
                    return Ok(ModelBackend::Optimized(flat));
                }
                Err(e) => {
                    warn!(
                        path = %optimized_path.display(),
                        error = %e,
                        "Failed to load optimized model, falling back to native form"
                    );
                }
            }
        }

        let native_path = paths.native_model();
        match Model::load(&native_path) {
            Ok(model) => {
                info!(path = %native_path.display(), "Loaded native model backend");
                Ok(ModelBackend::Native(model))
            }
            Err(e) => Err(CoreError::ModelUnavailable(format!(
                "No loadable backend in {}: {}",
                paths.dir.display(),
                e
            ))),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ModelBackend::Optimized(_) => "optimized",
            ModelBackend::Native(_) => "native",
        }
    }

    pub fn raw_score(&self, features: &[f64]) -> f64 {
        match self {
            ModelBackend::Optimized(flat) => flat.raw_score(features),
            ModelBackend::Native(model) => model.raw_score(features),
        }
    }

    /// Importance carried by the backend itself, when it has one.
    /// The optimized form is execution-only and returns `None`.
    pub fn native_importance(&self) -> Option<&BTreeMap<String, f64>> {
        match self {
            ModelBackend::Optimized(_) => None,
            ModelBackend::Native(model) => Some(&model.importance),
        }
    }
}

/// One scored request
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredResult {
    /// Published risk score, integer in [0, 100]
    pub score: i32,
    /// Raw model output (log-odds)
    pub raw_output: f64,
    /// Schema features absent from the input, zero-filled
    pub missing_features: Vec<String>,
}

/// Health probe surface for the serving process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineHealth {
    pub model_loaded: bool,
    pub version_tag: String,
    pub backend: &'static str,
}

/// Outcome of an explicit reload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReloadOutcome {
    pub previous_version: String,
    pub current_version: String,
    pub swapped: bool,
}

/// Immutable state the engine serves from
struct LoadedModel {
    backend: ModelBackend,
    manifest: FeatureManifest,
    metrics: ModelMetrics,
    version_tag: String,
    loaded_at: DateTime<Utc>,
}

impl LoadedModel {
    /// Resolve the active pointer and construct the full serving state.
    fn open(model_dir: &Path) -> Result<Self> {
        let pointer = ActivePointer::resolve(model_dir)?;
        let paths = ArtifactPaths::new(&pointer.artifact_dir);

        let backend = ModelBackend::load(&paths)?;
        let manifest = FeatureManifest::load(&paths.features())?;
        let metrics = artifact::load_metrics(&paths)?;

        info!(
            version = %pointer.version_tag,
            backend = backend.kind(),
            features = manifest.schema.len(),
            "Model state constructed"
        );

        Ok(Self {
            backend,
            manifest,
            metrics,
            version_tag: pointer.version_tag,
            loaded_at: Utc::now(),
        })
    }

    fn score(&self, features: &BTreeMap<String, f64>) -> ScoredResult {
        let extended = self.manifest.transform.apply(features);
        let (vector, missing) = self.manifest.schema.reconcile(&extended);

        if !missing.is_empty() {
            warn!(
                version = %self.version_tag,
                missing = ?missing,
                "Input is missing schema features, zero-filled"
            );
        }

        let raw_output = self.backend.raw_score(&vector);
        ScoredResult {
            score: scale(raw_output),
            raw_output,
            missing_features: missing,
        }
    }
}

/// Scale raw model output to the published integer score.
///
/// `sigmoid(raw) * 100`, rounded and clamped to [0, 100]. This is the single
/// contract between the model's internal representation and every external
/// consumer; it must not change with the underlying objective.
pub fn scale(raw_output: f64) -> i32 {
    let probability = 1.0 / (1.0 + (-raw_output).exp());
    let score = (probability * 100.0).round() as i32;
    score.clamp(0, 100)
}

/// Engine bound to the active artifact under one model directory.
pub struct ScoringEngine {
    model_dir: PathBuf,
    state: RwLock<Arc<LoadedModel>>,
    /// Serializes reloads; read paths never take it
    reload_lock: Mutex<()>,
}

impl ScoringEngine {
    /// Construct the engine from the active pointer.
    ///
    /// Fails with `ModelUnavailable` when no backend can be loaded: serving
    /// cannot proceed without a model and the health probe must say so.
    pub fn open<P: Into<PathBuf>>(model_dir: P) -> Result<Self> {
        let model_dir = model_dir.into();
        let state = LoadedModel::open(&model_dir)?;
        Ok(Self {
            model_dir,
            state: RwLock::new(Arc::new(state)),
            reload_lock: Mutex::new(()),
        })
    }

    fn current(&self) -> Arc<LoadedModel> {
        // The Arc inside a poisoned lock is still a consistent snapshot
        let guard = self.state.read().unwrap_or_else(|e| e.into_inner());
        Arc::clone(&guard)
    }

    /// Raw model output (log-odds) for one input mapping.
    pub fn predict(&self, features: &BTreeMap<String, f64>) -> f64 {
        self.current().score(features).raw_output
    }

    /// Score one input mapping on the published 0-100 scale.
    pub fn score(&self, features: &BTreeMap<String, f64>) -> ScoredResult {
        self.current().score(features)
    }

    /// Score a batch, order-preserving and numerically identical to calling
    /// `score` per element against the same snapshot.
    pub fn score_batch(&self, batch: &[BTreeMap<String, f64>]) -> Vec<ScoredResult> {
        let state = self.current();
        batch.iter().map(|features| state.score(features)).collect()
    }

    /// Importance mapping: backend-native when the loaded form carries one,
    /// otherwise the values frozen into the artifact metrics at training time.
    pub fn feature_importance(&self) -> BTreeMap<String, f64> {
        let state = self.current();
        match state.backend.native_importance() {
            Some(importance) if !importance.is_empty() => importance.clone(),
            _ => state.metrics.feature_importance.clone(),
        }
    }

    /// Frozen metrics of the loaded artifact
    pub fn metrics(&self) -> ModelMetrics {
        self.current().metrics.clone()
    }

    /// Schema of the loaded artifact
    pub fn schema_features(&self) -> Vec<String> {
        self.current().manifest.schema.features.clone()
    }

    pub fn active_version(&self) -> String {
        self.current().version_tag.clone()
    }

    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.current().loaded_at
    }

    pub fn health(&self) -> EngineHealth {
        let state = self.current();
        EngineHealth {
            model_loaded: true,
            version_tag: state.version_tag.clone(),
            backend: state.backend.kind(),
        }
    }

    /// Explicitly re-resolve the active pointer and swap in the new state.
    ///
    /// The replacement is fully constructed before the swap; a failed load
    /// leaves the current state serving. Concurrent reload calls are
    /// serialized by a dedicated lock, never blocking readers.
    pub fn reload(&self) -> Result<ReloadOutcome> {
        let _guard = self
            .reload_lock
            .lock()
            .unwrap_or_else(|e| e.into_inner());

        let previous_version = self.active_version();
        let next = LoadedModel::open(&self.model_dir)?;
        let current_version = next.version_tag.clone();
        let swapped = current_version != previous_version;

        {
            let mut guard = self.state.write().unwrap_or_else(|e| e.into_inner());
            *guard = Arc::new(next);
        }

        if swapped {
            info!(
                previous = %previous_version,
                current = %current_version,
                "Engine reloaded onto new artifact"
            );
        } else {
            debug!(version = %current_version, "Engine reloaded, artifact unchanged");
        }

        Ok(ReloadOutcome {
            previous_version,
            current_version,
            swapped,
        })
    }
}
