//! Artifact store: immutable, versioned model directories
//!
//! `write` lays down the full directory contract for one trained model:
//! native form (required), optimized form (best-effort), feature manifest,
//! frozen metrics, and human-readable feature descriptions. Artifacts are
//! written once and never mutated or deleted by this subsystem.

use crate::errors::{RegistryError, Result};
use crate::types::ModelRecord;
use chrono::Utc;
use riskscore_core::artifact::ArtifactPaths;
use riskscore_core::{FeatureManifest, FlatModel, Model, ModelMetrics};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Result of writing one artifact
#[derive(Debug, Clone)]
pub struct WrittenArtifact {
    pub version_tag: String,
    pub dir: PathBuf,
    /// blake3 hash of the native form
    pub model_hash: String,
    /// False when the optimized export failed (native form still usable)
    pub has_optimized: bool,
}

impl WrittenArtifact {
    /// Registry row for this artifact (registered unpromoted)
    pub fn to_record(&self, metrics: &ModelMetrics) -> ModelRecord {
        ModelRecord::new(
            self.version_tag.clone(),
            self.dir.to_string_lossy().into_owned(),
            metrics.roc_auc,
        )
    }
}

/// Store rooted at one model directory
pub struct ArtifactStore {
    base_dir: PathBuf,
}

impl ArtifactStore {
    pub fn new<P: Into<PathBuf>>(base_dir: P) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Derive a globally unique version tag from rounded AUC and the
    /// creation date; collisions get a sequence suffix.
    fn next_version_tag(&self, roc_auc: f64) -> String {
        let date = Utc::now().format("%Y-%m-%d");
        let base = format!("v{roc_auc:.3}-{date}");

        if !self.base_dir.join(&base).exists() {
            return base;
        }
        let mut seq = 2usize;
        loop {
            let candidate = format!("{base}-{seq}");
            if !self.base_dir.join(&candidate).exists() {
                return candidate;
            }
            seq += 1;
        }
    }

    /// Persist one trained model as a new immutable artifact directory.
    pub fn write(
        &self,
        model: &Model,
        manifest: &FeatureManifest,
        metrics: &ModelMetrics,
    ) -> Result<WrittenArtifact> {
        fs::create_dir_all(&self.base_dir)?;

        let version_tag = self.next_version_tag(metrics.roc_auc);
        let dir = self.base_dir.join(&version_tag);
        fs::create_dir_all(&dir)?;
        let paths = ArtifactPaths::new(&dir);

        // Native form is required; any failure aborts the write
        model
            .save(&paths.native_model())
            .map_err(|e| RegistryError::ArtifactStore(format!("Native model write failed: {e}")))?;
        let model_hash = model
            .hash_hex()
            .map_err(|e| RegistryError::ArtifactStore(e.to_string()))?;

        // Optimized form is best-effort; the artifact stays valid without it
        let has_optimized = match FlatModel::from(model).save(&paths.optimized_model()) {
            Ok(()) => true,
            Err(e) => {
                warn!(
                    version = %version_tag,
                    error = %e,
                    "Optimized model export failed; artifact keeps native form only"
                );
                false
            }
        };

        manifest.save(&paths.features())?;
        fs::write(paths.metrics(), serde_json::to_vec_pretty(metrics)?)?;

        let descriptions =
            generate_feature_descriptions(&manifest.schema.features, &metrics.feature_importance);
        fs::write(
            paths.descriptions(),
            serde_json::to_vec_pretty(&descriptions)?,
        )?;

        info!(
            version = %version_tag,
            dir = %dir.display(),
            hash = %model_hash,
            optimized = has_optimized,
            "Artifact written"
        );

        Ok(WrittenArtifact {
            version_tag,
            dir,
            model_hash,
            has_optimized,
        })
    }
}

/// Human-readable descriptions for `metric_*` columns, kept alongside the
/// artifact for downstream display.
pub fn generate_feature_descriptions(
    feature_names: &[String],
    importance: &BTreeMap<String, f64>,
) -> BTreeMap<String, String> {
    let mut descriptions = BTreeMap::new();

    for feature in feature_names {
        let description = if let Some(clean) = feature.strip_prefix("metric_") {
            let words: Vec<String> = clean
                .split('_')
                .map(|word| {
                    let mut chars = word.chars();
                    match chars.next() {
                        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                        None => String::new(),
                    }
                })
                .collect();
            let mut text = words.join(" ");
            if let Some(value) = importance.get(feature) {
                if *value > 0.0 {
                    text.push_str(" (model predictor)");
                }
            }
            text
        } else {
            feature.clone()
        };
        descriptions.insert(feature.clone(), description);
    }

    descriptions
}
