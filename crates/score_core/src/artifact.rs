//! Artifact directory contract
//!
//! One directory per version tag:
//!
//! ```text
//! <model_dir>/
//!   ACTIVE.json            atomically-swapped pointer to the active artifact
//!   v0.812-2025-11-04/
//!     model.json           native form (required)
//!     model.bin            optimized form (best-effort)
//!     features.json        ordered schema + fitted transform spec
//!     metrics.json         frozen evaluation metrics
//!     feature_descriptions.json
//! ```
//!
//! The pointer is never edited in place: it is written to a temp file and
//! renamed over the old record, so a concurrent loader sees either the old
//! or the new target, never a torn one.

use crate::errors::{CoreError, Result};
use crate::metrics::ModelMetrics;
use crate::schema::FeatureSchema;
use crate::transform::TransformSpec;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const NATIVE_MODEL_FILE: &str = "model.json";
pub const OPTIMIZED_MODEL_FILE: &str = "model.bin";
pub const FEATURES_FILE: &str = "features.json";
pub const METRICS_FILE: &str = "metrics.json";
pub const DESCRIPTIONS_FILE: &str = "feature_descriptions.json";
pub const ACTIVE_POINTER_FILE: &str = "ACTIVE.json";

/// Resolved file locations inside one artifact directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub dir: PathBuf,
}

impl ArtifactPaths {
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self { dir: dir.into() }
    }

    pub fn native_model(&self) -> PathBuf {
        self.dir.join(NATIVE_MODEL_FILE)
    }

    pub fn optimized_model(&self) -> PathBuf {
        self.dir.join(OPTIMIZED_MODEL_FILE)
    }

    pub fn features(&self) -> PathBuf {
        self.dir.join(FEATURES_FILE)
    }

    pub fn metrics(&self) -> PathBuf {
        self.dir.join(METRICS_FILE)
    }

    pub fn descriptions(&self) -> PathBuf {
        self.dir.join(DESCRIPTIONS_FILE)
    }
}

/// `features.json` payload: the schema and the fitted transform that
/// produced it, frozen together so serving can replay training exactly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureManifest {
    pub schema: FeatureSchema,
    pub transform: TransformSpec,
}

impl FeatureManifest {
    pub fn save(&self, path: &Path) -> Result<()> {
        fs::write(path, serde_json::to_vec_pretty(self)?)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let bytes = fs::read(path)?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

/// Read frozen metrics from an artifact directory
pub fn load_metrics(paths: &ArtifactPaths) -> Result<ModelMetrics> {
    let bytes = fs::read(paths.metrics())?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Pointer record referencing exactly one artifact directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivePointer {
    pub version_tag: String,
    pub artifact_dir: PathBuf,
    pub updated_at: DateTime<Utc>,
}

impl ActivePointer {
    pub fn new(version_tag: String, artifact_dir: PathBuf) -> Self {
        Self {
            version_tag,
            artifact_dir,
            updated_at: Utc::now(),
        }
    }

    /// Read the current pointer, if any
    pub fn read(model_dir: &Path) -> Result<Option<ActivePointer>> {
        let path = model_dir.join(ACTIVE_POINTER_FILE);
        if !path.exists() {
            return Ok(None);
        }
        let bytes = fs::read(&path)?;
        Ok(Some(serde_json::from_slice(&bytes)?))
    }

    /// Atomically repoint the active record (write temp, then rename)
    pub fn swap(&self, model_dir: &Path) -> Result<()> {
        fs::create_dir_all(model_dir)?;
        let target = model_dir.join(ACTIVE_POINTER_FILE);
        let tmp = model_dir.join(format!("{ACTIVE_POINTER_FILE}.tmp"));

        fs::write(&tmp, serde_json::to_vec_pretty(self)?)?;
        fs::rename(&tmp, &target)?;
        Ok(())
    }

    /// Resolve the pointer target, failing when no pointer exists
    pub fn resolve(model_dir: &Path) -> Result<ActivePointer> {
        Self::read(model_dir)?.ok_or_else(|| {
            CoreError::Artifact(format!(
                "No active artifact pointer in {}",
                model_dir.display()
            ))
        })
    }
}
