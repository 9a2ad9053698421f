//! Registry row types and configuration

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

/// Append-only registry row for one model artifact.
///
/// Rows are written once at registration; the only field that ever changes
/// afterwards is `promoted`, and only through `ModelRegistry::promote`.
/// Invariant: at most one row has `promoted == true` at any observable
/// instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelRecord {
    /// Unique row identifier
    pub model_id: Uuid,
    /// Globally unique version tag (also the artifact directory name)
    pub version_tag: String,
    /// Absolute path of the artifact directory
    pub artifact_url: String,
    /// Validation ROC-AUC at training time; input to the promotion gate
    pub train_auc: f64,
    /// Registration timestamp
    pub train_date: DateTime<Utc>,
    /// Whether this artifact is the active champion
    pub promoted: bool,
}

impl ModelRecord {
    pub fn new(version_tag: String, artifact_url: String, train_auc: f64) -> Self {
        Self {
            model_id: Uuid::new_v4(),
            version_tag,
            artifact_url,
            train_auc,
            train_date: Utc::now(),
            promoted: false,
        }
    }
}

/// Registry configuration
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Directory holding artifact directories and the active pointer
    pub model_dir: PathBuf,
    /// Champion/challenger gate: minimum ROC-AUC improvement required to
    /// replace the active model
    pub min_auc_improvement: f64,
    /// Optional on-disk database path; in-memory only when absent
    pub db_path: Option<PathBuf>,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            model_dir: PathBuf::from("./models"),
            min_auc_improvement: 0.01,
            db_path: None,
        }
    }
}
