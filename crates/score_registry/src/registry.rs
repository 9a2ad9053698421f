//! Model registry with champion/challenger promotion
//!
//! Append-only rows over a storage backend, an at-most-one-promoted
//! invariant, and the promotion gate that keeps noisy retrains from
//! regressing production quality. Promotion flips the row set atomically and
//! then repoints the active artifact record via construct-then-swap.

use crate::errors::{RegistryError, Result};
use crate::storage::RegistryStorage;
use crate::types::{ModelRecord, RegistryConfig};
use riskscore_core::{ActivePointer, ModelMetrics};
use std::path::PathBuf;
use tracing::info;
use uuid::Uuid;

/// Registry over one storage backend
pub struct ModelRegistry {
    storage: RegistryStorage,
    config: RegistryConfig,
}

impl ModelRegistry {
    pub fn new(storage: RegistryStorage, config: RegistryConfig) -> Self {
        Self { storage, config }
    }

    /// Open a registry from configuration alone
    pub fn open(config: RegistryConfig) -> Result<Self> {
        let storage = RegistryStorage::new(config.db_path.as_deref())?;
        Ok(Self::new(storage, config))
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Register a new artifact row (always unpromoted)
    pub async fn register(&self, record: ModelRecord) -> Result<ModelRecord> {
        if record.promoted {
            return Err(RegistryError::Internal(
                "New rows must be registered unpromoted".to_string(),
            ));
        }
        self.storage.store_record(&record).await?;
        info!(
            model_id = %record.model_id,
            version = %record.version_tag,
            auc = record.train_auc,
            "Model registered"
        );
        Ok(record)
    }

    /// Fetch one row
    pub async fn get(&self, model_id: &Uuid) -> Result<Option<ModelRecord>> {
        self.storage.load_record(model_id).await
    }

    /// All rows, oldest first
    pub async fn list(&self) -> Result<Vec<ModelRecord>> {
        self.storage.list_records().await
    }

    /// The currently promoted row, if any
    pub async fn active_record(&self) -> Result<Option<ModelRecord>> {
        Ok(self
            .storage
            .list_records()
            .await?
            .into_iter()
            .find(|r| r.promoted))
    }

    /// Champion/challenger gate.
    ///
    /// True when no champion exists, or when the challenger's ROC-AUC beats
    /// the champion's by at least the configured minimum improvement.
    pub fn should_promote(
        &self,
        new_metrics: &ModelMetrics,
        current_active: Option<&ModelRecord>,
    ) -> bool {
        match current_active {
            None => {
                info!("No active model; challenger promotes by default");
                true
            }
            Some(active) => {
                let improvement = new_metrics.roc_auc - active.train_auc;
                let promote = improvement >= self.config.min_auc_improvement;
                info!(
                    active_auc = active.train_auc,
                    challenger_auc = new_metrics.roc_auc,
                    improvement,
                    threshold = self.config.min_auc_improvement,
                    promote,
                    "Promotion gate evaluated"
                );
                promote
            }
        }
    }

    /// Promote one registered artifact.
    ///
    /// Executed as a single atomic flip over the row set (exactly one row
    /// ends promoted), then the active pointer is rewritten via
    /// construct-then-swap. A reader querying the active artifact observes
    /// either the prior or the new state, never both or neither.
    pub async fn promote(&self, model_id: &Uuid) -> Result<ModelRecord> {
        let promoted = self.storage.apply_promotion(model_id).await?;

        let pointer = ActivePointer::new(
            promoted.version_tag.clone(),
            PathBuf::from(&promoted.artifact_url),
        );
        pointer.swap(&self.config.model_dir).map_err(|e| {
            RegistryError::PromotionConflict(format!("Active pointer swap failed: {e}"))
        })?;

        info!(
            model_id = %promoted.model_id,
            version = %promoted.version_tag,
            "Model promoted to active"
        );
        Ok(promoted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn registry(dir: &std::path::Path) -> ModelRegistry {
        ModelRegistry::open(RegistryConfig {
            model_dir: dir.to_path_buf(),
            min_auc_improvement: 0.01,
            db_path: None,
        })
        .unwrap()
    }

    fn metrics(roc_auc: f64) -> ModelMetrics {
        ModelMetrics {
            roc_auc,
            pr_auc: 0.0,
            accuracy: 0.0,
            f1: 0.0,
            feature_importance: BTreeMap::new(),
        }
    }

    fn record(dir: &std::path::Path, tag: &str, auc: f64) -> ModelRecord {
        ModelRecord::new(
            tag.to_string(),
            dir.join(tag).to_string_lossy().into_owned(),
            auc,
        )
    }

    #[tokio::test]
    async fn gate_promotes_when_no_active_model() {
        let dir = tempfile::tempdir().unwrap();
        let registry = registry(dir.path());
        assert!(registry.should_promote(&metrics(0.70), None));
    }

    #[tokio::test]
    async fn gate_rejects_sub_threshold_improvement() {
        let dir = tempfile::tempdir().unwrap();
        let registry = registry(dir.path());
        let active = record(dir.path(), "v0.800-2025-01-01", 0.80);
        // 0.805 - 0.80 = 0.005 < 0.01
        assert!(!registry.should_promote(&metrics(0.805), Some(&active)));
    }

    #[tokio::test]
    async fn gate_accepts_clear_improvement() {
        let dir = tempfile::tempdir().unwrap();
        let registry = registry(dir.path());
        let active = record(dir.path(), "v0.800-2025-01-01", 0.80);
        assert!(registry.should_promote(&metrics(0.82), Some(&active)));
    }

    #[tokio::test]
    async fn promote_leaves_single_promoted_row_and_swaps_pointer() {
        let dir = tempfile::tempdir().unwrap();
        let registry = registry(dir.path());

        let first = registry
            .register(record(dir.path(), "v0.800-2025-01-01", 0.80))
            .await
            .unwrap();
        let second = registry
            .register(record(dir.path(), "v0.820-2025-01-02", 0.82))
            .await
            .unwrap();

        registry.promote(&first.model_id).await.unwrap();
        let active = registry.active_record().await.unwrap().unwrap();
        assert_eq!(active.model_id, first.model_id);

        registry.promote(&second.model_id).await.unwrap();
        let rows = registry.list().await.unwrap();
        assert_eq!(rows.iter().filter(|r| r.promoted).count(), 1);
        let active = registry.active_record().await.unwrap().unwrap();
        assert_eq!(active.model_id, second.model_id);

        let pointer = ActivePointer::resolve(dir.path()).unwrap();
        assert_eq!(pointer.version_tag, "v0.820-2025-01-02");
    }

    #[tokio::test]
    async fn promote_unknown_model_is_a_whole_failure() {
        let dir = tempfile::tempdir().unwrap();
        let registry = registry(dir.path());
        let existing = registry
            .register(record(dir.path(), "v0.800-2025-01-01", 0.80))
            .await
            .unwrap();
        registry.promote(&existing.model_id).await.unwrap();

        let err = registry.promote(&Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, RegistryError::PromotionConflict(_)));

        // Prior state fully intact
        let active = registry.active_record().await.unwrap().unwrap();
        assert_eq!(active.model_id, existing.model_id);
        let pointer = ActivePointer::resolve(dir.path()).unwrap();
        assert_eq!(pointer.version_tag, "v0.800-2025-01-01");
    }

    #[tokio::test]
    async fn registry_invariant_holds_across_operation_sequences() {
        let dir = tempfile::tempdir().unwrap();
        let registry = registry(dir.path());

        let mut ids = Vec::new();
        for (i, auc) in [0.70, 0.75, 0.72, 0.80].iter().enumerate() {
            let rec = registry
                .register(record(dir.path(), &format!("v{auc:.3}-2025-01-{:02}", i + 1), *auc))
                .await
                .unwrap();
            ids.push(rec.model_id);

            let promoted = registry
                .list()
                .await
                .unwrap()
                .iter()
                .filter(|r| r.promoted)
                .count();
            assert!(promoted <= 1);
        }

        for id in &ids {
            registry.promote(id).await.unwrap();
            let promoted = registry
                .list()
                .await
                .unwrap()
                .iter()
                .filter(|r| r.promoted)
                .count();
            assert_eq!(promoted, 1);
        }
    }
}
