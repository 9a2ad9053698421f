//! End-to-end offline training run
//!
//! build dataset -> fit transform -> temporal split -> train -> evaluate ->
//! write artifact -> register -> champion/challenger gate -> promote.
//!
//! Data and training failures terminate the run before anything is written;
//! a failed evaluation never registers an artifact.

use crate::dataset::{DatasetBuilder, DatasetBuilderConfig, OutcomeSource, SnapshotSource};
use crate::errors::Result;
use crate::evaluate::evaluate;
use crate::gbdt::{GbdtConfig, GbdtTrainer, TrainingDiagnostics};
use crate::split::{temporal_split, SplitReport};
use riskscore_core::{
    FeatureManifest, FeatureSchema, ModelMetrics, TransformConfig, TransformSpec,
    TRANSFORM_VERSION,
};
use riskscore_registry::{ArtifactStore, ModelRegistry};
use std::path::PathBuf;
use tracing::info;

/// Full pipeline configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub dataset: DatasetBuilderConfig,
    pub train_ratio: f64,
    pub gbdt: GbdtConfig,
    pub transform: TransformConfig,
    /// Whether a passing gate actually promotes the artifact
    pub promote: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            dataset: DatasetBuilderConfig::default(),
            train_ratio: 0.8,
            gbdt: GbdtConfig::default(),
            transform: TransformConfig::default(),
            promote: false,
        }
    }
}

/// Report for one completed run
#[derive(Debug, Clone)]
pub struct TrainingRunReport {
    pub version_tag: String,
    pub artifact_dir: PathBuf,
    pub model_hash: String,
    pub has_optimized: bool,
    pub metrics: ModelMetrics,
    pub promoted: bool,
    pub diagnostics: TrainingDiagnostics,
    pub split: SplitReport,
}

/// Offline training pipeline over injected collaborators
pub struct TrainingPipeline<'a> {
    snapshots: &'a dyn SnapshotSource,
    outcomes: &'a dyn OutcomeSource,
    store: &'a ArtifactStore,
    registry: &'a ModelRegistry,
    config: PipelineConfig,
}

impl<'a> TrainingPipeline<'a> {
    pub fn new(
        snapshots: &'a dyn SnapshotSource,
        outcomes: &'a dyn OutcomeSource,
        store: &'a ArtifactStore,
        registry: &'a ModelRegistry,
        config: PipelineConfig,
    ) -> Self {
        Self {
            snapshots,
            outcomes,
            store,
            registry,
            config,
        }
    }

    /// Run the whole pipeline once.
    pub async fn run(&self) -> Result<TrainingRunReport> {
        info!(
            window_days = self.config.dataset.window_days,
            min_rows = self.config.dataset.min_rows,
            "Training run starting"
        );

        let dataset =
            DatasetBuilder::new(self.snapshots, self.outcomes, self.config.dataset.clone())
                .build()?;

        let base_features = dataset.base_feature_names();
        let transform = TransformSpec::fit(&self.config.transform, &dataset.feature_rows());
        let schema = FeatureSchema::new(TRANSFORM_VERSION, transform.output_features(&base_features));
        info!(
            base_features = base_features.len(),
            schema_features = schema.len(),
            "Feature schema captured"
        );
        let manifest = FeatureManifest { schema, transform };

        let (train, validation, split) = temporal_split(&dataset, self.config.train_ratio)?;

        let trainer = GbdtTrainer::new(self.config.gbdt.clone());
        let (model, diagnostics) = trainer.train(&train, &validation, &manifest)?;

        let metrics = evaluate(&model, &validation, &manifest)?;

        let written = self.store.write(&model, &manifest, &metrics)?;
        let record = self.registry.register(written.to_record(&metrics)).await?;

        let mut promoted = false;
        if self.config.promote {
            let active = self.registry.active_record().await?;
            if self.registry.should_promote(&metrics, active.as_ref()) {
                self.registry.promote(&record.model_id).await?;
                promoted = true;
            }
        }

        info!(
            version = %written.version_tag,
            roc_auc = metrics.roc_auc,
            promoted,
            "Training run complete"
        );

        Ok(TrainingRunReport {
            version_tag: written.version_tag,
            artifact_dir: written.dir,
            model_hash: written.model_hash,
            has_optimized: written.has_optimized,
            metrics,
            promoted,
            diagnostics,
            split,
        })
    }
}
