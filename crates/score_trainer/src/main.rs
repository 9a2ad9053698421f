//! riskscore trainer CLI
//!
//! Offline batch job: builds the labeled dataset from collaborator exports,
//! trains and evaluates a challenger model, writes the versioned artifact,
//! and runs it through the champion/challenger promotion gate.

use anyhow::{Context, Result};
use clap::Parser;
use riskscore_trainer::{
    DatasetBuilderConfig, GbdtConfig, JsonlOutcomeSource, JsonlSnapshotSource, PipelineConfig,
    TrainingPipeline,
};
use riskscore_core::TransformConfig;
use riskscore_registry::{ArtifactStore, ModelRegistry, RegistryConfig};
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "score-trainer")]
#[command(author = "RiskScore Contributors")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Offline GBDT trainer with champion/challenger promotion", long_about = None)]
struct Args {
    /// Feature-store snapshot export (JSONL, one record per line)
    #[arg(long)]
    snapshots: PathBuf,

    /// Outcome observation export (JSONL, one record per line)
    #[arg(long)]
    outcomes: PathBuf,

    /// Directory for versioned model artifacts and the active pointer
    #[arg(short, long, default_value = "models")]
    model_dir: PathBuf,

    /// Optional registry database path (in-memory registry when omitted)
    #[arg(long)]
    registry_db: Option<PathBuf>,

    /// Snapshot/outcome lookback window in days (0 = unbounded)
    #[arg(long, default_value = "90")]
    window_days: i64,

    /// Minimum labeled rows required to train
    #[arg(long, default_value = "500")]
    min_rows: usize,

    /// Temporal split train fraction
    #[arg(long, default_value = "0.8")]
    train_ratio: f64,

    /// Number of boosting trees
    #[arg(long, default_value = "100")]
    trees: usize,

    /// Maximum tree depth
    #[arg(long, default_value = "6")]
    max_depth: usize,

    /// Minimum samples per leaf
    #[arg(long, default_value = "20")]
    min_samples_leaf: usize,

    /// Learning rate
    #[arg(long, default_value = "0.05")]
    learning_rate: f64,

    /// Early stopping patience (rounds without validation improvement)
    #[arg(long, default_value = "10")]
    early_stopping_rounds: usize,

    /// Random seed for deterministic bagging
    #[arg(long, default_value = "42")]
    seed: i64,

    /// Promote the new model when it clears the gate
    #[arg(long)]
    promote: bool,

    /// Minimum ROC-AUC improvement required to replace the active model
    #[arg(long, default_value = "0.01")]
    min_auc_improvement: f64,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    info!("riskscore trainer v{}", env!("CARGO_PKG_VERSION"));

    let snapshots = JsonlSnapshotSource::new(&args.snapshots);
    let outcomes = JsonlOutcomeSource::new(&args.outcomes);

    let store = ArtifactStore::new(&args.model_dir);
    let registry = ModelRegistry::open(RegistryConfig {
        model_dir: args.model_dir.clone(),
        min_auc_improvement: args.min_auc_improvement,
        db_path: args.registry_db.clone(),
    })
    .context("Failed to open model registry")?;

    let config = PipelineConfig {
        dataset: DatasetBuilderConfig {
            window_days: args.window_days,
            min_rows: args.min_rows,
        },
        train_ratio: args.train_ratio,
        gbdt: GbdtConfig {
            num_trees: args.trees,
            max_depth: args.max_depth,
            min_samples_leaf: args.min_samples_leaf,
            learning_rate: args.learning_rate,
            early_stopping_rounds: args.early_stopping_rounds,
            seed: args.seed,
            ..GbdtConfig::default()
        },
        transform: TransformConfig::default(),
        promote: args.promote,
    };

    info!("Training configuration:");
    info!("  Window: {} days, min rows: {}", args.window_days, args.min_rows);
    info!("  Trees: {}, max depth: {}", args.trees, args.max_depth);
    info!(
        "  Learning rate: {}, early stopping: {} rounds",
        args.learning_rate, args.early_stopping_rounds
    );
    info!("  Promotion gate: {} (min improvement {})", args.promote, args.min_auc_improvement);

    let pipeline = TrainingPipeline::new(&snapshots, &outcomes, &store, &registry, config);
    let report = pipeline.run().await.context("Training run failed")?;

    info!("Training run finished");
    info!("  Version: {}", report.version_tag);
    info!("  Artifact: {}", report.artifact_dir.display());
    info!("  Model hash: {}", report.model_hash);
    info!(
        "  ROC-AUC: {:.4}, PR-AUC: {:.4}, accuracy: {:.4}, F1: {:.4}",
        report.metrics.roc_auc, report.metrics.pr_auc, report.metrics.accuracy, report.metrics.f1
    );
    info!(
        "  Trees: {} (best iteration {})",
        report.diagnostics.trees_trained,
        report.diagnostics.best_iteration + 1
    );
    if report.promoted {
        info!("  Promoted to active");
    } else {
        info!("  Not promoted");
    }

    Ok(())
}
