//! Leakage-safe temporal train/validation split
//!
//! The split boundary is a timestamp, not a row count: every example at or
//! before the cutoff lands in train, everything after it in validation, so
//! no validation example can precede a training example. When many examples
//! share the cutoff timestamp they all fall into train, which can make the
//! train side noticeably larger than `train_ratio * N`.

use crate::dataset::Dataset;
use crate::errors::{Result, TrainerError};
use chrono::{DateTime, Utc};
use tracing::info;

/// Positive-rate report per slice, for drift and imbalance monitoring
#[derive(Debug, Clone, PartialEq)]
pub struct SplitReport {
    pub cutoff_ts: DateTime<Utc>,
    pub train_rows: usize,
    pub validation_rows: usize,
    pub train_positive_rate: f64,
    pub validation_positive_rate: f64,
}

/// Split a dataset at the timestamp of the element at `floor(N * train_ratio)`.
pub fn temporal_split(
    dataset: &Dataset,
    train_ratio: f64,
) -> Result<(Dataset, Dataset, SplitReport)> {
    if train_ratio <= 0.0 || train_ratio >= 1.0 || !train_ratio.is_finite() {
        return Err(TrainerError::Dataset(format!(
            "train_ratio must be in (0, 1), got {train_ratio}"
        )));
    }
    if dataset.is_empty() {
        return Err(TrainerError::Dataset("Cannot split an empty dataset".to_string()));
    }

    let mut sorted = dataset.examples.clone();
    sorted.sort_by_key(|e| e.snapshot.decision_ts);

    let n = sorted.len();
    let cutoff_idx = ((n as f64) * train_ratio).floor() as usize;
    let cutoff_idx = cutoff_idx.min(n - 1);
    let cutoff_ts = sorted[cutoff_idx].snapshot.decision_ts;

    let mut train = Vec::new();
    let mut validation = Vec::new();
    for example in sorted {
        if example.snapshot.decision_ts <= cutoff_ts {
            train.push(example);
        } else {
            validation.push(example);
        }
    }

    let train = Dataset { examples: train };
    let validation = Dataset { examples: validation };

    let report = SplitReport {
        cutoff_ts,
        train_rows: train.len(),
        validation_rows: validation.len(),
        train_positive_rate: train.positive_rate(),
        validation_positive_rate: validation.positive_rate(),
    };

    info!(
        cutoff = %report.cutoff_ts,
        train_rows = report.train_rows,
        validation_rows = report.validation_rows,
        train_positive_rate = report.train_positive_rate,
        validation_positive_rate = report.validation_positive_rate,
        "Temporal split complete"
    );

    Ok((train, validation, report))
}
