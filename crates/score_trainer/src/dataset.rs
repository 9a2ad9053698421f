//! Dataset construction from feature snapshots and outcome observations
//!
//! The builder joins each snapshot to the earliest outcome observed strictly
//! after the snapshot's decision timestamp, always predicting the future
//! from the past. Examples are immutable once created and kept ordered by
//! decision timestamp for the temporal splitter.

use crate::errors::{Result, TrainerError};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Absolute floor below which no downstream computation proceeds
pub const HARD_MIN_ROWS: usize = 10;

/// One recorded feature vector for a subject at decision time. Immutable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSnapshot {
    pub subject_id: String,
    pub decision_ts: DateTime<Utc>,
    pub features: BTreeMap<String, f64>,
}

/// One downstream outcome observation for a subject
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutcomeRecord {
    pub subject_id: String,
    pub event_ts: DateTime<Utc>,
    /// Whether the advance was fully repaid
    pub fully_repaid: bool,
}

/// Labeled example: snapshot plus binary label and optional weight.
/// `label == 1` is the risk event (not fully repaid). Never mutated after
/// creation.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingExample {
    pub snapshot: FeatureSnapshot,
    pub label: u8,
    pub weight: Option<f64>,
}

/// Ordered sequence of training examples
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    pub examples: Vec<TrainingExample>,
}

impl Dataset {
    pub fn len(&self) -> usize {
        self.examples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.examples.is_empty()
    }

    /// Fraction of positive (risk-event) labels
    pub fn positive_rate(&self) -> f64 {
        if self.examples.is_empty() {
            return 0.0;
        }
        let positives = self.examples.iter().filter(|e| e.label == 1).count();
        positives as f64 / self.examples.len() as f64
    }

    /// Sorted union of base feature names across all examples
    pub fn base_feature_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .examples
            .iter()
            .flat_map(|e| e.snapshot.features.keys().cloned())
            .collect();
        names.sort();
        names.dedup();
        names
    }

    /// Raw feature rows (for transform fitting)
    pub fn feature_rows(&self) -> Vec<BTreeMap<String, f64>> {
        self.examples
            .iter()
            .map(|e| e.snapshot.features.clone())
            .collect()
    }
}

/// Narrow interface to the external feature store
pub trait SnapshotSource {
    fn snapshots(&self, window_days: i64) -> Result<Vec<FeatureSnapshot>>;
}

/// Narrow interface to the external outcome observations
pub trait OutcomeSource {
    fn outcomes(&self, window_days: i64) -> Result<Vec<OutcomeRecord>>;
}

/// Append-only snapshot record as exported by the feature store
#[derive(Debug, Deserialize)]
struct SnapshotRow {
    subject_id: String,
    decision_ts: DateTime<Utc>,
    feature_json: BTreeMap<String, f64>,
}

/// File-backed snapshot source: one JSON record per line
pub struct JsonlSnapshotSource {
    path: PathBuf,
}

impl JsonlSnapshotSource {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }
}

fn within_window(ts: DateTime<Utc>, window_days: i64) -> bool {
    window_days <= 0 || ts >= Utc::now() - Duration::days(window_days)
}

fn read_jsonl<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let content = fs::read_to_string(path)
        .map_err(|e| TrainerError::Dataset(format!("Failed to read {}: {e}", path.display())))?;

    let mut rows = Vec::new();
    for (line_idx, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let row = serde_json::from_str(line).map_err(|e| {
            TrainerError::Dataset(format!("{}:{}: invalid record: {e}", path.display(), line_idx + 1))
        })?;
        rows.push(row);
    }
    Ok(rows)
}

impl SnapshotSource for JsonlSnapshotSource {
    fn snapshots(&self, window_days: i64) -> Result<Vec<FeatureSnapshot>> {
        let rows: Vec<SnapshotRow> = read_jsonl(&self.path)?;
        Ok(rows
            .into_iter()
            .filter(|row| within_window(row.decision_ts, window_days))
            .map(|row| FeatureSnapshot {
                subject_id: row.subject_id,
                decision_ts: row.decision_ts,
                features: row.feature_json,
            })
            .collect())
    }
}

/// File-backed outcome source: one JSON record per line
pub struct JsonlOutcomeSource {
    path: PathBuf,
}

impl JsonlOutcomeSource {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }
}

impl OutcomeSource for JsonlOutcomeSource {
    fn outcomes(&self, window_days: i64) -> Result<Vec<OutcomeRecord>> {
        let rows: Vec<OutcomeRecord> = read_jsonl(&self.path)?;
        Ok(rows
            .into_iter()
            .filter(|row| within_window(row.event_ts, window_days))
            .collect())
    }
}

/// Builder configuration
#[derive(Debug, Clone)]
pub struct DatasetBuilderConfig {
    /// Snapshot/outcome lookback in days (0 = unbounded)
    pub window_days: i64,
    /// Configurable minimum row count
    pub min_rows: usize,
}

impl Default for DatasetBuilderConfig {
    fn default() -> Self {
        Self {
            window_days: 90,
            min_rows: 500,
        }
    }
}

/// Assembles a labeled dataset from the external collaborators
pub struct DatasetBuilder<'a> {
    snapshots: &'a dyn SnapshotSource,
    outcomes: &'a dyn OutcomeSource,
    config: DatasetBuilderConfig,
}

impl<'a> DatasetBuilder<'a> {
    pub fn new(
        snapshots: &'a dyn SnapshotSource,
        outcomes: &'a dyn OutcomeSource,
        config: DatasetBuilderConfig,
    ) -> Self {
        Self {
            snapshots,
            outcomes,
            config,
        }
    }

    /// Build the labeled dataset, ordered by decision timestamp.
    pub fn build(&self) -> Result<Dataset> {
        let snapshots = self.snapshots.snapshots(self.config.window_days)?;
        let outcomes = self.outcomes.outcomes(self.config.window_days)?;
        debug!(
            snapshots = snapshots.len(),
            outcomes = outcomes.len(),
            "Collaborator records loaded"
        );

        // Index outcomes per subject, ordered by event time
        let mut by_subject: BTreeMap<&str, Vec<&OutcomeRecord>> = BTreeMap::new();
        for outcome in &outcomes {
            by_subject
                .entry(outcome.subject_id.as_str())
                .or_default()
                .push(outcome);
        }
        for events in by_subject.values_mut() {
            events.sort_by_key(|o| o.event_ts);
        }

        let mut examples = Vec::new();
        let mut unlabeled = 0usize;
        for snapshot in snapshots {
            // Earliest outcome strictly after the decision; never label from
            // events at or before decision time.
            let outcome = by_subject
                .get(snapshot.subject_id.as_str())
                .and_then(|events| {
                    events
                        .iter()
                        .find(|o| o.event_ts > snapshot.decision_ts)
                        .copied()
                });

            match outcome {
                Some(outcome) => {
                    let label = if outcome.fully_repaid { 0 } else { 1 };
                    examples.push(TrainingExample {
                        snapshot,
                        label,
                        weight: None,
                    });
                }
                None => unlabeled += 1,
            }
        }

        if unlabeled > 0 {
            debug!(unlabeled, "Snapshots without a downstream outcome skipped");
        }

        let found = examples.len();
        if found < HARD_MIN_ROWS {
            return Err(TrainerError::InsufficientData {
                found,
                required: HARD_MIN_ROWS,
            });
        }
        if found < self.config.min_rows {
            return Err(TrainerError::InsufficientData {
                found,
                required: self.config.min_rows,
            });
        }

        fill_missing_with_median(&mut examples);
        examples.sort_by_key(|e| e.snapshot.decision_ts);

        let dataset = Dataset { examples };
        info!(
            rows = dataset.len(),
            positive_rate = dataset.positive_rate(),
            "Dataset built"
        );
        Ok(dataset)
    }
}

/// Fill base features missing from individual rows with the column median
/// over the rows that do carry the feature.
fn fill_missing_with_median(examples: &mut [TrainingExample]) {
    let mut names: Vec<String> = examples
        .iter()
        .flat_map(|e| e.snapshot.features.keys().cloned())
        .collect();
    names.sort();
    names.dedup();

    for name in &names {
        let mut values: Vec<f64> = examples
            .iter()
            .filter_map(|e| e.snapshot.features.get(name))
            .filter(|v| v.is_finite())
            .copied()
            .collect();
        if values.is_empty() {
            continue;
        }
        values.sort_by(|a, b| a.total_cmp(b));
        let median = if values.len() % 2 == 1 {
            values[values.len() / 2]
        } else {
            (values[values.len() / 2 - 1] + values[values.len() / 2]) / 2.0
        };

        let mut filled = 0usize;
        for example in examples.iter_mut() {
            match example.snapshot.features.get_mut(name) {
                Some(value) if !value.is_finite() => {
                    *value = median;
                    filled += 1;
                }
                Some(_) => {}
                None => {
                    example.snapshot.features.insert(name.clone(), median);
                    filled += 1;
                }
            }
        }
        if filled > 0 {
            warn!(column = %name, filled, median, "Filled missing values with column median");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::io::Write;
    use tempfile::NamedTempFile;

    pub struct VecSnapshotSource(pub Vec<FeatureSnapshot>);
    impl SnapshotSource for VecSnapshotSource {
        fn snapshots(&self, _window_days: i64) -> Result<Vec<FeatureSnapshot>> {
            Ok(self.0.clone())
        }
    }

    pub struct VecOutcomeSource(pub Vec<OutcomeRecord>);
    impl OutcomeSource for VecOutcomeSource {
        fn outcomes(&self, _window_days: i64) -> Result<Vec<OutcomeRecord>> {
            Ok(self.0.clone())
        }
    }

    fn ts(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, day, 12, 0, 0).unwrap()
    }

    fn snapshot(subject: &str, day: u32, debt: f64) -> FeatureSnapshot {
        let mut features = BTreeMap::new();
        features.insert("metric_debt_load30".to_string(), debt);
        features.insert("metric_net_cash30".to_string(), 100.0 * day as f64);
        FeatureSnapshot {
            subject_id: subject.to_string(),
            decision_ts: ts(day),
            features,
        }
    }

    fn outcome(subject: &str, day: u32, repaid: bool) -> OutcomeRecord {
        OutcomeRecord {
            subject_id: subject.to_string(),
            event_ts: ts(day),
            fully_repaid: repaid,
        }
    }

    fn config(min_rows: usize) -> DatasetBuilderConfig {
        DatasetBuilderConfig {
            window_days: 0,
            min_rows,
        }
    }

    #[test]
    fn join_uses_only_strictly_later_outcomes() {
        let snapshots = VecSnapshotSource(
            (1..=12).map(|d| snapshot(&format!("user_{d}"), d, 0.3)).collect(),
        );
        // Each subject's outcome lands one day after the snapshot, except
        // user_1 whose only outcome is simultaneous with the decision.
        let mut outcomes: Vec<OutcomeRecord> = (2..=12)
            .map(|d| outcome(&format!("user_{d}"), d + 1, d % 2 == 0))
            .collect();
        outcomes.push(outcome("user_1", 1, true));
        let outcomes = VecOutcomeSource(outcomes);

        let dataset = DatasetBuilder::new(&snapshots, &outcomes, config(10))
            .build()
            .unwrap();
        assert_eq!(dataset.len(), 11);
        assert!(dataset
            .examples
            .iter()
            .all(|e| e.snapshot.subject_id != "user_1"));
    }

    #[test]
    fn label_is_positive_when_not_fully_repaid() {
        let snapshots =
            VecSnapshotSource((1..=10).map(|d| snapshot(&format!("u{d}"), d, 0.1)).collect());
        let outcomes = VecOutcomeSource(
            (1..=10)
                .map(|d| outcome(&format!("u{d}"), d + 1, d > 5))
                .collect(),
        );

        let dataset = DatasetBuilder::new(&snapshots, &outcomes, config(10))
            .build()
            .unwrap();
        // Days 1..=5 were not repaid -> label 1
        assert!((dataset.positive_rate() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn too_few_rows_fails_with_insufficient_data() {
        let snapshots = VecSnapshotSource((1..=5).map(|d| snapshot("u", d, 0.1)).collect());
        let outcomes = VecOutcomeSource(vec![outcome("u", 20, true)]);

        let err = DatasetBuilder::new(&snapshots, &outcomes, config(500))
            .build()
            .unwrap_err();
        match err {
            TrainerError::InsufficientData { found, required } => {
                assert_eq!(found, 5);
                assert_eq!(required, HARD_MIN_ROWS);
            }
            other => panic!("expected InsufficientData, got {other:?}"),
        }
    }

    #[test]
    fn configurable_minimum_applies_above_hard_floor() {
        let snapshots =
            VecSnapshotSource((1..=20).map(|d| snapshot(&format!("u{d}"), d, 0.1)).collect());
        let outcomes = VecOutcomeSource(
            (1..=20)
                .map(|d| outcome(&format!("u{d}"), d + 1, true))
                .collect(),
        );

        let err = DatasetBuilder::new(&snapshots, &outcomes, config(50))
            .build()
            .unwrap_err();
        match err {
            TrainerError::InsufficientData { found, required } => {
                assert_eq!(found, 20);
                assert_eq!(required, 50);
            }
            other => panic!("expected InsufficientData, got {other:?}"),
        }
    }

    #[test]
    fn missing_base_features_are_median_filled() {
        let mut snapshots: Vec<FeatureSnapshot> =
            (1..=10).map(|d| snapshot(&format!("u{d}"), d, d as f64)).collect();
        // Drop the debt metric from one row
        snapshots[0].features.remove("metric_debt_load30");
        let snapshots = VecSnapshotSource(snapshots);
        let outcomes = VecOutcomeSource(
            (1..=10)
                .map(|d| outcome(&format!("u{d}"), d + 1, true))
                .collect(),
        );

        let dataset = DatasetBuilder::new(&snapshots, &outcomes, config(10))
            .build()
            .unwrap();
        let filled = dataset
            .examples
            .iter()
            .find(|e| e.snapshot.subject_id == "u1")
            .unwrap();
        // Median of 2..=10 is 6
        assert_eq!(filled.snapshot.features["metric_debt_load30"], 6.0);
    }

    #[test]
    fn dataset_is_ordered_by_decision_ts() {
        let mut rows: Vec<FeatureSnapshot> =
            (1..=10).map(|d| snapshot(&format!("u{d}"), d, 0.1)).collect();
        rows.reverse();
        let snapshots = VecSnapshotSource(rows);
        let outcomes = VecOutcomeSource(
            (1..=10)
                .map(|d| outcome(&format!("u{d}"), d + 1, true))
                .collect(),
        );

        let dataset = DatasetBuilder::new(&snapshots, &outcomes, config(10))
            .build()
            .unwrap();
        for pair in dataset.examples.windows(2) {
            assert!(pair[0].snapshot.decision_ts <= pair[1].snapshot.decision_ts);
        }
    }

    #[test]
    fn jsonl_sources_parse_collaborator_records() {
        let mut snap_file = NamedTempFile::new().unwrap();
        writeln!(
            snap_file,
            r#"{{"subject_id":"u1","decision_ts":"2025-01-01T12:00:00Z","feature_json":{{"metric_debt_load30":0.4}}}}"#
        )
        .unwrap();
        snap_file.flush().unwrap();

        let mut outcome_file = NamedTempFile::new().unwrap();
        writeln!(
            outcome_file,
            r#"{{"subject_id":"u1","event_ts":"2025-01-05T12:00:00Z","fully_repaid":false}}"#
        )
        .unwrap();
        outcome_file.flush().unwrap();

        let snapshots = JsonlSnapshotSource::new(snap_file.path())
            .snapshots(0)
            .unwrap();
        assert_eq!(snapshots.len(), 1);
        assert_eq!(snapshots[0].features["metric_debt_load30"], 0.4);

        let outcomes = JsonlOutcomeSource::new(outcome_file.path())
            .outcomes(0)
            .unwrap();
        assert_eq!(outcomes.len(), 1);
        assert!(!outcomes[0].fully_repaid);
    }
}
