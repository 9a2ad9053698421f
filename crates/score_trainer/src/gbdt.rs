//! Gradient Boosted Decision Tree trainer
//!
//! Binary logistic objective boosted over CART trees, deterministic for a
//! fixed seed and input ordering. Early stopping is driven by the
//! validation ROC-AUC; the returned model is truncated to the best
//! iteration.

use crate::cart::{CartBuilder, TreeConfig};
use crate::dataset::Dataset;
use crate::deterministic::LcgRng;
use crate::errors::{Result, TrainerError};
use crate::evaluate::roc_auc;
use riskscore_core::gbdt::{Model, Tree};
use riskscore_core::FeatureManifest;
use std::collections::BTreeMap;
use tracing::{debug, info};

/// GBDT training configuration
#[derive(Clone, Debug)]
pub struct GbdtConfig {
    pub num_trees: usize,
    pub max_depth: usize,
    pub min_samples_leaf: usize,
    pub learning_rate: f64,
    /// L2 regularization on leaf values
    pub lambda: f64,
    /// Row fraction per bagged tree (1.0 disables bagging)
    pub bagging_fraction: f64,
    /// Resample the bag every N trees
    pub bagging_freq: usize,
    /// Stop after this many rounds without validation improvement
    pub early_stopping_rounds: usize,
    /// Seed for deterministic bagging
    pub seed: i64,
    /// Cap on candidate thresholds per feature and node
    pub max_thresholds: usize,
}

impl Default for GbdtConfig {
    fn default() -> Self {
        Self {
            num_trees: 100,
            max_depth: 6,
            min_samples_leaf: 20,
            learning_rate: 0.05,
            lambda: 1.0,
            bagging_fraction: 0.8,
            bagging_freq: 5,
            early_stopping_rounds: 10,
            seed: 42,
            max_thresholds: 64,
        }
    }
}

/// Per-run diagnostics surfaced alongside the trained model
#[derive(Debug, Clone)]
pub struct TrainingDiagnostics {
    pub trees_trained: usize,
    pub best_iteration: usize,
    pub best_validation_auc: f64,
    pub train_rows: usize,
    pub validation_rows: usize,
    /// Importance sorted descending, ties broken by schema order
    pub importance_ranking: Vec<(String, f64)>,
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// Schema-ordered design matrix plus labels and weights for one slice
struct DesignMatrix {
    rows: Vec<Vec<f64>>,
    labels: Vec<u8>,
    weights: Vec<f64>,
}

impl DesignMatrix {
    fn build(dataset: &Dataset, manifest: &FeatureManifest) -> Self {
        let mut rows = Vec::with_capacity(dataset.len());
        let mut labels = Vec::with_capacity(dataset.len());
        let mut weights = Vec::with_capacity(dataset.len());

        for example in &dataset.examples {
            let extended = manifest.transform.apply(&example.snapshot.features);
            let (vector, _missing) = manifest.schema.reconcile(&extended);
            rows.push(vector);
            labels.push(example.label);
            weights.push(example.weight.unwrap_or(1.0));
        }

        Self {
            rows,
            labels,
            weights,
        }
    }

    fn len(&self) -> usize {
        self.rows.len()
    }
}

/// GBDT trainer
pub struct GbdtTrainer {
    config: GbdtConfig,
}

impl GbdtTrainer {
    pub fn new(config: GbdtConfig) -> Self {
        Self { config }
    }

    /// Train an ensemble against the train slice with early stopping on the
    /// validation slice. Terminal on any numerical failure; no partial model
    /// escapes this function.
    pub fn train(
        &self,
        train: &Dataset,
        validation: &Dataset,
        manifest: &FeatureManifest,
    ) -> Result<(Model, TrainingDiagnostics)> {
        if train.is_empty() {
            return Err(TrainerError::Training("Training set is empty".to_string()));
        }
        if validation.is_empty() {
            return Err(TrainerError::Training(
                "Validation set is empty; early stopping needs held-out rows".to_string(),
            ));
        }

        let train_matrix = DesignMatrix::build(train, manifest);
        let validation_matrix = DesignMatrix::build(validation, manifest);
        let n = train_matrix.len();

        let bias = self.initial_bias(&train_matrix);
        let mut train_raw = vec![bias; n];
        let mut validation_raw = vec![bias; validation_matrix.len()];

        let mut rng = LcgRng::new(self.config.seed);
        let mut bag: Vec<usize> = (0..n).collect();

        let mut trees: Vec<Tree> = Vec::with_capacity(self.config.num_trees);
        let mut tree_gains: Vec<Vec<f64>> = Vec::with_capacity(self.config.num_trees);
        let mut best_auc = f64::NEG_INFINITY;
        let mut best_iteration = 0usize;

        for tree_idx in 0..self.config.num_trees {
            let (gradients, hessians) = self.gradients_hessians(&train_matrix, &train_raw);

            if self.config.bagging_fraction < 1.0
                && self.config.bagging_freq > 0
                && tree_idx % self.config.bagging_freq == 0
            {
                bag = self.sample_bag(n, &mut rng);
            }

            let tree_config = TreeConfig {
                max_depth: self.config.max_depth,
                min_samples_leaf: self.config.min_samples_leaf,
                lambda: self.config.lambda,
                max_thresholds: self.config.max_thresholds,
            };
            let builder =
                CartBuilder::new(&train_matrix.rows, &gradients, &hessians, tree_config);
            let (tree, gains) = builder.build(&bag, self.config.learning_rate);

            self.update_predictions(&tree, &train_matrix.rows, &mut train_raw)?;
            self.update_predictions(&tree, &validation_matrix.rows, &mut validation_raw)?;

            trees.push(tree);
            tree_gains.push(gains);

            let validation_auc = roc_auc(&validation_matrix.labels, &validation_raw)?;
            debug!(
                tree = tree_idx + 1,
                validation_auc, "Boosting round complete"
            );

            if validation_auc > best_auc {
                best_auc = validation_auc;
                best_iteration = tree_idx;
            } else if tree_idx - best_iteration >= self.config.early_stopping_rounds {
                info!(
                    stopped_at = tree_idx + 1,
                    best_iteration = best_iteration + 1,
                    best_validation_auc = best_auc,
                    "Early stopping triggered"
                );
                break;
            }
        }

        let trees_trained = trees.len();
        trees.truncate(best_iteration + 1);
        tree_gains.truncate(best_iteration + 1);

        let importance = self.accumulate_importance(&manifest.schema.features, &tree_gains);
        let importance_ranking = rank_importance(&manifest.schema.features, &importance);

        let model = Model::new(
            manifest.schema.features.clone(),
            bias,
            trees,
            importance,
        );
        model.validate()?;

        let diagnostics = TrainingDiagnostics {
            trees_trained,
            best_iteration,
            best_validation_auc: best_auc,
            train_rows: n,
            validation_rows: validation_matrix.len(),
            importance_ranking,
        };

        info!(
            trees = model.trees.len(),
            best_validation_auc = best_auc,
            "Training complete"
        );

        Ok((model, diagnostics))
    }

    /// Empirical log-odds of the weighted base rate
    fn initial_bias(&self, matrix: &DesignMatrix) -> f64 {
        let mut weighted_positives = 0.0;
        let mut total_weight = 0.0;
        for (label, weight) in matrix.labels.iter().zip(&matrix.weights) {
            weighted_positives += f64::from(*label) * weight;
            total_weight += weight;
        }
        let rate = if total_weight > 0.0 {
            (weighted_positives / total_weight).clamp(1e-6, 1.0 - 1e-6)
        } else {
            0.5
        };
        (rate / (1.0 - rate)).ln()
    }

    /// Logistic loss derivatives: g = w(p - y), h = w·p(1 - p)
    fn gradients_hessians(&self, matrix: &DesignMatrix, raw: &[f64]) -> (Vec<f64>, Vec<f64>) {
        let n = matrix.len();
        let mut gradients = Vec::with_capacity(n);
        let mut hessians = Vec::with_capacity(n);

        for i in 0..n {
            let p = sigmoid(raw[i]);
            let y = f64::from(matrix.labels[i]);
            let w = matrix.weights[i];
            gradients.push(w * (p - y));
            hessians.push((w * p * (1.0 - p)).max(1e-12));
        }

        (gradients, hessians)
    }

    /// Deterministic row bag; falls back to all rows if the draw is empty
    fn sample_bag(&self, n: usize, rng: &mut LcgRng) -> Vec<usize> {
        let threshold = (self.config.bagging_fraction * 1_000_000.0) as i64;
        let bag: Vec<usize> = (0..n)
            .filter(|_| rng.next_unit_micro() < threshold)
            .collect();
        if bag.is_empty() {
            (0..n).collect()
        } else {
            bag
        }
    }

    fn update_predictions(
        &self,
        tree: &Tree,
        rows: &[Vec<f64>],
        raw: &mut [f64],
    ) -> Result<()> {
        for (row, value) in rows.iter().zip(raw.iter_mut()) {
            *value += tree.evaluate(row) * self.config.learning_rate;
            if !value.is_finite() {
                return Err(TrainerError::Training(
                    "Non-finite prediction during boosting".to_string(),
                ));
            }
        }
        Ok(())
    }

    fn accumulate_importance(
        &self,
        features: &[String],
        tree_gains: &[Vec<f64>],
    ) -> BTreeMap<String, f64> {
        let mut totals = vec![0.0; features.len()];
        for gains in tree_gains {
            for (i, gain) in gains.iter().enumerate() {
                if i < totals.len() {
                    totals[i] += gain;
                }
            }
        }
        features
            .iter()
            .cloned()
            .zip(totals)
            .collect()
    }
}

/// Importance ranking sorted descending by value; exact ties keep the
/// schema column order (stable sort).
pub fn rank_importance(
    schema_order: &[String],
    importance: &BTreeMap<String, f64>,
) -> Vec<(String, f64)> {
    let mut ranking: Vec<(String, f64)> = schema_order
        .iter()
        .map(|name| (name.clone(), importance.get(name).copied().unwrap_or(0.0)))
        .collect();
    ranking.sort_by(|a, b| b.1.total_cmp(&a.1));
    ranking
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{FeatureSnapshot, TrainingExample};
    use chrono::{TimeZone, Utc};
    use riskscore_core::{FeatureSchema, TransformSpec, TRANSFORM_VERSION};
    use std::collections::BTreeMap;

    /// Separable synthetic data: label follows the debt metric
    fn synthetic_dataset(rows: usize, offset: u32) -> Dataset {
        let examples = (0..rows)
            .map(|i| {
                let debt = (i % 10) as f64 / 10.0;
                let noise = ((i * 7) % 13) as f64 / 13.0;
                let mut features = BTreeMap::new();
                features.insert("metric_debt_load30".to_string(), debt);
                features.insert("metric_volatility90".to_string(), noise);

                TrainingExample {
                    snapshot: FeatureSnapshot {
                        subject_id: format!("u{i}"),
                        decision_ts: Utc
                            .with_ymd_and_hms(2025, 1, 1, 0, 0, 0)
                            .unwrap()
                            + chrono::Duration::hours((offset + i as u32) as i64),
                        features,
                    },
                    label: u8::from(debt > 0.5),
                    weight: None,
                }
            })
            .collect();
        Dataset { examples }
    }

    fn manifest() -> FeatureManifest {
        FeatureManifest {
            schema: FeatureSchema::new(
                TRANSFORM_VERSION,
                vec![
                    "metric_debt_load30".to_string(),
                    "metric_volatility90".to_string(),
                ],
            ),
            transform: TransformSpec::default(),
        }
    }

    fn config() -> GbdtConfig {
        GbdtConfig {
            num_trees: 20,
            max_depth: 3,
            min_samples_leaf: 2,
            learning_rate: 0.1,
            lambda: 1.0,
            bagging_fraction: 1.0,
            bagging_freq: 0,
            early_stopping_rounds: 5,
            seed: 42,
            max_thresholds: 32,
        }
    }

    #[test]
    fn learns_separable_signal() {
        let train = synthetic_dataset(100, 0);
        let validation = synthetic_dataset(40, 1000);

        let trainer = GbdtTrainer::new(config());
        let (model, diagnostics) = trainer.train(&train, &validation, &manifest()).unwrap();

        assert!(diagnostics.best_validation_auc > 0.95);
        assert!(!model.trees.is_empty());

        // High debt scores above low debt
        let high = model.raw_score(&[0.9, 0.5]);
        let low = model.raw_score(&[0.1, 0.5]);
        assert!(high > low);
    }

    #[test]
    fn training_is_deterministic() {
        let train = synthetic_dataset(80, 0);
        let validation = synthetic_dataset(30, 1000);

        let mut cfg = config();
        cfg.bagging_fraction = 0.8;
        cfg.bagging_freq = 2;

        let (model1, _) = GbdtTrainer::new(cfg.clone())
            .train(&train, &validation, &manifest())
            .unwrap();
        let (model2, _) = GbdtTrainer::new(cfg)
            .train(&train, &validation, &manifest())
            .unwrap();

        assert_eq!(model1, model2);
        assert_eq!(model1.hash_hex().unwrap(), model2.hash_hex().unwrap());
    }

    #[test]
    fn importance_ranks_informative_feature_first() {
        let train = synthetic_dataset(100, 0);
        let validation = synthetic_dataset(40, 1000);

        let (model, diagnostics) = GbdtTrainer::new(config())
            .train(&train, &validation, &manifest())
            .unwrap();

        assert_eq!(diagnostics.importance_ranking[0].0, "metric_debt_load30");
        assert!(model.importance["metric_debt_load30"] > model.importance["metric_volatility90"]);
    }

    #[test]
    fn empty_validation_set_is_a_training_error() {
        let train = synthetic_dataset(50, 0);
        let validation = Dataset::default();

        let err = GbdtTrainer::new(config())
            .train(&train, &validation, &manifest())
            .unwrap_err();
        assert!(matches!(err, TrainerError::Training(_)));
    }

    #[test]
    fn single_class_validation_fails_evaluation() {
        let train = synthetic_dataset(50, 0);
        let mut validation = synthetic_dataset(20, 1000);
        for example in &mut validation.examples {
            example.label = 0;
        }

        let err = GbdtTrainer::new(config())
            .train(&train, &validation, &manifest())
            .unwrap_err();
        assert!(matches!(err, TrainerError::Evaluation(_)));
    }

    #[test]
    fn rank_importance_is_stable_on_ties() {
        let schema = vec!["z".to_string(), "a".to_string(), "m".to_string()];
        let mut importance = BTreeMap::new();
        importance.insert("z".to_string(), 1.0);
        importance.insert("a".to_string(), 1.0);
        importance.insert("m".to_string(), 5.0);

        let ranking = rank_importance(&schema, &importance);
        assert_eq!(ranking[0].0, "m");
        assert_eq!(ranking[1].0, "z"); // schema order wins the tie
        assert_eq!(ranking[2].0, "a");
    }
}
