//! Model evaluation on the held-out validation slice
//!
//! ROC-AUC via the rank statistic with tie-averaged ranks, PR-AUC via
//! trapezoidal integration over recall-sorted points, and threshold metrics
//! at 0.5 on the calibrated probability. The resulting metrics object is
//! frozen into the artifact and never recomputed afterwards.

use crate::dataset::Dataset;
use crate::errors::{Result, TrainerError};
use riskscore_core::gbdt::Model;
use riskscore_core::{FeatureManifest, ModelMetrics};
use tracing::info;

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// Rank-based ROC-AUC (Mann-Whitney U), with average ranks on score ties.
/// Fails when the labels hold a single class: the metric is undefined.
pub fn roc_auc(labels: &[u8], scores: &[f64]) -> Result<f64> {
    if labels.len() != scores.len() {
        return Err(TrainerError::Evaluation(
            "Label and score lengths differ".to_string(),
        ));
    }
    let n_pos = labels.iter().filter(|&&l| l == 1).count();
    let n_neg = labels.len() - n_pos;
    if n_pos == 0 || n_neg == 0 {
        return Err(TrainerError::Evaluation(
            "ROC-AUC undefined for a single-class label set".to_string(),
        ));
    }

    let mut order: Vec<usize> = (0..labels.len()).collect();
    order.sort_by(|&a, &b| scores[a].total_cmp(&scores[b]));

    // Average ranks over tie groups (1-based)
    let mut rank_sum_pos = 0.0;
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && scores[order[j + 1]] == scores[order[i]] {
            j += 1;
        }
        let avg_rank = ((i + 1) + (j + 1)) as f64 / 2.0;
        for &idx in &order[i..=j] {
            if labels[idx] == 1 {
                rank_sum_pos += avg_rank;
            }
        }
        i = j + 1;
    }

    let n_pos_f = n_pos as f64;
    let auc = (rank_sum_pos - n_pos_f * (n_pos_f + 1.0) / 2.0) / (n_pos_f * n_neg as f64);
    Ok(auc)
}

/// PR-AUC: trapezoidal integration over recall-sorted (precision, recall)
/// points derived from the scores.
pub fn pr_auc(labels: &[u8], scores: &[f64]) -> Result<f64> {
    if labels.len() != scores.len() {
        return Err(TrainerError::Evaluation(
            "Label and score lengths differ".to_string(),
        ));
    }
    let n_pos = labels.iter().filter(|&&l| l == 1).count();
    if n_pos == 0 {
        return Err(TrainerError::Evaluation(
            "PR-AUC undefined without positive labels".to_string(),
        ));
    }

    let mut order: Vec<usize> = (0..labels.len()).collect();
    order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));

    // One (recall, precision) point per distinct score threshold
    let mut points: Vec<(f64, f64)> = vec![(0.0, 1.0)];
    let mut tp = 0usize;
    let mut fp = 0usize;
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && scores[order[j + 1]] == scores[order[i]] {
            j += 1;
        }
        for &idx in &order[i..=j] {
            if labels[idx] == 1 {
                tp += 1;
            } else {
                fp += 1;
            }
        }
        let recall = tp as f64 / n_pos as f64;
        let precision = tp as f64 / (tp + fp) as f64;
        points.push((recall, precision));
        i = j + 1;
    }

    let mut area = 0.0;
    for pair in points.windows(2) {
        let (r0, p0) = pair[0];
        let (r1, p1) = pair[1];
        area += (r1 - r0) * (p0 + p1) / 2.0;
    }
    Ok(area)
}

/// Compute the full frozen metrics object for one model and validation slice.
pub fn evaluate(
    model: &Model,
    validation: &Dataset,
    manifest: &FeatureManifest,
) -> Result<ModelMetrics> {
    if validation.is_empty() {
        return Err(TrainerError::Evaluation(
            "Validation set is empty".to_string(),
        ));
    }

    let mut labels = Vec::with_capacity(validation.len());
    let mut raw_scores = Vec::with_capacity(validation.len());
    for example in &validation.examples {
        let extended = manifest.transform.apply(&example.snapshot.features);
        let (vector, _missing) = manifest.schema.reconcile(&extended);
        labels.push(example.label);
        raw_scores.push(model.raw_score(&vector));
    }

    let probabilities: Vec<f64> = raw_scores.iter().map(|&raw| sigmoid(raw)).collect();

    let roc = roc_auc(&labels, &raw_scores)?;
    let pr = pr_auc(&labels, &probabilities)?;

    // Threshold metrics at 0.5 on the calibrated probability
    let mut tp = 0usize;
    let mut fp = 0usize;
    let mut tn = 0usize;
    let mut fn_ = 0usize;
    for (label, probability) in labels.iter().zip(&probabilities) {
        let predicted = u8::from(*probability > 0.5);
        match (predicted, *label) {
            (1, 1) => tp += 1,
            (1, 0) => fp += 1,
            (0, 0) => tn += 1,
            _ => fn_ += 1,
        }
    }

    let accuracy = (tp + tn) as f64 / labels.len() as f64;
    let precision = if tp + fp > 0 {
        tp as f64 / (tp + fp) as f64
    } else {
        0.0
    };
    let recall = if tp + fn_ > 0 {
        tp as f64 / (tp + fn_) as f64
    } else {
        0.0
    };
    let f1 = if precision + recall > 0.0 {
        2.0 * precision * recall / (precision + recall)
    } else {
        0.0
    };

    let metrics = ModelMetrics {
        roc_auc: roc,
        pr_auc: pr,
        accuracy,
        f1,
        feature_importance: model.importance.clone(),
    };

    if !metrics.roc_auc.is_finite() || !metrics.pr_auc.is_finite() {
        return Err(TrainerError::Evaluation(
            "Non-finite metric computed".to_string(),
        ));
    }

    info!(
        roc_auc = metrics.roc_auc,
        pr_auc = metrics.pr_auc,
        accuracy = metrics.accuracy,
        f1 = metrics.f1,
        "Evaluation complete"
    );
    Ok(metrics)
}
