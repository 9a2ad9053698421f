//! Evaluation metrics frozen into each artifact.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Metrics computed once on the held-out validation slice at training time.
/// These are the sole input to the promotion gate and are never recomputed
/// after artifact creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetrics {
    pub roc_auc: f64,
    pub pr_auc: f64,
    pub accuracy: f64,
    pub f1: f64,
    /// Gain-based importance per schema column
    pub feature_importance: BTreeMap<String, f64>,
}

impl ModelMetrics {
    /// Importance ranking sorted descending, ties broken by schema order.
    pub fn importance_ranking(&self, schema_order: &[String]) -> Vec<(String, f64)> {
        let position = |name: &str| {
            schema_order
                .iter()
                .position(|f| f == name)
                .unwrap_or(usize::MAX)
        };

        let mut ranking: Vec<(String, f64)> = self
            .feature_importance
            .iter()
            .map(|(name, value)| (name.clone(), *value))
            .collect();
        ranking.sort_by(|a, b| {
            b.1.total_cmp(&a.1)
                .then_with(|| position(&a.0).cmp(&position(&b.0)))
        });
        ranking
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ranking_breaks_ties_by_schema_order() {
        let mut importance = BTreeMap::new();
        importance.insert("b".to_string(), 1.0);
        importance.insert("a".to_string(), 1.0);
        importance.insert("c".to_string(), 2.0);

        let metrics = ModelMetrics {
            roc_auc: 0.8,
            pr_auc: 0.7,
            accuracy: 0.75,
            f1: 0.6,
            feature_importance: importance,
        };

        let schema = vec!["b".to_string(), "a".to_string(), "c".to_string()];
        let ranking = metrics.importance_ranking(&schema);
        assert_eq!(ranking[0].0, "c");
        // "b" precedes "a" in the schema, so the tie resolves to "b" first
        assert_eq!(ranking[1].0, "b");
        assert_eq!(ranking[2].0, "a");
    }
}
