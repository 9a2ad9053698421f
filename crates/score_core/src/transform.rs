//! Feature engineering applied identically at train and serve time.
//!
//! The transform is split into fit and apply: `TransformSpec::fit` learns the
//! constants (log shifts) from the training rows once, and the fitted spec is
//! frozen into the artifact's feature manifest. `apply` is a pure function of
//! the spec, so replaying it at serve time reproduces the training columns
//! bit-for-bit.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Current transform logic version. Bumped whenever the derivation of any
/// output column changes; artifacts record the version they were built with.
pub const TRANSFORM_VERSION: u32 = 1;

/// Ratio feature: numerator / max(denominator, 1.0)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatioSpec {
    pub name: String,
    pub numerator: String,
    pub denominator: String,
}

/// Pairwise interaction product of two predictors
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InteractionSpec {
    pub name: String,
    pub left: String,
    pub right: String,
}

/// Which derived columns to build. The defaults cover the known-skewed and
/// strong-predictor metrics of the base feature set.
#[derive(Debug, Clone)]
pub struct TransformConfig {
    /// Columns to log-shift (skewed distributions)
    pub log_columns: Vec<String>,
    /// (numerator, denominator) pairs for ratio features
    pub ratios: Vec<(String, String)>,
    /// (left, right) pairs for interaction products
    pub interactions: Vec<(String, String)>,
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self {
            log_columns: vec![
                "metric_median_paycheck".to_string(),
                "metric_net_cash30".to_string(),
            ],
            ratios: vec![
                (
                    "metric_net_cash30".to_string(),
                    "metric_median_paycheck".to_string(),
                ),
                (
                    "metric_debt_load30".to_string(),
                    "metric_observed_history_days".to_string(),
                ),
            ],
            interactions: vec![
                (
                    "metric_debt_load30".to_string(),
                    "metric_overdraft_count90".to_string(),
                ),
                (
                    "metric_volatility90".to_string(),
                    "metric_buffer_volatility".to_string(),
                ),
            ],
        }
    }
}

/// Fitted transform constants, frozen into the artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformSpec {
    pub version: u32,
    /// Column -> additive shift applied before ln()
    pub log_shifts: BTreeMap<String, f64>,
    pub ratios: Vec<RatioSpec>,
    pub interactions: Vec<InteractionSpec>,
}

impl Default for TransformSpec {
    fn default() -> Self {
        Self {
            version: TRANSFORM_VERSION,
            log_shifts: BTreeMap::new(),
            ratios: Vec::new(),
            interactions: Vec::new(),
        }
    }
}

fn short_name(column: &str) -> &str {
    column.strip_prefix("metric_").unwrap_or(column)
}

impl TransformSpec {
    /// Learn transform constants from the training rows.
    ///
    /// For each configured log column the shift is `1 - min` when the column
    /// minimum is negative, else `1`, so the logged value is
    /// `ln(x - min + 1)` / `ln(x + 1)` respectively. Columns absent from
    /// every row are dropped from the spec.
    pub fn fit(config: &TransformConfig, rows: &[BTreeMap<String, f64>]) -> Self {
        let mut log_shifts = BTreeMap::new();

        for column in &config.log_columns {
            let mut min: Option<f64> = None;
            for row in rows {
                if let Some(v) = row.get(column) {
                    if v.is_finite() {
                        min = Some(match min {
                            Some(m) => m.min(*v),
                            None => *v,
                        });
                    }
                }
            }
            if let Some(m) = min {
                let shift = if m < 0.0 { 1.0 - m } else { 1.0 };
                log_shifts.insert(column.clone(), shift);
            }
        }

        let present = |column: &String| rows.iter().any(|row| row.contains_key(column));

        let ratios = config
            .ratios
            .iter()
            .filter(|(num, den)| present(num) && present(den))
            .map(|(num, den)| RatioSpec {
                name: format!("ratio_{}_per_{}", short_name(num), short_name(den)),
                numerator: num.clone(),
                denominator: den.clone(),
            })
            .collect();

        let interactions = config
            .interactions
            .iter()
            .filter(|(left, right)| present(left) && present(right))
            .map(|(left, right)| InteractionSpec {
                name: format!("ix_{}_x_{}", short_name(left), short_name(right)),
                left: left.clone(),
                right: right.clone(),
            })
            .collect();

        Self {
            version: TRANSFORM_VERSION,
            log_shifts,
            ratios,
            interactions,
        }
    }

    /// Extend a raw feature mapping with the derived columns.
    ///
    /// Pure and deterministic for a fixed spec. Derived columns whose inputs
    /// are absent are simply not emitted; schema reconciliation downstream
    /// zero-fills and warns.
    pub fn apply(&self, input: &BTreeMap<String, f64>) -> BTreeMap<String, f64> {
        let mut out = input.clone();

        for (column, shift) in &self.log_shifts {
            if let Some(v) = input.get(column) {
                // Serve-time values can undershoot the fitted minimum; the
                // argument is floored to keep ln() defined.
                let logged = (v + shift).max(f64::MIN_POSITIVE).ln();
                out.insert(format!("log_{}", short_name(column)), logged);
            }
        }

        for ratio in &self.ratios {
            if let (Some(num), Some(den)) =
                (input.get(&ratio.numerator), input.get(&ratio.denominator))
            {
                // Denominator floor-clipped to 1 to avoid division blow-up
                out.insert(ratio.name.clone(), num / den.max(1.0));
            }
        }

        for interaction in &self.interactions {
            if let (Some(left), Some(right)) =
                (input.get(&interaction.left), input.get(&interaction.right))
            {
                out.insert(interaction.name.clone(), left * right);
            }
        }

        out
    }

    /// Full ordered column list: base columns followed by derived columns in
    /// spec order. This ordering is what the schema freezes.
    pub fn output_features(&self, base: &[String]) -> Vec<String> {
        let mut features: Vec<String> = base.to_vec();
        for column in self.log_shifts.keys() {
            features.push(format!("log_{}", short_name(column)));
        }
        for ratio in &self.ratios {
            features.push(ratio.name.clone());
        }
        for interaction in &self.interactions {
            features.push(interaction.name.clone());
        }
        features
    }
}
