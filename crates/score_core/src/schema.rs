//! Versioned feature schema shared between training and serving.
//!
//! The schema is the ordered list of feature names a specific model artifact
//! expects. Column order is a correctness contract for tree ensembles: the
//! serving side must produce vectors in exactly the order training used, so
//! the schema is captured once at training time and frozen into the artifact
//! alongside the transform version that produced it.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Ordered feature schema bound to exactly one model artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureSchema {
    /// Version of the feature transform that produced these columns
    pub transform_version: u32,
    /// Feature names in training column order
    pub features: Vec<String>,
}

impl FeatureSchema {
    pub fn new(transform_version: u32, features: Vec<String>) -> Self {
        Self {
            transform_version,
            features,
        }
    }

    /// Number of columns the model expects
    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Build a feature vector in schema order from an unordered input mapping.
    ///
    /// Schema features absent from the input are filled with 0.0 and reported
    /// back by name; extra input features are ignored. Missing features are
    /// never a hard error at serve time.
    pub fn reconcile(&self, input: &BTreeMap<String, f64>) -> (Vec<f64>, Vec<String>) {
        let mut vector = Vec::with_capacity(self.features.len());
        let mut missing = Vec::new();

        for name in &self.features {
            match input.get(name) {
                Some(value) if value.is_finite() => vector.push(*value),
                Some(_) => {
                    // NaN/inf inputs are treated the same as absent values
                    missing.push(name.clone());
                    vector.push(0.0);
                }
                None => {
                    missing.push(name.clone());
                    vector.push(0.0);
                }
            }
        }

        (vector, missing)
    }
}
