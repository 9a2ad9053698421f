//! Native GBDT model form
//!
//! The native form is the required serialization of a trained ensemble:
//! JSON with the full tree structure, the schema column names, and the
//! gain importance frozen at training time. A blake3 hash of the serialized
//! bytes is recorded in artifact metadata and verified on load.

use super::tree::Tree;
use crate::errors::{CoreError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Supported model format version
pub const MODEL_FORMAT_VERSION: u32 = 1;

/// Trained tree ensemble for binary classification.
///
/// `raw_score` returns log-odds; probability calibration and the published
/// 0-100 scale live in the engine, not here.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Model {
    /// Model format version
    pub version: u32,

    /// Schema column names in training order
    pub feature_names: Vec<String>,

    /// Initial prediction (empirical log-odds of the training base rate)
    pub bias: f64,

    /// Boosted trees, already truncated to the best early-stopping iteration
    pub trees: Vec<Tree>,

    /// Gain importance per column, frozen at training time
    pub importance: BTreeMap<String, f64>,
}

impl Model {
    pub fn new(
        feature_names: Vec<String>,
        bias: f64,
        trees: Vec<Tree>,
        importance: BTreeMap<String, f64>,
    ) -> Self {
        Self {
            version: MODEL_FORMAT_VERSION,
            feature_names,
            bias,
            trees,
            importance,
        }
    }

    /// Number of columns the model expects
    pub fn feature_count(&self) -> usize {
        self.feature_names.len()
    }

    /// Validate model structure
    pub fn validate(&self) -> Result<()> {
        if self.version != MODEL_FORMAT_VERSION {
            return Err(CoreError::InvalidModel(format!(
                "Unsupported model version: {}",
                self.version
            )));
        }
        if !self.bias.is_finite() {
            return Err(CoreError::InvalidModel("Non-finite bias".to_string()));
        }
        if self.feature_names.is_empty() {
            return Err(CoreError::InvalidModel(
                "Model has no feature columns".to_string(),
            ));
        }
        for (i, tree) in self.trees.iter().enumerate() {
            tree.validate().map_err(|e| {
                CoreError::InvalidModel(format!("Tree {} validation failed: {}", i, e))
            })?;
            if !tree.weight.is_finite() {
                return Err(CoreError::InvalidModel(format!(
                    "Tree {} has non-finite weight",
                    i
                )));
            }
        }
        Ok(())
    }

    /// Raw model output (log-odds) for a schema-ordered feature vector.
    ///
    /// bias + sum over trees of leaf * weight
    pub fn raw_score(&self, features: &[f64]) -> f64 {
        let mut sum = self.bias;
        for tree in &self.trees {
            sum += tree.evaluate(features) * tree.weight;
        }
        sum
    }

    /// Serialize to JSON bytes (the native on-disk form)
    pub fn to_json_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(self)?)
    }

    /// blake3 content hash of the native form, hex encoded
    pub fn hash_hex(&self) -> Result<String> {
        let bytes = self.to_json_bytes()?;
        Ok(hex::encode(blake3::hash(&bytes).as_bytes()))
    }

    /// Write the native form to disk
    pub fn save(&self, path: &Path) -> Result<()> {
        fs::write(path, self.to_json_bytes()?)?;
        Ok(())
    }

    /// Load and validate the native form from disk
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = fs::read(path)?;
        let model: Model = serde_json::from_slice(&bytes)?;
        model.validate()?;
        Ok(model)
    }
}
