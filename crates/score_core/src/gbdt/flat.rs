//! Optimized model form
//!
//! Execution-only flattening of the native ensemble: all trees share one
//! structure-of-arrays node arena, serialized with bincode. The flat form
//! carries no column names and no importance payload; it exists purely for
//! lower-latency batch traversal. Export is best-effort and the engine falls
//! back to the native form when it is absent or unreadable.

use super::model::Model;
use crate::errors::{CoreError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Leaf marker in the `feature_idx` arena
const LEAF: i32 = -1;

/// Flattened tree ensemble.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FlatModel {
    pub version: u32,
    pub feature_count: u32,
    pub bias: f64,

    /// Arena index of each tree's root
    pub tree_roots: Vec<u32>,
    /// Shrinkage weight per tree
    pub tree_weights: Vec<f64>,

    /// Node arena (one entry per node across all trees)
    pub feature_idx: Vec<i32>,
    pub threshold: Vec<f64>,
    pub left: Vec<u32>,
    pub right: Vec<u32>,
    pub leaf: Vec<f64>,
}

impl From<&Model> for FlatModel {
    fn from(model: &Model) -> Self {
        let mut flat = FlatModel {
            version: model.version,
            feature_count: model.feature_names.len() as u32,
            bias: model.bias,
            tree_roots: Vec::with_capacity(model.trees.len()),
            tree_weights: Vec::with_capacity(model.trees.len()),
            feature_idx: Vec::new(),
            threshold: Vec::new(),
            left: Vec::new(),
            right: Vec::new(),
            leaf: Vec::new(),
        };

        for tree in &model.trees {
            let offset = flat.feature_idx.len() as u32;
            flat.tree_roots.push(offset);
            flat.tree_weights.push(tree.weight);

            for node in &tree.nodes {
                if node.is_leaf() {
                    flat.feature_idx.push(LEAF);
                    flat.threshold.push(0.0);
                    flat.left.push(0);
                    flat.right.push(0);
                    flat.leaf.push(node.leaf_value().unwrap_or(0.0));
                } else {
                    flat.feature_idx.push(node.feature_idx);
                    flat.threshold.push(node.threshold);
                    flat.left.push(offset + node.left as u32);
                    flat.right.push(offset + node.right as u32);
                    flat.leaf.push(0.0);
                }
            }
        }

        flat
    }
}

impl FlatModel {
    /// Validate arena consistency
    pub fn validate(&self) -> Result<()> {
        let n = self.feature_idx.len();
        if self.threshold.len() != n
            || self.left.len() != n
            || self.right.len() != n
            || self.leaf.len() != n
        {
            return Err(CoreError::InvalidModel(
                "Flat model arena arrays have mismatched lengths".to_string(),
            ));
        }
        if self.tree_roots.len() != self.tree_weights.len() {
            return Err(CoreError::InvalidModel(
                "Flat model tree arrays have mismatched lengths".to_string(),
            ));
        }
        for &root in &self.tree_roots {
            if root as usize >= n && n > 0 {
                return Err(CoreError::InvalidModel(format!(
                    "Flat model root {} out of bounds",
                    root
                )));
            }
        }
        for i in 0..n {
            if self.feature_idx[i] != LEAF {
                if self.left[i] as usize >= n || self.right[i] as usize >= n {
                    return Err(CoreError::InvalidModel(format!(
                        "Flat model node {} has out-of-bounds child",
                        i
                    )));
                }
            }
        }
        Ok(())
    }

    /// Raw model output (log-odds) for a schema-ordered feature vector.
    ///
    /// Numerically identical to `Model::raw_score` on the source ensemble.
    pub fn raw_score(&self, features: &[f64]) -> f64 {
        let mut sum = self.bias;

        for (t, &root) in self.tree_roots.iter().enumerate() {
            let mut idx = root as usize;
            loop {
                if idx >= self.feature_idx.len() {
                    break;
                }
                let feature = self.feature_idx[idx];
                if feature == LEAF {
                    sum += self.leaf[idx] * self.tree_weights[t];
                    break;
                }
                let f = feature as usize;
                let value = if f < features.len() { features[f] } else { 0.0 };
                idx = if value <= self.threshold[idx] {
                    self.left[idx] as usize
                } else {
                    self.right[idx] as usize
                };
            }
        }

        sum
    }

    /// Write the optimized form to disk
    pub fn save(&self, path: &Path) -> Result<()> {
        let bytes =
            bincode::serialize(self).map_err(|e| CoreError::Encoding(e.to_string()))?;
        fs::write(path, bytes)?;
        Ok(())
    }

    /// Load and validate the optimized form from disk
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = fs::read(path)?;
        let flat: FlatModel =
            bincode::deserialize(&bytes).map_err(|e| CoreError::Encoding(e.to_string()))?;
        flat.validate()?;
        Ok(flat)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gbdt::tree::{Node, Tree};
    use std::collections::BTreeMap;

    fn model() -> Model {
        let tree1 = Tree::new(
            vec![
                Node::internal(0, 0, 0.5, 1, 2),
                Node::internal(1, 1, -1.0, 3, 4),
                Node::leaf(2, 2.0),
                Node::leaf(3, -1.0),
                Node::leaf(4, 1.0),
            ],
            0.05,
        );
        let tree2 = Tree::new(vec![Node::leaf(0, 0.7)], 0.05);
        Model::new(
            vec!["a".to_string(), "b".to_string()],
            0.3,
            vec![tree1, tree2],
            BTreeMap::new(),
        )
    }

    #[test]
    fn flat_scores_match_native_scores() {
        let native = model();
        let flat = FlatModel::from(&native);
        flat.validate().unwrap();

        let cases: [&[f64]; 4] = [
            &[0.4, -2.0],
            &[0.4, 0.0],
            &[0.9, 5.0],
            &[0.5, -1.0],
        ];
        for features in cases {
            assert_eq!(native.raw_score(features), flat.raw_score(features));
        }
    }

    #[test]
    fn flat_roundtrips_through_bincode() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.bin");

        let flat = FlatModel::from(&model());
        flat.save(&path).unwrap();
        let loaded = FlatModel::load(&path).unwrap();
        assert_eq!(flat, loaded);
    }

    #[test]
    fn validate_catches_truncated_arena() {
        let mut flat = FlatModel::from(&model());
        flat.threshold.pop();
        assert!(flat.validate().is_err());
    }
}
