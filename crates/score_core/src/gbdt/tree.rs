//! Decision tree structures for GBDT inference
//!
//! Index-based trees: node 0 is the root, internal nodes route on
//! `feature <= threshold` (equal goes left), leaves carry the raw
//! log-odds contribution.

use serde::{Deserialize, Serialize};

/// A decision tree node (internal or leaf)
///
/// For internal nodes:
/// - `feature_idx >= 0`: index into the schema-ordered feature vector
/// - `left` and `right` point to child node indices
/// - `leaf` is `None`
///
/// For leaf nodes:
/// - `feature_idx == -1`
/// - `leaf` contains the prediction value
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Node {
    /// Node ID (for reference, not used in traversal)
    pub id: i32,

    /// Left child index (-1 for leaf nodes)
    pub left: i32,

    /// Right child index (-1 for leaf nodes)
    pub right: i32,

    /// Feature index to split on (-1 for leaf nodes)
    pub feature_idx: i32,

    /// Threshold value for the split
    pub threshold: f64,

    /// Leaf value (Some for leaf nodes, None for internal nodes)
    pub leaf: Option<f64>,
}

impl Node {
    /// Create a new internal (split) node
    pub fn internal(id: i32, feature_idx: i32, threshold: f64, left: i32, right: i32) -> Self {
        Self {
            id,
            left,
            right,
            feature_idx,
            threshold,
            leaf: None,
        }
    }

    /// Create a new leaf node
    pub fn leaf(id: i32, value: f64) -> Self {
        Self {
            id,
            left: -1,
            right: -1,
            feature_idx: -1,
            threshold: 0.0,
            leaf: Some(value),
        }
    }

    /// Check if this node is a leaf
    pub fn is_leaf(&self) -> bool {
        self.feature_idx == -1 || self.leaf.is_some()
    }

    /// Get the leaf value if this is a leaf node
    pub fn leaf_value(&self) -> Option<f64> {
        self.leaf
    }
}

/// A single decision tree in the ensemble
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Tree {
    /// Tree nodes (node 0 is the root)
    pub nodes: Vec<Node>,

    /// Shrinkage weight applied to this tree's output (the learning rate)
    pub weight: f64,
}

impl Tree {
    /// Create a new tree with the given nodes and weight
    pub fn new(nodes: Vec<Node>, weight: f64) -> Self {
        Self { nodes, weight }
    }

    /// Evaluate this tree on a feature vector
    pub fn evaluate(&self, features: &[f64]) -> f64 {
        if self.nodes.is_empty() {
            return 0.0;
        }

        let mut idx = 0usize;

        loop {
            if idx >= self.nodes.len() {
                return 0.0; // Invalid tree structure
            }

            let node = &self.nodes[idx];

            if node.is_leaf() {
                return node.leaf_value().unwrap_or(0.0);
            }

            let feature_idx = node.feature_idx as usize;
            if feature_idx >= features.len() {
                return 0.0; // Invalid feature index
            }

            // Equal goes left
            idx = if features[feature_idx] <= node.threshold {
                if node.left < 0 || node.left as usize >= self.nodes.len() {
                    return 0.0;
                }
                node.left as usize
            } else {
                if node.right < 0 || node.right as usize >= self.nodes.len() {
                    return 0.0;
                }
                node.right as usize
            };
        }
    }

    /// Get the root node
    pub fn root(&self) -> Option<&Node> {
        self.nodes.first()
    }

    /// Validate tree structure
    pub fn validate(&self) -> Result<(), String> {
        if self.nodes.is_empty() {
            return Err("Tree has no nodes".to_string());
        }

        for (i, node) in self.nodes.iter().enumerate() {
            if !node.is_leaf() {
                if node.left < 0 || node.left as usize >= self.nodes.len() {
                    return Err(format!("Node {} has invalid left child: {}", i, node.left));
                }
                if node.right < 0 || node.right as usize >= self.nodes.len() {
                    return Err(format!(
                        "Node {} has invalid right child: {}",
                        i, node.right
                    ));
                }
                if node.feature_idx < 0 {
                    return Err(format!(
                        "Internal node {} has invalid feature index: {}",
                        i, node.feature_idx
                    ));
                }
                if !node.threshold.is_finite() {
                    return Err(format!("Node {} has non-finite threshold", i));
                }
            } else {
                match node.leaf {
                    Some(v) if v.is_finite() => {}
                    Some(_) => return Err(format!("Leaf node {i} has non-finite value")),
                    None => return Err(format!("Leaf node {i} has no leaf value")),
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_creation() {
        let internal = Node::internal(0, 3, 0.25, 1, 2);
        assert_eq!(internal.id, 0);
        assert_eq!(internal.feature_idx, 3);
        assert_eq!(internal.threshold, 0.25);
        assert!(!internal.is_leaf());

        let leaf = Node::leaf(1, -0.4);
        assert_eq!(leaf.feature_idx, -1);
        assert!(leaf.is_leaf());
        assert_eq!(leaf.leaf_value(), Some(-0.4));
    }

    #[test]
    fn test_tree_evaluation() {
        // if feature[0] <= 0.5, return 0.1, else return 0.2
        let tree = Tree::new(
            vec![
                Node::internal(0, 0, 0.5, 1, 2),
                Node::leaf(1, 0.1),
                Node::leaf(2, 0.2),
            ],
            1.0,
        );

        assert_eq!(tree.evaluate(&[0.3]), 0.1);
        assert_eq!(tree.evaluate(&[0.5]), 0.1); // Equal goes left
        assert_eq!(tree.evaluate(&[0.6]), 0.2);
    }

    #[test]
    fn test_tree_validation() {
        let valid_tree = Tree::new(
            vec![
                Node::internal(0, 0, 0.5, 1, 2),
                Node::leaf(1, 0.1),
                Node::leaf(2, 0.2),
            ],
            1.0,
        );
        assert!(valid_tree.validate().is_ok());

        // Invalid tree: left child out of bounds
        let invalid_tree = Tree::new(
            vec![
                Node::internal(0, 0, 0.5, 5, 2),
                Node::leaf(1, 0.1),
                Node::leaf(2, 0.2),
            ],
            1.0,
        );
        assert!(invalid_tree.validate().is_err());
    }

    #[test]
    fn test_deterministic_traversal() {
        let tree = Tree::new(
            vec![
                Node::internal(0, 0, 0.5, 1, 2),
                Node::leaf(1, 0.1),
                Node::leaf(2, 0.2),
            ],
            1.0,
        );

        let features = vec![0.3, 0.4, 0.5];
        let first = tree.evaluate(&features);
        for _ in 0..10 {
            assert_eq!(tree.evaluate(&features), first);
        }
    }
}
