//! Regression tree structures for GBDT inference
//!
//! Nodes hold fixed-point integers at SCALE precision. Traversal goes left
//! when `feature <= threshold`.

use serde::{Deserialize, Serialize};

/// A decision tree node (internal or leaf)
///
/// For internal nodes `feature_idx >= 0` and `left`/`right` index into the
/// owning tree's node list. Leaf nodes have `feature_idx == -1` and carry a
/// `leaf` value.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Node {
    /// Position of this node in the tree's node list
    pub id: i32,

    /// Left child index (-1 for leaf nodes)
    pub left: i32,

    /// Right child index (-1 for leaf nodes)
    pub right: i32,

    /// Feature index to split on (-1 for leaf nodes)
    pub feature_idx: i32,

    /// Split threshold (fixed-point integer)
    pub threshold: i64,

    /// Leaf value (Some for leaf nodes, None for internal nodes)
    pub leaf: Option<i64>,
}

impl Node {
    pub fn internal(id: i32, feature_idx: i32, threshold: i64, left: i32, right: i32) -> Self {
        Self {
            id,
            left,
            right,
            feature_idx,
            threshold,
            leaf: None,
        }
    }

    pub fn leaf(id: i32, value: i64) -> Self {
        Self {
            id,
            left: -1,
            right: -1,
            feature_idx: -1,
            threshold: 0,
            leaf: Some(value),
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.feature_idx == -1 || self.leaf.is_some()
    }
}

/// A single regression tree with integer-only nodes
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Tree {
    /// Tree nodes (node 0 is the root)
    pub nodes: Vec<Node>,

    /// Shrinkage applied to this tree's leaves (fixed-point, SCALE = 1.0)
    pub weight: i64,
}

impl Tree {
    pub fn new(nodes: Vec<Node>, weight: i64) -> Self {
        Self { nodes, weight }
    }

    /// Raw leaf value reached by `features`.
    ///
    /// Malformed structure (dangling child, cycle, out-of-range feature) yields 0;
    /// `validate` rejects such trees at load time.
    pub fn evaluate(&self, features: &[i64]) -> i64 {
        let mut idx = 0usize;

        // A well-formed path visits each node at most once
        for _ in 0..self.nodes.len() {
            let Some(node) = self.nodes.get(idx) else {
                return 0;
            };

            if node.is_leaf() {
                return node.leaf.unwrap_or(0);
            }

            let Some(&value) = features.get(node.feature_idx as usize) else {
                return 0;
            };

            let next = if value <= node.threshold {
                node.left
            } else {
                node.right
            };
            if next < 0 {
                return 0;
            }
            idx = next as usize;
        }
        0
    }

    /// Weighted contribution of this tree to an ensemble score.
    pub fn contribution(&self, features: &[i64], scale: i64) -> i64 {
        let leaf = self.evaluate(features) as i128;
        let weighted = leaf * self.weight as i128 / scale as i128;
        weighted.clamp(i64::MIN as i128, i64::MAX as i128) as i64
    }

    /// Depth of the deepest leaf (a single leaf has depth 0).
    pub fn depth(&self) -> usize {
        fn walk(nodes: &[Node], idx: usize, depth: usize) -> usize {
            match nodes.get(idx) {
                Some(node) if !node.is_leaf() => {
                    let left = walk(nodes, node.left as usize, depth + 1);
                    let right = walk(nodes, node.right as usize, depth + 1);
                    left.max(right)
                }
                _ => depth,
            }
        }
        walk(&self.nodes, 0, 0)
    }

    /// Validate tree structure against the expected feature width.
    pub fn validate(&self, feature_count: usize) -> Result<(), String> {
        if self.nodes.is_empty() {
            return Err("Tree has no nodes".to_string());
        }

        for (i, node) in self.nodes.iter().enumerate() {
            if node.is_leaf() {
                if node.leaf.is_none() {
                    return Err(format!("Leaf node {i} has no leaf value"));
                }
                continue;
            }

            // Children must come after their parent, which also rules out cycles.
            for (side, child) in [("left", node.left), ("right", node.right)] {
                if child <= i as i32 || child as usize >= self.nodes.len() {
                    return Err(format!("Node {i} has invalid {side} child: {child}"));
                }
            }

            if node.feature_idx < 0 || node.feature_idx as usize >= feature_count {
                return Err(format!(
                    "Internal node {i} has invalid feature index: {}",
                    node.feature_idx
                ));
            }
        }

        Ok(())
    }
}
