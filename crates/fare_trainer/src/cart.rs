//! CART (Classification and Regression Tree) builder
//!
//! Deterministic exact-greedy regression tree construction over quantized
//! thresholds, in fixed-point arithmetic only. Candidate features are scored
//! in parallel; the reduction uses a total order so the chosen split never
//! depends on thread scheduling.

use rayon::prelude::*;
use std::cmp::Ordering;

use taxifare_core::gbdt::{Node, Tree};
use taxifare_core::{FeatureMatrix, SCALE};

use crate::deterministic::SplitTieBreaker;
use crate::errors::TrainerError;

/// Training parameters for a single tree
#[derive(Clone, Debug)]
pub struct TreeConfig {
    pub max_depth: usize,
    pub min_samples_leaf: usize,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            max_depth: 6,
            min_samples_leaf: 10,
        }
    }
}

/// Split candidate with gain and tie-breaker
#[derive(Debug, Clone)]
struct SplitCandidate {
    feature_idx: usize,
    threshold: i64,
    gain: i128,
    tie_breaker: SplitTieBreaker,
}

impl SplitCandidate {
    fn new(feature_idx: usize, threshold: i64, gain: i128, node_id: usize) -> Self {
        Self {
            feature_idx,
            threshold,
            gain,
            tie_breaker: SplitTieBreaker::new(feature_idx, threshold, node_id),
        }
    }

    /// Higher gain wins; equal gains fall back to the smaller tie-breaker.
    fn better(self, other: Self) -> Self {
        match self.gain.cmp(&other.gain) {
            Ordering::Greater => self,
            Ordering::Less => other,
            Ordering::Equal => {
                if self.tie_breaker <= other.tie_breaker {
                    self
                } else {
                    other
                }
            }
        }
    }
}

/// Gradient, hessian and row count of one threshold bucket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct BucketStats {
    gradient: i128,
    hessian: i128,
    count: usize,
}

impl BucketStats {
    fn add(&mut self, gradient: i64, hessian: i64) {
        self.gradient += gradient as i128;
        self.hessian += hessian as i128;
        self.count += 1;
    }
}

/// Nodes with fewer rows than `buckets / SPARSE_RATIO` sort their rows
/// instead of filling a dense histogram.
const SPARSE_RATIO: usize = 8;

/// Quantized buckets of one feature column.
#[derive(Debug, Clone)]
struct FeatureBuckets {
    /// Distinct bucket numbers, ascending
    buckets: Vec<i64>,
    /// Position in `buckets` of every row's value
    row_slot: Vec<usize>,
}

impl FeatureBuckets {
    fn new(features: &FeatureMatrix, feature_idx: usize, step: i64) -> Self {
        let raw: Vec<i64> = (0..features.rows())
            .map(|row| features.get(row, feature_idx).div_euclid(step))
            .collect();

        let mut buckets = raw.clone();
        buckets.sort_unstable();
        buckets.dedup();

        // Every raw bucket is present, so the search always hits
        let row_slot = raw
            .iter()
            .map(|bucket| buckets.binary_search(bucket).unwrap_or_else(|slot| slot))
            .collect();

        Self { buckets, row_slot }
    }

    /// Non-empty buckets of `rows` with their statistics, ascending.
    fn histogram(
        &self,
        rows: &[usize],
        gradients: &[i64],
        hessians: &[i64],
    ) -> Vec<(i64, BucketStats)> {
        if rows.len().saturating_mul(SPARSE_RATIO) < self.buckets.len() {
            self.sparse_histogram(rows, gradients, hessians)
        } else {
            self.dense_histogram(rows, gradients, hessians)
        }
    }

    fn dense_histogram(
        &self,
        rows: &[usize],
        gradients: &[i64],
        hessians: &[i64],
    ) -> Vec<(i64, BucketStats)> {
        let mut dense = vec![BucketStats::default(); self.buckets.len()];
        for &row in rows {
            dense[self.row_slot[row]].add(gradients[row], hessians[row]);
        }

        self.buckets
            .iter()
            .copied()
            .zip(dense)
            .filter(|(_, stats)| stats.count > 0)
            .collect()
    }

    fn sparse_histogram(
        &self,
        rows: &[usize],
        gradients: &[i64],
        hessians: &[i64],
    ) -> Vec<(i64, BucketStats)> {
        let mut slots: Vec<(usize, usize)> =
            rows.iter().map(|&row| (self.row_slot[row], row)).collect();
        slots.sort_unstable();

        let mut histogram: Vec<(i64, BucketStats)> = Vec::new();
        for (slot, row) in slots {
            let bucket = self.buckets[slot];
            if let Some((last, stats)) = histogram.last_mut() {
                if *last == bucket {
                    stats.add(gradients[row], hessians[row]);
                    continue;
                }
            }
            let mut stats = BucketStats::default();
            stats.add(gradients[row], hessians[row]);
            histogram.push((bucket, stats));
        }
        histogram
    }
}

/// Quantized bucket of every row, for every feature.
///
/// Features never change between boosting rounds, so the index is built once
/// per training run and shared by every tree.
#[derive(Debug, Clone)]
pub struct BucketIndex {
    quant_step: i64,
    rows: usize,
    features: Vec<FeatureBuckets>,
}

impl BucketIndex {
    pub fn new(features: &FeatureMatrix, quant_step: i64) -> Result<Self, TrainerError> {
        if quant_step <= 0 {
            return Err(TrainerError::Training(format!(
                "quant_step must be positive, got {quant_step}"
            )));
        }

        let columns = (0..features.width())
            .into_par_iter()
            .map(|feature_idx| FeatureBuckets::new(features, feature_idx, quant_step))
            .collect();

        Ok(Self {
            quant_step,
            rows: features.rows(),
            features: columns,
        })
    }

    pub fn quant_step(&self) -> i64 {
        self.quant_step
    }

    /// Number of distinct buckets of one feature.
    pub fn num_buckets(&self, feature_idx: usize) -> usize {
        self.features
            .get(feature_idx)
            .map_or(0, |column| column.buckets.len())
    }
}

/// Builds one regression tree from per-row gradients and hessians.
pub struct CartBuilder<'a> {
    config: TreeConfig,
    features: &'a FeatureMatrix,
    index: &'a BucketIndex,
    gradients: &'a [i64],
    hessians: &'a [i64],
}

impl<'a> CartBuilder<'a> {
    pub fn new(
        features: &'a FeatureMatrix,
        index: &'a BucketIndex,
        gradients: &'a [i64],
        hessians: &'a [i64],
        config: TreeConfig,
    ) -> Result<Self, TrainerError> {
        if gradients.len() != features.rows() || hessians.len() != features.rows() {
            return Err(TrainerError::Training(format!(
                "{} rows but {} gradients and {} hessians",
                features.rows(),
                gradients.len(),
                hessians.len()
            )));
        }
        if index.rows != features.rows() || index.features.len() != features.width() {
            return Err(TrainerError::Training(format!(
                "bucket index covers {} rows x {} features, matrix is {} x {}",
                index.rows,
                index.features.len(),
                features.rows(),
                features.width()
            )));
        }

        Ok(Self {
            config,
            features,
            index,
            gradients,
            hessians,
        })
    }

    /// Build a tree over `rows` whose leaves are shrunk by `weight`.
    ///
    /// Nodes are stored in preorder, so every child index is greater than
    /// its parent's.
    pub fn build(&self, rows: &[usize], weight: i64) -> Tree {
        let mut nodes = Vec::new();
        self.build_node(rows, 0, 0, &mut nodes);
        Tree::new(nodes, weight)
    }

    fn build_node(&self, rows: &[usize], depth: usize, node_id: usize, nodes: &mut Vec<Node>) -> i32 {
        let current = nodes.len() as i32;
        let min_leaf = self.config.min_samples_leaf.max(1);

        if depth >= self.config.max_depth || rows.len() < 2 * min_leaf {
            nodes.push(Node::leaf(current, self.leaf_value(rows)));
            return current;
        }

        let Some(split) = self.find_best_split(rows, node_id) else {
            nodes.push(Node::leaf(current, self.leaf_value(rows)));
            return current;
        };

        let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = rows
            .iter()
            .partition(|&&row| self.features.get(row, split.feature_idx) <= split.threshold);

        // Reserve the slot; children are patched in once built
        nodes.push(Node::internal(
            current,
            split.feature_idx as i32,
            split.threshold,
            -1,
            -1,
        ));

        let left = self.build_node(&left_rows, depth + 1, node_id * 2 + 1, nodes);
        let right = self.build_node(&right_rows, depth + 1, node_id * 2 + 2, nodes);

        let node = &mut nodes[current as usize];
        node.left = left;
        node.right = right;
        current
    }

    /// Best positive-gain split over all features, if any.
    fn find_best_split(&self, rows: &[usize], node_id: usize) -> Option<SplitCandidate> {
        let (gradient, hessian) = self.sum_gradients_hessians(rows);
        let total = BucketStats {
            gradient,
            hessian,
            count: rows.len(),
        };

        (0..self.features.width())
            .into_par_iter()
            .filter_map(|feature_idx| {
                self.best_split_for_feature(rows, feature_idx, node_id, total)
            })
            .reduce_with(SplitCandidate::better)
    }

    /// Scan the quantized buckets of one feature in ascending order.
    fn best_split_for_feature(
        &self,
        rows: &[usize],
        feature_idx: usize,
        node_id: usize,
        total: BucketStats,
    ) -> Option<SplitCandidate> {
        let step = self.index.quant_step;
        let min_leaf = self.config.min_samples_leaf.max(1);
        let parent_score = score(total.gradient, total.hessian);

        let histogram =
            self.index.features[feature_idx].histogram(rows, self.gradients, self.hessians);

        let mut left = BucketStats::default();
        let mut best: Option<SplitCandidate> = None;
        // The last bucket leaves nothing on the right
        let last = histogram.len().saturating_sub(1);
        for &(bucket, stats) in histogram.iter().take(last) {
            left.gradient += stats.gradient;
            left.hessian += stats.hessian;
            left.count += stats.count;

            let right_count = total.count - left.count;
            if left.count < min_leaf || right_count < min_leaf {
                continue;
            }

            let gain = score(left.gradient, left.hessian)
                + score(total.gradient - left.gradient, total.hessian - left.hessian)
                - parent_score;
            if gain <= 0 {
                continue;
            }

            // Largest value that still falls in `bucket`
            let threshold = bucket.saturating_add(1).saturating_mul(step).saturating_sub(1);
            let candidate = SplitCandidate::new(feature_idx, threshold, gain, node_id);
            best = Some(match best {
                Some(current) => current.better(candidate),
                None => candidate,
            });
        }

        best
    }

    fn sum_gradients_hessians(&self, rows: &[usize]) -> (i128, i128) {
        rows.iter().fold((0i128, 0i128), |(g, h), &row| {
            (g + self.gradients[row] as i128, h + self.hessians[row] as i128)
        })
    }

    /// Optimal leaf value `-G/H`, in fixed-point.
    fn leaf_value(&self, rows: &[usize]) -> i64 {
        let (sum_g, sum_h) = self.sum_gradients_hessians(rows);
        if sum_h == 0 {
            return 0;
        }
        let value = -(sum_g * SCALE as i128) / sum_h;
        value.clamp(i64::MIN as i128, i64::MAX as i128) as i64
    }
}

/// `G²/H`, the structure score of a node.
fn score(gradient: i128, hessian: i128) -> i128 {
    if hessian <= 0 {
        return 0;
    }
    gradient.saturating_mul(gradient) / hessian
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matrix(rows: &[[i64; 2]]) -> FeatureMatrix {
        let values = rows.iter().flatten().copied().collect();
        FeatureMatrix::new(rows.len(), 2, values).unwrap()
    }

    fn all_rows(n: usize) -> Vec<usize> {
        (0..n).collect()
    }

    fn build_tree(
        features: &FeatureMatrix,
        gradients: &[i64],
        config: TreeConfig,
        step: i64,
    ) -> Tree {
        let hessians = vec![SCALE; features.rows()];
        let index = BucketIndex::new(features, step).unwrap();
        CartBuilder::new(features, &index, gradients, &hessians, config)
            .unwrap()
            .build(&all_rows(features.rows()), SCALE)
    }

    #[test]
    fn test_simple_split() {
        let features = matrix(&[
            [100_000, 500_000],
            [200_000, 500_000],
            [300_000, 500_000],
            [400_000, 500_000],
        ]);
        // Negative gradients on the right half push those leaves up
        let gradients = vec![SCALE, SCALE, -SCALE, -SCALE];
        let config = TreeConfig {
            max_depth: 2,
            min_samples_leaf: 1,
        };

        let tree = build_tree(&features, &gradients, config, 50_000);

        assert!(tree.validate(2).is_ok());
        let root = &tree.nodes[0];
        assert_eq!(root.feature_idx, 0);
        assert_eq!(root.threshold, 249_999);
        assert_eq!(tree.evaluate(&[150_000, 0]), -SCALE);
        assert_eq!(tree.evaluate(&[350_000, 0]), SCALE);
    }

    #[test]
    fn test_leaf_only_tree() {
        let features = matrix(&[[100_000, 1]]);
        let tree = build_tree(&features, &[-2 * SCALE], TreeConfig::default(), 1_000);

        assert_eq!(tree.nodes.len(), 1);
        assert_eq!(tree.nodes[0].leaf, Some(2 * SCALE));
    }

    #[test]
    fn test_min_samples_leaf_respected() {
        let features = matrix(&[[0, 0], [1_000_000, 0], [2_000_000, 0], [3_000_000, 0]]);
        let gradients = vec![SCALE, -SCALE, -SCALE, -SCALE];
        let config = TreeConfig {
            max_depth: 3,
            min_samples_leaf: 2,
        };

        let tree = build_tree(&features, &gradients, config, 1_000);

        // Only the 2/2 split is allowed
        assert_eq!(tree.nodes.len(), 3);
        assert_eq!(tree.nodes[0].threshold, 1_000_999);
    }

    #[test]
    fn test_equal_gain_prefers_lower_feature() {
        // Both features separate the rows identically
        let features = matrix(&[[0, 0], [SCALE, SCALE]]);
        let config = TreeConfig {
            max_depth: 1,
            min_samples_leaf: 1,
        };

        let tree = build_tree(&features, &[SCALE, -SCALE], config, 1_000);
        assert_eq!(tree.nodes[0].feature_idx, 0);
    }

    #[test]
    fn test_constant_gradients_make_a_leaf() {
        let features = matrix(&[[0, 0], [SCALE, SCALE], [2 * SCALE, 0]]);
        let config = TreeConfig {
            max_depth: 4,
            min_samples_leaf: 1,
        };

        let tree = build_tree(&features, &[SCALE; 3], config, 1_000);
        assert_eq!(tree.nodes.len(), 1);
        assert_eq!(tree.nodes[0].leaf, Some(-SCALE));
    }

    #[test]
    fn test_negative_values_bucket_below_zero() {
        let features = matrix(&[[-1, 0], [0, 0], [999, 5_000], [1_000, 5_000]]);
        let index = BucketIndex::new(&features, 1_000).unwrap();
        assert_eq!(index.num_buckets(0), 3);
        assert_eq!(index.num_buckets(1), 2);

        let config = TreeConfig {
            max_depth: 1,
            min_samples_leaf: 1,
        };
        let tree = build_tree(&features, &[SCALE, -SCALE, -SCALE, -SCALE], config, 1_000);

        // Bucket -1 holds only the first row
        assert_eq!(tree.nodes[0].feature_idx, 0);
        assert_eq!(tree.nodes[0].threshold, -1);
    }

    #[test]
    fn test_sparse_and_dense_histograms_agree() {
        // Rows 2k and 2k+1 share a bucket
        let values: Vec<i64> = (0..100).map(|i| (i / 2) * SCALE).collect();
        let features = FeatureMatrix::new(100, 1, values).unwrap();
        let gradients: Vec<i64> = (0..100).map(|i| (i - 50) * SCALE).collect();
        let hessians = vec![SCALE; 100];
        let index = BucketIndex::new(&features, 1_000).unwrap();
        let column = &index.features[0];
        assert_eq!(column.buckets.len(), 50);

        let rows = [40, 9, 8];
        let sparse = column.sparse_histogram(&rows, &gradients, &hessians);
        assert_eq!(sparse, column.dense_histogram(&rows, &gradients, &hessians));
        assert_eq!(sparse, column.histogram(&rows, &gradients, &hessians));

        let buckets: Vec<(i64, usize)> = sparse.iter().map(|(b, s)| (*b, s.count)).collect();
        assert_eq!(buckets, vec![(4_000, 2), (20_000, 1)]);
        assert_eq!(sparse[0].1.gradient, -83 * SCALE as i128);

        let all = all_rows(100);
        assert_eq!(
            column.sparse_histogram(&all, &gradients, &hessians),
            column.dense_histogram(&all, &gradients, &hessians)
        );
    }

    #[test]
    fn test_mismatched_lengths_rejected() {
        let features = matrix(&[[0, 0]]);
        let index = BucketIndex::new(&features, 1_000).unwrap();
        assert!(CartBuilder::new(&features, &index, &[], &[SCALE], TreeConfig::default()).is_err());

        let other = matrix(&[[0, 0], [1, 1]]);
        assert!(
            CartBuilder::new(&other, &index, &[0, 0], &[SCALE, SCALE], TreeConfig::default())
                .is_err()
        );
        assert!(BucketIndex::new(&features, 0).is_err());
    }
}
