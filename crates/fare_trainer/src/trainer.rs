//! Gradient Boosted Decision Tree (GBDT) trainer
//!
//! Deterministic boosting with squared-error loss, fixed-point arithmetic
//! and exact-greedy CART splits. Plugs into the feature pipeline as its
//! [`Regressor`] stage.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use taxifare_core::gbdt::Model;
use taxifare_core::pipeline::Regressor;
use taxifare_core::{FeatureMatrix, PipelineError, SCALE};

use crate::cart::{BucketIndex, CartBuilder, TreeConfig};
use crate::deterministic::LcgRng;
use crate::errors::{ConfigError, TrainerError};

/// GBDT training configuration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GbdtConfig {
    pub num_trees: usize,
    pub max_depth: usize,
    pub min_samples_leaf: usize,
    /// Shrinkage per tree, fixed-point (200_000 = 0.2)
    pub learning_rate: i64,
    /// Threshold bucket width, fixed-point
    pub quant_step: i64,
    /// Fraction of rows sampled per tree, fixed-point; SCALE uses every row
    pub subsample: i64,
    pub seed: u64,
}

impl Default for GbdtConfig {
    fn default() -> Self {
        Self {
            num_trees: 100,
            max_depth: 6,
            min_samples_leaf: 10,
            learning_rate: 200_000,
            quant_step: 1_000,
            subsample: SCALE,
            seed: 0,
        }
    }
}

impl GbdtConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.num_trees == 0 {
            return Err(ConfigError::Invalid("num_trees must be at least 1".into()));
        }
        if self.min_samples_leaf == 0 {
            return Err(ConfigError::Invalid(
                "min_samples_leaf must be at least 1".into(),
            ));
        }
        if self.learning_rate <= 0 {
            return Err(ConfigError::Invalid(format!(
                "learning_rate must be positive, got {}",
                self.learning_rate
            )));
        }
        if self.quant_step <= 0 {
            return Err(ConfigError::Invalid(format!(
                "quant_step must be positive, got {}",
                self.quant_step
            )));
        }
        if self.subsample <= 0 || self.subsample > SCALE {
            return Err(ConfigError::Invalid(format!(
                "subsample must be in (0, {SCALE}], got {}",
                self.subsample
            )));
        }
        Ok(())
    }

    fn tree_config(&self) -> TreeConfig {
        TreeConfig {
            max_depth: self.max_depth,
            min_samples_leaf: self.min_samples_leaf,
        }
    }
}

/// GBDT trainer
#[derive(Clone, Debug, Default)]
pub struct GbdtTrainer {
    config: GbdtConfig,
}

impl GbdtTrainer {
    pub fn new(config: GbdtConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &GbdtConfig {
        &self.config
    }

    /// Train a model on fixed-point features and labels.
    pub fn train(&self, features: &FeatureMatrix, labels: &[i64]) -> Result<Model, TrainerError> {
        self.config.validate()?;

        let n_samples = features.rows();
        if n_samples == 0 {
            return Err(TrainerError::Training("no training rows".into()));
        }
        if labels.len() != n_samples {
            return Err(TrainerError::Training(format!(
                "{} feature rows but {} labels",
                n_samples,
                labels.len()
            )));
        }

        let bias = calculate_bias(labels);
        let mut predictions = vec![bias; n_samples];
        let hessians = vec![SCALE; n_samples];
        let mut rng = LcgRng::new(self.config.seed);
        let tree_config = self.config.tree_config();
        let index = BucketIndex::new(features, self.config.quant_step)?;
        debug!(
            "Bucketed {} features at step {} ({} buckets)",
            features.width(),
            index.quant_step(),
            (0..features.width()).map(|f| index.num_buckets(f)).sum::<usize>()
        );

        let mut trees = Vec::with_capacity(self.config.num_trees);
        for tree_idx in 0..self.config.num_trees {
            let gradients = calculate_gradients(labels, &predictions);
            let rows = self.sample_rows(n_samples, &mut rng);

            let builder =
                CartBuilder::new(features, &index, &gradients, &hessians, tree_config.clone())?;
            let tree = builder.build(&rows, self.config.learning_rate);

            for (row, prediction) in predictions.iter_mut().enumerate() {
                *prediction = prediction.saturating_add(tree.contribution(features.row(row), SCALE));
            }

            debug!(
                "Tree {}/{}: {} nodes, depth {}, {} rows",
                tree_idx + 1,
                self.config.num_trees,
                tree.nodes.len(),
                tree.depth(),
                rows.len()
            );
            trees.push(tree);
        }

        let model = Model::new(trees, bias, features.width());
        info!(
            "Trained {} trees on {} rows x {} features (bias {})",
            model.num_trees(),
            n_samples,
            features.width(),
            bias
        );
        Ok(model)
    }

    /// Rows used for one tree. Never empty.
    fn sample_rows(&self, n_samples: usize, rng: &mut LcgRng) -> Vec<usize> {
        if self.config.subsample >= SCALE {
            return (0..n_samples).collect();
        }

        let rows: Vec<usize> = (0..n_samples)
            .filter(|_| rng.next_unit_micro() < self.config.subsample)
            .collect();
        if rows.is_empty() {
            vec![rng.next_range(n_samples as u64) as usize]
        } else {
            rows
        }
    }
}

impl Regressor for GbdtTrainer {
    fn name(&self) -> &str {
        "gbdt"
    }

    fn fit(&self, features: &FeatureMatrix, labels: &[i64]) -> Result<Model, PipelineError> {
        self.train(features, labels)
            .map_err(|e| PipelineError::Training(e.to_string()))
    }
}

/// Mean label, the initial prediction for every row.
fn calculate_bias(labels: &[i64]) -> i64 {
    if labels.is_empty() {
        return 0;
    }
    let sum: i128 = labels.iter().map(|&l| l as i128).sum();
    (sum / labels.len() as i128) as i64
}

/// Squared-error gradients: `prediction - label`.
fn calculate_gradients(labels: &[i64], predictions: &[i64]) -> Vec<i64> {
    predictions
        .iter()
        .zip(labels)
        .map(|(&p, &l)| p.saturating_sub(l))
        .collect()
}
