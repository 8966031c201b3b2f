//! GBDT ensemble with deterministic inference
//!
//! Implements a fixed-point-only GBDT model with:
//! - Canonical JSON serialization
//! - Blake3 model hashing
//! - Integer-only inference

use super::tree::Tree;
use crate::serde_canon::{hash_canonical_hex, to_canonical_json, CanonicalError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// GBDT Model errors
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Model validation failed: {0}")]
    ValidationFailed(String),

    #[error("Canonical serialization error: {0}")]
    CanonicalError(#[from] CanonicalError),
}

/// Scale factor for fixed-point arithmetic (1e6)
pub const SCALE: i64 = 1_000_000;

/// Current in-memory model format version
pub const MODEL_VERSION: i32 = 1;

/// Convert a floating-point value to fixed-point at [`SCALE`].
pub fn to_fixed(value: f64) -> i64 {
    (value * SCALE as f64).round() as i64
}

/// Convert a fixed-point value at [`SCALE`] back to floating point.
pub fn from_fixed(value: i64) -> f64 {
    value as f64 / SCALE as f64
}

/// GBDT Model with integer-only representation
///
/// All values are fixed-point integers scaled by `scale`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Model {
    /// Model format version
    pub version: i32,

    /// Fixed-point scale factor
    pub scale: i64,

    /// Width of the feature vector the trees were trained on
    pub feature_count: usize,

    /// Decision trees in the ensemble
    pub trees: Vec<Tree>,

    /// Initial prediction (fixed-point mean label)
    pub bias: i64,
}

impl Model {
    pub fn new(trees: Vec<Tree>, bias: i64, feature_count: usize) -> Self {
        Self {
            version: MODEL_VERSION,
            scale: SCALE,
            feature_count,
            trees,
            bias,
        }
    }

    /// Validate model structure
    pub fn validate(&self) -> Result<(), ModelError> {
        if self.version != MODEL_VERSION {
            return Err(ModelError::ValidationFailed(format!(
                "Unsupported model version: {}",
                self.version
            )));
        }

        if self.scale <= 0 {
            return Err(ModelError::ValidationFailed(format!(
                "Invalid scale: {}",
                self.scale
            )));
        }

        for (i, tree) in self.trees.iter().enumerate() {
            tree.validate(self.feature_count).map_err(|e| {
                ModelError::ValidationFailed(format!("Tree {} validation failed: {}", i, e))
            })?;
        }

        Ok(())
    }

    /// Perform deterministic inference on a feature vector
    ///
    /// Returns `bias + Σ leaf * tree_weight / scale` as a fixed-point integer.
    pub fn score(&self, features: &[i64]) -> i64 {
        self.trees.iter().fold(self.bias, |sum, tree| {
            sum.saturating_add(tree.contribution(features, self.scale))
        })
    }

    /// Score converted back to floating point.
    pub fn predict(&self, features: &[i64]) -> f64 {
        self.score(features) as f64 / self.scale as f64
    }

    /// Serialize model to canonical JSON (sorted keys, no whitespace)
    pub fn to_canonical_json(&self) -> Result<String, ModelError> {
        Ok(to_canonical_json(self)?)
    }

    /// Compute model hash as hex string
    pub fn hash_hex(&self) -> Result<String, ModelError> {
        Ok(hash_canonical_hex(self)?)
    }

    pub fn num_trees(&self) -> usize {
        self.trees.len()
    }
}
