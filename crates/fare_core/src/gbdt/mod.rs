//! Deterministic GBDT (Gradient Boosted Decision Tree) regressor model
//!
//! - **Zero floating-point operations** during scoring: all values are fixed-point integers
//! - **Deterministic across platforms**: same input always produces same output
//! - **Canonical serialization**: sorted JSON keys for reproducible hashing
//!
//! Trees are produced by the trainer crate; this module only scores them.

pub mod model;
pub mod tree;

pub use model::{from_fixed, to_fixed, Model, ModelError, MODEL_VERSION, SCALE};
pub use tree::{Node, Tree};
