//! Deterministic taxi fare prediction core
//!
//! Schema, feature pipeline and integer-only model scoring for taxi trip
//! regression. Training lives in `taxifare-trainer`, which plugs a GBDT
//! into the [`pipeline::Regressor`] seam.
//!
//! Modules:
//! - `schema`: trip records, prediction targets and results
//! - `frame`: fixed-point column store the transforms operate on
//! - `pipeline`: transform chain builder and the `Regressor` capability
//! - `fitted`: the immutable fitted artifact and its predictor
//! - `gbdt`: integer-only tree ensemble scoring
//! - `metrics`: R2 / RMS / MAE evaluation
//! - `persist`: binary artifact save/load with hash verification
//! - `serde_canon`: canonical JSON hashing

pub mod errors;
pub mod fitted;
pub mod frame;
pub mod gbdt;
pub mod metrics;
pub mod persist;
pub mod pipeline;
pub mod schema;
pub mod serde_canon;

use std::path::Path;

pub use errors::{CoreError, PersistError, PipelineError, Result};
pub use fitted::{FitMetadata, FittedModel};
pub use frame::{ColumnData, FeatureMatrix, Frame};
pub use gbdt::{Model, ModelError, SCALE};
pub use metrics::{evaluate, Metric, RegressionMetrics};
pub use persist::{load, save};
pub use pipeline::{Pipeline, PipelineBuilder, Regressor};
pub use schema::{Column, Layout, PredictionResult, Record, ReducedRecord, Target, TripRecord};

/// Crate version string
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Load the artifact at `path` and predict a single record with it.
pub fn predict_from_file<R: Record>(path: impl AsRef<Path>, record: &R) -> Result<PredictionResult> {
    let model = persist::load(path)?;
    Ok(model.predict(record)?)
}
