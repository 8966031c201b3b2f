//! Per-target training and evaluation from dataset files.

use std::path::Path;
use tracing::info;

use taxifare_core::metrics::{self, RegressionMetrics};
use taxifare_core::pipeline::FittedTransform;
use taxifare_core::{FittedModel, Layout, Pipeline, Target};

use crate::dataset::{load_reduced_records, load_trip_records};
use crate::errors::TrainerError;
use crate::trainer::{GbdtConfig, GbdtTrainer};

/// Build the standard pipeline for `target` and fit it on the CSV at `train_path`.
pub fn train_for_target(
    target: Target,
    train_path: &Path,
    config: &GbdtConfig,
) -> Result<FittedModel, TrainerError> {
    config.validate()?;
    let pipeline = Pipeline::for_target(target, Box::new(GbdtTrainer::new(config.clone())));
    info!(
        "Training {} model from {} ({})",
        target,
        train_path.display(),
        pipeline.stage_names().join(" -> ")
    );

    let model = match target.layout() {
        Layout::Trip => pipeline.fit_records(&load_trip_records(train_path)?)?,
        Layout::Reduced => pipeline.fit_records(&load_reduced_records(train_path)?)?,
    };

    let stages: Vec<&str> = model.transforms().iter().map(FittedTransform::output).collect();
    info!(
        "Fitted {} model: {} trees, {} features ({}), data hash {}",
        target,
        model.model().num_trees(),
        model.metadata().feature_count,
        stages.join(", "),
        &model.metadata().training_data_hash[..16]
    );
    Ok(model)
}

/// Score `model` on the CSV at `test_path`, loaded with the model's record layout.
pub fn evaluate_dataset(
    model: &FittedModel,
    test_path: &Path,
) -> Result<RegressionMetrics, TrainerError> {
    let metrics = match model.target().layout() {
        Layout::Trip => metrics::evaluate(model, &load_trip_records(test_path)?)?,
        Layout::Reduced => metrics::evaluate(model, &load_reduced_records(test_path)?)?,
    };
    Ok(metrics)
}
