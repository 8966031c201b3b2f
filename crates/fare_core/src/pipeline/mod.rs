//! Feature pipeline: an ordered chain of column transforms ending in a
//! regressor.
//!
//! ```text
//! CopyColumn(Label <- TripAmount)
//!   -> OneHotEncoding(VendorIDEncoded <- VendorID) ...
//!   -> Concatenate(Features <- VendorIDEncoded, ..., TripDistance, ...)
//!   -> Regressor(Label, Features)
//! ```
//!
//! A [`Pipeline`] is consumed by [`Pipeline::fit`], which produces an
//! immutable [`FittedModel`].

pub mod transform;

use tracing::{debug, info};

use crate::errors::PipelineError;
use crate::fitted::{FitMetadata, FittedModel};
use crate::frame::{FeatureMatrix, Frame};
use crate::gbdt::Model;
use crate::schema::{ColumnKind, Record, Target, FEATURES_COLUMN, LABEL_COLUMN};

pub use transform::{Concatenate, CopyColumn, FittedTransform, OneHotEncoding, Transform};

/// A trainable regression stage operating on `(label, feature vector)` pairs.
pub trait Regressor: Send + Sync {
    /// Short name recorded in the fitted model's metadata.
    fn name(&self) -> &str;

    /// Fit a model on fixed-point features and labels.
    fn fit(&self, features: &FeatureMatrix, labels: &[i64]) -> Result<Model, PipelineError>;
}

/// An ordered, unfitted transform chain plus its regressor.
pub struct Pipeline {
    target: Target,
    transforms: Vec<Box<dyn Transform>>,
    label_column: String,
    features_column: String,
    regressor: Box<dyn Regressor>,
}

impl Pipeline {
    /// The standard chain for `target`.
    ///
    /// Categorical features are one-hot encoded into `<Field>Encoded`, then
    /// every feature is concatenated in [`Target::features`] order.
    pub fn for_target(target: Target, regressor: Box<dyn Regressor>) -> Pipeline {
        let mut builder =
            PipelineBuilder::new(target).copy_column(LABEL_COLUMN, target.label().name());

        let mut feature_columns = Vec::with_capacity(target.features().len());
        for &column in target.features() {
            match column.kind() {
                ColumnKind::Categorical => {
                    let encoded = column.encoded_name();
                    builder = builder.one_hot(encoded.clone(), column.name());
                    feature_columns.push(encoded);
                }
                ColumnKind::Numeric => feature_columns.push(column.name().to_string()),
            }
        }

        builder
            .concatenate(FEATURES_COLUMN, feature_columns)
            .append_trainer(regressor)
    }

    pub fn target(&self) -> Target {
        self.target
    }

    /// Names of the stages in order, ending with the regressor.
    pub fn stage_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.transforms.iter().map(|t| t.name()).collect();
        names.push(self.regressor.name());
        names
    }

    /// Fit every stage in order on `frame` and train the regressor.
    pub fn fit(self, mut frame: Frame) -> Result<FittedModel, PipelineError> {
        if frame.is_empty() {
            return Err(PipelineError::EmptyFrame);
        }

        let mut fitted = Vec::with_capacity(self.transforms.len());
        for transform in &self.transforms {
            let stage = transform.fit(&frame)?;
            stage.apply(&mut frame)?;
            debug!("Fitted stage {} -> {}", transform.name(), stage.output());
            fitted.push(stage);
        }

        let labels = frame.scalar(&self.label_column)?.to_vec();
        let features = frame.feature_matrix(&self.features_column)?;
        let training_data_hash = training_data_hash(&labels, &features);

        info!(
            "Training {} regressor for {} on {} rows x {} features",
            self.regressor.name(),
            self.target,
            features.rows(),
            features.width()
        );
        let model = self.regressor.fit(&features, &labels)?;
        if model.feature_count != features.width() {
            return Err(PipelineError::FeatureWidth {
                expected: features.width(),
                got: model.feature_count,
            });
        }

        let metadata = FitMetadata {
            regressor: self.regressor.name().to_string(),
            row_count: features.rows(),
            feature_count: features.width(),
            training_data_hash,
        };

        Ok(FittedModel::new(
            self.target,
            fitted,
            self.label_column,
            self.features_column,
            model,
            metadata,
        ))
    }

    /// Build a frame from `records` and fit on it.
    pub fn fit_records<R: Record>(self, records: &[R]) -> Result<FittedModel, PipelineError> {
        let frame = Frame::from_records(records)?;
        self.fit(frame)
    }
}

/// BLAKE3 fingerprint of the fixed-point training matrix and labels.
fn training_data_hash(labels: &[i64], features: &FeatureMatrix) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&(features.rows() as u64).to_le_bytes());
    hasher.update(&(features.width() as u64).to_le_bytes());
    for row in features.iter_rows() {
        for value in row {
            hasher.update(&value.to_le_bytes());
        }
    }
    for label in labels {
        hasher.update(&label.to_le_bytes());
    }
    hex::encode(hasher.finalize().as_bytes())
}

/// Composes a custom transform chain.
pub struct PipelineBuilder {
    target: Target,
    transforms: Vec<Box<dyn Transform>>,
    label_column: String,
    features_column: String,
}

impl PipelineBuilder {
    pub fn new(target: Target) -> Self {
        Self {
            target,
            transforms: Vec::new(),
            label_column: LABEL_COLUMN.to_string(),
            features_column: FEATURES_COLUMN.to_string(),
        }
    }

    /// Copy `input` to `output`. Copying into the label column selects the label.
    pub fn copy_column(mut self, output: impl Into<String>, input: impl Into<String>) -> Self {
        self.transforms.push(Box::new(CopyColumn::new(output, input)));
        self
    }

    pub fn one_hot(mut self, output: impl Into<String>, input: impl Into<String>) -> Self {
        self.transforms
            .push(Box::new(OneHotEncoding::new(output, input)));
        self
    }

    /// Concatenate `inputs` into `output`; `output` becomes the regressor's
    /// feature column.
    pub fn concatenate<I, S>(mut self, output: impl Into<String>, inputs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let output = output.into();
        self.features_column = output.clone();
        self.transforms.push(Box::new(Concatenate::new(output, inputs)));
        self
    }

    /// Terminate the chain with a regressor.
    pub fn append_trainer(self, regressor: Box<dyn Regressor>) -> Pipeline {
        Pipeline {
            target: self.target,
            transforms: self.transforms,
            label_column: self.label_column,
            features_column: self.features_column,
            regressor,
        }
    }
}
