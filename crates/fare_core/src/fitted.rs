//! The fitted artifact: transform chain, learned vocabularies and trees.

use serde::{Deserialize, Serialize};

use crate::errors::PipelineError;
use crate::frame::{FeatureMatrix, Frame};
use crate::gbdt::{Model, ModelError};
use crate::pipeline::FittedTransform;
use crate::schema::{Column, PredictionResult, Record, Target};
use crate::serde_canon::hash_canonical_hex;

/// Facts recorded about the fit that produced a model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FitMetadata {
    pub regressor: String,
    pub row_count: usize,
    pub feature_count: usize,
    /// BLAKE3 hex digest of the fixed-point training matrix and labels
    pub training_data_hash: String,
}

/// An immutable fitted pipeline, ready for evaluation and prediction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedModel {
    target: Target,
    transforms: Vec<FittedTransform>,
    label_column: String,
    features_column: String,
    model: Model,
    metadata: FitMetadata,
}

impl FittedModel {
    pub(crate) fn new(
        target: Target,
        transforms: Vec<FittedTransform>,
        label_column: String,
        features_column: String,
        model: Model,
        metadata: FitMetadata,
    ) -> Self {
        Self {
            target,
            transforms,
            label_column,
            features_column,
            model,
            metadata,
        }
    }

    pub fn target(&self) -> Target {
        self.target
    }

    pub fn transforms(&self) -> &[FittedTransform] {
        &self.transforms
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    pub fn metadata(&self) -> &FitMetadata {
        &self.metadata
    }

    pub fn label_column(&self) -> &str {
        &self.label_column
    }

    /// Vocabulary learned for a categorical input column, if it was encoded.
    pub fn vocabulary(&self, column: Column) -> Option<&[String]> {
        self.transforms.iter().find_map(|stage| match stage {
            FittedTransform::OneHot {
                input, vocabulary, ..
            } if input == column.name() => Some(vocabulary.as_slice()),
            _ => None,
        })
    }

    /// Run the fitted transform chain over `frame`.
    pub fn transform(&self, frame: &mut Frame) -> Result<(), PipelineError> {
        for stage in &self.transforms {
            stage.apply(frame)?;
        }
        Ok(())
    }

    /// Feature matrix of an already transformed frame, checked against the model width.
    pub(crate) fn features(&self, frame: &Frame) -> Result<FeatureMatrix, PipelineError> {
        let features = frame.feature_matrix(&self.features_column)?;
        if features.width() != self.model.feature_count {
            return Err(PipelineError::FeatureWidth {
                expected: self.model.feature_count,
                got: features.width(),
            });
        }
        Ok(features)
    }

    /// Predictions for every record, in input order.
    pub fn predict_batch<R: Record>(&self, records: &[R]) -> Result<Vec<f64>, PipelineError> {
        let mut frame = Frame::from_records(records)?;
        self.transform(&mut frame)?;
        let features = self.features(&frame)?;
        Ok(features.iter_rows().map(|row| self.model.predict(row)).collect())
    }

    /// Apply the training-time chain to one record and extract the scalar.
    pub fn predict<R: Record>(&self, record: &R) -> Result<PredictionResult, PipelineError> {
        let value = self
            .predict_batch(std::slice::from_ref(record))?
            .first()
            .copied()
            .ok_or(PipelineError::EmptyFrame)?;

        Ok(PredictionResult {
            target: self.target,
            value,
        })
    }

    /// BLAKE3 hex digest of the canonical JSON form of this model.
    pub fn hash_hex(&self) -> Result<String, ModelError> {
        Ok(hash_canonical_hex(self)?)
    }

    /// Structural validation of the learned trees.
    pub fn validate(&self) -> Result<(), ModelError> {
        self.model.validate()?;
        if self.metadata.feature_count != self.model.feature_count {
            return Err(ModelError::ValidationFailed(format!(
                "metadata records {} features, model has {}",
                self.metadata.feature_count, self.model.feature_count
            )));
        }
        Ok(())
    }
}
