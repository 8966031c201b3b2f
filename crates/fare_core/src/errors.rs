//! Error types for the taxifare core

use thiserror::Error;

use crate::gbdt::ModelError;

/// Errors raised while building frames, fitting or applying transforms.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// A transform referenced a column the frame does not carry
    #[error("Missing column: {0}")]
    MissingColumn(String),

    /// A column had the wrong kind for the requested operation
    #[error("Column {column} has the wrong type: expected {expected}")]
    ColumnType {
        column: String,
        expected: &'static str,
    },

    /// A column length did not match the frame row count
    #[error("Column {column} has {got} rows, frame has {expected}")]
    LengthMismatch {
        column: String,
        expected: usize,
        got: usize,
    },

    /// The feature vector width differs from what the model was trained on
    #[error("Feature width mismatch: model expects {expected}, got {got}")]
    FeatureWidth { expected: usize, got: usize },

    /// Fitting requires at least one row
    #[error("Cannot fit on an empty frame")]
    EmptyFrame,

    /// A record did not carry a field its layout declares
    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    /// The regressor stage failed
    #[error("Training failed: {0}")]
    Training(String),

    #[error(transparent)]
    Model(#[from] ModelError),
}

/// Errors raised while saving or loading a model artifact.
#[derive(Error, Debug)]
pub enum PersistError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to encode artifact: {0}")]
    Encode(String),

    /// The file is truncated or its body cannot be decoded
    #[error("Failed to decode artifact: {0}")]
    Decode(String),

    #[error("Not a taxifare model artifact (bad magic tag)")]
    BadMagic,

    #[error("Incompatible artifact version {found} (supported: {supported})")]
    IncompatibleVersion { found: u32, supported: u32 },

    #[error("Artifact hash mismatch: recorded {recorded}, computed {computed}")]
    HashMismatch { recorded: String, computed: String },

    #[error(transparent)]
    Model(#[from] ModelError),
}

/// Umbrella error for callers that do not care which stage failed.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error(transparent)]
    Persist(#[from] PersistError),

    #[error(transparent)]
    Model(#[from] ModelError),
}

/// Result type for taxifare core operations
pub type Result<T> = std::result::Result<T, CoreError>;
