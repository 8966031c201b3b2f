use std::path::PathBuf;
use thiserror::Error;

use taxifare_core::{PersistError, PipelineError};

/// Errors raised while loading a trip dataset.
///
/// Every variant that concerns a row carries its 1-based line number in the
/// file (the header is line 1).
#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("failed to open dataset {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("line {line}: malformed CSV: {message}")]
    Csv { line: u64, message: String },

    #[error("line {line}: expected {expected} columns, got {got}")]
    Arity {
        line: u64,
        expected: usize,
        got: usize,
    },

    #[error("line {line}, column {column} ({name}): '{value}' is not a number")]
    NonNumeric {
        line: u64,
        column: usize,
        name: &'static str,
        value: String,
    },

    #[error("line {line}, column {column} ({name}): {value} must be finite and non-negative")]
    InvalidValue {
        line: u64,
        column: usize,
        name: &'static str,
        value: f32,
    },

    #[error("dataset {0} has no data rows")]
    Empty(String),
}

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid value '{value}' for {key}")]
    Env { key: String, value: String },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Errors returned by the deterministic trainer.
#[derive(Debug, Error)]
pub enum TrainerError {
    #[error("dataset error: {0}")]
    Dataset(#[from] DatasetError),

    #[error("pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    #[error("model artifact error: {0}")]
    Persist(#[from] PersistError),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("training error: {0}")]
    Training(String),
}
