//! taxifare trainer - deterministic GBDT training for taxi trip regression
//!
//! Loads trip datasets, fits the feature pipeline with a fixed-point GBDT
//! and drives the interactive shell.

pub mod cart;
pub mod config;
pub mod dataset;
pub mod deterministic;
pub mod errors;
pub mod shell;
pub mod trainer;
pub mod workflow;

pub use config::AppConfig;
pub use dataset::{load_reduced_records, load_records, load_trip_records, FromRow};
pub use deterministic::{LcgRng, SplitTieBreaker};
pub use errors::{ConfigError, DatasetError, TrainerError};
pub use shell::{Shell, ShellError};
pub use trainer::{GbdtConfig, GbdtTrainer};
pub use workflow::{evaluate_dataset, train_for_target};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
