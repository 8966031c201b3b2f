//! Application configuration
//!
//! Layered as: built-in defaults, then an optional TOML file, then
//! `TAXIFARE_*` environment variables, then command-line flags (applied by
//! the binary).

use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::info;

use taxifare_core::Target;

use crate::errors::ConfigError;
use crate::trainer::GbdtConfig;

/// Prefix of every environment override.
pub const ENV_PREFIX: &str = "TAXIFARE_";

/// Dataset and model locations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub data_dir: PathBuf,
    pub train_file: String,
    pub test_file: String,
    /// Where model artifacts go; `data_dir` when unset
    pub model_dir: Option<PathBuf>,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("Data"),
            train_file: "taxi-fare-train.csv".to_string(),
            test_file: "taxi-fare-test.csv".to_string(),
            model_dir: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub paths: PathsConfig,
    pub training: GbdtConfig,
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from a TOML file; missing keys take defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        info!("Loading configuration from: {}", path.display());

        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(toml::from_str(&content)?)
    }

    /// Apply `TAXIFARE_*` variables from the process environment.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides_from(|key| env::var(key).ok())
    }

    /// Apply overrides read through `lookup`, keyed by full variable name.
    pub fn apply_overrides_from<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| {
            let key = format!("{ENV_PREFIX}{name}");
            lookup(&key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
                .map(|value| (key, value))
        };

        if let Some((_, value)) = var("DATA_DIR") {
            self.paths.data_dir = PathBuf::from(value);
        }
        if let Some((_, value)) = var("MODEL_DIR") {
            self.paths.model_dir = Some(PathBuf::from(value));
        }
        if let Some((key, value)) = var("NUM_TREES") {
            self.training.num_trees = parse_var(&key, &value)?;
        }
        if let Some((key, value)) = var("LEARNING_RATE") {
            self.training.learning_rate = parse_var(&key, &value)?;
        }
        if let Some((key, value)) = var("SEED") {
            self.training.seed = parse_var(&key, &value)?;
        }
        if let Some((_, value)) = var("LOG_LEVEL") {
            self.logging.level = value;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.paths.train_file.is_empty() || self.paths.test_file.is_empty() {
            return Err(ConfigError::Invalid("dataset file names must not be empty".into()));
        }
        self.training.validate()
    }

    pub fn train_path(&self) -> PathBuf {
        self.paths.data_dir.join(&self.paths.train_file)
    }

    pub fn test_path(&self) -> PathBuf {
        self.paths.data_dir.join(&self.paths.test_file)
    }

    pub fn model_dir(&self) -> &Path {
        self.paths
            .model_dir
            .as_deref()
            .unwrap_or(self.paths.data_dir.as_path())
    }

    /// Artifact path for `target`.
    pub fn model_path(&self, target: Target) -> PathBuf {
        self.model_dir().join(target.model_file_name())
    }
}

fn parse_var<T: FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::Env {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use std::collections::HashMap;
    use tempfile::tempdir;

    #[test]
    fn test_defaults_match_dataset_layout() {
        let config = AppConfig::default();
        assert_eq!(config.train_path(), PathBuf::from("Data/taxi-fare-train.csv"));
        assert_eq!(config.test_path(), PathBuf::from("Data/taxi-fare-test.csv"));
        assert_eq!(
            config.model_path(Target::Fare),
            PathBuf::from("Data/model_taxi_fare.bin")
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_keeps_defaults() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("taxifare.toml");
        std::fs::write(
            &path,
            r#"
[paths]
data_dir = "/srv/taxi"
model_dir = "/srv/models"

[training]
num_trees = 12
seed = 9
"#,
        )?;

        let config = AppConfig::from_file(&path)?;
        assert_eq!(config.train_path(), PathBuf::from("/srv/taxi/taxi-fare-train.csv"));
        assert_eq!(
            config.model_path(Target::Time),
            PathBuf::from("/srv/models/model_taxi_time.bin")
        );
        assert_eq!(config.training.num_trees, 12);
        assert_eq!(config.training.seed, 9);
        assert_eq!(config.training.max_depth, GbdtConfig::default().max_depth);
        assert_eq!(config.logging.level, "info");
        Ok(())
    }

    #[test]
    fn test_malformed_file() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "[training]\nnum_trees = \"many\"\n")?;
        assert!(matches!(AppConfig::from_file(&path), Err(ConfigError::Parse(_))));
        assert!(matches!(
            AppConfig::from_file(dir.path().join("absent.toml")),
            Err(ConfigError::Io { .. })
        ));
        Ok(())
    }

    #[test]
    fn test_env_overrides() -> Result<()> {
        let vars: HashMap<&str, &str> = [
            ("TAXIFARE_DATA_DIR", "/tmp/data"),
            ("TAXIFARE_NUM_TREES", " 25 "),
            ("TAXIFARE_LOG_LEVEL", "debug"),
            ("TAXIFARE_SEED", ""),
        ]
        .into_iter()
        .collect();

        let mut config = AppConfig::default();
        config.apply_overrides_from(|key| vars.get(key).map(|v| v.to_string()))?;

        assert_eq!(config.paths.data_dir, PathBuf::from("/tmp/data"));
        assert_eq!(config.training.num_trees, 25);
        assert_eq!(config.training.seed, 0);
        assert_eq!(config.logging.level, "debug");
        Ok(())
    }

    #[test]
    fn test_bad_env_value() {
        let mut config = AppConfig::default();
        let err = config
            .apply_overrides_from(|key| (key == "TAXIFARE_LEARNING_RATE").then(|| "fast".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Env { key, .. } if key == "TAXIFARE_LEARNING_RATE"));
    }

    #[test]
    fn test_validate_rejects_bad_training() {
        let mut config = AppConfig::default();
        config.training.subsample = 0;
        assert!(config.validate().is_err());
    }
}
