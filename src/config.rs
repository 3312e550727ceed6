//! Configuration management for the fraud scoring pipeline

use crate::error::ScoringError;
use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default location of the configuration file
pub const DEFAULT_CONFIG_PATH: &str = "config/config.toml";

/// Prefix for environment overrides, e.g. `FRAUD__DETECTION__CONTAMINATION=0.2`
pub const ENV_PREFIX: &str = "FRAUD";

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub nats: NatsConfig,
    pub detection: DetectionConfig,
    pub pipeline: PipelineConfig,
    pub logging: LoggingConfig,
}

/// NATS connection configuration
#[derive(Debug, Clone, Deserialize)]
pub struct NatsConfig {
    /// NATS server URL
    pub url: String,
    /// Subject for incoming transaction batches
    pub batch_subject: String,
    /// Subject for ad hoc single-transaction scoring
    pub single_subject: String,
    /// Subject for scored output when a request has no reply subject
    pub result_subject: String,
}

/// Isolation Forest parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DetectionConfig {
    /// Expected fraction of outliers in a batch, in (0, 0.5]
    #[serde(default = "default_contamination")]
    pub contamination: f64,
    /// Seed for tree construction
    #[serde(default = "default_random_seed")]
    pub random_seed: u64,
    /// Number of trees in the ensemble
    #[serde(default = "default_n_estimators")]
    pub n_estimators: usize,
    /// Subsample drawn for each tree (capped at the batch size)
    #[serde(default = "default_max_samples")]
    pub max_samples: usize,
}

fn default_contamination() -> f64 {
    0.1
}

fn default_random_seed() -> u64 {
    42
}

fn default_n_estimators() -> usize {
    100
}

fn default_max_samples() -> usize {
    256
}

impl DetectionConfig {
    /// Reject parameters the scorer cannot work with.
    pub fn validate(&self) -> Result<(), ScoringError> {
        if !(self.contamination > 0.0 && self.contamination <= 0.5) {
            return Err(ScoringError::InvalidConfig(format!(
                "contamination must be in (0, 0.5], got {}",
                self.contamination
            )));
        }
        if self.n_estimators == 0 {
            return Err(ScoringError::InvalidConfig(
                "n_estimators must be at least 1".to_string(),
            ));
        }
        if self.max_samples == 0 {
            return Err(ScoringError::InvalidConfig(
                "max_samples must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            contamination: default_contamination(),
            random_seed: default_random_seed(),
            n_estimators: default_n_estimators(),
            max_samples: default_max_samples(),
        }
    }
}

/// Pipeline configuration
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    /// Maximum number of requests scored concurrently
    pub workers: usize,
    /// Interval between metrics summaries
    #[serde(default = "default_summary_interval")]
    pub summary_interval_secs: u64,
}

fn default_summary_interval() -> u64 {
    30
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Log format (json, pretty)
    pub format: String,
}

impl AppConfig {
    /// Load configuration from the default file plus environment overrides
    pub fn load() -> Result<Self> {
        Self::load_from_path(DEFAULT_CONFIG_PATH)
    }

    /// Load configuration from a specific path plus environment overrides.
    ///
    /// A missing file is not an error; every section then falls back to
    /// the values in [`AppConfig::default`].
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let defaults = Self::default();

        let config = Config::builder()
            .set_default("nats.url", defaults.nats.url)?
            .set_default("nats.batch_subject", defaults.nats.batch_subject)?
            .set_default("nats.single_subject", defaults.nats.single_subject)?
            .set_default("nats.result_subject", defaults.nats.result_subject)?
            .set_default("detection.contamination", defaults.detection.contamination)?
            .set_default("detection.random_seed", defaults.detection.random_seed)?
            .set_default(
                "detection.n_estimators",
                defaults.detection.n_estimators as u64,
            )?
            .set_default("detection.max_samples", defaults.detection.max_samples as u64)?
            .set_default("pipeline.workers", defaults.pipeline.workers as u64)?
            .set_default(
                "pipeline.summary_interval_secs",
                defaults.pipeline.summary_interval_secs,
            )?
            .set_default("logging.level", defaults.logging.level)?
            .set_default("logging.format", defaults.logging.format)?
            .add_source(File::from(path.as_ref()).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to build configuration")?;

        let app: AppConfig = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        app.validate()?;
        Ok(app)
    }

    /// Validate cross-field constraints
    pub fn validate(&self) -> Result<()> {
        self.detection
            .validate()
            .context("Invalid detection configuration")?;
        if self.pipeline.workers == 0 {
            anyhow::bail!("pipeline.workers must be at least 1");
        }
        Ok(())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            nats: NatsConfig {
                url: "nats://localhost:4222".to_string(),
                batch_subject: "transactions.batch".to_string(),
                single_subject: "transactions.score".to_string(),
                result_subject: "transactions.scored".to_string(),
            },
            detection: DetectionConfig::default(),
            pipeline: PipelineConfig {
                workers: 4,
                summary_interval_secs: default_summary_interval(),
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "pretty".to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.nats.url, "nats://localhost:4222");
        assert_eq!(config.detection.contamination, 0.1);
        assert_eq!(config.detection.random_seed, 42);
        assert_eq!(config.detection.n_estimators, 100);
        assert_eq!(config.detection.max_samples, 256);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .unwrap();
        writeln!(
            file,
            r#"
[nats]
url = "nats://example:4222"
batch_subject = "b"
single_subject = "s"
result_subject = "r"

[detection]
contamination = 0.25
random_seed = 7

[pipeline]
workers = 2

[logging]
level = "debug"
format = "json"
"#
        )
        .unwrap();

        let config = AppConfig::load_from_path(file.path()).unwrap();
        assert_eq!(config.nats.url, "nats://example:4222");
        assert_eq!(config.detection.contamination, 0.25);
        assert_eq!(config.detection.random_seed, 7);
        // Omitted keys keep their defaults
        assert_eq!(config.detection.n_estimators, 100);
        assert_eq!(config.pipeline.summary_interval_secs, 30);
        assert_eq!(config.logging.format, "json");
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = AppConfig::load_from_path("does/not/exist.toml").unwrap();
        assert_eq!(config.detection.contamination, 0.1);
        assert_eq!(config.pipeline.workers, 4);
    }

    // Only keys no other test asserts on, since tests share the environment
    #[test]
    fn test_environment_overrides_file() {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .unwrap();
        writeln!(
            file,
            r#"
[nats]
result_subject = "from.file"
"#
        )
        .unwrap();

        std::env::set_var("FRAUD__NATS__RESULT_SUBJECT", "from.env");
        std::env::set_var("FRAUD__DETECTION__MAX_SAMPLES", "64");

        let from_file = AppConfig::load_from_path(file.path());
        let without_file = AppConfig::load_from_path("does/not/exist.toml");

        std::env::remove_var("FRAUD__NATS__RESULT_SUBJECT");
        std::env::remove_var("FRAUD__DETECTION__MAX_SAMPLES");

        let from_file = from_file.unwrap();
        assert_eq!(from_file.nats.result_subject, "from.env");
        assert_eq!(from_file.detection.max_samples, 64);

        let without_file = without_file.unwrap();
        assert_eq!(without_file.nats.result_subject, "from.env");
        assert_eq!(without_file.detection.max_samples, 64);
        assert_eq!(without_file.nats.batch_subject, "transactions.batch");
    }

    #[test]
    fn test_detection_validation() {
        let mut detection = DetectionConfig::default();
        detection.contamination = 0.0;
        assert!(detection.validate().is_err());

        detection.contamination = 0.6;
        assert!(detection.validate().is_err());

        detection.contamination = 0.5;
        assert!(detection.validate().is_ok());

        detection.n_estimators = 0;
        assert!(detection.validate().is_err());
    }
}
