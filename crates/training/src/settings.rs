//! Training configuration

use crate::TrainingError;
use config::{Config, Environment, File};
use data_validator::{DEFAULT_CELL_COUNT, DEFAULT_Z_THRESHOLD};
use inference_engine::{RankPolicy, DEFAULT_HEALTH_THRESHOLD};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use storage::ArtifactPaths;
use tracing::info;

/// Environment variable prefix, e.g. `SOH_TRAIN_SEED=7` or
/// `SOH_TRAIN_COVERAGE__MIN_PREDICTION_SPAN=0.2`
pub const ENV_PREFIX: &str = "SOH_TRAIN";

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Degraded-probe check run after fitting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoverageConfig {
    /// Factors applied to the per-cell median pack to build probe packs
    pub probe_scales: Vec<f64>,
    /// Smallest acceptable max - min over the probe predictions
    pub min_prediction_span: f64,
}

impl Default for CoverageConfig {
    fn default() -> Self {
        Self {
            probe_scales: vec![0.80, 0.85, 0.90, 0.95, 1.00],
            min_prediction_span: 0.1,
        }
    }
}

/// Training run configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Raw measurement table (CSV with header)
    pub data_path: PathBuf,
    /// Number of voltage columns, named `{voltage_prefix}1..{voltage_prefix}N`
    pub cell_count: usize,
    /// Name of the SOH label column
    pub label_column: String,
    pub voltage_prefix: String,
    /// Rows with fewer present numeric fields are dropped
    pub min_non_missing_fields: usize,
    /// Fewest rows allowed after cleaning
    pub min_rows: usize,
    pub outlier_z_threshold: f64,
    /// Share of rows held out for evaluation
    pub test_ratio: f64,
    /// Shuffle seed for the train/test split
    pub seed: u64,
    /// Healthy/Problem cutoff, used for the label summary
    pub health_threshold: f64,
    pub rank_policy: RankPolicy,
    pub coverage: CoverageConfig,
    pub artifacts: ArtifactPaths,
    pub log_level: String,
    pub log_format: LogFormat,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            data_path: PathBuf::from("data/processed_data.csv"),
            cell_count: DEFAULT_CELL_COUNT,
            label_column: "SOH".to_string(),
            voltage_prefix: "U".to_string(),
            min_non_missing_fields: 18,
            min_rows: 10,
            outlier_z_threshold: DEFAULT_Z_THRESHOLD,
            test_ratio: 0.2,
            seed: 42,
            health_threshold: DEFAULT_HEALTH_THRESHOLD,
            rank_policy: RankPolicy::default(),
            coverage: CoverageConfig::default(),
            artifacts: ArtifactPaths::default(),
            log_level: "info".to_string(),
            log_format: LogFormat::default(),
        }
    }
}

impl TrainingConfig {
    /// Layer defaults, an optional config file and `SOH_TRAIN_*` variables
    pub fn load(path: Option<&Path>) -> Result<Self, TrainingError> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            info!("Loading training config from {}", path.display());
            builder = builder.add_source(File::from(path).required(true));
        }
        let settings = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: TrainingConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Names of the voltage columns in order
    pub fn voltage_columns(&self) -> Vec<String> {
        (1..=self.cell_count)
            .map(|i| format!("{}{}", self.voltage_prefix, i))
            .collect()
    }

    /// Reject settings that can never produce a usable run
    pub fn validate(&self) -> Result<(), TrainingError> {
        if self.cell_count < 2 {
            return Err(invalid(format!(
                "cell_count must be at least 2, got {}",
                self.cell_count
            )));
        }
        if self.label_column.is_empty() || self.voltage_prefix.is_empty() {
            return Err(invalid("label_column and voltage_prefix must not be empty"));
        }
        if !(self.test_ratio > 0.0 && self.test_ratio < 1.0) {
            return Err(invalid(format!(
                "test_ratio must be in (0, 1), got {}",
                self.test_ratio
            )));
        }
        if !(self.outlier_z_threshold.is_finite() && self.outlier_z_threshold > 0.0) {
            return Err(invalid(format!(
                "outlier_z_threshold must be positive, got {}",
                self.outlier_z_threshold
            )));
        }
        if !(0.0..=1.0).contains(&self.health_threshold) {
            return Err(invalid(format!(
                "health_threshold must be in [0, 1], got {}",
                self.health_threshold
            )));
        }
        if self.min_rows < 2 {
            return Err(invalid("min_rows must be at least 2 to split train and test"));
        }
        if self.coverage.probe_scales.is_empty()
            || self.coverage.probe_scales.iter().any(|s| !(s.is_finite() && *s > 0.0))
        {
            return Err(invalid("coverage.probe_scales must be non-empty positive factors"));
        }
        if !(self.coverage.min_prediction_span.is_finite() && self.coverage.min_prediction_span >= 0.0) {
            return Err(invalid("coverage.min_prediction_span must be a non-negative number"));
        }
        Ok(())
    }
}

fn invalid(message: impl Into<String>) -> TrainingError {
    TrainingError::InvalidConfig(message.into())
}
