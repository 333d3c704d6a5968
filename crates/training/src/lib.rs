//! SOH Training Pipeline
//!
//! Turns a raw per-cell voltage table into a fitted scaler, a fitted linear
//! model and an evaluation report, and persists all three.

mod coverage;
mod dataset;
mod pipeline;
mod settings;
mod split;

pub use coverage::{CoverageCheck, CoverageReport, LabelSummary};
pub use dataset::{CleaningStats, Dataset, DatasetLoader, MISSING_MARKERS};
pub use pipeline::{TrainingPipeline, TrainingReport};
pub use settings::{CoverageConfig, LogFormat, TrainingConfig, ENV_PREFIX};
pub use split::{train_test_split, Split};

use data_validator::ValidationError;
use inference_engine::InferenceError;
use storage::StorageError;
use thiserror::Error;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// Errors that abort a training run
#[derive(Debug, Error)]
pub enum TrainingError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Data error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Model error: {0}")]
    Model(#[from] InferenceError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Training aborted: {0}")]
    Aborted(String),
}

/// Install the global tracing subscriber
pub fn init_logging(level: &str, format: LogFormat) -> anyhow::Result<()> {
    let level: Level = level
        .parse()
        .map_err(|_| anyhow::anyhow!("unknown log level {level:?}"))?;
    let builder = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true);

    match format {
        LogFormat::Json => tracing::subscriber::set_global_default(builder.json().finish())?,
        LogFormat::Text => tracing::subscriber::set_global_default(builder.finish())?,
    }
    Ok(())
}
