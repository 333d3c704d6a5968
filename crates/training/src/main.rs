//! SOH Training - Main Entry Point
//!
//! Usage: `soh-train [CONFIG_FILE]`. Settings not in the file come from
//! `SOH_TRAIN_*` environment variables or built-in defaults.

use anyhow::Context;
use std::path::PathBuf;
use tracing::info;
use training::{init_logging, TrainingConfig, TrainingPipeline};

fn main() -> anyhow::Result<()> {
    let config_path = std::env::args_os().nth(1).map(PathBuf::from);
    let config = TrainingConfig::load(config_path.as_deref())
        .context("failed to load training configuration")?;
    init_logging(&config.log_level, config.log_format)?;

    info!("=== SOH Training v{} ===", env!("CARGO_PKG_VERSION"));
    info!("Data: {}", config.data_path.display());

    let pipeline = TrainingPipeline::new(config).context("invalid training configuration")?;
    let report = pipeline.run().context("training aborted")?;

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
