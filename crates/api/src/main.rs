//! SOH Prediction Server - Main Entry Point
//!
//! Usage: `soh-server [CONFIG_FILE]`. Settings not in the file come from
//! `SOH_SERVER_*` environment variables or built-in defaults.

use anyhow::Context;
use api::{init_logging, run_server, ServerConfig};
use std::path::PathBuf;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::args_os().nth(1).map(PathBuf::from);
    let config = ServerConfig::load(config_path.as_deref())
        .context("failed to load server configuration")?;
    init_logging(&config.log_level, config.log_format)?;

    info!("=== SOH Prediction Server v{} ===", env!("CARGO_PKG_VERSION"));
    info!("Model artifacts: {}", config.artifacts.model.display());

    run_server(config).await
}
