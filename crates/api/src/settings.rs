//! Server configuration

use config::{Config, ConfigError, Environment, File};
use inference_engine::InferenceConfig;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use tracing::Level;
use storage::ArtifactPaths;

/// Environment variable prefix, e.g. `SOH_SERVER_BIND_ADDR=127.0.0.1:9000`
pub const ENV_PREFIX: &str = "SOH_SERVER";

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Server configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub artifacts: ArtifactPaths,
    pub inference: InferenceConfig,
    /// Load artifacts at startup instead of on the first request
    pub preload: bool,
    pub log_level: String,
    pub log_format: LogFormat,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".to_string(),
            artifacts: ArtifactPaths::default(),
            inference: InferenceConfig::default(),
            preload: false,
            log_level: "info".to_string(),
            log_format: LogFormat::default(),
        }
    }
}

impl ServerConfig {
    /// Layer defaults, an optional config file and `SOH_SERVER_*` variables
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(true));
        }
        let config: ServerConfig = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject an unparsable bind address or log level and invalid inference settings
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.bind_addr.parse::<SocketAddr>().map_err(|e| {
            ConfigError::Message(format!("bind_addr {:?} is not a socket address: {e}", self.bind_addr))
        })?;
        self.log_level
            .parse::<Level>()
            .map_err(|_| ConfigError::Message(format!("unknown log_level {:?}", self.log_level)))?;
        self.inference
            .validate()
            .map_err(|e| ConfigError::Message(format!("inference: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::path::PathBuf;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_addr, "0.0.0.0:8080");
        assert_eq!(config.inference.cell_count, 21);
        assert_eq!(config.inference.health_threshold, 0.6);
        assert_eq!(config.artifacts.model, PathBuf::from("artifacts/model.bin"));
    }

    #[test]
    fn test_validate() {
        assert!(ServerConfig::default().validate().is_ok());

        let bad = [
            ServerConfig {
                bind_addr: "not-an-address".to_string(),
                ..Default::default()
            },
            ServerConfig {
                log_level: "loud".to_string(),
                ..Default::default()
            },
            ServerConfig {
                inference: InferenceConfig {
                    health_threshold: 1.5,
                    ..Default::default()
                },
                ..Default::default()
            },
            ServerConfig {
                inference: InferenceConfig {
                    cell_count: 1,
                    ..Default::default()
                },
                ..Default::default()
            },
        ];
        for config in bad {
            assert!(config.validate().is_err(), "{config:?}");
        }
    }

    #[test]
    fn test_load_rejects_invalid_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[inference]\nhealth_threshold = 2.0").unwrap();
        assert!(matches!(
            ServerConfig::load(Some(file.path())),
            Err(ConfigError::Message(_))
        ));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
bind_addr = "127.0.0.1:9000"
log_format = "json"

[inference]
health_threshold = 0.7

[artifacts]
scaler = "/srv/soh/scaler.bin"
"#
        )
        .unwrap();

        let config = ServerConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.bind_addr, "127.0.0.1:9000");
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.inference.health_threshold, 0.7);
        assert_eq!(config.inference.cell_count, 21);
        assert_eq!(config.artifacts.scaler, PathBuf::from("/srv/soh/scaler.bin"));
        assert_eq!(config.artifacts.model, PathBuf::from("artifacts/model.bin"));
    }
}
