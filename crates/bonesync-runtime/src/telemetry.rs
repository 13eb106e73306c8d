//! Logging setup

use bonesync_core::{BoneSyncError, BoneSyncResult};
use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

/// Log line format
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is unset
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: "info".to_string(),
            format: LogFormat::Text,
        }
    }
}

impl LoggingConfig {
    fn filter(&self) -> BoneSyncResult<EnvFilter> {
        EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(&self.level))
            .map_err(|e| BoneSyncError::InvalidConfig(format!("log filter: {}", e)))
    }
}

/// Install the global `tracing` subscriber.
///
/// `RUST_LOG` wins over `config.level`. Fails if a subscriber is already set.
pub fn init_logging(config: &LoggingConfig) -> BoneSyncResult<()> {
    let builder = tracing_subscriber::fmt().with_env_filter(config.filter()?);
    let installed = match config.format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    installed.map_err(|e| BoneSyncError::InvalidConfig(format!("logging: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logging_config_from_json() {
        let config: LoggingConfig = serde_json::from_str(r#"{ "level": "debug" }"#).unwrap();
        assert_eq!(config.level, "debug");
        assert_eq!(config.format, LogFormat::Text);
    }

    #[test]
    fn test_init_logging_once() {
        let config = LoggingConfig {
            level: "bonesync=debug".into(),
            format: LogFormat::Json,
        };
        let _ = init_logging(&config);
        assert!(init_logging(&config).is_err());
    }
}
