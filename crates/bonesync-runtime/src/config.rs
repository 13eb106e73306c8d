//! Node configuration

use std::time::Duration;

use bonesync_core::{BoneSyncError, BoneSyncResult, InterpolationMode, LinkSettings};
use serde::{Deserialize, Serialize};

use crate::LoggingConfig;

/// Which end of the pose link a node runs
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeRole {
    Authority,
    Observer,
}

/// BoneSync node configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    pub role: NodeRole,
    /// Resample/publish period in microseconds (authority)
    pub interval_us: u64,
    /// Render delay in multiples of the interval (replicated to observers)
    pub latency: f64,
    /// Observer behavior outside the buffered bracket
    pub interpolation: InterpolationMode,
    /// Whether the traversal root is itself a replicated bone
    pub include_root: bool,
    /// Maximum queued outgoing frames
    pub max_outgoing_frames: usize,
    /// Maximum queued incoming frames
    pub max_incoming_frames: usize,
    pub logging: LoggingConfig,
}

impl Default for NodeConfig {
    fn default() -> Self {
        NodeConfig {
            role: NodeRole::Authority,
            interval_us: 100_000,
            latency: 2.0,
            interpolation: InterpolationMode::Extrapolate,
            include_root: true,
            max_outgoing_frames: 256,
            max_incoming_frames: 256,
            logging: LoggingConfig::default(),
        }
    }
}

impl NodeConfig {
    pub fn authority() -> Self {
        NodeConfig {
            role: NodeRole::Authority,
            ..Default::default()
        }
    }

    pub fn observer() -> Self {
        NodeConfig {
            role: NodeRole::Observer,
            ..Default::default()
        }
    }

    /// Use the given link settings. Intervals past `u64::MAX` microseconds
    /// saturate and then fail validation.
    pub fn with_settings(mut self, settings: LinkSettings) -> Self {
        self.interval_us = u64::try_from(settings.interval.as_micros()).unwrap_or(u64::MAX);
        self.latency = settings.latency;
        self
    }

    pub fn link_settings(&self) -> LinkSettings {
        LinkSettings::new(Duration::from_micros(self.interval_us), self.latency)
    }

    /// Parse a JSON document; missing keys take their defaults
    pub fn from_json_str(json: &str) -> BoneSyncResult<Self> {
        let config: NodeConfig = serde_json::from_str(json)
            .map_err(|e| BoneSyncError::InvalidConfig(format!("node config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json_string(&self) -> BoneSyncResult<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| BoneSyncError::InvalidConfig(format!("node config: {}", e)))
    }

    pub fn validate(&self) -> BoneSyncResult<()> {
        self.link_settings().validate()?;
        if self.max_outgoing_frames == 0 || self.max_incoming_frames == 0 {
            return Err(BoneSyncError::InvalidConfig(
                "frame queues must hold at least one frame".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LogFormat;

    #[test]
    fn test_default_config_is_valid() {
        let config = NodeConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.link_settings(), LinkSettings::default());
    }

    #[test]
    fn test_from_json_partial() {
        let config = NodeConfig::from_json_str(
            r#"{
                "role": "observer",
                "latency": 3.0,
                "interpolation": "clamp",
                "logging": { "format": "json" }
            }"#,
        )
        .unwrap();

        assert_eq!(config.role, NodeRole::Observer);
        assert_eq!(config.interval_us, 100_000);
        assert_eq!(config.latency, 3.0);
        assert_eq!(config.interpolation, InterpolationMode::Clamp);
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_from_json_rejects_invalid() {
        let err = NodeConfig::from_json_str(r#"{ "interval_us": 0 }"#).unwrap_err();
        assert!(matches!(err, BoneSyncError::InvalidConfig(_)));

        assert!(NodeConfig::from_json_str(r#"{ "role": "spectator" }"#).is_err());
        assert!(NodeConfig::from_json_str(r#"{ "max_outgoing_frames": 0 }"#).is_err());
    }

    #[test]
    fn test_json_round_trip() {
        let config = NodeConfig::observer().with_settings(LinkSettings::low_bandwidth());
        let json = config.to_json_string().unwrap();
        assert_eq!(NodeConfig::from_json_str(&json).unwrap(), config);
    }

    #[test]
    fn test_sub_millisecond_interval_survives() {
        let settings = LinkSettings::new(Duration::from_micros(33_333), 1.5);
        let config = NodeConfig::authority().with_settings(settings);
        assert_eq!(config.interval_us, 33_333);
        assert_eq!(config.link_settings(), settings);

        let json = config.to_json_string().unwrap();
        let parsed = NodeConfig::from_json_str(&json).unwrap();
        assert_eq!(parsed.link_settings(), settings);
    }
}
