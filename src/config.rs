//! Configuration loader and validator
//!
//! Loads manager settings from TOML files in the configs/ directory.

use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::daydream::constants::{DAYDREAM_NAME_PREFIX, DEFAULT_GRACE_PERIOD_MS};
use crate::daydream::touchpad::DEFAULT_MOVE_THRESHOLD;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub discovery: DiscoverySettings,

    #[serde(default)]
    pub connection: ConnectionSettings,

    #[serde(default)]
    pub input: InputSettings,
}

/// Scanner settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoverySettings {
    /// Local name prefix accepted when the service UUID is not advertised
    #[serde(default = "default_name_prefix")]
    pub name_prefix: String,

    /// Delay before restarting a failed scan
    #[serde(default = "default_scan_retry_secs")]
    pub scan_retry_secs: u64,

    /// Keep a JSON cache of seen controllers
    #[serde(default = "default_true")]
    pub remember_devices: bool,

    /// Cache location (defaults to next to the executable)
    #[serde(default)]
    pub known_devices_path: Option<PathBuf>,
}

impl Default for DiscoverySettings {
    fn default() -> Self {
        Self {
            name_prefix: default_name_prefix(),
            scan_retry_secs: default_scan_retry_secs(),
            remember_devices: true,
            known_devices_path: None,
        }
    }
}

/// Link and reconnection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionSettings {
    /// How long a lost controller keeps its identity
    #[serde(default = "default_grace_period_ms")]
    pub grace_period_ms: u64,

    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            grace_period_ms: default_grace_period_ms(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

/// Input decoding and delivery settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputSettings {
    /// Minimum touch travel between frames for a move event (0.0 to 1.0)
    #[serde(default = "default_touch_move_threshold")]
    pub touch_move_threshold: f32,

    /// Queue size of each subscriber channel
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,

    /// Battery polling interval, 0 disables polling
    #[serde(default = "default_battery_poll_secs")]
    pub battery_poll_secs: u64,
}

impl Default for InputSettings {
    fn default() -> Self {
        Self {
            touch_move_threshold: default_touch_move_threshold(),
            event_channel_capacity: default_event_channel_capacity(),
            battery_poll_secs: default_battery_poll_secs(),
        }
    }
}

fn default_name_prefix() -> String { DAYDREAM_NAME_PREFIX.to_string() }
fn default_scan_retry_secs() -> u64 { 5 }
fn default_true() -> bool { true }
fn default_grace_period_ms() -> u64 { DEFAULT_GRACE_PERIOD_MS }
fn default_connect_timeout_secs() -> u64 { 10 }
fn default_touch_move_threshold() -> f32 { DEFAULT_MOVE_THRESHOLD }
fn default_event_channel_capacity() -> usize { 256 }
fn default_battery_poll_secs() -> u64 { 60 }

impl Config {
    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_ref = path.as_ref();
        info!("Loading configuration from: {}", path_ref.display());

        let content = std::fs::read_to_string(path_ref)?;
        let config = Self::from_toml(&content)?;

        debug!("  - Grace period: {} ms", config.connection.grace_period_ms);
        debug!("  - Touch move threshold: {}", config.input.touch_move_threshold);
        info!("✓ Config validation passed");

        Ok(config)
    }

    /// Load default configuration from configs/default.toml
    pub fn load_default() -> Result<Self, ConfigError> {
        Self::load("configs/default.toml")
    }

    /// Parse and validate TOML text
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.discovery.name_prefix.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "discovery.name_prefix must not be empty".into()
            ));
        }

        if self.discovery.scan_retry_secs == 0 {
            return Err(ConfigError::Invalid(
                "discovery.scan_retry_secs must be positive".into()
            ));
        }

        if self.connection.connect_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "connection.connect_timeout_secs must be positive".into()
            ));
        }

        let threshold = self.input.touch_move_threshold;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(ConfigError::Invalid(
                "input.touch_move_threshold must be between 0.0 and 1.0".into()
            ));
        }

        if self.input.event_channel_capacity == 0 {
            return Err(ConfigError::Invalid(
                "input.event_channel_capacity must be positive".into()
            ));
        }

        Ok(())
    }

    pub fn grace_period(&self) -> Duration {
        Duration::from_millis(self.connection.grace_period_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connection.connect_timeout_secs)
    }

    /// `None` when battery polling is disabled
    pub fn battery_poll_interval(&self) -> Option<Duration> {
        match self.input.battery_poll_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.grace_period(), Duration::from_millis(DEFAULT_GRACE_PERIOD_MS));
        assert_eq!(config.discovery.name_prefix, DAYDREAM_NAME_PREFIX);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let config = Config::from_toml(
            r#"
            [connection]
            grace_period_ms = 1500

            [input]
            battery_poll_secs = 0
            "#,
        )
        .unwrap();

        assert_eq!(config.grace_period(), Duration::from_millis(1500));
        assert_eq!(config.connection.connect_timeout_secs, 10);
        assert_eq!(config.input.event_channel_capacity, 256);
        assert!(config.battery_poll_interval().is_none());
    }

    #[test]
    fn test_invalid_threshold() {
        let result = Config::from_toml(
            r#"
            [input]
            touch_move_threshold = 1.5
            "#,
        );
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("touch_move_threshold"));
    }

    #[test]
    fn test_invalid_capacity() {
        let mut config = Config::default();
        config.input.event_channel_capacity = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_parse_error() {
        assert!(matches!(
            Config::from_toml("[connection\ngrace_period_ms = 1"),
            Err(ConfigError::Parse(_))
        ));
    }
}
