//! Process-wide settings (§6): API port, poll interval, cloud API key.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Configuration load result.
#[derive(Debug)]
pub enum ConfigLoadResult {
    /// Config loaded successfully.
    Loaded(Settings),
    /// Config file missing (first run); defaults apply.
    Missing,
    /// Config file exists but is invalid.
    Invalid(ConfigError),
}

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Read(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Validation failed: {0}")]
    Validation(String),
}

/// Process-wide settings consumed by the core.
///
/// Unknown keys are rejected (`deny_unknown_fields`) so a typo in the
/// config file surfaces as a startup error instead of being silently ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    /// HTTP API port (default 3000).
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// Poll interval in minutes (default 5).
    #[serde(default = "default_poll_interval")]
    pub poll_interval: u32,

    /// Opaque API key the upstream drainer must present. `None` means the
    /// drain endpoints are unconfigured and will reject with 503.
    #[serde(default)]
    pub cloud_api_key: Option<String>,
}

fn default_api_port() -> u16 {
    3000
}

fn default_poll_interval() -> u32 {
    5
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_port: default_api_port(),
            poll_interval: default_poll_interval(),
            cloud_api_key: None,
        }
    }
}

impl Settings {
    /// Default config file path (next to the executable).
    pub fn default_path() -> PathBuf {
        std::env::current_exe()
            .ok()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
            .unwrap_or_else(|| PathBuf::from("."))
            .join("config.toml")
    }

    /// Attempt to load settings with a detailed result.
    pub fn try_load(path: &Path) -> ConfigLoadResult {
        if !path.exists() {
            return ConfigLoadResult::Missing;
        }

        match std::fs::read_to_string(path) {
            Ok(content) => match toml::from_str::<Settings>(&content) {
                Ok(settings) => match settings.validate() {
                    Ok(()) => ConfigLoadResult::Loaded(settings),
                    Err(e) => ConfigLoadResult::Invalid(e),
                },
                Err(e) => ConfigLoadResult::Invalid(ConfigError::Parse(e)),
            },
            Err(e) => ConfigLoadResult::Invalid(ConfigError::Read(e)),
        }
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_port == 0 {
            return Err(ConfigError::Validation("api_port must be greater than 0".to_string()));
        }
        if self.poll_interval == 0 {
            return Err(ConfigError::Validation(
                "poll_interval must be at least 1 minute".to_string(),
            ));
        }
        if let Some(ref key) = self.cloud_api_key {
            if key.trim().is_empty() {
                return Err(ConfigError::Validation(
                    "cloud_api_key cannot be blank when set".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Save settings to file.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
