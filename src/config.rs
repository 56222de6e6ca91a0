//! # Configuration Module
//!
//! Handles the application configuration: which APOD endpoint to query, the
//! API key to send with each request, and where session settings are kept.
//!
//! ## Configuration Storage
//! Stored as JSON in:
//! `~/.config/apod-viewer/config.json`
//!
//! The `APOD_API_KEY` environment variable, when set, takes precedence over the
//! stored key without being written back.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Directory name under the user's config directory.
const APP_DIR_NAME: &str = "apod-viewer";

/// NASA's public APOD endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://api.nasa.gov/planetary/apod";

/// Rate-limited key that works without registration.
pub const DEFAULT_API_KEY: &str = "DEMO_KEY";

/// Environment variable overriding the stored API key.
pub const API_KEY_ENV: &str = "APOD_API_KEY";

/// HTTP request timeout in seconds
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Could not determine config path")]
    NoConfigDir,

    #[error("Failed to create config dir: {0}")]
    CreateDir(#[source] std::io::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Failed to write config: {0}")]
    Write(#[source] std::io::Error),
}

/// Returns `~/.config/apod-viewer`, or `None` if the platform has no config dir.
pub fn app_config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join(APP_DIR_NAME))
}

/// User configuration for the application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Base URL of the APOD API (without query string).
    pub endpoint: String,
    /// Value sent as the `api_key` query parameter.
    pub api_key: String,
    /// Timeout applied by the HTTP client to each request.
    pub request_timeout_secs: u64,
    /// Where session settings are stored.
    /// Defaults to `~/.config/apod-viewer/settings.json` when unset.
    pub settings_path: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            api_key: DEFAULT_API_KEY.to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            settings_path: None,
        }
    }
}

impl AppConfig {
    /// Returns the path to the configuration file.
    fn config_path() -> Option<PathBuf> {
        app_config_dir().map(|p| p.join("config.json"))
    }

    /// Loads the configuration from disk, then applies the environment override.
    ///
    /// If the config file doesn't exist or cannot be parsed, returns default values.
    pub fn load() -> Self {
        let config: Self = Self::config_path()
            .and_then(|path| std::fs::read_to_string(path).ok())
            .and_then(|content| serde_json::from_str(&content).ok())
            .unwrap_or_default();

        config.with_api_key_override(std::env::var(API_KEY_ENV).ok())
    }

    fn with_api_key_override(mut self, key: Option<String>) -> Self {
        if let Some(key) = key.filter(|k| !k.trim().is_empty()) {
            self.api_key = key.trim().to_string();
        }
        self
    }

    /// Persists the configuration as pretty-printed JSON.
    ///
    /// Creates the config directory if it doesn't exist.
    pub fn save(&self) -> Result<(), ConfigError> {
        let path = Self::config_path().ok_or(ConfigError::NoConfigDir)?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(ConfigError::CreateDir)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(ConfigError::Write)?;

        Ok(())
    }

    /// Resolves where the session settings file lives.
    pub fn settings_file(&self) -> Option<PathBuf> {
        match &self.settings_path {
            Some(path) => Some(PathBuf::from(path)),
            None => app_config_dir().map(|p| p.join("settings.json")),
        }
    }
}
