//! Client configuration.

use std::path::{Path, PathBuf};

use derive_getters::Getters;
use derive_more::{Display, Error};
use derive_setters::Setters;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

/// Environment variable that overrides the backend URL.
pub const API_URL_ENV: &str = "ESCAPE_ROOM_API_URL";

/// Configuration for the escape room client.
#[derive(Debug, Clone, PartialEq, Eq, Getters, Setters, Serialize, Deserialize)]
#[setters(prefix = "with_", into)]
pub struct ClientConfig {
    /// Backend base URL.
    #[serde(default = "default_api_url")]
    api_url: String,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    timeout_secs: u64,

    /// File the persisted session is saved to.
    #[serde(default = "default_session_file")]
    session_file: PathBuf,
}

fn default_api_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_session_file() -> PathBuf {
    PathBuf::from("escape_room_session.json")
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            timeout_secs: default_timeout_secs(),
            session_file: default_session_file(),
        }
    }
}

impl ClientConfig {
    /// Loads configuration from a TOML file.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        debug!("Loading config from file");
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::new(format!("Failed to read config file: {}", e)))?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| ConfigError::new(format!("Failed to parse config: {}", e)))?;

        info!(api_url = %config.api_url, "Config loaded successfully");
        Ok(config)
    }

    /// Loads configuration from `path` if given, else defaults, then applies
    /// the [`API_URL_ENV`] override.
    #[instrument]
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.override_api_url(std::env::var(API_URL_ENV).ok())
    }

    /// Applies an API URL override, rejecting values that are not HTTP URLs.
    #[instrument(skip(self))]
    pub fn override_api_url(self, api_url: Option<String>) -> Result<Self, ConfigError> {
        match api_url {
            Some(url) if url.trim().is_empty() => Ok(self),
            Some(url) => {
                let url = url.trim().to_string();
                if !(url.starts_with("http://") || url.starts_with("https://")) {
                    return Err(ConfigError::new(format!(
                        "API URL must start with http:// or https://, got '{}'",
                        url
                    )));
                }
                debug!(api_url = %url, "Overriding API URL");
                Ok(self.with_api_url(url))
            }
            None => Ok(self),
        }
    }
}

/// Configuration error.
#[derive(Debug, Clone, Display, Error)]
#[display("Config error: {} at {}:{}", message, file, line)]
pub struct ConfigError {
    /// Error message.
    pub message: String,
    /// Line number where error occurred.
    pub line: u32,
    /// Source file where error occurred.
    pub file: &'static str,
}

impl ConfigError {
    /// Creates a new configuration error.
    #[track_caller]
    #[instrument(skip(message))]
    pub fn new(message: String) -> Self {
        let loc = std::panic::Location::caller();
        Self {
            message,
            line: loc.line(),
            file: loc.file(),
        }
    }
}
