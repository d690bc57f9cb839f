//! Application settings and Telegram configuration.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::DEFAULT_RETRY_BACKOFF_SECS;

/// Telegram API configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    /// Telegram API ID (obtain from <https://my.telegram.org>).
    pub api_id: i32,

    /// Telegram API hash (obtain from <https://my.telegram.org>).
    pub api_hash: String,

    /// Path to the session file.
    #[serde(default = "default_session_path")]
    pub session_path: PathBuf,

    /// Phone number used for sign-in. Prompted for when absent.
    #[serde(default)]
    pub phone: Option<String>,
}

fn default_session_path() -> PathBuf {
    PathBuf::from("session.db")
}

impl TelegramConfig {
    /// Creates a new Telegram configuration.
    #[must_use]
    pub fn new(api_id: i32, api_hash: String) -> Self {
        Self {
            api_id,
            api_hash,
            session_path: default_session_path(),
            phone: None,
        }
    }

    /// Creates configuration from environment variables.
    ///
    /// Expects `TG_API_ID` and `TG_API_HASH` to be set; `TG_SESSION_PATH`
    /// and `TG_PHONE` are optional.
    ///
    /// # Errors
    ///
    /// Returns an error if environment variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_id: i32 = std::env::var("TG_API_ID")
            .map_err(|_| ConfigError::MissingEnvVar("TG_API_ID"))?
            .parse()
            .map_err(|_| ConfigError::InvalidApiId)?;

        let api_hash = std::env::var("TG_API_HASH")
            .map_err(|_| ConfigError::MissingEnvVar("TG_API_HASH"))?;

        let session_path = std::env::var("TG_SESSION_PATH").map_or_else(|_| default_session_path(), PathBuf::from);

        let phone = std::env::var("TG_PHONE")
            .ok()
            .filter(|p| !p.trim().is_empty());

        Ok(Self {
            api_id,
            api_hash,
            session_path,
            phone,
        })
    }

    /// Session path as read from `TG_SESSION_PATH`, without requiring API credentials.
    #[must_use]
    pub fn session_path_from_env() -> PathBuf {
        std::env::var("TG_SESSION_PATH").map_or_else(|_| default_session_path(), PathBuf::from)
    }
}

/// Bot-specific settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotSettings {
    /// Path to the broadcast JSON file.
    pub broadcast_path: PathBuf,

    /// Seconds to wait before retrying a send that failed with an unclassified error.
    #[serde(default = "default_retry_backoff")]
    pub retry_backoff_secs: u64,

    /// Log level for the application.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_broadcast_path() -> PathBuf {
    PathBuf::from("broadcast.json")
}

fn default_retry_backoff() -> u64 {
    DEFAULT_RETRY_BACKOFF_SECS
}

fn default_log_level() -> String {
    "info".to_owned()
}

impl Default for BotSettings {
    fn default() -> Self {
        Self {
            broadcast_path: default_broadcast_path(),
            retry_backoff_secs: default_retry_backoff(),
            log_level: default_log_level(),
        }
    }
}

impl BotSettings {
    /// Creates bot settings from environment variables with defaults.
    #[must_use]
    pub fn from_env_with_defaults() -> Self {
        Self {
            broadcast_path: std::env::var("BROADCAST_CONFIG").map_or_else(|_| default_broadcast_path(), PathBuf::from),
            retry_backoff_secs: std::env::var("RETRY_BACKOFF_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|secs| *secs > 0)
                .unwrap_or_else(default_retry_backoff),
            log_level: std::env::var("RUST_LOG")
                .unwrap_or_else(|_| default_log_level()),
        }
    }

    /// Backoff applied after an unclassified send error.
    #[must_use]
    pub const fn retry_backoff(&self) -> Duration {
        Duration::from_secs(self.retry_backoff_secs)
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(&'static str),

    #[error("Invalid API ID format (must be a positive integer)")]
    InvalidApiId,
}
