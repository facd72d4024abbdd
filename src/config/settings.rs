//! Application settings and Telegram configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::ProxyConfig;

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
        }
    }

    /// Creates configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if `TG_API_ID` or `TG_API_HASH` is missing, or the
    /// id is not a number.
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_id: i32 = std::env::var("TG_API_ID")
            .map_err(|_| ConfigError::MissingEnvVar("TG_API_ID"))?
            .parse()
            .map_err(|_| ConfigError::InvalidApiId)?;

        let api_hash = std::env::var("TG_API_HASH")
            .map_err(|_| ConfigError::MissingEnvVar("TG_API_HASH"))?;

        let session_path = std::env::var("TG_SESSION_PATH")
            .map_or_else(|_| default_session_path(), PathBuf::from);

        Ok(Self {
            api_id,
            api_hash,
            session_path,
        })
    }

    /// Account name used as the log prefix (session file stem).
    #[must_use]
    pub fn session_name(&self) -> String {
        session_name_from_path(&self.session_path)
    }
}

fn session_name_from_path(path: &Path) -> String {
    path.file_stem()
        .map_or_else(|| "session".to_owned(), |s| s.to_string_lossy().into_owned())
}

/// Miner behaviour settings, read-only for the lifetime of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MinerSettings {
    /// Sleep between cycles when no claim timing is known, in seconds.
    #[serde(default = "default_sleep_secs")]
    pub default_sleep_secs: u64,

    /// Fixed pause after any transient failure, in seconds.
    #[serde(default = "default_error_backoff_secs")]
    pub error_backoff_secs: u64,

    /// Whether to upgrade the workbench (speed) track.
    #[serde(default = "default_true")]
    pub upgrade_speed: bool,

    /// Whether to upgrade the toolkit (storage) track.
    #[serde(default = "default_true")]
    pub upgrade_storage: bool,

    /// Highest workbench level the bot will buy.
    #[serde(default = "default_max_level")]
    pub speed_max_level: u32,

    /// Highest toolkit level the bot will buy.
    #[serde(default = "default_max_level")]
    pub storage_max_level: u32,

    /// Base URL of the game backend.
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Optional proxy for both Telegram and the game backend.
    #[serde(default)]
    pub proxy: Option<ProxyConfig>,
}

fn default_sleep_secs() -> u64 {
    900 // 15 minutes
}

fn default_error_backoff_secs() -> u64 {
    7
}

fn default_true() -> bool {
    true
}

fn default_max_level() -> u32 {
    10
}

fn default_api_url() -> String {
    "https://zavod-api.mdaowallet.com".to_owned()
}

impl Default for MinerSettings {
    fn default() -> Self {
        Self {
            default_sleep_secs: default_sleep_secs(),
            error_backoff_secs: default_error_backoff_secs(),
            upgrade_speed: true,
            upgrade_storage: true,
            speed_max_level: default_max_level(),
            storage_max_level: default_max_level(),
            api_url: default_api_url(),
            proxy: None,
        }
    }
}

impl MinerSettings {
    /// Creates miner settings from environment variables with defaults.
    ///
    /// Unparsable numbers and flags fall back to their defaults. A malformed
    /// `PROXY` is an error.
    pub fn from_env_with_defaults() -> Result<Self, ConfigError> {
        let proxy = match std::env::var("PROXY") {
            Ok(raw) if !raw.trim().is_empty() => Some(ProxyConfig::parse(&raw)?),
            _ => None,
        };

        Ok(Self {
            default_sleep_secs: env_parse("DEFAULT_SLEEP").unwrap_or_else(default_sleep_secs),
            error_backoff_secs: env_parse("ERROR_BACKOFF")
                .unwrap_or_else(default_error_backoff_secs),
            upgrade_speed: env_flag("UPGRADE_SPEED").unwrap_or(true),
            upgrade_storage: env_flag("UPGRADE_STORAGE").unwrap_or(true),
            speed_max_level: env_parse("SPEED_MAX_LEVEL").unwrap_or_else(default_max_level),
            storage_max_level: env_parse("STORAGE_MAX_LEVEL").unwrap_or_else(default_max_level),
            api_url: std::env::var("GAME_API_URL").unwrap_or_else(|_| default_api_url()),
            proxy,
        })
    }

    /// Default sleep between cycles.
    #[must_use]
    pub const fn default_sleep(&self) -> Duration {
        Duration::from_secs(self.default_sleep_secs)
    }

    /// Pause after a transient failure.
    #[must_use]
    pub const fn error_backoff(&self) -> Duration {
        Duration::from_secs(self.error_backoff_secs)
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|s| s.trim().parse().ok())
}

fn env_flag(name: &str) -> Option<bool> {
    std::env::var(name).ok().and_then(|s| parse_flag(&s))
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(&'static str),

    #[error("Invalid API ID format (must be a positive integer)")]
    InvalidApiId,

    #[error("Invalid proxy \"{proxy}\": {reason}")]
    InvalidProxy { proxy: String, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = MinerSettings::default();
        assert_eq!(settings.default_sleep_secs, 900);
        assert_eq!(settings.error_backoff(), Duration::from_secs(7));
        assert!(settings.upgrade_speed);
        assert!(settings.upgrade_storage);
        assert!(settings.proxy.is_none());
    }

    #[test]
    fn test_telegram_config_new() {
        let config = TelegramConfig::new(12345, "abc123".to_owned());
        assert_eq!(config.api_id, 12345);
        assert_eq!(config.api_hash, "abc123");
        assert_eq!(config.session_path, PathBuf::from("session.db"));
        assert_eq!(config.session_name(), "session");
    }

    #[test]
    fn test_session_name_from_nested_path() {
        assert_eq!(
            session_name_from_path(Path::new("sessions/alice.session")),
            "alice"
        );
    }

    #[test]
    fn test_parse_flag() {
        assert_eq!(parse_flag("True"), Some(true));
        assert_eq!(parse_flag(" off "), Some(false));
        assert_eq!(parse_flag("maybe"), None);
    }

    #[test]
    fn test_settings_deserialize_with_defaults() {
        let settings: MinerSettings =
            serde_json::from_str(r#"{"upgrade_speed": false, "speed_max_level": 3}"#).unwrap();
        assert!(!settings.upgrade_speed);
        assert_eq!(settings.speed_max_level, 3);
        assert_eq!(settings.storage_max_level, 10);
        assert_eq!(settings.api_url, "https://zavod-api.mdaowallet.com");
    }
}
