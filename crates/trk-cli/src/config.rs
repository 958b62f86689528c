//! Configuration loading and management.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};

use trk_client::{RetryPolicy, TrackerConfig};
use trk_core::{ApiKey, DEFAULT_HOST};

/// Application configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct Config {
    /// Path to the database holding the queue and identity.
    pub database_path: PathBuf,
    /// Account key sent with every request.
    pub api_key: Option<String>,
    /// Host receiving tracking requests.
    pub host: String,
    /// Use HTTPS rather than HTTP.
    pub secure: bool,
    /// Never attempt delivery; only queue.
    pub offline: bool,
    /// How long tracking commands wait for the queue to drain.
    pub flush_timeout_secs: u64,
    /// Timeout for a single HTTP request.
    pub request_timeout_secs: u64,
    /// Lowest status counted as delivered.
    pub success_min: u16,
    /// Highest status counted as delivered.
    pub success_max: u16,
    /// Delay after the first failed delivery.
    pub initial_backoff_ms: u64,
    /// Upper bound on the retry delay.
    pub max_backoff_ms: u64,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("database_path", &self.database_path)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("host", &self.host)
            .field("secure", &self.secure)
            .field("offline", &self.offline)
            .field("flush_timeout_secs", &self.flush_timeout_secs)
            .finish_non_exhaustive()
    }
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs_data_path().unwrap_or_else(|| PathBuf::from("."));
        let retry = RetryPolicy::default();
        Self {
            database_path: data_dir.join("trk.db"),
            api_key: None,
            host: DEFAULT_HOST.to_string(),
            secure: true,
            offline: false,
            flush_timeout_secs: 5,
            request_timeout_secs: 30,
            success_min: 200,
            success_max: 299,
            initial_backoff_ms: u64::try_from(retry.initial_backoff.as_millis()).unwrap_or(1_000),
            max_backoff_ms: u64::try_from(retry.max_backoff.as_millis()).unwrap_or(300_000),
        }
    }
}

impl Config {
    /// Loads configuration from default locations.
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    pub fn load() -> Result<Self, figment::Error> {
        Self::load_from(None)
    }

    /// Loads configuration, optionally from a specific file.
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, figment::Error> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        // Load from default config location
        if let Some(config_dir) = dirs_config_path() {
            figment = figment.merge(Toml::file(config_dir.join("config.toml")));
        }

        // Load from specified config file
        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        // Load from environment variables (TRK_*)
        figment = figment.merge(Env::prefixed("TRK_"));

        figment.extract()
    }

    /// Builds the client configuration. Fails when no API key is set.
    pub fn tracker_config(&self) -> Result<TrackerConfig> {
        let api_key = self
            .api_key
            .as_deref()
            .context("no API key configured; set api_key in config.toml or TRK_API_KEY")?;
        let api_key = ApiKey::new(api_key).context("invalid API key")?;
        if self.success_min > self.success_max {
            anyhow::bail!(
                "success_min ({}) must not exceed success_max ({})",
                self.success_min,
                self.success_max
            );
        }

        let mut config = TrackerConfig::new(api_key);
        config.host.clone_from(&self.host);
        config.secure = self.secure;
        config.success_statuses = self.success_min..=self.success_max;
        config.retry = RetryPolicy {
            initial_backoff: Duration::from_millis(self.initial_backoff_ms),
            max_backoff: Duration::from_millis(self.max_backoff_ms),
            ..RetryPolicy::default()
        };
        config.request_timeout = Duration::from_secs(self.request_timeout_secs);
        Ok(config)
    }

    pub const fn flush_timeout(&self) -> Duration {
        Duration::from_secs(self.flush_timeout_secs)
    }
}

/// Returns the platform-specific config directory for trk.
fn dirs_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("trk"))
}

/// Returns the platform-specific data directory for trk.
///
/// On Linux: `~/.local/share/trk`
pub fn dirs_data_path() -> Option<PathBuf> {
    dirs::data_dir().map(|p| p.join("trk"))
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_dirs_data_path_ends_with_trk() {
        let path = dirs_data_path().unwrap();
        assert_eq!(path.file_name().unwrap(), "trk");
    }

    #[test]
    fn test_default_config_uses_data_dir_for_db() {
        let config = Config::default();
        let data_dir = dirs_data_path().unwrap();
        assert_eq!(config.database_path, data_dir.join("trk.db"));
        assert_eq!(config.host, DEFAULT_HOST);
        assert!(config.secure);
        assert!(!config.offline);
    }

    #[test]
    fn test_config_file_overrides_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
api_key = "abc"
host = "collector.test"
secure = false
offline = true
"#
        )
        .unwrap();
        file.flush().unwrap();

        let config = Config::load_from(Some(file.path())).unwrap();
        assert_eq!(config.api_key.as_deref(), Some("abc"));
        assert_eq!(config.host, "collector.test");
        assert!(!config.secure);
        assert!(config.offline);
    }

    #[test]
    fn test_tracker_config_requires_api_key() {
        let config = Config::default();
        let err = config.tracker_config().unwrap_err();
        assert!(err.to_string().contains("no API key configured"));
    }

    #[test]
    fn test_tracker_config_maps_fields() {
        let config = Config {
            api_key: Some("abc".to_string()),
            secure: false,
            success_min: 200,
            success_max: 204,
            initial_backoff_ms: 50,
            ..Config::default()
        };
        let tracker_config = config.tracker_config().unwrap();
        assert_eq!(tracker_config.api_key.as_str(), "abc");
        assert!(!tracker_config.secure);
        assert_eq!(tracker_config.success_statuses, 200..=204);
        assert_eq!(
            tracker_config.retry.initial_backoff,
            Duration::from_millis(50)
        );
    }

    #[test]
    fn test_tracker_config_rejects_inverted_success_range() {
        let config = Config {
            api_key: Some("abc".to_string()),
            success_min: 300,
            success_max: 200,
            ..Config::default()
        };
        assert!(config.tracker_config().is_err());
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let config = Config {
            api_key: Some("secret-key".to_string()),
            ..Config::default()
        };
        let debug = format!("{config:?}");
        assert!(!debug.contains("secret-key"));
    }
}
