//! Configuration file parser for ~/.config/whackamole/config.toml.
//!
//! The config file is optional. A missing file yields `Config::default()`.
//! Unknown keys are ignored by serde, though we log a warning for each one
//! since they are usually typos.
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::feed::FetchOptions;
use crate::ingest::IngestOptions;
use crate::storage::DEFAULT_ARCHIVE_LIMIT;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// Config file exceeds maximum allowed size.
    #[error("Config file too large: {0}")]
    TooLarge(String),
}

// ============================================================================
// Configuration
// ============================================================================

const KNOWN_KEYS: &[&str] = &[
    "database_path",
    "refresh_interval_minutes",
    "fetch_timeout_secs",
    "fetch_concurrency",
    "max_feed_size_bytes",
    "user_agent",
    "allow_private_hosts",
    "archive_limit",
];

/// Top-level application configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// SQLite file. Defaults to `rss_reader.db` in the config directory.
    pub database_path: Option<PathBuf>,

    /// Interval for `watch`, in minutes. 0 = manual refresh only.
    pub refresh_interval_minutes: u64,

    pub fetch_timeout_secs: u64,

    /// Feeds fetched in parallel during a batch. 1 = sequential.
    pub fetch_concurrency: usize,

    pub max_feed_size_bytes: usize,

    pub user_agent: String,

    /// Accept localhost and private-network feed URLs.
    pub allow_private_hosts: bool,

    /// Row cap for the archive listing.
    pub archive_limit: i64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: None,
            refresh_interval_minutes: 30,
            fetch_timeout_secs: 30,
            fetch_concurrency: 1,
            max_feed_size_bytes: 10 * 1024 * 1024,
            user_agent: format!("whackamole/{}", env!("CARGO_PKG_VERSION")),
            allow_private_hosts: false,
            archive_limit: DEFAULT_ARCHIVE_LIMIT,
        }
    }
}

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown keys → accepted, logged as warning
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // File deleted between metadata and read
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            for key in raw.keys() {
                if !KNOWN_KEYS.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let config: Config = toml::from_str(&content)?;
        tracing::info!(
            path = %path.display(),
            concurrency = config.fetch_concurrency,
            "Loaded configuration"
        );
        Ok(config)
    }

    /// Database file, falling back to `<config_dir>/rss_reader.db`.
    pub fn database_path(&self, config_dir: &Path) -> PathBuf {
        self.database_path
            .clone()
            .unwrap_or_else(|| config_dir.join("rss_reader.db"))
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs.max(1))
    }

    /// `None` when periodic refresh is disabled.
    pub fn refresh_interval(&self) -> Option<Duration> {
        (self.refresh_interval_minutes > 0)
            .then(|| Duration::from_secs(self.refresh_interval_minutes.saturating_mul(60)))
    }

    pub fn ingest_options(&self) -> IngestOptions {
        IngestOptions {
            fetch: FetchOptions {
                timeout: self.fetch_timeout(),
                max_size: self.max_feed_size_bytes,
                ..FetchOptions::default()
            },
            concurrency: self.fetch_concurrency.max(1),
            allow_private_hosts: self.allow_private_hosts,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn write_config(name: &str, content: &str) -> (PathBuf, PathBuf) {
        let dir = std::env::temp_dir().join(format!("whackamole_config_test_{name}"));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, content).unwrap();
        (dir, path)
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.database_path.is_none());
        assert_eq!(config.refresh_interval_minutes, 30);
        assert_eq!(config.fetch_timeout_secs, 30);
        assert_eq!(config.fetch_concurrency, 1);
        assert_eq!(config.max_feed_size_bytes, 10 * 1024 * 1024);
        assert!(config.user_agent.starts_with("whackamole/"));
        assert!(!config.allow_private_hosts);
        assert_eq!(config.archive_limit, 500);
    }

    #[test]
    fn test_missing_file_returns_default() {
        let path = Path::new("/tmp/whackamole_test_nonexistent_config.toml");
        let config = Config::load(path).unwrap();
        assert_eq!(config.refresh_interval_minutes, 30);
    }

    #[test]
    fn test_empty_file_returns_default() {
        let (dir, path) = write_config("empty", "   \n  \n  ");
        let config = Config::load(&path).unwrap();
        assert_eq!(config.fetch_concurrency, 1);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_partial_config_uses_defaults_for_missing() {
        let (dir, path) = write_config("partial", "fetch_concurrency = 4\n");
        let config = Config::load(&path).unwrap();
        assert_eq!(config.fetch_concurrency, 4);
        assert_eq!(config.refresh_interval_minutes, 30); // default
        assert_eq!(config.archive_limit, 500); // default
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_full_config() {
        let content = r#"
database_path = "/var/lib/whackamole/feeds.db"
refresh_interval_minutes = 15
fetch_timeout_secs = 10
fetch_concurrency = 8
max_feed_size_bytes = 1048576
user_agent = "my-reader/1.0"
allow_private_hosts = true
archive_limit = 100
"#;
        let (dir, path) = write_config("full", content);
        let config = Config::load(&path).unwrap();
        assert_eq!(
            config.database_path(Path::new("/unused")),
            PathBuf::from("/var/lib/whackamole/feeds.db")
        );
        assert_eq!(config.refresh_interval(), Some(Duration::from_secs(900)));
        assert_eq!(config.fetch_timeout(), Duration::from_secs(10));
        assert_eq!(config.user_agent, "my-reader/1.0");
        assert!(config.allow_private_hosts);
        assert_eq!(config.archive_limit, 100);

        let options = config.ingest_options();
        assert_eq!(options.concurrency, 8);
        assert_eq!(options.fetch.max_size, 1_048_576);
        assert_eq!(options.fetch.timeout, Duration::from_secs(10));
        assert!(options.allow_private_hosts);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_default_database_path_in_config_dir() {
        let config = Config::default();
        assert_eq!(
            config.database_path(Path::new("/home/u/.config/whackamole")),
            PathBuf::from("/home/u/.config/whackamole/rss_reader.db")
        );
    }

    #[test]
    fn test_zero_interval_disables_refresh() {
        let config = Config {
            refresh_interval_minutes: 0,
            ..Config::default()
        };
        assert_eq!(config.refresh_interval(), None);
    }

    #[test]
    fn test_zero_concurrency_clamped() {
        let config = Config {
            fetch_concurrency: 0,
            ..Config::default()
        };
        assert_eq!(config.ingest_options().concurrency, 1);
    }

    #[test]
    fn test_invalid_toml_returns_error() {
        let (dir, path) = write_config("invalid", "this is not [valid toml");
        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
        assert!(err.to_string().contains("Invalid TOML"));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_unknown_keys_accepted() {
        let content = r#"
fetch_concurrency = 2
totally_fake_key = "should not fail"
theme = "dark"
"#;
        let (dir, path) = write_config("unknown", content);
        let config = Config::load(&path).unwrap();
        assert_eq!(config.fetch_concurrency, 2);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_wrong_type_returns_error() {
        let (dir, path) = write_config("wrongtype", "fetch_concurrency = \"many\"\n");
        assert!(Config::load(&path).is_err());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_too_large_file_rejected() {
        let (dir, path) = write_config("too_large", &"a".repeat(1_048_577));
        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::TooLarge(_)));
        assert!(err.to_string().contains("too large"));
        std::fs::remove_dir_all(&dir).ok();
    }
}
