//! Application configuration structures.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Remote leaderboard endpoint settings
    #[serde(default)]
    pub source: SourceConfig,

    /// Background synchronization settings
    #[serde(default)]
    pub sync: SyncConfig,

    /// Snapshot cache settings
    #[serde(default)]
    pub store: StoreConfig,

    /// Query tool behavior
    #[serde(default)]
    pub query: QueryConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Override values from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Override values from any key lookup. Unparsable numbers are ignored.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup("LEADERBOARD_URL") {
            self.source.endpoint = url;
        }
        if let Some(path) = lookup("LEADERBOARD_DB_PATH") {
            self.store.path = PathBuf::from(path);
        }
        if let Some(secs) = lookup("SYNC_INTERVAL_SECS").and_then(|v| v.parse().ok()) {
            self.sync.interval_secs = secs;
        }
        if let Some(identity) = lookup("MY_NUMBER") {
            self.query.identity = identity;
        }
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.source.endpoint.trim().is_empty() {
            return Err(AppError::validation("source.endpoint is empty"));
        }
        url::Url::parse(&self.source.endpoint)?;
        if self.source.user_agent.trim().is_empty() {
            return Err(AppError::validation("source.user_agent is empty"));
        }
        if self.source.timeout_secs == 0 {
            return Err(AppError::validation("source.timeout_secs must be > 0"));
        }
        if self.source.page_size == 0 {
            return Err(AppError::validation("source.page_size must be > 0"));
        }
        if self.sync.interval_secs == 0 {
            return Err(AppError::validation("sync.interval_secs must be > 0"));
        }
        if !(0.0..=1.0).contains(&self.query.fuzzy_threshold) {
            return Err(AppError::validation(
                "query.fuzzy_threshold must be within 0.0..=1.0",
            ));
        }
        if self.query.movers_limit == 0 {
            return Err(AppError::validation("query.movers_limit must be > 0"));
        }
        Ok(())
    }
}

/// Remote leaderboard endpoint and HTTP client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Leaderboard endpoint without query string
    #[serde(default = "defaults::endpoint")]
    pub endpoint: String,

    /// Number of teams requested per fetch
    #[serde(default = "defaults::page_size")]
    pub page_size: u32,

    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Referer/Origin sent along with the request
    #[serde(default = "defaults::origin")]
    pub origin: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            endpoint: defaults::endpoint(),
            page_size: defaults::page_size(),
            user_agent: defaults::user_agent(),
            origin: defaults::origin(),
            timeout_secs: defaults::timeout(),
        }
    }
}

/// Background synchronization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Delay between the end of one cycle and the start of the next
    #[serde(default = "defaults::interval")]
    pub interval_secs: u64,
}

impl SyncConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            interval_secs: defaults::interval(),
        }
    }
}

/// Snapshot cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// SQLite database file
    #[serde(default = "defaults::db_path")]
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: defaults::db_path(),
        }
    }
}

/// Query tool behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryConfig {
    /// Minimum similarity (0.0-1.0) for a fuzzy team name match
    #[serde(default = "defaults::fuzzy_threshold")]
    pub fuzzy_threshold: f64,

    /// Maximum number of rank movements reported
    #[serde(default = "defaults::movers_limit")]
    pub movers_limit: usize,

    /// Number of teams listed by the database status tool
    #[serde(default = "defaults::status_top")]
    pub status_top: usize,

    /// Visitor milestones checked by the milestone tool
    #[serde(default = "defaults::milestones")]
    pub milestones: Vec<u64>,

    /// Identity value returned by the validate tool
    #[serde(default = "defaults::identity")]
    pub identity: String,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            fuzzy_threshold: defaults::fuzzy_threshold(),
            movers_limit: defaults::movers_limit(),
            status_top: defaults::status_top(),
            milestones: defaults::milestones(),
            identity: defaults::identity(),
        }
    }
}

mod defaults {
    use std::path::PathBuf;

    // Source defaults
    pub fn endpoint() -> String {
        "https://api.puch.ai/hackathon-leaderboard".into()
    }
    pub fn page_size() -> u32 {
        100
    }
    pub fn user_agent() -> String {
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.15; rv:137.0) Gecko/20100101 Firefox/137.0"
            .into()
    }
    pub fn origin() -> String {
        "https://puch.ai".into()
    }
    pub fn timeout() -> u64 {
        30
    }

    // Sync defaults
    pub fn interval() -> u64 {
        30
    }

    // Store defaults
    pub fn db_path() -> PathBuf {
        PathBuf::from("data/leaderboard.db")
    }

    // Query defaults
    pub fn fuzzy_threshold() -> f64 {
        0.6
    }
    pub fn movers_limit() -> usize {
        5
    }
    pub fn status_top() -> usize {
        5
    }
    pub fn milestones() -> Vec<u64> {
        vec![1_000, 5_000, 10_000, 25_000, 50_000]
    }
    pub fn identity() -> String {
        "Unknown".into()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn validate_default_config_ok() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn validate_rejects_empty_user_agent() {
        let mut config = Config::default();
        config.source.user_agent = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_bad_endpoint() {
        let mut config = Config::default();
        config.source.endpoint = "not a url".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_interval() {
        let mut config = Config::default();
        config.sync.interval_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_out_of_range_threshold() {
        let mut config = Config::default();
        config.query.fuzzy_threshold = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config: Config = toml::from_str(
            r#"
            [sync]
            interval_secs = 5

            [store]
            path = "/tmp/board.db"
            "#,
        )
        .unwrap();

        assert_eq!(config.sync.interval(), Duration::from_secs(5));
        assert_eq!(config.store.path, PathBuf::from("/tmp/board.db"));
        assert_eq!(config.source.page_size, 100);
        assert_eq!(config.query.fuzzy_threshold, 0.6);
    }

    #[test]
    fn overrides_replace_values() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("LEADERBOARD_URL", "http://localhost:9000/board"),
            ("SYNC_INTERVAL_SECS", "7"),
            ("MY_NUMBER", "919876543210"),
        ]);
        let mut config = Config::default();
        config.apply_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.source.endpoint, "http://localhost:9000/board");
        assert_eq!(config.sync.interval_secs, 7);
        assert_eq!(config.query.identity, "919876543210");
        assert_eq!(config.store.path, PathBuf::from("data/leaderboard.db"));
    }

    #[test]
    fn overrides_ignore_unparsable_numbers() {
        let mut config = Config::default();
        config.apply_overrides(|key| (key == "SYNC_INTERVAL_SECS").then(|| "soon".to_string()));
        assert_eq!(config.sync.interval_secs, 30);
    }
}
