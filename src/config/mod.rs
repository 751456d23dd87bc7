//! Configuration loading and validation.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::fetch::{FetcherConfig, RetryPolicy};
use crate::models::{ScrapeTarget, SentinelPolicy};
use crate::sync::SyncConfig;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Upstream API and HTTP client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Leaderboard endpoint without query string
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Retries after the first attempt
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_initial_delay")]
    pub initial_delay_ms: u64,

    #[serde(default = "default_backoff")]
    pub backoff_multiplier: f64,

    /// Page requests in flight per target
    #[serde(default = "default_page_concurrency")]
    pub page_concurrency: usize,
}

fn default_base_url() -> String {
    FetcherConfig::default().base_url
}

fn default_timeout() -> u64 {
    30
}

fn default_user_agent() -> String {
    FetcherConfig::default().user_agent
}

fn default_max_retries() -> u32 {
    RetryPolicy::default().max_retries
}

fn default_initial_delay() -> u64 {
    RetryPolicy::default().initial_delay_ms
}

fn default_backoff() -> f64 {
    RetryPolicy::default().backoff_multiplier
}

fn default_page_concurrency() -> usize {
    40
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_seconds: default_timeout(),
            user_agent: default_user_agent(),
            max_retries: default_max_retries(),
            initial_delay_ms: default_initial_delay(),
            backoff_multiplier: default_backoff(),
            page_concurrency: default_page_concurrency(),
        }
    }
}

/// Scrape scheduling settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeConfig {
    /// Interval between runs in watch mode, e.g. "1h" or "30m"
    #[serde(default = "default_interval")]
    pub interval: String,

    #[serde(default)]
    pub sentinel_policy: SentinelPolicy,
}

/// Longest accepted gap between scrape runs.
const MAX_SCRAPE_INTERVAL: Duration = Duration::from_secs(366 * 86_400);

fn default_interval() -> String {
    "1h".to_string()
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            interval: default_interval(),
            sentinel_policy: SentinelPolicy::default(),
        }
    }
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_cors_origin")]
    pub cors_origin: String,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_cors_origin() -> String {
    "*".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origin: default_cors_origin(),
        }
    }
}

/// Solo and duo Battlegrounds ladders in Europe.
pub fn default_targets() -> Vec<ScrapeTarget> {
    vec![
        ScrapeTarget::new("EU", "battlegrounds", "Battlegrounds Solo"),
        ScrapeTarget::new("EU", "battlegroundsduo", "Battlegrounds Duo"),
    ]
}

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub fetch: FetchConfig,

    #[serde(default)]
    pub scrape: ScrapeConfig,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default = "default_targets")]
    pub targets: Vec<ScrapeTarget>,
}

fn default_database_path() -> PathBuf {
    PathBuf::from("./data/ladder.db")
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            log_level: default_log_level(),
            fetch: FetchConfig::default(),
            scrape: ScrapeConfig::default(),
            server: ServerConfig::default(),
            targets: default_targets(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Like [`AppConfig::from_file`], but a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.fetch.timeout_seconds == 0 {
            return Err(ConfigError::ValidationError(
                "Fetch timeout must be greater than 0".to_string(),
            ));
        }

        if url::Url::parse(&self.fetch.base_url).is_err() {
            return Err(ConfigError::ValidationError(format!(
                "Invalid fetch base_url: {}",
                self.fetch.base_url
            )));
        }

        if self.fetch.page_concurrency == 0 {
            return Err(ConfigError::ValidationError(
                "Page concurrency must be greater than 0".to_string(),
            ));
        }

        if self.fetch.backoff_multiplier < 1.0 {
            return Err(ConfigError::ValidationError(
                "Backoff multiplier must be at least 1.0".to_string(),
            ));
        }

        self.interval()?;

        if self.server.port == 0 {
            return Err(ConfigError::ValidationError(
                "Server port must be greater than 0".to_string(),
            ));
        }

        if self.targets.is_empty() {
            return Err(ConfigError::ValidationError(
                "At least one scrape target is required".to_string(),
            ));
        }

        for target in &self.targets {
            if target.region.trim().is_empty() || target.leaderboard_id.trim().is_empty() {
                return Err(ConfigError::ValidationError(format!(
                    "Target {:?} needs a region and a leaderboard_id",
                    target.display_name
                )));
            }
            if target.max_pages == 0 {
                return Err(ConfigError::ValidationError(format!(
                    "Target {} must allow at least one page",
                    target.label()
                )));
            }
        }

        Ok(())
    }

    /// Parsed watch-mode interval.
    pub fn interval(&self) -> Result<Duration, ConfigError> {
        match crate::parse_duration(&self.scrape.interval) {
            Some(d) if !d.is_zero() && d <= MAX_SCRAPE_INTERVAL => Ok(d),
            _ => Err(ConfigError::ValidationError(format!(
                "Invalid scrape interval: {:?}",
                self.scrape.interval
            ))),
        }
    }

    pub fn to_fetcher_config(&self) -> FetcherConfig {
        FetcherConfig {
            base_url: self.fetch.base_url.clone(),
            timeout: Duration::from_secs(self.fetch.timeout_seconds),
            user_agent: self.fetch.user_agent.clone(),
            retry: RetryPolicy {
                max_retries: self.fetch.max_retries,
                initial_delay_ms: self.fetch.initial_delay_ms,
                backoff_multiplier: self.fetch.backoff_multiplier,
            },
            page_concurrency: self.fetch.page_concurrency,
        }
    }

    pub fn to_sync_config(&self) -> Result<SyncConfig, ConfigError> {
        Ok(SyncConfig {
            targets: self.targets.clone(),
            interval: self.interval()?,
            sentinel_policy: self.scrape.sentinel_policy,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();

        assert_eq!(config.database_path, PathBuf::from("./data/ladder.db"));
        assert_eq!(config.log_level, "info");
        assert_eq!(config.fetch.max_retries, 3);
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.scrape.sentinel_policy, SentinelPolicy::EveryRun);
        assert_eq!(config.targets.len(), 2);
    }

    #[test]
    fn test_config_validation_ok() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation_bad_timeout() {
        let mut config = AppConfig::default();
        config.fetch.timeout_seconds = 0;

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_bad_port() {
        let mut config = AppConfig::default();
        config.server.port = 0;

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_bad_interval() {
        let mut config = AppConfig::default();
        config.scrape.interval = "soon".to_string();
        assert!(config.validate().is_err());

        config.scrape.interval = "0s".to_string();
        assert!(config.validate().is_err());

        config.scrape.interval = "6000000000000000h".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError(_))
        ));

        config.scrape.interval = "400d".to_string();
        assert!(config.validate().is_err());

        config.scrape.interval = "1d".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation_targets() {
        let mut config = AppConfig::default();
        config.targets.clear();
        assert!(config.validate().is_err());

        config.targets = vec![ScrapeTarget::new("", "battlegrounds", "Solo")];
        assert!(config.validate().is_err());

        config.targets = vec![ScrapeTarget::new("EU", "battlegrounds", "Solo").with_max_pages(0)];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
            database_path = "/tmp/ladder.db"

            [scrape]
            interval = "30m"
            sentinel_policy = "on_transition"

            [[targets]]
            region = "US"
            leaderboard_id = "battlegrounds"
            display_name = "Battlegrounds Solo"
            max_pages = 4
            "#,
        )
        .unwrap();

        assert_eq!(config.fetch.page_concurrency, 40);
        assert_eq!(config.interval().unwrap(), Duration::from_secs(1800));
        assert_eq!(config.targets.len(), 1);
        assert_eq!(config.targets[0].max_pages, 4);

        let sync = config.to_sync_config().unwrap();
        assert_eq!(sync.sentinel_policy, SentinelPolicy::OnTransition);
    }

    #[test]
    fn test_load_missing_file_falls_back() {
        let temp_dir = TempDir::new().unwrap();
        let config = AppConfig::load(&temp_dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.server.port, 8080);
    }

    #[test]
    fn test_load_rejects_invalid_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(&path, "[server]\nport = 0\n").unwrap();

        assert!(matches!(
            AppConfig::load(&path),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_fetcher_config_mapping() {
        let mut config = AppConfig::default();
        config.fetch.timeout_seconds = 5;
        config.fetch.max_retries = 1;

        let fetcher = config.to_fetcher_config();
        assert_eq!(fetcher.timeout, Duration::from_secs(5));
        assert_eq!(fetcher.retry.max_retries, 1);
        assert!(fetcher.base_url.contains("leaderboardsData"));
    }

    #[test]
    fn test_config_serialization() {
        let config = AppConfig::default();
        let toml_str = toml::to_string(&config).unwrap();

        // Should be parseable
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(config.database_path, parsed.database_path);
        assert_eq!(config.targets, parsed.targets);
    }
}
