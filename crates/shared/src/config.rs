//! Configuration management for the anime aggregator.
//!
//! This module handles loading and parsing configuration from TOML files,
//! with sensible defaults for all settings.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable that overrides `sources.tmdb.api_key`
pub const TMDB_API_KEY_ENV: &str = "TMDB_API_KEY";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Logging settings
    pub logging: LoggingConfig,

    /// Aggregation settings (timeouts, cache TTLs, matching)
    pub aggregator: AggregatorConfig,

    /// Outbound HTTP settings shared by all adapters
    #[serde(default)]
    pub http: HttpConfig,

    /// Per-platform source settings
    #[serde(default)]
    pub sources: SourcesConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log directory path
    pub log_dir: String,

    /// Default log level (trace, debug, info, warn, error)
    pub default_level: String,

    /// Enable console output
    pub console: bool,

    /// Enable file output
    pub file: bool,

    /// Enable JSON formatting for file logs
    pub json_format: bool,
}

/// Aggregator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregatorConfig {
    /// How long a single source may take before its branch is abandoned
    pub per_source_timeout_ms: u64,

    /// TTL for list results
    pub list_ttl_seconds: u64,

    /// TTL for search results
    pub search_ttl_seconds: u64,

    /// TTL for schedule results
    pub schedule_ttl_seconds: u64,

    /// TTL for single-title lookups
    #[serde(default = "default_detail_ttl")]
    pub detail_ttl_seconds: u64,

    /// Minimum title similarity for two records to be merged
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f64,

    /// Interval of the housekeeping sweep over expired cache entries
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_seconds: u64,
}

/// Outbound HTTP configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Per-request timeout in seconds
    pub timeout_seconds: u64,

    /// User agent sent to every catalog
    pub user_agent: String,

    /// Maximum retries for failed requests
    pub max_retries: u32,

    /// Retry delay in milliseconds (doubles per attempt)
    pub retry_delay_ms: u64,

    /// Maximum requests per second, per source
    pub requests_per_second: f64,

    /// Maximum requests per minute, per source
    pub requests_per_minute: u32,
}

/// Source configuration for all supported platforms
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourcesConfig {
    #[serde(default)]
    pub bilibili: BilibiliConfig,

    #[serde(default)]
    pub tmdb: TmdbConfig,

    #[serde(default)]
    pub bgmtv: BgmtvConfig,
}

/// Bilibili source configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BilibiliConfig {
    pub enabled: bool,
    pub base_url: String,
}

/// TMDB source configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TmdbConfig {
    pub enabled: bool,
    pub base_url: String,
    pub image_base_url: String,
    pub language: String,

    /// API key (empty = read from TMDB_API_KEY)
    #[serde(default)]
    pub api_key: String,
}

/// Bangumi (bgm.tv) source configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BgmtvConfig {
    pub enabled: bool,
    pub base_url: String,
}

fn default_detail_ttl() -> u64 {
    3600
}

fn default_similarity_threshold() -> f64 {
    0.8
}

fn default_sweep_interval() -> u64 {
    300
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_dir: "logs".to_string(),
            default_level: "info".to_string(),
            console: true,
            file: true,
            json_format: false,
        }
    }
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            per_source_timeout_ms: 8000,
            list_ttl_seconds: 600,
            search_ttl_seconds: 300,
            schedule_ttl_seconds: 1800,
            detail_ttl_seconds: default_detail_ttl(),
            similarity_threshold: default_similarity_threshold(),
            sweep_interval_seconds: default_sweep_interval(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 10,
            user_agent: "anime-aggregator/0.1.0".to_string(),
            max_retries: 2,
            retry_delay_ms: 500,
            requests_per_second: 5.0,
            requests_per_minute: 120,
        }
    }
}

impl Default for BilibiliConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: "https://api.bilibili.com".to_string(),
        }
    }
}

impl Default for TmdbConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: "https://api.themoviedb.org/3".to_string(),
            image_base_url: "https://image.tmdb.org/t/p/w500".to_string(),
            language: "zh-CN".to_string(),
            api_key: String::new(),
        }
    }
}

impl Default for BgmtvConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: "https://api.bgm.tv".to_string(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            logging: LoggingConfig::default(),
            aggregator: AggregatorConfig::default(),
            http: HttpConfig::default(),
            sources: SourcesConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// If the file doesn't exist, returns the default configuration.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            tracing::warn!(
                path = %path.display(),
                "Config file not found, using defaults"
            );
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        tracing::info!(
            path = %path.display(),
            "Configuration loaded successfully"
        );

        Ok(config)
    }

    /// Load configuration from a TOML file or create default if not found
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::from_file(path).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Failed to load config, using defaults");
            Self::default()
        })
    }

    /// Save configuration to a TOML file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        let content = toml::to_string_pretty(self)
            .context("Failed to serialize configuration")?;

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        tracing::info!(
            path = %path.display(),
            "Configuration saved successfully"
        );

        Ok(())
    }

    /// Get the path for the log directory
    pub fn log_dir(&self) -> PathBuf {
        PathBuf::from(&self.logging.log_dir)
    }

    /// TMDB API key, preferring the environment over the file
    pub fn tmdb_api_key(&self) -> Option<String> {
        std::env::var(TMDB_API_KEY_ENV)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .or_else(|| {
                let key = self.sources.tmdb.api_key.trim();
                (!key.is_empty()).then(|| key.to_string())
            })
    }
}

impl AggregatorConfig {
    pub fn per_source_timeout(&self) -> Duration {
        Duration::from_millis(self.per_source_timeout_ms)
    }

    pub fn list_ttl(&self) -> Duration {
        Duration::from_secs(self.list_ttl_seconds)
    }

    pub fn search_ttl(&self) -> Duration {
        Duration::from_secs(self.search_ttl_seconds)
    }

    pub fn schedule_ttl(&self) -> Duration {
        Duration::from_secs(self.schedule_ttl_seconds)
    }

    pub fn detail_ttl(&self) -> Duration {
        Duration::from_secs(self.detail_ttl_seconds)
    }
}
