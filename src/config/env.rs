use std::time::Duration;

use chrono::TimeDelta;
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub marker: MarkerConfig,
    pub page: PageConfig,
    pub directories: DirectoryConfig,
    pub logging: LoggingConfig,
    pub timezone: String,
}

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub base_url: String,
    pub session_cookie: Option<String>,
    pub user_country: String,
    pub user_language: String,
    pub timeout: Option<Duration>,
}

#[derive(Debug, Clone)]
pub struct MarkerConfig {
    pub cache_key: String,
    pub ttl: TimeDelta,
    pub concurrency: usize,
    pub debounce: Duration,
    pub hide_applied: bool,
    pub ephemeral_store: bool,
}

impl Default for MarkerConfig {
    fn default() -> Self {
        Self {
            cache_key: "wanted_applied_cache_v2".to_string(),
            ttl: TimeDelta::days(14),
            concurrency: 3,
            debounce: Duration::from_millis(300),
            hide_applied: false,
            ephemeral_store: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PageConfig {
    pub snapshot_path: String,
    pub base_url: String,
    pub poll_interval: Duration,
    pub report_filename: String,
    pub run_once: bool,
}

#[derive(Debug, Clone)]
pub struct DirectoryConfig {
    pub logs_dir: String,
    pub data_dir: String,
    pub db_filename: String,
}

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    Missing(&'static str),
    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
}
