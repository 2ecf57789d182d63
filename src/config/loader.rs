use std::{env, str::FromStr, time::Duration};

use chrono::TimeDelta;

use super::env::{
    ApiConfig, AppConfig, ConfigError, DirectoryConfig, LoggingConfig, MarkerConfig, PageConfig,
};

pub fn load_config() -> Result<AppConfig, ConfigError> {
    AppConfig::from_lookup(|key| env::var(key).ok())
}

impl AppConfig {
    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let snapshot_path = get("PAGE_SNAPSHOT").ok_or(ConfigError::Missing("PAGE_SNAPSHOT"))?;

        let api = ApiConfig {
            base_url: get("WANTED_API_BASE")
                .unwrap_or_else(|| crate::api::DEFAULT_API_BASE.to_string()),
            session_cookie: get("WANTED_SESSION_COOKIE"),
            user_country: get("WANTED_USER_COUNTRY").unwrap_or_else(|| "KR".to_string()),
            user_language: get("WANTED_USER_LANGUAGE").unwrap_or_else(|| "ko".to_string()),
            timeout: parse::<u64>(&get, "API_TIMEOUT_MS")?.map(Duration::from_millis),
        };

        let defaults = MarkerConfig::default();
        let marker = MarkerConfig {
            cache_key: get("MARKER_CACHE_KEY").unwrap_or(defaults.cache_key),
            ttl: parse::<i64>(&get, "MARKER_TTL_DAYS")?
                .map(|days| {
                    TimeDelta::try_days(days)
                        .filter(|_| days >= 0)
                        .ok_or_else(|| ConfigError::Invalid {
                            key: "MARKER_TTL_DAYS",
                            value: days.to_string(),
                        })
                })
                .transpose()?
                .unwrap_or(defaults.ttl),
            concurrency: parse::<usize>(&get, "MARKER_CONCURRENCY")?
                .unwrap_or(defaults.concurrency)
                .max(1),
            debounce: parse::<u64>(&get, "MARKER_DEBOUNCE_MS")?
                .map(Duration::from_millis)
                .unwrap_or(defaults.debounce),
            hide_applied: parse_flag(&get, "MARKER_HIDE_APPLIED")?.unwrap_or(defaults.hide_applied),
            ephemeral_store: parse_flag(&get, "MARKER_EPHEMERAL_STORE")?
                .unwrap_or(defaults.ephemeral_store),
        };

        let page = PageConfig {
            snapshot_path,
            base_url: get("PAGE_BASE_URL")
                .unwrap_or_else(|| "https://www.wanted.co.kr/wdlist".to_string()),
            poll_interval: Duration::from_millis(
                parse::<u64>(&get, "SNAPSHOT_POLL_MS")?.unwrap_or(1_000).max(50),
            ),
            report_filename: get("REPORT_FILENAME").unwrap_or_else(|| "marked.html".to_string()),
            run_once: parse_flag(&get, "RUN_ONCE")?.unwrap_or(false),
        };

        let directories = DirectoryConfig {
            logs_dir: get("LOGS_DIR").unwrap_or_else(|| "logs".to_string()),
            data_dir: get("DATA_DIR").unwrap_or_else(|| "data".to_string()),
            db_filename: get("DB_FILENAME").unwrap_or_else(|| "marker.db".to_string()),
        };

        let logging = LoggingConfig {
            level: get("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
        };

        let timezone = get("MARKER_TIMEZONE").unwrap_or_else(|| "Asia/Seoul".to_string());

        Ok(Self {
            api,
            marker,
            page,
            directories,
            logging,
            timezone,
        })
    }
}

fn parse<T: FromStr>(
    get: &impl Fn(&str) -> Option<String>,
    key: &'static str,
) -> Result<Option<T>, ConfigError> {
    get(key)
        .map(|value| {
            value
                .parse::<T>()
                .map_err(|_| ConfigError::Invalid { key, value })
        })
        .transpose()
}

fn parse_flag(
    get: &impl Fn(&str) -> Option<String>,
    key: &'static str,
) -> Result<Option<bool>, ConfigError> {
    get(key)
        .map(|value| match value.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::Invalid { key, value }),
        })
        .transpose()
}
