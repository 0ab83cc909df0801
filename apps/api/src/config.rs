use std::time::Duration;

use anyhow::{Context, Result};

/// Application configuration loaded from environment variables.
///
/// Backend credentials are soft requirements: when absent the service still
/// starts, but every backend call fails with a configuration error and the
/// dashboard sits in its error state until the process is restarted with them.
#[derive(Debug, Clone)]
pub struct Config {
    pub backend: Option<BackendSettings>,
    pub storage: Option<StorageSettings>,
    pub analytics: Option<AnalyticsSettings>,
    pub poll_interval: Duration,
    pub change_feed_capacity: usize,
    pub default_window_days: u32,
    pub flags: SiteFlags,
    pub port: u16,
    pub rust_log: String,
}

/// Hosted database + auth service.
#[derive(Debug, Clone)]
pub struct BackendSettings {
    pub base_url: String,
    pub api_key: String,
}

/// S3-compatible access to the backend's object storage.
#[derive(Debug, Clone)]
pub struct StorageSettings {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub region: String,
}

/// Hosted web-analytics property.
#[derive(Debug, Clone)]
pub struct AnalyticsSettings {
    pub endpoint: String,
    pub measurement_id: String,
    pub api_secret: String,
}

/// Feature flags served to the public site.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct SiteFlags {
    pub dark_mode_default: bool,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let backend = match (optional_env("BACKEND_URL"), optional_env("BACKEND_API_KEY")) {
            (Some(base_url), Some(api_key)) => Some(BackendSettings {
                base_url: base_url.trim_end_matches('/').to_string(),
                api_key,
            }),
            _ => None,
        };

        let storage = match (
            optional_env("STORAGE_ACCESS_KEY_ID"),
            optional_env("STORAGE_SECRET_ACCESS_KEY"),
        ) {
            (Some(access_key_id), Some(secret_access_key)) => Some(StorageSettings {
                access_key_id,
                secret_access_key,
                region: optional_env("STORAGE_REGION").unwrap_or_else(|| "us-east-1".to_string()),
            }),
            _ => None,
        };

        let analytics = match (
            optional_env("ANALYTICS_MEASUREMENT_ID"),
            optional_env("ANALYTICS_API_SECRET"),
        ) {
            (Some(measurement_id), Some(api_secret)) => Some(AnalyticsSettings {
                endpoint: optional_env("ANALYTICS_ENDPOINT")
                    .unwrap_or_else(|| "https://www.google-analytics.com".to_string()),
                measurement_id,
                api_secret,
            }),
            _ => None,
        };

        Ok(Config {
            backend,
            storage,
            analytics,
            poll_interval: Duration::from_secs(
                parse_env("POLL_INTERVAL_SECS", 30u64)
                    .context("POLL_INTERVAL_SECS must be a whole number of seconds")?,
            ),
            change_feed_capacity: parse_env("CHANGE_FEED_CAPACITY", 64usize)
                .context("CHANGE_FEED_CAPACITY must be a positive integer")?
                .max(1),
            default_window_days: parse_env("DEFAULT_WINDOW_DAYS", 7u32)
                .context("DEFAULT_WINDOW_DAYS must be a non-negative integer")?,
            flags: SiteFlags {
                dark_mode_default: parse_env("DARK_MODE_DEFAULT", false)
                    .context("DARK_MODE_DEFAULT must be true or false")?,
            },
            port: parse_env("PORT", 8080u16).context("PORT must be a valid port number")?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match optional_env(key) {
        Some(raw) => raw
            .parse::<T>()
            .with_context(|| format!("Invalid value '{raw}' for '{key}'")),
        None => Ok(default),
    }
}
