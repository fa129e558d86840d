// Runtime configuration.
// Read from environment variables, with defaults for everything but the token.

use std::env;
use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use chrono::FixedOffset;
use tracing::info;

use crate::cache::paths::cache_dir;
use crate::error::{PulseError, Result};

const DEFAULT_REDIS_URL: &str = "redis://127.0.0.1:6379";

/// Which cache backend to use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheBackend {
    Memory,
    Disk(PathBuf),
    /// Connection URL of a shared Redis server.
    Redis(String),
    Disabled,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub github_token: String,
    /// Override for the GitHub REST API root, e.g. a GitHub Enterprise host.
    pub github_api_url: Option<String>,
    pub repos_file: PathBuf,
    pub port: u16,
    pub cache: CacheBackend,
    pub cache_ttl: Duration,
    pub refresh_interval: Duration,
    /// Offset used for peak hours and the end-of-day notice.
    pub utc_offset: FixedOffset,
    pub peak_start_hour: u32,
    pub peak_end_hour: u32,
    pub request_timeout: Duration,
    pub report_window_days: u32,
    pub activity_window_days: u32,
    pub notify_webhook_url: Option<String>,
}

impl Config {
    /// Load from the process environment.
    pub fn load() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load through `lookup`, which returns the raw value of a variable if set.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let github_token = lookup("GITHUB_TOKEN")
            .filter(|token| !token.trim().is_empty())
            .ok_or(PulseError::MissingToken)?;

        let cache = match lookup("REPOPULSE_CACHE").as_deref().unwrap_or("memory") {
            "memory" => CacheBackend::Memory,
            "off" | "none" => CacheBackend::Disabled,
            "disk" => {
                let dir = lookup("REPOPULSE_CACHE_DIR")
                    .map(PathBuf::from)
                    .or_else(cache_dir)
                    .ok_or_else(|| {
                        PulseError::Configuration(
                            "no cache directory available, set REPOPULSE_CACHE_DIR".to_string(),
                        )
                    })?;
                CacheBackend::Disk(dir)
            }
            "redis" => CacheBackend::Redis(
                lookup("REPOPULSE_REDIS_URL")
                    .filter(|url| !url.trim().is_empty())
                    .unwrap_or_else(|| DEFAULT_REDIS_URL.to_string()),
            ),
            other => {
                return Err(PulseError::Configuration(format!(
                    "REPOPULSE_CACHE must be memory, disk, redis or off, got {}",
                    other
                )));
            }
        };

        let config = Self {
            github_token,
            github_api_url: lookup("REPOPULSE_GITHUB_API_URL")
                .map(|url| url.trim().trim_end_matches('/').to_string())
                .filter(|url| !url.is_empty()),
            repos_file: PathBuf::from(
                lookup("REPOPULSE_REPOS_FILE").unwrap_or_else(|| "repoUrls.json".to_string()),
            ),
            port: parse_or(&lookup, "REPOPULSE_PORT", 5000)?,
            cache,
            cache_ttl: Duration::from_secs(parse_or(&lookup, "REPOPULSE_CACHE_TTL_SECS", 900)?),
            refresh_interval: Duration::from_secs(parse_or(
                &lookup,
                "REPOPULSE_REFRESH_INTERVAL_SECS",
                900,
            )?),
            utc_offset: parse_or(
                &lookup,
                "REPOPULSE_UTC_OFFSET",
                FixedOffset::east_opt(5 * 3600 + 30 * 60).ok_or_else(|| {
                    PulseError::Configuration("invalid default offset".to_string())
                })?,
            )?,
            peak_start_hour: parse_hour(&lookup, "REPOPULSE_PEAK_START_HOUR", 16)?,
            peak_end_hour: parse_hour(&lookup, "REPOPULSE_PEAK_END_HOUR", 1)?,
            request_timeout: Duration::from_secs(parse_or(
                &lookup,
                "REPOPULSE_REQUEST_TIMEOUT_SECS",
                60,
            )?),
            report_window_days: parse_or(&lookup, "REPOPULSE_REPORT_WINDOW_DAYS", 30)?,
            activity_window_days: parse_or(&lookup, "REPOPULSE_ACTIVITY_WINDOW_DAYS", 7)?,
            notify_webhook_url: lookup("REPOPULSE_NOTIFY_WEBHOOK_URL")
                .filter(|url| !url.trim().is_empty()),
        };

        if config.refresh_interval.is_zero() {
            return Err(PulseError::Configuration(
                "REPOPULSE_REFRESH_INTERVAL_SECS must be positive".to_string(),
            ));
        }

        Ok(config)
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr + Display,
    T::Err: Display,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().map_err(|e| {
            PulseError::Configuration(format!("invalid {} value {:?}: {}", key, raw, e))
        }),
        None => {
            info!("{} not set, using default: {}", key, default);
            Ok(default)
        }
    }
}

fn parse_hour<F>(lookup: &F, key: &str, default: u32) -> Result<u32>
where
    F: Fn(&str) -> Option<String>,
{
    let hour = parse_or(lookup, key, default)?;
    if hour > 23 {
        return Err(PulseError::Configuration(format!(
            "{} must be between 0 and 23, got {}",
            key, hour
        )));
    }
    Ok(hour)
}
