// Error types for repopulse.
// Covers upstream GitHub failures, configuration, cache backends and request timeouts.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PulseError {
    #[error("GitHub API error: {0}")]
    Api(#[from] reqwest::Error),

    #[error("Authentication failed: invalid or expired token")]
    Unauthorized,

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Rate limit exceeded, resets at {reset_at}")]
    RateLimited { reset_at: String },

    #[error("Upstream returned HTTP {status} for {url}")]
    Upstream { status: u16, url: String },

    #[error("Upstream did not answer in time")]
    UpstreamTimeout,

    #[error("Missing GITHUB_TOKEN environment variable")]
    MissingToken,

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Cache unavailable: {0}")]
    CacheUnavailable(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("No repository data found")]
    NoData,

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, PulseError>;
