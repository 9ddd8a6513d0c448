//! Error types for swcache

use thiserror::Error;

/// Result type alias for swcache operations
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type for the application
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Network(#[from] NetworkError),

    #[error(transparent)]
    Install(#[from] InstallError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Worker lifecycle: {0}")]
    Lifecycle(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Operation failed: {0}")]
    Other(String),
}

/// Cache partition storage errors
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Cache database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Cache I/O error: {0}")]
    Io(String),

    #[error("Could not determine cache directory")]
    NoHome,

    #[error("Corrupt cache entry: {0}")]
    Corrupt(String),
}

/// Transport-level failures talking to the origin.
///
/// These are expected while offline and are always routed into a fallback
/// branch, except for static resources with nothing cached.
#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("Failed to connect to {0}")]
    Connect(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Invalid request URL: {0}")]
    InvalidUrl(String),

    #[error("Network error: {0}")]
    Other(String),
}

impl From<reqwest::Error> for NetworkError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            NetworkError::Timeout
        } else if err.is_connect() {
            let target = err
                .url()
                .map(|u| u.to_string())
                .unwrap_or_else(|| "origin".to_string());
            NetworkError::Connect(target)
        } else {
            NetworkError::Other(err.to_string())
        }
    }
}

/// Install phase failures. The new version never becomes eligible for
/// activation; the previous version keeps serving.
#[derive(Debug, Error)]
pub enum InstallError {
    #[error("Failed to fetch required asset {url}: {reason}")]
    AssetFailed { url: String, reason: String },

    #[error("Required asset {url} returned HTTP {status}")]
    AssetStatus { url: String, status: u16 },

    #[error("Failed to store installed assets: {0}")]
    Storage(#[from] CacheError),

    #[error("Worker for {0} cannot be installed from its current state")]
    InvalidState(String),
}

/// Configuration-related errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    NotFound(String),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(err: serde_yaml::Error) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}
