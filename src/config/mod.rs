//! Configuration management for swcache

use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{ConfigError, Result};

/// Controller configuration
///
/// Fixed for the lifetime of a running worker: the version and manifest
/// are set at deploy time and never change while it serves.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Origin the controlled pages are served from
    pub origin: String,

    /// Deployment generation (cache version tag)
    pub version: String,

    /// Prefix shared by all partition names
    pub cache_prefix: String,

    /// Assets pre-fetched into the static partition at install
    pub manifest: Vec<String>,

    /// API routing rules
    pub api: ApiRoutes,

    /// Activate as soon as install succeeds instead of waiting for pages to close
    pub eager_takeover: bool,

    /// Dynamic entries older than this are swept
    pub retention_hours: u64,

    /// Period of the background sweep
    pub sweep_interval_secs: u64,

    /// Per-request network timeout
    pub request_timeout_secs: u64,

    /// Strings used in the synthesized offline payload
    pub offline: OfflineText,

    /// Push notification presentation
    pub notification: NotificationText,
}

/// Paths routed through the API fallback policy
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiRoutes {
    /// Any path under this prefix is an API request
    pub prefix: String,

    /// Known endpoints outside the prefix
    pub paths: Vec<String>,
}

/// Localized offline payload text
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OfflineText {
    pub error: String,
    pub message: String,
}

/// Notification presentation text
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationText {
    pub title: String,
    pub default_body: String,
    pub icon: String,
    /// Page opened when a notification is clicked
    pub open_url: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            origin: "http://localhost:8000".to_string(),
            version: "v1.0.0".to_string(),
            cache_prefix: "kakeibo".to_string(),
            manifest: vec![
                "/".to_string(),
                "/static/manifest.json".to_string(),
                "/static/css/style.css".to_string(),
                "/static/js/app.js".to_string(),
                "/static/icons/icon-192x192.png".to_string(),
            ],
            api: ApiRoutes::default(),
            eager_takeover: true,
            retention_hours: 24,
            sweep_interval_secs: 60 * 60,
            request_timeout_secs: 30,
            offline: OfflineText::default(),
            notification: NotificationText::default(),
        }
    }
}

impl Default for ApiRoutes {
    fn default() -> Self {
        Self {
            prefix: "/api/".to_string(),
            paths: vec![
                "/health".to_string(),
                "/stats".to_string(),
                "/news".to_string(),
                "/suggestions".to_string(),
                "/external-apis/status".to_string(),
            ],
        }
    }
}

impl Default for OfflineText {
    fn default() -> Self {
        Self {
            error: "オフラインです".to_string(),
            message: "インターネット接続を確認してから、もう一度お試しください。".to_string(),
        }
    }
}

impl Default for NotificationText {
    fn default() -> Self {
        Self {
            title: "家計簿アシスタント".to_string(),
            default_body: "新しいお知らせがあります".to_string(),
            icon: "/static/icons/icon-192x192.png".to_string(),
            open_url: "/".to_string(),
        }
    }
}

impl Config {
    /// Get the default config file path
    pub fn default_path() -> Result<PathBuf> {
        let home = dirs::home_dir().ok_or(ConfigError::Invalid(
            "Could not determine home directory".to_string(),
        ))?;

        Ok(home.join(".swcache").join("config.yaml"))
    }

    /// Load configuration from an explicit path, or the default location.
    ///
    /// A missing default file yields defaults; a missing explicit file is an error.
    pub fn load_at(path: Option<&str>) -> Result<Self> {
        match path {
            Some(p) => Self::load_from(PathBuf::from(p)),
            None => {
                let path = Self::default_path()?;
                if path.exists() {
                    Self::load_from(path)
                } else {
                    log::debug!("No config at {}, using defaults", path.display());
                    Ok(Self::default())
                }
            }
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: PathBuf) -> Result<Self> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.display().to_string()).into());
        }

        let contents = std::fs::read_to_string(&path)?;
        let config: Config = serde_yaml::from_str(&contents).map_err(ConfigError::from)?;
        config.validate()?;

        Ok(config)
    }

    /// Check field-level constraints
    pub fn validate(&self) -> Result<()> {
        if self.version.trim().is_empty() {
            return Err(ConfigError::Invalid("version must not be empty".to_string()).into());
        }
        if self.cache_prefix.trim().is_empty() {
            return Err(ConfigError::Invalid("cache_prefix must not be empty".to_string()).into());
        }
        self.origin_url()?;
        for entry in &self.manifest {
            if !entry.starts_with('/') && Url::parse(entry).is_err() {
                return Err(ConfigError::Invalid(format!(
                    "manifest entry '{}' is neither a path nor an absolute URL",
                    entry
                ))
                .into());
            }
        }
        if self.retention_hours == 0 || self.sweep_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "retention_hours and sweep_interval_secs must be positive".to_string(),
            )
            .into());
        }
        Ok(())
    }

    /// Parsed origin URL
    pub fn origin_url(&self) -> Result<Url> {
        Url::parse(&self.origin)
            .map_err(|e| ConfigError::Invalid(format!("origin '{}': {}", self.origin, e)).into())
    }

    /// Resolve a path or absolute URL against the origin
    pub fn resolve(&self, target: &str) -> Result<Url> {
        let origin = self.origin_url()?;
        origin
            .join(target)
            .map_err(|e| ConfigError::Invalid(format!("'{}': {}", target, e)).into())
    }

    /// Name of the static partition for the configured version
    pub fn static_partition(&self) -> String {
        format!("{}-static-{}", self.cache_prefix, self.version)
    }

    /// Name of the dynamic partition for the configured version
    pub fn dynamic_partition(&self) -> String {
        format!("{}-dynamic-{}", self.cache_prefix, self.version)
    }

    pub fn retention(&self) -> chrono::Duration {
        chrono::Duration::hours(self.retention_hours as i64)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
