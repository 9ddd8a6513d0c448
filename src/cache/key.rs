//! Request identity and its storage digest

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Identity of a cached request: method plus absolute URL.
///
/// Only GET requests are ever stored, but the method stays part of the
/// identity so a stray HEAD never aliases a GET entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestKey {
    pub method: String,
    pub url: String,
}

impl RequestKey {
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            method: method.into().to_ascii_uppercase(),
            url: url.into(),
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new("GET", url)
    }

    /// Stable storage key for this request
    pub fn digest(&self) -> String {
        cache_key(&self.method, &self.url)
    }
}

impl fmt::Display for RequestKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.url)
    }
}

/// Generate a deterministic cache key from method and URL.
///
/// The key is a hex SHA-256 of `METHOD|URL`.
pub fn cache_key(method: &str, url: &str) -> String {
    let mut hasher = Sha256::new();

    hasher.update(method.to_ascii_uppercase().as_bytes());
    hasher.update(b"|");
    hasher.update(url.as_bytes());

    format!("{:x}", hasher.finalize())
}
