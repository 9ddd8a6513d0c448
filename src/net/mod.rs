//! Remote fetch capability
//!
//! The controller never talks to reqwest directly; it goes through the
//! `Network` trait so tests can script outcomes and count calls.

use async_trait::async_trait;

use crate::error::NetworkError;
use crate::worker::request::InterceptedRequest;
use crate::worker::response::CachedResponse;

pub mod http;
#[cfg(test)]
pub mod mock;

pub use http::HttpNetwork;
#[cfg(test)]
pub use mock::MockNetwork;

/// Network fetch trait
#[async_trait]
pub trait Network: Send + Sync {
    /// Perform the request and buffer the whole response.
    ///
    /// Any HTTP status is a successful fetch; only transport failures are errors.
    async fn fetch(&self, request: &InterceptedRequest) -> Result<CachedResponse, NetworkError>;
}
