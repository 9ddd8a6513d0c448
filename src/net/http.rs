//! reqwest-backed network implementation

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client as HttpClient;
use reqwest::header::ACCEPT;

use super::Network;
use crate::error::NetworkError;
use crate::worker::request::InterceptedRequest;
use crate::worker::response::CachedResponse;

/// Network access over HTTP(S)
pub struct HttpNetwork {
    http: HttpClient,
}

impl HttpNetwork {
    /// Create a new client with the given per-request timeout
    pub fn new(timeout: Duration) -> Result<Self, NetworkError> {
        let http = HttpClient::builder()
            .timeout(timeout)
            .user_agent(concat!("swcache/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| NetworkError::Other(e.to_string()))?;

        Ok(Self { http })
    }
}

#[async_trait]
impl Network for HttpNetwork {
    async fn fetch(&self, request: &InterceptedRequest) -> Result<CachedResponse, NetworkError> {
        let method = reqwest::Method::from_bytes(request.method.as_bytes())
            .map_err(|e| NetworkError::InvalidUrl(format!("{}: {}", request.method, e)))?;

        let mut builder = self.http.request(method, request.url.clone());
        if let Some(ref accept) = request.accept {
            builder = builder.header(ACCEPT, accept);
        }

        let response = builder.send().await.map_err(NetworkError::from)?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();

        // Buffer the body once so it can be duplicated later
        let body = response.bytes().await.map_err(NetworkError::from)?.to_vec();

        log::debug!("{} {} -> {}", request.method, request.url, status);

        Ok(CachedResponse {
            status,
            headers,
            body,
        })
    }
}
