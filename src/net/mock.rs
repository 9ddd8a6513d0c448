//! Mock network for testing
//!
//! Scripted per-path outcomes plus call tracking, so tests can assert
//! whether the network was touched at all.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use super::Network;
use crate::error::NetworkError;
use crate::worker::request::InterceptedRequest;
use crate::worker::response::CachedResponse;

/// Scripted outcome for a path
#[derive(Debug, Clone)]
enum Outcome {
    Respond(CachedResponse),
    Fail,
}

/// Mock network.
///
/// Paths without a scripted outcome fail as if the origin were unreachable.
///
/// # Example
/// ```ignore
/// let network = MockNetwork::new()
///     .with_response("/", CachedResponse::new(200).with_body("<html>"));
/// network.set_offline(true).await;
/// ```
#[derive(Default, Clone)]
pub struct MockNetwork {
    outcomes: Arc<Mutex<HashMap<String, Outcome>>>,
    offline: Arc<Mutex<bool>>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl MockNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Respond to `path` with `response`
    pub fn with_response(self, path: &str, response: CachedResponse) -> Self {
        self.outcomes
            .try_lock()
            .expect("mock not shared yet")
            .insert(path.to_string(), Outcome::Respond(response));
        self
    }

    /// Respond to `path` with a 200 and the given body
    pub fn with_ok(self, path: &str, body: &str) -> Self {
        self.with_response(path, CachedResponse::new(200).with_body(body.as_bytes().to_vec()))
    }

    /// Fail requests for `path` with a transport error
    pub fn with_failure(self, path: &str) -> Self {
        self.outcomes
            .try_lock()
            .expect("mock not shared yet")
            .insert(path.to_string(), Outcome::Fail);
        self
    }

    /// Replace the outcome for `path` after the mock is shared
    pub async fn set_response(&self, path: &str, response: CachedResponse) {
        self.outcomes
            .lock()
            .await
            .insert(path.to_string(), Outcome::Respond(response));
    }

    /// Fail every request regardless of scripted outcomes
    pub async fn set_offline(&self, offline: bool) {
        *self.offline.lock().await = offline;
    }

    /// Total number of fetches issued
    pub async fn call_count(&self) -> usize {
        self.calls.lock().await.len()
    }

    /// Number of fetches issued for `path`
    pub async fn calls_for(&self, path: &str) -> usize {
        self.calls.lock().await.iter().filter(|p| *p == path).count()
    }
}

#[async_trait]
impl Network for MockNetwork {
    async fn fetch(&self, request: &InterceptedRequest) -> Result<CachedResponse, NetworkError> {
        let path = request.url.path().to_string();
        self.calls.lock().await.push(path.clone());

        if *self.offline.lock().await {
            return Err(NetworkError::Connect(request.url.to_string()));
        }

        match self.outcomes.lock().await.get(&path) {
            Some(Outcome::Respond(response)) => Ok(response.clone()),
            Some(Outcome::Fail) | None => Err(NetworkError::Connect(request.url.to_string())),
        }
    }
}
