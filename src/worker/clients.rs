//! Consumer pages controlled by a worker

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;

pub type ClientId = u64;

/// An open page under the worker's scope
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Client {
    pub id: ClientId,
    pub url: String,
    pub focused: bool,
    /// Version of the worker currently serving this page
    pub controller: Option<String>,
}

/// Registry of open pages, shared by every worker generation of a scope
#[derive(Debug, Default)]
pub struct ClientRegistry {
    clients: RwLock<Vec<Client>>,
    next_id: AtomicU64,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a newly opened page
    pub async fn connect(&self, url: impl Into<String>, controller: Option<String>) -> ClientId {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        self.clients.write().await.push(Client {
            id,
            url: url.into(),
            focused: false,
            controller,
        });
        id
    }

    #[cfg(test)]
    pub async fn list(&self) -> Vec<Client> {
        self.clients.read().await.clone()
    }

    #[cfg(test)]
    pub async fn get(&self, id: ClientId) -> Option<Client> {
        self.clients.read().await.iter().find(|c| c.id == id).cloned()
    }

    /// Put every open page under `version`. Returns how many changed hands.
    pub async fn claim(&self, version: &str) -> usize {
        let mut clients = self.clients.write().await;
        let mut claimed = 0;
        for client in clients.iter_mut() {
            if client.controller.as_deref() != Some(version) {
                client.controller = Some(version.to_string());
                claimed += 1;
            }
        }
        claimed
    }

    pub async fn find_by_url(&self, url: &str) -> Option<ClientId> {
        self.clients
            .read()
            .await
            .iter()
            .find(|c| c.url == url)
            .map(|c| c.id)
    }

    /// Focus one page, unfocusing the rest
    pub async fn focus(&self, id: ClientId) -> bool {
        let mut clients = self.clients.write().await;
        if !clients.iter().any(|c| c.id == id) {
            return false;
        }
        for client in clients.iter_mut() {
            client.focused = client.id == id;
        }
        true
    }

    /// Open a new focused page
    pub async fn open_window(&self, url: impl Into<String>, controller: Option<String>) -> ClientId {
        let id = self.connect(url, controller).await;
        self.focus(id).await;
        id
    }
}
