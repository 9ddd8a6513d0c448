//! The cache controller
//!
//! One `ServiceWorker` per deployment generation. It owns the static and
//! dynamic partitions of its version, walks the install → activate
//! lifecycle, and answers every intercepted request with a network, cached
//! or synthesized response.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use futures::future::join_all;
use reqwest::Url;
use serde::Serialize;
use tokio::task::JoinHandle;

use super::clients::ClientRegistry;
use super::notify::{self, ClickOutcome, Notification, NotificationClick, PushEvent};
use super::registration::fingerprint;
use super::request::{InterceptedRequest, RequestCategory};
use super::response::{self, CachedResponse};
use crate::cache::{CacheStore, RequestKey, StoredEntry};
use crate::config::Config;
use crate::error::{CacheError, Error, InstallError, NetworkError, Result};
use crate::net::Network;

/// Lifecycle of a worker generation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum WorkerState {
    Uninitialized,
    Installing,
    WaitingToActivate,
    Active,
    /// Superseded or failed to install; never serves again
    Terminated,
}

/// Where a served response came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseSource {
    Network,
    Cache,
    Offline,
}

/// Response handed back to the page
#[derive(Debug, Clone)]
pub struct Served {
    pub response: CachedResponse,
    pub source: ResponseSource,
    /// `None` when the request was not intercepted
    pub category: Option<RequestCategory>,
}

/// Messages a page can post to the worker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientMessage {
    SkipWaiting,
    GetVersion,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageReply {
    Ack,
    Version(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct InstallReport {
    pub version: String,
    pub partition: String,
    pub assets: usize,
    pub pruned: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ActivateReport {
    pub version: String,
    pub removed: Vec<String>,
    pub claimed: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SweepReport {
    pub scanned: usize,
    pub removed: usize,
}

/// Events delivered by the host runtime
#[derive(Debug, Clone)]
pub enum Event {
    Install,
    Activate,
    Fetch(InterceptedRequest),
    Message(ClientMessage),
    Push(PushEvent),
    NotificationClick(NotificationClick),
    Sweep,
}

/// Result of dispatching an event
#[derive(Debug, Clone)]
pub enum EventOutcome {
    Installed(InstallReport),
    Activated(ActivateReport),
    Response(Served),
    Reply(MessageReply),
    Notification(Notification),
    Click(ClickOutcome),
    Swept(SweepReport),
}

/// Cache controller for one version
pub struct ServiceWorker {
    config: Arc<Config>,
    origin: Url,
    store: Arc<dyn CacheStore>,
    network: Arc<dyn Network>,
    clients: Arc<ClientRegistry>,
    state: Mutex<WorkerState>,
    skip_waiting: AtomicBool,
    pending: Mutex<Vec<JoinHandle<()>>>,
}

impl ServiceWorker {
    /// Create a fresh, not yet installed worker
    pub fn new(
        config: Arc<Config>,
        store: Arc<dyn CacheStore>,
        network: Arc<dyn Network>,
        clients: Arc<ClientRegistry>,
    ) -> Result<Self> {
        let origin = config.origin_url()?;
        Ok(Self {
            config,
            origin,
            store,
            network,
            clients,
            state: Mutex::new(WorkerState::Uninitialized),
            skip_waiting: AtomicBool::new(false),
            pending: Mutex::new(Vec::new()),
        })
    }

    /// Bring back an already active worker after its context was torn down.
    ///
    /// Only the durable partitions survived; in-memory state starts over.
    pub fn restore(
        config: Arc<Config>,
        store: Arc<dyn CacheStore>,
        network: Arc<dyn Network>,
        clients: Arc<ClientRegistry>,
    ) -> Result<Self> {
        let worker = Self::new(config, store, network, clients)?;
        worker.set_state(WorkerState::Active);
        Ok(worker)
    }

    pub fn version(&self) -> &str {
        &self.config.version
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn state(&self) -> WorkerState {
        self.state
            .lock()
            .map(|s| *s)
            .unwrap_or(WorkerState::Terminated)
    }

    fn set_state(&self, next: WorkerState) {
        if let Ok(mut state) = self.state.lock() {
            log::debug!("{}: {:?} -> {:?}", self.config.version, *state, next);
            *state = next;
        }
    }

    /// Move `from` → `to` atomically, failing if the worker is elsewhere
    fn transition(&self, from: WorkerState, to: WorkerState) -> std::result::Result<(), WorkerState> {
        let mut state = self.state.lock().map_err(|_| WorkerState::Terminated)?;
        if *state != from {
            return Err(*state);
        }
        log::debug!("{}: {:?} -> {:?}", self.config.version, from, to);
        *state = to;
        Ok(())
    }

    /// Ask to be activated without waiting for pages to close
    pub fn skip_waiting(&self) {
        self.skip_waiting.store(true, Ordering::SeqCst);
    }

    pub fn wants_skip_waiting(&self) -> bool {
        self.skip_waiting.load(Ordering::SeqCst)
    }

    /// Retire this worker; it stops intercepting requests
    pub fn terminate(&self) {
        self.set_state(WorkerState::Terminated);
    }

    /// Single entry point for host events
    pub async fn dispatch(&self, event: Event) -> Result<EventOutcome> {
        match event {
            Event::Install => Ok(EventOutcome::Installed(self.install().await?)),
            Event::Activate => Ok(EventOutcome::Activated(self.activate().await?)),
            Event::Fetch(request) => Ok(EventOutcome::Response(self.fetch(request).await?)),
            Event::Message(message) => Ok(EventOutcome::Reply(self.handle_message(message))),
            Event::Push(push) => Ok(EventOutcome::Notification(self.push(&push))),
            Event::NotificationClick(click) => Ok(EventOutcome::Click(
                self.notification_click(&click).await,
            )),
            Event::Sweep => Ok(EventOutcome::Swept(self.sweep().await?)),
        }
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Pre-fetch the manifest into the static partition.
    ///
    /// Nothing is written unless every asset fetched successfully. On
    /// failure the worker is terminated and never activates.
    pub async fn install(&self) -> std::result::Result<InstallReport, InstallError> {
        self.transition(WorkerState::Uninitialized, WorkerState::Installing)
            .map_err(|_| InstallError::InvalidState(self.config.version.clone()))?;

        log::info!("Installing cache version {}", self.config.version);

        match self.precache().await {
            Ok(report) => {
                self.set_state(WorkerState::WaitingToActivate);
                if self.config.eager_takeover {
                    self.skip_waiting();
                }
                log::info!(
                    "Installed {} assets into {}",
                    report.assets,
                    report.partition
                );
                Ok(report)
            }
            Err(e) => {
                log::warn!("Install of {} failed: {}", self.config.version, e);
                self.set_state(WorkerState::Terminated);
                Err(e)
            }
        }
    }

    async fn precache(&self) -> std::result::Result<InstallReport, InstallError> {
        let partition = self.config.static_partition();

        let mut requests = Vec::with_capacity(self.config.manifest.len());
        for entry in &self.config.manifest {
            let url = self
                .origin
                .join(entry)
                .map_err(|e| InstallError::AssetFailed {
                    url: entry.clone(),
                    reason: e.to_string(),
                })?;
            requests.push(InterceptedRequest::get(url));
        }

        let results = join_all(requests.iter().map(|r| self.network.fetch(r))).await;

        let mut fetched = Vec::with_capacity(requests.len());
        for (request, result) in requests.iter().zip(results) {
            match result {
                Ok(resp) if resp.is_success() => fetched.push((request.key(), resp)),
                Ok(resp) => {
                    return Err(InstallError::AssetStatus {
                        url: request.url.to_string(),
                        status: resp.status,
                    });
                }
                Err(e) => {
                    return Err(InstallError::AssetFailed {
                        url: request.url.to_string(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        self.store.open(&partition).await?;
        for (key, resp) in &fetched {
            self.store.put(&partition, key, resp).await?;
        }

        // Drop anything a previous manifest for this version left behind
        let wanted: Vec<RequestKey> = fetched.iter().map(|(k, _)| k.clone()).collect();
        let mut pruned = 0;
        for key in self.store.keys(&partition).await? {
            if !wanted.contains(&key) && self.store.delete(&partition, &key).await? {
                pruned += 1;
            }
        }

        let assets = self.store.keys(&partition).await?.len();
        Ok(InstallReport {
            version: self.config.version.clone(),
            partition,
            assets,
            pruned,
        })
    }

    /// Promote this version: delete every foreign partition and claim open pages.
    ///
    /// If storage fails part way the worker goes back to waiting, so the
    /// activation can be retried.
    pub async fn activate(&self) -> Result<ActivateReport> {
        self.transition(WorkerState::WaitingToActivate, WorkerState::Active)
            .map_err(|state| {
                Error::Lifecycle(format!(
                    "cannot activate {} from {:?}",
                    self.config.version, state
                ))
            })?;

        let removed = match self.take_over_partitions().await {
            Ok(removed) => removed,
            Err(e) => {
                log::warn!("Activation of {} failed: {}", self.config.version, e);
                self.set_state(WorkerState::WaitingToActivate);
                return Err(e.into());
            }
        };

        let claimed = self.clients.claim(&self.config.version).await;
        log::info!(
            "Activated {} (claimed {} clients)",
            self.config.version,
            claimed
        );

        Ok(ActivateReport {
            version: self.config.version.clone(),
            removed,
            claimed,
        })
    }

    async fn take_over_partitions(&self) -> std::result::Result<Vec<String>, CacheError> {
        let keep = [
            self.config.static_partition(),
            self.config.dynamic_partition(),
        ];

        let mut removed = Vec::new();
        for name in self.store.partitions().await? {
            if !keep.contains(&name) && self.store.delete_partition(&name).await? {
                log::info!("Deleted stale partition {}", name);
                removed.push(name);
            }
        }
        self.store.open(&keep[1]).await?;

        // Marks this definition as the one in control across restarts
        self.store
            .set_fingerprint(&keep[0], &fingerprint(&self.config))
            .await?;

        Ok(removed)
    }

    // ------------------------------------------------------------------
    // Fetch interception
    // ------------------------------------------------------------------

    /// Resolve a request from network, cache or a synthesized response.
    ///
    /// Only a static resource with no cached copy and no network returns
    /// `Err`; every other path resolves to a response.
    pub async fn fetch(&self, request: InterceptedRequest) -> std::result::Result<Served, NetworkError> {
        if self.state() != WorkerState::Active || !request.is_get() {
            return self.passthrough(&request).await;
        }

        let category = request.category(&self.config.api);
        log::debug!("{} {} -> {:?}", request.method, request.url, category);

        match category {
            RequestCategory::Navigation => Ok(self.handle_navigation(&request).await),
            RequestCategory::Api => Ok(self.handle_api(&request).await),
            RequestCategory::Static => self.handle_static(&request).await,
        }
    }

    async fn passthrough(&self, request: &InterceptedRequest) -> std::result::Result<Served, NetworkError> {
        let response = self.network.fetch(request).await?;
        Ok(Served {
            response,
            source: ResponseSource::Network,
            category: None,
        })
    }

    /// Network-first; exact cache match, then the cached root document
    async fn handle_navigation(&self, request: &InterceptedRequest) -> Served {
        let key = request.key();

        match self.network.fetch(request).await {
            Ok(resp) => {
                let response = if resp.is_success() {
                    let (page, copy) = resp.tee();
                    self.store_in_background(self.config.dynamic_partition(), key, copy);
                    page
                } else {
                    resp
                };
                return Served {
                    response,
                    source: ResponseSource::Network,
                    category: Some(RequestCategory::Navigation),
                };
            }
            Err(e) => log::debug!("Navigation to {} failed: {}", request.url, e),
        }

        if let Some(entry) = self.lookup(&key).await {
            return cached(entry, RequestCategory::Navigation);
        }

        if let Some(entry) = self.root_document().await {
            log::debug!("Serving cached root document for {}", request.url);
            return cached(entry, RequestCategory::Navigation);
        }

        Served {
            response: response::offline_page_response(&self.config.offline),
            source: ResponseSource::Offline,
            category: Some(RequestCategory::Navigation),
        }
    }

    /// Network-first; cached copy, then the JSON offline payload
    async fn handle_api(&self, request: &InterceptedRequest) -> Served {
        let key = request.key();

        match self.network.fetch(request).await {
            Ok(resp) if resp.is_success() => {
                let (response, copy) = resp.tee();
                self.put_logged(&self.config.dynamic_partition(), &key, &copy)
                    .await;
                return Served {
                    response,
                    source: ResponseSource::Network,
                    category: Some(RequestCategory::Api),
                };
            }
            Ok(resp) => log::debug!("API {} returned {}", request.url, resp.status),
            Err(e) => log::debug!("API {} failed: {}", request.url, e),
        }

        if let Some(entry) = self.lookup(&key).await {
            return cached(entry, RequestCategory::Api);
        }

        Served {
            response: response::offline_api_response(&self.config.offline),
            source: ResponseSource::Offline,
            category: Some(RequestCategory::Api),
        }
    }

    /// Cache-first; the network is only touched on a miss
    async fn handle_static(&self, request: &InterceptedRequest) -> std::result::Result<Served, NetworkError> {
        let key = request.key();

        if let Some(entry) = self.lookup(&key).await {
            return Ok(cached(entry, RequestCategory::Static));
        }

        let resp = self.network.fetch(request).await?;
        let response = if resp.is_success() {
            let (response, copy) = resp.tee();
            self.put_logged(&self.config.dynamic_partition(), &key, &copy)
                .await;
            response
        } else {
            resp
        };

        Ok(Served {
            response,
            source: ResponseSource::Network,
            category: Some(RequestCategory::Static),
        })
    }

    /// Cache lookup across partitions; storage errors count as a miss
    async fn lookup(&self, key: &RequestKey) -> Option<StoredEntry> {
        match self.store.match_any(key).await {
            Ok(Some(entry)) => {
                log::debug!("Cache hit: {}", key);
                Some(entry)
            }
            Ok(None) => {
                log::debug!("Cache miss: {}", key);
                None
            }
            Err(e) => {
                log::warn!("Cache lookup for {} failed: {}", key, e);
                None
            }
        }
    }

    async fn root_document(&self) -> Option<StoredEntry> {
        let root = self.origin.join("/").ok()?;
        let key = RequestKey::get(root.as_str());
        match self.store.get(&self.config.static_partition(), &key).await {
            Ok(entry) => entry,
            Err(e) => {
                log::warn!("Root document lookup failed: {}", e);
                None
            }
        }
    }

    async fn put_logged(&self, partition: &str, key: &RequestKey, response: &CachedResponse) {
        if let Err(e) = self.store.put(partition, key, response).await {
            log::warn!("Failed to cache {}: {}", key, e);
        }
    }

    /// Write without delaying the response
    fn store_in_background(&self, partition: String, key: RequestKey, response: CachedResponse) {
        let store = Arc::clone(&self.store);
        let handle = tokio::spawn(async move {
            if let Err(e) = store.put(&partition, &key, &response).await {
                log::warn!("Failed to cache {}: {}", key, e);
            }
        });

        if let Ok(mut pending) = self.pending.lock() {
            pending.retain(|h| !h.is_finished());
            pending.push(handle);
        }
    }

    /// Wait for background cache writes to land
    pub async fn wait_until_idle(&self) {
        let handles = self
            .pending
            .lock()
            .map(|mut pending| std::mem::take(&mut *pending))
            .unwrap_or_default();

        for handle in handles {
            if let Err(e) = handle.await {
                log::warn!("Background cache write aborted: {}", e);
            }
        }
    }

    // ------------------------------------------------------------------
    // Retention sweep
    // ------------------------------------------------------------------

    pub async fn sweep(&self) -> std::result::Result<SweepReport, CacheError> {
        self.sweep_at(Utc::now()).await
    }

    /// Delete dynamic entries older than the retention window as of `now`.
    ///
    /// Age comes from the response `Date` header, or the local store time
    /// when the header is missing.
    pub async fn sweep_at(&self, now: DateTime<Utc>) -> std::result::Result<SweepReport, CacheError> {
        let partition = self.config.dynamic_partition();
        let retention = self.config.retention();
        let mut report = SweepReport::default();

        for key in self.store.keys(&partition).await? {
            // Entry may have been replaced or removed since keys() returned
            let Some(entry) = self.store.get(&partition, &key).await? else {
                continue;
            };
            report.scanned += 1;

            let born = entry.response.date().unwrap_or(entry.stored_at);
            if now.signed_duration_since(born) > retention
                && self.store.delete(&partition, &key).await?
            {
                log::debug!("Swept {}", key);
                report.removed += 1;
            }
        }

        log::info!(
            "Sweep of {}: {} scanned, {} removed",
            partition,
            report.scanned,
            report.removed
        );
        Ok(report)
    }

    // ------------------------------------------------------------------
    // Messages and notifications
    // ------------------------------------------------------------------

    /// Answered from memory; never touches network or cache
    pub fn handle_message(&self, message: ClientMessage) -> MessageReply {
        match message {
            ClientMessage::SkipWaiting => {
                self.skip_waiting();
                MessageReply::Ack
            }
            ClientMessage::GetVersion => MessageReply::Version(self.config.version.clone()),
        }
    }

    pub fn push(&self, event: &PushEvent) -> Notification {
        notify::build_notification(event, &self.config.notification)
    }

    pub async fn notification_click(&self, click: &NotificationClick) -> ClickOutcome {
        notify::handle_click(
            click,
            &self.clients,
            &self.origin,
            Some(self.config.version.as_str()),
        )
        .await
    }
}

fn cached(entry: StoredEntry, category: RequestCategory) -> Served {
    Served {
        response: entry.response,
        source: ResponseSource::Cache,
        category: Some(category),
    }
}
