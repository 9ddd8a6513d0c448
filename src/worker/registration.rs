//! Worker registration for a scope
//!
//! Tracks the active and waiting worker generations and decides when a
//! newly installed version takes over. The fingerprint of the definition
//! in control is kept with its static partition, so a registration made
//! in a later process can tell whether anything changed.

use std::sync::Arc;

use sha2::{Digest, Sha256};
use tokio::sync::RwLock;

use super::clients::ClientRegistry;
use super::controller::{
    ActivateReport, ClientMessage, Event, EventOutcome, InstallReport, MessageReply,
    ResponseSource, Served, ServiceWorker,
};
use super::request::InterceptedRequest;
use crate::cache::CacheStore;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::net::Network;

/// What a call to [`Registration::register`] did
#[derive(Debug, Clone)]
pub enum RegisterOutcome {
    /// Same worker definition as the one already registered
    Unchanged { version: String },
    /// Installed and took control
    Activated {
        install: InstallReport,
        activate: ActivateReport,
    },
    /// Installed; waiting for the current worker to release control
    Waiting { install: InstallReport },
}

/// Identity of a worker definition; re-registering an identical one is a no-op
pub fn fingerprint(config: &Config) -> String {
    let mut hasher = Sha256::new();
    hasher.update(config.cache_prefix.as_bytes());
    hasher.update(b"|");
    hasher.update(config.version.as_bytes());
    for entry in &config.manifest {
        hasher.update(b"|");
        hasher.update(entry.as_bytes());
    }
    format!("{:x}", hasher.finalize())
}

fn unexpected(outcome: EventOutcome) -> Error {
    Error::Lifecycle(format!("unexpected event outcome: {:?}", outcome))
}

async fn install(worker: &ServiceWorker) -> Result<InstallReport> {
    match worker.dispatch(Event::Install).await? {
        EventOutcome::Installed(report) => Ok(report),
        other => Err(unexpected(other)),
    }
}

async fn activate(worker: &ServiceWorker) -> Result<ActivateReport> {
    match worker.dispatch(Event::Activate).await? {
        EventOutcome::Activated(report) => Ok(report),
        other => Err(unexpected(other)),
    }
}

async fn deliver(worker: &ServiceWorker, message: ClientMessage) -> Result<MessageReply> {
    match worker.dispatch(Event::Message(message)).await? {
        EventOutcome::Reply(reply) => Ok(reply),
        other => Err(unexpected(other)),
    }
}

pub struct Registration {
    store: Arc<dyn CacheStore>,
    network: Arc<dyn Network>,
    clients: Arc<ClientRegistry>,
    active: RwLock<Option<Arc<ServiceWorker>>>,
    waiting: RwLock<Option<Arc<ServiceWorker>>>,
}

impl Registration {
    pub fn new(
        store: Arc<dyn CacheStore>,
        network: Arc<dyn Network>,
        clients: Arc<ClientRegistry>,
    ) -> Self {
        Self {
            store,
            network,
            clients,
            active: RwLock::new(None),
            waiting: RwLock::new(None),
        }
    }

    /// Re-attach to a version that was activated by an earlier process.
    ///
    /// Returns `false` when that version never took control; the scope then
    /// stays uncontrolled until [`register`](Self::register) runs.
    pub async fn restore(&self, config: Arc<Config>) -> Result<bool> {
        if self
            .store
            .fingerprint(&config.static_partition())
            .await?
            .is_none()
        {
            log::debug!("Version {} was never activated", config.version);
            return Ok(false);
        }

        self.attach(config).await?;
        Ok(true)
    }

    async fn attach(&self, config: Arc<Config>) -> Result<()> {
        let worker = ServiceWorker::restore(
            config,
            Arc::clone(&self.store),
            Arc::clone(&self.network),
            Arc::clone(&self.clients),
        )?;
        *self.active.write().await = Some(Arc::new(worker));
        Ok(())
    }

    pub async fn active(&self) -> Option<Arc<ServiceWorker>> {
        self.active.read().await.clone()
    }

    pub async fn waiting(&self) -> Option<Arc<ServiceWorker>> {
        self.waiting.read().await.clone()
    }

    /// Install `config` as a new worker generation.
    ///
    /// A failed install leaves the current worker in control.
    pub async fn register(&self, config: Config) -> Result<RegisterOutcome> {
        let print = fingerprint(&config);

        if let Some(waiting) = self.waiting().await
            && fingerprint(waiting.config()) == print
        {
            log::debug!("Worker {} already waiting", config.version);
            return Ok(RegisterOutcome::Unchanged {
                version: config.version,
            });
        }

        let recorded = self.store.fingerprint(&config.static_partition()).await?;
        if recorded.as_deref() == Some(print.as_str()) {
            log::debug!("Worker {} already registered", config.version);
            let version = config.version.clone();
            if self.active().await.is_none() {
                self.attach(Arc::new(config)).await?;
            }
            return Ok(RegisterOutcome::Unchanged { version });
        }

        let worker = Arc::new(ServiceWorker::new(
            Arc::new(config),
            Arc::clone(&self.store),
            Arc::clone(&self.network),
            Arc::clone(&self.clients),
        )?);
        let install = install(&worker).await?;

        if let Some(replaced) = self.waiting.write().await.take() {
            log::debug!("Discarding waiting worker {}", replaced.version());
            replaced.terminate();
        }

        if worker.wants_skip_waiting() || self.active().await.is_none() {
            let activate = self.promote(worker).await?;
            Ok(RegisterOutcome::Activated { install, activate })
        } else {
            log::info!("Worker {} is waiting to activate", worker.version());
            *self.waiting.write().await = Some(worker);
            Ok(RegisterOutcome::Waiting { install })
        }
    }

    async fn promote(&self, worker: Arc<ServiceWorker>) -> Result<ActivateReport> {
        // Outgoing cache writes must land before activation deletes their partitions
        if let Some(previous) = self.active().await {
            previous.wait_until_idle().await;
        }

        let report = activate(&worker).await?;
        if let Some(previous) = self.active.write().await.replace(worker) {
            previous.terminate();
        }
        Ok(report)
    }

    /// Deliver a page message.
    ///
    /// `SkipWaiting` goes to the waiting worker and promotes it; `GetVersion`
    /// is answered by the active worker.
    pub async fn post_message(&self, message: ClientMessage) -> Result<MessageReply> {
        match message {
            ClientMessage::SkipWaiting => {
                let Some(waiting) = self.waiting.write().await.take() else {
                    return Ok(MessageReply::Ack);
                };
                let reply = deliver(&waiting, message).await?;
                if let Err(e) = self.promote(Arc::clone(&waiting)).await {
                    log::warn!("Worker {} stays waiting: {}", waiting.version(), e);
                    *self.waiting.write().await = Some(waiting);
                    return Err(e);
                }
                Ok(reply)
            }
            ClientMessage::GetVersion => {
                let active = self
                    .active()
                    .await
                    .ok_or_else(|| Error::Lifecycle("no active worker".to_string()))?;
                deliver(&active, message).await
            }
        }
    }

    /// Route a page request through the active worker, or straight to the
    /// network when the scope is uncontrolled.
    pub async fn fetch(&self, request: InterceptedRequest) -> Result<Served> {
        let Some(worker) = self.active().await else {
            let response = self.network.fetch(&request).await?;
            return Ok(Served {
                response,
                source: ResponseSource::Network,
                category: None,
            });
        };

        match worker.dispatch(Event::Fetch(request)).await? {
            EventOutcome::Response(served) => Ok(served),
            other => Err(unexpected(other)),
        }
    }
}
