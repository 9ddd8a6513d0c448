//! Command execution context
//!
//! Loads configuration, opens the durable cache and wires the worker
//! registration so handlers only deal with their own command.

use std::path::PathBuf;
use std::sync::Arc;

use crate::cache::CacheStorage;
use crate::cli::{GlobalOptions, OutputFormat};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::net::HttpNetwork;
use crate::worker::{ClientRegistry, Registration, ServiceWorker};

/// Context for command execution.
pub struct CommandContext {
    /// Loaded configuration with CLI/env overrides applied
    pub config: Arc<Config>,
    /// Worker registration for the configured origin
    pub registration: Registration,
    /// Output format preference
    pub format: OutputFormat,
}

impl CommandContext {
    /// Build the context with no worker in control yet.
    ///
    /// # Errors
    /// Returns error if the config is invalid or the cache cannot be opened.
    pub fn new(opts: &GlobalOptions) -> Result<Self> {
        let config = Arc::new(load_config(opts)?);
        let storage = Arc::new(open_storage(opts)?);
        let network = Arc::new(HttpNetwork::new(config.request_timeout())?);

        let registration = Registration::new(
            storage,
            network,
            Arc::new(ClientRegistry::new()),
        );

        Ok(Self {
            config,
            registration,
            format: opts.format,
        })
    }

    /// Build the context and re-attach to the installed version, if any
    pub async fn controlled(opts: &GlobalOptions) -> Result<Self> {
        let ctx = Self::new(opts)?;
        if ctx.registration.restore(Arc::clone(&ctx.config)).await? {
            log::debug!("Restored active worker {}", ctx.config.version);
        }
        Ok(ctx)
    }

    /// Active worker, or an error telling the user to register first
    pub async fn active_worker(&self) -> Result<Arc<ServiceWorker>> {
        self.registration.active().await.ok_or_else(|| {
            Error::Lifecycle(format!(
                "version {} is not installed; run `swcache register` first",
                self.config.version
            ))
        })
    }
}

/// Load the config file and apply CLI/env overrides
pub fn load_config(opts: &GlobalOptions) -> Result<Config> {
    let mut config = Config::load_at(opts.config_ref())?;

    if let Some(origin) = &opts.origin {
        config.origin = origin.clone();
    }
    if let Some(version) = &opts.cache_version {
        config.version = version.clone();
    }

    config.validate()?;
    Ok(config)
}

/// Directory of the cache database, honouring `--cache-dir`
pub fn cache_dir(opts: &GlobalOptions) -> Result<PathBuf> {
    match &opts.cache_dir {
        Some(dir) => Ok(dir.clone()),
        None => Ok(CacheStorage::cache_dir()?),
    }
}

pub fn open_storage(opts: &GlobalOptions) -> Result<CacheStorage> {
    let storage = match &opts.cache_dir {
        Some(dir) => CacheStorage::open_at(dir)?,
        None => CacheStorage::open()?,
    };
    Ok(storage)
}
