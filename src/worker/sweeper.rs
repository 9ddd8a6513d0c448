//! Periodic retention sweep
//!
//! Runs [`ServiceWorker::sweep`] on a fixed period until stopped. A failed
//! cycle is logged and the next one runs on schedule.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use super::controller::ServiceWorker;

pub struct Sweeper {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
    cycles: Arc<AtomicU64>,
}

impl Sweeper {
    /// Start sweeping; the first cycle runs one `period` from now
    pub fn spawn(worker: Arc<ServiceWorker>, period: Duration) -> Self {
        let (shutdown, mut shutdown_rx) = watch::channel(false);
        let cycles = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&cycles);

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(e) = worker.sweep().await {
                            log::warn!("Cache sweep failed: {}", e);
                        }
                        counter.fetch_add(1, Ordering::SeqCst);
                    }
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                }
            }
            log::debug!("Sweeper stopped");
        });

        Self {
            shutdown,
            handle,
            cycles,
        }
    }

    /// Completed sweep cycles, failed ones included
    pub fn cycles(&self) -> u64 {
        self.cycles.load(Ordering::SeqCst)
    }

    /// Stop and wait for an in-flight cycle to finish
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.handle.await {
            log::warn!("Sweeper task ended abnormally: {}", e);
        }
    }
}
