//! Background idle-model reaper.
//!
//! A single task wakes on a fixed interval and asks the manager to
//! unload models idle past the configured timeout. The reaper never
//! touches slot state directly; all eviction decisions stay with
//! [`ModelManager::evict_idle`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::manager::ModelManager;

/// Periodically evicts idle models. Start at most once.
pub struct IdleReaper {
    manager: ModelManager,
    running: Arc<AtomicBool>,
    shutdown: CancellationToken,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl IdleReaper {
    pub fn new(manager: ModelManager) -> Self {
        Self {
            manager,
            running: Arc::new(AtomicBool::new(false)),
            shutdown: CancellationToken::new(),
            handle: Mutex::new(None),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Spawn the reaper task. A second call is a no-op.
    pub fn start(&self) {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("idle reaper already running");
            return;
        }

        let manager = self.manager.clone();
        let running = Arc::clone(&self.running);
        let shutdown = self.shutdown.clone();
        let period = self.manager.config().reaper_interval();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            // The first tick fires immediately; skip it so a fresh pool
            // is not scanned before anything has had a chance to idle.
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => {
                        let evicted = manager.evict_idle().await;
                        if evicted > 0 {
                            info!(evicted, "reaper unloaded idle models");
                        } else {
                            debug!("reaper pass found nothing idle");
                        }
                    }
                }
            }
            running.store(false, Ordering::SeqCst);
            debug!("idle reaper stopped");
        });

        *self.handle.lock() = Some(handle);
        info!(period_secs = period.as_secs(), "idle reaper started");
    }

    /// Signal the task to stop and wait for it to finish.
    pub async fn stop(&self) {
        self.shutdown.cancel();
        let handle = self.handle.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!(error = %e, "idle reaper task join failed");
            }
        }
        self.running.store(false, Ordering::SeqCst);
    }
}
