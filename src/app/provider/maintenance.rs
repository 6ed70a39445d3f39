//! Periodic memory tier maintenance
//!
//! Expired residents are otherwise only dropped when a request touches them;
//! the sweep releases the memory of collections nobody asks for anymore.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::manager::DataProvider;

/// Handle on the background sweep task
pub struct MaintenanceTask {
    handle: JoinHandle<()>,
}

impl MaintenanceTask {
    /// Start purging expired memory entries every `interval`
    ///
    /// The task stops when `shutdown_rx` receives a signal or its sender is dropped.
    pub fn spawn(
        provider: Arc<DataProvider>,
        interval: Duration,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) -> Self {
        let handle = tokio::spawn(async move {
            let mut sweep_interval = tokio::time::interval(interval);
            // the first tick completes immediately
            sweep_interval.tick().await;

            loop {
                tokio::select! {
                    _ = sweep_interval.tick() => {
                        let purged = provider.memory().purge_expired();
                        let stats = provider.stats();
                        if purged > 0 {
                            info!("Purged {} expired memory entries", purged);
                        }
                        debug!(
                            "Memory tier: {} resident / {} slots, hit rate {:.1}%, {} loader calls",
                            stats.memory.resident,
                            stats.memory.slots,
                            stats.memory.hit_rate(),
                            stats.loader_invocations
                        );
                    }
                    _ = shutdown_rx.recv() => {
                        debug!("Maintenance task received shutdown signal");
                        break;
                    }
                }
            }
        });

        Self { handle }
    }

    /// Wait for the task to stop, giving up after `timeout`
    pub async fn join(self, timeout: Duration) -> bool {
        tokio::time::timeout(timeout, self.handle).await.is_ok()
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}
