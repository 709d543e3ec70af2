//! Periodic removal of expired cache entries
//!
//! Expiry is already enforced on read; the sweeper only reclaims space held
//! by entries nobody asks for again.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant};
use tracing::{debug, info, warn};

use super::traits::CachePlugin;

/// Spawns a task calling `purge_expired` every `interval` until shutdown
pub fn spawn_expiry_sweeper(
    cache: Arc<dyn CachePlugin>,
    interval: Duration,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(
            backend = cache.name(),
            interval_secs = interval.as_secs(),
            "Starting cache expiry sweeper"
        );
        let mut timer = interval_at(Instant::now() + interval, interval);

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    info!("Shutdown signal received, stopping cache expiry sweeper");
                    break;
                }
                _ = timer.tick() => {
                    match cache.purge_expired().await {
                        Ok(0) => {}
                        Ok(removed) => debug!(removed, "Swept expired cache entries"),
                        Err(e) => warn!(error = %e, "Cache expiry sweep failed"),
                    }
                }
            }
        }
    })
}
