//! Periodic expiry sweeper.

use crate::cancel::CancellationToken;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::cache::RegionCache;

/// Handle on a running sweeper. Dropping it leaves the sweeper running.
#[derive(Debug)]
pub struct SweeperHandle {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl SweeperHandle {
    /// Ask the sweeper to stop after its current pass.
    pub fn stop(&self) {
        self.token.cancel();
    }

    /// Stop and wait for the sweeper task to exit.
    pub async fn shutdown(self) {
        self.token.cancel();
        if let Err(e) = self.handle.await {
            warn!("Region sweeper task ended abnormally: {}", e);
        }
    }
}

impl RegionCache {
    /// Sweep expired regions every `interval` until stopped.
    pub fn spawn_sweeper(&self, interval: Duration) -> SweeperHandle {
        let token = CancellationToken::new();
        let cache = self.clone();
        let stop = token.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            info!("Region sweeper started (every {:?})", interval);

            loop {
                tokio::select! {
                    _ = stop.cancelled() => break,
                    _ = ticker.tick() => {
                        match cache.sweep_expired_now().await {
                            Ok(evicted) if evicted.is_empty() => debug!("Sweep found nothing to evict"),
                            Ok(_) => {}
                            Err(e) => warn!("Region sweep failed: {}", e),
                        }
                    }
                }
            }
            debug!("Region sweeper stopped");
        });

        SweeperHandle { token, handle }
    }
}
