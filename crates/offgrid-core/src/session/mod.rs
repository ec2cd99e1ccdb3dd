//! Offline session: the wired-together region cache, search index and
//! search orchestrator for one data directory.

mod builder;

pub use builder::OfflineSessionBuilder;

use crate::cancel::CancellationToken;
use crate::config::SessionConfig;
use crate::error::Result;
use crate::index::SearchIndex;
use crate::network::{ConnectivityState, NetworkMonitor};
use crate::region::{RegionCache, SweeperHandle};
use crate::search::OfflineSearchOrchestrator;
use crate::tasks::{RouteAreaTask, SearchTask};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Everything needed to prepare regions and search them offline.
pub struct OfflineSession {
    data_dir: PathBuf,
    config: SessionConfig,
    regions: RegionCache,
    index: Arc<SearchIndex>,
    search: Arc<OfflineSearchOrchestrator>,
    monitor: Option<Arc<NetworkMonitor>>,
    sweeper: Option<SweeperHandle>,
    background: CancellationToken,
}

impl OfflineSession {
    pub fn builder(data_dir: impl Into<PathBuf>) -> OfflineSessionBuilder {
        OfflineSessionBuilder::new(data_dir)
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn regions(&self) -> &RegionCache {
        &self.regions
    }

    pub fn index(&self) -> &Arc<SearchIndex> {
        &self.index
    }

    pub fn search(&self) -> &Arc<OfflineSearchOrchestrator> {
        &self.search
    }

    /// Last probed connectivity, or `None` when no probe URLs are configured.
    pub fn connectivity(&self) -> Option<ConnectivityState> {
        self.monitor.as_ref().map(|monitor| monitor.state())
    }

    /// Route-area task using the configured buffer, zoom and TTL.
    pub fn route_area_task(&self) -> Result<RouteAreaTask> {
        Ok(RouteAreaTask::new(self.regions.clone(), self.search.clone())
            .with_buffer_km(self.config.buffer_km)
            .with_zoom(self.config.zoom()?)
            .with_ttl(self.config.region_ttl()))
    }

    /// Search task using the configured result limit.
    pub fn search_task(&self) -> SearchTask {
        SearchTask::new(self.search.clone()).with_limit(self.config.default_limit)
    }

    /// Stop background work and wait for the sweeper to exit.
    pub async fn shutdown(mut self) {
        self.background.cancel();
        if let Some(sweeper) = self.sweeper.take() {
            sweeper.shutdown().await;
        }
        debug!("Offline session shut down");
    }
}

impl Drop for OfflineSession {
    fn drop(&mut self) {
        self.background.cancel();
        if let Some(sweeper) = &self.sweeper {
            sweeper.stop();
        }
    }
}
