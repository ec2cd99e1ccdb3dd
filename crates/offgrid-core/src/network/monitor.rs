//! Connectivity monitoring by probing known endpoints.

use crate::cancel::CancellationToken;
use crate::config::NetworkConfig;
use crate::search::ConnectivitySignal;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::client::HttpClient;

/// Network connectivity state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityState {
    Online = 0,
    Offline = 1,
    Checking = 2,
    /// Before the first check.
    Unknown = 3,
}

impl std::fmt::Display for ConnectivityState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectivityState::Online => write!(f, "online"),
            ConnectivityState::Offline => write!(f, "offline"),
            ConnectivityState::Checking => write!(f, "checking"),
            ConnectivityState::Unknown => write!(f, "unknown"),
        }
    }
}

struct AtomicConnectivityState(AtomicU8);

impl AtomicConnectivityState {
    fn new(state: ConnectivityState) -> Self {
        Self(AtomicU8::new(state as u8))
    }

    fn load(&self) -> ConnectivityState {
        match self.0.load(Ordering::SeqCst) {
            0 => ConnectivityState::Online,
            1 => ConnectivityState::Offline,
            2 => ConnectivityState::Checking,
            _ => ConnectivityState::Unknown,
        }
    }

    fn store(&self, state: ConnectivityState) {
        self.0.store(state as u8, Ordering::SeqCst);
    }
}

/// Connectivity signal backed by periodic HEAD probes.
///
/// Reports offline until a probe has succeeded.
pub struct NetworkMonitor {
    client: HttpClient,
    probe_urls: Vec<String>,
    probe_timeout: Duration,
    state: AtomicConnectivityState,
    /// Last definite answer, kept while a check is running.
    last_known: AtomicConnectivityState,
}

impl NetworkMonitor {
    pub fn new(client: HttpClient, probe_urls: Vec<String>) -> Self {
        Self {
            client,
            probe_urls,
            probe_timeout: NetworkConfig::PROBE_TIMEOUT,
            state: AtomicConnectivityState::new(ConnectivityState::Unknown),
            last_known: AtomicConnectivityState::new(ConnectivityState::Unknown),
        }
    }

    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    pub fn state(&self) -> ConnectivityState {
        self.state.load()
    }

    /// Probe each URL in order until one answers.
    pub async fn check_connectivity(&self) -> ConnectivityState {
        if self.probe_urls.is_empty() {
            debug!("No probe URLs configured; connectivity stays unknown");
            return self.state.load();
        }

        let previous = self.last_known.load();
        self.state.store(ConnectivityState::Checking);

        for url in &self.probe_urls {
            if self.client.probe(url, self.probe_timeout).await {
                self.record(ConnectivityState::Online);
                if previous == ConnectivityState::Offline {
                    info!("Network connectivity restored");
                }
                return ConnectivityState::Online;
            }
            debug!("Probe failed for {}", url);
        }

        self.record(ConnectivityState::Offline);
        if previous != ConnectivityState::Offline {
            warn!("Network connectivity lost: all probe URLs failed");
        }
        ConnectivityState::Offline
    }

    fn record(&self, state: ConnectivityState) {
        self.last_known.store(state);
        self.state.store(state);
    }

    /// Re-check connectivity every `interval` until the token is cancelled.
    pub fn spawn_probe_loop(
        self: &Arc<Self>,
        interval: Duration,
        stop: CancellationToken,
    ) -> JoinHandle<()> {
        let monitor = Arc::clone(self);
        tokio::spawn(async move {
            info!("Starting background connectivity monitoring");
            loop {
                monitor.check_connectivity().await;
                tokio::select! {
                    _ = stop.cancelled() => break,
                    _ = tokio::time::sleep(interval) => {}
                }
            }
            info!("Background connectivity monitoring stopped");
        })
    }
}

impl ConnectivitySignal for NetworkMonitor {
    fn is_online(&self) -> bool {
        self.last_known.load() == ConnectivityState::Online
    }
}
