//! Region download cache.
//!
//! Owns the lifecycle of every region descriptor. Concurrent requests for the
//! same region id share one download:
//!
//! ```text
//! request A ─┐
//!            ├──► in-flight table ──► one download task ──► TileSource
//! request B ─┘         │                     │
//!                      ▼                     ▼
//!             shared progress + outcome (watch channels)
//! ```
//!
//! The in-flight check and the Pending/Downloading mark happen under one lock,
//! so two callers can never start two downloads for the same id.

use crate::cancel::CancellationToken;
use crate::clock::DynClock;
use crate::error::{OffgridError, Result};
use futures::StreamExt;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use super::artifacts::{PartialArtifacts, TileArtifactStore};
use super::source::TileSource;
use super::store::RegionStore;
use super::types::{expiry_after, RegionDescriptor, RegionRequest, RegionStatus};

/// Notified after a region is evicted so dependent data can be dropped.
pub trait RegionEvictionListener: Send + Sync {
    /// Returns the number of dependent records removed.
    fn on_region_evicted(&self, region_id: &str) -> Result<usize>;
}

/// Terminal result shared with every attached caller.
#[derive(Debug, Clone, PartialEq)]
enum Outcome {
    Ready(RegionDescriptor),
    Cancelled,
    Failed(String),
}

/// Why a download stopped early.
enum Interrupted {
    Cancelled,
    Failed(String),
}

impl From<OffgridError> for Interrupted {
    fn from(err: OffgridError) -> Self {
        Interrupted::Failed(err.to_string())
    }
}

struct InFlight {
    progress: watch::Sender<f64>,
    outcome: watch::Sender<Option<Outcome>>,
    cancel: CancellationToken,
    /// Callers currently attached; changed only under the in-flight lock.
    attached: AtomicUsize,
}

impl InFlight {
    fn new(attached: usize) -> Self {
        Self {
            progress: watch::channel(0.0).0,
            outcome: watch::channel(None).0,
            cancel: CancellationToken::new(),
            attached: AtomicUsize::new(attached),
        }
    }

    /// Placeholder that holds the id while an eviction runs.
    fn evicting() -> Self {
        let flight = Self::new(0);
        flight.cancel.cancel();
        flight
    }

    /// Publish progress, ignoring values that would move it backwards.
    fn report(&self, fraction: f64) {
        let fraction = fraction.clamp(0.0, 1.0);
        self.progress.send_if_modified(|current| {
            if fraction > *current {
                *current = fraction;
                true
            } else {
                false
            }
        });
    }

    fn finish(&self, outcome: Outcome) {
        self.outcome.send_replace(Some(outcome));
    }
}

/// Ties work derived from a region to the download that produced it.
///
/// A lease taken before a slow operation is checked again before its result
/// is committed; eviction or re-download in between invalidates it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionLease {
    region_id: String,
    incarnation: Option<u64>,
}

impl RegionLease {
    pub fn region_id(&self) -> &str {
        &self.region_id
    }
}

/// Counters describing how requests were served.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DownloadStats {
    /// Requests that started a new download.
    pub started: u64,
    /// Requests that attached to a download already in flight.
    pub coalesced: u64,
    /// Requests answered by an already-ready region.
    pub cache_hits: u64,
}

struct CacheInner {
    store: Arc<RegionStore>,
    artifacts: TileArtifactStore,
    source: Arc<dyn TileSource>,
    clock: DynClock,
    listeners: RwLock<Vec<Arc<dyn RegionEvictionListener>>>,
    in_flight: Mutex<HashMap<String, Arc<InFlight>>>,
    /// Download generation per region id. Only changed while `in_flight` is
    /// held. Regions loaded from an earlier process have no entry.
    incarnations: Mutex<HashMap<String, u64>>,
    next_incarnation: AtomicU64,
    started: AtomicU64,
    coalesced: AtomicU64,
    cache_hits: AtomicU64,
}

/// Cache of downloaded regions.
///
/// Cloning is cheap; clones share the same state.
#[derive(Clone)]
pub struct RegionCache {
    inner: Arc<CacheInner>,
}

impl RegionCache {
    /// Create a cache over `store`, failing any downloads a previous process
    /// left unfinished.
    pub fn new(
        store: Arc<RegionStore>,
        artifacts: TileArtifactStore,
        source: Arc<dyn TileSource>,
    ) -> Result<Self> {
        let interrupted = store.fail_interrupted()?;
        for region_id in &interrupted {
            warn!(region_id = %region_id, "Download was interrupted by a restart");
        }

        let clock = store.clock().clone();
        Ok(Self {
            inner: Arc::new(CacheInner {
                store,
                artifacts,
                source,
                clock,
                listeners: RwLock::new(Vec::new()),
                in_flight: Mutex::new(HashMap::new()),
                incarnations: Mutex::new(HashMap::new()),
                next_incarnation: AtomicU64::new(1),
                started: AtomicU64::new(0),
                coalesced: AtomicU64::new(0),
                cache_hits: AtomicU64::new(0),
            }),
        })
    }

    /// Register a listener called after every eviction.
    pub fn add_eviction_listener(&self, listener: Arc<dyn RegionEvictionListener>) {
        self.inner
            .listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(listener);
    }

    pub fn store(&self) -> &Arc<RegionStore> {
        &self.inner.store
    }

    pub fn artifacts(&self) -> &TileArtifactStore {
        &self.inner.artifacts
    }

    pub fn stats(&self) -> DownloadStats {
        DownloadStats {
            started: self.inner.started.load(Ordering::Relaxed),
            coalesced: self.inner.coalesced.load(Ordering::Relaxed),
            cache_hits: self.inner.cache_hits.load(Ordering::Relaxed),
        }
    }

    /// Make a region available offline.
    ///
    /// A live region completes immediately with progress 1. A download
    /// already in flight for the same id is joined rather than repeated.
    /// Otherwise a new download is started in the background.
    pub async fn request_download(&self, request: RegionRequest) -> Result<DownloadTask> {
        request.validate()?;

        loop {
            let dying = {
                let mut in_flight = self.inner.lock_in_flight()?;
                match in_flight.get(&request.id).cloned() {
                    Some(flight) if !flight.cancel.is_cancelled() => {
                        let attached = flight.attached.fetch_add(1, Ordering::SeqCst) + 1;
                        self.inner.coalesced.fetch_add(1, Ordering::Relaxed);
                        debug!(
                            region_id = %request.id,
                            attached,
                            "Attached to in-flight download"
                        );
                        return Ok(DownloadTask::attached(
                            self.inner.clone(),
                            request.id,
                            flight,
                        ));
                    }
                    // Cancelled or being evicted: let it finish, then retry.
                    Some(flight) => flight.outcome.subscribe(),
                    None => return self.start_download(&mut in_flight, request),
                }
            };
            wait_terminal(dying).await;
        }
    }

    /// Runs under the in-flight lock.
    fn start_download(
        &self,
        in_flight: &mut HashMap<String, Arc<InFlight>>,
        request: RegionRequest,
    ) -> Result<DownloadTask> {
        let now = self.inner.clock.now();
        let descriptor = RegionDescriptor::pending(&request, now)?;

        if let Some(existing) = self.inner.store.get(&request.id)? {
            if existing.is_live(now) {
                self.inner.cache_hits.fetch_add(1, Ordering::Relaxed);
                debug!(region_id = %request.id, "Region already ready");
                return Ok(DownloadTask::ready(existing));
            }
            debug!(
                region_id = %request.id,
                status = %existing.status,
                "Replacing stale region"
            );
            self.inner.notify_evicted(&request.id)?;
        }

        self.inner.store.put(&descriptor)?;
        let incarnation = self.inner.next_incarnation.fetch_add(1, Ordering::Relaxed);
        self.inner
            .lock_incarnations()
            .insert(request.id.clone(), incarnation);

        let flight = Arc::new(InFlight::new(1));
        in_flight.insert(request.id.clone(), flight.clone());
        self.inner.started.fetch_add(1, Ordering::Relaxed);
        info!(
            region_id = %request.id,
            min_zoom = request.zoom.min,
            max_zoom = request.zoom.max,
            "Queued region download"
        );

        tokio::spawn(self.inner.clone().run_download(descriptor, flight.clone()));
        Ok(DownloadTask::attached(self.inner.clone(), request.id, flight))
    }

    /// Request a download and wait for it, reporting every progress value.
    pub async fn download<F>(&self, request: RegionRequest, on_progress: F) -> Result<RegionDescriptor>
    where
        F: FnMut(f64),
    {
        self.request_download(request)
            .await?
            .wait_with_progress(on_progress)
            .await
    }

    /// Descriptor of a region, hiding regions that are ready but expired.
    pub fn get(&self, region_id: &str) -> Result<Option<RegionDescriptor>> {
        let now = self.inner.clock.now();
        Ok(self
            .inner
            .store
            .get(region_id)?
            .filter(|descriptor| !is_stale(descriptor, now)))
    }

    /// Every region except ready-but-expired ones.
    pub fn list(&self) -> Result<Vec<RegionDescriptor>> {
        let now = self.inner.clock.now();
        Ok(self
            .inner
            .store
            .list()?
            .into_iter()
            .filter(|descriptor| !is_stale(descriptor, now))
            .collect())
    }

    /// Ready and not expired.
    pub fn is_live(&self, region_id: &str) -> Result<bool> {
        let now = self.inner.clock.now();
        Ok(self
            .inner
            .store
            .get(region_id)?
            .is_some_and(|descriptor| descriptor.is_live(now)))
    }

    /// Remove a region, its tiles and its dependent search data.
    ///
    /// An in-flight download of the region is cancelled first. Evicting an
    /// unknown id is a no-op. Returns true if a descriptor was removed.
    pub async fn evict(&self, region_id: &str) -> Result<bool> {
        let guard = loop {
            let dying = {
                let mut in_flight = self.inner.lock_in_flight()?;
                match in_flight.get(region_id).cloned() {
                    Some(flight) => {
                        flight.cancel.cancel();
                        flight.outcome.subscribe()
                    }
                    None => {
                        let guard = Arc::new(InFlight::evicting());
                        in_flight.insert(region_id.to_string(), guard.clone());
                        break guard;
                    }
                }
            };
            debug!(region_id = %region_id, "Waiting for in-flight download before eviction");
            wait_terminal(dying).await;
        };

        let result = self.inner.remove_region(region_id).await;
        {
            let _in_flight = self.inner.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
            self.inner.lock_incarnations().remove(region_id);
        }
        self.inner.release(region_id, &guard);
        guard.finish(Outcome::Cancelled);
        result
    }

    /// Current descriptor of a region together with a lease on it.
    ///
    /// Returns `None` for unknown or ready-but-expired regions.
    pub fn lease(&self, region_id: &str) -> Result<Option<(RegionDescriptor, RegionLease)>> {
        let _in_flight = self.inner.lock_in_flight()?;
        let Some(descriptor) = self.get(region_id)? else {
            return Ok(None);
        };
        let lease = RegionLease {
            region_id: region_id.to_string(),
            incarnation: self.inner.lock_incarnations().get(region_id).copied(),
        };
        Ok(Some((descriptor, lease)))
    }

    /// Run `commit` only if the leased region is still the same live region.
    ///
    /// Downloads and evictions of the region wait while `commit` runs, so an
    /// eviction either precedes the check or removes what `commit` wrote.
    pub fn commit_leased<T>(
        &self,
        lease: &RegionLease,
        commit: impl FnOnce() -> Result<T>,
    ) -> Result<T> {
        let in_flight = self.inner.lock_in_flight()?;
        let region_id = lease.region_id.as_str();
        let unchanged = !in_flight.contains_key(region_id)
            && self.inner.lock_incarnations().get(region_id).copied() == lease.incarnation
            && self.is_live(region_id)?;
        if !unchanged {
            debug!(region_id = %region_id, "Region changed while leased");
            return Err(OffgridError::RegionNotFound {
                region_id: region_id.to_string(),
            });
        }
        commit()
    }

    /// Evict every ready region whose expiry is at or before `now`.
    ///
    /// Returns the evicted ids.
    pub async fn sweep_expired(
        &self,
        now: chrono::DateTime<chrono::Utc>,
    ) -> Result<Vec<String>> {
        let expired: Vec<String> = self
            .inner
            .store
            .list()?
            .into_iter()
            .filter(|d| d.status == RegionStatus::Ready && d.expires_at <= now)
            .map(|d| d.id)
            .collect();

        let mut evicted = Vec::with_capacity(expired.len());
        for region_id in expired {
            let still_expired = self
                .inner
                .store
                .get(&region_id)?
                .is_some_and(|d| d.status == RegionStatus::Ready && d.expires_at <= now);
            if still_expired && self.evict(&region_id).await? {
                evicted.push(region_id);
            }
        }

        if !evicted.is_empty() {
            info!("Swept {} expired regions", evicted.len());
        }
        Ok(evicted)
    }

    /// Sweep against the cache's clock.
    pub async fn sweep_expired_now(&self) -> Result<Vec<String>> {
        let now = self.inner.clock.now();
        self.sweep_expired(now).await
    }
}

/// Ready regions past their expiry are logically absent.
fn is_stale(descriptor: &RegionDescriptor, now: chrono::DateTime<chrono::Utc>) -> bool {
    descriptor.status == RegionStatus::Ready && descriptor.is_expired(now)
}

impl CacheInner {
    fn lock_in_flight(&self) -> Result<MutexGuard<'_, HashMap<String, Arc<InFlight>>>> {
        self.in_flight
            .lock()
            .map_err(|_| OffgridError::Other("In-flight download table lock poisoned".into()))
    }

    fn lock_incarnations(&self) -> MutexGuard<'_, HashMap<String, u64>> {
        self.incarnations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Drop `flight` from the table if it is still the registered entry.
    fn release(&self, region_id: &str, flight: &Arc<InFlight>) {
        let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        if in_flight
            .get(region_id)
            .is_some_and(|current| Arc::ptr_eq(current, flight))
        {
            in_flight.remove(region_id);
        }
    }

    fn notify_evicted(&self, region_id: &str) -> Result<usize> {
        let listeners = self
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        let mut removed = 0;
        let mut first_error = None;
        for listener in listeners {
            match listener.on_region_evicted(region_id) {
                Ok(count) => removed += count,
                Err(e) => {
                    error!(region_id = %region_id, "Eviction cascade failed: {}", e);
                    first_error.get_or_insert(e);
                }
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(removed),
        }
    }

    async fn remove_region(&self, region_id: &str) -> Result<bool> {
        let existed = self.store.delete(region_id)?;
        let removed_tiles = self.artifacts.remove(region_id).await?;
        let removed_entries = self.notify_evicted(region_id)?;
        if existed || removed_tiles || removed_entries > 0 {
            info!(
                region_id = %region_id,
                removed_entries,
                "Evicted region"
            );
        }
        Ok(existed)
    }

    async fn run_download(self: Arc<Self>, descriptor: RegionDescriptor, flight: Arc<InFlight>) {
        let region_id = descriptor.id.clone();

        let outcome = match self.fetch_tiles(&descriptor, &flight).await {
            Ok(size_bytes) => self.complete(&descriptor, size_bytes, &flight).await,
            Err(Interrupted::Cancelled) => {
                info!(region_id = %region_id, "Region download cancelled");
                self.record_failure(&region_id, "cancelled");
                Outcome::Cancelled
            }
            Err(Interrupted::Failed(message)) => {
                error!(region_id = %region_id, "Region download failed: {}", message);
                self.record_failure(&region_id, &message);
                Outcome::Failed(message)
            }
        };

        self.release(&region_id, &flight);
        flight.finish(outcome);
    }

    async fn fetch_tiles(
        &self,
        descriptor: &RegionDescriptor,
        flight: &InFlight,
    ) -> std::result::Result<u64, Interrupted> {
        let region_id = &descriptor.id;
        self.store
            .set_status(region_id, RegionStatus::Downloading, None)?;
        debug!(region_id = %region_id, "Region downloading");

        self.artifacts.remove(region_id).await?;
        let mut partial = self.artifacts.begin(region_id).await?;

        if let Err(interrupted) = self.stream_into(descriptor, flight, &mut partial).await {
            partial.discard().await;
            return Err(interrupted);
        }
        if flight.cancel.is_cancelled() {
            partial.discard().await;
            return Err(Interrupted::Cancelled);
        }
        Ok(partial.commit().await?)
    }

    async fn stream_into(
        &self,
        descriptor: &RegionDescriptor,
        flight: &InFlight,
        partial: &mut PartialArtifacts,
    ) -> std::result::Result<(), Interrupted> {
        let cancel = &flight.cancel;
        let mut stream = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Interrupted::Cancelled),
            stream = self.source.fetch(descriptor.bounds, descriptor.zoom()) => stream?,
        };

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(Interrupted::Cancelled),
                next = stream.next() => next,
            };
            match next {
                Some(Ok(chunk)) => {
                    partial.write(&chunk.key, &chunk.data).await?;
                    flight.report(chunk.fraction());
                }
                Some(Err(e)) => return Err(e.into()),
                None => return Ok(()),
            }
        }
    }

    async fn complete(
        &self,
        descriptor: &RegionDescriptor,
        size_bytes: u64,
        flight: &InFlight,
    ) -> Outcome {
        let region_id = &descriptor.id;
        let marked = expiry_after(self.clock.now(), descriptor.ttl())
            .and_then(|expires_at| self.store.mark_ready(region_id, size_bytes, expires_at));

        match marked {
            Ok(Some(ready)) => {
                flight.report(1.0);
                info!(
                    region_id = %region_id,
                    size_bytes,
                    expires_at = %ready.expires_at,
                    "Region ready"
                );
                Outcome::Ready(ready)
            }
            Ok(None) => {
                warn!(region_id = %region_id, "Region removed while downloading");
                let _ = self.artifacts.remove(region_id).await;
                Outcome::Failed("region was removed during download".into())
            }
            Err(e) => {
                error!(region_id = %region_id, "Failed to record ready region: {}", e);
                let _ = self.artifacts.remove(region_id).await;
                self.record_failure(region_id, &e.to_string());
                Outcome::Failed(e.to_string())
            }
        }
    }

    fn record_failure(&self, region_id: &str, message: &str) {
        if let Err(e) = self
            .store
            .set_status(region_id, RegionStatus::Failed, Some(message))
        {
            warn!(region_id = %region_id, "Failed to record download failure: {}", e);
        }
    }
}

/// Wait until a flight publishes its outcome.
async fn wait_terminal(mut outcome: watch::Receiver<Option<Outcome>>) -> Option<Outcome> {
    loop {
        if let Some(done) = outcome.borrow_and_update().clone() {
            return Some(done);
        }
        if outcome.changed().await.is_err() {
            return outcome.borrow().clone();
        }
    }
}

struct Attachment {
    cache: Arc<CacheInner>,
    flight: Arc<InFlight>,
}

impl Attachment {
    /// Leave the download. Returns true if this was the last caller and the
    /// download was cancelled as a result.
    fn detach(&self, cancel_if_last: bool) -> bool {
        let _in_flight = self
            .cache
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let previous = self.flight.attached.fetch_sub(1, Ordering::SeqCst);
        if previous <= 1 && cancel_if_last {
            self.flight.cancel.cancel();
            true
        } else {
            false
        }
    }
}

enum WaitEvent {
    Cancel,
    Outcome(bool),
    Progress(bool),
}

/// A caller's handle on a region download.
///
/// Dropping the task detaches without cancelling the download, unless
/// [`cancel_handle`](Self::cancel_handle) was triggered first.
pub struct DownloadTask {
    region_id: String,
    progress: watch::Receiver<f64>,
    outcome: watch::Receiver<Option<Outcome>>,
    attachment: Option<Attachment>,
    cancel: CancellationToken,
}

impl DownloadTask {
    fn attached(cache: Arc<CacheInner>, region_id: String, flight: Arc<InFlight>) -> Self {
        Self {
            region_id,
            progress: flight.progress.subscribe(),
            outcome: flight.outcome.subscribe(),
            attachment: Some(Attachment { cache, flight }),
            cancel: CancellationToken::new(),
        }
    }

    fn ready(descriptor: RegionDescriptor) -> Self {
        let (_, progress) = watch::channel(1.0);
        let region_id = descriptor.id.clone();
        let (_, outcome) = watch::channel(Some(Outcome::Ready(descriptor)));
        Self {
            region_id,
            progress,
            outcome,
            attachment: None,
            cancel: CancellationToken::new(),
        }
    }

    pub fn region_id(&self) -> &str {
        &self.region_id
    }

    /// Latest progress in `[0, 1]`.
    pub fn progress(&self) -> f64 {
        *self.progress.borrow()
    }

    /// Stream of progress values; never decreases.
    pub fn progress_updates(&self) -> watch::Receiver<f64> {
        self.progress.clone()
    }

    /// True once the download reached Ready or Failed.
    pub fn is_finished(&self) -> bool {
        self.outcome.borrow().is_some()
    }

    /// Token that cancels this caller's interest from another task.
    pub fn cancel_handle(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Use an existing token, e.g. one shared with a larger operation.
    pub fn with_cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Cancel and wait.
    ///
    /// A sole caller cancels the download and gets `RegionCancelled` once the
    /// region has been marked Failed. With other callers attached this one
    /// only detaches. If the download already finished, its result is
    /// returned unchanged.
    pub async fn cancel(mut self) -> Result<RegionDescriptor> {
        if let Some(done) = self.outcome.borrow().clone() {
            return self.resolve(done);
        }
        self.cancel.cancel();
        self.cancel_and_wait().await
    }

    /// Wait for the final descriptor.
    pub async fn wait(self) -> Result<RegionDescriptor> {
        self.wait_with_progress(|_| {}).await
    }

    /// Wait for the final descriptor, calling `on_progress` with the current
    /// value and then with every increase.
    pub async fn wait_with_progress<F>(mut self, mut on_progress: F) -> Result<RegionDescriptor>
    where
        F: FnMut(f64),
    {
        let mut last = *self.progress.borrow_and_update();
        on_progress(last);
        let mut progress_open = true;

        loop {
            let finished = self.outcome.borrow_and_update().clone();
            if let Some(done) = finished {
                let current = *self.progress.borrow();
                if current > last {
                    on_progress(current);
                }
                return self.resolve(done);
            }

            let event = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => WaitEvent::Cancel,
                changed = self.outcome.changed() => WaitEvent::Outcome(changed.is_ok()),
                changed = self.progress.changed(), if progress_open => {
                    WaitEvent::Progress(changed.is_ok())
                }
            };

            match event {
                WaitEvent::Cancel => return self.cancel_and_wait().await,
                WaitEvent::Outcome(true) => {}
                WaitEvent::Outcome(false) => {
                    return Err(OffgridError::Other(format!(
                        "Download of region {} was abandoned",
                        self.region_id
                    )))
                }
                WaitEvent::Progress(true) => {
                    let current = *self.progress.borrow_and_update();
                    if current > last {
                        last = current;
                        on_progress(current);
                    }
                }
                WaitEvent::Progress(false) => progress_open = false,
            }
        }
    }

    async fn cancel_and_wait(&mut self) -> Result<RegionDescriptor> {
        let Some(attachment) = self.attachment.take() else {
            let done = self.outcome.borrow().clone();
            return match done {
                Some(done) => self.resolve(done),
                None => Err(self.cancelled()),
            };
        };

        if !attachment.detach(true) {
            debug!(region_id = %self.region_id, "Detached from shared download");
            return Err(self.cancelled());
        }

        match wait_terminal(attachment.flight.outcome.subscribe()).await {
            Some(Outcome::Ready(descriptor)) => Ok(descriptor),
            Some(Outcome::Failed(message)) if !attachment.flight.cancel.is_cancelled() => {
                Err(OffgridError::DownloadFailed {
                    region_id: self.region_id.clone(),
                    message,
                })
            }
            _ => Err(self.cancelled()),
        }
    }

    fn resolve(&self, outcome: Outcome) -> Result<RegionDescriptor> {
        match outcome {
            Outcome::Ready(descriptor) => Ok(descriptor),
            Outcome::Cancelled => Err(self.cancelled()),
            Outcome::Failed(message) => Err(OffgridError::DownloadFailed {
                region_id: self.region_id.clone(),
                message,
            }),
        }
    }

    fn cancelled(&self) -> OffgridError {
        OffgridError::RegionCancelled {
            region_id: self.region_id.clone(),
        }
    }
}

impl Drop for DownloadTask {
    fn drop(&mut self) {
        if let Some(attachment) = self.attachment.take() {
            attachment.detach(self.cancel.is_cancelled());
        }
    }
}

impl std::fmt::Debug for DownloadTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownloadTask")
            .field("region_id", &self.region_id)
            .field("progress", &self.progress())
            .field("finished", &self.is_finished())
            .finish()
    }
}
