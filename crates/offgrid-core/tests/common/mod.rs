//! Shared fakes and a session harness for integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{TimeZone, Utc};
use futures::StreamExt;
use offgrid_core::geo::{BoundingBox, ZoomRange};
use offgrid_core::region::{TileChunk, TileSource, TileStream};
use offgrid_core::search::{
    GeocodedAddress, Geocoder, PoiSource, PointOfInterest, RemoteSearch, StaticConnectivity,
};
use offgrid_core::{
    ManualClock, OffgridError, OfflineSession, RegionRequest, Result, SearchEntry, SessionConfig,
};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::Semaphore;

/// Tile source whose chunks are released one permit at a time.
pub struct FakeTileSource {
    tiles: u64,
    gate: Arc<Semaphore>,
    fetches: AtomicUsize,
    failure: Mutex<Option<String>>,
}

impl FakeTileSource {
    /// Chunks flow freely.
    pub fn open(tiles: u64) -> Self {
        Self::with_permits(tiles, Semaphore::MAX_PERMITS)
    }

    /// Chunks wait for `release`.
    pub fn gated(tiles: u64) -> Self {
        Self::with_permits(tiles, 0)
    }

    fn with_permits(tiles: u64, permits: usize) -> Self {
        Self {
            tiles,
            gate: Arc::new(Semaphore::new(permits)),
            fetches: AtomicUsize::new(0),
            failure: Mutex::new(None),
        }
    }

    pub fn release(&self, chunks: usize) {
        self.gate.add_permits(chunks);
    }

    pub fn release_all(&self) {
        self.gate.add_permits(1_000_000);
    }

    pub fn fail_with(&self, message: &str) {
        *self.failure.lock().unwrap() = Some(message.to_string());
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TileSource for FakeTileSource {
    async fn fetch(&self, _bounds: BoundingBox, zoom: ZoomRange) -> Result<TileStream> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = self.failure.lock().unwrap().clone() {
            return Err(OffgridError::Network {
                message,
                source: None,
            });
        }

        let total = self.tiles;
        let gate = self.gate.clone();
        let z = zoom.min;
        let stream = futures::stream::unfold(0u64, move |index| {
            let gate = gate.clone();
            async move {
                if index >= total {
                    return None;
                }
                let chunk = match gate.acquire().await {
                    Ok(permit) => {
                        permit.forget();
                        Ok(TileChunk {
                            key: format!("{}/{}/0", z, index),
                            data: Bytes::from_static(b"tile"),
                            completed: index + 1,
                            total,
                        })
                    }
                    Err(_) => Err(OffgridError::Other("gate closed".into())),
                };
                Some((chunk, index + 1))
            }
        });
        Ok(stream.boxed())
    }
}

/// Geocoder returning a fixed list or a fixed error, optionally held open
/// until released.
pub struct FakeGeocoder {
    result: Mutex<std::result::Result<Vec<GeocodedAddress>, String>>,
    held: AtomicBool,
    gate: Semaphore,
    entered: Semaphore,
}

impl FakeGeocoder {
    pub fn new(addresses: Vec<GeocodedAddress>) -> Self {
        Self {
            result: Mutex::new(Ok(addresses)),
            held: AtomicBool::new(false),
            gate: Semaphore::new(0),
            entered: Semaphore::new(0),
        }
    }

    pub fn set_failure(&self, message: &str) {
        *self.result.lock().unwrap() = Err(message.to_string());
    }

    pub fn set_addresses(&self, addresses: Vec<GeocodedAddress>) {
        *self.result.lock().unwrap() = Ok(addresses);
    }

    /// Make later calls wait for `release`.
    pub fn hold(&self) {
        self.held.store(true, Ordering::SeqCst);
        while let Ok(permit) = self.entered.try_acquire() {
            permit.forget();
        }
    }

    pub fn release(&self) {
        self.held.store(false, Ordering::SeqCst);
        self.gate.add_permits(1_000);
    }

    /// Wait until a call has started.
    pub async fn entered(&self) {
        self.entered.acquire().await.unwrap().forget();
    }
}

#[async_trait]
impl Geocoder for FakeGeocoder {
    async fn geocode(&self, _bounds: &BoundingBox) -> Result<Vec<GeocodedAddress>> {
        self.entered.add_permits(1);
        if self.held.load(Ordering::SeqCst) {
            self.gate.acquire().await.unwrap().forget();
        }
        self.result
            .lock()
            .unwrap()
            .clone()
            .map_err(OffgridError::Other)
    }
}

/// POI source returning a fixed list or a fixed error.
pub struct FakePoiSource {
    result: Mutex<std::result::Result<Vec<PointOfInterest>, String>>,
}

impl FakePoiSource {
    pub fn new(pois: Vec<PointOfInterest>) -> Self {
        Self {
            result: Mutex::new(Ok(pois)),
        }
    }

    pub fn set_failure(&self, message: &str) {
        *self.result.lock().unwrap() = Err(message.to_string());
    }

    pub fn set_pois(&self, pois: Vec<PointOfInterest>) {
        *self.result.lock().unwrap() = Ok(pois);
    }
}

#[async_trait]
impl PoiSource for FakePoiSource {
    async fn search_pois(&self, _bounds: &BoundingBox) -> Result<Vec<PointOfInterest>> {
        self.result
            .lock()
            .unwrap()
            .clone()
            .map_err(OffgridError::Other)
    }
}

/// Remote search that counts calls.
pub struct FakeRemoteSearch {
    result: Mutex<std::result::Result<Vec<SearchEntry>, String>>,
    calls: AtomicUsize,
}

impl FakeRemoteSearch {
    pub fn new(entries: Vec<SearchEntry>) -> Self {
        Self {
            result: Mutex::new(Ok(entries)),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn set_failure(&self, message: &str) {
        *self.result.lock().unwrap() = Err(message.to_string());
    }

    pub fn set_entries(&self, entries: Vec<SearchEntry>) {
        *self.result.lock().unwrap() = Ok(entries);
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RemoteSearch for FakeRemoteSearch {
    async fn search(&self, _query: &str, _limit: usize) -> Result<Vec<SearchEntry>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.result
            .lock()
            .unwrap()
            .clone()
            .map_err(OffgridError::Other)
    }
}

pub fn address(id: &str, formatted: &str) -> GeocodedAddress {
    GeocodedAddress {
        id: id.to_string(),
        formatted_address: formatted.to_string(),
        latitude: 47.61,
        longitude: -122.33,
    }
}

pub fn poi(id: &str, name: &str, category: &str) -> PointOfInterest {
    PointOfInterest {
        id: id.to_string(),
        name: name.to_string(),
        category: category.to_string(),
        latitude: 47.62,
        longitude: -122.34,
    }
}

pub fn test_bounds() -> BoundingBox {
    BoundingBox::new(47.6, 47.7, -122.4, -122.3).unwrap()
}

/// One-hour region at a single zoom level.
pub fn region_request(id: &str) -> RegionRequest {
    RegionRequest::new(id, format!("Region {}", id), test_bounds())
        .with_zoom(ZoomRange::new(12, 12).unwrap())
        .with_ttl(Duration::from_secs(3600))
}

/// A session over a temp directory with every collaborator faked.
pub struct Harness {
    // Dropped before `temp`.
    pub session: OfflineSession,
    pub clock: Arc<ManualClock>,
    pub tiles: Arc<FakeTileSource>,
    pub geocoder: Arc<FakeGeocoder>,
    pub pois: Arc<FakePoiSource>,
    pub remote: Arc<FakeRemoteSearch>,
    pub connectivity: Arc<StaticConnectivity>,
    pub temp: TempDir,
}

impl Harness {
    pub async fn new(tiles: FakeTileSource) -> Self {
        Self::with_config(tiles, SessionConfig::default()).await
    }

    pub async fn with_config(tiles: FakeTileSource, mut config: SessionConfig) -> Self {
        config.sweep_interval_secs = 0;
        let temp = TempDir::new().unwrap();
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
        ));
        let tiles = Arc::new(tiles);
        let geocoder = Arc::new(FakeGeocoder::new(vec![
            address("1", "100 Main Street"),
            address("2", "12 Mainz Avenue"),
        ]));
        let pois = Arc::new(FakePoiSource::new(vec![poi("1", "Corner Bakery", "bakery")]));
        let remote = Arc::new(FakeRemoteSearch::new(Vec::new()));
        let connectivity = Arc::new(StaticConnectivity::new(false));

        let session = OfflineSession::builder(temp.path())
            .with_config(config)
            .with_clock(clock.clone())
            .with_tile_source(tiles.clone())
            .with_geocoder(geocoder.clone())
            .with_poi_source(pois.clone())
            .with_remote_search(remote.clone())
            .with_connectivity(connectivity.clone())
            .build()
            .await
            .unwrap();

        Self {
            session,
            clock,
            tiles,
            geocoder,
            pois,
            remote,
            connectivity,
            temp,
        }
    }

    /// Download `id` to Ready and build its search data.
    pub async fn ready_region(&self, id: &str) {
        self.session
            .regions()
            .download(region_request(id), |_| {})
            .await
            .unwrap();
        self.session.search().build_region_index(id).await.unwrap();
    }
}
