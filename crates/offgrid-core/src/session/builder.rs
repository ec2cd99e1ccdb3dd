//! Builder for configuring an offline session.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::cancel::CancellationToken;
use crate::clock::{DynClock, SystemClock};
use crate::config::{NetworkConfig, PathsConfig, SessionConfig};
use crate::error::{OffgridError, Result};
use crate::index::{RegionLiveness, SearchIndex};
use crate::network::{
    HttpClient, HttpGeocoder, HttpPoiSource, HttpRemoteSearch, HttpTileSource, NetworkMonitor,
};
use crate::geo::{BoundingBox, ZoomRange};
use crate::region::{RegionCache, RegionStore, TileArtifactStore, TileSource, TileStream};
use crate::search::{
    ConnectivitySignal, GeocodedAddress, Geocoder, OfflineSearchOrchestrator, PoiSource,
    PointOfInterest, RemoteSearch, StaticConnectivity,
};
use async_trait::async_trait;
use tracing::{debug, info, warn};

use super::OfflineSession;

/// Builder for [`OfflineSession`].
///
/// Collaborators that are not injected are created from the configured
/// endpoints. A collaborator with neither fails with a configuration error
/// when it is first used.
///
/// # Example
///
/// ```rust,ignore
/// use offgrid_core::OfflineSession;
///
/// let session = OfflineSession::builder("./offgrid-data")
///     .auto_create_dirs(true)
///     .load_config_file()?
///     .build()
///     .await?;
/// ```
pub struct OfflineSessionBuilder {
    data_dir: PathBuf,
    config: SessionConfig,
    auto_create_dirs: bool,
    enable_sweeper: bool,
    clock: Option<DynClock>,
    tile_source: Option<Arc<dyn TileSource>>,
    geocoder: Option<Arc<dyn Geocoder>>,
    poi_source: Option<Arc<dyn PoiSource>>,
    remote_search: Option<Arc<dyn RemoteSearch>>,
    connectivity: Option<Arc<dyn ConnectivitySignal>>,
}

impl OfflineSessionBuilder {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            config: SessionConfig::default(),
            auto_create_dirs: false,
            enable_sweeper: true,
            clock: None,
            tile_source: None,
            geocoder: None,
            poi_source: None,
            remote_search: None,
            connectivity: None,
        }
    }

    /// Create the data directory if it does not exist.
    ///
    /// Default: `false` (the directory must exist)
    pub fn auto_create_dirs(mut self, enable: bool) -> Self {
        self.auto_create_dirs = enable;
        self
    }

    /// Run the periodic expiry sweeper when the config enables it.
    ///
    /// Default: `true`
    pub fn with_sweeper(mut self, enable: bool) -> Self {
        self.enable_sweeper = enable;
        self
    }

    pub fn with_config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    /// Read `offgrid.json` from the data directory if present.
    pub fn load_config_file(mut self) -> Result<Self> {
        self.config = SessionConfig::load_or_default(self.data_dir.join(PathsConfig::CONFIG_FILE))?;
        Ok(self)
    }

    pub fn with_clock(mut self, clock: DynClock) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn with_tile_source(mut self, source: Arc<dyn TileSource>) -> Self {
        self.tile_source = Some(source);
        self
    }

    pub fn with_geocoder(mut self, geocoder: Arc<dyn Geocoder>) -> Self {
        self.geocoder = Some(geocoder);
        self
    }

    pub fn with_poi_source(mut self, source: Arc<dyn PoiSource>) -> Self {
        self.poi_source = Some(source);
        self
    }

    pub fn with_remote_search(mut self, remote: Arc<dyn RemoteSearch>) -> Self {
        self.remote_search = Some(remote);
        self
    }

    pub fn with_connectivity(mut self, connectivity: Arc<dyn ConnectivitySignal>) -> Self {
        self.connectivity = Some(connectivity);
        self
    }

    fn prepare_data_dir(&self) -> Result<()> {
        if !self.data_dir.exists() {
            if !self.auto_create_dirs {
                return Err(OffgridError::Config {
                    message: format!("Data directory does not exist: {}", self.data_dir.display()),
                });
            }
            create_dir(&self.data_dir)?;
        }
        create_dir(&self.data_dir.join(PathsConfig::TILES_DIR_NAME))
    }

    /// Build the session.
    pub async fn build(self) -> Result<OfflineSession> {
        self.config.validate()?;
        self.prepare_data_dir()?;

        let clock = self.clock.clone().unwrap_or_else(|| Arc::new(SystemClock));
        let endpoints = &self.config.endpoints;
        let http = Arc::new(HttpClient::new()?);

        let tile_source: Arc<dyn TileSource> = match (self.tile_source, &endpoints.tile_url_template) {
            (Some(source), _) => source,
            (None, Some(template)) => {
                debug!("Using HTTP tile source {}", template);
                let tiles_http = HttpClient::with_timeout(NetworkConfig::TILE_REQUEST_TIMEOUT)?;
                Arc::new(HttpTileSource::new(Arc::new(tiles_http), template.clone())?)
            }
            (None, None) => Arc::new(Unconfigured::new("endpoints.tile_url_template")),
        };
        let geocoder: Arc<dyn Geocoder> = match (self.geocoder, &endpoints.geocode_url) {
            (Some(geocoder), _) => geocoder,
            (None, Some(url)) => Arc::new(HttpGeocoder::new(http.clone(), url.clone())),
            (None, None) => Arc::new(Unconfigured::new("endpoints.geocode_url")),
        };
        let poi_source: Arc<dyn PoiSource> = match (self.poi_source, &endpoints.poi_url) {
            (Some(source), _) => source,
            (None, Some(url)) => Arc::new(HttpPoiSource::new(http.clone(), url.clone())),
            (None, None) => Arc::new(Unconfigured::new("endpoints.poi_url")),
        };
        let remote_search: Option<Arc<dyn RemoteSearch>> = match self.remote_search {
            Some(remote) => Some(remote),
            None => endpoints.remote_search_url.as_ref().map(|url| {
                Arc::new(HttpRemoteSearch::new(http.clone(), url.clone())) as Arc<dyn RemoteSearch>
            }),
        };

        // No probe URLs: treated as always online.
        let background = CancellationToken::new();
        let mut monitor = None;
        let connectivity: Arc<dyn ConnectivitySignal> = match self.connectivity {
            Some(connectivity) => connectivity,
            None if !self.config.probe_urls.is_empty() => {
                let network = Arc::new(NetworkMonitor::new(
                    http.as_ref().clone(),
                    self.config.probe_urls.clone(),
                ));
                network.spawn_probe_loop(NetworkConfig::PROBE_INTERVAL, background.clone());
                monitor = Some(network.clone());
                network
            }
            None => Arc::new(StaticConnectivity::default()),
        };

        let store = Arc::new(RegionStore::open(
            self.data_dir.join(PathsConfig::REGIONS_DB),
            clock,
        )?);
        let liveness: Arc<dyn RegionLiveness> = store.clone();
        let index = Arc::new(SearchIndex::open(
            self.data_dir.join(PathsConfig::SEARCH_DB),
            liveness,
        )?);

        let regions = RegionCache::new(
            store,
            TileArtifactStore::new(self.data_dir.join(PathsConfig::TILES_DIR_NAME)),
            tile_source,
        )?;
        regions.add_eviction_listener(index.clone());

        let mut orchestrator = OfflineSearchOrchestrator::new(
            regions.clone(),
            index.clone(),
            geocoder,
            poi_source,
            connectivity,
        )
        .with_fallback_threshold(self.config.fallback_threshold);
        if let Some(remote) = remote_search {
            orchestrator = orchestrator.with_remote(remote);
        }

        let sweeper = match self.config.sweep_interval() {
            Some(interval) if self.enable_sweeper => Some(regions.spawn_sweeper(interval)),
            _ => None,
        };

        info!("Offline session ready at {}", self.data_dir.display());
        Ok(OfflineSession {
            data_dir: self.data_dir,
            config: self.config,
            regions,
            index,
            search: Arc::new(orchestrator),
            monitor,
            sweeper,
            background,
        })
    }
}

fn create_dir(dir: &Path) -> Result<()> {
    if !dir.exists() {
        std::fs::create_dir_all(dir).map_err(|e| OffgridError::io_with_path(e, dir))?;
    }
    Ok(())
}

/// Stands in for a collaborator whose endpoint is missing, so a session can
/// still browse and search existing regions.
struct Unconfigured {
    setting: &'static str,
}

impl Unconfigured {
    fn new(setting: &'static str) -> Self {
        warn!("{} is not configured; operations that need it will fail", setting);
        Self { setting }
    }

    fn error(&self) -> OffgridError {
        OffgridError::Config {
            message: format!("{} is not configured", self.setting),
        }
    }
}

#[async_trait]
impl TileSource for Unconfigured {
    async fn fetch(&self, _bounds: BoundingBox, _zoom: ZoomRange) -> Result<TileStream> {
        Err(self.error())
    }
}

#[async_trait]
impl Geocoder for Unconfigured {
    async fn geocode(&self, _bounds: &BoundingBox) -> Result<Vec<GeocodedAddress>> {
        Err(self.error())
    }
}

#[async_trait]
impl PoiSource for Unconfigured {
    async fn search_pois(&self, _bounds: &BoundingBox) -> Result<Vec<PointOfInterest>> {
        Err(self.error())
    }
}
