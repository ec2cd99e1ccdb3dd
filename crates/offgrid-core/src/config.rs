//! Centralized configuration for offgrid.
//!
//! Constant groups hold the defaults; `SessionConfig` is the serde-loaded,
//! per-installation configuration consumed by the session builder.

use crate::error::{OffgridError, Result};
use crate::geo::ZoomRange;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Region download defaults.
pub struct RegionConfig;

impl RegionConfig {
    pub const DEFAULT_MIN_ZOOM: u8 = 12;
    pub const DEFAULT_MAX_ZOOM: u8 = 16;
    pub const MAX_ZOOM_LIMIT: u8 = 22;
    pub const DEFAULT_TTL: Duration = Duration::from_secs(24 * 60 * 60);
    pub const MIN_TTL: Duration = Duration::from_secs(1);
    /// Ten years.
    pub const MAX_TTL: Duration = Duration::from_secs(10 * 365 * 24 * 60 * 60);
    pub const DEFAULT_BUFFER_KM: f64 = 1.0;
    pub const ROUTE_ID_PREFIX: &'static str = "route-";
    pub const SWEEP_INTERVAL: Duration = Duration::from_secs(15 * 60);
    pub const MAX_TILES_PER_REGION: u64 = 250_000;
}

/// Search index defaults.
pub struct SearchConfig;

impl SearchConfig {
    pub const DEFAULT_LIMIT: usize = 15;
    pub const DEFAULT_FALLBACK_THRESHOLD: usize = 0;
    pub const ADDRESS_ID_PREFIX: &'static str = "addr-";
    pub const POI_ID_PREFIX: &'static str = "poi-";
}

/// Network-related configuration.
pub struct NetworkConfig;

impl NetworkConfig {
    pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
    pub const TILE_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
    pub const PROBE_TIMEOUT: Duration = Duration::from_secs(5);
    pub const PROBE_INTERVAL: Duration = Duration::from_secs(60);
    pub const TILE_CONCURRENCY: usize = 4;
    pub const USER_AGENT: &'static str = "offgrid/0.3";
}

/// Directory and file names under the data directory.
pub struct PathsConfig;

impl PathsConfig {
    pub const REGIONS_DB: &'static str = "regions.sqlite";
    pub const SEARCH_DB: &'static str = "search.sqlite";
    pub const TILES_DIR_NAME: &'static str = "tiles";
    pub const PARTIAL_SUFFIX: &'static str = ".part";
    pub const CONFIG_FILE: &'static str = "offgrid.json";
}

/// Remote endpoints used by the HTTP collaborators.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct EndpointConfig {
    /// Tile URL template containing `{z}`, `{x}` and `{y}`.
    pub tile_url_template: Option<String>,
    /// Address geocoding endpoint (bbox query).
    pub geocode_url: Option<String>,
    /// POI search endpoint (bbox query).
    pub poi_url: Option<String>,
    /// Free-text remote search endpoint used for online fallback.
    pub remote_search_url: Option<String>,
}

/// Per-installation configuration for an offline session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct SessionConfig {
    pub endpoints: EndpointConfig,
    /// Buffer around route paths in kilometres.
    pub buffer_km: f64,
    /// Time-to-live of a downloaded region, in seconds.
    pub region_ttl_secs: u64,
    pub min_zoom: u8,
    pub max_zoom: u8,
    /// Local result count at or below which an online search falls back to
    /// the remote search endpoint.
    pub fallback_threshold: usize,
    pub default_limit: usize,
    /// Background sweep interval in seconds (0 disables the sweeper).
    pub sweep_interval_secs: u64,
    /// URLs probed by the connectivity monitor.
    pub probe_urls: Vec<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            endpoints: EndpointConfig::default(),
            buffer_km: RegionConfig::DEFAULT_BUFFER_KM,
            region_ttl_secs: RegionConfig::DEFAULT_TTL.as_secs(),
            min_zoom: RegionConfig::DEFAULT_MIN_ZOOM,
            max_zoom: RegionConfig::DEFAULT_MAX_ZOOM,
            fallback_threshold: SearchConfig::DEFAULT_FALLBACK_THRESHOLD,
            default_limit: SearchConfig::DEFAULT_LIMIT,
            sweep_interval_secs: RegionConfig::SWEEP_INTERVAL.as_secs(),
            probe_urls: Vec::new(),
        }
    }
}

impl SessionConfig {
    /// Load a configuration file; missing fields take their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content =
            std::fs::read_to_string(path).map_err(|e| OffgridError::io_with_path(e, path))?;
        let config: SessionConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load the file if it exists, otherwise return the defaults.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        if path.as_ref().exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Check value ranges that serde cannot express.
    pub fn validate(&self) -> Result<()> {
        if !self.buffer_km.is_finite() || self.buffer_km < 0.0 {
            return Err(OffgridError::Config {
                message: format!("buffer_km must be a non-negative number, got {}", self.buffer_km),
            });
        }
        if self.region_ttl_secs == 0 || self.region_ttl_secs > RegionConfig::MAX_TTL.as_secs() {
            return Err(OffgridError::Config {
                message: format!(
                    "region_ttl_secs must be between 1 and {}, got {}",
                    RegionConfig::MAX_TTL.as_secs(),
                    self.region_ttl_secs
                ),
            });
        }
        if self.default_limit == 0 {
            return Err(OffgridError::Config {
                message: "default_limit must be positive".to_string(),
            });
        }
        ZoomRange::new(self.min_zoom, self.max_zoom).map_err(|e| OffgridError::Config {
            message: e.to_string(),
        })?;
        Ok(())
    }

    pub fn region_ttl(&self) -> Duration {
        Duration::from_secs(self.region_ttl_secs)
    }

    pub fn zoom(&self) -> Result<ZoomRange> {
        ZoomRange::new(self.min_zoom, self.max_zoom)
    }

    pub fn sweep_interval(&self) -> Option<Duration> {
        (self.sweep_interval_secs > 0).then(|| Duration::from_secs(self.sweep_interval_secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_match_route_download() {
        let config = SessionConfig::default();
        assert_eq!(config.min_zoom, 12);
        assert_eq!(config.max_zoom, 16);
        assert_eq!(config.region_ttl(), Duration::from_secs(86_400));
        assert_eq!(config.default_limit, 15);
        assert_eq!(config.fallback_threshold, 0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("offgrid.json");
        std::fs::write(
            &path,
            r#"{"buffer_km": 2.0, "endpoints": {"poi_url": "https://poi.example/api"}}"#,
        )
        .unwrap();

        let config = SessionConfig::load(&path).unwrap();
        assert_eq!(config.buffer_km, 2.0);
        assert_eq!(
            config.endpoints.poi_url.as_deref(),
            Some("https://poi.example/api")
        );
        assert_eq!(config.max_zoom, RegionConfig::DEFAULT_MAX_ZOOM);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let mut config = SessionConfig::default();
        config.buffer_km = -1.0;
        assert!(config.validate().is_err());

        let mut config = SessionConfig::default();
        config.min_zoom = 17;
        assert!(config.validate().is_err());

        let mut config = SessionConfig::default();
        config.region_ttl_secs = 1_000_000_000_000_000;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_file_defaults() {
        let temp = TempDir::new().unwrap();
        let config = SessionConfig::load_or_default(temp.path().join("absent.json")).unwrap();
        assert_eq!(config, SessionConfig::default());
    }
}
