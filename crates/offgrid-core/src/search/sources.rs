//! Collaborators consulted by the search orchestrator.

use crate::error::Result;
use crate::geo::{BoundingBox, Coordinate};
use crate::index::SearchEntry;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};

/// Address returned by a geocoder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeocodedAddress {
    pub id: String,
    pub formatted_address: String,
    pub latitude: f64,
    pub longitude: f64,
}

impl GeocodedAddress {
    pub fn position(&self) -> Coordinate {
        Coordinate::new(self.latitude, self.longitude)
    }
}

/// Point of interest returned by a POI source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointOfInterest {
    pub id: String,
    pub name: String,
    pub category: String,
    pub latitude: f64,
    pub longitude: f64,
}

impl PointOfInterest {
    pub fn position(&self) -> Coordinate {
        Coordinate::new(self.latitude, self.longitude)
    }
}

/// Lists the addresses inside a box.
#[async_trait]
pub trait Geocoder: Send + Sync {
    async fn geocode(&self, bounds: &BoundingBox) -> Result<Vec<GeocodedAddress>>;
}

/// Lists the points of interest inside a box.
#[async_trait]
pub trait PoiSource: Send + Sync {
    async fn search_pois(&self, bounds: &BoundingBox) -> Result<Vec<PointOfInterest>>;
}

/// Online search used when local results are insufficient.
#[async_trait]
pub trait RemoteSearch: Send + Sync {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchEntry>>;
}

/// Reports whether the device is currently online.
pub trait ConnectivitySignal: Send + Sync {
    fn is_online(&self) -> bool;
}

/// Connectivity flag set by the host application.
#[derive(Debug)]
pub struct StaticConnectivity {
    online: AtomicBool,
}

impl StaticConnectivity {
    pub fn new(online: bool) -> Self {
        Self {
            online: AtomicBool::new(online),
        }
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }
}

impl Default for StaticConnectivity {
    fn default() -> Self {
        Self::new(true)
    }
}

impl ConnectivitySignal for StaticConnectivity {
    fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }
}
