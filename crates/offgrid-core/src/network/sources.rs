//! HTTP implementations of the search collaborators.
//!
//! Each endpoint answers a GET with a JSON array, or an object carrying the
//! array under `results`. Bounding boxes travel as a `bbox` query parameter in
//! `minLng,minLat,maxLng,maxLat` order.

use crate::error::Result;
use crate::geo::{BoundingBox, Coordinate};
use crate::index::{EntryKind, SearchEntry};
use crate::search::{GeocodedAddress, Geocoder, PoiSource, PointOfInterest, RemoteSearch};
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;

use super::client::{endpoint_url, HttpClient};

/// Region id carried by entries that came from the remote fallback.
pub const REMOTE_REGION_ID: &str = "";

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Listing<T> {
    Bare(Vec<T>),
    Wrapped { results: Vec<T> },
}

impl<T> Listing<T> {
    fn into_vec(self) -> Vec<T> {
        match self {
            Listing::Bare(items) | Listing::Wrapped { results: items } => items,
        }
    }
}

async fn fetch_in_bounds<T: serde::de::DeserializeOwned>(
    client: &HttpClient,
    base: &str,
    bounds: &BoundingBox,
) -> Result<Vec<T>> {
    let url = endpoint_url(base, &[("bbox", bounds.to_bbox_param())])?;
    let listing: Listing<T> = client.get_json(&url).await?;
    let items = listing.into_vec();
    debug!("Fetched {} records from {}", items.len(), base);
    Ok(items)
}

/// Geocoder backed by a JSON endpoint.
pub struct HttpGeocoder {
    client: Arc<HttpClient>,
    endpoint: String,
}

impl HttpGeocoder {
    pub fn new(client: Arc<HttpClient>, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl Geocoder for HttpGeocoder {
    async fn geocode(&self, bounds: &BoundingBox) -> Result<Vec<GeocodedAddress>> {
        fetch_in_bounds(&self.client, &self.endpoint, bounds).await
    }
}

/// POI source backed by a JSON endpoint.
pub struct HttpPoiSource {
    client: Arc<HttpClient>,
    endpoint: String,
}

impl HttpPoiSource {
    pub fn new(client: Arc<HttpClient>, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl PoiSource for HttpPoiSource {
    async fn search_pois(&self, bounds: &BoundingBox) -> Result<Vec<PointOfInterest>> {
        fetch_in_bounds(&self.client, &self.endpoint, bounds).await
    }
}

/// One hit from the remote search endpoint.
#[derive(Debug, Deserialize)]
struct RemoteHit {
    id: String,
    name: String,
    #[serde(default)]
    kind: Option<EntryKind>,
    #[serde(default)]
    category: Option<String>,
    latitude: f64,
    longitude: f64,
}

impl RemoteHit {
    fn into_entry(self) -> SearchEntry {
        let position = Coordinate::new(self.latitude, self.longitude);
        match (self.kind, self.category) {
            (Some(EntryKind::PointOfInterest), category) | (None, category @ Some(_)) => {
                SearchEntry::point_of_interest(
                    &self.id,
                    REMOTE_REGION_ID,
                    self.name,
                    category.as_deref().unwrap_or_default(),
                    position,
                )
            }
            _ => SearchEntry::address(&self.id, REMOTE_REGION_ID, self.name, position),
        }
    }
}

/// Free-text search against a JSON endpoint (`?q=...&limit=...`).
pub struct HttpRemoteSearch {
    client: Arc<HttpClient>,
    endpoint: String,
}

impl HttpRemoteSearch {
    pub fn new(client: Arc<HttpClient>, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl RemoteSearch for HttpRemoteSearch {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchEntry>> {
        let url = endpoint_url(
            &self.endpoint,
            &[("q", query.to_string()), ("limit", limit.to_string())],
        )?;
        let listing: Listing<RemoteHit> = self.client.get_json(&url).await?;
        Ok(listing
            .into_vec()
            .into_iter()
            .filter(|hit| Coordinate::new(hit.latitude, hit.longitude).validate().is_ok())
            .map(RemoteHit::into_entry)
            .take(limit)
            .collect())
    }
}
