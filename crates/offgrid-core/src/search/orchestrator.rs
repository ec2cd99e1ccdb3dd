//! Offline search orchestration.
//!
//! Builds a region's search data from the geocoding and POI collaborators and
//! answers queries from the local index, falling back to a remote search
//! when online and the local results are too few.

use crate::config::SearchConfig;
use crate::error::{OffgridError, Result};
use crate::index::{normalize_search_text, SearchEntry, SearchIndex, SearchOptions};
use crate::region::{RegionCache, RegionStatus};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

use super::sources::{ConnectivitySignal, Geocoder, PoiSource, RemoteSearch};

/// Name reported when the geocoder fails a build.
pub const GEOCODING_SOURCE: &str = "geocoding";
/// Name reported when the POI source fails a build.
pub const POI_SOURCE: &str = "poi";

/// What a region index build committed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildSummary {
    pub region_id: String,
    pub addresses: usize,
    pub points_of_interest: usize,
    /// Collaborator records dropped for missing ids or invalid positions.
    pub skipped: usize,
}

impl BuildSummary {
    pub fn total(&self) -> usize {
        self.addresses + self.points_of_interest
    }
}

/// Local results followed by any remote fallback results.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResults {
    /// Normalized query that was matched.
    pub query: String,
    pub local: Vec<SearchEntry>,
    /// Never persisted.
    pub remote: Vec<SearchEntry>,
    /// Set when the remote fallback was attempted and failed.
    pub remote_error: Option<String>,
}

impl SearchResults {
    /// Local entries first, then remote ones.
    pub fn entries(&self) -> impl Iterator<Item = &SearchEntry> {
        self.local.iter().chain(self.remote.iter())
    }

    pub fn len(&self) -> usize {
        self.local.len() + self.remote.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Coordinates region search data and queries.
pub struct OfflineSearchOrchestrator {
    regions: RegionCache,
    index: Arc<SearchIndex>,
    geocoder: Arc<dyn Geocoder>,
    pois: Arc<dyn PoiSource>,
    connectivity: Arc<dyn ConnectivitySignal>,
    remote: Option<Arc<dyn RemoteSearch>>,
    fallback_threshold: usize,
}

impl OfflineSearchOrchestrator {
    pub fn new(
        regions: RegionCache,
        index: Arc<SearchIndex>,
        geocoder: Arc<dyn Geocoder>,
        pois: Arc<dyn PoiSource>,
        connectivity: Arc<dyn ConnectivitySignal>,
    ) -> Self {
        Self {
            regions,
            index,
            geocoder,
            pois,
            connectivity,
            remote: None,
            fallback_threshold: SearchConfig::DEFAULT_FALLBACK_THRESHOLD,
        }
    }

    /// Enable the remote fallback.
    pub fn with_remote(mut self, remote: Arc<dyn RemoteSearch>) -> Self {
        self.remote = Some(remote);
        self
    }

    /// Fall back to remote search when at most this many local results exist.
    pub fn with_fallback_threshold(mut self, threshold: usize) -> Self {
        self.fallback_threshold = threshold;
        self
    }

    pub fn index(&self) -> &Arc<SearchIndex> {
        &self.index
    }

    /// Fetch addresses and POIs for a ready region and index them.
    ///
    /// Both collaborators run concurrently. If either fails, nothing is
    /// written and the error names the failing source. If the region is
    /// evicted or re-downloaded before the entries are committed, nothing is
    /// written and `RegionNotFound` is returned.
    pub async fn build_region_index(&self, region_id: &str) -> Result<BuildSummary> {
        let (descriptor, lease) =
            self.regions
                .lease(region_id)?
                .ok_or_else(|| OffgridError::RegionNotFound {
                    region_id: region_id.to_string(),
                })?;
        if descriptor.status != RegionStatus::Ready {
            return Err(OffgridError::RegionNotReady {
                region_id: region_id.to_string(),
                status: descriptor.status.to_string(),
            });
        }

        let start = Instant::now();
        let bounds = descriptor.bounds;
        let (addresses, pois) = tokio::join!(
            self.geocoder.geocode(&bounds),
            self.pois.search_pois(&bounds)
        );
        let addresses = addresses.map_err(|e| build_failure(region_id, GEOCODING_SOURCE, e))?;
        let pois = pois.map_err(|e| build_failure(region_id, POI_SOURCE, e))?;

        let mut skipped = 0;
        let mut entries = Vec::with_capacity(addresses.len() + pois.len());
        let mut address_count = 0;
        for address in &addresses {
            if address.id.trim().is_empty() || address.position().validate().is_err() {
                skipped += 1;
                continue;
            }
            entries.push(SearchEntry::address(
                &address.id,
                region_id,
                &address.formatted_address,
                address.position(),
            ));
            address_count += 1;
        }
        let mut poi_count = 0;
        for poi in &pois {
            if poi.id.trim().is_empty() || poi.position().validate().is_err() {
                skipped += 1;
                continue;
            }
            entries.push(SearchEntry::point_of_interest(
                &poi.id,
                region_id,
                &poi.name,
                &poi.category,
                poi.position(),
            ));
            poi_count += 1;
        }
        if skipped > 0 {
            warn!(region_id = %region_id, skipped, "Skipped malformed search records");
        }

        // The region may have been evicted or replaced while the
        // collaborators ran.
        self.regions
            .commit_leased(&lease, || self.index.upsert(&entries, region_id))?;

        info!(
            region_id = %region_id,
            addresses = address_count,
            points_of_interest = poi_count,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Built region search index"
        );
        Ok(BuildSummary {
            region_id: region_id.to_string(),
            addresses: address_count,
            points_of_interest: poi_count,
            skipped,
        })
    }

    /// Search local data, augmenting with remote results when allowed.
    ///
    /// Remote failures never fail the search; they are reported in
    /// [`SearchResults::remote_error`].
    pub async fn search(&self, query: &str, options: &SearchOptions) -> Result<SearchResults> {
        let normalized = normalize_search_text(query);
        if normalized.is_empty() || options.limit == 0 {
            return Ok(SearchResults {
                query: normalized,
                ..Default::default()
            });
        }

        let local = self.index.search(&normalized, options)?;
        let mut results = SearchResults {
            query: normalized,
            local,
            ..Default::default()
        };

        let remote = match &self.remote {
            Some(remote) if self.should_fall_back(results.local.len(), options.limit) => remote,
            _ => return Ok(results),
        };

        debug!(
            query = %results.query,
            local = results.local.len(),
            "Falling back to remote search"
        );
        match remote.search(query.trim(), options.limit).await {
            Ok(found) => {
                let mut seen: HashSet<String> =
                    results.local.iter().map(|entry| entry.id.clone()).collect();
                let room = options.limit - results.local.len();
                let mut extra = Vec::new();
                for entry in found {
                    if extra.len() == room {
                        break;
                    }
                    if options.kind.is_some_and(|kind| kind != entry.kind) {
                        continue;
                    }
                    if seen.insert(entry.id.clone()) {
                        extra.push(entry);
                    }
                }
                results.remote = extra;
            }
            Err(e) => {
                warn!(query = %results.query, "Remote search failed: {}", e);
                results.remote_error = Some(e.to_string());
            }
        }
        Ok(results)
    }

    fn should_fall_back(&self, local_count: usize, limit: usize) -> bool {
        local_count <= self.fallback_threshold
            && local_count < limit
            && self.connectivity.is_online()
    }
}

fn build_failure(region_id: &str, source_name: &str, err: OffgridError) -> OffgridError {
    error!(
        region_id = %region_id,
        source = source_name,
        "Search data source failed: {}",
        err
    );
    OffgridError::PartialBuildFailure {
        region_id: region_id.to_string(),
        source_name: source_name.to_string(),
        message: err.to_string(),
    }
}
