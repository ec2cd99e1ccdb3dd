//! Preparing the area around a route for offline use.

use crate::cancel::CancellationToken;
use crate::config::RegionConfig;
use crate::error::{OffgridError, Result};
use crate::geo::{compute_bounding_box, Coordinate, ZoomRange};
use crate::region::{RegionCache, RegionDescriptor, RegionKind, RegionRequest};
use crate::search::{BuildSummary, OfflineSearchOrchestrator};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// A planned route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    pub id: String,
    pub coordinates: Vec<Coordinate>,
}

impl Route {
    pub fn new(id: impl Into<String>, coordinates: Vec<Coordinate>) -> Self {
        Self {
            id: id.into(),
            coordinates,
        }
    }

    /// Id of the region holding this route's area.
    pub fn region_id(&self) -> String {
        format!("{}{}", RegionConfig::ROUTE_ID_PREFIX, self.id)
    }
}

/// Step reported while a route area is prepared.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RoutePhase {
    Downloading { progress: f64 },
    Indexing,
}

/// A route area that is ready offline.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteArea {
    pub region: RegionDescriptor,
    pub index: BuildSummary,
}

/// Downloads a buffered box around a route, then builds its search data.
#[derive(Clone)]
pub struct RouteAreaTask {
    regions: RegionCache,
    search: Arc<OfflineSearchOrchestrator>,
    buffer_km: f64,
    zoom: ZoomRange,
    ttl: Duration,
}

impl RouteAreaTask {
    pub fn new(regions: RegionCache, search: Arc<OfflineSearchOrchestrator>) -> Self {
        Self {
            regions,
            search,
            buffer_km: RegionConfig::DEFAULT_BUFFER_KM,
            zoom: ZoomRange::default(),
            ttl: RegionConfig::DEFAULT_TTL,
        }
    }

    pub fn with_buffer_km(mut self, buffer_km: f64) -> Self {
        self.buffer_km = buffer_km;
        self
    }

    pub fn with_zoom(mut self, zoom: ZoomRange) -> Self {
        self.zoom = zoom;
        self
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Region request for `route` without starting anything.
    pub fn region_request(&self, route: &Route) -> Result<RegionRequest> {
        if route.id.trim().is_empty() {
            return Err(OffgridError::invalid("route_id", "must not be empty"));
        }
        let bounds = compute_bounding_box(&route.coordinates, self.buffer_km)?;
        Ok(RegionRequest::new(
            route.region_id(),
            format!("Route {}", route.id),
            bounds,
        )
        .with_zoom(self.zoom)
        .with_kind(RegionKind::Route)
        .with_ttl(self.ttl))
    }

    /// Download the route area and index it.
    ///
    /// Cancelling `cancel` stops the download (or detaches if others share
    /// it) and yields `RegionCancelled`.
    pub async fn run<F>(
        &self,
        route: &Route,
        cancel: CancellationToken,
        mut on_phase: F,
    ) -> Result<RouteArea>
    where
        F: FnMut(RoutePhase),
    {
        let request = self.region_request(route)?;
        let region_id = request.id.clone();
        info!(region_id = %region_id, points = route.coordinates.len(), "Preparing route area");

        let region = self
            .regions
            .request_download(request)
            .await?
            .with_cancel(cancel.clone())
            .wait_with_progress(|progress| on_phase(RoutePhase::Downloading { progress }))
            .await?;

        let cancelled = || OffgridError::RegionCancelled {
            region_id: region_id.clone(),
        };
        if cancel.is_cancelled() {
            return Err(cancelled());
        }

        on_phase(RoutePhase::Indexing);
        let index = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(cancelled()),
            summary = self.search.build_region_index(&region_id) => summary?,
        };

        Ok(RouteArea { region, index })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_region_naming() {
        let route = Route::new("42", vec![Coordinate::new(1.0, 1.0)]);
        assert_eq!(route.region_id(), "route-42");
    }
}
