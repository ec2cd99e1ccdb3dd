//! Command handlers. Each returns the JSON value printed by `main`.

use crate::{Command, RegionsAction};
use anyhow::{bail, Context, Result};
use offgrid_core::{
    compute_bounding_box, CancellationToken, Coordinate, EntryKind, OfflineSession, Route,
    RoutePhase, SearchOptions, SearchResults,
};
use serde_json::{json, Value};
use std::path::Path;
use tracing::{info, warn};

pub(crate) async fn run(session: &OfflineSession, command: Command) -> Result<Value> {
    match command {
        Command::Bbox { points, buffer_km } => bbox(&points, buffer_km),
        Command::PrepareRoute { route_file } => prepare_route(session, &route_file).await,
        Command::Search {
            query,
            region,
            limit,
            kind,
        } => search(session, &query, region, limit, kind.map(Into::into)).await,
        Command::Regions { action } => match action {
            RegionsAction::List => list_regions(session),
            RegionsAction::Evict { region_id } => evict(session, &region_id).await,
            RegionsAction::Sweep => sweep(session).await,
        },
    }
}

/// Parse a "lat,lng" pair.
pub(crate) fn parse_point(raw: &str) -> Result<Coordinate> {
    let Some((lat, lng)) = raw.split_once(',') else {
        bail!("Point must be \"lat,lng\", got {:?}", raw);
    };
    let latitude: f64 = lat.trim().parse().with_context(|| format!("Bad latitude in {:?}", raw))?;
    let longitude: f64 = lng
        .trim()
        .parse()
        .with_context(|| format!("Bad longitude in {:?}", raw))?;
    Ok(Coordinate::new(latitude, longitude))
}

pub(crate) fn bbox(points: &[String], buffer_km: f64) -> Result<Value> {
    let path = points
        .iter()
        .map(|raw| parse_point(raw))
        .collect::<Result<Vec<_>>>()?;
    let bounds = compute_bounding_box(&path, buffer_km)?;
    Ok(serde_json::to_value(bounds)?)
}

async fn prepare_route(session: &OfflineSession, route_file: &Path) -> Result<Value> {
    let content = std::fs::read_to_string(route_file)
        .with_context(|| format!("Failed to read {}", route_file.display()))?;
    let route: Route = serde_json::from_str(&content)
        .with_context(|| format!("Invalid route file {}", route_file.display()))?;

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    let signal = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling download");
            on_signal.cancel();
        }
    });

    let mut last_reported = -1.0;
    let result = session
        .route_area_task()?
        .run(&route, cancel, |phase| match phase {
            RoutePhase::Downloading { progress } => {
                if progress >= 1.0 || progress - last_reported >= 0.1 {
                    info!("Downloading tiles: {:.0}%", progress * 100.0);
                    last_reported = progress;
                }
            }
            RoutePhase::Indexing => info!("Building search data"),
        })
        .await;
    signal.abort();

    let area = result?;
    info!(
        region_id = %area.region.id,
        entries = area.index.total(),
        "Route area ready"
    );
    Ok(serde_json::to_value(area)?)
}

async fn search(
    session: &OfflineSession,
    query: &str,
    region: Option<String>,
    limit: Option<usize>,
    kind: Option<EntryKind>,
) -> Result<Value> {
    let query = query.trim();
    if query.is_empty() {
        return Ok(serde_json::to_value(SearchResults::default())?);
    }

    let options = SearchOptions {
        region_id: region,
        kind,
        limit: limit.unwrap_or(session.config().default_limit),
    };
    let results = session.search().search(query, &options).await?;
    Ok(serde_json::to_value(results)?)
}

fn list_regions(session: &OfflineSession) -> Result<Value> {
    let regions = session.regions().list()?;
    Ok(serde_json::to_value(regions)?)
}

async fn evict(session: &OfflineSession, region_id: &str) -> Result<Value> {
    let removed = session.regions().evict(region_id).await?;
    Ok(json!({ "regionId": region_id, "removed": removed }))
}

async fn sweep(session: &OfflineSession) -> Result<Value> {
    let evicted = session.regions().sweep_expired_now().await?;
    Ok(json!({ "evicted": evicted }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_point() {
        let point = parse_point("52.5, 13.4").unwrap();
        assert_eq!(point, Coordinate::new(52.5, 13.4));
        assert!(parse_point("52.5").is_err());
        assert!(parse_point("north,13.4").is_err());
    }

    #[test]
    fn test_bbox_output() {
        let value = bbox(&["0,0".to_string(), "0.1,0.1".to_string()], 0.0).unwrap();
        assert_eq!(value["minLat"], 0.0);
        assert_eq!(value["maxLng"], 0.1);
    }
}
