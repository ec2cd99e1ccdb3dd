//! Tile source fetching XYZ tiles over HTTP.

use crate::config::{NetworkConfig, RegionConfig};
use crate::error::{OffgridError, Result};
use crate::geo::{tile_ranges, total_tiles, BoundingBox, TileCoord, ZoomRange};
use crate::region::{TileChunk, TileSource, TileStream};
use async_trait::async_trait;
use futures::StreamExt;
use std::sync::Arc;
use tracing::debug;

use super::client::HttpClient;

/// Fetches every tile of a region from a `{z}/{x}/{y}` URL template.
///
/// Tiles are requested a few at a time and yielded in order. Missing tiles
/// (404/204) yield empty chunks so progress still advances.
pub struct HttpTileSource {
    client: Arc<HttpClient>,
    template: String,
    concurrency: usize,
}

impl HttpTileSource {
    pub fn new(client: Arc<HttpClient>, template: impl Into<String>) -> Result<Self> {
        let template = template.into();
        for placeholder in ["{z}", "{x}", "{y}"] {
            if !template.contains(placeholder) {
                return Err(OffgridError::Config {
                    message: format!(
                        "Tile URL template {:?} is missing {}",
                        template, placeholder
                    ),
                });
            }
        }
        Ok(Self {
            client,
            template,
            concurrency: NetworkConfig::TILE_CONCURRENCY,
        })
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }
}

#[async_trait]
impl TileSource for HttpTileSource {
    async fn fetch(&self, bounds: BoundingBox, zoom: ZoomRange) -> Result<TileStream> {
        let total = total_tiles(&bounds, zoom);
        if total > RegionConfig::MAX_TILES_PER_REGION {
            return Err(OffgridError::invalid(
                "bounds",
                format!(
                    "region needs {} tiles, more than the limit of {}",
                    total,
                    RegionConfig::MAX_TILES_PER_REGION
                ),
            ));
        }

        let tiles: Vec<TileCoord> = tile_ranges(&bounds, zoom)
            .iter()
            .flat_map(|range| range.iter().collect::<Vec<_>>())
            .collect();
        debug!("Fetching {} tiles for zoom {}-{}", total, zoom.min, zoom.max);

        let client = self.client.clone();
        let template = self.template.clone();
        let stream = futures::stream::iter(tiles.into_iter().enumerate())
            .map(move |(index, tile)| {
                let client = client.clone();
                let url = tile.fill_template(&template);
                async move {
                    let data = client.get_bytes(&url).await?.unwrap_or_default();
                    Ok::<_, OffgridError>(TileChunk {
                        key: tile.key(),
                        data,
                        completed: index as u64 + 1,
                        total,
                    })
                }
            })
            .buffered(self.concurrency);

        Ok(stream.boxed())
    }
}
