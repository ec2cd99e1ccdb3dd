//! Tile source collaborator.

use crate::error::Result;
use crate::geo::{BoundingBox, ZoomRange};
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;

/// One unit of downloaded region data.
#[derive(Debug, Clone, PartialEq)]
pub struct TileChunk {
    /// Relative artifact path, usually `z/x/y`.
    pub key: String,
    pub data: Bytes,
    /// Units completed including this one.
    pub completed: u64,
    pub total: u64,
}

impl TileChunk {
    /// Completed fraction in `[0, 1]`.
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            (self.completed as f64 / self.total as f64).clamp(0.0, 1.0)
        }
    }
}

pub type TileStream = BoxStream<'static, Result<TileChunk>>;

/// Fetches the tile data of a region.
///
/// The region cache is the only caller.
#[async_trait]
pub trait TileSource: Send + Sync {
    async fn fetch(&self, bounds: BoundingBox, zoom: ZoomRange) -> Result<TileStream>;
}
