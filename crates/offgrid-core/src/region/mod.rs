//! Offline region cache.
//!
//! This module provides:
//! - Region request and descriptor types
//! - SQLite descriptor storage
//! - Temp-then-rename tile artifact storage
//! - The download cache with in-flight deduplication, expiry and eviction

mod artifacts;
mod cache;
mod source;
mod store;
mod sweeper;
mod types;

pub use artifacts::{PartialArtifacts, TileArtifactStore};
pub use cache::{
    DownloadStats, DownloadTask, RegionCache, RegionEvictionListener, RegionLease,
};
pub use source::{TileChunk, TileSource, TileStream};
pub use store::RegionStore;
pub use sweeper::SweeperHandle;
pub use types::{validate_region_id, RegionDescriptor, RegionKind, RegionRequest, RegionStatus};
