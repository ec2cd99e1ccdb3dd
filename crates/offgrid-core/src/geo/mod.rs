//! Geographic primitives.
//!
//! This module provides:
//! - Coordinates, bounding boxes and zoom ranges
//! - Bounding-box derivation from a buffered path
//! - Slippy-map tile enumeration for a box and zoom range

mod bounds;
mod tiles;
mod types;

pub use bounds::{compute_bounding_box, KM_PER_DEGREE_LAT, KM_PER_DEGREE_LNG_AT_EQUATOR};
pub use tiles::{tile_ranges, total_tiles, TileCoord, TileRange};
pub use types::{BoundingBox, Coordinate, ZoomRange};
