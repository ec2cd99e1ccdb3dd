//! Slippy-map (Web Mercator XYZ) tile enumeration.

use super::types::{BoundingBox, ZoomRange};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Latitude limit of the Web Mercator projection.
const MAX_MERCATOR_LAT: f64 = 85.051_128_78;

/// A single XYZ tile address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TileCoord {
    pub z: u8,
    pub x: u32,
    pub y: u32,
}

impl TileCoord {
    /// Relative artifact key, `z/x/y`.
    pub fn key(&self) -> String {
        format!("{}/{}/{}", self.z, self.x, self.y)
    }

    /// Expand a `{z}/{x}/{y}` URL template.
    pub fn fill_template(&self, template: &str) -> String {
        template
            .replace("{z}", &self.z.to_string())
            .replace("{x}", &self.x.to_string())
            .replace("{y}", &self.y.to_string())
    }
}

/// Inclusive block of tiles at one zoom level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileRange {
    pub zoom: u8,
    pub min_x: u32,
    pub max_x: u32,
    pub min_y: u32,
    pub max_y: u32,
}

impl TileRange {
    /// Tiles covering `bounds` at `zoom`.
    pub fn covering(bounds: &BoundingBox, zoom: u8) -> Self {
        let (min_x, max_y) = lat_lng_to_tile(bounds.min_lat, bounds.min_lng, zoom);
        let (max_x, min_y) = lat_lng_to_tile(bounds.max_lat, bounds.max_lng, zoom);
        Self {
            zoom,
            min_x,
            max_x,
            min_y,
            max_y,
        }
    }

    pub fn count(&self) -> u64 {
        (self.max_x - self.min_x + 1) as u64 * (self.max_y - self.min_y + 1) as u64
    }

    pub fn iter(&self) -> impl Iterator<Item = TileCoord> + '_ {
        (self.min_x..=self.max_x).flat_map(move |x| {
            (self.min_y..=self.max_y).map(move |y| TileCoord {
                z: self.zoom,
                x,
                y,
            })
        })
    }
}

/// One tile range per zoom level.
pub fn tile_ranges(bounds: &BoundingBox, zoom: ZoomRange) -> Vec<TileRange> {
    zoom.levels()
        .map(|z| TileRange::covering(bounds, z))
        .collect()
}

/// Number of tiles a region download fetches.
pub fn total_tiles(bounds: &BoundingBox, zoom: ZoomRange) -> u64 {
    tile_ranges(bounds, zoom).iter().map(TileRange::count).sum()
}

fn lat_lng_to_tile(lat: f64, lng: f64, zoom: u8) -> (u32, u32) {
    let n = 2f64.powi(zoom as i32);
    let max_index = (n as u32).saturating_sub(1);
    let lat_rad = lat.clamp(-MAX_MERCATOR_LAT, MAX_MERCATOR_LAT).to_radians();

    let x = ((lng + 180.0) / 360.0 * n).floor();
    let y = ((1.0 - (lat_rad.tan() + 1.0 / lat_rad.cos()).ln() / PI) / 2.0 * n).floor();

    let clamp = |v: f64| (v.max(0.0) as u32).min(max_index);
    (clamp(x), clamp(y))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zoom_zero_is_single_tile() {
        let world = BoundingBox::new(-85.0, 85.0, -180.0, 180.0).unwrap();
        let range = TileRange::covering(&world, 0);
        assert_eq!(range.count(), 1);
        assert_eq!(range.iter().next(), Some(TileCoord { z: 0, x: 0, y: 0 }));
    }

    #[test]
    fn test_known_tile() {
        // Berlin at z10 is tile 550/335.
        assert_eq!(lat_lng_to_tile(52.52, 13.405, 10), (550, 335));
    }

    #[test]
    fn test_counts_grow_with_zoom() {
        let bbox = BoundingBox::new(40.70, 40.78, -74.02, -73.93).unwrap();
        let ranges = tile_ranges(&bbox, ZoomRange::new(12, 14).unwrap());
        assert_eq!(ranges.len(), 3);
        assert!(ranges[0].count() <= ranges[1].count());
        assert!(ranges[1].count() <= ranges[2].count());
        assert_eq!(
            total_tiles(&bbox, ZoomRange::new(12, 14).unwrap()),
            ranges.iter().map(TileRange::count).sum::<u64>()
        );
    }

    #[test]
    fn test_template_and_key() {
        let tile = TileCoord { z: 3, x: 4, y: 2 };
        assert_eq!(tile.key(), "3/4/2");
        assert_eq!(
            tile.fill_template("https://tiles.example/{z}/{x}/{y}.pbf"),
            "https://tiles.example/3/4/2.pbf"
        );
    }
}
