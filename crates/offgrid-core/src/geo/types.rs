//! Coordinate, bounding box and zoom range types.

use crate::config::RegionConfig;
use crate::error::{OffgridError, Result};
use serde::{Deserialize, Serialize};

/// A WGS84 position in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Reject non-finite or out-of-range positions.
    pub fn validate(&self) -> Result<()> {
        if !self.latitude.is_finite() || !(-90.0..=90.0).contains(&self.latitude) {
            return Err(OffgridError::invalid(
                "latitude",
                format!("{} is outside [-90, 90]", self.latitude),
            ));
        }
        if !self.longitude.is_finite() || !(-180.0..=180.0).contains(&self.longitude) {
            return Err(OffgridError::invalid(
                "longitude",
                format!("{} is outside [-180, 180]", self.longitude),
            ));
        }
        Ok(())
    }
}

impl From<(f64, f64)> for Coordinate {
    fn from((latitude, longitude): (f64, f64)) -> Self {
        Self::new(latitude, longitude)
    }
}

/// Rectangular lat/lng extent.
///
/// Invariant: `min_lat <= max_lat` and `min_lng <= max_lng`. Boxes never wrap
/// the antimeridian.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoundingBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
}

impl BoundingBox {
    /// Create a box, validating corner order and ranges.
    pub fn new(min_lat: f64, max_lat: f64, min_lng: f64, max_lng: f64) -> Result<Self> {
        Coordinate::new(min_lat, min_lng).validate()?;
        Coordinate::new(max_lat, max_lng).validate()?;
        if min_lat > max_lat {
            return Err(OffgridError::invalid(
                "bounds",
                format!("min_lat {} exceeds max_lat {}", min_lat, max_lat),
            ));
        }
        if min_lng > max_lng {
            return Err(OffgridError::invalid(
                "bounds",
                format!("min_lng {} exceeds max_lng {}", min_lng, max_lng),
            ));
        }
        Ok(Self {
            min_lat,
            max_lat,
            min_lng,
            max_lng,
        })
    }

    /// Re-check the invariant on a box that came from outside (e.g. storage).
    pub fn validate(&self) -> Result<()> {
        Self::new(self.min_lat, self.max_lat, self.min_lng, self.max_lng).map(|_| ())
    }

    pub fn contains(&self, point: &Coordinate) -> bool {
        (self.min_lat..=self.max_lat).contains(&point.latitude)
            && (self.min_lng..=self.max_lng).contains(&point.longitude)
    }

    /// True when `other` lies entirely inside this box.
    pub fn contains_box(&self, other: &BoundingBox) -> bool {
        self.min_lat <= other.min_lat
            && self.max_lat >= other.max_lat
            && self.min_lng <= other.min_lng
            && self.max_lng >= other.max_lng
    }

    pub fn center(&self) -> Coordinate {
        Coordinate::new(
            (self.min_lat + self.max_lat) / 2.0,
            (self.min_lng + self.max_lng) / 2.0,
        )
    }

    /// `minLng,minLat,maxLng,maxLat`, the usual `bbox` query parameter order.
    pub fn to_bbox_param(&self) -> String {
        format!(
            "{},{},{},{}",
            self.min_lng, self.min_lat, self.max_lng, self.max_lat
        )
    }
}

/// Inclusive zoom level range of a region download.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoomRange {
    pub min: u8,
    pub max: u8,
}

impl ZoomRange {
    pub fn new(min: u8, max: u8) -> Result<Self> {
        if min > max {
            return Err(OffgridError::invalid(
                "zoom",
                format!("min zoom {} exceeds max zoom {}", min, max),
            ));
        }
        if max > RegionConfig::MAX_ZOOM_LIMIT {
            return Err(OffgridError::invalid(
                "zoom",
                format!(
                    "max zoom {} exceeds limit {}",
                    max,
                    RegionConfig::MAX_ZOOM_LIMIT
                ),
            ));
        }
        Ok(Self { min, max })
    }

    pub fn levels(&self) -> impl Iterator<Item = u8> {
        self.min..=self.max
    }
}

impl Default for ZoomRange {
    fn default() -> Self {
        Self {
            min: RegionConfig::DEFAULT_MIN_ZOOM,
            max: RegionConfig::DEFAULT_MAX_ZOOM,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coordinate_validation() {
        assert!(Coordinate::new(52.5, 13.4).validate().is_ok());
        assert!(Coordinate::new(91.0, 0.0).validate().is_err());
        assert!(Coordinate::new(0.0, -180.5).validate().is_err());
        assert!(Coordinate::new(f64::NAN, 0.0).validate().is_err());
    }

    #[test]
    fn test_box_rejects_inverted_corners() {
        assert!(BoundingBox::new(10.0, 9.0, 0.0, 1.0).is_err());
        assert!(BoundingBox::new(9.0, 10.0, 2.0, 1.0).is_err());

        let bbox = BoundingBox::new(9.0, 10.0, 1.0, 2.0).unwrap();
        assert!(bbox.contains(&Coordinate::new(9.5, 1.5)));
        assert!(!bbox.contains(&Coordinate::new(10.5, 1.5)));
        assert_eq!(bbox.center(), Coordinate::new(9.5, 1.5));
        assert_eq!(bbox.to_bbox_param(), "1,9,2,10");
    }

    #[test]
    fn test_zoom_range() {
        assert_eq!(ZoomRange::default(), ZoomRange::new(12, 16).unwrap());
        assert!(ZoomRange::new(5, 4).is_err());
        assert!(ZoomRange::new(0, 23).is_err());
        assert_eq!(ZoomRange::new(3, 5).unwrap().levels().count(), 3);
    }
}
