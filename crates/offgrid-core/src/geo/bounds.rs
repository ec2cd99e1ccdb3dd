//! Bounding-box derivation for a buffered path.

use super::types::{BoundingBox, Coordinate};
use crate::error::{OffgridError, Result};

/// Kilometres per degree of latitude.
pub const KM_PER_DEGREE_LAT: f64 = 110.574;

/// Kilometres per degree of longitude at the equator; scaled by cos(latitude).
pub const KM_PER_DEGREE_LNG_AT_EQUATOR: f64 = 111.320;

/// Below this cosine a longitude buffer covers every meridian.
const MIN_LONGITUDE_SCALE: f64 = 1e-6;

/// Compute the box covering `path` plus `buffer_km` on every side.
///
/// The longitude margin is converted with the cosine of the highest absolute
/// latitude of the buffered box, so the box is never narrower than the buffer
/// anywhere inside it. Results are clamped to the valid coordinate range.
///
/// Paths whose consecutive points are more than 180° of longitude apart are
/// treated as crossing the antimeridian and rejected; split those routes into
/// one path per side before calling.
pub fn compute_bounding_box(path: &[Coordinate], buffer_km: f64) -> Result<BoundingBox> {
    let first = path
        .first()
        .ok_or_else(|| OffgridError::invalid("path", "must contain at least one coordinate"))?;

    if !buffer_km.is_finite() || buffer_km < 0.0 {
        return Err(OffgridError::invalid(
            "buffer_km",
            format!("must be a non-negative number, got {}", buffer_km),
        ));
    }

    for point in path {
        point.validate()?;
    }

    if let Some(pair) = path
        .windows(2)
        .find(|pair| (pair[1].longitude - pair[0].longitude).abs() > 180.0)
    {
        return Err(OffgridError::invalid(
            "path",
            format!(
                "segment from {} to {} crosses the antimeridian",
                pair[0].longitude, pair[1].longitude
            ),
        ));
    }

    let (mut min_lat, mut max_lat) = (first.latitude, first.latitude);
    let (mut min_lng, mut max_lng) = (first.longitude, first.longitude);
    for point in &path[1..] {
        min_lat = min_lat.min(point.latitude);
        max_lat = max_lat.max(point.latitude);
        min_lng = min_lng.min(point.longitude);
        max_lng = max_lng.max(point.longitude);
    }

    let lat_margin = buffer_km / KM_PER_DEGREE_LAT;
    let min_lat = (min_lat - lat_margin).max(-90.0);
    let max_lat = (max_lat + lat_margin).min(90.0);

    let (min_lng, max_lng) = if buffer_km == 0.0 {
        (min_lng, max_lng)
    } else {
        let widest_lat = min_lat.abs().max(max_lat.abs());
        let scale = widest_lat.to_radians().cos();
        if scale <= MIN_LONGITUDE_SCALE {
            (-180.0, 180.0)
        } else {
            let lng_margin = buffer_km / (KM_PER_DEGREE_LNG_AT_EQUATOR * scale);
            ((min_lng - lng_margin).max(-180.0), (max_lng + lng_margin).min(180.0))
        }
    };

    Ok(BoundingBox {
        min_lat,
        max_lat,
        min_lng,
        max_lng,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn route() -> Vec<Coordinate> {
        vec![
            Coordinate::new(40.7128, -74.0060),
            Coordinate::new(40.7306, -73.9866),
            Coordinate::new(40.7580, -73.9855),
        ]
    }

    #[test]
    fn test_empty_path_rejected() {
        let err = compute_bounding_box(&[], 1.0).unwrap_err();
        assert_eq!(err.code(), "invalid_input");
    }

    #[test]
    fn test_negative_buffer_rejected() {
        assert!(compute_bounding_box(&route(), -0.5).is_err());
        assert!(compute_bounding_box(&route(), f64::INFINITY).is_err());
    }

    #[test]
    fn test_single_point_is_centered() {
        let point = Coordinate::new(10.0, 20.0);
        let bbox = compute_bounding_box(&[point], 5.0).unwrap();

        let center = bbox.center();
        assert!((center.latitude - 10.0).abs() < 1e-9);
        assert!((center.longitude - 20.0).abs() < 1e-9);

        let lat_margin = 5.0 / KM_PER_DEGREE_LAT;
        assert!((bbox.max_lat - 10.0 - lat_margin).abs() < 1e-9);
        assert!(bbox.max_lng - 20.0 > lat_margin * 0.9);
    }

    #[test]
    fn test_contains_every_point() {
        let path = route();
        for buffer in [0.0, 0.5, 2.0, 25.0] {
            let bbox = compute_bounding_box(&path, buffer).unwrap();
            for point in &path {
                assert!(bbox.contains(point), "buffer {} misses {:?}", buffer, point);
            }
        }
    }

    #[test]
    fn test_larger_buffer_never_shrinks() {
        let path = route();
        let mut previous = compute_bounding_box(&path, 0.0).unwrap();
        for buffer in [0.1, 1.0, 2.0, 10.0, 100.0, 5_000.0] {
            let current = compute_bounding_box(&path, buffer).unwrap();
            assert!(current.contains_box(&previous), "buffer {} shrank", buffer);
            previous = current;
        }
    }

    #[test]
    fn test_high_latitude_is_wider_in_degrees() {
        let equator = compute_bounding_box(&[Coordinate::new(0.0, 0.0)], 10.0).unwrap();
        let north = compute_bounding_box(&[Coordinate::new(70.0, 0.0)], 10.0).unwrap();

        let equator_width = equator.max_lng - equator.min_lng;
        let north_width = north.max_lng - north.min_lng;
        assert!(north_width > equator_width * 2.5);
    }

    #[test]
    fn test_pole_covers_all_longitudes() {
        let bbox = compute_bounding_box(&[Coordinate::new(89.999, 10.0)], 5.0).unwrap();
        assert_eq!(bbox.max_lat, 90.0);
        assert_eq!(bbox.min_lng, -180.0);
        assert_eq!(bbox.max_lng, 180.0);
    }

    #[test]
    fn test_antimeridian_crossing_rejected() {
        let path = vec![Coordinate::new(-17.0, 179.5), Coordinate::new(-17.1, -179.5)];
        let err = compute_bounding_box(&path, 1.0).unwrap_err();
        assert!(err.to_string().contains("antimeridian"));
    }

    #[test]
    fn test_deterministic() {
        let a = compute_bounding_box(&route(), 2.0).unwrap();
        let b = compute_bounding_box(&route(), 2.0).unwrap();
        assert_eq!(a, b);
    }
}
