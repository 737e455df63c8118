//! # Geographic Utilities
//!
//! Distance computations used by the track loader.
//!
//! | Function | Description |
//! |----------|-------------|
//! | [`haversine_distance`] | Great-circle distance between two GPS points |
//! | [`polyline_length`] | Length of one contiguous run of points |
//! | [`segmented_length`] | Total length of a track made of independent segments |
//!
//! ## Example
//!
//! ```rust
//! use gpx_sync::{GpsPoint, geo_utils};
//!
//! let segment = vec![
//!     GpsPoint::new(51.5074, -0.1278),
//!     GpsPoint::new(51.5080, -0.1290),
//!     GpsPoint::new(51.5090, -0.1300),
//! ];
//!
//! let length = geo_utils::polyline_length(&segment);
//! println!("Segment length: {:.0}m", length);
//! ```
//!
//! ## Algorithm Notes
//!
//! The haversine formula gives the great-circle distance on a spherical Earth and
//! ignores elevation, which matches how fitness services report horizontal
//! distance. It is accurate to within 0.3% for GPS track spacing.
//!
//! All functions expect WGS84 latitude/longitude in degrees.

use geo::{Distance, Haversine, Point};

use crate::GpsPoint;

// =============================================================================
// Distance Functions
// =============================================================================

/// Calculate the great-circle distance between two GPS points in meters.
///
/// # Example
///
/// ```rust
/// use gpx_sync::{GpsPoint, geo_utils};
///
/// let london = GpsPoint::new(51.5074, -0.1278);
/// let paris = GpsPoint::new(48.8566, 2.3522);
///
/// let distance = geo_utils::haversine_distance(&london, &paris);
/// assert!((distance - 343_560.0).abs() < 1000.0); // ~344 km
/// ```
#[inline]
pub fn haversine_distance(p1: &GpsPoint, p2: &GpsPoint) -> f64 {
    let point1 = Point::new(p1.longitude, p1.latitude);
    let point2 = Point::new(p2.longitude, p2.latitude);
    Haversine::distance(point1, point2)
}

/// Calculate the length of a contiguous polyline in meters.
///
/// Sums the haversine distance between consecutive points. Empty or single-point
/// input returns 0.0.
pub fn polyline_length(points: &[GpsPoint]) -> f64 {
    if points.len() < 2 {
        return 0.0;
    }

    points
        .windows(2)
        .map(|w| haversine_distance(&w[0], &w[1]))
        .sum()
}

/// Total length of a track recorded as several segments.
///
/// Each segment is measured on its own; the gap between the last point of one
/// segment and the first point of the next is never counted.
///
/// ```rust
/// use gpx_sync::{GpsPoint, geo_utils};
///
/// let a = vec![GpsPoint::new(0.0, 0.0), GpsPoint::new(0.0, 0.001)];
/// let b = vec![GpsPoint::new(10.0, 10.0), GpsPoint::new(10.0, 10.001)];
///
/// let total = geo_utils::segmented_length([a.as_slice(), b.as_slice()]);
/// assert!(total < 250.0);
/// ```
pub fn segmented_length<'a, I>(segments: I) -> f64
where
    I: IntoIterator<Item = &'a [GpsPoint]>,
{
    segments.into_iter().map(polyline_length).sum()
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: f64, b: f64, epsilon: f64) -> bool {
        (a - b).abs() < epsilon
    }

    #[test]
    fn test_haversine_distance_same_point() {
        let p = GpsPoint::new(51.5074, -0.1278);
        assert_eq!(haversine_distance(&p, &p), 0.0);
    }

    #[test]
    fn test_haversine_distance_known_value() {
        let london = GpsPoint::new(51.5074, -0.1278);
        let paris = GpsPoint::new(48.8566, 2.3522);
        let dist = haversine_distance(&london, &paris);
        assert!(approx_eq(dist, 343_560.0, 5000.0));
    }

    #[test]
    fn test_polyline_length_empty() {
        assert_eq!(polyline_length(&[]), 0.0);
    }

    #[test]
    fn test_polyline_length_single_point() {
        assert_eq!(polyline_length(&[GpsPoint::new(51.5, -0.1)]), 0.0);
    }

    #[test]
    fn test_polyline_length_two_points() {
        // 0.001 degrees of latitude is ~111m
        let points = vec![GpsPoint::new(51.500, -0.1), GpsPoint::new(51.501, -0.1)];
        let length = polyline_length(&points);
        assert!(approx_eq(length, 111.0, 2.0), "got {}", length);
    }

    #[test]
    fn test_segmented_length_skips_gaps() {
        let first = vec![GpsPoint::new(51.500, -0.1), GpsPoint::new(51.501, -0.1)];
        // Second segment starts ~1km away from where the first ended
        let second = vec![GpsPoint::new(51.510, -0.1), GpsPoint::new(51.511, -0.1)];

        let total = segmented_length([first.as_slice(), second.as_slice()]);
        let expected = polyline_length(&first) + polyline_length(&second);

        assert!(approx_eq(total, expected, 1e-9));
        assert!(total < 250.0, "gap between segments was counted: {}", total);
    }

    #[test]
    fn test_segmented_length_no_segments() {
        let none: Vec<&[GpsPoint]> = Vec::new();
        assert_eq!(segmented_length(none), 0.0);
    }
}
