//! Great-circle distance on a spherical Earth.
//!
//! The haversine formula stays numerically stable for the short distances a
//! geofence cares about; the spherical model is within ~0.5 % of WGS84.

use crate::types::Coordinate;

/// IUGG mean Earth radius in meters.
pub const EARTH_RADIUS_METERS: f64 = 6_371_008.8;

/// Surface distance in meters between `a` and `b`.
///
/// Symmetric, non-negative, and exactly `0.0` for identical points.
pub fn distance_meters(a: Coordinate, b: Coordinate) -> f64 {
    if a == b {
        return 0.0;
    }

    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let half_dlat = (lat2 - lat1) / 2.0;
    let half_dlon = (b.longitude - a.longitude).to_radians() / 2.0;

    let h = half_dlat.sin().powi(2) + lat1.cos() * lat2.cos() * half_dlon.sin().powi(2);
    // rounding can push h marginally outside [0, 1] for antipodal points
    let h = h.clamp(0.0, 1.0);

    2.0 * EARTH_RADIUS_METERS * h.sqrt().asin()
}

/// Arrival rule: inside the radius, boundary inclusive.
pub fn is_within(position: Coordinate, destination: Coordinate, radius_meters: u32) -> bool {
    distance_meters(position, destination) <= f64::from(radius_meters)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sf() -> Coordinate {
        Coordinate::new(37.7749, -122.4194)
    }

    #[test]
    fn identical_points_are_zero() {
        assert_eq!(distance_meters(sf(), sf()), 0.0);
        let pole = Coordinate::new(90.0, 0.0);
        assert_eq!(distance_meters(pole, pole), 0.0);
    }

    #[test]
    fn distance_is_symmetric() {
        let pairs = [
            (sf(), Coordinate::new(40.7128, -74.0060)),
            (Coordinate::new(-33.8688, 151.2093), Coordinate::new(51.5074, -0.1278)),
            (Coordinate::new(0.0, 179.9), Coordinate::new(0.0, -179.9)),
            (Coordinate::new(-90.0, 0.0), Coordinate::new(90.0, 0.0)),
        ];
        for (a, b) in pairs {
            assert_eq!(distance_meters(a, b), distance_meters(b, a), "{a} vs {b}");
        }
    }

    #[test]
    fn known_city_distance() {
        // San Francisco → New York is roughly 4 130 km great-circle.
        let d = distance_meters(sf(), Coordinate::new(40.7128, -74.0060));
        assert!((d - 4_130_000.0).abs() < 15_000.0, "got {d}");
    }

    #[test]
    fn one_degree_of_latitude() {
        let d = distance_meters(Coordinate::new(0.0, 0.0), Coordinate::new(1.0, 0.0));
        assert!((d - 111_195.0).abs() < 10.0, "got {d}");
    }

    #[test]
    fn antipodes_are_half_circumference() {
        let d = distance_meters(Coordinate::new(0.0, 0.0), Coordinate::new(0.0, 180.0));
        let half = std::f64::consts::PI * EARTH_RADIUS_METERS;
        assert!((d - half).abs() < 1.0);
    }

    #[test]
    fn dateline_crossing_is_short() {
        let d = distance_meters(Coordinate::new(0.0, 179.9999), Coordinate::new(0.0, -179.9999));
        assert!(d < 50.0, "got {d}");
    }

    #[test]
    fn radius_boundary_counts_as_arrival() {
        let dest = sf();
        let nearby = Coordinate::new(37.7758, -122.4194);
        let d = distance_meters(nearby, dest);
        assert!(d > 90.0 && d < 110.0, "got {d}");
        assert!(is_within(dest, dest, 1));
        assert!(is_within(nearby, dest, 200));
        assert!(!is_within(nearby, dest, 50));
        // boundary: a radius equal to the rounded-up distance is inside
        assert!(is_within(nearby, dest, d.ceil() as u32));
    }
}
