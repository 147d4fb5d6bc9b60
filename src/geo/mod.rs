//! Great-circle distance and coordinate helpers.
//!
//! The deactivation geofence is a plain radius check against the haversine
//! distance on a spherical Earth. Coordinate range validation lives here so
//! the store and config modules share one definition of "valid".

use crate::constants::EARTH_RADIUS_METERS;

/// Haversine great-circle distance between two coordinates, in meters.
///
/// Pure and deterministic; identical points yield 0. Inputs are assumed to be
/// in degrees and within range; out-of-range values produce mathematically
/// defined but meaningless results, so callers validate at the boundary.
pub fn distance_meters(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let d_phi = (lat2 - lat1).to_radians();
    let d_lambda = (lon2 - lon1).to_radians();

    let a = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_METERS * c
}

/// True when `lat` is a usable latitude in degrees.
pub fn valid_latitude(lat: f64) -> bool {
    lat.is_finite() && (-90.0..=90.0).contains(&lat)
}

/// True when `lon` is a usable longitude in degrees.
pub fn valid_longitude(lon: f64) -> bool {
    lon.is_finite() && (-180.0..=180.0).contains(&lon)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_points_are_zero() {
        assert_eq!(distance_meters(34.0, -118.0, 34.0, -118.0), 0.0);
        assert_eq!(distance_meters(0.0, 0.0, 0.0, 0.0), 0.0);
    }

    #[test]
    fn known_distance_london_paris() {
        // London (51.5074, -0.1278) to Paris (48.8566, 2.3522) is ~343.5 km
        let d = distance_meters(51.5074, -0.1278, 48.8566, 2.3522);
        assert!((d - 343_500.0).abs() < 2_000.0, "got {d}");
    }

    #[test]
    fn small_displacement_is_small() {
        // ~0.0009 degrees of latitude is roughly 100 m
        let d = distance_meters(34.0, -118.0, 34.0009, -118.0);
        assert!((50.0..150.0).contains(&d), "got {d}");
    }

    #[test]
    fn symmetric() {
        let a = distance_meters(40.7128, -74.0060, 34.0522, -118.2437);
        let b = distance_meters(34.0522, -118.2437, 40.7128, -74.0060);
        assert!((a - b).abs() < 1e-6);
    }

    #[test]
    fn antipodal_near_half_circumference() {
        let d = distance_meters(0.0, 0.0, 0.0, 180.0);
        let half = std::f64::consts::PI * EARTH_RADIUS_METERS;
        assert!((d - half).abs() < 1.0, "got {d}");
    }

    #[test]
    fn coordinate_validation() {
        assert!(valid_latitude(90.0) && valid_latitude(-90.0));
        assert!(!valid_latitude(90.0001));
        assert!(!valid_latitude(f64::NAN));
        assert!(valid_longitude(180.0) && valid_longitude(-180.0));
        assert!(!valid_longitude(-180.5));
    }
}
