use geowake::geo::distance_meters;
use proptest::prelude::*;

/// Generate valid latitude values
fn latitude_strategy() -> impl Strategy<Value = f64> {
    -90.0..=90.0
}

/// Generate valid longitude values
fn longitude_strategy() -> impl Strategy<Value = f64> {
    -180.0..=180.0
}

/// Generate a coordinate pair
fn coordinate_strategy() -> impl Strategy<Value = (f64, f64)> {
    (latitude_strategy(), longitude_strategy())
}

proptest! {
    /// Distance is symmetric: d(a, b) == d(b, a)
    #[test]
    fn distance_is_symmetric(
        (lat1, lon1) in coordinate_strategy(),
        (lat2, lon2) in coordinate_strategy()
    ) {
        let forward = distance_meters(lat1, lon1, lat2, lon2);
        let back = distance_meters(lat2, lon2, lat1, lon1);
        prop_assert!((forward - back).abs() < 1e-6,
            "asymmetric: {forward} vs {back}");
    }

    /// Distance from a point to itself is zero
    #[test]
    fn distance_to_self_is_zero((lat, lon) in coordinate_strategy()) {
        let d = distance_meters(lat, lon, lat, lon);
        prop_assert!(d.abs() < 1e-9, "nonzero self-distance {d}");
    }

    /// Distances are never negative and never exceed half the circumference
    #[test]
    fn distance_is_bounded(
        (lat1, lon1) in coordinate_strategy(),
        (lat2, lon2) in coordinate_strategy()
    ) {
        let d = distance_meters(lat1, lon1, lat2, lon2);
        prop_assert!(d >= 0.0, "negative distance {d}");
        let half_circumference = std::f64::consts::PI * geowake::constants::EARTH_RADIUS_METERS;
        prop_assert!(d <= half_circumference + 1.0,
            "distance {d} exceeds half circumference");
    }

    /// Moving further along a meridian from a fixed point increases distance
    /// (monotonicity along the axis the geofence radius cares about)
    #[test]
    fn meridian_distance_grows_with_displacement(
        lat in -80.0..=80.0f64,
        lon in longitude_strategy(),
        small in 0.0001..=0.01f64,
        extra in 0.0001..=0.01f64
    ) {
        let near = distance_meters(lat, lon, lat + small, lon);
        let far = distance_meters(lat, lon, lat + small + extra, lon);
        prop_assert!(far > near,
            "displacement {small}+{extra} gave {far} <= {near}");
    }

    /// One degree of latitude is ~111 km everywhere on the sphere
    #[test]
    fn latitude_degree_scale(lat in -89.0..=89.0f64, lon in longitude_strategy()) {
        let d = distance_meters(lat, lon, lat + 1.0, lon);
        prop_assert!((d - 111_195.0).abs() < 100.0,
            "1 degree of latitude measured {d} m");
    }

    /// The geofence threshold behaves sanely: points generated inside a tight
    /// box around the target are closer than points a full degree away
    #[test]
    fn nearby_beats_faraway(
        lat in -80.0..=80.0f64,
        lon in -170.0..=170.0f64,
        jitter_lat in -0.0005..=0.0005f64,
        jitter_lon in -0.0005..=0.0005f64
    ) {
        let nearby = distance_meters(lat, lon, lat + jitter_lat, lon + jitter_lon);
        let faraway = distance_meters(lat, lon, lat + 1.0, lon + 1.0);
        prop_assert!(nearby < faraway);
    }
}
