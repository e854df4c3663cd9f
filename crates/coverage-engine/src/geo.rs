//! Great-circle geometry on a spherical Earth

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Mean Earth radius in km (9 decimal precision)
pub const EARTH_RADIUS_KM: f64 = 6371.000000000;

/// WGS84 latitude/longitude in decimal degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinate {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Great-circle distance to another point in km
    pub fn distance_km(&self, other: &Coordinate) -> f64 {
        haversine_km(self.lat, self.lng, other.lat, other.lng)
    }

    /// Point reached by travelling `distance_km` from here along `bearing_deg`
    /// (clockwise from true north). Inverse of [`haversine_km`] up to
    /// floating-point error.
    pub fn destination(&self, bearing_deg: f64, distance_km: f64) -> Coordinate {
        let lat1 = self.lat * PI / 180.000000000;
        let lng1 = self.lng * PI / 180.000000000;
        let bearing = bearing_deg * PI / 180.000000000;
        let delta = distance_km / EARTH_RADIUS_KM;

        let lat2 = (lat1.sin() * delta.cos() + lat1.cos() * delta.sin() * bearing.cos()).asin();
        let lng2 = lng1
            + (bearing.sin() * delta.sin() * lat1.cos()).atan2(delta.cos() - lat1.sin() * lat2.sin());

        // Normalise longitude back into [-180, 180)
        let lng2_deg = (lng2 * 180.000000000 / PI + 540.000000000).rem_euclid(360.000000000)
            - 180.000000000;

        Coordinate::new(lat2 * 180.000000000 / PI, lng2_deg)
    }
}

/// Haversine distance between two points in km
pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let lat1_rad = lat1 * PI / 180.000000000;
    let lat2_rad = lat2 * PI / 180.000000000;
    let dlat = (lat2 - lat1) * PI / 180.000000000;
    let dlon = (lon2 - lon1) * PI / 180.000000000;

    let a = (dlat / 2.000000000).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (dlon / 2.000000000).sin().powi(2);
    let c = 2.000000000 * a.sqrt().atan2((1.000000000 - a).sqrt());

    EARTH_RADIUS_KM * c
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const TORONTO: Coordinate = Coordinate { lat: 43.6532, lng: -79.3832 };

    #[test]
    fn test_haversine_known_distance() {
        // NYC to London: ~5,570 km
        let dist = haversine_km(40.712800000, -74.006000000, 51.507400000, -0.127800000);
        assert!((dist - 5570.000000000).abs() < 50.000000000);

        // Toronto to Montreal: ~504 km
        let montreal = Coordinate::new(45.5017, -73.5673);
        let dist = TORONTO.distance_km(&montreal);
        assert!((dist - 504.0).abs() < 5.0, "Toronto-Montreal: {}", dist);
    }

    #[test]
    fn test_same_point_is_zero() {
        assert_eq!(TORONTO.distance_km(&TORONTO), 0.0);
        assert_eq!(haversine_km(0.0, 0.0, 0.0, 0.0), 0.0);
    }

    #[test]
    fn test_destination_round_trips_distance() {
        for bearing in [0.0, 45.0, 90.0, 180.0, 270.0, 359.0] {
            let target = TORONTO.destination(bearing, 7.5);
            let dist = TORONTO.distance_km(&target);
            assert!((dist - 7.5).abs() < 1e-6, "bearing {}: {}", bearing, dist);
        }
    }

    #[test]
    fn test_destination_wraps_antimeridian() {
        let fiji = Coordinate::new(-17.7, 179.99);
        let east = fiji.destination(90.0, 50.0);
        assert!(east.lng < -179.0 && east.lng >= -180.0, "lng: {}", east.lng);
    }

    fn coordinate() -> impl Strategy<Value = Coordinate> {
        (-90.0f64..=90.0, -180.0f64..=180.0).prop_map(|(lat, lng)| Coordinate::new(lat, lng))
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(2000))]

        #[test]
        fn fuzz_distance_symmetric(a in coordinate(), b in coordinate()) {
            let ab = a.distance_km(&b);
            let ba = b.distance_km(&a);
            prop_assert!((ab - ba).abs() < 1e-9, "{} vs {}", ab, ba);
        }

        #[test]
        fn fuzz_distance_to_self_is_zero(a in coordinate()) {
            prop_assert_eq!(a.distance_km(&a), 0.0);
        }

        #[test]
        fn fuzz_distance_bounded_by_half_circumference(a in coordinate(), b in coordinate()) {
            let d = a.distance_km(&b);
            prop_assert!(d >= 0.0);
            prop_assert!(d <= PI * EARTH_RADIUS_KM + 1e-6);
        }
    }
}
