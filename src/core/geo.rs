use crate::core::types::GeoPoint;

/// Mean Earth radius in kilometres.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Great-circle distance between two points, in kilometres.
pub fn haversine_km(a: &GeoPoint, b: &GeoPoint) -> f64 {
    let d_lat = (b.lat - a.lat).to_radians();
    let d_lon = (b.lon - a.lon).to_radians();

    let h = (d_lat / 2.0).sin() * (d_lat / 2.0).sin()
        + a.lat.to_radians().cos()
            * b.lat.to_radians().cos()
            * (d_lon / 2.0).sin()
            * (d_lon / 2.0).sin();

    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());
    EARTH_RADIUS_KM * c
}

/// Point reached by moving `distance_km` due north from `origin`.
pub fn offset_north(origin: &GeoPoint, distance_km: f64) -> GeoPoint {
    let d_lat = (distance_km / EARTH_RADIUS_KM).to_degrees();
    GeoPoint::new(origin.lat + d_lat, origin.lon)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_distance_for_same_point() {
        let p = GeoPoint::new(50.0, 8.0);
        assert!(haversine_km(&p, &p).abs() < 1e-9);
    }

    #[test]
    fn mainz_to_frankfurt_is_about_thirty_km() {
        let mainz = GeoPoint::new(49.9929, 8.2473);
        let frankfurt = GeoPoint::new(50.1109, 8.6821);
        let d = haversine_km(&mainz, &frankfurt);
        assert!((d - 33.5).abs() < 1.5, "got {d}");
    }

    #[test]
    fn offset_north_round_trips_through_haversine() {
        let origin = GeoPoint::new(50.0, 8.0);
        let moved = offset_north(&origin, 42.0);
        assert!((haversine_km(&origin, &moved) - 42.0).abs() < 1e-6);
    }
}
