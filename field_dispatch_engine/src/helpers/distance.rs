//! Great-circle distance between two coordinate pairs.

const EARTH_RADIUS_MILES: f64 = 3958.8;

/// Haversine distance in miles between `(lat, lng)` pairs given in degrees.
pub fn distance_miles(a: (f64, f64), b: (f64, f64)) -> f64 {
    let (lat1, lng1) = (a.0.to_radians(), a.1.to_radians());
    let (lat2, lng2) = (b.0.to_radians(), b.1.to_radians());
    let d_lat = lat2 - lat1;
    let d_lng = lng2 - lng1;
    let h = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lng / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_MILES * h.sqrt().asin()
}

/// Rounds to one decimal place, which is the precision distances are logged and reported at.
pub fn round_to_tenth(miles: f64) -> f64 {
    (miles * 10.0).round() / 10.0
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn zero_distance_for_identical_points() {
        let p = (37.7749, -122.4194);
        assert_eq!(distance_miles(p, p), 0.0);
    }

    #[test]
    fn san_francisco_to_oakland() {
        // Roughly 8.3 miles between downtown SF and downtown Oakland
        let sf = (37.7749, -122.4194);
        let oakland = (37.8044, -122.2712);
        let d = distance_miles(sf, oakland);
        assert!((d - 8.3).abs() < 0.3, "distance was {d}");
    }

    #[test]
    fn symmetric() {
        let a = (40.7128, -74.0060);
        let b = (34.0522, -118.2437);
        let d1 = distance_miles(a, b);
        let d2 = distance_miles(b, a);
        assert!((d1 - d2).abs() < 1e-9);
    }

    #[test]
    fn rounding() {
        assert_eq!(round_to_tenth(3.24), 3.2);
        assert_eq!(round_to_tenth(3.25), 3.3);
        assert_eq!(round_to_tenth(0.04), 0.0);
    }
}
