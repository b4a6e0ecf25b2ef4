//! Great-circle distance shared by the filter, accumulator and coverage code.

use geo::{Distance as _, Haversine, Point};

/// Haversine distance in meters between two (lat, lon) pairs in degrees.
pub fn haversine_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    Haversine.distance(Point::new(lon1, lat1), Point::new(lon2, lat2))
}

/// Offsets a coordinate by the given meters north and east.
///
/// Flat-earth approximation, fine for the few hundred meters used when
/// laying out synthetic tracks.
pub fn offset_meters(lat: f64, lon: f64, north_m: f64, east_m: f64) -> (f64, f64) {
    const METERS_PER_DEGREE: f64 = 111_320.0;
    let d_lat = north_m / METERS_PER_DEGREE;
    let d_lon = east_m / (METERS_PER_DEGREE * lat.to_radians().cos());
    (lat + d_lat, lon + d_lon)
}
