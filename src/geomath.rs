//! Geo math: Haversine distance, metre/degree offsets, and bounding-box
//! containment. Pure functions, no I/O.

use crate::model::BoundingBox;

const EARTH_RADIUS_M: f64 = 6_371_000.0;
const METERS_PER_DEGREE_LAT: f64 = 111_320.0;

/// Great-circle distance between two points, in metres.
pub fn haversine_m(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let (phi1, phi2) = (lat1.to_radians(), lat2.to_radians());
    let d_phi = (lat2 - lat1).to_radians();
    let d_lambda = (lon2 - lon1).to_radians();

    let a = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_M * c
}

/// Shifts `(lat, lon)` by `north_m` metres north and `east_m` metres east.
pub fn offset_m(lat: f64, lon: f64, north_m: f64, east_m: f64) -> (f64, f64) {
    let new_lat = lat + north_m / METERS_PER_DEGREE_LAT;
    let meters_per_degree_lon = METERS_PER_DEGREE_LAT * lat.to_radians().cos();
    let new_lon = if meters_per_degree_lon.abs() < f64::EPSILON {
        lon
    } else {
        lon + east_m / meters_per_degree_lon
    };
    (new_lat, new_lon)
}

/// Inclusive bounding-box containment test.
pub fn bbox_contains(bbox: &BoundingBox, lat: f64, lon: f64) -> bool {
    lat >= bbox.min_lat && lat <= bbox.max_lat && lon >= bbox.min_lon && lon <= bbox.max_lon
}

/// Builds a bounding box centred on `(lat, lon)` with the given half-width
/// in metres along each axis. Used when a zone's source polygon is reduced
/// to a simple bbox for containment checks.
pub fn bbox_from_center(lat: f64, lon: f64, half_width_m: f64) -> BoundingBox {
    let (north_lat, _) = offset_m(lat, lon, half_width_m, 0.0);
    let (south_lat, _) = offset_m(lat, lon, -half_width_m, 0.0);
    let (_, east_lon) = offset_m(lat, lon, 0.0, half_width_m);
    let (_, west_lon) = offset_m(lat, lon, 0.0, -half_width_m);
    BoundingBox {
        min_lat: south_lat,
        max_lat: north_lat,
        min_lon: west_lon,
        max_lon: east_lon,
    }
}
