//! Geographic calculations

use crate::types::Coordinates;

/// Earth radius in kilometers
const EARTH_RADIUS_KM: f64 = 6371.0;

/// Road distance coefficient (straight line to road)
pub const ROAD_COEFFICIENT: f64 = 1.3;

/// Average speed in km/h for offline travel time estimation
pub const AVERAGE_SPEED_KMH: f64 = 40.0;

/// Great-circle distance between two points in kilometers.
///
/// Symmetric and exactly zero for identical points.
pub fn haversine_distance(from: &Coordinates, to: &Coordinates) -> f64 {
    let d_lat = (to.lat - from.lat).to_radians();
    let d_lon = (to.lng - from.lng).to_radians();

    let lat1 = from.lat.to_radians();
    let lat2 = to.lat.to_radians();

    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
    // Rounding can push `a` past 1 near antipodal points
    let a = a.clamp(0.0, 1.0);

    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_KM * c
}

/// Estimate road distance from straight-line distance
pub fn road_distance(from: &Coordinates, to: &Coordinates, road_coefficient: f64) -> f64 {
    haversine_distance(from, to) * road_coefficient
}

/// Estimate travel time in minutes
pub fn travel_time_minutes(
    from: &Coordinates,
    to: &Coordinates,
    road_coefficient: f64,
    average_speed_kmh: f64,
) -> f64 {
    let distance = road_distance(from, to, road_coefficient);
    (distance / average_speed_kmh) * 60.0
}
