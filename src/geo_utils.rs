//! Geographic utilities backed by the `geo` crate.

use geo::{Distance, Haversine, Point};

use crate::Coordinate;

#[inline]
fn to_point(c: &Coordinate) -> Point<f64> {
    Point::new(c.longitude, c.latitude)
}

/// Great-circle distance between two coordinates in meters.
///
/// # Example
/// ```
/// use place_tracker::{Coordinate, haversine_distance};
/// let a = Coordinate::new(0.0, 0.0);
/// let b = Coordinate::new(0.0, 1.0);
/// assert!((haversine_distance(&a, &b) - 111_195.0).abs() < 1.0);
/// ```
pub fn haversine_distance(a: &Coordinate, b: &Coordinate) -> f64 {
    Haversine::distance(to_point(a), to_point(b))
}
