use geo::Simplify;

use super::calculator::{close_ring, to_geo_polygon};
use crate::geometry::{GeoPoint, Polygon};

/// Degrees of simplification per unit of smoothing tolerance, about 1.1 m of
/// latitude.
pub const DEGREES_PER_TOLERANCE_UNIT: f64 = 1e-5;

/// Simplifies an outline with Ramer-Douglas-Peucker at
/// `tolerance * DEGREES_PER_TOLERANCE_UNIT` degrees.
///
/// A tolerance that is not positive and finite, or a ring too small to
/// simplify, leaves the outline as it was. Simplified rings come back closed.
pub fn smooth_polygon(polygon: &[GeoPoint], tolerance: f64) -> Polygon {
    if !(tolerance.is_finite() && tolerance > 0.0) {
        return polygon.to_vec();
    }
    let ring = close_ring(polygon);
    if ring.len() < 4 || ring.iter().any(|p| !(p.lat.is_finite() && p.lon.is_finite())) {
        return polygon.to_vec();
    }

    let epsilon = tolerance * DEGREES_PER_TOLERANCE_UNIT;
    let simplified = to_geo_polygon(&ring).simplify(&epsilon);
    let smoothed: Polygon = simplified
        .exterior()
        .coords()
        .map(|c| GeoPoint::new(c.y, c.x))
        .collect();

    if smoothed.len() < 4 {
        return polygon.to_vec();
    }
    log::trace!("Smoothed ring from {} to {} vertices", ring.len(), smoothed.len());
    smoothed
}
