use geo::algorithm::chamberlain_duquette_area::ChamberlainDuquetteArea;
use geo::{Coord, LineString, Polygon as GeoPolygon};
use serde::Serialize;

use crate::geometry::{GeoPoint, Polygon};
use crate::units::{area_threshold_to_m2, UnitSystem};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AreaTotals {
    pub per_polygon_m2: Vec<f64>,
    pub total_m2: f64,
}

impl AreaTotals {
    pub fn count(&self) -> usize {
        self.per_polygon_m2.len()
    }
}

/// Sums the spherical area of detected polygons, skipping the small ones.
#[derive(Debug, Clone, Copy)]
pub struct AreaCalculator {
    min_area_m2: f64,
}

impl Default for AreaCalculator {
    fn default() -> Self {
        Self { min_area_m2: 0.0 }
    }
}

impl AreaCalculator {
    pub fn new(min_area_m2: f64) -> Self {
        let min_area_m2 = if min_area_m2.is_finite() {
            min_area_m2.max(0.0)
        } else {
            0.0
        };
        Self { min_area_m2 }
    }

    /// Threshold typed in the display unit system (m² or ft²), converted before use.
    pub fn with_display_threshold(value: f64, units: UnitSystem) -> Self {
        Self::new(area_threshold_to_m2(value, units))
    }

    pub fn min_area_m2(&self) -> f64 {
        self.min_area_m2
    }

    pub fn compute(&self, polygons: &[Polygon]) -> AreaTotals {
        let per_polygon_m2: Vec<f64> = polygons
            .iter()
            .map(|p| polygon_area_m2(p))
            .filter(|area| *area >= self.min_area_m2)
            .collect();
        let total_m2 = per_polygon_m2.iter().sum();

        log::debug!(
            "Measured {} of {} polygons above {:.2} m² ({:.2} m² total)",
            per_polygon_m2.len(),
            polygons.len(),
            self.min_area_m2,
            total_m2
        );

        AreaTotals {
            per_polygon_m2,
            total_m2,
        }
    }
}

/// Returns the ring with its first vertex repeated at the end when the source
/// left it open.
pub fn close_ring(polygon: &[GeoPoint]) -> Vec<GeoPoint> {
    let mut ring = polygon.to_vec();
    if let (Some(first), Some(last)) = (polygon.first(), polygon.last()) {
        if first.lat != last.lat || first.lon != last.lon {
            ring.push(*first);
        }
    }
    ring
}

/// Spherical (Chamberlain-Duquette, WGS84 equatorial radius) area in m².
///
/// Non-finite results collapse to zero.
pub fn polygon_area_m2(polygon: &[GeoPoint]) -> f64 {
    let ring = close_ring(polygon);
    if ring.len() < 4 {
        return 0.0;
    }

    let area = to_geo_polygon(&ring).chamberlain_duquette_unsigned_area();

    if area.is_finite() {
        area
    } else {
        0.0
    }
}

/// Single-ring `geo` polygon with `x = lon`, `y = lat`.
pub(crate) fn to_geo_polygon(ring: &[GeoPoint]) -> GeoPolygon<f64> {
    let coords: Vec<Coord<f64>> = ring.iter().map(|p| Coord { x: p.lon, y: p.lat }).collect();
    GeoPolygon::new(LineString::new(coords), vec![])
}

#[cfg(test)]
mod tests {
    use super::*;

    const WGS84_A: f64 = 6_378_137.0;

    fn assert_close(a: f64, b: f64, eps: f64) {
        let diff = (a - b).abs();
        assert!(diff <= eps, "expected {a} ~= {b} (diff {diff})");
    }

    fn square(south: f64, west: f64, size: f64) -> Polygon {
        vec![
            GeoPoint::new(south, west),
            GeoPoint::new(south, west + size),
            GeoPoint::new(south + size, west + size),
            GeoPoint::new(south + size, west),
        ]
    }

    #[test]
    fn equator_square_matches_spherical_area() {
        let size = 0.001_f64;
        let expected = WGS84_A * WGS84_A * size.to_radians() * size.to_radians().sin();
        let area = polygon_area_m2(&square(0.0, 0.0, size));
        assert!((area - expected).abs() / expected < 0.01, "area {area} vs {expected}");
        // ~111.3 m on a side
        assert_close(area, 12_392.0, 124.0);
    }

    #[test]
    fn open_and_closed_rings_agree() {
        let open = square(40.70, -74.01, 0.002);
        let mut closed = open.clone();
        closed.push(open[0]);

        assert_eq!(close_ring(&open), closed);
        assert_eq!(close_ring(&closed), closed);
        assert_eq!(polygon_area_m2(&open), polygon_area_m2(&closed));
    }

    #[test]
    fn winding_order_does_not_change_area() {
        let ccw = square(10.0, 10.0, 0.01);
        let cw: Polygon = ccw.iter().rev().copied().collect();
        assert_close(polygon_area_m2(&ccw), polygon_area_m2(&cw), 1e-6);
    }

    #[test]
    fn degenerate_rings_have_no_area() {
        assert_eq!(polygon_area_m2(&[]), 0.0);
        assert_eq!(polygon_area_m2(&[GeoPoint::new(1.0, 1.0)]), 0.0);
        assert_eq!(
            polygon_area_m2(&[GeoPoint::new(1.0, 1.0), GeoPoint::new(1.0, 2.0)]),
            0.0
        );
    }

    #[test]
    fn nan_vertices_become_zero() {
        let mut poly = square(0.0, 0.0, 0.001);
        poly[1].lat = f64::NAN;
        assert_eq!(polygon_area_m2(&poly), 0.0);
    }

    #[test]
    fn filters_below_threshold_and_sums_the_rest() {
        let small = square(0.0, 0.0, 0.0001); // ~124 m²
        let large = square(0.0, 1.0, 0.001); // ~12392 m²

        let all = AreaCalculator::new(0.0).compute(&[small.clone(), large.clone()]);
        assert_eq!(all.count(), 2);
        assert_close(all.total_m2, all.per_polygon_m2.iter().sum::<f64>(), 1e-9);

        let filtered = AreaCalculator::new(1_000.0).compute(&[small, large.clone()]);
        assert_eq!(filtered.count(), 1);
        assert_close(filtered.total_m2, polygon_area_m2(&large), 1e-9);
    }

    #[test]
    fn threshold_equal_to_area_is_kept() {
        let poly = square(0.0, 0.0, 0.001);
        let area = polygon_area_m2(&poly);
        let totals = AreaCalculator::new(area).compute(&[poly]);
        assert_eq!(totals.count(), 1);
    }

    #[test]
    fn imperial_threshold_converted_before_filtering() {
        let poly = square(0.0, 0.0, 0.0001); // ~124 m², ~1334 ft²
        let kept = AreaCalculator::with_display_threshold(1_000.0, UnitSystem::Imperial);
        assert_eq!(kept.compute(&[poly.clone()]).count(), 1);

        let dropped = AreaCalculator::with_display_threshold(1_500.0, UnitSystem::Imperial);
        assert_close(dropped.min_area_m2(), 1_500.0 / 10.7639, 1e-9);
        assert_eq!(dropped.compute(&[poly.clone()]).count(), 0);

        // 130 ft² keeps it, 130 m² does not.
        let tiny = AreaCalculator::with_display_threshold(130.0, UnitSystem::Imperial);
        assert_eq!(tiny.compute(&[poly.clone()]).count(), 1);
        assert_eq!(AreaCalculator::new(130.0).compute(&[poly]).count(), 0);
    }

    #[test]
    fn negative_threshold_acts_as_zero() {
        assert_eq!(AreaCalculator::new(-5.0).min_area_m2(), 0.0);
        assert_eq!(AreaCalculator::new(f64::NAN).min_area_m2(), 0.0);
    }
}
