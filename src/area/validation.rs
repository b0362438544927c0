//! Overlap scores of detected outlines against hand-drawn ground truth.

use geo::algorithm::chamberlain_duquette_area::ChamberlainDuquetteArea;
use geo::{BooleanOps, BoundingRect, Coord, Intersects, LineString, Polygon as GeoPolygon};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use super::calculator::{close_ring, polygon_area_m2, to_geo_polygon};
use crate::geometry::Polygon;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Ground truth JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Ground truth must be a GeoJSON Feature or FeatureCollection")]
    NotGeoJson,
    #[error("Invalid coordinates in ground truth feature {0}")]
    InvalidCoordinates(usize),
}

/// Reference surfaces loaded from GeoJSON. Only `Polygon` and `MultiPolygon`
/// geometries are read; other features are skipped.
#[derive(Debug, Clone, Default)]
pub struct GroundTruth {
    polygons: Vec<GeoPolygon<f64>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ValidationMetrics {
    pub detected_m2: f64,
    pub truth_m2: f64,
    pub intersection_m2: f64,
    pub union_m2: f64,
    pub iou: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
}

impl GroundTruth {
    pub fn from_geojson(text: &str) -> Result<Self, ValidationError> {
        let value: Value = serde_json::from_str(text)?;
        let features = match value.get("type").and_then(Value::as_str) {
            Some("FeatureCollection") => value
                .get("features")
                .and_then(Value::as_array)
                .cloned()
                .ok_or(ValidationError::NotGeoJson)?,
            Some("Feature") => vec![value],
            _ => return Err(ValidationError::NotGeoJson),
        };

        let mut polygons = Vec::new();
        for (index, feature) in features.iter().enumerate() {
            let Some(geometry) = feature.get("geometry").filter(|g| !g.is_null()) else {
                continue;
            };
            let coordinates = &geometry["coordinates"];
            match geometry.get("type").and_then(Value::as_str) {
                Some("Polygon") => {
                    let polygon =
                        parse_polygon(coordinates).ok_or(ValidationError::InvalidCoordinates(index))?;
                    polygons.push(polygon);
                }
                Some("MultiPolygon") => {
                    let parts = coordinates
                        .as_array()
                        .ok_or(ValidationError::InvalidCoordinates(index))?;
                    for part in parts {
                        let polygon =
                            parse_polygon(part).ok_or(ValidationError::InvalidCoordinates(index))?;
                        polygons.push(polygon);
                    }
                }
                other => log::debug!("Skipping ground truth feature {} ({:?})", index, other),
            }
        }

        log::info!("Loaded {} ground truth polygons", polygons.len());
        Ok(Self { polygons })
    }

    pub fn len(&self) -> usize {
        self.polygons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.polygons.is_empty()
    }

    pub fn area_m2(&self) -> f64 {
        self.polygons
            .iter()
            .map(|p| p.chamberlain_duquette_unsigned_area())
            .filter(|a| a.is_finite())
            .sum()
    }

    /// Scores `detected` outlines against the reference. Overlap is summed
    /// pairwise, so overlapping detections count their shared area twice.
    /// Each ratio is zero when its denominator is.
    pub fn compare(&self, detected: &[Polygon]) -> ValidationMetrics {
        let detected_m2: f64 = detected.iter().map(|p| polygon_area_m2(p)).sum();
        let truth_m2 = self.area_m2();

        let mut intersection_m2 = 0.0;
        for outline in detected {
            let ring = close_ring(outline);
            if ring.len() < 4 || ring.iter().any(|p| !(p.lat.is_finite() && p.lon.is_finite())) {
                continue;
            }
            let candidate = to_geo_polygon(&ring);
            let Some(bounds) = candidate.bounding_rect() else {
                continue;
            };
            for truth in &self.polygons {
                let overlaps = truth
                    .bounding_rect()
                    .is_some_and(|other| other.intersects(&bounds));
                if !overlaps {
                    continue;
                }
                let area = candidate.intersection(truth).chamberlain_duquette_unsigned_area();
                if area.is_finite() {
                    intersection_m2 += area;
                }
            }
        }

        let union_m2 = (detected_m2 + truth_m2 - intersection_m2).max(0.0);
        let iou = ratio(intersection_m2, union_m2);
        let precision = ratio(intersection_m2, detected_m2);
        let recall = ratio(intersection_m2, truth_m2);
        let f1 = ratio(2.0 * precision * recall, precision + recall);

        ValidationMetrics {
            detected_m2,
            truth_m2,
            intersection_m2,
            union_m2,
            iou,
            precision,
            recall,
            f1,
        }
    }
}

fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator > 0.0 {
        numerator / denominator
    } else {
        0.0
    }
}

/// GeoJSON polygon coordinates: exterior ring then holes, positions
/// `[lon, lat, ...]`.
fn parse_polygon(value: &Value) -> Option<GeoPolygon<f64>> {
    let mut rings = value.as_array()?.iter().map(parse_ring);
    let exterior = rings.next()??;
    let interiors = rings.collect::<Option<Vec<_>>>()?;
    Some(GeoPolygon::new(exterior, interiors))
}

fn parse_ring(value: &Value) -> Option<LineString<f64>> {
    let coords = value
        .as_array()?
        .iter()
        .map(|position| {
            let position = position.as_array()?;
            let x = position.first()?.as_f64()?;
            let y = position.get(1)?.as_f64()?;
            Some(Coord { x, y })
        })
        .collect::<Option<Vec<_>>>()?;
    Some(LineString::new(coords))
}
