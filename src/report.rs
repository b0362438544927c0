//! Measurement summaries and GeoJSON/CSV export of detection results.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use uuid::Uuid;

use crate::area::{
    close_ring, polygon_area_m2, smooth_polygon, AreaCalculator, AreaTotals, GroundTruth,
    ValidationMetrics,
};
use crate::detection::DetectionResult;
use crate::geometry::{BoundingBox, Polygon};
use crate::materials::{self, MaterialEstimate, MaterialInputs};
use crate::settings::MapSettings;
use crate::units::{self, UnitSystem};

/// One detected polygon after smoothing, with its measured area.
#[derive(Debug, Clone, PartialEq)]
pub struct MeasuredFeature {
    /// Index in the detection result.
    pub id: usize,
    pub outline: Polygon,
    pub area_m2: f64,
    pub confidence: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportKind {
    Detections,
    Outlines,
    Csv,
}

/// Everything shown for one detection: areas, totals and material estimate.
#[derive(Debug, Clone)]
pub struct MeasurementReport {
    pub id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub bbox: BoundingBox,
    /// Every detected polygon, in detection order.
    pub features: Vec<MeasuredFeature>,
    pub min_area_m2: f64,
    pub confidence_threshold: f64,
    /// Totals over features that pass both the area and confidence thresholds.
    pub totals: AreaTotals,
    pub inputs: MaterialInputs,
    pub materials: MaterialEstimate,
}

impl MeasurementReport {
    pub fn build(result: &DetectionResult, settings: &MapSettings) -> Self {
        let calculator = AreaCalculator::new(settings.min_area_m2());
        let confidence_threshold = if settings.confidence_threshold.is_finite() {
            settings.confidence_threshold
        } else {
            0.0
        };
        let inputs = settings.material_inputs();

        let features: Vec<MeasuredFeature> = result
            .polygons
            .iter()
            .enumerate()
            .map(|(id, polygon)| {
                let outline = smooth_polygon(polygon, settings.smoothing_tolerance);
                MeasuredFeature {
                    id,
                    area_m2: polygon_area_m2(&outline),
                    outline,
                    confidence: result.confidence_of(id),
                }
            })
            .collect();

        let confident: Vec<Polygon> = features
            .iter()
            .filter(|f| f.confidence >= confidence_threshold)
            .map(|f| f.outline.clone())
            .collect();
        let totals = calculator.compute(&confident);
        let materials = materials::estimate(totals.total_m2, &inputs);

        Self {
            id: Uuid::new_v4(),
            generated_at: Utc::now(),
            bbox: result.bbox,
            features,
            min_area_m2: calculator.min_area_m2(),
            confidence_threshold,
            totals,
            inputs,
            materials,
        }
    }

    pub fn units(&self) -> UnitSystem {
        self.inputs.unit_system
    }

    pub fn area_labels(&self) -> (String, String) {
        units::format_area(self.totals.total_m2, self.units())
    }

    /// Features counted in the totals: at or above the area threshold and at
    /// or above the confidence threshold.
    pub fn kept(&self) -> impl Iterator<Item = &MeasuredFeature> {
        self.features
            .iter()
            .filter(|f| f.area_m2 >= self.min_area_m2 && f.confidence >= self.confidence_threshold)
    }

    /// One `Polygon` feature per detected polygon plus report metadata.
    pub fn to_geojson(&self) -> FeatureCollection {
        let features = self
            .features
            .iter()
            .map(|f| Feature {
                kind: "Feature",
                properties: FeatureProperties::of(f),
                geometry: Geometry::Polygon {
                    coordinates: vec![ring_coordinates(&f.outline)],
                },
            })
            .collect();

        FeatureCollection {
            kind: "FeatureCollection",
            features,
            metadata: self.metadata(),
        }
    }

    /// Closed outlines of the kept features.
    pub fn to_outlines_geojson(&self) -> FeatureCollection {
        let features = self
            .kept()
            .map(|f| Feature {
                kind: "Feature",
                properties: FeatureProperties::of(f),
                geometry: Geometry::LineString {
                    coordinates: ring_coordinates(&f.outline),
                },
            })
            .collect();

        FeatureCollection {
            kind: "FeatureCollection",
            features,
            metadata: self.metadata(),
        }
    }

    /// One row per kept feature, then `TOTALS`, `ASSUMPTIONS` and `MATERIALS`
    /// rows.
    pub fn to_csv(&self) -> String {
        let units = self.units();
        let mut lines = vec!["id,area_m2,confidence,area_primary,area_secondary".to_string()];
        for feature in self.kept() {
            let (primary, secondary) = units::format_area(feature.area_m2, units);
            lines.push(format!(
                "{},{:.2},{:.2},{},{}",
                feature.id, feature.area_m2, feature.confidence, primary, secondary
            ));
        }

        let (primary, secondary) = self.area_labels();
        lines.push(format!("TOTALS,{:.2},{},{}", self.totals.total_m2, primary, secondary));
        lines.push(format!(
            "ASSUMPTIONS,thickness={},density={}",
            units.thickness_label(self.inputs.thickness),
            units.density_label(self.inputs.density)
        ));
        lines.push(format!(
            "MATERIALS,volume={},tonnage={}",
            self.materials.volume_label(),
            self.materials.tonnage_label()
        ));
        lines.join("\n")
    }

    /// Scores the kept outlines against reference surfaces.
    pub fn validate(&self, truth: &GroundTruth) -> ValidationMetrics {
        let outlines: Vec<Polygon> = self.kept().map(|f| f.outline.clone()).collect();
        truth.compare(&outlines)
    }

    /// Suggested export name, e.g. `asphalt-outlines-2024-05-01.geojson`.
    pub fn file_name(&self, kind: ExportKind) -> String {
        let (stem, extension) = match kind {
            ExportKind::Detections => ("asphalt-detections", "geojson"),
            ExportKind::Outlines => ("asphalt-outlines", "geojson"),
            ExportKind::Csv => ("asphalt-detections", "csv"),
        };
        format!("{}-{}.{}", stem, self.generated_at.format("%Y-%m-%d"), extension)
    }

    fn metadata(&self) -> ReportMetadata {
        let units = self.units();
        ReportMetadata {
            id: self.id,
            bbox: self.bbox,
            units,
            assumptions: Assumptions {
                thickness: units.thickness_label(self.inputs.thickness),
                density: units.density_label(self.inputs.density),
                min_area_m2: self.min_area_m2,
            },
            totals: Totals {
                area_m2: self.totals.total_m2,
                volume: self.materials.volume,
                tonnage: self.materials.tonnage,
            },
            generated_at: self.generated_at,
        }
    }
}

impl fmt::Display for MeasurementReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (primary, secondary) = self.area_labels();
        writeln!(
            f,
            "{} of {} polygons at or above {:.1} m² and {:.2} confidence",
            self.totals.count(),
            self.features.len(),
            self.min_area_m2,
            self.confidence_threshold
        )?;
        writeln!(f, "Area:     {} ({})", primary, secondary)?;
        writeln!(
            f,
            "Assuming: {} at {}",
            self.units().thickness_label(self.inputs.thickness),
            self.units().density_label(self.inputs.density)
        )?;
        writeln!(f, "Volume:   {}", self.materials.volume_label())?;
        write!(f, "Tonnage:  {}", self.materials.tonnage_label())
    }
}

impl fmt::Display for ValidationMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Detected {:.0} m², truth {:.0} m², overlap {:.0} m²",
            self.detected_m2, self.truth_m2, self.intersection_m2
        )?;
        write!(
            f,
            "IoU {:.3}  precision {:.3}  recall {:.3}  F1 {:.3}",
            self.iou, self.precision, self.recall, self.f1
        )
    }
}

/// GeoJSON positions are `[lon, lat]`.
fn ring_coordinates(polygon: &[crate::geometry::GeoPoint]) -> Vec<[f64; 2]> {
    close_ring(polygon).iter().map(|p| [p.lon, p.lat]).collect()
}

#[derive(Debug, Clone, Serialize)]
pub struct FeatureCollection {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub features: Vec<Feature>,
    pub metadata: ReportMetadata,
}

#[derive(Debug, Clone, Serialize)]
pub struct Feature {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub properties: FeatureProperties,
    pub geometry: Geometry,
}

#[derive(Debug, Clone, Serialize)]
pub struct FeatureProperties {
    pub id: usize,
    pub area_m2: f64,
    pub confidence: f64,
}

impl FeatureProperties {
    fn of(feature: &MeasuredFeature) -> Self {
        Self {
            id: feature.id,
            area_m2: feature.area_m2,
            confidence: feature.confidence,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum Geometry {
    Polygon { coordinates: Vec<Vec<[f64; 2]>> },
    LineString { coordinates: Vec<[f64; 2]> },
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportMetadata {
    pub id: Uuid,
    pub bbox: BoundingBox,
    pub units: UnitSystem,
    pub assumptions: Assumptions,
    pub totals: Totals,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Assumptions {
    pub thickness: String,
    pub density: String,
    pub min_area_m2: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Totals {
    pub area_m2: f64,
    pub volume: f64,
    pub tonnage: f64,
}
