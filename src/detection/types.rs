use serde::{Deserialize, Serialize};

use crate::geometry::{BoundingBox, Polygon};

/// Detected surface polygons for one selected box.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionResult {
    pub polygons: Vec<Polygon>,
    /// Per-polygon confidence in `[0, 1]`, parallel to `polygons`. Services
    /// that do not score their output leave it empty.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub confidence: Vec<f64>,
    pub count: usize,
    pub bbox: BoundingBox,
}

impl DetectionResult {
    /// Confidence of polygon `index`; unscored polygons count as certain.
    pub fn confidence_of(&self, index: usize) -> f64 {
        self.confidence
            .get(index)
            .copied()
            .filter(|c| c.is_finite())
            .unwrap_or(1.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DetectOptions {
    pub include_parking: bool,
    pub timeout_ms: u64,
    pub min_confidence: f64,
    pub enhance_results: bool,
}

impl Default for DetectOptions {
    fn default() -> Self {
        Self {
            include_parking: true,
            timeout_ms: 15_000,
            min_confidence: 0.8,
            enhance_results: true,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct DetectRequest<'a> {
    pub bbox: &'a BoundingBox,
    pub include_parking: bool,
    pub timeout_ms: u64,
    pub min_confidence: f64,
    pub enhance_results: bool,
}

impl<'a> DetectRequest<'a> {
    pub fn new(bbox: &'a BoundingBox, options: &DetectOptions) -> Self {
        Self {
            bbox,
            include_parking: options.include_parking,
            timeout_ms: options.timeout_ms,
            min_confidence: options.min_confidence,
            enhance_results: options.enhance_results,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub(super) struct ErrorBody {
    #[serde(default)]
    pub message: Option<String>,
}
