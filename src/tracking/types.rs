use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::geometry::GeoPoint;

/// One position reported by the location source.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrackedFix {
    pub lat: f64,
    pub lon: f64,
    /// Meters.
    pub accuracy: f64,
    #[serde(default)]
    pub heading: Option<f64>,
    #[serde(default)]
    pub speed: Option<f64>,
    /// Unix epoch milliseconds.
    pub timestamp_ms: i64,
}

impl TrackedFix {
    pub fn point(&self) -> GeoPoint {
        GeoPoint::new(self.lat, self.lon)
    }
}

/// The last fix that was committed. All zero until the first commit.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LastCommittedFix {
    pub timestamp_ms: i64,
    pub lat: f64,
    pub lon: f64,
}

impl LastCommittedFix {
    pub fn point(&self) -> GeoPoint {
        GeoPoint::new(self.lat, self.lon)
    }
}

/// A committed fix as written to the tracking store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackedRecord {
    pub employee_id: String,
    pub lat: f64,
    pub lon: f64,
    pub accuracy: f64,
    pub heading: Option<f64>,
    pub speed: Option<f64>,
    pub recorded_at: DateTime<Utc>,
    pub is_active: bool,
}
