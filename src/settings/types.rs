use serde::{Deserialize, Serialize};

use crate::materials::MaterialInputs;
use crate::units::{self, UnitSystem};

/// Measurement preferences for the map view.
///
/// `thickness` and `density` are in the units of `units`; `min_area_input`
/// is square meters or square feet likewise. Detected polygons scored below
/// `confidence_threshold` are left out of totals and exports.
/// `smoothing_tolerance` simplifies outlines before measuring; 0 disables it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MapSettings {
    pub units: UnitSystem,
    pub thickness: f64,
    pub density: f64,
    pub min_area_input: f64,
    pub confidence_threshold: f64,
    pub smoothing_tolerance: f64,
    pub include_parking: bool,
}

impl Default for MapSettings {
    fn default() -> Self {
        Self {
            units: UnitSystem::Imperial,
            thickness: 2.0,
            density: 145.0,
            min_area_input: 0.0,
            confidence_threshold: 0.5,
            smoothing_tolerance: 0.0,
            include_parking: true,
        }
    }
}

impl MapSettings {
    pub const KEY: &'static str = "aiMapSettings:v1";

    pub fn min_area_m2(&self) -> f64 {
        units::area_threshold_to_m2(self.min_area_input, self.units).max(0.0)
    }

    pub fn material_inputs(&self) -> MaterialInputs {
        MaterialInputs {
            thickness: self.thickness,
            density: self.density,
            unit_system: self.units,
        }
    }

    /// Switches the display unit system, converting the paving assumptions so
    /// they describe the same physical layer.
    pub fn switch_units(&mut self, target: UnitSystem) {
        if target == self.units {
            return;
        }
        let inputs = self.material_inputs().to_unit_system(target);
        self.min_area_input = match target {
            UnitSystem::Metric => units::sq_ft_to_sq_m(self.min_area_input),
            UnitSystem::Imperial => units::sq_m_to_sq_ft(self.min_area_input),
        };
        self.thickness = inputs.thickness;
        self.density = inputs.density;
        self.units = target;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TrackingSettings {
    pub enabled: bool,
    pub distance_threshold_m: f64,
    pub min_interval_ms: u64,
    pub employee_id: String,
}

impl Default for TrackingSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            distance_threshold_m: 50.0,
            min_interval_ms: 30_000,
            employee_id: String::new(),
        }
    }
}

impl TrackingSettings {
    pub const KEY: &'static str = "trackingSettings:v1";
}
