use serde::{Deserialize, Serialize};

use crate::units::{self, UnitSystem, CM_PER_M, IN_PER_FT, LB_PER_SHORT_TON};

/// Paving assumptions in the active unit system.
///
/// Thickness is centimeters (metric) or inches (imperial); density is t/m³
/// (metric) or lb/ft³ (imperial).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MaterialInputs {
    pub thickness: f64,
    pub density: f64,
    pub unit_system: UnitSystem,
}

impl Default for MaterialInputs {
    fn default() -> Self {
        Self {
            thickness: 2.0,
            density: 145.0,
            unit_system: UnitSystem::Imperial,
        }
    }
}

impl MaterialInputs {
    /// Same physical assumptions expressed in another unit system.
    pub fn to_unit_system(&self, target: UnitSystem) -> Self {
        let (thickness, density) = match (self.unit_system, target) {
            (UnitSystem::Imperial, UnitSystem::Metric) => (
                units::inches_to_cm(self.thickness),
                units::lb_per_ft3_to_t_per_m3(self.density),
            ),
            (UnitSystem::Metric, UnitSystem::Imperial) => (
                units::cm_to_inches(self.thickness),
                units::t_per_m3_to_lb_per_ft3(self.density),
            ),
            _ => (self.thickness, self.density),
        };
        Self {
            thickness,
            density,
            unit_system: target,
        }
    }
}

/// Volume (m³ or ft³) and tonnage (tonnes or short tons).
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MaterialEstimate {
    pub volume: f64,
    pub tonnage: f64,
    pub unit_system: UnitSystem,
}

impl MaterialEstimate {
    fn zero(unit_system: UnitSystem) -> Self {
        Self {
            volume: 0.0,
            tonnage: 0.0,
            unit_system,
        }
    }

    pub fn tonnage_tonnes(&self) -> f64 {
        match self.unit_system {
            UnitSystem::Metric => self.tonnage,
            UnitSystem::Imperial => units::short_tons_to_tonnes(self.tonnage),
        }
    }

    pub fn volume_label(&self) -> String {
        units::format_volume(self.volume, self.unit_system)
    }

    pub fn tonnage_label(&self) -> String {
        units::format_tonnage(self.tonnage, self.unit_system)
    }
}

pub fn estimate(total_area_m2: f64, inputs: &MaterialInputs) -> MaterialEstimate {
    if !(total_area_m2.is_finite() && total_area_m2 > 0.0) {
        return MaterialEstimate::zero(inputs.unit_system);
    }

    match inputs.unit_system {
        UnitSystem::Metric => {
            let thickness_m = inputs.thickness / CM_PER_M;
            let volume_m3 = total_area_m2 * thickness_m;
            MaterialEstimate {
                volume: volume_m3,
                tonnage: volume_m3 * inputs.density,
                unit_system: UnitSystem::Metric,
            }
        }
        UnitSystem::Imperial => {
            let area_ft2 = units::sq_m_to_sq_ft(total_area_m2);
            let thickness_ft = inputs.thickness / IN_PER_FT;
            let volume_ft3 = area_ft2 * thickness_ft;
            let pounds = volume_ft3 * inputs.density;
            MaterialEstimate {
                volume: volume_ft3,
                tonnage: pounds / LB_PER_SHORT_TON,
                unit_system: UnitSystem::Imperial,
            }
        }
    }
}
