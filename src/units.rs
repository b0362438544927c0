//! Unit-system conversions shared by every measurement path.

use serde::{Deserialize, Serialize};

pub const SQ_FT_PER_SQ_M: f64 = 10.7639;
pub const SQ_M_PER_ACRE: f64 = 4046.856_422_4;
pub const SQ_M_PER_HECTARE: f64 = 10_000.0;
/// Length of one degree of latitude, used for quick equirectangular estimates.
pub const KM_PER_DEGREE: f64 = 111.32;
pub const CM_PER_M: f64 = 100.0;
pub const CM_PER_IN: f64 = 2.54;
pub const IN_PER_FT: f64 = 12.0;
pub const LB_PER_SHORT_TON: f64 = 2000.0;
pub const KG_PER_SHORT_TON: f64 = 907.184_74;
pub const KG_PER_TONNE: f64 = 1000.0;
/// 1 lb/ft³ expressed in t/m³.
pub const T_PER_M3_PER_LB_PER_FT3: f64 = 0.016_018_463;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitSystem {
    Metric,
    #[default]
    Imperial,
}

impl UnitSystem {
    pub fn name(&self) -> &'static str {
        match self {
            UnitSystem::Metric => "metric",
            UnitSystem::Imperial => "imperial",
        }
    }

    pub fn thickness_label(&self, thickness: f64) -> String {
        match self {
            UnitSystem::Metric => format!("{} cm", thickness),
            UnitSystem::Imperial => format!("{} in", thickness),
        }
    }

    pub fn density_label(&self, density: f64) -> String {
        match self {
            UnitSystem::Metric => format!("{} t/m^3", density),
            UnitSystem::Imperial => format!("{} lb/ft^3", density),
        }
    }
}

impl std::str::FromStr for UnitSystem {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "metric" => Ok(UnitSystem::Metric),
            "imperial" => Ok(UnitSystem::Imperial),
            other => Err(format!("unknown unit system: {}", other)),
        }
    }
}

pub fn sq_m_to_sq_ft(m2: f64) -> f64 {
    m2 * SQ_FT_PER_SQ_M
}

pub fn sq_ft_to_sq_m(ft2: f64) -> f64 {
    ft2 / SQ_FT_PER_SQ_M
}

/// Converts an area threshold entered in the display unit system to m².
///
/// Metric thresholds are already square meters; imperial ones are square feet.
pub fn area_threshold_to_m2(value: f64, units: UnitSystem) -> f64 {
    let value = if value.is_finite() { value } else { 0.0 };
    match units {
        UnitSystem::Metric => value,
        UnitSystem::Imperial => sq_ft_to_sq_m(value),
    }
}

pub fn short_tons_to_tonnes(short_tons: f64) -> f64 {
    short_tons * KG_PER_SHORT_TON / KG_PER_TONNE
}

pub fn inches_to_cm(inches: f64) -> f64 {
    inches * CM_PER_IN
}

pub fn cm_to_inches(cm: f64) -> f64 {
    cm / CM_PER_IN
}

pub fn lb_per_ft3_to_t_per_m3(density: f64) -> f64 {
    density * T_PER_M3_PER_LB_PER_FT3
}

pub fn t_per_m3_to_lb_per_ft3(density: f64) -> f64 {
    density / T_PER_M3_PER_LB_PER_FT3
}

/// Primary and secondary area strings for display, e.g. `("1234 sq ft", "0.03 acres")`.
pub fn format_area(m2: f64, units: UnitSystem) -> (String, String) {
    match units {
        UnitSystem::Metric => (
            format!("{:.0} m²", m2),
            format!("{:.2} ha", m2 / SQ_M_PER_HECTARE),
        ),
        UnitSystem::Imperial => (
            format!("{:.0} sq ft", sq_m_to_sq_ft(m2)),
            format!("{:.2} acres", m2 / SQ_M_PER_ACRE),
        ),
    }
}

pub fn format_volume(volume: f64, units: UnitSystem) -> String {
    match units {
        UnitSystem::Metric => format!("{:.2} m^3", volume),
        UnitSystem::Imperial => format!("{:.0} ft^3", volume),
    }
}

pub fn format_tonnage(tonnage: f64, units: UnitSystem) -> String {
    match units {
        UnitSystem::Metric => format!("{:.1} t", tonnage),
        UnitSystem::Imperial => format!("{:.1} tons", tonnage),
    }
}
