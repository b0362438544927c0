mod calculator;
mod smoothing;
mod validation;

pub use calculator::{close_ring, polygon_area_m2, AreaCalculator, AreaTotals};
pub use smoothing::{smooth_polygon, DEGREES_PER_TOLERANCE_UNIT};
pub use validation::{GroundTruth, ValidationError, ValidationMetrics};
