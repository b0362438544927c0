mod bbox;
mod distance;
mod types;

pub use bbox::{BboxSelector, BoundingBox};
pub use distance::{haversine_m, EARTH_RADIUS_M};
pub use types::{GeoPoint, Polygon};
