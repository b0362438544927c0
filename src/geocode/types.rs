use serde::{Deserialize, Serialize};

use crate::geometry::{BoundingBox, GeoPoint};

/// One search hit, with coordinates kept as the provider's strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeocodeResult {
    pub display_name: String,
    pub lat: String,
    pub lon: String,
    /// `[south, north, west, east]`.
    #[serde(default)]
    pub boundingbox: Option<[String; 4]>,
}

impl GeocodeResult {
    pub fn point(&self) -> Option<GeoPoint> {
        let lat = self.lat.trim().parse().ok()?;
        let lon = self.lon.trim().parse().ok()?;
        Some(GeoPoint::new(lat, lon))
    }

    pub fn bounds(&self) -> Option<BoundingBox> {
        let [south, north, west, east] = self.boundingbox.as_ref()?;
        Some(BoundingBox::from_edges(
            south.trim().parse().ok()?,
            west.trim().parse().ok()?,
            north.trim().parse().ok()?,
            east.trim().parse().ok()?,
        ))
    }
}
