use serde::{Deserialize, Serialize};

use super::types::GeoPoint;
use crate::units::KM_PER_DEGREE;

/// Axis-aligned latitude/longitude rectangle.
///
/// Always normalized: `south <= north` and `west <= east`, whatever order the
/// edges arrived in.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "Edges")]
pub struct BoundingBox {
    pub south: f64,
    pub west: f64,
    pub north: f64,
    pub east: f64,
}

#[derive(Deserialize)]
struct Edges {
    south: f64,
    west: f64,
    north: f64,
    east: f64,
}

impl From<Edges> for BoundingBox {
    fn from(e: Edges) -> Self {
        BoundingBox::from_edges(e.south, e.west, e.north, e.east)
    }
}

impl BoundingBox {
    pub fn from_edges(south: f64, west: f64, north: f64, east: f64) -> Self {
        Self {
            south: south.min(north),
            west: west.min(east),
            north: south.max(north),
            east: west.max(east),
        }
    }

    /// Box spanned by two drag corners, in any order.
    pub fn from_corners(a: GeoPoint, b: GeoPoint) -> Self {
        Self {
            south: a.lat.min(b.lat),
            north: a.lat.max(b.lat),
            west: a.lon.min(b.lon),
            east: a.lon.max(b.lon),
        }
    }

    pub fn height_deg(&self) -> f64 {
        self.north - self.south
    }

    pub fn width_deg(&self) -> f64 {
        self.east - self.west
    }

    /// True when the box has no positive width or height (including NaN edges).
    pub fn is_degenerate(&self) -> bool {
        !(self.height_deg() > 0.0 && self.width_deg() > 0.0)
    }

    pub fn center(&self) -> GeoPoint {
        GeoPoint::new(
            (self.south + self.north) / 2.0,
            (self.west + self.east) / 2.0,
        )
    }

    pub fn contains(&self, point: GeoPoint) -> bool {
        point.lat >= self.south
            && point.lat <= self.north
            && point.lon >= self.west
            && point.lon <= self.east
    }

    /// Equirectangular area estimate, good enough for sizing a request.
    pub fn approx_area_km2(&self) -> f64 {
        let mean_lat = (self.south + self.north) / 2.0;
        let height_km = self.height_deg().abs() * KM_PER_DEGREE;
        let width_km = self.width_deg().abs() * KM_PER_DEGREE * mean_lat.to_radians().cos();
        height_km * width_km
    }
}

/// Tracks a drag gesture on the map and produces the selected box on release.
#[derive(Debug, Default)]
pub struct BboxSelector {
    start: Option<GeoPoint>,
    selection: Option<BoundingBox>,
}

impl BboxSelector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a new drag. Any previous selection is discarded.
    pub fn begin(&mut self, start: GeoPoint) {
        self.start = Some(start);
        self.selection = None;
    }

    pub fn is_dragging(&self) -> bool {
        self.start.is_some()
    }

    /// Live rectangle for the overlay while the pointer moves.
    pub fn update(&self, current: GeoPoint) -> Option<BoundingBox> {
        self.start.map(|start| BoundingBox::from_corners(start, current))
    }

    /// Ends the drag. A zero-area drag leaves nothing selected.
    pub fn finish(&mut self, end: GeoPoint) -> Option<BoundingBox> {
        let start = self.start.take()?;
        let bbox = BoundingBox::from_corners(start, end);
        if bbox.is_degenerate() {
            log::debug!("Ignoring degenerate drag selection {:?}", bbox);
            self.selection = None;
        } else {
            self.selection = Some(bbox);
        }
        self.selection
    }

    pub fn cancel(&mut self) {
        self.start = None;
    }

    pub fn clear(&mut self) {
        self.start = None;
        self.selection = None;
    }

    pub fn selection(&self) -> Option<BoundingBox> {
        self.selection
    }
}
