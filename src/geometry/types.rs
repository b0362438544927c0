use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

/// Ordered ring of vertices. The first vertex is not required to be repeated at
/// the end; consumers close the ring themselves.
pub type Polygon = Vec<GeoPoint>;

impl GeoPoint {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Parses `"lat,lon"` text, e.g. `"40.7128, -74.0060"`.
    pub fn from_coordinates(coordinates: &str) -> Option<Self> {
        let parts: Vec<_> = coordinates.split(',').map(|s| s.trim()).collect();
        if parts.len() != 2 {
            return None;
        }
        let lat = parts[0].parse().ok()?;
        let lon = parts[1].parse().ok()?;
        Some(Self { lat, lon })
    }

    pub fn lat_rad(&self) -> f64 {
        self.lat.to_radians()
    }

    pub fn lon_rad(&self) -> f64 {
        self.lon.to_radians()
    }
}

impl std::str::FromStr for GeoPoint {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        GeoPoint::from_coordinates(s).ok_or_else(|| format!("expected 'lat,lon', got '{}'", s))
    }
}

#[cfg(test)]
mod tests {
    use super::GeoPoint;

    #[test]
    fn parses_lat_lon_pairs() {
        let p = GeoPoint::from_coordinates(" 40.71, -74.01 ").unwrap();
        assert_eq!(p, GeoPoint::new(40.71, -74.01));
    }

    #[test]
    fn rejects_malformed_coordinates() {
        assert!(GeoPoint::from_coordinates("40.71").is_none());
        assert!(GeoPoint::from_coordinates("40.71,-74.01,3").is_none());
        assert!(GeoPoint::from_coordinates("north,west").is_none());
    }
}
