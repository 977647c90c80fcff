use super::geometry::{distance_to_path, point_in_polygon};
use crate::core::Point2D;
use log::info;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;

/// Facility map errors
#[derive(Debug, Clone, PartialEq)]
pub enum MapError {
    /// Map file I/O error
    IoError { message: String },
    /// JSON serialization/deserialization error
    SerializationError { message: String },
    /// Map parsed but describes an unusable layout
    InvalidMap { reason: String },
}

impl fmt::Display for MapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MapError::IoError { message } => write!(f, "I/O error: {}", message),
            MapError::SerializationError { message } => write!(f, "Serialization error: {}", message),
            MapError::InvalidMap { reason } => write!(f, "Invalid map: {}", reason),
        }
    }
}

impl std::error::Error for MapError {}

/// Area of the facility floor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum Zone {
    /// Axis-aligned, anchored at its lower-left corner
    Rectangle { x: f64, y: f64, width: f64, height: f64 },
    Polygon { points: Vec<Point2D> },
}

impl Zone {
    pub fn rectangle(x: f64, y: f64, width: f64, height: f64) -> Self {
        Zone::Rectangle { x, y, width, height }
    }

    pub fn contains(&self, point: &Point2D) -> bool {
        match self {
            Zone::Rectangle { x, y, width, height } => {
                point.x >= *x && point.x <= x + width && point.y >= *y && point.y <= y + height
            }
            Zone::Polygon { points } => point_in_polygon(point, points),
        }
    }

    /// Rectangle centre, or the mean of the polygon's vertices
    pub fn center(&self) -> Option<Point2D> {
        match self {
            Zone::Rectangle { x, y, width, height } => Some(Point2D::new(x + width / 2.0, y + height / 2.0)),
            Zone::Polygon { points } => Point2D::centroid(points),
        }
    }

    fn check(&self) -> Result<(), String> {
        match self {
            Zone::Rectangle { x, y, width, height } => {
                if ![x, y, width, height].iter().all(|v| v.is_finite()) {
                    return Err("rectangle has a non-finite field".to_string());
                }
                if *width <= 0.0 || *height <= 0.0 {
                    return Err(format!("rectangle size {}x{} is not positive", width, height));
                }
            }
            Zone::Polygon { points } => {
                if points.len() < 3 {
                    return Err(format!("polygon has {} vertices, need at least 3", points.len()));
                }
                if !points.iter().all(Point2D::is_finite) {
                    return Err("polygon has a non-finite vertex".to_string());
                }
            }
        }
        Ok(())
    }
}

/// Where the user is relative to the facility's points of interest
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoiState {
    #[default]
    None,
    Start,
    End,
    Path,
}

impl fmt::Display for PoiState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PoiState::None => "none",
            PoiState::Start => "start",
            PoiState::End => "end",
            PoiState::Path => "path",
        };
        f.write_str(name)
    }
}

fn clamp_axis(value: f64, extent: f64) -> f64 {
    value.min(extent).max(0.0)
}

fn default_extent() -> f64 {
    5.0
}

/// Floor plan: bounds, start and end zones, guide paths
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FacilityMap {
    #[serde(default = "default_extent")]
    pub max_x: f64,
    #[serde(default = "default_extent")]
    pub max_y: f64,
    #[serde(default)]
    pub start_zones: Vec<Zone>,
    #[serde(default)]
    pub end_zones: Vec<Zone>,
    /// Polylines the user is guided along
    #[serde(default)]
    pub paths: Vec<Vec<Point2D>>,
}

impl Default for FacilityMap {
    fn default() -> Self {
        Self {
            max_x: default_extent(),
            max_y: default_extent(),
            start_zones: Vec::new(),
            end_zones: Vec::new(),
            paths: Vec::new(),
        }
    }
}

impl FacilityMap {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, MapError> {
        let path = path.as_ref();

        let content = fs::read_to_string(path).map_err(|e| MapError::IoError {
            message: format!("Failed to read map file '{}': {}", path.display(), e),
        })?;

        let map: FacilityMap = serde_json::from_str(&content).map_err(|e| MapError::SerializationError {
            message: format!("Failed to parse map file '{}': {}", path.display(), e),
        })?;
        map.validate()?;

        info!(
            "Loaded facility map from {} ({} start zones, {} end zones, {} paths)",
            path.display(),
            map.start_zones.len(),
            map.end_zones.len(),
            map.paths.len()
        );
        Ok(map)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), MapError> {
        let path = path.as_ref();
        let content = serde_json::to_string_pretty(self).map_err(|e| MapError::SerializationError {
            message: format!("Failed to serialize map: {}", e),
        })?;
        fs::write(path, content).map_err(|e| MapError::IoError {
            message: format!("Failed to write map file '{}': {}", path.display(), e),
        })
    }

    pub fn validate(&self) -> Result<(), MapError> {
        let invalid = |reason: String| MapError::InvalidMap { reason };

        if !(self.max_x.is_finite() && self.max_x > 0.0 && self.max_y.is_finite() && self.max_y > 0.0) {
            return Err(invalid(format!(
                "bounds {}x{} must be positive",
                self.max_x, self.max_y
            )));
        }
        for (i, zone) in self.start_zones.iter().enumerate() {
            zone.check().map_err(|r| invalid(format!("start zone {}: {}", i, r)))?;
        }
        for (i, zone) in self.end_zones.iter().enumerate() {
            zone.check().map_err(|r| invalid(format!("end zone {}: {}", i, r)))?;
        }
        for (i, path) in self.paths.iter().enumerate() {
            if path.is_empty() || !path.iter().all(Point2D::is_finite) {
                return Err(invalid(format!("path {} is empty or has a non-finite point", i)));
            }
        }
        Ok(())
    }

    /// Clamp a position estimate onto the floor plan.
    ///
    /// Never panics on unvalidated bounds: a negative extent pins that axis
    /// to 0, a NaN extent leaves only the lower bound.
    pub fn clamp(&self, point: &Point2D) -> Point2D {
        Point2D::new(clamp_axis(point.x, self.max_x), clamp_axis(point.y, self.max_y))
    }

    /// Centre of the first start zone
    pub fn start_point(&self) -> Option<Point2D> {
        self.start_zones.first().and_then(Zone::center)
    }

    /// Within `tolerance` meters of any guide path
    pub fn is_on_path(&self, point: &Point2D, tolerance: f64) -> bool {
        self.paths
            .iter()
            .filter_map(|path| distance_to_path(point, path))
            .any(|d| d < tolerance)
    }

    /// Classify a position: start zones win over end zones, which win over paths
    pub fn classify(&self, position: Option<Point2D>, tolerance: f64) -> PoiState {
        let Some(point) = position else {
            return PoiState::None;
        };

        if self.start_zones.iter().any(|z| z.contains(&point)) {
            PoiState::Start
        } else if self.end_zones.iter().any(|z| z.contains(&point)) {
            PoiState::End
        } else if self.is_on_path(&point, tolerance) {
            PoiState::Path
        } else {
            PoiState::None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn demo_map() -> FacilityMap {
        FacilityMap {
            max_x: 2.0,
            max_y: 2.0,
            start_zones: vec![Zone::rectangle(0.0, 0.0, 0.5, 0.5)],
            end_zones: vec![Zone::Polygon {
                points: vec![
                    Point2D::new(1.5, 1.5),
                    Point2D::new(2.0, 1.5),
                    Point2D::new(2.0, 2.0),
                    Point2D::new(1.5, 2.0),
                ],
            }],
            paths: vec![vec![
                Point2D::new(0.25, 0.25),
                Point2D::new(1.0, 1.0),
                Point2D::new(1.75, 1.75),
            ]],
        }
    }

    #[test]
    fn test_classify_precedence() {
        let map = demo_map();
        // Inside the start zone and on the path: start wins
        assert_eq!(map.classify(Some(Point2D::new(0.25, 0.25)), 0.5), PoiState::Start);
        assert_eq!(map.classify(Some(Point2D::new(1.75, 1.75)), 0.5), PoiState::End);
        assert_eq!(map.classify(Some(Point2D::new(1.1, 0.9)), 0.5), PoiState::Path);
        assert_eq!(map.classify(Some(Point2D::new(1.9, 0.1)), 0.5), PoiState::None);
        assert_eq!(map.classify(None, 0.5), PoiState::None);
    }

    #[test]
    fn test_path_tolerance() {
        let map = demo_map();
        // (1.5, 0.5) is sqrt(0.5) ~ 0.707 m from the diagonal
        let point = Point2D::new(1.5, 0.5);
        assert!(!map.is_on_path(&point, 0.5));
        assert!(map.is_on_path(&point, 0.8));
    }

    #[test]
    fn test_clamp_and_start_point() {
        let map = demo_map();
        assert_eq!(map.clamp(&Point2D::new(-1.0, 3.0)), Point2D::new(0.0, 2.0));
        assert_eq!(map.clamp(&Point2D::new(1.0, 1.0)), Point2D::new(1.0, 1.0));
        assert_eq!(map.start_point(), Some(Point2D::new(0.25, 0.25)));
        assert_eq!(FacilityMap::default().start_point(), None);
    }

    #[test]
    fn test_clamp_with_unvalidated_bounds() {
        let mut map = demo_map();
        map.max_x = -1.0;
        map.max_y = f64::NAN;
        assert!(map.validate().is_err());
        assert_eq!(map.clamp(&Point2D::new(1.5, 1.5)), Point2D::new(0.0, 1.5));
        assert_eq!(map.clamp(&Point2D::new(-3.0, -3.0)), Point2D::new(0.0, 0.0));
    }

    #[test]
    fn test_map_file_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("map.json");
        let map = demo_map();
        map.save_to_file(&path).unwrap();
        assert_eq!(FacilityMap::load_from_file(&path).unwrap(), map);
    }

    #[test]
    fn test_bundled_map_loads() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("data/facility_map.json");
        let map = FacilityMap::load_from_file(path).unwrap();
        assert_eq!(map.start_point(), Some(Point2D::new(0.25, 0.25)));
        assert_eq!(map.classify(Some(Point2D::new(1.8, 1.8)), 0.5), PoiState::End);
    }

    #[test]
    fn test_load_applies_defaults_and_validates() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("map.json");

        fs::write(&path, r#"{"paths": [[{"x": 0.0, "y": 0.0}, {"x": 1.0, "y": 1.0}]]}"#).unwrap();
        let map = FacilityMap::load_from_file(&path).unwrap();
        assert_eq!(map.max_x, 5.0);
        assert_eq!(map.paths.len(), 1);

        fs::write(
            &path,
            r#"{"start_zones": [{"shape": "polygon", "points": [{"x": 0.0, "y": 0.0}]}]}"#,
        )
        .unwrap();
        assert!(matches!(
            FacilityMap::load_from_file(&path),
            Err(MapError::InvalidMap { .. })
        ));
    }
}
