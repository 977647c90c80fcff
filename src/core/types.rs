//! Core data types for the positioning system

use nalgebra::Vector2;
use serde::{Deserialize, Serialize};
use std::fmt;

/// 2D position in the facility's local frame (meters)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point2D {
    pub x: f64,
    pub y: f64,
}

impl Point2D {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance_to(&self, other: &Point2D) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    pub fn to_vector(self) -> Vector2<f64> {
        Vector2::new(self.x, self.y)
    }

    pub fn from_vector(v: &Vector2<f64>) -> Self {
        Self { x: v.x, y: v.y }
    }

    /// Arithmetic mean of a set of points, `None` when empty
    pub fn centroid(points: &[Point2D]) -> Option<Point2D> {
        if points.is_empty() {
            return None;
        }
        let n = points.len() as f64;
        let (sx, sy) = points
            .iter()
            .fold((0.0, 0.0), |(sx, sy), p| (sx + p.x, sy + p.y));
        Some(Point2D::new(sx / n, sy / n))
    }
}

impl fmt::Display for Point2D {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.3}, {:.3})", self.x, self.y)
    }
}

/// Role a beacon plays in the facility
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BeaconKind {
    #[default]
    Default,
    /// Alerts the user when they come close
    Buzzer,
    Start,
    Destination,
}

/// A BLE beacon installed at a known coordinate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Beacon {
    /// Display name
    pub name: String,
    /// RSSI measured at the 1 meter reference distance (dBm)
    pub calibration_rssi: i32,
    /// Installed position
    pub position: Point2D,
    /// RSSI above which a buzzer beacon alerts (dBm)
    #[serde(default)]
    pub buzzer_sensitivity: i32,
    #[serde(default)]
    pub kind: BeaconKind,
}

impl Beacon {
    pub fn new(name: impl Into<String>, calibration_rssi: i32, x: f64, y: f64) -> Self {
        Self {
            name: name.into(),
            calibration_rssi,
            position: Point2D::new(x, y),
            buzzer_sensitivity: 0,
            kind: BeaconKind::Default,
        }
    }

    pub fn with_kind(mut self, kind: BeaconKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_buzzer_sensitivity(mut self, sensitivity: i32) -> Self {
        self.buzzer_sensitivity = sensitivity;
        self
    }
}

impl fmt::Display for Beacon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Estimated distance to one beacon at a known coordinate
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub position: Point2D,
    pub distance: f64,
}

impl Observation {
    pub fn new(position: Point2D, distance: f64) -> Self {
        Self { position, distance }
    }
}

/// One advertisement seen during a scan cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanReading {
    /// MAC address of the advertiser
    pub address: String,
    /// Received signal strength (dBm)
    pub rssi: i32,
}

impl ScanReading {
    pub fn new(address: impl Into<String>, rssi: i32) -> Self {
        Self {
            address: address.into(),
            rssi,
        }
    }
}

/// All readings gathered in a single scan cycle
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScanBatch {
    pub timestamp_ms: u64,
    pub readings: Vec<ScanReading>,
}

impl ScanBatch {
    pub fn new(timestamp_ms: u64, readings: Vec<ScanReading>) -> Self {
        Self {
            timestamp_ms,
            readings,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_distance() {
        let a = Point2D::new(0.0, 0.0);
        let b = Point2D::new(3.0, 4.0);
        assert!((a.distance_to(&b) - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_centroid() {
        let points = [
            Point2D::new(1.0, 1.0),
            Point2D::new(-1.0, 1.0),
            Point2D::new(1.0, -1.0),
        ];
        let c = Point2D::centroid(&points).unwrap();
        assert!((c.x - 1.0 / 3.0).abs() < 1e-12);
        assert!((c.y - 1.0 / 3.0).abs() < 1e-12);
        assert!(Point2D::centroid(&[]).is_none());
    }

    #[test]
    fn test_beacon_serde_defaults() {
        let json = r#"{"name":"STEM","calibration_rssi":-59,"position":{"x":2.0,"y":2.0}}"#;
        let beacon: Beacon = serde_json::from_str(json).unwrap();
        assert_eq!(beacon.kind, BeaconKind::Default);
        assert_eq!(beacon.buzzer_sensitivity, 0);
        assert_eq!(beacon.to_string(), "STEM");
    }
}
