//! BLE Beacon Indoor Positioning
//!
//! Estimates a user's 2D position inside a facility from the received signal
//! strength of BLE beacons installed at known coordinates. RSSI readings are
//! converted to distances with a log-distance path-loss model, and the
//! distances are combined by nonlinear least-squares multilateration.

pub mod core;
pub mod algorithms;
pub mod processing;
pub mod validation;
pub mod utils;
pub mod registry;
pub mod navigation;

// Re-export commonly used types
pub use core::{Beacon, BeaconKind, Observation, Point2D, ScanBatch, ScanReading};
pub use algorithms::multilateration::{Multilateration, Solution, SolveStatus};
pub use algorithms::trilateration::{linearized_estimate, trilaterate_closed_form};
pub use algorithms::gdop::{DilutionOfPrecision, GeometryQuality};
pub use processing::ranging::{distance_from_rssi, rssi_at_distance, PathLossModel};
pub use processing::tracker::{PositionFix, PositionTracker, TrackerStats, TrackerUpdate};
pub use validation::{GeometryIssue, PositioningError, PositioningResult};
pub use registry::{BeaconEdit, BeaconStore, RegistryError};
pub use navigation::{FacilityMap, PoiState, Zone};
pub use utils::config::{ConfigurationManager, SystemConfig};
