//! Signal processing from raw scans to position fixes

pub mod ranging;
pub mod smoothing;
pub mod tracker;

pub use ranging::{distance_from_rssi, rssi_at_distance, PathLossModel};
pub use smoothing::RssiSmoother;
pub use tracker::{PositionFix, PositionTracker, TrackerStats, TrackerUpdate};
