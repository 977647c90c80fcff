//! Physical constants and system parameters

/// Path-loss exponent for free-space propagation
pub const DEFAULT_PATH_LOSS_EXPONENT: f64 = 2.0;

/// Minimum number of range observations for a 2D fix
pub const MIN_OBSERVATIONS: usize = 3;

/// Number of strongest beacons fed to the solver per scan cycle
pub const DEFAULT_MAX_BEACONS: usize = 3;

/// Distance from a path within which the user counts as on the path (meters)
pub const DEFAULT_PATH_TOLERANCE_M: f64 = 0.5;
