use crate::core::{
    DEFAULT_MAX_BEACONS, DEFAULT_PATH_LOSS_EXPONENT, DEFAULT_PATH_TOLERANCE_M, MIN_OBSERVATIONS,
};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// System-wide configuration parameters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemConfig {
    pub solver: SolverConfig,
    pub ranging: RangingConfig,
    pub tracker: TrackerConfig,
    pub navigation: NavigationConfig,
}

/// Tuning for the iterative multilateration solver
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    /// Iteration budget before the solve is reported unconverged
    pub max_iterations: usize,
    /// Stop when the step is this small relative to the estimate
    pub step_tolerance: f64,
    /// Stop when the relative cost decrease falls below this
    pub cost_tolerance: f64,
    /// Stop when the gradient norm falls below this
    pub gradient_tolerance: f64,
    /// Starting Levenberg-Marquardt damping factor
    pub initial_damping: f64,
    /// Damping at which the solver gives up
    pub max_damping: f64,
    /// Smallest accepted eigenvalue ratio of the beacon scatter matrix
    pub collinearity_threshold: f64,
    /// Minimum number of observations for a solve
    pub min_observations: usize,
}

/// Log-distance path-loss model settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RangingConfig {
    /// Environment-dependent decay exponent (2.0 is free space)
    pub path_loss_exponent: f64,
}

/// Per-scan-cycle beacon selection and fix acceptance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Strongest known beacons used per solve
    pub max_beacons: usize,
    /// Fewer usable beacons than this skips the cycle
    pub min_beacons: usize,
    /// Seed each solve with the previous fix
    pub warm_start: bool,
    /// Accept fixes that hit the iteration limit
    pub accept_unconverged: bool,
    /// Moving-average window over each beacon's RSSI (1 disables smoothing)
    pub smoothing_window: usize,
}

/// Facility-map classification settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NavigationConfig {
    /// Distance from a path segment that still counts as on the path (meters)
    pub path_tolerance_m: f64,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            step_tolerance: 1e-10,
            cost_tolerance: 1e-12,
            gradient_tolerance: 1e-10,
            initial_damping: 1e-3,
            max_damping: 1e10,
            collinearity_threshold: 1e-6,
            min_observations: MIN_OBSERVATIONS,
        }
    }
}

impl Default for RangingConfig {
    fn default() -> Self {
        Self {
            path_loss_exponent: DEFAULT_PATH_LOSS_EXPONENT,
        }
    }
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            max_beacons: DEFAULT_MAX_BEACONS,
            min_beacons: MIN_OBSERVATIONS,
            warm_start: false,
            accept_unconverged: false,
            smoothing_window: 1,
        }
    }
}

impl Default for NavigationConfig {
    fn default() -> Self {
        Self {
            path_tolerance_m: DEFAULT_PATH_TOLERANCE_M,
        }
    }
}

/// Configuration validation errors
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// Invalid parameter value
    InvalidParameter {
        parameter: String,
        value: String,
        reason: String,
    },
    /// Configuration file I/O error
    IoError { message: String },
    /// JSON serialization/deserialization error
    SerializationError { message: String },
}

impl ConfigError {
    fn invalid(parameter: &str, value: impl ToString, reason: &str) -> Self {
        ConfigError::InvalidParameter {
            parameter: parameter.to_string(),
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidParameter {
                parameter,
                value,
                reason,
            } => write!(f, "Invalid value '{}' for {}: {}", value, parameter, reason),
            ConfigError::IoError { message } => write!(f, "I/O error: {}", message),
            ConfigError::SerializationError { message } => {
                write!(f, "Serialization error: {}", message)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Configuration validation result
#[derive(Debug)]
pub struct ValidationResult {
    /// Whether configuration is valid
    pub is_valid: bool,
    /// Validation errors
    pub errors: Vec<ConfigError>,
    /// Validation warnings
    pub warnings: Vec<String>,
}

impl ValidationResult {
    fn into_first_error(self) -> Option<ConfigError> {
        self.errors.into_iter().next()
    }
}

/// Main configuration manager
pub struct ConfigurationManager {
    /// Current system configuration
    system_config: SystemConfig,
    /// Configuration file path
    config_file_path: Option<PathBuf>,
    /// Whether configuration has been modified
    is_modified: bool,
}

impl ConfigurationManager {
    /// Create a new configuration manager with default settings
    pub fn new() -> Self {
        Self {
            system_config: SystemConfig::default(),
            config_file_path: None,
            is_modified: false,
        }
    }

    /// Create configuration manager and load from file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut manager = Self::new();
        manager.load_from_file(path)?;
        Ok(manager)
    }

    /// Get current system configuration
    pub fn get_system_config(&self) -> &SystemConfig {
        &self.system_config
    }

    /// Replace the system configuration after validating it
    pub fn update_system_config(&mut self, config: SystemConfig) -> Result<(), ConfigError> {
        let validation = self.validate_system_config(&config);
        if let Some(error) = validation.into_first_error() {
            return Err(error);
        }

        self.system_config = config;
        self.is_modified = true;
        Ok(())
    }

    /// Load configuration from JSON file
    pub fn load_from_file<P: AsRef<Path>>(&mut self, path: P) -> Result<(), ConfigError> {
        let path = path.as_ref();

        let content = fs::read_to_string(path).map_err(|e| ConfigError::IoError {
            message: format!("Failed to read config file '{}': {}", path.display(), e),
        })?;

        let config: SystemConfig =
            serde_json::from_str(&content).map_err(|e| ConfigError::SerializationError {
                message: format!("Failed to parse config file '{}': {}", path.display(), e),
            })?;

        // Validate before applying
        let validation = self.validate_system_config(&config);
        for warning in &validation.warnings {
            warn!("{}: {}", path.display(), warning);
        }
        if let Some(error) = validation.into_first_error() {
            return Err(error);
        }

        self.system_config = config;
        self.config_file_path = Some(path.to_path_buf());
        self.is_modified = false;
        info!("Loaded configuration from {}", path.display());
        Ok(())
    }

    /// Save configuration to JSON file
    pub fn save_to_file<P: AsRef<Path>>(&mut self, path: P) -> Result<(), ConfigError> {
        let path = path.as_ref();

        let content = serde_json::to_string_pretty(&self.system_config).map_err(|e| {
            ConfigError::SerializationError {
                message: format!("Failed to serialize config: {}", e),
            }
        })?;

        fs::write(path, content).map_err(|e| ConfigError::IoError {
            message: format!("Failed to write config file '{}': {}", path.display(), e),
        })?;

        self.config_file_path = Some(path.to_path_buf());
        self.is_modified = false;
        info!("Saved configuration to {}", path.display());
        Ok(())
    }

    /// Save to the currently loaded file path
    pub fn save(&mut self) -> Result<(), ConfigError> {
        match self.config_file_path.clone() {
            Some(path) => self.save_to_file(path),
            None => Err(ConfigError::IoError {
                message: "No file path set for saving configuration".to_string(),
            }),
        }
    }

    /// Check if configuration has been modified since last save
    pub fn is_modified(&self) -> bool {
        self.is_modified
    }

    // Runtime Parameter Adjustment Methods

    /// Update the path-loss exponent, returning the previous value
    pub fn set_path_loss_exponent(&mut self, exponent: f64) -> Result<f64, ConfigError> {
        if !(exponent > 0.0 && exponent <= 10.0) {
            return Err(ConfigError::invalid(
                "path_loss_exponent",
                exponent,
                "Path-loss exponent must be in (0, 10]",
            ));
        }

        let old_value = self.system_config.ranging.path_loss_exponent;
        self.system_config.ranging.path_loss_exponent = exponent;
        self.is_modified = true;
        Ok(old_value)
    }

    pub fn get_path_loss_exponent(&self) -> f64 {
        self.system_config.ranging.path_loss_exponent
    }

    /// Update the on-path tolerance, returning the previous value
    pub fn set_path_tolerance(&mut self, tolerance_m: f64) -> Result<f64, ConfigError> {
        if !(tolerance_m.is_finite() && tolerance_m > 0.0) {
            return Err(ConfigError::invalid(
                "path_tolerance_m",
                tolerance_m,
                "Path tolerance must be a positive distance",
            ));
        }

        let old_value = self.system_config.navigation.path_tolerance_m;
        self.system_config.navigation.path_tolerance_m = tolerance_m;
        self.is_modified = true;
        Ok(old_value)
    }

    pub fn get_path_tolerance(&self) -> f64 {
        self.system_config.navigation.path_tolerance_m
    }

    /// Validate a complete system configuration
    pub fn validate_system_config(&self, config: &SystemConfig) -> ValidationResult {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        let solver = &config.solver;
        if solver.max_iterations == 0 {
            errors.push(ConfigError::invalid(
                "solver.max_iterations",
                solver.max_iterations,
                "At least one iteration is required",
            ));
        }
        for (name, value) in [
            ("solver.step_tolerance", solver.step_tolerance),
            ("solver.cost_tolerance", solver.cost_tolerance),
            ("solver.gradient_tolerance", solver.gradient_tolerance),
            ("solver.initial_damping", solver.initial_damping),
            ("solver.collinearity_threshold", solver.collinearity_threshold),
        ] {
            if !(value.is_finite() && value > 0.0) {
                errors.push(ConfigError::invalid(name, value, "Must be a positive number"));
            }
        }
        if !(solver.max_damping > solver.initial_damping) {
            errors.push(ConfigError::invalid(
                "solver.max_damping",
                solver.max_damping,
                "Must exceed the initial damping",
            ));
        }
        if solver.min_observations < MIN_OBSERVATIONS {
            errors.push(ConfigError::invalid(
                "solver.min_observations",
                solver.min_observations,
                "2D multilateration needs at least 3 observations",
            ));
        }
        if solver.max_iterations > 10_000 {
            warnings.push(format!(
                "solver.max_iterations = {} may stall a scan cycle",
                solver.max_iterations
            ));
        }

        let exponent = config.ranging.path_loss_exponent;
        if !(exponent > 0.0 && exponent <= 10.0) {
            errors.push(ConfigError::invalid(
                "ranging.path_loss_exponent",
                exponent,
                "Path-loss exponent must be in (0, 10]",
            ));
        } else if !(1.5..=4.0).contains(&exponent) {
            warnings.push(format!(
                "ranging.path_loss_exponent = {} is outside the typical indoor range 1.5-4.0",
                exponent
            ));
        }

        let tracker = &config.tracker;
        if tracker.min_beacons < MIN_OBSERVATIONS {
            errors.push(ConfigError::invalid(
                "tracker.min_beacons",
                tracker.min_beacons,
                "At least 3 beacons are required for a fix",
            ));
        }
        if tracker.max_beacons < tracker.min_beacons {
            errors.push(ConfigError::invalid(
                "tracker.max_beacons",
                tracker.max_beacons,
                "Must be at least tracker.min_beacons",
            ));
        }
        if tracker.smoothing_window == 0 {
            errors.push(ConfigError::invalid(
                "tracker.smoothing_window",
                tracker.smoothing_window,
                "Window must hold at least one sample",
            ));
        }
        if tracker.accept_unconverged {
            warnings.push("tracker.accept_unconverged lets imprecise fixes through".to_string());
        }

        let tolerance = config.navigation.path_tolerance_m;
        if !(tolerance.is_finite() && tolerance > 0.0) {
            errors.push(ConfigError::invalid(
                "navigation.path_tolerance_m",
                tolerance,
                "Path tolerance must be a positive distance",
            ));
        }

        ValidationResult {
            is_valid: errors.is_empty(),
            errors,
            warnings,
        }
    }
}

impl Default for ConfigurationManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_system_config() {
        let config = SystemConfig::default();
        assert_eq!(config.ranging.path_loss_exponent, 2.0);
        assert_eq!(config.solver.min_observations, 3);
        assert_eq!(config.tracker.max_beacons, 3);
        assert!(config.solver.max_iterations > 0);
    }

    #[test]
    fn test_default_config_is_valid() {
        let manager = ConfigurationManager::new();
        let result = manager.validate_system_config(&SystemConfig::default());
        assert!(result.is_valid);
        assert!(result.errors.is_empty());
        assert!(!manager.is_modified());
    }

    #[test]
    fn test_invalid_config_collects_errors() {
        let manager = ConfigurationManager::new();
        let mut config = SystemConfig::default();
        config.ranging.path_loss_exponent = 0.0;
        config.tracker.min_beacons = 2;
        config.tracker.smoothing_window = 0;
        config.solver.max_iterations = 0;

        let result = manager.validate_system_config(&config);
        assert!(!result.is_valid);
        assert_eq!(result.errors.len(), 4);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let json = r#"{ "ranging": { "path_loss_exponent": 2.7 }, "tracker": { "warm_start": true } }"#;
        let config: SystemConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.ranging.path_loss_exponent, 2.7);
        assert!(config.tracker.warm_start);
        assert_eq!(config.tracker.max_beacons, 3);
        assert_eq!(config.solver, SolverConfig::default());
    }

    #[test]
    fn test_config_serialization() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let mut manager = ConfigurationManager::new();
        manager.set_path_loss_exponent(3.0).unwrap();
        manager.save_to_file(&path).unwrap();
        assert!(!manager.is_modified());

        let loaded = ConfigurationManager::from_file(&path).unwrap();
        assert_eq!(loaded.get_path_loss_exponent(), 3.0);
        assert_eq!(loaded.get_system_config(), manager.get_system_config());
    }

    #[test]
    fn test_load_rejects_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        fs::write(&path, r#"{ "tracker": { "min_beacons": 1 } }"#).unwrap();

        let result = ConfigurationManager::from_file(&path);
        assert!(matches!(result, Err(ConfigError::InvalidParameter { .. })));

        fs::write(&path, "not json").unwrap();
        let result = ConfigurationManager::from_file(&path);
        assert!(matches!(result, Err(ConfigError::SerializationError { .. })));
    }

    #[test]
    fn test_save_without_path() {
        let mut manager = ConfigurationManager::new();
        assert!(matches!(manager.save(), Err(ConfigError::IoError { .. })));
    }

    #[test]
    fn test_runtime_path_loss_adjustment() {
        let mut manager = ConfigurationManager::new();

        let old = manager.set_path_loss_exponent(2.5).unwrap();
        assert_eq!(old, 2.0);
        assert_eq!(manager.get_path_loss_exponent(), 2.5);
        assert!(manager.is_modified());

        assert!(manager.set_path_loss_exponent(-1.0).is_err());
        assert!(manager.set_path_loss_exponent(f64::NAN).is_err());
        assert_eq!(manager.get_path_loss_exponent(), 2.5);
    }

    #[test]
    fn test_runtime_path_tolerance_adjustment() {
        let mut manager = ConfigurationManager::new();

        let old = manager.set_path_tolerance(0.75).unwrap();
        assert_eq!(old, 0.5);
        assert_eq!(manager.get_path_tolerance(), 0.75);

        assert!(manager.set_path_tolerance(0.0).is_err());
        assert_eq!(manager.get_path_tolerance(), 0.75);
    }

    #[test]
    fn test_update_system_config() {
        let mut manager = ConfigurationManager::new();
        let mut config = SystemConfig::default();
        config.tracker.max_beacons = 5;
        manager.update_system_config(config).unwrap();
        assert_eq!(manager.get_system_config().tracker.max_beacons, 5);

        let mut bad = SystemConfig::default();
        bad.tracker.max_beacons = 2;
        assert!(manager.update_system_config(bad).is_err());
        assert_eq!(manager.get_system_config().tracker.max_beacons, 5);
    }
}
