use super::address::{normalize_address, AddressError};
use crate::core::{Beacon, BeaconKind, Point2D, ScanBatch};
use log::{debug, info};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Beacon registry errors
#[derive(Debug, Clone, PartialEq)]
pub enum RegistryError {
    /// Registry file I/O error
    IoError { message: String },
    /// JSON serialization/deserialization error
    SerializationError { message: String },
    InvalidAddress(AddressError),
    /// Beacon field rejected (non-finite coordinate, empty name)
    InvalidBeacon { address: String, reason: String },
    UnknownBeacon { address: String },
    DuplicateBeacon { address: String },
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryError::IoError { message } => write!(f, "I/O error: {}", message),
            RegistryError::SerializationError { message } => {
                write!(f, "Serialization error: {}", message)
            }
            RegistryError::InvalidAddress(e) => write!(f, "{}", e),
            RegistryError::InvalidBeacon { address, reason } => {
                write!(f, "Invalid beacon {}: {}", address, reason)
            }
            RegistryError::UnknownBeacon { address } => write!(f, "No beacon registered at {}", address),
            RegistryError::DuplicateBeacon { address } => {
                write!(f, "A beacon is already registered at {}", address)
            }
        }
    }
}

impl std::error::Error for RegistryError {}

impl From<AddressError> for RegistryError {
    fn from(e: AddressError) -> Self {
        RegistryError::InvalidAddress(e)
    }
}

/// Partial update applied by [`BeaconStore::update`]; `None` leaves a field as is
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BeaconEdit {
    pub name: Option<String>,
    pub calibration_rssi: Option<i32>,
    pub position: Option<Point2D>,
    pub buzzer_sensitivity: Option<i32>,
    pub kind: Option<BeaconKind>,
}

/// A buzzer beacon heard louder than its sensitivity threshold
#[derive(Debug, Clone, PartialEq)]
pub struct ProximityAlert {
    pub address: String,
    pub name: String,
    pub rssi: i32,
    pub sensitivity: i32,
}

/// Known beacons keyed by upper-case MAC address
#[derive(Debug, Clone, Default)]
pub struct BeaconStore {
    beacons: BTreeMap<String, Beacon>,
    /// Changes are written here as they happen when set
    file_path: Option<PathBuf>,
    is_modified: bool,
}

impl BeaconStore {
    /// Empty registry, not bound to a file
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-populated with the bundled demonstration installation
    pub fn with_defaults() -> Self {
        let beacons = [
            ("80:EC:CC:CD:33:28", Beacon::new("Losing Things", -60, 0.0, 1.0)),
            ("80:EC:CC:CD:33:7C", Beacon::new("Happy Mornings", -57, 1.0, 2.0)),
            ("80:EC:CC:CD:33:7E", Beacon::new("STEM", -59, 2.0, 2.0)),
            ("80:EC:CC:CD:33:58", Beacon::new("Visual Clutter", -60, 2.0, 1.0)),
            ("00:3C:84:28:87:01", Beacon::new("MAP", -58, 1.0, 0.0)),
            ("00:3C:84:28:77:AB", Beacon::new("Dance", -60, 1.0, 1.0)),
            ("D8:F2:C8:9B:33:34", Beacon::new("Origin", -62, 0.0, 0.0)),
            ("6C:B2:FD:34:CE:9E", Beacon::new("Bee", -75, 0.5, 0.5)),
        ];

        Self {
            beacons: beacons
                .into_iter()
                .map(|(address, beacon)| (address.to_string(), beacon))
                .collect(),
            file_path: None,
            is_modified: false,
        }
    }

    /// Load a registry from JSON and bind it to that file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, RegistryError> {
        let path = path.as_ref();

        let content = fs::read_to_string(path).map_err(|e| RegistryError::IoError {
            message: format!("Failed to read beacon file '{}': {}", path.display(), e),
        })?;

        let raw: BTreeMap<String, Beacon> =
            serde_json::from_str(&content).map_err(|e| RegistryError::SerializationError {
                message: format!("Failed to parse beacon file '{}': {}", path.display(), e),
            })?;

        let mut beacons = BTreeMap::new();
        for (address, beacon) in raw {
            let address = normalize_address(&address)?;
            check_beacon(&address, &beacon)?;
            if beacons.insert(address.clone(), beacon).is_some() {
                return Err(RegistryError::DuplicateBeacon { address });
            }
        }

        info!("Loaded {} beacons from {}", beacons.len(), path.display());
        Ok(Self {
            beacons,
            file_path: Some(path.to_path_buf()),
            is_modified: false,
        })
    }

    /// Write the registry as JSON and bind it to that file
    pub fn save_to_file<P: AsRef<Path>>(&mut self, path: P) -> Result<(), RegistryError> {
        let path = path.as_ref();

        let content = serde_json::to_string_pretty(&self.beacons).map_err(|e| {
            RegistryError::SerializationError {
                message: format!("Failed to serialize beacons: {}", e),
            }
        })?;

        fs::write(path, content).map_err(|e| RegistryError::IoError {
            message: format!("Failed to write beacon file '{}': {}", path.display(), e),
        })?;

        self.file_path = Some(path.to_path_buf());
        self.is_modified = false;
        info!("Saved {} beacons to {}", self.beacons.len(), path.display());
        Ok(())
    }

    /// Save to the bound file
    pub fn save(&mut self) -> Result<(), RegistryError> {
        match self.file_path.clone() {
            Some(path) => self.save_to_file(path),
            None => Err(RegistryError::IoError {
                message: "No file path set for saving beacons".to_string(),
            }),
        }
    }

    pub fn file_path(&self) -> Option<&Path> {
        self.file_path.as_deref()
    }

    /// Unsaved changes exist
    pub fn is_modified(&self) -> bool {
        self.is_modified
    }

    /// Look up a beacon; the address may be in any case
    pub fn get(&self, address: &str) -> Option<&Beacon> {
        match self.beacons.get(address) {
            Some(beacon) => Some(beacon),
            None => self.beacons.get(&address.trim().to_ascii_uppercase()),
        }
    }

    pub fn contains(&self, address: &str) -> bool {
        self.get(address).is_some()
    }

    pub fn len(&self) -> usize {
        self.beacons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.beacons.is_empty()
    }

    /// Beacons in address order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Beacon)> {
        self.beacons.iter().map(|(address, beacon)| (address.as_str(), beacon))
    }

    /// Register a new beacon
    pub fn insert(&mut self, address: &str, beacon: Beacon) -> Result<(), RegistryError> {
        let address = normalize_address(address)?;
        if self.beacons.contains_key(&address) {
            return Err(RegistryError::DuplicateBeacon { address });
        }
        check_beacon(&address, &beacon)?;

        debug!("Registering beacon {} at {}", beacon, address);
        self.beacons.insert(address.clone(), beacon);
        if let Err(e) = self.changed() {
            self.beacons.remove(&address);
            return Err(e);
        }
        Ok(())
    }

    /// Apply a partial edit to an existing beacon
    pub fn update(&mut self, address: &str, edit: BeaconEdit) -> Result<&Beacon, RegistryError> {
        let address = normalize_address(address)?;
        let current = self
            .beacons
            .get(&address)
            .ok_or_else(|| RegistryError::UnknownBeacon {
                address: address.clone(),
            })?;

        let mut updated = current.clone();
        if let Some(name) = edit.name {
            updated.name = name;
        }
        if let Some(calibration) = edit.calibration_rssi {
            updated.calibration_rssi = calibration;
        }
        if let Some(position) = edit.position {
            updated.position = position;
        }
        if let Some(sensitivity) = edit.buzzer_sensitivity {
            updated.buzzer_sensitivity = sensitivity;
        }
        if let Some(kind) = edit.kind {
            updated.kind = kind;
        }
        check_beacon(&address, &updated)?;

        debug!("Updating beacon {} at {}", updated, address);
        let previous = self.beacons.insert(address.clone(), updated);
        if let Err(e) = self.changed() {
            if let Some(previous) = previous {
                self.beacons.insert(address, previous);
            }
            return Err(e);
        }
        self.beacons
            .get(&address)
            .ok_or(RegistryError::UnknownBeacon { address })
    }

    /// Remove a beacon, returning it
    pub fn remove(&mut self, address: &str) -> Result<Beacon, RegistryError> {
        let address = normalize_address(address)?;
        let beacon = self
            .beacons
            .remove(&address)
            .ok_or_else(|| RegistryError::UnknownBeacon {
                address: address.clone(),
            })?;

        if let Err(e) = self.changed() {
            self.beacons.insert(address, beacon);
            return Err(e);
        }
        debug!("Removed beacon {} at {}", beacon, address);
        Ok(beacon)
    }

    /// Buzzer beacons in `batch` heard above their sensitivity threshold
    pub fn proximity_alerts(&self, batch: &ScanBatch) -> Vec<ProximityAlert> {
        let mut alerts: Vec<ProximityAlert> = Vec::new();
        for reading in &batch.readings {
            let Some(beacon) = self.get(&reading.address) else {
                continue;
            };
            if beacon.kind != BeaconKind::Buzzer || reading.rssi <= beacon.buzzer_sensitivity {
                continue;
            }
            let address = reading.address.trim().to_ascii_uppercase();
            match alerts.iter_mut().find(|a| a.address == address) {
                Some(existing) => existing.rssi = existing.rssi.max(reading.rssi),
                None => alerts.push(ProximityAlert {
                    address,
                    name: beacon.name.clone(),
                    rssi: reading.rssi,
                    sensitivity: beacon.buzzer_sensitivity,
                }),
            }
        }
        alerts
    }

    /// Persist a structural change; the caller undoes it if this fails
    fn changed(&mut self) -> Result<(), RegistryError> {
        match self.file_path.clone() {
            Some(path) => self.save_to_file(path),
            None => {
                self.is_modified = true;
                Ok(())
            }
        }
    }
}

fn check_beacon(address: &str, beacon: &Beacon) -> Result<(), RegistryError> {
    if beacon.name.trim().is_empty() {
        return Err(RegistryError::InvalidBeacon {
            address: address.to_string(),
            reason: "name must not be empty".to_string(),
        });
    }
    if !beacon.position.is_finite() {
        return Err(RegistryError::InvalidBeacon {
            address: address.to_string(),
            reason: format!("position {} is not finite", beacon.position),
        });
    }
    Ok(())
}
