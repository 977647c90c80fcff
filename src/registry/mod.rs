//! Beacon registry: known beacons, their installed positions and calibration

pub mod address;
pub mod store;

pub use address::{is_valid_address, normalize_address, AddressError};
pub use store::{BeaconEdit, BeaconStore, ProximityAlert, RegistryError};
