//! Facility map and point-of-interest classification

pub mod geometry;
pub mod poi;

pub use geometry::{distance_to_path, distance_to_segment, point_in_polygon};
pub use poi::{FacilityMap, MapError, PoiState, Zone};
