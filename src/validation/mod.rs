//! Input validation and the positioning error taxonomy

pub mod data;
pub mod error;

pub use data::{validate_observation, validate_observations};
pub use error::{GeometryIssue, MeasuredQuantity, PositioningError, PositioningResult};
