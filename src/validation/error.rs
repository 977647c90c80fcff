use crate::core::Point2D;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Result alias for positioning operations
pub type PositioningResult<T> = Result<T, PositioningError>;

/// Failure classification for a single solve.
///
/// Every variant is recoverable: callers skip the update and keep their last
/// known good position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PositioningError {
    /// Too few usable observations to attempt a fix
    InsufficientObservations { available: usize, required: usize },
    /// Beacon layout cannot pin down a 2D position
    DegenerateGeometry {
        #[serde(with = "non_finite")]
        condition_ratio: f64,
        issue: GeometryIssue,
    },
    /// Rejected before reaching the numeric solver
    InvalidMeasurement {
        quantity: MeasuredQuantity,
        #[serde(with = "non_finite")]
        value: f64,
        reason: String,
    },
    /// Iteration budget exhausted; carries the last iterate
    NonConvergence {
        iterations: usize,
        last_estimate: Point2D,
        #[serde(with = "non_finite")]
        rms_residual: f64,
    },
}

/// JSON has no literal for NaN or infinity; those are written as strings
mod non_finite {
    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Number(f64),
        Text(String),
    }

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_finite() {
            serializer.serialize_f64(*value)
        } else {
            serializer.serialize_str(&value.to_string())
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        match Repr::deserialize(deserializer)? {
            Repr::Number(value) => Ok(value),
            Repr::Text(text) => text.parse::<f64>().map_err(serde::de::Error::custom),
        }
    }
}

/// Types of geometric issues that can affect positioning
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GeometryIssue {
    Collinear,
    Coincident,
}

/// Which input a rejected measurement belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MeasuredQuantity {
    Distance,
    Coordinate,
    Rssi,
    PathLossExponent,
}

impl PositioningError {
    pub fn insufficient(available: usize, required: usize) -> Self {
        PositioningError::InsufficientObservations {
            available,
            required,
        }
    }

    pub fn invalid(quantity: MeasuredQuantity, value: f64, reason: impl Into<String>) -> Self {
        PositioningError::InvalidMeasurement {
            quantity,
            value,
            reason: reason.into(),
        }
    }

    /// All positioning failures leave the caller able to continue
    pub fn is_recoverable(&self) -> bool {
        true
    }

    /// Short stable name, used for statistics and log lines
    pub fn kind_name(&self) -> &'static str {
        match self {
            PositioningError::InsufficientObservations { .. } => "InsufficientObservations",
            PositioningError::DegenerateGeometry { .. } => "DegenerateGeometry",
            PositioningError::InvalidMeasurement { .. } => "InvalidMeasurement",
            PositioningError::NonConvergence { .. } => "NonConvergence",
        }
    }
}

impl fmt::Display for PositioningError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PositioningError::InsufficientObservations {
                available,
                required,
            } => {
                write!(
                    f,
                    "Insufficient observations: {} available, {} required",
                    available, required
                )
            }
            PositioningError::DegenerateGeometry {
                condition_ratio,
                issue,
            } => {
                write!(
                    f,
                    "Degenerate geometry ({:?}): eigenvalue ratio {:.3e}",
                    issue, condition_ratio
                )
            }
            PositioningError::InvalidMeasurement {
                quantity,
                value,
                reason,
            } => {
                write!(f, "Invalid {:?} value {}: {}", quantity, value, reason)
            }
            PositioningError::NonConvergence {
                iterations,
                last_estimate,
                rms_residual,
            } => {
                write!(
                    f,
                    "Solver did not converge after {} iterations (last estimate {}, rms residual {:.4} m)",
                    iterations, last_estimate, rms_residual
                )
            }
        }
    }
}

impl std::error::Error for PositioningError {}
