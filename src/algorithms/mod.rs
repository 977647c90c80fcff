//! Core positioning algorithms

pub mod gdop;
pub mod multilateration;
pub mod trilateration;

pub use gdop::{DilutionOfPrecision, GeometryAssessment, GeometryQuality};
pub use multilateration::{Multilateration, Solution, SolveStatus};
pub use trilateration::{linearized_estimate, trilaterate_closed_form};
