//! Closed-form trilateration
//!
//! Subtracting circle equations pairwise cancels the quadratic terms and
//! leaves a linear system in (x, y). With exactly three beacons this is a 2x2
//! solve; with more it becomes an overdetermined least-squares problem. Both
//! are exact for noise-free ranges and noise-sensitive otherwise, so the
//! iterative solver uses the linearized estimate only as its starting point.

use crate::core::{Observation, Point2D};
use crate::validation::{GeometryIssue, PositioningError, PositioningResult};
use nalgebra::{Matrix2, Vector2};

/// Relative size below which the 2x2 determinant is treated as singular
const SINGULAR_DETERMINANT_RATIO: f64 = 1e-9;

/// Exact linear trilateration from three observations.
///
/// Returns `DegenerateGeometry` instead of a point when the beacons are
/// collinear or close enough to it that the determinant vanishes.
pub fn trilaterate_closed_form(observations: &[Observation; 3]) -> PositioningResult<Point2D> {
    let [o1, o2, o3] = observations;
    let (x1, y1, r1) = (o1.position.x, o1.position.y, o1.distance);
    let (x2, y2, r2) = (o2.position.x, o2.position.y, o2.distance);
    let (x3, y3, r3) = (o3.position.x, o3.position.y, o3.distance);

    let a = 2.0 * (x2 - x1);
    let b = 2.0 * (y2 - y1);
    let c = r1 * r1 - r2 * r2 - x1 * x1 - y1 * y1 + x2 * x2 + y2 * y2;
    let d = 2.0 * (x3 - x2);
    let e = 2.0 * (y3 - y2);
    let f = r2 * r2 - r3 * r3 - x2 * x2 - y2 * y2 + x3 * x3 + y3 * y3;

    let det = a * e - b * d;
    let scale = (a.abs() + b.abs()) * (d.abs() + e.abs());
    if scale == 0.0 || det.abs() <= SINGULAR_DETERMINANT_RATIO * scale {
        let issue = if scale == 0.0 {
            GeometryIssue::Coincident
        } else {
            GeometryIssue::Collinear
        };
        return Err(PositioningError::DegenerateGeometry {
            condition_ratio: if scale == 0.0 { 0.0 } else { det.abs() / scale },
            issue,
        });
    }

    let x = (c * e - f * b) / det;
    let y = (a * f - c * d) / det;
    Ok(Point2D::new(x, y))
}

/// Linearized least-squares estimate over any number of observations.
///
/// Each observation after the first is differenced against the first, and
/// the resulting normal equations are solved. Returns `None` for fewer than
/// three observations or a singular system.
pub fn linearized_estimate(observations: &[Observation]) -> Option<Point2D> {
    if observations.len() < 3 {
        return None;
    }

    let reference = &observations[0];
    let (x1, y1, r1) = (reference.position.x, reference.position.y, reference.distance);

    let mut normal = Matrix2::zeros();
    let mut rhs = Vector2::zeros();
    for obs in &observations[1..] {
        let (xi, yi, ri) = (obs.position.x, obs.position.y, obs.distance);
        let row = Vector2::new(2.0 * (xi - x1), 2.0 * (yi - y1));
        let value = r1 * r1 - ri * ri - x1 * x1 - y1 * y1 + xi * xi + yi * yi;
        normal += row * row.transpose();
        rhs += row * value;
    }

    let solution = normal.try_inverse()? * rhs;
    let point = Point2D::from_vector(&solution);
    if point.is_finite() {
        Some(point)
    } else {
        None
    }
}
