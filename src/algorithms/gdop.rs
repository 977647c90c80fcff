use crate::core::Point2D;
use crate::validation::{GeometryIssue, PositioningError, PositioningResult};
use nalgebra::Matrix2;
use serde::{Deserialize, Serialize};

/// Geometry quality assessment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GeometryQuality {
    /// Excellent geometry (DOP < 2.0)
    Excellent,
    /// Good geometry (DOP < 5.0)
    Good,
    /// Acceptable geometry (DOP < 10.0)
    Acceptable,
    /// Poor geometry (DOP >= 10.0)
    Poor,
    /// Degenerate geometry (nearly singular)
    Degenerate,
}

impl GeometryQuality {
    pub fn from_dop(dop: f64) -> Self {
        if !dop.is_finite() {
            GeometryQuality::Degenerate
        } else if dop < 2.0 {
            GeometryQuality::Excellent
        } else if dop < 5.0 {
            GeometryQuality::Good
        } else if dop < 10.0 {
            GeometryQuality::Acceptable
        } else {
            GeometryQuality::Poor
        }
    }
}

/// Horizontal dilution of precision at an estimate
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DilutionOfPrecision {
    pub hdop: f64,
    pub quality: GeometryQuality,
}

/// Shape of the beacon layout, independent of the user's position
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeometryAssessment {
    /// Ratio of smallest to largest eigenvalue of the centred scatter matrix.
    /// 1.0 is isotropic, 0.0 is perfectly collinear.
    pub condition_ratio: f64,
    pub issue: Option<GeometryIssue>,
}

impl GeometryAssessment {
    pub fn is_degenerate(&self) -> bool {
        self.issue.is_some()
    }
}

/// Measure how well a set of beacon coordinates spans the plane
pub fn assess_beacon_geometry(positions: &[Point2D], collinearity_threshold: f64) -> GeometryAssessment {
    let centroid = match Point2D::centroid(positions) {
        Some(c) => c,
        None => {
            return GeometryAssessment {
                condition_ratio: 0.0,
                issue: Some(GeometryIssue::Coincident),
            }
        }
    };

    let mut scatter = Matrix2::zeros();
    let mut scale: f64 = 1.0;
    for p in positions {
        let d = p.to_vector() - centroid.to_vector();
        scatter += d * d.transpose();
        scale = scale.max(p.x.abs()).max(p.y.abs());
    }

    let eigenvalues = scatter.symmetric_eigenvalues();
    let lambda_max = eigenvalues.max();
    let lambda_min = eigenvalues.min().max(0.0);

    if lambda_max <= f64::EPSILON * scale * scale {
        return GeometryAssessment {
            condition_ratio: 0.0,
            issue: Some(GeometryIssue::Coincident),
        };
    }

    let condition_ratio = lambda_min / lambda_max;
    let issue = if condition_ratio < collinearity_threshold {
        Some(GeometryIssue::Collinear)
    } else {
        None
    };

    GeometryAssessment {
        condition_ratio,
        issue,
    }
}

/// Like [`assess_beacon_geometry`] but turns a degenerate layout into an error
pub fn check_beacon_geometry(
    positions: &[Point2D],
    collinearity_threshold: f64,
) -> PositioningResult<GeometryAssessment> {
    let assessment = assess_beacon_geometry(positions, collinearity_threshold);
    match assessment.issue {
        Some(issue) => Err(PositioningError::DegenerateGeometry {
            condition_ratio: assessment.condition_ratio,
            issue,
        }),
        None => Ok(assessment),
    }
}

/// HDOP of the beacon layout as seen from `estimate`.
///
/// Returns `None` when the line-of-sight matrix is singular.
pub fn dilution_of_precision(positions: &[Point2D], estimate: &Point2D) -> Option<DilutionOfPrecision> {
    let mut geometry = Matrix2::zeros();
    let mut used = 0;
    for p in positions {
        let d = estimate.to_vector() - p.to_vector();
        let range = d.norm();
        if range < 1e-12 {
            continue;
        }
        let u = d / range;
        geometry += u * u.transpose();
        used += 1;
    }
    if used < 2 {
        return None;
    }

    let covariance = geometry.try_inverse()?;
    let trace = covariance.trace();
    if !trace.is_finite() || trace <= 0.0 {
        return None;
    }

    let hdop = trace.sqrt();
    Some(DilutionOfPrecision {
        hdop,
        quality: GeometryQuality::from_dop(hdop),
    })
}
