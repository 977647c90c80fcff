//! Iterative least-squares multilateration
//!
//! Minimizes `sum_i (|p - b_i| - d_i)^2` over the user position `p` with a
//! damped Newton (Levenberg-Marquardt) iteration. The Hessian keeps the
//! second-order range-curvature term, which keeps convergence quadratic even
//! when noisy ranges leave large residuals at the optimum.

use crate::algorithms::gdop::{check_beacon_geometry, dilution_of_precision, DilutionOfPrecision};
use crate::algorithms::trilateration::linearized_estimate;
use crate::core::{Observation, Point2D};
use crate::utils::config::SolverConfig;
use crate::validation::{validate_observations, PositioningError, PositioningResult};
use log::{debug, trace};
use nalgebra::{Matrix2, Vector2};
use serde::{Deserialize, Serialize};

/// Ranges shorter than this contribute no gradient (iterate sits on a beacon)
const MIN_RANGE: f64 = 1e-12;

/// How the iteration ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SolveStatus {
    Converged,
    /// Iteration or damping budget exhausted; the estimate is the last iterate
    IterationLimit,
}

/// Output of one solve
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Solution {
    pub position: Point2D,
    pub status: SolveStatus,
    pub iterations: usize,
    /// Root-mean-square range residual at `position` (meters)
    pub rms_residual: f64,
    pub dop: Option<DilutionOfPrecision>,
}

impl Solution {
    pub fn is_converged(&self) -> bool {
        self.status == SolveStatus::Converged
    }

    /// Turn an unconverged solution into `NonConvergence`
    pub fn into_converged(self) -> PositioningResult<Solution> {
        match self.status {
            SolveStatus::Converged => Ok(self),
            SolveStatus::IterationLimit => Err(PositioningError::NonConvergence {
                iterations: self.iterations,
                last_estimate: self.position,
                rms_residual: self.rms_residual,
            }),
        }
    }
}

/// Nonlinear least-squares position solver
#[derive(Debug, Clone, Default)]
pub struct Multilateration {
    config: SolverConfig,
}

impl Multilateration {
    pub fn new(config: SolverConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    /// Estimate the position best explaining `observations`.
    ///
    /// `initial_guess` seeds the iteration (typically the previous fix). When
    /// absent, the linearized closed-form estimate is used, falling back to
    /// the beacon centroid.
    pub fn solve(
        &self,
        observations: &[Observation],
        initial_guess: Option<Point2D>,
    ) -> PositioningResult<Solution> {
        validate_observations(observations, self.config.min_observations)?;

        let beacons: Vec<Point2D> = observations.iter().map(|o| o.position).collect();
        check_beacon_geometry(&beacons, self.config.collinearity_threshold)?;

        let start = initial_guess
            .filter(Point2D::is_finite)
            .or_else(|| linearized_estimate(observations))
            .or_else(|| Point2D::centroid(&beacons))
            .ok_or_else(|| PositioningError::insufficient(0, self.config.min_observations))?;

        let (position, status, iterations) = self.levenberg_marquardt(observations, start);
        let cost = sum_squared_residuals(observations, &position);
        let rms_residual = (cost / observations.len() as f64).sqrt();
        let dop = dilution_of_precision(&beacons, &position);

        match status {
            SolveStatus::Converged => debug!(
                "Converged to {} in {} iterations (rms residual {:.4} m)",
                position, iterations, rms_residual
            ),
            SolveStatus::IterationLimit => debug!(
                "Stopped at {} after {} iterations without converging (rms residual {:.4} m)",
                position, iterations, rms_residual
            ),
        }

        Ok(Solution {
            position,
            status,
            iterations,
            rms_residual,
            dop,
        })
    }

    /// Solve and reject anything that did not converge
    pub fn solve_converged(
        &self,
        observations: &[Observation],
        initial_guess: Option<Point2D>,
    ) -> PositioningResult<Solution> {
        self.solve(observations, initial_guess)?.into_converged()
    }

    fn levenberg_marquardt(&self, observations: &[Observation], start: Point2D) -> (Point2D, SolveStatus, usize) {
        let cfg = &self.config;
        let mut estimate = start.to_vector();
        let mut cost = sum_squared_residuals(observations, &start);
        let mut lambda = cfg.initial_damping;

        for iteration in 0..cfg.max_iterations {
            let (gradient, hessian) = gradient_and_hessian(observations, &estimate);

            if gradient.norm() <= cfg.gradient_tolerance {
                return (Point2D::from_vector(&estimate), SolveStatus::Converged, iteration);
            }

            // Raise damping until the system is positive definite
            let step = loop {
                let damping = lambda * (hessian[(0, 0)].abs() + hessian[(1, 1)].abs()).max(1e-12);
                let damped = hessian + Matrix2::identity() * damping;
                match damped.cholesky() {
                    Some(chol) => break chol.solve(&(-gradient)),
                    None => {
                        lambda *= 10.0;
                        if lambda > cfg.max_damping {
                            return (
                                Point2D::from_vector(&estimate),
                                SolveStatus::IterationLimit,
                                iteration,
                            );
                        }
                    }
                }
            };

            if step.norm() <= cfg.step_tolerance * (estimate.norm() + cfg.step_tolerance) {
                return (Point2D::from_vector(&estimate), SolveStatus::Converged, iteration);
            }

            let candidate = estimate + step;
            let candidate_cost = sum_squared_residuals(observations, &Point2D::from_vector(&candidate));
            trace!(
                "iteration {}: cost {:.6e} -> {:.6e}, lambda {:.1e}",
                iteration,
                cost,
                candidate_cost,
                lambda
            );

            if candidate_cost < cost {
                let small_decrease = cost - candidate_cost <= cfg.cost_tolerance * cost;
                estimate = candidate;
                cost = candidate_cost;
                lambda = (lambda / 10.0).max(1e-12);
                if small_decrease {
                    return (Point2D::from_vector(&estimate), SolveStatus::Converged, iteration + 1);
                }
            } else {
                lambda *= 10.0;
                if lambda > cfg.max_damping {
                    return (
                        Point2D::from_vector(&estimate),
                        SolveStatus::IterationLimit,
                        iteration + 1,
                    );
                }
            }
        }

        (
            Point2D::from_vector(&estimate),
            SolveStatus::IterationLimit,
            cfg.max_iterations,
        )
    }
}

fn sum_squared_residuals(observations: &[Observation], estimate: &Point2D) -> f64 {
    observations
        .iter()
        .map(|o| {
            let r = o.position.distance_to(estimate) - o.distance;
            r * r
        })
        .sum()
}

/// Gradient and Hessian of half the sum of squared range residuals
fn gradient_and_hessian(observations: &[Observation], estimate: &Vector2<f64>) -> (Vector2<f64>, Matrix2<f64>) {
    let mut gradient = Vector2::zeros();
    let mut hessian = Matrix2::zeros();

    for obs in observations {
        let delta = estimate - obs.position.to_vector();
        let range = delta.norm();
        if range < MIN_RANGE {
            continue;
        }
        let unit = delta / range;
        let residual = range - obs.distance;
        let outer = unit * unit.transpose();

        gradient += unit * residual;
        hessian += outer + (Matrix2::identity() - outer) * (residual / range);
    }

    (gradient, hessian)
}
