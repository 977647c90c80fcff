//! Log-distance path-loss model
//!
//! Converts a received signal strength into a distance estimate using
//! `d = 10^((calibration - measured) / (10 * n))`, where `calibration` is the
//! RSSI at the 1 meter reference distance and `n` the path-loss exponent.

use crate::core::{Beacon, DEFAULT_PATH_LOSS_EXPONENT};
use crate::validation::{MeasuredQuantity, PositioningError, PositioningResult};
use serde::{Deserialize, Serialize};

fn check_exponent(path_loss_exponent: f64) -> PositioningResult<()> {
    if !path_loss_exponent.is_finite() || path_loss_exponent <= 0.0 {
        return Err(PositioningError::invalid(
            MeasuredQuantity::PathLossExponent,
            path_loss_exponent,
            "path-loss exponent must be positive and finite",
        ));
    }
    Ok(())
}

fn check_rssi(rssi: f64) -> PositioningResult<()> {
    if !rssi.is_finite() {
        return Err(PositioningError::invalid(
            MeasuredQuantity::Rssi,
            rssi,
            "RSSI must be finite",
        ));
    }
    Ok(())
}

/// Distance in meters implied by a measured RSSI
pub fn distance_from_rssi(
    measured_rssi: f64,
    calibration_rssi: f64,
    path_loss_exponent: f64,
) -> PositioningResult<f64> {
    check_exponent(path_loss_exponent)?;
    check_rssi(measured_rssi)?;
    check_rssi(calibration_rssi)?;

    let exponent = (calibration_rssi - measured_rssi) / (10.0 * path_loss_exponent);
    let distance = 10f64.powf(exponent);
    if !distance.is_finite() || distance <= 0.0 {
        return Err(PositioningError::invalid(
            MeasuredQuantity::Rssi,
            measured_rssi,
            "RSSI implies a distance outside the representable range",
        ));
    }
    Ok(distance)
}

/// RSSI expected at `distance` meters; inverse of [`distance_from_rssi`]
pub fn rssi_at_distance(
    distance: f64,
    calibration_rssi: f64,
    path_loss_exponent: f64,
) -> PositioningResult<f64> {
    check_exponent(path_loss_exponent)?;
    check_rssi(calibration_rssi)?;
    if !distance.is_finite() || distance <= 0.0 {
        return Err(PositioningError::invalid(
            MeasuredQuantity::Distance,
            distance,
            "distance must be positive and finite",
        ));
    }
    Ok(calibration_rssi - 10.0 * path_loss_exponent * distance.log10())
}

/// Path-loss model shared by every beacon in a facility
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PathLossModel {
    pub path_loss_exponent: f64,
}

impl Default for PathLossModel {
    fn default() -> Self {
        Self {
            path_loss_exponent: DEFAULT_PATH_LOSS_EXPONENT,
        }
    }
}

impl PathLossModel {
    /// Build a model, rejecting non-positive exponents up front
    pub fn new(path_loss_exponent: f64) -> PositioningResult<Self> {
        check_exponent(path_loss_exponent)?;
        Ok(Self { path_loss_exponent })
    }

    /// Distance to `beacon` given the RSSI measured from it
    pub fn distance(&self, beacon: &Beacon, measured_rssi: f64) -> PositioningResult<f64> {
        distance_from_rssi(
            measured_rssi,
            beacon.calibration_rssi as f64,
            self.path_loss_exponent,
        )
    }

    /// RSSI a receiver would see at `distance` meters from `beacon`
    pub fn expected_rssi(&self, beacon: &Beacon, distance: f64) -> PositioningResult<f64> {
        rssi_at_distance(distance, beacon.calibration_rssi as f64, self.path_loss_exponent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    #[test]
    fn test_reference_distance() {
        // At the calibration RSSI the receiver is exactly 1 m away
        let d = distance_from_rssi(-60.0, -60.0, 2.0).unwrap();
        assert!((d - 1.0).abs() < 1e-12);

        // 20 dB weaker with n = 2 is ten times farther
        let d = distance_from_rssi(-80.0, -60.0, 2.0).unwrap();
        assert!((d - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_round_trip_over_realistic_ranges() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..1000 {
            let n = rng.gen_range(1.5..=4.0);
            let calibration = rng.gen_range(-80.0..=-40.0);
            let true_distance = rng.gen_range(0.1..30.0);

            let rssi = rssi_at_distance(true_distance, calibration, n).unwrap();
            let recovered = distance_from_rssi(rssi, calibration, n).unwrap();
            assert!(
                (recovered - true_distance).abs() < 1e-9 * true_distance.max(1.0),
                "n={} cal={} d={} recovered={}",
                n,
                calibration,
                true_distance,
                recovered
            );
        }
    }

    #[test]
    fn test_rejects_invalid_exponent() {
        for n in [0.0, -2.0, f64::NAN, f64::INFINITY] {
            let err = distance_from_rssi(-70.0, -60.0, n).unwrap_err();
            assert!(matches!(
                err,
                PositioningError::InvalidMeasurement {
                    quantity: MeasuredQuantity::PathLossExponent,
                    ..
                }
            ));
        }
        assert!(PathLossModel::new(0.0).is_err());
    }

    #[test]
    fn test_rejects_invalid_rssi_and_distance() {
        assert!(distance_from_rssi(f64::NAN, -60.0, 2.0).is_err());
        assert!(rssi_at_distance(0.0, -60.0, 2.0).is_err());
        assert!(rssi_at_distance(-1.0, -60.0, 2.0).is_err());
    }

    #[test]
    fn test_model_uses_beacon_calibration() {
        let model = PathLossModel::new(2.0).unwrap();
        let beacon = Beacon::new("STEM", -59, 2.0, 2.0);
        let rssi = model.expected_rssi(&beacon, 3.0).unwrap();
        let d = model.distance(&beacon, rssi).unwrap();
        assert!((d - 3.0).abs() < 1e-9);
    }
}
