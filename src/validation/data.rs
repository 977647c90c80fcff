use crate::core::Observation;
use crate::validation::error::{MeasuredQuantity, PositioningError, PositioningResult};

/// Check a single observation before it reaches the solver.
///
/// Coordinates must be finite and the distance finite and strictly positive.
pub fn validate_observation(observation: &Observation) -> PositioningResult<()> {
    let p = &observation.position;
    for value in [p.x, p.y] {
        if !value.is_finite() {
            return Err(PositioningError::invalid(
                MeasuredQuantity::Coordinate,
                value,
                "beacon coordinate must be finite",
            ));
        }
    }

    let d = observation.distance;
    if !d.is_finite() {
        return Err(PositioningError::invalid(
            MeasuredQuantity::Distance,
            d,
            "distance must be finite",
        ));
    }
    if d <= 0.0 {
        return Err(PositioningError::invalid(
            MeasuredQuantity::Distance,
            d,
            "distance must be positive",
        ));
    }
    Ok(())
}

/// Validate a full observation set, including the minimum count
pub fn validate_observations(observations: &[Observation], required: usize) -> PositioningResult<()> {
    for observation in observations {
        validate_observation(observation)?;
    }
    if observations.len() < required {
        return Err(PositioningError::insufficient(observations.len(), required));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Point2D;

    fn obs(x: f64, y: f64, d: f64) -> Observation {
        Observation::new(Point2D::new(x, y), d)
    }

    #[test]
    fn test_valid_observations() {
        let set = [obs(0.0, 0.0, 1.0), obs(1.0, 0.0, 1.0), obs(0.0, 1.0, 1.0)];
        assert!(validate_observations(&set, 3).is_ok());
    }

    #[test]
    fn test_rejects_bad_distances() {
        for d in [0.0, -2.0, f64::NAN, f64::INFINITY] {
            let err = validate_observation(&obs(0.0, 0.0, d)).unwrap_err();
            assert!(matches!(
                err,
                PositioningError::InvalidMeasurement { quantity: MeasuredQuantity::Distance, .. }
            ));
        }
    }

    #[test]
    fn test_rejects_bad_coordinates() {
        let err = validate_observation(&obs(f64::NAN, 0.0, 1.0)).unwrap_err();
        assert!(matches!(
            err,
            PositioningError::InvalidMeasurement { quantity: MeasuredQuantity::Coordinate, .. }
        ));
    }

    #[test]
    fn test_insufficient_count() {
        let set = [obs(0.0, 0.0, 1.0), obs(1.0, 0.0, 1.0)];
        assert_eq!(
            validate_observations(&set, 3),
            Err(PositioningError::insufficient(2, 3))
        );
        assert_eq!(
            validate_observations(&[], 3),
            Err(PositioningError::insufficient(0, 3))
        );
    }
}
