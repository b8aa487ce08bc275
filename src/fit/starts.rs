//! Starting-point grid for multi-start fitting.
//!
//! Levenberg–Marquardt is a local method. A small deterministic grid around
//! the initial guess is a cheap way to avoid settling in a poor basin when the
//! guess is far from the optimum.

use crate::domain::{PARAM_COUNT, ParameterSet};
use crate::error::AppError;

/// Upper bound on the number of starting points a grid may generate
/// (`steps = 17` gives 83,522).
pub const MAX_STARTS: usize = 100_000;

/// Cartesian grid of starting points around a centre.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StartGrid {
    /// Half-width of the grid per parameter.
    pub spread: ParameterSet,
    /// Points per parameter (1 = centre only).
    pub steps: usize,
}

impl StartGrid {
    /// A single start at the centre.
    pub fn single() -> Self {
        Self {
            spread: ParameterSet::new(0.0, 0.0, 0.0, 0.0),
            steps: 1,
        }
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.steps == 0 {
            return Err(AppError::invalid_input("Start steps must be >= 1."));
        }
        if self
            .spread
            .to_array()
            .iter()
            .any(|s| !(s.is_finite() && *s >= 0.0))
        {
            return Err(AppError::invalid_input(format!(
                "Start spread must be finite and >= 0, got {:?}.",
                self.spread
            )));
        }
        if self.count() > MAX_STARTS {
            return Err(AppError::invalid_input(format!(
                "{} steps per parameter is {}^{PARAM_COUNT} + 1 starting points; at most {MAX_STARTS} are allowed.",
                self.steps, self.steps
            )));
        }
        Ok(())
    }

    /// Number of starting points the grid generates, saturating at `usize::MAX`.
    pub fn count(&self) -> usize {
        if self.steps <= 1 {
            1
        } else {
            self.steps
                .checked_pow(PARAM_COUNT as u32)
                .and_then(|n| n.checked_add(1))
                .unwrap_or(usize::MAX)
        }
    }

    /// Starting points: the centre first, then the cartesian product of
    /// `steps` evenly spaced values in `[c - s, c + s]` per parameter
    /// (last parameter varying fastest).
    pub fn start_points(&self, center: &ParameterSet) -> Result<Vec<ParameterSet>, AppError> {
        self.validate()?;
        if !center.is_finite() {
            return Err(AppError::invalid_input(format!(
                "Initial guess must be finite, got {center:?}."
            )));
        }

        let mut out = Vec::with_capacity(self.count());
        out.push(*center);
        if self.steps == 1 {
            return Ok(out);
        }

        let c = center.to_array();
        let s = self.spread.to_array();
        let axes: Vec<Vec<f64>> = (0..PARAM_COUNT)
            .map(|p| linspace(c[p] - s[p], c[p] + s[p], self.steps))
            .collect();

        for i0 in &axes[0] {
            for i1 in &axes[1] {
                for i2 in &axes[2] {
                    for i3 in &axes[3] {
                        out.push(ParameterSet::new(*i0, *i1, *i2, *i3));
                    }
                }
            }
        }
        Ok(out)
    }
}

impl Default for StartGrid {
    fn default() -> Self {
        Self::single()
    }
}

/// `steps` evenly spaced points between `min` and `max` (inclusive, steps >= 2).
fn linspace(min: f64, max: f64, steps: usize) -> Vec<f64> {
    let step = (max - min) / (steps as f64 - 1.0);
    (0..steps).map(|i| min + step * i as f64).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn single_step_is_just_the_centre() {
        let grid = StartGrid {
            spread: ParameterSet::new(1.0, 5.0, 2.0, 10.0),
            steps: 1,
        };
        let pts = grid.start_points(&ParameterSet::default_guess()).unwrap();
        assert_eq!(pts, vec![ParameterSet::default_guess()]);
        assert_eq!(grid.count(), 1);
    }

    #[test]
    fn grid_is_centre_then_cartesian_product() {
        let grid = StartGrid {
            spread: ParameterSet::new(1.0, 5.0, 2.0, 10.0),
            steps: 3,
        };
        let centre = ParameterSet::default_guess();
        let pts = grid.start_points(&centre).unwrap();

        assert_eq!(pts.len(), 82);
        assert_eq!(grid.count(), pts.len());
        assert_eq!(pts[0], centre);
        assert_eq!(pts[1], ParameterSet::new(5.0, 40.0, -12.0, -60.0));
        assert_eq!(pts[2], ParameterSet::new(5.0, 40.0, -12.0, -50.0));
        assert_eq!(pts[81], ParameterSet::new(7.0, 50.0, -8.0, -40.0));
    }

    #[test]
    fn invalid_grids_are_rejected() {
        let zero = StartGrid {
            steps: 0,
            ..StartGrid::single()
        };
        let err = zero.start_points(&ParameterSet::default_guess()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);

        let negative = StartGrid {
            spread: ParameterSet::new(-1.0, 0.0, 0.0, 0.0),
            steps: 2,
        };
        assert!(negative.start_points(&ParameterSet::default_guess()).is_err());
    }

    #[test]
    fn oversized_grids_are_rejected_without_overflow() {
        let largest = StartGrid {
            steps: 17,
            ..StartGrid::single()
        };
        assert_eq!(largest.count(), 83_522);
        assert!(largest.validate().is_ok());

        for steps in [18, 300, 65_536, usize::MAX] {
            let grid = StartGrid {
                steps,
                ..StartGrid::single()
            };
            assert!(grid.count() > MAX_STARTS);
            let err = grid.start_points(&ParameterSet::default_guess()).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidInput, "steps={steps}");
        }
        assert_eq!(StartGrid { steps: 65_536, ..StartGrid::single() }.count(), usize::MAX);
    }
}
