//! Least-squares objective over all experiments.
//!
//! Residuals are `predicted - observed` in raw concentration units, flattened
//! in experiment-then-time order. Fitting every temperature jointly is what
//! separates the kinetic pair (log10 A, Ea) from the thermodynamic pair
//! (dH, dS): a single isotherm only pins down `Kf + Kr` and `Kc` at that T.

use levenberg_marquardt::LeastSquaresProblem;
use nalgebra::storage::Owned;
use nalgebra::{DMatrix, DVector, Dyn, OMatrix, U4, Vector4};

use crate::domain::{Experiment, ParameterSet};
use crate::error::AppError;
use crate::models::{RateConstants, concentration_a, sensitivities};

/// Validate every experiment, prefixing errors with the experiment's position.
pub fn validate_experiments(experiments: &[Experiment]) -> Result<(), AppError> {
    if experiments.is_empty() {
        return Err(AppError::invalid_data("No experiments to fit."));
    }
    for (i, e) in experiments.iter().enumerate() {
        e.validate()
            .map_err(|err| AppError::invalid_data(format!("Experiment {}: {}", i + 1, err.message())))?;
    }
    Ok(())
}

/// Total number of observations across experiments.
pub fn observation_count(experiments: &[Experiment]) -> usize {
    experiments.iter().map(|e| e.len()).sum()
}

/// Flattened `predicted - observed` residuals.
pub fn residuals(params: &ParameterSet, experiments: &[Experiment]) -> Result<Vec<f64>, AppError> {
    validate_experiments(experiments)?;
    let r = residuals_unchecked(params, experiments);
    if r.iter().any(|v| !v.is_finite()) {
        return Err(AppError::numerical(format!(
            "Non-finite residual for parameters {params:?}."
        )));
    }
    Ok(r)
}

/// Sum of squared residuals.
pub fn sum_of_squares(params: &ParameterSet, experiments: &[Experiment]) -> Result<f64, AppError> {
    Ok(residuals(params, experiments)?.iter().map(|r| r * r).sum())
}

/// Analytic Jacobian of the residual vector (`n x 4`), same row order as `residuals`.
pub fn jacobian(params: &ParameterSet, experiments: &[Experiment]) -> Result<DMatrix<f64>, AppError> {
    validate_experiments(experiments)?;
    let j = jacobian_unchecked(params, experiments);
    Ok(DMatrix::from_iterator(j.nrows(), j.ncols(), j.iter().copied()))
}

fn residuals_unchecked(params: &ParameterSet, experiments: &[Experiment]) -> Vec<f64> {
    let mut out = Vec::with_capacity(observation_count(experiments));
    for e in experiments {
        let rates = RateConstants::at(params, e.temperature);
        for (&t, &obs) in e.times.iter().zip(e.ca.iter()) {
            out.push(concentration_a(&rates, e.ca0, t) - obs);
        }
    }
    out
}

fn jacobian_unchecked(params: &ParameterSet, experiments: &[Experiment]) -> OMatrix<f64, Dyn, U4> {
    let n = observation_count(experiments);
    let mut jac = OMatrix::<f64, Dyn, U4>::zeros(n);
    let mut row = 0usize;
    for e in experiments {
        let rates = RateConstants::at(params, e.temperature);
        for &t in &e.times {
            let s = sensitivities(&rates, e.ca0, t);
            for (col, &v) in s.iter().enumerate() {
                jac[(row, col)] = v;
            }
            row += 1;
        }
    }
    jac
}

/// Adapter exposing the objective to the Levenberg–Marquardt solver.
///
/// Construct through [`KineticsProblem::new`], which validates the
/// experiments once; the solver then calls the unchecked paths.
#[derive(Debug, Clone)]
pub struct KineticsProblem<'a> {
    experiments: &'a [Experiment],
    params: ParameterSet,
}

impl<'a> KineticsProblem<'a> {
    pub fn new(experiments: &'a [Experiment], initial: ParameterSet) -> Result<Self, AppError> {
        validate_experiments(experiments)?;
        if !initial.is_finite() {
            return Err(AppError::invalid_input(format!(
                "Initial guess must be finite, got {initial:?}."
            )));
        }
        Ok(Self {
            experiments,
            params: initial,
        })
    }

    pub fn current(&self) -> ParameterSet {
        self.params
    }

    pub fn experiments(&self) -> &'a [Experiment] {
        self.experiments
    }
}

impl LeastSquaresProblem<f64, Dyn, U4> for KineticsProblem<'_> {
    type ResidualStorage = Owned<f64, Dyn>;
    type JacobianStorage = Owned<f64, Dyn, U4>;
    type ParameterStorage = Owned<f64, U4>;

    fn set_params(&mut self, x: &Vector4<f64>) {
        self.params = ParameterSet::from_vector(x);
    }

    fn params(&self) -> Vector4<f64> {
        self.params.to_vector()
    }

    fn residuals(&self) -> Option<DVector<f64>> {
        let r = residuals_unchecked(&self.params, self.experiments);
        // Returning `None` makes the solver stop with a user-termination reason
        // instead of propagating NaN.
        r.iter().all(|v| v.is_finite()).then(|| DVector::from_vec(r))
    }

    fn jacobian(&self) -> Option<OMatrix<f64, Dyn, U4>> {
        Some(jacobian_unchecked(&self.params, self.experiments))
    }
}
