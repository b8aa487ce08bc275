//! Parameter estimation by Levenberg–Marquardt.
//!
//! Given:
//! - experiments (temperature, initial concentration, observed C_A(t))
//! - an initial guess for (log10 A, Ea, dH, dS)
//!
//! we minimize the sum of squared residuals from `fit::objective` with the
//! analytic Jacobian, then estimate the parameter covariance at the optimum.

use levenberg_marquardt::{LevenbergMarquardt, TerminationReason};
use log::{debug, info, warn};

use crate::domain::{Experiment, FitResult, FitStatus, PARAM_COUNT, ParameterSet};
use crate::error::AppError;
use crate::fit::objective::{KineticsProblem, jacobian, observation_count, residuals, sum_of_squares};
use crate::math::{DEFAULT_RCOND, estimate_covariance};

/// Solver and covariance options.
#[derive(Debug, Clone)]
pub struct FitOptions {
    /// Evaluation budget factor: the solver gives up after
    /// `patience * (PARAM_COUNT + 1)` residual evaluations.
    pub patience: usize,
    /// Relative reduction in SSE below which the fit is converged.
    pub ftol: f64,
    /// Relative step size below which the fit is converged.
    pub xtol: f64,
    /// Cosine between residuals and Jacobian columns below which the fit is converged.
    pub gtol: f64,
    /// Relative singular-value cutoff for the covariance estimate.
    pub rcond: f64,
    /// Return a `FitStatus::NotConverged` result instead of an error.
    pub allow_unconverged: bool,
}

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            patience: 100,
            ftol: f64::EPSILON * 30.0,
            xtol: f64::EPSILON * 30.0,
            gtol: 0.0,
            rcond: DEFAULT_RCOND,
            allow_unconverged: false,
        }
    }
}

impl FitOptions {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.patience == 0 {
            return Err(AppError::invalid_input("Solver patience must be >= 1."));
        }
        for (name, v) in [("ftol", self.ftol), ("xtol", self.xtol), ("gtol", self.gtol)] {
            if !(v.is_finite() && v >= 0.0) {
                return Err(AppError::invalid_input(format!(
                    "Solver {name} must be finite and >= 0, got {v}."
                )));
            }
        }
        if !(self.rcond.is_finite() && self.rcond > 0.0 && self.rcond < 1.0) {
            return Err(AppError::invalid_input(format!(
                "Covariance rcond must be in (0, 1), got {}.",
                self.rcond
            )));
        }
        Ok(())
    }
}

/// Fit with default options.
pub fn fit(initial_guess: &ParameterSet, experiments: &[Experiment]) -> Result<FitResult, AppError> {
    fit_with_options(initial_guess, experiments, &FitOptions::default())
}

/// Fit the four parameters to all experiments jointly.
pub fn fit_with_options(
    initial_guess: &ParameterSet,
    experiments: &[Experiment],
    opts: &FitOptions,
) -> Result<FitResult, AppError> {
    opts.validate()?;
    let problem = KineticsProblem::new(experiments, *initial_guess)?;

    let n_obs = observation_count(experiments);
    if n_obs < PARAM_COUNT {
        return Err(AppError::invalid_data(format!(
            "Underdetermined: {n_obs} observations < {PARAM_COUNT} parameters."
        )));
    }

    let initial_sse = sum_of_squares(initial_guess, experiments)?;
    debug!(
        "starting fit: {} experiments, {n_obs} points, guess={initial_guess:?}, SSE={initial_sse:.6e}",
        experiments.len()
    );

    let solver = LevenbergMarquardt::new()
        .with_patience(opts.patience)
        .with_ftol(opts.ftol)
        .with_xtol(opts.xtol)
        .with_gtol(opts.gtol);
    let (problem, report) = solver.minimize(problem);

    let status = match report.termination {
        TerminationReason::ResidualsZero => FitStatus::ResidualsZero,
        TerminationReason::Orthogonal => FitStatus::Orthogonal,
        TerminationReason::Converged { ftol, xtol } => FitStatus::Converged { ftol, xtol },
        other => FitStatus::NotConverged {
            reason: format!("{other:?}"),
        },
    };

    let params = problem.current();
    if !params.is_finite() {
        return Err(AppError::numerical(format!(
            "Solver returned non-finite parameters {params:?} ({}).",
            status.label()
        )));
    }

    let r = residuals(&params, experiments)?;
    let sse: f64 = r.iter().map(|v| v * v).sum();

    if !status.is_converged() {
        warn!(
            "solver stopped without converging after {} evaluations: {} (SSE={sse:.6e})",
            report.number_of_evaluations,
            status.label()
        );
        if !opts.allow_unconverged {
            return Err(AppError::not_converged(format!(
                "Fit did not converge after {} evaluations ({}); last SSE={sse:.6e}.",
                report.number_of_evaluations,
                status.label()
            )));
        }
    }

    let j = jacobian(&params, experiments)?;
    let cov = estimate_covariance(&j, sse, opts.rcond);
    if cov.rank < PARAM_COUNT {
        warn!(
            "parameter covariance is rank-deficient (rank {} of {PARAM_COUNT}); some standard errors are undefined",
            cov.rank
        );
    }

    let std_errors = ParameterSet::new(
        cov.std_errors[0],
        cov.std_errors[1],
        cov.std_errors[2],
        cov.std_errors[3],
    );
    let covariance = (0..PARAM_COUNT)
        .map(|i| (0..PARAM_COUNT).map(|k| cov.covariance[(i, k)]).collect())
        .collect();

    info!(
        "fit {} after {} evaluations: SSE {initial_sse:.6e} -> {sse:.6e}",
        status.label(),
        report.number_of_evaluations
    );

    Ok(FitResult {
        params,
        std_errors,
        covariance,
        rank: cov.rank,
        sse,
        initial_sse,
        rmse: (sse / n_obs as f64).sqrt(),
        n_obs,
        dof: n_obs - PARAM_COUNT,
        evaluations: report.number_of_evaluations,
        status,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{SyntheticSpec, default_experiments, synthesize};
    use crate::error::ErrorKind;

    fn truth() -> ParameterSet {
        ParameterSet::new(5.5, 42.0, -12.0, -45.0)
    }

    fn noiseless() -> Vec<Experiment> {
        synthesize(&SyntheticSpec::noiseless(truth())).unwrap()
    }

    #[test]
    fn recovers_known_parameters_from_exact_data() {
        let guess = ParameterSet::new(5.8, 44.0, -11.0, -48.0);
        let fit = fit(&guess, &noiseless()).unwrap();

        assert!(fit.status.is_converged(), "{:?}", fit.status);
        for (got, want) in fit.params.to_array().iter().zip(truth().to_array()) {
            assert!(
                ((got - want) / want).abs() < 1e-4,
                "recovered {got}, expected {want}"
            );
        }
        assert!(fit.sse < 1e-12);
    }

    #[test]
    fn default_dataset_converges_with_finite_errors() {
        let experiments = default_experiments();
        let fit = fit(&ParameterSet::default_guess(), &experiments).unwrap();

        assert!(fit.status.is_converged());
        assert!(fit.params.is_finite());
        assert!(fit.std_errors.is_finite(), "{:?}", fit.std_errors);
        assert!(fit.is_identified());
        assert!(fit.sse < fit.initial_sse);
        assert_eq!(fit.n_obs, 30);
        assert_eq!(fit.dof, 26);

        // Loose physical sanity: the dataset was generated near (5.5, 42, -12, -45).
        assert!((fit.params.log10_a - 5.5).abs() < 1.0);
        assert!((fit.params.ea - 42.0).abs() < 5.0);
        assert!((fit.params.dh - (-12.0)).abs() < 2.0);
        assert!((fit.params.ds - (-45.0)).abs() < 6.0);
    }

    #[test]
    fn covariance_is_symmetric_with_matching_diagonal() {
        let fit = fit(&ParameterSet::default_guess(), &default_experiments()).unwrap();
        let se = fit.std_errors.to_array();
        for i in 0..PARAM_COUNT {
            assert!((fit.covariance[i][i].sqrt() - se[i]).abs() < 1e-12 * se[i].max(1.0));
            for k in 0..PARAM_COUNT {
                let a = fit.covariance[i][k];
                let b = fit.covariance[k][i];
                assert!((a - b).abs() <= 1e-9 * a.abs().max(1e-12));
            }
        }
    }

    #[test]
    fn constant_data_does_not_crash() {
        // Nothing happens in the reactor: every observation equals C_A0.
        let experiments: Vec<Experiment> = [298.15, 308.15, 323.15]
            .iter()
            .map(|&t_k| {
                let times: Vec<f64> = (1..=10).map(|i| i as f64 * 10.0).collect();
                Experiment::new(t_k, 10.0, times, vec![10.0; 10]).unwrap()
            })
            .collect();

        match fit(&ParameterSet::default_guess(), &experiments) {
            Ok(fit) => {
                assert!(fit.params.is_finite());
                assert!(fit.sse <= fit.initial_sse);
                // Either the reaction is switched off (k -> 0), equilibrium sits at
                // C_A0 (Kc -> 0), or the fit admits it cannot resolve the parameters.
                let frozen_or_unresolved = !fit.is_identified()
                    || !fit.std_errors.is_finite()
                    || [298.15, 308.15, 323.15].iter().all(|&t_k| {
                        let rates = crate::models::RateConstants::at(&fit.params, t_k);
                        rates.total() * 100.0 < 1e-2 || rates.kc() < 1e-2
                    });
                assert!(frozen_or_unresolved, "{fit:?}");
            }
            Err(err) => assert!(
                matches!(err.kind(), ErrorKind::NotConverged | ErrorKind::Numerical),
                "{err:?}"
            ),
        }
    }

    #[test]
    fn exhausted_budget_is_reported_as_not_converged() {
        let opts = FitOptions {
            patience: 1,
            ..FitOptions::default()
        };
        let guess = ParameterSet::new(3.0, 60.0, 5.0, 10.0);
        match fit_with_options(&guess, &default_experiments(), &opts) {
            Err(err) => assert_eq!(err.kind(), ErrorKind::NotConverged),
            Ok(fit) => panic!("expected non-convergence, got {:?}", fit.status),
        }

        let lenient = FitOptions {
            allow_unconverged: true,
            ..opts
        };
        let fit = fit_with_options(&guess, &default_experiments(), &lenient).unwrap();
        assert!(!fit.status.is_converged());
    }

    #[test]
    fn too_few_observations_is_an_input_error() {
        let e = Experiment::new(300.0, 10.0, vec![10.0, 20.0, 30.0], vec![9.0, 8.5, 8.2]).unwrap();
        let err = fit(&ParameterSet::default_guess(), &[e]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidData);
    }

    #[test]
    fn invalid_options_are_rejected() {
        let opts = FitOptions {
            patience: 0,
            ..FitOptions::default()
        };
        let err = fit_with_options(&ParameterSet::default_guess(), &default_experiments(), &opts)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }
}
