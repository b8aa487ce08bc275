//! Reporting utilities: residuals and formatted terminal output.

pub mod format;

pub use format::*;

use crate::domain::{Experiment, ParameterSet};
use crate::error::AppError;
use crate::models::{RateConstants, concentration_a};

/// One observation next to its fitted value.
#[derive(Debug, Clone, PartialEq)]
pub struct ResidualRow {
    /// 1-based experiment index.
    pub experiment: usize,
    pub temperature: f64,
    pub time: f64,
    pub ca_obs: f64,
    pub ca_fit: f64,
    /// `ca_fit - ca_obs`, the same sign as the fit objective.
    pub residual: f64,
    /// Fitted C_B, from the mass balance `C_A0 - C_A`.
    pub cb_fit: f64,
}

/// Fitted values and residuals for every observation, in experiment-then-time order.
pub fn compute_residual_rows(
    params: &ParameterSet,
    experiments: &[Experiment],
) -> Result<Vec<ResidualRow>, AppError> {
    let mut out = Vec::with_capacity(experiments.iter().map(|e| e.len()).sum());
    for (i, e) in experiments.iter().enumerate() {
        let rates = RateConstants::at(params, e.temperature);
        for (&t, &obs) in e.times.iter().zip(e.ca.iter()) {
            let ca_fit = concentration_a(&rates, e.ca0, t);
            if !ca_fit.is_finite() {
                return Err(AppError::numerical(
                    "Non-finite model prediction during residual computation.",
                ));
            }
            out.push(ResidualRow {
                experiment: i + 1,
                temperature: e.temperature,
                time: t,
                ca_obs: obs,
                ca_fit,
                residual: ca_fit - obs,
                cb_fit: e.ca0 - ca_fit,
            });
        }
    }
    Ok(out)
}

/// Root-mean-square residual per experiment (1-based index, RMSE).
pub fn rmse_by_experiment(rows: &[ResidualRow]) -> Vec<(usize, f64)> {
    let mut out: Vec<(usize, f64, usize)> = Vec::new();
    for r in rows {
        match out.last_mut() {
            Some((exp, ss, n)) if *exp == r.experiment => {
                *ss += r.residual * r.residual;
                *n += 1;
            }
            _ => out.push((r.experiment, r.residual * r.residual, 1)),
        }
    }
    out.into_iter()
        .map(|(exp, ss, n)| (exp, (ss / n as f64).sqrt()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{SyntheticSpec, default_experiments, synthesize};

    #[test]
    fn residual_rows_follow_experiment_then_time_order() {
        let params = ParameterSet::default_guess();
        let rows = compute_residual_rows(&params, &default_experiments()).unwrap();
        assert_eq!(rows.len(), 30);
        assert_eq!(rows[0].experiment, 1);
        assert_eq!(rows[10].experiment, 2);
        assert_eq!(rows[10].time, 10.0);
        for r in &rows {
            assert!((r.residual - (r.ca_fit - r.ca_obs)).abs() < 1e-15);
            assert!((r.ca_fit + r.cb_fit - 10.0).abs() < 1e-12);
        }
    }

    #[test]
    fn exact_data_has_zero_rmse() {
        let truth = ParameterSet::new(5.5, 42.0, -12.0, -45.0);
        let exps = synthesize(&SyntheticSpec::noiseless(truth)).unwrap();
        let rows = compute_residual_rows(&truth, &exps).unwrap();
        let rmse = rmse_by_experiment(&rows);
        assert_eq!(rmse.iter().map(|(e, _)| *e).collect::<Vec<_>>(), vec![1, 2, 3]);
        assert!(rmse.iter().all(|(_, v)| *v == 0.0));
    }

    #[test]
    fn rmse_groups_consecutive_rows() {
        let row = |experiment, residual| ResidualRow {
            experiment,
            temperature: 300.0,
            time: 1.0,
            ca_obs: 1.0,
            ca_fit: 1.0 + residual,
            residual,
            cb_fit: 0.0,
        };
        let rmse = rmse_by_experiment(&[row(1, 3.0), row(1, -4.0), row(2, 1.0)]);
        assert_eq!(rmse.len(), 2);
        assert!((rmse[0].1 - 12.5_f64.sqrt()).abs() < 1e-12);
        assert_eq!(rmse[1], (2, 1.0));
    }
}
