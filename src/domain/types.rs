//! Shared domain types.
//!
//! These types are intentionally kept lightweight and serializable so they can be:
//!
//! - used in-memory during fitting
//! - exported to JSON/CSV
//! - reloaded later for plotting or comparisons

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use nalgebra::Vector4;
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Number of fitted parameters.
pub const PARAM_COUNT: usize = 4;

/// One batch-reactor run at a fixed temperature.
///
/// `ca[i]` is the observed concentration of A at `times[i]`. The initial
/// concentration of B is implicitly zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Experiment {
    /// Kelvin.
    pub temperature: f64,
    /// Initial concentration of A (mol/L).
    pub ca0: f64,
    /// Observation times (s), strictly increasing.
    pub times: Vec<f64>,
    /// Observed concentration of A (mol/L).
    pub ca: Vec<f64>,
}

impl Experiment {
    pub fn new(temperature: f64, ca0: f64, times: Vec<f64>, ca: Vec<f64>) -> Result<Self, AppError> {
        let experiment = Self {
            temperature,
            ca0,
            times,
            ca,
        };
        experiment.validate()?;
        Ok(experiment)
    }

    /// Check the invariants `new` enforces.
    ///
    /// Deserialized experiments bypass `new`, so every consumer that cares
    /// about well-formed input calls this (the objective does, once per call).
    pub fn validate(&self) -> Result<(), AppError> {
        if !(self.temperature.is_finite() && self.temperature > 0.0) {
            return Err(AppError::invalid_data(format!(
                "temperature must be finite and > 0 K, got {}",
                self.temperature
            )));
        }
        if !(self.ca0.is_finite() && self.ca0 >= 0.0) {
            return Err(AppError::invalid_data(format!(
                "initial concentration must be finite and >= 0, got {}",
                self.ca0
            )));
        }
        if self.times.len() != self.ca.len() {
            return Err(AppError::invalid_data(format!(
                "times ({}) and ca ({}) differ in length at T={} K",
                self.times.len(),
                self.ca.len(),
                self.temperature
            )));
        }
        if self.times.is_empty() {
            return Err(AppError::invalid_data(format!(
                "no observations at T={} K",
                self.temperature
            )));
        }
        let mut prev: Option<f64> = None;
        for (&t, &c) in self.times.iter().zip(self.ca.iter()) {
            if !(t.is_finite() && t >= 0.0) {
                return Err(AppError::invalid_data(format!(
                    "observation time must be finite and >= 0, got {t}"
                )));
            }
            if !c.is_finite() {
                return Err(AppError::invalid_data(format!(
                    "observed concentration at t={t} is not finite"
                )));
            }
            if let Some(p) = prev {
                if t <= p {
                    return Err(AppError::invalid_data(format!(
                        "observation times must be strictly increasing ({p} then {t})"
                    )));
                }
            }
            prev = Some(t);
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }
}

/// The four fitted quantities.
///
/// No physical constraints are imposed: the solver may wander through
/// implausible regions on its way to the optimum.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParameterSet {
    /// log10 of the pre-exponential factor (A in 1/s).
    #[serde(with = "non_finite_as_null")]
    pub log10_a: f64,
    /// Activation energy (kJ/mol).
    #[serde(with = "non_finite_as_null")]
    pub ea: f64,
    /// Reaction enthalpy (kJ/mol).
    #[serde(with = "non_finite_as_null")]
    pub dh: f64,
    /// Reaction entropy (J/mol/K).
    #[serde(with = "non_finite_as_null")]
    pub ds: f64,
}

impl ParameterSet {
    pub const NAMES: [&'static str; PARAM_COUNT] = ["log10(A)", "Ea", "dH", "dS"];
    pub const UNITS: [&'static str; PARAM_COUNT] = ["log10(1/s)", "kJ/mol", "kJ/mol", "J/mol/K"];

    pub fn new(log10_a: f64, ea: f64, dh: f64, ds: f64) -> Self {
        Self { log10_a, ea, dh, ds }
    }

    /// Starting point used when the caller supplies none.
    pub fn default_guess() -> Self {
        Self::new(6.0, 45.0, -10.0, -50.0)
    }

    pub fn to_array(&self) -> [f64; PARAM_COUNT] {
        [self.log10_a, self.ea, self.dh, self.ds]
    }

    pub fn from_array(v: [f64; PARAM_COUNT]) -> Self {
        Self::new(v[0], v[1], v[2], v[3])
    }

    pub fn to_vector(&self) -> Vector4<f64> {
        Vector4::new(self.log10_a, self.ea, self.dh, self.ds)
    }

    pub fn from_vector(v: &Vector4<f64>) -> Self {
        Self::new(v[0], v[1], v[2], v[3])
    }

    pub fn is_finite(&self) -> bool {
        self.to_array().iter().all(|v| v.is_finite())
    }
}

impl Default for ParameterSet {
    fn default() -> Self {
        Self::default_guess()
    }
}

/// How the solver stopped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FitStatus {
    /// Relative reduction in SSE (`ftol`) and/or step size (`xtol`) fell below tolerance.
    Converged { ftol: bool, xtol: bool },
    /// Residuals vanished (exact data).
    ResidualsZero,
    /// Residuals became orthogonal to the Jacobian columns (`gtol`).
    Orthogonal,
    /// Evaluation budget exhausted or numerical failure.
    NotConverged { reason: String },
}

impl FitStatus {
    pub fn is_converged(&self) -> bool {
        !matches!(self, FitStatus::NotConverged { .. })
    }

    pub fn label(&self) -> String {
        match self {
            FitStatus::Converged { ftol, xtol } => match (ftol, xtol) {
                (true, true) => "converged (ftol, xtol)".to_string(),
                (true, false) => "converged (ftol)".to_string(),
                (false, true) => "converged (xtol)".to_string(),
                (false, false) => "converged".to_string(),
            },
            FitStatus::ResidualsZero => "converged (zero residuals)".to_string(),
            FitStatus::Orthogonal => "converged (gtol)".to_string(),
            FitStatus::NotConverged { reason } => format!("not converged: {reason}"),
        }
    }
}

/// Outcome of a least-squares fit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FitResult {
    pub params: ParameterSet,
    /// One-standard-deviation errors. Infinite where the covariance is undefined.
    pub std_errors: ParameterSet,
    /// `sigma^2 (J^T J)^-1` at the optimum, row-major in `ParameterSet` order.
    #[serde(with = "matrix_non_finite_as_null")]
    pub covariance: Vec<Vec<f64>>,
    /// Numerical rank of `J^T J` (4 when every parameter is identified).
    pub rank: usize,
    pub sse: f64,
    pub initial_sse: f64,
    pub rmse: f64,
    pub n_obs: usize,
    pub dof: usize,
    pub evaluations: usize,
    pub status: FitStatus,
}

impl FitResult {
    pub fn is_identified(&self) -> bool {
        self.rank == PARAM_COUNT
    }
}

/// Summary stats about a dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetStats {
    pub n_experiments: usize,
    pub n_points: usize,
    pub temperature_min: f64,
    pub temperature_max: f64,
    pub time_min: f64,
    pub time_max: f64,
    pub ca_min: f64,
    pub ca_max: f64,
}

impl DatasetStats {
    pub fn from_experiments(experiments: &[Experiment]) -> Self {
        let mut stats = Self {
            n_experiments: experiments.len(),
            n_points: 0,
            temperature_min: f64::INFINITY,
            temperature_max: f64::NEG_INFINITY,
            time_min: f64::INFINITY,
            time_max: f64::NEG_INFINITY,
            ca_min: f64::INFINITY,
            ca_max: f64::NEG_INFINITY,
        };
        for e in experiments {
            stats.n_points += e.len();
            stats.temperature_min = stats.temperature_min.min(e.temperature);
            stats.temperature_max = stats.temperature_max.max(e.temperature);
            for (&t, &c) in e.times.iter().zip(e.ca.iter()) {
                stats.time_min = stats.time_min.min(t);
                stats.time_max = stats.time_max.max(t);
                stats.ca_min = stats.ca_min.min(c);
                stats.ca_max = stats.ca_max.max(c);
            }
        }
        stats
    }
}

/// A full run's configuration as understood by the pipeline.
///
/// This is derived from CLI flags (plus defaults).
#[derive(Debug, Clone)]
pub struct FitConfig {
    /// Dataset file (`.json` or `.csv`); `None` selects the built-in dataset.
    pub data_path: Option<PathBuf>,
    pub initial_guess: ParameterSet,

    /// Grid points per parameter for multi-start (1 = single start).
    pub starts: usize,
    /// Half-width of the multi-start grid per parameter.
    pub start_spread: ParameterSet,

    /// Solver evaluation budget factor (max evaluations = patience * (4 + 1)).
    pub patience: usize,
    /// Return unconverged fits instead of failing.
    pub allow_unconverged: bool,

    pub plot: bool,
    pub plot_width: usize,
    pub plot_height: usize,

    pub export_residuals: Option<PathBuf>,
    pub export_result: Option<PathBuf>,
}

/// A saved dataset file (JSON).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetFile {
    pub tool: String,
    pub experiments: Vec<Experiment>,
}

/// A saved fit (JSON): parameters plus everything needed to redraw the plots.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultFile {
    pub tool: String,
    pub created_at: DateTime<Utc>,
    pub fit: FitResult,
    pub curves: Vec<ExperimentCurve>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentCurve {
    pub temperature: f64,
    pub ca0: f64,
    pub times: Vec<f64>,
    pub ca_obs: Vec<f64>,
    pub grid: CurveGrid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurveGrid {
    pub times: Vec<f64>,
    pub ca: Vec<f64>,
}

/// JSON has no representation for infinities; write them as `null` and read
/// `null` back as `+inf` ("undefined").
mod non_finite_as_null {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_finite() {
            serializer.serialize_f64(*value)
        } else {
            serializer.serialize_none()
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::INFINITY))
    }
}

mod matrix_non_finite_as_null {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(value: &[Vec<f64>], serializer: S) -> Result<S::Ok, S::Error> {
        let rows: Vec<Vec<Option<f64>>> = value
            .iter()
            .map(|row| row.iter().map(|v| v.is_finite().then_some(*v)).collect())
            .collect();
        rows.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Vec<f64>>, D::Error> {
        let rows = Vec::<Vec<Option<f64>>>::deserialize(deserializer)?;
        Ok(rows
            .into_iter()
            .map(|row| row.into_iter().map(|v| v.unwrap_or(f64::INFINITY)).collect())
            .collect())
    }
}
