//! Shared pipeline logic behind the subcommands.
//!
//! Keeping this in one place avoids duplicating the core workflow:
//! dataset load -> fit (single or multi-start) -> residuals
//!
//! The command handlers can then focus on presentation and exports.

use log::info;

use crate::data::{SyntheticSpec, default_experiments, synthesize};
use crate::domain::{DatasetStats, Experiment, FitConfig, FitResult, ParameterSet};
use crate::error::AppError;
use crate::fit::{FitOptions, MultiStartFit, StartGrid, fit_multistart, fit_with_options};
use crate::io::load_dataset;
use crate::models::{ConcentrationPoint, RateConstants, predict_profile};
use crate::report::{ResidualRow, compute_residual_rows};

/// All computed outputs of a single `kfit fit` run.
#[derive(Debug, Clone)]
pub struct RunOutput {
    /// Where the experiments came from (path or "built-in").
    pub source: String,
    pub experiments: Vec<Experiment>,
    pub stats: DatasetStats,
    pub fit: FitResult,
    /// Present when more than one start was requested.
    pub multistart: Option<MultiStartFit>,
    pub residuals: Vec<ResidualRow>,
}

/// Load the configured dataset (or the built-in one).
pub fn load_experiments(config: &FitConfig) -> Result<(String, Vec<Experiment>), AppError> {
    match &config.data_path {
        Some(path) => {
            let experiments = load_dataset(path)?;
            Ok((path.display().to_string(), experiments))
        }
        None => Ok(("built-in".to_string(), default_experiments())),
    }
}

/// Execute the full fitting pipeline and return the computed outputs.
pub fn run_fit(config: &FitConfig) -> Result<RunOutput, AppError> {
    // 1) Load data.
    let (source, experiments) = load_experiments(config)?;
    info!(
        "loaded {} experiments ({} points) from {source}",
        experiments.len(),
        crate::fit::observation_count(&experiments)
    );

    run_fit_on(config, source, experiments)
}

/// Execute the fitting pipeline on experiments already in memory.
pub fn run_fit_on(config: &FitConfig, source: String, experiments: Vec<Experiment>) -> Result<RunOutput, AppError> {
    let stats = DatasetStats::from_experiments(&experiments);
    let opts = FitOptions {
        patience: config.patience,
        allow_unconverged: config.allow_unconverged,
        ..FitOptions::default()
    };

    // 2) Fit from one or many starting points.
    let (fit, multistart) = if config.starts > 1 {
        let grid = StartGrid {
            spread: config.start_spread,
            steps: config.starts,
        };
        let ms = fit_multistart(&config.initial_guess, &experiments, &grid, &opts)?;
        (ms.best.clone(), Some(ms))
    } else {
        (fit_with_options(&config.initial_guess, &experiments, &opts)?, None)
    };

    // 3) Residuals at the optimum.
    let residuals = compute_residual_rows(&fit.params, &experiments)?;

    Ok(RunOutput {
        source,
        experiments,
        stats,
        fit,
        multistart,
        residuals,
    })
}

/// Inputs for `kfit simulate`.
#[derive(Debug, Clone)]
pub struct SimulateConfig {
    pub params: ParameterSet,
    pub temperatures: Vec<f64>,
    pub ca0: f64,
    pub t_end: f64,
    pub points: usize,
    pub noise_sd: f64,
    pub seed: u64,
}

/// Generate a synthetic dataset on an evenly spaced grid over `(0, t_end]`.
pub fn run_simulate(config: &SimulateConfig) -> Result<Vec<Experiment>, AppError> {
    if config.points == 0 {
        return Err(AppError::invalid_input("Points per experiment must be >= 1."));
    }
    if !(config.t_end.is_finite() && config.t_end > 0.0) {
        return Err(AppError::invalid_input(format!(
            "End time must be finite and > 0 s, got {}.",
            config.t_end
        )));
    }
    let n = config.points;
    let times = (1..=n).map(|i| config.t_end * i as f64 / n as f64).collect();
    let spec = SyntheticSpec {
        params: config.params,
        temperatures: config.temperatures.clone(),
        ca0: config.ca0,
        times,
        noise_sd: config.noise_sd,
        seed: config.seed,
    };
    synthesize(&spec)
}

/// Evaluate the model at the requested times for `kfit predict`.
pub fn run_predict(
    params: &ParameterSet,
    temperature: f64,
    ca0: f64,
    times: &[f64],
) -> Result<(RateConstants, Vec<ConcentrationPoint>), AppError> {
    if !params.is_finite() {
        return Err(AppError::invalid_input(format!(
            "Parameters must be finite, got {params:?}."
        )));
    }
    // Reuse the experiment invariants for temperature, ca0 and the time grid.
    Experiment::new(temperature, ca0, times.to_vec(), vec![ca0; times.len()])
        .map_err(|e| AppError::invalid_input(e.message().to_string()))?;

    let rates = RateConstants::at(params, temperature);
    let profile = predict_profile(params, temperature, ca0, times);
    Ok((rates, profile))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::io::write_dataset_json;

    fn config() -> FitConfig {
        FitConfig {
            data_path: None,
            initial_guess: ParameterSet::default_guess(),
            starts: 1,
            start_spread: ParameterSet::new(0.5, 3.0, 2.0, 5.0),
            patience: 100,
            allow_unconverged: false,
            plot: false,
            plot_width: 72,
            plot_height: 16,
            export_residuals: None,
            export_result: None,
        }
    }

    #[test]
    fn default_run_fits_the_built_in_dataset() {
        let run = run_fit(&config()).unwrap();
        assert_eq!(run.source, "built-in");
        assert_eq!(run.stats.n_points, 30);
        assert_eq!(run.residuals.len(), 30);
        assert!(run.multistart.is_none());
        assert!(run.fit.status.is_converged());
    }

    #[test]
    fn multistart_run_reports_its_starts() {
        let cfg = FitConfig {
            starts: 2,
            ..config()
        };
        let run = run_fit(&cfg).unwrap();
        let ms = run.multistart.unwrap();
        assert_eq!(ms.n_starts, 17);
        assert_eq!(ms.best.sse, run.fit.sse);
    }

    #[test]
    fn simulated_dataset_round_trips_through_a_fit() {
        let truth = ParameterSet::new(5.5, 42.0, -12.0, -45.0);
        let sim = SimulateConfig {
            params: truth,
            temperatures: vec![298.15, 308.15, 323.15],
            ca0: 10.0,
            t_end: 100.0,
            points: 10,
            noise_sd: 0.0,
            seed: 1,
        };
        let experiments = run_simulate(&sim).unwrap();
        assert_eq!(experiments[0].times[0], 10.0);
        assert_eq!(experiments[0].times[9], 100.0);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sim.json");
        write_dataset_json(&path, &experiments).unwrap();

        let cfg = FitConfig {
            data_path: Some(path),
            initial_guess: ParameterSet::new(5.8, 44.0, -11.0, -48.0),
            ..config()
        };
        let run = run_fit(&cfg).unwrap();
        assert!((run.fit.params.ea - 42.0).abs() < 1e-3);
    }

    #[test]
    fn missing_dataset_is_an_io_error() {
        let cfg = FitConfig {
            data_path: Some("/nonexistent/kfit/data.json".into()),
            ..config()
        };
        assert_eq!(run_fit(&cfg).unwrap_err().kind(), ErrorKind::Io);
    }

    #[test]
    fn oversized_start_grid_is_an_input_error() {
        let cfg = FitConfig {
            starts: 300,
            ..config()
        };
        assert_eq!(run_fit(&cfg).unwrap_err().kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn predict_validates_its_inputs() {
        let p = ParameterSet::default_guess();
        let (rates, profile) = run_predict(&p, 300.0, 10.0, &[0.0, 10.0]).unwrap();
        assert_eq!(profile[0].ca, 10.0);
        assert!(rates.kf() > 0.0);

        let err = run_predict(&p, 300.0, 10.0, &[10.0, 5.0]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        assert!(run_predict(&p, -1.0, 10.0, &[1.0]).is_err());
    }

    #[test]
    fn simulate_rejects_empty_grids() {
        let sim = SimulateConfig {
            params: ParameterSet::default_guess(),
            temperatures: vec![300.0],
            ca0: 10.0,
            t_end: 100.0,
            points: 0,
            noise_sd: 0.0,
            seed: 1,
        };
        assert_eq!(run_simulate(&sim).unwrap_err().kind(), ErrorKind::InvalidInput);
    }
}
