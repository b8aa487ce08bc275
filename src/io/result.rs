//! Read/write result JSON files.
//!
//! A result file is the portable record of a fit:
//! - fitted parameters, standard errors, covariance and solver status
//! - the observed data per experiment
//! - a precomputed fitted C_A grid per experiment for quick plotting
//!
//! The schema is defined by `domain::ResultFile`.

use std::fs::File;
use std::path::Path;

use chrono::Utc;

use crate::domain::{CurveGrid, Experiment, ExperimentCurve, FitResult, ResultFile};
use crate::error::AppError;
use crate::io::TOOL_NAME;
use crate::models::predict;

/// Points in each fitted grid.
pub const GRID_POINTS: usize = 101;

/// Assemble a result file for a fit (timestamped now).
pub fn build_result_file(fit: &FitResult, experiments: &[Experiment]) -> ResultFile {
    let curves = experiments
        .iter()
        .map(|e| {
            let t_max = e.times.last().copied().unwrap_or(0.0);
            let times = grid_times(t_max, GRID_POINTS);
            let ca = predict(&fit.params, e.temperature, e.ca0, &times);
            ExperimentCurve {
                temperature: e.temperature,
                ca0: e.ca0,
                times: e.times.clone(),
                ca_obs: e.ca.clone(),
                grid: CurveGrid { times, ca },
            }
        })
        .collect();

    ResultFile {
        tool: TOOL_NAME.to_string(),
        created_at: Utc::now(),
        fit: fit.clone(),
        curves,
    }
}

/// Write a result JSON file.
pub fn write_result_json(path: &Path, fit: &FitResult, experiments: &[Experiment]) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::io(format!("Failed to create result JSON '{}': {e}", path.display())))?;
    let result = build_result_file(fit, experiments);
    serde_json::to_writer_pretty(file, &result)
        .map_err(|e| AppError::io(format!("Failed to write result JSON: {e}")))?;
    Ok(())
}

/// Read a result JSON file.
pub fn read_result_json(path: &Path) -> Result<ResultFile, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::io(format!("Failed to open result JSON '{}': {e}", path.display())))?;
    let result: ResultFile =
        serde_json::from_reader(file).map_err(|e| AppError::io(format!("Invalid result JSON: {e}")))?;
    Ok(result)
}

/// `n` evenly spaced times on `[0, t_max]`; falls back to `[0, 1]` for a degenerate range.
fn grid_times(t_max: f64, n: usize) -> Vec<f64> {
    let n = n.max(2);
    let t1 = if t_max.is_finite() && t_max > 0.0 { t_max } else { 1.0 };
    (0..n).map(|i| t1 * i as f64 / (n as f64 - 1.0)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::default_experiments;
    use crate::domain::{FitStatus, ParameterSet};

    fn sample_fit() -> FitResult {
        FitResult {
            params: ParameterSet::new(5.5, 42.0, -12.0, -45.0),
            std_errors: ParameterSet::new(0.2, f64::INFINITY, 0.4, 1.1),
            covariance: vec![
                vec![0.04, 0.1, 0.0, 0.0],
                vec![0.1, f64::INFINITY, 0.0, 0.0],
                vec![0.0, 0.0, 0.16, 0.3],
                vec![0.0, 0.0, 0.3, 1.21],
            ],
            rank: 3,
            sse: 0.033,
            initial_sse: 104.2,
            rmse: 0.033_f64.sqrt() / 30_f64.sqrt(),
            n_obs: 30,
            dof: 26,
            evaluations: 17,
            status: FitStatus::Converged {
                ftol: true,
                xtol: false,
            },
        }
    }

    #[test]
    fn grid_spans_zero_to_last_observation() {
        let result = build_result_file(&sample_fit(), &default_experiments());
        assert_eq!(result.tool, "kfit");
        assert_eq!(result.curves.len(), 3);
        let grid = &result.curves[0].grid;
        assert_eq!(grid.times.len(), GRID_POINTS);
        assert_eq!(grid.times[0], 0.0);
        assert!((grid.times[GRID_POINTS - 1] - 100.0).abs() < 1e-12);
        // C_A(0) = C_A0 exactly.
        assert_eq!(grid.ca[0], 10.0);
    }

    #[test]
    fn result_json_round_trip_keeps_infinite_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fit.json");
        write_result_json(&path, &sample_fit(), &default_experiments()).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("\"ea\": null"));

        let back = read_result_json(&path).unwrap();
        assert_eq!(back.fit.params, sample_fit().params);
        assert!(back.fit.std_errors.ea.is_infinite());
        assert!(back.fit.covariance[1][1].is_infinite());
        assert_eq!(back.fit.status, sample_fit().status);
        assert_eq!(back.curves[2].ca_obs, default_experiments()[2].ca);
    }

    #[test]
    fn degenerate_grid_range_falls_back() {
        let t = grid_times(0.0, 3);
        assert_eq!(t, vec![0.0, 0.5, 1.0]);
    }
}
