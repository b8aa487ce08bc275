//! Formatted terminal output.
//!
//! We keep formatting code in one place so:
//! - the math/fitting code stays clean and testable
//! - output changes are localized

use crate::domain::{DatasetStats, Experiment, FitResult, PARAM_COUNT, ParameterSet};
use crate::fit::MultiStartFit;
use crate::models::{ConcentrationPoint, RateConstants};
use crate::report::{ResidualRow, rmse_by_experiment};

/// Format the run summary (dataset stats + solver diagnostics).
pub fn format_run_summary(
    source: &str,
    stats: &DatasetStats,
    fit: &FitResult,
    multistart: Option<&MultiStartFit>,
) -> String {
    let mut out = String::new();

    out.push_str("=== kfit - reversible A <=> B kinetics fit ===\n");
    out.push_str(&format!("Data: {source}\n"));
    out.push_str(&format!(
        "Experiments: {} | points={} | T=[{:.2}, {:.2}] K | t=[{}, {}] s | C_A=[{:.3}, {:.3}] mol/L\n",
        stats.n_experiments,
        stats.n_points,
        stats.temperature_min,
        stats.temperature_max,
        stats.time_min,
        stats.time_max,
        stats.ca_min,
        stats.ca_max,
    ));

    out.push_str("\nSolver:\n");
    out.push_str(&format!("- status     : {}\n", fit.status.label()));
    out.push_str(&format!("- evaluations: {}\n", fit.evaluations));
    if let Some(ms) = multistart {
        out.push_str(&format!(
            "- starts     : {} ({} converged, best #{})\n",
            ms.n_starts, ms.n_converged, ms.best_index
        ));
    }
    out.push_str(&format!(
        "- SSE        : {:.6e} -> {:.6e}\n",
        fit.initial_sse, fit.sse
    ));
    out.push_str(&format!(
        "- RMSE       : {:.6} mol/L (n={}, dof={})\n",
        fit.rmse, fit.n_obs, fit.dof
    ));
    if !fit.is_identified() {
        out.push_str(&format!(
            "- warning    : covariance rank {} of {PARAM_COUNT}; some parameters are not identified\n",
            fit.rank
        ));
    }
    out.push('\n');

    out
}

/// Parameter table: value, standard error and unit per parameter.
pub fn format_parameter_table(fit: &FitResult) -> String {
    let mut out = String::new();
    out.push_str("Parameters:\n");
    push_row(
        &mut out,
        format!("{:<10} {:>14} {:>14} {:>9} {:<12}", "name", "value", "std_err", "rel", "unit"),
    );
    push_row(
        &mut out,
        format!("{:-<10} {:-<14} {:-<14} {:-<9} {:-<12}", "", "", "", "", ""),
    );

    let values = fit.params.to_array();
    let errors = fit.std_errors.to_array();
    for i in 0..PARAM_COUNT {
        push_row(
            &mut out,
            format!(
                "{:<10} {:>14.6} {:>14} {:>9} {:<12}",
                ParameterSet::NAMES[i],
                values[i],
                fmt_std_err(errors[i]),
                fmt_relative(errors[i], values[i]),
                ParameterSet::UNITS[i],
            ),
        );
    }
    out
}

/// Derived rate constants at each experiment's temperature.
pub fn format_derived_table(params: &ParameterSet, experiments: &[Experiment]) -> String {
    let mut out = String::new();
    out.push_str("Derived constants:\n");
    push_row(
        &mut out,
        format!(
            "{:<4} {:>8} {:>11} {:>11} {:>11} {:>11} {:>10} {:>10}",
            "exp", "T [K]", "Kf [1/s]", "Kr [1/s]", "Kc", "k [1/s]", "C_A,eq", "t1/2 [s]"
        ),
    );
    push_row(
        &mut out,
        format!(
            "{:-<4} {:-<8} {:-<11} {:-<11} {:-<11} {:-<11} {:-<10} {:-<10}",
            "", "", "", "", "", "", "", ""
        ),
    );

    for (i, e) in experiments.iter().enumerate() {
        let rates = RateConstants::at(params, e.temperature);
        push_row(
            &mut out,
            format!(
                "{:<4} {:>8.2} {:>11.4e} {:>11.4e} {:>11.4e} {:>11.4e} {:>10.4} {:>10}",
                i + 1,
                e.temperature,
                rates.kf(),
                rates.kr(),
                rates.kc(),
                rates.total(),
                rates.equilibrium_ca(e.ca0),
                fmt_half_life(rates.half_life()),
            ),
        );
    }
    out
}

/// Residual table per experiment, with per-experiment RMSE in each heading.
pub fn format_residual_table(rows: &[ResidualRow]) -> String {
    let mut out = String::new();
    let rmse = rmse_by_experiment(rows);

    for (exp, exp_rmse) in rmse {
        let mut group = rows.iter().filter(|r| r.experiment == exp).peekable();
        let Some(first) = group.peek() else { continue };
        out.push_str(&format!(
            "Experiment {exp} (T={:.2} K) RMSE={exp_rmse:.6}\n",
            first.temperature
        ));
        push_row(
            &mut out,
            format!("{:>10} {:>12} {:>12} {:>12}", "t [s]", "C_A obs", "C_A fit", "residual"),
        );
        push_row(
            &mut out,
            format!("{:->10} {:->12} {:->12} {:->12}", "", "", "", ""),
        );
        for r in group {
            push_row(
                &mut out,
                format!(
                    "{:>10} {:>12.4} {:>12.4} {:>12.4}",
                    r.time, r.ca_obs, r.ca_fit, r.residual
                ),
            );
        }
        out.push('\n');
    }
    out
}

/// Predicted concentrations at one temperature, headed by the rate constants.
pub fn format_profile_table(rates: &RateConstants, ca0: f64, profile: &[ConcentrationPoint]) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "T={:.2} K | Kf={:.4e} 1/s | Kr={:.4e} 1/s | Kc={:.4e} | C_A,eq={:.4} mol/L | t1/2={}\n",
        rates.temperature,
        rates.kf(),
        rates.kr(),
        rates.kc(),
        rates.equilibrium_ca(ca0),
        fmt_half_life(rates.half_life()),
    ));
    push_row(&mut out, format!("{:>10} {:>12} {:>12}", "t [s]", "C_A", "C_B"));
    push_row(&mut out, format!("{:->10} {:->12} {:->12}", "", "", ""));
    for p in profile {
        push_row(&mut out, format!("{:>10} {:>12.6} {:>12.6}", p.t, p.ca, p.cb));
    }
    out
}

fn push_row(out: &mut String, row: String) {
    out.push_str(row.trim_end());
    out.push('\n');
}

fn fmt_std_err(v: f64) -> String {
    if v.is_finite() {
        format!("{v:.6}")
    } else {
        "unidentified".to_string()
    }
}

fn fmt_relative(err: f64, value: f64) -> String {
    if err.is_finite() && value != 0.0 {
        format!("{:.1}%", 100.0 * err / value.abs())
    } else {
        "-".to_string()
    }
}

fn fmt_half_life(v: f64) -> String {
    if v.is_finite() {
        format!("{v:.4}")
    } else {
        "never".to_string()
    }
}
