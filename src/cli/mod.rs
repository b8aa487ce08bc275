//! Command-line parsing for the kinetics fitter.
//!
//! The goal of this module is to keep **argument parsing** and **command dispatch**
//! separate from the modeling/math code.

use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand};

use crate::data::{DEFAULT_CA0, DEFAULT_TEMPERATURES};
use crate::domain::ParameterSet;

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(
    name = "kfit",
    version,
    about = "Fit Arrhenius/van 't Hoff parameters of a reversible A <=> B reaction"
)]
pub struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fit the four parameters to a dataset, print diagnostics, and optionally plot/export.
    Fit(FitArgs),
    /// Write a synthetic dataset JSON generated from known parameters.
    Simulate(SimulateArgs),
    /// Print predicted C_A / C_B at given times.
    Predict(PredictArgs),
    /// Plot a previously exported result JSON.
    Plot(PlotArgs),
}

/// `log10(A)`, `Ea`, `dH`, `dS` flags shared by several subcommands.
#[derive(Debug, Args, Clone, Copy)]
pub struct ParamArgs {
    /// log10 of the pre-exponential factor (A in 1/s).
    #[arg(long = "log-a", default_value_t = 6.0, allow_negative_numbers = true)]
    pub log_a: f64,

    /// Activation energy (kJ/mol).
    #[arg(long, default_value_t = 45.0, allow_negative_numbers = true)]
    pub ea: f64,

    /// Reaction enthalpy (kJ/mol).
    #[arg(long, default_value_t = -10.0, allow_negative_numbers = true)]
    pub dh: f64,

    /// Reaction entropy (J/mol/K).
    #[arg(long, default_value_t = -50.0, allow_negative_numbers = true)]
    pub ds: f64,
}

impl ParamArgs {
    pub fn to_params(self) -> ParameterSet {
        ParameterSet::new(self.log_a, self.ea, self.dh, self.ds)
    }
}

/// Options for fitting.
#[derive(Debug, Parser, Clone)]
pub struct FitArgs {
    /// Dataset file (.json or .csv). Defaults to the built-in dataset.
    #[arg(long, value_name = "PATH")]
    pub data: Option<PathBuf>,

    #[command(flatten)]
    pub guess: ParamArgs,

    /// Multi-start grid points per parameter. N > 1 runs N^4 + 1 fits (2 runs 17,
    /// 3 runs 82) and is capped at 17; 1 fits the guess alone.
    #[arg(long, value_name = "N", default_value_t = 1)]
    pub starts: usize,

    /// Multi-start half-width for log10(A).
    #[arg(long, default_value_t = 1.0)]
    pub spread_log_a: f64,

    /// Multi-start half-width for Ea (kJ/mol).
    #[arg(long, default_value_t = 5.0)]
    pub spread_ea: f64,

    /// Multi-start half-width for dH (kJ/mol).
    #[arg(long, default_value_t = 5.0)]
    pub spread_dh: f64,

    /// Multi-start half-width for dS (J/mol/K).
    #[arg(long, default_value_t = 10.0)]
    pub spread_ds: f64,

    /// Solver evaluation budget factor (max evaluations = patience * 5).
    #[arg(long, default_value_t = 100)]
    pub patience: usize,

    /// Report an unconverged fit instead of failing.
    #[arg(long)]
    pub allow_unconverged: bool,

    /// Disable the terminal plots.
    #[arg(long)]
    pub no_plot: bool,

    /// Plot width (columns).
    #[arg(long, default_value_t = 72)]
    pub width: usize,

    /// Plot height (rows).
    #[arg(long, default_value_t = 16)]
    pub height: usize,

    /// Export per-point residuals to CSV.
    #[arg(long, value_name = "CSV")]
    pub export: Option<PathBuf>,

    /// Export the fit (parameters + errors + fitted grids) to JSON.
    #[arg(long = "export-result", value_name = "JSON")]
    pub export_result: Option<PathBuf>,
}

/// Options for generating a synthetic dataset.
#[derive(Debug, Parser, Clone)]
pub struct SimulateArgs {
    /// Output dataset JSON.
    #[arg(long, short = 'o', value_name = "JSON")]
    pub out: PathBuf,

    #[command(flatten)]
    pub params: ParamArgs,

    /// Temperatures (K), comma-separated.
    #[arg(long, value_delimiter = ',', default_values_t = DEFAULT_TEMPERATURES.to_vec())]
    pub temperatures: Vec<f64>,

    /// Initial concentration of A (mol/L).
    #[arg(long, default_value_t = DEFAULT_CA0)]
    pub ca0: f64,

    /// Last observation time (s).
    #[arg(long, default_value_t = 100.0)]
    pub t_end: f64,

    /// Number of observations per experiment, evenly spaced on (0, t_end].
    #[arg(long, default_value_t = 10)]
    pub points: usize,

    /// Standard deviation of the additive Gaussian noise (mol/L).
    #[arg(long, default_value_t = 0.04)]
    pub noise: f64,

    /// Random seed for the noise.
    #[arg(long, default_value_t = 7)]
    pub seed: u64,
}

/// Options for evaluating the model.
#[derive(Debug, Parser, Clone)]
pub struct PredictArgs {
    #[command(flatten)]
    pub params: ParamArgs,

    /// Temperature (K).
    #[arg(long, short = 't')]
    pub temperature: f64,

    /// Initial concentration of A (mol/L).
    #[arg(long, default_value_t = DEFAULT_CA0)]
    pub ca0: f64,

    /// Times (s), comma-separated and strictly increasing.
    #[arg(long, value_delimiter = ',', required = true)]
    pub times: Vec<f64>,
}

/// Options for plotting a saved result.
#[derive(Debug, Parser)]
pub struct PlotArgs {
    /// Result JSON file produced by `kfit fit --export-result`.
    #[arg(long, value_name = "JSON")]
    pub result: PathBuf,

    /// Plot width (columns).
    #[arg(long, default_value_t = 72)]
    pub width: usize,

    /// Plot height (rows).
    #[arg(long, default_value_t = 16)]
    pub height: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn fit_defaults_match_the_default_guess() {
        let cli = Cli::parse_from(["kfit", "fit"]);
        let Command::Fit(args) = cli.command else {
            panic!("expected fit");
        };
        assert_eq!(args.guess.to_params(), ParameterSet::default_guess());
        assert_eq!(args.starts, 1);
        assert!(args.data.is_none());
        assert_eq!(cli.verbose, 0);
    }

    #[test]
    fn negative_values_and_verbosity_parse() {
        let cli = Cli::parse_from(["kfit", "-vv", "fit", "--dh", "-12.5", "--ds", "-40", "--starts", "3"]);
        assert_eq!(cli.verbose, 2);
        let Command::Fit(args) = cli.command else {
            panic!("expected fit");
        };
        assert_eq!(args.guess.dh, -12.5);
        assert_eq!(args.guess.ds, -40.0);
        assert_eq!(args.starts, 3);
    }

    #[test]
    fn starts_help_states_the_number_of_fits() {
        let mut cmd = Cli::command();
        let fit = cmd.find_subcommand_mut("fit").unwrap();
        let help = fit.render_long_help().to_string();
        assert!(help.contains("N^4 + 1 fits"), "{help}");
    }

    #[test]
    fn list_arguments_split_on_commas() {
        let cli = Cli::parse_from(["kfit", "predict", "-t", "300", "--times", "0,10,20"]);
        let Command::Predict(args) = cli.command else {
            panic!("expected predict");
        };
        assert_eq!(args.times, vec![0.0, 10.0, 20.0]);

        let cli = Cli::parse_from(["kfit", "simulate", "-o", "x.json", "--temperatures", "300,310"]);
        let Command::Simulate(args) = cli.command else {
            panic!("expected simulate");
        };
        assert_eq!(args.temperatures, vec![300.0, 310.0]);
        assert_eq!(args.points, 10);
    }
}
