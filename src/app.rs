//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - loads `.env` and sets up logging
//! - parses CLI arguments
//! - runs the fit / simulation / prediction
//! - prints reports/plots
//! - writes optional exports

use clap::Parser;
use log::{LevelFilter, info};
use simplelog::{ColorChoice, ConfigBuilder, TermLogger, TerminalMode};

use crate::cli::{Command, FitArgs, PlotArgs, PredictArgs, SimulateArgs};
use crate::domain::{FitConfig, ParameterSet};
use crate::error::AppError;

pub mod pipeline;

/// Environment variable that overrides the `-v` log level.
pub const LOG_ENV_VAR: &str = "KFIT_LOG";

/// Entry point for the `kfit` binary.
pub fn run() -> Result<(), AppError> {
    // A missing .env is the normal case.
    let _ = dotenvy::dotenv();

    // We want `kfit` and `kfit --ea 50` to behave like `kfit fit ...`.
    //
    // Clap requires a subcommand name, so we do a small, explicit rewrite of the
    // argv list before parsing.
    let argv = rewrite_args(std::env::args().collect());
    let cli = crate::cli::Cli::parse_from(argv);

    let level = resolve_log_level(cli.verbose, std::env::var(LOG_ENV_VAR).ok().as_deref())?;
    init_logging(level);

    match cli.command {
        Command::Fit(args) => handle_fit(args),
        Command::Simulate(args) => handle_simulate(args),
        Command::Predict(args) => handle_predict(args),
        Command::Plot(args) => handle_plot(args),
    }
}

fn handle_fit(args: FitArgs) -> Result<(), AppError> {
    let config = fit_config_from_args(&args);
    let run = pipeline::run_fit(&config)?;

    println!(
        "{}",
        crate::report::format_run_summary(&run.source, &run.stats, &run.fit, run.multistart.as_ref())
    );
    println!("{}", crate::report::format_parameter_table(&run.fit));
    println!(
        "{}",
        crate::report::format_derived_table(&run.fit.params, &run.experiments)
    );
    print!("{}", crate::report::format_residual_table(&run.residuals));

    if config.plot {
        let plot = crate::plot::render_fit_plots(
            &run.fit.params,
            &run.experiments,
            config.plot_width,
            config.plot_height,
        );
        print!("{plot}");
    }

    // Optional exports.
    if let Some(path) = &config.export_residuals {
        crate::io::write_residuals_csv(path, &run.residuals)?;
        info!("wrote residuals to {}", path.display());
    }
    if let Some(path) = &config.export_result {
        crate::io::write_result_json(path, &run.fit, &run.experiments)?;
        info!("wrote result to {}", path.display());
    }

    Ok(())
}

fn handle_simulate(args: SimulateArgs) -> Result<(), AppError> {
    let config = pipeline::SimulateConfig {
        params: args.params.to_params(),
        temperatures: args.temperatures.clone(),
        ca0: args.ca0,
        t_end: args.t_end,
        points: args.points,
        noise_sd: args.noise,
        seed: args.seed,
    };
    let experiments = pipeline::run_simulate(&config)?;
    crate::io::write_dataset_json(&args.out, &experiments)?;

    println!(
        "Wrote {} experiments ({} points each) to {}",
        experiments.len(),
        args.points,
        args.out.display()
    );
    Ok(())
}

fn handle_predict(args: PredictArgs) -> Result<(), AppError> {
    let params = args.params.to_params();
    let (rates, profile) = pipeline::run_predict(&params, args.temperature, args.ca0, &args.times)?;
    print!("{}", crate::report::format_profile_table(&rates, args.ca0, &profile));
    Ok(())
}

fn handle_plot(args: PlotArgs) -> Result<(), AppError> {
    let result = crate::io::read_result_json(&args.result)?;
    info!(
        "loaded result written by {} at {}",
        result.tool, result.created_at
    );
    print!("{}", crate::report::format_parameter_table(&result.fit));
    println!();
    print!(
        "{}",
        crate::plot::render_result_file_plots(&result, args.width, args.height)
    );
    Ok(())
}

pub fn fit_config_from_args(args: &FitArgs) -> FitConfig {
    FitConfig {
        data_path: args.data.clone(),
        initial_guess: args.guess.to_params(),
        starts: args.starts,
        start_spread: ParameterSet::new(args.spread_log_a, args.spread_ea, args.spread_dh, args.spread_ds),
        patience: args.patience,
        allow_unconverged: args.allow_unconverged,
        plot: !args.no_plot,
        plot_width: args.width,
        plot_height: args.height,
        export_residuals: args.export.clone(),
        export_result: args.export_result.clone(),
    }
}

/// `-v` count to level, unless the environment overrides it.
fn resolve_log_level(verbose: u8, env: Option<&str>) -> Result<LevelFilter, AppError> {
    if let Some(raw) = env.map(str::trim).filter(|s| !s.is_empty()) {
        return raw.parse::<LevelFilter>().map_err(|_| {
            AppError::invalid_input(format!(
                "{LOG_ENV_VAR}={raw} is not a log level (off, error, warn, info, debug, trace)."
            ))
        });
    }
    Ok(match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    })
}

fn init_logging(level: LevelFilter) {
    let config = ConfigBuilder::new()
        .set_time_level(LevelFilter::Off)
        .set_target_level(LevelFilter::Off)
        .build();
    // Fails only if a logger is already installed.
    let _ = TermLogger::init(level, config, TerminalMode::Stderr, ColorChoice::Auto);
}

/// Rewrite argv so `kfit` defaults to `kfit fit`.
///
/// Rules:
/// - `kfit`                        -> `kfit fit`
/// - `kfit --ea 50 ...`            -> `kfit fit --ea 50 ...`
/// - `kfit --help/--version/-h`    -> unchanged (show top-level help/version)
fn rewrite_args(mut argv: Vec<String>) -> Vec<String> {
    let Some(arg1) = argv.get(1).cloned() else {
        argv.push("fit".to_string());
        return argv;
    };

    let is_top_level_help_or_version = matches!(
        arg1.as_str(),
        "-h" | "--help" | "-V" | "--version" | "help"
    );
    if is_top_level_help_or_version {
        return argv;
    }

    let is_subcommand = matches!(arg1.as_str(), "fit" | "simulate" | "predict" | "plot");
    if is_subcommand {
        return argv;
    }

    // If the first token is a flag, treat it as "fit flags".
    if arg1.starts_with('-') {
        argv.insert(1, "fit".to_string());
        return argv;
    }

    // Otherwise, leave as-is.
    argv
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(args: &[&str]) -> Vec<String> {
        args.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn bare_invocation_defaults_to_fit() {
        assert_eq!(rewrite_args(argv(&["kfit"])), argv(&["kfit", "fit"]));
        assert_eq!(
            rewrite_args(argv(&["kfit", "--ea", "50"])),
            argv(&["kfit", "fit", "--ea", "50"])
        );
        assert_eq!(rewrite_args(argv(&["kfit", "-v"])), argv(&["kfit", "fit", "-v"]));
    }

    #[test]
    fn subcommands_and_help_are_untouched() {
        for args in [
            &["kfit", "predict", "-t", "300"][..],
            &["kfit", "--help"][..],
            &["kfit", "-V"][..],
        ] {
            assert_eq!(rewrite_args(argv(args)), argv(args));
        }
    }

    #[test]
    fn log_level_from_verbosity_and_environment() {
        assert_eq!(resolve_log_level(0, None).unwrap(), LevelFilter::Warn);
        assert_eq!(resolve_log_level(1, None).unwrap(), LevelFilter::Info);
        assert_eq!(resolve_log_level(2, None).unwrap(), LevelFilter::Debug);
        assert_eq!(resolve_log_level(5, None).unwrap(), LevelFilter::Trace);
        assert_eq!(resolve_log_level(0, Some("debug")).unwrap(), LevelFilter::Debug);
        assert_eq!(resolve_log_level(3, Some("off")).unwrap(), LevelFilter::Off);
        assert_eq!(resolve_log_level(1, Some("  ")).unwrap(), LevelFilter::Info);
        assert!(resolve_log_level(0, Some("loud")).is_err());
    }

    #[test]
    fn fit_args_map_onto_config() {
        let cli = crate::cli::Cli::parse_from(argv(&[
            "kfit",
            "fit",
            "--no-plot",
            "--starts",
            "2",
            "--spread-ea",
            "4",
            "--export",
            "out.csv",
        ]));
        let Command::Fit(args) = cli.command else {
            panic!("expected fit");
        };
        let config = fit_config_from_args(&args);
        assert!(!config.plot);
        assert_eq!(config.starts, 2);
        assert_eq!(config.start_spread.ea, 4.0);
        assert_eq!(config.initial_guess, ParameterSet::default_guess());
        assert_eq!(config.export_residuals.as_deref(), Some(std::path::Path::new("out.csv")));
    }
}
