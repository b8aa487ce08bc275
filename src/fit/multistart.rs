//! Multi-start fitting.
//!
//! Each starting point from a [`StartGrid`] is fitted independently (in
//! parallel) and the best converged fit is kept. Selection does not depend on
//! thread scheduling: lowest SSE wins and ties go to the earliest start.

use log::{debug, info};
use rayon::prelude::*;

use crate::domain::{Experiment, FitResult, ParameterSet};
use crate::error::AppError;
use crate::fit::estimator::{FitOptions, fit_with_options};
use crate::fit::objective::validate_experiments;
use crate::fit::starts::StartGrid;

/// Best fit over all starting points, plus how the other starts fared.
#[derive(Debug, Clone)]
pub struct MultiStartFit {
    pub best: FitResult,
    /// Index of the winning start in `StartGrid::start_points` order.
    pub best_index: usize,
    pub n_starts: usize,
    pub n_converged: usize,
}

/// Fit from every start in `grid` and keep the best.
///
/// Returns the first start's error if no start produced a usable fit.
pub fn fit_multistart(
    initial_guess: &ParameterSet,
    experiments: &[Experiment],
    grid: &StartGrid,
    opts: &FitOptions,
) -> Result<MultiStartFit, AppError> {
    // Fail fast on bad input rather than once per start.
    opts.validate()?;
    validate_experiments(experiments)?;
    let starts = grid.start_points(initial_guess)?;
    info!("multi-start: {} starting points", starts.len());

    let outcomes: Vec<(usize, Result<FitResult, AppError>)> = starts
        .par_iter()
        .enumerate()
        .map(|(idx, start)| (idx, fit_with_options(start, experiments, opts)))
        .collect();

    let mut best: Option<(usize, &FitResult)> = None;
    let mut n_converged = 0usize;
    for (idx, outcome) in &outcomes {
        match outcome {
            Ok(fit) => {
                if fit.status.is_converged() {
                    n_converged += 1;
                }
                if better(fit, *idx, best) {
                    best = Some((*idx, fit));
                }
            }
            Err(err) => debug!("start {idx} failed: {err}"),
        }
    }

    let Some((best_index, best)) = best else {
        let first = outcomes.into_iter().find_map(|(_, r)| r.err());
        return Err(first.unwrap_or_else(|| AppError::not_converged("No start produced a fit.")));
    };

    info!(
        "multi-start: best start #{best_index} with SSE {:.6e} ({n_converged}/{} converged)",
        best.sse,
        starts.len()
    );

    Ok(MultiStartFit {
        best: best.clone(),
        best_index,
        n_starts: starts.len(),
        n_converged,
    })
}

/// Converged fits beat unconverged ones; then lower SSE; then lower index.
fn better(candidate: &FitResult, idx: usize, current: Option<(usize, &FitResult)>) -> bool {
    let Some((best_idx, best)) = current else {
        return true;
    };
    let (c_conv, b_conv) = (candidate.status.is_converged(), best.status.is_converged());
    if c_conv != b_conv {
        return c_conv;
    }
    candidate.sse < best.sse || (candidate.sse == best.sse && idx < best_idx)
}
