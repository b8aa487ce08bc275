//! ASCII plotting for terminal output.
//!
//! This is intentionally "dumb" (fixed-size grid), optimized for:
//! - quick visual sanity checks in a terminal
//! - deterministic output (helpful for golden tests)
//!
//! One plot per experiment, C_A against time:
//! - observed points: `o`
//! - fitted curve: `-` line

use crate::domain::{Experiment, ParameterSet, ResultFile};
use crate::models::predict;

/// Render one plot per experiment for an in-memory fit.
pub fn render_fit_plots(params: &ParameterSet, experiments: &[Experiment], width: usize, height: usize) -> String {
    let mut out = String::new();
    for (i, e) in experiments.iter().enumerate() {
        out.push_str(&render_experiment_plot(params, e, i + 1, width, height));
        out.push('\n');
    }
    out
}

/// Render a single experiment against the model at `params`.
pub fn render_experiment_plot(
    params: &ParameterSet,
    experiment: &Experiment,
    index: usize,
    width: usize,
    height: usize,
) -> String {
    let (t_min, t_max) = time_range(&experiment.times);
    let curve = sample_curve(params, experiment, t_min, t_max, width.max(2));
    let observed = pairs(&experiment.times, &experiment.ca);
    let label = format!("exp {index} | T={:.2} K", experiment.temperature);
    render_plot(&label, &observed, Some(&curve), t_min, t_max, width, height)
}

/// Render plots from a saved result file, using its precomputed grids.
pub fn render_result_file_plots(result: &ResultFile, width: usize, height: usize) -> String {
    let mut out = String::new();
    for (i, c) in result.curves.iter().enumerate() {
        let (t_min, t_max) = time_range(&c.grid.times);
        let observed = pairs(&c.times, &c.ca_obs);
        let curve = pairs(&c.grid.times, &c.grid.ca);
        let label = format!("exp {} | T={:.2} K", i + 1, c.temperature);
        out.push_str(&render_plot(&label, &observed, Some(&curve), t_min, t_max, width, height));
        out.push('\n');
    }
    out
}

fn render_plot(
    label: &str,
    observed: &[(f64, f64)],
    curve_points: Option<&[(f64, f64)]>,
    t_min: f64,
    t_max: f64,
    width: usize,
    height: usize,
) -> String {
    let width = width.max(10);
    let height = height.max(5);

    // Determine y-range from observed points and curve points.
    let (y_min, y_max) = y_range(observed, curve_points).unwrap_or((0.0, 1.0));
    let (y_min, y_max) = pad_range(y_min, y_max, 0.05);

    let mut grid = vec![vec![' '; width]; height];

    // Draw curve first (so points can overlay).
    if let Some(curve) = curve_points {
        draw_curve(&mut grid, curve, t_min, t_max, y_min, y_max);
    }

    for &(t, c) in observed {
        if !(t.is_finite() && c.is_finite()) {
            continue;
        }
        let x = map_x(t, t_min, t_max, width);
        let y = map_y(c, y_min, y_max, height);
        grid[y][x] = 'o';
    }

    // Build final string. We include a small header with ranges.
    let mut out = String::new();
    out.push_str(&format!(
        "Plot: {label} | t=[{t_min:.1}, {t_max:.1}] s | C_A=[{y_min:.3}, {y_max:.3}] mol/L\n"
    ));

    for row in grid {
        out.push_str(&row.into_iter().collect::<String>());
        out.push('\n');
    }

    out
}

fn pairs(x: &[f64], y: &[f64]) -> Vec<(f64, f64)> {
    x.iter().copied().zip(y.iter().copied()).collect()
}

/// Plots start at t = 0 so the initial charge is always visible.
fn time_range(times: &[f64]) -> (f64, f64) {
    let t_max = times.iter().copied().filter(|t| t.is_finite()).fold(0.0, f64::max);
    if t_max > 0.0 { (0.0, t_max) } else { (0.0, 1.0) }
}

fn sample_curve(params: &ParameterSet, experiment: &Experiment, t_min: f64, t_max: f64, n: usize) -> Vec<(f64, f64)> {
    let n = n.max(2);
    let times: Vec<f64> = (0..n)
        .map(|i| t_min + (t_max - t_min) * i as f64 / (n as f64 - 1.0))
        .collect();
    let ca = predict(params, experiment.temperature, experiment.ca0, &times);
    pairs(&times, &ca)
}

fn y_range(observed: &[(f64, f64)], curve: Option<&[(f64, f64)]>) -> Option<(f64, f64)> {
    let mut min_y = f64::INFINITY;
    let mut max_y = f64::NEG_INFINITY;

    let curve = curve.unwrap_or(&[]);
    for &(_, y) in observed.iter().chain(curve.iter()) {
        if y.is_finite() {
            min_y = min_y.min(y);
            max_y = max_y.max(y);
        }
    }

    if min_y.is_finite() && max_y.is_finite() && max_y > min_y {
        Some((min_y, max_y))
    } else if min_y.is_finite() {
        // Flat data: centre it.
        Some((min_y - 0.5, max_y + 0.5))
    } else {
        None
    }
}

fn pad_range(min: f64, max: f64, frac: f64) -> (f64, f64) {
    let span = (max - min).abs();
    let pad = (span * frac).max(1e-12);
    (min - pad, max + pad)
}

fn map_x(t: f64, t_min: f64, t_max: f64, width: usize) -> usize {
    let width = width.max(2);
    let u = ((t - t_min) / (t_max - t_min)).clamp(0.0, 1.0);
    (u * (width as f64 - 1.0)).round() as usize
}

fn map_y(y: f64, y_min: f64, y_max: f64, height: usize) -> usize {
    let height = height.max(2);
    let u = ((y - y_min) / (y_max - y_min)).clamp(0.0, 1.0);
    // y=top is max -> row 0
    (height as f64 - 1.0 - (u * (height as f64 - 1.0))).round() as usize
}

fn draw_curve(grid: &mut [Vec<char>], curve: &[(f64, f64)], t_min: f64, t_max: f64, y_min: f64, y_max: f64) {
    if curve.len() < 2 {
        return;
    }
    let height = grid.len();
    let width = grid[0].len();

    let mut prev = None;
    for &(t, y) in curve {
        if !(t.is_finite() && y.is_finite()) {
            prev = None;
            continue;
        }
        let x = map_x(t, t_min, t_max, width);
        let yy = map_y(y, y_min, y_max, height);
        if let Some((x0, y0)) = prev {
            draw_line(grid, x0, y0, x, yy, '-');
        } else {
            grid[yy][x] = '-';
        }
        prev = Some((x, yy));
    }
}

/// Integer line drawing (Bresenham-ish).
fn draw_line(grid: &mut [Vec<char>], x0: usize, y0: usize, x1: usize, y1: usize, ch: char) {
    let mut x0 = x0 as isize;
    let mut y0 = y0 as isize;
    let x1 = x1 as isize;
    let y1 = y1 as isize;

    let dx = (x1 - x0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let dy = -(y1 - y0).abs();
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    loop {
        if y0 >= 0
            && (y0 as usize) < grid.len()
            && x0 >= 0
            && (x0 as usize) < grid[0].len()
            && grid[y0 as usize][x0 as usize] == ' '
        {
            grid[y0 as usize][x0 as usize] = ch;
        }

        if x0 == x1 && y0 == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x0 += sx;
        }
        if e2 <= dx {
            err += dx;
            y0 += sy;
        }
    }
}
