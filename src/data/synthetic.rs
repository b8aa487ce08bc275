//! Synthetic experiments from known parameters.
//!
//! The model is evaluated at the true parameters and each observation gets
//! independent `N(0, noise_sd)` noise from a seeded generator, so the same
//! spec always produces the same dataset.

use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::Normal;

use crate::data::defaults::{DEFAULT_CA0, DEFAULT_TEMPERATURES, DEFAULT_TIMES};
use crate::domain::{Experiment, ParameterSet};
use crate::error::AppError;
use crate::models::predict;

/// Everything needed to generate a synthetic dataset.
#[derive(Debug, Clone)]
pub struct SyntheticSpec {
    pub params: ParameterSet,
    pub temperatures: Vec<f64>,
    pub ca0: f64,
    pub times: Vec<f64>,
    /// Standard deviation of the additive noise (mol/L); 0 gives exact model values.
    pub noise_sd: f64,
    pub seed: u64,
}

impl SyntheticSpec {
    /// Exact model values on the built-in temperatures and time grid.
    pub fn noiseless(params: ParameterSet) -> Self {
        Self {
            params,
            temperatures: DEFAULT_TEMPERATURES.to_vec(),
            ca0: DEFAULT_CA0,
            times: DEFAULT_TIMES.to_vec(),
            noise_sd: 0.0,
            seed: 0,
        }
    }

    pub fn with_noise(mut self, noise_sd: f64, seed: u64) -> Self {
        self.noise_sd = noise_sd;
        self.seed = seed;
        self
    }
}

/// Generate one experiment per temperature.
pub fn synthesize(spec: &SyntheticSpec) -> Result<Vec<Experiment>, AppError> {
    if !spec.params.is_finite() {
        return Err(AppError::invalid_input(format!(
            "Synthetic parameters must be finite, got {:?}.",
            spec.params
        )));
    }
    if spec.temperatures.is_empty() {
        return Err(AppError::invalid_input("At least one temperature is required."));
    }
    if !(spec.noise_sd.is_finite() && spec.noise_sd >= 0.0) {
        return Err(AppError::invalid_input(format!(
            "Noise standard deviation must be finite and >= 0, got {}.",
            spec.noise_sd
        )));
    }

    let mut rng = StdRng::seed_from_u64(spec.seed);
    let normal = Normal::new(0.0, spec.noise_sd)
        .map_err(|e| AppError::invalid_input(format!("Noise distribution error: {e}")))?;

    let mut out = Vec::with_capacity(spec.temperatures.len());
    for &temperature in &spec.temperatures {
        let mut ca = predict(&spec.params, temperature, spec.ca0, &spec.times);
        if spec.noise_sd > 0.0 {
            for c in ca.iter_mut() {
                *c += normal.sample(&mut rng);
            }
        }
        // Validates temperature, ca0 and the time grid.
        let experiment = Experiment::new(temperature, spec.ca0, spec.times.clone(), ca)
            .map_err(|e| AppError::invalid_input(format!("T={temperature} K: {}", e.message())))?;
        out.push(experiment);
    }
    Ok(out)
}
