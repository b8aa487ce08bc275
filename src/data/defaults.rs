//! The built-in dataset: three isothermal batch runs of A ⇌ B.

use crate::domain::Experiment;

/// Temperatures of the built-in runs (K).
pub const DEFAULT_TEMPERATURES: [f64; 3] = [298.15, 308.15, 323.15];

/// Initial concentration of A in every built-in run (mol/L).
pub const DEFAULT_CA0: f64 = 10.0;

/// Sampling times shared by the built-in runs (s).
pub const DEFAULT_TIMES: [f64; 10] = [10.0, 20.0, 30.0, 40.0, 50.0, 60.0, 70.0, 80.0, 90.0, 100.0];

/// Observed C_A (mol/L), one row per entry of `DEFAULT_TEMPERATURES`.
const DEFAULT_CA: [[f64; 10]; 3] = [
    [8.839, 8.086, 7.523, 7.156, 6.884, 6.743, 6.681, 6.576, 6.547, 6.479],
    [8.318, 7.497, 7.035, 6.95, 6.847, 6.804, 6.696, 6.684, 6.714, 6.728],
    [7.661, 7.272, 7.235, 7.179, 7.216, 7.219, 7.177, 7.272, 7.225, 7.251],
];

/// The built-in experiments, in temperature order.
pub fn default_experiments() -> Vec<Experiment> {
    DEFAULT_TEMPERATURES
        .iter()
        .zip(DEFAULT_CA.iter())
        .map(|(&temperature, ca)| Experiment {
            temperature,
            ca0: DEFAULT_CA0,
            times: DEFAULT_TIMES.to_vec(),
            ca: ca.to_vec(),
        })
        .collect()
}
