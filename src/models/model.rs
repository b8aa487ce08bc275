//! Closed-form evaluation of the reversible first-order reaction A ⇌ B.
//!
//! With `C_B = C_A0 - C_A` the rate law is linear:
//!
//! ```text
//! dC_A/dt = -(Kf + Kr) C_A + Kr C_A0
//! ```
//!
//! so `C_A(t) = C_eq + (C_A0 - C_eq) exp(-k t)` with `k = Kf + Kr` and
//! `C_eq = Kr C_A0 / (Kf + Kr) = C_A0 / (1 + Kc)`.
//!
//! The fitter relies on two primitive operations:
//! - predict `C_A(t)` for a parameter vector (for residuals/plots)
//! - the analytic sensitivities `∂C_A/∂θ` (for the Jacobian)

use crate::domain::{PARAM_COUNT, ParameterSet};
use crate::math::{ClampedExp, GAS_CONSTANT, KJ_TO_J, ln_equilibrium_constant, ln_forward_rate};

/// Below this relaxation rate (1/s) the reaction is treated as frozen.
pub const MIN_TOTAL_RATE: f64 = 1e-300;

/// Rate and equilibrium constants at one temperature.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateConstants {
    pub temperature: f64,
    kf: ClampedExp,
    kr: ClampedExp,
    kc: ClampedExp,
}

impl RateConstants {
    /// Evaluate `Kf`, `Kr` and `Kc` at `temperature` (K, must be > 0).
    pub fn at(params: &ParameterSet, temperature: f64) -> Self {
        let ln_kf = ln_forward_rate(params.log10_a, params.ea, temperature);
        let ln_kc = ln_equilibrium_constant(params.dh, params.ds, temperature);
        Self {
            temperature,
            kf: ClampedExp::of(ln_kf),
            // Kr = Kf / Kc, taken from the unclamped logs so the ratio stays exact
            // whenever Kr itself is representable.
            kr: ClampedExp::of(ln_kf - ln_kc),
            kc: ClampedExp::of(ln_kc),
        }
    }

    /// Forward rate constant (1/s).
    pub fn kf(&self) -> f64 {
        self.kf.value
    }

    /// Reverse rate constant (1/s).
    pub fn kr(&self) -> f64 {
        self.kr.value
    }

    /// Equilibrium constant `Kf / Kr`.
    pub fn kc(&self) -> f64 {
        self.kc.value
    }

    /// Relaxation rate `Kf + Kr` (1/s).
    pub fn total(&self) -> f64 {
        self.kf.value + self.kr.value
    }

    pub fn is_frozen(&self) -> bool {
        !(self.total() > MIN_TOTAL_RATE)
    }

    /// Equilibrium concentration of A for a given initial concentration.
    pub fn equilibrium_ca(&self, ca0: f64) -> f64 {
        ca0 / (1.0 + self.kc.value)
    }

    /// Time for the distance to equilibrium to halve, `ln 2 / k`.
    pub fn half_life(&self) -> f64 {
        if self.is_frozen() {
            f64::INFINITY
        } else {
            std::f64::consts::LN_2 / self.total()
        }
    }
}

/// A predicted state of the reactor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConcentrationPoint {
    pub t: f64,
    pub ca: f64,
    pub cb: f64,
}

/// `C_A(t)` for precomputed rate constants.
pub fn concentration_a(rates: &RateConstants, ca0: f64, t: f64) -> f64 {
    if rates.is_frozen() {
        return ca0;
    }
    let ceq = rates.equilibrium_ca(ca0);
    // Fraction of the way to equilibrium, 1 - exp(-k t). Using expm1 keeps
    // C_A(0) == C_A0 exactly and avoids cancellation for small k t.
    let relaxed = -(-rates.total() * t).exp_m1();
    ca0 - (ca0 - ceq) * relaxed
}

/// Predict `C_A` at each of `times` for one experiment.
///
/// `temperature` must be > 0; the objective validates this before calling.
pub fn predict(params: &ParameterSet, temperature: f64, ca0: f64, times: &[f64]) -> Vec<f64> {
    let rates = RateConstants::at(params, temperature);
    times.iter().map(|&t| concentration_a(&rates, ca0, t)).collect()
}

/// Predict both species at each of `times`.
pub fn predict_profile(
    params: &ParameterSet,
    temperature: f64,
    ca0: f64,
    times: &[f64],
) -> Vec<ConcentrationPoint> {
    let rates = RateConstants::at(params, temperature);
    times
        .iter()
        .map(|&t| {
            let ca = concentration_a(&rates, ca0, t);
            ConcentrationPoint { t, ca, cb: ca0 - ca }
        })
        .collect()
}

/// Analytic `∂C_A(t)/∂θ` in `ParameterSet` order.
///
/// Chain rule through `k = Kf + Kr` and `C_eq = C_A0 / (1 + Kc)`:
///
/// ```text
/// ∂C_A/∂k    = -(C_A0 - C_eq) t exp(-k t)
/// ∂C_A/∂C_eq = 1 - exp(-k t)
/// ∂k         = Kf ∂ln Kf + Kr (∂ln Kf - ∂ln Kc)
/// ∂C_eq      = -C_A0 Kc / (1 + Kc)^2 ∂ln Kc
/// ```
///
/// A constant whose exponent hit the clamp is flat in θ and contributes zero.
pub fn sensitivities(rates: &RateConstants, ca0: f64, t: f64) -> [f64; PARAM_COUNT] {
    let temperature = rates.temperature;
    let inv_rt = 1.0 / (GAS_CONSTANT * temperature);

    // Partial derivatives of the logs with respect to (log10_a, ea, dh, ds).
    let d_ln_kf = [std::f64::consts::LN_10, -KJ_TO_J * inv_rt, 0.0, 0.0];
    let d_ln_kc = [0.0, 0.0, -KJ_TO_J * inv_rt, 1.0 / GAS_CONSTANT];

    let kf = rates.kf();
    let kr = rates.kr();
    let kc = rates.kc();
    let k = rates.total();

    let ceq = rates.equilibrium_ca(ca0);
    let decay = (-k * t).exp();
    let relaxed = -(-k * t).exp_m1();
    let dc_dk = -(ca0 - ceq) * t * decay;
    // Kc / (1 + Kc)^2 without overflowing the square.
    let kc_frac = kc / (1.0 + kc) / (1.0 + kc);
    let dc_dceq = relaxed;

    let mut out = [0.0; PARAM_COUNT];
    for (j, slot) in out.iter_mut().enumerate() {
        let g_kf = if rates.kf.saturated { 0.0 } else { d_ln_kf[j] };
        let g_kc = if rates.kc.saturated { 0.0 } else { d_ln_kc[j] };
        let g_kr = if rates.kr.saturated {
            0.0
        } else {
            d_ln_kf[j] - d_ln_kc[j]
        };

        let dk = product(kf, g_kf) + product(kr, g_kr);
        let dceq = -ca0 * product(kc_frac, g_kc);

        let v = product(dc_dk, dk) + product(dc_dceq, dceq);
        // Saturated extremes (k ~ 1e304 at tiny T) can still overflow one
        // factor; such directions carry no usable gradient.
        *slot = if v.is_finite() { v } else { 0.0 };
    }
    out
}

/// `a * b` with an exact zero whenever either factor is zero (`0 * inf = 0`).
fn product(a: f64, b: f64) -> f64 {
    if a == 0.0 || b == 0.0 { 0.0 } else { a * b }
}
