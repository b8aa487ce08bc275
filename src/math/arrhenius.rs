//! Overflow-safe Arrhenius and van 't Hoff terms.
//!
//! The rate and equilibrium constants are:
//!
//! - `Kf = 10^log10_a * exp(-Ea / (R T))`
//! - `Kc = exp((T dS - dH) / (R T))`
//!
//! with `Ea` and `dH` supplied in kJ/mol and `dS` in J/mol/K.
//!
//! Numerical notes:
//! - Everything is computed in log space first. Exponents are clamped to
//!   `±MAX_EXPONENT` before `exp`, so any finite parameter vector maps to
//!   finite constants (the solver does explore absurd regions).
//! - Callers that need derivatives must know whether the clamp was active;
//!   `ClampedExp` carries that flag.

/// Gas constant, J/(mol K).
pub const GAS_CONSTANT: f64 = 8.314;

/// kJ -> J.
pub const KJ_TO_J: f64 = 1000.0;

/// Largest exponent passed to `exp` (`e^700 ≈ 1e304`).
pub const MAX_EXPONENT: f64 = 700.0;

/// `exp(x)` with `x` clamped to `[-MAX_EXPONENT, MAX_EXPONENT]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClampedExp {
    pub value: f64,
    /// The clamped exponent actually used.
    pub exponent: f64,
    /// True when `x` was outside the clamp window; the value is then flat in `x`.
    pub saturated: bool,
}

impl ClampedExp {
    pub fn of(x: f64) -> Self {
        let exponent = x.clamp(-MAX_EXPONENT, MAX_EXPONENT);
        Self {
            value: exponent.exp(),
            exponent,
            saturated: exponent != x,
        }
    }
}

/// `ln Kf` (Kf in 1/s).
pub fn ln_forward_rate(log10_a: f64, ea_kj: f64, temperature: f64) -> f64 {
    log10_a * std::f64::consts::LN_10 - ea_kj * KJ_TO_J / (GAS_CONSTANT * temperature)
}

/// `ln Kc`, from `dG = dH - T dS = -R T ln Kc`.
pub fn ln_equilibrium_constant(dh_kj: f64, ds: f64, temperature: f64) -> f64 {
    (temperature * ds - dh_kj * KJ_TO_J) / (GAS_CONSTANT * temperature)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp_keeps_values_finite() {
        let hi = ClampedExp::of(1e6);
        assert!(hi.value.is_finite());
        assert!(hi.saturated);
        assert_eq!(hi.exponent, MAX_EXPONENT);

        let lo = ClampedExp::of(-1e6);
        assert!(lo.value > 0.0);
        assert!(lo.saturated);

        let mid = ClampedExp::of(1.0);
        assert!(!mid.saturated);
        assert!((mid.value - std::f64::consts::E).abs() < 1e-15);
    }

    #[test]
    fn forward_rate_uses_joules() {
        // 10^6 * exp(-45000 / (8.314 * 298.15)) ≈ 0.01306 1/s
        let kf = ln_forward_rate(6.0, 45.0, 298.15).exp();
        assert!((kf - 0.013_06).abs() < 1e-5, "kf = {kf}");
    }

    #[test]
    fn equilibrium_constant_sign_convention() {
        // Exothermic with no entropy change favours B: Kc > 1.
        assert!(ln_equilibrium_constant(-10.0, 0.0, 300.0) > 0.0);
        // dG = 0 when dH = T dS.
        let ln_kc = ln_equilibrium_constant(15.0, 50.0, 300.0);
        assert!(ln_kc.abs() < 1e-12);
    }
}
