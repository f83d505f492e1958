//! Stable Sommerfeld enhancement functions.
//!
//! With `x = π √(Eb / ΔE)` and `ΔE = E − Eg > 0`:
//!
//! - `F(ΔE) = x / (1 − exp(−x))` is the Sommerfeld factor
//! - the 3D continuum absorption is `√(ΔE/Eb) · F(ΔE) = π / (1 − exp(−x))`
//!
//! Numerical notes:
//! - As `ΔE → 0⁺`, `x → ∞` and the enhancement `1/(1 − e^{−x}) → 1`, so the
//!   weighted continuum tends to `π` without dividing by `ΔE`.
//! - For small `x` (far above the gap), `1 − exp(−x)` suffers from
//!   cancellation; we use `expm1` and a series fallback.
//! - `ΔE` is floored at `DELTA_E_FLOOR` wherever it is divided by.

use std::f64::consts::PI;

/// Smallest energy distance from the gap used in ratios (eV).
pub const DELTA_E_FLOOR: f64 = 1e-12;

/// Threshold below which we switch to a small-x series approximation.
const SMALL_X: f64 = 1e-6;

/// Beyond this, `exp(−x)` is below f64 resolution relative to 1.
const LARGE_X: f64 = 40.0;

fn sommerfeld_x(delta_e: f64, binding_energy: f64) -> f64 {
    PI * (binding_energy.max(DELTA_E_FLOOR) / delta_e.max(DELTA_E_FLOOR)).sqrt()
}

/// Sommerfeld factor `F = x / (1 − e^{−x})` for `ΔE > 0`; `0` below the gap.
pub fn sommerfeld_factor(delta_e: f64, binding_energy: f64) -> f64 {
    if delta_e <= 0.0 {
        return 0.0;
    }
    let x = sommerfeld_x(delta_e, binding_energy);
    if x < SMALL_X {
        // x / (1 - e^{-x}) ≈ 1 + x/2 + x^2/12
        return 1.0 + x / 2.0 + x * x / 12.0;
    }
    if x > LARGE_X {
        return x;
    }
    x / -(-x).exp_m1()
}

/// Continuum absorption per unit scale: `√(ΔE/Eb) · F = π / (1 − e^{−x})`.
///
/// Returns `0` for `ΔE <= 0` and tends to `π` as `ΔE → 0⁺`.
pub fn continuum_weight(delta_e: f64, binding_energy: f64) -> f64 {
    if delta_e <= 0.0 {
        return 0.0;
    }
    let x = sommerfeld_x(delta_e, binding_energy);
    if x > LARGE_X {
        return PI;
    }
    if x < SMALL_X {
        // π / (1 - e^{-x}) ≈ π (1/x + 1/2 + x/12)
        return PI * (1.0 / x + 0.5 + x / 12.0);
    }
    PI / -(-x).exp_m1()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn continuum_weight_has_finite_edge_limit() {
        let eb = 0.02;
        for &eps in &[1e-3, 1e-6, 1e-9, 1e-15] {
            let v = continuum_weight(eps, eb);
            assert!(v.is_finite(), "continuum weight at ε={eps} must be finite");
            assert!((v - PI).abs() < 1e-6 || eps >= 1e-3, "ε={eps}: got {v}");
        }
        assert!((continuum_weight(1e-6, eb) - PI).abs() < 1e-12);
    }

    #[test]
    fn continuum_weight_is_zero_below_gap() {
        assert_eq!(continuum_weight(0.0, 0.02), 0.0);
        assert_eq!(continuum_weight(-0.01, 0.02), 0.0);
        assert_eq!(sommerfeld_factor(-0.01, 0.02), 0.0);
    }

    #[test]
    fn weight_equals_dos_times_factor() {
        let eb = 0.02;
        for &de in &[1e-4, 1e-3, 0.01, 0.05, 0.5] {
            let lhs = continuum_weight(de, eb);
            let rhs = (de / eb).sqrt() * sommerfeld_factor(de, eb);
            assert!((lhs - rhs).abs() < 1e-10 * lhs.max(1.0), "ΔE={de}: {lhs} vs {rhs}");
        }
    }

    #[test]
    fn factor_tends_to_one_far_from_gap() {
        let f = sommerfeld_factor(1e9, 0.02);
        assert!((f - 1.0).abs() < 1e-4, "got {f}");
    }
}
