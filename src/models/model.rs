//! Elliott model evaluation.
//!
//! The fitter relies on two primitive operations:
//! - evaluate the ideal (unbroadened) absorption on a grid
//! - predict the broadened absorption (ideal ⊗ kernel + offset)
//!
//! Ideal absorption:
//!
//! ```text
//! α₀(E) = Σ_{n=1..N} (A/n³) δ(E − (Eg − Eb/n²))  +  C · π / (1 − exp(−π√(Eb/(E−Eg)))) · H(E − Eg)
//! ```
//!
//! Sampling notes:
//! - Each delta line is deposited onto its two neighbouring samples with
//!   linear weights (divided by the cell widths), so the sampled spectrum is
//!   continuous in `Eg`/`Eb` and the line area is exactly `A/n³`.
//! - The Heaviside step is averaged over the cell containing `Eg`, for the
//!   same reason.

use crate::domain::{BroadeningKernel, KernelKind, ModelParameters};
use crate::math::continuum_weight;
use crate::models::broadening::{cell_widths, convolve};

/// Number of discrete exciton states in the Rydberg series.
pub const RYDBERG_STATES: usize = 4;

/// Ideal or broadened model split by contribution.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelComponents {
    pub exciton: Vec<f64>,
    pub continuum: Vec<f64>,
    /// `exciton + continuum + baseline_offset`.
    pub total: Vec<f64>,
}

/// Energies and oscillator strengths `(E_n, A/n³)` of the discrete lines.
pub fn exciton_lines(params: &ModelParameters) -> [(f64, f64); RYDBERG_STATES] {
    let mut lines = [(0.0, 0.0); RYDBERG_STATES];
    for (k, line) in lines.iter_mut().enumerate() {
        let n = (k + 1) as f64;
        *line = (
            params.band_gap - params.binding_energy / (n * n),
            params.amplitude / (n * n * n),
        );
    }
    lines
}

/// Continuum absorption at a single energy: `C·√((E−Eg)/Eb)·F(E)`, zero below the gap.
pub fn continuum_at(params: &ModelParameters, energy: f64) -> f64 {
    params.continuum_scale * continuum_weight(energy - params.band_gap, params.binding_energy)
}

/// Discrete Rydberg series sampled on `energies` (delta lines deposited per sample).
pub fn ideal_exciton(params: &ModelParameters, energies: &[f64]) -> Vec<f64> {
    let n = energies.len();
    let mut out = vec![0.0; n];
    if n < 2 {
        return out;
    }
    let widths = cell_widths(energies);

    for (e_line, strength) in exciton_lines(params) {
        if !(e_line.is_finite() && strength.is_finite()) {
            continue;
        }
        let k = energies.partition_point(|&e| e <= e_line);
        if k == 0 {
            // Below the grid: fade into the first sample over one cell.
            let t = 1.0 - (energies[0] - e_line) / widths[0];
            if t > 0.0 {
                out[0] += strength * t / widths[0];
            }
        } else if k == n {
            // Above the grid (or on the last sample).
            let t = 1.0 - (e_line - energies[n - 1]) / widths[n - 1];
            if t > 0.0 {
                out[n - 1] += strength * t / widths[n - 1];
            }
        } else {
            let left = k - 1;
            let t = (e_line - energies[left]) / (energies[k] - energies[left]);
            out[left] += strength * (1.0 - t) / widths[left];
            out[k] += strength * t / widths[k];
        }
    }
    out
}

/// Continuum sampled on `energies`, with the gap step averaged over its cell.
pub fn ideal_continuum(params: &ModelParameters, energies: &[f64]) -> Vec<f64> {
    let n = energies.len();
    let eg = params.band_gap;
    (0..n)
        .map(|i| {
            let ei = energies[i];
            let (lo, hi) = cell_bounds(energies, i);
            if hi <= eg {
                return 0.0;
            }
            let start = lo.max(eg);
            let frac = (hi - start) / (hi - lo);
            // Full cells use the sample energy; the gap cell uses the midpoint
            // of its covered part.
            let e_eval = if start > lo { 0.5 * (start + hi) } else { ei };
            frac * continuum_at(params, e_eval)
        })
        .collect()
}

fn cell_bounds(energies: &[f64], i: usize) -> (f64, f64) {
    let n = energies.len();
    if n < 2 {
        return (energies[i] - 0.5, energies[i] + 0.5);
    }
    let left = if i == 0 {
        0.5 * (energies[1] - energies[0])
    } else {
        0.5 * (energies[i] - energies[i - 1])
    };
    let right = if i == n - 1 {
        0.5 * (energies[n - 1] - energies[n - 2])
    } else {
        0.5 * (energies[i + 1] - energies[i])
    };
    (energies[i] - left, energies[i] + right)
}

/// Ideal (unbroadened) absorption including the baseline offset.
pub fn ideal_absorption(params: &ModelParameters, energies: &[f64]) -> Vec<f64> {
    let exciton = ideal_exciton(params, energies);
    let continuum = ideal_continuum(params, energies);
    exciton
        .iter()
        .zip(continuum.iter())
        .map(|(x, c)| x + c + params.baseline_offset)
        .collect()
}

/// Broadened model on `energies`: `(exciton + continuum) ⊗ K(Γ) + b`.
pub fn predict(params: &ModelParameters, energies: &[f64], kind: KernelKind) -> Vec<f64> {
    let exciton = ideal_exciton(params, energies);
    let continuum = ideal_continuum(params, energies);
    let ideal: Vec<f64> = exciton.iter().zip(continuum.iter()).map(|(x, c)| x + c).collect();
    let kernel = BroadeningKernel::new(kind, params.broadening);
    convolve(energies, &ideal, &kernel)
        .into_iter()
        .map(|v| v + params.baseline_offset)
        .collect()
}

/// Broadened model split by contribution (for reporting).
pub fn predict_components(
    params: &ModelParameters,
    energies: &[f64],
    kind: KernelKind,
) -> ModelComponents {
    let kernel = BroadeningKernel::new(kind, params.broadening);
    let exciton = convolve(energies, &ideal_exciton(params, energies), &kernel);
    let continuum = convolve(energies, &ideal_continuum(params, energies), &kernel);
    let total = exciton
        .iter()
        .zip(continuum.iter())
        .map(|(x, c)| x + c + params.baseline_offset)
        .collect();
    ModelComponents {
        exciton,
        continuum,
        total,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    fn params() -> ModelParameters {
        ModelParameters {
            band_gap: 1.55,
            binding_energy: 0.02,
            broadening: 0.003,
            amplitude: 0.01,
            continuum_scale: 0.1,
            baseline_offset: 0.0,
        }
    }

    fn grid() -> Vec<f64> {
        (0..=100).map(|i| 1.50 + i as f64 * 0.001).collect()
    }

    #[test]
    fn rydberg_lines_follow_one_over_n_squared() {
        let lines = exciton_lines(&params());
        assert!((lines[0].0 - 1.53).abs() < 1e-12);
        assert!((lines[1].0 - 1.545).abs() < 1e-12);
        assert!((lines[1].1 - 0.01 / 8.0).abs() < 1e-15);
    }

    #[test]
    fn continuum_near_gap_is_finite_and_tends_to_pi_c() {
        let p = params();
        let v = continuum_at(&p, p.band_gap + 1e-6);
        assert!(v.is_finite());
        assert!((v - PI * p.continuum_scale).abs() < 1e-9, "got {v}");
        assert_eq!(continuum_at(&p, p.band_gap), 0.0);
        assert_eq!(continuum_at(&p, p.band_gap - 1e-3), 0.0);
    }

    #[test]
    fn deposited_lines_conserve_area() {
        let e = grid();
        let mut p = params();
        p.band_gap = 1.5503; // lines off-grid
        let widths = cell_widths(&e);
        let area: f64 = ideal_exciton(&p, &e).iter().zip(widths.iter()).map(|(y, w)| y * w).sum();
        let expected: f64 = exciton_lines(&p).iter().map(|(_, s)| s).sum();
        assert!((area - expected).abs() < 1e-12, "area={area} expected={expected}");
    }

    #[test]
    fn ideal_spectrum_is_continuous_in_band_gap() {
        let e = grid();
        let mut p = params();
        let a = ideal_absorption(&p, &e);
        p.band_gap += 1e-9;
        let b = ideal_absorption(&p, &e);
        let max_diff = a.iter().zip(b.iter()).fold(0.0_f64, |m, (x, y)| m.max((x - y).abs()));
        assert!(max_diff < 1e-3, "max diff {max_diff}");
    }

    #[test]
    fn zero_broadening_prediction_equals_ideal() {
        let e = grid();
        let mut p = params();
        p.broadening = 0.0;
        p.baseline_offset = 0.05;
        let ideal = ideal_absorption(&p, &e);
        let pred = predict(&p, &e, KernelKind::Gaussian);
        for (a, b) in ideal.iter().zip(pred.iter()) {
            assert!((a - b).abs() < 1e-12);
        }
    }

    #[test]
    fn components_sum_to_prediction() {
        let e = grid();
        let p = params();
        let parts = predict_components(&p, &e, KernelKind::Voigt);
        let pred = predict(&p, &e, KernelKind::Voigt);
        for (a, b) in parts.total.iter().zip(pred.iter()) {
            assert!((a - b).abs() < 1e-12);
        }
        // The 1s line dominates at its own energy.
        let i = 30;
        assert!(parts.exciton[i] > parts.continuum[i]);
    }

    #[test]
    fn broadened_peak_height_matches_kernel() {
        let e = grid();
        let p = params();
        let pred = predict(&p, &e, KernelKind::Gaussian);
        let kernel = BroadeningKernel::new(KernelKind::Gaussian, p.broadening);
        let expected = p.amplitude * kernel.peak_value();
        // Index 30 is 1.530 eV; neighbours contribute below 1 %.
        assert!((pred[30] - expected).abs() / expected < 0.02, "pred={} expected={expected}", pred[30]);
    }
}
