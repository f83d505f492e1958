//! Broadening kernels and discrete convolution on an energy grid.
//!
//! Kernels are normalised to unit area:
//!
//! - Gaussian: `σ = width`
//! - Lorentzian: `HWHM = width`
//! - Voigt: pseudo-Voigt (Thompson–Cox–Hastings) of a Gaussian with `σ = width`
//!   and a Lorentzian with `HWHM = width`
//!
//! Convolution is a direct sum over samples weighted by their cell widths, so
//! non-uniform grids (e.g. converted from wavelength) are handled.
//!
//! Edge policy: the signal is **reflected** about the first and last samples
//! (the edge sample itself is not duplicated), and every output is divided by
//! the discrete kernel mass of its row. A flat input therefore stays flat up
//! to the boundaries, and the output has exactly the input length.

use std::f64::consts::PI;

use crate::domain::{BroadeningKernel, KernelKind};

const SQRT_2PI: f64 = 2.506_628_274_631_000_7;

/// `2 √(2 ln 2)`: Gaussian FWHM per σ.
const GAUSS_FWHM_PER_SIGMA: f64 = 2.354_820_045_030_949_3;

/// Gaussian support in σ.
const GAUSS_SUPPORT: f64 = 8.0;

/// Lorentzian/Voigt support in HWHM.
const LORENTZ_SUPPORT: f64 = 60.0;

/// Pseudo-Voigt parameters: total FWHM and Lorentzian fraction η.
#[derive(Debug, Clone, Copy)]
struct PseudoVoigt {
    fwhm: f64,
    eta: f64,
}

fn pseudo_voigt(width: f64) -> PseudoVoigt {
    let fg = GAUSS_FWHM_PER_SIGMA * width;
    let fl = 2.0 * width;
    let f = (fg.powi(5)
        + 2.69269 * fg.powi(4) * fl
        + 2.42843 * fg.powi(3) * fl.powi(2)
        + 4.47163 * fg.powi(2) * fl.powi(3)
        + 0.07842 * fg * fl.powi(4)
        + fl.powi(5))
    .powf(0.2);
    let r = fl / f;
    let eta = 1.36603 * r - 0.47719 * r * r + 0.11116 * r * r * r;
    PseudoVoigt { fwhm: f, eta }
}

fn gaussian(d: f64, sigma: f64) -> f64 {
    (-0.5 * (d / sigma).powi(2)).exp() / (sigma * SQRT_2PI)
}

fn lorentzian(d: f64, hwhm: f64) -> f64 {
    hwhm / (PI * (d * d + hwhm * hwhm))
}

/// Kernel with its shape constants resolved once.
#[derive(Debug, Clone, Copy)]
enum Profile {
    Gaussian { sigma: f64 },
    Lorentzian { hwhm: f64 },
    Voigt { eta: f64, hwhm: f64, sigma: f64 },
}

impl Profile {
    fn eval(&self, d: f64) -> f64 {
        match *self {
            Profile::Gaussian { sigma } => gaussian(d, sigma),
            Profile::Lorentzian { hwhm } => lorentzian(d, hwhm),
            Profile::Voigt { eta, hwhm, sigma } => {
                eta * lorentzian(d, hwhm) + (1.0 - eta) * gaussian(d, sigma)
            }
        }
    }
}

impl BroadeningKernel {
    pub fn new(kind: KernelKind, width: f64) -> Self {
        Self { kind, width }
    }

    /// A zero-width kernel leaves spectra unchanged.
    pub fn is_identity(&self) -> bool {
        !(self.width.is_finite() && self.width > 0.0)
    }

    fn profile(&self) -> Profile {
        let w = self.width;
        match self.kind {
            KernelKind::Gaussian => Profile::Gaussian { sigma: w },
            KernelKind::Lorentzian => Profile::Lorentzian { hwhm: w },
            KernelKind::Voigt => {
                let pv = pseudo_voigt(w);
                Profile::Voigt {
                    eta: pv.eta,
                    hwhm: 0.5 * pv.fwhm,
                    sigma: pv.fwhm / GAUSS_FWHM_PER_SIGMA,
                }
            }
        }
    }

    /// Kernel value at energy offset `d` (1/eV).
    pub fn eval(&self, d: f64) -> f64 {
        self.profile().eval(d)
    }

    /// Kernel maximum, i.e. the peak height of a unit-area line.
    pub fn peak_value(&self) -> f64 {
        self.eval(0.0)
    }

    /// Half width at half maximum of the kernel.
    pub fn hwhm(&self) -> f64 {
        self.width * hwhm_per_width(self.kind)
    }

    /// Offsets beyond this are treated as zero.
    pub fn support_radius(&self) -> f64 {
        match self.kind {
            KernelKind::Gaussian => GAUSS_SUPPORT * self.width,
            KernelKind::Lorentzian | KernelKind::Voigt => LORENTZ_SUPPORT * self.hwhm(),
        }
    }
}

/// Ratio `HWHM / width` for a kernel kind.
pub fn hwhm_per_width(kind: KernelKind) -> f64 {
    match kind {
        KernelKind::Gaussian => 0.5 * GAUSS_FWHM_PER_SIGMA,
        KernelKind::Lorentzian => 1.0,
        KernelKind::Voigt => 0.5 * pseudo_voigt(1.0).fwhm,
    }
}

/// Width of the cell each sample represents.
///
/// Interior samples span half the distance to each neighbour; the edge samples
/// span a full neighbour distance, matching the reflected extension.
pub fn cell_widths(energies: &[f64]) -> Vec<f64> {
    let n = energies.len();
    match n {
        0 => Vec::new(),
        1 => vec![1.0],
        _ => (0..n)
            .map(|i| {
                if i == 0 {
                    energies[1] - energies[0]
                } else if i == n - 1 {
                    energies[n - 1] - energies[n - 2]
                } else {
                    0.5 * (energies[i + 1] - energies[i - 1])
                }
            })
            .collect(),
    }
}

/// Convolve `values` sampled at `energies` with `kernel`.
///
/// `energies` must be strictly increasing and the same length as `values`.
pub fn convolve(energies: &[f64], values: &[f64], kernel: &BroadeningKernel) -> Vec<f64> {
    let n = energies.len().min(values.len());
    if kernel.is_identity() || n < 2 {
        return values[..n].to_vec();
    }

    let widths = cell_widths(&energies[..n]);
    let profile = kernel.profile();
    let radius = kernel.support_radius();
    let e_first = energies[0];
    let e_last = energies[n - 1];

    let mut out = Vec::with_capacity(n);
    for i in 0..n {
        let ei = energies[i];
        let mut acc = 0.0;
        let mut mass = 0.0;

        // Direct samples within the support.
        let lo = energies[..n].partition_point(|&e| e < ei - radius);
        let hi = energies[..n].partition_point(|&e| e <= ei + radius);
        for j in lo..hi {
            let k = widths[j] * profile.eval(ei - energies[j]);
            acc += k * values[j];
            mass += k;
        }

        // Mirror images about the first sample: 2·E0 − Ej for j >= 1.
        if ei - e_first < radius {
            let limit = 2.0 * e_first - ei + radius;
            let hi = energies[..n].partition_point(|&e| e <= limit);
            for j in 1..hi {
                let k = widths[j] * profile.eval(ei - (2.0 * e_first - energies[j]));
                acc += k * values[j];
                mass += k;
            }
        }

        // Mirror images about the last sample: 2·EN − Ej for j <= n - 2.
        if e_last - ei < radius {
            let limit = 2.0 * e_last - ei - radius;
            let lo = energies[..n].partition_point(|&e| e < limit);
            for j in lo..n - 1 {
                let k = widths[j] * profile.eval(ei - (2.0 * e_last - energies[j]));
                acc += k * values[j];
                mass += k;
            }
        }

        out.push(if mass > 0.0 { acc / mass } else { values[i] });
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(n: usize, step: f64) -> Vec<f64> {
        (0..n).map(|i| 1.5 + i as f64 * step).collect()
    }

    #[test]
    fn zero_width_kernel_is_identity() {
        let e = grid(101, 0.001);
        let y: Vec<f64> = e.iter().map(|&v| ((v - 1.55) * 200.0).sin() + 2.0).collect();
        for kind in [KernelKind::Gaussian, KernelKind::Lorentzian, KernelKind::Voigt] {
            let out = convolve(&e, &y, &BroadeningKernel::new(kind, 0.0));
            assert_eq!(out.len(), y.len());
            for (a, b) in out.iter().zip(y.iter()) {
                assert!((a - b).abs() < 1e-15);
            }
        }
    }

    #[test]
    fn sub_grid_gaussian_is_identity_within_tolerance() {
        let e = grid(50, 0.01);
        let y: Vec<f64> = (0..50).map(|i| (i % 7) as f64).collect();
        let out = convolve(&e, &y, &BroadeningKernel::new(KernelKind::Gaussian, 1e-4));
        for (a, b) in out.iter().zip(y.iter()) {
            assert!((a - b).abs() < 1e-12);
        }
    }

    #[test]
    fn flat_input_stays_flat_with_reflection() {
        let e = grid(80, 0.002);
        let y = vec![0.7; 80];
        for kind in [KernelKind::Gaussian, KernelKind::Lorentzian, KernelKind::Voigt] {
            let out = convolve(&e, &y, &BroadeningKernel::new(kind, 0.01));
            for v in out {
                assert!((v - 0.7).abs() < 1e-12, "{kind:?}: {v}");
            }
        }
    }

    #[test]
    fn kernels_have_unit_area() {
        for kind in [KernelKind::Gaussian, KernelKind::Lorentzian, KernelKind::Voigt] {
            let k = BroadeningKernel::new(kind, 0.01);
            let step = 1e-4;
            let area: f64 = (-200_000..=200_000).map(|i| k.eval(i as f64 * step) * step).sum();
            // Lorentzian tails beyond ±20 eV hold ~3e-4 of the area.
            assert!((area - 1.0).abs() < 1e-3, "{kind:?}: area={area}");
        }
    }

    #[test]
    fn hwhm_is_half_maximum_point() {
        for kind in [KernelKind::Gaussian, KernelKind::Lorentzian, KernelKind::Voigt] {
            let k = BroadeningKernel::new(kind, 0.004);
            let ratio = k.eval(k.hwhm()) / k.peak_value();
            assert!((ratio - 0.5).abs() < 0.02, "{kind:?}: ratio={ratio}");
        }
    }

    #[test]
    fn broadened_delta_matches_kernel_shape() {
        let e = grid(201, 0.001);
        let widths = cell_widths(&e);
        let mut y = vec![0.0; 201];
        y[100] = 1.0 / widths[100];
        let kernel = BroadeningKernel::new(KernelKind::Gaussian, 0.004);
        let out = convolve(&e, &y, &kernel);
        for i in 90..110 {
            let expected = kernel.eval(e[i] - e[100]);
            assert!((out[i] - expected).abs() < 1e-6 * kernel.peak_value(), "i={i}");
        }
    }

    #[test]
    fn cell_widths_on_nonuniform_grid() {
        let w = cell_widths(&[1.0, 1.1, 1.3, 1.6]);
        let expected = [0.1, 0.15, 0.25, 0.3];
        for (a, b) in w.iter().zip(expected.iter()) {
            assert!((a - b).abs() < 1e-12);
        }
    }
}
