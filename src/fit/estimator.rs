//! Initial parameter estimation from peak and edge detection.
//!
//! Pure heuristics over the normalized spectrum. The estimate only has to land
//! in the basin of the right minimum; the optimizer does the rest.
//!
//! - `Eg`: steepest rise above the lowest-energy peak
//! - `Eb`: `Eg` minus the energy of that peak
//! - `Γ`: HWHM of the most prominent peak, converted to a kernel width
//! - `b`, `A`, `C`: from the low tail, the peak height and the high tail

use crate::domain::{BroadeningKernel, KernelKind, ModelParameters, Spectrum};
use crate::fit::starts::ParameterBounds;
use crate::math::{continuum_weight, find_peaks, half_width_half_max, steepest_rise};
use crate::models::hwhm_per_width;

/// Peaks must stand out by this fraction of the intensity span.
pub const MIN_PEAK_PROMINENCE: f64 = 0.05;

/// Binding energy used when no exciton peak is found (eV).
pub const DEFAULT_BINDING_ENERGY: f64 = 0.01;

/// Share of samples averaged for the low and high tails.
const TAIL_FRACTION: f64 = 0.1;

/// Starting parameters for `spectrum`, clipped into `bounds`. Never fails.
pub fn estimate_initial(spectrum: &Spectrum, kind: KernelKind, bounds: &ParameterBounds) -> ModelParameters {
    let e = spectrum.energies();
    let y = spectrum.intensities();
    let n = e.len();

    let (y_min, y_max) = y
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    let span = (y_max - y_min).max(f64::MIN_POSITIVE);
    let peaks = find_peaks(y, MIN_PEAK_PROMINENCE * span);
    let first = peaks.first().copied();

    let tail = ((TAIL_FRACTION * n as f64).ceil() as usize).clamp(1, n);
    let baseline = y[..tail].iter().sum::<f64>() / tail as f64;

    let band_gap = steepest_rise(e, y, first.map_or(0, |p| p.index)).unwrap_or_else(|| {
        log::warn!("No rising edge found; starting Eg at the middle of the range");
        0.5 * (spectrum.energy_min() + spectrum.energy_max())
    });

    let binding_energy = match first {
        Some(p) if band_gap - e[p.index] > 0.0 => band_gap - e[p.index],
        _ => DEFAULT_BINDING_ENERGY,
    };

    let fallback_width = (3.0 * spectrum.median_spacing()).max(spectrum.energy_range() / 50.0);
    let broadening = peaks
        .iter()
        .max_by(|a, b| a.prominence.total_cmp(&b.prominence))
        .and_then(|p| half_width_half_max(e, y, p.index, baseline))
        .map(|hwhm| hwhm / hwhm_per_width(kind))
        .unwrap_or(fallback_width);

    let kernel = BroadeningKernel::new(kind, broadening);
    let peak_height = first.map_or(y_max, |p| p.height);
    let amplitude = (peak_height - baseline) / kernel.peak_value();

    let top = &e[n - tail..];
    let top_mean_e = top.iter().sum::<f64>() / tail as f64;
    let top_mean_y = y[n - tail..].iter().sum::<f64>() / tail as f64;
    let weight = continuum_weight(top_mean_e - band_gap, binding_energy);
    let continuum_scale = if weight > 0.0 {
        (top_mean_y - baseline) / weight
    } else {
        0.1 * span
    };

    let guess = bounds.clip(&ModelParameters {
        band_gap,
        binding_energy,
        broadening,
        amplitude,
        continuum_scale,
        baseline_offset: baseline,
    });
    log::debug!(
        "Initial guess: Eg={:.5} Eb={:.5} Γ={:.5} A={:.4e} C={:.4e} b={:.4e} ({} peaks)",
        guess.band_gap,
        guess.binding_energy,
        guess.broadening,
        guess.amplitude,
        guess.continuum_scale,
        guess.baseline_offset,
        peaks.len()
    );
    guess
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::predict;

    fn truth() -> ModelParameters {
        ModelParameters {
            band_gap: 1.55,
            binding_energy: 0.02,
            broadening: 0.003,
            amplitude: 0.01,
            continuum_scale: 0.1,
            baseline_offset: 0.0,
        }
    }

    fn synthetic(kind: KernelKind) -> Spectrum {
        let e: Vec<f64> = (0..=100).map(|i| 1.50 + i as f64 * 0.001).collect();
        let y = predict(&truth(), &e, kind);
        Spectrum::new(e, y).unwrap()
    }

    #[test]
    fn estimates_land_near_truth() {
        let s = synthetic(KernelKind::Gaussian);
        let bounds = ParameterBounds::for_spectrum(&s, 0.1);
        let g = estimate_initial(&s, KernelKind::Gaussian, &bounds);
        assert!(bounds.contains(&g));
        assert!((g.band_gap - 1.55).abs() < 0.01, "Eg={}", g.band_gap);
        assert!((g.binding_energy - 0.02).abs() < 0.01, "Eb={}", g.binding_energy);
        assert!((g.broadening - 0.003).abs() < 0.0015, "Γ={}", g.broadening);
        assert!(g.amplitude > 0.0 && g.continuum_scale > 0.0);
    }

    #[test]
    fn featureless_ramp_falls_back_to_defaults() {
        let e: Vec<f64> = (0..50).map(|i| 1.0 + i as f64 * 0.01).collect();
        let y: Vec<f64> = (0..50).map(|i| 1.0 - i as f64 * 0.01).collect();
        let s = Spectrum::new(e, y).unwrap();
        let bounds = ParameterBounds::for_spectrum(&s, 0.1);
        let g = estimate_initial(&s, KernelKind::Lorentzian, &bounds);
        assert!((g.band_gap - 1.245).abs() < 1e-9);
        assert_eq!(g.binding_energy, DEFAULT_BINDING_ENERGY);
        // 3·spacing beats range/50 here.
        assert!((g.broadening - 0.03).abs() < 1e-9);
        assert!(bounds.contains(&g));
    }
}
