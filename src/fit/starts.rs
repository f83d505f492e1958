//! Parameter bounds and multi-start points.
//!
//! The optimizer works inside a box derived from the data:
//!
//! - `Eg ∈ [Emin − m·R, Emax + m·R]`
//! - `Eb, Γ ∈ [ε, R·(1 + m)]`
//! - `A ∈ [ε, 10·span·R]` (line area, intensity × eV)
//! - `C ∈ [ε, 10·span]`
//! - `b ∈ [−span, span]`
//!
//! with `R` the energy range, `m` the bound margin and `span = max|y|`.
//!
//! Start points are deterministic. Start 0 is the estimator's guess; later
//! starts move `Eg` by multiples of `Eb/2` in alternating directions and
//! rescale `Eb` with it.

use crate::domain::{
    IDX_BAND_GAP, IDX_BINDING_ENERGY, IDX_BROADENING, ModelParameters, PARAM_COUNT, Spectrum,
};

/// Lower bound for the strictly positive parameters.
pub const PARAM_EPS: f64 = 1e-9;

/// Box constraints in optimizer vector order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParameterBounds {
    pub lower: [f64; PARAM_COUNT],
    pub upper: [f64; PARAM_COUNT],
}

impl ParameterBounds {
    /// Bounds for fitting `spectrum` with the given margin (fraction of the energy range).
    pub fn for_spectrum(spectrum: &Spectrum, margin: f64) -> Self {
        let margin = if margin.is_finite() && margin >= 0.0 { margin } else { 0.0 };
        let range = spectrum.energy_range();
        let span = spectrum.intensity_span().max(PARAM_EPS);
        let width_max = range * (1.0 + margin);

        Self {
            lower: [
                spectrum.energy_min() - margin * range,
                PARAM_EPS,
                PARAM_EPS,
                PARAM_EPS,
                PARAM_EPS,
                -span,
            ],
            upper: [
                spectrum.energy_max() + margin * range,
                width_max,
                width_max,
                10.0 * span * range,
                10.0 * span,
                span,
            ],
        }
    }

    /// Pin one parameter to a value (used for a caller-fixed kernel width).
    pub fn pin(&mut self, index: usize, value: f64) {
        self.lower[index] = value;
        self.upper[index] = value;
    }

    pub fn clip_slice(&self, values: &mut [f64]) {
        for (j, v) in values.iter_mut().enumerate().take(PARAM_COUNT) {
            *v = if v.is_nan() {
                0.5 * (self.lower[j] + self.upper[j])
            } else {
                v.clamp(self.lower[j], self.upper[j])
            };
        }
    }

    pub fn clip(&self, params: &ModelParameters) -> ModelParameters {
        let mut v = params.to_array();
        self.clip_slice(&mut v);
        ModelParameters::from_slice(&v)
    }

    pub fn contains(&self, params: &ModelParameters) -> bool {
        params
            .to_array()
            .iter()
            .enumerate()
            .all(|(j, v)| *v >= self.lower[j] && *v <= self.upper[j])
    }
}

/// `count` deterministic start points around `guess`, all inside `bounds`.
pub fn start_points(guess: &ModelParameters, count: usize, bounds: &ParameterBounds) -> Vec<ModelParameters> {
    let base = bounds.clip(guess);
    let mut out = Vec::with_capacity(count.max(1));
    out.push(base);

    for k in 1..count {
        let step = k.div_ceil(2) as f64;
        let up = k % 2 == 1;
        let eb = base.binding_energy;

        let mut v = base.to_array();
        if up {
            v[IDX_BAND_GAP] = base.band_gap + step * eb / 2.0;
            v[IDX_BINDING_ENERGY] = eb * (1.0 + 0.5 * step);
        } else {
            v[IDX_BAND_GAP] = base.band_gap - step * eb / 2.0;
            v[IDX_BINDING_ENERGY] = eb / (1.0 + 0.5 * step);
        }
        // Narrower lines for the starts that move the gap up.
        if up && bounds.lower[IDX_BROADENING] < bounds.upper[IDX_BROADENING] {
            v[IDX_BROADENING] = base.broadening * 0.8;
        }
        bounds.clip_slice(&mut v);
        out.push(ModelParameters::from_slice(&v));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spectrum() -> Spectrum {
        let e: Vec<f64> = (0..=100).map(|i| 1.50 + i as f64 * 0.001).collect();
        let y: Vec<f64> = e.iter().map(|&v| if v > 1.55 { 0.5 } else { 0.1 }).collect();
        Spectrum::new(e, y).unwrap()
    }

    fn guess() -> ModelParameters {
        ModelParameters {
            band_gap: 1.55,
            binding_energy: 0.02,
            broadening: 0.003,
            amplitude: 0.01,
            continuum_scale: 0.1,
            baseline_offset: 0.0,
        }
    }

    #[test]
    fn bounds_follow_energy_range_and_span() {
        let b = ParameterBounds::for_spectrum(&spectrum(), 0.1);
        assert!((b.lower[IDX_BAND_GAP] - 1.49).abs() < 1e-9);
        assert!((b.upper[IDX_BAND_GAP] - 1.61).abs() < 1e-9);
        assert!((b.upper[IDX_BINDING_ENERGY] - 0.11).abs() < 1e-9);
        assert_eq!(b.lower[IDX_BINDING_ENERGY], PARAM_EPS);
        assert!((b.upper[5] - 0.5).abs() < 1e-12);
        assert!((b.lower[5] + 0.5).abs() < 1e-12);
    }

    #[test]
    fn clip_pulls_values_into_the_box() {
        let b = ParameterBounds::for_spectrum(&spectrum(), 0.1);
        let wild = ModelParameters {
            band_gap: 3.0,
            binding_energy: -1.0,
            broadening: f64::NAN,
            amplitude: 1e6,
            continuum_scale: 0.0,
            baseline_offset: -10.0,
        };
        let c = b.clip(&wild);
        assert!(b.contains(&c));
        assert_eq!(c.band_gap, b.upper[IDX_BAND_GAP]);
        assert_eq!(c.binding_energy, PARAM_EPS);
        assert!(c.broadening.is_finite());
        assert_eq!(c.continuum_scale, PARAM_EPS);
    }

    #[test]
    fn starts_are_deterministic_and_distinct() {
        let b = ParameterBounds::for_spectrum(&spectrum(), 0.1);
        let a = start_points(&guess(), 5, &b);
        let again = start_points(&guess(), 5, &b);
        assert_eq!(a, again);
        assert_eq!(a.len(), 5);
        assert_eq!(a[0], guess());
        assert!((a[1].band_gap - 1.56).abs() < 1e-12);
        assert!((a[1].binding_energy - 0.03).abs() < 1e-12);
        assert!((a[2].band_gap - 1.54).abs() < 1e-12);
        assert!(a[2].binding_energy < 0.02);
        // The 1s line of an upward start stays where the guess put it.
        assert!((a[1].first_exciton_energy() - guess().first_exciton_energy()).abs() < 1e-12);
        for p in &a {
            assert!(b.contains(p));
        }
    }

    #[test]
    fn pinned_width_is_kept_in_every_start() {
        let mut b = ParameterBounds::for_spectrum(&spectrum(), 0.1);
        b.pin(IDX_BROADENING, 0.004);
        for p in start_points(&guess(), 4, &b) {
            assert_eq!(p.broadening, 0.004);
        }
    }
}
