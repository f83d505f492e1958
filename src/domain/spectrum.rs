//! Validated, immutable spectrum on an energy axis.

use serde::{Deserialize, Serialize};

use crate::error::InvalidSpectrumError;

/// Minimum number of samples for a meaningful fit.
pub const MIN_SAMPLES: usize = 10;

/// Ordered `(energy, intensity)` samples with strictly increasing energy (eV).
///
/// Fields are private so every instance has passed validation, including
/// deserialized ones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "SpectrumData")]
pub struct Spectrum {
    energies: Vec<f64>,
    intensities: Vec<f64>,
    weights: Vec<f64>,
}

/// Unvalidated wire form of [`Spectrum`].
#[derive(Deserialize)]
struct SpectrumData {
    energies: Vec<f64>,
    intensities: Vec<f64>,
    #[serde(default)]
    weights: Option<Vec<f64>>,
}

impl TryFrom<SpectrumData> for Spectrum {
    type Error = InvalidSpectrumError;

    fn try_from(data: SpectrumData) -> Result<Self, Self::Error> {
        match data.weights {
            Some(weights) => Self::with_weights(data.energies, data.intensities, weights),
            None => Self::new(data.energies, data.intensities),
        }
    }
}

impl Spectrum {
    /// Build a spectrum with uniform weights.
    pub fn new(energies: Vec<f64>, intensities: Vec<f64>) -> Result<Self, InvalidSpectrumError> {
        let weights = vec![1.0; energies.len()];
        Self::with_weights(energies, intensities, weights)
    }

    /// Build a spectrum with per-sample weights in the least-squares objective.
    pub fn with_weights(
        energies: Vec<f64>,
        intensities: Vec<f64>,
        weights: Vec<f64>,
    ) -> Result<Self, InvalidSpectrumError> {
        if energies.len() != intensities.len() {
            return Err(InvalidSpectrumError::LengthMismatch {
                x_len: energies.len(),
                y_len: intensities.len(),
            });
        }
        if weights.len() != energies.len() {
            return Err(InvalidSpectrumError::LengthMismatch {
                x_len: energies.len(),
                y_len: weights.len(),
            });
        }
        if energies.len() < MIN_SAMPLES {
            return Err(InvalidSpectrumError::TooFewSamples {
                found: energies.len(),
                min: MIN_SAMPLES,
            });
        }
        for (index, (e, y)) in energies.iter().zip(intensities.iter()).enumerate() {
            if !(e.is_finite() && y.is_finite()) {
                return Err(InvalidSpectrumError::NonFinite { index });
            }
        }
        for index in 1..energies.len() {
            if energies[index] <= energies[index - 1] {
                return Err(InvalidSpectrumError::NonMonotonic { index });
            }
        }
        if let Some(index) = weights.iter().position(|w| !(w.is_finite() && *w > 0.0)) {
            return Err(InvalidSpectrumError::InvalidWeight { index });
        }
        if intensities.iter().all(|&y| y == 0.0) {
            return Err(InvalidSpectrumError::AllZeroIntensity);
        }

        Ok(Self {
            energies,
            intensities,
            weights,
        })
    }

    pub fn energies(&self) -> &[f64] {
        &self.energies
    }

    pub fn intensities(&self) -> &[f64] {
        &self.intensities
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    pub fn len(&self) -> usize {
        self.energies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.energies.is_empty()
    }

    pub fn energy_min(&self) -> f64 {
        self.energies[0]
    }

    pub fn energy_max(&self) -> f64 {
        self.energies[self.energies.len() - 1]
    }

    /// Width of the energy axis, `Emax − Emin`.
    pub fn energy_range(&self) -> f64 {
        self.energy_max() - self.energy_min()
    }

    /// Largest absolute intensity.
    pub fn intensity_span(&self) -> f64 {
        self.intensities.iter().fold(0.0_f64, |m, y| m.max(y.abs()))
    }

    /// Median spacing between neighbouring samples.
    pub fn median_spacing(&self) -> f64 {
        let mut steps: Vec<f64> = self.energies.windows(2).map(|w| w[1] - w[0]).collect();
        steps.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        steps[steps.len() / 2]
    }

    /// Samples with `min <= energy <= max` as a new spectrum.
    pub fn window(&self, min: f64, max: f64) -> Result<Self, InvalidSpectrumError> {
        let keep: Vec<usize> = (0..self.len())
            .filter(|&i| self.energies[i] >= min && self.energies[i] <= max)
            .collect();
        if keep.len() < MIN_SAMPLES {
            return Err(InvalidSpectrumError::EmptyWindow {
                min,
                max,
                found: keep.len(),
                required: MIN_SAMPLES,
            });
        }
        Self::with_weights(
            keep.iter().map(|&i| self.energies[i]).collect(),
            keep.iter().map(|&i| self.intensities[i]).collect(),
            keep.iter().map(|&i| self.weights[i]).collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(n: usize) -> Vec<f64> {
        (0..n).map(|i| 1.5 + i as f64 * 0.01).collect()
    }

    #[test]
    fn rejects_five_samples() {
        let err = Spectrum::new(grid(5), vec![1.0; 5]).unwrap_err();
        assert_eq!(err, InvalidSpectrumError::TooFewSamples { found: 5, min: MIN_SAMPLES });
    }

    #[test]
    fn rejects_non_monotonic_axis() {
        let mut e = grid(12);
        e.swap(4, 5);
        let err = Spectrum::new(e, vec![1.0; 12]).unwrap_err();
        assert!(matches!(err, InvalidSpectrumError::NonMonotonic { .. }));
    }

    #[test]
    fn rejects_duplicate_energies() {
        let mut e = grid(12);
        e[6] = e[5];
        assert!(matches!(
            Spectrum::new(e, vec![1.0; 12]),
            Err(InvalidSpectrumError::NonMonotonic { index: 6 })
        ));
    }

    #[test]
    fn rejects_all_zero_intensity() {
        let err = Spectrum::new(grid(12), vec![0.0; 12]).unwrap_err();
        assert_eq!(err, InvalidSpectrumError::AllZeroIntensity);
    }

    #[test]
    fn window_keeps_inner_samples() {
        let s = Spectrum::new(grid(30), (0..30).map(|i| i as f64).collect()).unwrap();
        let w = s.window(1.595, 1.755).unwrap();
        assert_eq!(w.len(), 16);
        assert!(w.energy_min() >= 1.6 - 1e-12);
        assert!(s.window(1.6, 1.62).is_err());
    }

    #[test]
    fn deserialization_validates() {
        let empty = serde_json::from_str::<Spectrum>(r#"{"energies":[],"intensities":[],"weights":[]}"#);
        assert!(empty.is_err());

        let mut e = grid(12);
        e.swap(2, 3);
        let json = serde_json::json!({ "energies": e, "intensities": vec![1.0; 12] });
        let err = serde_json::from_value::<Spectrum>(json).unwrap_err();
        assert!(err.to_string().contains("not strictly monotonic"), "{err}");

        let json = serde_json::json!({ "energies": grid(12), "intensities": vec![1.0; 11] });
        assert!(serde_json::from_value::<Spectrum>(json).is_err());
    }

    #[test]
    fn serialized_spectrum_reads_back() {
        let s = Spectrum::with_weights(grid(12), (0..12).map(|i| i as f64).collect(), vec![2.0; 12]).unwrap();
        let text = serde_json::to_string(&s).unwrap();
        let back: Spectrum = serde_json::from_str(&text).unwrap();
        assert_eq!(back, s);

        let json = serde_json::json!({ "energies": grid(12), "intensities": vec![1.0; 12] });
        let uniform: Spectrum = serde_json::from_value(json).unwrap();
        assert!(uniform.weights().iter().all(|&w| w == 1.0));
    }
}
