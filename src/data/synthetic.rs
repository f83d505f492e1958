//! Synthetic Elliott spectra for demos and tests.
//!
//! The generator evaluates the broadened model on a uniform energy grid and
//! adds seeded Gaussian noise, so the same settings always produce the same
//! file.

use std::fmt::Write as _;
use std::path::Path;

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::{Distribution, Normal};

use crate::domain::{KernelKind, ModelParameters};
use crate::error::{AppError, EXIT_USAGE};
use crate::fit::prepare::NM_EV;
use crate::models::predict;

/// Settings for one synthetic spectrum.
#[derive(Debug, Clone, PartialEq)]
pub struct SynthSpec {
    pub params: ModelParameters,
    pub kernel: KernelKind,
    pub e_min: f64,
    pub e_max: f64,
    pub step: f64,
    /// Standard deviation of additive noise (0 disables it).
    pub noise: f64,
    pub seed: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SyntheticSpectrum {
    pub energies: Vec<f64>,
    pub intensities: Vec<f64>,
}

pub fn generate_spectrum(spec: &SynthSpec) -> Result<SyntheticSpectrum, AppError> {
    if !(spec.e_min.is_finite() && spec.e_max.is_finite() && spec.e_max > spec.e_min) {
        return Err(AppError::new(EXIT_USAGE, "Invalid energy range for synthetic spectrum."));
    }
    if !(spec.step.is_finite() && spec.step > 0.0) {
        return Err(AppError::new(EXIT_USAGE, "Energy step must be > 0."));
    }
    if !(spec.noise.is_finite() && spec.noise >= 0.0) {
        return Err(AppError::new(EXIT_USAGE, "Noise level must be >= 0."));
    }

    let n = ((spec.e_max - spec.e_min) / spec.step).round() as usize + 1;
    let energies: Vec<f64> = (0..n).map(|i| spec.e_min + i as f64 * spec.step).collect();
    let mut intensities = predict(&spec.params, &energies, spec.kernel);

    if spec.noise > 0.0 {
        let mut rng = StdRng::seed_from_u64(spec.seed);
        let normal = Normal::new(0.0, spec.noise)
            .map_err(|e| AppError::new(EXIT_USAGE, format!("Noise distribution error: {e}")))?;
        for v in intensities.iter_mut() {
            *v += normal.sample(&mut rng);
        }
    }

    Ok(SyntheticSpectrum {
        energies,
        intensities,
    })
}

/// Two-column text; wavelengths (descending energy order) when `as_nm`.
pub fn format_spectrum(spectrum: &SyntheticSpectrum, as_nm: bool) -> String {
    let mut out = String::new();
    out.push_str("# synthetic Elliott spectrum\n");
    out.push_str(if as_nm { "wavelength_nm\tintensity\n" } else { "energy_ev\tintensity\n" });
    for (&e, &y) in spectrum.energies.iter().zip(spectrum.intensities.iter()) {
        let x = if as_nm { NM_EV / e } else { e };
        let _ = writeln!(out, "{x:.6}\t{y:.8e}");
    }
    out
}

pub fn write_spectrum(path: &Path, spectrum: &SyntheticSpectrum, as_nm: bool) -> Result<(), AppError> {
    std::fs::write(path, format_spectrum(spectrum, as_nm))
        .map_err(|e| AppError::new(EXIT_USAGE, format!("Failed to write '{}': {e}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{BaselineMode, XUnit};
    use crate::fit::prepare::{PrepareOptions, prepare_spectrum};
    use crate::io::ingest::parse_spectra;

    fn spec(noise: f64, seed: u64) -> SynthSpec {
        SynthSpec {
            params: ModelParameters {
                band_gap: 1.55,
                binding_energy: 0.02,
                broadening: 0.003,
                amplitude: 0.01,
                continuum_scale: 0.1,
                baseline_offset: 0.0,
            },
            kernel: KernelKind::Gaussian,
            e_min: 1.50,
            e_max: 1.60,
            step: 0.001,
            noise,
            seed,
        }
    }

    #[test]
    fn grid_includes_both_ends() {
        let s = generate_spectrum(&spec(0.0, 0)).unwrap();
        assert_eq!(s.energies.len(), 101);
        assert!((s.energies[100] - 1.60).abs() < 1e-12);
    }

    #[test]
    fn noise_is_reproducible_per_seed() {
        let a = generate_spectrum(&spec(0.01, 42)).unwrap();
        let b = generate_spectrum(&spec(0.01, 42)).unwrap();
        let c = generate_spectrum(&spec(0.01, 43)).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn written_nm_file_reads_back_as_energy() {
        let s = generate_spectrum(&spec(0.0, 0)).unwrap();
        let text = format_spectrum(&s, true);
        let file = parse_spectra(&text, XUnit::Auto, false).unwrap();
        assert_eq!(file.datasets[0].name, "intensity");
        let opts = PrepareOptions {
            baseline: BaselineMode::None,
            ..PrepareOptions::default()
        };
        let prepared = prepare_spectrum(&file.datasets[0].raw, &opts).unwrap();
        assert_eq!(prepared.source_unit, XUnit::Nanometer);
        assert!((prepared.spectrum.energy_min() - 1.50).abs() < 1e-5);
    }

    #[test]
    fn rejects_bad_step() {
        let mut bad = spec(0.0, 0);
        bad.step = 0.0;
        assert!(generate_spectrum(&bad).is_err());
    }
}
