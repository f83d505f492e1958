//! Shared "fit pipeline" logic used by the CLI front-end.
//!
//! Keeping this in one place avoids duplicating the core workflow:
//! load file -> select datasets -> prepare -> fit -> refine baseline -> focus
//!
//! The CLI can then focus on presentation (printing vs exports).

use crate::domain::{BaselineMode, FitConfig, FitOptions, FitResult};
use crate::error::AppError;
use crate::fit::prepare::{BaselineWindow, PrepareOptions, PreparedSpectrum, RawSpectrum, prepare_spectrum};
use crate::fit::selection::fit_elliott_model;
use crate::io::ingest::{load_spectra, select_datasets};

/// The refined baseline uses samples below `Eg − BASELINE_GUARD·Eb`.
pub const BASELINE_GUARD: f64 = 1.5;

/// Default half-width (eV) of the final window around `Eg`.
pub const DEFAULT_FOCUS_WINDOW: f64 = 0.5;

/// Fit of one dataset, together with the prepared data it was fitted on.
#[derive(Debug, Clone)]
pub struct DatasetFit {
    pub name: String,
    pub prepared: PreparedSpectrum,
    pub result: FitResult,
    /// Whether the final fit ran on the focus window around `Eg`.
    pub focused: bool,
}

/// All computed outputs of a single `elliott fit` run.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub fits: Vec<DatasetFit>,
    /// Datasets rejected during preparation, with the reason.
    pub rejected: Vec<(String, AppError)>,
    pub rows_read: usize,
    pub rows_skipped: usize,
}

/// Execute the full fitting pipeline and return the computed outputs.
pub fn run_fit(config: &FitConfig) -> Result<RunOutput, AppError> {
    let file = load_spectra(&config.input_path, config.unit)?;
    let datasets = select_datasets(file.datasets, &config.datasets)?;
    log::info!(
        "Loaded {} dataset(s) from {}",
        datasets.len(),
        config.input_path.display()
    );

    let mut fits = Vec::new();
    let mut rejected = Vec::new();
    for dataset in datasets {
        match fit_dataset(&dataset.name, &dataset.raw, config) {
            Ok(fit) => fits.push(fit),
            Err(err) => {
                log::warn!("{}: {err}", dataset.name);
                rejected.push((dataset.name, err));
            }
        }
    }

    // Every dataset rejected: surface the first failure.
    if fits.is_empty() {
        if let Some((_, err)) = rejected.first() {
            return Err(err.clone());
        }
    }

    Ok(RunOutput {
        fits,
        rejected,
        rows_read: file.rows_read,
        rows_skipped: file.rows_skipped,
    })
}

/// Prepare and fit one dataset.
pub fn fit_dataset(name: &str, raw: &RawSpectrum, config: &FitConfig) -> Result<DatasetFit, AppError> {
    let mut prepare = PrepareOptions {
        baseline: config.baseline,
        window: BaselineWindow::LowestFraction(config.baseline_fraction),
        min_energy: config.min_energy,
        max_energy: config.max_energy,
    };
    let mut prepared = prepare_spectrum(raw, &prepare)?;
    let mut result = fit_elliott_model(&prepared.spectrum, &config.fit);
    log::debug!("{name}: preliminary Eb={:.5} eV", result.binding_energy());

    // Refit the baseline on the transparent region below the exciton lines.
    if config.refine_baseline && config.baseline != BaselineMode::None {
        let p = result.parameters;
        let threshold = p.band_gap - BASELINE_GUARD * p.binding_energy;
        prepare.window = BaselineWindow::Below(threshold);
        match prepare_spectrum(raw, &prepare) {
            Ok(refined) => {
                log::info!(
                    "{name}: baseline refitted on {} samples below {threshold:.4} eV",
                    refined.baseline_points
                );
                prepared = refined;
                result = fit_elliott_model(&prepared.spectrum, &continue_from(&config.fit, &result));
            }
            Err(err) => log::warn!("{name}: keeping initial baseline ({err})"),
        }
    }

    // Final fit on the region around the band gap.
    let mut focused = false;
    if let Some(half_width) = config.focus_window {
        let eg = result.parameters.band_gap;
        match prepared.window(eg - half_width, eg + half_width) {
            Ok(window) if window.spectrum.len() < prepared.spectrum.len() => {
                log::info!(
                    "{name}: focusing on {:.3}–{:.3} eV",
                    window.spectrum.energy_min(),
                    window.spectrum.energy_max()
                );
                prepared = window;
                result = fit_elliott_model(&prepared.spectrum, &continue_from(&config.fit, &result));
                focused = true;
            }
            Ok(_) => {}
            Err(err) => log::warn!("{name}: focus window skipped ({err})"),
        }
    }

    Ok(DatasetFit {
        name: name.to_string(),
        prepared,
        result,
        focused,
    })
}

/// Options for a refit starting from a previous result.
fn continue_from(options: &FitOptions, previous: &FitResult) -> FitOptions {
    FitOptions {
        initial_guess: Some(previous.parameters),
        ..options.clone()
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{SynthSpec, format_spectrum, generate_spectrum};
    use crate::domain::{KernelKind, ModelParameters, XUnit};

    fn config(path: std::path::PathBuf) -> FitConfig {
        FitConfig {
            input_path: path,
            unit: XUnit::Auto,
            datasets: Vec::new(),
            baseline: BaselineMode::Linear,
            baseline_fraction: 0.3,
            refine_baseline: true,
            min_energy: None,
            max_energy: None,
            focus_window: Some(DEFAULT_FOCUS_WINDOW),
            fit: FitOptions::default(),
            export_results: None,
            export_json: None,
        }
    }

    fn wide_spectrum_text() -> String {
        let spec = SynthSpec {
            params: ModelParameters {
                band_gap: 1.60,
                binding_energy: 0.025,
                broadening: 0.006,
                amplitude: 0.02,
                continuum_scale: 0.1,
                baseline_offset: 0.0,
            },
            kernel: KernelKind::Gaussian,
            e_min: 1.40,
            e_max: 1.80,
            step: 0.002,
            noise: 0.0,
            seed: 1,
        };
        let s = generate_spectrum(&spec).unwrap();
        // Add a sloped background so the baseline stages have work to do.
        let background: Vec<f64> = s.energies.iter().map(|e| 0.05 + 0.1 * (e - 1.40)).collect();
        let shifted = crate::data::SyntheticSpectrum {
            energies: s.energies.clone(),
            intensities: s.intensities.iter().zip(background).map(|(y, b)| y + b).collect(),
        };
        format_spectrum(&shifted, false)
    }

    #[test]
    fn pipeline_recovers_binding_energy_with_background() {
        let dir = std::env::temp_dir().join(format!("elliott-pipeline-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("spectrum.txt");
        std::fs::write(&path, wide_spectrum_text()).unwrap();

        let mut cfg = config(path);
        cfg.focus_window = Some(0.1);
        let run = run_fit(&cfg).unwrap();
        assert_eq!(run.fits.len(), 1);
        let fit = &run.fits[0];
        assert!(fit.focused);
        assert!(
            (fit.result.binding_energy() - 0.025).abs() < 0.002,
            "Eb={}",
            fit.result.binding_energy()
        );
        assert_eq!(fit.result.predicted_curve.len(), fit.prepared.spectrum.len());
        assert_eq!(fit.prepared.raw_intensities.len(), fit.prepared.spectrum.len());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn missing_file_is_a_usage_error() {
        let err = run_fit(&config("/nonexistent/elliott/spectrum.txt".into())).unwrap_err();
        assert_eq!(err.exit_code(), crate::error::EXIT_USAGE);
    }

    #[test]
    fn invalid_only_dataset_maps_to_exit_code_3() {
        let raw = RawSpectrum {
            x: vec![1.0, 1.1, 1.2],
            y: vec![0.0, 1.0, 0.0],
            unit: XUnit::ElectronVolt,
        };
        let err = fit_dataset("short", &raw, &config("unused".into())).unwrap_err();
        assert_eq!(err.exit_code(), crate::error::EXIT_INVALID_SPECTRUM);
    }
}
