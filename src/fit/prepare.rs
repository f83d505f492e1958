//! Spectrum loading and normalization.
//!
//! Turns raw `(x, y)` columns into a validated `Spectrum` ready to fit:
//!
//! - resolve the x unit and convert wavelengths to photon energy
//! - order the axis by increasing energy
//! - optionally crop to an energy window
//! - subtract a background fitted on the low-energy tail
//! - scale so the peak equals 1
//!
//! The baseline and scale are kept alongside the spectrum so exports can show
//! raw, baseline and normalized data side by side.

use serde::{Deserialize, Serialize};

use crate::domain::{BaselineMode, MIN_SAMPLES, Spectrum, XUnit};
use crate::error::InvalidSpectrumError;
use crate::math::polyfit;

/// `hc` in eV·nm: `E(eV) = NM_EV / λ(nm)`.
pub const NM_EV: f64 = 1239.84193;

/// `XUnit::Auto` reads the axis as nanometres when its mean exceeds this.
pub const AUTO_NM_THRESHOLD: f64 = 50.0;

/// Default share of the lowest-energy samples used for the baseline.
pub const DEFAULT_BASELINE_FRACTION: f64 = 0.3;

/// Peaks below this fraction of the raw span are rounding residue, not signal.
const SIGNAL_FLOOR: f64 = 1e-9;

/// Smallest baseline window taken from the low-energy tail.
const MIN_BASELINE_POINTS: usize = 3;

/// A `Below` window with fewer samples falls back to the default fraction.
const MIN_BELOW_POINTS: usize = 5;

/// Raw columns as read from a file.
#[derive(Debug, Clone, PartialEq)]
pub struct RawSpectrum {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub unit: XUnit,
}

/// Samples used to fit the baseline.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum BaselineWindow {
    /// Lowest-energy fraction of the samples.
    LowestFraction(f64),
    /// All samples strictly below this energy (eV).
    Below(f64),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PrepareOptions {
    pub baseline: BaselineMode,
    pub window: BaselineWindow,
    pub min_energy: Option<f64>,
    pub max_energy: Option<f64>,
}

impl Default for PrepareOptions {
    fn default() -> Self {
        Self {
            baseline: BaselineMode::Linear,
            window: BaselineWindow::LowestFraction(DEFAULT_BASELINE_FRACTION),
            min_energy: None,
            max_energy: None,
        }
    }
}

/// Normalized spectrum plus what was removed to get there.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedSpectrum {
    /// Baseline-subtracted, peak-normalized spectrum.
    pub spectrum: Spectrum,
    /// Raw intensities on the same (energy-ordered, cropped) grid.
    pub raw_intensities: Vec<f64>,
    /// Baseline evaluated on the grid, in raw units.
    pub baseline: Vec<f64>,
    /// Divisor applied after baseline removal (the raw peak height).
    pub scale: f64,
    /// Unit the x axis was read in (never `Auto`).
    pub source_unit: XUnit,
    /// Number of samples the baseline was fitted on.
    pub baseline_points: usize,
}

impl PreparedSpectrum {
    /// Map a normalized intensity back to raw units.
    pub fn denormalize(&self, index: usize, value: f64) -> f64 {
        value * self.scale + self.baseline[index]
    }

    /// Restrict every per-sample vector to `min <= E <= max`.
    pub fn window(&self, min: f64, max: f64) -> Result<Self, InvalidSpectrumError> {
        let spectrum = self.spectrum.window(min, max)?;
        let e = self.spectrum.energies();
        let start = e.partition_point(|&v| v < min);
        let end = start + spectrum.len();
        Ok(Self {
            spectrum,
            raw_intensities: self.raw_intensities[start..end].to_vec(),
            baseline: self.baseline[start..end].to_vec(),
            scale: self.scale,
            source_unit: self.source_unit,
            baseline_points: self.baseline_points,
        })
    }
}

/// Resolve `Auto` to a concrete unit from the axis values.
pub fn resolve_unit(unit: XUnit, x: &[f64]) -> XUnit {
    match unit {
        XUnit::Auto => {
            if x.is_empty() {
                return XUnit::ElectronVolt;
            }
            let mean = x.iter().sum::<f64>() / x.len() as f64;
            if mean > AUTO_NM_THRESHOLD {
                XUnit::Nanometer
            } else {
                XUnit::ElectronVolt
            }
        }
        other => other,
    }
}

/// Validate, convert, crop, subtract the baseline and normalize.
pub fn prepare_spectrum(
    raw: &RawSpectrum,
    opts: &PrepareOptions,
) -> Result<PreparedSpectrum, InvalidSpectrumError> {
    if raw.x.len() != raw.y.len() {
        return Err(InvalidSpectrumError::LengthMismatch {
            x_len: raw.x.len(),
            y_len: raw.y.len(),
        });
    }
    if raw.x.len() < MIN_SAMPLES {
        return Err(InvalidSpectrumError::TooFewSamples {
            found: raw.x.len(),
            min: MIN_SAMPLES,
        });
    }
    if let Some(index) = (0..raw.x.len()).find(|&i| !(raw.x[i].is_finite() && raw.y[i].is_finite())) {
        return Err(InvalidSpectrumError::NonFinite { index });
    }

    let source_unit = resolve_unit(raw.unit, &raw.x);
    let mut energies = match source_unit {
        XUnit::Nanometer => {
            if let Some(index) = raw.x.iter().position(|&v| v <= 0.0) {
                return Err(InvalidSpectrumError::NonPositiveWavelength {
                    index,
                    value: raw.x[index],
                });
            }
            raw.x.iter().map(|&nm| NM_EV / nm).collect::<Vec<_>>()
        }
        _ => raw.x.clone(),
    };
    let mut intensities = raw.y.clone();
    order_by_energy(&mut energies, &mut intensities)?;

    let (energies, intensities) = crop(energies, intensities, opts.min_energy, opts.max_energy)?;
    if intensities.iter().all(|&y| y == 0.0) {
        return Err(InvalidSpectrumError::AllZeroIntensity);
    }

    let (baseline, baseline_points) = fit_baseline(&energies, &intensities, opts.baseline, opts.window);
    let corrected: Vec<f64> = intensities
        .iter()
        .zip(baseline.iter())
        .map(|(y, b)| y - b)
        .collect();
    let peak = corrected.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let raw_span = intensities.iter().fold(0.0_f64, |m, y| m.max(y.abs()));
    if !(peak.is_finite() && peak > SIGNAL_FLOOR * raw_span) {
        return Err(InvalidSpectrumError::NoSignal { peak });
    }
    let normalized: Vec<f64> = corrected.iter().map(|v| v / peak).collect();

    log::debug!(
        "Prepared spectrum: {} samples, {:.4}–{:.4} eV, unit={}, baseline={:?} ({} pts), scale={:.4e}",
        energies.len(),
        energies[0],
        energies[energies.len() - 1],
        source_unit.label(),
        opts.baseline,
        baseline_points,
        peak
    );

    let spectrum = Spectrum::new(energies, normalized)?;
    Ok(PreparedSpectrum {
        spectrum,
        raw_intensities: intensities,
        baseline,
        scale: peak,
        source_unit,
        baseline_points,
    })
}

/// Make the axis strictly increasing. A strictly decreasing axis (typical
/// after nm → eV conversion) is reversed; anything else is rejected.
fn order_by_energy(energies: &mut [f64], intensities: &mut [f64]) -> Result<(), InvalidSpectrumError> {
    let increasing = energies.windows(2).all(|w| w[1] > w[0]);
    if increasing {
        return Ok(());
    }
    let decreasing = energies.windows(2).all(|w| w[1] < w[0]);
    if decreasing {
        energies.reverse();
        intensities.reverse();
        return Ok(());
    }
    // Report the first sample breaking the majority direction.
    let rising = energies.windows(2).filter(|w| w[1] > w[0]).count();
    let falling = energies.len() - 1 - rising;
    let index = if rising >= falling {
        energies.windows(2).position(|w| w[1] <= w[0])
    } else {
        energies.windows(2).position(|w| w[1] >= w[0])
    };
    Err(InvalidSpectrumError::NonMonotonic {
        index: index.map_or(0, |i| i + 1),
    })
}

fn crop(
    energies: Vec<f64>,
    intensities: Vec<f64>,
    min: Option<f64>,
    max: Option<f64>,
) -> Result<(Vec<f64>, Vec<f64>), InvalidSpectrumError> {
    if min.is_none() && max.is_none() {
        return Ok((energies, intensities));
    }
    let lo = min.unwrap_or(f64::NEG_INFINITY);
    let hi = max.unwrap_or(f64::INFINITY);
    let (e, y): (Vec<f64>, Vec<f64>) = energies
        .into_iter()
        .zip(intensities)
        .filter(|(e, _)| *e >= lo && *e <= hi)
        .unzip();
    if e.len() < MIN_SAMPLES {
        return Err(InvalidSpectrumError::EmptyWindow {
            min: lo,
            max: hi,
            found: e.len(),
            required: MIN_SAMPLES,
        });
    }
    Ok((e, y))
}

/// Number of leading samples in the baseline window.
fn window_len(energies: &[f64], window: BaselineWindow) -> usize {
    let n = energies.len();
    let lowest = |f: f64| {
        let f = if f.is_finite() && f > 0.0 { f.min(1.0) } else { DEFAULT_BASELINE_FRACTION };
        ((f * n as f64).ceil() as usize).max(MIN_BASELINE_POINTS).min(n)
    };
    match window {
        BaselineWindow::LowestFraction(f) => lowest(f),
        BaselineWindow::Below(limit) => {
            let count = energies.partition_point(|&e| e < limit);
            if count < MIN_BELOW_POINTS {
                log::warn!(
                    "Only {count} samples below {limit:.4} eV; using the lowest {:.0}% for the baseline",
                    DEFAULT_BASELINE_FRACTION * 100.0
                );
                lowest(DEFAULT_BASELINE_FRACTION)
            } else {
                count
            }
        }
    }
}

/// Fit the background on the window and evaluate it on the whole grid.
///
/// Returns the baseline and the number of samples it was fitted on. An
/// underdetermined or unsolvable fit yields a zero baseline.
pub fn fit_baseline(
    energies: &[f64],
    intensities: &[f64],
    mode: BaselineMode,
    window: BaselineWindow,
) -> (Vec<f64>, usize) {
    let n = energies.len();
    let zero = vec![0.0; n];
    if mode == BaselineMode::None {
        return (zero, 0);
    }

    let m = window_len(energies, window);
    if m < mode.coefficient_count() {
        log::warn!(
            "Baseline window has {m} samples; {:?} needs {}. Skipping baseline.",
            mode,
            mode.coefficient_count()
        );
        return (zero, 0);
    }
    let (x, y) = (&energies[..m], &intensities[..m]);

    let fitted = match mode {
        BaselineMode::None => None,
        BaselineMode::Constant => polyfit(x, y, 0).map(|p| energies.iter().map(|&e| p.eval(e)).collect()),
        BaselineMode::Linear => polyfit(x, y, 1).map(|p| energies.iter().map(|&e| p.eval(e)).collect()),
        BaselineMode::Quadratic => polyfit(x, y, 2).map(|p| energies.iter().map(|&e| p.eval(e)).collect()),
        BaselineMode::Rayleigh => rayleigh_coefficient(x, y).map(|a| energies.iter().map(|&e| a * e.powi(4)).collect()),
    };

    match fitted {
        Some(baseline) => (baseline, m),
        None => {
            log::warn!("Baseline fit ({mode:?}) failed; using zero baseline");
            (zero, 0)
        }
    }
}

/// Least-squares `a` for `y ≈ a·E⁴`.
fn rayleigh_coefficient(x: &[f64], y: &[f64]) -> Option<f64> {
    let (num, den) = x.iter().zip(y.iter()).fold((0.0, 0.0), |(num, den), (&e, &v)| {
        let e4 = e.powi(4);
        (num + e4 * v, den + e4 * e4)
    });
    (den > 0.0).then(|| num / den).filter(|a| a.is_finite())
}
