//! Shared domain types.
//!
//! These types are intentionally kept lightweight and serializable so they can be:
//!
//! - used in-memory during fitting
//! - exported to JSON/CSV
//! - handed to an external API/UI layer unchanged

use std::path::PathBuf;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Unit of the x-axis of a raw spectrum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum XUnit {
    /// Infer the unit from the values.
    ///
    /// Heuristic (deterministic): if the mean x value is `> 50`, the axis is
    /// treated as wavelengths in nm, otherwise as photon energies in eV.
    Auto,
    /// Photon energy in electronvolts.
    #[value(name = "ev")]
    #[serde(rename = "ev")]
    ElectronVolt,
    /// Wavelength in nanometres.
    #[value(name = "nm")]
    #[serde(rename = "nm")]
    Nanometer,
}

impl XUnit {
    pub fn label(self) -> &'static str {
        match self {
            XUnit::Auto => "auto",
            XUnit::ElectronVolt => "eV",
            XUnit::Nanometer => "nm",
        }
    }
}

/// Shape of the broadening kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum KernelKind {
    /// Gaussian with `σ = width`.
    Gaussian,
    /// Lorentzian with `HWHM = width`.
    Lorentzian,
    /// Pseudo-Voigt mixing a Gaussian (`σ = width`) and a Lorentzian (`HWHM = width`).
    Voigt,
}

impl KernelKind {
    pub fn display_name(self) -> &'static str {
        match self {
            KernelKind::Gaussian => "Gaussian",
            KernelKind::Lorentzian => "Lorentzian",
            KernelKind::Voigt => "Voigt",
        }
    }
}

/// Broadening kernel configuration. Read-only during a fit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BroadeningKernel {
    pub kind: KernelKind,
    /// Kernel width in eV (meaning depends on `kind`).
    pub width: f64,
}

/// Background model removed from the low-energy tail before fitting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BaselineMode {
    /// No baseline removal.
    None,
    /// Constant offset (polynomial order 0).
    Constant,
    /// Straight line (polynomial order 1).
    Linear,
    /// Polynomial order 2.
    Quadratic,
    /// Rayleigh scattering background `a·E⁴`.
    Rayleigh,
}

impl BaselineMode {
    /// Number of least-squares coefficients of the baseline model.
    pub fn coefficient_count(self) -> usize {
        match self {
            BaselineMode::None => 0,
            BaselineMode::Constant => 1,
            BaselineMode::Linear => 2,
            BaselineMode::Quadratic => 3,
            BaselineMode::Rayleigh => 1,
        }
    }
}

/// Number of parameters in the Elliott model.
pub const PARAM_COUNT: usize = 6;

/// Index of each parameter in the optimizer's parameter vector.
pub const IDX_BAND_GAP: usize = 0;
pub const IDX_BINDING_ENERGY: usize = 1;
pub const IDX_BROADENING: usize = 2;
pub const IDX_AMPLITUDE: usize = 3;
pub const IDX_CONTINUUM_SCALE: usize = 4;
pub const IDX_BASELINE_OFFSET: usize = 5;

/// Parameter names in vector order.
pub const PARAM_NAMES: [&str; PARAM_COUNT] = [
    "band_gap",
    "binding_energy",
    "broadening",
    "amplitude",
    "continuum_scale",
    "baseline_offset",
];

/// Elliott model parameters (energies in eV).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelParameters {
    /// Band gap `Eg`.
    pub band_gap: f64,
    /// Exciton binding energy `Eb`.
    pub binding_energy: f64,
    /// Broadening `Γ`, used as the kernel width.
    pub broadening: f64,
    /// Discrete-line amplitude `A` (area of the 1s line).
    pub amplitude: f64,
    /// Continuum scale `C`.
    pub continuum_scale: f64,
    /// Constant offset `b`.
    pub baseline_offset: f64,
}

impl ModelParameters {
    pub fn to_array(&self) -> [f64; PARAM_COUNT] {
        [
            self.band_gap,
            self.binding_energy,
            self.broadening,
            self.amplitude,
            self.continuum_scale,
            self.baseline_offset,
        ]
    }

    pub fn from_slice(values: &[f64]) -> Self {
        Self {
            band_gap: values[IDX_BAND_GAP],
            binding_energy: values[IDX_BINDING_ENERGY],
            broadening: values[IDX_BROADENING],
            amplitude: values[IDX_AMPLITUDE],
            continuum_scale: values[IDX_CONTINUUM_SCALE],
            baseline_offset: values[IDX_BASELINE_OFFSET],
        }
    }

    /// Energy of the 1s exciton line, `Eg − Eb`.
    pub fn first_exciton_energy(&self) -> f64 {
        self.band_gap - self.binding_energy
    }

    pub fn is_finite(&self) -> bool {
        self.to_array().iter().all(|v| v.is_finite())
    }
}

/// One-sigma parameter uncertainties.
///
/// A field is `None` when that parameter was held fixed during the fit.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ParameterErrors {
    pub band_gap: Option<f64>,
    pub binding_energy: Option<f64>,
    pub broadening: Option<f64>,
    pub amplitude: Option<f64>,
    pub continuum_scale: Option<f64>,
    pub baseline_offset: Option<f64>,
}

impl ParameterErrors {
    pub fn from_slice(values: &[Option<f64>]) -> Self {
        Self {
            band_gap: values[IDX_BAND_GAP],
            binding_energy: values[IDX_BINDING_ENERGY],
            broadening: values[IDX_BROADENING],
            amplitude: values[IDX_AMPLITUDE],
            continuum_scale: values[IDX_CONTINUUM_SCALE],
            baseline_offset: values[IDX_BASELINE_OFFSET],
        }
    }

    pub fn to_array(&self) -> [Option<f64>; PARAM_COUNT] {
        [
            self.band_gap,
            self.binding_energy,
            self.broadening,
            self.amplitude,
            self.continuum_scale,
            self.baseline_offset,
        ]
    }
}

/// How the optimizer terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConvergenceStatus {
    Converged,
    MaxIterationsReached,
    NumericalFailure,
}

impl ConvergenceStatus {
    pub fn display_name(self) -> &'static str {
        match self {
            ConvergenceStatus::Converged => "converged",
            ConvergenceStatus::MaxIterationsReached => "max iterations reached",
            ConvergenceStatus::NumericalFailure => "numerical failure",
        }
    }
}

/// Combined convergence/uncertainty state of a fit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FitOutcome {
    ConvergedWithUncertainty,
    ConvergedWithoutUncertainty,
    NotConverged,
}

impl FitOutcome {
    pub fn from_parts(status: ConvergenceStatus, has_uncertainty: bool) -> Self {
        match (status, has_uncertainty) {
            (ConvergenceStatus::Converged, true) => FitOutcome::ConvergedWithUncertainty,
            (ConvergenceStatus::Converged, false) => FitOutcome::ConvergedWithoutUncertainty,
            _ => FitOutcome::NotConverged,
        }
    }
}

/// Options recognized by `fit_elliott_model`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitOptions {
    /// Kernel shape used to broaden the ideal spectrum.
    pub kernel: KernelKind,
    /// Fixed kernel width (eV). When set, `Γ` is held at this value instead of
    /// being fitted.
    pub kernel_width: Option<f64>,
    /// Number of starting points (>= 1).
    pub restarts: usize,
    /// Iteration budget per start.
    pub max_iterations: usize,
    /// Bound margin as a fraction of the observed energy range.
    pub bounds_margin: f64,
    /// Relative RSS change below which a start counts as converged.
    pub tolerance: f64,
    /// Starting point overriding the estimator's guess.
    pub initial_guess: Option<ModelParameters>,
}

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            kernel: KernelKind::Gaussian,
            kernel_width: None,
            restarts: 3,
            max_iterations: 1000,
            bounds_margin: 0.1,
            tolerance: 1e-8,
            initial_guess: None,
        }
    }
}

impl FitOptions {
    /// Return a copy with out-of-range settings replaced by usable values.
    pub fn sanitized(&self) -> Self {
        let defaults = FitOptions::default();
        let mut out = self.clone();
        if out.restarts == 0 {
            log::warn!("restarts must be >= 1; using 1");
            out.restarts = 1;
        }
        if out.max_iterations == 0 {
            log::warn!("max_iterations must be >= 1; using 1");
            out.max_iterations = 1;
        }
        if !(out.bounds_margin.is_finite() && out.bounds_margin >= 0.0) {
            log::warn!("Invalid bounds_margin {}; using {}", out.bounds_margin, defaults.bounds_margin);
            out.bounds_margin = defaults.bounds_margin;
        }
        if !(out.tolerance.is_finite() && out.tolerance > 0.0) {
            out.tolerance = defaults.tolerance;
        }
        if let Some(w) = out.kernel_width {
            if !(w.is_finite() && w > 0.0) {
                log::warn!("Ignoring non-positive kernel width {w}; broadening will be fitted");
                out.kernel_width = None;
            }
        }
        out
    }
}

/// Urbach tail estimate from the absorption tail below the first exciton line.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UrbachTail {
    /// Slope of `ln(α)` versus energy (1/eV).
    pub slope: f64,
    pub intercept: f64,
    /// Urbach energy `1/slope` (eV).
    pub energy: f64,
    /// Samples used in the log-linear fit.
    pub n_points: usize,
}

/// Output of a single fit call. Immutable once built.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FitResult {
    pub parameters: ModelParameters,
    /// `None` when the covariance could not be computed.
    pub parameter_uncertainties: Option<ParameterErrors>,
    pub residual_sum_of_squares: f64,
    pub r_squared: f64,
    /// Convolved model on the input grid, as `(energy, intensity)` pairs.
    pub predicted_curve: Vec<(f64, f64)>,
    /// Discrete exciton contribution (broadened, without offset).
    pub exciton_curve: Vec<(f64, f64)>,
    /// Continuum contribution (broadened, without offset).
    pub continuum_curve: Vec<(f64, f64)>,
    /// Observed minus predicted.
    pub residuals: Vec<f64>,
    pub convergence_status: ConvergenceStatus,
    pub outcome: FitOutcome,
    pub kernel: BroadeningKernel,
    /// Iterations used by the selected start.
    pub iterations: usize,
    /// Index of the selected start (0 = estimator guess).
    pub restart_index: usize,
    pub urbach: Option<UrbachTail>,
}

impl FitResult {
    pub fn binding_energy(&self) -> f64 {
        self.parameters.binding_energy
    }
}

/// A full run's configuration as understood by the pipeline.
///
/// This is derived from CLI flags (plus defaults).
#[derive(Debug, Clone)]
pub struct FitConfig {
    pub input_path: PathBuf,
    pub unit: XUnit,
    /// 1-based dataset (column) indices to fit; empty means all.
    pub datasets: Vec<usize>,

    pub baseline: BaselineMode,
    pub baseline_fraction: f64,
    /// Refit the baseline below `Eg − 1.5·Eb` after a preliminary fit.
    pub refine_baseline: bool,

    pub min_energy: Option<f64>,
    pub max_energy: Option<f64>,
    /// Half-width (eV) of the final window around `Eg`; `None` disables it.
    pub focus_window: Option<f64>,

    pub fit: FitOptions,

    pub export_results: Option<PathBuf>,
    pub export_json: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parameters_round_trip_through_vector_order() {
        let p = ModelParameters {
            band_gap: 1.55,
            binding_energy: 0.02,
            broadening: 0.003,
            amplitude: 0.01,
            continuum_scale: 0.1,
            baseline_offset: -0.01,
        };
        let v = p.to_array();
        assert_eq!(v[IDX_BINDING_ENERGY], 0.02);
        assert_eq!(ModelParameters::from_slice(&v), p);
        assert!((p.first_exciton_energy() - 1.53).abs() < 1e-12);
    }

    #[test]
    fn sanitized_options_repair_bad_values() {
        let opts = FitOptions {
            restarts: 0,
            max_iterations: 0,
            bounds_margin: f64::NAN,
            kernel_width: Some(-1.0),
            ..FitOptions::default()
        }
        .sanitized();
        assert_eq!(opts.restarts, 1);
        assert_eq!(opts.max_iterations, 1);
        assert_eq!(opts.bounds_margin, 0.1);
        assert!(opts.kernel_width.is_none());
    }

    #[test]
    fn outcome_is_tri_state() {
        assert_eq!(
            FitOutcome::from_parts(ConvergenceStatus::Converged, true),
            FitOutcome::ConvergedWithUncertainty
        );
        assert_eq!(
            FitOutcome::from_parts(ConvergenceStatus::Converged, false),
            FitOutcome::ConvergedWithoutUncertainty
        );
        assert_eq!(
            FitOutcome::from_parts(ConvergenceStatus::MaxIterationsReached, true),
            FitOutcome::NotConverged
        );
    }
}
