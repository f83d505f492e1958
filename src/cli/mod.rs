//! Command-line parsing for the Elliott exciton fitter.
//!
//! The goal of this module is to keep **argument parsing** and **command dispatch**
//! separate from the modeling/math code.

use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};

use crate::app::pipeline::DEFAULT_FOCUS_WINDOW;
use crate::domain::{BaselineMode, KernelKind, XUnit};
use crate::fit::prepare::DEFAULT_BASELINE_FRACTION;

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(
    name = "elliott",
    version,
    about = "Exciton binding energies from absorption spectra (Elliott model)"
)]
pub struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace). `RUST_LOG` wins.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fit the Elliott model to every dataset in a spectrum file.
    Fit(FitArgs),
    /// Write a synthetic Elliott spectrum (for demos and sanity checks).
    Synth(SynthArgs),
}

/// Options for fitting.
#[derive(Debug, Parser, Clone)]
pub struct FitArgs {
    /// Spectrum file: first column x (eV or nm), further columns intensities.
    #[arg(value_name = "FILE")]
    pub input: PathBuf,

    /// Unit of the first column.
    #[arg(long, value_enum, default_value_t = XUnit::Auto)]
    pub unit: XUnit,

    /// 1-based dataset columns to fit (comma-separated); default all.
    #[arg(long, value_delimiter = ',')]
    pub datasets: Vec<usize>,

    /// Broadening kernel shape.
    #[arg(long, value_enum, default_value_t = KernelKind::Gaussian)]
    pub kernel: KernelKind,

    /// Fix the kernel width (eV) instead of fitting it.
    #[arg(long)]
    pub kernel_width: Option<f64>,

    /// Number of starting points.
    #[arg(long, default_value_t = 3)]
    pub restarts: usize,

    /// Iteration budget per start.
    #[arg(long, default_value_t = 1000)]
    pub max_iterations: usize,

    /// Bound margin as a fraction of the energy range.
    #[arg(long, default_value_t = 0.1)]
    pub bounds_margin: f64,

    /// Relative RSS change treated as converged.
    #[arg(long, default_value_t = 1e-8)]
    pub tolerance: f64,

    /// Background removed before fitting.
    #[arg(long, value_enum, default_value_t = BaselineMode::Linear)]
    pub baseline: BaselineMode,

    /// Fraction of the lowest-energy samples used for the initial baseline.
    #[arg(long, default_value_t = DEFAULT_BASELINE_FRACTION)]
    pub baseline_fraction: f64,

    /// Keep the initial baseline (skip the refit below the exciton lines).
    #[arg(long)]
    pub no_refine_baseline: bool,

    /// Half-width (eV) of the final fit window around the band gap.
    #[arg(long, default_value_t = DEFAULT_FOCUS_WINDOW, conflicts_with = "no_focus")]
    pub focus: f64,

    /// Fit the full (cropped) range only.
    #[arg(long)]
    pub no_focus: bool,

    /// Drop samples below this energy (eV).
    #[arg(long)]
    pub min_energy: Option<f64>,

    /// Drop samples above this energy (eV).
    #[arg(long)]
    pub max_energy: Option<f64>,

    /// Export parameters and curves to CSV.
    #[arg(long)]
    pub export: Option<PathBuf>,

    /// Export all fit results to JSON.
    #[arg(long = "export-json")]
    pub export_json: Option<PathBuf>,
}

/// Options for generating a synthetic spectrum.
#[derive(Debug, Parser, Clone)]
pub struct SynthArgs {
    /// Output file.
    #[arg(value_name = "OUT")]
    pub output: PathBuf,

    /// Band gap (eV).
    #[arg(long, default_value_t = 1.55)]
    pub eg: f64,

    /// Exciton binding energy (eV).
    #[arg(long, default_value_t = 0.02)]
    pub eb: f64,

    /// Broadening / kernel width (eV).
    #[arg(long, default_value_t = 0.003)]
    pub gamma: f64,

    /// Area of the 1s line.
    #[arg(long, default_value_t = 0.01)]
    pub amplitude: f64,

    /// Continuum scale.
    #[arg(long, default_value_t = 0.1)]
    pub continuum: f64,

    /// Constant offset.
    #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
    pub offset: f64,

    #[arg(long, value_enum, default_value_t = KernelKind::Gaussian)]
    pub kernel: KernelKind,

    #[arg(long, default_value_t = 1.50)]
    pub e_min: f64,

    #[arg(long, default_value_t = 1.60)]
    pub e_max: f64,

    /// Grid step (eV).
    #[arg(long, default_value_t = 0.001)]
    pub step: f64,

    /// Standard deviation of additive Gaussian noise.
    #[arg(long, default_value_t = 0.0)]
    pub noise: f64,

    /// Random seed for the noise.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Write wavelengths (nm) instead of energies.
    #[arg(long)]
    pub nm: bool,
}
