//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - parses CLI arguments and sets up logging
//! - runs the fit pipeline and prints the report
//! - writes optional exports
//! - generates synthetic spectra

use clap::Parser;

use crate::cli::{Cli, Command, FitArgs, SynthArgs};
use crate::data::{SynthSpec, generate_spectrum, write_spectrum};
use crate::domain::{FitConfig, FitOptions, ModelParameters};
use crate::error::{AppError, EXIT_USAGE};

pub mod pipeline;

/// Entry point for the `elliott` binary.
pub fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Command::Fit(args) => handle_fit(args),
        Command::Synth(args) => handle_synth(args),
    }
}

/// `RUST_LOG` takes precedence; otherwise `-v` raises the default `warn` level.
fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    // A second init (e.g. from tests) is harmless.
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default))
        .format_timestamp(None)
        .try_init()
        .ok();
}

fn handle_fit(args: FitArgs) -> Result<(), AppError> {
    let config = fit_config_from_args(&args)?;
    let run = pipeline::run_fit(&config)?;

    println!("{}", crate::report::format_run_summary(&run, &config));

    // Optional exports.
    if let Some(path) = &config.export_results {
        crate::io::export::write_results_csv(path, &run.fits)?;
        log::info!("Wrote {}", path.display());
    }
    if let Some(path) = &config.export_json {
        crate::io::json::write_results_json(path, &config.input_path, &run.fits)?;
        log::info!("Wrote {}", path.display());
    }

    Ok(())
}

fn handle_synth(args: SynthArgs) -> Result<(), AppError> {
    let spec = SynthSpec {
        params: ModelParameters {
            band_gap: args.eg,
            binding_energy: args.eb,
            broadening: args.gamma,
            amplitude: args.amplitude,
            continuum_scale: args.continuum,
            baseline_offset: args.offset,
        },
        kernel: args.kernel,
        e_min: args.e_min,
        e_max: args.e_max,
        step: args.step,
        noise: args.noise,
        seed: args.seed,
    };
    let spectrum = generate_spectrum(&spec)?;
    write_spectrum(&args.output, &spectrum, args.nm)?;
    println!("Wrote {} samples to {}", spectrum.energies.len(), args.output.display());
    Ok(())
}

pub fn fit_config_from_args(args: &FitArgs) -> Result<FitConfig, AppError> {
    if !(args.baseline_fraction > 0.0 && args.baseline_fraction <= 1.0) {
        return Err(AppError::new(EXIT_USAGE, "--baseline-fraction must be in (0, 1]."));
    }
    if !args.no_focus && !(args.focus.is_finite() && args.focus > 0.0) {
        return Err(AppError::new(EXIT_USAGE, "--focus must be > 0 (use --no-focus to disable)."));
    }
    if let (Some(lo), Some(hi)) = (args.min_energy, args.max_energy) {
        if lo >= hi {
            return Err(AppError::new(EXIT_USAGE, "--min-energy must be below --max-energy."));
        }
    }

    Ok(FitConfig {
        input_path: args.input.clone(),
        unit: args.unit,
        datasets: args.datasets.clone(),
        baseline: args.baseline,
        baseline_fraction: args.baseline_fraction,
        refine_baseline: !args.no_refine_baseline,
        min_energy: args.min_energy,
        max_energy: args.max_energy,
        focus_window: (!args.no_focus).then_some(args.focus),
        fit: FitOptions {
            kernel: args.kernel,
            kernel_width: args.kernel_width,
            restarts: args.restarts,
            max_iterations: args.max_iterations,
            bounds_margin: args.bounds_margin,
            tolerance: args.tolerance,
            initial_guess: None,
        },
        export_results: args.export.clone(),
        export_json: args.export_json.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fit_args(extra: &[&str]) -> FitArgs {
        let mut argv = vec!["elliott", "fit", "spectrum.txt"];
        argv.extend_from_slice(extra);
        match Cli::parse_from(argv).command {
            Command::Fit(args) => args,
            Command::Synth(_) => unreachable!(),
        }
    }

    #[test]
    fn config_maps_flags() {
        let cfg = fit_config_from_args(&fit_args(&[
            "--kernel",
            "voigt",
            "--kernel-width",
            "0.004",
            "--no-focus",
            "--no-refine-baseline",
        ]))
        .unwrap();
        assert_eq!(cfg.fit.kernel, crate::domain::KernelKind::Voigt);
        assert_eq!(cfg.fit.kernel_width, Some(0.004));
        assert_eq!(cfg.focus_window, None);
        assert!(!cfg.refine_baseline);
    }

    #[test]
    fn default_focus_window_is_set() {
        let cfg = fit_config_from_args(&fit_args(&[])).unwrap();
        assert_eq!(cfg.focus_window, Some(pipeline::DEFAULT_FOCUS_WINDOW));
        assert!(cfg.refine_baseline);
    }

    #[test]
    fn logging_can_be_initialised_twice() {
        init_logging(2);
        init_logging(0);
        log::debug!("still logging after a repeated init");
    }

    #[test]
    fn rejects_inverted_energy_window() {
        let err = fit_config_from_args(&fit_args(&["--min-energy", "1.7", "--max-energy", "1.5"])).unwrap_err();
        assert_eq!(err.exit_code(), EXIT_USAGE);
    }
}
