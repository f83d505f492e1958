//! Multi-start fitting and deterministic selection.
//!
//! `fit_elliott_model` is the engine's entry point:
//!
//! 1. sanitize options and derive the parameter box
//! 2. seed start 0 from the estimator (or the caller's guess)
//! 3. run Levenberg–Marquardt from every start (parallel)
//! 4. keep the best start and package it as a `FitResult`
//!
//! Selection rules:
//! 1. Converged starts beat non-converged ones
//! 2. Lower RSS wins (a non-finite RSS ranks last)
//! 3. Ties go to the earliest start index

use rayon::prelude::*;

use crate::domain::{ConvergenceStatus, FitOptions, FitResult, IDX_BROADENING, PARAM_COUNT, Spectrum};
use crate::fit::estimator::estimate_initial;
use crate::fit::fitter::{FitProblem, StartFit, levenberg_marquardt};
use crate::fit::starts::{ParameterBounds, start_points};
use crate::report::build_fit_result;

/// Fit the Elliott model to a normalized spectrum.
///
/// Never fails: numerical trouble is reported through
/// `FitResult::convergence_status`.
pub fn fit_elliott_model(spectrum: &Spectrum, options: &FitOptions) -> FitResult {
    let opts = options.sanitized();

    let mut bounds = ParameterBounds::for_spectrum(spectrum, opts.bounds_margin);
    let mut free = [true; PARAM_COUNT];
    if let Some(width) = opts.kernel_width {
        bounds.pin(IDX_BROADENING, width);
        free[IDX_BROADENING] = false;
    }

    let guess = match opts.initial_guess {
        Some(g) => bounds.clip(&g),
        None => estimate_initial(spectrum, opts.kernel, &bounds),
    };
    let starts = start_points(&guess, opts.restarts, &bounds);

    let problem = FitProblem {
        energies: spectrum.energies(),
        intensities: spectrum.intensities(),
        weights: spectrum.weights(),
        kernel: opts.kernel,
        bounds,
        free,
    };

    log::debug!(
        "Fitting {} samples with {} kernel from {} start(s)",
        spectrum.len(),
        opts.kernel.display_name(),
        starts.len()
    );

    let candidates: Vec<StartFit> = starts
        .par_iter()
        .enumerate()
        .map(|(idx, start)| levenberg_marquardt(&problem, start, idx, opts.max_iterations, opts.tolerance))
        .collect();

    let best = select_best(&candidates).cloned().unwrap_or(StartFit {
        start_index: 0,
        parameters: guess,
        rss: f64::NAN,
        status: ConvergenceStatus::NumericalFailure,
        iterations: 0,
    });

    log::debug!(
        "Selected start {} ({}): Eb={:.6} eV, RSS={:.6e}",
        best.start_index,
        best.status.display_name(),
        best.parameters.binding_energy,
        best.rss
    );
    if best.status != ConvergenceStatus::Converged {
        log::warn!("Fit did not converge: {}", best.status.display_name());
    }

    build_fit_result(&problem, &best)
}

fn rank_rss(rss: f64) -> f64 {
    if rss.is_nan() { f64::INFINITY } else { rss }
}

/// Pick the best candidate; `None` only for an empty slice.
pub fn select_best(candidates: &[StartFit]) -> Option<&StartFit> {
    let mut iter = candidates.iter();
    let mut best = iter.next()?;
    for c in iter {
        let c_conv = c.status == ConvergenceStatus::Converged;
        let b_conv = best.status == ConvergenceStatus::Converged;
        let better = if c_conv != b_conv {
            c_conv
        } else {
            let (cr, br) = (rank_rss(c.rss), rank_rss(best.rss));
            cr < br || (cr == br && c.start_index < best.start_index)
        };
        if better {
            best = c;
        }
    }
    Some(best)
}
