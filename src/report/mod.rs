//! Reporting utilities: fit result assembly, goodness of fit, Urbach tail.

pub mod format;

pub use format::*;

use crate::domain::{
    BroadeningKernel, FitOutcome, FitResult, KernelKind, ModelParameters, PARAM_COUNT, ParameterErrors,
    UrbachTail,
};
use crate::fit::fitter::{FitProblem, StartFit, standard_errors};
use crate::math::linear_fit;
use crate::models::predict_components;

/// Samples used for the Urbach fit, counted down from the cutoff.
pub const URBACH_MAX_POINTS: usize = 8;

/// Normalized intensities below this are too close to zero for `ln`.
const URBACH_MIN_INTENSITY: f64 = 1e-3;

/// Package the selected start into a `FitResult`.
pub fn build_fit_result(problem: &FitProblem<'_>, best: &StartFit) -> FitResult {
    let params = best.parameters;
    let energies = problem.energies;
    let y = problem.intensities;

    let parts = predict_components(&params, energies, problem.kernel);
    let residuals: Vec<f64> = y.iter().zip(parts.total.iter()).map(|(o, f)| o - f).collect();
    let rss: f64 = residuals
        .iter()
        .zip(problem.weights.iter())
        .map(|(r, w)| w * r * r)
        .sum();

    let parameter_uncertainties = uncertainties(problem, &params, rss);
    let outcome = FitOutcome::from_parts(best.status, parameter_uncertainties.is_some());

    let curve = |values: &[f64]| -> Vec<(f64, f64)> {
        energies.iter().copied().zip(values.iter().copied()).collect()
    };

    FitResult {
        parameters: params,
        parameter_uncertainties,
        residual_sum_of_squares: rss,
        r_squared: r_squared(y, problem.weights, rss),
        predicted_curve: curve(&parts.total),
        exciton_curve: curve(&parts.exciton),
        continuum_curve: curve(&parts.continuum),
        residuals,
        convergence_status: best.status,
        outcome,
        kernel: BroadeningKernel::new(problem.kernel, params.broadening),
        iterations: best.iterations,
        restart_index: best.start_index,
        urbach: urbach_tail(energies, y, &params, problem.kernel),
    }
}

fn uncertainties(problem: &FitProblem<'_>, params: &ModelParameters, rss: f64) -> Option<ParameterErrors> {
    let free = problem.free_indices();
    let p = params.to_array();
    let r = problem.residuals(&p);
    let jac = problem.jacobian(&p, &r, &free);
    let errors = standard_errors(&jac, rss)?;

    let mut all = [None; PARAM_COUNT];
    for (c, &j) in free.iter().enumerate() {
        all[j] = Some(errors[c]);
    }
    Some(ParameterErrors::from_slice(&all))
}

/// `1 − RSS/TSS` with the weighted total sum of squares; 0 when TSS is 0.
pub fn r_squared(y: &[f64], weights: &[f64], rss: f64) -> f64 {
    let w_sum: f64 = weights.iter().sum();
    if !(w_sum > 0.0) {
        return 0.0;
    }
    let mean = y.iter().zip(weights.iter()).map(|(v, w)| v * w).sum::<f64>() / w_sum;
    let tss: f64 = y
        .iter()
        .zip(weights.iter())
        .map(|(v, w)| w * (v - mean).powi(2))
        .sum();
    if tss > 0.0 { 1.0 - rss / tss } else { 0.0 }
}

/// Log-linear fit of the absorption tail below the first exciton line.
///
/// Uses up to `URBACH_MAX_POINTS` samples just below `E₁ − 2·HWHM` whose
/// intensity is clearly positive. `None` when fewer than 3 qualify or the
/// tail does not rise towards the gap.
pub fn urbach_tail(
    energies: &[f64],
    intensities: &[f64],
    params: &ModelParameters,
    kind: KernelKind,
) -> Option<UrbachTail> {
    let hwhm = BroadeningKernel::new(kind, params.broadening).hwhm();
    let cutoff = params.first_exciton_energy() - 2.0 * hwhm;
    let end = energies.partition_point(|&e| e < cutoff);
    let start = end.saturating_sub(URBACH_MAX_POINTS);

    let (x, ln_y): (Vec<f64>, Vec<f64>) = (start..end)
        .filter(|&i| intensities[i] > URBACH_MIN_INTENSITY)
        .map(|i| (energies[i], intensities[i].ln()))
        .unzip();
    if x.len() < 3 {
        return None;
    }

    let (slope, intercept) = linear_fit(&x, &ln_y)?;
    if !(slope.is_finite() && slope > 0.0) {
        return None;
    }
    Some(UrbachTail {
        slope,
        intercept,
        energy: 1.0 / slope,
        n_points: x.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn r_squared_is_one_for_exact_fit_and_zero_for_flat_data() {
        let y = [1.0, 2.0, 3.0, 4.0];
        let w = [1.0; 4];
        assert!((r_squared(&y, &w, 0.0) - 1.0).abs() < 1e-15);
        // TSS = 5
        assert!((r_squared(&y, &w, 1.0) - 0.8).abs() < 1e-12);
        assert_eq!(r_squared(&[2.0; 4], &w, 0.0), 0.0);
    }

    #[test]
    fn urbach_energy_of_exponential_tail() {
        let eu = 0.015;
        let e: Vec<f64> = (0..100).map(|i| 1.40 + i as f64 * 0.002).collect();
        let y: Vec<f64> = e.iter().map(|&v| ((v - 1.53) / eu).exp().min(1.0)).collect();
        let params = ModelParameters {
            band_gap: 1.55,
            binding_energy: 0.02,
            broadening: 0.002,
            amplitude: 0.01,
            continuum_scale: 0.1,
            baseline_offset: 0.0,
        };
        let tail = urbach_tail(&e, &y, &params, KernelKind::Gaussian).unwrap();
        assert_eq!(tail.n_points, URBACH_MAX_POINTS);
        assert!((tail.energy - eu).abs() < 1e-9, "E_U={}", tail.energy);
    }

    #[test]
    fn no_urbach_tail_without_samples_below_the_line() {
        let e: Vec<f64> = (0..20).map(|i| 1.60 + i as f64 * 0.01).collect();
        let y = vec![0.5; 20];
        let params = ModelParameters {
            band_gap: 1.55,
            binding_energy: 0.02,
            broadening: 0.003,
            amplitude: 0.01,
            continuum_scale: 0.1,
            baseline_offset: 0.0,
        };
        assert!(urbach_tail(&e, &y, &params, KernelKind::Gaussian).is_none());
    }

    #[test]
    fn converged_fit_without_spare_samples_has_no_uncertainty() {
        use crate::domain::ConvergenceStatus;
        use crate::fit::starts::ParameterBounds;

        let params = ModelParameters {
            band_gap: 1.55,
            binding_energy: 0.02,
            broadening: 0.003,
            amplitude: 0.01,
            continuum_scale: 0.1,
            baseline_offset: 0.0,
        };
        // Five samples against six free parameters: n <= p.
        let e: Vec<f64> = (0..5).map(|i| 1.52 + i as f64 * 0.01).collect();
        let y = crate::models::predict(&params, &e, KernelKind::Gaussian);
        let w = vec![1.0; e.len()];
        let problem = FitProblem {
            energies: &e,
            intensities: &y,
            weights: &w,
            kernel: KernelKind::Gaussian,
            bounds: ParameterBounds {
                lower: [1.4, 1e-9, 1e-4, 0.0, 0.0, -1.0],
                upper: [1.7, 0.1, 0.05, 1.0, 1.0, 1.0],
            },
            free: [true; PARAM_COUNT],
        };
        let best = StartFit {
            start_index: 1,
            parameters: params,
            rss: 0.0,
            status: ConvergenceStatus::Converged,
            iterations: 4,
        };

        let result = build_fit_result(&problem, &best);
        assert_eq!(result.outcome, FitOutcome::ConvergedWithoutUncertainty);
        assert!(result.parameter_uncertainties.is_none());
        assert_eq!(result.restart_index, 1);
        assert_eq!(result.predicted_curve.len(), 5);
        assert!(result.residual_sum_of_squares < 1e-20);
    }
}
