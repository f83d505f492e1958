//! Bounded Levenberg–Marquardt for a single start point.
//!
//! Given:
//! - energies `E_i`, normalized intensities `y_i`, weights `w_i`
//! - a start point inside the parameter box
//!
//! we minimize
//!
//! ```text
//! RSS(p) = Σ w_i (y_i − f(E_i; p))²
//! ```
//!
//! where `f` is the broadened Elliott model. Each iteration:
//!
//! - builds a forward-difference Jacobian of the free parameters
//! - solves `(JᵀJ + λ·D) δ = Jᵀr` with `D` the (floored) diagonal of `JᵀJ`
//!   (Cholesky, SVD fallback)
//! - projects `p + δ` onto the box and accepts it if RSS decreases
//!
//! Parameters sitting on a bound whose gradient points outward are held for
//! that iteration, so the projected step stays a descent step.
//!
//! Numerical trouble never escapes as an error: the best parameters seen so
//! far are returned with a `ConvergenceStatus`.

use nalgebra::{DMatrix, DVector};

use crate::domain::{ConvergenceStatus, KernelKind, ModelParameters, PARAM_COUNT};
use crate::fit::starts::ParameterBounds;
use crate::models::predict;

/// Relative finite-difference step for the Jacobian.
const FD_STEP: f64 = 1e-7;

/// Relative parameter step below which the iteration has stalled at a minimum.
const PARAM_STEP_TOL: f64 = 1e-12;

/// Floor of the scaling diagonal relative to its largest entry.
const DIAG_FLOOR: f64 = 1e-12;

const LAMBDA_INIT: f64 = 1e-3;
const LAMBDA_MIN: f64 = 1e-15;
const LAMBDA_MAX: f64 = 1e16;

/// Smallest singular value ratio for which a covariance is reported.
pub const COND_TOL: f64 = 1e-12;

/// Weighted least-squares problem over a fixed grid.
#[derive(Debug, Clone)]
pub struct FitProblem<'a> {
    pub energies: &'a [f64],
    pub intensities: &'a [f64],
    pub weights: &'a [f64],
    pub kernel: KernelKind,
    pub bounds: ParameterBounds,
    /// Which parameters the optimizer may move.
    pub free: [bool; PARAM_COUNT],
}

/// Outcome of one Levenberg–Marquardt run.
#[derive(Debug, Clone, PartialEq)]
pub struct StartFit {
    pub start_index: usize,
    pub parameters: ModelParameters,
    pub rss: f64,
    pub status: ConvergenceStatus,
    pub iterations: usize,
}

impl FitProblem<'_> {
    pub fn free_indices(&self) -> Vec<usize> {
        (0..PARAM_COUNT).filter(|&j| self.free[j]).collect()
    }

    /// Weighted residuals `√w_i (y_i − f_i)`.
    pub fn residuals(&self, p: &[f64]) -> Vec<f64> {
        let params = ModelParameters::from_slice(p);
        let model = predict(&params, self.energies, self.kernel);
        self.intensities
            .iter()
            .zip(model.iter())
            .zip(self.weights.iter())
            .map(|((y, f), w)| w.sqrt() * (y - f))
            .collect()
    }

    /// Forward-difference Jacobian `∂(√w f)/∂p_j` over the given columns.
    ///
    /// `residuals` must be the residuals at `p`. Steps that would leave the box
    /// are taken backwards.
    pub fn jacobian(&self, p: &[f64], residuals: &[f64], columns: &[usize]) -> DMatrix<f64> {
        let n = residuals.len();
        let mut jac = DMatrix::<f64>::zeros(n, columns.len());
        let mut shifted = p.to_vec();

        for (c, &j) in columns.iter().enumerate() {
            let mut h = FD_STEP * p[j].abs().max(self.param_scale(j));
            if p[j] + h > self.bounds.upper[j] {
                h = -h;
            }
            shifted[j] = p[j] + h;
            let r_h = self.residuals(&shifted);
            shifted[j] = p[j];
            // r = √w (y − f), so ∂(√w f) = −∂r.
            for i in 0..n {
                jac[(i, c)] = -(r_h[i] - residuals[i]) / h;
            }
        }
        jac
    }

    /// Typical magnitude used when a parameter is near zero.
    fn param_scale(&self, j: usize) -> f64 {
        let width = self.bounds.upper[j] - self.bounds.lower[j];
        (1e-3 * width).max(1e-9)
    }
}

fn sum_sq(v: &[f64]) -> f64 {
    v.iter().map(|r| r * r).sum()
}

/// Run Levenberg–Marquardt from `start`.
pub fn levenberg_marquardt(
    problem: &FitProblem<'_>,
    start: &ModelParameters,
    start_index: usize,
    max_iterations: usize,
    tolerance: f64,
) -> StartFit {
    let mut p = start.to_array();
    problem.bounds.clip_slice(&mut p);

    let mut r = problem.residuals(&p);
    let mut rss = sum_sq(&r);
    if !rss.is_finite() {
        log::debug!("start {start_index}: non-finite residuals at the start point");
        return StartFit {
            start_index,
            parameters: ModelParameters::from_slice(&p),
            rss: f64::NAN,
            status: ConvergenceStatus::NumericalFailure,
            iterations: 0,
        };
    }

    let y_norm: f64 = problem
        .intensities
        .iter()
        .zip(problem.weights.iter())
        .map(|(y, w)| w * y * y)
        .sum();
    let rss_floor = 1e-24 * y_norm.max(f64::MIN_POSITIVE);

    let free = problem.free_indices();
    let mut lambda = LAMBDA_INIT;
    let mut status = ConvergenceStatus::MaxIterationsReached;
    let mut iterations = 0;

    'outer: for iter in 1..=max_iterations {
        iterations = iter;
        if rss <= rss_floor {
            status = ConvergenceStatus::Converged;
            break;
        }

        let jac = problem.jacobian(&p, &r, &free);
        if jac.iter().any(|v| !v.is_finite()) {
            status = ConvergenceStatus::NumericalFailure;
            break;
        }
        let rv = DVector::from_column_slice(&r);
        let jtj_full = jac.tr_mul(&jac);
        let g_full = jac.tr_mul(&rv);

        // Hold parameters pinned against a bound by the gradient.
        let active: Vec<usize> = (0..free.len())
            .filter(|&c| {
                let j = free[c];
                let at_lower = p[j] <= problem.bounds.lower[j];
                let at_upper = p[j] >= problem.bounds.upper[j];
                !((at_lower && g_full[c] < 0.0) || (at_upper && g_full[c] > 0.0))
            })
            .collect();
        if active.is_empty() {
            status = ConvergenceStatus::Converged;
            break;
        }
        let k = active.len();
        let jtj = DMatrix::from_fn(k, k, |a, b| jtj_full[(active[a], active[b])]);
        let g = DVector::from_fn(k, |a, _| g_full[active[a]]);

        let max_diag = (0..k).map(|a| jtj[(a, a)]).fold(0.0_f64, f64::max);
        if !(max_diag > 0.0) {
            // The model does not respond to any free parameter.
            status = ConvergenceStatus::Converged;
            break;
        }
        let diag: Vec<f64> = (0..k).map(|a| jtj[(a, a)].max(DIAG_FLOOR * max_diag)).collect();

        let mut last_trial_finite = true;
        loop {
            let mut damped = jtj.clone();
            for (a, d) in diag.iter().enumerate() {
                damped[(a, a)] += lambda * d;
            }

            let Some(delta) = solve_damped(damped, &g) else {
                lambda *= 10.0;
                if lambda > LAMBDA_MAX {
                    status = ConvergenceStatus::NumericalFailure;
                    break 'outer;
                }
                continue;
            };

            let mut trial = p;
            for (a, &c) in active.iter().enumerate() {
                trial[free[c]] += delta[a];
            }
            problem.bounds.clip_slice(&mut trial);

            let step: Vec<f64> = active.iter().map(|&c| trial[free[c]] - p[free[c]]).collect();
            let rel_step = active
                .iter()
                .zip(step.iter())
                .map(|(&c, s)| s.abs() / (p[free[c]].abs() + problem.param_scale(free[c])))
                .fold(0.0_f64, f64::max);
            if rel_step <= PARAM_STEP_TOL {
                status = ConvergenceStatus::Converged;
                break 'outer;
            }

            let r_trial = problem.residuals(&trial);
            let rss_trial = sum_sq(&r_trial);
            last_trial_finite = rss_trial.is_finite();
            if last_trial_finite && rss_trial < rss {
                let s = DVector::from_column_slice(&step);
                let predicted = 2.0 * s.dot(&g) - (&jtj * &s).dot(&s);
                let rel_decrease = (rss - rss_trial) / rss;

                p = trial;
                r = r_trial;
                rss = rss_trial;
                lambda = (lambda / 10.0).max(LAMBDA_MIN);

                if rel_decrease <= tolerance || predicted <= tolerance * rss {
                    status = ConvergenceStatus::Converged;
                    break 'outer;
                }
                break;
            }

            lambda *= 10.0;
            if lambda > LAMBDA_MAX {
                status = exhausted_damping_status(last_trial_finite);
                break 'outer;
            }
        }
    }

    log::debug!(
        "start {start_index}: {} after {iterations} iterations, RSS={rss:.6e}",
        status.display_name()
    );

    StartFit {
        start_index,
        parameters: ModelParameters::from_slice(&p),
        rss,
        status,
        iterations,
    }
}

/// Status once damping has grown past `LAMBDA_MAX` without an accepted step.
///
/// A finite but uphill final trial means no downhill step exists, so the
/// iterate is a minimum. A non-finite one means the model broke down near `p`.
fn exhausted_damping_status(last_trial_finite: bool) -> ConvergenceStatus {
    if last_trial_finite {
        ConvergenceStatus::Converged
    } else {
        ConvergenceStatus::NumericalFailure
    }
}

/// Solve the damped normal equations, Cholesky first.
fn solve_damped(a: DMatrix<f64>, g: &DVector<f64>) -> Option<DVector<f64>> {
    if let Some(chol) = a.clone().cholesky() {
        let x = chol.solve(g);
        if x.iter().all(|v| v.is_finite()) {
            return Some(x);
        }
    }
    let svd = a.svd(true, true);
    svd.solve(g, 1e-14)
        .ok()
        .filter(|x| x.iter().all(|v| v.is_finite()))
}

/// Standard errors from `cov = (JᵀJ)⁻¹ · RSS/(n − p)`.
///
/// `jac` holds the free columns only. Returns `None` when `n ≤ p` or the
/// Jacobian is numerically rank deficient.
pub fn standard_errors(jac: &DMatrix<f64>, rss: f64) -> Option<Vec<f64>> {
    let (n, p) = jac.shape();
    if p == 0 || n <= p || !rss.is_finite() || jac.iter().any(|v| !v.is_finite()) {
        return None;
    }

    let svd = jac.clone().svd(false, true);
    let v_t = svd.v_t.as_ref()?;
    let s = &svd.singular_values;
    let s_max = s.iter().copied().fold(0.0_f64, f64::max);
    let s_min = s.iter().copied().fold(f64::INFINITY, f64::min);
    if !(s_max > 0.0) || s_min / s_max < COND_TOL {
        return None;
    }

    let sigma2 = rss / (n - p) as f64;
    let errors: Vec<f64> = (0..p)
        .map(|j| {
            let var: f64 = (0..p).map(|k| (v_t[(k, j)] / s[k]).powi(2)).sum();
            (var * sigma2).sqrt()
        })
        .collect();
    errors.iter().all(|e| e.is_finite()).then_some(errors)
}
