//! Linear least squares helpers.
//!
//! Baseline removal and the Urbach tail are small linear regressions:
//!
//! ```text
//! minimize Σ (y_i - x_i^T β)^2
//! ```
//!
//! Implementation choices:
//! - SVD solve, robust for tall design matrices (more rows than columns).
//!   (Nalgebra's `QR::solve` is intended for square systems.)
//! - Polynomials are fitted in a centred/scaled abscissa so that columns like
//!   `E^2` at `E ≈ 2 eV` stay well conditioned.

use nalgebra::{DMatrix, DVector};

/// Solve a least squares problem using SVD.
///
/// Returns `None` if the system is too ill-conditioned to solve robustly.
pub fn solve_least_squares(x: &DMatrix<f64>, y: &DVector<f64>) -> Option<DVector<f64>> {
    let svd = x.clone().svd(true, true);

    // Try progressively looser tolerances if strict solve fails.
    for &tol in &[1e-12, 1e-10, 1e-8] {
        if let Ok(beta) = svd.solve(y, tol) {
            if beta.iter().all(|v| v.is_finite()) {
                return Some(beta);
            }
        }
    }

    None
}

/// Least-squares polynomial of degree `order`, returned as a closure-ready fit.
#[derive(Debug, Clone, PartialEq)]
pub struct PolyFit {
    center: f64,
    scale: f64,
    /// Coefficients in the centred variable `u = (x - center) / scale`, lowest order first.
    coeffs: Vec<f64>,
}

impl PolyFit {
    pub fn eval(&self, x: f64) -> f64 {
        let u = (x - self.center) / self.scale;
        self.coeffs.iter().rev().fold(0.0, |acc, c| acc * u + c)
    }
}

/// Fit a polynomial of the given order to `(x, y)`.
pub fn polyfit(x: &[f64], y: &[f64], order: usize) -> Option<PolyFit> {
    let n = x.len().min(y.len());
    let cols = order + 1;
    if n < cols {
        return None;
    }

    let (lo, hi) = x[..n]
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    let center = 0.5 * (lo + hi);
    let scale = if hi > lo { 0.5 * (hi - lo) } else { 1.0 };

    let mut design = DMatrix::<f64>::zeros(n, cols);
    for i in 0..n {
        let u = (x[i] - center) / scale;
        let mut p = 1.0;
        for j in 0..cols {
            design[(i, j)] = p;
            p *= u;
        }
    }
    let rhs = DVector::from_row_slice(&y[..n]);
    let beta = solve_least_squares(&design, &rhs)?;

    Some(PolyFit {
        center,
        scale,
        coeffs: beta.iter().copied().collect(),
    })
}

/// Ordinary least-squares line `y = slope * x + intercept`.
pub fn linear_fit(x: &[f64], y: &[f64]) -> Option<(f64, f64)> {
    let n = x.len().min(y.len());
    if n < 2 {
        return None;
    }
    let mut design = DMatrix::<f64>::zeros(n, 2);
    for i in 0..n {
        design[(i, 0)] = 1.0;
        design[(i, 1)] = x[i];
    }
    let beta = solve_least_squares(&design, &DVector::from_row_slice(&y[..n]))?;
    Some((beta[1], beta[0]))
}
