//! Elliott model fitting.
//!
//! Responsibilities:
//!
//! - prepare raw spectra (units, baseline, normalization)
//! - estimate a starting point from peaks and edges
//! - run bounded Levenberg–Marquardt from several starts (parallel)
//! - select the best start deterministically

pub mod estimator;
pub mod fitter;
pub mod prepare;
pub mod selection;
pub mod starts;

pub use estimator::*;
pub use fitter::*;
pub use prepare::*;
pub use selection::*;
pub use starts::*;
