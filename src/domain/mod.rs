//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - the validated `Spectrum` (`spectrum`)
//! - configuration enums (`XUnit`, `KernelKind`, `BaselineMode`) and `FitOptions`
//! - model parameters and fit outputs (`ModelParameters`, `FitResult`, etc.)

pub mod spectrum;
pub mod types;

pub use spectrum::*;
pub use types::*;
