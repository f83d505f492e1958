//! Error types.
//!
//! - `InvalidSpectrumError`: malformed or insufficient input data. Raised only
//!   while building a `Spectrum`, never during a fit.
//! - `AppError`: application-level failure carrying a process exit code
//!   (2 = usage/IO, 3 = invalid spectrum, 4 = internal/export).
//!
//! Numerical trouble during optimization is *not* an error: it is reported as
//! `ConvergenceStatus` metadata on the fit result.

use thiserror::Error;

/// Exit code for usage, argument and file I/O problems.
pub const EXIT_USAGE: u8 = 2;
/// Exit code for spectra rejected by validation.
pub const EXIT_INVALID_SPECTRUM: u8 = 3;
/// Exit code for internal and export failures.
pub const EXIT_INTERNAL: u8 = 4;

/// Input spectrum rejected by the loader/normalizer.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InvalidSpectrumError {
    #[error("Spectrum has {found} samples; at least {min} are required")]
    TooFewSamples { found: usize, min: usize },

    #[error("Spectrum x/y length mismatch: {x_len} x values vs {y_len} y values")]
    LengthMismatch { x_len: usize, y_len: usize },

    #[error("Non-finite value at sample {index}")]
    NonFinite { index: usize },

    #[error("Non-positive wavelength {value} nm at sample {index}")]
    NonPositiveWavelength { index: usize, value: f64 },

    #[error("Energy axis is not strictly monotonic (sample {index})")]
    NonMonotonic { index: usize },

    #[error("All intensities are zero")]
    AllZeroIntensity,

    #[error("No signal above baseline (peak = {peak})")]
    NoSignal { peak: f64 },

    #[error("Energy window [{min}, {max}] eV keeps {found} samples; at least {required} are required")]
    EmptyWindow {
        min: f64,
        max: f64,
        found: usize,
        required: usize,
    },

    #[error("Invalid sample weight at sample {index}")]
    InvalidWeight { index: usize },
}

#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}

impl From<InvalidSpectrumError> for AppError {
    fn from(err: InvalidSpectrumError) -> Self {
        AppError::new(EXIT_INVALID_SPECTRUM, format!("Invalid spectrum: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spectrum_error_maps_to_exit_code_3() {
        let err: AppError = InvalidSpectrumError::AllZeroIntensity.into();
        assert_eq!(err.exit_code(), EXIT_INVALID_SPECTRUM);
        assert!(err.to_string().contains("All intensities are zero"));
    }
}
