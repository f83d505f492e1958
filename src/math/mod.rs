//! Mathematical utilities: Sommerfeld functions, least squares, peak detection.

pub mod ols;
pub mod peaks;
pub mod sommerfeld;

pub use ols::*;
pub use peaks::*;
pub use sommerfeld::*;
