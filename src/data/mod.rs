//! Data sources: seeded synthetic spectra.

pub mod synthetic;

pub use synthetic::*;
