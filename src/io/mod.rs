//! Input/output helpers.
//!
//! - spectrum file ingest (`ingest`)
//! - result exports: CSV (`export`) and JSON (`json`)

pub mod export;
pub mod ingest;
pub mod json;

pub use export::*;
pub use ingest::*;
pub use json::*;
