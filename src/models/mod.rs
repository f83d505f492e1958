//! Elliott model implementation.
//!
//! Models are implemented as small, pure functions so that fitting/search code can
//! stay generic.

pub mod broadening;
pub mod model;

pub use broadening::*;
pub use model::*;
