//! Modulus extraction from persisted traces.
//!
//! Responsibilities:
//!
//! - re-derive the contact boundary from the stored rows (`prepare`)
//! - geometry correction lookup (`correction`)
//! - windowed Hertz fit with iterative depth re-centering (`fitter`)

pub mod correction;
pub mod fitter;
pub mod prepare;

pub use correction::*;
pub use fitter::*;
pub use prepare::*;
