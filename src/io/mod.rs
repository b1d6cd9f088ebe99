//! Input/output helpers.
//!
//! - append-only trace log shared by every well and trial (`trace`)
//! - append-only results log (`results`)
//! - single-row device position file (`position`)

pub mod position;
pub mod results;
pub mod trace;

pub use position::*;
pub use results::*;
pub use trace::*;
