//! Shared domain types.
//!
//! This module defines:
//!
//! - plate geometry and well identifiers (`WellId`, `PlateLayout`)
//! - per-well measurement types (`BaselineStats`, `TraceSample`, `WellTrace`)
//! - controller configuration and outputs (`ContactSeekConfig`, `ContactRun`)
//! - fit outputs and per-well outcomes (`ModulusResult`, `FitOutcome`, `WellResult`)

pub mod types;

pub use types::*;
