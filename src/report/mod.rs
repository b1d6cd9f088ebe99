//! Reporting utilities: formatted terminal output for batch results.

pub mod format;

pub use format::*;
