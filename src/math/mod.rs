//! Mathematical utilities: the damped least-squares solver for the contact model.

pub mod nls;

pub use nls::*;
