//! Contact-mechanics model: Hertz inversion from fitted amplitude to modulus.

pub mod hertz;

pub use hertz::*;
