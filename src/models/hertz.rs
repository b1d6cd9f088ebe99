//! Hertzian sphere-on-half-space inversion.
//!
//! The fitter produces an amplitude `A` for `F = A (d - d0)^1.5` with depth in
//! millimeters and force in newtons. Hertz contact theory for a rigid-ish
//! sphere on an elastic half space gives `F = (4/3) E* sqrt(r) δ^1.5`, so the
//! effective contact modulus is `E* = 0.75 A_SI / sqrt(r)` once the amplitude
//! is rescaled to SI depth units. The sample modulus then follows from
//!
//! ```text
//! 1/E* = (1 - ν²)/E + (1 - ν_s²)/E_s
//! ```
//!
//! with the indenter sphere's (ν_s, E_s) taken from the probe spec.

use crate::domain::ProbeSpec;

/// Millimeter-to-meter rescale for a `depth^1.5` amplitude.
const MM_AMPLITUDE_SCALE: f64 = 31_622.776_601_683_79; // 1000^1.5

/// Moduli below this are biased by small-depth effects and get re-corrected.
pub const SOFT_SAMPLE_THRESHOLD_PA: f64 = 660_000.0;

/// Convert a fitted amplitude (N/mm^1.5) into the sample's elastic modulus in
/// pascals.
///
/// Also used on the amplitude's standard error to express the fit uncertainty
/// in modulus units.
pub fn elastic_modulus(amplitude: f64, sample_poisson: f64, probe: &ProbeSpec) -> f64 {
    let a_si = amplitude * MM_AMPLITUDE_SCALE;
    let e_star = 0.75 * a_si / probe.radius_m.sqrt();

    let sample_factor = 1.0 - sample_poisson * sample_poisson;
    let probe_factor = 1.0 - probe.poisson * probe.poisson;
    let inv = 1.0 / (e_star * sample_factor) - probe_factor / (probe.modulus_pa * sample_factor);
    1.0 / inv
}

/// Empirical correction for compliant samples.
///
/// Below [`SOFT_SAMPLE_THRESHOLD_PA`] the Hertz fit systematically
/// overestimates the modulus at the small indentation depths this instrument
/// reaches; the divisor `457 · E^-0.457` was characterized against reference
/// gels.
pub fn soft_sample_correction(modulus_pa: f64) -> f64 {
    if modulus_pa < SOFT_SAMPLE_THRESHOLD_PA {
        modulus_pa / (457.0 * modulus_pa.powf(-0.457))
    } else {
        modulus_pa
    }
}
