//! Geometry correction factors for non-ideal sample shapes.
//!
//! Samples sit in wells rather than forming an infinite half space, so the
//! raw Hertzian force overshoots as the probe feels the well bottom. The
//! correction divides each windowed force by `c * depth^b`, where `(b, c)`
//! come from a finite-element sweep over Poisson's ratio and sample height.
//!
//! The table is an explicit 2-D lookup over discretized inputs (0.05-wide
//! Poisson buckets centered on 0.30..0.50, 1 mm height bins) so the boundary
//! behavior at bucket edges is auditable and testable.

use serde::{Deserialize, Serialize};

/// One `(b, c)` correction pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CorrectionFactors {
    /// Depth exponent.
    pub b: f64,
    /// Multiplier.
    pub c: f64,
}

impl CorrectionFactors {
    /// No-op correction (`c * depth^b = 1`), used by tests and recalibration.
    pub const IDENTITY: Self = Self { b: 0.0, c: 1.0 };

    /// Rescale one windowed force sample.
    pub fn apply(&self, depth_mm: f64, force_n: f64) -> f64 {
        force_n / (self.c * depth_mm.powf(self.b))
    }
}

/// Step size of the original descent schedule, baked into the height mapping.
const HEIGHT_STEP_MM: f64 = 0.02;

/// `(b, c)` by Poisson bucket (rows) × height bucket (columns, tallest first).
#[rustfmt::skip]
const TABLE: [[CorrectionFactors; 8]; 5] = [
    // nu < 0.325
    [cf(0.130, 1.24), cf(0.131, 1.24), cf(0.133, 1.25), cf(0.132, 1.24),
     cf(0.132, 1.24), cf(0.139, 1.27), cf(0.149, 1.30), cf(0.162, 1.38)],
    // 0.325 <= nu < 0.375
    [cf(0.132, 1.25), cf(0.132, 1.25), cf(0.134, 1.25), cf(0.136, 1.26),
     cf(0.126, 1.25), cf(0.133, 1.27), cf(0.144, 1.32), cf(0.169, 1.42)],
    // 0.375 <= nu < 0.425
    [cf(0.181, 1.33), cf(0.182, 1.34), cf(0.183, 1.34), cf(0.183, 1.34),
     cf(0.194, 1.38), cf(0.198, 1.40), cf(0.203, 1.44), cf(0.176, 1.46)],
    // 0.425 <= nu < 0.475
    [cf(0.156, 1.35), cf(0.152, 1.34), cf(0.156, 1.35), cf(0.161, 1.37),
     cf(0.153, 1.37), cf(0.166, 1.42), cf(0.179, 1.47), cf(0.205, 1.59)],
    // nu >= 0.475
    [cf(0.203, 1.58), cf(0.207, 1.60), cf(0.212, 1.62), cf(0.217, 1.65),
     cf(0.210, 1.64), cf(0.220, 1.68), cf(0.170, 1.58), cf(0.182, 1.64)],
];

const fn cf(b: f64, c: f64) -> CorrectionFactors {
    CorrectionFactors { b, c }
}

/// Look up the correction pair for a sample.
pub fn correction_factors(poisson: f64, approx_height_mm: f64) -> CorrectionFactors {
    TABLE[poisson_bucket(poisson)][height_bucket(approx_height_mm)]
}

fn poisson_bucket(poisson: f64) -> usize {
    if poisson < 0.325 {
        0
    } else if poisson < 0.375 {
        1
    } else if poisson < 0.425 {
        2
    } else if poisson < 0.475 {
        3
    } else {
        4
    }
}

/// 1 mm bins, tallest first; everything under 3.5 mm shares the last column.
fn height_bucket(height_mm: f64) -> usize {
    if height_mm >= 9.5 {
        0
    } else if height_mm >= 8.5 {
        1
    } else if height_mm >= 7.5 {
        2
    } else if height_mm >= 6.5 {
        3
    } else if height_mm >= 5.5 {
        4
    } else if height_mm >= 4.5 {
        5
    } else if height_mm >= 3.5 {
        6
    } else {
        7
    }
}

/// Estimate the sample height from the normalized depth trace.
///
/// The sample whose depth is closest to zero marks the contact row; its index
/// measures how far the probe travelled before touching the surface, which
/// maps linearly onto plate-relative sample height (15 mm well top, 3 mm
/// probe standoff).
pub fn approximate_height_mm(depths_mm: &[f64]) -> f64 {
    let mut min_abs = f64::INFINITY;
    let mut min_idx = 0usize;
    for (i, &d) in depths_mm.iter().enumerate() {
        if d.abs() < min_abs {
            min_abs = d.abs();
            min_idx = i;
        }
    }
    let z_pos = min_idx as f64 * HEIGHT_STEP_MM + 3.0;
    15.0 - z_pos
}
