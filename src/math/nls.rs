//! Nonlinear least squares for the Hertz power law.
//!
//! The fitter repeatedly solves one small regression problem:
//!
//! ```text
//! minimize Σ (F_i - A (d_i - d0)^1.5)^2    over (A, d0)
//! ```
//!
//! Implementation choices:
//! - Damped Gauss–Newton (Levenberg–Marquardt) with the analytic Jacobian.
//!   The parameter space is two-dimensional, so each iteration is a 2×2
//!   normal-equation solve.
//! - The model is undefined for `d <= d0` (fractional power of a negative
//!   base evaluates to NaN); any trial step that lands there produces a
//!   non-finite SSE and is rejected by raising the damping factor.
//! - The parameter covariance is estimated the conventional way,
//!   `(JᵀJ)⁻¹ · SSE/(n − 2)`, evaluated at the accepted solution.

use nalgebra::{Matrix2, Vector2};

/// Fixed Hertzian sphere-on-half-space exponent.
pub const HERTZ_EXPONENT: f64 = 1.5;

const MAX_ITERS: usize = 100;
const MAX_DAMPING: f64 = 1e10;

/// A converged power-law fit.
#[derive(Debug, Clone, Copy)]
pub struct PowerLawFit {
    pub amplitude: f64,
    pub offset: f64,
    /// Covariance of (amplitude, offset); infinite when `JᵀJ` is singular.
    pub covariance: [[f64; 2]; 2],
    pub sse: f64,
    pub n: usize,
}

impl PowerLawFit {
    /// Standard error of the fitted amplitude.
    pub fn amplitude_stderr(&self) -> f64 {
        self.covariance[0][0].max(0.0).sqrt()
    }
}

/// Evaluate `A (d - d0)^1.5`; NaN for `d < d0`.
pub fn power_law(depth: f64, amplitude: f64, offset: f64) -> f64 {
    amplitude * (depth - offset).powf(HERTZ_EXPONENT)
}

/// Fit `F = A (d - d0)^1.5` to the given points.
///
/// Returns `None` when the regression cannot converge to a finite solution
/// (callers report this as "data could not be analyzed").
pub fn fit_power_law(
    depths: &[f64],
    forces: &[f64],
    init_amplitude: f64,
    init_offset: f64,
) -> Option<PowerLawFit> {
    let n = depths.len();
    if n != forces.len() || n < 3 {
        return None;
    }

    let mut params = Vector2::new(init_amplitude, init_offset);
    let mut sse = sum_sq_residuals(depths, forces, &params)?;
    let mut lambda = 1e-3;

    for _ in 0..MAX_ITERS {
        let (jtj, jtr) = normal_equations(depths, forces, &params);

        // Try increasingly damped steps until one improves the SSE.
        let mut accepted = None;
        while lambda <= MAX_DAMPING {
            let damped = jtj + Matrix2::from_diagonal(&(jtj.diagonal() * lambda));
            let Some(step) = damped.lu().solve(&jtr) else {
                lambda *= 10.0;
                continue;
            };
            let candidate = params + step;
            match sum_sq_residuals(depths, forces, &candidate) {
                Some(new_sse) if new_sse <= sse => {
                    accepted = Some((candidate, new_sse));
                    break;
                }
                _ => lambda *= 10.0,
            }
        }

        let Some((candidate, new_sse)) = accepted else {
            // No improving step exists at any damping level; treat the current
            // point as the solution if we ever moved, otherwise give up.
            break;
        };

        let improvement = sse - new_sse;
        params = candidate;
        sse = new_sse;
        lambda = (lambda / 10.0).max(1e-12);

        if improvement <= 1e-12 * sse.max(1e-12) {
            break;
        }
    }

    if !(params[0].is_finite() && params[1].is_finite() && sse.is_finite()) {
        return None;
    }

    let (jtj, _) = normal_equations(depths, forces, &params);
    let scale = if n > 2 { sse / (n as f64 - 2.0) } else { f64::INFINITY };
    let covariance = match jtj.try_inverse() {
        Some(inv) => [
            [inv[(0, 0)] * scale, inv[(0, 1)] * scale],
            [inv[(1, 0)] * scale, inv[(1, 1)] * scale],
        ],
        None => [[f64::INFINITY; 2]; 2],
    };

    Some(PowerLawFit {
        amplitude: params[0],
        offset: params[1],
        covariance,
        sse,
        n,
    })
}

fn sum_sq_residuals(depths: &[f64], forces: &[f64], params: &Vector2<f64>) -> Option<f64> {
    let mut sse = 0.0;
    for (&d, &f) in depths.iter().zip(forces.iter()) {
        let r = f - power_law(d, params[0], params[1]);
        sse += r * r;
    }
    sse.is_finite().then_some(sse)
}

/// Accumulate `JᵀJ` and `Jᵀr` for the current parameters.
///
/// Points where the model base `(d - d0)` is non-positive contribute nothing;
/// the SSE check is what rejects parameter regions with too many such points.
fn normal_equations(
    depths: &[f64],
    forces: &[f64],
    params: &Vector2<f64>,
) -> (Matrix2<f64>, Vector2<f64>) {
    let (a, d0) = (params[0], params[1]);
    let mut jtj = Matrix2::zeros();
    let mut jtr = Vector2::zeros();

    for (&d, &f) in depths.iter().zip(forces.iter()) {
        let base = d - d0;
        if base <= 0.0 {
            continue;
        }
        let half = base.sqrt();
        // dF/dA = base^1.5, dF/dd0 = -1.5 A base^0.5
        let ja = base * half;
        let jd = -HERTZ_EXPONENT * a * half;
        let r = f - a * ja;

        jtj[(0, 0)] += ja * ja;
        jtj[(0, 1)] += ja * jd;
        jtj[(1, 0)] += ja * jd;
        jtj[(1, 1)] += jd * jd;
        jtr[0] += ja * r;
        jtr[1] += jd * r;
    }

    (jtj, jtr)
}
