//! Trace preparation: boundary re-detection, validity gates, normalization.
//!
//! The controller classified contact live, but the fitter does not trust that
//! classification: it re-derives the contact boundary from the stored rows and
//! the baseline row alone. This keeps offline re-analysis honest (the log is
//! the single source of truth) and cross-checks the live run.

use crate::domain::{TraceSample, WellTrace};
use crate::fit::fitter::FitOptions;

/// A normalized working copy of one well's samples.
#[derive(Debug, Clone)]
pub struct PreparedRun {
    /// Depth re-origined to the contact row, force zeroed by the baseline
    /// mean. The fitter mutates depths during re-centering.
    pub samples: Vec<TraceSample>,
    /// Index of the first sustained-contact row in the stored order.
    pub contact_start: usize,
}

/// Normalize a trace, or explain why it cannot be analyzed.
///
/// The `Err` string is the no-data reason recorded for the well.
pub fn prepare_run(trace: &WellTrace, opts: &FitOptions) -> Result<PreparedRun, String> {
    let rows = &trace.samples;
    if rows.is_empty() {
        return Err("Well was not tested (no trace rows).".to_string());
    }

    // A stored force at or below `-mean + 2*stddev` is indistinguishable from
    // baseline noise (stored forces are negated raw readings).
    let noise_ceiling = -trace.baseline.mean + 2.0 * trace.baseline.stddev;
    let contact_start = rows
        .iter()
        .rposition(|s| s.force_n <= noise_ceiling)
        .map(|last| last + 1)
        .unwrap_or(0);

    let post_contact = rows.len().saturating_sub(contact_start);
    if post_contact < opts.min_post_contact {
        return Err(
            "Either well was not tested or no data was collected, because the sample was too short or too soft."
                .to_string(),
        );
    }

    let origin = rows[contact_start].depth_mm;
    let samples: Vec<TraceSample> = rows
        .iter()
        .map(|s| TraceSample {
            depth_mm: round2(s.depth_mm - origin),
            force_n: s.force_n + trace.baseline.mean,
        })
        .collect();

    let (mut lo, mut hi) = (f64::INFINITY, f64::NEG_INFINITY);
    for s in &samples {
        lo = lo.min(s.force_n);
        hi = hi.max(s.force_n);
    }
    if !(hi - lo).is_finite() || hi - lo < opts.min_force_range_n {
        return Err(
            "Force range too small to analyze (sample too short or too soft).".to_string(),
        );
    }

    Ok(PreparedRun {
        samples,
        contact_start,
    })
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{BaselineStats, WellId, WellTrace};

    fn trace(baseline: BaselineStats, rows: &[(f64, f64)]) -> WellTrace {
        WellTrace {
            well: "A1".parse::<WellId>().unwrap(),
            trial: 0,
            baseline,
            samples: rows
                .iter()
                .map(|&(depth_mm, force_n)| TraceSample { depth_mm, force_n })
                .collect(),
        }
    }

    fn baseline() -> BaselineStats {
        BaselineStats {
            mean: 0.0,
            stddev: 0.001,
        }
    }

    #[test]
    fn detects_boundary_after_last_noise_row() {
        let mut rows: Vec<(f64, f64)> = (0..5).map(|i| (i as f64 * 0.02, 0.0)).collect();
        rows.extend((0..12).map(|i| (0.1 + i as f64 * 0.02, 0.5 + i as f64 * 0.1)));
        let prepared = prepare_run(&trace(baseline(), &rows), &FitOptions::default()).unwrap();

        assert_eq!(prepared.contact_start, 5);
        // Depth re-origined to the contact row.
        assert_eq!(prepared.samples[5].depth_mm, 0.0);
        assert_eq!(prepared.samples[6].depth_mm, 0.02);
        assert_eq!(prepared.samples[0].depth_mm, -0.1);
    }

    #[test]
    fn no_flagged_rows_starts_at_zero() {
        let rows: Vec<(f64, f64)> = (0..12).map(|i| (i as f64 * 0.02, 1.0 + i as f64 * 0.1)).collect();
        let prepared = prepare_run(&trace(baseline(), &rows), &FitOptions::default()).unwrap();
        assert_eq!(prepared.contact_start, 0);
    }

    #[test]
    fn too_few_post_contact_rows_is_no_data() {
        let mut rows: Vec<(f64, f64)> = (0..20).map(|i| (i as f64 * 0.02, 0.0)).collect();
        rows.extend((0..5).map(|i| (0.4 + i as f64 * 0.02, 1.0)));
        assert!(prepare_run(&trace(baseline(), &rows), &FitOptions::default()).is_err());
    }

    #[test]
    fn tiny_force_range_is_no_data() {
        // Plenty of rows above the noise ceiling, but a force swing under 0.04 N.
        let rows: Vec<(f64, f64)> = (0..20)
            .map(|i| (i as f64 * 0.02, 0.01 + i as f64 * 0.001))
            .collect();
        let err = prepare_run(&trace(baseline(), &rows), &FitOptions::default()).unwrap_err();
        assert!(err.contains("Force range"));
    }

    #[test]
    fn forces_are_zeroed_by_baseline_mean() {
        let stats = BaselineStats {
            mean: -0.05,
            stddev: 0.001,
        };
        // Stored forces hover at +0.05 (= -mean) pre-contact, then rise.
        let mut rows: Vec<(f64, f64)> = (0..3).map(|i| (i as f64 * 0.02, 0.05)).collect();
        rows.extend((0..12).map(|i| (0.06 + i as f64 * 0.02, 0.2 + i as f64 * 0.05)));
        let prepared = prepare_run(&trace(stats, &rows), &FitOptions::default()).unwrap();
        assert!((prepared.samples[0].force_n - 0.0).abs() < 1e-12);
    }
}
