//! Terminal formatting for results.
//!
//! Formatting lives in one place so:
//! - the controller/fitter code stays clean and testable
//! - output changes are localized (important for future snapshot tests)

use crate::domain::{WellResult, WellStatus};

/// Format the per-well results table.
pub fn format_results_table(results: &[WellResult]) -> String {
    let mut out = String::new();

    out.push_str(&format!(
        "{:<6} {:>5} {:<10} {:>14} {:>14}  {}\n",
        "well", "trial", "status", "E (Pa)", "± (Pa)", "timestamp"
    ));
    out.push_str(&format!(
        "{:-<6} {:-<5} {:-<10} {:-<14} {:-<14}  {:-<25}\n",
        "", "", "", "", "", ""
    ));

    for r in results {
        out.push_str(&format!(
            "{:<6} {:>5} {:<10} {:>14} {:>14}  {}\n",
            r.well.to_string(),
            r.trial,
            r.status.as_str(),
            fmt_pa(r.modulus_pa),
            fmt_pa(r.uncertainty_pa),
            r.timestamp.format("%Y-%m-%d %H:%M:%S"),
        ));
    }

    out
}

/// Format the end-of-batch summary the operator reads aloud.
pub fn format_batch_summary(results: &[WellResult]) -> String {
    let mut out = String::new();
    out.push_str("Here are the results:\n");

    for r in results {
        match (r.status, r.modulus_pa, r.uncertainty_pa) {
            (WellStatus::Ok | WellStatus::Degraded, Some(e), Some(u)) => {
                let tag = if r.status == WellStatus::Degraded {
                    " (degraded fit)"
                } else {
                    ""
                };
                out.push_str(&format!(
                    "Well {}: E = {e:.0} N/m^2, Uncertainty = {u:.0} N/m^2{tag}\n",
                    r.well
                ));
            }
            (WellStatus::TooStiff, _, _) => {
                out.push_str(&format!("Well {}: sample too stiff to analyze\n", r.well));
            }
            (WellStatus::FitFailed, _, _) => {
                out.push_str(&format!("Well {}: data could not be analyzed\n", r.well));
            }
            _ => {
                out.push_str(&format!("Well {}: no data\n", r.well));
            }
        }
    }

    let analyzed = results
        .iter()
        .filter(|r| matches!(r.status, WellStatus::Ok | WellStatus::Degraded))
        .count();
    out.push_str(&format!(
        "{analyzed}/{} wells produced a modulus.\n",
        results.len()
    ));

    out
}

fn fmt_pa(v: Option<f64>) -> String {
    match v {
        Some(v) if v.is_finite() => format!("{v:.0}"),
        Some(_) => "inf".to_string(),
        None => "-".to_string(),
    }
}
