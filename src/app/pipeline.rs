//! The per-well orchestration shared by hardware-style and simulated runs.
//!
//! Keeping this in one place avoids duplicating the core workflow:
//! position -> baseline -> contact-seeking descent -> retract -> fit -> log.
//!
//! The batch is strictly sequential: one well is fully controlled and fitted
//! before the next begins, and the fitter reads the well's trace back from
//! the persisted log rather than from controller memory. The log is the
//! source of truth, and a crash mid-batch leaves it analyzable.

use std::path::PathBuf;
use std::time::Duration;

use chrono::Local;
use log::{info, warn};
use rayon::prelude::*;

use crate::domain::{
    ContactSeekConfig, FitOutcome, PlateLayout, WellId, WellResult, WellStatus, validate_poisson,
};
use crate::error::AppError;
use crate::fit::{FitOptions, analyze_trace};
use crate::io::{ResultsWriter, TraceWriter, load_trace_log};
use crate::rig::{ForceSensor, MotionActuator, measure_baseline, seek_contact, settle};

/// A full batch request.
#[derive(Debug, Clone)]
pub struct BatchConfig {
    pub wells: Vec<WellId>,
    pub poisson: f64,
    /// Timed passes over the schedule; results carry the pass index.
    pub trials: u32,
    pub trial_interval: Duration,
    pub trace_path: PathBuf,
    pub results_path: PathBuf,
}

/// Run every scheduled well against the rig, one trial after another.
///
/// Per-well failures (no data, stiffness, fit failure) are recorded and the
/// batch continues; only input validation and hardware/IO errors abort.
pub fn run_batch<R>(
    rig: &mut R,
    layout: &PlateLayout,
    seek: &ContactSeekConfig,
    fit_opts: &FitOptions,
    cfg: &BatchConfig,
) -> Result<Vec<WellResult>, AppError>
where
    R: ForceSensor + MotionActuator + ?Sized,
{
    validate_poisson(cfg.poisson).map_err(|msg| AppError::new(2, msg))?;
    if cfg.wells.is_empty() {
        return Err(AppError::new(2, "Batch has no wells scheduled."));
    }

    let mut trace = TraceWriter::append_to(&cfg.trace_path)?;
    let mut results_log = ResultsWriter::append_to(&cfg.results_path)?;
    let mut results = Vec::new();

    let (mut cur_x, mut cur_y) = (0.0, 0.0);

    for trial in 0..cfg.trials.max(1) {
        if trial > 0 && !cfg.trial_interval.is_zero() {
            info!("waiting {:?} before trial {trial}", cfg.trial_interval);
            std::thread::sleep(cfg.trial_interval);
        }

        for &well in &cfg.wells {
            info!("testing well {well} (trial {trial})");

            let (x, y) = layout.well_xy(well);
            rig.move_relative(x - cur_x, y - cur_y, 0.0)?;
            settle(rig, seek.idle_polls)?;
            (cur_x, cur_y) = (x, y);

            let baseline = measure_baseline(rig, seek.baseline_samples)?;
            trace.append_baseline(well, trial, &baseline)?;

            let run = seek_contact(rig, &mut trace, well, trial, &baseline, seek)?;

            rig.move_relative(0.0, 0.0, -run.final_depth_mm)?;
            settle(rig, seek.idle_polls)?;

            let result = if run.stiff {
                WellResult {
                    well,
                    trial,
                    status: WellStatus::TooStiff,
                    modulus_pa: None,
                    uncertainty_pa: None,
                    timestamp: Local::now(),
                }
            } else {
                // Reload from disk: the fitter analyzes what was persisted.
                let log = load_trace_log(&cfg.trace_path)?;
                let outcome = match log.get(well, trial) {
                    Some(well_trace) => analyze_trace(well_trace, cfg.poisson, fit_opts)?,
                    None => FitOutcome::NoData {
                        reason: "No trace rows were persisted for this well.".to_string(),
                    },
                };
                well_result(well, trial, &outcome)
            };

            report_result(&result);
            results_log.append(&result)?;
            results.push(result);
        }
    }

    // Probe is already retracted; park the stage back over the origin.
    info!("returning stage to the home position");
    rig.move_relative(-cur_x, -cur_y, 0.0)?;
    settle(rig, seek.idle_polls)?;

    Ok(results)
}

/// An offline re-analysis request against an existing trace log.
#[derive(Debug, Clone)]
pub struct AnalyzeRequest {
    pub trace_path: PathBuf,
    /// `None` analyzes every (well, trial) group in the log.
    pub wells: Option<Vec<WellId>>,
    pub trial: Option<u32>,
    pub poisson: f64,
    pub results_path: Option<PathBuf>,
}

/// Fit wells from a persisted trace log, no hardware attached.
///
/// Wells are independent, so the fits fan out across threads; results come
/// back in log order.
pub fn analyze_log(req: &AnalyzeRequest, fit_opts: &FitOptions) -> Result<Vec<WellResult>, AppError> {
    validate_poisson(req.poisson).map_err(|msg| AppError::new(2, msg))?;

    let log = load_trace_log(&req.trace_path)?;
    for err in &log.row_errors {
        warn!("trace row {}: {}", err.line, err.message);
    }

    let selected: Vec<_> = log
        .traces()
        .iter()
        .filter(|t| {
            req.wells.as_ref().is_none_or(|wells| wells.contains(&t.well))
                && req.trial.is_none_or(|trial| trial == t.trial)
        })
        .collect();
    if selected.is_empty() {
        return Err(AppError::new(
            3,
            format!(
                "No matching traces in '{}' ({} rows read).",
                req.trace_path.display(),
                log.rows_read
            ),
        ));
    }

    let outcomes: Vec<Result<FitOutcome, AppError>> = selected
        .par_iter()
        .map(|t| analyze_trace(t, req.poisson, fit_opts))
        .collect();

    let mut results = Vec::with_capacity(selected.len());
    for (trace, outcome) in selected.iter().zip(outcomes) {
        let result = well_result(trace.well, trace.trial, &outcome?);
        report_result(&result);
        results.push(result);
    }

    if let Some(path) = &req.results_path {
        let mut writer = ResultsWriter::append_to(path)?;
        for result in &results {
            writer.append(result)?;
        }
    }

    Ok(results)
}

fn well_result(well: WellId, trial: u32, outcome: &FitOutcome) -> WellResult {
    let (status, modulus_pa, uncertainty_pa) = match outcome {
        FitOutcome::Converged(r) => (WellStatus::Ok, Some(r.modulus_pa), Some(r.uncertainty_pa)),
        FitOutcome::Diverged(r) => (
            WellStatus::Degraded,
            Some(r.modulus_pa),
            Some(r.uncertainty_pa),
        ),
        FitOutcome::NoData { .. } => (WellStatus::NoData, None, None),
        FitOutcome::FitFailed => (WellStatus::FitFailed, None, None),
    };
    WellResult {
        well,
        trial,
        status,
        modulus_pa,
        uncertainty_pa,
        timestamp: Local::now(),
    }
}

fn report_result(result: &WellResult) {
    match result.status {
        WellStatus::Ok | WellStatus::Degraded => {
            let e = result.modulus_pa.unwrap_or(f64::NAN);
            let u = result.uncertainty_pa.unwrap_or(f64::NAN);
            info!(
                "well {}: E = {e:.0} N/m^2, uncertainty = {u:.0} N/m^2",
                result.well
            );
            if result.status == WellStatus::Degraded {
                warn!("well {}: contact-origin refinement was guard-stopped; treat with caution", result.well);
            }
        }
        WellStatus::TooStiff => warn!("well {}: sample too stiff to analyze", result.well),
        WellStatus::FitFailed => warn!("well {}: data could not be analyzed", result.well),
        WellStatus::NoData => info!(
            "well {}: no data (well untested, or sample too short/soft)",
            result.well
        ),
    }
}
