//! The contact-seeking depth controller.
//!
//! Steps the probe downward in fixed increments, reading the force sensor at
//! each position. Contact is a statistical call: a raw reading more than two
//! standard deviations below the no-load baseline mean. Sustained contact is
//! allowed one further millimeter of travel (the ceiling) before the descent
//! stops; readings that fall back inside the noise band reset the contact
//! state entirely (a noise spike, not a surface).
//!
//! Every sampled position is persisted to the trace log before the next
//! motion command, terminal positions included, so the fitter can re-derive
//! the contact boundary from the log alone.

use std::io::Write;

use log::{debug, warn};

use crate::domain::{BaselineStats, ContactRun, ContactSeekConfig, StopReason, WellId};
use crate::error::AppError;
use crate::io::TraceWriter;
use crate::rig::{ForceSensor, MotionActuator, settle};

/// Drive one descent over a well.
///
/// The probe starts at the configured clearance height (depth 0) and the
/// first reading is taken before the first move. On return the probe sits at
/// `final_depth_mm` below the start; the caller retracts it.
pub fn seek_contact<R, W>(
    rig: &mut R,
    trace: &mut TraceWriter<W>,
    well: WellId,
    trial: u32,
    baseline: &BaselineStats,
    cfg: &ContactSeekConfig,
) -> Result<ContactRun, AppError>
where
    R: ForceSensor + MotionActuator + ?Sized,
    W: Write,
{
    let threshold = baseline.contact_threshold();
    let schedule_len = cfg.schedule_len();

    let mut contact_forces: Vec<f64> = Vec::new();
    let mut ceiling: Option<usize> = None;
    let mut in_contact = false;
    let mut probe_depth_mm = 0.0;
    let mut stop = StopReason::ScheduleExhausted;
    let mut stiff = false;

    rig.start()?;
    for step_idx in 0..schedule_len {
        // Depths land on clean hundredths of a millimeter in the log.
        let depth_mm = (step_idx as f64 * cfg.step_mm * 100.0).round() / 100.0;
        probe_depth_mm = depth_mm;

        let reading = rig.read()?;
        trace.append_sample(well, trial, depth_mm, -reading)?;

        if reading < threshold {
            contact_forces.push(-reading);

            let at_ceiling = ceiling.is_some_and(|c| step_idx >= c);
            let saturated = reading <= cfg.saturation_n;
            if at_ceiling || saturated {
                stop = if saturated {
                    StopReason::Saturated
                } else {
                    StopReason::CeilingReached
                };
                if saturated && contact_forces.len() < cfg.min_contact_samples {
                    stiff = true;
                    warn!(
                        "well {well}: sensor saturated after {} contact samples; too stiff to analyze",
                        contact_forces.len()
                    );
                }
                break;
            }

            if contact_forces.len() == 1 {
                let c = step_idx + cfg.post_contact_steps();
                ceiling = Some(c);
                debug!(
                    "well {well}: contact at {depth_mm:.2} mm, ceiling {:.2} mm",
                    c as f64 * cfg.step_mm
                );
            }
            in_contact = true;
        } else if in_contact {
            // The reading climbed back into the noise band: a spike, not a
            // surface. Discard the accumulated state and keep descending.
            debug!("well {well}: contact lost at {depth_mm:.2} mm, resetting");
            contact_forces.clear();
            ceiling = None;
            in_contact = false;
        }

        rig.move_relative(0.0, 0.0, cfg.step_mm)?;
        settle(rig, cfg.idle_polls)?;
        probe_depth_mm = depth_mm + cfg.step_mm;
    }
    rig.stop()?;

    Ok(ContactRun {
        contact_forces,
        final_depth_mm: probe_depth_mm,
        stop,
        stiff,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A scripted rig: a fixed sequence of raw readings, instant moves.
    struct ScriptedRig {
        readings: Vec<f64>,
        cursor: usize,
        moves: Vec<(f64, f64, f64)>,
        started: bool,
    }

    impl ScriptedRig {
        fn new(readings: Vec<f64>) -> Self {
            Self {
                readings,
                cursor: 0,
                moves: Vec::new(),
                started: false,
            }
        }
    }

    impl ForceSensor for ScriptedRig {
        fn start(&mut self) -> Result<(), AppError> {
            self.started = true;
            Ok(())
        }
        fn stop(&mut self) -> Result<(), AppError> {
            self.started = false;
            Ok(())
        }
        fn read(&mut self) -> Result<f64, AppError> {
            assert!(self.started, "read outside start/stop");
            let v = self.readings[self.cursor.min(self.readings.len() - 1)];
            self.cursor += 1;
            Ok(v)
        }
    }

    impl MotionActuator for ScriptedRig {
        fn move_relative(&mut self, dx: f64, dy: f64, dz: f64) -> Result<(), AppError> {
            self.moves.push((dx, dy, dz));
            Ok(())
        }
        fn is_idle(&mut self) -> Result<bool, AppError> {
            Ok(true)
        }
    }

    fn baseline() -> BaselineStats {
        BaselineStats {
            mean: 0.0,
            stddev: 0.01,
        }
    }

    fn small_cfg() -> ContactSeekConfig {
        ContactSeekConfig {
            max_travel_mm: 4.0,
            ..ContactSeekConfig::default()
        }
    }

    fn run(readings: Vec<f64>, cfg: &ContactSeekConfig) -> (ContactRun, Vec<String>) {
        let mut rig = ScriptedRig::new(readings);
        let mut buf = Vec::new();
        let run = {
            let mut trace = TraceWriter::from_writer(&mut buf);
            seek_contact(
                &mut rig,
                &mut trace,
                "A1".parse().unwrap(),
                0,
                &baseline(),
                cfg,
            )
            .unwrap()
        };
        let rows = String::from_utf8(buf).unwrap().lines().map(String::from).collect();
        (run, rows)
    }

    #[test]
    fn quiet_trace_never_declares_contact() {
        // All readings inside the +/- 2 sigma noise band.
        let cfg = small_cfg();
        let readings: Vec<f64> = (0..cfg.schedule_len()).map(|i| 0.015 * ((i % 3) as f64 - 1.0)).collect();
        let (run, rows) = run(readings, &cfg);

        assert!(run.contact_forces.is_empty());
        assert_eq!(run.stop, StopReason::ScheduleExhausted);
        assert!(!run.stiff);
        // Every sampled step persisted.
        assert_eq!(rows.len(), cfg.schedule_len());
    }

    #[test]
    fn sustained_contact_stops_exactly_at_the_ceiling() {
        let cfg = small_cfg();
        // Contact begins at step 60 (depth 1.2 mm) and deepens slowly enough
        // to never saturate.
        let readings: Vec<f64> = (0..cfg.schedule_len())
            .map(|i| if i < 60 { 0.0 } else { -0.5 - 0.01 * (i - 60) as f64 })
            .collect();
        let (run, _) = run(readings, &cfg);

        assert_eq!(run.stop, StopReason::CeilingReached);
        assert!(!run.stiff);
        // Ceiling = first-contact depth + 1.0 mm.
        assert!((run.final_depth_mm - (1.2 + 1.0)).abs() < 1e-9);
        // 50 post-contact steps plus the first contact sample and the
        // terminal sample at the ceiling.
        assert_eq!(run.contact_forces.len(), 51);
    }

    #[test]
    fn saturation_with_few_samples_flags_stiff() {
        let cfg = small_cfg();
        let readings: Vec<f64> = (0..cfg.schedule_len())
            .map(|i| {
                if i < 20 {
                    0.0
                } else if i < 30 {
                    -5.0 - (i - 20) as f64
                } else {
                    -46.0
                }
            })
            .collect();
        let (run, _) = run(readings, &cfg);

        assert_eq!(run.stop, StopReason::Saturated);
        assert!(run.stiff);
        assert_eq!(run.contact_forces.len(), 11);
        assert!((run.final_depth_mm - 30.0 * 0.02).abs() < 1e-9);
    }

    #[test]
    fn saturation_with_plenty_of_samples_is_not_stiff() {
        let cfg = small_cfg();
        // 40 compliant contact samples, then saturation.
        let readings: Vec<f64> = (0..cfg.schedule_len())
            .map(|i| {
                if i < 10 {
                    0.0
                } else if i < 50 {
                    -1.0 - 0.5 * (i - 10) as f64 / 40.0
                } else {
                    -45.0
                }
            })
            .collect();
        let (run, _) = run(readings, &cfg);

        assert_eq!(run.stop, StopReason::Saturated);
        assert!(!run.stiff);
        assert_eq!(run.contact_forces.len(), 41);
    }

    #[test]
    fn noise_spike_resets_contact_state() {
        let cfg = small_cfg();
        // Three contact-looking readings, a recovery, then real contact.
        let readings: Vec<f64> = (0..cfg.schedule_len())
            .map(|i| match i {
                10..=12 => -0.5,
                13 => 0.0,
                i if i >= 100 => -1.0 - 0.01 * (i - 100) as f64,
                _ => 0.0,
            })
            .collect();
        let (run, _) = run(readings, &cfg);

        assert_eq!(run.stop, StopReason::CeilingReached);
        // Ceiling counts from the second (real) contact at step 100.
        assert!((run.final_depth_mm - (2.0 + 1.0)).abs() < 1e-9);
        assert_eq!(run.contact_forces.len(), 51);
    }

    #[test]
    fn terminal_row_is_persisted() {
        let cfg = small_cfg();
        let readings: Vec<f64> = (0..cfg.schedule_len())
            .map(|i| if i < 5 { 0.0 } else { -50.0 })
            .collect();
        let (run, rows) = run(readings, &cfg);

        assert_eq!(run.stop, StopReason::Saturated);
        // Rows 0..=5: five quiet steps plus the saturating sample.
        assert_eq!(rows.len(), 6);
        assert!(rows[5].starts_with("A1,0.1,50"));
    }
}
