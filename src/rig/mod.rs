//! Hardware capability seams.
//!
//! The motion controller speaks a serial G-code dialect and the force sensor
//! lives behind a vendor SDK; neither belongs in this crate. The controller
//! only needs two narrow capabilities, expressed as traits so the control
//! loop is testable against [`sim::SimRig`] and portable across rigs.

pub mod controller;
pub mod sim;

pub use controller::*;
pub use sim::*;

use crate::domain::BaselineStats;
use crate::error::AppError;

/// A force sensor yielding scalar readings in newtons.
///
/// Readings go negative under load. `read` is only valid between `start` and
/// `stop`.
pub trait ForceSensor {
    fn start(&mut self) -> Result<(), AppError>;
    fn stop(&mut self) -> Result<(), AppError>;
    fn read(&mut self) -> Result<f64, AppError>;
}

/// A three-axis motion actuator.
///
/// `move_relative` commands a relative displacement (z positive = probe
/// down). A move is not complete until `is_idle` reports idle for a fixed
/// number of consecutive polls (see [`settle`]); implementations persist the
/// device position file after every commanded move.
pub trait MotionActuator {
    fn move_relative(&mut self, dx_mm: f64, dy_mm: f64, dz_mm: f64) -> Result<(), AppError>;
    fn is_idle(&mut self) -> Result<bool, AppError>;
}

/// Block until the actuator reports idle `polls` times in a row.
///
/// Non-idle responses reset the count. There is no timeout; a stalled axis is
/// a hardware fault surfaced by the operator.
pub fn settle<M: MotionActuator + ?Sized>(actuator: &mut M, polls: u32) -> Result<(), AppError> {
    let mut consecutive = 0;
    while consecutive < polls {
        if actuator.is_idle()? {
            consecutive += 1;
        } else {
            consecutive = 0;
        }
    }
    Ok(())
}

/// Sample the no-load baseline for a well.
pub fn measure_baseline<S: ForceSensor + ?Sized>(
    sensor: &mut S,
    samples: usize,
) -> Result<BaselineStats, AppError> {
    sensor.start()?;
    let mut readings = Vec::with_capacity(samples);
    for _ in 0..samples {
        readings.push(sensor.read()?);
    }
    sensor.stop()?;

    BaselineStats::from_samples(&readings)
        .ok_or_else(|| AppError::new(5, "Baseline needs at least two force samples."))
}
