//! A simulated rig for development and end-to-end tests.
//!
//! Models the plate as a set of per-well synthetic samples: below each well's
//! surface the raw reading follows the Hertz power law (scaled by a
//! per-sample stiffness) plus Gaussian sensor noise, clamped at the sensor
//! floor. Moves are instantaneous and always idle; the position file is
//! maintained exactly like a hardware rig would.
//!
//! Determinism: all noise comes from one seeded `StdRng`, so a simulated
//! batch reproduces bit-for-bit for a given seed and schedule.

use std::collections::HashMap;

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::{Distribution, Normal};

use crate::domain::{PlateLayout, WellId};
use crate::error::AppError;
use crate::io::PositionFile;
use crate::math::power_law;
use crate::rig::{ForceSensor, MotionActuator};

/// One synthetic sample sitting in a well.
#[derive(Debug, Clone, Copy)]
pub struct SimSample {
    /// Probe travel from the start height to the sample surface, mm.
    pub surface_depth_mm: f64,
    /// Hertz amplitude of the raw (uncorrected) response, N/mm^1.5.
    pub stiffness: f64,
}

/// Simulated rig configuration.
#[derive(Debug, Clone)]
pub struct SimRigConfig {
    pub layout: PlateLayout,
    /// Gaussian sensor noise, newtons.
    pub noise_sigma_n: f64,
    /// Hard sensor clamp for raw readings, newtons.
    pub sensor_floor_n: f64,
    pub seed: u64,
}

impl Default for SimRigConfig {
    fn default() -> Self {
        Self {
            layout: PlateLayout::default(),
            noise_sigma_n: 0.005,
            sensor_floor_n: -50.0,
            seed: 42,
        }
    }
}

pub struct SimRig {
    samples: HashMap<WellId, SimSample>,
    layout: PlateLayout,
    noise: Normal<f64>,
    rng: StdRng,
    sensor_floor_n: f64,
    position_file: Option<PositionFile>,

    x_mm: f64,
    y_mm: f64,
    /// Probe travel below the start height (positive = down).
    depth_mm: f64,
    started: bool,
}

impl SimRig {
    pub fn new(config: SimRigConfig, samples: HashMap<WellId, SimSample>) -> Result<Self, AppError> {
        let noise = Normal::new(0.0, config.noise_sigma_n)
            .map_err(|e| AppError::new(4, format!("Noise distribution error: {e}")))?;
        Ok(Self {
            samples,
            layout: config.layout,
            noise,
            rng: StdRng::seed_from_u64(config.seed),
            sensor_floor_n: config.sensor_floor_n,
            position_file: None,
            x_mm: 0.0,
            y_mm: 0.0,
            depth_mm: 0.0,
            started: false,
        })
    }

    /// Maintain a device-position file across moves, like a hardware rig.
    pub fn with_position_file(mut self, file: PositionFile) -> Self {
        self.position_file = Some(file);
        self
    }

    pub fn position(&self) -> (f64, f64, f64) {
        (self.x_mm, self.y_mm, -self.depth_mm)
    }

    /// The well whose center is nearest the current (x, y), if any sample
    /// is loaded there.
    fn sample_under_probe(&self) -> Option<SimSample> {
        let mut best: Option<(f64, SimSample)> = None;
        for (&well, &sample) in &self.samples {
            let (wx, wy) = self.layout.well_xy(well);
            let d2 = (wx - self.x_mm).powi(2) + (wy - self.y_mm).powi(2);
            if best.is_none_or(|(b, _)| d2 < b) {
                best = Some((d2, sample));
            }
        }
        let half_pitch = 0.5 * self.layout.pitch_x_mm.abs().min(self.layout.pitch_y_mm.abs());
        best.filter(|&(d2, _)| d2.sqrt() <= half_pitch).map(|(_, s)| s)
    }
}

impl ForceSensor for SimRig {
    fn start(&mut self) -> Result<(), AppError> {
        self.started = true;
        Ok(())
    }

    fn stop(&mut self) -> Result<(), AppError> {
        self.started = false;
        Ok(())
    }

    fn read(&mut self) -> Result<f64, AppError> {
        if !self.started {
            return Err(AppError::new(5, "Force sensor read before start."));
        }
        let noise = self.noise.sample(&mut self.rng);
        let load = match self.sample_under_probe() {
            Some(s) if self.depth_mm > s.surface_depth_mm => {
                power_law(self.depth_mm, s.stiffness, s.surface_depth_mm)
            }
            _ => 0.0,
        };
        Ok((noise - load).max(self.sensor_floor_n))
    }
}

impl MotionActuator for SimRig {
    fn move_relative(&mut self, dx_mm: f64, dy_mm: f64, dz_mm: f64) -> Result<(), AppError> {
        self.x_mm += dx_mm;
        self.y_mm += dy_mm;
        self.depth_mm += dz_mm;
        if let Some(file) = &self.position_file {
            let (x, y, z) = self.position();
            file.save(x, y, z)?;
        }
        Ok(())
    }

    fn is_idle(&mut self) -> Result<bool, AppError> {
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::BaselineStats;
    use crate::rig::measure_baseline;

    fn rig_with(well: &str, sample: SimSample) -> SimRig {
        let mut samples = HashMap::new();
        samples.insert(well.parse().unwrap(), sample);
        SimRig::new(SimRigConfig::default(), samples).unwrap()
    }

    #[test]
    fn reads_noise_until_the_surface() {
        let mut rig = rig_with(
            "A1",
            SimSample {
                surface_depth_mm: 2.0,
                stiffness: 3.0,
            },
        );
        rig.start().unwrap();

        let v = rig.read().unwrap();
        assert!(v.abs() < 0.05, "no-load reading {v} should be noise-scale");

        rig.move_relative(0.0, 0.0, 3.0).unwrap();
        let v = rig.read().unwrap();
        // 1 mm past the surface with stiffness 3: about -3 N.
        assert!(v < -2.5 && v > -3.5, "loaded reading was {v}");
    }

    #[test]
    fn readings_clamp_at_the_sensor_floor() {
        let mut rig = rig_with(
            "A1",
            SimSample {
                surface_depth_mm: 0.5,
                stiffness: 1000.0,
            },
        );
        rig.start().unwrap();
        rig.move_relative(0.0, 0.0, 5.0).unwrap();
        assert_eq!(rig.read().unwrap(), -50.0);
    }

    #[test]
    fn away_from_any_well_there_is_no_load() {
        let mut rig = rig_with(
            "A1",
            SimSample {
                surface_depth_mm: 0.5,
                stiffness: 1000.0,
            },
        );
        // Move several pitches away in x, then deep down.
        rig.move_relative(30.0, 0.0, 0.0).unwrap();
        rig.move_relative(0.0, 0.0, 5.0).unwrap();
        rig.start().unwrap();
        assert!(rig.read().unwrap().abs() < 0.05);
    }

    #[test]
    fn read_requires_start() {
        let mut rig = rig_with(
            "A1",
            SimSample {
                surface_depth_mm: 1.0,
                stiffness: 1.0,
            },
        );
        assert!(rig.read().is_err());
    }

    #[test]
    fn baseline_statistics_look_like_the_noise_model() {
        let mut rig = rig_with(
            "A1",
            SimSample {
                surface_depth_mm: 5.0,
                stiffness: 1.0,
            },
        );
        let stats: BaselineStats = measure_baseline(&mut rig, 10).unwrap();
        assert!(stats.mean.abs() < 0.02);
        assert!(stats.stddev > 0.0 && stats.stddev < 0.05);
    }

    #[test]
    fn position_file_tracks_moves() {
        let dir = tempfile::tempdir().unwrap();
        let pos = PositionFile::new(dir.path().join("position.csv"));
        let mut rig = rig_with(
            "A1",
            SimSample {
                surface_depth_mm: 1.0,
                stiffness: 1.0,
            },
        )
        .with_position_file(pos.clone());

        rig.move_relative(9.0, 0.0, 0.0).unwrap();
        rig.move_relative(0.0, 0.0, 0.5).unwrap();
        assert_eq!(pos.load().unwrap().unwrap(), (9.0, 0.0, -0.5));
    }
}
