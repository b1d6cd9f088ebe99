//! Domain types for plate indentation runs.
//!
//! These types are intentionally lightweight and serializable so they can be:
//!
//! - used in-memory by the controller and fitter
//! - written to / reloaded from the CSV logs
//! - embedded in reports

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// Plate row letters (stage x axis).
pub const ROW_LETTERS: [char; 8] = ['A', 'B', 'C', 'D', 'E', 'F', 'G', 'H'];

/// Number of numbered columns on a standard plate (stage y axis).
pub const PLATE_COLUMNS: u8 = 12;

/// A single well on the plate, e.g. `A1` or `H12`.
///
/// `row` indexes the letter (A=0..H=7), `col` the number (1..=12).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WellId {
    pub row: u8,
    pub col: u8,
}

impl WellId {
    pub fn new(row: u8, col: u8) -> Option<Self> {
        if (row as usize) < ROW_LETTERS.len() && (1..=PLATE_COLUMNS).contains(&col) {
            Some(Self { row, col })
        } else {
            None
        }
    }

    pub fn row_letter(&self) -> char {
        ROW_LETTERS[self.row as usize]
    }
}

impl fmt::Display for WellId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.row_letter(), self.col)
    }
}

impl FromStr for WellId {
    type Err = String;

    /// Parse a well name like `A1` or `H12` (case-insensitive letter).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let mut chars = s.chars();
        let letter = chars
            .next()
            .ok_or_else(|| "Empty well name.".to_string())?
            .to_ascii_uppercase();
        let row = ROW_LETTERS
            .iter()
            .position(|&c| c == letter)
            .ok_or_else(|| format!("Invalid well row '{letter}' (expected A-H)."))? as u8;
        let col: u8 = chars
            .as_str()
            .parse()
            .map_err(|_| format!("Invalid well column in '{s}' (expected 1-{PLATE_COLUMNS})."))?;
        WellId::new(row, col).ok_or_else(|| format!("Well '{s}' is outside the plate."))
    }
}

/// Maps wells to stage coordinates.
///
/// The letter axis maps to stage x, the number axis to stage y, both measured
/// from the `A1` origin with a fixed pitch. Pitches may be negative when the
/// plate is mounted mirrored relative to machine coordinates.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PlateLayout {
    pub origin_x_mm: f64,
    pub origin_y_mm: f64,
    pub pitch_x_mm: f64,
    pub pitch_y_mm: f64,
}

impl Default for PlateLayout {
    fn default() -> Self {
        // 9 mm pitch is the ANSI/SLAS 96-well spacing.
        Self {
            origin_x_mm: 0.0,
            origin_y_mm: 0.0,
            pitch_x_mm: 9.0,
            pitch_y_mm: 9.0,
        }
    }
}

impl PlateLayout {
    /// Stage (x, y) of a well center.
    pub fn well_xy(&self, well: WellId) -> (f64, f64) {
        (
            self.origin_x_mm + self.pitch_x_mm * well.row as f64,
            self.origin_y_mm + self.pitch_y_mm * (well.col - 1) as f64,
        )
    }
}

/// No-load force statistics captured immediately before testing a well.
///
/// Raw sensor readings go negative under load, so the contact threshold sits
/// two standard deviations *below* the baseline mean.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BaselineStats {
    pub mean: f64,
    pub stddev: f64,
}

impl BaselineStats {
    /// Raw readings below this value count as contact.
    pub fn contact_threshold(&self) -> f64 {
        self.mean - 2.0 * self.stddev
    }

    /// Compute (mean, sample standard deviation) from raw readings.
    ///
    /// Returns `None` for fewer than two samples (stddev undefined).
    pub fn from_samples(samples: &[f64]) -> Option<Self> {
        if samples.len() < 2 {
            return None;
        }
        let n = samples.len() as f64;
        let mean = samples.iter().sum::<f64>() / n;
        let var = samples.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / (n - 1.0);
        Some(Self {
            mean,
            stddev: var.sqrt(),
        })
    }
}

/// One persisted controller step: probe travel below the start height and the
/// stored push-force magnitude (negated raw reading).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TraceSample {
    pub depth_mm: f64,
    pub force_n: f64,
}

/// A complete per-well, per-trial trace reloaded from the shared log.
#[derive(Debug, Clone)]
pub struct WellTrace {
    pub well: WellId,
    pub trial: u32,
    pub baseline: BaselineStats,
    pub samples: Vec<TraceSample>,
}

/// Why the contact-seeking controller stopped stepping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopReason {
    /// The probe travelled the allowed post-contact distance.
    CeilingReached,
    /// A raw reading hit the sensor saturation clamp.
    Saturated,
    /// The travel budget ran out without a stop condition.
    ScheduleExhausted,
}

/// Output of one contact-seeking descent.
#[derive(Debug, Clone)]
pub struct ContactRun {
    /// Push-force magnitudes accumulated during sustained contact.
    pub contact_forces: Vec<f64>,
    /// Final probe travel below the start height.
    pub final_depth_mm: f64,
    pub stop: StopReason,
    /// Saturated with too few compliant samples to analyze.
    pub stiff: bool,
}

/// Controller configuration.
///
/// Defaults mirror the instrument: 0.02 mm steps, 10 mm of total travel,
/// 1 mm of allowed travel past first contact, a −45 N saturation clamp
/// (just above the sensor's hard limit), and a 10-sample baseline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContactSeekConfig {
    pub step_mm: f64,
    pub max_travel_mm: f64,
    pub post_contact_travel_mm: f64,
    /// Raw readings at or below this value are saturated.
    pub saturation_n: f64,
    /// Minimum contact samples for a saturated run to still be analyzable.
    pub min_contact_samples: usize,
    pub baseline_samples: usize,
    /// Consecutive idle polls required before a move counts as complete.
    pub idle_polls: u32,
}

impl Default for ContactSeekConfig {
    fn default() -> Self {
        Self {
            step_mm: 0.02,
            max_travel_mm: 10.0,
            post_contact_travel_mm: 1.0,
            saturation_n: -45.0,
            min_contact_samples: 30,
            baseline_samples: 10,
            idle_polls: 1,
        }
    }
}

impl ContactSeekConfig {
    /// Number of sampling positions in the descent schedule.
    pub fn schedule_len(&self) -> usize {
        (self.max_travel_mm / self.step_mm).round() as usize
    }

    /// Steps the probe may continue past first contact.
    pub fn post_contact_steps(&self) -> usize {
        (self.post_contact_travel_mm / self.step_mm).round() as usize
    }
}

/// Indenter sphere properties used in the Hertz inversion.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ProbeSpec {
    /// Sphere radius in meters.
    pub radius_m: f64,
    pub poisson: f64,
    pub modulus_pa: f64,
}

impl Default for ProbeSpec {
    fn default() -> Self {
        // Stainless bearing ball: r = 2.5 mm, nu = 0.28, E = 180 GPa.
        Self {
            radius_m: 0.0025,
            poisson: 0.28,
            modulus_pa: 1.8e11,
        }
    }
}

/// A successfully extracted modulus (possibly with degraded fit quality).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModulusResult {
    /// Elastic modulus in pascals, rounded to whole Pa.
    pub modulus_pa: f64,
    /// Uncertainty in pascals (from the amplitude standard error), rounded.
    pub uncertainty_pa: f64,
    /// Fitted Hertz amplitude in N/mm^1.5 (after correction).
    pub amplitude: f64,
    /// Final fitted contact-onset offset in mm.
    pub contact_offset_mm: f64,
    /// Re-centering passes performed after the initial fit.
    pub recenter_iters: usize,
    /// Depth range of the final windowed fit, mm.
    pub window_min_mm: f64,
    pub window_max_mm: f64,
    /// Maximum windowed depth fell short of the trustworthy-travel mark.
    pub shallow: bool,
}

/// Terminal fitter states for one well trace.
#[derive(Debug, Clone)]
pub enum FitOutcome {
    /// Validity gate failed: well untested, sample too short, or too soft.
    NoData { reason: String },
    Converged(ModulusResult),
    /// Guard-stopped re-centering; best-effort result with a quality warning.
    Diverged(ModulusResult),
    /// The regression did not converge.
    FitFailed,
}

/// Row-level status recorded in the results log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WellStatus {
    Ok,
    Degraded,
    NoData,
    TooStiff,
    FitFailed,
}

impl WellStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            WellStatus::Ok => "ok",
            WellStatus::Degraded => "degraded",
            WellStatus::NoData => "no-data",
            WellStatus::TooStiff => "too-stiff",
            WellStatus::FitFailed => "fit-failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ok" => Some(WellStatus::Ok),
            "degraded" => Some(WellStatus::Degraded),
            "no-data" => Some(WellStatus::NoData),
            "too-stiff" => Some(WellStatus::TooStiff),
            "fit-failed" => Some(WellStatus::FitFailed),
            _ => None,
        }
    }
}

/// One appended results-log row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WellResult {
    pub well: WellId,
    pub trial: u32,
    pub status: WellStatus,
    pub modulus_pa: Option<f64>,
    pub uncertainty_pa: Option<f64>,
    pub timestamp: DateTime<Local>,
}

/// Validate a Poisson's ratio input.
///
/// The correction table and the soft-sample adjustment were characterized for
/// ratios in [0.3, 0.5]; anything outside is rejected as an input error.
pub fn validate_poisson(ratio: f64) -> Result<f64, String> {
    if ratio.is_finite() && (0.3..=0.5).contains(&ratio) {
        Ok(ratio)
    } else {
        Err(format!(
            "Poisson's ratio {ratio} is out of range (expected 0.3-0.5)."
        ))
    }
}
