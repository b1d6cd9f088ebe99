//! Command-line parsing for the indentation batch runner.
//!
//! The goal of this module is to keep **argument parsing** and **well-schedule
//! resolution** separate from the control-loop and fitting code.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::domain::{PLATE_COLUMNS, ROW_LETTERS, WellId};
use crate::error::AppError;

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(
    name = "wellpress",
    version,
    about = "Automated well-plate indentation testing and Hertzian modulus extraction"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run a full batch against the built-in simulated rig.
    ///
    /// Exercises the same controller/fitter pipeline as a hardware run:
    /// baseline, contact-seeking descent, trace logging, fit, results log.
    Simulate(SimulateArgs),
    /// Re-analyze an existing trace log without hardware.
    Analyze(AnalyzeArgs),
    /// Pretty-print an existing results log.
    Report(ReportArgs),
}

/// Well-schedule selection shared by `simulate` and `analyze`.
///
/// Wells are tested in the order given; duplicates are tested once.
#[derive(Debug, Parser, Clone, Default)]
pub struct WellSelection {
    /// Individual wells, e.g. `A1,B3,H12`.
    #[arg(long, value_delimiter = ',')]
    pub wells: Vec<String>,

    /// Whole lettered rows (every column), e.g. `A,C`.
    #[arg(long, value_delimiter = ',')]
    pub rows: Vec<String>,

    /// Whole numbered columns (every row letter), e.g. `1,4`.
    #[arg(long, value_delimiter = ',')]
    pub cols: Vec<u8>,

    /// Every well on the plate.
    #[arg(long)]
    pub full_plate: bool,
}

impl WellSelection {
    /// Expand the selection into an ordered, de-duplicated schedule.
    pub fn resolve(&self) -> Result<Vec<WellId>, AppError> {
        let mut schedule: Vec<WellId> = Vec::new();
        let mut push = |well: WellId| {
            if !schedule.contains(&well) {
                schedule.push(well);
            }
        };

        for name in &self.wells {
            push(name.parse().map_err(|e: String| AppError::new(2, e))?);
        }
        for row in &self.rows {
            let letter = row.trim().chars().next().map(|c| c.to_ascii_uppercase());
            let Some(idx) = letter.and_then(|c| ROW_LETTERS.iter().position(|&l| l == c)) else {
                return Err(AppError::new(
                    2,
                    format!("Row '{row}' is not a plate letter (expected A-H)."),
                ));
            };
            for number in 1..=PLATE_COLUMNS {
                push(WellId::new(idx as u8, number).expect("validated row"));
            }
        }
        for &col in &self.cols {
            if !(1..=PLATE_COLUMNS).contains(&col) {
                return Err(AppError::new(
                    2,
                    format!("Column {col} is outside the plate (expected 1-{PLATE_COLUMNS})."),
                ));
            }
            for letter in 0..ROW_LETTERS.len() as u8 {
                push(WellId::new(letter, col).expect("validated column"));
            }
        }
        if self.full_plate {
            for letter in 0..ROW_LETTERS.len() as u8 {
                for number in 1..=PLATE_COLUMNS {
                    push(WellId::new(letter, number).expect("plate bounds"));
                }
            }
        }

        if schedule.is_empty() {
            return Err(AppError::new(
                2,
                "No wells selected; use --wells, --rows, --cols, or --full-plate.",
            ));
        }
        Ok(schedule)
    }
}

/// Options for `wellpress simulate`.
#[derive(Debug, Parser, Clone)]
pub struct SimulateArgs {
    #[command(flatten)]
    pub selection: WellSelection,

    /// Poisson's ratio of the samples (0.3-0.5).
    #[arg(long, default_value_t = 0.4)]
    pub poisson: f64,

    /// Number of timed passes over the schedule.
    #[arg(long, default_value_t = 1)]
    pub trials: u32,

    /// Delay between passes, seconds.
    #[arg(long, default_value_t = 0)]
    pub interval_secs: u64,

    /// Trace log path (appended).
    #[arg(long, default_value = "measurements.csv")]
    pub trace: PathBuf,

    /// Results log path (appended).
    #[arg(long, default_value = "results.csv")]
    pub results: PathBuf,

    /// Device position file path (overwritten per move).
    #[arg(long, default_value = "position.csv")]
    pub position: PathBuf,

    /// RNG seed for the simulated samples and sensor noise.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Sensor noise sigma, newtons.
    #[arg(long, default_value_t = 0.005)]
    pub noise: f64,

    /// Wells to simulate as rigid (exercises the too-stiff path).
    #[arg(long, value_delimiter = ',')]
    pub stiff_wells: Vec<String>,
}

/// Options for `wellpress analyze`.
#[derive(Debug, Parser, Clone)]
pub struct AnalyzeArgs {
    /// Trace log to analyze.
    pub trace: PathBuf,

    #[command(flatten)]
    pub selection: WellSelection,

    /// Analyze every (well, trial) group found in the log.
    #[arg(long)]
    pub all: bool,

    /// Restrict to one trial index.
    #[arg(long)]
    pub trial: Option<u32>,

    /// Poisson's ratio of the samples (0.3-0.5).
    #[arg(long, default_value_t = 0.4)]
    pub poisson: f64,

    /// Append extracted results to this log.
    #[arg(long)]
    pub results: Option<PathBuf>,
}

/// Options for `wellpress report`.
#[derive(Debug, Parser, Clone)]
pub struct ReportArgs {
    /// Results log to print.
    pub results: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn selection(wells: &[&str], rows: &[&str], cols: &[u8], full_plate: bool) -> WellSelection {
        WellSelection {
            wells: wells.iter().map(|s| s.to_string()).collect(),
            rows: rows.iter().map(|s| s.to_string()).collect(),
            cols: cols.to_vec(),
            full_plate,
        }
    }

    #[test]
    fn resolves_individual_wells_in_order() {
        let schedule = selection(&["B2", "A1", "B2"], &[], &[], false)
            .resolve()
            .unwrap();
        let names: Vec<String> = schedule.iter().map(|w| w.to_string()).collect();
        assert_eq!(names, ["B2", "A1"]);
    }

    #[test]
    fn resolves_rows_and_columns() {
        let schedule = selection(&[], &["c"], &[], false).resolve().unwrap();
        assert_eq!(schedule.len(), 12);
        assert_eq!(schedule[0].to_string(), "C1");

        let schedule = selection(&[], &[], &[3], false).resolve().unwrap();
        assert_eq!(schedule.len(), 8);
        assert_eq!(schedule[0].to_string(), "A3");
    }

    #[test]
    fn full_plate_covers_96_wells() {
        let schedule = selection(&[], &[], &[], true).resolve().unwrap();
        assert_eq!(schedule.len(), 96);
    }

    #[test]
    fn rejects_bad_selections() {
        assert!(selection(&["Z1"], &[], &[], false).resolve().is_err());
        assert!(selection(&[], &["Q"], &[], false).resolve().is_err());
        assert!(selection(&[], &[], &[13], false).resolve().is_err());
        assert!(selection(&[], &[], &[], false).resolve().is_err());
    }
}
