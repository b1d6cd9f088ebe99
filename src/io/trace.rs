//! The shared trace log.
//!
//! Wire format: headerless CSV rows `well,a,b,trial`. The first row of each
//! (well, trial) group is the baseline (`a` = mean, `b` = stddev of the raw
//! no-load readings); every later row is a sampled step (`a` = depth in mm,
//! `b` = stored push force in N). Groups from different wells and trials
//! interleave freely in one file.
//!
//! Rows are flushed as they are appended, so a crash mid-run loses at most
//! the in-flight step and the log stays valid fitter input.

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;

use crate::domain::{BaselineStats, TraceSample, WellId, WellTrace};
use crate::error::AppError;

/// Append-only trace writer.
pub struct TraceWriter<W: Write> {
    inner: csv::Writer<W>,
}

impl TraceWriter<File> {
    /// Open (or create) a trace log for appending.
    pub fn append_to(path: &Path) -> Result<Self, AppError> {
        let file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(path)
            .map_err(|e| {
                AppError::new(2, format!("Failed to open trace log '{}': {e}", path.display()))
            })?;
        Ok(Self::from_writer(file))
    }
}

impl<W: Write> TraceWriter<W> {
    pub fn from_writer(writer: W) -> Self {
        Self {
            inner: csv::Writer::from_writer(writer),
        }
    }

    /// Record a well's no-load baseline; must precede its sample rows.
    pub fn append_baseline(
        &mut self,
        well: WellId,
        trial: u32,
        stats: &BaselineStats,
    ) -> Result<(), AppError> {
        self.append_raw(well, trial, stats.mean, stats.stddev)
    }

    /// Record one sampled controller step.
    pub fn append_sample(
        &mut self,
        well: WellId,
        trial: u32,
        depth_mm: f64,
        force_n: f64,
    ) -> Result<(), AppError> {
        self.append_raw(well, trial, depth_mm, force_n)
    }

    fn append_raw(&mut self, well: WellId, trial: u32, a: f64, b: f64) -> Result<(), AppError> {
        self.inner
            .write_record(&[
                well.to_string(),
                a.to_string(),
                b.to_string(),
                trial.to_string(),
            ])
            .and_then(|()| self.inner.flush().map_err(csv::Error::from))
            .map_err(|e| AppError::new(2, format!("Failed to append trace row: {e}")))
    }
}

/// A row-level problem encountered while reading the log.
#[derive(Debug, Clone)]
pub struct RowError {
    pub line: usize,
    pub message: String,
}

/// The reloaded log, grouped by (well, trial) in first-seen order.
#[derive(Debug, Clone, Default)]
pub struct TraceLog {
    traces: Vec<WellTrace>,
    pub row_errors: Vec<RowError>,
    pub rows_read: usize,
}

impl TraceLog {
    pub fn traces(&self) -> &[WellTrace] {
        &self.traces
    }

    pub fn get(&self, well: WellId, trial: u32) -> Option<&WellTrace> {
        self.traces
            .iter()
            .find(|t| t.well == well && t.trial == trial)
    }

    /// (well, trial) keys in first-seen order.
    pub fn keys(&self) -> Vec<(WellId, u32)> {
        self.traces.iter().map(|t| (t.well, t.trial)).collect()
    }
}

/// Load a trace log from disk.
///
/// Malformed rows are skipped and reported via `row_errors` rather than
/// failing the whole load; a partially valid log is still useful input.
pub fn load_trace_log(path: &Path) -> Result<TraceLog, AppError> {
    let file = File::open(path).map_err(|e| {
        AppError::new(2, format!("Failed to open trace log '{}': {e}", path.display()))
    })?;
    read_trace_log(file)
}

/// Parse trace rows from any reader (tests feed in-memory buffers).
pub fn read_trace_log<R: std::io::Read>(reader: R) -> Result<TraceLog, AppError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut log = TraceLog::default();
    let mut index: HashMap<(WellId, u32), usize> = HashMap::new();

    for (idx, record) in csv_reader.records().enumerate() {
        let line = idx + 1;
        log.rows_read += 1;

        let record = match record {
            Ok(r) => r,
            Err(e) => {
                log.row_errors.push(RowError {
                    line,
                    message: format!("CSV parse error: {e}"),
                });
                continue;
            }
        };
        if record.is_empty() || (record.len() == 1 && record[0].is_empty()) {
            continue;
        }

        match parse_row(&record) {
            Ok((well, a, b, trial)) => match index.get(&(well, trial)) {
                None => {
                    index.insert((well, trial), log.traces.len());
                    log.traces.push(WellTrace {
                        well,
                        trial,
                        baseline: BaselineStats { mean: a, stddev: b },
                        samples: Vec::new(),
                    });
                }
                Some(&i) => log.traces[i].samples.push(TraceSample {
                    depth_mm: a,
                    force_n: b,
                }),
            },
            Err(message) => log.row_errors.push(RowError { line, message }),
        }
    }

    Ok(log)
}

fn parse_row(record: &csv::StringRecord) -> Result<(WellId, f64, f64, u32), String> {
    if record.len() < 3 {
        return Err(format!("Expected at least 3 fields, found {}.", record.len()));
    }
    let well: WellId = record[0].parse()?;
    let a: f64 = record[1]
        .parse()
        .map_err(|_| format!("Invalid number '{}'.", &record[1]))?;
    let b: f64 = record[2]
        .parse()
        .map_err(|_| format!("Invalid number '{}'.", &record[2]))?;
    let trial: u32 = if record.len() > 3 && !record[3].is_empty() {
        record[3]
            .parse()
            .map_err(|_| format!("Invalid trial index '{}'.", &record[3]))?
    } else {
        0
    };
    Ok((well, a, b, trial))
}
