//! The per-well results log.
//!
//! One CSV row per well per trial:
//! `well,trial,status,modulus_pa,uncertainty_pa,timestamp`. Numeric cells are
//! empty for wells without an extracted modulus. Appended once per analyzed
//! well and flushed immediately.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;

use chrono::{DateTime, Local};

use crate::domain::{WellId, WellResult, WellStatus};
use crate::error::AppError;

const HEADER: [&str; 6] = [
    "well",
    "trial",
    "status",
    "modulus_pa",
    "uncertainty_pa",
    "timestamp",
];

/// Append-only results writer.
pub struct ResultsWriter<W: Write> {
    inner: csv::Writer<W>,
}

impl ResultsWriter<File> {
    /// Open (or create) a results log for appending; writes the header when
    /// the file is new.
    pub fn append_to(path: &Path) -> Result<Self, AppError> {
        let file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(path)
            .map_err(|e| {
                AppError::new(
                    2,
                    format!("Failed to open results log '{}': {e}", path.display()),
                )
            })?;
        let is_new = file
            .metadata()
            .map(|m| m.len() == 0)
            .unwrap_or(false);

        let mut writer = Self::from_writer(file);
        if is_new {
            writer.write_header()?;
        }
        Ok(writer)
    }
}

impl<W: Write> ResultsWriter<W> {
    pub fn from_writer(writer: W) -> Self {
        Self {
            inner: csv::Writer::from_writer(writer),
        }
    }

    pub fn write_header(&mut self) -> Result<(), AppError> {
        self.inner
            .write_record(HEADER)
            .and_then(|()| self.inner.flush().map_err(csv::Error::from))
            .map_err(|e| AppError::new(2, format!("Failed to write results header: {e}")))
    }

    pub fn append(&mut self, result: &WellResult) -> Result<(), AppError> {
        let num = |v: Option<f64>| v.map(|v| format!("{v}")).unwrap_or_default();
        self.inner
            .write_record(&[
                result.well.to_string(),
                result.trial.to_string(),
                result.status.as_str().to_string(),
                num(result.modulus_pa),
                num(result.uncertainty_pa),
                result.timestamp.to_rfc3339(),
            ])
            .and_then(|()| self.inner.flush().map_err(csv::Error::from))
            .map_err(|e| AppError::new(2, format!("Failed to append results row: {e}")))
    }
}

/// Load a results log written by [`ResultsWriter`].
pub fn load_results(path: &Path) -> Result<Vec<WellResult>, AppError> {
    let file = File::open(path).map_err(|e| {
        AppError::new(
            2,
            format!("Failed to open results log '{}': {e}", path.display()),
        )
    })?;
    read_results(file)
}

pub fn read_results<R: std::io::Read>(reader: R) -> Result<Vec<WellResult>, AppError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut out = Vec::new();
    for (idx, record) in csv_reader.records().enumerate() {
        let line = idx + 2;
        let record =
            record.map_err(|e| AppError::new(3, format!("Results row {line}: {e}")))?;
        out.push(parse_result(&record).map_err(|msg| {
            AppError::new(3, format!("Results row {line}: {msg}"))
        })?);
    }
    Ok(out)
}

fn parse_result(record: &csv::StringRecord) -> Result<WellResult, String> {
    if record.len() < 6 {
        return Err(format!("Expected 6 fields, found {}.", record.len()));
    }
    let well: WellId = record[0].parse()?;
    let trial: u32 = record[1]
        .parse()
        .map_err(|_| format!("Invalid trial '{}'.", &record[1]))?;
    let status = WellStatus::parse(&record[2])
        .ok_or_else(|| format!("Unknown status '{}'.", &record[2]))?;
    let parse_num = |s: &str| -> Result<Option<f64>, String> {
        if s.is_empty() {
            Ok(None)
        } else {
            s.parse::<f64>()
                .map(Some)
                .map_err(|_| format!("Invalid number '{s}'."))
        }
    };
    let modulus_pa = parse_num(&record[3])?;
    let uncertainty_pa = parse_num(&record[4])?;
    let timestamp = DateTime::parse_from_rfc3339(&record[5])
        .map_err(|e| format!("Invalid timestamp '{}': {e}", &record[5]))?
        .with_timezone(&Local);

    Ok(WellResult {
        well,
        trial,
        status,
        modulus_pa,
        uncertainty_pa,
        timestamp,
    })
}
