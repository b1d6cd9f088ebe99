//! The device-position file.
//!
//! A single CSV row `(x, y, z)` in machine coordinates, overwritten after
//! every motion command. Used to re-home the actuator after a crash or
//! power cycle without re-jogging the plate.

use std::fs::File;
use std::path::{Path, PathBuf};

use crate::error::AppError;

#[derive(Debug, Clone)]
pub struct PositionFile {
    path: PathBuf,
}

impl PositionFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Overwrite the stored position.
    pub fn save(&self, x_mm: f64, y_mm: f64, z_mm: f64) -> Result<(), AppError> {
        let file = File::create(&self.path).map_err(|e| {
            AppError::new(
                2,
                format!("Failed to write position file '{}': {e}", self.path.display()),
            )
        })?;
        let mut writer = csv::Writer::from_writer(file);
        writer
            .write_record(&[x_mm.to_string(), y_mm.to_string(), z_mm.to_string()])
            .and_then(|()| writer.flush().map_err(csv::Error::from))
            .map_err(|e| AppError::new(2, format!("Failed to write position row: {e}")))
    }

    /// Read the stored position, or `None` if the file does not exist yet.
    pub fn load(&self) -> Result<Option<(f64, f64, f64)>, AppError> {
        let file = match File::open(&self.path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(AppError::new(
                    2,
                    format!("Failed to open position file '{}': {e}", self.path.display()),
                ));
            }
        };

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .from_reader(file);
        let Some(record) = reader.records().next() else {
            return Ok(None);
        };
        let record = record
            .map_err(|e| AppError::new(2, format!("Invalid position file: {e}")))?;
        if record.len() < 3 {
            return Err(AppError::new(2, "Position file row has fewer than 3 fields."));
        }

        let parse = |s: &str| {
            s.parse::<f64>()
                .map_err(|_| AppError::new(2, format!("Invalid position value '{s}'.")))
        };
        Ok(Some((
            parse(&record[0])?,
            parse(&record[1])?,
            parse(&record[2])?,
        )))
    }
}
