//! CSV Import
//!
//! Loads the gauge network exports into the store:
//!
//! - **stations**: one row per gauge with `X` (longitude), `Y` (latitude),
//!   `nom` and `identifian` columns
//! - **measurements**: wide daily table, `date` then a `sta-<id>` value column
//!   and an optional `sta-<id>_e` flag column per gauge
//!
//! Wide rows are unpivoted into one [`RawMeasurement`] per station per day.

use crate::station::Station;
use crate::store::{RawMeasurement, StoreError};
use chrono::NaiveDate;
use std::io::Read;
use std::path::Path;
use thiserror::Error;

const STATION_COLUMN_PREFIX: &str = "sta-";
const FLAG_COLUMN_SUFFIX: &str = "_e";
const MAX_REPORTED_ERRORS: usize = 100;

/// Import failures that abort the whole file
#[derive(Error, Debug)]
pub enum ImportError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Missing column: {0}")]
    MissingColumn(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Outcome of reading one file
#[derive(Debug, Default)]
pub struct ImportReport {
    pub rows_processed: usize,
    pub rows_failed: usize,
    pub errors: Vec<String>,
}

impl ImportReport {
    fn fail(&mut self, line: usize, message: impl std::fmt::Display) {
        self.rows_failed += 1;
        if self.errors.len() < MAX_REPORTED_ERRORS {
            self.errors.push(format!("Line {}: {}", line, message));
        }
    }
}

fn reader_builder(delimiter: u8) -> csv::ReaderBuilder {
    let mut builder = csv::ReaderBuilder::new();
    builder.has_headers(true).flexible(true).delimiter(delimiter);
    builder
}

fn find_column(headers: &csv::StringRecord, aliases: &[&str]) -> Result<usize, ImportError> {
    headers
        .iter()
        .position(|h| aliases.iter().any(|a| h.trim().eq_ignore_ascii_case(a)))
        .ok_or_else(|| ImportError::MissingColumn(aliases.join("|")))
}

// ============================================
// STATIONS
// ============================================

/// Reads the station directory export
#[derive(Debug, Clone)]
pub struct StationImporter {
    delimiter: u8,
}

impl Default for StationImporter {
    fn default() -> Self {
        Self::new()
    }
}

impl StationImporter {
    pub fn new() -> Self {
        Self { delimiter: b',' }
    }

    /// Set the field delimiter
    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn import_path(&self, path: &Path) -> Result<(Vec<Station>, ImportReport), ImportError> {
        let reader = reader_builder(self.delimiter).from_path(path)?;
        self.import(reader)
    }

    pub fn import_str(&self, data: &str) -> Result<(Vec<Station>, ImportReport), ImportError> {
        self.import(reader_builder(self.delimiter).from_reader(data.as_bytes()))
    }

    fn import<R: Read>(
        &self,
        mut reader: csv::Reader<R>,
    ) -> Result<(Vec<Station>, ImportReport), ImportError> {
        let headers = reader.headers()?.clone();
        let lon_col = find_column(&headers, &["X", "long", "longitude"])?;
        let lat_col = find_column(&headers, &["Y", "lat", "latitude"])?;
        let name_col = find_column(&headers, &["nom", "name"])?;
        let id_col = find_column(&headers, &["identifian", "id"])?;

        let mut stations = Vec::new();
        let mut report = ImportReport::default();

        for (idx, result) in reader.records().enumerate() {
            let line = idx + 2;
            let record = match result {
                Ok(r) => r,
                Err(e) => {
                    report.fail(line, e);
                    continue;
                }
            };

            let field = |col: usize| record.get(col).map(str::trim).unwrap_or("");
            let coordinate = |col: usize| field(col).replace(',', ".").parse::<f64>();

            let (id, name) = (field(id_col), field(name_col));
            if id.is_empty() || name.is_empty() {
                report.fail(line, "missing station id or name");
                continue;
            }

            match (coordinate(lon_col), coordinate(lat_col)) {
                (Ok(longitude), Ok(latitude)) => {
                    stations.push(Station {
                        id: id.to_string(),
                        name: name.to_string(),
                        longitude,
                        latitude,
                    });
                    report.rows_processed += 1;
                }
                _ => report.fail(line, format!("invalid coordinates for station {}", name)),
            }
        }

        Ok((stations, report))
    }
}

// ============================================
// MEASUREMENTS
// ============================================

/// Reads the wide daily measurements export
#[derive(Debug, Clone)]
pub struct MeasurementImporter {
    delimiter: u8,
    date_format: String,
}

impl Default for MeasurementImporter {
    fn default() -> Self {
        Self::new()
    }
}

/// Value and optional flag column for one station
struct StationColumns {
    station_id: String,
    value: usize,
    flag: Option<usize>,
}

impl MeasurementImporter {
    pub fn new() -> Self {
        Self {
            delimiter: b',',
            date_format: "%d/%m/%Y".to_string(),
        }
    }

    /// Set the field delimiter
    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Set the date format of the `date` column
    pub fn with_date_format(mut self, format: &str) -> Self {
        self.date_format = format.to_string();
        self
    }

    pub fn import_path(
        &self,
        path: &Path,
    ) -> Result<(Vec<RawMeasurement>, ImportReport), ImportError> {
        let reader = reader_builder(self.delimiter).from_path(path)?;
        self.import(reader)
    }

    pub fn import_str(
        &self,
        data: &str,
    ) -> Result<(Vec<RawMeasurement>, ImportReport), ImportError> {
        self.import(reader_builder(self.delimiter).from_reader(data.as_bytes()))
    }

    fn station_columns(headers: &csv::StringRecord) -> Vec<StationColumns> {
        headers
            .iter()
            .enumerate()
            .filter_map(|(idx, header)| {
                let station_id = header.trim().strip_prefix(STATION_COLUMN_PREFIX)?;
                if station_id.ends_with(FLAG_COLUMN_SUFFIX) {
                    return None;
                }

                let flag_header = format!("{}{}", header.trim(), FLAG_COLUMN_SUFFIX);
                let flag = headers.iter().position(|h| h.trim() == flag_header);

                Some(StationColumns {
                    station_id: station_id.to_string(),
                    value: idx,
                    flag,
                })
            })
            .collect()
    }

    fn import<R: Read>(
        &self,
        mut reader: csv::Reader<R>,
    ) -> Result<(Vec<RawMeasurement>, ImportReport), ImportError> {
        let headers = reader.headers()?.clone();
        let date_col = find_column(&headers, &["date"])?;
        let columns = Self::station_columns(&headers);
        if columns.is_empty() {
            return Err(ImportError::MissingColumn(format!("{}<id>", STATION_COLUMN_PREFIX)));
        }

        let mut measurements = Vec::new();
        let mut report = ImportReport::default();

        for (idx, result) in reader.records().enumerate() {
            let line = idx + 2;
            let record = match result {
                Ok(r) => r,
                Err(e) => {
                    report.fail(line, e);
                    continue;
                }
            };

            let raw_date = record.get(date_col).map(str::trim).unwrap_or("");
            // Fixed-width DD/MM/YYYY, the monthly grouping relies on it
            let date = match NaiveDate::parse_from_str(raw_date, &self.date_format) {
                Ok(d) => d.format("%d/%m/%Y").to_string(),
                Err(e) => {
                    report.fail(line, format!("invalid date '{}': {}", raw_date, e));
                    continue;
                }
            };

            for column in &columns {
                let value = record.get(column.value).map(str::trim).unwrap_or("");
                let flag = column
                    .flag
                    .and_then(|c| record.get(c))
                    .map(str::trim)
                    .filter(|f| !f.is_empty());

                measurements.push(RawMeasurement {
                    station_id: column.station_id.clone(),
                    date: date.clone(),
                    value: value.replace(',', "."),
                    flag: flag.map(str::to_string),
                });
            }
            report.rows_processed += 1;
        }

        Ok((measurements, report))
    }
}
