//! Monthly rainfall series
//!
//! Turns the raw daily measurements of one station into a monthly series
//! restricted to a year range.
//!
//! ```text
//! measurements (station_id, DD/MM/YYYY, value, flag)
//!        ↓  group by MM/YYYY, skip flag = '*'
//! [("03/2013", 5.0), ("03/2012", 10.0), ...]
//!        ↓  parse, keep start <= year <= end, sort by (year, month)
//! [2012-03: 10.0, 2013-03: 5.0, ...]
//! ```

use crate::station::StationId;
use crate::store::{Store, StoreError};
use chrono::NaiveDate;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;

/// Earliest year a chart can cover
pub const MIN_YEAR: i32 = 1;
/// Latest year a chart can cover
pub const MAX_YEAR: i32 = 9999;

/// Inclusive range of calendar years
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct YearRange {
    pub start: i32,
    pub end: i32,
}

impl YearRange {
    pub fn new(start: i32, end: i32) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, year: i32) -> bool {
        year >= self.start && year <= self.end
    }

    /// `end - start`, negative when the range is inverted
    pub fn span(&self) -> i32 {
        self.end.saturating_sub(self.start)
    }

    /// Whether `year` lies in [`MIN_YEAR`, `MAX_YEAR`]
    pub fn is_supported_year(year: i32) -> bool {
        (MIN_YEAR..=MAX_YEAR).contains(&year)
    }

    /// Both bounds are supported years
    pub fn is_supported(&self) -> bool {
        Self::is_supported_year(self.start) && Self::is_supported_year(self.end)
    }
}

/// Aggregated rainfall for one calendar month
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MonthlySample {
    pub year: i32,
    /// 1-12
    pub month: u32,
    pub depth_mm: f64,
}

impl MonthlySample {
    /// First day of the month
    pub fn date(&self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month, 1)
    }

    /// Months since year 0, a linear x coordinate for charts
    pub fn month_index(&self) -> i32 {
        self.year * 12 + self.month as i32 - 1
    }
}

/// Aggregation failures
#[derive(Error, Debug)]
pub enum AggregateError {
    #[error("No measurements for station {station_id} between {start} and {end}")]
    EmptySeries {
        station_id: String,
        start: i32,
        end: i32,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Builds monthly series from the measurements table
#[derive(Clone)]
pub struct MeasurementAggregator {
    store: Arc<Store>,
}

impl MeasurementAggregator {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    /// Monthly totals for `station_id` within `range`, sorted by (year, month)
    pub fn build(
        &self,
        station_id: &StationId,
        range: YearRange,
    ) -> Result<Vec<MonthlySample>, AggregateError> {
        let totals = self.store.monthly_totals(station_id.as_str())?;
        let raw_rows = totals.len();

        let mut series: Vec<MonthlySample> = totals
            .into_iter()
            .filter_map(|(key, depth_mm)| match parse_month_key(&key) {
                Some((year, month)) => Some(MonthlySample {
                    year,
                    month,
                    depth_mm,
                }),
                None => {
                    tracing::warn!(station_id = %station_id, key = %key, "Skipping malformed month key");
                    None
                }
            })
            .filter(|s| range.contains(s.year))
            .collect();

        series.sort_by_key(|s| (s.year, s.month));

        tracing::debug!(
            station_id = %station_id,
            start = range.start,
            end = range.end,
            raw_rows,
            samples = series.len(),
            "Built monthly series"
        );

        if series.is_empty() {
            return Err(AggregateError::EmptySeries {
                station_id: station_id.to_string(),
                start: range.start,
                end: range.end,
            });
        }

        Ok(series)
    }
}

/// Parse an `MM/YYYY` key
fn parse_month_key(key: &str) -> Option<(i32, u32)> {
    let (month, year) = key.split_once('/')?;
    let month: u32 = month.trim().parse().ok()?;
    let year: i32 = year.trim().parse().ok()?;

    if (1..=12).contains(&month) {
        Some((year, month))
    } else {
        None
    }
}
