//! Lab report pipeline
//!
//! dataset (typed rows from SQL) -> aggregate (counts, percentages,
//! classifications) -> sheets (rows, headings, styles) -> export (xlsx).

pub mod aggregate;
pub mod classify;
pub mod dataset;
pub mod export;
pub mod sheets;

use chrono::NaiveDate;
use serde::Serialize;
use thiserror::Error;

use crate::db::DbError;

pub use aggregate::{ReportData, ReportOptions};
pub use dataset::ReportDataset;
pub use export::{ExportSummary, ReportType};

/// Report error types
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Database error: {0}")]
    Db(#[from] DbError),

    #[error("Spreadsheet error: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid date '{0}': expected YYYY-MM-DD")]
    InvalidDate(String),

    #[error("Invalid date range: {start} is after {end}")]
    InvalidRange { start: String, end: String },

    #[error("Date range {start} to {end} spans more than {max} days")]
    RangeTooLong { start: String, end: String, max: i64 },

    #[error("Unknown report type '{0}' (expected general, pacientes, examenes, doctores or resultados)")]
    UnknownReportType(String),

    #[error("Patient {0} not found")]
    PatientNotFound(i64),
}

impl From<rusqlite::Error> for ReportError {
    fn from(e: rusqlite::Error) -> Self {
        ReportError::Db(DbError::Sqlite(e))
    }
}

pub type ReportResult<T> = Result<T, ReportError>;

/// Longest period a report may cover; the daily sheet has one row per day
pub const MAX_RANGE_DAYS: i64 = 36_600;

/// Inclusive date range of a report
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> ReportResult<Self> {
        if start > end {
            return Err(ReportError::InvalidRange {
                start: start.to_string(),
                end: end.to_string(),
            });
        }
        if (end - start).num_days() + 1 > MAX_RANGE_DAYS {
            return Err(ReportError::RangeTooLong {
                start: start.to_string(),
                end: end.to_string(),
                max: MAX_RANGE_DAYS,
            });
        }
        Ok(Self { start, end })
    }

    /// Parse a pair of `YYYY-MM-DD` dates
    pub fn parse(start: &str, end: &str) -> ReportResult<Self> {
        let parse = |s: &str| {
            NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
                .map_err(|_| ReportError::InvalidDate(s.to_string()))
        };
        Self::new(parse(start)?, parse(end)?)
    }

    /// Bounds for comparisons against `solicitudes.fecha`
    pub fn sql_bounds(&self) -> (String, String) {
        (
            self.start.format("%Y-%m-%d").to_string(),
            self.end.format("%Y-%m-%d").to_string(),
        )
    }

    /// Human-readable period, e.g. "01/03/2025 al 31/03/2025"
    pub fn label(&self) -> String {
        format!(
            "{} al {}",
            self.start.format("%d/%m/%Y"),
            self.end.format("%d/%m/%Y")
        )
    }

    /// Compact form used in filenames, e.g. "2025-03-01_2025-03-31"
    pub fn file_fragment(&self) -> String {
        format!("{}_{}", self.start.format("%Y-%m-%d"), self.end.format("%Y-%m-%d"))
    }

    /// Every day in the range, in order
    pub fn days(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.start.iter_days().take_while(move |d| *d <= self.end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_range() {
        let range = DateRange::parse("2025-03-01", "2025-03-31").unwrap();
        assert_eq!(range.label(), "01/03/2025 al 31/03/2025");
        assert_eq!(range.file_fragment(), "2025-03-01_2025-03-31");
        assert_eq!(range.days().count(), 31);
    }

    #[test]
    fn test_invalid_ranges() {
        assert!(matches!(
            DateRange::parse("2025-04-01", "2025-03-01"),
            Err(ReportError::InvalidRange { .. })
        ));
        assert!(matches!(
            DateRange::parse("01/03/2025", "2025-03-31"),
            Err(ReportError::InvalidDate(_))
        ));
    }

    #[test]
    fn test_range_length_is_capped() {
        assert!(matches!(
            DateRange::parse("1800-01-01", "2999-12-31"),
            Err(ReportError::RangeTooLong { max: MAX_RANGE_DAYS, .. })
        ));

        let start = NaiveDate::from_ymd_opt(2000, 1, 1).unwrap();
        let longest = DateRange::new(start, start + chrono::Duration::days(MAX_RANGE_DAYS - 1)).unwrap();
        assert_eq!(longest.days().count() as i64, MAX_RANGE_DAYS);
        assert!(DateRange::new(start, start + chrono::Duration::days(MAX_RANGE_DAYS)).is_err());
    }

    #[test]
    fn test_single_day_range() {
        let range = DateRange::parse("2025-03-01", "2025-03-01").unwrap();
        assert_eq!(range.days().collect::<Vec<_>>(), vec![range.start]);
    }
}
