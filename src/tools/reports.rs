//! Report MCP Tools
//!
//! Aggregated statistics and Excel workbook exports over a date range.

use std::path::Path;

use serde::Serialize;

use crate::db::Database;
use crate::report::{
    export, DateRange, ExportSummary, ReportData, ReportDataset, ReportError, ReportOptions,
    ReportType,
};

/// Largest accepted top-N length
const MAX_TOP_N: usize = 100;

/// Response for get_report_data
#[derive(Debug, Serialize)]
pub struct ReportDataResponse {
    pub period: String,
    pub has_data: bool,
    #[serde(flatten)]
    pub data: ReportData,
}

fn options(top_n: Option<usize>) -> Result<ReportOptions, String> {
    match top_n {
        Some(0) => Err("top_n must be at least 1".to_string()),
        Some(n) => Ok(ReportOptions { top_n: n.min(MAX_TOP_N) }),
        None => Ok(ReportOptions::default()),
    }
}

fn report_error(context: &str, e: ReportError) -> String {
    match e {
        ReportError::InvalidDate(_)
        | ReportError::InvalidRange { .. }
        | ReportError::RangeTooLong { .. }
        | ReportError::UnknownReportType(_)
        | ReportError::PatientNotFound(_) => e.to_string(),
        other => format!("{}: {}", context, other),
    }
}

fn parse_range(start_date: &str, end_date: &str) -> Result<DateRange, String> {
    DateRange::parse(start_date, end_date).map_err(|e| report_error("Invalid date range", e))
}

// ============================================================================
// Tool Functions
// ============================================================================

/// Aggregate report data without writing a workbook
pub fn get_report_data(
    db: &Database,
    start_date: &str,
    end_date: &str,
    top_n: Option<usize>,
) -> Result<ReportDataResponse, String> {
    let range = parse_range(start_date, end_date)?;
    let options = options(top_n)?;

    let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;

    let dataset = ReportDataset::load(&conn, &range)
        .map_err(|e| format!("Failed to load report data: {}", e))?;
    let data = ReportData::build(&dataset, options);

    Ok(ReportDataResponse {
        period: range.label(),
        has_data: !data.is_empty(),
        data,
    })
}

/// Write a report workbook of the given type into `export_dir`
pub fn export_report(
    db: &Database,
    export_dir: &Path,
    report_type: &str,
    start_date: &str,
    end_date: &str,
    top_n: Option<usize>,
) -> Result<ExportSummary, String> {
    let report_type = ReportType::parse(report_type).map_err(|e| report_error("Invalid report type", e))?;
    let range = parse_range(start_date, end_date)?;
    let options = options(top_n)?;

    let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;

    export::export_report(&conn, report_type, &range, export_dir, options)
        .map_err(|e| report_error("Failed to export report", e))
}

/// Write patient results for one patient, or all patients active in the range
pub fn export_patient_results(
    db: &Database,
    export_dir: &Path,
    patient_id: Option<i64>,
    start_date: &str,
    end_date: &str,
) -> Result<ExportSummary, String> {
    let range = parse_range(start_date, end_date)?;

    let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;

    export::export_patient_results(&conn, patient_id, &range, export_dir)
        .map_err(|e| report_error("Failed to export patient results", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{catalog, patients, requests, test_db};

    #[test]
    fn test_report_data_and_export() {
        let (dir, db) = test_db();

        let patient = patients::register_patient(&db, "777", "Jorge", Some("Choque"), Some(70), Some("M"), None)
            .unwrap()
            .patient;
        let exam = catalog::add_exam(&db, "URO", "Urocultivo", None, None).unwrap();
        requests::create_request(&db, patient.id, "2025-06-03", vec![exam.id], None, None, None).unwrap();

        let report = get_report_data(&db, "2025-06-01", "2025-06-30", Some(5)).unwrap();
        assert!(report.has_data);
        assert_eq!(report.data.totals.requests, 1);
        assert_eq!(report.period, "01/06/2025 al 30/06/2025");

        let exports = dir.path().join("exports");
        let summary = export_report(&db, &exports, "pacientes", "2025-06-01", "2025-06-30", None).unwrap();
        assert!(summary.file_path.ends_with("reporte_pacientes_2025-06-01_2025-06-30.xlsx"));
        assert!(Path::new(&summary.file_path).exists());

        let results = export_patient_results(&db, &exports, Some(patient.id), "2025-06-01", "2025-06-30").unwrap();
        assert_eq!(results.sheets.len(), 1);
    }

    #[test]
    fn test_report_argument_errors() {
        let (dir, db) = test_db();

        assert!(get_report_data(&db, "2025-06-30", "2025-06-01", None).is_err());
        assert!(get_report_data(&db, "2025-06-01", "2025-06-30", Some(0)).is_err());
        let err = export_report(&db, dir.path(), "ventas", "2025-06-01", "2025-06-30", None).unwrap_err();
        assert!(err.contains("Unknown report type"));
        let err = export_patient_results(&db, dir.path(), Some(42), "2025-06-01", "2025-06-30").unwrap_err();
        assert!(err.contains("Patient 42 not found"));
        let err = export_report(&db, dir.path(), "general", "0001-01-01", "2999-12-31", None).unwrap_err();
        assert!(err.contains("spans more than"));
    }
}
