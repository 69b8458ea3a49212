//! Request MCP Tools
//!
//! Lab requests, per-exam status changes and result entry.

use chrono::NaiveDate;
use serde::Serialize;

use crate::db::{Database, DbError};
use crate::models::{
    Exam, ExamDetail, ExamDetailView, ExamStatus, Patient, Request, RequestCreate, ResultValue,
    ResultValueCreate, ResultValueView,
};

/// An exam detail with its field values
#[derive(Debug, Serialize)]
pub struct DetailWithValues {
    #[serde(flatten)]
    pub detail: ExamDetailView,
    pub values: Vec<ResultValueView>,
}

/// Full request view for get_request
#[derive(Debug, Serialize)]
pub struct RequestDetailResponse {
    #[serde(flatten)]
    pub request: Request,
    pub patient_name: Option<String>,
    pub details: Vec<DetailWithValues>,
}

/// Response for create_request
#[derive(Debug, Serialize)]
pub struct CreateRequestResponse {
    pub success: bool,
    pub id: i64,
    pub receipt_number: String,
    pub date: String,
    pub status: ExamStatus,
    pub exam_count: usize,
}

/// Response for list_requests
#[derive(Debug, Serialize)]
pub struct ListRequestsResponse {
    pub requests: Vec<Request>,
    pub total: usize,
    pub start_date: String,
    pub end_date: String,
}

/// Response for status and result changes
#[derive(Debug, Serialize)]
pub struct DetailUpdateResponse {
    pub success: bool,
    pub detail: ExamDetail,
    pub request_status: ExamStatus,
}

/// Response for record_result_values
#[derive(Debug, Serialize)]
pub struct RecordValuesResponse {
    pub success: bool,
    pub detail_id: i64,
    pub values: Vec<ResultValueView>,
    pub out_of_range_count: usize,
    pub detail_status: ExamStatus,
    pub request_status: ExamStatus,
}

fn validate_date(value: &str, what: &str) -> Result<(), String> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map(|_| ())
        .map_err(|_| format!("Invalid {} '{}': expected YYYY-MM-DD", what, value))
}

fn db_error(context: &str, e: DbError) -> String {
    match e {
        DbError::Validation(msg) => msg,
        DbError::InvalidTransition { from, to } => {
            format!("Cannot change exam status from {} to {}", from, to)
        }
        other => format!("{}: {}", context, other),
    }
}

fn request_status(conn: &rusqlite::Connection, request_id: i64) -> Result<ExamStatus, String> {
    Request::get_by_id(conn, request_id)
        .map_err(|e| format!("Database error: {}", e))?
        .map(|r| r.status)
        .ok_or_else(|| format!("Request not found with id: {}", request_id))
}

// ============================================================================
// Tool Functions
// ============================================================================

/// Create a request with one pending detail per exam
pub fn create_request(
    db: &Database,
    patient_id: i64,
    date: &str,
    exam_ids: Vec<i64>,
    service_id: Option<i64>,
    doctor_id: Option<i64>,
    receipt_number: Option<&str>,
) -> Result<CreateRequestResponse, String> {
    validate_date(date, "date")?;
    if exam_ids.is_empty() {
        return Err("At least one exam is required".to_string());
    }

    let mut conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;

    Patient::get_by_id(&conn, patient_id)
        .map_err(|e| format!("Database error: {}", e))?
        .ok_or_else(|| format!("Patient not found with id: {}", patient_id))?;

    for exam_id in &exam_ids {
        let exam = Exam::get_by_id(&conn, *exam_id)
            .map_err(|e| format!("Database error: {}", e))?
            .ok_or_else(|| format!("Exam not found with id: {}", exam_id))?;
        if !exam.active {
            return Err(format!("Exam '{}' is inactive", exam.name));
        }
    }

    let mut unique = exam_ids.clone();
    unique.sort_unstable();
    unique.dedup();
    if unique.len() != exam_ids.len() {
        return Err("An exam can only appear once per request".to_string());
    }

    let data = RequestCreate {
        date: date.to_string(),
        receipt_number: receipt_number.map(String::from),
        service_id,
        patient_id,
        user_id: doctor_id,
        exam_ids,
    };

    let request = Request::create(&mut conn, &data).map_err(|e| db_error("Failed to create request", e))?;

    tracing::info!(
        request_id = request.id,
        patient_id,
        exams = data.exam_ids.len(),
        "request created"
    );

    Ok(CreateRequestResponse {
        success: true,
        id: request.id,
        receipt_number: request.receipt_number,
        date: request.date,
        status: request.status,
        exam_count: data.exam_ids.len(),
    })
}

/// Get a request with its exam details and result values
pub fn get_request(db: &Database, id: i64) -> Result<Option<RequestDetailResponse>, String> {
    let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;

    let request = match Request::get_by_id(&conn, id).map_err(|e| format!("Failed to get request: {}", e))? {
        Some(r) => r,
        None => return Ok(None),
    };

    let patient_name = Patient::get_by_id(&conn, request.patient_id)
        .map_err(|e| format!("Database error: {}", e))?
        .map(|p| p.full_name());

    let details = ExamDetail::list_by_request(&conn, id)
        .map_err(|e| format!("Failed to get exam details: {}", e))?
        .into_iter()
        .map(|detail| {
            let values = ResultValue::list_by_detail(&conn, detail.id)
                .map_err(|e| format!("Failed to get result values: {}", e))?;
            Ok(DetailWithValues { detail, values })
        })
        .collect::<Result<Vec<_>, String>>()?;

    Ok(Some(RequestDetailResponse { request, patient_name, details }))
}

/// List requests in an inclusive date range, newest first
pub fn list_requests(
    db: &Database,
    start_date: &str,
    end_date: &str,
    patient_id: Option<i64>,
) -> Result<ListRequestsResponse, String> {
    validate_date(start_date, "start_date")?;
    validate_date(end_date, "end_date")?;
    if start_date.trim() > end_date.trim() {
        return Err(format!("start_date {} is after end_date {}", start_date, end_date));
    }

    let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;

    let requests = Request::list_by_date_range(&conn, start_date.trim(), end_date.trim(), patient_id)
        .map_err(|e| format!("Failed to list requests: {}", e))?;
    let total = requests.len();

    Ok(ListRequestsResponse {
        requests,
        total,
        start_date: start_date.trim().to_string(),
        end_date: end_date.trim().to_string(),
    })
}

/// Change the status of one exam detail
pub fn update_exam_status(db: &Database, detail_id: i64, status: &str) -> Result<DetailUpdateResponse, String> {
    let next = ExamStatus::from_str(status).ok_or_else(|| {
        format!("Invalid status '{}': expected pendiente, en_proceso or completado", status)
    })?;

    let mut conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;
    // Detail and request roll-up commit together
    let tx = conn.transaction().map_err(|e| format!("Database error: {}", e))?;

    let detail = ExamDetail::update_status(&tx, detail_id, next)
        .map_err(|e| db_error("Failed to update exam status", e))?;
    let request_status = request_status(&tx, detail.request_id)?;

    tx.commit().map_err(|e| format!("Database error: {}", e))?;

    Ok(DetailUpdateResponse { success: true, detail, request_status })
}

/// Record the direct result of an exam detail
pub fn set_exam_result(
    db: &Database,
    detail_id: i64,
    result: Option<&str>,
    observations: Option<&str>,
    complete: bool,
) -> Result<DetailUpdateResponse, String> {
    if result.map_or(true, |r| r.trim().is_empty()) && observations.is_none() && !complete {
        return Err("Nothing to record: provide a result, observations or complete=true".to_string());
    }

    let mut conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;
    let tx = conn.transaction().map_err(|e| format!("Database error: {}", e))?;

    let detail = ExamDetail::set_result(
        &tx,
        detail_id,
        result.map(str::trim).filter(|r| !r.is_empty()),
        observations,
        complete,
    )
    .map_err(|e| db_error("Failed to record result", e))?;
    let request_status = request_status(&tx, detail.request_id)?;

    tx.commit().map_err(|e| format!("Database error: {}", e))?;

    Ok(DetailUpdateResponse { success: true, detail, request_status })
}

/// Record field values of a compound exam.
///
/// Values are written in one transaction. With `complete` the detail moves
/// to completado afterwards.
pub fn record_result_values(
    db: &Database,
    detail_id: i64,
    values: Vec<ResultValueCreate>,
    complete: bool,
) -> Result<RecordValuesResponse, String> {
    if values.is_empty() {
        return Err("At least one value is required".to_string());
    }

    let mut conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;

    let tx = conn.transaction().map_err(|e| format!("Database error: {}", e))?;
    for value in &values {
        ResultValue::upsert(&tx, detail_id, value).map_err(|e| db_error("Failed to record value", e))?;
    }
    let detail = if complete {
        ExamDetail::update_status(&tx, detail_id, ExamStatus::Completado)
    } else {
        ExamDetail::get_by_id(&tx, detail_id)
            .and_then(|d| d.ok_or_else(|| DbError::NotFound(format!("Exam detail {}", detail_id))))
    }
    .map_err(|e| db_error("Failed to update exam detail", e))?;
    tx.commit().map_err(|e| format!("Database error: {}", e))?;

    let recorded = ResultValue::list_by_detail(&conn, detail_id)
        .map_err(|e| format!("Failed to list result values: {}", e))?;
    let out_of_range_count = recorded.iter().filter(|v| v.out_of_range).count();
    let request_status = request_status(&conn, detail.request_id)?;

    Ok(RecordValuesResponse {
        success: true,
        detail_id,
        values: recorded,
        out_of_range_count,
        detail_status: detail.status,
        request_status,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{catalog, patients, test_db};

    struct Fixture {
        patient_id: i64,
        glucose_id: i64,
        hemogram_id: i64,
        hemoglobin_field: i64,
    }

    fn fixture(db: &Database) -> Fixture {
        let patient = patients::register_patient(db, "555", "Elena", Some("Vargas"), Some(45), Some("F"), None)
            .unwrap()
            .patient;
        let glucose = catalog::add_exam(db, "GLU", "Glucosa", None, None).unwrap();
        let hemogram = catalog::add_exam(db, "HEM", "Hemograma", None, Some("compuesto")).unwrap();
        let field = catalog::add_exam_field(db, hemogram.id, "Hemoglobina", Some("g/dL"), Some("12-16"), None)
            .unwrap();
        Fixture {
            patient_id: patient.id,
            glucose_id: glucose.id,
            hemogram_id: hemogram.id,
            hemoglobin_field: field.id,
        }
    }

    #[test]
    fn test_request_lifecycle() {
        let (_dir, db) = test_db();
        let f = fixture(&db);

        let created = create_request(
            &db,
            f.patient_id,
            "2025-04-02",
            vec![f.glucose_id, f.hemogram_id],
            None,
            None,
            None,
        )
        .unwrap();
        assert_eq!(created.status, ExamStatus::Pendiente);
        assert!(created.receipt_number.starts_with("R20250402-"));

        let request = get_request(&db, created.id).unwrap().unwrap();
        assert_eq!(request.details.len(), 2);
        assert_eq!(request.patient_name.as_deref(), Some("Elena Vargas"));
        let glucose = request.details.iter().find(|d| d.detail.exam_id == f.glucose_id).unwrap();
        let hemogram = request.details.iter().find(|d| d.detail.exam_id == f.hemogram_id).unwrap();

        let updated = set_exam_result(&db, glucose.detail.id, Some("98 mg/dL"), None, true).unwrap();
        assert_eq!(updated.detail.status, ExamStatus::Completado);
        assert_eq!(updated.request_status, ExamStatus::EnProceso);

        let recorded = record_result_values(
            &db,
            hemogram.detail.id,
            vec![ResultValueCreate { field_id: f.hemoglobin_field, value: "17.1".into(), out_of_range: None }],
            true,
        )
        .unwrap();
        assert_eq!(recorded.out_of_range_count, 1);
        assert_eq!(recorded.request_status, ExamStatus::Completado);

        let err = update_exam_status(&db, glucose.detail.id, "en_proceso").unwrap_err();
        assert!(err.contains("Cannot change exam status"));

        let listed = list_requests(&db, "2025-04-01", "2025-04-30", Some(f.patient_id)).unwrap();
        assert_eq!(listed.total, 1);
    }

    #[test]
    fn test_status_changes_keep_request_in_step() {
        let (_dir, db) = test_db();
        let f = fixture(&db);

        let created =
            create_request(&db, f.patient_id, "2025-04-03", vec![f.glucose_id, f.hemogram_id], None, None, None)
                .unwrap();
        let request = get_request(&db, created.id).unwrap().unwrap();
        let glucose = request.details.iter().find(|d| d.detail.exam_id == f.glucose_id).unwrap();
        let hemogram = request.details.iter().find(|d| d.detail.exam_id == f.hemogram_id).unwrap();

        let moved = update_exam_status(&db, glucose.detail.id, "completado").unwrap();
        assert_eq!(moved.request_status, ExamStatus::EnProceso);
        assert_eq!(get_request(&db, created.id).unwrap().unwrap().request.status, ExamStatus::EnProceso);

        let moved = update_exam_status(&db, hemogram.detail.id, "completado").unwrap();
        assert_eq!(moved.request_status, ExamStatus::Completado);

        // A rejected change leaves both the detail and the request untouched
        assert!(update_exam_status(&db, hemogram.detail.id, "en_proceso").is_err());
        let reloaded = get_request(&db, created.id).unwrap().unwrap();
        assert_eq!(reloaded.request.status, ExamStatus::Completado);
        assert!(reloaded.details.iter().all(|d| d.detail.status == ExamStatus::Completado));

        let reset = update_exam_status(&db, glucose.detail.id, "pendiente").unwrap();
        assert_eq!(reset.detail.completed_at, None);
        assert_eq!(reset.request_status, ExamStatus::EnProceso);
        assert_eq!(get_request(&db, created.id).unwrap().unwrap().request.status, ExamStatus::EnProceso);
    }

    #[test]
    fn test_request_validation() {
        let (_dir, db) = test_db();
        let f = fixture(&db);

        assert!(create_request(&db, f.patient_id, "02/04/2025", vec![f.glucose_id], None, None, None).is_err());
        assert!(create_request(&db, f.patient_id, "2025-04-02", vec![], None, None, None).is_err());
        assert!(create_request(&db, 999, "2025-04-02", vec![f.glucose_id], None, None, None).is_err());
        assert!(create_request(&db, f.patient_id, "2025-04-02", vec![404], None, None, None).is_err());
        assert!(create_request(
            &db,
            f.patient_id,
            "2025-04-02",
            vec![f.glucose_id, f.glucose_id],
            None,
            None,
            None
        )
        .is_err());
        assert!(list_requests(&db, "2025-05-01", "2025-04-01", None).is_err());
        assert!(update_exam_status(&db, 1, "terminado").is_err());
        assert!(set_exam_result(&db, 1, None, None, false).is_err());
    }
}
