//! Patient MCP Tools
//!
//! Register, look up and search laboratory patients.

use serde::Serialize;

use crate::db::{Database, DbError};
use crate::models::{Patient, PatientCreate, Sex};

/// Patient summary for listings
#[derive(Debug, Serialize)]
pub struct PatientSummary {
    pub id: i64,
    pub codigo: Option<i64>,
    pub document: String,
    pub full_name: String,
    pub age: Option<i64>,
    pub sex: Option<String>,
}

impl From<&Patient> for PatientSummary {
    fn from(p: &Patient) -> Self {
        Self {
            id: p.id,
            codigo: p.codigo,
            document: p.document.clone(),
            full_name: p.full_name(),
            age: p.age,
            sex: p.sex.map(|s| s.display_name().to_string()),
        }
    }
}

/// Response for register_patient
#[derive(Debug, Serialize)]
pub struct RegisterPatientResponse {
    pub success: bool,
    pub patient: Patient,
}

/// Response for list_patients / search_patients
#[derive(Debug, Serialize)]
pub struct ListPatientsResponse {
    pub patients: Vec<PatientSummary>,
    pub total: usize,
}

// ============================================================================
// Tool Functions
// ============================================================================

/// Register a new patient; `codigo` is assigned by the database
pub fn register_patient(
    db: &Database,
    document: &str,
    first_names: &str,
    last_names: Option<&str>,
    age: Option<i64>,
    sex: Option<&str>,
    phone: Option<&str>,
) -> Result<RegisterPatientResponse, String> {
    if let Some(a) = age {
        if !(0..=150).contains(&a) {
            return Err(format!("Invalid age: {}", a));
        }
    }

    let sex = match sex.map(str::trim).filter(|s| !s.is_empty()) {
        Some(s) => Some(Sex::from_str(s).ok_or_else(|| format!("Invalid sex '{}': expected M, F or O", s))?),
        None => None,
    };

    let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;

    if Patient::get_by_document(&conn, document)
        .map_err(|e| format!("Database error: {}", e))?
        .is_some()
    {
        return Err(format!("A patient with document '{}' already exists", document.trim()));
    }

    let data = PatientCreate {
        document: document.to_string(),
        first_names: first_names.to_string(),
        last_names: last_names.map(String::from),
        age,
        sex,
        phone: phone.map(String::from),
    };

    let patient = Patient::create(&conn, &data).map_err(|e| match e {
        DbError::Validation(msg) => msg,
        other => format!("Failed to register patient: {}", other),
    })?;

    tracing::info!(patient_id = patient.id, codigo = ?patient.codigo, "patient registered");

    Ok(RegisterPatientResponse { success: true, patient })
}

/// Get a patient by id, or by document when no id is given
pub fn get_patient(
    db: &Database,
    id: Option<i64>,
    document: Option<&str>,
) -> Result<Option<Patient>, String> {
    let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;

    let patient = match (id, document) {
        (Some(id), _) => Patient::get_by_id(&conn, id),
        (None, Some(doc)) => Patient::get_by_document(&conn, doc),
        (None, None) => return Err("Either id or document is required".to_string()),
    };

    patient.map_err(|e| format!("Failed to get patient: {}", e))
}

/// Search patients by names or document number
pub fn search_patients(db: &Database, query: &str, limit: Option<i64>) -> Result<ListPatientsResponse, String> {
    if query.trim().is_empty() {
        return Err("Search query cannot be empty".to_string());
    }

    let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;

    let patients = Patient::search(&conn, query, limit.unwrap_or(20))
        .map_err(|e| format!("Failed to search patients: {}", e))?;

    let summaries: Vec<PatientSummary> = patients.iter().map(PatientSummary::from).collect();
    let total = summaries.len();

    Ok(ListPatientsResponse { patients: summaries, total })
}

/// List patients by code
pub fn list_patients(db: &Database, limit: Option<i64>, offset: Option<i64>) -> Result<ListPatientsResponse, String> {
    let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;

    let patients = Patient::list(&conn, limit.unwrap_or(50), offset.unwrap_or(0))
        .map_err(|e| format!("Failed to list patients: {}", e))?;

    let summaries: Vec<PatientSummary> = patients.iter().map(PatientSummary::from).collect();
    let total = summaries.len();

    Ok(ListPatientsResponse { patients: summaries, total })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::test_db;

    #[test]
    fn test_register_and_find() {
        let (_dir, db) = test_db();

        let first = register_patient(&db, "100", "Rosa", Some("Mamani"), Some(61), Some("f"), None).unwrap();
        let second = register_patient(&db, "200", "Luis", None, None, None, None).unwrap();
        assert_eq!(first.patient.codigo, Some(1));
        assert_eq!(second.patient.codigo, Some(2));

        let found = get_patient(&db, None, Some("100")).unwrap().unwrap();
        assert_eq!(found.full_name(), "Rosa Mamani");

        let search = search_patients(&db, "mam", None).unwrap();
        assert_eq!(search.total, 1);
        assert_eq!(search.patients[0].sex.as_deref(), Some("Femenino"));

        assert_eq!(list_patients(&db, None, None).unwrap().total, 2);
    }

    #[test]
    fn test_register_rejects_bad_input() {
        let (_dir, db) = test_db();

        register_patient(&db, "100", "Rosa", None, None, None, None).unwrap();
        assert!(register_patient(&db, "100", "Otra", None, None, None, None)
            .unwrap_err()
            .contains("already exists"));
        assert!(register_patient(&db, "300", "Ana", None, Some(-2), None, None).is_err());
        assert!(register_patient(&db, "300", "Ana", None, None, Some("X"), None).is_err());
        assert!(register_patient(&db, "300", "  ", None, None, None, None).is_err());
        assert!(get_patient(&db, None, None).is_err());
    }
}
