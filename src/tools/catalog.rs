//! Catalog MCP Tools
//!
//! Categories, services, doctors, exams and exam fields.

use serde::Serialize;

use crate::db::Database;
use crate::models::{
    Category, Exam, ExamCreate, ExamField, ExamFieldCreate, ExamType, Role, Service, User,
};

/// Response for add_category / add_service
#[derive(Debug, Serialize)]
pub struct NamedEntryResponse {
    pub success: bool,
    pub id: i64,
    pub name: String,
}

/// An exam with its fields
#[derive(Debug, Serialize)]
pub struct ExamDetailResponse {
    #[serde(flatten)]
    pub exam: Exam,
    pub fields: Vec<ExamField>,
}

/// Response for list_catalog
#[derive(Debug, Serialize)]
pub struct CatalogResponse {
    pub categories: Vec<Category>,
    pub services: Vec<Service>,
    pub doctors: Vec<User>,
    pub exams: Vec<Exam>,
}

fn require_name<'a>(value: &'a str, what: &str) -> Result<&'a str, String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(format!("{} cannot be empty", what));
    }
    Ok(trimmed)
}

// ============================================================================
// Tool Functions
// ============================================================================

pub fn add_category(db: &Database, name: &str) -> Result<NamedEntryResponse, String> {
    let name = require_name(name, "Category name")?;
    let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;

    let category = Category::create(&conn, name)
        .map_err(|e| format!("Failed to create category: {}", e))?;

    Ok(NamedEntryResponse { success: true, id: category.id, name: category.name })
}

pub fn add_service(db: &Database, name: &str) -> Result<NamedEntryResponse, String> {
    let name = require_name(name, "Service name")?;
    let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;

    let service = Service::create(&conn, name)
        .map_err(|e| format!("Failed to create service: {}", e))?;

    Ok(NamedEntryResponse { success: true, id: service.id, name: service.name })
}

/// Add a requesting doctor
pub fn add_doctor(db: &Database, name: &str, email: Option<&str>) -> Result<User, String> {
    let name = require_name(name, "Doctor name")?;
    let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;

    User::create(&conn, name, email, Role::Doctor)
        .map_err(|e| format!("Failed to create doctor: {}", e))
}

/// Add an exam to the catalog
pub fn add_exam(
    db: &Database,
    code: &str,
    name: &str,
    category_id: Option<i64>,
    exam_type: Option<&str>,
) -> Result<Exam, String> {
    let code = require_name(code, "Exam code")?;
    let name = require_name(name, "Exam name")?;

    let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;

    if let Some(id) = category_id {
        Category::get_by_id(&conn, id)
            .map_err(|e| format!("Database error: {}", e))?
            .ok_or_else(|| format!("Category not found with id: {}", id))?;
    }

    let data = ExamCreate {
        code: code.to_string(),
        name: name.to_string(),
        category_id,
        exam_type: exam_type.map(ExamType::from_str).unwrap_or(ExamType::Simple),
    };

    Exam::create(&conn, &data).map_err(|e| format!("Failed to create exam: {}", e))
}

/// Add a named field to a compound or hybrid exam
pub fn add_exam_field(
    db: &Database,
    exam_id: i64,
    name: &str,
    unit: Option<&str>,
    reference_range: Option<&str>,
    position: Option<i64>,
) -> Result<ExamField, String> {
    let name = require_name(name, "Field name")?;
    let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;

    let exam = Exam::get_by_id(&conn, exam_id)
        .map_err(|e| format!("Database error: {}", e))?
        .ok_or_else(|| format!("Exam not found with id: {}", exam_id))?;

    if !exam.exam_type.has_fields() {
        return Err(format!(
            "Exam '{}' is of type simple and does not take fields",
            exam.name
        ));
    }

    let data = ExamFieldCreate {
        exam_id,
        name: name.to_string(),
        unit: unit.map(String::from),
        reference_range: reference_range.map(String::from),
        position,
    };

    ExamField::create(&conn, &data).map_err(|e| format!("Failed to create exam field: {}", e))
}

pub fn get_exam(db: &Database, id: i64) -> Result<Option<ExamDetailResponse>, String> {
    let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;

    let exam = match Exam::get_by_id(&conn, id).map_err(|e| format!("Failed to get exam: {}", e))? {
        Some(exam) => exam,
        None => return Ok(None),
    };
    let fields = Exam::fields(&conn, id).map_err(|e| format!("Failed to get exam fields: {}", e))?;

    Ok(Some(ExamDetailResponse { exam, fields }))
}

/// Everything a request can reference
pub fn list_catalog(db: &Database, active_exams_only: bool) -> Result<CatalogResponse, String> {
    let conn = db.get_conn().map_err(|e| format!("Database error: {}", e))?;

    Ok(CatalogResponse {
        categories: Category::list(&conn).map_err(|e| format!("Failed to list categories: {}", e))?,
        services: Service::list(&conn).map_err(|e| format!("Failed to list services: {}", e))?,
        doctors: User::list_by_role(&conn, Role::Doctor)
            .map_err(|e| format!("Failed to list doctors: {}", e))?,
        exams: Exam::list(&conn, active_exams_only).map_err(|e| format!("Failed to list exams: {}", e))?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::test_db;

    #[test]
    fn test_build_catalog() {
        let (_dir, db) = test_db();

        let cat = add_category(&db, "Química").unwrap();
        add_service(&db, "Emergencia").unwrap();
        add_doctor(&db, "Dra. Salas", None).unwrap();
        let lipid = add_exam(&db, "LIP", "Perfil lipídico", Some(cat.id), Some("compuesto")).unwrap();
        add_exam_field(&db, lipid.id, "Colesterol total", Some("mg/dL"), Some("<200"), None).unwrap();
        add_exam_field(&db, lipid.id, "HDL", Some("mg/dL"), Some(">40"), None).unwrap();

        let exam = get_exam(&db, lipid.id).unwrap().unwrap();
        assert_eq!(exam.fields.len(), 2);
        assert_eq!(exam.fields[1].position, 2);

        let catalog = list_catalog(&db, true).unwrap();
        assert_eq!(catalog.categories.len(), 1);
        assert_eq!(catalog.services.len(), 1);
        assert_eq!(catalog.doctors.len(), 1);
        assert_eq!(catalog.exams.len(), 1);
    }

    #[test]
    fn test_catalog_validation() {
        let (_dir, db) = test_db();

        assert!(add_category(&db, " ").is_err());
        assert!(add_exam(&db, "GLU", "Glucosa", Some(99), None).is_err());

        let glucose = add_exam(&db, "GLU", "Glucosa", None, None).unwrap();
        assert_eq!(glucose.exam_type, ExamType::Simple);
        assert!(add_exam_field(&db, glucose.id, "Valor", None, None, None).is_err());
        assert!(add_exam_field(&db, 404, "Valor", None, None, None).is_err());
    }
}
