//! Clinlab MCP Server Implementation
//!
//! Implements the MCP server with all laboratory and reporting tools.

use std::path::PathBuf;
use std::sync::Arc;

use rmcp::handler::server::router::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{
    CallToolResult, Content, Implementation, ProtocolVersion, ServerCapabilities, ServerInfo,
};
use rmcp::{schemars, tool, tool_handler, tool_router, ErrorData as McpError, ServerHandler};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::db::Database;
use crate::models::ResultValueCreate;
use crate::tools::status::StatusTracker;
use crate::tools::{catalog, patients, reports, requests};

/// Clinlab MCP Service
#[derive(Clone)]
pub struct ClinlabService {
    status_tracker: Arc<Mutex<StatusTracker>>,
    database: Database,
    export_dir: PathBuf,
    tool_router: ToolRouter<ClinlabService>,
}

impl ClinlabService {
    pub fn new(database_path: PathBuf, export_dir: PathBuf, database: Database) -> Self {
        Self {
            status_tracker: Arc::new(Mutex::new(StatusTracker::new(database_path, export_dir.clone()))),
            database,
            export_dir,
            tool_router: Self::tool_router(),
        }
    }
}

fn json_result<T: Serialize>(value: &T) -> Result<CallToolResult, McpError> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| McpError::internal_error(format!("Serialization error: {}", e), None))?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}

fn not_found(what: &str, id: impl std::fmt::Display) -> Result<CallToolResult, McpError> {
    Ok(CallToolResult::success(vec![Content::text(format!(
        r#"{{"error": "{} not found", "id": {}}}"#,
        what, id
    ))]))
}

// ============================================================================
// Patient Parameter Structs
// ============================================================================

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct RegisterPatientParams {
    /// National ID / document number (unique)
    pub document: String,
    pub first_names: String,
    pub last_names: Option<String>,
    pub age: Option<i64>,
    /// M, F or O
    pub sex: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct GetPatientParams {
    pub id: Option<i64>,
    pub document: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct SearchPatientsParams {
    pub query: String,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct ListPatientsParams {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

// ============================================================================
// Catalog Parameter Structs
// ============================================================================

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct NameParams {
    pub name: String,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct AddDoctorParams {
    pub name: String,
    pub email: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct AddExamParams {
    /// Short unique code, e.g. "GLU"
    pub code: String,
    pub name: String,
    pub category_id: Option<i64>,
    /// simple (default), compuesto or hibrido
    pub exam_type: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct AddExamFieldParams {
    pub exam_id: i64,
    pub name: String,
    pub unit: Option<String>,
    /// e.g. "12-16", "<200", ">40"
    pub reference_range: Option<String>,
    pub position: Option<i64>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct IdParams {
    pub id: i64,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct ListCatalogParams {
    #[serde(default = "default_true")]
    pub active_exams_only: bool,
}

fn default_true() -> bool { true }

// ============================================================================
// Request Parameter Structs
// ============================================================================

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct CreateRequestParams {
    pub patient_id: i64,
    /// Request date (YYYY-MM-DD)
    pub date: String,
    pub exam_ids: Vec<i64>,
    pub service_id: Option<i64>,
    /// Requesting doctor (user id)
    pub doctor_id: Option<i64>,
    /// Generated when omitted
    pub receipt_number: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct ListRequestsParams {
    pub start_date: String,
    pub end_date: String,
    pub patient_id: Option<i64>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct UpdateExamStatusParams {
    pub detail_id: i64,
    /// pendiente, en_proceso or completado
    pub status: String,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct SetExamResultParams {
    pub detail_id: i64,
    pub result: Option<String>,
    pub observations: Option<String>,
    /// Mark the exam as completed
    #[serde(default)]
    pub complete: bool,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct ResultValueParams {
    pub field_id: i64,
    pub value: String,
    /// Computed from the field's reference range when omitted
    pub out_of_range: Option<bool>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct RecordResultValuesParams {
    pub detail_id: i64,
    pub values: Vec<ResultValueParams>,
    #[serde(default)]
    pub complete: bool,
}

// ============================================================================
// Report Parameter Structs
// ============================================================================

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct ReportDataParams {
    pub start_date: String,
    pub end_date: String,
    /// Length of the top patient/exam/doctor lists (default 10)
    pub top_n: Option<usize>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct ExportReportParams {
    /// general, pacientes, examenes, doctores or resultados
    #[serde(default = "default_report_type")]
    pub report_type: String,
    pub start_date: String,
    pub end_date: String,
    pub top_n: Option<usize>,
}

fn default_report_type() -> String { "general".to_string() }

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct ExportPatientResultsParams {
    /// All patients with requests in the range when omitted
    pub patient_id: Option<i64>,
    pub start_date: String,
    pub end_date: String,
}

// ============================================================================
// Tool Router
// ============================================================================

#[tool_router]
impl ClinlabService {
    // --- Status ---

    #[tool(description = "Get the current status of the clinlab service including build info, database status, export directory, and process information")]
    async fn clinlab_status(&self) -> Result<CallToolResult, McpError> {
        let tracker = self.status_tracker.lock().await;
        let status = tracker.get_status();
        json_result(&status)
    }

    #[tool(description = "Get instructions for registering requests, recording results and exporting reports. Call this when starting a session or when unsure how to use the laboratory tools.")]
    fn lab_instructions(&self) -> Result<CallToolResult, McpError> {
        use crate::tools::status::LAB_INSTRUCTIONS;
        Ok(CallToolResult::success(vec![Content::text(LAB_INSTRUCTIONS)]))
    }

    // --- Patients ---

    #[tool(description = "Register a new patient. The sequential patient code is assigned automatically.")]
    fn register_patient(&self, Parameters(p): Parameters<RegisterPatientParams>) -> Result<CallToolResult, McpError> {
        let result = patients::register_patient(
            &self.database,
            &p.document,
            &p.first_names,
            p.last_names.as_deref(),
            p.age,
            p.sex.as_deref(),
            p.phone.as_deref(),
        )
        .map_err(|e| McpError::internal_error(e, None))?;
        json_result(&result)
    }

    #[tool(description = "Get a patient by id or document number")]
    fn get_patient(&self, Parameters(p): Parameters<GetPatientParams>) -> Result<CallToolResult, McpError> {
        let result = patients::get_patient(&self.database, p.id, p.document.as_deref())
            .map_err(|e| McpError::internal_error(e, None))?;
        match result {
            Some(patient) => json_result(&patient),
            None => not_found("Patient", p.id.map(|id| id.to_string()).unwrap_or_else(|| "null".into())),
        }
    }

    #[tool(description = "Search patients by names, last names or document number")]
    fn search_patients(&self, Parameters(p): Parameters<SearchPatientsParams>) -> Result<CallToolResult, McpError> {
        let result = patients::search_patients(&self.database, &p.query, p.limit)
            .map_err(|e| McpError::internal_error(e, None))?;
        json_result(&result)
    }

    #[tool(description = "List patients ordered by patient code, with pagination")]
    fn list_patients(&self, Parameters(p): Parameters<ListPatientsParams>) -> Result<CallToolResult, McpError> {
        let result = patients::list_patients(&self.database, p.limit, p.offset)
            .map_err(|e| McpError::internal_error(e, None))?;
        json_result(&result)
    }

    // --- Catalog ---

    #[tool(description = "Add an exam category (e.g. Hematología, Bioquímica)")]
    fn add_category(&self, Parameters(p): Parameters<NameParams>) -> Result<CallToolResult, McpError> {
        let result = catalog::add_category(&self.database, &p.name).map_err(|e| McpError::internal_error(e, None))?;
        json_result(&result)
    }

    #[tool(description = "Add a hospital service (e.g. Emergencia, Consulta Externa)")]
    fn add_service(&self, Parameters(p): Parameters<NameParams>) -> Result<CallToolResult, McpError> {
        let result = catalog::add_service(&self.database, &p.name).map_err(|e| McpError::internal_error(e, None))?;
        json_result(&result)
    }

    #[tool(description = "Add a requesting doctor")]
    fn add_doctor(&self, Parameters(p): Parameters<AddDoctorParams>) -> Result<CallToolResult, McpError> {
        let result = catalog::add_doctor(&self.database, &p.name, p.email.as_deref())
            .map_err(|e| McpError::internal_error(e, None))?;
        json_result(&result)
    }

    #[tool(description = "Add an exam to the catalog. Type is simple (one direct result), compuesto (named fields) or hibrido (both).")]
    fn add_exam(&self, Parameters(p): Parameters<AddExamParams>) -> Result<CallToolResult, McpError> {
        let result = catalog::add_exam(&self.database, &p.code, &p.name, p.category_id, p.exam_type.as_deref())
            .map_err(|e| McpError::internal_error(e, None))?;
        json_result(&result)
    }

    #[tool(description = "Add a named field with unit and reference range to a compound or hybrid exam")]
    fn add_exam_field(&self, Parameters(p): Parameters<AddExamFieldParams>) -> Result<CallToolResult, McpError> {
        let result = catalog::add_exam_field(
            &self.database,
            p.exam_id,
            &p.name,
            p.unit.as_deref(),
            p.reference_range.as_deref(),
            p.position,
        )
        .map_err(|e| McpError::internal_error(e, None))?;
        json_result(&result)
    }

    #[tool(description = "Get an exam with its fields")]
    fn get_exam(&self, Parameters(p): Parameters<IdParams>) -> Result<CallToolResult, McpError> {
        let result = catalog::get_exam(&self.database, p.id).map_err(|e| McpError::internal_error(e, None))?;
        match result {
            Some(exam) => json_result(&exam),
            None => not_found("Exam", p.id),
        }
    }

    #[tool(description = "List categories, services, doctors and exams")]
    fn list_catalog(&self, Parameters(p): Parameters<ListCatalogParams>) -> Result<CallToolResult, McpError> {
        let result = catalog::list_catalog(&self.database, p.active_exams_only)
            .map_err(|e| McpError::internal_error(e, None))?;
        json_result(&result)
    }

    // --- Requests ---

    #[tool(description = "Create a lab request for a patient with a list of exam ids. Every exam starts as pendiente.")]
    fn create_request(&self, Parameters(p): Parameters<CreateRequestParams>) -> Result<CallToolResult, McpError> {
        let result = requests::create_request(
            &self.database,
            p.patient_id,
            &p.date,
            p.exam_ids,
            p.service_id,
            p.doctor_id,
            p.receipt_number.as_deref(),
        )
        .map_err(|e| McpError::internal_error(e, None))?;
        json_result(&result)
    }

    #[tool(description = "Get a request with its exam details and result values")]
    fn get_request(&self, Parameters(p): Parameters<IdParams>) -> Result<CallToolResult, McpError> {
        let result = requests::get_request(&self.database, p.id).map_err(|e| McpError::internal_error(e, None))?;
        match result {
            Some(request) => json_result(&request),
            None => not_found("Request", p.id),
        }
    }

    #[tool(description = "List requests in an inclusive date range (YYYY-MM-DD), newest first, optionally for one patient")]
    fn list_requests(&self, Parameters(p): Parameters<ListRequestsParams>) -> Result<CallToolResult, McpError> {
        let result = requests::list_requests(&self.database, &p.start_date, &p.end_date, p.patient_id)
            .map_err(|e| McpError::internal_error(e, None))?;
        json_result(&result)
    }

    #[tool(description = "Change the status of one exam in a request (pendiente, en_proceso, completado). The request status is recomputed.")]
    fn update_exam_status(&self, Parameters(p): Parameters<UpdateExamStatusParams>) -> Result<CallToolResult, McpError> {
        let result = requests::update_exam_status(&self.database, p.detail_id, &p.status)
            .map_err(|e| McpError::internal_error(e, None))?;
        json_result(&result)
    }

    #[tool(description = "Record the direct result and observations of an exam; complete=true marks it completado")]
    fn set_exam_result(&self, Parameters(p): Parameters<SetExamResultParams>) -> Result<CallToolResult, McpError> {
        let result = requests::set_exam_result(
            &self.database,
            p.detail_id,
            p.result.as_deref(),
            p.observations.as_deref(),
            p.complete,
        )
        .map_err(|e| McpError::internal_error(e, None))?;
        json_result(&result)
    }

    #[tool(description = "Record field values of a compound exam. Out-of-range flags are computed from each field's reference range unless given.")]
    fn record_result_values(&self, Parameters(p): Parameters<RecordResultValuesParams>) -> Result<CallToolResult, McpError> {
        let values = p
            .values
            .into_iter()
            .map(|v| ResultValueCreate { field_id: v.field_id, value: v.value, out_of_range: v.out_of_range })
            .collect();
        let result = requests::record_result_values(&self.database, p.detail_id, values, p.complete)
            .map_err(|e| McpError::internal_error(e, None))?;
        json_result(&result)
    }

    // --- Reports ---

    #[tool(description = "Compute report statistics for a date range: totals, status/gender/age/category/service distributions, top patients, exams and doctors, and the daily series")]
    fn get_report_data(&self, Parameters(p): Parameters<ReportDataParams>) -> Result<CallToolResult, McpError> {
        let result = reports::get_report_data(&self.database, &p.start_date, &p.end_date, p.top_n)
            .map_err(|e| McpError::internal_error(e, None))?;
        json_result(&result)
    }

    #[tool(description = "Export an Excel report for a date range. report_type: general, pacientes, examenes, doctores or resultados. Returns the file path and the sheets written.")]
    fn export_report(&self, Parameters(p): Parameters<ExportReportParams>) -> Result<CallToolResult, McpError> {
        let result = reports::export_report(
            &self.database,
            &self.export_dir,
            &p.report_type,
            &p.start_date,
            &p.end_date,
            p.top_n,
        )
        .map_err(|e| McpError::internal_error(e, None))?;
        json_result(&result)
    }

    #[tool(description = "Export an Excel workbook with the results of one patient, or of every patient with requests in the date range")]
    fn export_patient_results(&self, Parameters(p): Parameters<ExportPatientResultsParams>) -> Result<CallToolResult, McpError> {
        let result = reports::export_patient_results(
            &self.database,
            &self.export_dir,
            p.patient_id,
            &p.start_date,
            &p.end_date,
        )
        .map_err(|e| McpError::internal_error(e, None))?;
        json_result(&result)
    }
}

// ============================================================================
// Server Handler
// ============================================================================

#[tool_handler]
impl ServerHandler for ClinlabService {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "clinlab".into(),
                version: crate::build_info::VERSION.into(),
                title: Some("Clinical Laboratory Reporting".into()),
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "Clinical laboratory requests, results and Excel reports. \
                 IMPORTANT: Call lab_instructions before the first request or report. \
                 Patients: register_patient/get_patient/search_patients/list_patients. \
                 Catalog: add_category/add_service/add_doctor/add_exam/add_exam_field/get_exam/list_catalog. \
                 Requests: create_request/get_request/list_requests. \
                 Results: update_exam_status/set_exam_result/record_result_values. \
                 Reports: get_report_data/export_report/export_patient_results. \
                 Dates are YYYY-MM-DD and ranges are inclusive."
                    .into(),
            ),
        }
    }
}
