//! Report dataset
//!
//! Typed rows assembled from the database for one date range. Everything
//! downstream (aggregation, sheets) reads these rows and never touches SQL.

use rusqlite::{params, Connection};
use serde::Serialize;

use super::DateRange;
use crate::db::DbResult;
use crate::models::{ExamStatus, ResultValueView, Sex};

/// A patient with activity counts inside the range
#[derive(Debug, Clone, Serialize)]
pub struct PatientRow {
    pub id: i64,
    pub codigo: Option<i64>,
    pub document: Option<String>,
    pub full_name: Option<String>,
    pub age: Option<i64>,
    pub sex: Option<Sex>,
    pub phone: Option<String>,
    pub request_count: i64,
    pub exam_count: i64,
    pub last_visit: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RequestRow {
    pub id: i64,
    pub date: String,
    pub receipt_number: String,
    pub status: ExamStatus,
    pub patient_id: i64,
    pub service_name: Option<String>,
    pub doctor_id: Option<i64>,
    pub doctor_name: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DetailRow {
    pub id: i64,
    pub request_id: i64,
    pub patient_id: i64,
    pub request_date: String,
    pub exam_id: i64,
    pub exam_code: String,
    pub exam_name: String,
    pub category_name: Option<String>,
    pub status: ExamStatus,
    pub result: Option<String>,
    pub observations: Option<String>,
    pub completed_at: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportDataset {
    pub range: DateRange,
    pub patients: Vec<PatientRow>,
    pub requests: Vec<RequestRow>,
    pub details: Vec<DetailRow>,
    pub values: Vec<ResultValueView>,
}

impl ReportDataset {
    /// Load every row the report sections need for `range`
    pub fn load(conn: &Connection, range: &DateRange) -> DbResult<Self> {
        let (start, end) = range.sql_bounds();
        Ok(Self {
            range: range.clone(),
            patients: load_patients(conn, &start, &end)?,
            requests: load_requests(conn, &start, &end)?,
            details: load_details(conn, &start, &end)?,
            values: load_values(conn, &start, &end)?,
        })
    }

    /// Restrict the dataset to one patient
    pub fn for_patient(&self, patient_id: i64) -> Self {
        Self {
            range: self.range.clone(),
            patients: self.patients.iter().filter(|p| p.id == patient_id).cloned().collect(),
            requests: self.requests.iter().filter(|r| r.patient_id == patient_id).cloned().collect(),
            details: self.details.iter().filter(|d| d.patient_id == patient_id).cloned().collect(),
            values: {
                let ids: std::collections::HashSet<i64> = self
                    .details
                    .iter()
                    .filter(|d| d.patient_id == patient_id)
                    .map(|d| d.id)
                    .collect();
                self.values.iter().filter(|v| ids.contains(&v.detail_id)).cloned().collect()
            },
        }
    }

    pub fn is_empty(&self) -> bool {
        self.patients.is_empty() && self.requests.is_empty() && self.details.is_empty()
    }
}

fn load_patients(conn: &Connection, start: &str, end: &str) -> DbResult<Vec<PatientRow>> {
    let mut stmt = conn.prepare(
        r#"
        SELECT p.id, p.codigo, p.documento,
               TRIM(p.nombres || ' ' || COALESCE(p.apellidos, '')) AS nombre_completo,
               p.edad, p.sexo, p.telefono,
               (SELECT COUNT(*) FROM solicitudes s
                 WHERE s.paciente_id = p.id AND s.fecha >= ?1 AND s.fecha <= ?2) AS total_solicitudes,
               (SELECT COUNT(*) FROM detallesolicitud d
                 JOIN solicitudes s ON s.id = d.solicitud_id
                 WHERE s.paciente_id = p.id AND s.fecha >= ?1 AND s.fecha <= ?2) AS total_examenes,
               (SELECT MAX(s.fecha) FROM solicitudes s
                 WHERE s.paciente_id = p.id AND s.fecha >= ?1 AND s.fecha <= ?2) AS ultima_visita
        FROM pacientes p
        ORDER BY p.codigo, p.id
        "#,
    )?;

    let rows = stmt
        .query_map(params![start, end], |row| {
            let sex: Option<String> = row.get(5)?;
            let name: Option<String> = row.get(3)?;
            Ok(PatientRow {
                id: row.get(0)?,
                codigo: row.get(1)?,
                document: row.get(2)?,
                full_name: name.filter(|n| !n.trim().is_empty()),
                age: row.get(4)?,
                sex: sex.as_deref().and_then(Sex::from_str),
                phone: row.get(6)?,
                request_count: row.get(7)?,
                exam_count: row.get(8)?,
                last_visit: row.get(9)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(rows)
}

fn load_requests(conn: &Connection, start: &str, end: &str) -> DbResult<Vec<RequestRow>> {
    let mut stmt = conn.prepare(
        r#"
        SELECT s.id, s.fecha, s.numero_recibo, s.estado, s.paciente_id,
               sv.nombre, s.user_id, u.nombre
        FROM solicitudes s
        LEFT JOIN servicios sv ON sv.id = s.servicio_id
        LEFT JOIN users u ON u.id = s.user_id
        WHERE s.fecha >= ?1 AND s.fecha <= ?2
        ORDER BY s.fecha, s.id
        "#,
    )?;

    let rows = stmt
        .query_map(params![start, end], |row| {
            Ok(RequestRow {
                id: row.get(0)?,
                date: row.get(1)?,
                receipt_number: row.get(2)?,
                status: row.get(3)?,
                patient_id: row.get(4)?,
                service_name: row.get(5)?,
                doctor_id: row.get(6)?,
                doctor_name: row.get(7)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(rows)
}

fn load_details(conn: &Connection, start: &str, end: &str) -> DbResult<Vec<DetailRow>> {
    let mut stmt = conn.prepare(
        r#"
        SELECT d.id, d.solicitud_id, s.paciente_id, s.fecha, d.examen_id,
               e.codigo, e.nombre, c.nombre, d.estado, d.resultado,
               d.observaciones, d.fecha_realizacion
        FROM detallesolicitud d
        JOIN solicitudes s ON s.id = d.solicitud_id
        JOIN examenes e ON e.id = d.examen_id
        LEFT JOIN categorias c ON c.id = e.categoria_id
        WHERE s.fecha >= ?1 AND s.fecha <= ?2
        ORDER BY s.fecha, d.solicitud_id, d.id
        "#,
    )?;

    let rows = stmt
        .query_map(params![start, end], |row| {
            Ok(DetailRow {
                id: row.get(0)?,
                request_id: row.get(1)?,
                patient_id: row.get(2)?,
                request_date: row.get(3)?,
                exam_id: row.get(4)?,
                exam_code: row.get(5)?,
                exam_name: row.get(6)?,
                category_name: row.get(7)?,
                status: row.get(8)?,
                result: row.get(9)?,
                observations: row.get(10)?,
                completed_at: row.get(11)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(rows)
}

fn load_values(conn: &Connection, start: &str, end: &str) -> DbResult<Vec<ResultValueView>> {
    let mut stmt = conn.prepare(
        r#"
        SELECT v.detalle_solicitud_id, c.nombre, c.unidad, v.valor, v.valor_referencia, v.fuera_rango
        FROM valores_resultado v
        JOIN campos_examen c ON c.id = v.campo_examen_id
        JOIN detallesolicitud d ON d.id = v.detalle_solicitud_id
        JOIN solicitudes s ON s.id = d.solicitud_id
        WHERE s.fecha >= ?1 AND s.fecha <= ?2
        ORDER BY v.detalle_solicitud_id, c.orden, c.id
        "#,
    )?;

    let rows = stmt
        .query_map(params![start, end], ResultValueView::from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(rows)
}
