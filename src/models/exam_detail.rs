//! Exam detail model (detallesolicitud)
//!
//! One exam within one request, with its own status, direct result and
//! observations. Status changes roll up into the owning request.

use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};

use crate::db::{DbError, DbResult};

/// Processing status shared by exam details and requests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExamStatus {
    Pendiente,
    EnProceso,
    Completado,
}

impl ExamStatus {
    pub const ALL: [ExamStatus; 3] = [
        ExamStatus::Pendiente,
        ExamStatus::EnProceso,
        ExamStatus::Completado,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ExamStatus::Pendiente => "pendiente",
            ExamStatus::EnProceso => "en_proceso",
            ExamStatus::Completado => "completado",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().replace([' ', '-'], "_").as_str() {
            "pendiente" | "pending" => Some(ExamStatus::Pendiente),
            "en_proceso" | "in_process" | "in_progress" | "proceso" => Some(ExamStatus::EnProceso),
            "completado" | "completed" | "done" => Some(ExamStatus::Completado),
            _ => None,
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            ExamStatus::Pendiente => "Pendiente",
            ExamStatus::EnProceso => "En proceso",
            ExamStatus::Completado => "Completado",
        }
    }

    /// Forward moves are allowed, and any status may be toggled back to
    /// pendiente. Completed work cannot drop back to en_proceso.
    pub fn can_transition_to(&self, next: ExamStatus) -> bool {
        next >= *self || next == ExamStatus::Pendiente
    }

    /// Status of a request given the statuses of its exams
    pub fn rollup(statuses: &[ExamStatus]) -> ExamStatus {
        if statuses.is_empty() {
            return ExamStatus::Pendiente;
        }
        if statuses.iter().all(|s| *s == ExamStatus::Completado) {
            ExamStatus::Completado
        } else if statuses.iter().all(|s| *s == ExamStatus::Pendiente) {
            ExamStatus::Pendiente
        } else {
            ExamStatus::EnProceso
        }
    }
}

impl rusqlite::types::FromSql for ExamStatus {
    fn column_result(value: rusqlite::types::ValueRef<'_>) -> rusqlite::types::FromSqlResult<Self> {
        let s = value.as_str()?;
        ExamStatus::from_str(s).ok_or_else(|| {
            rusqlite::types::FromSqlError::Other(format!("unknown status '{}'", s).into())
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExamDetail {
    pub id: i64,
    pub request_id: i64,
    pub exam_id: i64,
    pub status: ExamStatus,
    pub result: Option<String>,
    pub observations: Option<String>,
    pub completed_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Exam detail joined with its exam definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExamDetailView {
    pub id: i64,
    pub request_id: i64,
    pub exam_id: i64,
    pub exam_code: String,
    pub exam_name: String,
    pub exam_type: String,
    pub status: ExamStatus,
    pub result: Option<String>,
    pub observations: Option<String>,
    pub completed_at: Option<String>,
}

impl ExamDetail {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            request_id: row.get("solicitud_id")?,
            exam_id: row.get("examen_id")?,
            status: row.get("estado")?,
            result: row.get("resultado")?,
            observations: row.get("observaciones")?,
            completed_at: row.get("fecha_realizacion")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }

    /// Add an exam to a request as a pending detail
    pub fn create(conn: &Connection, request_id: i64, exam_id: i64) -> DbResult<Self> {
        conn.execute(
            "INSERT INTO detallesolicitud (solicitud_id, examen_id) VALUES (?1, ?2)",
            params![request_id, exam_id],
        )?;
        let id = conn.last_insert_rowid();
        Self::get_by_id(conn, id)?.ok_or_else(|| DbError::NotFound(format!("Exam detail {}", id)))
    }

    pub fn get_by_id(conn: &Connection, id: i64) -> DbResult<Option<Self>> {
        let mut stmt = conn.prepare("SELECT * FROM detallesolicitud WHERE id = ?1")?;
        match stmt.query_row([id], Self::from_row) {
            Ok(d) => Ok(Some(d)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn list_by_request(conn: &Connection, request_id: i64) -> DbResult<Vec<ExamDetailView>> {
        let mut stmt = conn.prepare(
            r#"
            SELECT d.id, d.solicitud_id, d.examen_id, e.codigo, e.nombre, e.tipo,
                   d.estado, d.resultado, d.observaciones, d.fecha_realizacion
            FROM detallesolicitud d
            JOIN examenes e ON e.id = d.examen_id
            WHERE d.solicitud_id = ?1
            ORDER BY d.id
            "#,
        )?;

        let rows = stmt
            .query_map([request_id], |row| {
                Ok(ExamDetailView {
                    id: row.get(0)?,
                    request_id: row.get(1)?,
                    exam_id: row.get(2)?,
                    exam_code: row.get(3)?,
                    exam_name: row.get(4)?,
                    exam_type: row.get(5)?,
                    status: row.get(6)?,
                    result: row.get(7)?,
                    observations: row.get(8)?,
                    completed_at: row.get(9)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(rows)
    }

    /// Change the status of a detail and roll the change up into its request.
    ///
    /// Completing stamps `fecha_realizacion`; leaving completado clears it.
    pub fn update_status(conn: &Connection, id: i64, next: ExamStatus) -> DbResult<Self> {
        let current = Self::get_by_id(conn, id)?
            .ok_or_else(|| DbError::NotFound(format!("Exam detail {}", id)))?;

        if !current.status.can_transition_to(next) {
            return Err(DbError::InvalidTransition {
                from: current.status.as_str().to_string(),
                to: next.as_str().to_string(),
            });
        }

        if current.status != next {
            let completed_at = match next {
                ExamStatus::Completado => Some(
                    current
                        .completed_at
                        .clone()
                        .unwrap_or_else(|| chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string()),
                ),
                _ => None,
            };

            conn.execute(
                r#"
                UPDATE detallesolicitud
                SET estado = ?1, fecha_realizacion = ?2, updated_at = datetime('now')
                WHERE id = ?3
                "#,
                params![next.as_str(), completed_at, id],
            )?;

            tracing::info!(
                detail_id = id,
                from = current.status.as_str(),
                to = next.as_str(),
                "exam status changed"
            );

            crate::models::Request::refresh_status(conn, current.request_id)?;
        }

        Self::get_by_id(conn, id)?.ok_or_else(|| DbError::NotFound(format!("Exam detail {}", id)))
    }

    /// Record the direct result (and observations) of a detail.
    ///
    /// When `complete` is set the detail is moved to completado.
    pub fn set_result(
        conn: &Connection,
        id: i64,
        result: Option<&str>,
        observations: Option<&str>,
        complete: bool,
    ) -> DbResult<Self> {
        let rows = conn.execute(
            r#"
            UPDATE detallesolicitud
            SET resultado = COALESCE(?1, resultado),
                observaciones = COALESCE(?2, observaciones),
                updated_at = datetime('now')
            WHERE id = ?3
            "#,
            params![result, observations, id],
        )?;

        if rows == 0 {
            return Err(DbError::NotFound(format!("Exam detail {}", id)));
        }

        if complete {
            return Self::update_status(conn, id, ExamStatus::Completado);
        }

        Self::get_by_id(conn, id)?.ok_or_else(|| DbError::NotFound(format!("Exam detail {}", id)))
    }
}
