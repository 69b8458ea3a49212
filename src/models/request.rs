//! Request model (solicitudes)
//!
//! A lab order linking a patient, a date, a service, the requesting doctor,
//! and one or more exams.

use chrono::NaiveDate;
use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};

use super::exam_detail::{ExamDetail, ExamStatus};
use crate::db::{DbError, DbResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    pub id: i64,
    pub date: String,
    pub receipt_number: String,
    pub status: ExamStatus,
    pub service_id: Option<i64>,
    pub patient_id: i64,
    pub user_id: Option<i64>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestCreate {
    /// ISO date: "2025-01-09"
    pub date: String,
    /// Generated when absent
    pub receipt_number: Option<String>,
    pub service_id: Option<i64>,
    pub patient_id: i64,
    pub user_id: Option<i64>,
    pub exam_ids: Vec<i64>,
}

impl Request {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            date: row.get("fecha")?,
            receipt_number: row.get("numero_recibo")?,
            status: row.get("estado")?,
            service_id: row.get("servicio_id")?,
            patient_id: row.get("paciente_id")?,
            user_id: row.get("user_id")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }

    /// Create a request with one pending detail per exam
    pub fn create(conn: &mut Connection, data: &RequestCreate) -> DbResult<Self> {
        let date = NaiveDate::parse_from_str(data.date.trim(), "%Y-%m-%d")
            .map_err(|_| DbError::Validation(format!("invalid request date '{}'", data.date)))?;

        if data.exam_ids.is_empty() {
            return Err(DbError::Validation("a request needs at least one exam".into()));
        }

        let tx = conn.transaction()?;

        let receipt = match &data.receipt_number {
            Some(r) if !r.trim().is_empty() => r.trim().to_string(),
            _ => {
                let next: i64 = tx.query_row(
                    "SELECT COALESCE(MAX(id), 0) + 1 FROM solicitudes",
                    [],
                    |row| row.get(0),
                )?;
                format!("R{}-{:06}", date.format("%Y%m%d"), next)
            }
        };

        tx.execute(
            r#"
            INSERT INTO solicitudes (fecha, numero_recibo, servicio_id, paciente_id, user_id)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                date.format("%Y-%m-%d").to_string(),
                receipt,
                data.service_id,
                data.patient_id,
                data.user_id,
            ],
        )?;
        let id = tx.last_insert_rowid();

        for exam_id in &data.exam_ids {
            ExamDetail::create(&tx, id, *exam_id)?;
        }

        tx.commit()?;

        Self::get_by_id(conn, id)?.ok_or_else(|| DbError::NotFound(format!("Request {}", id)))
    }

    pub fn get_by_id(conn: &Connection, id: i64) -> DbResult<Option<Self>> {
        let mut stmt = conn.prepare("SELECT * FROM solicitudes WHERE id = ?1")?;
        match stmt.query_row([id], Self::from_row) {
            Ok(r) => Ok(Some(r)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// List requests within an inclusive date range, newest first
    pub fn list_by_date_range(
        conn: &Connection,
        start_date: &str,
        end_date: &str,
        patient_id: Option<i64>,
    ) -> DbResult<Vec<Self>> {
        let mut stmt = conn.prepare(
            r#"
            SELECT * FROM solicitudes
            WHERE fecha >= ?1 AND fecha <= ?2
              AND (?3 IS NULL OR paciente_id = ?3)
            ORDER BY fecha DESC, id DESC
            "#,
        )?;

        let requests = stmt
            .query_map(params![start_date, end_date, patient_id], Self::from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(requests)
    }

    /// Recompute the request status from its details
    pub fn refresh_status(conn: &Connection, id: i64) -> DbResult<ExamStatus> {
        let mut stmt = conn.prepare("SELECT estado FROM detallesolicitud WHERE solicitud_id = ?1")?;
        let statuses = stmt
            .query_map([id], |row| row.get::<_, ExamStatus>(0))?
            .collect::<Result<Vec<_>, _>>()?;

        let status = ExamStatus::rollup(&statuses);
        conn.execute(
            "UPDATE solicitudes SET estado = ?1, updated_at = datetime('now') WHERE id = ?2",
            params![status.as_str(), id],
        )?;

        Ok(status)
    }
}
