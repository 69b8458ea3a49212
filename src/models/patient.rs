//! Patient model
//!
//! Patients are registered once and referenced by every request. The
//! sequential `codigo` is assigned by a database trigger on insert.

use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};

use crate::db::{DbError, DbResult};

/// Patient sex as stored in `pacientes.sexo`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Sex {
    #[serde(rename = "M")]
    Male,
    #[serde(rename = "F")]
    Female,
    #[serde(rename = "O")]
    Other,
}

impl Sex {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sex::Male => "M",
            Sex::Female => "F",
            Sex::Other => "O",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "m" | "masculino" | "male" | "hombre" => Some(Sex::Male),
            "f" | "femenino" | "female" | "mujer" => Some(Sex::Female),
            "o" | "otro" | "other" => Some(Sex::Other),
            _ => None,
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Sex::Male => "Masculino",
            Sex::Female => "Femenino",
            Sex::Other => "Otro",
        }
    }
}

/// A registered patient
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Patient {
    pub id: i64,
    pub codigo: Option<i64>,
    pub document: String,
    pub first_names: String,
    pub last_names: Option<String>,
    pub age: Option<i64>,
    pub sex: Option<Sex>,
    pub phone: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Data for registering a patient
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatientCreate {
    pub document: String,
    pub first_names: String,
    pub last_names: Option<String>,
    pub age: Option<i64>,
    pub sex: Option<Sex>,
    pub phone: Option<String>,
}

impl Patient {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        let sex: Option<String> = row.get("sexo")?;
        Ok(Self {
            id: row.get("id")?,
            codigo: row.get("codigo")?,
            document: row.get("documento")?,
            first_names: row.get("nombres")?,
            last_names: row.get("apellidos")?,
            age: row.get("edad")?,
            sex: sex.as_deref().and_then(Sex::from_str),
            phone: row.get("telefono")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }

    /// Full display name ("nombres apellidos")
    pub fn full_name(&self) -> String {
        match &self.last_names {
            Some(last) if !last.trim().is_empty() => {
                format!("{} {}", self.first_names.trim(), last.trim())
            }
            _ => self.first_names.trim().to_string(),
        }
    }

    /// Register a new patient
    pub fn create(conn: &Connection, data: &PatientCreate) -> DbResult<Self> {
        if data.document.trim().is_empty() {
            return Err(DbError::Validation("document number is required".into()));
        }
        if data.first_names.trim().is_empty() {
            return Err(DbError::Validation("patient names are required".into()));
        }

        conn.execute(
            r#"
            INSERT INTO pacientes (documento, nombres, apellidos, edad, sexo, telefono)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                data.document.trim(),
                data.first_names.trim(),
                data.last_names,
                data.age,
                data.sex.map(|s| s.as_str()),
                data.phone,
            ],
        )?;

        let id = conn.last_insert_rowid();
        Self::get_by_id(conn, id)?.ok_or_else(|| DbError::NotFound(format!("Patient {}", id)))
    }

    pub fn get_by_id(conn: &Connection, id: i64) -> DbResult<Option<Self>> {
        let mut stmt = conn.prepare("SELECT * FROM pacientes WHERE id = ?1")?;

        match stmt.query_row([id], Self::from_row) {
            Ok(patient) => Ok(Some(patient)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn get_by_document(conn: &Connection, document: &str) -> DbResult<Option<Self>> {
        let mut stmt = conn.prepare("SELECT * FROM pacientes WHERE documento = ?1")?;

        match stmt.query_row([document.trim()], Self::from_row) {
            Ok(patient) => Ok(Some(patient)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Search by names, last names or document number
    pub fn search(conn: &Connection, query: &str, limit: i64) -> DbResult<Vec<Self>> {
        let pattern = format!("%{}%", query.trim());
        let mut stmt = conn.prepare(
            r#"
            SELECT * FROM pacientes
            WHERE nombres LIKE ?1 OR apellidos LIKE ?1 OR documento LIKE ?1
            ORDER BY nombres, apellidos
            LIMIT ?2
            "#,
        )?;

        let patients = stmt
            .query_map(params![pattern, limit], Self::from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(patients)
    }

    /// List patients ordered by code
    pub fn list(conn: &Connection, limit: i64, offset: i64) -> DbResult<Vec<Self>> {
        let mut stmt =
            conn.prepare("SELECT * FROM pacientes ORDER BY codigo LIMIT ?1 OFFSET ?2")?;

        let patients = stmt
            .query_map(params![limit, offset], Self::from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(patients)
    }
}
