//! Catalog models
//!
//! Exam categories, hospital services, and the users (doctors) who place requests.

use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};

use crate::db::{DbError, DbResult};

/// Exam category (Hematología, Bioquímica, ...)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub created_at: String,
}

impl Category {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            name: row.get("nombre")?,
            created_at: row.get("created_at")?,
        })
    }

    pub fn create(conn: &Connection, name: &str) -> DbResult<Self> {
        conn.execute("INSERT INTO categorias (nombre) VALUES (?1)", [name.trim()])?;
        let id = conn.last_insert_rowid();
        Self::get_by_id(conn, id)?.ok_or_else(|| DbError::NotFound(format!("Category {}", id)))
    }

    pub fn get_by_id(conn: &Connection, id: i64) -> DbResult<Option<Self>> {
        let mut stmt = conn.prepare("SELECT * FROM categorias WHERE id = ?1")?;
        match stmt.query_row([id], Self::from_row) {
            Ok(c) => Ok(Some(c)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn list(conn: &Connection) -> DbResult<Vec<Self>> {
        let mut stmt = conn.prepare("SELECT * FROM categorias ORDER BY nombre")?;
        let rows = stmt
            .query_map([], Self::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

/// Hospital service a request originates from (Emergencia, Consulta Externa, ...)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Service {
    pub id: i64,
    pub name: String,
    pub created_at: String,
}

impl Service {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            name: row.get("nombre")?,
            created_at: row.get("created_at")?,
        })
    }

    pub fn create(conn: &Connection, name: &str) -> DbResult<Self> {
        conn.execute("INSERT INTO servicios (nombre) VALUES (?1)", [name.trim()])?;
        let id = conn.last_insert_rowid();
        Self::get_by_id(conn, id)?.ok_or_else(|| DbError::NotFound(format!("Service {}", id)))
    }

    pub fn get_by_id(conn: &Connection, id: i64) -> DbResult<Option<Self>> {
        let mut stmt = conn.prepare("SELECT * FROM servicios WHERE id = ?1")?;
        match stmt.query_row([id], Self::from_row) {
            Ok(s) => Ok(Some(s)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn list(conn: &Connection) -> DbResult<Vec<Self>> {
        let mut stmt = conn.prepare("SELECT * FROM servicios ORDER BY nombre")?;
        let rows = stmt
            .query_map([], Self::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

/// User role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Doctor,
    Laboratorista,
    Recepcionista,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Doctor => "doctor",
            Role::Laboratorista => "laboratorista",
            Role::Recepcionista => "recepcionista",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "admin" | "administrador" => Role::Admin,
            "laboratorista" | "lab" => Role::Laboratorista,
            "recepcionista" | "recepcion" => Role::Recepcionista,
            _ => Role::Doctor,
        }
    }
}

/// A system user; doctors are the ones who place requests
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: Option<String>,
    pub role: Role,
    pub created_at: String,
}

impl User {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        let role: String = row.get("rol")?;
        Ok(Self {
            id: row.get("id")?,
            name: row.get("nombre")?,
            email: row.get("email")?,
            role: Role::from_str(&role),
            created_at: row.get("created_at")?,
        })
    }

    pub fn create(conn: &Connection, name: &str, email: Option<&str>, role: Role) -> DbResult<Self> {
        conn.execute(
            "INSERT INTO users (nombre, email, rol) VALUES (?1, ?2, ?3)",
            params![name.trim(), email, role.as_str()],
        )?;
        let id = conn.last_insert_rowid();
        Self::get_by_id(conn, id)?.ok_or_else(|| DbError::NotFound(format!("User {}", id)))
    }

    pub fn get_by_id(conn: &Connection, id: i64) -> DbResult<Option<Self>> {
        let mut stmt = conn.prepare("SELECT * FROM users WHERE id = ?1")?;
        match stmt.query_row([id], Self::from_row) {
            Ok(u) => Ok(Some(u)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn list_by_role(conn: &Connection, role: Role) -> DbResult<Vec<Self>> {
        let mut stmt = conn.prepare("SELECT * FROM users WHERE rol = ?1 ORDER BY nombre")?;
        let rows = stmt
            .query_map([role.as_str()], Self::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}
