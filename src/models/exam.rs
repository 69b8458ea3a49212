//! Exam model
//!
//! Lab test definitions and the named fields of compound exams.

use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};

use crate::db::{DbError, DbResult};

/// Exam type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExamType {
    /// One direct result
    Simple,
    /// Composed of named fields (hemogram, lipid panel)
    Compuesto,
    /// Named fields plus a direct result
    Hibrido,
}

impl ExamType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExamType::Simple => "simple",
            ExamType::Compuesto => "compuesto",
            ExamType::Hibrido => "hibrido",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "compuesto" | "compound" => ExamType::Compuesto,
            "hibrido" | "híbrido" | "hybrid" => ExamType::Hibrido,
            _ => ExamType::Simple,
        }
    }

    /// Whether results are entered per field
    pub fn has_fields(&self) -> bool {
        !matches!(self, ExamType::Simple)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Exam {
    pub id: i64,
    pub code: String,
    pub name: String,
    pub category_id: Option<i64>,
    pub exam_type: ExamType,
    pub active: bool,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExamCreate {
    pub code: String,
    pub name: String,
    pub category_id: Option<i64>,
    pub exam_type: ExamType,
}

impl Exam {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        let exam_type: String = row.get("tipo")?;
        Ok(Self {
            id: row.get("id")?,
            code: row.get("codigo")?,
            name: row.get("nombre")?,
            category_id: row.get("categoria_id")?,
            exam_type: ExamType::from_str(&exam_type),
            active: row.get::<_, i64>("activo")? != 0,
            created_at: row.get("created_at")?,
        })
    }

    pub fn create(conn: &Connection, data: &ExamCreate) -> DbResult<Self> {
        conn.execute(
            "INSERT INTO examenes (codigo, nombre, categoria_id, tipo) VALUES (?1, ?2, ?3, ?4)",
            params![data.code.trim(), data.name.trim(), data.category_id, data.exam_type.as_str()],
        )?;
        let id = conn.last_insert_rowid();
        Self::get_by_id(conn, id)?.ok_or_else(|| DbError::NotFound(format!("Exam {}", id)))
    }

    pub fn get_by_id(conn: &Connection, id: i64) -> DbResult<Option<Self>> {
        let mut stmt = conn.prepare("SELECT * FROM examenes WHERE id = ?1")?;
        match stmt.query_row([id], Self::from_row) {
            Ok(e) => Ok(Some(e)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn list(conn: &Connection, active_only: bool) -> DbResult<Vec<Self>> {
        let sql = if active_only {
            "SELECT * FROM examenes WHERE activo = 1 ORDER BY nombre"
        } else {
            "SELECT * FROM examenes ORDER BY nombre"
        };
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt
            .query_map([], Self::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Fields of a compound exam, in display order
    pub fn fields(conn: &Connection, exam_id: i64) -> DbResult<Vec<ExamField>> {
        ExamField::list_by_exam(conn, exam_id)
    }
}

/// A named field of a compound exam (e.g. "Hemoglobina")
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExamField {
    pub id: i64,
    pub exam_id: i64,
    pub name: String,
    pub unit: Option<String>,
    pub reference_range: Option<String>,
    pub position: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExamFieldCreate {
    pub exam_id: i64,
    pub name: String,
    pub unit: Option<String>,
    pub reference_range: Option<String>,
    pub position: Option<i64>,
}

impl ExamField {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            exam_id: row.get("examen_id")?,
            name: row.get("nombre")?,
            unit: row.get("unidad")?,
            reference_range: row.get("valor_referencia")?,
            position: row.get("orden")?,
        })
    }

    pub fn create(conn: &Connection, data: &ExamFieldCreate) -> DbResult<Self> {
        let position = match data.position {
            Some(p) => p,
            None => conn.query_row(
                "SELECT COALESCE(MAX(orden), 0) + 1 FROM campos_examen WHERE examen_id = ?1",
                [data.exam_id],
                |row| row.get(0),
            )?,
        };

        conn.execute(
            r#"
            INSERT INTO campos_examen (examen_id, nombre, unidad, valor_referencia, orden)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![data.exam_id, data.name.trim(), data.unit, data.reference_range, position],
        )?;
        let id = conn.last_insert_rowid();
        Self::get_by_id(conn, id)?.ok_or_else(|| DbError::NotFound(format!("Exam field {}", id)))
    }

    pub fn get_by_id(conn: &Connection, id: i64) -> DbResult<Option<Self>> {
        let mut stmt = conn.prepare("SELECT * FROM campos_examen WHERE id = ?1")?;
        match stmt.query_row([id], Self::from_row) {
            Ok(f) => Ok(Some(f)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn list_by_exam(conn: &Connection, exam_id: i64) -> DbResult<Vec<Self>> {
        let mut stmt =
            conn.prepare("SELECT * FROM campos_examen WHERE examen_id = ?1 ORDER BY orden, id")?;
        let rows = stmt
            .query_map([exam_id], Self::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{test_conn, Category};

    #[test]
    fn test_fields_get_sequential_positions() {
        let conn = test_conn();
        let cat = Category::create(&conn, "Hematología").unwrap();
        let exam = Exam::create(
            &conn,
            &ExamCreate {
                code: "HEM".into(),
                name: "Hemograma".into(),
                category_id: Some(cat.id),
                exam_type: ExamType::Compuesto,
            },
        )
        .unwrap();

        for name in ["Hemoglobina", "Hematocrito", "Leucocitos"] {
            ExamField::create(
                &conn,
                &ExamFieldCreate {
                    exam_id: exam.id,
                    name: name.into(),
                    unit: None,
                    reference_range: None,
                    position: None,
                },
            )
            .unwrap();
        }

        let fields = Exam::fields(&conn, exam.id).unwrap();
        let positions: Vec<i64> = fields.iter().map(|f| f.position).collect();
        assert_eq!(positions, vec![1, 2, 3]);
        assert_eq!(fields[0].name, "Hemoglobina");
        assert!(exam.exam_type.has_fields());
    }
}
