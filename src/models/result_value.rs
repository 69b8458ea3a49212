//! Result value model (valores_resultado)
//!
//! One row per named field of a compound exam, carrying the value, the
//! reference range in force when it was entered, and an out-of-range flag.

use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};

use super::exam::ExamField;
use crate::db::{DbError, DbResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultValue {
    pub id: i64,
    pub detail_id: i64,
    pub field_id: i64,
    pub value: String,
    pub reference_range: Option<String>,
    pub out_of_range: bool,
    pub created_at: String,
    pub updated_at: String,
}

/// Data for recording a field value
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultValueCreate {
    pub field_id: i64,
    pub value: String,
    /// Overrides the computed flag when set
    pub out_of_range: Option<bool>,
}

/// Result value joined with its field definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultValueView {
    pub detail_id: i64,
    pub field_name: String,
    pub unit: Option<String>,
    pub value: String,
    pub reference_range: Option<String>,
    pub out_of_range: bool,
}

impl ResultValue {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            detail_id: row.get("detalle_solicitud_id")?,
            field_id: row.get("campo_examen_id")?,
            value: row.get("valor")?,
            reference_range: row.get("valor_referencia")?,
            out_of_range: row.get::<_, i64>("fuera_rango")? != 0,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }

    /// Insert or replace the value of one field for one exam detail
    pub fn upsert(conn: &Connection, detail_id: i64, data: &ResultValueCreate) -> DbResult<Self> {
        let field = ExamField::get_by_id(conn, data.field_id)?
            .ok_or_else(|| DbError::NotFound(format!("Exam field {}", data.field_id)))?;

        let detail_exam: i64 = conn
            .query_row(
                "SELECT examen_id FROM detallesolicitud WHERE id = ?1",
                [detail_id],
                |row| row.get(0),
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => {
                    DbError::NotFound(format!("Exam detail {}", detail_id))
                }
                other => other.into(),
            })?;

        if detail_exam != field.exam_id {
            return Err(DbError::Validation(format!(
                "field '{}' does not belong to the exam of detail {}",
                field.name, detail_id
            )));
        }

        let out_of_range = data.out_of_range.unwrap_or_else(|| {
            field
                .reference_range
                .as_deref()
                .and_then(|range| is_out_of_range(&data.value, range))
                .unwrap_or(false)
        });

        conn.execute(
            r#"
            INSERT INTO valores_resultado (detalle_solicitud_id, campo_examen_id, valor, valor_referencia, fuera_rango)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(detalle_solicitud_id, campo_examen_id) DO UPDATE SET
                valor = excluded.valor,
                valor_referencia = excluded.valor_referencia,
                fuera_rango = excluded.fuera_rango,
                updated_at = datetime('now')
            "#,
            params![detail_id, field.id, data.value.trim(), field.reference_range, out_of_range as i64],
        )?;

        let mut stmt = conn.prepare(
            "SELECT * FROM valores_resultado WHERE detalle_solicitud_id = ?1 AND campo_examen_id = ?2",
        )?;
        Ok(stmt.query_row(params![detail_id, field.id], Self::from_row)?)
    }

    pub fn list_by_detail(conn: &Connection, detail_id: i64) -> DbResult<Vec<ResultValueView>> {
        let mut stmt = conn.prepare(
            r#"
            SELECT v.detalle_solicitud_id, c.nombre, c.unidad, v.valor, v.valor_referencia, v.fuera_rango
            FROM valores_resultado v
            JOIN campos_examen c ON c.id = v.campo_examen_id
            WHERE v.detalle_solicitud_id = ?1
            ORDER BY c.orden, c.id
            "#,
        )?;

        let rows = stmt
            .query_map([detail_id], ResultValueView::from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(rows)
    }
}

impl ResultValueView {
    pub(crate) fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            detail_id: row.get(0)?,
            field_name: row.get(1)?,
            unit: row.get(2)?,
            value: row.get(3)?,
            reference_range: row.get(4)?,
            out_of_range: row.get::<_, i64>(5)? != 0,
        })
    }
}

const RANGE_DASHES: [char; 3] = ['-', '–', '—'];

/// Parsed numeric reference range
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ReferenceRange {
    Between(f64, f64),
    Below { limit: f64, inclusive: bool },
    Above { limit: f64, inclusive: bool },
}

impl ReferenceRange {
    /// Parse "12.0 - 16.0", "12 – 16", "<200", "<= 5", "≤ 5", ">40", ">= 0.5", "≥ 0.5"
    /// (decimal commas accepted)
    pub fn parse(range: &str) -> Option<Self> {
        let s = range.trim().replace(',', ".");
        if s.is_empty() {
            return None;
        }

        for (prefix, below, inclusive) in [
            ("<=", true, true),
            ("≤", true, true),
            (">=", false, true),
            ("≥", false, true),
            ("<", true, false),
            (">", false, false),
        ] {
            if let Some(rest) = s.strip_prefix(prefix) {
                let limit = leading_number(rest)?;
                return Some(if below {
                    ReferenceRange::Below { limit, inclusive }
                } else {
                    ReferenceRange::Above { limit, inclusive }
                });
            }
        }

        // Split on the first dash that is not a leading sign
        let (split_at, dash) = s
            .char_indices()
            .skip(1)
            .find(|(_, c)| RANGE_DASHES.contains(c))?;
        let low = leading_number(&s[..split_at])?;
        let high = leading_number(&s[split_at + dash.len_utf8()..])?;
        if low > high {
            return None;
        }
        Some(ReferenceRange::Between(low, high))
    }

    pub fn contains(&self, value: f64) -> bool {
        match *self {
            ReferenceRange::Between(low, high) => value >= low && value <= high,
            ReferenceRange::Below { limit, inclusive } => {
                if inclusive { value <= limit } else { value < limit }
            }
            ReferenceRange::Above { limit, inclusive } => {
                if inclusive { value >= limit } else { value > limit }
            }
        }
    }
}

/// Leading numeric token of a string, ignoring trailing units ("16.0 g/dL")
fn leading_number(s: &str) -> Option<f64> {
    let s = s.trim();
    let end = s
        .char_indices()
        .find(|(i, c)| !(c.is_ascii_digit() || *c == '.' || (*i == 0 && (*c == '-' || *c == '+'))))
        .map(|(i, _)| i)
        .unwrap_or(s.len());
    s[..end].parse().ok()
}

/// Whether `value` falls outside `range`. `None` when either side is not numeric.
pub fn is_out_of_range(value: &str, range: &str) -> Option<bool> {
    let range = ReferenceRange::parse(range)?;
    let value = leading_number(&value.replace(',', "."))?;
    Some(!range.contains(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        test_conn, Exam, ExamCreate, ExamDetail, ExamFieldCreate, ExamType, Patient,
        PatientCreate, Request, RequestCreate,
    };

    #[test]
    fn test_parse_reference_ranges() {
        assert_eq!(ReferenceRange::parse("12.0 - 16.0"), Some(ReferenceRange::Between(12.0, 16.0)));
        assert_eq!(ReferenceRange::parse("4,5-11 x10^3/uL"), Some(ReferenceRange::Between(4.5, 11.0)));
        assert_eq!(
            ReferenceRange::parse("<200 mg/dL"),
            Some(ReferenceRange::Below { limit: 200.0, inclusive: false })
        );
        assert_eq!(
            ReferenceRange::parse(">= 40"),
            Some(ReferenceRange::Above { limit: 40.0, inclusive: true })
        );
        assert_eq!(
            ReferenceRange::parse("≤ 5"),
            Some(ReferenceRange::Below { limit: 5.0, inclusive: true })
        );
        assert_eq!(
            ReferenceRange::parse("≥40 mg/dL"),
            Some(ReferenceRange::Above { limit: 40.0, inclusive: true })
        );
        assert_eq!(ReferenceRange::parse("12 – 16"), Some(ReferenceRange::Between(12.0, 16.0)));
        assert_eq!(ReferenceRange::parse("0,5—1,2"), Some(ReferenceRange::Between(0.5, 1.2)));
        assert_eq!(ReferenceRange::parse("Negativo"), None);
        assert_eq!(ReferenceRange::parse("16-12"), None);
    }

    #[test]
    fn test_is_out_of_range() {
        assert_eq!(is_out_of_range("11.2", "12-16"), Some(true));
        assert_eq!(is_out_of_range("14", "12-16"), Some(false));
        assert_eq!(is_out_of_range("16", "12-16"), Some(false));
        assert_eq!(is_out_of_range("250", "<200"), Some(true));
        assert_eq!(is_out_of_range("200", "<=200"), Some(false));
        assert_eq!(is_out_of_range("7", "≤5"), Some(true));
        assert_eq!(is_out_of_range("5", "≤5"), Some(false));
        assert_eq!(is_out_of_range("10", "≥40"), Some(true));
        assert_eq!(is_out_of_range("20", "12 – 16"), Some(true));
        assert_eq!(is_out_of_range("Positivo", "12-16"), None);
        assert_eq!(is_out_of_range("13", "Negativo"), None);
    }

    #[test]
    fn test_upsert_computes_flag_and_replaces() {
        let mut conn = test_conn();
        let patient = Patient::create(
            &conn,
            &PatientCreate {
                document: "1".into(),
                first_names: "Rosa".into(),
                last_names: None,
                age: None,
                sex: None,
                phone: None,
            },
        )
        .unwrap();
        let exam = Exam::create(
            &conn,
            &ExamCreate {
                code: "HEM".into(),
                name: "Hemograma".into(),
                category_id: None,
                exam_type: ExamType::Compuesto,
            },
        )
        .unwrap();
        let field = ExamField::create(
            &conn,
            &ExamFieldCreate {
                exam_id: exam.id,
                name: "Hemoglobina".into(),
                unit: Some("g/dL".into()),
                reference_range: Some("12-16".into()),
                position: None,
            },
        )
        .unwrap();
        let request = Request::create(
            &mut conn,
            &RequestCreate {
                date: "2025-04-01".into(),
                receipt_number: None,
                service_id: None,
                patient_id: patient.id,
                user_id: None,
                exam_ids: vec![exam.id],
            },
        )
        .unwrap();
        let details = ExamDetail::list_by_request(&conn, request.id).unwrap();
        let detail = &details[0];

        let low = ResultValue::upsert(
            &conn,
            detail.id,
            &ResultValueCreate { field_id: field.id, value: "10.1".into(), out_of_range: None },
        )
        .unwrap();
        assert!(low.out_of_range);
        assert_eq!(low.reference_range.as_deref(), Some("12-16"));

        let normal = ResultValue::upsert(
            &conn,
            detail.id,
            &ResultValueCreate { field_id: field.id, value: "13.4".into(), out_of_range: None },
        )
        .unwrap();
        assert!(!normal.out_of_range);
        assert_eq!(normal.id, low.id);

        let views = ResultValue::list_by_detail(&conn, detail.id).unwrap();
        assert_eq!(views.len(), 1);
        assert_eq!(views[0].field_name, "Hemoglobina");
        assert_eq!(views[0].value, "13.4");
    }
}
