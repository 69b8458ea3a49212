//! Top patients sheet

use super::{format_date, Cell, CellStyle, Sheet, StyleDirective, NOT_AVAILABLE, NO_NAME};
use crate::report::aggregate::PatientActivity;

pub struct PatientsSheet<'a> {
    patients: &'a [PatientActivity],
}

impl<'a> PatientsSheet<'a> {
    pub fn new(patients: &'a [PatientActivity]) -> Self {
        Self { patients }
    }
}

impl Sheet for PatientsSheet<'_> {
    fn name(&self) -> String {
        "Pacientes".to_string()
    }

    fn title(&self) -> String {
        "Pacientes con Mayor Actividad".to_string()
    }

    fn headings(&self) -> Vec<String> {
        [
            "Código",
            "Documento",
            "Paciente",
            "Edad",
            "Sexo",
            "Solicitudes",
            "Exámenes",
            "Última visita",
            "Actividad",
        ]
        .into_iter()
        .map(String::from)
        .collect()
    }

    fn rows(&self) -> Vec<Vec<Cell>> {
        self.patients
            .iter()
            .map(|p| {
                vec![
                    p.codigo.map(Cell::Int).unwrap_or_else(|| Cell::text(NOT_AVAILABLE)),
                    Cell::text_or(p.document.as_deref(), NOT_AVAILABLE),
                    Cell::text_or(p.name.as_deref(), NO_NAME),
                    p.age.map(Cell::Int).unwrap_or_else(|| Cell::text(NOT_AVAILABLE)),
                    Cell::text(p.sex.map(|s| s.display_name()).unwrap_or(NOT_AVAILABLE)),
                    Cell::Int(p.requests),
                    Cell::Int(p.exams),
                    p.last_visit
                        .as_deref()
                        .map(|d| Cell::text(format_date(d)))
                        .unwrap_or_else(|| Cell::text(NOT_AVAILABLE)),
                    Cell::text(p.activity.label()),
                ]
            })
            .collect()
    }

    fn column_widths(&self) -> Vec<f64> {
        vec![10.0, 14.0, 32.0, 8.0, 12.0, 12.0, 12.0, 14.0, 15.0]
    }

    fn styles(&self) -> Vec<StyleDirective> {
        self.patients
            .iter()
            .enumerate()
            .map(|(row, p)| StyleDirective::cell(row, 8, CellStyle::font(p.activity.color()).bold()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::classify::ActivityLevel;

    #[test]
    fn test_missing_fields_use_placeholders() {
        let patients = vec![PatientActivity {
            patient_id: 1,
            codigo: None,
            name: None,
            document: Some("".into()),
            age: None,
            sex: None,
            requests: 3,
            exams: 5,
            last_visit: Some("2025-02-14".into()),
            activity: ActivityLevel::Medium,
        }];

        let rows = PatientsSheet::new(&patients).rows();
        assert_eq!(
            rows[0],
            vec![
                Cell::text("N/A"),
                Cell::text("N/A"),
                Cell::text("Sin nombre"),
                Cell::text("N/A"),
                Cell::text("N/A"),
                Cell::Int(3),
                Cell::Int(5),
                Cell::text("14/02/2025"),
                Cell::text("Media"),
            ]
        );
    }
}
