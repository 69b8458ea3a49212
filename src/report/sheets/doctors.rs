//! Requesting doctors sheet

use super::{Cell, Sheet, NO_NAME};
use crate::report::aggregate::DoctorStats;

pub struct DoctorsSheet<'a> {
    doctors: &'a [DoctorStats],
}

impl<'a> DoctorsSheet<'a> {
    pub fn new(doctors: &'a [DoctorStats]) -> Self {
        Self { doctors }
    }
}

impl Sheet for DoctorsSheet<'_> {
    fn name(&self) -> String {
        "Médicos".to_string()
    }

    fn title(&self) -> String {
        "Médicos Solicitantes".to_string()
    }

    fn headings(&self) -> Vec<String> {
        ["Médico", "Solicitudes", "Pacientes", "Exámenes", "Porcentaje"]
            .into_iter()
            .map(String::from)
            .collect()
    }

    fn rows(&self) -> Vec<Vec<Cell>> {
        self.doctors
            .iter()
            .map(|d| {
                let name = match d.doctor_id {
                    None => Cell::text("Sin médico asignado"),
                    Some(_) => Cell::text_or(d.name.as_deref(), NO_NAME),
                };
                vec![
                    name,
                    Cell::Int(d.requests),
                    Cell::Int(d.patients),
                    Cell::Int(d.exams),
                    Cell::Percent(d.percentage),
                ]
            })
            .collect()
    }

    fn column_widths(&self) -> Vec<f64> {
        vec![32.0, 12.0, 12.0, 12.0, 13.0]
    }
}
