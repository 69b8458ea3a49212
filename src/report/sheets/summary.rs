//! General summary sheet

use super::{Cell, CellStyle, Sheet, StyleDirective};
use crate::report::aggregate::ReportData;

pub struct SummarySheet<'a> {
    data: &'a ReportData,
}

impl<'a> SummarySheet<'a> {
    pub fn new(data: &'a ReportData) -> Self {
        Self { data }
    }
}

impl Sheet for SummarySheet<'_> {
    fn name(&self) -> String {
        "Resumen".to_string()
    }

    fn title(&self) -> String {
        "Resumen General del Laboratorio".to_string()
    }

    fn headings(&self) -> Vec<String> {
        vec!["Indicador".into(), "Valor".into()]
    }

    fn rows(&self) -> Vec<Vec<Cell>> {
        if self.data.is_empty() {
            return Vec::new();
        }

        let t = &self.data.totals;
        vec![
            vec![Cell::text("Período"), Cell::text(self.data.range.label())],
            vec![Cell::text("Pacientes registrados"), Cell::Int(t.patients)],
            vec![Cell::text("Pacientes atendidos"), Cell::Int(t.active_patients)],
            vec![Cell::text("Solicitudes"), Cell::Int(t.requests)],
            vec![Cell::text("Exámenes"), Cell::Int(t.exams)],
            vec![Cell::text("Exámenes completados"), Cell::Int(t.completed_exams)],
            vec![Cell::text("Porcentaje completado"), Cell::Percent(t.completion_percentage)],
            vec![Cell::text("Médicos solicitantes"), Cell::Int(t.doctors)],
        ]
    }

    fn column_widths(&self) -> Vec<f64> {
        vec![32.0, 28.0]
    }

    fn styles(&self) -> Vec<StyleDirective> {
        // Indicator names in bold
        (0..self.rows().len())
            .map(|row| StyleDirective::cell(row, 0, CellStyle::default().bold()))
            .collect()
    }
}
