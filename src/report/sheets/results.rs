//! Patient results sheet
//!
//! Every exam a patient had in the period: direct results for simple exams,
//! one row per field for compound exams. Out-of-range values are red.

use std::collections::HashMap;

use super::{
    format_date, Cell, CellStyle, Sheet, StyleDirective, COLOR_OUT_OF_RANGE, NOT_AVAILABLE,
    NO_NAME,
};
use crate::models::ResultValueView;
use crate::report::dataset::{DetailRow, PatientRow, ReportDataset, RequestRow};

const VALUE_COL: usize = 4;

pub struct PatientResultsSheet<'a> {
    patient: &'a PatientRow,
    requests: HashMap<i64, &'a RequestRow>,
    details: Vec<&'a DetailRow>,
    values: HashMap<i64, Vec<&'a ResultValueView>>,
}

/// A body row plus whether its value is out of range
struct ResultLine {
    cells: Vec<Cell>,
    out_of_range: bool,
}

impl<'a> PatientResultsSheet<'a> {
    pub fn new(dataset: &'a ReportDataset, patient: &'a PatientRow) -> Self {
        let requests = dataset
            .requests
            .iter()
            .filter(|r| r.patient_id == patient.id)
            .map(|r| (r.id, r))
            .collect();

        let details: Vec<&DetailRow> = dataset
            .details
            .iter()
            .filter(|d| d.patient_id == patient.id)
            .collect();

        let mut values: HashMap<i64, Vec<&ResultValueView>> = HashMap::new();
        for v in &dataset.values {
            if details.iter().any(|d| d.id == v.detail_id) {
                values.entry(v.detail_id).or_default().push(v);
            }
        }

        Self { patient, requests, details, values }
    }

    fn patient_name(&self) -> String {
        self.patient
            .full_name
            .clone()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| NO_NAME.to_string())
    }

    fn lines(&self) -> Vec<ResultLine> {
        let mut lines = Vec::new();

        for d in &self.details {
            let receipt = self
                .requests
                .get(&d.request_id)
                .map(|r| r.receipt_number.as_str());
            let prefix = || {
                vec![
                    Cell::text(format_date(&d.request_date)),
                    Cell::text_or(receipt, NOT_AVAILABLE),
                    Cell::text_or(Some(d.exam_name.as_str()), NO_NAME),
                ]
            };
            let status = Cell::text(d.status.display_name());
            let observations = Cell::text_or(d.observations.as_deref(), "");

            let field_values = self.values.get(&d.id).map(Vec::as_slice).unwrap_or(&[]);

            if field_values.is_empty() || d.result.is_some() {
                let mut cells = prefix();
                cells.extend([
                    Cell::text("Resultado"),
                    Cell::text_or(d.result.as_deref(), NOT_AVAILABLE),
                    Cell::Empty,
                    Cell::Empty,
                    status.clone(),
                    observations.clone(),
                ]);
                lines.push(ResultLine { cells, out_of_range: false });
            }

            for v in field_values {
                let mut cells = prefix();
                cells.extend([
                    Cell::text(v.field_name.as_str()),
                    Cell::text_or(Some(v.value.as_str()), NOT_AVAILABLE),
                    Cell::text_or(v.unit.as_deref(), ""),
                    Cell::text_or(v.reference_range.as_deref(), ""),
                    status.clone(),
                    observations.clone(),
                ]);
                lines.push(ResultLine { cells, out_of_range: v.out_of_range });
            }
        }

        lines
    }

    /// Number of out-of-range values on this sheet
    pub fn out_of_range_count(&self) -> usize {
        self.lines().iter().filter(|l| l.out_of_range).count()
    }
}

impl Sheet for PatientResultsSheet<'_> {
    fn name(&self) -> String {
        match self.patient.codigo {
            Some(code) => format!("{} {}", code, self.patient_name()),
            None => self.patient_name(),
        }
    }

    fn title(&self) -> String {
        format!(
            "Resultados de {} ({})",
            self.patient_name(),
            self.patient.document.as_deref().unwrap_or(NOT_AVAILABLE)
        )
    }

    fn headings(&self) -> Vec<String> {
        [
            "Fecha",
            "Recibo",
            "Examen",
            "Campo",
            "Resultado",
            "Unidad",
            "Referencia",
            "Estado",
            "Observaciones",
        ]
        .into_iter()
        .map(String::from)
        .collect()
    }

    fn rows(&self) -> Vec<Vec<Cell>> {
        self.lines().into_iter().map(|l| l.cells).collect()
    }

    fn column_widths(&self) -> Vec<f64> {
        vec![12.0, 18.0, 28.0, 22.0, 14.0, 10.0, 16.0, 12.0, 30.0]
    }

    fn styles(&self) -> Vec<StyleDirective> {
        self.lines()
            .iter()
            .enumerate()
            .filter(|(_, l)| l.out_of_range)
            .map(|(row, _)| StyleDirective::cell(row, VALUE_COL, CellStyle::font(COLOR_OUT_OF_RANGE).bold()))
            .collect()
    }
}
