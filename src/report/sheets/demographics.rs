//! Grouped count sheets
//!
//! Label / count / percentage tables for status, gender, age, category and
//! service breakdowns, plus the patient activity distribution.

use super::{Cell, CellStyle, Sheet, StyleDirective};
use crate::report::aggregate::{GroupCount, ReportData};
use crate::report::classify::ActivityLevel;

/// A label/count/percentage table
pub struct DistributionSheet {
    name: String,
    title: String,
    label_heading: String,
    groups: Vec<GroupCount>,
}

impl DistributionSheet {
    pub fn new(
        name: impl Into<String>,
        title: impl Into<String>,
        label_heading: impl Into<String>,
        groups: Vec<GroupCount>,
    ) -> Self {
        Self {
            name: name.into(),
            title: title.into(),
            label_heading: label_heading.into(),
            groups,
        }
    }

    pub fn exam_status(data: &ReportData) -> Self {
        Self::new("Estados", "Exámenes por Estado", "Estado", data.exam_status.clone())
    }

    pub fn request_status(data: &ReportData) -> Self {
        Self::new(
            "Estado Solicitudes",
            "Solicitudes por Estado",
            "Estado",
            data.request_status.clone(),
        )
    }

    pub fn gender(data: &ReportData) -> Self {
        Self::new("Género", "Pacientes por Género", "Género", data.by_gender.clone())
    }

    pub fn age(data: &ReportData) -> Self {
        Self::new("Edades", "Pacientes por Grupo de Edad", "Grupo de edad", data.by_age.clone())
    }

    pub fn categories(data: &ReportData) -> Self {
        Self::new("Categorías", "Exámenes por Categoría", "Categoría", data.by_category.clone())
    }

    pub fn services(data: &ReportData) -> Self {
        Self::new("Servicios", "Solicitudes por Servicio", "Servicio", data.by_service.clone())
    }
}

impl Sheet for DistributionSheet {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn title(&self) -> String {
        self.title.clone()
    }

    fn headings(&self) -> Vec<String> {
        vec![self.label_heading.clone(), "Cantidad".into(), "Porcentaje".into()]
    }

    fn rows(&self) -> Vec<Vec<Cell>> {
        let total: i64 = self.groups.iter().map(|g| g.count).sum();
        if total == 0 {
            return Vec::new();
        }

        let mut rows: Vec<Vec<Cell>> = self
            .groups
            .iter()
            .map(|g| vec![Cell::text(g.label.as_str()), Cell::Int(g.count), Cell::Percent(g.percentage)])
            .collect();
        rows.push(vec![Cell::text("Total"), Cell::Int(total), Cell::Percent(100.0)]);
        rows
    }

    fn column_widths(&self) -> Vec<f64> {
        vec![30.0, 12.0, 14.0]
    }

    fn styles(&self) -> Vec<StyleDirective> {
        let rows = self.rows();
        match rows.len() {
            0 => Vec::new(),
            n => vec![StyleDirective::row(n - 1, CellStyle::fill(super::COLOR_SUBTLE_FILL).bold())],
        }
    }
}

/// Patients by activity level, with the level's request range
pub struct ActivitySheet {
    groups: Vec<GroupCount>,
}

impl ActivitySheet {
    pub fn new(data: &ReportData) -> Self {
        Self { groups: data.activity.clone() }
    }

    fn level_of(label: &str) -> Option<ActivityLevel> {
        ActivityLevel::ALL.into_iter().find(|l| l.label() == label)
    }
}

impl Sheet for ActivitySheet {
    fn name(&self) -> String {
        "Actividad".to_string()
    }

    fn title(&self) -> String {
        "Distribución de Actividad de Pacientes".to_string()
    }

    fn headings(&self) -> Vec<String> {
        vec![
            "Nivel de actividad".into(),
            "Rango".into(),
            "Pacientes".into(),
            "Porcentaje".into(),
        ]
    }

    fn rows(&self) -> Vec<Vec<Cell>> {
        if self.groups.iter().all(|g| g.count == 0) {
            return Vec::new();
        }

        self.groups
            .iter()
            .map(|g| {
                let range = Self::level_of(&g.label).map(|l| l.range()).unwrap_or("");
                vec![
                    Cell::text(g.label.as_str()),
                    Cell::text(range),
                    Cell::Int(g.count),
                    Cell::Percent(g.percentage),
                ]
            })
            .collect()
    }

    fn column_widths(&self) -> Vec<f64> {
        vec![22.0, 24.0, 12.0, 14.0]
    }

    fn styles(&self) -> Vec<StyleDirective> {
        if self.rows().is_empty() {
            return Vec::new();
        }
        self.groups
            .iter()
            .enumerate()
            .filter_map(|(i, g)| {
                Self::level_of(&g.label)
                    .map(|l| StyleDirective::cell(i, 0, CellStyle::font(l.color()).bold()))
            })
            .collect()
    }
}
