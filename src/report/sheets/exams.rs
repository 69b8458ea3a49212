//! Exam performance sheet
//!
//! Status counts per exam with completion rate, performance label and
//! backlog attention label. Exams in critical state get a highlighted row.

use super::{Cell, CellStyle, Sheet, StyleDirective, COLOR_HIGHLIGHT_FILL};
use crate::report::aggregate::{ExamStats, UNASSIGNED};
use crate::report::classify::AttentionLevel;

pub struct ExamsSheet<'a> {
    exams: &'a [ExamStats],
}

impl<'a> ExamsSheet<'a> {
    pub fn new(exams: &'a [ExamStats]) -> Self {
        Self { exams }
    }
}

impl Sheet for ExamsSheet<'_> {
    fn name(&self) -> String {
        "Exámenes".to_string()
    }

    fn title(&self) -> String {
        "Exámenes Más Solicitados".to_string()
    }

    fn headings(&self) -> Vec<String> {
        [
            "Código",
            "Examen",
            "Categoría",
            "Total",
            "Pendientes",
            "En proceso",
            "Completados",
            "% Completado",
            "Rendimiento",
            "Estado",
        ]
        .into_iter()
        .map(String::from)
        .collect()
    }

    fn rows(&self) -> Vec<Vec<Cell>> {
        self.exams
            .iter()
            .map(|e| {
                vec![
                    Cell::text(e.code.as_str()),
                    Cell::text_or(Some(e.name.as_str()), super::NO_NAME),
                    Cell::text_or(e.category.as_deref(), UNASSIGNED),
                    Cell::Int(e.total),
                    Cell::Int(e.pending),
                    Cell::Int(e.in_process),
                    Cell::Int(e.completed),
                    Cell::Percent(e.completion_percentage),
                    Cell::text(e.performance.label()),
                    Cell::text(e.attention.label()),
                ]
            })
            .collect()
    }

    fn column_widths(&self) -> Vec<f64> {
        vec![10.0, 30.0, 18.0, 8.0, 11.0, 11.0, 12.0, 13.0, 22.0, 12.0]
    }

    fn styles(&self) -> Vec<StyleDirective> {
        let mut styles = Vec::new();
        for (row, e) in self.exams.iter().enumerate() {
            if e.attention == AttentionLevel::Critical {
                styles.push(StyleDirective::row(row, CellStyle::fill(COLOR_HIGHLIGHT_FILL)));
            }
            styles.push(StyleDirective::cell(row, 8, CellStyle::font(e.performance.color())));
            styles.push(StyleDirective::cell(row, 9, CellStyle::font(e.attention.color()).bold()));
        }
        styles
    }
}
