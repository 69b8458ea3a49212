//! Daily activity series sheet

use chrono::{Datelike, NaiveDate, Weekday};

use super::{day_of_week_abbrev, format_date, Cell, CellStyle, Sheet, StyleDirective, COLOR_SUBTLE_FILL};
use crate::report::aggregate::DailyPoint;

pub struct DailySheet<'a> {
    points: &'a [DailyPoint],
}

impl<'a> DailySheet<'a> {
    pub fn new(points: &'a [DailyPoint]) -> Self {
        Self { points }
    }

    fn parsed(point: &DailyPoint) -> Option<NaiveDate> {
        NaiveDate::parse_from_str(&point.date, "%Y-%m-%d").ok()
    }
}

impl Sheet for DailySheet<'_> {
    fn name(&self) -> String {
        "Diario".to_string()
    }

    fn title(&self) -> String {
        "Actividad Diaria".to_string()
    }

    fn headings(&self) -> Vec<String> {
        ["Fecha", "Día", "Solicitudes", "Exámenes", "Completados"]
            .into_iter()
            .map(String::from)
            .collect()
    }

    fn rows(&self) -> Vec<Vec<Cell>> {
        if self.points.iter().all(|p| p.requests == 0 && p.exams == 0) {
            return Vec::new();
        }

        self.points
            .iter()
            .map(|p| {
                let day = Self::parsed(p).map(|d| day_of_week_abbrev(&d)).unwrap_or("---");
                vec![
                    Cell::text(format_date(&p.date)),
                    Cell::text(day),
                    Cell::Int(p.requests),
                    Cell::Int(p.exams),
                    Cell::Int(p.completed),
                ]
            })
            .collect()
    }

    fn column_widths(&self) -> Vec<f64> {
        vec![13.0, 8.0, 12.0, 12.0, 13.0]
    }

    fn styles(&self) -> Vec<StyleDirective> {
        // Shade weekends
        self.points
            .iter()
            .enumerate()
            .filter(|(_, p)| {
                Self::parsed(p)
                    .map(|d| matches!(d.weekday(), Weekday::Sat | Weekday::Sun))
                    .unwrap_or(false)
            })
            .map(|(row, _)| StyleDirective::row(row, CellStyle::fill(COLOR_SUBTLE_FILL)))
            .collect()
    }
}
