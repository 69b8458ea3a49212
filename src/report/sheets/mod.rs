//! Sheet builders
//!
//! Each builder turns aggregated (or raw typed) report data into the pieces
//! of one worksheet: a title, a heading row, body rows, column widths and
//! style directives. Builders never fail; missing values become placeholders
//! and an empty section becomes a single explanatory row.

mod daily;
mod demographics;
mod doctors;
mod exams;
mod patients;
mod results;
mod summary;

use chrono::{Datelike, NaiveDate, Weekday};
use serde::Serialize;

pub use daily::DailySheet;
pub use demographics::{ActivitySheet, DistributionSheet};
pub use doctors::DoctorsSheet;
pub use exams::ExamsSheet;
pub use patients::PatientsSheet;
pub use results::PatientResultsSheet;
pub use summary::SummarySheet;

/// Row shown in place of an empty section
pub const NO_DATA: &str = "No hay datos disponibles para el período seleccionado";
pub const NO_NAME: &str = "Sin nombre";
pub const NOT_AVAILABLE: &str = "N/A";

pub const COLOR_OUT_OF_RANGE: (u8, u8, u8) = (255, 0, 0);
pub const COLOR_HIGHLIGHT_FILL: (u8, u8, u8) = (255, 230, 230);
pub const COLOR_SUBTLE_FILL: (u8, u8, u8) = (242, 242, 242);

/// A single cell value
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Cell {
    Text(String),
    Int(i64),
    Number(f64),
    /// Percentage value on the 0-100 scale
    Percent(f64),
    Empty,
}

impl Cell {
    pub fn text(value: impl Into<String>) -> Self {
        Cell::Text(value.into())
    }

    /// Text with a placeholder for missing or blank values
    pub fn text_or(value: Option<&str>, placeholder: &str) -> Self {
        match value {
            Some(v) if !v.trim().is_empty() => Cell::Text(v.trim().to_string()),
            _ => Cell::Text(placeholder.to_string()),
        }
    }

    /// Display form, as it reads in the rendered sheet
    pub fn display(&self) -> String {
        match self {
            Cell::Text(s) => s.clone(),
            Cell::Int(n) => n.to_string(),
            Cell::Number(n) => format!("{:.2}", n),
            Cell::Percent(p) => format!("{:.1}%", p),
            Cell::Empty => String::new(),
        }
    }
}

impl From<&str> for Cell {
    fn from(s: &str) -> Self {
        Cell::Text(s.to_string())
    }
}

impl From<String> for Cell {
    fn from(s: String) -> Self {
        Cell::Text(s)
    }
}

impl From<i64> for Cell {
    fn from(n: i64) -> Self {
        Cell::Int(n)
    }
}

/// Visual style applied on top of the default body format
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct CellStyle {
    pub font_color: Option<(u8, u8, u8)>,
    pub fill: Option<(u8, u8, u8)>,
    pub bold: bool,
}

impl CellStyle {
    pub fn font(color: (u8, u8, u8)) -> Self {
        Self { font_color: Some(color), ..Self::default() }
    }

    pub fn fill(color: (u8, u8, u8)) -> Self {
        Self { fill: Some(color), ..Self::default() }
    }

    pub fn bold(mut self) -> Self {
        self.bold = true;
        self
    }

    /// Overlay `other` on top of `self`
    pub fn merge(self, other: CellStyle) -> Self {
        Self {
            font_color: other.font_color.or(self.font_color),
            fill: other.fill.or(self.fill),
            bold: self.bold || other.bold,
        }
    }
}

/// Where a style applies; row indices are relative to the body
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum StyleTarget {
    Row(usize),
    Cell { row: usize, col: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StyleDirective {
    pub target: StyleTarget,
    pub style: CellStyle,
}

impl StyleDirective {
    pub fn row(row: usize, style: CellStyle) -> Self {
        Self { target: StyleTarget::Row(row), style }
    }

    pub fn cell(row: usize, col: usize, style: CellStyle) -> Self {
        Self { target: StyleTarget::Cell { row, col }, style }
    }
}

/// One worksheet of a report
pub trait Sheet {
    /// Worksheet tab name
    fn name(&self) -> String;

    /// Title line written above the table
    fn title(&self) -> String;

    fn headings(&self) -> Vec<String>;

    /// Body rows; may be empty
    fn rows(&self) -> Vec<Vec<Cell>>;

    fn column_widths(&self) -> Vec<f64>;

    fn styles(&self) -> Vec<StyleDirective> {
        Vec::new()
    }

    /// Body rows as rendered: an empty section becomes the no-data row
    fn body(&self) -> Vec<Vec<Cell>> {
        let rows = self.rows();
        if rows.is_empty() {
            vec![vec![Cell::text(NO_DATA)]]
        } else {
            rows
        }
    }

    /// Style directives that apply to [`Sheet::body`]
    fn body_styles(&self) -> Vec<StyleDirective> {
        if self.rows().is_empty() {
            vec![StyleDirective::row(0, CellStyle::font((128, 128, 128)))]
        } else {
            self.styles()
        }
    }
}

/// Spanish weekday abbreviation
pub(crate) fn day_of_week_abbrev(date: &NaiveDate) -> &'static str {
    match date.weekday() {
        Weekday::Mon => "Lun",
        Weekday::Tue => "Mar",
        Weekday::Wed => "Mié",
        Weekday::Thu => "Jue",
        Weekday::Fri => "Vie",
        Weekday::Sat => "Sáb",
        Weekday::Sun => "Dom",
    }
}

/// Render a stored date or timestamp as dd/mm/yyyy.
///
/// Values that do not parse are returned unchanged.
pub(crate) fn format_date(value: &str) -> String {
    let trimmed = value.trim();
    let date_part = trimmed.get(..10).unwrap_or(trimmed);
    match NaiveDate::parse_from_str(date_part, "%Y-%m-%d") {
        Ok(d) => {
            let rest = trimmed.get(10..).unwrap_or("");
            let time = rest.trim_start_matches(['T', ' ']).get(..5).unwrap_or("");
            if time.is_empty() {
                d.format("%d/%m/%Y").to_string()
            } else {
                format!("{} {}", d.format("%d/%m/%Y"), time)
            }
        }
        Err(_) => trimmed.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::aggregate::{ReportData, ReportOptions};
    use crate::report::dataset::ReportDataset;
    use crate::report::DateRange;

    #[test]
    fn test_format_date() {
        assert_eq!(format_date("2025-03-07"), "07/03/2025");
        assert_eq!(format_date("2025-03-07T14:32:10Z"), "07/03/2025 14:32");
        assert_eq!(format_date("2025-03-07 08:05:00"), "07/03/2025 08:05");
        assert_eq!(format_date("ayer"), "ayer");
        assert_eq!(format_date(""), "");
    }

    #[test]
    fn test_cell_placeholders() {
        assert_eq!(Cell::text_or(None, NO_NAME), Cell::text("Sin nombre"));
        assert_eq!(Cell::text_or(Some("  "), NOT_AVAILABLE), Cell::text("N/A"));
        assert_eq!(Cell::text_or(Some(" Ana "), NO_NAME), Cell::text("Ana"));
        assert_eq!(Cell::Percent(33.33).display(), "33.3%");
    }

    #[test]
    fn test_style_merge() {
        let merged = CellStyle::fill(COLOR_HIGHLIGHT_FILL).merge(CellStyle::font(COLOR_OUT_OF_RANGE).bold());
        assert_eq!(merged.fill, Some(COLOR_HIGHLIGHT_FILL));
        assert_eq!(merged.font_color, Some(COLOR_OUT_OF_RANGE));
        assert!(merged.bold);
    }

    #[test]
    fn test_every_section_renders_placeholder_without_data() {
        let range = DateRange::parse("2025-01-01", "2025-01-31").unwrap();
        let dataset = ReportDataset {
            range: range.clone(),
            patients: vec![],
            requests: vec![],
            details: vec![],
            values: vec![],
        };
        let data = ReportData::build(&dataset, ReportOptions::default());

        let sheets: Vec<Box<dyn Sheet>> = vec![
            Box::new(SummarySheet::new(&data)),
            Box::new(DistributionSheet::exam_status(&data)),
            Box::new(DistributionSheet::request_status(&data)),
            Box::new(DistributionSheet::gender(&data)),
            Box::new(DistributionSheet::age(&data)),
            Box::new(DistributionSheet::categories(&data)),
            Box::new(DistributionSheet::services(&data)),
            Box::new(ActivitySheet::new(&data)),
            Box::new(PatientsSheet::new(&data.top_patients)),
            Box::new(ExamsSheet::new(&data.top_exams)),
            Box::new(DoctorsSheet::new(&data.top_doctors)),
            Box::new(DailySheet::new(&data.daily)),
        ];

        for sheet in &sheets {
            let body = sheet.body();
            assert_eq!(body, vec![vec![Cell::text(NO_DATA)]], "sheet {}", sheet.name());
            assert!(!sheet.headings().is_empty());
            assert_eq!(sheet.headings().len(), sheet.column_widths().len(), "sheet {}", sheet.name());
        }
    }
}
