//! Workbook export
//!
//! Composes the sheet builders for a report type and writes them to an
//! `.xlsx` workbook with rust_xlsxwriter. Every sheet follows one layout:
//!
//! ```text
//! row 0  title (merged across the table width)
//! row 1  period
//! row 2  generation timestamp
//! row 4  headings
//! row 5+ body
//! ```

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use rusqlite::Connection;
use rust_xlsxwriter::{Color, Format, FormatAlign, FormatBorder, Workbook, Worksheet};
use serde::Serialize;

use super::aggregate::{ReportData, ReportOptions};
use super::dataset::ReportDataset;
use super::sheets::{
    ActivitySheet, Cell, CellStyle, DailySheet, DistributionSheet, DoctorsSheet, ExamsSheet,
    PatientResultsSheet, PatientsSheet, Sheet, StyleDirective, StyleTarget, SummarySheet,
};
use super::{DateRange, ReportError, ReportResult};

// ============================================================================
// Layout Constants
// ============================================================================

pub const TITLE_ROW: u32 = 0;
pub const PERIOD_ROW: u32 = 1;
pub const GENERATED_ROW: u32 = 2;
pub const HEADER_ROW: u32 = 4;
pub const BODY_ROW: u32 = 5;

/// Excel's limit on worksheet names
pub const MAX_SHEET_NAME: usize = 31;

const INVALID_SHEET_CHARS: [char; 7] = ['[', ']', ':', '*', '?', '/', '\\'];

const COLOR_TITLE: (u8, u8, u8) = (31, 78, 121);
const COLOR_HEADER_FILL: (u8, u8, u8) = (68, 114, 196);
const COLOR_HEADER_FONT: (u8, u8, u8) = (255, 255, 255);
const COLOR_INFO: (u8, u8, u8) = (89, 89, 89);

// ============================================================================
// Report Types
// ============================================================================

/// Which sections a report workbook contains
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportType {
    /// Every section
    General,
    Pacientes,
    Examenes,
    Doctores,
    /// One results sheet per patient with requests in the range
    Resultados,
}

impl ReportType {
    pub const ALL: [ReportType; 5] = [
        ReportType::General,
        ReportType::Pacientes,
        ReportType::Examenes,
        ReportType::Doctores,
        ReportType::Resultados,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ReportType::General => "general",
            ReportType::Pacientes => "pacientes",
            ReportType::Examenes => "examenes",
            ReportType::Doctores => "doctores",
            ReportType::Resultados => "resultados",
        }
    }

    pub fn parse(s: &str) -> ReportResult<Self> {
        match s.trim().to_lowercase().as_str() {
            "general" => Ok(ReportType::General),
            "pacientes" | "patients" => Ok(ReportType::Pacientes),
            "examenes" | "exámenes" | "exams" => Ok(ReportType::Examenes),
            "doctores" | "medicos" | "médicos" | "doctors" => Ok(ReportType::Doctores),
            "resultados" | "results" => Ok(ReportType::Resultados),
            _ => Err(ReportError::UnknownReportType(s.to_string())),
        }
    }

    /// `reporte_<tipo>_<inicio>_<fin>.xlsx`
    pub fn file_name(&self, range: &DateRange) -> String {
        format!("reporte_{}_{}.xlsx", self.as_str(), range.file_fragment())
    }
}

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct SheetSummary {
    pub name: String,
    /// Body rows written, placeholder row included
    pub rows: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExportSummary {
    pub success: bool,
    pub file_path: String,
    pub report_type: ReportType,
    pub date_range: String,
    pub sheets: Vec<SheetSummary>,
    pub message: String,
}

// ============================================================================
// Sheet Composition
// ============================================================================

/// The sections of one report type over a loaded dataset
pub struct ReportExport {
    pub report_type: ReportType,
    pub dataset: ReportDataset,
    pub data: ReportData,
}

impl ReportExport {
    pub fn new(report_type: ReportType, dataset: ReportDataset, options: ReportOptions) -> Self {
        let data = ReportData::build(&dataset, options);
        Self { report_type, dataset, data }
    }

    pub fn load(
        conn: &Connection,
        report_type: ReportType,
        range: &DateRange,
        options: ReportOptions,
    ) -> ReportResult<Self> {
        let dataset = ReportDataset::load(conn, range)?;
        Ok(Self::new(report_type, dataset, options))
    }

    pub fn sheets(&self) -> Vec<Box<dyn Sheet + '_>> {
        let data = &self.data;
        let mut sheets: Vec<Box<dyn Sheet + '_>> = Vec::new();

        match self.report_type {
            ReportType::General => {
                sheets.push(Box::new(SummarySheet::new(data)));
                sheets.push(Box::new(DistributionSheet::exam_status(data)));
                sheets.push(Box::new(DistributionSheet::request_status(data)));
                sheets.push(Box::new(PatientsSheet::new(&data.top_patients)));
                sheets.push(Box::new(ActivitySheet::new(data)));
                sheets.push(Box::new(ExamsSheet::new(&data.top_exams)));
                sheets.push(Box::new(DoctorsSheet::new(&data.top_doctors)));
                sheets.push(Box::new(DistributionSheet::categories(data)));
                sheets.push(Box::new(DistributionSheet::services(data)));
                sheets.push(Box::new(DistributionSheet::gender(data)));
                sheets.push(Box::new(DistributionSheet::age(data)));
                sheets.push(Box::new(DailySheet::new(&data.daily)));
            }
            ReportType::Pacientes => {
                sheets.push(Box::new(PatientsSheet::new(&data.top_patients)));
                sheets.push(Box::new(ActivitySheet::new(data)));
                sheets.push(Box::new(DistributionSheet::gender(data)));
                sheets.push(Box::new(DistributionSheet::age(data)));
            }
            ReportType::Examenes => {
                sheets.push(Box::new(ExamsSheet::new(&data.top_exams)));
                sheets.push(Box::new(DistributionSheet::exam_status(data)));
                sheets.push(Box::new(DistributionSheet::categories(data)));
            }
            ReportType::Doctores => {
                sheets.push(Box::new(DoctorsSheet::new(&data.top_doctors)));
                sheets.push(Box::new(DistributionSheet::services(data)));
            }
            ReportType::Resultados => {
                sheets.extend(PatientResultsExport::all(&self.dataset).sheets());
            }
        }

        sheets
    }
}

/// Results sheets for one patient, or for every patient active in the range
pub struct PatientResultsExport<'a> {
    dataset: &'a ReportDataset,
    patient_id: Option<i64>,
}

impl<'a> PatientResultsExport<'a> {
    pub fn all(dataset: &'a ReportDataset) -> Self {
        Self { dataset, patient_id: None }
    }

    pub fn single(dataset: &'a ReportDataset, patient_id: i64) -> ReportResult<Self> {
        if !dataset.patients.iter().any(|p| p.id == patient_id) {
            return Err(ReportError::PatientNotFound(patient_id));
        }
        Ok(Self { dataset, patient_id: Some(patient_id) })
    }

    fn patient_sheets(&self) -> Vec<PatientResultsSheet<'a>> {
        let dataset = self.dataset;
        dataset
            .patients
            .iter()
            .filter(|p| match self.patient_id {
                Some(id) => p.id == id,
                None => p.request_count > 0,
            })
            .map(|p| PatientResultsSheet::new(dataset, p))
            .collect()
    }

    /// Out-of-range values across every exported patient
    pub fn out_of_range_count(&self) -> usize {
        self.patient_sheets().iter().map(|s| s.out_of_range_count()).sum()
    }

    pub fn sheets(&self) -> Vec<Box<dyn Sheet + 'a>> {
        let mut sheets: Vec<Box<dyn Sheet + 'a>> = self
            .patient_sheets()
            .into_iter()
            .map(|s| Box::new(s) as Box<dyn Sheet + 'a>)
            .collect();

        // A workbook needs at least one sheet
        if sheets.is_empty() {
            sheets.push(Box::new(EmptyResultsSheet));
        }
        sheets
    }
}

struct EmptyResultsSheet;

impl Sheet for EmptyResultsSheet {
    fn name(&self) -> String {
        "Resultados".to_string()
    }

    fn title(&self) -> String {
        "Resultados de Pacientes".to_string()
    }

    fn headings(&self) -> Vec<String> {
        vec!["Paciente".into(), "Exámenes".into()]
    }

    fn rows(&self) -> Vec<Vec<Cell>> {
        Vec::new()
    }

    fn column_widths(&self) -> Vec<f64> {
        vec![40.0, 12.0]
    }
}

// ============================================================================
// Workbook Writing
// ============================================================================

fn rgb((r, g, b): (u8, u8, u8)) -> Color {
    Color::RGB(((r as u32) << 16) | ((g as u32) << 8) | b as u32)
}

/// Worksheet name that Excel accepts and that no earlier sheet uses.
///
/// `used` holds lowercased names, since Excel compares them case-insensitively.
pub fn unique_sheet_name(raw: &str, used: &mut HashSet<String>) -> String {
    let cleaned: String = raw
        .chars()
        .map(|c| if INVALID_SHEET_CHARS.contains(&c) { '_' } else { c })
        .collect();
    let cleaned = cleaned.trim().trim_matches('\'').trim();
    let base = if cleaned.is_empty() { "Hoja" } else { cleaned };

    // Excel rejects names that start or end with an apostrophe
    let truncate = |s: &str, n: usize| {
        s.chars()
            .take(n)
            .collect::<String>()
            .trim_end_matches(|c: char| c == '\'' || c.is_whitespace())
            .to_string()
    };

    let mut name = truncate(base, MAX_SHEET_NAME);
    let mut n = 2;
    while used.contains(&name.to_lowercase()) {
        let suffix = format!(" ({})", n);
        name = format!("{}{}", truncate(base, MAX_SHEET_NAME - suffix.len()), suffix);
        n += 1;
    }

    used.insert(name.to_lowercase());
    name
}

/// Combined style of one body cell: row directives first, then cell ones
fn style_at(styles: &[StyleDirective], row: usize, col: usize) -> CellStyle {
    let mut style = CellStyle::default();
    for d in styles.iter().filter(|d| d.target == StyleTarget::Row(row)) {
        style = style.merge(d.style);
    }
    for d in styles.iter().filter(|d| d.target == StyleTarget::Cell { row, col }) {
        style = style.merge(d.style);
    }
    style
}

fn body_format(cell: &Cell, style: CellStyle) -> Format {
    let mut format = Format::new().set_border(FormatBorder::Thin);

    format = match cell {
        Cell::Int(_) => format.set_num_format("0").set_align(FormatAlign::Right),
        Cell::Number(_) => format.set_num_format("0.00").set_align(FormatAlign::Right),
        Cell::Percent(_) => format.set_num_format("0.0\"%\"").set_align(FormatAlign::Right),
        Cell::Text(_) | Cell::Empty => format,
    };

    if let Some(color) = style.font_color {
        format = format.set_font_color(rgb(color));
    }
    if let Some(color) = style.fill {
        format = format.set_background_color(rgb(color));
    }
    if style.bold {
        format = format.set_bold();
    }
    format
}

/// Write one sheet; returns the number of body rows written
fn write_sheet(
    worksheet: &mut Worksheet,
    sheet: &dyn Sheet,
    range: &DateRange,
    generated_at: &str,
) -> ReportResult<usize> {
    let headings = sheet.headings();
    let last_col = headings.len().saturating_sub(1) as u16;

    let title_format = Format::new()
        .set_bold()
        .set_font_size(14)
        .set_font_color(rgb(COLOR_TITLE));
    if last_col > 0 {
        worksheet.merge_range(TITLE_ROW, 0, TITLE_ROW, last_col, &sheet.title(), &title_format)?;
    } else {
        worksheet.write_string_with_format(TITLE_ROW, 0, sheet.title(), &title_format)?;
    }

    let info_format = Format::new().set_italic().set_font_color(rgb(COLOR_INFO));
    worksheet.write_string_with_format(
        PERIOD_ROW,
        0,
        format!("Período: {}", range.label()),
        &info_format,
    )?;
    worksheet.write_string_with_format(
        GENERATED_ROW,
        0,
        format!("Generado: {}", generated_at),
        &info_format,
    )?;

    let header_format = Format::new()
        .set_bold()
        .set_font_color(rgb(COLOR_HEADER_FONT))
        .set_background_color(rgb(COLOR_HEADER_FILL))
        .set_border(FormatBorder::Thin)
        .set_align(FormatAlign::Center);
    for (col, heading) in headings.iter().enumerate() {
        worksheet.write_string_with_format(HEADER_ROW, col as u16, heading, &header_format)?;
    }

    let body = sheet.body();
    let styles = sheet.body_styles();
    for (i, cells) in body.iter().enumerate() {
        let row = BODY_ROW + i as u32;
        for (c, cell) in cells.iter().enumerate() {
            let col = c as u16;
            let format = body_format(cell, style_at(&styles, i, c));
            match cell {
                Cell::Text(s) => {
                    worksheet.write_string_with_format(row, col, s, &format)?;
                }
                Cell::Int(n) => {
                    worksheet.write_number_with_format(row, col, *n as f64, &format)?;
                }
                Cell::Number(n) | Cell::Percent(n) => {
                    worksheet.write_number_with_format(row, col, *n, &format)?;
                }
                Cell::Empty => {
                    worksheet.write_blank(row, col, &format)?;
                }
            }
        }
    }

    for (col, width) in sheet.column_widths().iter().enumerate() {
        worksheet.set_column_width(col as u16, *width)?;
    }
    worksheet.set_freeze_panes(BODY_ROW, 0)?;

    Ok(body.len())
}

/// Build the workbook for `sheets` in memory
pub fn build_workbook(
    sheets: &[Box<dyn Sheet + '_>],
    range: &DateRange,
) -> ReportResult<(Workbook, Vec<SheetSummary>)> {
    let generated_at = chrono::Local::now().format("%d/%m/%Y %H:%M").to_string();
    let mut workbook = Workbook::new();
    let mut used = HashSet::new();
    let mut summaries = Vec::with_capacity(sheets.len());

    for sheet in sheets {
        let name = unique_sheet_name(&sheet.name(), &mut used);
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(&name)?;
        let rows = write_sheet(worksheet, sheet.as_ref(), range, &generated_at)?;
        summaries.push(SheetSummary { name, rows });
    }

    Ok((workbook, summaries))
}

fn save_workbook(
    sheets: &[Box<dyn Sheet + '_>],
    range: &DateRange,
    path: &Path,
) -> ReportResult<Vec<SheetSummary>> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let (mut workbook, summaries) = build_workbook(sheets, range)?;
    workbook.save(path)?;
    Ok(summaries)
}

// ============================================================================
// Entry Points
// ============================================================================

/// Export a report workbook for `report_type` into `export_dir`
pub fn export_report(
    conn: &Connection,
    report_type: ReportType,
    range: &DateRange,
    export_dir: &Path,
    options: ReportOptions,
) -> ReportResult<ExportSummary> {
    let export = ReportExport::load(conn, report_type, range, options)?;
    let path = export_dir.join(report_type.file_name(range));

    let sheets = export.sheets();
    let summaries = save_workbook(&sheets, range, &path)?;

    tracing::info!(
        report_type = report_type.as_str(),
        sheets = summaries.len(),
        path = %path.display(),
        "report exported"
    );

    Ok(ExportSummary {
        success: true,
        file_path: path.display().to_string(),
        report_type,
        date_range: range.label(),
        message: format!(
            "Report '{}' exported with {} sheets for {}",
            report_type.as_str(),
            summaries.len(),
            range.label()
        ),
        sheets: summaries,
    })
}

/// Export results sheets for one patient, or every patient with requests in range
pub fn export_patient_results(
    conn: &Connection,
    patient_id: Option<i64>,
    range: &DateRange,
    export_dir: &Path,
) -> ReportResult<ExportSummary> {
    let dataset = ReportDataset::load(conn, range)?;
    let export = match patient_id {
        Some(id) => PatientResultsExport::single(&dataset, id)?,
        None => PatientResultsExport::all(&dataset),
    };

    let file_name: PathBuf = match patient_id {
        Some(id) => format!("reporte_resultados_paciente_{}_{}.xlsx", id, range.file_fragment()).into(),
        None => ReportType::Resultados.file_name(range).into(),
    };
    let path = export_dir.join(file_name);

    let sheets = export.sheets();
    let summaries = save_workbook(&sheets, range, &path)?;
    let out_of_range = export.out_of_range_count();

    tracing::info!(
        patient_id = ?patient_id,
        sheets = summaries.len(),
        out_of_range,
        path = %path.display(),
        "patient results exported"
    );

    Ok(ExportSummary {
        success: true,
        file_path: path.display().to_string(),
        report_type: ReportType::Resultados,
        date_range: range.label(),
        message: format!(
            "Patient results exported with {} sheets ({} values out of range)",
            summaries.len(),
            out_of_range
        ),
        sheets: summaries,
    })
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use calamine::{open_workbook_from_rs, Data, Reader, Xlsx};

    use super::*;
    use crate::models::{
        test_conn, Category, Exam, ExamCreate, ExamDetail, ExamField, ExamFieldCreate, ExamType,
        Patient, PatientCreate, Request, RequestCreate, ResultValue, ResultValueCreate, Sex,
    };
    use crate::report::sheets::NO_DATA;

    fn march() -> DateRange {
        DateRange::parse("2025-03-01", "2025-03-31").unwrap()
    }

    fn seed(conn: &mut Connection) -> i64 {
        let category = Category::create(conn, "Hematología").unwrap();
        let glucose = Exam::create(
            conn,
            &ExamCreate {
                code: "GLU".into(),
                name: "Glucosa".into(),
                category_id: None,
                exam_type: ExamType::Simple,
            },
        )
        .unwrap();
        let hemogram = Exam::create(
            conn,
            &ExamCreate {
                code: "HEM".into(),
                name: "Hemograma".into(),
                category_id: Some(category.id),
                exam_type: ExamType::Compuesto,
            },
        )
        .unwrap();
        let field = ExamField::create(
            conn,
            &ExamFieldCreate {
                exam_id: hemogram.id,
                name: "Hemoglobina".into(),
                unit: Some("g/dL".into()),
                reference_range: Some("12-16".into()),
                position: None,
            },
        )
        .unwrap();

        let patient = Patient::create(
            conn,
            &PatientCreate {
                document: "1234567".into(),
                first_names: "Ana".into(),
                last_names: Some("Pérez".into()),
                age: Some(34),
                sex: Some(Sex::Female),
                phone: None,
            },
        )
        .unwrap();

        let request = Request::create(
            conn,
            &RequestCreate {
                date: "2025-03-10".into(),
                receipt_number: None,
                service_id: None,
                patient_id: patient.id,
                user_id: None,
                exam_ids: vec![glucose.id, hemogram.id],
            },
        )
        .unwrap();

        let details = ExamDetail::list_by_request(conn, request.id).unwrap();
        let glucose_detail = details.iter().find(|d| d.exam_id == glucose.id).unwrap();
        let hemogram_detail = details.iter().find(|d| d.exam_id == hemogram.id).unwrap();

        ExamDetail::set_result(conn, glucose_detail.id, Some("95 mg/dL"), None, true).unwrap();
        ResultValue::upsert(
            conn,
            hemogram_detail.id,
            &ResultValueCreate { field_id: field.id, value: "10.2".into(), out_of_range: None },
        )
        .unwrap();

        patient.id
    }

    fn read_back(workbook: &mut Workbook) -> Xlsx<Cursor<Vec<u8>>> {
        let buf = workbook.save_to_buffer().unwrap();
        open_workbook_from_rs(Cursor::new(buf)).unwrap()
    }

    fn text_at(range: &calamine::Range<Data>, row: u32, col: u32) -> Option<String> {
        match range.get_value((row, col)) {
            Some(Data::String(s)) => Some(s.clone()),
            _ => None,
        }
    }

    #[test]
    fn test_report_type_parse() {
        assert_eq!(ReportType::parse("General").unwrap(), ReportType::General);
        assert_eq!(ReportType::parse("exámenes").unwrap(), ReportType::Examenes);
        assert!(matches!(ReportType::parse("ventas"), Err(ReportError::UnknownReportType(_))));
        for t in ReportType::ALL {
            assert_eq!(ReportType::parse(t.as_str()).unwrap(), t);
        }
    }

    #[test]
    fn test_file_name_embeds_type_and_range() {
        assert_eq!(
            ReportType::Pacientes.file_name(&march()),
            "reporte_pacientes_2025-03-01_2025-03-31.xlsx"
        );
    }

    #[test]
    fn test_unique_sheet_names() {
        let mut used = HashSet::new();
        let long = "Resultados de un paciente con un nombre larguísimo";

        let first = unique_sheet_name(long, &mut used);
        let second = unique_sheet_name(long, &mut used);
        assert_eq!(first.chars().count(), MAX_SHEET_NAME);
        assert!(second.ends_with(" (2)"));
        assert!(second.chars().count() <= MAX_SHEET_NAME);
        assert_ne!(first.to_lowercase(), second.to_lowercase());

        assert_eq!(unique_sheet_name("Ene/Feb [2025]", &mut used), "Ene_Feb _2025_");
        assert_eq!(unique_sheet_name("pacientes", &mut used), "pacientes");
        assert_eq!(unique_sheet_name("PACIENTES", &mut used), "PACIENTES (2)");
        assert_eq!(unique_sheet_name("  ", &mut used), "Hoja");
        assert_eq!(unique_sheet_name("''", &mut used), "Hoja (2)");

        let obrien = format!("1 {}'Brien", "a".repeat(28));
        let cut = unique_sheet_name(&obrien, &mut used);
        assert_eq!(cut, format!("1 {}", "a".repeat(28)));
        let cut_again = unique_sheet_name(&obrien, &mut used);
        assert!(!cut_again.ends_with('\''));
        assert!(cut_again.ends_with(" (2)"));
    }

    #[test]
    fn test_name_cut_at_apostrophe_still_exports() {
        let mut conn = test_conn();
        seed(&mut conn);
        let glucose = Exam::list(&conn, true)
            .unwrap()
            .into_iter()
            .find(|e| e.code == "GLU")
            .unwrap();
        let patient = Patient::create(
            &conn,
            &PatientCreate {
                document: "7654321".into(),
                first_names: format!("{}'Brien", "a".repeat(28)),
                last_names: None,
                age: Some(41),
                sex: Some(Sex::Male),
                phone: None,
            },
        )
        .unwrap();
        Request::create(
            &mut conn,
            &RequestCreate {
                date: "2025-03-12".into(),
                receipt_number: None,
                service_id: None,
                patient_id: patient.id,
                user_id: None,
                exam_ids: vec![glucose.id],
            },
        )
        .unwrap();

        let dir = tempfile::tempdir().unwrap();
        let single = export_patient_results(&conn, Some(patient.id), &march(), dir.path()).unwrap();
        assert_eq!(single.sheets.len(), 1);
        assert!(!single.sheets[0].name.ends_with('\''));

        let all = export_report(&conn, ReportType::Resultados, &march(), dir.path(), ReportOptions::default())
            .unwrap();
        assert_eq!(all.sheets.len(), 2);
        assert!(all.sheets.iter().all(|s| !s.name.ends_with('\'')));
    }

    #[test]
    fn test_round_trip_headings_match_builders() {
        let mut conn = test_conn();
        seed(&mut conn);

        let export =
            ReportExport::load(&conn, ReportType::General, &march(), ReportOptions::default()).unwrap();
        let sheets = export.sheets();
        let (mut workbook, summaries) = build_workbook(&sheets, &march()).unwrap();
        let mut reader = read_back(&mut workbook);

        assert_eq!(reader.sheet_names(), summaries.iter().map(|s| s.name.clone()).collect::<Vec<_>>());

        for (sheet, summary) in sheets.iter().zip(&summaries) {
            let range = reader.worksheet_range(&summary.name).unwrap();
            assert_eq!(text_at(&range, TITLE_ROW, 0), Some(sheet.title()));
            for (col, heading) in sheet.headings().iter().enumerate() {
                assert_eq!(
                    text_at(&range, HEADER_ROW, col as u32).as_ref(),
                    Some(heading),
                    "sheet {}",
                    summary.name
                );
            }
        }
    }

    #[test]
    fn test_empty_database_exports_placeholders() {
        let conn = test_conn();
        let dir = tempfile::tempdir().unwrap();

        let summary = export_report(
            &conn,
            ReportType::General,
            &march(),
            dir.path(),
            ReportOptions::default(),
        )
        .unwrap();

        let path = dir.path().join("reporte_general_2025-03-01_2025-03-31.xlsx");
        assert_eq!(summary.file_path, path.display().to_string());
        assert!(path.exists());
        assert!(summary.sheets.iter().all(|s| s.rows == 1));

        let mut reader: Xlsx<_> = calamine::open_workbook(&path).unwrap();
        for name in reader.sheet_names() {
            let range = reader.worksheet_range(&name).unwrap();
            assert_eq!(text_at(&range, BODY_ROW, 0).as_deref(), Some(NO_DATA), "sheet {}", name);
        }
    }

    #[test]
    fn test_patient_results_export() {
        let mut conn = test_conn();
        let patient_id = seed(&mut conn);
        let dir = tempfile::tempdir().unwrap();

        let summary = export_patient_results(&conn, Some(patient_id), &march(), dir.path()).unwrap();
        assert_eq!(summary.sheets.len(), 1);
        assert_eq!(summary.sheets[0].name, "1 Ana Pérez");
        assert_eq!(summary.sheets[0].rows, 2);
        assert!(summary.message.ends_with("(1 values out of range)"));

        let mut reader: Xlsx<_> = calamine::open_workbook(&summary.file_path).unwrap();
        let range = reader.worksheet_range("1 Ana Pérez").unwrap();
        assert_eq!(text_at(&range, BODY_ROW, 4).as_deref(), Some("95 mg/dL"));
        assert_eq!(text_at(&range, BODY_ROW + 1, 3).as_deref(), Some("Hemoglobina"));
        assert_eq!(text_at(&range, BODY_ROW + 1, 4).as_deref(), Some("10.2"));

        assert!(matches!(
            export_patient_results(&conn, Some(999), &march(), dir.path()),
            Err(ReportError::PatientNotFound(999))
        ));
    }

    #[test]
    fn test_results_report_without_activity_has_one_sheet() {
        let conn = test_conn();
        let export =
            ReportExport::load(&conn, ReportType::Resultados, &march(), ReportOptions::default()).unwrap();
        let sheets = export.sheets();
        assert_eq!(sheets.len(), 1);
        assert_eq!(sheets[0].body(), vec![vec![Cell::text(NO_DATA)]]);
    }
}
