//! Utility to export a report workbook from the command line
//!
//! Usage: export_report <tipo> <inicio YYYY-MM-DD> <fin YYYY-MM-DD> [paciente_id]
//!
//! `tipo` is general, pacientes, examenes, doctores or resultados. A patient
//! id is only accepted with `resultados`.

use clinlab::report::{export, DateRange, ReportOptions, ReportType};
use clinlab::{config, db};

const USAGE: &str =
    "usage: export_report <general|pacientes|examenes|doctores|resultados> <start YYYY-MM-DD> <end YYYY-MM-DD> [patient_id]";

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive("clinlab=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.len() < 3 || args.len() > 4 {
        eprintln!("{}", USAGE);
        std::process::exit(2);
    }

    let report_type = ReportType::parse(&args[0])?;
    let range = DateRange::parse(&args[1], &args[2])?;
    let patient_id = match args.get(3) {
        Some(raw) if report_type == ReportType::Resultados => Some(raw.parse::<i64>()?),
        Some(_) => {
            eprintln!("a patient id is only valid for 'resultados'\n{}", USAGE);
            std::process::exit(2);
        }
        None => None,
    };

    let db_path = config::get_database_path();
    let export_dir = config::get_export_dir();
    println!("Database path: {}", db_path.display());

    let database = db::Database::new(&db_path)?;
    database.with_conn(|conn| {
        db::migrations::run_migrations(conn)?;
        Ok(())
    })?;

    let conn = database.get_conn()?;
    let summary = match patient_id {
        Some(id) => export::export_patient_results(&conn, Some(id), &range, &export_dir)?,
        None => export::export_report(&conn, report_type, &range, &export_dir, ReportOptions::default())?,
    };

    println!("Report written: {}", summary.file_path);
    println!("  Period: {}", summary.date_range);
    for sheet in &summary.sheets {
        println!("  {:<32} {} rows", sheet.name, sheet.rows);
    }

    Ok(())
}
