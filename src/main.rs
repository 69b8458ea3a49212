//! Clinical Laboratory Reporting (clinlab)
//!
//! An MCP server for lab requests, results and Excel report exports.

use rmcp::ServiceExt;
use tokio::io::{stdin, stdout};
use tracing_subscriber::EnvFilter;

use clinlab::mcp::ClinlabService;
use clinlab::{build_info, config, db};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Logging goes to stderr; stdout carries the MCP transport
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("clinlab=info".parse()?))
        .with_writer(std::io::stderr)
        .init();

    build_info::print_startup_banner();
    eprintln!("Starting MCP server on stdio...");

    let db_path = config::get_database_path();
    let export_dir = config::get_export_dir();
    eprintln!("Database path: {}", db_path.display());
    eprintln!("Export directory: {}", export_dir.display());

    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::create_dir_all(&export_dir)?;

    eprintln!("Initializing database...");
    let database = db::Database::new(&db_path)?;

    database.with_conn(|conn| {
        if db::migrations::needs_migration(conn)? {
            eprintln!("Applying migrations...");
            db::migrations::run_migrations(conn)?;
        }
        let version = db::migrations::get_schema_version(conn)?;
        eprintln!("Database schema version: {}", version);
        Ok(())
    })?;

    let service = ClinlabService::new(database.path().to_path_buf(), export_dir, database);

    let transport = (stdin(), stdout());
    let server = service.serve(transport).await?;
    server.waiting().await?;

    Ok(())
}
