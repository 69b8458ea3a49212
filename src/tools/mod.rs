//! Clinlab Tools module
//!
//! MCP tool implementations for the clinical laboratory.

pub mod catalog;
pub mod patients;
pub mod reports;
pub mod requests;
pub mod status;

/// File-backed database with migrations applied, for tool tests
#[cfg(test)]
pub(crate) fn test_db() -> (tempfile::TempDir, crate::db::Database) {
    let dir = tempfile::tempdir().unwrap();
    let db = crate::db::Database::new(dir.path().join("clinlab.db")).unwrap();
    db.with_conn(|conn| crate::db::migrations::run_migrations(conn)).unwrap();
    (dir, db)
}
