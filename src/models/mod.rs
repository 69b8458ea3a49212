//! Data models
//!
//! Rust structs representing database entities.

mod catalog;
mod exam;
mod exam_detail;
mod patient;
mod request;
mod result_value;

pub use catalog::{Category, Role, Service, User};
pub use exam::{Exam, ExamCreate, ExamField, ExamFieldCreate, ExamType};
pub use exam_detail::{ExamDetail, ExamDetailView, ExamStatus};
pub use patient::{Patient, PatientCreate, Sex};
pub use request::{Request, RequestCreate};
pub use result_value::{
    is_out_of_range, ReferenceRange, ResultValue, ResultValueCreate, ResultValueView,
};

/// Fresh in-memory database with the schema applied and foreign keys on
#[cfg(test)]
pub(crate) fn test_conn() -> rusqlite::Connection {
    let conn = rusqlite::Connection::open_in_memory().unwrap();
    conn.execute_batch("PRAGMA foreign_keys = ON;").unwrap();
    crate::db::migrations::run_migrations(&conn).unwrap();
    conn
}
