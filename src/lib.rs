//! Clinical Laboratory Reporting (clinlab) Library
//!
//! Patients, lab requests and results, plus the reporting pipeline that turns
//! them into aggregated statistics and Excel workbooks.

pub mod build_info;
pub mod config;
pub mod db;
pub mod mcp;
pub mod models;
pub mod report;
pub mod tools;
