//! Storage layer
//!
//! Pooled SQLite access and the laboratory schema.

pub mod connection;
pub mod migrations;

pub use connection::{Database, DbError, DbResult};
