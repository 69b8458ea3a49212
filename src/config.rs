//! Runtime configuration
//!
//! Paths come from the environment, falling back to directories under the
//! project root.

use std::path::{Path, PathBuf};

pub const DATABASE_PATH_VAR: &str = "CLINLAB_DATABASE_PATH";
pub const EXPORT_DIR_VAR: &str = "CLINLAB_EXPORT_DIR";

/// Project root, found by walking up from the executable.
///
/// A binary under `target/release` or `target/debug` resolves to the
/// directory that holds `target`.
pub fn project_root() -> PathBuf {
    let exe_dir = std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."));
    root_from_exe_dir(exe_dir)
}

fn root_from_exe_dir(mut path: PathBuf) -> PathBuf {
    // Test and bench binaries live in target/<profile>/deps
    if path.ends_with("deps") {
        path.pop();
    }
    if path.ends_with("release") || path.ends_with("debug") {
        if let Some(grandparent) = path.parent().and_then(Path::parent) {
            path = grandparent.to_path_buf();
        }
    }
    path
}

fn path_from_env(var: &str) -> Option<PathBuf> {
    std::env::var(var)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .map(PathBuf::from)
}

/// SQLite database path
pub fn get_database_path() -> PathBuf {
    path_from_env(DATABASE_PATH_VAR).unwrap_or_else(|| {
        let mut path = project_root();
        path.push("data");
        path.push("clinlab.db");
        path
    })
}

/// Directory that exported workbooks are written to
pub fn get_export_dir() -> PathBuf {
    path_from_env(EXPORT_DIR_VAR).unwrap_or_else(|| project_root().join("exports"))
}
