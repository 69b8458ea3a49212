//! Build script for clinlab
//!
//! Bumps a persistent build counter whenever sources change and embeds it,
//! together with the build time, into the binary.

use std::fs;
use std::path::Path;

const BUILD_NUMBER_FILE: &str = "build_number.txt";

fn next_build_number(path: &Path) -> u64 {
    fs::read_to_string(path)
        .ok()
        .and_then(|s| s.trim().parse::<u64>().ok())
        .unwrap_or(0)
        + 1
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("cargo:rerun-if-changed=src");
    println!("cargo:rerun-if-changed=Cargo.toml");

    let path = Path::new(BUILD_NUMBER_FILE);
    let build = next_build_number(path);
    fs::write(path, build.to_string())?;

    let timestamp = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string();

    println!("cargo:rustc-env=CLINLAB_BUILD_NUMBER={}", build);
    println!("cargo:rustc-env=CLINLAB_BUILD_TIMESTAMP={}", timestamp);
    println!("cargo:warning=clinlab build #{} ({})", build, timestamp);

    Ok(())
}
