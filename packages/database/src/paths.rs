#![allow(clippy::module_name_repetitions)]
//! Canonical file paths for the `DuckDB` data directory.
//!
//! All paths are relative to the project root's `data/` directory unless
//! overridden through the environment.

use std::path::{Path, PathBuf};

/// Environment variable overriding [`accidents_db_path`].
pub const DB_PATH_ENV: &str = "ACCIDENT_MAP_DB";

/// Returns the workspace root directory.
///
/// Resolved at compile time from `CARGO_MANIFEST_DIR`. Falls back to the
/// manifest directory itself if it is not nested two levels deep.
#[must_use]
pub fn project_root() -> PathBuf {
    let manifest = Path::new(env!("CARGO_MANIFEST_DIR"));
    manifest.ancestors().nth(2).unwrap_or(manifest).to_path_buf()
}

/// Returns the `data/` directory path.
#[must_use]
pub fn data_dir() -> PathBuf {
    project_root().join("data")
}

/// Returns the `data/boundaries/` directory holding the `GeoJSON` files.
#[must_use]
pub fn boundaries_dir() -> PathBuf {
    data_dir().join("boundaries")
}

/// Returns the default path of the accidents `DuckDB` file.
#[must_use]
pub fn default_accidents_db_path() -> PathBuf {
    data_dir().join("accidents.duckdb")
}

/// Returns the accidents `DuckDB` path, honouring `ACCIDENT_MAP_DB`.
#[must_use]
pub fn accidents_db_path() -> PathBuf {
    std::env::var_os(DB_PATH_ENV)
        .filter(|v| !v.is_empty())
        .map_or_else(default_accidents_db_path, PathBuf::from)
}

/// Ensures a directory exists, creating it if necessary.
///
/// # Errors
///
/// Returns an I/O error if the directory cannot be created.
pub fn ensure_dir(path: &Path) -> std::io::Result<()> {
    if !path.as_os_str().is_empty() && !path.exists() {
        std::fs::create_dir_all(path)?;
    }
    Ok(())
}
