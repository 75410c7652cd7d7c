#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Loads ISTAT accident microdata and the region/province lookup tables
//! into the `DuckDB` store.
//!
//! Lookup tables are small curated CSV files (`code,name,population` for
//! regions, `code,name,region,population` for provinces) and are rejected
//! outright when malformed. Accident files are large and dirty, so bad
//! rows are skipped and counted instead.

pub mod progress;
pub mod record;

use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use accident_map_accident_models::AccidentRecord;
use accident_map_database::{DbError, store};
use accident_map_geography_models::{Province, Region};
use duckdb::Connection;
use serde::Serialize;
use thiserror::Error;

use crate::progress::ProgressCallback;
use crate::record::{RawAccident, SkipReason};

/// Accident rows inserted per batch.
pub const BATCH_SIZE: usize = 10_000;

/// Errors that can occur during import.
#[derive(Debug, Error)]
pub enum IngestError {
    /// CSV parsing failed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Data store operation failed.
    #[error("Database error: {0}")]
    Database(#[from] DbError),

    /// Lookup table content is inconsistent.
    #[error("Invalid lookup data: {message}")]
    Lookup {
        /// Description of what went wrong.
        message: String,
    },
}

/// Row counts from one import.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    /// Data rows read from the file.
    pub read: u64,
    /// Rows written to the store.
    pub inserted: u64,
    /// Rows rejected.
    pub skipped: u64,
}

/// Returns the field delimiter for an accident file: tab for the raw
/// survey `.txt` files, comma otherwise.
#[must_use]
pub fn delimiter_for(path: &Path) -> u8 {
    if path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("txt") || ext.eq_ignore_ascii_case("tsv"))
    {
        b'\t'
    } else {
        b','
    }
}

/// Imports regions from a `code,name,population` CSV.
///
/// Existing regions with the same code are replaced.
///
/// # Errors
///
/// Returns [`IngestError`] if a row is malformed or the upsert fails.
pub fn import_regions(conn: &Connection, reader: impl Read) -> Result<ImportSummary, IngestError> {
    let mut csv_reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let regions = csv_reader
        .deserialize::<Region>()
        .collect::<Result<Vec<_>, _>>()?;

    let inserted = store::upsert_regions(conn, &regions)?;
    log::info!("Imported {inserted} regions");

    Ok(ImportSummary {
        read: regions.len() as u64,
        inserted,
        skipped: 0,
    })
}

/// Imports provinces from a `code,name,region,population` CSV.
///
/// Provinces whose region is not in the store are skipped with a warning,
/// so regions must be imported first.
///
/// # Errors
///
/// Returns [`IngestError`] if a row is malformed or the upsert fails.
pub fn import_provinces(
    conn: &Connection,
    reader: impl Read,
) -> Result<ImportSummary, IngestError> {
    let catalog = store::load_catalog(conn)?;
    if catalog.regions.is_empty() {
        return Err(IngestError::Lookup {
            message: "no regions in the store; import regions before provinces".to_string(),
        });
    }

    let mut csv_reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let rows = csv_reader
        .deserialize::<Province>()
        .collect::<Result<Vec<_>, _>>()?;
    let read = rows.len() as u64;

    let (known, orphans): (Vec<Province>, Vec<Province>) = rows
        .into_iter()
        .partition(|p| catalog.has_region(p.region));

    for orphan in &orphans {
        log::warn!(
            "Skipping province {} ({}): unknown region {}",
            orphan.code,
            orphan.name,
            orphan.region
        );
    }

    let inserted = store::upsert_provinces(conn, &known)?;
    log::info!("Imported {inserted} provinces");

    Ok(ImportSummary {
        read,
        inserted,
        skipped: orphans.len() as u64,
    })
}

/// Imports accident rows from a delimited file.
///
/// Rows missing year, province or weekday, rows whose province is not in
/// the catalog, and rows involving a third vehicle are skipped. Rows are
/// inserted in batches of [`BATCH_SIZE`], advancing `progress` after each.
///
/// # Errors
///
/// Returns [`IngestError`] if the file cannot be parsed as CSV or an
/// insert fails.
pub fn import_accidents(
    conn: &Connection,
    reader: impl Read,
    delimiter: u8,
    progress: &Arc<dyn ProgressCallback>,
) -> Result<ImportSummary, IngestError> {
    let start = Instant::now();
    let catalog = store::load_catalog(conn)?;
    if catalog.provinces.is_empty() {
        log::warn!("No provinces in the store; every accident row will be skipped");
    }

    let mut csv_reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .from_reader(reader);

    let mut summary = ImportSummary::default();
    let mut reasons: BTreeMap<SkipReason, u64> = BTreeMap::new();
    let mut batch: Vec<AccidentRecord> = Vec::with_capacity(BATCH_SIZE);

    progress.set_message("Importing accidents".to_string());

    for result in csv_reader.deserialize::<RawAccident>() {
        summary.read += 1;
        let raw = match result {
            Ok(raw) => raw,
            Err(e) => {
                log::trace!("  skipping malformed row: {e}");
                summary.skipped += 1;
                continue;
            }
        };

        match raw.into_record(&catalog) {
            Ok(record) => batch.push(record),
            Err(reason) => {
                summary.skipped += 1;
                *reasons.entry(reason).or_default() += 1;
                continue;
            }
        }

        if batch.len() >= BATCH_SIZE {
            summary.inserted += store::insert_accidents(conn, &batch)?;
            progress.inc(batch.len() as u64);
            batch.clear();
        }
    }

    if !batch.is_empty() {
        summary.inserted += store::insert_accidents(conn, &batch)?;
        progress.inc(batch.len() as u64);
    }

    for (reason, count) in &reasons {
        log::warn!("Skipped {count} rows: {reason}");
    }

    let elapsed = start.elapsed();
    progress.finish(format!(
        "Imported {} accidents ({} skipped) in {:.1}s",
        summary.inserted,
        summary.skipped,
        elapsed.as_secs_f64()
    ));
    log::info!(
        "Accident import: {} read, {} inserted, {} skipped in {:.1}s",
        summary.read,
        summary.inserted,
        summary.skipped,
        elapsed.as_secs_f64()
    );

    Ok(summary)
}

/// Opens `path` and imports it with [`import_accidents`], choosing the
/// delimiter from the file extension unless one is given.
///
/// # Errors
///
/// Returns [`IngestError`] if the file cannot be opened or imported.
pub fn import_accident_file(
    conn: &Connection,
    path: &Path,
    delimiter: Option<u8>,
    progress: &Arc<dyn ProgressCallback>,
) -> Result<ImportSummary, IngestError> {
    log::info!("Importing accidents from {}", path.display());
    let file = File::open(path)?;
    import_accidents(
        conn,
        file,
        delimiter.unwrap_or_else(|| delimiter_for(path)),
        progress,
    )
}
