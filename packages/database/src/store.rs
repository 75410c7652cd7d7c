//! Accident and lookup-table storage in `DuckDB`.
//!
//! The store holds three tables:
//!
//! * `accidents`: one row per reported accident, year stored as its
//!   two-digit offset from 2000 and province as its integer ISTAT code.
//! * `provinces`: province code, name, parent region, population.
//! * `regions`: region code, name, population.
//!
//! Codes are stored as integers; their padded text forms only exist at the
//! API boundary.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use accident_map_accident_models::{AccidentRecord, Year, YearSelection};
use accident_map_geography_models::{GeoCatalog, Province, ProvinceCode, Region, RegionCode};
use duckdb::Connection;

use crate::DbError;

/// Number of rows per INSERT chunk (`DuckDB` handles large batches well).
const CHUNK_SIZE: usize = 5_000;

/// Opens (or creates) the accident store and ensures the schema exists.
///
/// # Errors
///
/// Returns [`DbError`] if the connection or schema creation fails.
pub fn open(path: &Path) -> Result<Connection, DbError> {
    if let Some(parent) = path.parent() {
        crate::paths::ensure_dir(parent)?;
    }

    log::info!("Opening accident store at {}", path.display());
    let conn = Connection::open(path)?;

    conn.execute_batch(
        "SET threads = 4;
         SET memory_limit = '512MB';",
    )?;

    create_schema(&conn)?;

    Ok(conn)
}

/// Opens the accident store at the configured default path.
///
/// # Errors
///
/// Returns [`DbError`] if the connection or schema creation fails.
pub fn open_default() -> Result<Connection, DbError> {
    open(&crate::paths::accidents_db_path())
}

/// Opens a fresh in-memory store with the schema in place.
///
/// # Errors
///
/// Returns [`DbError`] if the connection or schema creation fails.
pub fn open_in_memory() -> Result<Connection, DbError> {
    let conn = Connection::open_in_memory()?;
    create_schema(&conn)?;
    Ok(conn)
}

/// Opens an existing store read-only.
///
/// # Errors
///
/// Returns [`DbError`] if the file does not exist or cannot be opened.
pub fn open_read_only(path: &Path) -> Result<Connection, DbError> {
    let config = duckdb::Config::default().access_mode(duckdb::AccessMode::ReadOnly)?;
    Ok(Connection::open_with_flags(path, config)?)
}

fn create_schema(conn: &Connection) -> Result<(), DbError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS regions (
            code SMALLINT NOT NULL PRIMARY KEY,
            name TEXT NOT NULL,
            population BIGINT
        );

        CREATE TABLE IF NOT EXISTS provinces (
            code SMALLINT NOT NULL PRIMARY KEY,
            name TEXT NOT NULL,
            region_code SMALLINT NOT NULL,
            population BIGINT
        );

        CREATE TABLE IF NOT EXISTS accidents (
            year SMALLINT NOT NULL,
            province_code SMALLINT NOT NULL,
            weekday SMALLINT NOT NULL,
            hour SMALLINT,
            vehicle_a SMALLINT,
            vehicle_b SMALLINT,
            sex_a TEXT,
            age_a TEXT,
            sex_b TEXT,
            age_b TEXT,
            deaths INTEGER NOT NULL DEFAULT 0,
            injured INTEGER NOT NULL DEFAULT 0
        );",
    )?;

    Ok(())
}

/// Returns `n` comma-separated `?` placeholders for an `IN (...)` list.
#[must_use]
pub fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

/// Returns the stored year offsets of a selection, in bind order.
#[must_use]
pub fn year_params(years: &YearSelection) -> Vec<i16> {
    years.iter().map(|y| i16::from(y.offset())).collect()
}

/// Keeps the last occurrence of each key, preserving input order.
fn dedupe_last<T, K: Ord>(items: &[T], key: impl Fn(&T) -> K) -> Vec<&T> {
    let mut last_seen: BTreeMap<K, usize> = BTreeMap::new();
    for (i, item) in items.iter().enumerate() {
        last_seen.insert(key(item), i);
    }
    items
        .iter()
        .enumerate()
        .filter(|(i, item)| last_seen.get(&key(item)) == Some(i))
        .map(|(_, item)| item)
        .collect()
}

fn clamp_population(population: Option<u64>) -> Option<i64> {
    population.map(|p| i64::try_from(p).unwrap_or(i64::MAX))
}

/// Fails on the first record whose province is not in `provinces`.
fn check_provinces(conn: &Connection, records: &[AccidentRecord]) -> Result<(), DbError> {
    let mut stmt = conn.prepare("SELECT code FROM provinces")?;
    let known = stmt
        .query_map([], |row| row.get::<_, i64>(0))?
        .collect::<Result<BTreeSet<_>, _>>()?;

    records
        .iter()
        .map(|r| r.province)
        .find(|code| !known.contains(&i64::from(code.value())))
        .map_or(Ok(()), |code| Err(DbError::UnknownProvince(code)))
}

/// Inserts a batch of accident records.
///
/// Every record must reference a province already in the store; the
/// aggregations join through `provinces`, so orphans would never be
/// counted. Returns the number of rows inserted.
///
/// # Errors
///
/// Returns [`DbError::UnknownProvince`] if a record's province is not in
/// the store, or [`DbError`] if any database operation fails.
pub fn insert_accidents(conn: &Connection, records: &[AccidentRecord]) -> Result<u64, DbError> {
    if records.is_empty() {
        return Ok(0);
    }

    check_provinces(conn, records)?;

    let mut total_inserted = 0u64;

    for chunk in records.chunks(CHUNK_SIZE) {
        let mut sql = String::from(
            "INSERT INTO accidents (
                year, province_code, weekday, hour, vehicle_a, vehicle_b,
                sex_a, age_a, sex_b, age_b, deaths, injured
            ) VALUES ",
        );

        for i in 0..chunk.len() {
            if i > 0 {
                sql.push_str(", ");
            }
            sql.push_str("(?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)");
        }

        let mut stmt = conn.prepare(&sql)?;
        let mut param_idx = 1usize;

        for record in chunk {
            stmt.raw_bind_parameter(param_idx, i16::from(record.year.offset()))?;
            stmt.raw_bind_parameter(param_idx + 1, i32::from(record.province.value()))?;
            stmt.raw_bind_parameter(param_idx + 2, i16::from(record.weekday.code()))?;
            stmt.raw_bind_parameter(param_idx + 3, record.hour.map(i16::from))?;
            stmt.raw_bind_parameter(param_idx + 4, record.vehicle_a.map(i16::from))?;
            stmt.raw_bind_parameter(param_idx + 5, record.vehicle_b.map(i16::from))?;
            stmt.raw_bind_parameter(param_idx + 6, record.sex_a.as_ref().map(AsRef::<str>::as_ref))?;
            stmt.raw_bind_parameter(param_idx + 7, record.age_a.as_ref().map(AsRef::<str>::as_ref))?;
            stmt.raw_bind_parameter(param_idx + 8, record.sex_b.as_ref().map(AsRef::<str>::as_ref))?;
            stmt.raw_bind_parameter(param_idx + 9, record.age_b.as_ref().map(AsRef::<str>::as_ref))?;
            stmt.raw_bind_parameter(param_idx + 10, i64::from(record.deaths))?;
            stmt.raw_bind_parameter(param_idx + 11, i64::from(record.injured))?;

            param_idx += 12;
        }

        let rows = stmt.raw_execute()?;
        total_inserted += u64::try_from(rows).unwrap_or(0);
    }

    log::debug!("Inserted {total_inserted} accident rows");

    Ok(total_inserted)
}

/// Deletes every accident row, returning how many were removed.
///
/// # Errors
///
/// Returns [`DbError`] if the delete fails.
pub fn clear_accidents(conn: &Connection) -> Result<u64, DbError> {
    let rows = conn.execute("DELETE FROM accidents", [])?;
    Ok(u64::try_from(rows).unwrap_or(0))
}

/// Inserts or updates region rows.
///
/// Duplicate codes within the batch keep their last occurrence.
///
/// # Errors
///
/// Returns [`DbError`] if any database operation fails.
pub fn upsert_regions(conn: &Connection, regions: &[Region]) -> Result<u64, DbError> {
    let deduped = dedupe_last(regions, |r| r.code);
    let mut total = 0u64;

    for chunk in deduped.chunks(CHUNK_SIZE) {
        let mut sql = String::from("INSERT INTO regions (code, name, population) VALUES ");
        for i in 0..chunk.len() {
            if i > 0 {
                sql.push_str(", ");
            }
            sql.push_str("(?, ?, ?)");
        }
        sql.push_str(
            " ON CONFLICT (code) DO UPDATE SET
                name = EXCLUDED.name,
                population = EXCLUDED.population",
        );

        let mut stmt = conn.prepare(&sql)?;
        let mut param_idx = 1usize;

        for region in chunk {
            stmt.raw_bind_parameter(param_idx, i16::from(region.code.value()))?;
            stmt.raw_bind_parameter(param_idx + 1, &region.name)?;
            stmt.raw_bind_parameter(param_idx + 2, clamp_population(region.population))?;
            param_idx += 3;
        }

        let rows = stmt.raw_execute()?;
        total += u64::try_from(rows).unwrap_or(0);
    }

    Ok(total)
}

/// Inserts or updates province rows.
///
/// Duplicate codes within the batch keep their last occurrence.
///
/// # Errors
///
/// Returns [`DbError`] if any database operation fails.
pub fn upsert_provinces(conn: &Connection, provinces: &[Province]) -> Result<u64, DbError> {
    let deduped = dedupe_last(provinces, |p| p.code);
    let mut total = 0u64;

    for chunk in deduped.chunks(CHUNK_SIZE) {
        let mut sql =
            String::from("INSERT INTO provinces (code, name, region_code, population) VALUES ");
        for i in 0..chunk.len() {
            if i > 0 {
                sql.push_str(", ");
            }
            sql.push_str("(?, ?, ?, ?)");
        }
        sql.push_str(
            " ON CONFLICT (code) DO UPDATE SET
                name = EXCLUDED.name,
                region_code = EXCLUDED.region_code,
                population = EXCLUDED.population",
        );

        let mut stmt = conn.prepare(&sql)?;
        let mut param_idx = 1usize;

        for province in chunk {
            stmt.raw_bind_parameter(param_idx, i32::from(province.code.value()))?;
            stmt.raw_bind_parameter(param_idx + 1, &province.name)?;
            stmt.raw_bind_parameter(param_idx + 2, i16::from(province.region.value()))?;
            stmt.raw_bind_parameter(param_idx + 3, clamp_population(province.population))?;
            param_idx += 4;
        }

        let rows = stmt.raw_execute()?;
        total += u64::try_from(rows).unwrap_or(0);
    }

    Ok(total)
}

/// Counts accidents in the selected years.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails.
pub fn accident_count(conn: &Connection, years: &YearSelection) -> Result<u64, DbError> {
    let sql = format!(
        "SELECT COUNT(*) FROM accidents WHERE year IN ({})",
        placeholders(years.len())
    );
    let count: i64 = conn.query_row(
        &sql,
        duckdb::params_from_iter(year_params(years)),
        |row| row.get(0),
    )?;
    u64::try_from(count).map_err(|e| DbError::conversion(e.to_string()))
}

/// Returns the years present in the store, ascending.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails or a stored year is invalid.
pub fn available_years(conn: &Connection) -> Result<Vec<Year>, DbError> {
    let mut stmt = conn.prepare("SELECT DISTINCT year FROM accidents ORDER BY year")?;
    let offsets = stmt
        .query_map([], |row| row.get::<_, i64>(0))?
        .collect::<Result<Vec<_>, _>>()?;

    offsets
        .into_iter()
        .map(|offset| {
            u8::try_from(offset)
                .ok()
                .and_then(|o| Year::new(o).ok())
                .ok_or_else(|| DbError::conversion(format!("invalid stored year {offset}")))
        })
        .collect()
}

/// Returns every stored year as a selection, or `None` when the store is
/// empty.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails.
pub fn all_years(conn: &Connection) -> Result<Option<YearSelection>, DbError> {
    Ok(YearSelection::from_years(available_years(conn)?).ok())
}

fn population_from_sql(value: Option<i64>) -> Result<Option<u64>, DbError> {
    value
        .map(|p| u64::try_from(p).map_err(|_| DbError::conversion(format!("negative population {p}"))))
        .transpose()
}

/// Loads every region and province into a [`GeoCatalog`].
///
/// # Errors
///
/// Returns [`DbError`] if a query fails or a stored code is invalid.
pub fn load_catalog(conn: &Connection) -> Result<GeoCatalog, DbError> {
    let mut stmt = conn.prepare("SELECT code, name, population FROM regions ORDER BY code")?;
    let region_rows = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Option<i64>>(2)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let regions = region_rows
        .into_iter()
        .map(|(code, name, population)| {
            Ok(Region {
                code: RegionCode::try_from(code).map_err(|e| DbError::conversion(e.to_string()))?,
                name,
                population: population_from_sql(population)?,
            })
        })
        .collect::<Result<Vec<_>, DbError>>()?;

    let mut stmt = conn.prepare(
        "SELECT code, name, region_code, population FROM provinces ORDER BY code",
    )?;
    let province_rows = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, i64>(2)?,
                row.get::<_, Option<i64>>(3)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let provinces = province_rows
        .into_iter()
        .map(|(code, name, region, population)| {
            Ok(Province {
                code: ProvinceCode::try_from(code)
                    .map_err(|e| DbError::conversion(e.to_string()))?,
                name,
                region: RegionCode::try_from(region)
                    .map_err(|e| DbError::conversion(e.to_string()))?,
                population: population_from_sql(population)?,
            })
        })
        .collect::<Result<Vec<_>, DbError>>()?;

    log::debug!(
        "Loaded catalog: {} regions, {} provinces",
        regions.len(),
        provinces.len()
    );

    Ok(GeoCatalog::new(regions, provinces))
}
