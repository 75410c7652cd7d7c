#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! `DuckDB` data store for the accident map.
//!
//! A single `DuckDB` file holds the accident microdata together with the
//! province and region lookup tables. Writers (the importer) open it
//! read-write through [`store::open`]; the API server reads it through a
//! [`pool::DuckDbPool`] of read-only connections.

pub mod paths;
pub mod pool;
pub mod store;

use accident_map_geography_models::ProvinceCode;

pub use pool::DuckDbPool;

/// Errors that can occur during database operations.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// `DuckDB` query or connection error.
    #[error("DuckDB error: {0}")]
    DuckDb(#[from] duckdb::Error),

    /// Filesystem error while preparing the data directory.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A connection mutex was poisoned by a panicking holder.
    #[error("Connection pool mutex poisoned")]
    PoolPoisoned,

    /// An accident references a province missing from `provinces`.
    #[error("Unknown province {0}")]
    UnknownProvince(ProvinceCode),

    /// Data conversion error.
    #[error("Data conversion error: {message}")]
    Conversion {
        /// Description of what went wrong.
        message: String,
    },
}

impl DbError {
    pub(crate) fn conversion(message: impl Into<String>) -> Self {
        Self::Conversion {
            message: message.into(),
        }
    }
}
