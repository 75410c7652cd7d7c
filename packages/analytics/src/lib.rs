#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Non-geographic dashboard sections over the accident store.
//!
//! Each public function runs one grouped query against `DuckDB` and returns
//! typed rows from `accident_map_analytics_models`. Functions taking a
//! [`YearSelection`](accident_map_accident_models::YearSelection) report
//! per-year averages when more than one year is selected.

pub mod drivers;
pub mod overview;
pub mod stats;
pub mod time;
pub mod vehicles;

use accident_map_accident_models::YearSelection;
use accident_map_analytics_models::Breakdown;
use accident_map_database::DbError;
use thiserror::Error;

/// Errors that can occur during analytics operations.
#[derive(Debug, Error)]
pub enum AnalyticsError {
    /// Data store operation failed.
    #[error("Database error: {0}")]
    Database(#[from] DbError),

    /// `DuckDB` query failed.
    #[error("DuckDB error: {0}")]
    DuckDb(#[from] duckdb::Error),

    /// Conversion error.
    #[error("Conversion error: {message}")]
    Conversion {
        /// Description of what went wrong.
        message: String,
    },
}

impl AnalyticsError {
    pub(crate) fn conversion(message: impl Into<String>) -> Self {
        Self::Conversion {
            message: message.into(),
        }
    }
}

/// Wraps rows with the caption of the selection they were computed for.
pub(crate) fn breakdown<T>(years: &YearSelection, rows: Vec<T>) -> Breakdown<T> {
    Breakdown {
        caption: years.display_text(),
        is_average: years.is_average(),
        rows,
    }
}

#[allow(clippy::cast_precision_loss)]
pub(crate) const fn as_f64(count: i64) -> f64 {
    count as f64
}
