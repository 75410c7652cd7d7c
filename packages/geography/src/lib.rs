#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Geographic aggregation pipeline for the accident map.
//!
//! A map request flows through four steps:
//!
//! 1. [`aggregate::aggregate`] counts accidents per region or province
//!    for a set of years, averaging and normalizing as requested.
//! 2. [`boundaries::Boundaries`] holds the region and province polygons,
//!    loaded once from `GeoJSON` and shared read-only.
//! 3. [`geojoin::attach`] copies each polygon and writes the code, display
//!    name and value of its unit into the polygon's properties.
//! 4. [`choropleth::ChoroplethSpec`] assigns colour classes for rendering.
//!
//! Clicking a region feeds [`drilldown::province_breakdown`], which runs
//! the province aggregation scoped to that region.

pub mod aggregate;
pub mod boundaries;
pub mod choropleth;
pub mod config;
pub mod drilldown;
pub mod geojoin;

use accident_map_database::DbError;
use accident_map_geography_models::RegionCode;
use thiserror::Error;

/// Errors that can occur during geography operations.
#[derive(Debug, Error)]
pub enum GeoError {
    /// Data store operation failed.
    #[error("Database error: {0}")]
    Database(#[from] DbError),

    /// `DuckDB` query failed.
    #[error("DuckDB error: {0}")]
    DuckDb(#[from] duckdb::Error),

    /// Reading a boundary or config file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// `GeoJSON` parsing failed.
    #[error("GeoJSON error: {0}")]
    GeoJson(Box<geojson::Error>),

    /// Dashboard config is malformed.
    #[error("Config error: {0}")]
    Toml(#[from] toml::de::Error),

    /// A boundary file is structurally unusable.
    #[error("Boundary error: {message}")]
    Boundary {
        /// Description of what went wrong.
        message: String,
    },

    /// The requested region does not exist in the catalog.
    #[error("Unknown region {0}")]
    UnknownRegion(RegionCode),

    /// Data conversion error.
    #[error("Conversion error: {message}")]
    Conversion {
        /// Description of what went wrong.
        message: String,
    },
}

impl From<geojson::Error> for GeoError {
    fn from(e: geojson::Error) -> Self {
        Self::GeoJson(Box::new(e))
    }
}

impl GeoError {
    pub(crate) fn boundary(message: impl Into<String>) -> Self {
        Self::Boundary {
            message: message.into(),
        }
    }

    pub(crate) fn conversion(message: impl Into<String>) -> Self {
        Self::Conversion {
            message: message.into(),
        }
    }
}
