#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! API request and response types for the accident map server.
//!
//! Section rows and the choropleth itself are serialized straight from
//! the analytics and geography types; this crate holds only the envelopes
//! and query parameters specific to the HTTP contract.

use std::fmt;

use accident_map_accident_models::{InvalidYearError, Year};
use accident_map_geography_models::{
    DrillDownState, Granularity, MapEvent, ProvinceValue, RegionCode,
};
use serde::{Deserialize, Serialize};

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiHealth {
    /// Always `true` when the server answers.
    pub healthy: bool,
    /// Crate version.
    pub version: String,
}

/// Error body returned with every non-2xx response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    /// Human-readable message.
    pub error: String,
}

impl ApiError {
    /// Wraps a message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}

/// Years present in the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiYears {
    /// Calendar years, ascending.
    pub years: Vec<u16>,
    /// Caption for the all-years selection, e.g. `"Average 2019-2023"`.
    pub all_caption: Option<String>,
}

/// The `year` query parameter: one year, or every available year.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum YearFilter {
    /// Every year in the store, averaged.
    #[default]
    All,
    /// A single year.
    Single(Year),
}

impl YearFilter {
    /// Parses an optional `year` parameter.
    ///
    /// Absent, empty and `all` (any case) select every year; otherwise the
    /// value must be a year such as `2021` or `21`.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidYearError`] if the value is not a valid year.
    pub fn parse(raw: Option<&str>) -> Result<Self, InvalidYearError> {
        match raw.map(str::trim) {
            None | Some("") => Ok(Self::All),
            Some(s) if s.eq_ignore_ascii_case("all") => Ok(Self::All),
            Some(s) => s.parse().map(Self::Single),
        }
    }
}

impl fmt::Display for YearFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str("all"),
            Self::Single(year) => write!(f, "{year}"),
        }
    }
}

/// Query parameters accepted by every per-selection section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct YearQueryParams {
    /// `all`, absent, or a year.
    pub year: Option<String>,
}

/// Query parameters for the map endpoints.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MapQueryParams {
    /// `region` (default) or `province`.
    pub granularity: Option<Granularity>,
    /// `all`, absent, or a year.
    pub year: Option<String>,
    /// Report incidents per 100,000 residents.
    #[serde(default)]
    pub normalize: bool,
}

/// Query parameters for a region's province list.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DrillDownQueryParams {
    /// `all`, absent, or a year.
    pub year: Option<String>,
    /// Report incidents per 100,000 residents.
    #[serde(default)]
    pub normalize: bool,
}

/// Provinces of one region, as listed beside the map.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiProvinceBreakdown {
    /// The region.
    pub region: RegionCode,
    /// Region name.
    pub region_name: String,
    /// Years shown.
    pub caption: String,
    /// Values are per 100,000 residents.
    pub normalize: bool,
    /// Provinces with accidents, ascending by value.
    pub provinces: Vec<ProvinceValue>,
}

/// Body of `POST /api/geography/selection`.
///
/// The client owns the drill-down state and sends it back with every
/// event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionRequest {
    /// State before the event.
    #[serde(default)]
    pub state: DrillDownState,
    /// The map interaction.
    pub event: MapEvent,
    /// `all`, absent, or a year.
    #[serde(default)]
    pub year: Option<String>,
    /// Report incidents per 100,000 residents.
    #[serde(default)]
    pub normalize: bool,
}

/// Response of `POST /api/geography/selection`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionResponse {
    /// State after the event.
    pub state: DrillDownState,
    /// Years shown.
    pub caption: String,
    /// Provinces of the selected region, empty when nothing is selected.
    pub provinces: Vec<ProvinceValue>,
}
