#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Italian administrative units and geographic aggregation types.
//!
//! Region and province codes are held as typed integers and always
//! rendered in their canonical zero-padded form (`"01"` for regions,
//! `"001"` for provinces). Every boundary file, CSV column, and query row
//! is converted into these types when it enters the system, so joins
//! never compare an integer against a padded string.

pub mod drilldown;
pub mod istat;

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

pub use drilldown::{DrillDownState, MapEvent};
pub use istat::MacroArea;

/// Error returned when a value cannot be read as an administrative code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidCodeError {
    /// Which kind of code was expected (`"region"`, `"province"`, ...).
    pub kind: &'static str,
    /// The rejected input, as text.
    pub input: String,
}

impl fmt::Display for InvalidCodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid {} code '{}'", self.kind, self.input)
    }
}

impl std::error::Error for InvalidCodeError {}

/// Any of the shapes a code takes in source data: `1`, `1.0`, `"1"`, `"01"`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum CodeRepr {
    /// Integer code.
    Int(u64),
    /// Whole-number float, as written by dataframe exports.
    Float(f64),
    /// Padded or unpadded text.
    Text(String),
}

impl CodeRepr {
    fn numeric(&self) -> Option<u64> {
        match self {
            Self::Int(v) => Some(*v),
            Self::Float(v) => whole_number(*v),
            Self::Text(s) => parse_numeric(s),
        }
    }

    fn describe(&self) -> String {
        match self {
            Self::Int(v) => v.to_string(),
            Self::Float(v) => v.to_string(),
            Self::Text(s) => s.clone(),
        }
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn whole_number(v: f64) -> Option<u64> {
    (v.is_finite() && v >= 0.0 && v.fract() == 0.0 && v <= 1e15).then_some(v as u64)
}

/// Parses `"7"`, `"07"`, `" 007 "` and `"7.0"` as `7`.
fn parse_numeric(s: &str) -> Option<u64> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if s.bytes().all(|b| b.is_ascii_digit()) {
        return s.parse().ok();
    }
    s.parse::<f64>().ok().and_then(whole_number)
}

/// ISTAT region code (01-20), rendered as a two-digit zero-padded string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "CodeRepr")]
pub struct RegionCode(u8);

impl RegionCode {
    /// Creates a region code from its numeric value.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidCodeError`] if the value is outside 01-20.
    pub fn new(value: u8) -> Result<Self, InvalidCodeError> {
        if istat::REGION_CODES.contains(&value) {
            Ok(Self(value))
        } else {
            Err(InvalidCodeError {
                kind: "region",
                input: value.to_string(),
            })
        }
    }

    /// Returns the numeric value of this code.
    #[must_use]
    pub const fn value(self) -> u8 {
        self.0
    }

    /// Returns the macro area this region belongs to.
    #[must_use]
    pub const fn macro_area(self) -> Option<MacroArea> {
        istat::macro_area(self)
    }
}

impl fmt::Display for RegionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}", self.0)
    }
}

impl FromStr for RegionCode {
    type Err = InvalidCodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::try_from(CodeRepr::Text(s.to_string()))
    }
}

impl TryFrom<CodeRepr> for RegionCode {
    type Error = InvalidCodeError;

    fn try_from(raw: CodeRepr) -> Result<Self, Self::Error> {
        raw.numeric()
            .and_then(|v| u8::try_from(v).ok())
            .and_then(|v| Self::new(v).ok())
            .ok_or_else(|| InvalidCodeError {
                kind: "region",
                input: raw.describe(),
            })
    }
}

impl TryFrom<i64> for RegionCode {
    type Error = InvalidCodeError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        u8::try_from(value)
            .map_err(|_| InvalidCodeError {
                kind: "region",
                input: value.to_string(),
            })
            .and_then(Self::new)
    }
}

impl From<RegionCode> for String {
    fn from(code: RegionCode) -> Self {
        code.to_string()
    }
}

/// ISTAT province code (001-999), rendered as a three-digit zero-padded
/// string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "CodeRepr")]
pub struct ProvinceCode(u16);

impl ProvinceCode {
    /// Creates a province code from its numeric value.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidCodeError`] if the value is zero or wider than
    /// three digits.
    pub fn new(value: u16) -> Result<Self, InvalidCodeError> {
        if (1..=999).contains(&value) {
            Ok(Self(value))
        } else {
            Err(InvalidCodeError {
                kind: "province",
                input: value.to_string(),
            })
        }
    }

    /// Returns the numeric value of this code.
    #[must_use]
    pub const fn value(self) -> u16 {
        self.0
    }
}

impl fmt::Display for ProvinceCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:03}", self.0)
    }
}

impl FromStr for ProvinceCode {
    type Err = InvalidCodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::try_from(CodeRepr::Text(s.to_string()))
    }
}

impl TryFrom<CodeRepr> for ProvinceCode {
    type Error = InvalidCodeError;

    fn try_from(raw: CodeRepr) -> Result<Self, Self::Error> {
        raw.numeric()
            .and_then(|v| u16::try_from(v).ok())
            .and_then(|v| Self::new(v).ok())
            .ok_or_else(|| InvalidCodeError {
                kind: "province",
                input: raw.describe(),
            })
    }
}

impl TryFrom<i64> for ProvinceCode {
    type Error = InvalidCodeError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        u16::try_from(value)
            .map_err(|_| InvalidCodeError {
                kind: "province",
                input: value.to_string(),
            })
            .and_then(Self::new)
    }
}

impl From<ProvinceCode> for String {
    fn from(code: ProvinceCode) -> Self {
        code.to_string()
    }
}

/// Geographic aggregation granularity.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum Granularity {
    /// One of the 20 regions.
    Region,
    /// One of the provinces (second-level units).
    Province,
}

/// Administrative code of either kind of geographic unit.
///
/// Serialized as its canonical string. The two kinds never collide:
/// region codes are always two characters wide, province codes three.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum GeoCode {
    /// A region code.
    Region(RegionCode),
    /// A province code.
    Province(ProvinceCode),
}

impl GeoCode {
    /// Returns the granularity this code belongs to.
    #[must_use]
    pub const fn granularity(self) -> Granularity {
        match self {
            Self::Region(_) => Granularity::Region,
            Self::Province(_) => Granularity::Province,
        }
    }

    /// Parses a code of a known granularity from any textual
    /// representation (padded or not).
    ///
    /// # Errors
    ///
    /// Returns [`InvalidCodeError`] if the text is not a valid code.
    pub fn parse(granularity: Granularity, s: &str) -> Result<Self, InvalidCodeError> {
        match granularity {
            Granularity::Region => s.parse().map(Self::Region),
            Granularity::Province => s.parse().map(Self::Province),
        }
    }
}

impl fmt::Display for GeoCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Region(c) => c.fmt(f),
            Self::Province(c) => c.fmt(f),
        }
    }
}

impl TryFrom<String> for GeoCode {
    type Error = InvalidCodeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        match s.len() {
            2 => s.parse().map(Self::Region),
            3 => s.parse().map(Self::Province),
            _ => Err(InvalidCodeError {
                kind: "canonical geographic",
                input: s,
            }),
        }
    }
}

impl From<GeoCode> for String {
    fn from(code: GeoCode) -> Self {
        code.to_string()
    }
}

/// A region row as stored in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Region {
    /// ISTAT region code.
    pub code: RegionCode,
    /// Display name.
    pub name: String,
    /// Resident population, if known.
    pub population: Option<u64>,
}

/// A province row as stored in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Province {
    /// ISTAT province code.
    pub code: ProvinceCode,
    /// Display name.
    pub name: String,
    /// Region this province belongs to.
    pub region: RegionCode,
    /// Resident population, if known.
    pub population: Option<u64>,
}

/// All known regions and provinces, keyed by code.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeoCatalog {
    /// Regions by code.
    pub regions: BTreeMap<RegionCode, Region>,
    /// Provinces by code.
    pub provinces: BTreeMap<ProvinceCode, Province>,
}

impl GeoCatalog {
    /// Builds a catalog from region and province rows.
    #[must_use]
    pub fn new(regions: Vec<Region>, provinces: Vec<Province>) -> Self {
        Self {
            regions: regions.into_iter().map(|r| (r.code, r)).collect(),
            provinces: provinces.into_iter().map(|p| (p.code, p)).collect(),
        }
    }

    /// Returns the parent region of a province.
    #[must_use]
    pub fn region_of(&self, province: ProvinceCode) -> Option<RegionCode> {
        self.provinces.get(&province).map(|p| p.region)
    }

    /// Returns whether a region with this code exists.
    #[must_use]
    pub fn has_region(&self, region: RegionCode) -> bool {
        self.regions.contains_key(&region)
    }

    /// Returns the display name of a unit, if it is known.
    #[must_use]
    pub fn name_of(&self, code: GeoCode) -> Option<&str> {
        match code {
            GeoCode::Region(c) => self.regions.get(&c).map(|r| r.name.as_str()),
            GeoCode::Province(c) => self.provinces.get(&c).map(|p| p.name.as_str()),
        }
    }
}

/// Computes incidents per 100,000 residents.
///
/// Returns `0.0` when the population is unknown or zero.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn per_100k(raw_count: f64, population: Option<u64>) -> f64 {
    match population {
        Some(p) if p > 0 => raw_count / p as f64 * 100_000.0,
        _ => 0.0,
    }
}

/// Aggregated incident figures for one geographic unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeoValue {
    /// Display name of the unit.
    pub name: String,
    /// Resident population used for normalization.
    pub population: Option<u64>,
    /// Incident count (per-year average when several years are selected).
    pub raw_count: f64,
    /// Incidents per 100,000 residents.
    pub per_100k: f64,
}

impl GeoValue {
    /// Returns the value to display: `per_100k` when normalizing,
    /// `raw_count` otherwise.
    #[must_use]
    pub const fn value(&self, normalize: bool) -> f64 {
        if normalize { self.per_100k } else { self.raw_count }
    }
}

/// Result of a grouped incident count over a set of years.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregationResult {
    /// Unit kind the counts are grouped by.
    pub granularity: Granularity,
    /// Full calendar years included (e.g. `2019`).
    pub years: BTreeSet<u16>,
    /// Whether [`Self::value_of`] reports per-100k figures.
    pub normalize: bool,
    /// Figures per unit.
    pub entries: BTreeMap<GeoCode, GeoValue>,
}

impl AggregationResult {
    /// Returns the display value for a unit, if present.
    #[must_use]
    pub fn value_of(&self, code: GeoCode) -> Option<f64> {
        self.entries.get(&code).map(|v| v.value(self.normalize))
    }

    /// Sum of raw counts over all units.
    #[must_use]
    pub fn total_raw(&self) -> f64 {
        self.entries.values().map(|v| v.raw_count).sum()
    }

    /// Whether several years were averaged.
    #[must_use]
    pub fn is_average(&self) -> bool {
        self.years.len() > 1
    }

    /// Label for the displayed value.
    #[must_use]
    pub const fn value_label(&self) -> &'static str {
        if self.normalize {
            "Incidents per 100k residents"
        } else {
            "Incidents"
        }
    }
}

/// A province and its display value, as listed in a drill-down.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvinceValue {
    /// Province code.
    pub code: ProvinceCode,
    /// Province name.
    pub name: String,
    /// Raw count or per-100k value, depending on the request.
    pub value: f64,
}
