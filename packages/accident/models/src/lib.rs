#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Road-accident record types and ISTAT classification codes.
//!
//! One [`AccidentRecord`] corresponds to one row of the ISTAT microdata
//! survey of road accidents with injuries. Codes from the survey
//! (weekday, vehicle type, driver sex and age band) are decoded into the
//! enums defined here when a record is loaded.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use accident_map_geography_models::ProvinceCode;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};

pub use strum::IntoEnumIterator;

/// Error returned when a year cannot be represented.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidYearError {
    /// The rejected input.
    pub input: String,
}

impl fmt::Display for InvalidYearError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid year '{}': expected 0-99 or 2000-2099",
            self.input
        )
    }
}

impl std::error::Error for InvalidYearError {}

/// Survey year, stored as its two-digit offset from 2000.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "u16", try_from = "u16")]
pub struct Year(u8);

impl Year {
    /// Creates a year from its offset (`19` for 2019).
    ///
    /// # Errors
    ///
    /// Returns [`InvalidYearError`] if the offset is above 99.
    pub fn new(offset: u8) -> Result<Self, InvalidYearError> {
        if offset <= 99 {
            Ok(Self(offset))
        } else {
            Err(InvalidYearError {
                input: offset.to_string(),
            })
        }
    }

    /// Creates a year from a calendar year (`2019`).
    ///
    /// # Errors
    ///
    /// Returns [`InvalidYearError`] if the year is outside 2000-2099.
    pub fn from_full(full: u16) -> Result<Self, InvalidYearError> {
        full.checked_sub(2000)
            .and_then(|offset| u8::try_from(offset).ok())
            .filter(|offset| *offset <= 99)
            .map(Self)
            .ok_or_else(|| InvalidYearError {
                input: full.to_string(),
            })
    }

    /// Two-digit offset from 2000, as stored in the database.
    #[must_use]
    pub const fn offset(self) -> u8 {
        self.0
    }

    /// Calendar year.
    #[must_use]
    pub const fn full(self) -> u16 {
        2000 + self.0 as u16
    }
}

impl fmt::Display for Year {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.full())
    }
}

impl FromStr for Year {
    type Err = InvalidYearError;

    /// Accepts both the offset (`"19"`) and the calendar year (`"2019"`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value: u16 = s.trim().parse().map_err(|_| InvalidYearError {
            input: s.to_string(),
        })?;
        Self::try_from(value)
    }
}

impl TryFrom<u16> for Year {
    type Error = InvalidYearError;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        if value < 100 {
            u8::try_from(value)
                .map_err(|_| InvalidYearError {
                    input: value.to_string(),
                })
                .and_then(Self::new)
        } else {
            Self::from_full(value)
        }
    }
}

impl From<Year> for u16 {
    fn from(year: Year) -> Self {
        year.full()
    }
}

/// Error returned when a year selection would be empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmptyYearSelectionError;

impl fmt::Display for EmptyYearSelectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "at least one year must be selected")
    }
}

impl std::error::Error for EmptyYearSelectionError {}

/// A non-empty set of survey years.
///
/// Selecting more than one year puts every per-selection figure in
/// average mode: counts are divided by the number of years.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "BTreeSet<Year>", into = "BTreeSet<Year>")]
pub struct YearSelection(BTreeSet<Year>);

impl YearSelection {
    /// Selects a single year.
    #[must_use]
    pub fn single(year: Year) -> Self {
        Self(BTreeSet::from([year]))
    }

    /// Selects the given years.
    ///
    /// # Errors
    ///
    /// Returns [`EmptyYearSelectionError`] if no year is given.
    pub fn from_years(years: impl IntoIterator<Item = Year>) -> Result<Self, EmptyYearSelectionError> {
        let set: BTreeSet<Year> = years.into_iter().collect();
        if set.is_empty() {
            Err(EmptyYearSelectionError)
        } else {
            Ok(Self(set))
        }
    }

    /// Iterates the selected years in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = Year> + '_ {
        self.0.iter().copied()
    }

    /// Number of selected years.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always `false`: a selection holds at least one year.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether figures are averaged across several years.
    #[must_use]
    pub fn is_average(&self) -> bool {
        self.0.len() > 1
    }

    /// The number every count is divided by.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn divisor(&self) -> f64 {
        if self.is_average() {
            self.0.len() as f64
        } else {
            1.0
        }
    }

    /// Database offsets of the selected years.
    #[must_use]
    pub fn offsets(&self) -> Vec<u8> {
        self.0.iter().map(|y| y.offset()).collect()
    }

    /// Calendar years of the selection.
    #[must_use]
    pub fn full_years(&self) -> BTreeSet<u16> {
        self.0.iter().map(|y| y.full()).collect()
    }

    /// Caption for charts: `"2021"` or `"Average 2019-2023"`.
    #[must_use]
    pub fn display_text(&self) -> String {
        match (self.0.first(), self.0.last()) {
            (Some(first), Some(last)) if self.is_average() => {
                format!("Average {first}-{last}")
            }
            (Some(first), _) => first.to_string(),
            _ => String::new(),
        }
    }
}

impl TryFrom<BTreeSet<Year>> for YearSelection {
    type Error = EmptyYearSelectionError;

    fn try_from(set: BTreeSet<Year>) -> Result<Self, Self::Error> {
        Self::from_years(set)
    }
}

impl From<YearSelection> for BTreeSet<Year> {
    fn from(selection: YearSelection) -> Self {
        selection.0
    }
}

/// Day of the week, using the ISTAT survey codes (1 = Monday).
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
    EnumIter,
    AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Weekday {
    /// Code 1.
    Monday = 1,
    /// Code 2.
    Tuesday = 2,
    /// Code 3.
    Wednesday = 3,
    /// Code 4.
    Thursday = 4,
    /// Code 5.
    Friday = 5,
    /// Code 6.
    Saturday = 6,
    /// Code 7.
    Sunday = 7,
}

impl Weekday {
    /// Returns the survey code of this day.
    #[must_use]
    pub const fn code(self) -> u8 {
        self as u8
    }

    /// Decodes a survey code.
    #[must_use]
    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Self::Monday),
            2 => Some(Self::Tuesday),
            3 => Some(Self::Wednesday),
            4 => Some(Self::Thursday),
            5 => Some(Self::Friday),
            6 => Some(Self::Saturday),
            7 => Some(Self::Sunday),
            _ => None,
        }
    }

    /// Display name.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Monday => "Monday",
            Self::Tuesday => "Tuesday",
            Self::Wednesday => "Wednesday",
            Self::Thursday => "Thursday",
            Self::Friday => "Friday",
            Self::Saturday => "Saturday",
            Self::Sunday => "Sunday",
        }
    }
}

/// Driver sex as recorded in the survey.
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
    EnumIter,
    AsRefStr,
)]
pub enum Sex {
    /// Survey code 1.
    #[serde(rename = "M")]
    #[strum(serialize = "M")]
    Male,
    /// Survey code 2.
    #[serde(rename = "F")]
    #[strum(serialize = "F")]
    Female,
}

impl Sex {
    /// Decodes either the numeric survey code or the `M`/`F` letter.
    ///
    /// Returns `None` for blank or unrecognized values.
    #[must_use]
    pub fn parse_code(s: &str) -> Option<Self> {
        match s.trim() {
            "1" | "M" | "m" => Some(Self::Male),
            "2" | "F" | "f" => Some(Self::Female),
            _ => None,
        }
    }
}

/// Driver age band as published by ISTAT.
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
    EnumIter,
    AsRefStr,
)]
pub enum AgeBand {
    /// 0-5 years.
    #[serde(rename = "0-5")]
    #[strum(serialize = "0-5")]
    UpTo5,
    /// 6-9 years.
    #[serde(rename = "6-9")]
    #[strum(serialize = "6-9")]
    From6To9,
    /// 10-14 years.
    #[serde(rename = "10-14")]
    #[strum(serialize = "10-14")]
    From10To14,
    /// 15-17 years.
    #[serde(rename = "15-17")]
    #[strum(serialize = "15-17")]
    From15To17,
    /// 18-29 years.
    #[serde(rename = "18-29")]
    #[strum(serialize = "18-29")]
    From18To29,
    /// 30-44 years.
    #[serde(rename = "30-44")]
    #[strum(serialize = "30-44")]
    From30To44,
    /// 45-54 years.
    #[serde(rename = "45-54")]
    #[strum(serialize = "45-54")]
    From45To54,
    /// 55-64 years.
    #[serde(rename = "55-64")]
    #[strum(serialize = "55-64")]
    From55To64,
    /// 65 years and over.
    #[serde(rename = "65+")]
    #[strum(serialize = "65+")]
    From65,
}

impl AgeBand {
    /// Decodes an age band label.
    ///
    /// The survey pads labels with trailing spaces (`"0-5  "`) and marks
    /// missing ages as `n.i.`; both are handled. Returns `None` for
    /// missing or unrecognized values.
    #[must_use]
    pub fn parse_label(s: &str) -> Option<Self> {
        s.trim().parse().ok()
    }

    /// Whether the band covers drivers under 18.
    #[must_use]
    pub const fn is_minor(self) -> bool {
        matches!(
            self,
            Self::UpTo5 | Self::From6To9 | Self::From10To14 | Self::From15To17
        )
    }

    /// The coarser group used by the age distribution chart.
    #[must_use]
    pub const fn group(self) -> AgeGroup {
        match self {
            Self::UpTo5 | Self::From6To9 | Self::From10To14 | Self::From15To17 => {
                AgeGroup::Minor
            }
            Self::From18To29 => AgeGroup::From18To29,
            Self::From30To44 => AgeGroup::From30To44,
            Self::From45To54 => AgeGroup::From45To54,
            Self::From55To64 => AgeGroup::From55To64,
            Self::From65 => AgeGroup::From65,
        }
    }
}

/// Age bands with all minors collapsed into `0-17`.
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
    EnumIter,
    AsRefStr,
)]
pub enum AgeGroup {
    /// Under 18.
    #[serde(rename = "0-17")]
    #[strum(serialize = "0-17")]
    Minor,
    /// 18-29 years.
    #[serde(rename = "18-29")]
    #[strum(serialize = "18-29")]
    From18To29,
    /// 30-44 years.
    #[serde(rename = "30-44")]
    #[strum(serialize = "30-44")]
    From30To44,
    /// 45-54 years.
    #[serde(rename = "45-54")]
    #[strum(serialize = "45-54")]
    From45To54,
    /// 55-64 years.
    #[serde(rename = "55-64")]
    #[strum(serialize = "55-64")]
    From55To64,
    /// 65 years and over.
    #[serde(rename = "65+")]
    #[strum(serialize = "65+")]
    From65,
}

/// Vehicle categories used by the vehicle-pair heatmap.
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
    EnumIter,
    AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum VehicleGroup {
    /// Private, trailer-towing, public-service and emergency cars.
    Car,
    /// Mopeds, motorcycles, three-wheeled motor vans.
    Motorcycle,
    /// Lorries, articulated vehicles, tractors, agricultural machines.
    HeavyVehicle,
    /// Urban and extra-urban buses, trams.
    PublicTransport,
    /// Bicycles, including electric bicycles.
    Bicycle,
    /// Electric kick scooters.
    Scooter,
    /// Anything else (special vehicles, quadricycles, hit-and-run unknowns).
    Other,
}

impl VehicleGroup {
    /// Classifies an ISTAT vehicle-type code.
    #[must_use]
    pub const fn from_istat_code(code: u8) -> Self {
        match code {
            1..=4 => Self::Car,
            5..=7 => Self::PublicTransport,
            8..=10 | 12 | 13 => Self::HeavyVehicle,
            14 | 23 => Self::Bicycle,
            15..=18 => Self::Motorcycle,
            22 => Self::Scooter,
            _ => Self::Other,
        }
    }

    /// Display name.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Car => "Car",
            Self::Motorcycle => "Motorcycle",
            Self::HeavyVehicle => "Heavy vehicle",
            Self::PublicTransport => "Public transport",
            Self::Bicycle => "Bicycle",
            Self::Scooter => "Scooter",
            Self::Other => "Other",
        }
    }
}

/// Part of the day an accident happened in.
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
    EnumIter,
    AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum TimeSlot {
    /// 06:00-11:59.
    Morning,
    /// 12:00-17:59.
    Afternoon,
    /// 18:00-23:59.
    Evening,
    /// 00:00-05:59.
    Night,
}

impl TimeSlot {
    /// Maps an hour (0-23) to its slot.
    #[must_use]
    pub const fn from_hour(hour: u8) -> Option<Self> {
        match hour {
            6..=11 => Some(Self::Morning),
            12..=17 => Some(Self::Afternoon),
            18..=23 => Some(Self::Evening),
            0..=5 => Some(Self::Night),
            _ => None,
        }
    }
}

/// One reported road accident.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccidentRecord {
    /// Survey year.
    pub year: Year,
    /// Province where the accident happened.
    pub province: ProvinceCode,
    /// Day of the week.
    pub weekday: Weekday,
    /// Hour of the day (0-23), if recorded.
    pub hour: Option<u8>,
    /// ISTAT vehicle-type code of vehicle A.
    pub vehicle_a: Option<u8>,
    /// ISTAT vehicle-type code of vehicle B, if a second vehicle was involved.
    pub vehicle_b: Option<u8>,
    /// Sex of driver A.
    pub sex_a: Option<Sex>,
    /// Age band of driver A.
    pub age_a: Option<AgeBand>,
    /// Sex of driver B.
    pub sex_b: Option<Sex>,
    /// Age band of driver B.
    pub age_b: Option<AgeBand>,
    /// Deaths within 24 hours plus deaths within 30 days.
    pub deaths: u32,
    /// Injured people.
    pub injured: u32,
}
