#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Result rows for the non-geographic dashboard sections.
//!
//! Counts are `f64` wherever a year selection is involved, since selecting
//! several years reports per-year averages.

use accident_map_accident_models::{AgeBand, AgeGroup, Sex, TimeSlot, VehicleGroup, Weekday};
use accident_map_geography_models::MacroArea;
use serde::{Deserialize, Serialize};

/// Label used for drivers whose sex was not recorded.
pub const NOT_DECLARED: &str = "Not declared";

/// A section's rows plus the caption describing the year selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Breakdown<T> {
    /// `"2021"` or `"Average 2019-2023"`.
    pub caption: String,
    /// Whether the rows are per-year averages.
    pub is_average: bool,
    /// The rows.
    pub rows: Vec<T>,
}

/// Totals for one year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct YearlyStats {
    /// Calendar year.
    pub year: u16,
    /// Accidents.
    pub incidents: u64,
    /// Deaths (24 hours + 30 days).
    pub deaths: u64,
    /// `deaths / incidents * 100`.
    pub mortality_rate: f64,
}

/// Year-by-year trend with headline totals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Overview {
    /// One row per year, ascending.
    pub years: Vec<YearlyStats>,
    /// Accidents over all years.
    pub total_incidents: u64,
    /// Deaths over all years.
    pub total_deaths: u64,
    /// Mean of the yearly mortality rates.
    pub mean_mortality_rate: f64,
}

/// Figures for one macro area.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MacroAreaStats {
    /// The area.
    pub area: MacroArea,
    /// Display name.
    pub label: String,
    /// Accidents.
    pub incidents: f64,
    /// Deaths.
    pub deaths: f64,
    /// `deaths / incidents * 100`, or `0` without accidents.
    pub mortality_rate: f64,
}

/// Figures for one day of the week.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeekdayStats {
    /// The day.
    pub weekday: Weekday,
    /// Display name.
    pub label: String,
    /// Accidents.
    pub incidents: f64,
    /// Deaths.
    pub deaths: f64,
    /// Percentage of the week's accidents.
    pub share: f64,
    /// More than 10% above the daily mean.
    pub critical: bool,
}

/// Figures for one hour of the day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HourStats {
    /// Hour, 0-23.
    pub hour: u8,
    /// Part of the day the hour belongs to.
    pub slot: TimeSlot,
    /// Accidents.
    pub incidents: f64,
    /// Deaths.
    pub deaths: f64,
    /// Centred three-hour moving average of `incidents`.
    pub rolling_mean: f64,
    /// At or above the upper quartile of hourly accidents.
    pub peak: bool,
}

/// Figures for one part of the day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeSlotStats {
    /// The slot.
    pub slot: TimeSlot,
    /// Accidents.
    pub incidents: f64,
    /// Deaths.
    pub deaths: f64,
    /// Percentage of the day's accidents.
    pub share: f64,
    /// `deaths / incidents * 100`, treating zero accidents as one.
    pub mortality_rate: f64,
}

/// Symmetric matrix of accidents between two vehicle groups.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VehiclePairMatrix {
    /// Row groups, by descending row total.
    pub rows: Vec<VehicleGroup>,
    /// Column groups, by descending column total.
    pub columns: Vec<VehicleGroup>,
    /// `values[r][c]`: accidents between `rows[r]` and `columns[c]`.
    pub values: Vec<Vec<f64>>,
}

impl VehiclePairMatrix {
    /// Returns the value for a pair, or `0` if either group is absent.
    #[must_use]
    pub fn get(&self, row: VehicleGroup, column: VehicleGroup) -> f64 {
        let r = self.rows.iter().position(|g| *g == row);
        let c = self.columns.iter().position(|g| *g == column);
        match (r, c) {
            (Some(r), Some(c)) => self.values[r][c],
            _ => 0.0,
        }
    }

    /// Whether no pair was observed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Drivers of one sex.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SexStats {
    /// The sex, or `None` when not declared.
    pub sex: Option<Sex>,
    /// Display label.
    pub label: String,
    /// Drivers involved.
    pub drivers: f64,
    /// Percentage of all drivers.
    pub share: f64,
}

/// Drivers in one age group, split by sex.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgeGroupStats {
    /// The group.
    pub group: AgeGroup,
    /// Male drivers.
    pub male: f64,
    /// Female drivers.
    pub female: f64,
    /// `male + female`.
    pub total: f64,
    /// Male percentage within the group.
    pub male_share: f64,
    /// Female percentage within the group.
    pub female_share: f64,
}

/// Drivers in one of the under-18 bands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MinorBandStats {
    /// The band.
    pub band: AgeBand,
    /// Drivers involved.
    pub drivers: f64,
    /// Percentage of all minor drivers.
    pub share: f64,
}

/// Percentage of `part` in `whole`, or `0` when `whole` is not positive.
#[must_use]
pub fn percentage(part: f64, whole: f64) -> f64 {
    if whole > 0.0 { part / whole * 100.0 } else { 0.0 }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matrix_lookup() {
        let matrix = VehiclePairMatrix {
            rows: vec![VehicleGroup::Car, VehicleGroup::Bicycle],
            columns: vec![VehicleGroup::Car, VehicleGroup::Bicycle],
            values: vec![vec![4.0, 1.0], vec![1.0, 0.0]],
        };
        assert!((matrix.get(VehicleGroup::Car, VehicleGroup::Bicycle) - 1.0).abs() < f64::EPSILON);
        assert!(matrix.get(VehicleGroup::Scooter, VehicleGroup::Car).abs() < f64::EPSILON);
        assert!(!matrix.is_empty());
    }

    #[test]
    fn percentage_of_zero() {
        assert!(percentage(3.0, 0.0).abs() < f64::EPSILON);
        assert!((percentage(1.0, 4.0) - 25.0).abs() < f64::EPSILON);
    }

    #[test]
    fn rows_serialize_camel_case() {
        let row = WeekdayStats {
            weekday: Weekday::Friday,
            label: "Friday".to_string(),
            incidents: 10.0,
            deaths: 1.0,
            share: 20.0,
            critical: true,
        };
        let json = serde_json::to_value(&row).unwrap();
        assert_eq!(json["weekday"], "FRIDAY");
        assert_eq!(json["critical"], true);

        let sex = SexStats {
            sex: None,
            label: NOT_DECLARED.to_string(),
            drivers: 2.0,
            share: 100.0,
        };
        assert_eq!(serde_json::to_value(&sex).unwrap()["sex"], serde_json::Value::Null);
    }
}
