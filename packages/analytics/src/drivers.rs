//! Driver demographics: sex, age groups and under-18 drivers.
//!
//! Driver A is counted for every accident; driver B only when a second
//! vehicle was involved.

use std::collections::BTreeMap;

use accident_map_accident_models::{AgeBand, AgeGroup, IntoEnumIterator, Sex, YearSelection};
use accident_map_analytics_models::{
    AgeGroupStats, Breakdown, MinorBandStats, NOT_DECLARED, SexStats, percentage,
};
use accident_map_database::store::{placeholders, year_params};
use duckdb::Connection;

use crate::{AnalyticsError, as_f64, breakdown};

/// Driver counts keyed by the decoded `(sex, age band)` pair.
type DriverCounts = BTreeMap<(Option<Sex>, Option<AgeBand>), i64>;

fn driver_counts(conn: &Connection, years: &YearSelection) -> Result<DriverCounts, AnalyticsError> {
    let list = placeholders(years.len());
    let sql = format!(
        "SELECT sex, age, COUNT(*)::BIGINT
         FROM (
             SELECT sex_a AS sex, age_a AS age
             FROM accidents
             WHERE year IN ({list})
             UNION ALL
             SELECT sex_b AS sex, age_b AS age
             FROM accidents
             WHERE year IN ({list}) AND vehicle_b IS NOT NULL
         )
         GROUP BY sex, age"
    );

    let params = year_params(years);
    let bound: Vec<i16> = params.iter().chain(params.iter()).copied().collect();

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(duckdb::params_from_iter(bound), |row| {
            Ok((
                row.get::<_, Option<String>>(0)?,
                row.get::<_, Option<String>>(1)?,
                row.get::<_, i64>(2)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let mut counts = DriverCounts::new();
    for (sex, age, count) in rows {
        let key = (
            sex.as_deref().and_then(Sex::parse_code),
            age.as_deref().and_then(AgeBand::parse_label),
        );
        *counts.entry(key).or_default() += count;
    }
    Ok(counts)
}

const fn sex_label(sex: Option<Sex>) -> &'static str {
    match sex {
        Some(Sex::Male) => "Male",
        Some(Sex::Female) => "Female",
        None => NOT_DECLARED,
    }
}

/// Drivers by sex, most frequent first.
///
/// Drivers without a recorded sex are reported as "Not declared".
///
/// # Errors
///
/// Returns [`AnalyticsError`] if the query fails.
pub fn sex_distribution(
    conn: &Connection,
    years: &YearSelection,
) -> Result<Breakdown<SexStats>, AnalyticsError> {
    let counts = driver_counts(conn, years)?;

    let mut per_sex: BTreeMap<Option<Sex>, i64> = BTreeMap::new();
    for ((sex, _), count) in &counts {
        *per_sex.entry(*sex).or_default() += count;
    }

    let total: i64 = per_sex.values().sum();
    let divisor = years.divisor();

    let mut rows: Vec<SexStats> = per_sex
        .into_iter()
        .map(|(sex, drivers)| SexStats {
            sex,
            label: sex_label(sex).to_string(),
            drivers: as_f64(drivers) / divisor,
            share: percentage(as_f64(drivers), as_f64(total)),
        })
        .collect();
    rows.sort_by(|a, b| {
        b.drivers
            .total_cmp(&a.drivers)
            .then_with(|| a.label.cmp(&b.label))
    });

    Ok(breakdown(years, rows))
}

/// Drivers by age group and sex, youngest group first.
///
/// Only drivers with both sex and age recorded are counted; every group
/// is present.
///
/// # Errors
///
/// Returns [`AnalyticsError`] if the query fails.
pub fn age_distribution(
    conn: &Connection,
    years: &YearSelection,
) -> Result<Breakdown<AgeGroupStats>, AnalyticsError> {
    let counts = driver_counts(conn, years)?;

    let mut per_group: BTreeMap<AgeGroup, (i64, i64)> = BTreeMap::new();
    for ((sex, age), count) in &counts {
        let (Some(sex), Some(age)) = (sex, age) else {
            continue;
        };
        let entry = per_group.entry(age.group()).or_default();
        match sex {
            Sex::Male => entry.0 += count,
            Sex::Female => entry.1 += count,
        }
    }

    let divisor = years.divisor();
    let rows = AgeGroup::iter()
        .map(|group| {
            let (male, female) = per_group.get(&group).copied().unwrap_or_default();
            let total = male + female;
            AgeGroupStats {
                group,
                male: as_f64(male) / divisor,
                female: as_f64(female) / divisor,
                total: as_f64(total) / divisor,
                male_share: percentage(as_f64(male), as_f64(total)),
                female_share: percentage(as_f64(female), as_f64(total)),
            }
        })
        .collect();

    Ok(breakdown(years, rows))
}

/// Drivers in each under-18 band, youngest first.
///
/// # Errors
///
/// Returns [`AnalyticsError`] if the query fails.
pub fn minors(
    conn: &Connection,
    years: &YearSelection,
) -> Result<Breakdown<MinorBandStats>, AnalyticsError> {
    let counts = driver_counts(conn, years)?;

    let mut per_band: BTreeMap<AgeBand, i64> = BTreeMap::new();
    for ((_, age), count) in &counts {
        if let Some(band) = age.filter(|b| b.is_minor()) {
            *per_band.entry(band).or_default() += count;
        }
    }

    let total: i64 = per_band.values().sum();
    if total == 0 {
        log::debug!("No minor drivers in {}", years.display_text());
    }

    let divisor = years.divisor();
    let rows = AgeBand::iter()
        .filter(|b| b.is_minor())
        .map(|band| {
            let drivers = per_band.get(&band).copied().unwrap_or(0);
            MinorBandStats {
                band,
                drivers: as_f64(drivers) / divisor,
                share: percentage(as_f64(drivers), as_f64(total)),
            }
        })
        .collect();

    Ok(breakdown(years, rows))
}
