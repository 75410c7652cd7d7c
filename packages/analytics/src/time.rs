//! Weekday, hourly and time-of-day distributions.

use std::collections::BTreeMap;

use accident_map_accident_models::{IntoEnumIterator, TimeSlot, Weekday, YearSelection};
use accident_map_analytics_models::{
    Breakdown, HourStats, TimeSlotStats, WeekdayStats, percentage,
};
use accident_map_database::store::{placeholders, year_params};
use duckdb::Connection;

use crate::stats::{mean, quantile, rolling_mean_centered};
use crate::{AnalyticsError, as_f64, breakdown};

/// A weekday is critical when its accidents exceed the daily mean by more
/// than this factor.
pub const CRITICAL_FACTOR: f64 = 1.1;

/// Width of the centred moving average over hours.
pub const ROLLING_WINDOW: usize = 3;

/// Hours at or above this quantile of hourly accidents are peaks.
pub const PEAK_QUANTILE: f64 = 0.75;

/// Runs `SELECT <column>, COUNT(*), SUM(deaths) ... GROUP BY <column>` over
/// the selected years, returning averaged `(incidents, deaths)` per key.
fn grouped_counts(
    conn: &Connection,
    column: &str,
    extra_filter: &str,
    years: &YearSelection,
) -> Result<BTreeMap<i64, (f64, f64)>, AnalyticsError> {
    let sql = format!(
        "SELECT {column}, COUNT(*)::BIGINT, COALESCE(SUM(deaths), 0)::BIGINT
         FROM accidents
         WHERE year IN ({}) {extra_filter}
         GROUP BY {column}",
        placeholders(years.len())
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(duckdb::params_from_iter(year_params(years)), |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, i64>(2)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let divisor = years.divisor();
    Ok(rows
        .into_iter()
        .map(|(key, incidents, deaths)| {
            (key, (as_f64(incidents) / divisor, as_f64(deaths) / divisor))
        })
        .collect())
}

/// Accidents per day of the week, Monday first.
///
/// Days without accidents are reported with zero counts.
///
/// # Errors
///
/// Returns [`AnalyticsError`] if the query fails.
pub fn weekdays(
    conn: &Connection,
    years: &YearSelection,
) -> Result<Breakdown<WeekdayStats>, AnalyticsError> {
    let counts = grouped_counts(conn, "weekday", "", years)?;

    let per_day: Vec<(Weekday, f64, f64)> = Weekday::iter()
        .map(|day| {
            let (incidents, deaths) = counts
                .get(&i64::from(day.code()))
                .copied()
                .unwrap_or_default();
            (day, incidents, deaths)
        })
        .collect();

    let incidents: Vec<f64> = per_day.iter().map(|(_, i, _)| *i).collect();
    let total: f64 = incidents.iter().sum();
    let threshold = mean(&incidents) * CRITICAL_FACTOR;

    let rows = per_day
        .into_iter()
        .map(|(weekday, incidents, deaths)| WeekdayStats {
            weekday,
            label: weekday.label().to_string(),
            incidents,
            deaths,
            share: percentage(incidents, total),
            critical: incidents > threshold,
        })
        .collect();

    Ok(breakdown(years, rows))
}

/// Accidents per hour of the day, 0 through 23.
///
/// Accidents without a recorded hour are excluded; hours without accidents
/// are reported with zero counts.
///
/// # Errors
///
/// Returns [`AnalyticsError`] if the query fails.
pub fn hours(
    conn: &Connection,
    years: &YearSelection,
) -> Result<Breakdown<HourStats>, AnalyticsError> {
    let counts = grouped_counts(conn, "hour", "AND hour BETWEEN 0 AND 23", years)?;
    Ok(breakdown(years, hourly_rows(&counts)))
}

fn hourly_rows(counts: &BTreeMap<i64, (f64, f64)>) -> Vec<HourStats> {
    let per_hour: Vec<(u8, f64, f64)> = (0u8..24)
        .map(|hour| {
            let (incidents, deaths) = counts.get(&i64::from(hour)).copied().unwrap_or_default();
            (hour, incidents, deaths)
        })
        .collect();

    let incidents: Vec<f64> = per_hour.iter().map(|(_, i, _)| *i).collect();
    let smoothed = rolling_mean_centered(&incidents, ROLLING_WINDOW);
    let threshold = quantile(&incidents, PEAK_QUANTILE);

    per_hour
        .into_iter()
        .zip(smoothed)
        .filter_map(|((hour, incidents, deaths), rolling_mean)| {
            Some(HourStats {
                hour,
                slot: TimeSlot::from_hour(hour)?,
                incidents,
                deaths,
                rolling_mean,
                peak: incidents >= threshold,
            })
        })
        .collect()
}

/// Accidents per part of the day, morning first.
///
/// # Errors
///
/// Returns [`AnalyticsError`] if the query fails.
pub fn time_slots(
    conn: &Connection,
    years: &YearSelection,
) -> Result<Breakdown<TimeSlotStats>, AnalyticsError> {
    let hourly = hours(conn, years)?;
    Ok(breakdown(years, slots_from_hours(&hourly.rows)))
}

/// Sums hourly rows into the four parts of the day.
///
/// The mortality rate divides by one instead of zero for an empty slot.
#[must_use]
pub fn slots_from_hours(hours: &[HourStats]) -> Vec<TimeSlotStats> {
    let mut totals: BTreeMap<TimeSlot, (f64, f64)> = BTreeMap::new();
    for row in hours {
        let entry = totals.entry(row.slot).or_default();
        entry.0 += row.incidents;
        entry.1 += row.deaths;
    }

    let day_total: f64 = totals.values().map(|(i, _)| *i).sum();

    TimeSlot::iter()
        .map(|slot| {
            let (incidents, deaths) = totals.get(&slot).copied().unwrap_or_default();
            let denominator = if incidents > 0.0 { incidents } else { 1.0 };
            TimeSlotStats {
                slot,
                incidents,
                deaths,
                share: percentage(incidents, day_total),
                mortality_rate: deaths / denominator * 100.0,
            }
        })
        .collect()
}
