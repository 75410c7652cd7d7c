//! Year-by-year trend and macro-area totals.

use std::collections::BTreeMap;

use accident_map_accident_models::{Year, YearSelection};
use accident_map_analytics_models::{Breakdown, MacroAreaStats, Overview, YearlyStats, percentage};
use accident_map_database::store::{placeholders, year_params};
use accident_map_geography_models::{MacroArea, RegionCode};
use duckdb::Connection;

use crate::stats::mean;
use crate::{AnalyticsError, as_f64, breakdown};

fn to_u64(value: i64) -> Result<u64, AnalyticsError> {
    u64::try_from(value).map_err(|_| AnalyticsError::conversion(format!("negative count {value}")))
}

/// Accidents, deaths and mortality rate for every stored year.
///
/// # Errors
///
/// Returns [`AnalyticsError`] if the query fails.
pub fn overview(conn: &Connection) -> Result<Overview, AnalyticsError> {
    let mut stmt = conn.prepare(
        "SELECT year, COUNT(*)::BIGINT, COALESCE(SUM(deaths), 0)::BIGINT
         FROM accidents
         GROUP BY year
         ORDER BY year",
    )?;
    let rows = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, i64>(2)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let years = rows
        .into_iter()
        .map(|(offset, incidents, deaths)| {
            let year = u8::try_from(offset)
                .ok()
                .and_then(|o| Year::new(o).ok())
                .ok_or_else(|| AnalyticsError::conversion(format!("invalid year {offset}")))?;
            Ok(YearlyStats {
                year: year.full(),
                incidents: to_u64(incidents)?,
                deaths: to_u64(deaths)?,
                mortality_rate: percentage(as_f64(deaths), as_f64(incidents)),
            })
        })
        .collect::<Result<Vec<_>, AnalyticsError>>()?;

    let rates: Vec<f64> = years.iter().map(|y| y.mortality_rate).collect();

    Ok(Overview {
        total_incidents: years.iter().map(|y| y.incidents).sum(),
        total_deaths: years.iter().map(|y| y.deaths).sum(),
        mean_mortality_rate: mean(&rates),
        years,
    })
}

/// Accidents and deaths per macro area (North, Centre, South and Islands).
///
/// All three areas are always present.
///
/// # Errors
///
/// Returns [`AnalyticsError`] if the query fails or a stored region code
/// is invalid.
pub fn macro_areas(
    conn: &Connection,
    years: &YearSelection,
) -> Result<Breakdown<MacroAreaStats>, AnalyticsError> {
    let sql = format!(
        "SELECT p.region_code, COUNT(*)::BIGINT, COALESCE(SUM(a.deaths), 0)::BIGINT
         FROM accidents a
         JOIN provinces p ON p.code = a.province_code
         WHERE a.year IN ({})
         GROUP BY p.region_code",
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

    let mut totals: BTreeMap<MacroArea, (i64, i64)> =
        MacroArea::all().iter().map(|a| (*a, (0, 0))).collect();

    for (region, incidents, deaths) in rows {
        let code =
            RegionCode::try_from(region).map_err(|e| AnalyticsError::conversion(e.to_string()))?;
        let Some(area) = code.macro_area() else {
            log::warn!("Region {code} has no macro area; skipping {incidents} accidents");
            continue;
        };
        let entry = totals.entry(area).or_default();
        entry.0 += incidents;
        entry.1 += deaths;
    }

    let divisor = years.divisor();
    let rows = MacroArea::all()
        .iter()
        .map(|area| {
            let (incidents, deaths) = totals.get(area).copied().unwrap_or_default();
            MacroAreaStats {
                area: *area,
                label: area.label().to_string(),
                incidents: as_f64(incidents) / divisor,
                deaths: as_f64(deaths) / divisor,
                mortality_rate: percentage(as_f64(deaths), as_f64(incidents)),
            }
        })
        .collect();

    Ok(breakdown(years, rows))
}

#[cfg(test)]
mod tests {
    use accident_map_accident_models::AccidentRecord;
    use accident_map_database::store;

    use super::*;
    use crate::fixtures::{record, seeded, years};

    fn fatal(year: u8, province: u16, deaths: u32) -> AccidentRecord {
        AccidentRecord {
            deaths,
            ..record(year, province)
        }
    }

    #[test]
    fn yearly_mortality_and_mean_rate() {
        let conn = seeded();
        store::insert_accidents(
            &conn,
            &[
                fatal(19, 1, 1),
                record(19, 1),
                record(19, 48),
                record(19, 63),
                fatal(20, 1, 1),
                record(20, 1),
            ],
        )
        .unwrap();

        let overview = overview(&conn).unwrap();
        assert_eq!(overview.years.len(), 2);
        assert_eq!(overview.years[0].year, 2019);
        assert_eq!(overview.years[0].incidents, 4);
        assert!((overview.years[0].mortality_rate - 25.0).abs() < 1e-9);
        assert!((overview.years[1].mortality_rate - 50.0).abs() < 1e-9);
        assert_eq!(overview.total_incidents, 6);
        assert_eq!(overview.total_deaths, 2);
        assert!((overview.mean_mortality_rate - 37.5).abs() < 1e-9);
    }

    #[test]
    fn empty_store_overview() {
        let conn = seeded();
        let overview = overview(&conn).unwrap();
        assert!(overview.years.is_empty());
        assert_eq!(overview.total_incidents, 0);
        assert!(overview.mean_mortality_rate.abs() < f64::EPSILON);
    }

    #[test]
    fn macro_areas_group_regions() {
        let conn = seeded();
        store::insert_accidents(
            &conn,
            &[
                record(19, 1),
                fatal(19, 1, 2),
                record(19, 48),
                record(20, 48),
            ],
        )
        .unwrap();

        let result = macro_areas(&conn, &years(&[19, 20])).unwrap();
        assert!(result.is_average);
        assert_eq!(result.caption, "Average 2019-2020");
        assert_eq!(result.rows.len(), 3);

        let north = &result.rows[0];
        assert_eq!(north.area, MacroArea::North);
        assert!((north.incidents - 1.0).abs() < 1e-9);
        assert!((north.deaths - 1.0).abs() < 1e-9);
        assert!((north.mortality_rate - 100.0).abs() < 1e-9);

        let centre = &result.rows[1];
        assert!((centre.incidents - 1.0).abs() < 1e-9);

        let south = &result.rows[2];
        assert!(south.incidents.abs() < f64::EPSILON);
        assert!(south.mortality_rate.abs() < f64::EPSILON);
    }
}
