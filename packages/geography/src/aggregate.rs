//! Grouped accident counts per region or province.
//!
//! Every unit of the requested granularity appears in the result, with a
//! zero count when it has no accidents in the selected years. When more
//! than one year is selected, counts are per-year averages.

use std::collections::BTreeMap;

use accident_map_accident_models::YearSelection;
use accident_map_database::store::{placeholders, year_params};
use accident_map_geography_models::{
    AggregationResult, GeoCode, GeoValue, Granularity, ProvinceCode, RegionCode, per_100k,
};
use duckdb::Connection;

use crate::GeoError;

/// One row of a grouped count query, before averaging.
struct CountRow {
    code: i64,
    name: String,
    population: Option<i64>,
    incidents: i64,
}

/// Counts accidents per unit of `granularity` over `years`.
///
/// Region population falls back to the sum of its provinces' populations
/// when the region row has none.
///
/// # Errors
///
/// Returns [`GeoError`] if a query fails or a stored code is invalid.
pub fn aggregate(
    conn: &Connection,
    granularity: Granularity,
    years: &YearSelection,
    normalize: bool,
) -> Result<AggregationResult, GeoError> {
    run(conn, granularity, years, normalize, None)
}

/// Counts accidents per province of one region.
///
/// Provinces of other regions are omitted from the result.
///
/// # Errors
///
/// Returns [`GeoError`] if a query fails or a stored code is invalid.
pub fn aggregate_region_provinces(
    conn: &Connection,
    region: RegionCode,
    years: &YearSelection,
    normalize: bool,
) -> Result<AggregationResult, GeoError> {
    run(conn, Granularity::Province, years, normalize, Some(region))
}

fn run(
    conn: &Connection,
    granularity: Granularity,
    years: &YearSelection,
    normalize: bool,
    scope: Option<RegionCode>,
) -> Result<AggregationResult, GeoError> {
    log::debug!(
        "Aggregating by {granularity} for {} (normalize={normalize}, scope={scope:?})",
        years.display_text()
    );

    let rows = match granularity {
        Granularity::Region => region_counts(conn, years)?,
        Granularity::Province => province_counts(conn, years, scope)?,
    };

    let divisor = years.divisor();
    let mut entries = BTreeMap::new();

    for row in rows {
        let code = to_geo_code(granularity, row.code)?;
        let population = row
            .population
            .map(u64::try_from)
            .transpose()
            .map_err(|_| GeoError::conversion(format!("negative population for {code}")))?;

        #[allow(clippy::cast_precision_loss)]
        let raw_count = row.incidents as f64 / divisor;

        entries.insert(
            code,
            GeoValue {
                name: row.name,
                population,
                raw_count,
                per_100k: per_100k(raw_count, population),
            },
        );
    }

    log::debug!("Aggregated {} {granularity} units", entries.len());

    Ok(AggregationResult {
        granularity,
        years: years.full_years(),
        normalize,
        entries,
    })
}

fn to_geo_code(granularity: Granularity, code: i64) -> Result<GeoCode, GeoError> {
    let parsed = match granularity {
        Granularity::Region => RegionCode::try_from(code).map(GeoCode::Region),
        Granularity::Province => ProvinceCode::try_from(code).map(GeoCode::Province),
    };
    parsed.map_err(|e| GeoError::conversion(e.to_string()))
}

fn collect_rows(
    conn: &Connection,
    sql: &str,
    params: Vec<i32>,
) -> Result<Vec<CountRow>, GeoError> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(duckdb::params_from_iter(params), |row| {
            Ok(CountRow {
                code: row.get(0)?,
                name: row.get(1)?,
                population: row.get(2)?,
                incidents: row.get(3)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn region_counts(conn: &Connection, years: &YearSelection) -> Result<Vec<CountRow>, GeoError> {
    let sql = format!(
        "WITH province_population AS (
            SELECT region_code, SUM(population)::BIGINT AS population
            FROM provinces
            GROUP BY region_code
        ),
        counts AS (
            SELECT p.region_code, COUNT(*)::BIGINT AS incidents
            FROM accidents a
            JOIN provinces p ON p.code = a.province_code
            WHERE a.year IN ({})
            GROUP BY p.region_code
        )
        SELECT r.code,
               r.name,
               COALESCE(r.population, pp.population)::BIGINT AS population,
               COALESCE(c.incidents, 0)::BIGINT AS incidents
        FROM regions r
        LEFT JOIN province_population pp ON pp.region_code = r.code
        LEFT JOIN counts c ON c.region_code = r.code
        ORDER BY r.code",
        placeholders(years.len())
    );

    let params = year_params(years).into_iter().map(i32::from).collect();
    collect_rows(conn, &sql, params)
}

fn province_counts(
    conn: &Connection,
    years: &YearSelection,
    scope: Option<RegionCode>,
) -> Result<Vec<CountRow>, GeoError> {
    let scope_filter = if scope.is_some() {
        "WHERE p.region_code = ?"
    } else {
        ""
    };
    let sql = format!(
        "WITH counts AS (
            SELECT province_code, COUNT(*)::BIGINT AS incidents
            FROM accidents
            WHERE year IN ({})
            GROUP BY province_code
        )
        SELECT p.code,
               p.name,
               p.population::BIGINT AS population,
               COALESCE(c.incidents, 0)::BIGINT AS incidents
        FROM provinces p
        LEFT JOIN counts c ON c.province_code = p.code
        {scope_filter}
        ORDER BY p.code",
        placeholders(years.len())
    );

    let mut params: Vec<i32> = year_params(years).into_iter().map(i32::from).collect();
    if let Some(region) = scope {
        params.push(i32::from(region.value()));
    }
    collect_rows(conn, &sql, params)
}

#[cfg(test)]
pub(crate) mod tests {
    use accident_map_accident_models::{AccidentRecord, Weekday, Year};
    use accident_map_database::store;
    use accident_map_geography_models::{Province, Region};

    use super::*;

    pub fn record(year: u8, province: u16) -> AccidentRecord {
        AccidentRecord {
            year: Year::new(year).unwrap(),
            province: ProvinceCode::new(province).unwrap(),
            weekday: Weekday::Monday,
            hour: Some(12),
            vehicle_a: Some(1),
            vehicle_b: None,
            sex_a: None,
            age_a: None,
            sex_b: None,
            age_b: None,
            deaths: 0,
            injured: 1,
        }
    }

    pub fn years(offsets: &[u8]) -> YearSelection {
        YearSelection::from_years(offsets.iter().map(|y| Year::new(*y).unwrap())).unwrap()
    }

    pub fn region_code(c: u8) -> RegionCode {
        RegionCode::new(c).unwrap()
    }

    pub fn province_code(c: u16) -> ProvinceCode {
        ProvinceCode::new(c).unwrap()
    }

    /// Two regions: 01 Piemonte (Torino 001, Vercelli 002) and
    /// 02 Valle d'Aosta (Aosta 007).
    pub fn seeded() -> Connection {
        let conn = store::open_in_memory().unwrap();
        store::upsert_regions(
            &conn,
            &[
                Region {
                    code: region_code(1),
                    name: "Piemonte".to_string(),
                    population: Some(4_000_000),
                },
                Region {
                    code: region_code(2),
                    name: "Valle d'Aosta".to_string(),
                    population: None,
                },
            ],
        )
        .unwrap();
        store::upsert_provinces(
            &conn,
            &[
                Province {
                    code: province_code(1),
                    name: "Torino".to_string(),
                    region: region_code(1),
                    population: Some(2_000_000),
                },
                Province {
                    code: province_code(2),
                    name: "Vercelli".to_string(),
                    region: region_code(1),
                    population: Some(0),
                },
                Province {
                    code: province_code(7),
                    name: "Aosta".to_string(),
                    region: region_code(2),
                    population: Some(125_000),
                },
            ],
        )
        .unwrap();
        conn
    }

    fn region_key(c: u8) -> GeoCode {
        GeoCode::Region(region_code(c))
    }

    #[test]
    fn single_year_counts_and_zero_fill() {
        let conn = seeded();
        store::insert_accidents(&conn, &[record(19, 1), record(19, 2), record(20, 7)]).unwrap();

        let result = aggregate(&conn, Granularity::Region, &years(&[19]), false).unwrap();
        assert_eq!(result.entries.len(), 2);
        assert!((result.value_of(region_key(1)).unwrap() - 2.0).abs() < f64::EPSILON);
        assert!(result.value_of(region_key(2)).unwrap().abs() < f64::EPSILON);
        assert!(!result.is_average());
    }

    #[test]
    fn multi_year_selection_averages() {
        let conn = seeded();
        store::insert_accidents(&conn, &[record(19, 1), record(19, 2), record(20, 7)]).unwrap();

        let result = aggregate(&conn, Granularity::Region, &years(&[19, 20]), false).unwrap();
        assert!((result.value_of(region_key(1)).unwrap() - 1.0).abs() < f64::EPSILON);
        assert!((result.value_of(region_key(2)).unwrap() - 0.5).abs() < f64::EPSILON);
        assert!(result.is_average());
        assert_eq!(result.years.iter().copied().collect::<Vec<_>>(), vec![2019, 2020]);
    }

    #[test]
    fn raw_counts_sum_to_selected_total() {
        let conn = seeded();
        store::insert_accidents(
            &conn,
            &[record(19, 1), record(19, 1), record(19, 7), record(21, 2)],
        )
        .unwrap();

        for granularity in [Granularity::Region, Granularity::Province] {
            let selection = years(&[19]);
            let result = aggregate(&conn, granularity, &selection, false).unwrap();
            #[allow(clippy::cast_precision_loss)]
            let expected = store::accident_count(&conn, &selection).unwrap() as f64;
            assert!((result.total_raw() - expected).abs() < f64::EPSILON);
        }
    }

    #[test]
    fn normalization_per_100k() {
        let conn = seeded();
        store::insert_accidents(&conn, &[record(19, 1), record(19, 7)]).unwrap();

        let result = aggregate(&conn, Granularity::Province, &years(&[19]), true).unwrap();
        let torino = &result.entries[&GeoCode::Province(province_code(1))];
        assert!((torino.per_100k - 1.0 / 2_000_000.0 * 100_000.0).abs() < 1e-12);

        let vercelli = &result.entries[&GeoCode::Province(province_code(2))];
        assert!(vercelli.per_100k.abs() < f64::EPSILON);
    }

    #[test]
    fn region_population_falls_back_to_provinces() {
        let conn = seeded();
        store::insert_accidents(&conn, &[record(19, 1), record(19, 2), record(19, 7)]).unwrap();
        let result = aggregate(&conn, Granularity::Region, &years(&[19]), true).unwrap();

        let piemonte = &result.entries[&region_key(1)];
        assert_eq!(piemonte.population, Some(4_000_000));
        assert!((piemonte.per_100k - 0.05).abs() < 1e-9);

        let aosta = &result.entries[&region_key(2)];
        assert_eq!(aosta.population, Some(125_000));
        assert!((aosta.per_100k - 0.8).abs() < 1e-9);
        assert!((aosta.value(true) - 0.8).abs() < 1e-9);
    }

    #[test]
    fn aggregation_is_idempotent() {
        let conn = seeded();
        store::insert_accidents(&conn, &[record(19, 1), record(20, 7)]).unwrap();
        let selection = years(&[19, 20]);
        let a = aggregate(&conn, Granularity::Province, &selection, true).unwrap();
        let b = aggregate(&conn, Granularity::Province, &selection, true).unwrap();
        assert_eq!(a, b);
        assert_eq!(
            serde_json::to_string(&a).unwrap(),
            serde_json::to_string(&b).unwrap()
        );
    }

    #[test]
    fn absent_year_yields_zeros() {
        let conn = seeded();
        store::insert_accidents(&conn, &[record(19, 1)]).unwrap();
        let result = aggregate(&conn, Granularity::Region, &years(&[23]), false).unwrap();
        assert_eq!(result.entries.len(), 2);
        assert!(result.total_raw().abs() < f64::EPSILON);
    }

    #[test]
    fn region_scope_limits_provinces() {
        let conn = seeded();
        store::insert_accidents(&conn, &[record(19, 1), record(19, 7)]).unwrap();
        let result =
            aggregate_region_provinces(&conn, region_code(1), &years(&[19]), false).unwrap();
        let codes: Vec<String> = result.entries.keys().map(ToString::to_string).collect();
        assert_eq!(codes, vec!["001", "002"]);
    }
}
