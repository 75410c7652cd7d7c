//! Vehicle-pair heatmap.

use std::collections::BTreeMap;

use accident_map_accident_models::{VehicleGroup, YearSelection};
use accident_map_analytics_models::{Breakdown, VehiclePairMatrix};
use accident_map_database::store::{placeholders, year_params};
use duckdb::Connection;

use crate::{AnalyticsError, as_f64, breakdown};

/// Counts accidents between every pair of vehicle groups.
///
/// Only accidents with both vehicles recorded are counted. Each accident
/// contributes to both `(A, B)` and `(B, A)`, so the matrix is symmetric
/// and an accident between two vehicles of the same group counts twice on
/// the diagonal. Rows and columns are ordered by descending total.
///
/// The returned breakdown holds a single matrix.
///
/// # Errors
///
/// Returns [`AnalyticsError`] if the query fails or a stored vehicle code
/// is out of range.
pub fn vehicle_pairs(
    conn: &Connection,
    years: &YearSelection,
) -> Result<Breakdown<VehiclePairMatrix>, AnalyticsError> {
    let sql = format!(
        "SELECT vehicle_a, vehicle_b, COUNT(*)::BIGINT
         FROM accidents
         WHERE year IN ({})
           AND vehicle_a IS NOT NULL
           AND vehicle_b IS NOT NULL
         GROUP BY vehicle_a, vehicle_b",
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

    let mut counts: BTreeMap<(VehicleGroup, VehicleGroup), i64> = BTreeMap::new();
    for (a, b, count) in rows {
        let a = group_of(a)?;
        let b = group_of(b)?;
        *counts.entry((a, b)).or_default() += count;
        *counts.entry((b, a)).or_default() += count;
    }

    let matrix = build_matrix(&counts, years.divisor());
    log::debug!(
        "Vehicle pairs for {}: {} groups",
        years.display_text(),
        matrix.rows.len()
    );

    Ok(breakdown(years, vec![matrix]))
}

fn group_of(code: i64) -> Result<VehicleGroup, AnalyticsError> {
    u8::try_from(code)
        .map(VehicleGroup::from_istat_code)
        .map_err(|_| AnalyticsError::conversion(format!("invalid vehicle code {code}")))
}

fn build_matrix(
    counts: &BTreeMap<(VehicleGroup, VehicleGroup), i64>,
    divisor: f64,
) -> VehiclePairMatrix {
    let mut row_totals: BTreeMap<VehicleGroup, i64> = BTreeMap::new();
    let mut column_totals: BTreeMap<VehicleGroup, i64> = BTreeMap::new();
    for ((a, b), count) in counts {
        *row_totals.entry(*a).or_default() += count;
        *column_totals.entry(*b).or_default() += count;
    }

    let rows = by_descending_total(row_totals);
    let columns = by_descending_total(column_totals);

    let values = rows
        .iter()
        .map(|r| {
            columns
                .iter()
                .map(|c| as_f64(counts.get(&(*r, *c)).copied().unwrap_or(0)) / divisor)
                .collect()
        })
        .collect();

    VehiclePairMatrix {
        rows,
        columns,
        values,
    }
}

fn by_descending_total(totals: BTreeMap<VehicleGroup, i64>) -> Vec<VehicleGroup> {
    let mut groups: Vec<(VehicleGroup, i64)> = totals.into_iter().collect();
    groups.sort_by(|(ga, a), (gb, b)| b.cmp(a).then_with(|| ga.cmp(gb)));
    groups.into_iter().map(|(g, _)| g).collect()
}
