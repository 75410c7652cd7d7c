//! Province breakdown for a clicked region.

use accident_map_accident_models::YearSelection;
use accident_map_geography_models::{
    DrillDownState, GeoCatalog, GeoCode, MapEvent, ProvinceValue, RegionCode,
};
use duckdb::Connection;

use crate::GeoError;
use crate::aggregate::aggregate_region_provinces;

/// Lists the provinces of `region` that have accidents in `years`,
/// ascending by value (ties broken by name).
///
/// A known region without accidents yields an empty list.
///
/// # Errors
///
/// Returns [`GeoError::UnknownRegion`] if the region is not in the store,
/// or [`GeoError`] if a query fails.
pub fn province_breakdown(
    conn: &Connection,
    region: RegionCode,
    years: &YearSelection,
    normalize: bool,
) -> Result<Vec<ProvinceValue>, GeoError> {
    let exists: i64 = conn.query_row(
        "SELECT COUNT(*) FROM regions WHERE code = ?",
        [i32::from(region.value())],
        |row| row.get(0),
    )?;
    if exists == 0 {
        return Err(GeoError::UnknownRegion(region));
    }

    let result = aggregate_region_provinces(conn, region, years, normalize)?;

    let mut provinces: Vec<ProvinceValue> = result
        .entries
        .into_iter()
        .filter(|(_, v)| v.raw_count > 0.0)
        .filter_map(|(code, v)| match code {
            GeoCode::Province(code) => Some(ProvinceValue {
                code,
                value: v.value(normalize),
                name: v.name,
            }),
            GeoCode::Region(_) => None,
        })
        .collect();

    provinces.sort_by(|a, b| a.value.total_cmp(&b.value).then_with(|| a.name.cmp(&b.name)));

    log::debug!(
        "Region {region} breakdown: {} provinces with data",
        provinces.len()
    );

    Ok(provinces)
}

/// Applies a map event to the drill-down state and lists the provinces of
/// the resulting selection.
///
/// The state is owned by the caller and threaded through each call; the
/// returned list is empty when nothing is selected.
///
/// # Errors
///
/// Returns [`GeoError`] if the breakdown query fails.
pub fn select(
    conn: &Connection,
    catalog: &GeoCatalog,
    state: DrillDownState,
    event: MapEvent,
    years: &YearSelection,
    normalize: bool,
) -> Result<(DrillDownState, Vec<ProvinceValue>), GeoError> {
    let next = state.apply(event, catalog);
    let provinces = match next.selected() {
        Some(region) => province_breakdown(conn, region, years, normalize)?,
        None => Vec::new(),
    };
    Ok((next, provinces))
}
