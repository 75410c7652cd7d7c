//! HTTP handler functions for the accident map API.
//!
//! Every per-selection endpoint accepts `?year=`; absent or `all` selects
//! every year in the store and reports per-year averages.

use accident_map_accident_models::YearSelection;
use accident_map_analytics::{AnalyticsError, drivers, overview, time, vehicles};
use accident_map_database::store;
use accident_map_geography::{choropleth, drilldown};
use accident_map_geography_models::{GeoCode, Granularity, InvalidCodeError, RegionCode, istat};
use accident_map_server_models::{
    ApiHealth, ApiProvinceBreakdown, ApiYears, DrillDownQueryParams, MapQueryParams,
    SelectionRequest, SelectionResponse, YearFilter, YearQueryParams,
};
use actix_web::{HttpResponse, web};
use duckdb::Connection;
use serde::Serialize;

use crate::AppState;
use crate::error::ApiFailure;

/// Resolves the `year` parameter against the years in the store.
fn resolve_years(conn: &Connection, raw: Option<&str>) -> Result<YearSelection, ApiFailure> {
    match YearFilter::parse(raw).map_err(|e| ApiFailure::BadRequest(e.to_string()))? {
        YearFilter::Single(year) => Ok(YearSelection::single(year)),
        YearFilter::All => store::all_years(conn)?
            .ok_or_else(|| ApiFailure::NotFound("No accident data loaded".to_string())),
    }
}

/// Runs one analytics section over the requested years.
fn section<T: Serialize>(
    state: &AppState,
    year: Option<&str>,
    query: impl FnOnce(&Connection, &YearSelection) -> Result<T, AnalyticsError>,
) -> Result<HttpResponse, ApiFailure> {
    let conn = state.pool.acquire()?;
    let years = resolve_years(&conn, year)?;
    let body = query(&conn, &years)?;
    Ok(HttpResponse::Ok().json(body))
}

/// `GET /api/health`
pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(ApiHealth {
        healthy: true,
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// `GET /api/years`
pub async fn years(state: web::Data<AppState>) -> Result<HttpResponse, ApiFailure> {
    let conn = state.pool.acquire()?;
    let years = store::available_years(&conn)?;
    let all_caption = store::all_years(&conn)?.map(|s| s.display_text());

    Ok(HttpResponse::Ok().json(ApiYears {
        years: years.into_iter().map(|y| y.full()).collect(),
        all_caption,
    }))
}

/// `GET /api/geography/choropleth`
///
/// Aggregates, joins onto the boundary polygons and colours them.
pub async fn choropleth(
    state: web::Data<AppState>,
    params: web::Query<MapQueryParams>,
) -> Result<HttpResponse, ApiFailure> {
    let granularity = params.granularity.unwrap_or(Granularity::Region);
    let conn = state.pool.acquire()?;
    let years = resolve_years(&conn, params.year.as_deref())?;

    let spec = choropleth::render(
        &conn,
        &state.boundaries,
        &state.config.choropleth,
        granularity,
        &years,
        params.normalize,
    )?;

    Ok(HttpResponse::Ok().json(spec))
}

/// `GET /api/geography/regions/{code}/provinces`
pub async fn region_provinces(
    state: web::Data<AppState>,
    path: web::Path<String>,
    params: web::Query<DrillDownQueryParams>,
) -> Result<HttpResponse, ApiFailure> {
    let region: RegionCode = path
        .parse()
        .map_err(|e: InvalidCodeError| ApiFailure::BadRequest(e.to_string()))?;

    let conn = state.pool.acquire()?;
    let years = resolve_years(&conn, params.year.as_deref())?;
    let provinces = drilldown::province_breakdown(&conn, region, &years, params.normalize)?;

    let region_name = state
        .catalog
        .name_of(GeoCode::Region(region))
        .unwrap_or_else(|| istat::region_name(region))
        .to_string();

    Ok(HttpResponse::Ok().json(ApiProvinceBreakdown {
        region,
        region_name,
        caption: years.display_text(),
        normalize: params.normalize,
        provinces,
    }))
}

/// `POST /api/geography/selection`
///
/// Applies a map event to the drill-down state sent by the client.
pub async fn selection(
    state: web::Data<AppState>,
    body: web::Json<SelectionRequest>,
) -> Result<HttpResponse, ApiFailure> {
    let request = body.into_inner();
    let conn = state.pool.acquire()?;
    let years = resolve_years(&conn, request.year.as_deref())?;

    let (next, provinces) = drilldown::select(
        &conn,
        &state.catalog,
        request.state,
        request.event,
        &years,
        request.normalize,
    )?;

    Ok(HttpResponse::Ok().json(SelectionResponse {
        state: next,
        caption: years.display_text(),
        provinces,
    }))
}

/// `GET /api/overview`
pub async fn overview(state: web::Data<AppState>) -> Result<HttpResponse, ApiFailure> {
    let conn = state.pool.acquire()?;
    Ok(HttpResponse::Ok().json(overview::overview(&conn)?))
}

/// `GET /api/overview/macro-areas`
pub async fn macro_areas(
    state: web::Data<AppState>,
    params: web::Query<YearQueryParams>,
) -> Result<HttpResponse, ApiFailure> {
    section(&state, params.year.as_deref(), overview::macro_areas)
}

/// `GET /api/time/weekdays`
pub async fn weekdays(
    state: web::Data<AppState>,
    params: web::Query<YearQueryParams>,
) -> Result<HttpResponse, ApiFailure> {
    section(&state, params.year.as_deref(), time::weekdays)
}

/// `GET /api/time/hours`
pub async fn hours(
    state: web::Data<AppState>,
    params: web::Query<YearQueryParams>,
) -> Result<HttpResponse, ApiFailure> {
    section(&state, params.year.as_deref(), time::hours)
}

/// `GET /api/time/slots`
pub async fn time_slots(
    state: web::Data<AppState>,
    params: web::Query<YearQueryParams>,
) -> Result<HttpResponse, ApiFailure> {
    section(&state, params.year.as_deref(), time::time_slots)
}

/// `GET /api/vehicles/pairs`
pub async fn vehicle_pairs(
    state: web::Data<AppState>,
    params: web::Query<YearQueryParams>,
) -> Result<HttpResponse, ApiFailure> {
    section(&state, params.year.as_deref(), vehicles::vehicle_pairs)
}

/// `GET /api/drivers/sex`
pub async fn driver_sex(
    state: web::Data<AppState>,
    params: web::Query<YearQueryParams>,
) -> Result<HttpResponse, ApiFailure> {
    section(&state, params.year.as_deref(), drivers::sex_distribution)
}

/// `GET /api/drivers/age`
pub async fn driver_age(
    state: web::Data<AppState>,
    params: web::Query<YearQueryParams>,
) -> Result<HttpResponse, ApiFailure> {
    section(&state, params.year.as_deref(), drivers::age_distribution)
}

/// `GET /api/drivers/minors`
pub async fn driver_minors(
    state: web::Data<AppState>,
    params: web::Query<YearQueryParams>,
) -> Result<HttpResponse, ApiFailure> {
    section(&state, params.year.as_deref(), drivers::minors)
}
