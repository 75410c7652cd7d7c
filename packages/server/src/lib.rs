#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Actix-Web API server for the accident map dashboard.
//!
//! Serves the choropleth, drill-down and section endpoints from a pool of
//! read-only `DuckDB` connections. Boundary polygons and the region and
//! province catalog are loaded once at startup and shared by every worker.

mod error;
mod handlers;
pub mod interactive;

use std::path::Path;
use std::sync::Arc;

use accident_map_database::{DuckDbPool, paths, store};
use accident_map_geography::boundaries::Boundaries;
use accident_map_geography::config::DashboardConfig;
use accident_map_geography_models::GeoCatalog;
use actix_cors::Cors;
use actix_web::{App, HttpServer, middleware, web};

pub use error::ApiFailure;

/// Read-only connections opened for the API.
pub const POOL_SIZE: usize = 4;

/// Shared application state.
pub struct AppState {
    /// Pool of read-only `DuckDB` connections.
    pub pool: Arc<DuckDbPool>,
    /// Region and province polygons.
    pub boundaries: Arc<Boundaries>,
    /// Dashboard config (boundary sources, colour scale).
    pub config: DashboardConfig,
    /// Region and province names, populations and parents.
    pub catalog: Arc<GeoCatalog>,
}

impl AppState {
    /// Opens the store at `db_path` and loads boundaries named by `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be opened or a boundary file
    /// is missing or malformed.
    pub fn open(
        db_path: &Path,
        config: DashboardConfig,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        log::info!("Opening DuckDB pool at {}...", db_path.display());
        let pool = DuckDbPool::open_read_only(db_path, POOL_SIZE)?;
        log::info!("Opened {} read-only connections", pool.size());

        let catalog = {
            let conn = pool.acquire()?;
            store::load_catalog(&conn)?
        };
        log::info!(
            "Catalog: {} regions, {} provinces",
            catalog.regions.len(),
            catalog.provinces.len()
        );

        log::info!("Loading boundaries...");
        let boundaries = Boundaries::load(&config)?;

        Ok(Self {
            pool: Arc::new(pool),
            boundaries: Arc::new(boundaries),
            config,
            catalog: Arc::new(catalog),
        })
    }
}

/// Registers the `/api` routes.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .route("/health", web::get().to(handlers::health))
            .route("/years", web::get().to(handlers::years))
            .route(
                "/geography/choropleth",
                web::get().to(handlers::choropleth),
            )
            .route(
                "/geography/regions/{code}/provinces",
                web::get().to(handlers::region_provinces),
            )
            .route("/geography/selection", web::post().to(handlers::selection))
            .route("/overview", web::get().to(handlers::overview))
            .route("/overview/macro-areas", web::get().to(handlers::macro_areas))
            .route("/time/weekdays", web::get().to(handlers::weekdays))
            .route("/time/hours", web::get().to(handlers::hours))
            .route("/time/slots", web::get().to(handlers::time_slots))
            .route("/vehicles/pairs", web::get().to(handlers::vehicle_pairs))
            .route("/drivers/sex", web::get().to(handlers::driver_sex))
            .route("/drivers/age", web::get().to(handlers::driver_age))
            .route("/drivers/minors", web::get().to(handlers::driver_minors)),
    );
}

/// Reads `BIND_ADDR` (default `127.0.0.1`) and `PORT` (default `8080`).
#[must_use]
pub fn bind_from_env() -> (String, u16) {
    let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1".to_string());
    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8080);
    (bind_addr, port)
}

/// Starts the API server on the address from the environment.
///
/// The caller initializes logging and provides the async runtime.
///
/// # Errors
///
/// Returns an `std::io::Result` error if startup fails or the server
/// cannot bind.
#[allow(clippy::future_not_send)]
pub async fn run_server() -> std::io::Result<()> {
    let (bind_addr, port) = bind_from_env();
    run_server_on(&bind_addr, port).await
}

/// Starts the API server on `bind_addr:port`.
///
/// # Errors
///
/// Returns an `std::io::Result` error if the store or boundaries cannot be
/// loaded, or the server cannot bind.
#[allow(clippy::future_not_send)]
pub async fn run_server_on(bind_addr: &str, port: u16) -> std::io::Result<()> {
    let config = DashboardConfig::load().map_err(|e| std::io::Error::other(e.to_string()))?;
    let state = AppState::open(&paths::accidents_db_path(), config)
        .map_err(|e| std::io::Error::other(e.to_string()))?;
    let state = web::Data::new(state);

    log::info!("Starting server on {bind_addr}:{port}");

    HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .app_data(state.clone())
            .configure(configure)
    })
    .bind((bind_addr, port))?
    .run()
    .await
}

#[cfg(test)]
mod tests {
    use accident_map_accident_models::{AccidentRecord, Weekday, Year};
    use accident_map_geography::boundaries::BoundaryCollection;
    use accident_map_geography::config::BoundarySource;
    use accident_map_geography_models::{Granularity, Province, ProvinceCode, Region, RegionCode};
    use actix_web::http::StatusCode;
    use actix_web::test;
    use serde_json::{Value, json};

    use super::*;

    fn square(x: f64) -> Value {
        json!({
            "type": "Polygon",
            "coordinates": [[[x, 0.0], [x + 1.0, 0.0], [x + 1.0, 1.0], [x, 1.0], [x, 0.0]]]
        })
    }

    fn collection(granularity: Granularity, property: &str, codes: &[Value]) -> BoundaryCollection {
        let features: Vec<Value> = codes
            .iter()
            .enumerate()
            .map(|(i, code)| {
                #[allow(clippy::cast_precision_loss)]
                let x = i as f64;
                json!({
                    "type": "Feature",
                    "geometry": square(x),
                    "properties": { property: code }
                })
            })
            .collect();
        let text = json!({ "type": "FeatureCollection", "features": features }).to_string();
        let source = BoundarySource {
            path: "unused.geojson".into(),
            code_property: property.to_string(),
            name_property: None,
        };
        BoundaryCollection::parse(&text, granularity, &source).unwrap()
    }

    fn record(year: u8, province: u16, deaths: u32) -> AccidentRecord {
        AccidentRecord {
            year: Year::new(year).unwrap(),
            province: ProvinceCode::new(province).unwrap(),
            weekday: Weekday::Tuesday,
            hour: Some(8),
            vehicle_a: Some(1),
            vehicle_b: Some(15),
            sex_a: None,
            age_a: None,
            sex_b: None,
            age_b: None,
            deaths,
            injured: 0,
        }
    }

    /// Piemonte (Torino, Vercelli) and Toscana (Firenze), with four
    /// accidents over 2020-2021.
    fn state() -> web::Data<AppState> {
        let conn = store::open_in_memory().unwrap();
        store::upsert_regions(
            &conn,
            &[
                Region {
                    code: RegionCode::new(1).unwrap(),
                    name: "Piemonte".to_string(),
                    population: Some(4_000_000),
                },
                Region {
                    code: RegionCode::new(9).unwrap(),
                    name: "Toscana".to_string(),
                    population: Some(3_600_000),
                },
            ],
        )
        .unwrap();
        let province = |code: u16, name: &str, region: u8| Province {
            code: ProvinceCode::new(code).unwrap(),
            name: name.to_string(),
            region: RegionCode::new(region).unwrap(),
            population: Some(1_000_000),
        };
        store::upsert_provinces(
            &conn,
            &[
                province(1, "Torino", 1),
                province(2, "Vercelli", 1),
                province(48, "Firenze", 9),
            ],
        )
        .unwrap();
        store::insert_accidents(
            &conn,
            &[
                record(20, 1, 1),
                record(20, 1, 0),
                record(21, 2, 0),
                record(21, 48, 0),
            ],
        )
        .unwrap();
        let catalog = store::load_catalog(&conn).unwrap();

        let boundaries = Boundaries::new(
            collection(Granularity::Region, "reg_istat_code", &[json!("01"), json!("09")]),
            collection(
                Granularity::Province,
                "prov_istat_code_num",
                &[json!(1), json!(2), json!(48)],
            ),
        )
        .unwrap();

        web::Data::new(AppState {
            pool: Arc::new(DuckDbPool::from_connection(conn, 2).unwrap()),
            boundaries: Arc::new(boundaries),
            config: DashboardConfig::embedded().unwrap(),
            catalog: Arc::new(catalog),
        })
    }

    macro_rules! app {
        () => {
            test::init_service(App::new().app_data(state()).configure(configure)).await
        };
    }

    #[actix_web::test]
    async fn health_and_years() {
        let app = app!();

        let req = test::TestRequest::get().uri("/api/health").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["healthy"], true);

        let req = test::TestRequest::get().uri("/api/years").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["years"], json!([2020, 2021]));
        assert_eq!(body["allCaption"], "Average 2020-2021");
    }

    #[actix_web::test]
    async fn choropleth_joins_every_polygon() {
        let app = app!();

        let req = test::TestRequest::get()
            .uri("/api/geography/choropleth?granularity=province&year=2020")
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["caption"], "2020");
        assert_eq!(body["granularity"], "province");
        let features = body["features"]["features"].as_array().unwrap();
        assert_eq!(features.len(), 3);
        assert_eq!(features[0]["properties"]["display_name"], "Torino");
        assert_eq!(features[0]["properties"]["value"], 2.0);
        assert_eq!(features[2]["properties"]["value"], 0.0);
    }

    #[actix_web::test]
    async fn choropleth_defaults_to_regions_over_all_years() {
        let app = app!();

        let req = test::TestRequest::get()
            .uri("/api/geography/choropleth?normalize=true")
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["granularity"], "region");
        assert_eq!(body["caption"], "Average 2020-2021");
        assert_eq!(body["valueLabel"], "Incidents per 100k residents");
    }

    #[actix_web::test]
    async fn region_provinces_sorted_ascending() {
        let app = app!();

        let req = test::TestRequest::get()
            .uri("/api/geography/regions/1/provinces?year=all")
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["region"], "01");
        assert_eq!(body["regionName"], "Piemonte");
        let names: Vec<&str> = body["provinces"]
            .as_array()
            .unwrap()
            .iter()
            .map(|p| p["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["Vercelli", "Torino"]);
    }

    #[actix_web::test]
    async fn unknown_region_is_not_found() {
        let app = app!();

        let req = test::TestRequest::get()
            .uri("/api/geography/regions/05/provinces")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["error"], "Unknown region 05");
    }

    #[actix_web::test]
    async fn bad_parameters_are_rejected() {
        let app = app!();

        for uri in [
            "/api/geography/regions/abc/provinces",
            "/api/time/weekdays?year=1999",
            "/api/geography/choropleth?granularity=county",
        ] {
            let req = test::TestRequest::get().uri(uri).to_request();
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "{uri}");
        }
    }

    #[actix_web::test]
    async fn selection_threads_state() {
        let app = app!();

        let req = test::TestRequest::post()
            .uri("/api/geography/selection")
            .set_json(json!({
                "event": { "type": "click", "code": "048" },
                "year": "2021"
            }))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["state"], json!({ "state": "regionSelected", "region": "09" }));
        assert_eq!(body["provinces"][0]["name"], "Firenze");

        let req = test::TestRequest::post()
            .uri("/api/geography/selection")
            .set_json(json!({
                "state": body["state"],
                "event": { "type": "reset" }
            }))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["state"], json!({ "state": "noSelection" }));
        assert_eq!(body["provinces"], json!([]));
    }

    #[actix_web::test]
    async fn sections_answer_with_captions() {
        let app = app!();

        let req = test::TestRequest::get().uri("/api/overview").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["totalIncidents"], 4);
        assert_eq!(body["years"][0]["mortalityRate"], 50.0);

        for (uri, rows) in [
            ("/api/overview/macro-areas", 3),
            ("/api/time/weekdays?year=2021", 7),
            ("/api/time/hours", 24),
            ("/api/time/slots", 4),
            ("/api/vehicles/pairs", 1),
            ("/api/drivers/sex", 1),
            ("/api/drivers/age", 6),
            ("/api/drivers/minors", 4),
        ] {
            let req = test::TestRequest::get().uri(uri).to_request();
            let body: Value = test::call_and_read_body_json(&app, req).await;
            assert_eq!(body["rows"].as_array().unwrap().len(), rows, "{uri}");
            assert!(body["caption"].is_string(), "{uri}");
        }
    }
}
