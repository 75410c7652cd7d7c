//! Subcommand implementations shared by the flag-driven and menu modes.

use std::fmt::Write as _;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::time::Instant;

use accident_map_accident_models::YearSelection;
use accident_map_cli_utils::{IndicatifProgress, MultiProgress};
use accident_map_database::{paths, store};
use accident_map_geography::aggregate::aggregate;
use accident_map_geography::boundaries::Boundaries;
use accident_map_geography::choropleth;
use accident_map_geography::config::DashboardConfig;
use accident_map_geography::drilldown::province_breakdown;
use accident_map_geography_models::{GeoCode, Granularity, RegionCode, istat};
use accident_map_ingest::progress::ProgressCallback;
use accident_map_ingest::{ImportSummary, import_accident_file, import_provinces, import_regions};
use accident_map_server_models::YearFilter;
use duckdb::Connection;

pub type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

const NO_DATA: &str = "No accident data loaded; run `accident_map import` first";

/// Files and options for one import run.
#[derive(Debug, Default)]
pub struct ImportArgs {
    pub regions: Option<PathBuf>,
    pub provinces: Option<PathBuf>,
    pub accidents: Vec<PathBuf>,
    pub delimiter: Option<u8>,
    /// Remove previously imported accidents first.
    pub replace: bool,
}

/// Opens the configured store for reading.
pub fn open_store() -> CliResult<Connection> {
    Ok(store::open_read_only(&paths::accidents_db_path())?)
}

/// Resolves a `--year` value: absent or `all` means every stored year.
pub fn resolve_years(conn: &Connection, raw: Option<&str>) -> CliResult<YearSelection> {
    match YearFilter::parse(raw)? {
        YearFilter::Single(year) => Ok(YearSelection::single(year)),
        YearFilter::All => Ok(store::all_years(conn)?.ok_or(NO_DATA)?),
    }
}

fn format_value(value: f64) -> String {
    format!("{value:.1}")
}

/// Runs an import into the configured store.
///
/// Lookup tables are imported before accidents so every accident row can
/// be checked against the province catalog.
pub fn import(multi: &MultiProgress, args: &ImportArgs) -> CliResult<()> {
    let start = Instant::now();
    let conn = store::open_default()?;

    if let Some(path) = &args.regions {
        let summary = import_regions(&conn, File::open(path)?)?;
        println!("Regions: {} imported from {}", summary.inserted, path.display());
    }
    if let Some(path) = &args.provinces {
        let summary = import_provinces(&conn, File::open(path)?)?;
        println!(
            "Provinces: {} imported, {} skipped from {}",
            summary.inserted,
            summary.skipped,
            path.display()
        );
    }

    if args.accidents.is_empty() {
        return Ok(());
    }

    if args.replace {
        let removed = store::clear_accidents(&conn)?;
        log::info!("Removed {removed} previously imported accidents");
    }

    let files = (args.accidents.len() > 1).then(|| {
        IndicatifProgress::steps_bar(multi, "Accident files", args.accidents.len() as u64)
    });

    let mut total = ImportSummary::default();
    for path in &args.accidents {
        let name = path
            .file_name()
            .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());
        let progress = IndicatifProgress::records_bar(multi, &name);
        let summary = import_accident_file(&conn, path, args.delimiter, &progress)?;

        total.read += summary.read;
        total.inserted += summary.inserted;
        total.skipped += summary.skipped;
        if let Some(files) = &files {
            files.inc(1);
        }
    }
    if let Some(files) = files {
        files.finish("Accident files done".to_string());
    }

    println!(
        "Accidents: {} read, {} imported, {} skipped in {:.1}s",
        total.read,
        total.inserted,
        total.skipped,
        start.elapsed().as_secs_f64()
    );
    Ok(())
}

/// Lists stored years with their accident counts.
pub fn years_table(conn: &Connection) -> CliResult<String> {
    let years = store::available_years(conn)?;
    if years.is_empty() {
        return Err(NO_DATA.into());
    }

    let mut out = String::new();
    writeln!(out, "{:<6} {:>10}", "YEAR", "ACCIDENTS")?;
    for year in years {
        let count = store::accident_count(conn, &YearSelection::single(year))?;
        writeln!(out, "{:<6} {count:>10}", year.full())?;
    }
    Ok(out)
}

/// Tabulates the per-unit values of one granularity.
pub fn aggregate_table(
    conn: &Connection,
    granularity: Granularity,
    years: &YearSelection,
    normalize: bool,
) -> CliResult<String> {
    let result = aggregate(conn, granularity, years, normalize)?;

    let mut out = String::new();
    writeln!(
        out,
        "{} by {granularity}, {}",
        result.value_label(),
        years.display_text()
    )?;
    writeln!(out, "{:<5} {:<32} {:>12}", "CODE", "NAME", "VALUE")?;
    for (code, value) in &result.entries {
        writeln!(
            out,
            "{:<5} {:<32} {:>12}",
            code.to_string(),
            value.name,
            format_value(value.value(normalize))
        )?;
    }
    Ok(out)
}

/// Tabulates the provinces of one region, ascending by value.
pub fn drilldown_table(
    conn: &Connection,
    region: RegionCode,
    years: &YearSelection,
    normalize: bool,
) -> CliResult<String> {
    let provinces = province_breakdown(conn, region, years, normalize)?;
    let catalog = store::load_catalog(conn)?;
    let region_name = catalog
        .name_of(GeoCode::Region(region))
        .unwrap_or_else(|| istat::region_name(region));

    let mut out = String::new();
    writeln!(out, "{region_name} ({region}), {}", years.display_text())?;
    if provinces.is_empty() {
        writeln!(out, "No accidents recorded")?;
        return Ok(out);
    }
    for province in &provinces {
        writeln!(
            out,
            "{:<5} {:<32} {:>12}",
            province.code.to_string(),
            province.name,
            format_value(province.value)
        )?;
    }
    Ok(out)
}

/// Renders a choropleth and writes it to `out` as JSON.
pub fn export_choropleth(
    conn: &Connection,
    granularity: Granularity,
    years: &YearSelection,
    normalize: bool,
    out: &Path,
) -> CliResult<()> {
    let config = DashboardConfig::load()?;
    let boundaries = Boundaries::load(&config)?;
    let spec = choropleth::render(
        conn,
        &boundaries,
        &config.choropleth,
        granularity,
        years,
        normalize,
    )?;

    if let Some(parent) = out.parent() {
        paths::ensure_dir(parent)?;
    }
    serde_json::to_writer_pretty(BufWriter::new(File::create(out)?), &spec)?;
    println!(
        "Wrote {} {granularity} polygons ({}) to {}",
        spec.features.features.len(),
        spec.caption,
        out.display()
    );
    Ok(())
}

/// Starts the API server on the actix runtime.
pub fn serve() -> CliResult<()> {
    actix_web::rt::System::new().block_on(accident_map_server::run_server())?;
    Ok(())
}
