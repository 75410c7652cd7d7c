#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Command-line front end for the accident map.
//!
//! Imports ISTAT microdata into the store, prints aggregations, exports
//! choropleths and starts the API server. Without a subcommand it falls
//! back to an interactive menu.
//!
//! Uses `indicatif-log-bridge` (via [`accident_map_cli_utils::init_logger`])
//! so log lines and progress bars never fight for the terminal.

mod commands;
mod menu;

use std::path::PathBuf;

use accident_map_geography_models::{Granularity, RegionCode};
use clap::{Parser, Subcommand};

use crate::commands::{CliResult, ImportArgs};

#[derive(Parser)]
#[command(name = "accident_map", about = "Italian road-accident map tools")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Import region and province lookups and accident microdata
    Import {
        /// Regions CSV (`code,name,population`)
        #[arg(long)]
        regions: Option<PathBuf>,
        /// Provinces CSV (`code,name,region,population`)
        #[arg(long)]
        provinces: Option<PathBuf>,
        /// Accident files (CSV, or tab-separated `.txt`/`.tsv`)
        #[arg(long, num_args = 1..)]
        accidents: Vec<PathBuf>,
        /// Field delimiter for accident files, overriding the extension
        #[arg(long)]
        delimiter: Option<char>,
        /// Remove previously imported accidents first
        #[arg(long)]
        replace: bool,
    },
    /// List years in the store with their accident counts
    Years,
    /// Print incidents per region or province
    Aggregate {
        #[arg(long, default_value = "region")]
        granularity: Granularity,
        /// A year (`2021` or `21`), or `all` for the per-year average
        #[arg(long)]
        year: Option<String>,
        /// Report incidents per 100,000 residents
        #[arg(long)]
        normalize: bool,
    },
    /// Print the provinces of one region, ascending by value
    Drilldown {
        /// ISTAT region code (e.g. `12` or `09`)
        region: RegionCode,
        #[arg(long)]
        year: Option<String>,
        #[arg(long)]
        normalize: bool,
    },
    /// Write a coloured choropleth as JSON
    Choropleth {
        #[arg(long, default_value = "region")]
        granularity: Granularity,
        #[arg(long)]
        year: Option<String>,
        #[arg(long)]
        normalize: bool,
        /// Output file
        #[arg(long)]
        out: PathBuf,
    },
    /// Start the API server (`BIND_ADDR`, `PORT`)
    Serve,
}

fn main() -> CliResult<()> {
    let multi = accident_map_cli_utils::init_logger();
    let cli = Cli::parse();

    let Some(command) = cli.command else {
        return menu::run(&multi);
    };

    match command {
        Commands::Import {
            regions,
            provinces,
            accidents,
            delimiter,
            replace,
        } => {
            let args = ImportArgs {
                regions,
                provinces,
                accidents,
                delimiter: delimiter.map(u8::try_from).transpose()?,
                replace,
            };
            commands::import(&multi, &args)?;
        }
        Commands::Years => {
            let conn = commands::open_store()?;
            print!("{}", commands::years_table(&conn)?);
        }
        Commands::Aggregate {
            granularity,
            year,
            normalize,
        } => {
            let conn = commands::open_store()?;
            let years = commands::resolve_years(&conn, year.as_deref())?;
            print!(
                "{}",
                commands::aggregate_table(&conn, granularity, &years, normalize)?
            );
        }
        Commands::Drilldown {
            region,
            year,
            normalize,
        } => {
            let conn = commands::open_store()?;
            let years = commands::resolve_years(&conn, year.as_deref())?;
            print!(
                "{}",
                commands::drilldown_table(&conn, region, &years, normalize)?
            );
        }
        Commands::Choropleth {
            granularity,
            year,
            normalize,
            out,
        } => {
            let conn = commands::open_store()?;
            let years = commands::resolve_years(&conn, year.as_deref())?;
            commands::export_choropleth(&conn, granularity, &years, normalize, &out)?;
        }
        Commands::Serve => commands::serve()?,
    }

    Ok(())
}
