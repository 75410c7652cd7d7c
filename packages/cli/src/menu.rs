//! Interactive menu shown when no subcommand is given.

use std::path::PathBuf;

use accident_map_cli_utils::MultiProgress;
use accident_map_geography_models::{Granularity, RegionCode};
use dialoguer::{Confirm, Input, Select};

use crate::commands::{self, CliResult, ImportArgs};

enum Tool {
    Import,
    Years,
    Aggregate,
    Drilldown,
    Choropleth,
    Server,
}

impl Tool {
    const ALL: &[Self] = &[
        Self::Import,
        Self::Years,
        Self::Aggregate,
        Self::Drilldown,
        Self::Choropleth,
        Self::Server,
    ];

    #[must_use]
    const fn label(&self) -> &'static str {
        match self {
            Self::Import => "Import data",
            Self::Years => "Show available years",
            Self::Aggregate => "Aggregate by region or province",
            Self::Drilldown => "Drill down into a region",
            Self::Choropleth => "Export choropleth",
            Self::Server => "Start server",
        }
    }
}

fn prompt_path(prompt: &str) -> CliResult<Option<PathBuf>> {
    let raw: String = Input::new()
        .with_prompt(format!("{prompt} (empty to skip)"))
        .allow_empty(true)
        .interact_text()?;
    let raw = raw.trim();
    Ok((!raw.is_empty()).then(|| PathBuf::from(raw)))
}

fn prompt_granularity() -> CliResult<Granularity> {
    let choices = [Granularity::Region, Granularity::Province];
    let labels: Vec<&str> = choices.iter().map(|g| g.as_ref()).collect();
    let idx = Select::new()
        .with_prompt("Granularity")
        .items(&labels)
        .default(0)
        .interact()?;
    Ok(choices[idx])
}

fn prompt_selection() -> CliResult<(Option<String>, bool)> {
    let year: String = Input::new()
        .with_prompt("Year (or all)")
        .default("all".to_string())
        .interact_text()?;
    let normalize = Confirm::new()
        .with_prompt("Per 100,000 residents?")
        .default(false)
        .interact()?;
    Ok((Some(year), normalize))
}

/// Runs the interactive menu.
///
/// # Errors
///
/// Returns an error if a prompt or the chosen command fails.
pub fn run(multi: &MultiProgress) -> CliResult<()> {
    println!("Accident Map");
    println!();

    let labels: Vec<&str> = Tool::ALL.iter().map(Tool::label).collect();

    let idx = Select::new()
        .with_prompt("What would you like to do?")
        .items(&labels)
        .default(0)
        .interact()?;

    match Tool::ALL[idx] {
        Tool::Import => {
            let regions = prompt_path("Regions CSV")?;
            let provinces = prompt_path("Provinces CSV")?;
            let mut accidents = Vec::new();
            while let Some(path) = prompt_path("Accident file")? {
                accidents.push(path);
            }
            let replace = !accidents.is_empty()
                && Confirm::new()
                    .with_prompt("Replace previously imported accidents?")
                    .default(false)
                    .interact()?;
            let args = ImportArgs {
                regions,
                provinces,
                accidents,
                delimiter: None,
                replace,
            };
            commands::import(multi, &args)?;
        }
        Tool::Years => {
            let conn = commands::open_store()?;
            print!("{}", commands::years_table(&conn)?);
        }
        Tool::Aggregate => {
            let granularity = prompt_granularity()?;
            let (year, normalize) = prompt_selection()?;
            let conn = commands::open_store()?;
            let years = commands::resolve_years(&conn, year.as_deref())?;
            print!(
                "{}",
                commands::aggregate_table(&conn, granularity, &years, normalize)?
            );
        }
        Tool::Drilldown => {
            let region: RegionCode = Input::new()
                .with_prompt("Region code")
                .interact_text()?;
            let (year, normalize) = prompt_selection()?;
            let conn = commands::open_store()?;
            let years = commands::resolve_years(&conn, year.as_deref())?;
            print!(
                "{}",
                commands::drilldown_table(&conn, region, &years, normalize)?
            );
        }
        Tool::Choropleth => {
            let granularity = prompt_granularity()?;
            let (year, normalize) = prompt_selection()?;
            let out: String = Input::new()
                .with_prompt("Output file")
                .default(format!("data/generated/{granularity}_choropleth.json"))
                .interact_text()?;
            let conn = commands::open_store()?;
            let years = commands::resolve_years(&conn, year.as_deref())?;
            commands::export_choropleth(
                &conn,
                granularity,
                &years,
                normalize,
                &PathBuf::from(out),
            )?;
        }
        Tool::Server => {
            actix_web::rt::System::new().block_on(accident_map_server::interactive::run())?;
        }
    }

    Ok(())
}
