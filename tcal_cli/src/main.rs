use std::{env::current_dir, fs, path::PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tcal_core::{
    ical::generator::Emitter,
    ical_export,
    schedule::ScheduleOptions,
    schedule_client::{self, Schedule},
    table::RowShapePolicy,
};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum Format {
    /// an iCalendar file
    #[default]
    Ics,
    /// the collection dates per category as JSON
    Json,
    /// the scraped table rows as JSON
    Records,
}

#[derive(Debug, Parser)]
pub struct Arguments {
    /// the schedule page link, or a path to a saved page with `--file`
    pub source: String,
    /// read the schedule page from a local file
    #[arg(long)]
    pub file: bool,
    /// what to output
    #[arg(long, value_enum, default_value_t)]
    pub format: Format,
    /// where to write the output, `calendar.ics` in the current directory for ics, stdout otherwise
    #[arg(long, short)]
    pub output: Option<PathBuf>,
    /// exclude the collection dates of a category, may be repeated
    #[arg(long)]
    pub exclude: Vec<String>,
    /// CSS selector of the element containing the schedule table
    #[arg(long)]
    pub selector: Option<String>,
    /// name of the column holding the month and year
    #[arg(long)]
    pub period_column: Option<String>,
    /// drop surplus cells and pad missing ones instead of failing on uneven rows
    #[arg(long)]
    pub truncate_rows: bool,
}

impl From<&Arguments> for ScheduleOptions {
    fn from(value: &Arguments) -> Self {
        let mut options = ScheduleOptions::default();
        if let Some(selector) = &value.selector {
            options.selector = selector.clone();
        }
        if let Some(period_column) = &value.period_column {
            options.period_column = period_column.clone();
        }
        if value.truncate_rows {
            options.row_shape = RowShapePolicy::Truncate;
        }
        options
    }
}

async fn load(args: &Arguments, options: &ScheduleOptions) -> Result<Schedule> {
    if args.file {
        let html = fs::read_to_string(&args.source)
            .with_context(|| format!("failed to read {}", args.source))?;
        Ok(schedule_client::parse(&html, options)?)
    } else {
        let client = reqwest::Client::new();
        Ok(schedule_client::get(&client, &args.source, options).await?)
    }
}

fn render(args: &Arguments, mut schedule: Schedule) -> Result<String> {
    schedule.calendar.exclude(&args.exclude);
    let output = match args.format {
        Format::Ics => {
            let source_url = (!args.file).then_some(args.source.as_str());
            ical_export::to_ical(&schedule.calendar, source_url).generate()
        }
        Format::Json => serde_json::to_string_pretty(&schedule.calendar)?,
        Format::Records => serde_json::to_string_pretty(&schedule.records)?,
    };
    Ok(output)
}

/// Used when `RUST_LOG` is not set.
static DEFAULT_LOG_FILTER: &str = "info";

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .with_writer(std::io::stderr)
        .init();
    let args = Arguments::parse();
    let options = ScheduleOptions::from(&args);
    let schedule = load(&args, &options).await?;
    tracing::info!(
        records = schedule.records.len(),
        categories = schedule.calendar.len(),
        "schedule loaded"
    );
    let output = render(&args, schedule)?;
    let path = match (&args.output, args.format) {
        (Some(path), _) => Some(path.clone()),
        (None, Format::Ics) => {
            let mut path = current_dir()?;
            path.push("calendar.ics");
            Some(path)
        }
        (None, _) => None,
    };
    match path {
        Some(path) => {
            fs::write(&path, output)?;
            tracing::info!(path = %path.display(), "written");
        }
        None => println!("{output}"),
    }
    Ok(())
}
