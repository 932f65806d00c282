#![forbid(unsafe_code)]

use std::path::PathBuf;

use chrono::{Local, NaiveDate};
use dt_filter::{FilterCriteria, ValueRange};
use dt_io::{IoError, write_csv_path};
use dt_runtime::{Dashboard, DashboardConfig, FilterOptions, RuntimeError};
use dt_types::coerce_date;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

pub const LOG_ENV: &str = "DEAL_TRACKER_LOG";
const DEFAULT_LOG_FILTER: &str = "warn";

#[derive(Debug, Error)]
pub enum CliError {
    #[error("{0}")]
    Usage(String),
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
    #[error(transparent)]
    Io(#[from] IoError),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("failed to initialize logging: {0}")]
    Logging(String),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Plain,
    Json,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CliArgs {
    pub data: Option<PathBuf>,
    pub config: Option<PathBuf>,
    pub sports: Vec<String>,
    pub rights_types: Vec<String>,
    pub regions: Vec<String>,
    pub min_value: Option<f64>,
    pub max_value: Option<f64>,
    pub active_only: bool,
    pub today: Option<NaiveDate>,
    pub format: OutputFormat,
    pub export_csv: Option<PathBuf>,
    pub list_options: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Help,
    Run(CliArgs),
}

pub fn parse_args<I>(args: I) -> Result<Command, CliError>
where
    I: IntoIterator<Item = String>,
{
    let mut out = CliArgs::default();

    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        let mut value = |what: &str| {
            args.next()
                .ok_or_else(|| CliError::Usage(format!("{arg} requires {what}")))
        };
        match arg.as_str() {
            "--data" => out.data = Some(PathBuf::from(value("a path")?)),
            "--config" => out.config = Some(PathBuf::from(value("a path")?)),
            "--sport" => out.sports.push(value("a sport")?),
            "--rights-type" => out.rights_types.push(value("a rights type")?),
            "--region" => out.regions.push(value("a region")?),
            "--min-value" => out.min_value = Some(parse_amount(&arg, &value("an amount")?)?),
            "--max-value" => out.max_value = Some(parse_amount(&arg, &value("an amount")?)?),
            "--active-only" => out.active_only = true,
            "--today" => {
                let raw = value("a date (YYYY-MM-DD)")?;
                let date = coerce_date(&raw).ok().flatten().ok_or_else(|| {
                    CliError::Usage(format!("--today expects YYYY-MM-DD, got {raw:?}"))
                })?;
                out.today = Some(date);
            }
            "--format" => {
                out.format = match value("plain or json")?.as_str() {
                    "plain" => OutputFormat::Plain,
                    "json" => OutputFormat::Json,
                    other => {
                        return Err(CliError::Usage(format!("unsupported format: {other}")));
                    }
                };
            }
            "--export-csv" => out.export_csv = Some(PathBuf::from(value("a path")?)),
            "--list-options" => out.list_options = true,
            "--help" | "-h" => return Ok(Command::Help),
            other => return Err(CliError::Usage(format!("unknown argument: {other}"))),
        }
    }

    Ok(Command::Run(out))
}

fn parse_amount(flag: &str, raw: &str) -> Result<f64, CliError> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| !v.is_nan())
        .ok_or_else(|| CliError::Usage(format!("{flag} expects a number, got {raw:?}")))
}

#[must_use]
pub fn help_text() -> String {
    "deal-tracker\n\
     Usage:\n\
     \tdeal-tracker [--data <path>] [--config <path>] [--sport <name>]... [--rights-type <name>]...\n\
     \t             [--region <name>]... [--min-value <usd>] [--max-value <usd>] [--active-only]\n\
     \t             [--today YYYY-MM-DD] [--format plain|json] [--export-csv <path>] [--list-options]\n\
     Options:\n\
     \t--data <path>          deal CSV (overrides config and DEAL_TRACKER_DATA)\n\
     \t--config <path>        JSON dashboard config\n\
     \t--sport <name>         keep deals for this sport (repeatable)\n\
     \t--rights-type <name>   keep deals with this rights type (repeatable)\n\
     \t--region <name>        keep deals in this region (repeatable)\n\
     \t--min-value <usd>      lower deal value bound (default 0)\n\
     \t--max-value <usd>      upper deal value bound (default: largest deal, at least 1)\n\
     \t--active-only          keep deals whose date range contains today\n\
     \t--today <date>         date used by --active-only (default: local date)\n\
     \t--format <fmt>         plain (default) or json\n\
     \t--export-csv <path>    write the filtered deals as CSV\n\
     \t--list-options         print the available filter values and exit\n\
     \t-h, --help             show this help\n\
     Environment:\n\
     \tDEAL_TRACKER_LOG       log filter (default: warn)"
        .to_owned()
}

/// Install the stderr log subscriber. Honors `DEAL_TRACKER_LOG`.
pub fn init_logging() -> Result<(), CliError> {
    let filter =
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .map_err(|err| CliError::Logging(err.to_string()))
}

pub fn resolve_config(args: &CliArgs) -> Result<DashboardConfig, CliError> {
    let config = match args.config.as_deref() {
        Some(path) => DashboardConfig::load(path)?,
        None => DashboardConfig::default(),
    };
    let mut config = config.with_env_overrides()?;
    if let Some(data) = &args.data {
        config.data_path = data.clone();
    }
    Ok(config)
}

/// Criteria from the flags; bounds left unset fall back to the slider range.
#[must_use]
pub fn build_criteria(args: &CliArgs, options: &FilterOptions) -> FilterCriteria {
    let range = ValueRange::between(
        args.min_value.unwrap_or(options.value_floor),
        args.max_value.unwrap_or(options.value_ceiling),
    );
    FilterCriteria::unrestricted()
        .with_sports(args.sports.iter().cloned())
        .with_rights_types(args.rights_types.iter().cloned())
        .with_regions(args.regions.iter().cloned())
        .with_value_range(range)
        .with_active_only(args.active_only)
}

/// Run the dashboard for `args` and return the text to print.
pub fn execute(args: &CliArgs) -> Result<String, CliError> {
    let config = resolve_config(args)?;
    let dashboard = Dashboard::load(config)?;
    execute_with(&dashboard, args)
}

pub fn execute_with(dashboard: &Dashboard, args: &CliArgs) -> Result<String, CliError> {
    let options = dashboard.filter_options();
    if args.list_options {
        return Ok(match args.format {
            OutputFormat::Json => serde_json::to_string_pretty(&options)?,
            OutputFormat::Plain => render_options(&options),
        });
    }

    let criteria = build_criteria(args, &options);
    let today = args.today.unwrap_or_else(|| Local::now().date_naive());
    tracing::debug!(?criteria, %today, "running dashboard");
    let view = dashboard.run(&criteria, today)?;

    if let Some(path) = &args.export_csv {
        write_csv_path(&view.deals, path)?;
        tracing::info!(path = %path.display(), rows = view.deals.len(), "exported filtered deals");
    }

    Ok(match args.format {
        OutputFormat::Json => serde_json::to_string_pretty(&view)?,
        OutputFormat::Plain => view.render_plain(),
    })
}

fn render_options(options: &FilterOptions) -> String {
    format!(
        "sports: {}\nrights types: {}\nregions: {}\nvalue range: {:.2}..={:.2}\n",
        options.sports.join(", "),
        options.rights_types.join(", "),
        options.regions.join(", "),
        options.value_floor,
        options.value_ceiling
    )
}
