#![forbid(unsafe_code)]

use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{Local, NaiveDate};
use dt_filter::{FilterCriteria, ValueRange, apply};
use dt_frame::{DealTable, Metrics, Outcome, round_cents};
use dt_groupby::{
    AggregateRow, Aggregation, DEFAULT_TOP_BRANDS, GroupByError, by_region, by_sponsor_category,
    top_sponsor_brands,
};
use dt_io::{IoError, LoadReport, LoadedTable, read_csv_path};
use dt_types::Field;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_DATA_PATH: &str = "data/sample_deals.csv";
pub const DEFAULT_TITLE: &str = "Sports Deal Tracker";
pub const EMPTY_RESULT_MESSAGE: &str = "No deals match the current filters.";

pub const ENV_DATA_PATH: &str = "DEAL_TRACKER_DATA";
pub const ENV_TOP_BRANDS: &str = "DEAL_TRACKER_TOP_BRANDS";

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Io(#[from] IoError),
    #[error(transparent)]
    GroupBy(#[from] GroupByError),
    #[error("failed to read config {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    ConfigParse(#[from] serde_json::Error),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    pub data_path: PathBuf,
    pub title: String,
    pub top_brand_limit: usize,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            data_path: PathBuf::from(DEFAULT_DATA_PATH),
            title: DEFAULT_TITLE.to_owned(),
            top_brand_limit: DEFAULT_TOP_BRANDS,
        }
    }
}

impl DashboardConfig {
    pub fn from_json_str(input: &str) -> Result<Self, RuntimeError> {
        let config: Self = serde_json::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, RuntimeError> {
        let path = path.as_ref();
        let input = std::fs::read_to_string(path).map_err(|source| RuntimeError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&input)
    }

    pub fn validate(&self) -> Result<(), RuntimeError> {
        if self.top_brand_limit == 0 {
            return Err(RuntimeError::InvalidConfig(
                "top_brand_limit must be at least 1".to_owned(),
            ));
        }
        Ok(())
    }

    #[must_use]
    pub fn with_data_path(mut self, data_path: impl Into<PathBuf>) -> Self {
        self.data_path = data_path.into();
        self
    }

    /// Apply `DEAL_TRACKER_DATA` / `DEAL_TRACKER_TOP_BRANDS` from the process
    /// environment.
    pub fn with_env_overrides(self) -> Result<Self, RuntimeError> {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    pub fn with_overrides_from<F>(mut self, lookup: F) -> Result<Self, RuntimeError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup(ENV_DATA_PATH) {
            self.data_path = PathBuf::from(path);
        }
        if let Some(raw) = lookup(ENV_TOP_BRANDS) {
            self.top_brand_limit = raw.trim().parse().map_err(|_| {
                RuntimeError::InvalidConfig(format!("{ENV_TOP_BRANDS}={raw:?} is not a count"))
            })?;
        }
        self.validate()?;
        Ok(self)
    }
}

/// Choices offered to the user: distinct categorical values and the value
/// slider bounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterOptions {
    pub sports: Vec<String>,
    pub rights_types: Vec<String>,
    pub regions: Vec<String>,
    pub value_floor: f64,
    pub value_ceiling: f64,
}

impl FilterOptions {
    #[must_use]
    pub fn from_table(table: &DealTable) -> Self {
        let max_value = table.value_bounds().map_or(0.0, |(_, hi)| hi);
        Self {
            sports: table.distinct_text(Field::Sport),
            rights_types: table.distinct_text(Field::RightsType),
            regions: table.distinct_text(Field::Region),
            value_floor: 0.0,
            value_ceiling: max_value.max(1.0),
        }
    }

    #[must_use]
    pub fn default_range(&self) -> ValueRange {
        ValueRange::between(self.value_floor, self.value_ceiling)
    }

    /// No selections, the full slider range, all dates.
    #[must_use]
    pub fn default_criteria(&self) -> FilterCriteria {
        FilterCriteria::unrestricted().with_value_range(self.default_range())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardView {
    pub title: String,
    pub deals: DealTable,
    pub metrics: Metrics,
    pub by_category: Aggregation,
    pub top_brands: Aggregation,
    pub top_brand_limit: usize,
    pub by_region: Aggregation,
    pub outcome: Outcome,
}

impl DashboardView {
    #[must_use]
    pub fn render_plain(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "[{}]", self.title);
        let _ = writeln!(out, "Deals shown: {}", self.metrics.count);
        let _ = writeln!(
            out,
            "Total value (USD): {:.2}",
            self.metrics.total_value_usd
        );
        let _ = writeln!(
            out,
            "Avg deal (USD): {:.2}",
            self.metrics.avg_value_usd_display()
        );

        if self.outcome.is_empty_result() {
            let _ = writeln!(out);
            let _ = writeln!(out, "{EMPTY_RESULT_MESSAGE}");
            return out;
        }

        render_chart(&mut out, "Total value by sponsor category", &self.by_category);
        render_chart(
            &mut out,
            &format!("Top {} brands by deal value", self.top_brand_limit),
            &self.top_brands,
        );
        render_chart(&mut out, "Total value by region", &self.by_region);
        out
    }
}

fn render_chart(out: &mut String, title: &str, aggregation: &Aggregation) {
    let _ = writeln!(out);
    let _ = writeln!(out, "{title}");
    let width = aggregation
        .rows()
        .iter()
        .map(|row| group_label(row).len())
        .max()
        .unwrap_or(0);
    for row in aggregation.rows() {
        let _ = writeln!(
            out,
            "  {:<width$}  {:.2}",
            group_label(row),
            round_cents(row.total_value_usd)
        );
    }
}

fn group_label(row: &AggregateRow) -> &str {
    row.group_key.as_deref().unwrap_or("<null>")
}

/// The loaded deal table plus configuration. Built once; every run reads the
/// same immutable table.
#[derive(Debug, Clone)]
pub struct Dashboard {
    config: DashboardConfig,
    table: Arc<DealTable>,
    load_report: LoadReport,
}

impl Dashboard {
    pub fn load(config: DashboardConfig) -> Result<Self, RuntimeError> {
        config.validate()?;
        let loaded = read_csv_path(&config.data_path)?;

        #[cfg(feature = "tracing")]
        tracing::info!(
            path = %config.data_path.display(),
            rows = loaded.report.row_count,
            clean = loaded.report.is_clean(),
            "deal table loaded"
        );

        Ok(Self::from_loaded(loaded, config))
    }

    #[must_use]
    pub fn from_loaded(loaded: LoadedTable, config: DashboardConfig) -> Self {
        Self {
            config,
            table: Arc::new(loaded.table),
            load_report: loaded.report,
        }
    }

    #[must_use]
    pub fn from_table(table: DealTable, config: DashboardConfig) -> Self {
        let load_report = LoadReport {
            row_count: table.len(),
            ..LoadReport::default()
        };
        Self {
            config,
            table: Arc::new(table),
            load_report,
        }
    }

    #[must_use]
    pub fn config(&self) -> &DashboardConfig {
        &self.config
    }

    #[must_use]
    pub fn table(&self) -> &Arc<DealTable> {
        &self.table
    }

    #[must_use]
    pub fn load_report(&self) -> &LoadReport {
        &self.load_report
    }

    #[must_use]
    pub fn filter_options(&self) -> FilterOptions {
        FilterOptions::from_table(&self.table)
    }

    /// Filter, then compute metrics and the three chart aggregations.
    pub fn run(
        &self,
        criteria: &FilterCriteria,
        today: NaiveDate,
    ) -> Result<DashboardView, RuntimeError> {
        let deals = apply(&self.table, criteria, today);
        let metrics = deals.metrics();
        let by_category = by_sponsor_category(&deals)?;
        let top_brands = top_sponsor_brands(&deals, self.config.top_brand_limit)?;
        let by_region = by_region(&deals)?;
        let outcome = deals.outcome();

        #[cfg(feature = "tracing")]
        tracing::debug!(
            rows = metrics.count,
            total_value_usd = metrics.total_value_usd,
            empty = outcome.is_empty_result(),
            "dashboard run complete"
        );

        Ok(DashboardView {
            title: self.config.title.clone(),
            deals,
            metrics,
            by_category,
            top_brands,
            top_brand_limit: self.config.top_brand_limit,
            by_region,
            outcome,
        })
    }

    pub fn run_today(&self, criteria: &FilterCriteria) -> Result<DashboardView, RuntimeError> {
        self.run(criteria, Local::now().date_naive())
    }
}
