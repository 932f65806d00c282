#![forbid(unsafe_code)]

//! Sports sponsorship deal tracker.
//!
//! Load a deal CSV once into an immutable [`DealTable`], then for every set of
//! [`FilterCriteria`] produce the filtered deals, their [`Metrics`], and the
//! ranked [`Aggregation`]s that feed the dashboard charts:
//!
//! ```no_run
//! use dealtracker::{Dashboard, DashboardConfig};
//!
//! let dashboard = Dashboard::load(DashboardConfig::default())?;
//! let criteria = dashboard.filter_options().default_criteria();
//! let view = dashboard.run_today(&criteria)?;
//! println!("{}", view.render_plain());
//! # Ok::<(), dealtracker::RuntimeError>(())
//! ```

pub use dt_filter::{FilterCriteria, Predicate, ValueRange, apply, apply_today};
pub use dt_frame::{
    DealRecord, DealTable, FrameError, Metrics, Outcome, compute_metrics, round_cents,
};
pub use dt_groupby::{
    AggregateRow, Aggregation, DEFAULT_TOP_BRANDS, GroupByError, GroupByOptions, by_region,
    by_sponsor_category, groupby_sum, groupby_sum_usd, top_sponsor_brands,
};
pub use dt_io::{
    CoercionIssue, IoError, LoadReport, LoadedTable, read_csv_bytes, read_csv_path, read_csv_str,
    write_csv_path, write_csv_string,
};
pub use dt_runtime::{
    Dashboard, DashboardConfig, DashboardView, EMPTY_RESULT_MESSAGE, FilterOptions, RuntimeError,
};
pub use dt_types::{
    DType, Field, NA_TOKENS, NullKind, Scalar, TypeError, coerce_date, coerce_field,
    coerce_float, coerce_utf8, is_na_token,
};
