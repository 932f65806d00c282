#![forbid(unsafe_code)]

use std::cmp::Ordering;
use std::collections::HashMap;

use dt_frame::{DealTable, Outcome};
use dt_types::{DType, Field};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_TOP_BRANDS: usize = 10;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupByOptions {
    /// Drop the group of records whose key is absent. Off by default: the
    /// absent key forms its own group.
    pub dropna: bool,
    /// Keep only the first `top_n` rows after ranking.
    pub top_n: Option<usize>,
}

impl GroupByOptions {
    #[must_use]
    pub fn top(n: usize) -> Self {
        Self {
            top_n: Some(n),
            ..Self::default()
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GroupByError {
    #[error("cannot group by {field}: expected a categorical column, found {dtype:?}")]
    NonCategoricalKey { field: Field, dtype: DType },
    #[error("cannot sum {field}: expected a numeric column, found {dtype:?}")]
    NonNumericValue { field: Field, dtype: DType },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateRow {
    pub group_key: Option<String>,
    pub total_value_usd: f64,
}

/// Ranked group totals for one key column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Aggregation {
    key_field: Field,
    rows: Vec<AggregateRow>,
}

impl Aggregation {
    #[must_use]
    pub fn key_field(&self) -> Field {
        self.key_field
    }

    #[must_use]
    pub fn rows(&self) -> &[AggregateRow] {
        &self.rows
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    #[must_use]
    pub fn total(&self) -> f64 {
        self.rows.iter().map(|row| row.total_value_usd).sum()
    }

    #[must_use]
    pub fn outcome(&self) -> Outcome {
        Outcome::from_len(self.rows.len())
    }
}

/// Sum `value_field` per distinct `key_field` value, absent values counting
/// as zero, ranked by total descending.
///
/// Equal totals are ordered by key ascending, with the absent key after every
/// present key.
pub fn groupby_sum(
    table: &DealTable,
    key_field: Field,
    value_field: Field,
    options: GroupByOptions,
) -> Result<Aggregation, GroupByError> {
    if key_field.dtype() != DType::Utf8 {
        return Err(GroupByError::NonCategoricalKey {
            field: key_field,
            dtype: key_field.dtype(),
        });
    }
    if value_field.dtype() != DType::Float64 {
        return Err(GroupByError::NonNumericValue {
            field: value_field,
            dtype: value_field.dtype(),
        });
    }

    let mut slots = HashMap::<Option<&str>, usize>::new();
    let mut sums = Vec::<(Option<&str>, f64)>::new();

    for record in table {
        let key = record.text(key_field);
        if options.dropna && key.is_none() {
            continue;
        }

        let slot = *slots.entry(key).or_insert_with(|| {
            sums.push((key, 0.0));
            sums.len() - 1
        });
        sums[slot].1 += record.number(value_field).unwrap_or(0.0);
    }

    let mut rows = sums
        .into_iter()
        .map(|(key, total)| AggregateRow {
            group_key: key.map(str::to_owned),
            total_value_usd: total,
        })
        .collect::<Vec<_>>();
    rows.sort_by(rank_order);

    if let Some(limit) = options.top_n {
        rows.truncate(limit);
    }

    Ok(Aggregation { key_field, rows })
}

fn rank_order(left: &AggregateRow, right: &AggregateRow) -> Ordering {
    right
        .total_value_usd
        .total_cmp(&left.total_value_usd)
        .then_with(|| match (&left.group_key, &right.group_key) {
            (Some(a), Some(b)) => a.cmp(b),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        })
}

pub fn groupby_sum_usd(
    table: &DealTable,
    key_field: Field,
    options: GroupByOptions,
) -> Result<Aggregation, GroupByError> {
    groupby_sum(table, key_field, Field::DealValueUsd, options)
}

pub fn by_sponsor_category(table: &DealTable) -> Result<Aggregation, GroupByError> {
    groupby_sum_usd(table, Field::SponsorCategory, GroupByOptions::default())
}

pub fn top_sponsor_brands(table: &DealTable, limit: usize) -> Result<Aggregation, GroupByError> {
    groupby_sum_usd(table, Field::SponsorBrand, GroupByOptions::top(limit))
}

pub fn by_region(table: &DealTable) -> Result<Aggregation, GroupByError> {
    groupby_sum_usd(table, Field::Region, GroupByOptions::default())
}
