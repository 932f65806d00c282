#![forbid(unsafe_code)]

use std::collections::BTreeSet;

use chrono::{Local, NaiveDate};
use dt_frame::{DealRecord, DealTable};
use dt_types::Field;
use serde::{Deserialize, Serialize};

/// Inclusive numeric bounds. A missing bound is unbounded on that side.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ValueRange {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl ValueRange {
    #[must_use]
    pub fn between(min: f64, max: f64) -> Self {
        Self {
            min: Some(min),
            max: Some(max),
        }
    }

    #[must_use]
    pub fn unbounded() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn contains(&self, value: f64) -> bool {
        self.min.is_none_or(|min| value >= min) && self.max.is_none_or(|max| value <= max)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Predicate {
    /// Categorical field value is one of `values`. Absent never matches.
    MemberOf {
        field: Field,
        values: BTreeSet<String>,
    },
    /// Numeric field, absent read as zero, lies within `range`.
    ValueWithin { field: Field, range: ValueRange },
    /// Deal date range contains `date`.
    ActiveOn { date: NaiveDate },
}

impl Predicate {
    #[must_use]
    pub fn matches(&self, record: &DealRecord) -> bool {
        match self {
            Self::MemberOf { field, values } => record
                .text(*field)
                .is_some_and(|value| values.contains(value)),
            Self::ValueWithin { field, range } => {
                range.contains(record.number(*field).unwrap_or(0.0))
            }
            Self::ActiveOn { date } => record.is_active_on(*date),
        }
    }
}

/// User-selected filters. Empty sets place no restriction on their field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterCriteria {
    pub sports: BTreeSet<String>,
    pub rights_types: BTreeSet<String>,
    pub regions: BTreeSet<String>,
    pub value_range: ValueRange,
    pub active_only: bool,
}

impl FilterCriteria {
    #[must_use]
    pub fn unrestricted() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_sports<I, S>(mut self, sports: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.sports = sports.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_rights_types<I, S>(mut self, rights_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.rights_types = rights_types.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_regions<I, S>(mut self, regions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.regions = regions.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_value_range(mut self, value_range: ValueRange) -> Self {
        self.value_range = value_range;
        self
    }

    #[must_use]
    pub fn with_active_only(mut self, active_only: bool) -> Self {
        self.active_only = active_only;
        self
    }

    /// The conjunction this criteria set stands for, in evaluation order:
    /// sport, rights type, region, value range, active-on-`today`.
    #[must_use]
    pub fn predicates(&self, today: NaiveDate) -> Vec<Predicate> {
        let memberships = [
            (Field::Sport, &self.sports),
            (Field::RightsType, &self.rights_types),
            (Field::Region, &self.regions),
        ];

        let mut predicates = memberships
            .into_iter()
            .filter(|(_, values)| !values.is_empty())
            .map(|(field, values)| Predicate::MemberOf {
                field,
                values: values.clone(),
            })
            .collect::<Vec<_>>();

        predicates.push(Predicate::ValueWithin {
            field: Field::DealValueUsd,
            range: self.value_range,
        });

        if self.active_only {
            predicates.push(Predicate::ActiveOn { date: today });
        }

        predicates
    }
}

#[must_use]
pub fn apply(table: &DealTable, criteria: &FilterCriteria, today: NaiveDate) -> DealTable {
    let predicates = criteria.predicates(today);
    let out = table.filter_rows(|record| predicates.iter().all(|p| p.matches(record)));

    #[cfg(feature = "tracing")]
    tracing::debug!(
        input_rows = table.len(),
        output_rows = out.len(),
        predicates = predicates.len(),
        "applied deal filters"
    );

    out
}

/// [`apply`] against the local calendar date.
#[must_use]
pub fn apply_today(table: &DealTable, criteria: &FilterCriteria) -> DealTable {
    apply(table, criteria, Local::now().date_naive())
}
