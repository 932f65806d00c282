#![forbid(unsafe_code)]

use std::collections::BTreeSet;

use chrono::NaiveDate;
use dt_types::{DType, Field, Scalar};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum FrameError {
    #[error("field {field} expects {expected:?} but got {got:?}")]
    DTypeMismatch {
        field: Field,
        expected: DType,
        got: DType,
    },
}

/// One sponsorship deal. Every column is always present; absence is `None`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DealRecord {
    pub property: Option<String>,
    pub sport: Option<String>,
    pub rights_type: Option<String>,
    pub deal_name: Option<String>,
    pub sponsor_brand: Option<String>,
    pub sponsor_category: Option<String>,
    pub region: Option<String>,
    pub country: Option<String>,
    pub currency: Option<String>,
    pub deal_value_usd: Option<f64>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

impl DealRecord {
    fn text_slot(&self, field: Field) -> Option<&Option<String>> {
        match field {
            Field::Property => Some(&self.property),
            Field::Sport => Some(&self.sport),
            Field::RightsType => Some(&self.rights_type),
            Field::DealName => Some(&self.deal_name),
            Field::SponsorBrand => Some(&self.sponsor_brand),
            Field::SponsorCategory => Some(&self.sponsor_category),
            Field::Region => Some(&self.region),
            Field::Country => Some(&self.country),
            Field::Currency => Some(&self.currency),
            Field::DealValueUsd | Field::StartDate | Field::EndDate => None,
        }
    }

    fn text_slot_mut(&mut self, field: Field) -> Option<&mut Option<String>> {
        match field {
            Field::Property => Some(&mut self.property),
            Field::Sport => Some(&mut self.sport),
            Field::RightsType => Some(&mut self.rights_type),
            Field::DealName => Some(&mut self.deal_name),
            Field::SponsorBrand => Some(&mut self.sponsor_brand),
            Field::SponsorCategory => Some(&mut self.sponsor_category),
            Field::Region => Some(&mut self.region),
            Field::Country => Some(&mut self.country),
            Field::Currency => Some(&mut self.currency),
            Field::DealValueUsd | Field::StartDate | Field::EndDate => None,
        }
    }

    /// String value of a categorical field. `None` for absent values and for
    /// non-string fields.
    #[must_use]
    pub fn text(&self, field: Field) -> Option<&str> {
        self.text_slot(field).and_then(Option::as_deref)
    }

    #[must_use]
    pub fn number(&self, field: Field) -> Option<f64> {
        match field {
            Field::DealValueUsd => self.deal_value_usd.filter(|v| !v.is_nan()),
            _ => None,
        }
    }

    #[must_use]
    pub fn date(&self, field: Field) -> Option<NaiveDate> {
        match field {
            Field::StartDate => self.start_date,
            Field::EndDate => self.end_date,
            _ => None,
        }
    }

    #[must_use]
    pub fn value(&self, field: Field) -> Scalar {
        match field.dtype() {
            DType::Utf8 => Scalar::from(self.text(field).map(str::to_owned)),
            DType::Float64 => Scalar::from(self.number(field)),
            DType::Date => Scalar::from(self.date(field)),
        }
    }

    /// Store a coerced scalar. Missing markers of any kind clear the field.
    pub fn set(&mut self, field: Field, value: Scalar) -> Result<(), FrameError> {
        let expected = field.dtype();
        if value.is_missing() {
            match expected {
                DType::Utf8 => {
                    if let Some(slot) = self.text_slot_mut(field) {
                        *slot = None;
                    }
                }
                DType::Float64 => self.deal_value_usd = None,
                DType::Date => self.set_date(field, None),
            }
            return Ok(());
        }

        match (expected, value) {
            (DType::Utf8, Scalar::Utf8(v)) => {
                if let Some(slot) = self.text_slot_mut(field) {
                    *slot = Some(v);
                }
            }
            (DType::Float64, Scalar::Float64(v)) => self.deal_value_usd = Some(v),
            (DType::Date, Scalar::Date(v)) => self.set_date(field, Some(v)),
            (expected, other) => {
                return Err(FrameError::DTypeMismatch {
                    field,
                    expected,
                    got: other.dtype(),
                });
            }
        }
        Ok(())
    }

    fn set_date(&mut self, field: Field, value: Option<NaiveDate>) {
        match field {
            Field::StartDate => self.start_date = value,
            Field::EndDate => self.end_date = value,
            _ => {}
        }
    }

    #[must_use]
    pub fn value_usd_or_zero(&self) -> f64 {
        self.number(Field::DealValueUsd).unwrap_or(0.0)
    }

    /// Both bounds must be present and contain `date` (inclusive).
    #[must_use]
    pub fn is_active_on(&self, date: NaiveDate) -> bool {
        match (self.start_date, self.end_date) {
            (Some(start), Some(end)) => start <= date && date <= end,
            _ => false,
        }
    }
}

/// Whether a pipeline stage produced rows. An empty result is a valid
/// outcome that presenters replace with an informational message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Populated,
    EmptyResult,
}

impl Outcome {
    #[must_use]
    pub fn from_len(len: usize) -> Self {
        if len == 0 {
            Self::EmptyResult
        } else {
            Self::Populated
        }
    }

    #[must_use]
    pub fn is_empty_result(self) -> bool {
        matches!(self, Self::EmptyResult)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DealTable {
    records: Vec<DealRecord>,
}

impl DealTable {
    #[must_use]
    pub fn new(records: Vec<DealRecord>) -> Self {
        Self { records }
    }

    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    #[must_use]
    pub fn records(&self) -> &[DealRecord] {
        &self.records
    }

    #[must_use]
    pub fn get(&self, position: usize) -> Option<&DealRecord> {
        self.records.get(position)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, DealRecord> {
        self.records.iter()
    }

    #[must_use]
    pub fn outcome(&self) -> Outcome {
        Outcome::from_len(self.len())
    }

    #[must_use]
    pub fn filter_rows<P>(&self, mut predicate: P) -> Self
    where
        P: FnMut(&DealRecord) -> bool,
    {
        Self::new(
            self.records
                .iter()
                .filter(|record| predicate(record))
                .cloned()
                .collect(),
        )
    }

    /// Sorted distinct values of a categorical field, absent values dropped.
    #[must_use]
    pub fn distinct_text(&self, field: Field) -> Vec<String> {
        self.records
            .iter()
            .filter_map(|record| record.text(field))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .map(str::to_owned)
            .collect()
    }

    /// Min and max of the present deal values.
    #[must_use]
    pub fn value_bounds(&self) -> Option<(f64, f64)> {
        self.records
            .iter()
            .filter_map(|record| record.number(Field::DealValueUsd))
            .fold(None, |bounds, v| match bounds {
                None => Some((v, v)),
                Some((lo, hi)) => Some((f64::min(lo, v), f64::max(hi, v))),
            })
    }

    #[must_use]
    pub fn metrics(&self) -> Metrics {
        compute_metrics(self)
    }
}

impl FromIterator<DealRecord> for DealTable {
    fn from_iter<I: IntoIterator<Item = DealRecord>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a DealTable {
    type Item = &'a DealRecord;
    type IntoIter = std::slice::Iter<'a, DealRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    pub count: usize,
    pub total_value_usd: f64,
    pub avg_value_usd: f64,
}

impl Metrics {
    /// Average rounded to cents, as shown on the dashboard.
    #[must_use]
    pub fn avg_value_usd_display(&self) -> f64 {
        round_cents(self.avg_value_usd)
    }
}

#[must_use]
pub fn compute_metrics(table: &DealTable) -> Metrics {
    let count = table.len();
    let total_value_usd: f64 = table.iter().map(DealRecord::value_usd_or_zero).sum();
    let avg_value_usd = if count > 0 {
        total_value_usd / count as f64
    } else {
        0.0
    };

    Metrics {
        count,
        total_value_usd,
        avg_value_usd,
    }
}

#[must_use]
pub fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use dt_types::{Field, NullKind, Scalar};

    use super::{DealRecord, DealTable, FrameError, Outcome, compute_metrics, round_cents};

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    fn deal(sport: Option<&str>, value: Option<f64>) -> DealRecord {
        DealRecord {
            sport: sport.map(str::to_owned),
            deal_value_usd: value,
            ..DealRecord::default()
        }
    }

    #[test]
    fn metrics_treat_absent_value_as_zero() {
        let table = DealTable::new(vec![
            deal(Some("Football"), Some(100.0)),
            deal(Some("Football"), None),
        ]);

        let metrics = compute_metrics(&table);
        assert_eq!(metrics.count, 2);
        assert_eq!(metrics.total_value_usd, 100.0);
        assert_eq!(metrics.avg_value_usd, 50.0);
    }

    #[test]
    fn metrics_of_empty_table_are_exactly_zero() {
        let metrics = DealTable::empty().metrics();
        assert_eq!(metrics.count, 0);
        assert_eq!(metrics.total_value_usd, 0.0);
        assert_eq!(metrics.avg_value_usd, 0.0);
        assert!(!metrics.avg_value_usd.is_nan());
    }

    #[test]
    fn average_display_rounds_to_cents() {
        let table = DealTable::new(vec![
            deal(None, Some(10.0)),
            deal(None, Some(10.0)),
            deal(None, Some(0.01)),
        ]);
        let metrics = table.metrics();
        assert_eq!(metrics.avg_value_usd_display(), 6.67);
        assert_eq!(round_cents(2.345_000_1), 2.35);
    }

    #[test]
    fn set_routes_scalars_to_typed_slots() {
        let mut record = DealRecord::default();
        record
            .set(Field::SponsorBrand, Scalar::Utf8("Acme".to_owned()))
            .expect("brand");
        record
            .set(Field::DealValueUsd, Scalar::Float64(12.5))
            .expect("value");
        record
            .set(Field::StartDate, Scalar::Date(ymd(2024, 1, 1)))
            .expect("start");

        assert_eq!(record.text(Field::SponsorBrand), Some("Acme"));
        assert_eq!(record.number(Field::DealValueUsd), Some(12.5));
        assert_eq!(record.date(Field::StartDate), Some(ymd(2024, 1, 1)));

        record
            .set(Field::DealValueUsd, Scalar::Null(NullKind::NaN))
            .expect("clear");
        assert_eq!(record.deal_value_usd, None);
    }

    #[test]
    fn set_rejects_mismatched_dtype() {
        let mut record = DealRecord::default();
        let err = record
            .set(Field::StartDate, Scalar::Utf8("soon".to_owned()))
            .expect_err("string into date slot");
        assert!(matches!(err, FrameError::DTypeMismatch { .. }));
    }

    #[test]
    fn active_requires_both_bounds() {
        let today = ymd(2025, 6, 1);
        let mut record = DealRecord {
            start_date: Some(ymd(2025, 1, 1)),
            end_date: Some(ymd(2025, 6, 1)),
            ..DealRecord::default()
        };
        assert!(record.is_active_on(today));

        record.end_date = None;
        assert!(!record.is_active_on(today));

        record.start_date = None;
        record.end_date = Some(ymd(2030, 1, 1));
        assert!(!record.is_active_on(today));
    }

    #[test]
    fn distinct_text_is_sorted_and_skips_absent() {
        let table = DealTable::new(vec![
            deal(Some("Tennis"), None),
            deal(None, None),
            deal(Some("Football"), None),
            deal(Some("Tennis"), None),
        ]);
        assert_eq!(table.distinct_text(Field::Sport), vec!["Football", "Tennis"]);
    }

    #[test]
    fn value_bounds_ignore_absent_values() {
        let table = DealTable::new(vec![
            deal(None, Some(5.0)),
            deal(None, None),
            deal(None, Some(-1.0)),
        ]);
        assert_eq!(table.value_bounds(), Some((-1.0, 5.0)));
        assert_eq!(DealTable::empty().value_bounds(), None);
    }

    #[test]
    fn outcome_signals_empty_tables() {
        assert_eq!(DealTable::empty().outcome(), Outcome::EmptyResult);
        assert_eq!(
            DealTable::new(vec![DealRecord::default()]).outcome(),
            Outcome::Populated
        );
    }

    #[test]
    fn table_serializes_as_record_array() {
        let table = DealTable::new(vec![deal(Some("Golf"), Some(3.0))]);
        let json = serde_json::to_value(&table).expect("json");
        assert_eq!(json[0]["sport"], "Golf");
        assert_eq!(json[0]["deal_value_usd"], 3.0);
    }
}
