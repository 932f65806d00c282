#![forbid(unsafe_code)]

use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DType {
    Utf8,
    Float64,
    Date,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NullKind {
    Null,
    NaN,
    NaT,
}

/// The twelve columns every deal record carries, in source column order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Property,
    Sport,
    RightsType,
    DealName,
    SponsorBrand,
    SponsorCategory,
    Region,
    Country,
    Currency,
    DealValueUsd,
    StartDate,
    EndDate,
}

impl Field {
    pub const ALL: [Self; 12] = [
        Self::Property,
        Self::Sport,
        Self::RightsType,
        Self::DealName,
        Self::SponsorBrand,
        Self::SponsorCategory,
        Self::Region,
        Self::Country,
        Self::Currency,
        Self::DealValueUsd,
        Self::StartDate,
        Self::EndDate,
    ];

    #[must_use]
    pub const fn column_name(self) -> &'static str {
        match self {
            Self::Property => "property",
            Self::Sport => "sport",
            Self::RightsType => "rights_type",
            Self::DealName => "deal_name",
            Self::SponsorBrand => "sponsor_brand",
            Self::SponsorCategory => "sponsor_category",
            Self::Region => "region",
            Self::Country => "country",
            Self::Currency => "currency",
            Self::DealValueUsd => "deal_value_usd",
            Self::StartDate => "start_date",
            Self::EndDate => "end_date",
        }
    }

    /// Resolve a CSV header to its field. Surrounding whitespace is ignored,
    /// case is not.
    #[must_use]
    pub fn from_column_name(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::ALL
            .into_iter()
            .find(|field| field.column_name() == name)
    }

    #[must_use]
    pub const fn dtype(self) -> DType {
        match self {
            Self::DealValueUsd => DType::Float64,
            Self::StartDate | Self::EndDate => DType::Date,
            _ => DType::Utf8,
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column_name())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Scalar {
    Null(NullKind),
    Float64(f64),
    Date(NaiveDate),
    Utf8(String),
}

impl Scalar {
    /// Reports `Float64` for a `Null(NaN)`, `Date` for `Null(NaT)`; a bare
    /// `Null(Null)` is the absent string.
    #[must_use]
    pub fn dtype(&self) -> DType {
        match self {
            Self::Float64(_) | Self::Null(NullKind::NaN) => DType::Float64,
            Self::Date(_) | Self::Null(NullKind::NaT) => DType::Date,
            Self::Utf8(_) | Self::Null(NullKind::Null) => DType::Utf8,
        }
    }

    #[must_use]
    pub fn is_missing(&self) -> bool {
        match self {
            Self::Null(_) => true,
            Self::Float64(v) => v.is_nan(),
            _ => false,
        }
    }

    #[must_use]
    pub fn missing_for_dtype(dtype: DType) -> Self {
        match dtype {
            DType::Float64 => Self::Null(NullKind::NaN),
            DType::Date => Self::Null(NullKind::NaT),
            DType::Utf8 => Self::Null(NullKind::Null),
        }
    }
}

impl From<Option<String>> for Scalar {
    fn from(value: Option<String>) -> Self {
        value.map_or(Self::Null(NullKind::Null), Self::Utf8)
    }
}

impl From<Option<f64>> for Scalar {
    fn from(value: Option<f64>) -> Self {
        value.map_or(Self::Null(NullKind::NaN), Self::Float64)
    }
}

impl From<Option<NaiveDate>> for Scalar {
    fn from(value: Option<NaiveDate>) -> Self {
        value.map_or(Self::Null(NullKind::NaT), Self::Date)
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null(_) => Ok(()),
            Self::Float64(v) if v.is_nan() => Ok(()),
            Self::Float64(v) => write!(f, "{v}"),
            Self::Date(v) => write!(f, "{}", v.format("%Y-%m-%d")),
            Self::Utf8(v) => f.write_str(v),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum TypeError {
    #[error("value {value:?} is not a number")]
    MalformedFloat { value: String },
    #[error("value {value:?} is not a recognizable date")]
    MalformedDate { value: String },
}

const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y"];
const DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Cell spellings read as absent in every column, matched exactly.
pub const NA_TOKENS: [&str; 19] = [
    "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

#[must_use]
pub fn is_na_token(raw: &str) -> bool {
    NA_TOKENS.contains(&raw)
}

/// String cells are kept verbatim; only NA spellings become absent.
#[must_use]
pub fn coerce_utf8(raw: &str) -> Option<String> {
    (!is_na_token(raw)).then(|| raw.to_owned())
}

/// Parse a deal amount. NaN spellings are absent; infinities are malformed.
pub fn coerce_float(raw: &str) -> Result<Option<f64>, TypeError> {
    let trimmed = raw.trim();
    if is_na_token(trimmed) {
        return Ok(None);
    }

    match trimmed.parse::<f64>() {
        Ok(value) if value.is_nan() => Ok(None),
        Ok(value) if value.is_finite() => Ok(Some(value)),
        _ => Err(TypeError::MalformedFloat {
            value: trimmed.to_owned(),
        }),
    }
}

/// Parse a calendar date. Timestamps are accepted and truncated to their
/// date component.
pub fn coerce_date(raw: &str) -> Result<Option<NaiveDate>, TypeError> {
    let trimmed = raw.trim();
    if is_na_token(trimmed) || trimmed == "NaT" {
        return Ok(None);
    }

    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, format) {
            return Ok(Some(date));
        }
    }
    for format in DATETIME_FORMATS {
        if let Ok(stamp) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Ok(Some(stamp.date()));
        }
    }
    if let Ok(stamp) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(Some(stamp.date_naive()));
    }

    Err(TypeError::MalformedDate {
        value: trimmed.to_owned(),
    })
}

pub fn coerce_field(field: Field, raw: &str) -> Result<Scalar, TypeError> {
    Ok(match field.dtype() {
        DType::Utf8 => Scalar::from(coerce_utf8(raw)),
        DType::Float64 => Scalar::from(coerce_float(raw)?),
        DType::Date => Scalar::from(coerce_date(raw)?),
    })
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::{
        DType, Field, NullKind, Scalar, TypeError, coerce_date, coerce_field, coerce_float,
        coerce_utf8,
    };

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    #[test]
    fn column_names_round_trip_through_field_lookup() {
        for field in Field::ALL {
            assert_eq!(Field::from_column_name(field.column_name()), Some(field));
        }
        assert_eq!(Field::from_column_name(" sport "), Some(Field::Sport));
        assert_eq!(Field::from_column_name("Sport"), None);
    }

    #[test]
    fn declared_dtypes_match_column_semantics() {
        assert_eq!(Field::DealValueUsd.dtype(), DType::Float64);
        assert_eq!(Field::StartDate.dtype(), DType::Date);
        assert_eq!(Field::EndDate.dtype(), DType::Date);
        assert_eq!(Field::SponsorBrand.dtype(), DType::Utf8);
    }

    #[test]
    fn float_coercion_treats_blank_and_nan_as_absent() {
        assert_eq!(coerce_float("  ").expect("blank"), None);
        assert_eq!(coerce_float("NaN").expect("nan"), None);
        assert_eq!(coerce_float(" 1.5e6 ").expect("exp"), Some(1_500_000.0));
        assert_eq!(coerce_float("-20").expect("neg"), Some(-20.0));
    }

    #[test]
    fn float_coercion_reports_malformed_values() {
        let err = coerce_float("1,000").expect_err("thousands separator is not numeric");
        assert_eq!(
            err,
            TypeError::MalformedFloat {
                value: "1,000".to_owned()
            }
        );
    }

    #[test]
    fn float_coercion_rejects_infinities() {
        for raw in ["inf", "-inf", "Infinity", "1e400"] {
            assert!(
                matches!(coerce_float(raw), Err(TypeError::MalformedFloat { .. })),
                "{raw}"
            );
        }
    }

    #[test]
    fn date_coercion_accepts_common_layouts() {
        let expected = Some(ymd(2024, 3, 9));
        for raw in [
            "2024-03-09",
            "2024/03/09",
            "03/09/2024",
            "2024-03-09T18:30:00",
            "2024-03-09 18:30:00.250",
            "2024-03-09T18:30:00+02:00",
        ] {
            assert_eq!(coerce_date(raw).expect(raw), expected, "{raw}");
        }
        assert_eq!(coerce_date("").expect("blank"), None);
    }

    #[test]
    fn date_coercion_rejects_impossible_dates() {
        assert!(matches!(
            coerce_date("2024-02-30"),
            Err(TypeError::MalformedDate { .. })
        ));
        assert!(matches!(
            coerce_date("next tuesday"),
            Err(TypeError::MalformedDate { .. })
        ));
    }

    #[test]
    fn utf8_coercion_keeps_text_verbatim() {
        assert_eq!(coerce_utf8("Nike "), Some("Nike ".to_owned()));
        assert_eq!(coerce_utf8(" "), Some(" ".to_owned()));
        assert_eq!(coerce_utf8(""), None);
    }

    #[test]
    fn na_spellings_are_absent_in_every_column() {
        for raw in ["NA", "N/A", "null", "None", "nan", "NULL", "<NA>"] {
            assert_eq!(coerce_utf8(raw), None, "{raw}");
            assert_eq!(coerce_float(raw).expect(raw), None, "{raw}");
            assert_eq!(coerce_date(raw).expect(raw), None, "{raw}");
        }
        assert_eq!(coerce_utf8("na"), Some("na".to_owned()));
    }

    #[test]
    fn coerce_field_uses_typed_missing_markers() {
        assert_eq!(
            coerce_field(Field::DealValueUsd, "").expect("blank"),
            Scalar::Null(NullKind::NaN)
        );
        assert_eq!(
            coerce_field(Field::EndDate, "").expect("blank"),
            Scalar::Null(NullKind::NaT)
        );
        assert_eq!(
            coerce_field(Field::Region, "EMEA").expect("region"),
            Scalar::Utf8("EMEA".to_owned())
        );
    }

    #[test]
    fn scalar_serializes_with_kind_tag() {
        let json = serde_json::to_string(&Scalar::Date(ymd(2025, 1, 2))).expect("json");
        assert_eq!(json, r#"{"kind":"date","value":"2025-01-02"}"#);
    }
}
