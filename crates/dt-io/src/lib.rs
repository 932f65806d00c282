#![forbid(unsafe_code)]

use std::path::Path;

use csv::{ReaderBuilder, WriterBuilder};
use dt_frame::{DealRecord, DealTable, FrameError};
use dt_types::{Field, Scalar, coerce_field};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IoError {
    #[error("csv input has no headers")]
    MissingHeaders,
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Utf8(#[from] std::string::FromUtf8Error),
    #[error(transparent)]
    Frame(#[from] FrameError),
}

/// A cell whose raw text could not be coerced to its column type. The cell
/// was loaded as absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoercionIssue {
    pub row: usize,
    pub field: Field,
    pub raw: String,
}

/// Anomalies recovered while loading. None of them fail the load.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadReport {
    pub row_count: usize,
    pub synthesized_columns: Vec<Field>,
    pub ignored_columns: Vec<String>,
    pub coercion_issues: Vec<CoercionIssue>,
}

impl LoadReport {
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.synthesized_columns.is_empty()
            && self.ignored_columns.is_empty()
            && self.coercion_issues.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoadedTable {
    pub table: DealTable,
    pub report: LoadReport,
}

pub fn read_csv_str(input: &str) -> Result<LoadedTable, IoError> {
    read_csv_bytes(input.as_bytes())
}

pub fn read_csv_path(path: impl AsRef<Path>) -> Result<LoadedTable, IoError> {
    let bytes = std::fs::read(path.as_ref())?;
    read_csv_bytes(&bytes)
}

pub fn read_csv_bytes(input: &[u8]) -> Result<LoadedTable, IoError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(input);

    let headers = reader.headers().cloned().map_err(IoError::from)?;
    if headers.is_empty() {
        return Err(IoError::MissingHeaders);
    }

    let mut report = LoadReport::default();
    let mut layout = Vec::<(usize, Field)>::new();
    for (idx, header) in headers.iter().enumerate() {
        match Field::from_column_name(header) {
            Some(field) if !layout.iter().any(|(_, seen)| *seen == field) => {
                layout.push((idx, field));
            }
            _ => report.ignored_columns.push(header.to_owned()),
        }
    }
    report.synthesized_columns = Field::ALL
        .into_iter()
        .filter(|field| !layout.iter().any(|(_, seen)| seen == field))
        .collect();

    let mut records = Vec::new();
    for (row, result) in reader.records().enumerate() {
        let raw_record = result?;
        let mut record = DealRecord::default();
        for &(idx, field) in &layout {
            let raw = raw_record.get(idx).unwrap_or_default();
            let value = match coerce_field(field, raw) {
                Ok(value) => value,
                Err(_) => {
                    report.coercion_issues.push(CoercionIssue {
                        row,
                        field,
                        raw: raw.to_owned(),
                    });
                    Scalar::missing_for_dtype(field.dtype())
                }
            };
            record.set(field, value)?;
        }
        records.push(record);
    }
    report.row_count = records.len();

    #[cfg(feature = "tracing")]
    log_report(&report);

    Ok(LoadedTable {
        table: DealTable::new(records),
        report,
    })
}

#[cfg(feature = "tracing")]
fn log_report(report: &LoadReport) {
    tracing::debug!(
        rows = report.row_count,
        synthesized = report.synthesized_columns.len(),
        ignored = report.ignored_columns.len(),
        "loaded deal table"
    );
    for field in &report.synthesized_columns {
        tracing::warn!(column = %field, "column missing from source, filled with absent values");
    }
    for issue in &report.coercion_issues {
        tracing::warn!(
            row = issue.row,
            column = %issue.field,
            raw = %issue.raw,
            "malformed value coerced to absent"
        );
    }
}

pub fn write_csv_string(table: &DealTable) -> Result<String, IoError> {
    let bytes = write_csv_bytes(table)?;
    Ok(String::from_utf8(bytes)?)
}

pub fn write_csv_path(table: &DealTable, path: impl AsRef<Path>) -> Result<(), IoError> {
    let bytes = write_csv_bytes(table)?;
    std::fs::write(path.as_ref(), bytes)?;
    Ok(())
}

fn write_csv_bytes(table: &DealTable) -> Result<Vec<u8>, IoError> {
    let mut writer = WriterBuilder::new().from_writer(Vec::new());
    writer.write_record(Field::ALL.iter().map(|field| field.column_name()))?;

    for record in table {
        let row = Field::ALL
            .iter()
            .map(|&field| record.value(field).to_string())
            .collect::<Vec<_>>();
        writer.write_record(&row)?;
    }

    writer.into_inner().map_err(|err| err.into_error().into())
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use chrono::NaiveDate;
    use dt_types::Field;

    use super::{IoError, read_csv_path, read_csv_str, write_csv_string};

    const SAMPLE: &str = "\
property,sport,rights_type,deal_name,sponsor_brand,sponsor_category,region,country,currency,deal_value_usd,start_date,end_date
Premier League,Football,Shirt,Front of shirt,Acme,Beverage,EMEA,UK,GBP,1500000,2024-07-01,2027-06-30
US Open,Tennis,Naming,Court naming,Bolt,Apparel,Americas,US,USD,,2023-01-01,not-a-date
";

    #[test]
    fn full_schema_loads_cleanly_with_typed_values() {
        let loaded = read_csv_str(SAMPLE).expect("read");
        assert_eq!(loaded.table.len(), 2);
        assert!(loaded.report.synthesized_columns.is_empty());

        let first = &loaded.table.records()[0];
        assert_eq!(first.sport.as_deref(), Some("Football"));
        assert_eq!(first.deal_value_usd, Some(1_500_000.0));
        assert_eq!(first.start_date, NaiveDate::from_ymd_opt(2024, 7, 1));

        let second = &loaded.table.records()[1];
        assert_eq!(second.deal_value_usd, None);
        assert_eq!(second.end_date, None);
    }

    #[test]
    fn malformed_cells_become_absent_and_are_reported() {
        let loaded = read_csv_str(SAMPLE).expect("read");
        assert_eq!(loaded.report.coercion_issues.len(), 1);
        let issue = &loaded.report.coercion_issues[0];
        assert_eq!(issue.row, 1);
        assert_eq!(issue.field, Field::EndDate);
        assert_eq!(issue.raw, "not-a-date");
    }

    #[test]
    fn missing_columns_are_synthesized_as_absent() {
        let loaded = read_csv_str("sport,deal_value_usd,notes\nGolf,abc,hello\n").expect("read");
        assert_eq!(loaded.table.len(), 1);
        assert_eq!(loaded.report.synthesized_columns.len(), 10);
        assert!(loaded.report.synthesized_columns.contains(&Field::Region));
        assert_eq!(loaded.report.ignored_columns, vec!["notes".to_owned()]);

        let record = &loaded.table.records()[0];
        assert_eq!(record.sport.as_deref(), Some("Golf"));
        assert_eq!(record.region, None);
        assert_eq!(record.deal_value_usd, None);
        assert_eq!(loaded.report.coercion_issues[0].field, Field::DealValueUsd);
    }

    #[test]
    fn ragged_rows_are_padded_with_absent_values() {
        let loaded = read_csv_str("sport,region,deal_value_usd\nRugby\n").expect("read");
        let record = &loaded.table.records()[0];
        assert_eq!(record.sport.as_deref(), Some("Rugby"));
        assert_eq!(record.region, None);
        assert!(loaded.report.coercion_issues.is_empty());
    }

    #[test]
    fn text_cells_load_verbatim_and_na_spellings_are_absent() {
        let loaded = read_csv_str("sponsor_brand,region,deal_value_usd\nNike ,N/A,NA\n , null,inf\n")
            .expect("read");
        let first = &loaded.table.records()[0];
        assert_eq!(first.sponsor_brand.as_deref(), Some("Nike "));
        assert_eq!(first.region, None);
        assert_eq!(first.deal_value_usd, None);

        let second = &loaded.table.records()[1];
        assert_eq!(second.sponsor_brand.as_deref(), Some(" "));
        assert_eq!(second.region.as_deref(), Some(" null"));
        assert_eq!(second.deal_value_usd, None);
        assert_eq!(loaded.report.coercion_issues.len(), 1);
        assert_eq!(loaded.report.coercion_issues[0].raw, "inf");
    }

    #[test]
    fn empty_input_has_no_headers() {
        let err = read_csv_str("").expect_err("no header row");
        assert!(matches!(err, IoError::MissingHeaders));
    }

    #[test]
    fn header_only_input_yields_empty_table() {
        let loaded = read_csv_str("sport,region\n").expect("read");
        assert!(loaded.table.is_empty());
        assert_eq!(loaded.report.row_count, 0);
    }

    #[test]
    fn export_writes_every_column_in_schema_order() {
        let loaded = read_csv_str("deal_value_usd,sport\n12.5,Cricket\n").expect("read");
        let out = write_csv_string(&loaded.table).expect("write");
        let mut lines = out.lines();
        assert_eq!(
            lines.next(),
            Some(
                "property,sport,rights_type,deal_name,sponsor_brand,sponsor_category,region,country,currency,deal_value_usd,start_date,end_date"
            )
        );
        assert_eq!(lines.next(), Some(",Cricket,,,,,,,,12.5,,"));
    }

    #[test]
    fn path_loader_reads_from_disk() {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        file.write_all(SAMPLE.as_bytes()).expect("write sample");

        let loaded = read_csv_path(file.path()).expect("read path");
        assert_eq!(loaded.table.len(), 2);
    }
}
