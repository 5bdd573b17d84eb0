//! Dataset loading and validation.
//!
//! [`load_dataset`] turns raw spreadsheet bytes into a [`RecordTable`]:
//!
//! 1. decode the header and every record with the configured encoding,
//! 2. reject files without data rows ([`LoadError::EmptyDataset`]),
//! 3. reject overrides that retype expected columns, resolve the [`Schema`]
//!    and warn about missing expected columns,
//! 4. parse each cell against its declared type,
//! 5. enforce the sales invariants (non-negative amounts, readable dates).
//!
//! Cell-level parse failures are held back until the invariants have been
//! checked so that a negative amount is always reported as such.

use anyhow::{Context, Result, anyhow};
use encoding_rs::{Encoding, UTF_8};
use log::{debug, info, warn};

use crate::{
    data::parse_typed_value,
    dataset::{RecordTable, Row},
    error::{LoadError, LoadWarning},
    io_utils,
    schema::{SALE_DATE, SALES_AMOUNT, Schema},
};

#[derive(Debug, Clone)]
pub struct LoadOptions {
    pub delimiter: u8,
    pub encoding: &'static Encoding,
    pub schema_overrides: Option<Schema>,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            delimiter: io_utils::DEFAULT_CSV_DELIMITER,
            encoding: UTF_8,
            schema_overrides: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoadedDataset {
    pub table: RecordTable,
    pub warnings: Vec<LoadWarning>,
}

impl LoadedDataset {
    pub fn missing_columns(&self) -> &[String] {
        self.warnings
            .iter()
            .map(|warning| match warning {
                LoadWarning::PartialSchema { missing } => missing.as_slice(),
            })
            .next()
            .unwrap_or(&[])
    }
}

pub fn load_dataset(bytes: &[u8], options: &LoadOptions) -> Result<LoadedDataset, LoadError> {
    let (headers, raw_rows) = read_raw_rows(bytes, options)?;
    if raw_rows.is_empty() {
        return Err(LoadError::EmptyDataset);
    }

    if let Some(overrides) = &options.schema_overrides {
        overrides.validate_overrides()?;
    }
    let schema = Schema::resolve(&headers, &raw_rows, options.schema_overrides.as_ref());
    for column in &schema.columns {
        debug!("Column '{}' resolved as {}", column.name, column.datatype);
    }

    let mut warnings = Vec::new();
    let missing = schema.missing_expected_columns();
    if !missing.is_empty() {
        let warning = LoadWarning::PartialSchema { missing };
        warn!("{warning}");
        warnings.push(warning);
    }

    let (rows, deferred_error) = parse_rows(&schema, &raw_rows);
    let table = RecordTable::new(schema, rows);

    check_amounts(&table)?;
    check_dates(&table)?;
    if let Some(err) = deferred_error {
        return Err(err.into());
    }

    info!(
        "Loaded {} row(s) across {} column(s)",
        table.len(),
        table.schema().columns.len()
    );
    Ok(LoadedDataset { table, warnings })
}

fn read_raw_rows(bytes: &[u8], options: &LoadOptions) -> Result<(Vec<String>, Vec<Vec<String>>)> {
    let mut reader = io_utils::open_csv_reader(bytes, options.delimiter);
    let headers = io_utils::reader_headers(&mut reader, options.encoding)
        .context("Reading header row")?;
    if let Some(duplicate) = first_duplicate(&headers) {
        return Err(anyhow!("Duplicate column '{duplicate}' in header row"));
    }

    let mut rows = Vec::new();
    for (row_idx, record) in reader.byte_records().enumerate() {
        let record = record.with_context(|| format!("Reading row {}", row_idx + 2))?;
        let decoded = io_utils::decode_record(&record, options.encoding)
            .with_context(|| format!("Decoding row {}", row_idx + 2))?;
        rows.push(decoded);
    }
    Ok((headers, rows))
}

fn first_duplicate(headers: &[String]) -> Option<&str> {
    headers
        .iter()
        .enumerate()
        .find(|(idx, header)| headers[..*idx].contains(header))
        .map(|(_, header)| header.as_str())
}

/// Parses every cell; failing cells become missing and the first failure is
/// returned alongside the rows.
fn parse_rows(schema: &Schema, raw_rows: &[Vec<String>]) -> (Vec<Row>, Option<anyhow::Error>) {
    let mut first_error = None;
    let rows = raw_rows
        .iter()
        .enumerate()
        .map(|(row_idx, raw)| {
            schema
                .columns
                .iter()
                .enumerate()
                .map(|(idx, column)| {
                    let value = raw.get(idx).map(|s| s.as_str()).unwrap_or("");
                    match parse_typed_value(value, &column.datatype) {
                        Ok(parsed) => parsed,
                        Err(err) => {
                            if first_error.is_none() {
                                first_error = Some(err.context(format!(
                                    "Row {} column '{}'",
                                    row_idx + 2,
                                    column.name
                                )));
                            }
                            None
                        }
                    }
                })
                .collect()
        })
        .collect();
    (rows, first_error)
}

fn check_amounts(table: &RecordTable) -> Result<(), LoadError> {
    let Some(amounts) = table.numbers(SALES_AMOUNT) else {
        return Ok(());
    };
    let negatives = amounts
        .iter()
        .enumerate()
        .filter(|(_, amount)| amount.is_some_and(|value| value < 0.0))
        .map(|(idx, _)| idx + 1)
        .collect::<Vec<_>>();
    match negatives.first() {
        Some(&first_row) => Err(LoadError::NegativeAmounts {
            column: SALES_AMOUNT.to_string(),
            count: negatives.len(),
            first_row,
        }),
        None => Ok(()),
    }
}

fn check_dates(table: &RecordTable) -> Result<(), LoadError> {
    let Some(dates) = table.dates(SALE_DATE) else {
        return Ok(());
    };
    let parsed = dates.iter().filter(|date| date.is_some()).count();
    if parsed == 0 {
        return Err(LoadError::InvalidDates {
            column: SALE_DATE.to_string(),
        });
    }
    if parsed < dates.len() {
        warn!(
            "{} value(s) in '{SALE_DATE}' could not be read as dates and are treated as missing",
            dates.len() - parsed
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{data::Value, schema::ColumnType};
    use chrono::NaiveDate;

    fn load(data: &str) -> Result<LoadedDataset, LoadError> {
        load_dataset(data.as_bytes(), &LoadOptions::default())
    }

    #[test]
    fn header_only_file_is_empty_dataset() {
        let err = load("Sale_Date,Sales_Amount\n").unwrap_err();
        assert!(matches!(err, LoadError::EmptyDataset));
        let err = load("").unwrap_err();
        assert!(matches!(err, LoadError::EmptyDataset));
    }

    #[test]
    fn partial_schema_is_a_warning() {
        let loaded = load("Sales_Amount,Product_Category\n10,A\n").unwrap();
        assert_eq!(loaded.table.len(), 1);
        assert!(loaded.missing_columns().contains(&"Sale_Date".to_string()));
        assert!(!loaded.missing_columns().contains(&"Sales_Amount".to_string()));
    }

    #[test]
    fn unparseable_dates_become_missing() {
        let loaded = load("Sale_Date,Sales_Amount\n2024-01-05,10\nnot a date,5\n").unwrap();
        let dates = loaded.table.dates(SALE_DATE).unwrap();
        assert_eq!(
            dates,
            vec![Some(NaiveDate::from_ymd_opt(2024, 1, 5).unwrap()), None]
        );
    }

    #[test]
    fn all_unparseable_dates_fail() {
        let err = load("Sale_Date,Sales_Amount\nsoon,10\nlater,5\n").unwrap_err();
        assert!(matches!(err, LoadError::InvalidDates { .. }));
    }

    #[test]
    fn negative_amounts_fail_even_with_other_parse_errors() {
        let err = load("Sales_Amount,Unit_Cost\n10,abc\n-3,2\n-1,1\n").unwrap_err();
        match err {
            LoadError::NegativeAmounts {
                count, first_row, ..
            } => {
                assert_eq!(count, 2);
                assert_eq!(first_row, 2);
            }
            other => panic!("expected NegativeAmounts, got {other:?}"),
        }
    }

    #[test]
    fn bad_number_is_wrapped_load_error() {
        let err = load("Sales_Amount,Unit_Cost\n10,abc\n").unwrap_err();
        assert!(matches!(err, LoadError::Load(_)));
        assert!(err.to_string().starts_with("Failed to load dataset"));
    }

    #[test]
    fn ragged_rows_are_load_errors() {
        let err = load("Sales_Amount,Unit_Cost\n10\n").unwrap_err();
        assert!(matches!(err, LoadError::Load(_)));
    }

    #[test]
    fn duplicate_headers_are_load_errors() {
        let err = load("Sales_Amount,Sales_Amount\n1,2\n").unwrap_err();
        assert!(matches!(err, LoadError::Load(_)));
    }

    fn retype(column: &str, datatype: ColumnType) -> LoadOptions {
        LoadOptions {
            schema_overrides: Some(Schema {
                columns: vec![crate::schema::ColumnMeta {
                    name: column.into(),
                    datatype,
                }],
            }),
            ..LoadOptions::default()
        }
    }

    #[test]
    fn text_override_on_sales_amount_is_rejected() {
        let options = retype(SALES_AMOUNT, ColumnType::Text);
        let err = load_dataset(b"Sales_Amount,Product_Category\n-5,A\n10,B\n", &options)
            .unwrap_err();
        assert!(matches!(err, LoadError::Load(_)));
        assert!(err.to_string().contains("'Sales_Amount' as Text"));
    }

    #[test]
    fn text_override_on_sale_date_is_rejected() {
        let options = retype(SALE_DATE, ColumnType::Text);
        let err = load_dataset(b"Sale_Date,Sales_Amount\nsoon,5\nlater,10\n", &options)
            .unwrap_err();
        assert!(matches!(err, LoadError::Load(_)));
        assert!(err.to_string().contains("'Sale_Date' as Text"));
    }

    #[test]
    fn matching_override_on_expected_column_still_validates() {
        let options = retype(SALES_AMOUNT, ColumnType::Number);
        let err = load_dataset(b"Sales_Amount\n-5\n", &options).unwrap_err();
        assert!(matches!(err, LoadError::NegativeAmounts { .. }));
    }

    #[test]
    fn semicolon_delimited_input_with_overrides() {
        let options = LoadOptions {
            delimiter: b';',
            schema_overrides: Some(Schema {
                columns: vec![crate::schema::ColumnMeta {
                    name: "Store".into(),
                    datatype: ColumnType::Text,
                }],
            }),
            ..LoadOptions::default()
        };
        let loaded = load_dataset(b"Store;Sales_Amount\n001;12.5\n", &options).unwrap();
        assert_eq!(
            loaded.table.rows()[0],
            vec![
                Some(Value::Text("001".into())),
                Some(Value::Number(12.5))
            ]
        );
    }
}
