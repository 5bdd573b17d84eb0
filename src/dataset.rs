//! In-memory record table backing every KPI computation.

use chrono::NaiveDate;

use crate::{
    data::Value,
    schema::{ColumnType, Schema},
};

pub type Row = Vec<Option<Value>>;

/// Typed rows plus the schema they were parsed against.
///
/// Rows always hold exactly one cell per schema column; a missing cell is
/// `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordTable {
    schema: Schema,
    rows: Vec<Row>,
}

impl RecordTable {
    pub fn new(schema: Schema, rows: Vec<Row>) -> Self {
        let width = schema.columns.len();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, None);
                row
            })
            .collect();
        Self { schema, rows }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Numeric cells of `name`, or `None` when it is not a `Number` column.
    pub fn numbers(&self, name: &str) -> Option<Vec<Option<f64>>> {
        let idx = self.schema.typed_index(name, ColumnType::Number)?;
        Some(
            self.rows
                .iter()
                .map(|row| row[idx].as_ref().and_then(Value::as_number))
                .collect(),
        )
    }

    /// Date cells of `name`, or `None` when it is not a `Date` column.
    pub fn dates(&self, name: &str) -> Option<Vec<Option<NaiveDate>>> {
        let idx = self.schema.typed_index(name, ColumnType::Date)?;
        Some(
            self.rows
                .iter()
                .map(|row| row[idx].as_ref().and_then(Value::as_date))
                .collect(),
        )
    }

    /// Display form of every cell in `name`, usable as a grouping key.
    pub fn keys(&self, name: &str) -> Option<Vec<Option<String>>> {
        let idx = self.schema.column_index(name)?;
        Some(
            self.rows
                .iter()
                .map(|row| row[idx].as_ref().map(Value::as_display))
                .collect(),
        )
    }

    /// Returns a new table holding the rows for which `keep` is true.
    pub fn retain_rows<F>(&self, mut keep: F) -> RecordTable
    where
        F: FnMut(&Row) -> bool,
    {
        RecordTable {
            schema: self.schema.clone(),
            rows: self.rows.iter().filter(|row| keep(row)).cloned().collect(),
        }
    }
}
