//! Tabular data handed to and returned by the engine.
//!
//! Tables are column-major: every [`Column`] owns its cells, and all columns of
//! a table have the same length. A column may carry a physical [`Dtype`]; raw
//! extracts usually do not, a previously normalized table always does.

use crate::{Dtype, TableError};
use chrono::NaiveDateTime;

/// A single cell.
#[derive(Debug, Clone, PartialEq)]
pub enum DataValue {
    /// Missing-value marker
    Null,
    /// Text value
    String(String),
    /// Integer value
    Int(i64),
    /// Floating point value
    Float(f64),
    /// Timestamp value
    Datetime(NaiveDateTime),
}

impl DataValue {
    /// Returns true if this value is the missing-value marker.
    pub fn is_null(&self) -> bool {
        matches!(self, DataValue::Null)
    }

    /// Returns the type name of this value.
    pub fn type_name(&self) -> &'static str {
        match self {
            DataValue::Null => "null",
            DataValue::String(_) => "string",
            DataValue::Int(_) => "int64",
            DataValue::Float(_) => "float64",
            DataValue::Datetime(_) => "datetime64",
        }
    }

    /// Attempts to get this value as a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            DataValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Attempts to get this value as an integer.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            DataValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Attempts to get this value as a float. Integers widen.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            DataValue::Float(f) => Some(*f),
            DataValue::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Attempts to get this value as a timestamp.
    pub fn as_datetime(&self) -> Option<NaiveDateTime> {
        match self {
            DataValue::Datetime(dt) => Some(*dt),
            _ => None,
        }
    }

    /// Text rendering used by pattern rules and report details.
    pub fn render(&self) -> Option<String> {
        match self {
            DataValue::Null => None,
            DataValue::String(s) => Some(s.clone()),
            DataValue::Int(i) => Some(i.to_string()),
            DataValue::Float(f) => Some(f.to_string()),
            DataValue::Datetime(dt) => Some(dt.format("%Y-%m-%dT%H:%M:%S%.f").to_string()),
        }
    }

    /// Returns true if the value already has the representation of `dtype`.
    pub fn conforms_to(&self, dtype: Dtype) -> bool {
        matches!(
            (self, dtype),
            (DataValue::Null, _)
                | (DataValue::String(_), Dtype::String)
                | (DataValue::Int(_), Dtype::Int64)
                | (DataValue::Float(_), Dtype::Float64)
                | (DataValue::Datetime(_), Dtype::Datetime64)
        )
    }
}

impl From<String> for DataValue {
    fn from(s: String) -> Self {
        DataValue::String(s)
    }
}

impl From<&str> for DataValue {
    fn from(s: &str) -> Self {
        DataValue::String(s.to_string())
    }
}

impl From<i64> for DataValue {
    fn from(i: i64) -> Self {
        DataValue::Int(i)
    }
}

impl From<f64> for DataValue {
    fn from(f: f64) -> Self {
        DataValue::Float(f)
    }
}

impl From<NaiveDateTime> for DataValue {
    fn from(dt: NaiveDateTime) -> Self {
        DataValue::Datetime(dt)
    }
}

impl<T: Into<DataValue>> From<Option<T>> for DataValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(DataValue::Null, Into::into)
    }
}

/// A named column of cells.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    /// Column name as it appears in the table
    pub name: String,

    /// Physical type, `None` for untyped source extracts
    pub dtype: Option<Dtype>,

    /// Cell values, one per row
    pub values: Vec<DataValue>,
}

impl Column {
    /// Creates an untyped column, as delivered by an extraction runner.
    pub fn untyped<V>(name: impl Into<String>, values: impl IntoIterator<Item = V>) -> Self
    where
        V: Into<DataValue>,
    {
        Self {
            name: name.into(),
            dtype: None,
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// Creates a column that already carries a physical type.
    pub fn typed<V>(
        name: impl Into<String>,
        dtype: Dtype,
        values: impl IntoIterator<Item = V>,
    ) -> Self
    where
        V: Into<DataValue>,
    {
        Self {
            name: name.into(),
            dtype: Some(dtype),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// Returns the number of cells.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if the column has no cells.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Row indices holding the missing-value marker.
    pub fn null_rows(&self) -> Vec<usize> {
        self.values
            .iter()
            .enumerate()
            .filter_map(|(row, v)| v.is_null().then_some(row))
            .collect()
    }
}

fn check_lengths(columns: &[Column]) -> Result<usize, TableError> {
    let rows = columns.first().map_or(0, Column::len);
    if let Some(column) = columns.iter().find(|c| c.len() != rows) {
        return Err(TableError::RaggedColumns {
            column: column.name.clone(),
            expected: rows,
            actual: column.len(),
        });
    }
    Ok(rows)
}

/// An untrusted extract from a source system.
///
/// Column names are kept exactly as delivered: duplicates, mixed case and
/// stray whitespace are all preserved for the alias resolver to deal with.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    columns: Vec<Column>,
    rows: usize,
}

impl RawTable {
    /// Creates a table, rejecting columns of unequal length.
    pub fn new(columns: Vec<Column>) -> Result<Self, TableError> {
        let rows = check_lengths(&columns)?;
        Ok(Self { columns, rows })
    }

    /// Creates an untyped table from a header and row-major records.
    pub fn from_rows<H, R, V>(headers: &[H], rows: R) -> Result<Self, TableError>
    where
        H: AsRef<str>,
        R: IntoIterator<Item = Vec<V>>,
        V: Into<DataValue>,
    {
        let mut columns: Vec<Column> = headers
            .iter()
            .map(|h| Column::untyped(h.as_ref(), Vec::<DataValue>::new()))
            .collect();

        for (row_idx, record) in rows.into_iter().enumerate() {
            if record.len() != columns.len() {
                return Err(TableError::RecordWidth {
                    row: row_idx,
                    expected: columns.len(),
                    actual: record.len(),
                });
            }
            for (column, value) in columns.iter_mut().zip(record) {
                column.values.push(value.into());
            }
        }

        Self::new(columns)
    }

    /// Returns the number of rows.
    pub fn row_count(&self) -> usize {
        self.rows
    }

    /// Returns the columns in table order.
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Consumes the table, returning its columns.
    pub fn into_columns(self) -> Vec<Column> {
        self.columns
    }

    /// Column names in table order, duplicates included.
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Returns the first column with exactly this name.
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }
}

/// The engine's output: canonical columns first, retained unknown columns after.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedTable {
    columns: Vec<Column>,
    rows: usize,
}

impl NormalizedTable {
    /// Assembles a normalized table, rejecting columns of unequal length.
    pub fn from_columns(columns: Vec<Column>) -> Result<Self, TableError> {
        let rows = check_lengths(&columns)?;
        Ok(Self { columns, rows })
    }

    /// Returns the number of rows.
    pub fn row_count(&self) -> usize {
        self.rows
    }

    /// Returns the columns in output order.
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Column names in output order.
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Returns the column with this name.
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Returns a single cell.
    pub fn value(&self, column: &str, row: usize) -> Option<&DataValue> {
        self.column(column).and_then(|c| c.values.get(row))
    }

    /// Returns one row across all columns, in output order.
    pub fn row(&self, row: usize) -> Option<Vec<&DataValue>> {
        if row >= self.rows {
            return None;
        }
        Some(self.columns.iter().map(|c| &c.values[row]).collect())
    }
}

impl From<NormalizedTable> for RawTable {
    fn from(table: NormalizedTable) -> Self {
        RawTable {
            columns: table.columns,
            rows: table.rows,
        }
    }
}
