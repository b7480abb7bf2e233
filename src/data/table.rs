//! Row-oriented access to raw tabular input
//!
//! The engine never owns a storage backend. It reads from anything that
//! implements [RawTable]: a fixed column schema plus a single-use, in-order
//! sequence of [RawRow]s. Two sources ship with the crate, the in-memory
//! [Table] defined here and the CSV-backed
//! [CsvTable](crate::data::parser::CsvTable).
//!
//! # Example
//!
//! ```rust
//! use pkingest::data::{Cell, RawTable, Table};
//!
//! let table = Table::from_rows(
//!     &["id", "time", "amt", "dv"],
//!     vec![
//!         vec![1.into(), 0.0.into(), 100.0.into(), Cell::Missing],
//!         vec![1.into(), 2.0.into(), Cell::Missing, 12.5.into()],
//!     ],
//! );
//! assert_eq!(table.columns().len(), 4);
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

/// A single cell of the raw table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub enum Cell {
    /// A value already typed as a number by the source
    Number(f64),
    /// A textual value, possibly numeric after parsing
    Text(String),
    /// The source's missing-value marker
    #[default]
    Missing,
}

impl Cell {
    /// Whether this cell carries the missing marker
    ///
    /// A `Number(NaN)` and blank text count as missing.
    pub fn is_missing(&self) -> bool {
        match self {
            Cell::Missing => true,
            Cell::Number(value) => value.is_nan(),
            Cell::Text(text) => text.trim().is_empty(),
        }
    }

    /// Interpret the cell as a finite number
    ///
    /// Returns `Ok(None)` for the missing marker and `Err(token)` with the
    /// trimmed text for anything that does not parse as a finite number.
    pub fn as_number(&self) -> Result<Option<f64>, &str> {
        match self {
            _ if self.is_missing() => Ok(None),
            Cell::Missing => Ok(None),
            Cell::Number(value) if value.is_finite() => Ok(Some(*value)),
            Cell::Number(_) => Err("inf"),
            Cell::Text(text) => {
                let trimmed = text.trim();
                match trimmed.parse::<f64>() {
                    Ok(value) if value.is_finite() => Ok(Some(value)),
                    _ => Err(trimmed),
                }
            }
        }
    }

    /// Render the cell as a trimmed label, `None` when missing
    ///
    /// Integral numbers are rendered without a fractional part, so a numeric
    /// identifier `1.0` and a textual identifier `"1"` give the same label.
    pub fn as_label(&self) -> Option<String> {
        match self {
            _ if self.is_missing() => None,
            Cell::Number(value) => Some(format_number(*value)),
            Cell::Text(text) => Some(text.trim().to_string()),
            Cell::Missing => None,
        }
    }
}

pub(crate) fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Cell::Number(value) => write!(f, "{}", format_number(*value)),
            Cell::Text(text) => write!(f, "{}", text),
            Cell::Missing => write!(f, "<missing>"),
        }
    }
}

impl From<f64> for Cell {
    fn from(value: f64) -> Self {
        Cell::Number(value)
    }
}

impl From<i32> for Cell {
    fn from(value: i32) -> Self {
        Cell::Number(value as f64)
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Cell::Text(value.to_string())
    }
}

impl From<String> for Cell {
    fn from(value: String) -> Self {
        Cell::Text(value)
    }
}

impl From<Option<f64>> for Cell {
    fn from(value: Option<f64>) -> Self {
        value.map_or(Cell::Missing, Cell::Number)
    }
}

/// One row of the raw table, keyed by column name
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRow {
    cells: HashMap<String, Cell>,
}

impl RawRow {
    pub fn new() -> Self {
        RawRow::default()
    }

    /// Set the value of a column in this row
    pub fn insert(&mut self, column: impl Into<String>, cell: Cell) {
        self.cells.insert(column.into(), cell);
    }

    /// Get the cell for a column, if the row has that column
    pub fn get(&self, column: &str) -> Option<&Cell> {
        self.cells.get(column)
    }

    /// Take the cell for a column out of the row
    pub(crate) fn take(&mut self, column: &str) -> Option<Cell> {
        self.cells.remove(column)
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Whether this row has exactly the given column set
    pub fn matches_schema(&self, columns: &[String]) -> bool {
        self.cells.len() == columns.len() && columns.iter().all(|c| self.cells.contains_key(c))
    }
}

impl<K: Into<String>> FromIterator<(K, Cell)> for RawRow {
    fn from_iter<I: IntoIterator<Item = (K, Cell)>>(iter: I) -> Self {
        RawRow {
            cells: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

/// Errors a table source may yield while producing rows
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TableError {
    /// The source could not produce the row
    #[error("Row {row} could not be read: {reason}")]
    Unreadable { row: usize, reason: String },
}

/// A tabular data source
///
/// Implementors expose a stable column schema and hand out their rows exactly
/// once, in order. The engine does not re-read rows.
pub trait RawTable {
    type Rows: Iterator<Item = Result<RawRow, TableError>>;

    /// The column names of this table, in source order
    fn columns(&self) -> &[String];

    /// Consume the table, yielding its rows in order
    fn into_rows(self) -> Self::Rows;
}

/// An in-memory [RawTable]
#[derive(Debug, Clone, Default)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<RawRow>,
}

impl Table {
    /// Create an empty table with the given columns
    pub fn new<S: AsRef<str>>(columns: &[S]) -> Self {
        Table {
            columns: columns.iter().map(|c| c.as_ref().to_string()).collect(),
            rows: Vec::new(),
        }
    }

    /// Build a table from positional rows
    ///
    /// Each row is zipped with the column names. A row shorter or longer than
    /// the schema is kept as-is, and is reported as structurally malformed when
    /// the table is ingested.
    pub fn from_rows<S: AsRef<str>>(columns: &[S], rows: Vec<Vec<Cell>>) -> Self {
        let mut table = Table::new(columns);
        for row in rows {
            table.push_positional(row);
        }
        table
    }

    /// Append a row given in column order
    pub fn push_positional(&mut self, cells: Vec<Cell>) {
        let mut row = RawRow::new();
        for (index, cell) in cells.into_iter().enumerate() {
            let name = match self.columns.get(index) {
                Some(name) => name.clone(),
                None => format!("#{}", index + 1),
            };
            row.insert(name, cell);
        }
        self.rows.push(row);
    }

    /// Append a row given as a mapping from column name to cell
    pub fn push_row(&mut self, row: RawRow) {
        self.rows.push(row);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl RawTable for Table {
    type Rows = std::iter::Map<std::vec::IntoIter<RawRow>, fn(RawRow) -> Result<RawRow, TableError>>;

    fn columns(&self) -> &[String] {
        &self.columns
    }

    fn into_rows(self) -> Self::Rows {
        self.rows.into_iter().map(Ok as fn(RawRow) -> Result<RawRow, TableError>)
    }
}
