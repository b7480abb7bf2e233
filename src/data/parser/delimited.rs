use crate::data::table::{Cell, RawRow, RawTable, TableError};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use thiserror::Error;

/// Tokens treated as the missing marker when no other set is given
pub const DEFAULT_MISSING_TOKENS: [&str; 2] = ["", "."];

/// Custom error type for the module
#[derive(Error, Debug)]
pub enum CsvError {
    /// Error encountered when opening the file or reading the header
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    /// The header row is empty
    #[error("CSV source has no header row")]
    MissingHeader,
}

/// A [RawTable] backed by a CSV reader
///
/// Lines starting with `#` are comments. The first record is the header; the
/// column names are kept as written (trimmed). Cells matching one of the
/// missing tokens after trimming become [Cell::Missing]; every other cell is
/// kept as [Cell::Text] and typed later by the engine.
///
/// Records are read lazily, one at a time, when the table is ingested.
///
/// # Example
///
/// ```rust
/// use pkingest::data::parser::CsvTable;
/// use pkingest::data::RawTable;
///
/// let csv = "ID,TIME,AMT,DV\n1,0,100,.\n1,1,.,12.4\n";
/// let table = CsvTable::from_reader(csv.as_bytes()).unwrap();
/// assert_eq!(table.columns(), &["ID", "TIME", "AMT", "DV"]);
/// ```
pub struct CsvTable<R: Read> {
    columns: Vec<String>,
    reader: csv::Reader<R>,
    missing_tokens: Vec<String>,
}

impl CsvTable<File> {
    /// Open a CSV file
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, CsvError> {
        let reader = Self::builder().from_path(path)?;
        CsvTable::new(reader)
    }
}

impl<R: Read> CsvTable<R> {
    /// Read CSV data from any reader
    pub fn from_reader(reader: R) -> Result<Self, CsvError> {
        CsvTable::new(Self::builder().from_reader(reader))
    }

    fn builder() -> csv::ReaderBuilder {
        let mut builder = csv::ReaderBuilder::new();
        builder.comment(Some(b'#')).has_headers(true).flexible(true);
        builder
    }

    fn new(mut reader: csv::Reader<R>) -> Result<Self, CsvError> {
        let columns: Vec<String> = reader
            .headers()?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();
        if columns.is_empty() || columns.iter().all(String::is_empty) {
            return Err(CsvError::MissingHeader);
        }
        Ok(CsvTable {
            columns,
            reader,
            missing_tokens: DEFAULT_MISSING_TOKENS.iter().map(|t| t.to_string()).collect(),
        })
    }

    /// Replace the set of tokens read as the missing marker
    ///
    /// Tokens are compared after trimming whitespace from the cell.
    pub fn with_missing_tokens<S: AsRef<str>>(mut self, tokens: &[S]) -> Self {
        self.missing_tokens = tokens.iter().map(|t| t.as_ref().trim().to_string()).collect();
        self
    }
}

impl<R: Read> RawTable for CsvTable<R> {
    type Rows = CsvRows<R>;

    fn columns(&self) -> &[String] {
        &self.columns
    }

    fn into_rows(self) -> Self::Rows {
        CsvRows {
            records: self.reader.into_records(),
            columns: self.columns,
            missing_tokens: self.missing_tokens,
            row: 0,
        }
    }
}

/// Lazy row iterator over a [CsvTable]
pub struct CsvRows<R: Read> {
    records: csv::StringRecordsIntoIter<R>,
    columns: Vec<String>,
    missing_tokens: Vec<String>,
    row: usize,
}

impl<R: Read> CsvRows<R> {
    fn cell(&self, raw: &str) -> Cell {
        let trimmed = raw.trim();
        if self.missing_tokens.iter().any(|token| token == trimmed) {
            Cell::Missing
        } else {
            Cell::Text(raw.to_string())
        }
    }
}

impl<R: Read> Iterator for CsvRows<R> {
    type Item = Result<RawRow, TableError>;

    fn next(&mut self) -> Option<Self::Item> {
        let record = self.records.next()?;
        let row = self.row;
        self.row += 1;
        let record = match record {
            Ok(record) => record,
            Err(e) => {
                return Some(Err(TableError::Unreadable {
                    row,
                    reason: e.to_string(),
                }))
            }
        };

        let mut raw = RawRow::new();
        for (index, value) in record.iter().enumerate() {
            // Extra fields on ragged rows get positional names so the
            // schema check downstream sees them
            let name = match self.columns.get(index) {
                Some(name) => name.clone(),
                None => format!("#{}", index + 1),
            };
            raw.insert(name, self.cell(value));
        }
        Some(Ok(raw))
    }
}
