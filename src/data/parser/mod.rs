pub mod delimited;

pub use delimited::{CsvError, CsvRows, CsvTable, DEFAULT_MISSING_TOKENS};
