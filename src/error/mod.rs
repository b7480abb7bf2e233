use thiserror::Error;

use crate::data::parser::CsvError;
use crate::validate::Report;

#[derive(Error, Debug)]
pub enum PkIngestError {
    #[error("Error reading the data source: {0}")]
    Csv(#[from] CsvError),
    #[error("Invalid configuration: {0}")]
    Config(#[from] serde_json::Error),
    #[error("Could not read configuration file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Ingestion rejected with {errors} error(s) and {warnings} warning(s)")]
    Rejected {
        errors: usize,
        warnings: usize,
        report: Report,
    },
}

impl PkIngestError {
    /// The diagnostic report of a rejected run, if this error carries one
    pub fn report(&self) -> Option<&Report> {
        match self {
            PkIngestError::Rejected { report, .. } => Some(report),
            _ => None,
        }
    }
}
