pub mod data;
pub mod error;
pub mod validate;

pub use crate::data::*;
pub use crate::validate::{ingest, read_csv, IngestConfig, Ingestion, Report};
pub use error::PkIngestError;

pub mod prelude {
    pub mod data {
        pub use crate::data::{
            parser::CsvTable, Cell, CovariateEntry, CovariateMode, CovariateTable,
            CovariateValue, Data, DoseEvent, Observation, RawRow, RawTable, Record, RecordKind,
            Subject, Table,
        };
    }
    pub mod validate {
        pub use crate::validate::{
            ingest, read_csv, resolve, ColumnBinding, Component, Diagnostic, ErrorClass, Finding,
            IngestConfig, Ingestion, Report, Role, Severity,
        };
    }

    pub use crate::data::*;
    pub use crate::data::parser::CsvTable;
    pub use crate::error::PkIngestError;
    pub use crate::validate::*;
}
