//! The validation and normalization engine
//!
//! [ingest] runs a [RawTable] through the pipeline:
//!
//! 1. roles are bound to columns ([resolve])
//! 2. rows are read once, in order, keeping only bound columns
//! 3. numeric-role columns are type checked, all columns before aborting
//! 4. rows are partitioned by subject, and each partition is classified,
//!    checked against the dosing rules, sequenced and covariate-audited
//!    independently (in parallel)
//! 5. all diagnostics are merged into one deterministic [Report]
//!
//! Structural and type errors stop the pipeline before any per-row work. Any
//! error in the final report withholds the [Data]. An accepted run may still
//! carry warnings, so [Ingestion::into_parts] hands out both.
//!
//! # Example
//!
//! ```rust
//! use pkingest::prelude::*;
//!
//! let table = Table::from_rows(
//!     &["ID", "TIME", "EVID", "AMT", "DV"],
//!     vec![
//!         vec![1.into(), 0.0.into(), 1.into(), 100.0.into(), Cell::Missing],
//!         vec![1.into(), 0.0.into(), 0.into(), Cell::Missing, 9.7.into()],
//!         vec![1.into(), 2.0.into(), 0.into(), Cell::Missing, 8.1.into()],
//!     ],
//! );
//! let (data, report) = ingest(table, &IngestConfig::default()).into_parts();
//! for warning in report.warnings() {
//!     eprintln!("{}", warning);
//! }
//! assert_eq!(report.warning_count(), 1);
//! let data = data.expect("no errors were raised");
//! assert_eq!(data.len(), 1);
//! ```

pub mod classify;
pub mod coerce;
pub mod config;
pub mod covariates;
pub mod regimen;
pub mod report;
pub mod resolve;
pub mod sequence;

pub use classify::RowClass;
pub use config::{IngestConfig, Role};
pub use report::{Component, Diagnostic, ErrorClass, Finding, Report, Severity};
pub use resolve::{resolve, ColumnBinding, Resolution};

use crate::data::parser::CsvTable;
use crate::data::{
    compare_ids, Cell, CovariateEntry, CovariateTable, Data, Observation, RawTable, Record,
    RecordKind, Subject, TableError,
};
use crate::error::PkIngestError;
use classify::Classifier;
use coerce::NumericColumns;
use rayon::prelude::*;
use regimen::RegimenValidator;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

/// The bound columns of a table, materialized column-wise
#[derive(Debug, Clone, Default)]
pub struct Frame {
    columns: HashMap<String, Vec<Cell>>,
    rows: usize,
}

impl Frame {
    /// Drain a table, keeping the cells of the bound columns
    ///
    /// Stops at the first row the source cannot produce or whose column set
    /// differs from the schema.
    fn read<T: RawTable>(table: T, binding: &ColumnBinding) -> Result<Frame, Diagnostic> {
        let schema = table.columns().to_vec();
        let mut frame = Frame {
            columns: binding
                .bound_columns()
                .into_iter()
                .map(|c| (c.to_string(), Vec::new()))
                .collect(),
            rows: 0,
        };

        for (index, row) in table.into_rows().enumerate() {
            let mut row = row.map_err(|e| match e {
                TableError::Unreadable { row, reason } => Diagnostic::new(
                    Component::ColumnResolver,
                    Finding::SourceUnreadable { row, reason },
                )
                .with_row(row),
            })?;
            if !row.matches_schema(&schema) {
                return Err(Diagnostic::new(
                    Component::ColumnResolver,
                    Finding::InconsistentColumns {
                        row: index,
                        expected: schema.len(),
                        found: row.len(),
                    },
                )
                .with_row(index));
            }
            for (name, cells) in frame.columns.iter_mut() {
                cells.push(row.take(name).unwrap_or_default());
            }
            frame.rows += 1;
        }
        Ok(frame)
    }

    /// Build a frame from positional rows, keeping every column
    #[cfg(test)]
    pub(crate) fn from_positional(names: &[String], rows: Vec<Vec<Cell>>) -> Frame {
        let mut frame = Frame {
            columns: names.iter().map(|n| (n.clone(), Vec::new())).collect(),
            rows: rows.len(),
        };
        for row in rows {
            for (name, cell) in names.iter().zip(row) {
                if let Some(cells) = frame.columns.get_mut(name) {
                    cells.push(cell);
                }
            }
        }
        frame
    }

    /// All cells of a column, empty if the column was not kept
    pub fn column(&self, name: &str) -> &[Cell] {
        self.columns.get(name).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn cell(&self, name: &str, row: usize) -> Option<&Cell> {
        self.columns.get(name).and_then(|cells| cells.get(row))
    }

    pub fn len(&self) -> usize {
        self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }
}

/// The outcome of one ingestion run
///
/// The report is always present. The data is present only when the report
/// holds no errors.
#[derive(Debug, Clone)]
pub struct Ingestion {
    data: Option<Data>,
    report: Report,
}

impl Ingestion {
    fn rejected(report: Report) -> Self {
        tracing::warn!(
            errors = report.error_count(),
            warnings = report.warning_count(),
            "Ingestion rejected"
        );
        Ingestion { data: None, report }
    }

    /// The validated data, `None` if the run raised any error
    pub fn data(&self) -> Option<&Data> {
        self.data.as_ref()
    }

    pub fn report(&self) -> &Report {
        &self.report
    }

    pub fn is_accepted(&self) -> bool {
        self.data.is_some()
    }

    /// Take the validated data, or the report of a rejected run as an error
    ///
    /// Warnings of an accepted run are not returned; use [Ingestion::into_parts]
    /// to keep them alongside the data.
    pub fn into_data(self) -> Result<Data, PkIngestError> {
        match self.data {
            Some(data) => Ok(data),
            None => Err(PkIngestError::Rejected {
                errors: self.report.error_count(),
                warnings: self.report.warning_count(),
                report: self.report,
            }),
        }
    }

    /// Split into the validated data and the full report
    ///
    /// The data is `None` when the report holds any error. The report of an
    /// accepted run still carries its warnings.
    pub fn into_parts(self) -> (Option<Data>, Report) {
        (self.data, self.report)
    }
}

/// Output of one subject partition
struct Partition {
    subject: Subject,
    covariates: BTreeMap<String, CovariateEntry>,
    diagnostics: Vec<Diagnostic>,
}

/// Read-only state shared by every partition
struct Engine<'a> {
    frame: &'a Frame,
    numeric: &'a NumericColumns,
    binding: &'a ColumnBinding,
    config: &'a IngestConfig,
}

impl Engine<'_> {
    fn record(&self, row: usize) -> Result<RecordKind, Vec<Diagnostic>> {
        let classifier = Classifier::new(self.frame, self.numeric, self.binding, self.config);
        let regimen = RegimenValidator::new(self.numeric, self.binding);

        match classifier.classify(row).map_err(|e| vec![e])? {
            RowClass::Dose => regimen.dose(row).map(RecordKind::Dose),
            RowClass::Observation { declared } => {
                let mut errors = Vec::new();
                if declared {
                    errors.extend(regimen.observation(row));
                }
                let compartment = match classifier.observation_compartment(row) {
                    Ok(compartment) => compartment,
                    Err(e) => {
                        errors.push(e);
                        None
                    }
                };
                if !errors.is_empty() {
                    return Err(errors);
                }
                let values = self
                    .binding
                    .observations()
                    .iter()
                    .map(|column| (column.clone(), self.numeric.value(column, row)))
                    .collect();
                Ok(RecordKind::Observation(Observation::new(values, compartment)))
            }
        }
    }

    fn process(&self, id: String, rows: Vec<usize>) -> Partition {
        let mut subject = Subject::new(id.clone());
        let mut diagnostics = Vec::new();
        let mut timed: Vec<(usize, f64)> = Vec::with_capacity(rows.len());

        for row in rows {
            let time = self.numeric.value(self.binding.time(), row);
            if time.is_none() {
                diagnostics.push(
                    Diagnostic::new(Component::RowClassifier, Finding::MissingTime)
                        .with_row(row)
                        .with_column(self.binding.time()),
                );
            }
            let kind = match self.record(row) {
                Ok(kind) => Some(kind),
                Err(errors) => {
                    diagnostics.extend(errors);
                    None
                }
            };
            if let Some(time) = time {
                timed.push((row, time));
                match kind {
                    Some(RecordKind::Dose(dose)) => subject.push(Record::dose(time, row, dose)),
                    Some(RecordKind::Observation(obs)) => {
                        subject.push(Record::observation(time, row, obs))
                    }
                    None => {}
                }
            }
        }
        // Row-level findings of this partition belong to its subject
        let mut diagnostics: Vec<Diagnostic> = diagnostics
            .into_iter()
            .map(|d| d.with_subject(id.as_str()))
            .collect();

        diagnostics.extend(sequence::sequence(&mut subject));

        timed.sort_by(|a, b| a.1.total_cmp(&b.1));
        let (covariates, warnings) = covariates::audit(&id, &timed, self.frame, self.binding);
        diagnostics.extend(warnings);

        Partition {
            subject,
            covariates,
            diagnostics,
        }
    }
}

/// Validate and normalize a table into per-subject sequences
///
/// The table is consumed exactly once. The returned [Ingestion] always carries
/// the full diagnostic report; see the [module documentation](crate::validate) for the
/// stages.
pub fn ingest<T: RawTable>(table: T, config: &IngestConfig) -> Ingestion {
    let schema = table.columns().to_vec();
    let resolution = resolve(&schema, config);
    let has_errors = resolution.has_errors();
    let binding = resolution.binding;
    let mut diagnostics = resolution.diagnostics;
    if has_errors {
        return Ingestion::rejected(Report::new(diagnostics));
    }

    let frame = match Frame::read(table, &binding) {
        Ok(frame) => frame,
        Err(diagnostic) => {
            diagnostics.push(diagnostic);
            return Ingestion::rejected(Report::new(diagnostics));
        }
    };
    tracing::debug!(rows = frame.len(), columns = schema.len(), "Read table");

    let (numeric, type_errors) = coerce::check(&frame, &binding, config);
    if !type_errors.is_empty() {
        diagnostics.extend(type_errors);
        return Ingestion::rejected(Report::new(diagnostics));
    }

    diagnostics.extend(classify::unbound_event_type(&binding, config));
    let (partitions, unidentified) = classify::partition(&frame, &binding);
    diagnostics.extend(unidentified);

    let engine = Engine {
        frame: &frame,
        numeric: &numeric,
        binding: &binding,
        config,
    };
    let mut partitions: Vec<(String, Vec<usize>)> = partitions.into_iter().collect();
    partitions.sort_by(|a, b| compare_ids(&a.0, &b.0));
    let results: Vec<Partition> = partitions
        .into_par_iter()
        .map(|(id, rows)| engine.process(id, rows))
        .collect();

    let mut subjects = Vec::with_capacity(results.len());
    let mut covariates = CovariateTable::new();
    for partition in results {
        for (name, entry) in partition.covariates {
            covariates.insert(partition.subject.id(), &name, entry);
        }
        diagnostics.extend(partition.diagnostics);
        subjects.push(partition.subject);
    }
    diagnostics.extend(covariates::summarize(&covariates, &binding));

    let report = Report::new(diagnostics);
    if report.has_errors() {
        return Ingestion::rejected(report);
    }

    tracing::info!(
        subjects = subjects.len(),
        rows = frame.len(),
        warnings = report.warning_count(),
        "Ingestion accepted"
    );
    Ingestion {
        data: Some(Data::new(subjects, covariates)),
        report,
    }
}

/// Ingest a CSV file
///
/// Fails only when the file cannot be opened or has no header; every data
/// problem is reported in the returned [Ingestion].
pub fn read_csv(path: impl AsRef<Path>, config: &IngestConfig) -> Result<Ingestion, PkIngestError> {
    let table = CsvTable::from_path(path)?;
    Ok(ingest(table, config))
}
