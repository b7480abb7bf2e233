//! Diagnostics raised during ingestion and the report that collects them
//!
//! Every check in the engine produces a [Finding]. The finding's `Display` is
//! the user-facing message and its [ErrorClass] fixes whether it is fatal.
//! Findings are wrapped in a [Diagnostic] carrying the producing
//! [Component] and the subject, row, time and columns it concerns. A
//! [Report] holds all diagnostics of one run in a deterministic order:
//! by component, then subject id, then row index.

use crate::data::compare_ids;
use crate::validate::config::Role;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use thiserror::Error;

/// Whether a diagnostic blocks use of the data
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

/// The error taxonomy of the engine
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ErrorClass {
    /// Malformed table or unresolvable configuration, aborts before typing
    Structural,
    /// Non-numeric data in a numeric column, aborts before classification
    Type,
    /// Regimen or event-type inconsistencies, attributed to rows
    Semantic,
    /// Non-fatal, always surfaced
    Advisory,
}

/// The engine stage that raised a diagnostic, in pipeline order
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum Component {
    ColumnResolver,
    TypeCoercion,
    RowClassifier,
    DosingRegimen,
    Sequencer,
    CovariateAuditor,
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            Component::ColumnResolver => "columns",
            Component::TypeCoercion => "types",
            Component::RowClassifier => "rows",
            Component::DosingRegimen => "regimen",
            Component::Sequencer => "sequence",
            Component::CovariateAuditor => "covariates",
        };
        f.write_str(name)
    }
}

fn show(value: &Option<f64>) -> String {
    match value {
        Some(v) => crate::data::table::format_number(*v),
        None => "missing".to_string(),
    }
}

fn join<'a>(values: impl IntoIterator<Item = &'a String>) -> String {
    values
        .into_iter()
        .map(|v| format!("{:?}", v))
        .collect::<Vec<_>>()
        .join(", ")
}

/// A single finding of the engine
#[derive(Error, Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Finding {
    /// The table source failed to produce a row
    #[error("row {row} could not be read: {reason}")]
    SourceUnreadable { row: usize, reason: String },
    /// A row's column set differs from the table schema
    #[error("row {row} has {found} column(s) that do not match the {expected} column(s) of the table")]
    InconsistentColumns {
        row: usize,
        expected: usize,
        found: usize,
    },
    /// The same column name appears more than once in the header
    #[error("column `{column}` appears more than once in the table")]
    DuplicateColumn { column: String },
    /// A mandatory role has no column
    #[error("no column resolves the mandatory `{role}` role (looked for `{column}`)")]
    MandatoryRoleUnresolved { role: Role, column: String },
    /// A column named in the configuration is absent from the table
    #[error("column `{column}` configured for the `{role}` role is not in the table")]
    ColumnNotFound { role: Role, column: String },
    /// One physical column was bound to two roles
    #[error("column `{column}` is bound to both the `{first}` and `{second}` roles")]
    ColumnBoundTwice {
        column: String,
        first: Role,
        second: Role,
    },
    /// A compartment alias mapped to an index below one
    #[error("compartment alias {alias:?} maps to {index}; compartment indices must be positive")]
    InvalidCompartmentAlias { alias: String, index: i64 },
    /// Distinct textual values that do not parse as numbers
    #[error("column `{column}` ({role}) must be numeric; offending values: {}", join(.values))]
    NonNumericValues {
        column: String,
        role: Role,
        values: BTreeSet<String>,
    },
    /// Compartment names with no entry in the alias map
    #[error("column `{column}` has compartment names with no alias: {}", join(.values))]
    UnresolvedCompartmentAlias {
        column: String,
        values: BTreeSet<String>,
    },
    #[error("row has no subject identifier")]
    MissingIdentifier,
    #[error("row has no time")]
    MissingTime,
    #[error("unrecognized event-type value {value:?}")]
    UnrecognizedEventType { value: String },
    #[error("dose amount must be positive (amt = {})", show(.amount))]
    DoseAmountNotPositive { amount: Option<f64> },
    #[error("compartment index must be positive (cmt = {})", show(.compartment))]
    CompartmentNotPositive { compartment: Option<f64> },
    #[error("addl and ii must be jointly positive or jointly absent (addl = {}, ii = {})", show(.addl), show(.ii))]
    RepeatIntervalMismatch { addl: Option<f64>, ii: Option<f64> },
    #[error("additional-dose count must be a non-negative integer (addl = {addl})")]
    InvalidRepeatCount { addl: f64 },
    #[error("infusion duration must not be negative (dur = {duration})")]
    NegativeDuration { duration: f64 },
    #[error("observation row carries dosing information")]
    ObservationCarriesDose,
    /// No observation column could be bound
    #[error("no observation column is bound; observations will carry no values")]
    NoObservationColumns,
    /// The event-type column is absent while event data is expected
    #[error("no event-type column (looked for `{column}`): no events will be recognized and every row is treated as an observation; set `eventData` to false for an event-free dataset")]
    EventTypeUnbound { column: String },
    #[error("observation coincides with dose time; value(s) discarded (time = {time})")]
    ObservationAtDoseTime { time: f64 },
    #[error("covariate `{covariate}` is missing on {missing} of {total} row(s)")]
    CovariateMissing {
        covariate: String,
        missing: usize,
        total: usize,
    },
    #[error("covariate `{covariate}` is missing for {} subject(s): {}", .subjects.len(), join(.subjects))]
    CovariateMissingSummary {
        covariate: String,
        subjects: Vec<String>,
    },
    #[error("covariate `{covariate}` is declared constant but takes several values: {}", join(.values))]
    CovariateNotConstant {
        covariate: String,
        values: Vec<String>,
    },
}

impl Finding {
    pub fn class(&self) -> ErrorClass {
        use Finding as F;
        match self {
            F::SourceUnreadable { .. }
            | F::InconsistentColumns { .. }
            | F::DuplicateColumn { .. }
            | F::MandatoryRoleUnresolved { .. }
            | F::ColumnNotFound { .. }
            | F::ColumnBoundTwice { .. }
            | F::InvalidCompartmentAlias { .. } => ErrorClass::Structural,
            F::NonNumericValues { .. } | F::UnresolvedCompartmentAlias { .. } => ErrorClass::Type,
            F::MissingIdentifier
            | F::MissingTime
            | F::UnrecognizedEventType { .. }
            | F::DoseAmountNotPositive { .. }
            | F::CompartmentNotPositive { .. }
            | F::RepeatIntervalMismatch { .. }
            | F::InvalidRepeatCount { .. }
            | F::NegativeDuration { .. }
            | F::ObservationCarriesDose => ErrorClass::Semantic,
            F::NoObservationColumns
            | F::EventTypeUnbound { .. }
            | F::ObservationAtDoseTime { .. }
            | F::CovariateMissing { .. }
            | F::CovariateMissingSummary { .. }
            | F::CovariateNotConstant { .. } => ErrorClass::Advisory,
        }
    }

    pub fn severity(&self) -> Severity {
        match self.class() {
            ErrorClass::Advisory => Severity::Warning,
            _ => Severity::Error,
        }
    }
}

/// A finding attributed to a component, and where applicable a subject, row, time and columns
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Diagnostic {
    severity: Severity,
    class: ErrorClass,
    component: Component,
    #[serde(skip_serializing_if = "Option::is_none")]
    subject: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    row: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    time: Option<f64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    columns: Vec<String>,
    message: String,
    finding: Finding,
}

impl Diagnostic {
    pub fn new(component: Component, finding: Finding) -> Self {
        Diagnostic {
            severity: finding.severity(),
            class: finding.class(),
            component,
            subject: None,
            row: None,
            time: None,
            columns: Vec::new(),
            message: finding.to_string(),
            finding,
        }
    }

    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    pub fn with_row(mut self, row: usize) -> Self {
        self.row = Some(row);
        self
    }

    pub fn with_time(mut self, time: f64) -> Self {
        self.time = Some(time);
        self
    }

    pub fn with_column(mut self, column: impl Into<String>) -> Self {
        self.columns.push(column.into());
        self
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    pub fn class(&self) -> ErrorClass {
        self.class
    }

    pub fn component(&self) -> Component {
        self.component
    }

    pub fn subject(&self) -> Option<&str> {
        self.subject.as_deref()
    }

    pub fn row(&self) -> Option<usize> {
        self.row
    }

    pub fn time(&self) -> Option<f64> {
        self.time
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn finding(&self) -> &Finding {
        &self.finding
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let level = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        write!(f, "{}[{}]", level, self.component)?;
        if let Some(subject) = &self.subject {
            write!(f, " subject {}", subject)?;
        }
        if let Some(row) = self.row {
            write!(f, " row {}", row)?;
        }
        if !self.columns.is_empty() {
            write!(f, " ({})", self.columns.join(", "))?;
        }
        write!(f, ": {}", self.message)
    }
}

/// Every diagnostic of one ingestion run
///
/// Errors and warnings are both kept. A report with any error means the run
/// produced no usable subjects.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Report {
    diagnostics: Vec<Diagnostic>,
}

impl Report {
    /// Build a report, ordering diagnostics by component, subject and row
    ///
    /// The sort is stable, so diagnostics sharing a key keep the order in which
    /// they were raised.
    pub(crate) fn new(mut diagnostics: Vec<Diagnostic>) -> Self {
        diagnostics.sort_by(|a, b| {
            a.component
                .cmp(&b.component)
                .then_with(|| match (&a.subject, &b.subject) {
                    (Some(x), Some(y)) => compare_ids(x, y),
                    (x, y) => x.is_some().cmp(&y.is_some()),
                })
                .then_with(|| a.row.cmp(&b.row))
        });
        Report { diagnostics }
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| d.severity == Severity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| d.severity == Severity::Warning)
    }

    pub fn error_count(&self) -> usize {
        self.errors().count()
    }

    pub fn warning_count(&self) -> usize {
        self.warnings().count()
    }

    pub fn has_errors(&self) -> bool {
        self.errors().next().is_some()
    }

    /// Diagnostics raised by a single component
    pub fn by_component(&self, component: Component) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(move |d| d.component == component)
    }

    pub fn len(&self) -> usize {
        self.diagnostics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    /// Serialize the report as pretty-printed JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(
            f,
            "{} error(s), {} warning(s)",
            self.error_count(),
            self.warning_count()
        )?;
        for diagnostic in &self.diagnostics {
            writeln!(f, "{}", diagnostic)?;
        }
        Ok(())
    }
}
