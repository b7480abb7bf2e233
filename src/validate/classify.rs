use crate::data::table::format_number;
use crate::validate::coerce::NumericColumns;
use crate::validate::config::{IngestConfig, Role};
use crate::validate::report::{Component, Diagnostic, Finding};
use crate::validate::resolve::ColumnBinding;
use crate::validate::Frame;
use std::collections::BTreeMap;

/// What a row describes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowClass {
    Dose,
    /// `declared` is false when no event-type value exists for the row
    Observation { declared: bool },
}

/// Warn once when event data is expected but no event-type column resolved
pub fn unbound_event_type(binding: &ColumnBinding, config: &IngestConfig) -> Option<Diagnostic> {
    if !config.event_data || binding.is_bound(Role::Evid) {
        return None;
    }
    let column = config
        .column(Role::Evid)
        .or(Role::Evid.default_column())
        .unwrap_or_default();
    Some(
        Diagnostic::new(
            Component::RowClassifier,
            Finding::EventTypeUnbound {
                column: column.to_string(),
            },
        )
        .with_column(column),
    )
}

/// Group row indices by subject identifier
///
/// Rows keep their input order within a subject. Rows without an identifier
/// cannot be attributed to a subject and are reported on their own.
pub fn partition(frame: &Frame, binding: &ColumnBinding) -> (BTreeMap<String, Vec<usize>>, Vec<Diagnostic>) {
    let mut subjects: BTreeMap<String, Vec<usize>> = BTreeMap::new();
    let mut diagnostics = Vec::new();
    let column = binding.id();
    for (row, cell) in frame.column(column).iter().enumerate() {
        match cell.as_label() {
            Some(id) => subjects.entry(id).or_default().push(row),
            None => diagnostics.push(
                Diagnostic::new(Component::RowClassifier, Finding::MissingIdentifier)
                    .with_row(row)
                    .with_column(column),
            ),
        }
    }
    tracing::debug!(
        subjects = subjects.len(),
        unidentified = diagnostics.len(),
        "Partitioned rows by subject"
    );
    (subjects, diagnostics)
}

/// Decides whether each row is a dose or an observation
pub struct Classifier<'a> {
    frame: &'a Frame,
    numeric: &'a NumericColumns,
    binding: &'a ColumnBinding,
    config: &'a IngestConfig,
}

impl<'a> Classifier<'a> {
    pub fn new(
        frame: &'a Frame,
        numeric: &'a NumericColumns,
        binding: &'a ColumnBinding,
        config: &'a IngestConfig,
    ) -> Self {
        Classifier {
            frame,
            numeric,
            binding,
            config,
        }
    }

    /// Classify a row by its event-type value
    ///
    /// The dose code makes a dose and the observation code an observation.
    /// Without an event-type column every row is an observation. A missing or
    /// unknown code is an error.
    pub fn classify(&self, row: usize) -> Result<RowClass, Diagnostic> {
        if !self.config.event_data {
            return Ok(RowClass::Observation { declared: false });
        }
        let Some(column) = self.binding.get(Role::Evid) else {
            return Ok(RowClass::Observation { declared: false });
        };

        let value = match self.frame.cell(column, row).map(|cell| cell.as_number()) {
            Some(Ok(Some(code))) if code == self.config.dose_evid as f64 => {
                return Ok(RowClass::Dose)
            }
            Some(Ok(Some(code))) if code == self.config.observation_evid as f64 => {
                return Ok(RowClass::Observation { declared: true })
            }
            Some(Ok(Some(code))) => format_number(code),
            Some(Err(token)) => token.to_string(),
            Some(Ok(None)) | None => "<missing>".to_string(),
        };
        Err(
            Diagnostic::new(Component::RowClassifier, Finding::UnrecognizedEventType { value })
                .with_row(row)
                .with_column(column),
        )
    }

    /// The compartment of an observation row
    ///
    /// Observations need no compartment, but a given one must be a positive
    /// integer.
    pub fn observation_compartment(&self, row: usize) -> Result<Option<usize>, Diagnostic> {
        let Some(column) = self.binding.get(Role::Cmt) else {
            return Ok(None);
        };
        match self.numeric.value(column, row) {
            None => Ok(None),
            Some(value) => compartment_index(value).map(Some).ok_or_else(|| {
                Diagnostic::new(
                    Component::RowClassifier,
                    Finding::CompartmentNotPositive {
                        compartment: Some(value),
                    },
                )
                .with_row(row)
                .with_column(column)
            }),
        }
    }
}

/// A one-based compartment index, if `value` is a positive integer
pub(crate) fn compartment_index(value: f64) -> Option<usize> {
    (value >= 1.0 && value.fract() == 0.0 && value <= usize::MAX as f64).then_some(value as usize)
}
