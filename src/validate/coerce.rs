use crate::data::Cell;
use crate::validate::config::{IngestConfig, Role};
use crate::validate::report::{Component, Diagnostic, Finding};
use crate::validate::resolve::ColumnBinding;
use crate::validate::Frame;
use std::collections::{BTreeMap, BTreeSet, HashMap};

const NUMERIC_ROLES: [Role; 6] = [
    Role::Time,
    Role::Amt,
    Role::Cmt,
    Role::Ii,
    Role::Addl,
    Role::Dur,
];

/// Numeric views of every column bound to a numeric role
#[derive(Debug, Clone, Default)]
pub struct NumericColumns {
    columns: HashMap<String, Vec<Option<f64>>>,
}

impl NumericColumns {
    /// The numeric value of a cell, `None` when missing or when the column is not numeric
    pub fn value(&self, column: &str, row: usize) -> Option<f64> {
        self.columns.get(column).and_then(|values| values.get(row).copied().flatten())
    }

    pub fn contains(&self, column: &str) -> bool {
        self.columns.contains_key(column)
    }
}

#[derive(Default)]
struct ColumnScan {
    values: Vec<Option<f64>>,
    offending: BTreeSet<String>,
    unresolved: BTreeSet<String>,
}

fn scan(cells: &[Cell], aliases: Option<&BTreeMap<String, i64>>) -> ColumnScan {
    let mut scan = ColumnScan {
        values: Vec::with_capacity(cells.len()),
        ..Default::default()
    };
    for cell in cells {
        let value = match cell.as_number() {
            Ok(value) => value,
            Err(token) => match aliases {
                Some(aliases) => match aliases.get(token) {
                    Some(index) => Some(*index as f64),
                    None => {
                        scan.unresolved.insert(token.to_string());
                        None
                    }
                },
                None => {
                    scan.offending.insert(token.to_string());
                    None
                }
            },
        };
        scan.values.push(value);
    }
    scan
}

/// Check that every numeric-role column holds numbers
///
/// Missing cells are exempt. For each column, the distinct offending tokens
/// are reported together in one error. When a compartment alias map is
/// configured, textual compartments are looked up in it and unknown names are
/// reported as unresolved aliases.
pub fn check(
    frame: &Frame,
    binding: &ColumnBinding,
    config: &IngestConfig,
) -> (NumericColumns, Vec<Diagnostic>) {
    let mut targets: Vec<(&str, Role)> = NUMERIC_ROLES
        .iter()
        .filter_map(|role| binding.get(*role).map(|column| (column, *role)))
        .collect();
    targets.extend(
        binding
            .observations()
            .iter()
            .map(|column| (column.as_str(), Role::Observation)),
    );

    let mut numeric = NumericColumns::default();
    let mut diagnostics = Vec::new();
    for (column, role) in targets {
        let aliases = (role == Role::Cmt && !config.compartment_alias_map.is_empty())
            .then_some(&config.compartment_alias_map);
        let scanned = scan(frame.column(column), aliases);

        if !scanned.offending.is_empty() {
            diagnostics.push(
                Diagnostic::new(
                    Component::TypeCoercion,
                    Finding::NonNumericValues {
                        column: column.to_string(),
                        role,
                        values: scanned.offending,
                    },
                )
                .with_column(column),
            );
        }
        if !scanned.unresolved.is_empty() {
            diagnostics.push(
                Diagnostic::new(
                    Component::TypeCoercion,
                    Finding::UnresolvedCompartmentAlias {
                        column: column.to_string(),
                        values: scanned.unresolved,
                    },
                )
                .with_column(column),
            );
        }
        numeric.columns.insert(column.to_string(), scanned.values);
    }

    tracing::debug!(
        columns = numeric.columns.len(),
        errors = diagnostics.len(),
        "Checked numeric columns"
    );
    (numeric, diagnostics)
}
