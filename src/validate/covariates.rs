use crate::data::{Cell, CovariateEntry, CovariateMode, CovariatePoint, CovariateTable, CovariateValue};
use crate::validate::report::{Component, Diagnostic, Finding};
use crate::validate::resolve::ColumnBinding;
use crate::validate::Frame;
use std::collections::BTreeMap;

fn covariate_value(cell: &Cell) -> Option<CovariateValue> {
    match cell.as_number() {
        Ok(value) => value.map(CovariateValue::Number),
        Err(text) => Some(CovariateValue::Text(text.to_string())),
    }
}

/// Audit the covariates of one subject
///
/// `rows` are the subject's `(row, time)` pairs in time order. A constant
/// covariate is missing for the subject when any row lacks it, and is warned
/// about when its values disagree. A time-varying covariate keeps one point
/// per row. Values are never imputed.
pub fn audit(
    subject: &str,
    rows: &[(usize, f64)],
    frame: &Frame,
    binding: &ColumnBinding,
) -> (BTreeMap<String, CovariateEntry>, Vec<Diagnostic>) {
    let mut entries = BTreeMap::new();
    let mut warnings = Vec::new();

    for (column, mode) in binding.covariates() {
        let values: Vec<Option<CovariateValue>> = rows
            .iter()
            .map(|(row, _)| frame.cell(column, *row).and_then(covariate_value))
            .collect();

        let missing = values.iter().filter(|value| value.is_none()).count();
        if missing > 0 {
            warnings.push(
                Diagnostic::new(
                    Component::CovariateAuditor,
                    Finding::CovariateMissing {
                        covariate: column.clone(),
                        missing,
                        total: rows.len(),
                    },
                )
                .with_subject(subject)
                .with_column(column.as_str()),
            );
        }

        let entry = match mode {
            CovariateMode::Constant => {
                let mut distinct: Vec<&CovariateValue> = Vec::new();
                for value in values.iter().flatten() {
                    if !distinct.contains(&value) {
                        distinct.push(value);
                    }
                }
                if distinct.len() > 1 {
                    warnings.push(
                        Diagnostic::new(
                            Component::CovariateAuditor,
                            Finding::CovariateNotConstant {
                                covariate: column.clone(),
                                values: distinct.iter().map(|v| v.to_string()).collect(),
                            },
                        )
                        .with_subject(subject)
                        .with_column(column.as_str()),
                    );
                }
                let value = if missing > 0 {
                    None
                } else {
                    distinct.first().map(|value| (*value).clone())
                };
                CovariateEntry::Constant(value)
            }
            CovariateMode::TimeVarying => CovariateEntry::TimeVarying(
                rows.iter()
                    .zip(values)
                    .map(|((row, time), value)| CovariatePoint::new(*time, *row, value))
                    .collect(),
            ),
        };
        entries.insert(column.clone(), entry);
    }

    (entries, warnings)
}

/// One warning per covariate listing every subject with missing values
pub fn summarize(table: &CovariateTable, binding: &ColumnBinding) -> Vec<Diagnostic> {
    binding
        .covariates()
        .iter()
        .filter_map(|(column, _)| {
            let subjects = table.missing_for(column);
            if subjects.is_empty() {
                return None;
            }
            Some(
                Diagnostic::new(
                    Component::CovariateAuditor,
                    Finding::CovariateMissingSummary {
                        covariate: column.clone(),
                        subjects: subjects.into_iter().map(String::from).collect(),
                    },
                )
                .with_column(column.as_str()),
            )
        })
        .collect()
}
