use crate::data::DoseEvent;
use crate::validate::classify::compartment_index;
use crate::validate::coerce::NumericColumns;
use crate::validate::config::Role;
use crate::validate::report::{Component, Diagnostic, Finding};
use crate::validate::resolve::ColumnBinding;

/// Checks the cross-field rules of dosing rows
///
/// Every rule is evaluated on every row, so a single pass reports all of a
/// row's violations.
pub struct RegimenValidator<'a> {
    numeric: &'a NumericColumns,
    binding: &'a ColumnBinding,
}

impl<'a> RegimenValidator<'a> {
    pub fn new(numeric: &'a NumericColumns, binding: &'a ColumnBinding) -> Self {
        RegimenValidator { numeric, binding }
    }

    fn value(&self, role: Role, row: usize) -> Option<f64> {
        self.binding
            .get(role)
            .and_then(|column| self.numeric.value(column, row))
    }

    fn diagnostic(&self, finding: Finding, row: usize, roles: &[Role]) -> Diagnostic {
        roles
            .iter()
            .filter_map(|role| self.binding.get(*role))
            .fold(
                Diagnostic::new(Component::DosingRegimen, finding).with_row(row),
                |diagnostic, column| diagnostic.with_column(column),
            )
    }

    /// Validate a dosing row and build its [DoseEvent]
    ///
    /// The amount must be positive, a bound compartment must be a positive
    /// integer, `addl` and `ii` must be jointly positive or jointly absent,
    /// `addl` must be a whole count within `u32` and a duration must not be
    /// negative.
    pub fn dose(&self, row: usize) -> Result<DoseEvent, Vec<Diagnostic>> {
        let mut errors = Vec::new();

        let amount = self.value(Role::Amt, row);
        if !amount.is_some_and(|amount| amount > 0.0) {
            errors.push(self.diagnostic(Finding::DoseAmountNotPositive { amount }, row, &[Role::Amt]));
        }

        let mut compartment = None;
        if self.binding.is_bound(Role::Cmt) {
            let value = self.value(Role::Cmt, row);
            compartment = value.and_then(compartment_index);
            if compartment.is_none() {
                errors.push(self.diagnostic(
                    Finding::CompartmentNotPositive { compartment: value },
                    row,
                    &[Role::Cmt],
                ));
            }
        }

        let addl = self.value(Role::Addl, row);
        let ii = self.value(Role::Ii, row);
        let repeated = addl.is_some_and(|addl| addl > 0.0);
        let spaced = ii.is_some_and(|ii| ii > 0.0);
        if repeated != spaced || ii.is_some_and(|ii| ii < 0.0) {
            errors.push(self.diagnostic(
                Finding::RepeatIntervalMismatch { addl, ii },
                row,
                &[Role::Addl, Role::Ii],
            ));
        }
        let repeat = match addl {
            Some(addl) => match repeat_count(addl) {
                Some(repeat) => repeat,
                None => {
                    errors.push(self.diagnostic(
                        Finding::InvalidRepeatCount { addl },
                        row,
                        &[Role::Addl],
                    ));
                    0
                }
            },
            None => 0,
        };

        let duration = self.value(Role::Dur, row).unwrap_or(0.0);
        if duration < 0.0 {
            errors.push(self.diagnostic(Finding::NegativeDuration { duration }, row, &[Role::Dur]));
        }

        match (amount, errors.is_empty()) {
            (Some(amount), true) => {
                let (interval, repeat) = match ii {
                    Some(ii) if repeated && spaced => (ii, repeat),
                    _ => (0.0, 0),
                };
                Ok(DoseEvent::new(amount, compartment, interval, repeat, duration))
            }
            _ => Err(errors),
        }
    }

    /// Reject an observation row that carries a dose
    ///
    /// A positive amount, or a positive `addl` together with a positive `ii`,
    /// contradicts the row's observation event type.
    pub fn observation(&self, row: usize) -> Option<Diagnostic> {
        let amount = self.value(Role::Amt, row).is_some_and(|amount| amount > 0.0);
        let repeated = self.value(Role::Addl, row).is_some_and(|addl| addl > 0.0)
            && self.value(Role::Ii, row).is_some_and(|ii| ii > 0.0);
        (amount || repeated).then(|| {
            self.diagnostic(
                Finding::ObservationCarriesDose,
                row,
                &[Role::Evid, Role::Amt, Role::Addl, Role::Ii],
            )
        })
    }
}

/// A whole, non-negative count of additional doses that fits a `u32`
fn repeat_count(addl: f64) -> Option<u32> {
    let whole = addl.fract() == 0.0 && (0.0..=u32::MAX as f64).contains(&addl);
    whole.then_some(addl as u32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Cell;
    use crate::validate::coerce;
    use crate::validate::config::IngestConfig;
    use crate::validate::resolve::resolve;
    use crate::validate::Frame;

    const COLUMNS: [&str; 8] = ["id", "time", "evid", "amt", "cmt", "addl", "ii", "dur"];

    fn dose_row(amt: Cell, cmt: Cell, addl: Cell, ii: Cell, dur: Cell) -> Vec<Cell> {
        vec![1.into(), 0.0.into(), 1.into(), amt, cmt, addl, ii, dur]
    }

    fn validate<R>(rows: Vec<Vec<Cell>>, check: impl FnOnce(&RegimenValidator) -> R) -> R {
        let names: Vec<String> = COLUMNS.iter().map(|c| c.to_string()).collect();
        let config = IngestConfig::default();
        let binding = resolve(&names, &config).binding;
        let frame = Frame::from_positional(&names, rows);
        let (numeric, errors) = coerce::check(&frame, &binding, &config);
        assert!(errors.is_empty());
        check(&RegimenValidator::new(&numeric, &binding))
    }

    fn findings(result: Result<DoseEvent, Vec<Diagnostic>>) -> Vec<Finding> {
        match result {
            Ok(_) => Vec::new(),
            Err(errors) => errors.iter().map(|d| d.finding().clone()).collect(),
        }
    }

    #[test]
    fn test_valid_repeated_dose() {
        let dose = validate(
            vec![dose_row(100.0.into(), 1.into(), 5.into(), 12.0.into(), Cell::Missing)],
            |validator| validator.dose(0),
        )
        .unwrap();
        assert_eq!(dose.amount(), 100.0);
        assert_eq!(dose.compartment(), Some(1));
        assert_eq!(dose.repeat(), 5);
        assert_eq!(dose.interval(), 12.0);
        assert!(!dose.is_infusion());
    }

    #[test]
    fn test_addl_ii_grid() {
        let cases: Vec<(Cell, Cell, bool)> = vec![
            (5.into(), Cell::Missing, true),
            (5.into(), 0.0.into(), true),
            (5.into(), 12.0.into(), false),
            (0.into(), 12.0.into(), true),
            (Cell::Missing, 12.0.into(), true),
            (0.into(), 0.0.into(), false),
            (Cell::Missing, Cell::Missing, false),
            (0.into(), (-12.0).into(), true),
        ];
        for (addl, ii, mismatch) in cases {
            let found = findings(validate(
                vec![dose_row(100.0.into(), 1.into(), addl.clone(), ii.clone(), Cell::Missing)],
                |validator| validator.dose(0),
            ));
            let raised = found
                .iter()
                .any(|f| matches!(f, Finding::RepeatIntervalMismatch { .. }));
            assert_eq!(raised, mismatch, "addl = {}, ii = {}", addl, ii);
        }
    }

    #[test]
    fn test_zero_amount_single_error() {
        let found = findings(validate(
            vec![dose_row(0.0.into(), 1.into(), Cell::Missing, Cell::Missing, Cell::Missing)],
            |validator| validator.dose(0),
        ));
        assert_eq!(found, vec![Finding::DoseAmountNotPositive { amount: Some(0.0) }]);
    }

    #[test]
    fn test_all_rules_reported() {
        let found = findings(validate(
            vec![dose_row(Cell::Missing, 0.into(), 2.5.into(), Cell::Missing, (-1.0).into())],
            |validator| validator.dose(0),
        ));
        assert_eq!(
            found,
            vec![
                Finding::DoseAmountNotPositive { amount: None },
                Finding::CompartmentNotPositive {
                    compartment: Some(0.0)
                },
                Finding::RepeatIntervalMismatch {
                    addl: Some(2.5),
                    ii: None
                },
                Finding::InvalidRepeatCount { addl: 2.5 },
                Finding::NegativeDuration { duration: -1.0 },
            ]
        );
    }

    #[test]
    fn test_repeat_count_out_of_range() {
        let found = findings(validate(
            vec![dose_row(100.0.into(), 1.into(), 5e9.into(), 12.0.into(), Cell::Missing)],
            |validator| validator.dose(0),
        ));
        assert_eq!(found, vec![Finding::InvalidRepeatCount { addl: 5e9 }]);

        let dose = validate(
            vec![dose_row(
                100.0.into(),
                1.into(),
                (u32::MAX as f64).into(),
                12.0.into(),
                Cell::Missing,
            )],
            |validator| validator.dose(0),
        )
        .unwrap();
        assert_eq!(dose.repeat(), u32::MAX);
    }

    #[test]
    fn test_repeat_count() {
        assert_eq!(repeat_count(0.0), Some(0));
        assert_eq!(repeat_count(3.0), Some(3));
        assert_eq!(repeat_count(-1.0), None);
        assert_eq!(repeat_count(2.5), None);
        assert_eq!(repeat_count(4294967296.0), None);
    }

    #[test]
    fn test_missing_compartment_on_dose() {
        let found = findings(validate(
            vec![dose_row(100.0.into(), Cell::Missing, Cell::Missing, Cell::Missing, Cell::Missing)],
            |validator| validator.dose(0),
        ));
        assert_eq!(found, vec![Finding::CompartmentNotPositive { compartment: None }]);
    }

    #[test]
    fn test_infusion() {
        let dose = validate(
            vec![dose_row(100.0.into(), 1.into(), Cell::Missing, Cell::Missing, 0.5.into())],
            |validator| validator.dose(0),
        )
        .unwrap();
        assert!(dose.is_infusion());
        assert_eq!(dose.duration(), 0.5);
    }

    #[test]
    fn test_observation_carries_dose() {
        let rows = vec![
            dose_row(100.0.into(), 1.into(), Cell::Missing, Cell::Missing, Cell::Missing),
            dose_row(Cell::Missing, 1.into(), 2.into(), 12.0.into(), Cell::Missing),
            dose_row(Cell::Missing, 1.into(), 2.into(), Cell::Missing, Cell::Missing),
            dose_row(0.0.into(), 1.into(), Cell::Missing, Cell::Missing, Cell::Missing),
        ];
        let flagged: Vec<bool> = validate(rows, |validator| {
            (0..4).map(|row| validator.observation(row).is_some()).collect()
        });
        assert_eq!(flagged, vec![true, true, false, false]);
    }

    #[test]
    fn test_diagnostic_columns() {
        let errors = validate(
            vec![dose_row(100.0.into(), 1.into(), 3.into(), Cell::Missing, Cell::Missing)],
            |validator| validator.dose(0),
        )
        .unwrap_err();
        assert_eq!(errors[0].columns(), &["addl".to_string(), "ii".to_string()]);
        assert_eq!(errors[0].component(), Component::DosingRegimen);
    }
}
