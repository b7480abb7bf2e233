//! Integration tests for the ingestion pipeline on in-memory tables

use pkingest::prelude::*;

const COLUMNS: [&str; 7] = ["id", "time", "evid", "amt", "addl", "ii", "dv"];

fn row(id: i32, time: f64, evid: i32, amt: Cell, addl: Cell, ii: Cell, dv: Cell) -> Vec<Cell> {
    vec![id.into(), time.into(), evid.into(), amt, addl, ii, dv]
}

fn dose(id: i32, time: f64, amt: f64) -> Vec<Cell> {
    row(id, time, 1, amt.into(), Cell::Missing, Cell::Missing, Cell::Missing)
}

fn obs(id: i32, time: f64, dv: f64) -> Vec<Cell> {
    row(id, time, 0, Cell::Missing, Cell::Missing, Cell::Missing, dv.into())
}

fn run(rows: Vec<Vec<Cell>>) -> Ingestion {
    ingest(Table::from_rows(&COLUMNS, rows), &IngestConfig::default())
}

fn findings(ingestion: &Ingestion) -> Vec<&Finding> {
    ingestion
        .report()
        .diagnostics()
        .iter()
        .map(Diagnostic::finding)
        .collect()
}

// ═══════════════════════════════════════════════════════════════════════════════
// Dosing regimen
// ═══════════════════════════════════════════════════════════════════════════════

mod regimen {
    use super::*;

    #[test]
    fn test_valid_regimens_raise_no_errors() {
        let ingestion = run(vec![
            row(1, 0.0, 1, 100.0.into(), 5.into(), 12.0.into(), Cell::Missing),
            row(1, 0.0, 1, 50.0.into(), 0.into(), 0.0.into(), Cell::Missing),
            dose(2, 0.0, 25.0),
            obs(2, 1.0, 3.3),
        ]);
        assert!(!ingestion.report().has_errors(), "{}", ingestion.report());
        let data = ingestion.data().unwrap();
        let doses: Vec<(u32, f64)> = data
            .get_subject("1")
            .unwrap()
            .doses()
            .map(|(_, dose)| (dose.repeat(), dose.interval()))
            .collect();
        assert_eq!(doses, vec![(5, 12.0), (0, 0.0)]);
    }

    #[test]
    fn test_zero_amount_is_one_error_on_its_row() {
        let ingestion = run(vec![dose(1, 0.0, 100.0), dose(1, 12.0, 0.0), obs(1, 1.0, 4.0)]);
        let errors: Vec<&Diagnostic> = ingestion.report().errors().collect();
        assert_eq!(errors.len(), 1);
        assert_eq!(
            errors[0].finding(),
            &Finding::DoseAmountNotPositive { amount: Some(0.0) }
        );
        assert_eq!(errors[0].row(), Some(1));
        assert_eq!(errors[0].subject(), Some("1"));
        assert!(errors[0].message().starts_with("dose amount must be positive"));
        assert!(ingestion.data().is_none());
    }

    #[test]
    fn test_addl_ii_must_agree() {
        let cases: Vec<(Cell, Cell, bool)> = vec![
            (5.into(), Cell::Missing, true),
            (5.into(), 0.0.into(), true),
            (5.into(), 12.0.into(), false),
            (0.into(), 12.0.into(), true),
        ];
        for (addl, ii, expected) in cases {
            let ingestion = run(vec![row(1, 0.0, 1, 100.0.into(), addl, ii, Cell::Missing)]);
            let raised = ingestion.report().errors().any(|d| {
                d.message()
                    .starts_with("addl and ii must be jointly positive or jointly absent")
            });
            assert_eq!(raised, expected, "{}", ingestion.report());
        }
    }

    #[test]
    fn test_observation_carrying_dose() {
        let ingestion = run(vec![row(
            1,
            0.0,
            0,
            100.0.into(),
            Cell::Missing,
            Cell::Missing,
            5.0.into(),
        )]);
        assert_eq!(findings(&ingestion), vec![&Finding::ObservationCarriesDose]);
    }

    #[test]
    fn test_semantic_errors_collected_across_subjects() {
        let ingestion = run(vec![
            dose(2, 0.0, -1.0),
            row(1, 0.0, 7, Cell::Missing, Cell::Missing, Cell::Missing, Cell::Missing),
            dose(1, 1.0, 0.0),
        ]);
        let keys: Vec<(Option<&str>, Option<usize>, Component)> = ingestion
            .report()
            .errors()
            .map(|d| (d.subject(), d.row(), d.component()))
            .collect();
        assert_eq!(
            keys,
            vec![
                (Some("1"), Some(1), Component::RowClassifier),
                (Some("1"), Some(2), Component::DosingRegimen),
                (Some("2"), Some(0), Component::DosingRegimen),
            ]
        );
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Types
// ═══════════════════════════════════════════════════════════════════════════════

mod types {
    use super::*;

    fn observations(values: &[&str]) -> Vec<Vec<Cell>> {
        values
            .iter()
            .enumerate()
            .map(|(i, value)| {
                row(
                    1,
                    i as f64,
                    0,
                    Cell::Missing,
                    Cell::Missing,
                    Cell::Missing,
                    (*value).into(),
                )
            })
            .collect()
    }

    #[test]
    fn test_empty_text_is_missing() {
        let ingestion = run(observations(&["10", "", "7"]));
        assert!(ingestion.report().is_empty(), "{}", ingestion.report());
        let data = ingestion.data().unwrap();
        let values: Vec<Option<f64>> = data.subjects()[0]
            .observations()
            .map(|(_, obs)| obs.value("dv"))
            .collect();
        assert_eq!(values, vec![Some(10.0), None, Some(7.0)]);
    }

    #[test]
    fn test_offending_value_named_once() {
        let ingestion = run(observations(&["10", "<LOQ>", "<LOQ>"]));
        let errors: Vec<&Diagnostic> = ingestion.report().errors().collect();
        assert_eq!(errors.len(), 1);
        match errors[0].finding() {
            Finding::NonNumericValues { column, values, .. } => {
                assert_eq!(column, "dv");
                assert_eq!(values.len(), 1);
                assert!(values.contains("<LOQ>"));
            }
            other => panic!("Unexpected finding {:?}", other),
        }
    }

    #[test]
    fn test_type_errors_stop_before_classification() {
        let ingestion = run(vec![
            row(1, 0.0, 1, "100mg".into(), Cell::Missing, Cell::Missing, Cell::Missing),
            row(1, 1.0, 9, Cell::Missing, Cell::Missing, Cell::Missing, "n/a".into()),
        ]);
        let components: Vec<Component> = ingestion
            .report()
            .diagnostics()
            .iter()
            .map(Diagnostic::component)
            .collect();
        assert_eq!(components, vec![Component::TypeCoercion, Component::TypeCoercion]);
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Sequencing
// ═══════════════════════════════════════════════════════════════════════════════

mod sequencing {
    use super::*;

    #[test]
    fn test_co_timed_observation() {
        let ingestion = run(vec![dose(1, 0.0, 100.0), obs(1, 0.0, 55.0), obs(1, 2.0, 20.0)]);
        let report = ingestion.report();
        assert!(!report.has_errors());
        let warnings: Vec<&Diagnostic> = report.warnings().collect();
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].subject(), Some("1"));
        assert_eq!(warnings[0].time(), Some(0.0));
        assert!(warnings[0]
            .message()
            .starts_with("observation coincides with dose time; value(s) discarded"));

        let data = ingestion.data().unwrap();
        let values: Vec<Option<f64>> = data.subjects()[0]
            .observations()
            .map(|(_, obs)| obs.value("dv"))
            .collect();
        assert_eq!(values, vec![None, Some(20.0)]);
    }

    #[test]
    fn test_accepted_run_keeps_warnings() {
        let (data, report) =
            run(vec![dose(1, 0.0, 100.0), obs(1, 0.0, 55.0), obs(1, 2.0, 20.0)]).into_parts();
        let data = data.unwrap();
        assert_eq!(data.len(), 1);
        assert!(!report.has_errors());
        assert_eq!(report.warning_count(), 1);
        assert!(matches!(
            report.warnings().next().unwrap().finding(),
            Finding::ObservationAtDoseTime { time } if *time == 0.0
        ));
    }

    #[test]
    fn test_warnings_follow_subject_order() {
        let report = run(vec![
            dose(10, 0.0, 100.0),
            obs(10, 0.0, 1.0),
            dose(2, 0.0, 100.0),
            obs(2, 0.0, 1.0),
        ])
        .into_parts()
        .1;
        let subjects: Vec<Option<&str>> = report.warnings().map(Diagnostic::subject).collect();
        assert_eq!(subjects, vec![Some("2"), Some("10")]);
    }

    #[test]
    fn test_subjects_sorted_and_ties_stable() {
        let ingestion = run(vec![
            obs(2, 4.0, 1.0),
            obs(10, 1.0, 1.0),
            obs(2, 1.0, 2.0),
            obs(2, 1.0, 3.0),
        ]);
        let data = ingestion.into_data().unwrap();
        let ids: Vec<&str> = data.iter().map(Subject::id).collect();
        assert_eq!(ids, vec!["2", "10"]);
        let rows: Vec<usize> = data.get_subject("2").unwrap().iter().map(Record::row).collect();
        assert_eq!(rows, vec![2, 3, 0]);
    }

    #[test]
    fn test_missing_time_and_identifier() {
        let ingestion = ingest(
            Table::from_rows(
                &["id", "time", "dv"],
                vec![
                    vec![1.into(), Cell::Missing, 1.0.into()],
                    vec![Cell::Missing, 1.0.into(), 1.0.into()],
                ],
            ),
            &IngestConfig::default(),
        );
        let found = findings(&ingestion);
        assert!(found.contains(&&Finding::MissingTime));
        assert!(found.contains(&&Finding::MissingIdentifier));
        assert!(!ingestion.is_accepted());
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Event types
// ═══════════════════════════════════════════════════════════════════════════════

mod event_types {
    use super::*;

    fn event_free_table() -> Table {
        Table::from_rows(
            &["id", "time", "amt", "dv"],
            vec![
                vec![1.into(), 0.0.into(), 100.0.into(), Cell::Missing],
                vec![1.into(), 1.0.into(), Cell::Missing, 9.0.into()],
            ],
        )
    }

    #[test]
    fn test_unbound_event_type_warns() {
        let ingestion = ingest(event_free_table(), &IngestConfig::default());
        let report = ingestion.report();
        assert!(!report.has_errors());
        assert!(report
            .warnings()
            .any(|d| matches!(d.finding(), Finding::EventTypeUnbound { .. })));
        let data = ingestion.data().unwrap();
        assert!(data.iter().all(|subject| subject.doses().next().is_none()));
    }

    #[test]
    fn test_event_free_dataset_is_silent() {
        let config = IngestConfig::new().with_event_data(false);
        let ingestion = ingest(event_free_table(), &config);
        assert!(ingestion.report().is_empty(), "{}", ingestion.report());
        let data = ingestion.data().unwrap();
        assert_eq!(data.subjects()[0].observations().count(), 2);
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Configuration and determinism
// ═══════════════════════════════════════════════════════════════════════════════

mod configuration {
    use super::*;

    #[test]
    fn test_compartment_aliases() {
        let config = IngestConfig::new()
            .with_compartment_alias("depot", 1)
            .with_compartment_alias("central", 2);
        let table = Table::from_rows(
            &["id", "time", "evid", "amt", "cmt", "dv"],
            vec![
                vec![1.into(), 0.0.into(), 1.into(), 100.0.into(), "depot".into(), Cell::Missing],
                vec![1.into(), 1.0.into(), 0.into(), Cell::Missing, "central".into(), 3.0.into()],
                vec![1.into(), 2.0.into(), 0.into(), Cell::Missing, "lung".into(), 3.0.into()],
            ],
        );
        let ingestion = ingest(table, &config);
        assert_eq!(
            findings(&ingestion),
            vec![&Finding::UnresolvedCompartmentAlias {
                column: "cmt".to_string(),
                values: ["lung".to_string()].into_iter().collect(),
            }]
        );
    }

    #[test]
    fn test_invalid_alias_rejected_once() {
        let config = IngestConfig::new().with_compartment_alias("depot", 0);
        let table = Table::from_rows(
            &["id", "time", "evid", "amt", "cmt"],
            vec![
                vec![1.into(), 0.0.into(), 1.into(), 100.0.into(), "depot".into()],
                vec![1.into(), 12.0.into(), 1.into(), 100.0.into(), "depot".into()],
            ],
        );
        let ingestion = ingest(table, &config);
        let errors: Vec<&Diagnostic> = ingestion.report().errors().collect();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].class(), ErrorClass::Structural);
        assert!(matches!(
            errors[0].finding(),
            Finding::InvalidCompartmentAlias { index: 0, .. }
        ));
    }

    #[test]
    fn test_mandatory_roles() {
        let table = Table::from_rows(&["subject", "dv"], vec![vec![1.into(), 1.0.into()]]);
        let ingestion = ingest(table, &IngestConfig::default());
        let report = ingestion.report();
        assert_eq!(report.error_count(), 2);
        assert!(report
            .errors()
            .all(|d| d.class() == ErrorClass::Structural));
    }

    #[test]
    fn test_filters() {
        let data = run(vec![obs(1, 0.0, 1.0), obs(2, 0.0, 1.0), obs(3, 0.0, 1.0)])
            .into_data()
            .unwrap();
        let kept = data.filter_include(&["1".to_string(), "3".to_string()]);
        assert_eq!(kept.len(), 2);
        let dropped = data.filter_exclude(&["1".to_string()]);
        assert!(dropped.get_subject("1").is_none());
        assert_eq!(dropped.len(), 2);
    }

    #[test]
    fn test_runs_are_identical() {
        let rows = || {
            vec![
                dose(2, 0.0, 100.0),
                obs(2, 0.0, 1.0),
                dose(1, 0.0, 0.0),
                row(1, 1.0, 3, Cell::Missing, Cell::Missing, Cell::Missing, Cell::Missing),
                obs(3, 5.0, 1.0),
            ]
        };
        let first = run(rows());
        let second = run(rows());
        assert_eq!(
            first.report().to_json().unwrap(),
            second.report().to_json().unwrap()
        );
        assert_eq!(first.report().to_string(), second.report().to_string());

        let config = IngestConfig::default();
        let accepted = || {
            ingest(
                Table::from_rows(&COLUMNS, vec![dose(2, 0.0, 100.0), obs(2, 0.0, 1.0), obs(1, 3.0, 2.0)]),
                &config,
            )
            .into_data()
            .unwrap()
        };
        assert_eq!(
            serde_json::to_string(&accepted()).unwrap(),
            serde_json::to_string(&accepted()).unwrap()
        );
    }
}
