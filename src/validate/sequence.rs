use crate::data::{RecordKind, Subject};
use crate::validate::report::{Component, Diagnostic, Finding};

/// Order a subject's records and settle observations that coincide with a dose
///
/// Records are sorted by time, keeping input order on ties. Every observation
/// sharing its time with a dose of the same subject has its values replaced
/// by the missing marker, and one warning is raised per such time.
pub fn sequence(subject: &mut Subject) -> Vec<Diagnostic> {
    subject.sort();

    let dose_times: Vec<f64> = subject.doses().map(|(record, _)| record.time()).collect();
    if dose_times.is_empty() {
        return Vec::new();
    }

    let id = subject.id().to_string();
    let mut warnings: Vec<Diagnostic> = Vec::new();
    let mut last_warned: Option<f64> = None;
    for record in subject.records_mut() {
        let time = record.time();
        let row = record.row();
        if !dose_times.contains(&time) {
            continue;
        }
        if let RecordKind::Observation(observation) = record.kind_mut() {
            observation.discard_values();
            // Records are sorted, so one lookback finds a repeated time
            if last_warned != Some(time) {
                last_warned = Some(time);
                warnings.push(
                    Diagnostic::new(Component::Sequencer, Finding::ObservationAtDoseTime { time })
                        .with_subject(id.as_str())
                        .with_row(row)
                        .with_time(time),
                );
            }
        }
    }

    if !warnings.is_empty() {
        tracing::debug!(subject = %id, times = warnings.len(), "Discarded co-timed observations");
    }
    warnings
}
