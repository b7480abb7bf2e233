use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A timed entry in a subject's sequence
///
/// Every [Record] keeps the index of the input row it was derived from, so any
/// downstream finding can be traced back to the raw table.
#[derive(Serialize, Debug, Clone, PartialEq, Deserialize)]
pub struct Record {
    time: f64,
    row: usize,
    kind: RecordKind,
}

/// The two kinds of timed records
#[derive(Serialize, Debug, Clone, PartialEq, Deserialize)]
pub enum RecordKind {
    /// Administration of an amount into a compartment
    Dose(DoseEvent),
    /// One or more measured values
    Observation(Observation),
}

impl Record {
    pub(crate) fn dose(time: f64, row: usize, dose: DoseEvent) -> Self {
        Record {
            time,
            row,
            kind: RecordKind::Dose(dose),
        }
    }

    pub(crate) fn observation(time: f64, row: usize, observation: Observation) -> Self {
        Record {
            time,
            row,
            kind: RecordKind::Observation(observation),
        }
    }

    /// Get the time of the record
    pub fn time(&self) -> f64 {
        self.time
    }

    /// Get the index of the originating input row (zero-based, header excluded)
    pub fn row(&self) -> usize {
        self.row
    }

    pub fn kind(&self) -> &RecordKind {
        &self.kind
    }

    pub(crate) fn kind_mut(&mut self) -> &mut RecordKind {
        &mut self.kind
    }

    pub fn is_dose(&self) -> bool {
        matches!(self.kind, RecordKind::Dose(_))
    }

    pub fn is_observation(&self) -> bool {
        matches!(self.kind, RecordKind::Observation(_))
    }

    /// Get the dose carried by this record, if it is one
    pub fn as_dose(&self) -> Option<&DoseEvent> {
        match &self.kind {
            RecordKind::Dose(dose) => Some(dose),
            RecordKind::Observation(_) => None,
        }
    }

    /// Get the observation carried by this record, if it is one
    pub fn as_observation(&self) -> Option<&Observation> {
        match &self.kind {
            RecordKind::Observation(observation) => Some(observation),
            RecordKind::Dose(_) => None,
        }
    }
}

/// A validated dosing event
///
/// The amount is strictly positive. `interval` and `repeat` are either both
/// zero or both strictly positive, describing `repeat + 1` administrations
/// spaced `interval` apart.
#[derive(Serialize, Debug, Clone, PartialEq, Deserialize)]
pub struct DoseEvent {
    amount: f64,
    compartment: Option<usize>,
    interval: f64,
    repeat: u32,
    duration: f64,
}

impl DoseEvent {
    pub(crate) fn new(
        amount: f64,
        compartment: Option<usize>,
        interval: f64,
        repeat: u32,
        duration: f64,
    ) -> Self {
        DoseEvent {
            amount,
            compartment,
            interval,
            repeat,
            duration,
        }
    }

    /// Get the administered amount of each dose
    pub fn amount(&self) -> f64 {
        self.amount
    }

    /// Get the one-based compartment index, `None` when no compartment role is bound
    pub fn compartment(&self) -> Option<usize> {
        self.compartment
    }

    /// Get the inter-dose interval, zero for a single dose
    pub fn interval(&self) -> f64 {
        self.interval
    }

    /// Get the number of additional doses after the first
    pub fn repeat(&self) -> u32 {
        self.repeat
    }

    /// Get the infusion duration, zero for a bolus
    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn is_infusion(&self) -> bool {
        self.duration > 0.0
    }

    /// Times of every administration described by this event
    ///
    /// # Example
    ///
    /// A dose at time 0 with two additional doses every 12 hours is given at
    /// 0, 12 and 24.
    pub fn administration_times(&self, start: f64) -> Vec<f64> {
        (0..=self.repeat)
            .map(|i| start + self.interval * i as f64)
            .collect()
    }
}

/// A validated observation
///
/// Values are keyed by observation column. A `None` value is the missing
/// marker, either missing in the input or discarded during sequencing.
#[derive(Serialize, Debug, Clone, PartialEq, Deserialize)]
pub struct Observation {
    values: BTreeMap<String, Option<f64>>,
    compartment: Option<usize>,
}

impl Observation {
    pub(crate) fn new(values: BTreeMap<String, Option<f64>>, compartment: Option<usize>) -> Self {
        Observation {
            values,
            compartment,
        }
    }

    pub fn values(&self) -> &BTreeMap<String, Option<f64>> {
        &self.values
    }

    /// Get the value of a single observation column
    pub fn value(&self, column: &str) -> Option<f64> {
        self.values.get(column).copied().flatten()
    }

    pub fn compartment(&self) -> Option<usize> {
        self.compartment
    }

    /// Whether at least one value is present
    pub fn has_values(&self) -> bool {
        self.values.values().any(Option::is_some)
    }

    /// Replace every value with the missing marker
    pub(crate) fn discard_values(&mut self) {
        for value in self.values.values_mut() {
            *value = None;
        }
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.kind {
            RecordKind::Dose(dose) => {
                write!(f, "Dose at time {:.2} with amount {:.2}", self.time, dose.amount)?;
                if let Some(cmt) = dose.compartment {
                    write!(f, " in compartment {}", cmt)?;
                }
                if dose.is_infusion() {
                    write!(f, " over {:.2}", dose.duration)?;
                }
                if dose.repeat > 0 {
                    write!(f, " (+{} every {:.2})", dose.repeat, dose.interval)?;
                }
                Ok(())
            }
            RecordKind::Observation(observation) => {
                write!(f, "Observation at time {:.2}:", self.time)?;
                for (column, value) in &observation.values {
                    match value {
                        Some(v) => write!(f, " {}={}", column, v)?,
                        None => write!(f, " {}=.", column)?,
                    }
                }
                if let Some(cmt) = observation.compartment {
                    write!(f, " (compartment {})", cmt)?;
                }
                Ok(())
            }
        }
    }
}
