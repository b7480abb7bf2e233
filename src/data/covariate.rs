use crate::data::compare_ids;
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fmt};

/// How a covariate is expected to behave over a subject's timeline
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum CovariateMode {
    /// One value per subject; a single missing cell makes it missing for the subject
    #[default]
    Constant,
    /// A value per record; missingness is tracked per timepoint
    TimeVarying,
}

/// A non-missing covariate value
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub enum CovariateValue {
    Number(f64),
    Text(String),
}

impl fmt::Display for CovariateValue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            CovariateValue::Number(value) => write!(f, "{}", crate::data::table::format_number(*value)),
            CovariateValue::Text(text) => write!(f, "{}", text),
        }
    }
}

/// A covariate observed at one timepoint
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CovariatePoint {
    time: f64,
    row: usize,
    value: Option<CovariateValue>,
}

impl CovariatePoint {
    pub(crate) fn new(time: f64, row: usize, value: Option<CovariateValue>) -> Self {
        CovariatePoint { time, row, value }
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn row(&self) -> usize {
        self.row
    }

    pub fn value(&self) -> Option<&CovariateValue> {
        self.value.as_ref()
    }

    pub fn is_missing(&self) -> bool {
        self.value.is_none()
    }
}

/// The audited value of one covariate for one subject
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub enum CovariateEntry {
    /// Subject-level value, `None` when any record lacks it
    Constant(Option<CovariateValue>),
    /// Per-record values in time order
    TimeVarying(Vec<CovariatePoint>),
}

impl CovariateEntry {
    /// Whether any part of this entry is missing
    pub fn is_missing(&self) -> bool {
        match self {
            CovariateEntry::Constant(value) => value.is_none(),
            CovariateEntry::TimeVarying(points) => points.iter().any(CovariatePoint::is_missing),
        }
    }

    /// Value in effect at `time`
    ///
    /// Constant covariates answer for any time. Time-varying covariates
    /// carry the last value at or before `time` forward; a missing cell at that
    /// point yields `None` rather than an earlier value.
    pub fn value_at(&self, time: f64) -> Option<&CovariateValue> {
        match self {
            CovariateEntry::Constant(value) => value.as_ref(),
            CovariateEntry::TimeVarying(points) => points
                .iter()
                .take_while(|point| point.time <= time)
                .last()
                .and_then(CovariatePoint::value),
        }
    }
}

/// Covariate values per subject and covariate name
///
/// Missingness is kept per (subject, covariate) pair; nothing is imputed.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct CovariateTable {
    subjects: BTreeMap<String, BTreeMap<String, CovariateEntry>>,
}

impl CovariateTable {
    pub fn new() -> Self {
        CovariateTable::default()
    }

    pub(crate) fn insert(&mut self, subject: &str, covariate: &str, entry: CovariateEntry) {
        self.subjects
            .entry(subject.to_string())
            .or_default()
            .insert(covariate.to_string(), entry);
    }

    /// Get all covariates of a subject
    pub fn subject(&self, id: &str) -> Option<&BTreeMap<String, CovariateEntry>> {
        self.subjects.get(id)
    }

    /// Get one covariate of one subject
    pub fn get(&self, subject: &str, covariate: &str) -> Option<&CovariateEntry> {
        self.subjects.get(subject).and_then(|c| c.get(covariate))
    }

    /// Subject ids with missing data for `covariate`, in id order
    pub fn missing_for(&self, covariate: &str) -> Vec<&str> {
        let mut subjects = self
            .subjects
            .iter()
            .filter(|(_, covariates)| covariates.get(covariate).is_some_and(CovariateEntry::is_missing))
            .map(|(id, _)| id.as_str())
            .collect::<Vec<_>>();
        subjects.sort_by(|a, b| compare_ids(a, b));
        subjects
    }

    pub fn len(&self) -> usize {
        self.subjects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subjects.is_empty()
    }
}

impl fmt::Display for CovariateTable {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for (id, covariates) in &self.subjects {
            writeln!(f, "Subject {}:", id)?;
            for (name, entry) in covariates {
                match entry {
                    CovariateEntry::Constant(Some(value)) => writeln!(f, "  {}: {}", name, value)?,
                    CovariateEntry::Constant(None) => writeln!(f, "  {}: <missing>", name)?,
                    CovariateEntry::TimeVarying(points) => {
                        write!(f, "  {}:", name)?;
                        for point in points {
                            match &point.value {
                                Some(value) => write!(f, " [{}] {}", point.time, value)?,
                                None => write!(f, " [{}] <missing>", point.time)?,
                            }
                        }
                        writeln!(f)?;
                    }
                }
            }
        }
        Ok(())
    }
}
