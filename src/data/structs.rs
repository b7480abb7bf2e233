use crate::data::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// The validated output of an ingestion run
///
/// [Data] is a collection of [Subject]s sorted by identifier, together with the
/// audited [CovariateTable]. It is only handed out by a run that raised no
/// errors, see [Ingestion::into_parts](crate::validate::Ingestion::into_parts).
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Data {
    subjects: Vec<Subject>,
    covariates: CovariateTable,
}

impl Data {
    pub(crate) fn new(subjects: Vec<Subject>, covariates: CovariateTable) -> Self {
        Data {
            subjects,
            covariates,
        }
    }

    /// Get a vector of references to all subjects in the dataset
    pub fn subjects(&self) -> Vec<&Subject> {
        self.subjects.iter().collect()
    }

    /// Get the audited covariates of every subject
    pub fn covariates(&self) -> &CovariateTable {
        &self.covariates
    }

    /// Get a specific subject by ID
    ///
    /// # Returns
    ///
    /// An `Option` containing a reference to the subject if found, or `None` if not found
    pub fn get_subject(&self, id: &str) -> Option<&Subject> {
        self.subjects.iter().find(|subject| subject.id() == id)
    }

    /// Filter the dataset to include only subjects with specific IDs
    ///
    /// Covariates of the excluded subjects are dropped as well.
    pub fn filter_include(&self, include: &[String]) -> Data {
        self.filter(|id| include.iter().any(|i| i == id))
    }

    /// Filter the dataset to exclude subjects with specific IDs
    pub fn filter_exclude(&self, exclude: &[String]) -> Data {
        self.filter(|id| !exclude.iter().any(|i| i == id))
    }

    fn filter(&self, keep: impl Fn(&str) -> bool) -> Data {
        let subjects: Vec<Subject> = self
            .subjects
            .iter()
            .filter(|subject| keep(subject.id()))
            .cloned()
            .collect();
        let mut covariates = CovariateTable::new();
        for subject in &subjects {
            if let Some(entries) = self.covariates.subject(subject.id()) {
                for (name, entry) in entries {
                    covariates.insert(subject.id(), name, entry.clone());
                }
            }
        }
        Data::new(subjects, covariates)
    }

    pub fn iter(&'_ self) -> std::slice::Iter<'_, Subject> {
        self.subjects.iter()
    }

    /// Get the number of subjects in the dataset
    pub fn len(&self) -> usize {
        self.subjects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subjects.is_empty()
    }
}

impl IntoIterator for Data {
    type Item = Subject;
    type IntoIter = std::vec::IntoIter<Subject>;
    fn into_iter(self) -> Self::IntoIter {
        self.subjects.into_iter()
    }
}

impl<'a> IntoIterator for &'a Data {
    type Item = &'a Subject;
    type IntoIter = std::slice::Iter<'a, Subject>;
    fn into_iter(self) -> Self::IntoIter {
        self.subjects.iter()
    }
}

/// A subject and its time-ordered records
///
/// Records are sorted by time; ties keep the order of the input rows.
#[derive(Serialize, Debug, Deserialize, Clone, PartialEq)]
pub struct Subject {
    id: String,
    records: Vec<Record>,
}

impl Subject {
    pub(crate) fn new(id: String) -> Self {
        Subject {
            id,
            records: Vec::new(),
        }
    }

    pub(crate) fn push(&mut self, record: Record) {
        self.records.push(record);
    }

    /// Stable sort on time, so rows sharing a time keep their input order
    pub(crate) fn sort(&mut self) {
        self.records.sort_by(|a, b| a.time().total_cmp(&b.time()));
    }

    pub(crate) fn records_mut(&mut self) -> &mut Vec<Record> {
        &mut self.records
    }

    /// Get the ID of the subject
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Iterate over the dosing records of this subject
    pub fn doses(&self) -> impl Iterator<Item = (&Record, &DoseEvent)> {
        self.records
            .iter()
            .filter_map(|record| record.as_dose().map(|dose| (record, dose)))
    }

    /// Iterate over the observation records of this subject
    pub fn observations(&self) -> impl Iterator<Item = (&Record, &Observation)> {
        self.records
            .iter()
            .filter_map(|record| record.as_observation().map(|obs| (record, obs)))
    }

    /// Every administration time, with additional doses expanded
    pub fn dose_times(&self) -> Vec<f64> {
        let mut times: Vec<f64> = self
            .doses()
            .flat_map(|(record, dose)| dose.administration_times(record.time()))
            .collect();
        times.sort_by(f64::total_cmp);
        times
    }

    pub fn iter(&'_ self) -> std::slice::Iter<'_, Record> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Order subject identifiers
///
/// Numeric labels compare by value and come before textual ones, so `2` sorts
/// before `10`. Textual labels compare lexicographically.
pub fn compare_ids(a: &str, b: &str) -> Ordering {
    let numeric = |id: &str| id.parse::<f64>().ok().filter(|v| v.is_finite());
    match (numeric(a), numeric(b)) {
        (Some(x), Some(y)) => x.total_cmp(&y).then_with(|| a.cmp(b)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.cmp(b),
    }
}

impl<'a> IntoIterator for &'a Subject {
    type Item = &'a Record;
    type IntoIter = std::slice::Iter<'a, Record>;
    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

impl fmt::Display for Data {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "Data Overview: {} subjects", self.subjects.len())?;
        for subject in &self.subjects {
            writeln!(f, "{}", subject)?;
        }
        if !self.covariates.is_empty() {
            writeln!(f, "Covariates:\n{}", self.covariates)?;
        }
        Ok(())
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "Subject ID: {}", self.id)?;
        for record in &self.records {
            writeln!(f, "  {}", record)?;
        }
        Ok(())
    }
}
