//! Column-role configuration
//!
//! [IngestConfig] binds the logical roles of the engine to physical column
//! names. It can be built in code or read from JSON using the camelCase keys
//! below; every key is optional.
//!
//! ```json
//! {
//!   "idColumn": "ID",
//!   "timeColumn": "TIME",
//!   "observationColumns": ["DV"],
//!   "covariateColumns": ["WT", "CRCL"],
//!   "covariateModes": { "CRCL": "timeVarying" },
//!   "compartmentAliasMap": { "depot": 1, "central": 2 }
//! }
//! ```

use crate::data::CovariateMode;
use crate::error::PkIngestError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::Path;

/// A logical role a column can play
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Id,
    Time,
    Amt,
    Evid,
    Cmt,
    Ii,
    Addl,
    Dur,
    Observation,
    Covariate,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            Role::Id => "id",
            Role::Time => "time",
            Role::Amt => "amt",
            Role::Evid => "evid",
            Role::Cmt => "cmt",
            Role::Ii => "ii",
            Role::Addl => "addl",
            Role::Dur => "dur",
            Role::Observation => "observation",
            Role::Covariate => "covariate",
        };
        f.write_str(name)
    }
}

impl Role {
    /// Column name used when the role is not configured
    pub fn default_column(&self) -> Option<&'static str> {
        match self {
            Role::Id => Some("id"),
            Role::Time => Some("time"),
            Role::Amt => Some("amt"),
            Role::Evid => Some("evid"),
            Role::Cmt => Some("cmt"),
            Role::Ii => Some("ii"),
            Role::Addl => Some("addl"),
            Role::Dur => Some("dur"),
            Role::Observation => Some("dv"),
            Role::Covariate => None,
        }
    }
}

/// Configuration of one ingestion run
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct IngestConfig {
    pub id_column: Option<String>,
    pub time_column: Option<String>,
    pub amt_column: Option<String>,
    pub evid_column: Option<String>,
    pub cmt_column: Option<String>,
    pub ii_column: Option<String>,
    pub addl_column: Option<String>,
    pub dur_column: Option<String>,
    /// Observation value columns; `dv` when empty and present in the table
    pub observation_columns: BTreeSet<String>,
    pub covariate_columns: BTreeSet<String>,
    /// Per-covariate mode; covariates not listed are [CovariateMode::Constant]
    pub covariate_modes: BTreeMap<String, CovariateMode>,
    /// Treat every column not bound to another role as a covariate
    pub unbound_as_covariates: bool,
    /// When false, every row is an observation and no event checks run
    pub event_data: bool,
    /// Event-type code of a dosing row
    pub dose_evid: i64,
    /// Event-type code of an observation row
    pub observation_evid: i64,
    /// Symbolic compartment names and their one-based indices
    ///
    /// An index below one is a structural error when columns are resolved.
    pub compartment_alias_map: BTreeMap<String, i64>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        IngestConfig {
            id_column: None,
            time_column: None,
            amt_column: None,
            evid_column: None,
            cmt_column: None,
            ii_column: None,
            addl_column: None,
            dur_column: None,
            observation_columns: BTreeSet::new(),
            covariate_columns: BTreeSet::new(),
            covariate_modes: BTreeMap::new(),
            unbound_as_covariates: false,
            event_data: true,
            dose_evid: 1,
            observation_evid: 0,
            compartment_alias_map: BTreeMap::new(),
        }
    }
}

impl IngestConfig {
    pub fn new() -> Self {
        IngestConfig::default()
    }

    /// Parse a configuration from JSON text
    pub fn from_json(json: &str) -> Result<Self, PkIngestError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read a configuration from a JSON file
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, PkIngestError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// The explicitly configured column of a single-column role
    pub fn column(&self, role: Role) -> Option<&str> {
        match role {
            Role::Id => self.id_column.as_deref(),
            Role::Time => self.time_column.as_deref(),
            Role::Amt => self.amt_column.as_deref(),
            Role::Evid => self.evid_column.as_deref(),
            Role::Cmt => self.cmt_column.as_deref(),
            Role::Ii => self.ii_column.as_deref(),
            Role::Addl => self.addl_column.as_deref(),
            Role::Dur => self.dur_column.as_deref(),
            Role::Observation | Role::Covariate => None,
        }
    }

    /// Bind a single-column role to a column
    ///
    /// Observation and covariate columns are added to their sets instead.
    pub fn with_column(mut self, role: Role, column: impl Into<String>) -> Self {
        let column = Some(column.into());
        match role {
            Role::Id => self.id_column = column,
            Role::Time => self.time_column = column,
            Role::Amt => self.amt_column = column,
            Role::Evid => self.evid_column = column,
            Role::Cmt => self.cmt_column = column,
            Role::Ii => self.ii_column = column,
            Role::Addl => self.addl_column = column,
            Role::Dur => self.dur_column = column,
            Role::Observation => self.observation_columns.extend(column),
            Role::Covariate => self.covariate_columns.extend(column),
        }
        self
    }

    pub fn with_observation(mut self, column: impl Into<String>) -> Self {
        self.observation_columns.insert(column.into());
        self
    }

    /// Declare a covariate column and how its missingness is judged
    pub fn with_covariate(mut self, column: impl Into<String>, mode: CovariateMode) -> Self {
        let column = column.into();
        self.covariate_modes.insert(column.clone(), mode);
        self.covariate_columns.insert(column);
        self
    }

    pub fn with_event_data(mut self, event_data: bool) -> Self {
        self.event_data = event_data;
        self
    }

    pub fn with_unbound_as_covariates(mut self, enabled: bool) -> Self {
        self.unbound_as_covariates = enabled;
        self
    }

    pub fn with_compartment_alias(mut self, alias: impl Into<String>, index: i64) -> Self {
        self.compartment_alias_map.insert(alias.into(), index);
        self
    }

    /// Mode of a covariate column, constant unless configured otherwise
    pub fn covariate_mode(&self, column: &str) -> CovariateMode {
        self.covariate_modes.get(column).copied().unwrap_or_default()
    }
}
