use crate::data::CovariateMode;
use crate::validate::config::{IngestConfig, Role};
use crate::validate::report::{Component, Diagnostic, Finding};
use std::collections::{BTreeMap, BTreeSet};

const SINGLE_ROLES: [Role; 8] = [
    Role::Id,
    Role::Time,
    Role::Amt,
    Role::Evid,
    Role::Cmt,
    Role::Ii,
    Role::Addl,
    Role::Dur,
];

/// Roles bound to physical columns of one table
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColumnBinding {
    single: BTreeMap<Role, String>,
    observations: Vec<String>,
    covariates: Vec<(String, CovariateMode)>,
}

impl ColumnBinding {
    /// The column bound to a single-column role
    pub fn get(&self, role: Role) -> Option<&str> {
        self.single.get(&role).map(String::as_str)
    }

    pub fn is_bound(&self, role: Role) -> bool {
        self.single.contains_key(&role)
    }

    pub fn observations(&self) -> &[String] {
        &self.observations
    }

    pub fn covariates(&self) -> &[(String, CovariateMode)] {
        &self.covariates
    }

    /// Every bound column, single roles first
    pub fn bound_columns(&self) -> Vec<&str> {
        self.single
            .values()
            .chain(&self.observations)
            .chain(self.covariates.iter().map(|(column, _)| column))
            .map(String::as_str)
            .collect()
    }

    /// The id column; only valid on a binding without structural errors
    pub(crate) fn id(&self) -> &str {
        self.get(Role::Id).unwrap_or_default()
    }

    /// The time column; only valid on a binding without structural errors
    pub(crate) fn time(&self) -> &str {
        self.get(Role::Time).unwrap_or_default()
    }
}

/// Result of resolving roles against a schema
#[derive(Debug, Clone, Default)]
pub struct Resolution {
    pub binding: ColumnBinding,
    pub diagnostics: Vec<Diagnostic>,
}

impl Resolution {
    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error)
    }
}

struct Resolver<'a> {
    columns: &'a [String],
    claimed: BTreeMap<String, Role>,
    resolution: Resolution,
}

impl<'a> Resolver<'a> {
    /// Find a column by exact name, then case-insensitively
    fn find(&self, name: &str) -> Option<&'a String> {
        let columns = self.columns;
        columns
            .iter()
            .find(|c| c.as_str() == name)
            .or_else(|| columns.iter().find(|c| c.eq_ignore_ascii_case(name)))
    }

    fn error(&mut self, finding: Finding, column: &str) {
        self.resolution
            .diagnostics
            .push(Diagnostic::new(Component::ColumnResolver, finding).with_column(column));
    }

    /// Claim a column for a role, reporting a double binding
    fn claim(&mut self, column: &str, role: Role) -> bool {
        if let Some(first) = self.claimed.get(column).copied() {
            self.error(
                Finding::ColumnBoundTwice {
                    column: column.to_string(),
                    first,
                    second: role,
                },
                column,
            );
            return false;
        }
        self.claimed.insert(column.to_string(), role);
        true
    }

    /// Bind a column named in the configuration
    fn explicit(&mut self, role: Role, name: &str) -> Option<String> {
        match self.find(name) {
            Some(column) => {
                let column = column.clone();
                self.claim(&column, role).then_some(column)
            }
            None => {
                self.error(
                    Finding::ColumnNotFound {
                        role,
                        column: name.to_string(),
                    },
                    name,
                );
                None
            }
        }
    }

    /// Bind the conventional column of a role if it exists and is free
    fn fallback(&mut self, role: Role) -> Option<String> {
        let name = role.default_column()?;
        let column = self.find(name)?.clone();
        if self.claimed.contains_key(&column) {
            return None;
        }
        self.claimed.insert(column.clone(), role);
        Some(column)
    }
}

/// Map configured roles onto the columns of a table
///
/// Explicitly configured columns are bound first and must exist. Roles left
/// unconfigured then fall back to their conventional name when such a column
/// exists and is not already taken. `id` and `time` must end up bound.
pub fn resolve(columns: &[String], config: &IngestConfig) -> Resolution {
    let mut resolver = Resolver {
        columns,
        claimed: BTreeMap::new(),
        resolution: Resolution::default(),
    };

    let mut seen = BTreeSet::new();
    for column in columns {
        if !seen.insert(column.as_str()) {
            resolver.error(
                Finding::DuplicateColumn {
                    column: column.clone(),
                },
                column,
            );
        }
    }

    for (alias, index) in &config.compartment_alias_map {
        if *index < 1 {
            resolver.resolution.diagnostics.push(Diagnostic::new(
                Component::ColumnResolver,
                Finding::InvalidCompartmentAlias {
                    alias: alias.clone(),
                    index: *index,
                },
            ));
        }
    }

    let roles: Vec<Role> = SINGLE_ROLES
        .into_iter()
        .filter(|role| config.event_data || *role != Role::Evid)
        .collect();

    for role in &roles {
        if let Some(name) = config.column(*role) {
            if let Some(column) = resolver.explicit(*role, name) {
                resolver.resolution.binding.single.insert(*role, column);
            }
        }
    }
    for name in &config.observation_columns {
        if let Some(column) = resolver.explicit(Role::Observation, name) {
            resolver.resolution.binding.observations.push(column);
        }
    }
    for name in &config.covariate_columns {
        if let Some(column) = resolver.explicit(Role::Covariate, name) {
            let mode = config.covariate_mode(name);
            resolver.resolution.binding.covariates.push((column, mode));
        }
    }

    for role in &roles {
        if config.column(*role).is_some() {
            continue;
        }
        match resolver.fallback(*role) {
            Some(column) => {
                resolver.resolution.binding.single.insert(*role, column);
            }
            None if matches!(role, Role::Id | Role::Time) => {
                let column = role.default_column().unwrap_or_default();
                resolver.error(
                    Finding::MandatoryRoleUnresolved {
                        role: *role,
                        column: column.to_string(),
                    },
                    column,
                );
            }
            None => {}
        }
    }
    if config.observation_columns.is_empty() {
        if let Some(column) = resolver.fallback(Role::Observation) {
            resolver.resolution.binding.observations.push(column);
        }
    }

    if config.unbound_as_covariates {
        for column in columns {
            if !resolver.claimed.contains_key(column) {
                resolver.claimed.insert(column.clone(), Role::Covariate);
                let mode = config.covariate_mode(column);
                resolver
                    .resolution
                    .binding
                    .covariates
                    .push((column.clone(), mode));
            }
        }
    }

    if resolver.resolution.binding.observations.is_empty() {
        resolver.resolution.diagnostics.push(Diagnostic::new(
            Component::ColumnResolver,
            Finding::NoObservationColumns,
        ));
    }

    tracing::debug!(
        bound = resolver.claimed.len(),
        observations = resolver.resolution.binding.observations.len(),
        covariates = resolver.resolution.binding.covariates.len(),
        "Resolved column roles"
    );
    resolver.resolution
}
