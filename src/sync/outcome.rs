// src/sync/outcome.rs

use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct DepartmentSyncOutcome {
    pub source: String,
    pub seen: usize,
    pub created: usize,
    pub repaired: usize,
}

impl DepartmentSyncOutcome {
    pub fn new(source: &str, seen: usize) -> Self {
        Self {
            source: source.to_string(),
            seen,
            ..Self::default()
        }
    }
}

impl fmt::Display for DepartmentSyncOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "source '{}': {} departments seen, {} created, {} repaired",
            self.source, self.seen, self.created, self.repaired
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum UserChange {
    Created,
    Updated,
    Reactivated,
    Unchanged,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct UserSyncOutcome {
    pub source: String,
    /// Обработано сотрудников из активного списка
    pub synced: usize,
    pub created: usize,
    pub updated: usize,
    pub reactivated: usize,
    pub deprovisioned: usize,
}

impl UserSyncOutcome {
    pub fn new(source: &str) -> Self {
        Self {
            source: source.to_string(),
            ..Self::default()
        }
    }

    pub(crate) fn record(&mut self, change: UserChange) {
        self.synced += 1;
        match change {
            UserChange::Created => self.created += 1,
            UserChange::Updated => self.updated += 1,
            UserChange::Reactivated => self.reactivated += 1,
            UserChange::Unchanged => {}
        }
    }
}

impl fmt::Display for UserSyncOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "source '{}': {} users synced ({} created, {} updated, {} reactivated), {} deprovisioned",
            self.source, self.synced, self.created, self.updated, self.reactivated, self.deprovisioned
        )
    }
}

/// Полный проход по источнику: подразделения, затем пользователи
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SourceSyncOutcome {
    pub departments: DepartmentSyncOutcome,
    pub users: UserSyncOutcome,
}

impl fmt::Display for SourceSyncOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}; {}", self.departments, self.users)
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    Departments,
    Users,
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Scope::Departments => "departments",
            Scope::Users => "users",
        })
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct DriftReport {
    pub scope: Scope,
    pub checked: usize,
    /// DN строк, которых нет в каталоге
    pub stale: Vec<String>,
}

impl fmt::Display for DriftReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} checked {}, {} marked stale", self.scope, self.checked, self.stale.len())
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PushOutcome {
    pub scope: Scope,
    pub pushed: usize,
    /// Из них новых записей в каталоге
    pub created: usize,
}

impl fmt::Display for PushOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} pushed {}, {} new in directory", self.scope, self.pushed, self.created)
    }
}
