// src/store/criteria.rs

use crate::directory::dn;
use crate::models::{Department, SyncState, User, UserStatus};
use std::fmt;

/// Одно условие запроса. Строки сравниваются точно, DN — без учёта
/// регистра и пробелов вокруг запятых.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Criterion {
    Id(u64),
    SourceId(String),
    Dn(String),
    Source(String),
    Status(UserStatus),
    SyncState(SyncState),
}

impl fmt::Display for Criterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Criterion::Id(id) => write!(f, "id={id}"),
            Criterion::SourceId(v) => write!(f, "source_id={v}"),
            Criterion::Dn(v) => write!(f, "dn={v}"),
            Criterion::Source(v) => write!(f, "source={v}"),
            Criterion::Status(v) => write!(f, "status={v}"),
            Criterion::SyncState(v) => write!(f, "sync_state={v}"),
        }
    }
}

/// Конъюнкция условий; пустой набор подходит под любую строку
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Criteria {
    terms: Vec<Criterion>,
}

impl Criteria {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn and(mut self, term: Criterion) -> Self {
        self.terms.push(term);
        self
    }

    pub fn id(self, id: u64) -> Self {
        self.and(Criterion::Id(id))
    }

    pub fn source_id(self, value: impl Into<String>) -> Self {
        self.and(Criterion::SourceId(value.into()))
    }

    pub fn dn(self, value: impl Into<String>) -> Self {
        self.and(Criterion::Dn(value.into()))
    }

    pub fn source(self, value: impl Into<String>) -> Self {
        self.and(Criterion::Source(value.into()))
    }

    pub fn status(self, status: UserStatus) -> Self {
        self.and(Criterion::Status(status))
    }

    pub fn sync_state(self, state: SyncState) -> Self {
        self.and(Criterion::SyncState(state))
    }

    pub fn matches<R: Record>(&self, record: &R) -> bool {
        self.terms.iter().all(|term| record.matches(term))
    }
}

impl fmt::Display for Criteria {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.terms.is_empty() {
            return f.write_str("*");
        }
        let parts: Vec<String> = self.terms.iter().map(ToString::to_string).collect();
        f.write_str(&parts.join(" AND "))
    }
}

/// Строка хранилища, к которой применимы условия
pub trait Record {
    const ENTITY: &'static str;

    fn id(&self) -> u64;

    fn matches(&self, term: &Criterion) -> bool;
}

impl Record for Department {
    const ENTITY: &'static str = "department";

    fn id(&self) -> u64 {
        self.id
    }

    fn matches(&self, term: &Criterion) -> bool {
        match term {
            Criterion::Id(id) => self.id == *id,
            Criterion::SourceId(v) => &self.source_dept_id == v,
            Criterion::Dn(v) => dn::eq(&self.group_dn, v),
            Criterion::Source(v) => &self.source == v,
            Criterion::SyncState(s) => self.sync_state == *s,
            // у подразделений нет статуса
            Criterion::Status(_) => false,
        }
    }
}

impl Record for User {
    const ENTITY: &'static str = "user";

    fn id(&self) -> u64 {
        self.id
    }

    fn matches(&self, term: &Criterion) -> bool {
        match term {
            Criterion::Id(id) => self.id == *id,
            Criterion::SourceId(v) => &self.source_user_id == v,
            Criterion::Dn(v) => dn::eq(&self.user_dn, v),
            Criterion::Source(v) => &self.source == v,
            Criterion::Status(s) => self.status == *s,
            Criterion::SyncState(s) => self.sync_state == *s,
        }
    }
}
