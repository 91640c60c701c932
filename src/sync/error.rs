// src/sync/error.rs

use crate::directory::DirectoryError;
use crate::source::SourceError;
use crate::store::StoreError;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Некорректная запись источника
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid {record}: {message}")]
pub struct ValidationError {
    pub record: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(record: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            record: record.into(),
            message: message.into(),
        }
    }
}

/// Ошибка прохода синхронизации. Каждый вариант несёт идентификатор
/// сущности, на которой проход остановился.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("Fetching {what} from source '{flag}' failed: {error}")]
    RemoteFetch {
        flag: String,
        what: &'static str,
        #[source]
        error: SourceError,
    },

    #[error("Directory operation on '{entity}' failed: {error}")]
    Directory {
        entity: String,
        #[source]
        error: DirectoryError,
    },

    #[error("Store operation on '{entity}' failed: {error}")]
    Persistence {
        entity: String,
        #[source]
        error: StoreError,
    },

    #[error("Invariant violated at '{entity}': {message}")]
    Assertion { entity: String, message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    RemoteFetch,
    Directory,
    Persistence,
    Assertion,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Validation => "validation",
            ErrorKind::RemoteFetch => "remote_fetch",
            ErrorKind::Directory => "directory",
            ErrorKind::Persistence => "persistence",
            ErrorKind::Assertion => "assertion",
        };
        f.write_str(name)
    }
}

impl SyncError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SyncError::Validation(_) => ErrorKind::Validation,
            SyncError::RemoteFetch { .. } => ErrorKind::RemoteFetch,
            SyncError::Directory { .. } => ErrorKind::Directory,
            SyncError::Persistence { .. } => ErrorKind::Persistence,
            SyncError::Assertion { .. } => ErrorKind::Assertion,
        }
    }

    pub fn remote(flag: &str, what: &'static str, error: SourceError) -> Self {
        SyncError::RemoteFetch {
            flag: flag.to_string(),
            what,
            error,
        }
    }

    pub fn assertion(entity: impl Into<String>, message: impl Into<String>) -> Self {
        SyncError::Assertion {
            entity: entity.into(),
            message: message.into(),
        }
    }
}

pub type SyncResult<T> = Result<T, SyncError>;

/// Привязывает ошибку нижнего слоя к сущности
pub(crate) trait Context<T> {
    fn on(self, entity: impl fmt::Display) -> SyncResult<T>;
}

impl<T> Context<T> for Result<T, StoreError> {
    fn on(self, entity: impl fmt::Display) -> SyncResult<T> {
        self.map_err(|error| SyncError::Persistence {
            entity: entity.to_string(),
            error,
        })
    }
}

impl<T> Context<T> for Result<T, DirectoryError> {
    fn on(self, entity: impl fmt::Display) -> SyncResult<T> {
        self.map_err(|error| SyncError::Directory {
            entity: entity.to_string(),
            error,
        })
    }
}
