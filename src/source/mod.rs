// src/source/mod.rs

//! Внешние источники оргструктуры (HR/IM-платформы).

pub mod export;

pub use export::{ExportSource, LeaverRecord, SourceExport};

use async_trait::async_trait;
use chrono::Duration;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("Failed to decode payload: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Source does not list leavers")]
    Unsupported,
}

pub type SourceResult<T> = Result<T, SourceError>;

/// Подразделение в том виде, в каком его отдаёт платформа.
/// Идентификаторы бывают и числами, и строками.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct RawDepartment {
    #[serde(default, alias = "dept_id", alias = "department_id", alias = "open_department_id")]
    pub id: Option<Value>,
    #[serde(default, alias = "parentid", alias = "parent_dept_id", alias = "parent_department_id")]
    pub parent_id: Option<Value>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub remark: Option<String>,
}

/// Сотрудник в том виде, в каком его отдаёт платформа
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct RawUser {
    #[serde(default, alias = "userid", alias = "user_id", alias = "open_id")]
    pub id: Option<Value>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default, alias = "name")]
    pub nickname: Option<String>,
    #[serde(default)]
    pub given_name: Option<String>,
    #[serde(default, alias = "remark")]
    pub introduction: Option<String>,
    #[serde(default, alias = "email")]
    pub mail: Option<String>,
    #[serde(default, alias = "jobnumber", alias = "job_no", alias = "employee_no")]
    pub job_number: Option<Value>,
    #[serde(default)]
    pub mobile: Option<Value>,
    #[serde(default, alias = "work_place", alias = "address")]
    pub postal_address: Option<String>,
    #[serde(default, alias = "title")]
    pub position: Option<String>,
    #[serde(default, alias = "department", alias = "dept_id_list", alias = "department_ids")]
    pub departments: Vec<Value>,
}

/// Клиент одной платформы. Пагинация — забота клиента.
#[async_trait]
pub trait SourceClient: Send + Sync {
    async fn fetch_all_departments(&self) -> SourceResult<Vec<RawDepartment>>;

    /// Активные сотрудники
    async fn fetch_all_users(&self) -> SourceResult<Vec<RawUser>>;

    /// Удалённые id уволенных; `window` ограничивает давность увольнения
    async fn fetch_leaver_ids(&self, _window: Option<Duration>) -> SourceResult<Vec<String>> {
        Err(SourceError::Unsupported)
    }
}
