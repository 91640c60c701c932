// src/directory/mod.rs

//! Каталог LDAP как внешний участник синхронизации.

pub mod dn;
pub mod filter;
pub mod local;

pub use filter::{Filter, FilterError};
pub use local::LocalDirectory;

use crate::models::{Department, User};
use crate::raddb::RadDbError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Ошибки каталога
#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("No entry matches {0}")]
    NotFound(String),
    #[error("Entry already exists: {0}")]
    AlreadyExists(String),
    #[error("Parent entry of {0} does not exist")]
    NoSuchParent(String),
    #[error("Invalid filter: {0}")]
    InvalidFilter(#[from] FilterError),
    #[error("Storage error: {0}")]
    Storage(#[from] RadDbError),
    #[error("Directory operation failed: {0}")]
    Operation(String),
}

pub type DirectoryResult<T> = Result<T, DirectoryError>;

/// Запись каталога: DN и многозначные атрибуты
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub dn: String,
    pub attributes: BTreeMap<String, Vec<String>>,
}

impl Entry {
    pub fn new(dn: &str) -> Self {
        Self {
            dn: dn.to_string(),
            attributes: BTreeMap::new(),
        }
    }

    pub fn set(&mut self, attr: &str, values: Vec<String>) {
        if values.is_empty() {
            self.attributes.remove(attr);
        } else {
            self.attributes.insert(attr.to_string(), values);
        }
    }

    /// Однозначный атрибут; пустое значение не записывается
    pub fn set_one(&mut self, attr: &str, value: &str) {
        if !value.is_empty() {
            self.attributes.insert(attr.to_string(), vec![value.to_string()]);
        }
    }

    /// Имена атрибутов сравниваются без учёта регистра
    pub fn get(&self, attr: &str) -> Option<&[String]> {
        self.attributes
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(attr))
            .map(|(_, values)| values.as_slice())
    }

    pub fn first(&self, attr: &str) -> Option<&str> {
        self.get(attr).and_then(|v| v.first()).map(String::as_str)
    }

    pub fn has_object_class(&self, class: &str) -> bool {
        self.get("objectClass")
            .is_some_and(|classes| classes.iter().any(|c| c.eq_ignore_ascii_case(class)))
    }

    pub(crate) fn values_mut(&mut self, attr: &str) -> &mut Vec<String> {
        let key = self
            .attributes
            .keys()
            .find(|name| name.eq_ignore_ascii_case(attr))
            .cloned()
            .unwrap_or_else(|| attr.to_string());
        self.attributes.entry(key).or_default()
    }
}

/// Операции каталога, которые использует синхронизация
#[async_trait]
pub trait Directory: Send + Sync {
    /// Первая запись, подходящая под фильтр RFC 4515
    async fn find_by_filter(&self, filter: &str) -> DirectoryResult<Entry>;

    async fn exists(&self, filter: &str) -> DirectoryResult<bool> {
        match self.find_by_filter(filter).await {
            Ok(_) => Ok(true),
            Err(DirectoryError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn create_group(&self, department: &Department) -> DirectoryResult<()>;

    async fn create_user(&self, user: &User) -> DirectoryResult<()>;

    /// Заменяет атрибуты профиля; DN не меняется
    async fn update_user(&self, user: &User) -> DirectoryResult<()>;

    async fn add_user_to_group(&self, group_dn: &str, user_dn: &str) -> DirectoryResult<()>;

    async fn remove_user_from_group(&self, group_dn: &str, user_dn: &str) -> DirectoryResult<()>;

    async fn delete_user(&self, user_dn: &str) -> DirectoryResult<()>;

    async fn list_group_dns(&self) -> DirectoryResult<Vec<String>>;

    async fn list_user_dns(&self) -> DirectoryResult<Vec<String>>;
}

/// Фильтр точного поиска по DN (операционный атрибут entryDN)
pub fn dn_filter(dn: &str) -> String {
    format!("(entryDN={})", filter::escape_value(dn))
}
