// src/store/mod.rs

//! Реляционное хранилище подразделений и пользователей.

pub mod criteria;
pub mod rad;

pub use criteria::{Criteria, Criterion, Record};
pub use rad::RadStore;

use crate::models::{Department, SyncState, User, UserStatus};
use crate::raddb::RadDbError;
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{entity} not found: {criteria}")]
    NotFound { entity: &'static str, criteria: String },
    #[error("{entity} already exists: {key}")]
    Duplicate { entity: &'static str, key: String },
    #[error("Storage error: {0}")]
    Backend(#[from] RadDbError),
}

impl StoreError {
    pub fn not_found<R: Record>(criteria: impl ToString) -> Self {
        StoreError::NotFound {
            entity: R::ENTITY,
            criteria: criteria.to_string(),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait DepartmentStore: Send + Sync {
    /// Первая строка (по возрастанию id), подходящая под условия
    async fn find(&self, criteria: &Criteria) -> StoreResult<Option<Department>>;

    async fn exists(&self, criteria: &Criteria) -> StoreResult<bool> {
        Ok(self.find(criteria).await?.is_some())
    }

    /// Назначает id и сохраняет строку; DN должен быть уникален
    async fn create(&self, department: Department) -> StoreResult<Department>;

    async fn update(&self, department: &Department) -> StoreResult<()>;

    async fn change_sync_state(&self, id: u64, state: SyncState) -> StoreResult<()>;

    /// Строки в порядке `ids`; отсутствующий id — ошибка NotFound
    async fn get_by_ids(&self, ids: &[u64]) -> StoreResult<Vec<Department>>;

    async fn list(&self, criteria: &Criteria) -> StoreResult<Vec<Department>>;

    async fn list_all(&self) -> StoreResult<Vec<Department>> {
        self.list(&Criteria::new()).await
    }
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find(&self, criteria: &Criteria) -> StoreResult<Option<User>>;

    async fn exists(&self, criteria: &Criteria) -> StoreResult<bool> {
        Ok(self.find(criteria).await?.is_some())
    }

    async fn create(&self, user: User) -> StoreResult<User>;

    async fn update(&self, user: &User) -> StoreResult<()>;

    async fn change_status(&self, id: u64, status: UserStatus) -> StoreResult<()>;

    async fn change_sync_state(&self, id: u64, state: SyncState) -> StoreResult<()>;

    async fn get_by_ids(&self, ids: &[u64]) -> StoreResult<Vec<User>>;

    async fn list(&self, criteria: &Criteria) -> StoreResult<Vec<User>>;

    async fn list_all(&self) -> StoreResult<Vec<User>> {
        self.list(&Criteria::new()).await
    }
}
