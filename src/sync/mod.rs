// src/sync/mod.rs

//! Движок сверки каталога с источниками.

pub mod diff;
pub mod error;
pub mod merge;
pub mod normalize;
pub mod outcome;
pub mod tracker;
pub mod tree;

mod departments;
mod drift;
mod push;
mod users;

pub use error::{ErrorKind, SyncError, SyncResult, ValidationError};
pub use outcome::{DepartmentSyncOutcome, DriftReport, PushOutcome, Scope, SourceSyncOutcome, UserSyncOutcome};
pub use tracker::{EntityRef, SyncStateTracker};

use crate::config::{AppConfig, SourceConfig};
use crate::directory::Directory;
use crate::events::EventHub;
use crate::models::Role;
use crate::source::SourceClient;
use crate::store::{DepartmentStore, UserStore};
use std::sync::Arc;

/// Параметры каталога и создаваемых пользователей
#[derive(Debug, Clone)]
pub struct ReconcilerSettings {
    pub base_dn: String,
    pub user_base_dn: String,
    pub admin_dn: String,
    pub user_init_password: String,
    pub default_role: Role,
    pub bcrypt_cost: u32,
}

impl ReconcilerSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            base_dn: config.ldap.base_dn.clone(),
            user_base_dn: config.ldap.user_dn.clone(),
            admin_dn: config.ldap.admin_dn.clone(),
            user_init_password: config.ldap.user_init_password.clone(),
            default_role: config.default_role.clone(),
            bcrypt_cost: config.password_policy.bcrypt_cost,
        }
    }
}

pub struct SourceBinding {
    pub config: SourceConfig,
    pub client: Arc<dyn SourceClient>,
}

/// Сверка по источникам. Сам движок блокировок не держит: конфликтующие
/// записи сериализуют хранилище и каталог.
pub struct Reconciler {
    departments: Arc<dyn DepartmentStore>,
    users: Arc<dyn UserStore>,
    directory: Arc<dyn Directory>,
    sources: Vec<SourceBinding>,
    settings: ReconcilerSettings,
    tracker: SyncStateTracker,
    events: Arc<EventHub>,
}

impl Reconciler {
    pub fn new(
        departments: Arc<dyn DepartmentStore>,
        users: Arc<dyn UserStore>,
        directory: Arc<dyn Directory>,
        settings: ReconcilerSettings,
    ) -> Self {
        Self {
            tracker: SyncStateTracker::new(departments.clone(), users.clone()),
            departments,
            users,
            directory,
            sources: Vec::new(),
            settings,
            events: Arc::new(EventHub::default()),
        }
    }

    pub fn with_source(mut self, config: SourceConfig, client: Arc<dyn SourceClient>) -> Self {
        self.sources.retain(|b| b.config.flag != config.flag);
        self.sources.push(SourceBinding { config, client });
        self
    }

    pub fn with_events(mut self, events: Arc<EventHub>) -> Self {
        self.events = events;
        self
    }

    pub fn events(&self) -> &Arc<EventHub> {
        &self.events
    }

    pub fn settings(&self) -> &ReconcilerSettings {
        &self.settings
    }

    pub fn directory(&self) -> &Arc<dyn Directory> {
        &self.directory
    }

    pub fn sources(&self) -> impl Iterator<Item = &SourceConfig> {
        self.sources.iter().map(|b| &b.config)
    }

    fn binding(&self, flag: &str) -> SyncResult<&SourceBinding> {
        let binding = self
            .sources
            .iter()
            .find(|b| b.config.flag == flag)
            .ok_or_else(|| ValidationError::new(format!("source '{flag}'"), "unknown source"))?;
        if !binding.config.enabled {
            return Err(ValidationError::new(format!("source '{flag}'"), "source is disabled").into());
        }
        Ok(binding)
    }

    /// Подразделения, затем пользователи: пользователю нужны уже
    /// сохранённые подразделения
    pub async fn sync_source(&self, flag: &str) -> SyncResult<SourceSyncOutcome> {
        let departments = self.sync_departments(flag).await?;
        let users = self.sync_users(flag).await?;
        Ok(SourceSyncOutcome { departments, users })
    }
}
