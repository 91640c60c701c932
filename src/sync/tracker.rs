// src/sync/tracker.rs

use crate::models::{SyncState, User, UserStatus};
use crate::store::{DepartmentStore, UserStore};
use crate::sync::error::{Context, SyncError, SyncResult};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityRef {
    Department(u64),
    User(u64),
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityRef::Department(id) => write!(f, "department#{id}"),
            EntityRef::User(id) => write!(f, "user#{id}"),
        }
    }
}

/// Отмечает состояние синхронизации строк и ведёт статус сотрудника
#[derive(Clone)]
pub struct SyncStateTracker {
    departments: Arc<dyn DepartmentStore>,
    users: Arc<dyn UserStore>,
}

impl SyncStateTracker {
    pub fn new(departments: Arc<dyn DepartmentStore>, users: Arc<dyn UserStore>) -> Self {
        Self { departments, users }
    }

    pub async fn mark_synced(&self, entity: EntityRef) -> SyncResult<()> {
        self.set(entity, SyncState::Synced).await
    }

    pub async fn mark_stale(&self, entity: EntityRef) -> SyncResult<()> {
        self.set(entity, SyncState::Stale).await
    }

    async fn set(&self, entity: EntityRef, state: SyncState) -> SyncResult<()> {
        debug!(entity = %entity, state = %state, "sync state changed");
        let result = match entity {
            EntityRef::Department(id) => self.departments.change_sync_state(id, state).await,
            EntityRef::User(id) => self.users.change_sync_state(id, state).await,
        };
        result.on(entity)
    }

    /// active -> left; вызывается только после удаления из каталога
    pub async fn mark_left(&self, user: &User) -> SyncResult<()> {
        self.transition(user, UserStatus::Left).await
    }

    /// left -> active при повторном появлении в источнике
    pub async fn mark_rejoined(&self, user: &User) -> SyncResult<()> {
        self.transition(user, UserStatus::Active).await
    }

    async fn transition(&self, user: &User, next: UserStatus) -> SyncResult<()> {
        if !user.status.can_transition_to(next) {
            return Err(SyncError::assertion(
                &user.user_dn,
                format!("user is already {}", user.status),
            ));
        }
        self.users.change_status(user.id, next).await.on(&user.user_dn)
    }
}
