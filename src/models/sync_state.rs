// src/models/sync_state.rs

use serde::{Deserialize, Serialize};
use std::fmt;

/// Состояние записи относительно каталога
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    /// Строка сохранена, запись в каталоге ещё не подтверждена
    #[default]
    Pending,
    Synced,
    /// Аудит не нашёл запись в каталоге
    Stale,
}

impl SyncState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncState::Pending => "pending",
            SyncState::Synced => "synced",
            SyncState::Stale => "stale",
        }
    }
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Жизненный цикл сотрудника: active -> left (и обратно при повторном найме)
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum UserStatus {
    #[default]
    Active,
    Left,
}

impl UserStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserStatus::Active => "active",
            UserStatus::Left => "left",
        }
    }

    pub fn can_transition_to(self, next: UserStatus) -> bool {
        self != next
    }
}

impl fmt::Display for UserStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
