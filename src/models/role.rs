// src/models/role.rs

use serde::{Deserialize, Serialize};

/// Роль, назначаемая пользователю при создании
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Role {
    #[serde(default = "default_role_id")]
    pub id: u64,
    #[serde(default = "default_role_name")]
    pub name: String,
    #[serde(default = "default_role_keyword")]
    pub keyword: String,
}

fn default_role_id() -> u64 { 2 }
fn default_role_name() -> String { "Standard user".to_string() }
fn default_role_keyword() -> String { "user".to_string() }

impl Default for Role {
    /// Обычный пользователь без привилегий
    fn default() -> Self {
        Self {
            id: default_role_id(),
            name: default_role_name(),
            keyword: default_role_keyword(),
        }
    }
}
