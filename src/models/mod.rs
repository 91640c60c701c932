// src/models/mod.rs

pub mod department;
pub mod password;
pub mod role;
pub mod source;
pub mod sync_state;
pub mod user;

// Re-exports

pub use department::Department;
pub use password::{PasswordAlgorithm, PasswordError, PasswordHash};
pub use role::Role;
pub use source::{SourceDepartment, SourceUser};
pub use sync_state::{SyncState, UserStatus};
pub use user::User;

use chrono::{DateTime, Utc};

/// Метка создателя для всех записей, которые пишет синхронизация
pub const SYSTEM_CREATOR: &str = "system";

/// Тип группы для подразделений (RDN-атрибут)
pub const GROUP_TYPE_CN: &str = "cn";

/// Форматирует время в LDAP Generalized Time (YYYYMMDDHHMMSS.0Z)
pub(crate) fn format_ldap_time(dt: &DateTime<Utc>) -> String {
    dt.format("%Y%m%d%H%M%S.0Z").to_string()
}
