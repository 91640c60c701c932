// src/models/password.rs

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Алгоритм хеширования пароля
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub enum PasswordAlgorithm {
    Bcrypt,
}

/// Хеш начального пароля пользователя. Соль хранится внутри bcrypt-строки.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct PasswordHash {
    pub hash: String, // строка вроде "$2b$10$..."
    pub algorithm: PasswordAlgorithm,
}

impl PasswordHash {
    /// Создать хеш с помощью bcrypt
    pub fn new_bcrypt(password: &str, cost: u32) -> Result<Self, PasswordError> {
        if password.is_empty() {
            return Err(PasswordError::Empty);
        }
        let hash = bcrypt::hash(password, cost).map_err(|e| PasswordError::HashFailed(e.to_string()))?;
        Ok(Self {
            hash,
            algorithm: PasswordAlgorithm::Bcrypt,
        })
    }

    /// Значение для атрибута userPassword
    pub fn to_ldap_value(&self) -> String {
        format!("{{CRYPT}}{}", self.hash)
    }
}

impl fmt::Display for PasswordHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.hash)
    }
}

#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("Initial password is empty")]
    Empty,
    #[error("Failed to hash password: {0}")]
    HashFailed(String),
}
