// src/raddb.rs

use aes_gcm::{
    aead::{Aead, KeyInit, Payload},
    Aes256Gcm, Key, Nonce,
};
use rand::{rngs::OsRng, RngCore};
use serde::{de::DeserializeOwned, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use thiserror::Error;

const NONCE_LEN: usize = 12;

#[derive(Debug, Error)]
pub enum RadDbError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("Decryption error: {0}")]
    Decryption(String),
    #[error("Encryption error: {0}")]
    Encryption(String),
    #[error("Invalid master key: {0}")]
    KeyInvalid(String),
    #[error("Storage lock poisoned")]
    Poisoned,
}

/// Ключ шифрования (32 байта = 256 бит)
pub type MasterKey = [u8; 32];

/// RadDB — зашифрованное embedded-хранилище ключ/значение.
///
/// Все данные держатся в памяти (упорядоченно, для сканирования по префиксу)
/// и целиком сбрасываются на диск после каждой записи. Без пути база живёт
/// только в памяти.
pub struct RadDB {
    path: Option<PathBuf>,
    cipher: Aes256Gcm,
    cache: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl RadDB {
    /// Открыть базу по пути с мастер-ключом
    pub fn open<P: AsRef<Path>>(path: P, key: &MasterKey) -> Result<Self, RadDbError> {
        let db = Self {
            path: Some(path.as_ref().to_path_buf()),
            cipher: Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key)),
            cache: RwLock::new(BTreeMap::new()),
        };
        db.load()?;
        Ok(db)
    }

    /// База без файла: для тестов и одноразовых прогонов
    pub fn in_memory() -> Self {
        let key = Self::generate_key();
        Self {
            path: None,
            cipher: Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key)),
            cache: RwLock::new(BTreeMap::new()),
        }
    }

    /// Создать новый мастер-ключ (надо сохранить!)
    pub fn generate_key() -> MasterKey {
        let mut key = [0u8; 32];
        OsRng.fill_bytes(&mut key);
        key
    }

    /// Разобрать мастер-ключ из hex (64 символа)
    pub fn parse_key(hex_key: &str) -> Result<MasterKey, RadDbError> {
        let bytes = hex::decode(hex_key.trim()).map_err(|e| RadDbError::KeyInvalid(e.to_string()))?;
        bytes
            .try_into()
            .map_err(|b: Vec<u8>| RadDbError::KeyInvalid(format!("expected 32 bytes, got {}", b.len())))
    }

    fn load(&self) -> Result<(), RadDbError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if !path.exists() {
            return Ok(());
        }

        let mut encrypted = Vec::new();
        OpenOptions::new().read(true).open(path)?.read_to_end(&mut encrypted)?;
        if encrypted.is_empty() {
            return Ok(());
        }
        if encrypted.len() < NONCE_LEN {
            return Err(RadDbError::Decryption("File too short".to_string()));
        }

        let (nonce_bytes, ciphertext) = encrypted.split_at(NONCE_LEN);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce_bytes), Payload { msg: ciphertext, aad: &[] })
            .map_err(|_| RadDbError::Decryption("AES-GCM decryption failed".to_string()))?;

        let data: BTreeMap<String, Vec<u8>> =
            bincode::deserialize(&plaintext).map_err(|e| RadDbError::Serialization(e.to_string()))?;

        *self.cache.write().map_err(|_| RadDbError::Poisoned)? = data;
        Ok(())
    }

    /// Сохранить данные на диск (через временный файл)
    pub fn flush(&self) -> Result<(), RadDbError> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let plaintext = {
            let cache = self.cache.read().map_err(|_| RadDbError::Poisoned)?;
            bincode::serialize(&*cache).map_err(|e| RadDbError::Serialization(e.to_string()))?
        };

        let mut nonce_bytes = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce_bytes);
        let ciphertext = self
            .cipher
            .encrypt(Nonce::from_slice(&nonce_bytes), Payload { msg: &plaintext, aad: &[] })
            .map_err(|_| RadDbError::Encryption("AES-GCM encryption failed".to_string()))?;

        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }
        let tmp = path.with_extension("tmp");
        {
            let mut file = OpenOptions::new().write(true).create(true).truncate(true).open(&tmp)?;
            file.write_all(&nonce_bytes)?;
            file.write_all(&ciphertext)?;
            file.sync_all()?;
        }
        fs::rename(&tmp, path)?;
        Ok(())
    }

    /// Получить значение по ключу
    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        let cache = self.cache.read().ok()?;
        cache.get(key).cloned()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.cache.read().map(|c| c.contains_key(key)).unwrap_or(false)
    }

    /// Установить значение
    pub fn set(&self, key: String, value: Vec<u8>) -> Result<(), RadDbError> {
        self.set_many(vec![(key, value)])
    }

    /// Записать несколько ключей одним сбросом на диск
    pub fn set_many(&self, entries: Vec<(String, Vec<u8>)>) -> Result<(), RadDbError> {
        {
            let mut cache = self.cache.write().map_err(|_| RadDbError::Poisoned)?;
            cache.extend(entries);
        }
        self.flush()
    }

    /// Удалить ключ. Возвращает true, если ключ был.
    pub fn remove(&self, key: &str) -> Result<bool, RadDbError> {
        let removed = {
            let mut cache = self.cache.write().map_err(|_| RadDbError::Poisoned)?;
            cache.remove(key).is_some()
        };
        if removed {
            self.flush()?;
        }
        Ok(removed)
    }

    /// Все пары, ключ которых начинается с `prefix`, в порядке ключей
    pub fn scan_prefix(&self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>, RadDbError> {
        let cache = self.cache.read().map_err(|_| RadDbError::Poisoned)?;
        Ok(cache
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    // === Типизированные обёртки (bincode) ===

    pub fn put<T: Serialize>(&self, key: impl Into<String>, value: &T) -> Result<(), RadDbError> {
        self.set(key.into(), encode(value)?)
    }

    pub fn fetch<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, RadDbError> {
        self.get(key).map(|data| decode(&data)).transpose()
    }

    pub fn fetch_prefix<T: DeserializeOwned>(&self, prefix: &str) -> Result<Vec<T>, RadDbError> {
        self.scan_prefix(prefix)?
            .iter()
            .map(|(_, data)| decode(data))
            .collect()
    }
}

pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, RadDbError> {
    bincode::serialize(value).map_err(|e| RadDbError::Serialization(e.to_string()))
}

pub fn decode<T: DeserializeOwned>(data: &[u8]) -> Result<T, RadDbError> {
    bincode::deserialize(data).map_err(|e| RadDbError::Serialization(e.to_string()))
}

// Автоматическое сохранение при выходе
impl Drop for RadDB {
    fn drop(&mut self) {
        let _ = self.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reopens_with_same_key() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.db");
        let key = RadDB::generate_key();

        {
            let db = RadDB::open(&path, &key).unwrap();
            db.put("dept:1", &"Root".to_string()).unwrap();
            db.put("dept:2", &"Eng".to_string()).unwrap();
            db.put("user:1", &"alice".to_string()).unwrap();
        }

        let db = RadDB::open(&path, &key).unwrap();
        let depts: Vec<String> = db.fetch_prefix("dept:").unwrap();
        assert_eq!(depts, vec!["Root".to_string(), "Eng".to_string()]);
        assert_eq!(db.fetch::<String>("user:1").unwrap().as_deref(), Some("alice"));
    }

    #[test]
    fn wrong_key_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.db");
        {
            let db = RadDB::open(&path, &RadDB::generate_key()).unwrap();
            db.put("k", &1u64).unwrap();
        }
        assert!(matches!(
            RadDB::open(&path, &RadDB::generate_key()),
            Err(RadDbError::Decryption(_))
        ));
    }

    #[test]
    fn parse_key_checks_length() {
        let hex_key = "ab".repeat(32);
        assert_eq!(RadDB::parse_key(&hex_key).unwrap(), [0xab; 32]);
        assert!(matches!(RadDB::parse_key("abcd"), Err(RadDbError::KeyInvalid(_))));
        assert!(matches!(RadDB::parse_key("zz"), Err(RadDbError::KeyInvalid(_))));
    }

    #[test]
    fn remove_reports_presence() {
        let db = RadDB::in_memory();
        db.put("a", &1u8).unwrap();
        assert!(db.remove("a").unwrap());
        assert!(!db.remove("a").unwrap());
        assert!(!db.contains_key("a"));
    }
}
