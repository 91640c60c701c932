// src/config.rs

use crate::models::Role;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

const ENV_PREFIX: &str = "LDAPSYNC";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load config: {0}")]
    Load(#[from] config::ConfigError),
    #[error("Failed to write config: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    pub store: StoreConfig,

    pub ldap: LdapConfig,

    #[serde(default)]
    pub password_policy: PasswordPolicy,

    #[serde(default)]
    pub default_role: Role,

    #[serde(default)]
    pub sources: Vec<SourceConfig>,

    #[serde(default)]
    pub web_server: ServerConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StoreConfig {
    #[serde(default = "default_db_path")]
    pub db_path: String,
    /// 32 байта в hex
    pub master_key_hex: String,
}

fn default_db_path() -> String {
    "data/ldapsync.db".to_string()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LdapConfig {
    pub base_dn: String,
    /// Контейнер пользователей, например ou=people,<base_dn>
    pub user_dn: String,
    pub admin_dn: String,
    pub user_init_password: String,
    /// Файл встроенного каталога
    #[serde(default = "default_directory_path")]
    pub directory_path: String,
}

fn default_directory_path() -> String {
    "data/directory.db".to_string()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PasswordPolicy {
    #[serde(default = "default_bcrypt_cost")]
    pub bcrypt_cost: u32,
}

fn default_bcrypt_cost() -> u32 { 10 }

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self { bcrypt_cost: default_bcrypt_cost() }
    }
}

/// Платформа-источник
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Отдаёт список уволенных
    DingTalk,
    /// Списка уволенных нет
    WeCom,
}

/// Как определяются уволенные
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LeaverDetection {
    ExplicitListing,
    RosterAbsence,
}

impl SourceKind {
    pub fn default_leaver_detection(self) -> LeaverDetection {
        match self {
            SourceKind::DingTalk => LeaverDetection::ExplicitListing,
            SourceKind::WeCom => LeaverDetection::RosterAbsence,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SourceConfig {
    /// Метка источника: префикс id и тег строк
    pub flag: String,
    pub kind: SourceKind,
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Обновлять существующих пользователей
    #[serde(default)]
    pub update_on_sync: bool,
    /// Окно (в днях) для списка уволенных; 0 — без ограничения
    #[serde(default)]
    pub leave_range_days: u32,
    #[serde(default)]
    pub leaver_detection: Option<LeaverDetection>,
    /// JSON-выгрузка платформы
    #[serde(default)]
    pub export_path: Option<String>,
}

fn default_true() -> bool { true }

impl SourceConfig {
    pub fn new(flag: &str, kind: SourceKind) -> Self {
        Self {
            flag: flag.to_string(),
            kind,
            enabled: true,
            update_on_sync: false,
            leave_range_days: 0,
            leaver_detection: None,
            export_path: None,
        }
    }

    pub fn leaver_detection(&self) -> LeaverDetection {
        self.leaver_detection
            .unwrap_or_else(|| self.kind.default_leaver_detection())
    }

    pub fn leave_window(&self) -> Option<chrono::Duration> {
        (self.leave_range_days > 0).then(|| chrono::Duration::days(i64::from(self.leave_range_days)))
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_web_address")]
    pub address: String,
}

fn default_web_address() -> String {
    "127.0.0.1:8080".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { address: default_web_address() }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub enable_json_output: bool,
    #[serde(default)]
    pub log_file: Option<String>,
}

fn default_log_level() -> String {
    "INFO".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            enable_json_output: false,
            log_file: None,
        }
    }
}

impl AppConfig {
    /// YAML-файл плюс переменные окружения LDAPSYNC_* (вложенность через `__`)
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config: Self = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = serde_yaml::to_string(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// ./config.yaml, иначе <config_dir>/ldapsync/config.yaml
    pub fn default_path() -> PathBuf {
        let local = PathBuf::from("config.yaml");
        if local.exists() {
            return local;
        }
        dirs::config_dir()
            .map(|dir| dir.join("ldapsync").join("config.yaml"))
            .unwrap_or(local)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("ldap.base_dn", &self.ldap.base_dn),
            ("ldap.user_dn", &self.ldap.user_dn),
            ("ldap.admin_dn", &self.ldap.admin_dn),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::Invalid(format!("{name} must not be empty")));
            }
        }

        let mut flags = HashSet::new();
        for source in &self.sources {
            if source.flag.trim().is_empty() {
                return Err(ConfigError::Invalid("source flag must not be empty".to_string()));
            }
            if !flags.insert(source.flag.as_str()) {
                return Err(ConfigError::Invalid(format!("duplicate source flag '{}'", source.flag)));
            }
        }
        Ok(())
    }

    pub fn source(&self, flag: &str) -> Option<&SourceConfig> {
        self.sources.iter().find(|s| s.flag == flag)
    }
}
