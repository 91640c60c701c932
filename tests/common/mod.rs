// tests/common/mod.rs

#![allow(dead_code)]

use async_trait::async_trait;
use ldapsync::config::{SourceConfig, SourceKind};
use ldapsync::directory::{Directory, DirectoryError, DirectoryResult, Entry, LocalDirectory};
use ldapsync::models::{Department, Role, User};
use ldapsync::source::{ExportSource, SourceExport};
use ldapsync::store::RadStore;
use ldapsync::sync::{Reconciler, ReconcilerSettings};
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

pub const BASE_DN: &str = "dc=example,dc=com";
pub const USER_DN: &str = "ou=people,dc=example,dc=com";
pub const ADMIN_DN: &str = "cn=admin,dc=example,dc=com";

pub fn settings() -> ReconcilerSettings {
    ReconcilerSettings {
        base_dn: BASE_DN.to_string(),
        user_base_dn: USER_DN.to_string(),
        admin_dn: ADMIN_DN.to_string(),
        user_init_password: "Welcome1!".to_string(),
        default_role: Role::default(),
        // минимальная стоимость bcrypt, чтобы тесты не тормозили
        bcrypt_cost: 4,
    }
}

pub fn user_dn(username: &str) -> String {
    format!("uid={username},{USER_DN}")
}

pub fn export(value: serde_json::Value) -> SourceExport {
    serde_json::from_value(value).unwrap()
}

/// Каталог в памяти с внедрением сбоев и счётчиком записей
pub struct FlakyDirectory {
    inner: LocalDirectory,
    pub writes: AtomicUsize,
    pub fail_create_user: Mutex<Option<String>>,
    pub fail_delete: AtomicBool,
}

impl FlakyDirectory {
    pub fn new() -> Self {
        Self {
            inner: LocalDirectory::in_memory(&[BASE_DN, USER_DN]),
            writes: AtomicUsize::new(0),
            fail_create_user: Mutex::new(None),
            fail_delete: AtomicBool::new(false),
        }
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn wrote(&self) {
        self.writes.fetch_add(1, Ordering::SeqCst);
    }

    pub async fn entry(&self, dn: &str) -> Option<Entry> {
        match self.inner.find_by_filter(&ldapsync::directory::dn_filter(dn)).await {
            Ok(entry) => Some(entry),
            Err(DirectoryError::NotFound(_)) => None,
            Err(e) => panic!("directory lookup failed: {e}"),
        }
    }

    pub async fn members_of(&self, group_dn: &str) -> Vec<String> {
        self.entry(group_dn)
            .await
            .and_then(|e| e.get("uniqueMember").map(<[String]>::to_vec))
            .unwrap_or_default()
    }
}

#[async_trait]
impl Directory for FlakyDirectory {
    async fn find_by_filter(&self, filter: &str) -> DirectoryResult<Entry> {
        self.inner.find_by_filter(filter).await
    }

    async fn create_group(&self, department: &Department) -> DirectoryResult<()> {
        self.wrote();
        self.inner.create_group(department).await
    }

    async fn create_user(&self, user: &User) -> DirectoryResult<()> {
        if self.fail_create_user.lock().unwrap().as_deref() == Some(user.username.as_str()) {
            return Err(DirectoryError::Operation(format!("injected failure for {}", user.username)));
        }
        self.wrote();
        self.inner.create_user(user).await
    }

    async fn update_user(&self, user: &User) -> DirectoryResult<()> {
        self.wrote();
        self.inner.update_user(user).await
    }

    async fn add_user_to_group(&self, group_dn: &str, user_dn: &str) -> DirectoryResult<()> {
        self.wrote();
        self.inner.add_user_to_group(group_dn, user_dn).await
    }

    async fn remove_user_from_group(&self, group_dn: &str, user_dn: &str) -> DirectoryResult<()> {
        self.wrote();
        self.inner.remove_user_from_group(group_dn, user_dn).await
    }

    async fn delete_user(&self, user_dn: &str) -> DirectoryResult<()> {
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(DirectoryError::Operation("injected delete failure".to_string()));
        }
        self.wrote();
        self.inner.delete_user(user_dn).await
    }

    async fn list_group_dns(&self) -> DirectoryResult<Vec<String>> {
        self.inner.list_group_dns().await
    }

    async fn list_user_dns(&self) -> DirectoryResult<Vec<String>> {
        self.inner.list_user_dns().await
    }
}

pub struct Harness {
    pub store: Arc<RadStore>,
    pub directory: Arc<FlakyDirectory>,
    pub reconciler: Reconciler,
}

impl Harness {
    pub fn new() -> Self {
        let store = Arc::new(RadStore::in_memory());
        let directory = Arc::new(FlakyDirectory::new());
        let reconciler = Reconciler::new(store.clone(), store.clone(), directory.clone(), settings());
        Self {
            store,
            directory,
            reconciler,
        }
    }

    pub fn with_source(mut self, config: SourceConfig, source: Arc<ExportSource>) -> Self {
        self.reconciler = self.reconciler.with_source(config, source);
        self
    }
}

pub fn source(flag: &str, kind: SourceKind) -> SourceConfig {
    SourceConfig::new(flag, kind)
}
