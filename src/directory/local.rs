// src/directory/local.rs

use crate::directory::{dn, Directory, DirectoryError, DirectoryResult, Entry, Filter};
use crate::models::{Department, User};
use crate::raddb::RadDB;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

const ENTRY_PREFIX: &str = "entry:";
const GROUP_CLASS: &str = "groupOfUniqueNames";
const PERSON_CLASS: &str = "inetOrgPerson";
const MEMBER_ATTR: &str = "uniqueMember";

/// Встроенный каталог поверх RadDB.
///
/// Записи хранятся по нормализованному DN. Запись можно создать только
/// под существующим родителем или прямо под одним из корневых суффиксов.
pub struct LocalDirectory {
    db: Arc<RadDB>,
    suffixes: Vec<String>,
    write_lock: Mutex<()>,
}

impl LocalDirectory {
    pub fn new(db: Arc<RadDB>, suffixes: &[&str]) -> Self {
        Self {
            db,
            suffixes: suffixes.iter().map(|s| dn::normalize(s)).collect(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn in_memory(suffixes: &[&str]) -> Self {
        Self::new(Arc::new(RadDB::in_memory()), suffixes)
    }

    fn key(entry_dn: &str) -> String {
        format!("{}{}", ENTRY_PREFIX, dn::normalize(entry_dn))
    }

    fn load(&self, entry_dn: &str) -> DirectoryResult<Option<Entry>> {
        Ok(self.db.fetch(&Self::key(entry_dn))?)
    }

    fn save(&self, entry: &Entry) -> DirectoryResult<()> {
        self.db.put(Self::key(&entry.dn), entry)?;
        Ok(())
    }

    fn all_entries(&self) -> DirectoryResult<Vec<Entry>> {
        Ok(self.db.fetch_prefix(ENTRY_PREFIX)?)
    }

    fn dns_with_class(&self, class: &str) -> DirectoryResult<Vec<String>> {
        Ok(self
            .all_entries()?
            .into_iter()
            .filter(|e| e.has_object_class(class))
            .map(|e| e.dn)
            .collect())
    }

    /// Новую запись можно добавить, только если есть её родитель
    fn insert_new(&self, entry: Entry) -> DirectoryResult<()> {
        if self.db.contains_key(&Self::key(&entry.dn)) {
            return Err(DirectoryError::AlreadyExists(entry.dn));
        }
        let parent = dn::parent_dn(&entry.dn).ok_or_else(|| DirectoryError::NoSuchParent(entry.dn.clone()))?;
        let parent_is_suffix = self.suffixes.contains(&dn::normalize(parent));
        if !parent_is_suffix && !self.db.contains_key(&Self::key(parent)) {
            return Err(DirectoryError::NoSuchParent(entry.dn));
        }
        debug!(dn = %entry.dn, "directory entry added");
        self.save(&entry)
    }

    fn group(&self, group_dn: &str) -> DirectoryResult<Entry> {
        self.load(group_dn)?
            .filter(|e| e.has_object_class(GROUP_CLASS))
            .ok_or_else(|| DirectoryError::NotFound(group_dn.to_string()))
    }
}

#[async_trait]
impl Directory for LocalDirectory {
    async fn find_by_filter(&self, filter: &str) -> DirectoryResult<Entry> {
        let parsed = Filter::parse(filter)?;
        self.all_entries()?
            .into_iter()
            .find(|e| parsed.matches(e))
            .ok_or_else(|| DirectoryError::NotFound(filter.to_string()))
    }

    async fn create_group(&self, department: &Department) -> DirectoryResult<()> {
        let _guard = self.write_lock.lock().await;
        self.insert_new(department.to_ldap_entry())
    }

    async fn create_user(&self, user: &User) -> DirectoryResult<()> {
        let _guard = self.write_lock.lock().await;
        self.insert_new(user.to_ldap_entry())
    }

    async fn update_user(&self, user: &User) -> DirectoryResult<()> {
        let _guard = self.write_lock.lock().await;
        if self.load(&user.user_dn)?.is_none() {
            return Err(DirectoryError::NotFound(user.user_dn.clone()));
        }
        self.save(&user.to_ldap_entry())
    }

    async fn add_user_to_group(&self, group_dn: &str, user_dn: &str) -> DirectoryResult<()> {
        let _guard = self.write_lock.lock().await;
        let mut group = self.group(group_dn)?;
        let members = group.values_mut(MEMBER_ATTR);
        if members.iter().any(|m| dn::eq(m, user_dn)) {
            return Ok(());
        }
        members.push(user_dn.to_string());
        self.save(&group)
    }

    async fn remove_user_from_group(&self, group_dn: &str, user_dn: &str) -> DirectoryResult<()> {
        let _guard = self.write_lock.lock().await;
        let mut group = self.group(group_dn)?;
        let members = group.values_mut(MEMBER_ATTR);
        let before = members.len();
        members.retain(|m| !dn::eq(m, user_dn));
        if members.len() == before {
            return Ok(());
        }
        self.save(&group)
    }

    async fn delete_user(&self, user_dn: &str) -> DirectoryResult<()> {
        let _guard = self.write_lock.lock().await;
        if !self.db.remove(&Self::key(user_dn))? {
            return Err(DirectoryError::NotFound(user_dn.to_string()));
        }

        // Убираем пользователя из всех групп
        for mut group in self.all_entries()?.into_iter().filter(|e| e.has_object_class(GROUP_CLASS)) {
            let members = group.values_mut(MEMBER_ATTR);
            let before = members.len();
            members.retain(|m| !dn::eq(m, user_dn));
            if members.len() != before {
                self.save(&group)?;
            }
        }
        debug!(dn = %user_dn, "directory user deleted");
        Ok(())
    }

    async fn list_group_dns(&self) -> DirectoryResult<Vec<String>> {
        self.dns_with_class(GROUP_CLASS)
    }

    async fn list_user_dns(&self) -> DirectoryResult<Vec<String>> {
        self.dns_with_class(PERSON_CLASS)
    }
}
