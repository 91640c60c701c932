// src/store/rad.rs

use crate::models::{Department, SyncState, User, UserStatus};
use crate::raddb::{encode, RadDB};
use crate::store::{Criteria, DepartmentStore, Record, StoreError, StoreResult, UserStore};
use async_trait::async_trait;
use chrono::Utc;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;

struct Table {
    prefix: &'static str,
    seq_key: &'static str,
}

const DEPARTMENTS: Table = Table { prefix: "dept:", seq_key: "seq:dept" };
const USERS: Table = Table { prefix: "user:", seq_key: "seq:user" };

impl Table {
    // id с нулями слева: сканирование по префиксу идёт в порядке id
    fn key(&self, id: u64) -> String {
        format!("{}{:020}", self.prefix, id)
    }
}

/// Хранилище подразделений и пользователей поверх RadDB.
/// Записи сериализуются bincode'ом, ключи `dept:<id>` и `user:<id>`.
pub struct RadStore {
    db: Arc<RadDB>,
    write_lock: Mutex<()>,
}

impl RadStore {
    pub fn new(db: Arc<RadDB>) -> Self {
        Self {
            db,
            write_lock: Mutex::new(()),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(RadDB::in_memory()))
    }

    fn scan<T: Record + DeserializeOwned>(&self, table: &Table, criteria: &Criteria) -> StoreResult<Vec<T>> {
        let rows: Vec<T> = self.db.fetch_prefix(table.prefix)?;
        Ok(rows.into_iter().filter(|r| criteria.matches(r)).collect())
    }

    fn first<T: Record + DeserializeOwned>(&self, table: &Table, criteria: &Criteria) -> StoreResult<Option<T>> {
        Ok(self.scan(table, criteria)?.into_iter().next())
    }

    fn load<T: Record + DeserializeOwned>(&self, table: &Table, id: u64) -> StoreResult<T> {
        self.db
            .fetch(&table.key(id))?
            .ok_or_else(|| StoreError::not_found::<T>(Criteria::new().id(id)))
    }

    fn load_many<T: Record + DeserializeOwned>(&self, table: &Table, ids: &[u64]) -> StoreResult<Vec<T>> {
        ids.iter().map(|id| self.load(table, *id)).collect()
    }

    /// Назначает следующий id и пишет строку вместе со счётчиком
    fn insert<T: Record + Serialize>(&self, table: &Table, assign: impl FnOnce(&mut T, u64), mut row: T) -> StoreResult<T> {
        let id = self.db.fetch::<u64>(table.seq_key)?.unwrap_or(0) + 1;
        assign(&mut row, id);
        self.db.set_many(vec![
            (table.seq_key.to_string(), encode(&id)?),
            (table.key(id), encode(&row)?),
        ])?;
        Ok(row)
    }

    fn replace<T: Record + Serialize + DeserializeOwned>(&self, table: &Table, row: &T) -> StoreResult<()> {
        self.load::<T>(table, row.id())?;
        self.db.put(table.key(row.id()), row)?;
        Ok(())
    }

    fn modify<T, F>(&self, table: &Table, id: u64, change: F) -> StoreResult<()>
    where
        T: Record + Serialize + DeserializeOwned,
        F: FnOnce(&mut T),
    {
        let mut row: T = self.load(table, id)?;
        change(&mut row);
        self.db.put(table.key(id), &row)?;
        Ok(())
    }
}

#[async_trait]
impl DepartmentStore for RadStore {
    async fn find(&self, criteria: &Criteria) -> StoreResult<Option<Department>> {
        self.first(&DEPARTMENTS, criteria)
    }

    async fn create(&self, department: Department) -> StoreResult<Department> {
        let _guard = self.write_lock.lock().await;
        if self.first::<Department>(&DEPARTMENTS, &Criteria::new().dn(&department.group_dn))?.is_some() {
            return Err(StoreError::Duplicate {
                entity: Department::ENTITY,
                key: department.group_dn,
            });
        }
        self.insert(&DEPARTMENTS, |d: &mut Department, id| d.id = id, department)
    }

    async fn update(&self, department: &Department) -> StoreResult<()> {
        let _guard = self.write_lock.lock().await;
        self.replace(&DEPARTMENTS, department)
    }

    async fn change_sync_state(&self, id: u64, state: SyncState) -> StoreResult<()> {
        let _guard = self.write_lock.lock().await;
        self.modify(&DEPARTMENTS, id, |d: &mut Department| {
            d.sync_state = state;
            d.updated_at = Utc::now();
        })
    }

    async fn get_by_ids(&self, ids: &[u64]) -> StoreResult<Vec<Department>> {
        self.load_many(&DEPARTMENTS, ids)
    }

    async fn list(&self, criteria: &Criteria) -> StoreResult<Vec<Department>> {
        self.scan(&DEPARTMENTS, criteria)
    }
}

#[async_trait]
impl UserStore for RadStore {
    async fn find(&self, criteria: &Criteria) -> StoreResult<Option<User>> {
        self.first(&USERS, criteria)
    }

    async fn create(&self, user: User) -> StoreResult<User> {
        let _guard = self.write_lock.lock().await;
        if self.first::<User>(&USERS, &Criteria::new().dn(&user.user_dn))?.is_some() {
            return Err(StoreError::Duplicate {
                entity: User::ENTITY,
                key: user.user_dn,
            });
        }
        self.insert(&USERS, |u: &mut User, id| u.id = id, user)
    }

    async fn update(&self, user: &User) -> StoreResult<()> {
        let _guard = self.write_lock.lock().await;
        self.replace(&USERS, user)
    }

    async fn change_status(&self, id: u64, status: UserStatus) -> StoreResult<()> {
        let _guard = self.write_lock.lock().await;
        self.modify(&USERS, id, |u: &mut User| {
            u.status = status;
            u.updated_at = Utc::now();
        })
    }

    async fn change_sync_state(&self, id: u64, state: SyncState) -> StoreResult<()> {
        let _guard = self.write_lock.lock().await;
        self.modify(&USERS, id, |u: &mut User| {
            u.sync_state = state;
            u.updated_at = Utc::now();
        })
    }

    async fn get_by_ids(&self, ids: &[u64]) -> StoreResult<Vec<User>> {
        self.load_many(&USERS, ids)
    }

    async fn list(&self, criteria: &Criteria) -> StoreResult<Vec<User>> {
        self.scan(&USERS, criteria)
    }
}
