// src/models/user.rs

use crate::directory::Entry;
use crate::models::{format_ldap_time, PasswordHash, Role, SourceUser, SyncState, UserStatus, SYSTEM_CREATOR};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct User {
    pub id: u64,
    pub username: String,
    pub nickname: String,
    pub given_name: String,
    pub introduction: String,
    pub mail: String,
    pub job_number: String,
    pub mobile: String,
    pub postal_address: String,
    pub position: String,
    /// Названия подразделений через запятую
    pub departments: String,
    pub department_ids: Vec<u64>,
    pub source_user_id: String,
    pub source: String,
    pub creator: String,
    pub roles: Vec<Role>,
    pub password: PasswordHash,
    pub user_dn: String,
    pub status: UserStatus,
    pub sync_state: SyncState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Подразделения, к которым относится пользователь
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DepartmentAssignment {
    pub names: String,
    pub ids: Vec<u64>,
}

impl User {
    /// Новый пользователь из записи источника
    pub fn from_source(
        source: &SourceUser,
        user_dn: String,
        assignment: DepartmentAssignment,
        role: Role,
        password: PasswordHash,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            username: source.username.clone(),
            nickname: source.nickname.clone(),
            given_name: source.given_name.clone(),
            introduction: source.introduction.clone(),
            mail: source.mail.clone(),
            job_number: source.job_number.clone(),
            mobile: source.mobile.clone(),
            postal_address: source.postal_address.clone(),
            position: source.position.clone(),
            departments: assignment.names,
            department_ids: assignment.ids,
            source_user_id: source.source_user_id.clone(),
            source: source.source.clone(),
            creator: SYSTEM_CREATOR.to_string(),
            roles: vec![role],
            password,
            user_dn,
            status: UserStatus::Active,
            sync_state: SyncState::Pending,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == UserStatus::Active
    }

    /// Идентификаторы подразделений через запятую
    pub fn department_id_list(&self) -> String {
        self.department_ids
            .iter()
            .map(u64::to_string)
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Совпадают ли изменяемые поля профиля
    pub fn same_profile(&self, other: &User) -> bool {
        self.nickname == other.nickname
            && self.given_name == other.given_name
            && self.introduction == other.introduction
            && self.mail == other.mail
            && self.job_number == other.job_number
            && self.mobile == other.mobile
            && self.postal_address == other.postal_address
            && self.position == other.position
            && self.departments == other.departments
            && self.department_ids == other.department_ids
            && self.source_user_id == other.source_user_id
    }

    /// Преобразовать пользователя в LDAP-запись (inetOrgPerson)
    pub fn to_ldap_entry(&self) -> Entry {
        let display = if self.nickname.is_empty() { &self.username } else { &self.nickname };

        let mut entry = Entry::new(&self.user_dn);
        entry.set(
            "objectClass",
            vec![
                "top".to_string(),
                "person".to_string(),
                "organizationalPerson".to_string(),
                "inetOrgPerson".to_string(),
            ],
        );
        entry.set_one("uid", &self.username);
        entry.set_one("cn", display);
        entry.set_one("sn", display);
        entry.set_one("displayName", display);
        entry.set_one("givenName", &self.given_name);
        entry.set_one("mail", &self.mail);
        entry.set_one("mobile", &self.mobile);
        entry.set_one("employeeNumber", &self.job_number);
        entry.set_one("postalAddress", &self.postal_address);
        entry.set_one("title", &self.position);
        entry.set_one("businessCategory", &self.departments);
        entry.set_one("departmentNumber", &self.department_id_list());
        entry.set_one("description", &self.introduction);
        entry.set_one("userPassword", &self.password.to_ldap_value());
        entry.set_one("modifyTimestamp", &format_ldap_time(&self.updated_at));
        entry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alice() -> User {
        let source = SourceUser {
            source: "wecom".to_string(),
            source_user_id: "wecom_alice".to_string(),
            username: "alice".to_string(),
            nickname: "Alice".to_string(),
            mail: "alice@example.com".to_string(),
            ..SourceUser::default()
        };
        let password = PasswordHash::new_bcrypt("init", 4).unwrap();
        User::from_source(
            &source,
            "uid=alice,ou=people,dc=example,dc=com".to_string(),
            DepartmentAssignment { names: "Eng,Ops".to_string(), ids: vec![4, 9] },
            Role::default(),
            password,
        )
    }

    #[test]
    fn from_source_sets_identity_fields() {
        let user = alice();
        assert_eq!(user.creator, "system");
        assert_eq!(user.status, UserStatus::Active);
        assert_eq!(user.roles, vec![Role::default()]);
        assert_eq!(user.department_id_list(), "4,9");
    }

    #[test]
    fn ldap_entry_skips_empty_attributes() {
        let entry = alice().to_ldap_entry();
        assert_eq!(entry.first("uid"), Some("alice"));
        assert_eq!(entry.first("cn"), Some("Alice"));
        assert_eq!(entry.first("businessCategory"), Some("Eng,Ops"));
        assert!(entry.get("mobile").is_none());
        assert!(entry.has_object_class("inetOrgPerson"));
    }
}
