// src/models/department.rs

use crate::directory::{dn, Entry};
use crate::models::{format_ldap_time, SourceDepartment, SyncState, GROUP_TYPE_CN, SYSTEM_CREATOR};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Подразделение (группа в каталоге)
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Department {
    pub id: u64,
    pub name: String,
    pub group_type: String,
    /// Внутренний ключ родителя; 0 — корень каталога (base DN)
    pub parent_id: u64,
    pub source_dept_id: String,
    pub source_dept_parent_id: String,
    pub source: String,
    pub creator: String,
    pub group_dn: String,
    pub remark: String,
    /// Дочерние подразделения в порядке создания
    pub children: Vec<u64>,
    /// Участники в порядке добавления
    pub members: Vec<u64>,
    pub sync_state: SyncState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Department {
    /// Новая строка под родителем с DN `parent_dn`
    pub fn from_source(source: &SourceDepartment, parent_id: u64, parent_dn: &str) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            name: source.name.clone(),
            group_type: GROUP_TYPE_CN.to_string(),
            parent_id,
            source_dept_id: source.source_dept_id.clone(),
            source_dept_parent_id: source.source_dept_parent_id.clone(),
            source: source.source.clone(),
            creator: SYSTEM_CREATOR.to_string(),
            group_dn: dn::child_dn(GROUP_TYPE_CN, &source.name, parent_dn),
            remark: source.remark.clone(),
            children: Vec::new(),
            members: Vec::new(),
            sync_state: SyncState::Pending,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn add_child(&mut self, child_id: u64) -> bool {
        push_unique(&mut self.children, child_id)
    }

    pub fn add_member(&mut self, user_id: u64) -> bool {
        push_unique(&mut self.members, user_id)
    }

    pub fn remove_member(&mut self, user_id: u64) -> bool {
        let before = self.members.len();
        self.members.retain(|id| *id != user_id);
        before != self.members.len()
    }

    /// LDAP-запись группы (без участников — их добавляет каталог)
    pub fn to_ldap_entry(&self) -> Entry {
        let mut entry = Entry::new(&self.group_dn);
        entry.set("objectClass", vec!["top".to_string(), "groupOfUniqueNames".to_string()]);
        entry.set_one("cn", &self.name);
        entry.set_one(
            "description",
            if self.remark.is_empty() { &self.name } else { &self.remark },
        );
        entry.set_one("createTimestamp", &format_ldap_time(&self.created_at));
        entry
    }
}

fn push_unique(list: &mut Vec<u64>, id: u64) -> bool {
    if list.contains(&id) {
        return false;
    }
    list.push(id);
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eng() -> SourceDepartment {
        SourceDepartment {
            source: "hr".to_string(),
            source_dept_id: "hr_10".to_string(),
            source_dept_parent_id: "hr_1".to_string(),
            name: "Eng".to_string(),
            remark: String::new(),
        }
    }

    #[test]
    fn dn_is_derived_from_parent() {
        let dept = Department::from_source(&eng(), 7, "cn=Root,dc=example,dc=com");
        assert_eq!(dept.group_dn, "cn=Eng,cn=Root,dc=example,dc=com");
        assert_eq!(dept.parent_id, 7);
        assert_eq!(dept.creator, "system");
        assert_eq!(dept.group_type, "cn");
        assert_eq!(dept.sync_state, SyncState::Pending);
    }

    #[test]
    fn members_are_unique_and_ordered() {
        let mut dept = Department::from_source(&eng(), 0, "dc=example,dc=com");
        assert!(dept.add_member(3));
        assert!(dept.add_member(1));
        assert!(!dept.add_member(3));
        assert_eq!(dept.members, vec![3, 1]);
        assert!(dept.remove_member(3));
        assert!(!dept.remove_member(3));
    }

    #[test]
    fn ldap_entry_falls_back_to_name_for_description() {
        let entry = Department::from_source(&eng(), 0, "dc=example,dc=com").to_ldap_entry();
        assert_eq!(entry.first("description"), Some("Eng"));
        assert!(entry.has_object_class("groupOfUniqueNames"));
    }
}
