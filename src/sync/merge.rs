// src/sync/merge.rs

//! Слияние записи источника с сохранённым пользователем.
//!
//! Результат всегда строится из сохранённой строки, поэтому первичный ключ,
//! создатель, источник, пароль, DN, роли и статус переходят без изменений.
//! Изменяемые поля перечислены в [`USER_MERGE_POLICY`].

use crate::models::user::DepartmentAssignment;
use crate::models::{SourceUser, User};
use chrono::Utc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserField {
    Nickname,
    GivenName,
    Introduction,
    Mail,
    JobNumber,
    Mobile,
    PostalAddress,
    Position,
    Departments,
    SourceUserId,
}

impl UserField {
    pub fn name(self) -> &'static str {
        match self {
            UserField::Nickname => "nickname",
            UserField::GivenName => "given_name",
            UserField::Introduction => "introduction",
            UserField::Mail => "mail",
            UserField::JobNumber => "job_number",
            UserField::Mobile => "mobile",
            UserField::PostalAddress => "postal_address",
            UserField::Position => "position",
            UserField::Departments => "departments",
            UserField::SourceUserId => "source_user_id",
        }
    }

    fn slot(self, user: &mut User) -> &mut String {
        match self {
            UserField::Nickname => &mut user.nickname,
            UserField::GivenName => &mut user.given_name,
            UserField::Introduction => &mut user.introduction,
            UserField::Mail => &mut user.mail,
            UserField::JobNumber => &mut user.job_number,
            UserField::Mobile => &mut user.mobile,
            UserField::PostalAddress => &mut user.postal_address,
            UserField::Position => &mut user.position,
            UserField::Departments => &mut user.departments,
            UserField::SourceUserId => &mut user.source_user_id,
        }
    }

    fn incoming<'a>(self, source: &'a SourceUser, assignment: &'a DepartmentAssignment) -> &'a str {
        match self {
            UserField::Nickname => &source.nickname,
            UserField::GivenName => &source.given_name,
            UserField::Introduction => &source.introduction,
            UserField::Mail => &source.mail,
            UserField::JobNumber => &source.job_number,
            UserField::Mobile => &source.mobile,
            UserField::PostalAddress => &source.postal_address,
            UserField::Position => &source.position,
            UserField::Departments => &assignment.names,
            UserField::SourceUserId => &source.source_user_id,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldPolicy {
    pub field: UserField,
    pub overwrite_if_non_empty: bool,
}

const fn overwrite(field: UserField) -> FieldPolicy {
    FieldPolicy { field, overwrite_if_non_empty: true }
}

/// Источник побеждает, если его значение не пустое
pub const USER_MERGE_POLICY: &[FieldPolicy] = &[
    overwrite(UserField::Nickname),
    overwrite(UserField::GivenName),
    overwrite(UserField::Introduction),
    overwrite(UserField::Mail),
    overwrite(UserField::JobNumber),
    overwrite(UserField::Mobile),
    overwrite(UserField::PostalAddress),
    overwrite(UserField::Position),
    overwrite(UserField::Departments),
    overwrite(UserField::SourceUserId),
];

pub fn merge_user(stored: &User, incoming: &SourceUser, assignment: &DepartmentAssignment) -> User {
    merge_with(USER_MERGE_POLICY, stored, incoming, assignment)
}

pub fn merge_with(
    policy: &[FieldPolicy],
    stored: &User,
    incoming: &SourceUser,
    assignment: &DepartmentAssignment,
) -> User {
    let mut merged = stored.clone();
    for rule in policy {
        let value = rule.field.incoming(incoming, assignment);
        if rule.overwrite_if_non_empty && !value.is_empty() {
            *rule.field.slot(&mut merged) = value.to_string();
            // список id идёт вместе с названиями
            if rule.field == UserField::Departments {
                merged.department_ids = assignment.ids.clone();
            }
        }
    }
    if !merged.same_profile(stored) {
        merged.updated_at = Utc::now();
    }
    merged
}
