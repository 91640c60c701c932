// src/sync/normalize.rs

//! Приведение записей платформ к каноническому виду.

use crate::models::{SourceDepartment, SourceUser};
use crate::source::{RawDepartment, RawUser};
use crate::sync::error::ValidationError;
use serde_json::Value;
use std::collections::HashSet;

/// `<flag>_<remoteId>`
pub fn source_key(flag: &str, remote_id: &str) -> String {
    format!("{flag}_{remote_id}")
}

/// Ключ синтетического корня дерева источника
pub fn root_key(flag: &str) -> String {
    source_key(flag, "1")
}

/// Строка или целое число -> каноническая строка. Пустые значения,
/// дробные числа и составные значения не считаются идентификатором.
pub fn canonical_id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim()).filter(|s| !s.is_empty()).map(str::to_string),
        Value::Number(n) => n
            .as_i64()
            .map(|i| i.to_string())
            .or_else(|| n.as_u64().map(|u| u.to_string()))
            .or_else(|| {
                n.as_f64()
                    .filter(|f| f.fract() == 0.0 && f.is_finite())
                    .map(|f| format!("{f:.0}"))
            }),
        _ => None,
    }
}

fn text(value: &Option<String>) -> String {
    value.as_deref().map(str::trim).unwrap_or_default().to_string()
}

fn scalar_text(value: &Option<Value>) -> String {
    value.as_ref().and_then(canonical_id).unwrap_or_default()
}

pub fn normalize_departments(flag: &str, raw: &[RawDepartment]) -> Result<Vec<SourceDepartment>, ValidationError> {
    let mut seen = HashSet::with_capacity(raw.len());
    raw.iter()
        .enumerate()
        .map(|(index, dept)| {
            let record = department_label(index, dept);
            let id = dept
                .id
                .as_ref()
                .and_then(canonical_id)
                .ok_or_else(|| ValidationError::new(&record, "missing department id"))?;
            let parent = dept
                .parent_id
                .as_ref()
                .and_then(canonical_id)
                .ok_or_else(|| ValidationError::new(&record, "missing parent department id"))?;
            let name = text(&dept.name);
            if name.is_empty() {
                return Err(ValidationError::new(&record, "missing department name"));
            }
            if !seen.insert(id.clone()) {
                return Err(ValidationError::new(&record, format!("duplicate department id {id}")));
            }
            Ok(SourceDepartment {
                source: flag.to_string(),
                source_dept_id: source_key(flag, &id),
                source_dept_parent_id: source_key(flag, &parent),
                name,
                remark: text(&dept.remark),
            })
        })
        .collect()
}

pub fn normalize_users(flag: &str, raw: &[RawUser]) -> Result<Vec<SourceUser>, ValidationError> {
    let mut seen = HashSet::with_capacity(raw.len());
    raw.iter()
        .enumerate()
        .map(|(index, user)| {
            let record = user_label(index, user);
            let id = user
                .id
                .as_ref()
                .and_then(canonical_id)
                .ok_or_else(|| ValidationError::new(&record, "missing user id"))?;
            let username = text(&user.username);
            if username.is_empty() {
                return Err(ValidationError::new(&record, "missing username"));
            }
            if !seen.insert(username.clone()) {
                return Err(ValidationError::new(&record, format!("duplicate username {username}")));
            }
            Ok(SourceUser {
                source: flag.to_string(),
                source_user_id: source_key(flag, &id),
                username,
                nickname: text(&user.nickname),
                given_name: text(&user.given_name),
                introduction: text(&user.introduction),
                mail: text(&user.mail),
                job_number: scalar_text(&user.job_number),
                mobile: scalar_text(&user.mobile),
                postal_address: text(&user.postal_address),
                position: text(&user.position),
                source_department_ids: user
                    .departments
                    .iter()
                    .filter_map(canonical_id)
                    .map(|d| source_key(flag, &d))
                    .collect(),
            })
        })
        .collect()
}

fn department_label(index: usize, dept: &RawDepartment) -> String {
    match dept.name.as_deref() {
        Some(name) => format!("department #{index} ({name})"),
        None => format!("department #{index}"),
    }
}

fn user_label(index: usize, user: &RawUser) -> String {
    match user.username.as_deref().or(user.nickname.as_deref()) {
        Some(name) => format!("user #{index} ({name})"),
        None => format!("user #{index}"),
    }
}
