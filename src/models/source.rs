// src/models/source.rs

//! Каноническая форма записей источника (после нормализации).
//! Все идентификаторы уже имеют вид `<flag>_<remoteId>`.

use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct SourceDepartment {
    pub source: String,
    pub source_dept_id: String,
    pub source_dept_parent_id: String,
    pub name: String,
    pub remark: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct SourceUser {
    pub source: String,
    pub source_user_id: String,
    pub username: String,
    pub nickname: String,
    pub given_name: String,
    pub introduction: String,
    pub mail: String,
    pub job_number: String,
    pub mobile: String,
    pub postal_address: String,
    pub position: String,
    /// Ссылки на подразделения в форме `<flag>_<remoteId>`
    pub source_department_ids: Vec<String>,
}
