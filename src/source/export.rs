// src/source/export.rs

use crate::source::{RawDepartment, RawUser, SourceClient, SourceError, SourceResult};
use crate::sync::normalize::canonical_id;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;
use tokio::sync::RwLock;
use tracing::debug;

/// Выгрузка платформы: подразделения, активные сотрудники, уволенные
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct SourceExport {
    #[serde(default)]
    pub departments: Vec<RawDepartment>,
    #[serde(default)]
    pub users: Vec<RawUser>,
    #[serde(default)]
    pub leavers: Vec<LeaverRecord>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct LeaverRecord {
    pub id: Value,
    #[serde(default)]
    pub left_at: Option<DateTime<Utc>>,
}

enum Backing {
    /// Файл перечитывается на каждом проходе
    File(PathBuf),
    Memory(RwLock<SourceExport>),
}

/// Источник на основе JSON-выгрузки
pub struct ExportSource {
    backing: Backing,
}

impl ExportSource {
    pub fn from_file(path: impl Into<PathBuf>) -> Self {
        Self {
            backing: Backing::File(path.into()),
        }
    }

    pub fn in_memory(export: SourceExport) -> Self {
        Self {
            backing: Backing::Memory(RwLock::new(export)),
        }
    }

    /// Заменить выгрузку (только для источника в памяти)
    pub async fn replace(&self, export: SourceExport) -> SourceResult<()> {
        match &self.backing {
            Backing::Memory(lock) => {
                *lock.write().await = export;
                Ok(())
            }
            Backing::File(path) => Err(SourceError::Transport(format!(
                "{} is file-backed and read-only",
                path.display()
            ))),
        }
    }

    async fn snapshot(&self) -> SourceResult<SourceExport> {
        match &self.backing {
            Backing::File(path) => {
                debug!(path = %path.display(), "reading source export");
                let data = tokio::fs::read(path).await?;
                Ok(serde_json::from_slice(&data)?)
            }
            Backing::Memory(lock) => Ok(lock.read().await.clone()),
        }
    }
}

#[async_trait]
impl SourceClient for ExportSource {
    async fn fetch_all_departments(&self) -> SourceResult<Vec<RawDepartment>> {
        Ok(self.snapshot().await?.departments)
    }

    async fn fetch_all_users(&self) -> SourceResult<Vec<RawUser>> {
        Ok(self.snapshot().await?.users)
    }

    async fn fetch_leaver_ids(&self, window: Option<Duration>) -> SourceResult<Vec<String>> {
        let since = window.map(|w| Utc::now() - w);
        let leavers = self.snapshot().await?.leavers;
        Ok(leavers
            .iter()
            .filter(|l| match (since, l.left_at) {
                (None, _) => true,
                (Some(since), Some(left_at)) => left_at >= since,
                // без даты увольнения запись в окно не попадает
                (Some(_), None) => false,
            })
            .filter_map(|l| canonical_id(&l.id))
            .collect())
    }
}
