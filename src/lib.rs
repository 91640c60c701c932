// src/lib.rs

//! Сверка LDAP-каталога с оргструктурой и сотрудниками HR/IM-платформ.

pub mod app;
pub mod cli;
pub mod config;
pub mod directory;
pub mod events;
pub mod logging;
pub mod models;
pub mod raddb;
pub mod source;
pub mod store;
pub mod sync;
pub mod web;

pub use config::AppConfig;
pub use sync::{Reconciler, ReconcilerSettings, SyncError, SyncResult};
