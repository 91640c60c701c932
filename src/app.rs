// src/app.rs

use crate::config::AppConfig;
use crate::directory::LocalDirectory;
use crate::events::EventHub;
use crate::raddb::{MasterKey, RadDB};
use crate::source::export::ExportSource;
use crate::store::RadStore;
use crate::sync::{Reconciler, ReconcilerSettings};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// Собирает движок из конфигурации: хранилище, каталог, источники
pub fn bootstrap(config: &AppConfig) -> Result<Reconciler, Box<dyn std::error::Error>> {
    let key = RadDB::parse_key(&config.store.master_key_hex)?;

    let store = Arc::new(RadStore::new(Arc::new(open_db(&config.store.db_path, &key)?)));
    let directory = Arc::new(LocalDirectory::new(
        Arc::new(open_db(&config.ldap.directory_path, &key)?),
        &[config.ldap.base_dn.as_str(), config.ldap.user_dn.as_str()],
    ));

    let mut reconciler = Reconciler::new(
        store.clone(),
        store,
        directory,
        ReconcilerSettings::from_config(config),
    )
    .with_events(Arc::new(EventHub::default()));

    for source in &config.sources {
        let Some(path) = &source.export_path else {
            warn!(source = %source.flag, "no export_path configured, source skipped");
            continue;
        };
        info!(source = %source.flag, kind = ?source.kind, path = %path, "source registered");
        reconciler = reconciler.with_source(source.clone(), Arc::new(ExportSource::from_file(path)));
    }

    Ok(reconciler)
}

fn open_db(path: &str, key: &MasterKey) -> Result<RadDB, Box<dyn std::error::Error>> {
    if let Some(dir) = Path::new(path).parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)?;
    }
    Ok(RadDB::open(path, key)?)
}
