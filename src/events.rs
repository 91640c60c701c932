// src/events.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::broadcast;
use uuid::Uuid;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SyncAction {
    DepartmentCreated,
    UserCreated,
    UserUpdated,
    UserReactivated,
    UserDeprovisioned,
    /// Запись pending/stale заново выложена в каталог
    EntryRepaired,
    MarkedStale,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct SyncEvent {
    pub id: Uuid,
    pub action: SyncAction,
    pub source: Option<String>,
    /// DN затронутой записи
    pub entity: String,
    pub metadata: HashMap<String, String>,
    pub timestamp: DateTime<Utc>,
}

impl SyncEvent {
    pub fn new(action: SyncAction, source: Option<&str>, entity: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            action,
            source: source.map(str::to_string),
            entity: entity.to_string(),
            metadata: HashMap::new(),
            timestamp: Utc::now(),
        }
    }
}

pub struct EventHub {
    sender: broadcast::Sender<SyncEvent>,
}

impl EventHub {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.sender.subscribe()
    }

    pub fn emit(&self, event: SyncEvent) {
        let _ = self.sender.send(event); // игнорируем, если нет получателей
    }
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new(1000)
    }
}

/// sync_event!(hub, SyncAction::UserCreated, Some(flag), &dn, "username" => name);
#[macro_export]
macro_rules! sync_event {
    ($hub:expr, $action:expr, $source:expr, $entity:expr $(, $key:expr => $value:expr)* $(,)?) => {{
        #[allow(unused_mut)]
        let mut event = $crate::events::SyncEvent::new($action, $source, $entity);
        $(
            event.metadata.insert($key.to_string(), $value.to_string());
        )*
        $hub.emit(event);
    }};
}
