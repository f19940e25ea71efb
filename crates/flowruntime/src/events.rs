use crate::plugin::PluginState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Lifecycle events emitted by the [`RegistrationManager`](crate::RegistrationManager).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum RegistryEvent {
    BeforeRegister {
        kind: String,
        plugin: Option<String>,
        timestamp: DateTime<Utc>,
    },
    AfterRegister {
        kind: String,
        plugin: Option<String>,
        replaced: bool,
        timestamp: DateTime<Utc>,
    },
    BeforeUnregister {
        kind: String,
        plugin: Option<String>,
        timestamp: DateTime<Utc>,
    },
    AfterUnregister {
        kind: String,
        plugin: Option<String>,
        timestamp: DateTime<Utc>,
    },
    PluginStateChanged {
        name: String,
        state: PluginState,
        timestamp: DateTime<Utc>,
    },
}

impl RegistryEvent {
    /// Kind the event concerns, if it is a per-class event.
    pub fn kind(&self) -> Option<&str> {
        match self {
            RegistryEvent::BeforeRegister { kind, .. }
            | RegistryEvent::AfterRegister { kind, .. }
            | RegistryEvent::BeforeUnregister { kind, .. }
            | RegistryEvent::AfterUnregister { kind, .. } => Some(kind),
            RegistryEvent::PluginStateChanged { .. } => None,
        }
    }
}

/// Broadcast channel fanning registry events out to subscribers.
pub struct RegistryEvents {
    sender: broadcast::Sender<RegistryEvent>,
}

impl RegistryEvents {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RegistryEvent> {
        self.sender.subscribe()
    }

    pub fn emit(&self, event: RegistryEvent) {
        // No subscribers is not an error.
        let _ = self.sender.send(event);
    }
}

impl Default for RegistryEvents {
    fn default() -> Self {
        Self::new(256)
    }
}
