use crate::error::PluginError;
use crate::registry::NodeFactory;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A named, versioned bundle of node classes registered as a unit.
///
/// Lifecycle: `initialize` runs first, then `node_classes` supplies the
/// factories to register. `destroy` runs on unregistration and, best
/// effort, when registration fails part way.
///
/// Hooks run inside `register_plugin` / `unregister_plugin`, which take
/// `&mut RegistrationManager`. With a [`SharedRegistry`](crate::SharedRegistry)
/// the caller holds its write lock for the whole call, so a hook that
/// locks the same registry deadlocks.
#[async_trait]
pub trait Plugin: Send + Sync {
    fn name(&self) -> &str;

    fn version(&self) -> &str;

    fn description(&self) -> Option<&str> {
        None
    }

    async fn initialize(&self) -> Result<(), PluginError> {
        Ok(())
    }

    async fn node_classes(&self) -> Result<Vec<Arc<dyn NodeFactory>>, PluginError>;

    async fn destroy(&self) -> Result<(), PluginError> {
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PluginState {
    Unregistered,
    Initializing,
    Registered,
    Unregistering,
}

/// Snapshot of a registered plugin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PluginInfo {
    pub name: String,
    pub version: String,
    pub description: Option<String>,
    pub state: PluginState,
    pub kinds: Vec<String>,
}
