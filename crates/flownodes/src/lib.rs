//! Standard node library
//!
//! Built-in `core:*` nodes, bundled as the `core` plugin.

mod debug;
mod runner;
mod time;
mod transform;

pub use debug::{DebugNode, LogResultNode};
pub use runner::DynamicRunnerNode;
pub use time::DelayNode;
pub use transform::{JsonParseNode, JsonStringifyNode, SetNode};

use async_trait::async_trait;
use flowruntime::{
    factory, NodeFactory, Plugin, PluginError, RegistrationError, RegistrationManager,
    SharedRegistry,
};
use std::sync::{Arc, Weak};
use tokio::sync::RwLock;

/// Plugin registering every built-in node kind.
///
/// Without a registry handle the plugin leaves out `core:run-dynamic`,
/// which needs one to build nodes at run time.
#[derive(Default)]
pub struct CorePlugin {
    registry: Option<Weak<RwLock<RegistrationManager>>>,
}

impl CorePlugin {
    pub const NAME: &'static str = "core";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_registry(registry: &SharedRegistry) -> Self {
        Self {
            registry: Some(Arc::downgrade(registry)),
        }
    }
}

#[async_trait]
impl Plugin for CorePlugin {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn version(&self) -> &str {
        env!("CARGO_PKG_VERSION")
    }

    fn description(&self) -> Option<&str> {
        Some("Built-in debug, timing, transform and dynamic-runner nodes")
    }

    async fn node_classes(&self) -> Result<Vec<Arc<dyn NodeFactory>>, PluginError> {
        let mut classes = vec![
            factory::<DebugNode>(DebugNode::metadata()),
            factory::<LogResultNode>(LogResultNode::metadata()),
            factory::<DelayNode>(DelayNode::metadata()),
            factory::<SetNode>(SetNode::metadata()),
            factory::<JsonParseNode>(JsonParseNode::metadata()),
            factory::<JsonStringifyNode>(JsonStringifyNode::metadata()),
        ];
        if let Some(registry) = &self.registry {
            let registry = registry
                .upgrade()
                .ok_or_else(|| PluginError::LoadError("registry dropped".to_string()))?;
            classes.push(DynamicRunnerNode::factory(&registry));
        }
        Ok(classes)
    }
}

/// Register the `core` plugin, runner included, into `registry`.
///
/// Holds the write lock while the plugin hooks run. Do not call this
/// while holding a read or write guard on the same registry.
pub async fn register_core(registry: &SharedRegistry) -> Result<(), RegistrationError> {
    let plugin = Arc::new(CorePlugin::with_registry(registry));
    registry.write().await.register_plugin(plugin).await
}
