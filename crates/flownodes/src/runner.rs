use async_trait::async_trait;
use flowcore::{
    ConfigurationError, Executable, Node, NodeCore, NodeError, NodeHandle, NodeSettings, Schema,
    SharedState, Transition,
};
use flowruntime::{
    FnFactory, NodeDefinition, NodeFactory, NodeMetadata, RegistrationManager, SharedRegistry,
};
use std::sync::{Arc, Weak};
use tokio::sync::RwLock;

/// Builds a node from a definition found in shared state and splices it
/// in as its own successor.
///
/// The registry is held weakly so the runner's factory can live inside
/// the registry it points at.
pub struct DynamicRunnerNode {
    core: NodeCore,
    registry: Weak<RwLock<RegistrationManager>>,
}

impl DynamicRunnerNode {
    pub const KIND: &'static str = "core:run-dynamic";
    pub const DEFAULT_KEY: &'static str = "cfg";

    pub fn schema() -> Schema {
        Schema::object().property("key", Schema::string().min_length(1))
    }

    pub fn metadata() -> NodeMetadata {
        NodeMetadata::new("Instantiate a node from a definition and run it next")
            .reads("cfg", "Node definition: { kind, config?, max_retries?, wait_ms? } (key configurable)", true)
    }

    pub fn new(settings: NodeSettings, registry: &SharedRegistry) -> Result<Self, ConfigurationError> {
        let core = NodeCore::new(Self::KIND, &Self::schema(), settings)?;
        Ok(Self::from_core(core, Arc::downgrade(registry)))
    }

    fn from_core(core: NodeCore, registry: Weak<RwLock<RegistrationManager>>) -> Self {
        Self { core, registry }
    }

    /// Factory that hands each runner a weak handle to `registry`.
    pub fn factory(registry: &SharedRegistry) -> Arc<dyn NodeFactory> {
        let registry = Arc::downgrade(registry);
        Arc::new(
            FnFactory::new(Self::KIND, Self::schema(), move |core| -> NodeHandle {
                Arc::new(Self::from_core(core, registry.clone()))
            })
            .with_metadata(Self::metadata()),
        )
    }

    fn key(&self) -> &str {
        self.core.config_str("key").unwrap_or(Self::DEFAULT_KEY)
    }
}

#[async_trait]
impl Node for DynamicRunnerNode {
    type Input = NodeHandle;
    type Output = ();

    fn core(&self) -> &NodeCore {
        &self.core
    }

    async fn prepare(&self, shared: &SharedState) -> Result<NodeHandle, NodeError> {
        let key = self.key();
        let definition: NodeDefinition =
            serde_json::from_value(shared.require(key)?.clone()).map_err(|e| {
                NodeError::InvalidInputType {
                    field: key.to_string(),
                    expected: "node definition".to_string(),
                    actual: e.to_string(),
                }
            })?;

        let registry = self
            .registry
            .upgrade()
            .ok_or_else(|| NodeError::ExecutionFailed("Registry is gone".to_string()))?;
        let node = definition.instantiate(&*registry.read().await)?;
        tracing::debug!("Instantiated {} from '{}'", node.kind(), key);
        Ok(node)
    }

    async fn execute(&self, _input: &NodeHandle) -> Result<(), NodeError> {
        Ok(())
    }

    async fn finalize(
        &self,
        _shared: &mut SharedState,
        node: NodeHandle,
        _output: (),
    ) -> Result<Transition, NodeError> {
        Ok(Transition::default().with_splice(node))
    }
}
