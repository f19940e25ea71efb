use async_trait::async_trait;
use flowcore::{Node, NodeClass, NodeCore, NodeError, Schema, SharedState, Transition};
use flowruntime::NodeMetadata;
use serde_json::Value;

/// Logs every shared-state key and records the key names in `debug_keys`.
pub struct DebugNode {
    core: NodeCore,
}

impl DebugNode {
    pub fn metadata() -> NodeMetadata {
        NodeMetadata::new("Logs shared state for debugging")
            .writes("debug_keys", "Names of the keys present when the node ran")
    }
}

impl NodeClass for DebugNode {
    const KIND: &'static str = "core:debug";

    fn schema() -> Schema {
        Schema::object().property("label", Schema::string())
    }

    fn from_core(core: NodeCore) -> Self {
        Self { core }
    }
}

#[async_trait]
impl Node for DebugNode {
    type Input = Vec<(String, Value)>;
    type Output = Vec<String>;

    fn core(&self) -> &NodeCore {
        &self.core
    }

    async fn prepare(&self, shared: &SharedState) -> Result<Self::Input, NodeError> {
        Ok(shared
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect())
    }

    async fn execute(&self, input: &Self::Input) -> Result<Self::Output, NodeError> {
        let label = self.core.config_str("label").unwrap_or("debug");
        tracing::info!("DEBUG [{}]: {} key(s)", label, input.len());
        for (key, value) in input {
            tracing::info!("  {}: {}", key, value);
        }
        Ok(input.iter().map(|(key, _)| key.clone()).collect())
    }

    async fn finalize(
        &self,
        shared: &mut SharedState,
        _input: Self::Input,
        keys: Self::Output,
    ) -> Result<Transition, NodeError> {
        shared.insert("debug_keys", keys);
        Ok(Transition::default())
    }
}

/// Logs one shared-state value, `result` unless configured otherwise.
/// Takes the `error` action when the key is absent.
pub struct LogResultNode {
    core: NodeCore,
}

impl LogResultNode {
    const DEFAULT_KEY: &'static str = "result";

    pub fn metadata() -> NodeMetadata {
        NodeMetadata::new("Logs a single shared-state value")
            .reads("result", "Value to log (key configurable)", true)
    }

    fn key(&self) -> &str {
        self.core.config_str("key").unwrap_or(Self::DEFAULT_KEY)
    }
}

impl NodeClass for LogResultNode {
    const KIND: &'static str = "core:log-result";

    fn schema() -> Schema {
        Schema::object().property("key", Schema::string().min_length(1))
    }

    fn from_core(core: NodeCore) -> Self {
        Self { core }
    }
}

#[async_trait]
impl Node for LogResultNode {
    type Input = Option<Value>;
    type Output = bool;

    fn core(&self) -> &NodeCore {
        &self.core
    }

    async fn prepare(&self, shared: &SharedState) -> Result<Self::Input, NodeError> {
        Ok(shared.get(self.key()).cloned())
    }

    async fn execute(&self, input: &Self::Input) -> Result<Self::Output, NodeError> {
        match input {
            Some(value) => {
                tracing::info!("{} = {}", self.key(), value);
                Ok(true)
            }
            None => {
                tracing::warn!("No '{}' in shared state", self.key());
                Ok(false)
            }
        }
    }

    async fn finalize(
        &self,
        _shared: &mut SharedState,
        _input: Self::Input,
        found: Self::Output,
    ) -> Result<Transition, NodeError> {
        Ok(if found {
            Transition::default()
        } else {
            Transition::to("error")
        })
    }
}
