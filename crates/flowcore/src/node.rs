use crate::validation::{validate, Schema};
use crate::{ConfigurationError, FlowError, NodeError, SharedState};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// Action that continues the walk when a node does not pick one.
pub const DEFAULT_ACTION: &str = "default";

/// Shared, type-erased node as stored in a flow graph.
pub type NodeHandle = Arc<dyn Executable>;

/// Retry policy for a node's execute phase.
///
/// Attempt-counted with a flat wait between attempts, no backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub wait_ms: u64,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, wait_ms: u64) -> Self {
        Self {
            max_retries,
            wait_ms,
        }
    }

    /// Number of attempts actually made; zero is treated as one.
    pub fn attempts(&self) -> u32 {
        self.max_retries.max(1)
    }

    pub fn wait(&self) -> Duration {
        Duration::from_millis(self.wait_ms)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 1,
            wait_ms: 0,
        }
    }
}

/// Construction arguments shared by every node and flow.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeSettings {
    pub config: Option<Value>,
    pub retry: RetryPolicy,
}

impl NodeSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(mut self, config: Value) -> Self {
        self.config = Some(config);
        self
    }

    pub fn with_retry(mut self, max_retries: u32, wait_ms: u64) -> Self {
        self.retry = RetryPolicy::new(max_retries, wait_ms);
        self
    }
}

/// State every node carries: its kind, validated config and retry policy.
#[derive(Debug, Clone)]
pub struct NodeCore {
    kind: String,
    schema: Schema,
    config: Value,
    retry: RetryPolicy,
}

impl NodeCore {
    /// Validate `settings.config` against `schema` and build the core.
    ///
    /// An absent or `null` config skips validation entirely.
    pub fn new(
        kind: impl Into<String>,
        schema: &Schema,
        settings: NodeSettings,
    ) -> Result<Self, ConfigurationError> {
        let kind = kind.into();
        let config = settings.config.unwrap_or(Value::Null);
        check_config(&kind, schema, &config)?;

        Ok(Self {
            kind,
            schema: schema.clone(),
            config,
            retry: settings.retry,
        })
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn config(&self) -> &Value {
        &self.config
    }

    /// Replace the config, re-running validation. On failure the old
    /// config is kept.
    pub fn set_config(&mut self, config: Value) -> Result<(), ConfigurationError> {
        check_config(&self.kind, &self.schema, &config)?;
        self.config = config;
        Ok(())
    }

    pub fn retry(&self) -> RetryPolicy {
        self.retry
    }

    pub fn get_config(&self, name: &str) -> Option<&Value> {
        self.config.get(name)
    }

    /// Get config value or return error
    pub fn require_config(&self, name: &str) -> Result<&Value, NodeError> {
        self.config
            .get(name)
            .ok_or_else(|| NodeError::Configuration(format!("Missing config: {}", name)))
    }

    pub fn config_str(&self, name: &str) -> Option<&str> {
        self.config.get(name).and_then(Value::as_str)
    }
}

fn check_config(kind: &str, schema: &Schema, config: &Value) -> Result<(), ConfigurationError> {
    if config.is_null() {
        return Ok(());
    }
    validate(config, schema).into_result(kind)
}

/// What a node hands back to the walker after its finalize phase.
///
/// `action: None` ends the walk. A `splice` node is attached as the
/// successor for `action` before the walker looks the successor up.
#[derive(Clone)]
pub struct Transition {
    pub action: Option<String>,
    pub splice: Option<NodeHandle>,
}

impl Transition {
    pub fn to(action: impl Into<String>) -> Self {
        Self {
            action: Some(action.into()),
            splice: None,
        }
    }

    pub fn end() -> Self {
        Self {
            action: None,
            splice: None,
        }
    }

    pub fn with_splice(mut self, node: NodeHandle) -> Self {
        self.splice = Some(node);
        self
    }

    pub fn action(&self) -> Option<&str> {
        self.action.as_deref()
    }
}

impl Default for Transition {
    fn default() -> Self {
        Self::to(DEFAULT_ACTION)
    }
}

impl std::fmt::Debug for Transition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transition")
            .field("action", &self.action)
            .field("splice", &self.splice.as_ref().map(|n| n.kind().to_string()))
            .finish()
    }
}

/// Core trait that all executable nodes implement.
///
/// A node runs in three phases: `prepare` pulls its input out of shared
/// state, `execute` does the work (retried per the node's
/// [`RetryPolicy`]) and `finalize` writes results back and picks the
/// next transition.
#[async_trait]
pub trait Node: Send + Sync + 'static {
    type Input: Send + Sync + 'static;
    type Output: Send + 'static;

    fn core(&self) -> &NodeCore;

    async fn prepare(&self, shared: &SharedState) -> Result<Self::Input, NodeError>;

    async fn execute(&self, input: &Self::Input) -> Result<Self::Output, NodeError>;

    /// Fallback for the last failed attempt. The default re-raises.
    async fn handle_error(
        &self,
        _input: &Self::Input,
        error: NodeError,
        _attempt: u32,
    ) -> Result<Self::Output, NodeError> {
        Err(error)
    }

    async fn finalize(
        &self,
        _shared: &mut SharedState,
        _input: Self::Input,
        _output: Self::Output,
    ) -> Result<Transition, NodeError> {
        Ok(Transition::default())
    }
}

/// A node type that can be built from [`NodeSettings`] alone.
pub trait NodeClass: Node + Sized {
    const KIND: &'static str;

    fn schema() -> Schema {
        Schema::any()
    }

    fn from_core(core: NodeCore) -> Self;

    fn create(settings: NodeSettings) -> Result<Self, ConfigurationError> {
        NodeCore::new(Self::KIND, &Self::schema(), settings).map(Self::from_core)
    }
}

/// Object-safe face of anything a flow can step through: plain nodes
/// and nested flows.
#[async_trait]
pub trait Executable: Send + Sync {
    fn kind(&self) -> &str;

    async fn invoke(&self, shared: &mut SharedState) -> Result<Transition, FlowError>;
}

#[async_trait]
impl<N: Node> Executable for N {
    fn kind(&self) -> &str {
        self.core().kind()
    }

    async fn invoke(&self, shared: &mut SharedState) -> Result<Transition, FlowError> {
        let kind = self.core().kind();
        let input = self
            .prepare(shared)
            .await
            .map_err(|e| FlowError::execution(kind, e))?;
        let output = execute_with_retry(self, &input)
            .await
            .map_err(|e| FlowError::execution(kind, e))?;
        self.finalize(shared, input, output)
            .await
            .map_err(|e| FlowError::execution(kind, e))
    }
}

/// Run `execute` up to `max_retries` times, waiting between attempts.
/// The last failure goes through `handle_error`.
pub async fn execute_with_retry<N: Node>(
    node: &N,
    input: &N::Input,
) -> Result<N::Output, NodeError> {
    let policy = node.core().retry();
    let attempts = policy.attempts();
    let kind = node.core().kind();
    let mut attempt = 1;

    loop {
        match node.execute(input).await {
            Ok(output) => return Ok(output),
            Err(e) if attempt >= attempts => {
                tracing::debug!(
                    "Node {} exhausted {} attempt(s): {}",
                    kind,
                    attempts,
                    e
                );
                return node.handle_error(input, e, attempt).await;
            }
            Err(e) => {
                tracing::warn!(
                    "Node {} attempt {}/{} failed: {}",
                    kind,
                    attempt,
                    attempts,
                    e
                );
                if policy.wait_ms > 0 {
                    tokio::time::sleep(policy.wait()).await;
                }
                attempt += 1;
            }
        }
    }
}
