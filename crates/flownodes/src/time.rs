use async_trait::async_trait;
use flowcore::{Node, NodeClass, NodeCore, NodeError, Schema, SharedState};
use flowruntime::NodeMetadata;
use tokio::time::{sleep, Duration};

/// Delay execution for a specified duration
pub struct DelayNode {
    core: NodeCore,
}

impl DelayNode {
    pub fn metadata() -> NodeMetadata {
        NodeMetadata::new("Delay execution for specified milliseconds")
    }

    pub fn duration(&self) -> Duration {
        let ms = self
            .core
            .get_config("ms")
            .and_then(|v| v.as_f64())
            .unwrap_or(0.0);
        Duration::from_millis(ms as u64)
    }
}

impl NodeClass for DelayNode {
    const KIND: &'static str = "core:delay";

    fn schema() -> Schema {
        Schema::object()
            .require(["ms"])
            .property("ms", Schema::number().minimum(0.0))
    }

    fn from_core(core: NodeCore) -> Self {
        Self { core }
    }
}

#[async_trait]
impl Node for DelayNode {
    type Input = ();
    type Output = ();

    fn core(&self) -> &NodeCore {
        &self.core
    }

    async fn prepare(&self, _shared: &SharedState) -> Result<(), NodeError> {
        Ok(())
    }

    async fn execute(&self, _input: &()) -> Result<(), NodeError> {
        let duration = self.duration();
        tracing::debug!("Delaying for {}ms", duration.as_millis());
        sleep(duration).await;
        Ok(())
    }
}
