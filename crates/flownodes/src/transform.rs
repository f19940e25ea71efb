use async_trait::async_trait;
use flowcore::{Node, NodeClass, NodeCore, NodeError, Schema, SharedState, Transition};
use flowruntime::NodeMetadata;
use serde_json::{Map, Value};

fn key_config<'a>(core: &'a NodeCore, name: &str) -> Result<&'a str, NodeError> {
    core.require_config(name)?
        .as_str()
        .ok_or_else(|| NodeError::Configuration(format!("'{}' must be a string", name)))
}

fn from_to_schema() -> Schema {
    Schema::object()
        .require(["from", "to"])
        .property("from", Schema::string().min_length(1))
        .property("to", Schema::string().min_length(1))
}

/// Writes each entry of its `values` config into shared state.
pub struct SetNode {
    core: NodeCore,
}

impl SetNode {
    pub fn metadata() -> NodeMetadata {
        NodeMetadata::new("Write constant values into shared state")
    }
}

impl NodeClass for SetNode {
    const KIND: &'static str = "core:set";

    fn schema() -> Schema {
        Schema::object()
            .require(["values"])
            .property("values", Schema::object())
    }

    fn from_core(core: NodeCore) -> Self {
        Self { core }
    }
}

#[async_trait]
impl Node for SetNode {
    type Input = ();
    type Output = Map<String, Value>;

    fn core(&self) -> &NodeCore {
        &self.core
    }

    async fn prepare(&self, _shared: &SharedState) -> Result<(), NodeError> {
        Ok(())
    }

    async fn execute(&self, _input: &()) -> Result<Self::Output, NodeError> {
        match self.core.require_config("values")? {
            Value::Object(values) => Ok(values.clone()),
            other => Err(NodeError::InvalidInputType {
                field: "values".to_string(),
                expected: "object".to_string(),
                actual: flowcore::validation::type_name(other).to_string(),
            }),
        }
    }

    async fn finalize(
        &self,
        shared: &mut SharedState,
        _input: (),
        values: Self::Output,
    ) -> Result<Transition, NodeError> {
        for (key, value) in values {
            shared.insert(key, value);
        }
        Ok(Transition::default())
    }
}

/// Parse a JSON string held in shared state
///
/// Bad JSON is not retried: the message lands in `shared["error"]` and
/// the node takes the `error` action.
pub struct JsonParseNode {
    core: NodeCore,
}

impl JsonParseNode {
    pub fn metadata() -> NodeMetadata {
        NodeMetadata::new("Parse JSON string")
            .reads("from", "JSON text (key configurable)", true)
            .writes("to", "Parsed value (key configurable)")
            .writes("error", "Parse error message on failure")
    }
}

impl NodeClass for JsonParseNode {
    const KIND: &'static str = "core:json-parse";

    fn schema() -> Schema {
        from_to_schema()
    }

    fn from_core(core: NodeCore) -> Self {
        Self { core }
    }
}

#[async_trait]
impl Node for JsonParseNode {
    type Input = String;
    type Output = Result<Value, String>;

    fn core(&self) -> &NodeCore {
        &self.core
    }

    async fn prepare(&self, shared: &SharedState) -> Result<String, NodeError> {
        let from = key_config(&self.core, "from")?;
        Ok(shared.require_str(from)?.to_string())
    }

    async fn execute(&self, input: &String) -> Result<Self::Output, NodeError> {
        Ok(serde_json::from_str(input).map_err(|e| format!("JSON parse error: {}", e)))
    }

    async fn finalize(
        &self,
        shared: &mut SharedState,
        _input: String,
        parsed: Self::Output,
    ) -> Result<Transition, NodeError> {
        match parsed {
            Ok(value) => {
                shared.insert(key_config(&self.core, "to")?, value);
                Ok(Transition::default())
            }
            Err(message) => {
                tracing::warn!("{}: {}", self.core.kind(), message);
                shared.insert("error", message);
                Ok(Transition::to("error"))
            }
        }
    }
}

/// Stringify a shared-state value to JSON
pub struct JsonStringifyNode {
    core: NodeCore,
}

impl JsonStringifyNode {
    pub fn metadata() -> NodeMetadata {
        NodeMetadata::new("Convert value to JSON string")
            .reads("from", "Value to serialise (key configurable)", true)
            .writes("to", "JSON text (key configurable)")
    }
}

impl NodeClass for JsonStringifyNode {
    const KIND: &'static str = "core:json-stringify";

    fn schema() -> Schema {
        from_to_schema().property("pretty", Schema::boolean())
    }

    fn from_core(core: NodeCore) -> Self {
        Self { core }
    }
}

#[async_trait]
impl Node for JsonStringifyNode {
    type Input = Value;
    type Output = String;

    fn core(&self) -> &NodeCore {
        &self.core
    }

    async fn prepare(&self, shared: &SharedState) -> Result<Value, NodeError> {
        let from = key_config(&self.core, "from")?;
        Ok(shared.require(from)?.clone())
    }

    async fn execute(&self, input: &Value) -> Result<String, NodeError> {
        let pretty = self
            .core
            .get_config("pretty")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        let text = if pretty {
            serde_json::to_string_pretty(input)
        } else {
            serde_json::to_string(input)
        };
        text.map_err(|e| NodeError::ExecutionFailed(format!("JSON stringify error: {}", e)))
    }

    async fn finalize(
        &self,
        shared: &mut SharedState,
        _input: Value,
        text: String,
    ) -> Result<Transition, NodeError> {
        shared.insert(key_config(&self.core, "to")?, text);
        Ok(Transition::default())
    }
}
