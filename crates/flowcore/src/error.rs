use thiserror::Error;

#[derive(Error, Debug)]
pub enum FlowError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error("Node '{kind}' failed: {source}")]
    Execution {
        kind: String,
        #[source]
        source: NodeError,
    },

    #[error("Invalid graph: {0}")]
    InvalidGraph(String),
}

impl FlowError {
    pub fn execution(kind: impl Into<String>, source: NodeError) -> Self {
        FlowError::Execution {
            kind: kind.into(),
            source,
        }
    }
}

/// Raised when a node or flow is constructed with a config that fails
/// schema validation. Carries every violation, not just the first.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid configuration for '{kind}': {}", errors.join("; "))]
pub struct ConfigurationError {
    pub kind: String,
    pub errors: Vec<String>,
}

#[derive(Error, Debug)]
pub enum NodeError {
    #[error("Missing required input: {0}")]
    MissingInput(String),

    #[error("Invalid input type for '{field}': expected {expected}, got {actual}")]
    InvalidInputType {
        field: String,
        expected: String,
        actual: String,
    },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    #[error(transparent)]
    Flow(#[from] Box<FlowError>),

    #[error(transparent)]
    Other(Box<dyn std::error::Error + Send + Sync>),
}

impl NodeError {
    /// Wrap any foreign error raised inside a node phase.
    pub fn other<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        NodeError::Other(Box::new(err))
    }
}

impl From<FlowError> for NodeError {
    fn from(err: FlowError) -> Self {
        NodeError::Flow(Box::new(err))
    }
}

impl From<ConfigurationError> for NodeError {
    fn from(err: ConfigurationError) -> Self {
        NodeError::Flow(Box::new(FlowError::Configuration(err)))
    }
}
