//! Core abstractions for the flow engine
//!
//! This crate provides the node lifecycle, the flow graph walker and the
//! configuration validation engine. It knows nothing about registries.

mod error;
mod flow;
mod node;
mod shared;
pub mod validation;

pub use error::{ConfigurationError, FlowError, NodeError};
pub use flow::{Flow, NodeRef};
pub use node::{
    execute_with_retry, Executable, Node, NodeClass, NodeCore, NodeHandle, NodeSettings,
    RetryPolicy, Transition, DEFAULT_ACTION,
};
pub use shared::SharedState;
pub use validation::{validate, Schema, SchemaKind, ValidationResult};

/// Result type for flow operations
pub type Result<T> = std::result::Result<T, FlowError>;
