//! Node registration runtime
//!
//! This crate maps kind identifiers to node factories, manages plugin
//! lifecycles and loads stored node definitions.

mod error;
mod events;
mod loader;
mod plugin;
mod registry;

pub use error::{LoaderError, PluginError, RegistrationError};
pub use events::{RegistryEvent, RegistryEvents};
pub use loader::{DefinitionStore, NodeDefinition};
pub use plugin::{Plugin, PluginInfo, PluginState};
pub use registry::{
    factory, is_valid_kind, ClassFactory, FnFactory, NodeFactory, NodeMetadata,
    RegistrationManager, SharedRegistry, StateKey,
};
