use flowcore::{ConfigurationError, NodeError};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RegistrationError {
    #[error("Plugin already registered: {0}")]
    PluginAlreadyRegistered(String),

    #[error("Plugin not found: {0}")]
    PluginNotFound(String),

    #[error("No class registered for kind: {0}")]
    UnknownKind(String),

    #[error("Invalid kind '{0}': expected '<domain>:<operation>'")]
    InvalidKind(String),

    #[error("Plugin '{name}' failed: {source}")]
    Plugin {
        name: String,
        #[source]
        source: PluginError,
    },

    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
}

/// Errors raised by a plugin's own hooks.
#[derive(Error, Debug)]
pub enum PluginError {
    #[error("Initialization failed: {0}")]
    InitializationFailed(String),

    #[error("Load error: {0}")]
    LoadError(String),

    #[error("Destroy failed: {0}")]
    DestroyFailed(String),
}

#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Duplicate definition name: {0}")]
    DuplicateName(String),

    #[error("Definition not found: {0}")]
    NotFound(String),
}

impl From<RegistrationError> for NodeError {
    fn from(err: RegistrationError) -> Self {
        match err {
            RegistrationError::Configuration(e) => e.into(),
            other => NodeError::other(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_kind_names_the_kind() {
        let msg = RegistrationError::UnknownKind("unknown:kind".into()).to_string();
        assert!(msg.contains("unknown:kind"));
    }

    #[test]
    fn plugin_error_keeps_plugin_name_and_cause() {
        let err = RegistrationError::Plugin {
            name: "fs".into(),
            source: PluginError::InitializationFailed("no disk".into()),
        };
        assert_eq!(err.to_string(), "Plugin 'fs' failed: Initialization failed: no disk");
    }

    #[test]
    fn configuration_errors_stay_structured_inside_node_errors() {
        let err: NodeError = RegistrationError::Configuration(ConfigurationError {
            kind: "core:set".into(),
            errors: vec!["values is required".into()],
        })
        .into();
        assert!(err.to_string().contains("values is required"));
    }
}
