//! Stored node definitions: "run the thing named X" resolves to a kind,
//! a config and a retry policy that the registry can instantiate.

use crate::error::{LoaderError, RegistrationError};
use crate::registry::RegistrationManager;
use flowcore::{NodeHandle, NodeSettings, RetryPolicy};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeDefinition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_retries: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wait_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl NodeDefinition {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            name: None,
            kind: kind.into(),
            config: None,
            max_retries: None,
            wait_ms: None,
            description: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_config(mut self, config: Value) -> Self {
        self.config = Some(config);
        self
    }

    pub fn with_retry(mut self, max_retries: u32, wait_ms: u64) -> Self {
        self.max_retries = Some(max_retries);
        self.wait_ms = Some(wait_ms);
        self
    }

    /// Name used as the store key: the explicit name, else the kind.
    pub fn key(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.kind)
    }

    pub fn settings(&self) -> NodeSettings {
        let defaults = RetryPolicy::default();
        NodeSettings {
            config: self.config.clone(),
            retry: RetryPolicy::new(
                self.max_retries.unwrap_or(defaults.max_retries),
                self.wait_ms.unwrap_or(defaults.wait_ms),
            ),
        }
    }

    pub fn instantiate(&self, registry: &RegistrationManager) -> Result<NodeHandle, RegistrationError> {
        registry.create_node(&self.kind, self.settings())
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum DefinitionFile {
    Many(Vec<NodeDefinition>),
    One(NodeDefinition),
}

/// Named node definitions loaded from JSON.
#[derive(Debug, Clone, Default)]
pub struct DefinitionStore {
    definitions: BTreeMap<String, NodeDefinition>,
}

impl DefinitionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a single definitions file, or every `*.json` file in a
    /// directory (in file-name order).
    pub fn load_path(path: impl AsRef<Path>) -> Result<Self, LoaderError> {
        let path = path.as_ref();
        let mut store = Self::new();

        if path.is_dir() {
            let entries = std::fs::read_dir(path).map_err(|source| LoaderError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            let mut files = Vec::new();
            for entry in entries {
                let entry = entry.map_err(|source| LoaderError::Io {
                    path: path.to_path_buf(),
                    source,
                })?;
                let file = entry.path();
                if file.extension() == Some("json".as_ref()) {
                    files.push(file);
                }
            }
            files.sort();
            for file in files {
                store.load_file(&file)?;
            }
        } else {
            store.load_file(path)?;
        }

        tracing::info!("Loaded {} definition(s) from {}", store.len(), path.display());
        Ok(store)
    }

    /// Load one file holding a definition or an array of them. Returns the
    /// number of definitions added.
    pub fn load_file(&mut self, path: impl AsRef<Path>) -> Result<usize, LoaderError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| LoaderError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let parsed: DefinitionFile = serde_json::from_str(&text).map_err(|source| LoaderError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        let definitions = match parsed {
            DefinitionFile::Many(many) => many,
            DefinitionFile::One(one) => vec![one],
        };
        let count = definitions.len();
        for definition in definitions {
            self.insert(definition)?;
        }
        Ok(count)
    }

    pub fn insert(&mut self, definition: NodeDefinition) -> Result<(), LoaderError> {
        let key = definition.key().to_string();
        if self.definitions.contains_key(&key) {
            return Err(LoaderError::DuplicateName(key));
        }
        self.definitions.insert(key, definition);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&NodeDefinition> {
        self.definitions.get(name)
    }

    pub fn require(&self, name: &str) -> Result<&NodeDefinition, LoaderError> {
        self.get(name)
            .ok_or_else(|| LoaderError::NotFound(name.to_string()))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.definitions.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &NodeDefinition> {
        self.definitions.values()
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}
