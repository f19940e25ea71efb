use crate::error::RegistrationError;
use crate::events::{RegistryEvent, RegistryEvents};
use crate::plugin::{Plugin, PluginInfo, PluginState};
use chrono::Utc;
use flowcore::{ConfigurationError, NodeClass, NodeCore, NodeHandle, NodeSettings, Schema};
use std::collections::{BTreeMap, HashMap};
use std::marker::PhantomData;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Registry handle shared between the composition root and nodes that
/// build other nodes while a flow is running.
pub type SharedRegistry = Arc<RwLock<RegistrationManager>>;

/// Factory trait for creating node instances
pub trait NodeFactory: Send + Sync {
    /// Kind identifier, `<domain>:<operation>`
    fn kind(&self) -> &str;

    /// Schema the config must satisfy
    fn schema(&self) -> Schema {
        Schema::any()
    }

    /// Optional: Get node metadata (description, shared-state keys, etc.)
    fn metadata(&self) -> NodeMetadata {
        NodeMetadata::default()
    }

    /// Build the node from an already validated core.
    fn build(&self, core: NodeCore) -> NodeHandle;

    /// Validate `settings` against [`schema`](Self::schema) and build.
    fn create(&self, settings: NodeSettings) -> Result<NodeHandle, ConfigurationError> {
        let core = NodeCore::new(self.kind(), &self.schema(), settings)?;
        Ok(self.build(core))
    }
}

/// Metadata about a node kind
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeMetadata {
    pub description: String,
    /// Shared-state keys the node reads.
    pub reads: Vec<StateKey>,
    /// Shared-state keys the node writes.
    pub writes: Vec<StateKey>,
}

impl NodeMetadata {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            ..Self::default()
        }
    }

    pub fn reads(mut self, name: impl Into<String>, description: impl Into<String>, required: bool) -> Self {
        self.reads.push(StateKey {
            name: name.into(),
            description: description.into(),
            required,
        });
        self
    }

    pub fn writes(mut self, name: impl Into<String>, description: impl Into<String>) -> Self {
        self.writes.push(StateKey {
            name: name.into(),
            description: description.into(),
            required: false,
        });
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateKey {
    pub name: String,
    pub description: String,
    pub required: bool,
}

/// Factory for any [`NodeClass`].
pub struct ClassFactory<T> {
    metadata: NodeMetadata,
    _marker: PhantomData<fn() -> T>,
}

impl<T: NodeClass> ClassFactory<T> {
    pub fn new(metadata: NodeMetadata) -> Self {
        Self {
            metadata,
            _marker: PhantomData,
        }
    }
}

impl<T: NodeClass> NodeFactory for ClassFactory<T> {
    fn kind(&self) -> &str {
        T::KIND
    }

    fn schema(&self) -> Schema {
        T::schema()
    }

    fn metadata(&self) -> NodeMetadata {
        self.metadata.clone()
    }

    fn build(&self, core: NodeCore) -> NodeHandle {
        Arc::new(T::from_core(core))
    }
}

/// Shorthand for `Arc::new(ClassFactory::<T>::new(metadata))`.
pub fn factory<T: NodeClass>(metadata: NodeMetadata) -> Arc<dyn NodeFactory> {
    Arc::new(ClassFactory::<T>::new(metadata))
}

type BuildFn = dyn Fn(NodeCore) -> NodeHandle + Send + Sync;

/// Factory backed by a closure, for flows and for nodes that need
/// dependencies beyond their config.
pub struct FnFactory {
    kind: String,
    schema: Schema,
    metadata: NodeMetadata,
    build: Box<BuildFn>,
}

impl FnFactory {
    pub fn new<F>(kind: impl Into<String>, schema: Schema, build: F) -> Self
    where
        F: Fn(NodeCore) -> NodeHandle + Send + Sync + 'static,
    {
        Self {
            kind: kind.into(),
            schema,
            metadata: NodeMetadata::default(),
            build: Box::new(build),
        }
    }

    pub fn with_metadata(mut self, metadata: NodeMetadata) -> Self {
        self.metadata = metadata;
        self
    }
}

impl NodeFactory for FnFactory {
    fn kind(&self) -> &str {
        &self.kind
    }

    fn schema(&self) -> Schema {
        self.schema.clone()
    }

    fn metadata(&self) -> NodeMetadata {
        self.metadata.clone()
    }

    fn build(&self, core: NodeCore) -> NodeHandle {
        (self.build)(core)
    }
}

/// `true` for `<domain>:<operation>` with both parts non-empty.
pub fn is_valid_kind(kind: &str) -> bool {
    if kind.chars().any(char::is_whitespace) {
        return false;
    }
    match kind.split_once(':') {
        Some((domain, operation)) => {
            !domain.is_empty() && !operation.is_empty() && !operation.contains(':')
        }
        None => false,
    }
}

#[derive(Clone)]
struct Registration {
    factory: Arc<dyn NodeFactory>,
    plugin: Option<String>,
}

struct PluginRecord {
    plugin: Arc<dyn Plugin>,
    state: PluginState,
    kinds: Vec<String>,
}

/// Maps kinds to node factories and manages plugin lifecycles.
///
/// Registering a kind that already exists replaces its factory. Plugin
/// names, on the other hand, must be unique.
pub struct RegistrationManager {
    classes: HashMap<String, Registration>,
    plugins: BTreeMap<String, PluginRecord>,
    events: RegistryEvents,
}

impl RegistrationManager {
    pub fn new() -> Self {
        Self::with_event_capacity(256)
    }

    pub fn with_event_capacity(capacity: usize) -> Self {
        Self {
            classes: HashMap::new(),
            plugins: BTreeMap::new(),
            events: RegistryEvents::new(capacity),
        }
    }

    /// Wrap into a [`SharedRegistry`].
    pub fn into_shared(self) -> SharedRegistry {
        Arc::new(RwLock::new(self))
    }

    /// Subscribe to registration lifecycle events
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<RegistryEvent> {
        self.events.subscribe()
    }

    /// Register a node factory, returning the one it replaced.
    pub fn register_node_class(
        &mut self,
        factory: Arc<dyn NodeFactory>,
    ) -> Result<Option<Arc<dyn NodeFactory>>, RegistrationError> {
        let previous = self.insert_class(factory, None)?;
        Ok(previous.map(|r| r.factory))
    }

    pub fn unregister_node_class(&mut self, kind: &str) -> Option<Arc<dyn NodeFactory>> {
        self.remove_class(kind, None).map(|r| r.factory)
    }

    fn insert_class(
        &mut self,
        factory: Arc<dyn NodeFactory>,
        plugin: Option<&str>,
    ) -> Result<Option<Registration>, RegistrationError> {
        let kind = factory.kind().to_string();
        if !is_valid_kind(&kind) {
            return Err(RegistrationError::InvalidKind(kind));
        }

        Ok(self.put_class(
            kind,
            Registration {
                factory,
                plugin: plugin.map(str::to_string),
            },
        ))
    }

    /// Store `registration` under `kind`, emitting the register events.
    fn put_class(&mut self, kind: String, registration: Registration) -> Option<Registration> {
        let plugin = registration.plugin.clone();
        self.events.emit(RegistryEvent::BeforeRegister {
            kind: kind.clone(),
            plugin: plugin.clone(),
            timestamp: Utc::now(),
        });

        let previous = self.classes.insert(kind.clone(), registration);

        if previous.is_some() {
            tracing::warn!("Overwriting node kind: {}", kind);
        } else {
            tracing::info!("Registering node kind: {}", kind);
        }

        self.events.emit(RegistryEvent::AfterRegister {
            kind,
            plugin,
            replaced: previous.is_some(),
            timestamp: Utc::now(),
        });

        previous
    }

    fn remove_class(&mut self, kind: &str, plugin: Option<&str>) -> Option<Registration> {
        if !self.classes.contains_key(kind) {
            return None;
        }

        self.events.emit(RegistryEvent::BeforeUnregister {
            kind: kind.to_string(),
            plugin: plugin.map(str::to_string),
            timestamp: Utc::now(),
        });
        let removed = self.classes.remove(kind);
        tracing::info!("Unregistered node kind: {}", kind);
        self.events.emit(RegistryEvent::AfterUnregister {
            kind: kind.to_string(),
            plugin: plugin.map(str::to_string),
            timestamp: Utc::now(),
        });

        removed
    }

    /// Create a node instance from a kind and settings.
    ///
    /// The factory re-runs config validation, so a bad config surfaces
    /// here as [`RegistrationError::Configuration`].
    pub fn create_node(
        &self,
        kind: &str,
        settings: NodeSettings,
    ) -> Result<NodeHandle, RegistrationError> {
        let registration = self
            .classes
            .get(kind)
            .ok_or_else(|| RegistrationError::UnknownKind(kind.to_string()))?;

        tracing::debug!("Creating node of kind {}", kind);
        Ok(registration.factory.create(settings)?)
    }

    pub fn get_node_class(&self, kind: &str) -> Option<Arc<dyn NodeFactory>> {
        self.classes.get(kind).map(|r| r.factory.clone())
    }

    pub fn has_kind(&self, kind: &str) -> bool {
        self.classes.contains_key(kind)
    }

    /// Get all registered kinds, sorted
    pub fn kinds(&self) -> Vec<String> {
        let mut kinds: Vec<String> = self.classes.keys().cloned().collect();
        kinds.sort();
        kinds
    }

    /// Factories whose kind lives under `<prefix>:`, sorted by kind.
    pub fn get_node_classes_by_category(&self, prefix: &str) -> Vec<Arc<dyn NodeFactory>> {
        let namespace = format!("{}:", prefix);
        let mut matches: Vec<(&String, &Registration)> = self
            .classes
            .iter()
            .filter(|(kind, _)| kind.starts_with(&namespace))
            .collect();
        matches.sort_by(|a, b| a.0.cmp(b.0));
        matches.into_iter().map(|(_, r)| r.factory.clone()).collect()
    }

    /// Get metadata for a kind
    pub fn get_metadata(&self, kind: &str) -> Option<NodeMetadata> {
        self.classes.get(kind).map(|r| r.factory.metadata())
    }

    /// Name of the plugin that registered `kind`, if any.
    pub fn owner_of(&self, kind: &str) -> Option<&str> {
        self.classes.get(kind).and_then(|r| r.plugin.as_deref())
    }

    pub fn plugin_state(&self, name: &str) -> PluginState {
        self.plugins
            .get(name)
            .map(|record| record.state)
            .unwrap_or(PluginState::Unregistered)
    }

    pub fn plugins(&self) -> Vec<PluginInfo> {
        self.plugins
            .iter()
            .map(|(name, record)| PluginInfo {
                name: name.clone(),
                version: record.plugin.version().to_string(),
                description: record.plugin.description().map(str::to_string),
                state: record.state,
                kinds: record.kinds.clone(),
            })
            .collect()
    }

    fn emit_state(&self, name: &str, state: PluginState) {
        tracing::debug!("Plugin {} is now {:?}", name, state);
        self.events.emit(RegistryEvent::PluginStateChanged {
            name: name.to_string(),
            state,
            timestamp: Utc::now(),
        });
    }

    /// Initialize `plugin` and register every node class it provides.
    ///
    /// On failure, classes already registered by this attempt are rolled
    /// back (restoring any factory they replaced), `destroy` is called
    /// best-effort and the original error is returned.
    pub async fn register_plugin(&mut self, plugin: Arc<dyn Plugin>) -> Result<(), RegistrationError> {
        let name = plugin.name().to_string();
        if self.plugins.contains_key(&name) {
            return Err(RegistrationError::PluginAlreadyRegistered(name));
        }

        tracing::info!("Registering plugin {} v{}", name, plugin.version());
        self.emit_state(&name, PluginState::Initializing);

        let mut installed = Vec::new();
        match self.install(plugin.as_ref(), &name, &mut installed).await {
            Ok(()) => {
                let kinds = installed.into_iter().map(|(kind, _)| kind).collect();
                self.plugins.insert(
                    name.clone(),
                    PluginRecord {
                        plugin,
                        state: PluginState::Registered,
                        kinds,
                    },
                );
                self.emit_state(&name, PluginState::Registered);
                Ok(())
            }
            Err(e) => {
                tracing::error!("Plugin {} failed to register: {}", name, e);
                self.roll_back(&name, installed);
                if let Err(destroy_err) = plugin.destroy().await {
                    tracing::warn!("Ignoring destroy failure for plugin {}: {}", name, destroy_err);
                }
                self.emit_state(&name, PluginState::Unregistered);
                Err(e)
            }
        }
    }

    async fn install(
        &mut self,
        plugin: &dyn Plugin,
        name: &str,
        installed: &mut Vec<(String, Option<Registration>)>,
    ) -> Result<(), RegistrationError> {
        let plugin_error = |source| RegistrationError::Plugin {
            name: name.to_string(),
            source,
        };

        plugin.initialize().await.map_err(plugin_error)?;
        let factories = plugin.node_classes().await.map_err(plugin_error)?;

        for factory in factories {
            let kind = factory.kind().to_string();
            let previous = self.insert_class(factory, Some(name))?;
            installed.push((kind, previous));
        }
        Ok(())
    }

    fn roll_back(&mut self, name: &str, installed: Vec<(String, Option<Registration>)>) {
        for (kind, previous) in installed.into_iter().rev() {
            match previous {
                Some(registration) => {
                    tracing::info!("Restoring previous factory for {}", kind);
                    self.put_class(kind, registration);
                }
                None => {
                    self.remove_class(&kind, Some(name));
                }
            }
        }
    }

    /// Remove every class `name` provides, then call its `destroy` hook.
    ///
    /// If `destroy` fails the classes stay removed and the plugin is left
    /// in the `Unregistering` state.
    pub async fn unregister_plugin(&mut self, name: &str) -> Result<(), RegistrationError> {
        let plugin = {
            let record = self
                .plugins
                .get_mut(name)
                .ok_or_else(|| RegistrationError::PluginNotFound(name.to_string()))?;
            record.state = PluginState::Unregistering;
            record.plugin.clone()
        };
        self.emit_state(name, PluginState::Unregistering);

        let plugin_error = |source| RegistrationError::Plugin {
            name: name.to_string(),
            source,
        };

        let factories = plugin.node_classes().await.map_err(plugin_error)?;
        for factory in factories {
            self.remove_class(factory.kind(), Some(name));
        }

        plugin.destroy().await.map_err(plugin_error)?;

        self.plugins.remove(name);
        tracing::info!("Unregistered plugin {}", name);
        self.emit_state(name, PluginState::Unregistered);
        Ok(())
    }
}

impl Default for RegistrationManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_form() {
        assert!(is_valid_kind("core:debug"));
        assert!(is_valid_kind("core-fs:validate-hami"));
        assert!(!is_valid_kind("debug"));
        assert!(!is_valid_kind(":debug"));
        assert!(!is_valid_kind("core:"));
        assert!(!is_valid_kind("a:b:c"));
        assert!(!is_valid_kind("core: debug"));
    }
}
