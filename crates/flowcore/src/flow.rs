use crate::node::{
    Executable, NodeCore, NodeHandle, NodeSettings, RetryPolicy, Transition, DEFAULT_ACTION,
};
use crate::validation::Schema;
use crate::{ConfigurationError, FlowError, SharedState};
use async_trait::async_trait;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use std::sync::Arc;
use tracing::Instrument;
use uuid::Uuid;

/// Handle to a node inside one [`Flow`]'s graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeRef(NodeIndex);

impl NodeRef {
    pub fn index(&self) -> usize {
        self.0.index()
    }
}

/// A graph of nodes joined by named actions, walked from one start node.
///
/// A flow is itself [`Executable`], so it can be a step of another flow;
/// the action it finishes with is handed to the outer walker.
///
/// Flows are never retried: the retry policy in their settings is
/// ignored. Retries apply to the nodes inside.
pub struct Flow {
    core: NodeCore,
    graph: DiGraph<NodeHandle, String>,
    start: Option<NodeIndex>,
}

impl Flow {
    pub const KIND: &'static str = "core:flow";

    /// Anonymous flow accepting any config. Retry settings have no
    /// effect on a flow.
    pub fn new(settings: NodeSettings) -> Result<Self, ConfigurationError> {
        Self::with_kind(Self::KIND, &Schema::any(), settings)
    }

    pub fn with_kind(
        kind: impl Into<String>,
        schema: &Schema,
        settings: NodeSettings,
    ) -> Result<Self, ConfigurationError> {
        if settings.retry != RetryPolicy::default() {
            tracing::debug!("Ignoring retry policy on flow: flows run once");
        }
        NodeCore::new(kind, schema, settings).map(Self::from_core)
    }

    pub fn from_core(core: NodeCore) -> Self {
        Self {
            core,
            graph: DiGraph::new(),
            start: None,
        }
    }

    pub fn core(&self) -> &NodeCore {
        &self.core
    }

    /// Add a node without wiring it.
    pub fn add<E: Executable + 'static>(&mut self, node: E) -> NodeRef {
        self.add_handle(Arc::new(node))
    }

    pub fn add_handle(&mut self, node: NodeHandle) -> NodeRef {
        NodeRef(self.graph.add_node(node))
    }

    /// Add a node and make it the start node.
    pub fn start<E: Executable + 'static>(&mut self, node: E) -> NodeRef {
        let node = self.add(node);
        self.start = Some(node.0);
        node
    }

    pub fn set_start(&mut self, node: NodeRef) -> Result<(), FlowError> {
        self.check(node)?;
        self.start = Some(node.0);
        Ok(())
    }

    pub fn start_node(&self) -> Option<NodeRef> {
        self.start.map(NodeRef)
    }

    /// Wire `to` as the successor of `from` for the default action.
    pub fn next(&mut self, from: NodeRef, to: NodeRef) -> Result<NodeRef, FlowError> {
        self.on(from, DEFAULT_ACTION, to)
    }

    /// Wire `to` as the successor of `from` for `action`, replacing any
    /// earlier successor for the same action. Returns `to` for chaining.
    pub fn on(&mut self, from: NodeRef, action: &str, to: NodeRef) -> Result<NodeRef, FlowError> {
        self.check(from)?;
        self.check(to)?;
        connect(&mut self.graph, from.0, to.0, action);
        Ok(to)
    }

    pub fn successor(&self, from: NodeRef, action: &str) -> Option<NodeRef> {
        successor(&self.graph, from.0, action).map(NodeRef)
    }

    pub fn node(&self, node: NodeRef) -> Option<&NodeHandle> {
        self.graph.node_weight(node.0)
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    fn check(&self, node: NodeRef) -> Result<(), FlowError> {
        if self.graph.node_weight(node.0).is_none() {
            return Err(FlowError::InvalidGraph(format!(
                "node {} is not part of flow {}",
                node.index(),
                self.core.kind()
            )));
        }
        Ok(())
    }

    /// Walk the graph from the start node until an action has no
    /// successor. Returns the last action produced.
    ///
    /// The first node error aborts the walk and is returned as is.
    pub async fn run(&self, shared: &mut SharedState) -> Result<Option<String>, FlowError> {
        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("flow", kind = self.core.kind(), %run_id);
        self.walk(shared).instrument(span).await
    }

    async fn walk(&self, shared: &mut SharedState) -> Result<Option<String>, FlowError> {
        let kind = self.core.kind();
        let Some(start) = self.start else {
            tracing::warn!("Flow {} has no start node", kind);
            return Ok(None);
        };

        // Splices land in this copy only, never in the flow's own graph.
        let mut graph = self.graph.clone();
        let mut current = start;
        let mut steps = 0usize;

        tracing::info!("Starting flow {}", kind);

        loop {
            let node = graph[current].clone();
            steps += 1;
            tracing::debug!("Running node {} (#{})", node.kind(), current.index());

            let Transition { action, splice } = match node.invoke(shared).await {
                Ok(transition) => transition,
                Err(e) => {
                    tracing::error!("Flow {} aborted at node {}: {}", kind, node.kind(), e);
                    return Err(e);
                }
            };

            let Some(action) = action else {
                tracing::info!("Flow {} ended after {} node(s) with no action", kind, steps);
                return Ok(None);
            };

            if let Some(spliced) = splice {
                tracing::debug!(
                    "Splicing {} after {} on '{}'",
                    spliced.kind(),
                    node.kind(),
                    action
                );
                let index = graph.add_node(spliced);
                connect(&mut graph, current, index, &action);
            }

            match successor(&graph, current, &action) {
                Some(next) => {
                    tracing::debug!("{} -> '{}' -> {}", node.kind(), action, graph[next].kind());
                    current = next;
                }
                None => {
                    tracing::info!(
                        "Flow {} finished after {} node(s) with action '{}'",
                        kind,
                        steps,
                        action
                    );
                    return Ok(Some(action));
                }
            }
        }
    }
}

#[async_trait]
impl Executable for Flow {
    fn kind(&self) -> &str {
        self.core.kind()
    }

    async fn invoke(&self, shared: &mut SharedState) -> Result<Transition, FlowError> {
        let action = self.run(shared).await?;
        Ok(Transition {
            action,
            splice: None,
        })
    }
}

fn connect(graph: &mut DiGraph<NodeHandle, String>, from: NodeIndex, to: NodeIndex, action: &str) {
    let existing = graph
        .edges(from)
        .find(|edge| edge.weight() == action)
        .map(|edge| edge.id());
    if let Some(edge) = existing {
        graph.remove_edge(edge);
    }
    graph.add_edge(from, to, action.to_string());
}

fn successor(graph: &DiGraph<NodeHandle, String>, from: NodeIndex, action: &str) -> Option<NodeIndex> {
    graph
        .edges(from)
        .find(|edge| edge.weight() == action)
        .map(|edge| edge.target())
}
