//! Two-node interview graph
//!
//! Structural assembly only: entry = extractor, extractor → interviewer,
//! interviewer → END. Loop-until-complete is the session driver's job: it
//! re-invokes the whole graph once per user turn. No internal cycle.

use crate::error::AgentError;
use crate::interview::{InterviewEngine, InterviewState};
use crate::Result;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tracing::debug;

/// Terminal marker for edges leaving the graph
pub const END: &str = "__end__";

/// Name of the extraction node (graph entry point)
pub const NODE_EXTRACTOR: &str = "extractor";

/// Name of the interviewer node
pub const NODE_INTERVIEWER: &str = "interviewer";

type NodeFuture = Pin<Box<dyn Future<Output = Result<InterviewState>> + Send>>;

/// A graph node: consumes the state, returns the next state
pub type NodeFn = Box<dyn Fn(InterviewState) -> NodeFuture + Send + Sync>;

/// Builder for a straight-line state graph
#[derive(Default)]
pub struct StateGraph {
    nodes: Vec<(String, NodeFn)>,
    edges: Vec<(String, String)>,
    entry: Option<String>,
}

impl StateGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, name: impl Into<String>, node: NodeFn) {
        self.nodes.push((name.into(), node));
    }

    pub fn add_edge(&mut self, from: impl Into<String>, to: impl Into<String>) {
        self.edges.push((from.into(), to.into()));
    }

    pub fn set_entry_point(&mut self, name: impl Into<String>) {
        self.entry = Some(name.into());
    }

    /// Validate the wiring and freeze the graph.
    ///
    /// Every node needs exactly one outgoing edge, every edge endpoint must
    /// exist (or be `END`), and the entry point must name a node.
    pub fn compile(self) -> Result<CompiledGraph> {
        let entry = self
            .entry
            .ok_or_else(|| AgentError::Graph("no entry point set".to_string()))?;

        let has_node = |name: &str| self.nodes.iter().any(|(node_name, _)| node_name == name);

        if !has_node(&entry) {
            return Err(AgentError::Graph(format!(
                "entry point '{}' is not a node",
                entry
            )));
        }

        for (from, to) in &self.edges {
            if !has_node(from) {
                return Err(AgentError::Graph(format!(
                    "edge source '{}' is not a node",
                    from
                )));
            }
            if to != END && !has_node(to) {
                return Err(AgentError::Graph(format!(
                    "edge target '{}' is not a node",
                    to
                )));
            }
        }

        for (name, _) in &self.nodes {
            let outgoing = self.edges.iter().filter(|(from, _)| from == name).count();
            if outgoing != 1 {
                return Err(AgentError::Graph(format!(
                    "node '{}' has {} outgoing edges, expected exactly 1",
                    name, outgoing
                )));
            }
        }

        Ok(CompiledGraph {
            nodes: self.nodes,
            edges: self.edges,
            entry,
        })
    }
}

/// A validated graph, ready to run
pub struct CompiledGraph {
    nodes: Vec<(String, NodeFn)>,
    edges: Vec<(String, String)>,
    entry: String,
}

impl CompiledGraph {
    pub fn entry(&self) -> &str {
        &self.entry
    }

    pub fn node_names(&self) -> Vec<&str> {
        self.nodes.iter().map(|(name, _)| name.as_str()).collect()
    }

    pub fn edges(&self) -> &[(String, String)] {
        &self.edges
    }

    fn node(&self, name: &str) -> Option<&NodeFn> {
        self.nodes
            .iter()
            .find(|(node_name, _)| node_name == name)
            .map(|(_, node)| node)
    }

    fn next_of(&self, name: &str) -> Option<&str> {
        self.edges
            .iter()
            .find(|(from, _)| from == name)
            .map(|(_, to)| to.as_str())
    }

    /// Run the graph: walk from the entry along unconditional edges until
    /// `END`, passing the state through each node.
    pub async fn invoke(&self, state: InterviewState) -> Result<InterviewState> {
        let mut current = self.entry.clone();
        let mut state = state;
        let mut steps = 0usize;

        loop {
            debug!(node = %current, "Graph step");

            let node = self.node(&current).ok_or_else(|| {
                AgentError::Graph(format!("node '{}' disappeared after compile", current))
            })?;

            state = node(state).await?;

            let next = self.next_of(&current).ok_or_else(|| {
                AgentError::Graph(format!("node '{}' has no outgoing edge", current))
            })?;

            if next == END {
                return Ok(state);
            }

            steps += 1;
            if steps >= self.nodes.len() {
                return Err(AgentError::Graph(format!(
                    "cycle detected at node '{}'",
                    next
                )));
            }

            current = next.to_string();
        }
    }
}

/// Wire the two interview nodes: extraction first, then the interviewer,
/// then out. One invocation handles exactly one user turn.
pub fn build_interview_graph(engine: Arc<InterviewEngine>) -> Result<CompiledGraph> {
    let mut graph = StateGraph::new();

    let extractor = Arc::clone(&engine);
    graph.add_node(
        NODE_EXTRACTOR,
        Box::new(move |state| {
            let engine = Arc::clone(&extractor);
            Box::pin(async move { engine.extract(state).await })
        }),
    );

    graph.add_node(
        NODE_INTERVIEWER,
        Box::new(move |state| {
            let engine = Arc::clone(&engine);
            Box::pin(async move { engine.converse(state).await })
        }),
    );

    graph.set_entry_point(NODE_EXTRACTOR);
    graph.add_edge(NODE_EXTRACTOR, NODE_INTERVIEWER);
    graph.add_edge(NODE_INTERVIEWER, END);

    graph.compile()
}
