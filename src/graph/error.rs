use miette::Diagnostic;
use thiserror::Error;

use crate::types::NodeId;

/// Structural and execution errors surfaced by the operational graph.
///
/// Node-level handler failures are *not* represented here: they are captured
/// per node in the [`ExecutionResult`](super::ExecutionResult) and never
/// abort sibling branches. `GraphError` covers the synchronous management
/// API and whole-pass failures.
#[derive(Debug, Error, Diagnostic)]
pub enum GraphError {
    /// A node with this id is already registered.
    #[error("node already exists: {id}")]
    #[diagnostic(
        code(relaygraph::graph::duplicate_node),
        help("Node ids must be unique; remove the existing node first or pick another id.")
    )]
    DuplicateNode { id: NodeId },

    /// A referenced node or edge does not exist.
    #[error("{what} not found: {id}")]
    #[diagnostic(code(relaygraph::graph::not_found))]
    NotFound { what: &'static str, id: String },

    /// The dependency graph contains a cycle; nothing was executed.
    #[error("circular dependency detected: {}", path_display(.path))]
    #[diagnostic(
        code(relaygraph::graph::circular_dependency),
        help("Break the cycle by removing one of the listed dependencies or edges.")
    )]
    CircularDependency { path: Vec<NodeId> },
}

fn path_display(path: &[NodeId]) -> String {
    path.iter()
        .map(NodeId::as_str)
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// Why a node ended an execution pass in the failed state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FailureReason {
    /// The handler returned an error on its final attempt.
    Handler(String),
    /// The handler exceeded its hard timeout on its final attempt.
    Timeout { after_ms: u64 },
    /// A transitive dependency failed; this node was never executed.
    Cascaded { dependency: NodeId },
    /// A declared dependency id is not registered in the graph.
    MissingDependency { dependency: NodeId },
}

/// Per-node failure record carried in the execution result.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NodeFailure {
    /// Total attempts made (initial run plus retries); zero for nodes that
    /// never executed (cascaded / missing dependency).
    pub attempts: u32,
    pub reason: FailureReason,
}

impl NodeFailure {
    /// True when the node failed without ever running.
    #[must_use]
    pub fn is_cascaded(&self) -> bool {
        matches!(
            self.reason,
            FailureReason::Cascaded { .. } | FailureReason::MissingDependency { .. }
        )
    }
}

impl std::fmt::Display for NodeFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.reason {
            FailureReason::Handler(message) => {
                write!(f, "failed after {} attempts: {message}", self.attempts)
            }
            FailureReason::Timeout { after_ms } => {
                write!(
                    f,
                    "timed out after {after_ms}ms on attempt {}",
                    self.attempts
                )
            }
            FailureReason::Cascaded { dependency } => {
                write!(f, "not executed: dependency {dependency} failed")
            }
            FailureReason::MissingDependency { dependency } => {
                write!(f, "not executed: dependency {dependency} is not registered")
            }
        }
    }
}
