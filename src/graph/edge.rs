use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::node::NodePayload;
use crate::types::NodeId;

/// Identity of an edge, assigned by the graph on registration.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EdgeId(pub String);

impl EdgeId {
    pub(crate) fn generate() -> Self {
        EdgeId(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What an edge carries between two nodes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    /// Pure ordering constraint; no payload flows.
    Dependency,
    /// Payload flows from source output into target input.
    DataFlow,
    /// Target is queued when source completes; no payload flows.
    ControlFlow,
}

/// Predicate evaluated against the source node's output; edges whose guard
/// returns `false` are skipped during fan-out.
pub type EdgeGuard = Arc<dyn Fn(&NodePayload) -> bool + Send + Sync>;

/// Transformation applied to the source output before it is merged into the
/// target node's pending input.
pub type EdgeTransform = Arc<dyn Fn(NodePayload) -> NodePayload + Send + Sync>;

/// Edge registration input for [`OperationalGraph::add_edge`](super::OperationalGraph::add_edge).
#[derive(Clone)]
pub struct EdgeSpec {
    pub from: NodeId,
    pub to: NodeId,
    pub kind: EdgeKind,
    pub guard: Option<EdgeGuard>,
    pub transform: Option<EdgeTransform>,
}

impl EdgeSpec {
    pub fn new(from: impl Into<NodeId>, to: impl Into<NodeId>, kind: EdgeKind) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            kind,
            guard: None,
            transform: None,
        }
    }

    /// Convenience constructor for the most common edge kind.
    pub fn data_flow(from: impl Into<NodeId>, to: impl Into<NodeId>) -> Self {
        Self::new(from, to, EdgeKind::DataFlow)
    }

    pub fn control_flow(from: impl Into<NodeId>, to: impl Into<NodeId>) -> Self {
        Self::new(from, to, EdgeKind::ControlFlow)
    }

    pub fn dependency(from: impl Into<NodeId>, to: impl Into<NodeId>) -> Self {
        Self::new(from, to, EdgeKind::Dependency)
    }

    #[must_use]
    pub fn with_guard(
        mut self,
        guard: impl Fn(&NodePayload) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.guard = Some(Arc::new(guard));
        self
    }

    #[must_use]
    pub fn with_transform(
        mut self,
        transform: impl Fn(NodePayload) -> NodePayload + Send + Sync + 'static,
    ) -> Self {
        self.transform = Some(Arc::new(transform));
        self
    }
}

impl fmt::Debug for EdgeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EdgeSpec")
            .field("from", &self.from)
            .field("to", &self.to)
            .field("kind", &self.kind)
            .field("guard", &self.guard.is_some())
            .field("transform", &self.transform.is_some())
            .finish()
    }
}

/// A registered edge.
#[derive(Clone)]
pub struct GraphEdge {
    pub id: EdgeId,
    pub from: NodeId,
    pub to: NodeId,
    pub kind: EdgeKind,
    pub(crate) guard: Option<EdgeGuard>,
    pub(crate) transform: Option<EdgeTransform>,
}

impl GraphEdge {
    pub(crate) fn from_spec(spec: EdgeSpec) -> Self {
        Self {
            id: EdgeId::generate(),
            from: spec.from,
            to: spec.to,
            kind: spec.kind,
            guard: spec.guard,
            transform: spec.transform,
        }
    }

    /// Evaluate the guard against the source output; edges without a guard
    /// always pass.
    pub(crate) fn passes(&self, output: &NodePayload) -> bool {
        self.guard.as_ref().is_none_or(|guard| guard(output))
    }

    /// Apply the transform, if any, to a payload bound for the target.
    pub(crate) fn apply_transform(&self, payload: NodePayload) -> NodePayload {
        match &self.transform {
            Some(transform) => transform(payload),
            None => payload,
        }
    }
}

impl fmt::Debug for GraphEdge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphEdge")
            .field("id", &self.id)
            .field("from", &self.from)
            .field("to", &self.to)
            .field("kind", &self.kind)
            .field("guard", &self.guard.is_some())
            .field("transform", &self.transform.is_some())
            .finish()
    }
}
