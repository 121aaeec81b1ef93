//! Node execution primitives for the operational graph.
//!
//! A node is a unit of work with declared dependencies: it receives the
//! merged payloads of its incoming data edges (receivers get the webhook
//! event itself), runs its [`NodeHandler`] under a hard timeout, and
//! produces one [`NodePayload`] that fans out along its outgoing edges.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use miette::Diagnostic;
use thiserror::Error;

use super::rate_limit::RateLimit;
use crate::contacts::Contact;
use crate::event_bus::{Event, EventEmitter};
use crate::router::RoutingDecision;
use crate::transport::{DeliveryReceipt, TransportError};
use crate::types::{NodeId, NodeType};
use crate::webhook::WebhookEvent;

// ============================================================================
// Handler traits
// ============================================================================

/// A unit of work within the operational graph.
///
/// Handlers should be stateless with respect to the graph: everything they
/// need arrives in the [`NodeInput`], and everything they produce leaves in
/// the returned [`NodePayload`]. Side effects (provider sends, registry
/// updates) belong to the component the handler wraps.
///
/// # Error Handling
///
/// Returning `Err` triggers the engine's retry machinery; once the node's
/// retry ceiling is exhausted the node is marked failed and its transitive
/// dependents are failed without executing.
///
/// # Examples
///
/// ```rust
/// use async_trait::async_trait;
/// use relaygraph::graph::{NodeContext, NodeError, NodeHandler, NodeInput, NodePayload};
///
/// struct ExtractMessages;
///
/// #[async_trait]
/// impl NodeHandler for ExtractMessages {
///     async fn run(&self, input: NodeInput, ctx: NodeContext) -> Result<NodePayload, NodeError> {
///         ctx.emit("extract", "pulling messages from webhook payload");
///         let messages: Vec<_> = input.event.messages().cloned().collect();
///         Ok(NodePayload::Messages(messages))
///     }
/// }
/// ```
#[async_trait]
pub trait NodeHandler: Send + Sync {
    async fn run(&self, input: NodeInput, ctx: NodeContext) -> Result<NodePayload, NodeError>;
}

/// Optional per-node failure hook, invoked before a retry is scheduled or
/// the node is marked failed. Hook errors are logged and never re-thrown.
#[async_trait]
pub trait ErrorHook: Send + Sync {
    async fn on_error(&self, node_id: &NodeId, error: &NodeError) -> Result<(), NodeError>;
}

// ============================================================================
// Execution context & data
// ============================================================================

/// Execution context handed to a node for one attempt.
#[derive(Clone, Debug)]
pub struct NodeContext {
    pub node_id: NodeId,
    pub node_type: NodeType,
    /// 1-based attempt number (1 = first run, 2 = first retry, …).
    pub attempt: u32,
    emitter: EventEmitter,
}

impl NodeContext {
    pub(crate) fn new(
        node_id: NodeId,
        node_type: NodeType,
        attempt: u32,
        emitter: EventEmitter,
    ) -> Self {
        Self {
            node_id,
            node_type,
            attempt,
            emitter,
        }
    }

    /// Emit a diagnostic event scoped to this node. Emission failures are
    /// logged, never surfaced to the handler.
    pub fn emit(&self, scope: impl Into<String>, message: impl Into<String>) {
        self.emitter.emit_or_log(Event::diagnostic(
            format!("{}:{}", self.node_id, scope.into()),
            message,
        ));
    }
}

/// Payload flowing along data edges, tagged by what produced it.
///
/// Keeping the union closed preserves per-node polymorphism without the
/// runtime type loss of a free-form JSON value on the hot path; the
/// [`Snapshot`](Self::Snapshot) variant exists for state-store nodes that
/// genuinely persist arbitrary shapes.
#[derive(Clone, Debug, PartialEq)]
pub enum NodePayload {
    /// The raw inbound webhook event (receiver output).
    Event(WebhookEvent),
    /// Extracted or validated messages.
    Messages(Vec<crate::message::Message>),
    /// Routing decisions, one per message.
    Routes(Vec<RoutingDecision>),
    /// Provider receipts from a sender node.
    Receipts(Vec<DeliveryReceipt>),
    /// Contact records bound for the sync pipeline.
    Contacts(Vec<Contact>),
    /// Free-form snapshot data from state-store nodes.
    Snapshot(serde_json::Value),
}

impl NodePayload {
    /// Borrow the messages if this payload carries any.
    pub fn as_messages(&self) -> Option<&[crate::message::Message]> {
        match self {
            NodePayload::Messages(messages) => Some(messages),
            _ => None,
        }
    }

    /// Borrow the routing decisions if this payload carries any.
    pub fn as_routes(&self) -> Option<&[RoutingDecision]> {
        match self {
            NodePayload::Routes(routes) => Some(routes),
            _ => None,
        }
    }

    /// Borrow the delivery receipts if this payload carries any.
    pub fn as_receipts(&self) -> Option<&[DeliveryReceipt]> {
        match self {
            NodePayload::Receipts(receipts) => Some(receipts),
            _ => None,
        }
    }
}

/// Merged input for one node attempt.
///
/// `upstream` holds one entry per incoming data edge whose guard passed,
/// already transformed, in completion order. Receiver nodes see an empty
/// `upstream` and read the event itself.
#[derive(Clone, Debug)]
pub struct NodeInput {
    pub event: Arc<WebhookEvent>,
    pub upstream: Vec<(NodeId, NodePayload)>,
}

impl NodeInput {
    pub(crate) fn new(event: Arc<WebhookEvent>, upstream: Vec<(NodeId, NodePayload)>) -> Self {
        Self { event, upstream }
    }

    /// Payload delivered by a specific upstream node, if present.
    pub fn from_node(&self, node_id: &NodeId) -> Option<&NodePayload> {
        self.upstream
            .iter()
            .find(|(id, _)| id == node_id)
            .map(|(_, payload)| payload)
    }

    /// All messages across every upstream payload, flattened.
    pub fn messages(&self) -> impl Iterator<Item = &crate::message::Message> {
        self.upstream
            .iter()
            .filter_map(|(_, payload)| payload.as_messages())
            .flatten()
    }

    /// All routing decisions across every upstream payload, flattened.
    pub fn routes(&self) -> impl Iterator<Item = &RoutingDecision> {
        self.upstream
            .iter()
            .filter_map(|(_, payload)| payload.as_routes())
            .flatten()
    }
}

// ============================================================================
// Registration
// ============================================================================

/// Registration input for [`OperationalGraph::add_node`](super::OperationalGraph::add_node).
///
/// Unset knobs fall back to the engine defaults from
/// [`EngineConfig`](crate::config::EngineConfig).
#[derive(Clone)]
pub struct NodeSpec {
    pub id: NodeId,
    pub node_type: NodeType,
    pub dependencies: Vec<NodeId>,
    pub handler: Arc<dyn NodeHandler>,
    pub error_hook: Option<Arc<dyn ErrorHook>>,
    pub max_retries: Option<u32>,
    pub timeout: Option<Duration>,
    pub rate_limit: Option<RateLimit>,
}

impl NodeSpec {
    pub fn new(
        id: impl Into<NodeId>,
        node_type: NodeType,
        handler: impl NodeHandler + 'static,
    ) -> Self {
        Self {
            id: id.into(),
            node_type,
            dependencies: Vec::new(),
            handler: Arc::new(handler),
            error_hook: None,
            max_retries: None,
            timeout: None,
            rate_limit: None,
        }
    }

    #[must_use]
    pub fn with_dependencies(mut self, dependencies: Vec<NodeId>) -> Self {
        self.dependencies = dependencies;
        self
    }

    #[must_use]
    pub fn with_error_hook(mut self, hook: impl ErrorHook + 'static) -> Self {
        self.error_hook = Some(Arc::new(hook));
        self
    }

    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn with_rate_limit(mut self, rate_limit: RateLimit) -> Self {
        self.rate_limit = Some(rate_limit);
        self
    }
}

impl fmt::Debug for NodeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeSpec")
            .field("id", &self.id)
            .field("node_type", &self.node_type)
            .field("dependencies", &self.dependencies)
            .field("max_retries", &self.max_retries)
            .field("timeout", &self.timeout)
            .field("rate_limit", &self.rate_limit)
            .finish()
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Errors a node handler can return.
///
/// These feed the engine's retry machinery; they are never surfaced raw to
/// the `execute` caller. The final error message of an exhausted node lands
/// in its [`NodeFailure`](super::NodeFailure) record.
#[derive(Debug, Error, Diagnostic)]
pub enum NodeError {
    /// Expected upstream data was missing from the node input.
    #[error("missing expected input: {what}")]
    #[diagnostic(
        code(relaygraph::node::missing_input),
        help("Check that the upstream node produced the required payload and the edge guard passed.")
    )]
    MissingInput { what: &'static str },

    /// Message content failed validation.
    #[error("validation failed: {0}")]
    #[diagnostic(code(relaygraph::node::validation))]
    ValidationFailed(String),

    /// The provider transport rejected or could not accept the hand-off.
    #[error(transparent)]
    #[diagnostic(code(relaygraph::node::transport))]
    Transport(#[from] TransportError),

    /// JSON (de)serialization failed inside the handler.
    #[error(transparent)]
    #[diagnostic(code(relaygraph::node::serde_json))]
    Serde(#[from] serde_json::Error),

    /// Any other handler-specific failure.
    #[error("{0}")]
    #[diagnostic(code(relaygraph::node::other))]
    Other(String),
}

impl NodeError {
    pub fn other(message: impl Into<String>) -> Self {
        NodeError::Other(message.into())
    }
}
