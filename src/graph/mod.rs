//! The operational graph: a node/edge DAG engine purpose-built for the
//! messaging pipeline's fixed node vocabulary.
//!
//! # Core Concepts
//!
//! - **Nodes**: Units of work with declared dependencies, registered via
//!   [`NodeSpec`] and executed through the [`NodeHandler`] trait
//! - **Edges**: Directed links ([`EdgeSpec`]) carrying dependency, data, or
//!   control flow, with optional guard predicates and payload transforms
//! - **Execution**: [`OperationalGraph::execute`] runs one webhook event per
//!   pass: topological validation, queue-driven scheduling, per-node
//!   timeouts and rate windows, exponential-backoff retries, cascading
//!   failure
//! - **Validation**: [`OperationalGraph::validate`] reports cycles, dangling
//!   references, and orphaned nodes without executing anything
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use relaygraph::config::EngineConfig;
//! use relaygraph::graph::{NodeSpec, OperationalGraph};
//! use relaygraph::graph::{NodeContext, NodeError, NodeHandler, NodeInput, NodePayload};
//! use relaygraph::types::NodeType;
//! use relaygraph::webhook::WebhookEvent;
//! use async_trait::async_trait;
//!
//! struct Extract;
//!
//! #[async_trait]
//! impl NodeHandler for Extract {
//!     async fn run(&self, input: NodeInput, _: NodeContext) -> Result<NodePayload, NodeError> {
//!         Ok(NodePayload::Messages(input.event.messages().cloned().collect()))
//!     }
//! }
//!
//! # async fn example(event: WebhookEvent) -> Result<(), Box<dyn std::error::Error>> {
//! let graph = OperationalGraph::new(EngineConfig::default());
//! graph.add_node(NodeSpec::new("receiver", NodeType::Receiver, Extract))?;
//! let result = graph.execute(event).await?;
//! println!("completed: {:?}", result.completed);
//! # Ok(())
//! # }
//! ```

mod edge;
mod engine;
mod error;
mod node;
mod rate_limit;
mod validation;

pub use edge::{EdgeGuard, EdgeId, EdgeKind, EdgeSpec, EdgeTransform, GraphEdge};
pub use engine::{ExecutionResult, GraphStats, OperationalGraph};
pub use error::{FailureReason, GraphError, NodeFailure};
pub use node::{
    ErrorHook, NodeContext, NodeError, NodeHandler, NodeInput, NodePayload, NodeSpec,
};
pub use rate_limit::RateLimit;
pub use validation::ValidationReport;
