//! # Relaygraph: Messaging Pipeline Execution Engine
//!
//! Relaygraph orchestrates business-messaging operations from inbound
//! webhook events through validation, routing, delivery, and status/contact
//! bookkeeping. At its center sits a dependency-resolving node/edge graph
//! with topological scheduling, per-node rate limiting, timeout enforcement,
//! exponential-backoff retries, and cascading-failure propagation.
//!
//! ## Core Concepts
//!
//! - **Operational graph**: nodes with declared dependencies, executed one
//!   webhook event per pass ([`graph`])
//! - **Routing**: rule-table classification of inbound messages into routes,
//!   priorities, and node paths ([`router`])
//! - **Status tracking**: per-message delivery timelines and analytics
//!   ([`status`])
//! - **Contact sync**: normalized-phone reconciliation with conflict
//!   resolution ([`contacts`])
//! - **Realtime**: presence/typing registries and push delivery to live
//!   connections ([`realtime`])
//! - **Events**: every component publishes typed events on a shared bus
//!   ([`event_bus`])
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use async_trait::async_trait;
//! use relaygraph::config::EngineConfig;
//! use relaygraph::graph::{
//!     NodeContext, NodeError, NodeHandler, NodeInput, NodePayload, NodeSpec, OperationalGraph,
//! };
//! use relaygraph::router::MessageRouter;
//! use relaygraph::types::NodeType;
//! use relaygraph::webhook::WebhookEvent;
//!
//! struct Receive;
//!
//! #[async_trait]
//! impl NodeHandler for Receive {
//!     async fn run(&self, input: NodeInput, ctx: NodeContext) -> Result<NodePayload, NodeError> {
//!         ctx.emit("receive", "accepting webhook event");
//!         Ok(NodePayload::Messages(input.event.messages().cloned().collect()))
//!     }
//! }
//!
//! # async fn example(event: WebhookEvent) -> Result<(), Box<dyn std::error::Error>> {
//! // Plan the node path for each inbound message...
//! let router = MessageRouter::default();
//! let decisions = router.route(&event);
//!
//! // ...then execute the graph over the event.
//! let graph = OperationalGraph::new(EngineConfig::default());
//! graph.add_node(NodeSpec::new("receiver", NodeType::Receiver, Receive))?;
//! let result = graph.execute(event).await?;
//! println!("{} nodes completed, {} routed", result.completed.len(), decisions.len());
//! # Ok(())
//! # }
//! ```
//!
//! ## Concurrency Model
//!
//! A single logical worker drives one `execute` pass to completion before
//! the next; nodes not yet eligible are deferred with a short yield, never
//! blocked on. Background maintenance (auto-sync, presence/typing sweeps,
//! the push drain loop) runs as independent cancellable tasks that only
//! touch their own maps. Shared registries sit behind whole-map mutexes;
//! cascading failure and contact dedup are multi-key updates that must stay
//! atomic, so there is no per-key locking.
//!
//! ## Module Guide
//!
//! - [`graph`] - The operational graph engine and node/edge primitives
//! - [`router`] - Message classification and node-path planning
//! - [`status`] - Delivery-status histories and analytics
//! - [`contacts`] - Contact reconciliation and auto-sync
//! - [`realtime`] - Presence, typing, rooms, and push delivery
//! - [`event_bus`] - Typed pub/sub shared by every component
//! - [`webhook`] - The inbound payload model
//! - [`transport`] - Host-supplied provider and connection seams

pub mod config;
pub mod contacts;
pub mod event_bus;
pub mod graph;
pub mod message;
pub mod realtime;
pub mod router;
pub mod status;
pub mod telemetry;
pub mod transport;
pub mod types;
pub mod webhook;
