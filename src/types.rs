//! Core vocabulary for the relaygraph messaging pipeline.
//!
//! This module defines the identifiers and enumerations the rest of the
//! crate is built on: node identity, the fixed node-type vocabulary of the
//! messaging pipeline, node lifecycle status, message priority, and the
//! routing classifications the router can assign.
//!
//! # Key Types
//!
//! - [`NodeId`]: Identity of a node in the operational graph
//! - [`NodeType`]: The fixed enumeration of pipeline node types
//! - [`NodeStatus`]: Lifecycle status of a node during execution
//! - [`Priority`]: Dispatch priority assigned by the router
//! - [`RouteKind`]: Route classification for an inbound message
//!
//! # Examples
//!
//! ```rust
//! use relaygraph::types::{NodeType, Priority, RouteKind};
//!
//! let kind = NodeType::decode("media_handler");
//! assert_eq!(kind, NodeType::MediaHandler);
//! assert_eq!(kind.encode(), "media_handler");
//!
//! assert!(Priority::Urgent < Priority::Low);
//! assert_eq!(RouteKind::GroupSend.to_string(), "group_send");
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of a node within the operational graph.
///
/// Node ids are caller-chosen strings (`"receiver"`, `"media_handler"`, …)
/// and must be unique per graph. The newtype keeps them from being confused
/// with message ids or phone numbers in signatures.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub String);

impl NodeId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        NodeId(s.to_string())
    }
}

impl From<String> for NodeId {
    fn from(s: String) -> Self {
        NodeId(s)
    }
}

/// The fixed node-type vocabulary of the messaging pipeline.
///
/// The operational graph is purpose-built for this vocabulary rather than a
/// general workflow DSL: every node registered with the engine declares one
/// of these types, and the router's node paths are expressed in terms of
/// them.
///
/// # Persistence
///
/// `NodeType` round-trips through [`encode`](Self::encode) /
/// [`decode`](Self::decode) using snake_case strings, which is also the
/// serde wire form.
///
/// # Examples
///
/// ```rust
/// use relaygraph::types::NodeType;
///
/// assert_eq!(NodeType::Receiver.encode(), "receiver");
/// assert_eq!(NodeType::decode("status_tracker"), NodeType::StatusTracker);
/// assert!(NodeType::Receiver.is_receiver());
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    /// Entry point that accepts the raw webhook event.
    Receiver,
    /// Structural/content validation of extracted messages.
    Validator,
    /// Route classification and path selection.
    Router,
    /// Plain-text message handling.
    TextHandler,
    /// Image/video/audio/document handling.
    MediaHandler,
    /// Group-conversation fan-out handling.
    GroupHandler,
    /// Contact reconciliation work.
    ContactSync,
    /// Delivery/read status bookkeeping.
    StatusTracker,
    /// Throttling checkpoint.
    RateLimiter,
    /// Failure-recovery staging.
    RetryHandler,
    /// Terminal hand-off to the provider transport.
    Sender,
    /// Realtime event emission.
    Emitter,
    /// Intermediate state capture.
    StateStore,
}

impl NodeType {
    /// Encode a node type into its persisted snake_case form.
    #[must_use]
    pub fn encode(&self) -> &'static str {
        match self {
            NodeType::Receiver => "receiver",
            NodeType::Validator => "validator",
            NodeType::Router => "router",
            NodeType::TextHandler => "text_handler",
            NodeType::MediaHandler => "media_handler",
            NodeType::GroupHandler => "group_handler",
            NodeType::ContactSync => "contact_sync",
            NodeType::StatusTracker => "status_tracker",
            NodeType::RateLimiter => "rate_limiter",
            NodeType::RetryHandler => "retry_handler",
            NodeType::Sender => "sender",
            NodeType::Emitter => "emitter",
            NodeType::StateStore => "state_store",
        }
    }

    /// Decode a persisted string back into a node type.
    ///
    /// Unknown strings fall back to [`NodeType::StateStore`], the most
    /// permissive node kind, so forward-compatible payloads never panic.
    pub fn decode(s: &str) -> Self {
        match s {
            "receiver" => NodeType::Receiver,
            "validator" => NodeType::Validator,
            "router" => NodeType::Router,
            "text_handler" => NodeType::TextHandler,
            "media_handler" => NodeType::MediaHandler,
            "group_handler" => NodeType::GroupHandler,
            "contact_sync" => NodeType::ContactSync,
            "status_tracker" => NodeType::StatusTracker,
            "rate_limiter" => NodeType::RateLimiter,
            "retry_handler" => NodeType::RetryHandler,
            "sender" => NodeType::Sender,
            "emitter" => NodeType::Emitter,
            _ => NodeType::StateStore,
        }
    }

    /// Returns `true` for [`Receiver`](Self::Receiver) nodes, the only kind
    /// eligible to seed an execution pass.
    #[must_use]
    pub fn is_receiver(&self) -> bool {
        matches!(self, Self::Receiver)
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.encode())
    }
}

/// Lifecycle status of a node during and between execution passes.
///
/// Transitions within a pass: `Idle -> Pending -> Processing ->
/// {Completed, Retrying, Failed}`. After the pass drains, `Completed` nodes
/// are reset to `Idle`; `Failed` nodes stay failed for external inspection
/// until explicitly reset.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    #[default]
    Idle,
    Pending,
    Processing,
    Completed,
    Failed,
    Retrying,
}

impl fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NodeStatus::Idle => "idle",
            NodeStatus::Pending => "pending",
            NodeStatus::Processing => "processing",
            NodeStatus::Completed => "completed",
            NodeStatus::Failed => "failed",
            NodeStatus::Retrying => "retrying",
        };
        write!(f, "{s}")
    }
}

/// Dispatch priority assigned to a routing decision.
///
/// Ordered so that `Urgent < High < Normal < Low`, which lets rule tables
/// sort ascending and evaluate the most urgent rules first.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Urgent,
    High,
    #[default]
    Normal,
    Low,
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Priority::Urgent => "urgent",
            Priority::High => "high",
            Priority::Normal => "normal",
            Priority::Low => "low",
        };
        write!(f, "{s}")
    }
}

/// Route classification assigned to an inbound message by the router.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteKind {
    /// One-to-one delivery of a plain message.
    DirectSend,
    /// Delivery into a group conversation.
    GroupSend,
    /// Media payload (image/video/audio/document) delivery.
    MediaMessage,
    /// Contact-card ingestion into the sync pipeline.
    ContactUpdate,
    /// Location payload delivery.
    LocationShare,
}

impl fmt::Display for RouteKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RouteKind::DirectSend => "direct_send",
            RouteKind::GroupSend => "group_send",
            RouteKind::MediaMessage => "media_message",
            RouteKind::ContactUpdate => "contact_update",
            RouteKind::LocationShare => "location_share",
        };
        write!(f, "{s}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_type_round_trips() {
        for ty in [
            NodeType::Receiver,
            NodeType::Validator,
            NodeType::Router,
            NodeType::TextHandler,
            NodeType::MediaHandler,
            NodeType::GroupHandler,
            NodeType::ContactSync,
            NodeType::StatusTracker,
            NodeType::RateLimiter,
            NodeType::RetryHandler,
            NodeType::Sender,
            NodeType::Emitter,
            NodeType::StateStore,
        ] {
            assert_eq!(NodeType::decode(ty.encode()), ty);
        }
    }

    #[test]
    fn priority_orders_urgent_first() {
        let mut priorities = vec![
            Priority::Low,
            Priority::Urgent,
            Priority::Normal,
            Priority::High,
        ];
        priorities.sort();
        assert_eq!(
            priorities,
            vec![
                Priority::Urgent,
                Priority::High,
                Priority::Normal,
                Priority::Low
            ]
        );
    }

    #[test]
    fn unknown_node_type_decodes_to_state_store() {
        assert_eq!(NodeType::decode("someday_maybe"), NodeType::StateStore);
    }
}
