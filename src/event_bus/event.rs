use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::message::DeliveryStatus;
use crate::types::{NodeId, Priority, RouteKind};

/// A lifecycle or domain event published on the [`EventBus`](super::EventBus).
///
/// Each component owns one variant family, so subscribers match on the
/// category they care about instead of comparing string event names. An
/// exception thrown by one sink never reaches the others; the bus catches
/// and logs sink failures.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub enum Event {
    Graph(GraphEvent),
    Router(RouterEvent),
    Status(StatusEvent),
    Contact(ContactEvent),
    Realtime(RealtimeEvent),
    Diagnostic(DiagnosticEvent),
}

impl Event {
    pub fn diagnostic(scope: impl Into<String>, message: impl Into<String>) -> Self {
        Event::Diagnostic(DiagnosticEvent {
            scope: scope.into(),
            message: message.into(),
        })
    }

    /// Category label used by formatters and filters.
    pub fn category(&self) -> &'static str {
        match self {
            Event::Graph(_) => "graph",
            Event::Router(_) => "router",
            Event::Status(_) => "status",
            Event::Contact(_) => "contact",
            Event::Realtime(_) => "realtime",
            Event::Diagnostic(_) => "diagnostic",
        }
    }

    /// Convert the event to a normalized JSON object:
    /// `{ "category", "name", "timestamp", "data" }`.
    pub fn to_json_value(&self) -> Value {
        let (name, data) = match self {
            Event::Graph(e) => (e.kind.name(), serde_json::to_value(e).unwrap_or(Value::Null)),
            Event::Router(e) => (e.name(), serde_json::to_value(e).unwrap_or(Value::Null)),
            Event::Status(e) => (e.name(), serde_json::to_value(e).unwrap_or(Value::Null)),
            Event::Contact(e) => (e.name(), serde_json::to_value(e).unwrap_or(Value::Null)),
            Event::Realtime(e) => (e.name(), serde_json::to_value(e).unwrap_or(Value::Null)),
            Event::Diagnostic(e) => (
                "diagnostic",
                serde_json::to_value(e).unwrap_or(Value::Null),
            ),
        };
        json!({
            "category": self.category(),
            "name": name,
            "timestamp": Utc::now().to_rfc3339(),
            "data": data,
        })
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Event::Graph(e) => match &e.node_id {
                Some(node) => write!(f, "[graph:{}] {} {}", e.kind.name(), node, e.message),
                None => write!(f, "[graph:{}] {}", e.kind.name(), e.message),
            },
            Event::Router(e) => write!(f, "[router:{}] {e:?}", e.name()),
            Event::Status(e) => write!(f, "[status:{}] {e:?}", e.name()),
            Event::Contact(e) => write!(f, "[contact:{}] {e:?}", e.name()),
            Event::Realtime(e) => write!(f, "[realtime:{}] {e:?}", e.name()),
            Event::Diagnostic(e) => write!(f, "[{}] {}", e.scope, e.message),
        }
    }
}

/// Node/execution lifecycle notifications from the operational graph.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct GraphEvent {
    pub kind: GraphEventKind,
    /// Absent for pass-level events such as `execution_completed`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_id: Option<NodeId>,
    #[serde(default)]
    pub message: String,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GraphEventKind {
    NodeStarted,
    NodeCompleted,
    NodeFailed,
    NodeRetrying,
    NodeSkipped,
    ExecutionCompleted,
}

impl GraphEventKind {
    pub fn name(&self) -> &'static str {
        match self {
            GraphEventKind::NodeStarted => "node_started",
            GraphEventKind::NodeCompleted => "node_completed",
            GraphEventKind::NodeFailed => "node_failed",
            GraphEventKind::NodeRetrying => "node_retrying",
            GraphEventKind::NodeSkipped => "node_skipped",
            GraphEventKind::ExecutionCompleted => "execution_completed",
        }
    }
}

impl GraphEvent {
    pub fn node(kind: GraphEventKind, node_id: NodeId, message: impl Into<String>) -> Self {
        Self {
            kind,
            node_id: Some(node_id),
            message: message.into(),
        }
    }

    pub fn pass(kind: GraphEventKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            node_id: None,
            message: message.into(),
        }
    }
}

/// Routing notifications from the message router.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case", tag = "event")]
pub enum RouterEvent {
    MessageRouted {
        message_id: String,
        route: RouteKind,
        priority: Priority,
    },
    ValidationFailed {
        message_id: String,
        issues: Vec<String>,
    },
}

impl RouterEvent {
    pub fn name(&self) -> &'static str {
        match self {
            RouterEvent::MessageRouted { .. } => "message_routed",
            RouterEvent::ValidationFailed { .. } => "validation_failed",
        }
    }
}

/// Delivery bookkeeping notifications from the status tracker.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case", tag = "event")]
pub enum StatusEvent {
    StatusRecorded {
        message_id: String,
        status: DeliveryStatus,
        timestamp: DateTime<Utc>,
    },
    RetryRequested {
        message_id: String,
        attempt: u32,
    },
    MaxRetriesExceeded {
        message_id: String,
        attempts: u32,
    },
}

impl StatusEvent {
    pub fn name(&self) -> &'static str {
        match self {
            StatusEvent::StatusRecorded { .. } => "status_recorded",
            StatusEvent::RetryRequested { .. } => "retry_requested",
            StatusEvent::MaxRetriesExceeded { .. } => "max_retries_exceeded",
        }
    }
}

/// Reconciliation notifications from the contact sync manager.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case", tag = "event")]
pub enum ContactEvent {
    ContactAdded {
        phone: String,
    },
    ContactUpdated {
        phone: String,
    },
    ContactDeleted {
        phone: String,
    },
    SyncCompleted {
        operation: String,
        added: usize,
        updated: usize,
        deleted: usize,
        duplicates: usize,
        conflicts: usize,
        errors: usize,
    },
}

impl ContactEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ContactEvent::ContactAdded { .. } => "contact_added",
            ContactEvent::ContactUpdated { .. } => "contact_updated",
            ContactEvent::ContactDeleted { .. } => "contact_deleted",
            ContactEvent::SyncCompleted { .. } => "sync_completed",
        }
    }
}

/// Presence/typing/queue notifications from the realtime processor.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case", tag = "event")]
pub enum RealtimeEvent {
    ContactOnline {
        phone: String,
    },
    ContactOffline {
        phone: String,
    },
    TypingStart {
        conversation_id: String,
        phone: String,
    },
    TypingStop {
        conversation_id: String,
        phone: String,
    },
    EventQueueFull {
        dropped: String,
    },
    EventDispatched {
        name: String,
        recipients: usize,
    },
}

impl RealtimeEvent {
    pub fn name(&self) -> &'static str {
        match self {
            RealtimeEvent::ContactOnline { .. } => "contact_online",
            RealtimeEvent::ContactOffline { .. } => "contact_offline",
            RealtimeEvent::TypingStart { .. } => "typing_start",
            RealtimeEvent::TypingStop { .. } => "typing_stop",
            RealtimeEvent::EventQueueFull { .. } => "event_queue_full",
            RealtimeEvent::EventDispatched { .. } => "event_dispatched",
        }
    }
}

/// Free-form diagnostic line, mostly emitted by background loops.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct DiagnosticEvent {
    pub scope: String,
    pub message: String,
}
