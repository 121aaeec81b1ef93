//! Message routing: classification, prioritization, and node-path selection.
//!
//! The router holds an ordered rule table evaluated most-urgent-first; the
//! first matching rule wins and a catch-all `direct_send`/normal rule is
//! always last. Each inbound message gets its own [`RoutingDecision`]
//! carrying the node path the operational graph should traverse and a
//! static latency estimate.
//!
//! Routing is independent of graph execution: the router only *plans*; the
//! graph executes the planned path.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::event_bus::{Event, EventEmitter, RouterEvent};
use crate::message::{Message, MessageType};
use crate::types::{NodeId, NodeType, Priority, RouteKind};
use crate::webhook::WebhookEvent;

/// Static per-node-type processing cost, used for latency estimates.
fn node_cost(node_type: NodeType) -> Duration {
    let ms = match node_type {
        NodeType::Receiver => 5,
        NodeType::Validator => 10,
        NodeType::Router => 5,
        NodeType::TextHandler => 15,
        NodeType::MediaHandler => 120,
        NodeType::GroupHandler => 45,
        NodeType::ContactSync => 60,
        NodeType::StatusTracker => 10,
        NodeType::RateLimiter => 2,
        NodeType::RetryHandler => 5,
        NodeType::Sender => 150,
        NodeType::Emitter => 5,
        NodeType::StateStore => 20,
    };
    Duration::from_millis(ms)
}

/// The fixed route -> node-path table.
fn route_path(route: RouteKind) -> Vec<(NodeId, NodeType)> {
    let path: &[(&str, NodeType)] = match route {
        RouteKind::DirectSend | RouteKind::LocationShare => &[
            ("receiver", NodeType::Receiver),
            ("validator", NodeType::Validator),
            ("router", NodeType::Router),
            ("text_handler", NodeType::TextHandler),
            ("rate_limiter", NodeType::RateLimiter),
            ("sender", NodeType::Sender),
            ("emitter", NodeType::Emitter),
        ],
        RouteKind::GroupSend => &[
            ("receiver", NodeType::Receiver),
            ("validator", NodeType::Validator),
            ("router", NodeType::Router),
            ("group_handler", NodeType::GroupHandler),
            ("rate_limiter", NodeType::RateLimiter),
            ("sender", NodeType::Sender),
            ("emitter", NodeType::Emitter),
        ],
        RouteKind::MediaMessage => &[
            ("receiver", NodeType::Receiver),
            ("validator", NodeType::Validator),
            ("router", NodeType::Router),
            ("media_handler", NodeType::MediaHandler),
            ("rate_limiter", NodeType::RateLimiter),
            ("sender", NodeType::Sender),
            ("emitter", NodeType::Emitter),
        ],
        RouteKind::ContactUpdate => &[
            ("receiver", NodeType::Receiver),
            ("validator", NodeType::Validator),
            ("router", NodeType::Router),
            ("contact_sync", NodeType::ContactSync),
            ("state_store", NodeType::StateStore),
            ("emitter", NodeType::Emitter),
        ],
    };
    path.iter()
        .map(|(id, ty)| (NodeId::from(*id), *ty))
        .collect()
}

/// The route, priority, and execution plan chosen for one message.
///
/// Computed fresh per message and never persisted by the router beyond its
/// context cache.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingDecision {
    pub message_id: String,
    pub route: RouteKind,
    pub priority: Priority,
    /// Ordered node ids the operational graph should traverse.
    pub node_path: Vec<NodeId>,
    /// Sum of the static per-node-type cost table over the path.
    pub estimated_latency: Duration,
    /// Whether the route is expensive enough that failed sends should be
    /// staged through the retry handler.
    pub requires_retry: bool,
}

/// Cached classification context for a routed message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RoutingContext {
    pub decision: RoutingDecision,
    pub message_type: MessageType,
    pub is_group: bool,
    pub routed_at: DateTime<Utc>,
}

/// One classification rule: first match (in priority order) wins.
#[derive(Clone)]
pub struct RoutingRule {
    pub name: &'static str,
    pub route: RouteKind,
    pub priority: Priority,
    predicate: Arc<dyn Fn(&Message) -> bool + Send + Sync>,
}

impl RoutingRule {
    pub fn new(
        name: &'static str,
        route: RouteKind,
        priority: Priority,
        predicate: impl Fn(&Message) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self {
            name,
            route,
            priority,
            predicate: Arc::new(predicate),
        }
    }
}

impl std::fmt::Debug for RoutingRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoutingRule")
            .field("name", &self.name)
            .field("route", &self.route)
            .field("priority", &self.priority)
            .finish()
    }
}

/// A single field problem found by [`MessageRouter::validate_message`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub field: &'static str,
    pub reason: String,
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.reason)
    }
}

/// Cumulative routing counters.
#[derive(Clone, Debug, Default)]
pub struct RouterStats {
    pub routed: u64,
    pub by_route: FxHashMap<RouteKind, u64>,
}

#[derive(Default)]
struct RouterState {
    reply_threads: FxHashMap<String, Vec<String>>,
    forward_counts: FxHashMap<String, u32>,
    contexts: FxHashMap<String, RoutingContext>,
    stats: RouterStats,
}

/// Classifies inbound webhook messages into routes and execution plans.
pub struct MessageRouter {
    rules: Vec<RoutingRule>,
    fallback: RoutingRule,
    state: Mutex<RouterState>,
    emitter: EventEmitter,
}

impl Default for MessageRouter {
    fn default() -> Self {
        Self::new(EventEmitter::disconnected())
    }
}

impl MessageRouter {
    /// Router with the default rule table, wired to an event bus.
    pub fn new(emitter: EventEmitter) -> Self {
        let mut router = Self {
            rules: Vec::new(),
            fallback: RoutingRule::new("catch_all", RouteKind::DirectSend, Priority::Normal, |_| {
                true
            }),
            state: Mutex::new(RouterState::default()),
            emitter,
        };
        router.install_default_rules();
        router
    }

    fn install_default_rules(&mut self) {
        self.add_rule(RoutingRule::new(
            "contact_card",
            RouteKind::ContactUpdate,
            Priority::High,
            |msg| msg.message_type == MessageType::Contact,
        ));
        self.add_rule(RoutingRule::new(
            "media",
            RouteKind::MediaMessage,
            Priority::High,
            |msg| msg.message_type.is_media(),
        ));
        self.add_rule(RoutingRule::new(
            "group",
            RouteKind::GroupSend,
            Priority::Normal,
            |msg| msg.metadata.is_group || msg.sender_is_group(),
        ));
        self.add_rule(RoutingRule::new(
            "location",
            RouteKind::LocationShare,
            Priority::Normal,
            |msg| msg.message_type == MessageType::Location,
        ));
    }

    /// Insert a rule, keeping the table sorted urgent -> low. Insertion
    /// order breaks priority ties; the catch-all stays last regardless.
    pub fn add_rule(&mut self, rule: RoutingRule) {
        self.rules.push(rule);
        self.rules.sort_by_key(|rule| rule.priority);
    }

    /// Extract every message from the webhook payload and classify each
    /// independently, returning one decision per message in payload order.
    pub fn route(&self, event: &WebhookEvent) -> Vec<RoutingDecision> {
        event
            .messages()
            .map(|message| self.route_message(message))
            .collect()
    }

    /// Classify a single message.
    pub fn route_message(&self, message: &Message) -> RoutingDecision {
        let rule = self
            .rules
            .iter()
            .find(|rule| (rule.predicate)(message))
            .unwrap_or(&self.fallback);

        let path = route_path(rule.route);
        let estimated_latency = path.iter().map(|(_, ty)| node_cost(*ty)).sum();
        let decision = RoutingDecision {
            message_id: message.id.clone(),
            route: rule.route,
            priority: rule.priority,
            node_path: path.into_iter().map(|(id, _)| id).collect(),
            estimated_latency,
            requires_retry: matches!(rule.route, RouteKind::MediaMessage | RouteKind::GroupSend),
        };

        tracing::debug!(
            message_id = %message.id,
            rule = rule.name,
            route = %decision.route,
            priority = %decision.priority,
            "message routed"
        );

        {
            let mut state = self.state.lock().unwrap();
            if let Some(reply_to) = &message.metadata.reply_to_id {
                state
                    .reply_threads
                    .entry(reply_to.clone())
                    .or_default()
                    .push(message.id.clone());
            }
            if message.metadata.forward_count > 0 {
                state
                    .forward_counts
                    .insert(message.id.clone(), message.metadata.forward_count);
            }
            state.contexts.insert(
                message.id.clone(),
                RoutingContext {
                    decision: decision.clone(),
                    message_type: message.message_type,
                    is_group: message.metadata.is_group || message.sender_is_group(),
                    routed_at: Utc::now(),
                },
            );
            state.stats.routed += 1;
            *state.stats.by_route.entry(decision.route).or_insert(0) += 1;
        }

        self.emitter.emit_or_log(Event::Router(RouterEvent::MessageRouted {
            message_id: decision.message_id.clone(),
            route: decision.route,
            priority: decision.priority,
        }));

        decision
    }

    /// Check required fields per message type. Returns the full issue list
    /// instead of failing on the first problem.
    pub fn validate_message(&self, message: &Message) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();

        if message.id.is_empty() {
            issues.push(ValidationIssue {
                field: "id",
                reason: "message id must not be empty".to_string(),
            });
        }
        if message.sender.is_empty() {
            issues.push(ValidationIssue {
                field: "sender",
                reason: "sender must not be empty".to_string(),
            });
        }
        if message.recipient.is_empty() {
            issues.push(ValidationIssue {
                field: "recipient",
                reason: "recipient must not be empty".to_string(),
            });
        }

        match message.message_type {
            MessageType::Text | MessageType::Location | MessageType::Contact => {
                if message.content.trim().is_empty() {
                    issues.push(ValidationIssue {
                        field: "content",
                        reason: format!(
                            "{} messages require non-empty content",
                            message.message_type
                        ),
                    });
                }
            }
            ty if ty.is_media() => {
                if message.media_url.as_deref().is_none_or(str::is_empty) {
                    issues.push(ValidationIssue {
                        field: "media_url",
                        reason: format!("{ty} messages require a media url"),
                    });
                }
                if message
                    .media_mime_type
                    .as_deref()
                    .is_none_or(str::is_empty)
                {
                    issues.push(ValidationIssue {
                        field: "media_mime_type",
                        reason: format!("{ty} messages require a media mime type"),
                    });
                }
            }
            _ => {}
        }

        if !issues.is_empty() {
            self.emitter
                .emit_or_log(Event::Router(RouterEvent::ValidationFailed {
                    message_id: message.id.clone(),
                    issues: issues.iter().map(ToString::to_string).collect(),
                }));
        }
        issues
    }

    /// The cached routing context for a message, if it was routed.
    pub fn context(&self, message_id: &str) -> Option<RoutingContext> {
        self.state.lock().unwrap().contexts.get(message_id).cloned()
    }

    /// Replies recorded against a thread root.
    pub fn thread_replies(&self, message_id: &str) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .reply_threads
            .get(message_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Recorded forward count for a message.
    pub fn forward_count(&self, message_id: &str) -> u32 {
        self.state
            .lock()
            .unwrap()
            .forward_counts
            .get(message_id)
            .copied()
            .unwrap_or(0)
    }

    /// Cumulative routing counters.
    pub fn stats(&self) -> RouterStats {
        self.state.lock().unwrap().stats.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn group_text_routes_to_group_send() {
        let router = MessageRouter::default();
        let msg = Message::text("m1", "12025550143@g.us", "15557654321", "hi all");
        let decision = router.route_message(&msg);
        assert_eq!(decision.route, RouteKind::GroupSend);
        assert!(decision.node_path.contains(&NodeId::from("group_handler")));
    }

    #[test]
    fn image_routes_to_media_message_even_in_groups() {
        let router = MessageRouter::default();
        let msg = Message::media(
            "m2",
            "12025550143@g.us",
            "15557654321",
            MessageType::Image,
            "https://cdn.example/img.jpg",
            "image/jpeg",
        );
        let decision = router.route_message(&msg);
        assert_eq!(decision.route, RouteKind::MediaMessage);
        assert_eq!(decision.priority, Priority::High);
    }

    #[test]
    fn latency_estimate_sums_path_costs() {
        let router = MessageRouter::default();
        let msg = Message::text("m3", "15551234567", "15557654321", "hello");
        let decision = router.route_message(&msg);
        // receiver 5 + validator 10 + router 5 + text 15 + rate_limiter 2
        // + sender 150 + emitter 5
        assert_eq!(decision.estimated_latency, Duration::from_millis(192));
    }

    #[test]
    fn media_without_url_fails_validation() {
        let router = MessageRouter::default();
        let mut msg = Message::media(
            "m4",
            "15551234567",
            "15557654321",
            MessageType::Image,
            "",
            "image/jpeg",
        );
        msg.media_url = None;
        let issues = router.validate_message(&msg);
        assert!(issues.iter().any(|issue| issue.field == "media_url"));
    }
}
