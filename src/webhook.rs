//! Inbound webhook payload model.
//!
//! The upstream messaging provider delivers everything through one webhook
//! shape: a list of entries, each carrying a list of field changes, where a
//! `"messages"` change holds new inbound messages and/or delivery status
//! callbacks. Messages feed the router and the operational graph; statuses
//! feed the status tracker.
//!
//! # Examples
//!
//! ```rust
//! use relaygraph::webhook::WebhookEvent;
//!
//! let payload = serde_json::json!({
//!     "object": "whatsapp_business_account",
//!     "entry": [{
//!         "id": "acct-1",
//!         "changes": [{
//!             "field": "messages",
//!             "value": {
//!                 "messages": [{
//!                     "id": "wamid.1",
//!                     "sender": "15551234567",
//!                     "recipient": "15557654321",
//!                     "type": "text",
//!                     "content": "hello",
//!                     "timestamp": "2024-05-01T12:00:00Z"
//!                 }]
//!             }
//!         }]
//!     }]
//! });
//! let event: WebhookEvent = serde_json::from_value(payload).unwrap();
//! assert_eq!(event.messages().count(), 1);
//! assert_eq!(event.statuses().count(), 0);
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::message::{DeliveryStatus, Message};

/// The change field carrying message traffic.
pub const MESSAGES_FIELD: &str = "messages";

/// Top-level webhook payload.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct WebhookEvent {
    /// Provider object type, e.g. `"whatsapp_business_account"`.
    #[serde(default)]
    pub object: String,
    #[serde(default)]
    pub entry: Vec<WebhookEntry>,
}

/// One account-scoped entry inside a webhook payload.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct WebhookEntry {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub changes: Vec<WebhookChange>,
}

/// A single field change within an entry.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct WebhookChange {
    #[serde(default)]
    pub field: String,
    #[serde(default)]
    pub value: ChangeValue,
}

/// The value of a `"messages"` change: inbound messages and/or status
/// callbacks. Either list may be absent.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ChangeValue {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub messages: Option<Vec<Message>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub statuses: Option<Vec<StatusCallback>>,
}

/// A delivery/read status callback for a previously sent message.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StatusCallback {
    /// Id of the message this callback refers to.
    pub id: String,
    pub status: DeliveryStatus,
    pub timestamp: DateTime<Utc>,
    /// Recipient the status applies to, when the provider includes it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipient_id: Option<String>,
    /// Provider error description for `failed` callbacks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl WebhookEvent {
    /// Wrap a batch of messages in the canonical webhook shape. Used by
    /// hosts that synthesize events and heavily by tests.
    pub fn from_messages(messages: Vec<Message>) -> Self {
        Self {
            object: "whatsapp_business_account".to_string(),
            entry: vec![WebhookEntry {
                id: "entry-0".to_string(),
                changes: vec![WebhookChange {
                    field: MESSAGES_FIELD.to_string(),
                    value: ChangeValue {
                        messages: Some(messages),
                        statuses: None,
                    },
                }],
            }],
        }
    }

    /// Wrap a batch of status callbacks in the canonical webhook shape.
    pub fn from_statuses(statuses: Vec<StatusCallback>) -> Self {
        Self {
            object: "whatsapp_business_account".to_string(),
            entry: vec![WebhookEntry {
                id: "entry-0".to_string(),
                changes: vec![WebhookChange {
                    field: MESSAGES_FIELD.to_string(),
                    value: ChangeValue {
                        messages: None,
                        statuses: Some(statuses),
                    },
                }],
            }],
        }
    }

    /// Iterate all inbound messages across every entry and `"messages"`
    /// change, in payload order.
    pub fn messages(&self) -> impl Iterator<Item = &Message> {
        self.message_changes()
            .filter_map(|value| value.messages.as_deref())
            .flatten()
    }

    /// Iterate all status callbacks across every entry and `"messages"`
    /// change, in payload order.
    pub fn statuses(&self) -> impl Iterator<Item = &StatusCallback> {
        self.message_changes()
            .filter_map(|value| value.statuses.as_deref())
            .flatten()
    }

    fn message_changes(&self) -> impl Iterator<Item = &ChangeValue> {
        self.entry
            .iter()
            .flat_map(|entry| entry.changes.iter())
            .filter(|change| change.field == MESSAGES_FIELD)
            .map(|change| &change.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Message;

    #[test]
    fn non_message_changes_are_ignored() {
        let mut event = WebhookEvent::from_messages(vec![Message::text("m1", "a", "b", "hi")]);
        event.entry[0].changes.push(WebhookChange {
            field: "account_update".to_string(),
            value: ChangeValue {
                messages: Some(vec![Message::text("m2", "a", "b", "nope")]),
                statuses: None,
            },
        });
        let ids: Vec<_> = event.messages().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["m1"]);
    }

    #[test]
    fn statuses_flatten_across_entries() {
        let mut event = WebhookEvent::from_statuses(vec![StatusCallback {
            id: "m1".to_string(),
            status: crate::message::DeliveryStatus::Sent,
            timestamp: chrono::Utc::now(),
            recipient_id: None,
            error: None,
        }]);
        event.entry.push(event.entry[0].clone());
        assert_eq!(event.statuses().count(), 2);
    }
}
