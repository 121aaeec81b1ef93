//! Message model for the relaygraph pipeline.
//!
//! Messages are extracted from inbound webhook payloads, classified by the
//! router, carried through the operational graph, and finally handed to the
//! provider transport. A [`Message`] is immutable once constructed; every
//! stage reads it and produces its own derived data instead of mutating the
//! original.
//!
//! # Examples
//!
//! ```rust
//! use relaygraph::message::{Message, MessageType};
//!
//! let msg = Message::text("wamid.1", "15551234567", "15557654321", "hello");
//! assert_eq!(msg.message_type, MessageType::Text);
//! assert!(!msg.metadata.is_group);
//!
//! let group = Message::text("wamid.2", "12025550143@g.us", "15557654321", "hi all")
//!     .into_group();
//! assert!(group.metadata.is_group);
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Sender-id suffix the upstream provider uses for group conversations.
pub const GROUP_SENDER_SUFFIX: &str = "@g.us";

/// Content type of a message, mirroring the provider's type field.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    #[default]
    Text,
    Image,
    Video,
    Audio,
    Document,
    Location,
    Contact,
}

impl MessageType {
    /// Returns `true` for types that carry a media attachment and therefore
    /// require `media_url` and `media_mime_type` to validate.
    #[must_use]
    pub fn is_media(&self) -> bool {
        matches!(
            self,
            MessageType::Image | MessageType::Video | MessageType::Audio | MessageType::Document
        )
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MessageType::Text => "text",
            MessageType::Image => "image",
            MessageType::Video => "video",
            MessageType::Audio => "audio",
            MessageType::Document => "document",
            MessageType::Location => "location",
            MessageType::Contact => "contact",
        };
        write!(f, "{s}")
    }
}

/// Terminal and intermediate delivery states reported by the provider.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    Sent,
    Delivered,
    Read,
    Failed,
}

impl DeliveryStatus {
    /// `read` and `failed` are terminal; a message history records at most
    /// one terminal status.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, DeliveryStatus::Read | DeliveryStatus::Failed)
    }
}

impl fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DeliveryStatus::Sent => "sent",
            DeliveryStatus::Delivered => "delivered",
            DeliveryStatus::Read => "read",
            DeliveryStatus::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

/// Auxiliary flags carried alongside a message.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageMetadata {
    /// Set when the sender id carries the group-conversation suffix.
    #[serde(default)]
    pub is_group: bool,
    /// Id of the message this one replies to, when part of a thread.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to_id: Option<String>,
    /// How many times this content has been forwarded.
    #[serde(default)]
    pub forward_count: u32,
}

/// An inbound or outbound message, immutable for the duration of a dispatch.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub sender: String,
    pub recipient: String,
    #[serde(rename = "type", default)]
    pub message_type: MessageType,
    /// Text body for text messages; caption or filename for media.
    #[serde(default)]
    pub content: String,
    /// Provider media reference, required for media types.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_mime_type: Option<String>,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<DeliveryStatus>,
    #[serde(default)]
    pub metadata: MessageMetadata,
}

impl Message {
    /// Construct a plain text message with `is_group` derived from the
    /// sender-id suffix convention.
    pub fn text(
        id: impl Into<String>,
        sender: impl Into<String>,
        recipient: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        let sender = sender.into();
        let is_group = sender.ends_with(GROUP_SENDER_SUFFIX);
        Self {
            id: id.into(),
            sender,
            recipient: recipient.into(),
            message_type: MessageType::Text,
            content: content.into(),
            media_url: None,
            media_mime_type: None,
            timestamp: Utc::now(),
            status: None,
            metadata: MessageMetadata {
                is_group,
                ..Default::default()
            },
        }
    }

    /// Construct a media message of the given type.
    pub fn media(
        id: impl Into<String>,
        sender: impl Into<String>,
        recipient: impl Into<String>,
        message_type: MessageType,
        media_url: impl Into<String>,
        media_mime_type: impl Into<String>,
    ) -> Self {
        let sender = sender.into();
        let is_group = sender.ends_with(GROUP_SENDER_SUFFIX);
        Self {
            id: id.into(),
            sender,
            recipient: recipient.into(),
            message_type,
            content: String::new(),
            media_url: Some(media_url.into()),
            media_mime_type: Some(media_mime_type.into()),
            timestamp: Utc::now(),
            status: None,
            metadata: MessageMetadata {
                is_group,
                ..Default::default()
            },
        }
    }

    /// Force the group flag regardless of the sender suffix.
    #[must_use]
    pub fn into_group(mut self) -> Self {
        self.metadata.is_group = true;
        self
    }

    /// Attach a reply-to link.
    #[must_use]
    pub fn with_reply_to(mut self, reply_to_id: impl Into<String>) -> Self {
        self.metadata.reply_to_id = Some(reply_to_id.into());
        self
    }

    /// Record a forward count.
    #[must_use]
    pub fn with_forward_count(mut self, forward_count: u32) -> Self {
        self.metadata.forward_count = forward_count;
        self
    }

    /// Override the message timestamp (builders and replayed payloads).
    #[must_use]
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Whether the sender id carries the group-conversation suffix.
    #[must_use]
    pub fn sender_is_group(&self) -> bool {
        self.sender.ends_with(GROUP_SENDER_SUFFIX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn group_flag_derived_from_sender_suffix() {
        let msg = Message::text("m1", "12025550143@g.us", "15557654321", "hello");
        assert!(msg.metadata.is_group);
        assert!(msg.sender_is_group());

        let direct = Message::text("m2", "15551234567", "15557654321", "hello");
        assert!(!direct.metadata.is_group);
    }

    #[test]
    fn media_types_classified() {
        assert!(MessageType::Image.is_media());
        assert!(MessageType::Document.is_media());
        assert!(!MessageType::Text.is_media());
        assert!(!MessageType::Location.is_media());
    }

    #[test]
    fn terminal_statuses() {
        assert!(DeliveryStatus::Read.is_terminal());
        assert!(DeliveryStatus::Failed.is_terminal());
        assert!(!DeliveryStatus::Sent.is_terminal());
        assert!(!DeliveryStatus::Delivered.is_terminal());
    }
}
