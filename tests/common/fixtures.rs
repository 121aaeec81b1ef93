use chrono::{DateTime, TimeDelta, Utc};

use relaygraph::message::{DeliveryStatus, Message, MessageType};
use relaygraph::webhook::{StatusCallback, WebhookEvent};

/// A webhook event carrying one plain text message.
pub fn text_event(message_id: &str, content: &str) -> WebhookEvent {
    WebhookEvent::from_messages(vec![Message::text(
        message_id,
        "15551234567",
        "15557654321",
        content,
    )])
}

/// A webhook event carrying one image message.
pub fn image_event(message_id: &str) -> WebhookEvent {
    WebhookEvent::from_messages(vec![Message::media(
        message_id,
        "15551234567",
        "15557654321",
        MessageType::Image,
        "https://cdn.example/photo.jpg",
        "image/jpeg",
    )])
}

/// A webhook event with the classic sent/delivered/read sequence for one
/// message, offset in milliseconds from `t0`.
pub fn status_sequence_event(message_id: &str, t0: DateTime<Utc>) -> WebhookEvent {
    WebhookEvent::from_statuses(vec![
        status_callback(message_id, DeliveryStatus::Sent, t0),
        status_callback(
            message_id,
            DeliveryStatus::Delivered,
            t0 + TimeDelta::milliseconds(200),
        ),
        status_callback(
            message_id,
            DeliveryStatus::Read,
            t0 + TimeDelta::milliseconds(500),
        ),
    ])
}

pub fn status_callback(
    message_id: &str,
    status: DeliveryStatus,
    timestamp: DateTime<Utc>,
) -> StatusCallback {
    StatusCallback {
        id: message_id.to_string(),
        status,
        timestamp,
        recipient_id: None,
        error: None,
    }
}
