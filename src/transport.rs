//! Host-supplied delivery seams.
//!
//! The engine never talks to the upstream messaging provider directly: the
//! terminal sender node hands finished messages to a [`MessageTransport`]
//! implementation supplied by the host, and the realtime processor pushes
//! events through [`ConnectionHandle`]s the host registers per live client.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::message::Message;
use crate::realtime::OutboundEvent;

/// Identifier the provider assigns to an accepted outbound message.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProviderMessageId(pub String);

impl ProviderMessageId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Receipt produced by a sender node after a successful provider hand-off.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryReceipt {
    /// Our message id.
    pub message_id: String,
    /// The id the provider assigned.
    pub provider_message_id: ProviderMessageId,
}

/// Errors surfaced by a transport implementation.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("provider rejected message: {0}")]
    Rejected(String),
    #[error("provider unreachable: {0}")]
    Unreachable(String),
}

/// Outbound provider API client, supplied by the host.
///
/// At-least-once semantics: the engine retries failed sends through the
/// graph's retry machinery, so implementations should be idempotent where
/// the provider allows it.
#[async_trait]
pub trait MessageTransport: Send + Sync {
    async fn send(&self, message: &Message) -> Result<ProviderMessageId, TransportError>;
}

/// A live bidirectional client connection, supplied by the host.
///
/// Authentication of the connecting identity happens before the handle is
/// registered with the realtime processor; the engine treats the phone
/// number it was registered under as authoritative.
#[async_trait]
pub trait ConnectionHandle: Send + Sync {
    /// Stable identifier for this connection (one phone number may hold
    /// several connections).
    fn connection_id(&self) -> &str;

    /// Push one event to this client.
    async fn deliver(&self, event: &OutboundEvent) -> Result<(), TransportError>;
}
