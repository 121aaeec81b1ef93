use thiserror::Error;

use super::event::Event;

/// Cloneable handle components use to publish events on the bus.
///
/// Emission is synchronous and non-blocking; the bus channel is unbounded,
/// so the only failure mode is a dropped bus.
#[derive(Clone, Debug)]
pub struct EventEmitter {
    sender: flume::Sender<Event>,
}

impl EventEmitter {
    pub(crate) fn new(sender: flume::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Create an emitter whose events go nowhere. Useful for components
    /// constructed without a bus (and in unit tests).
    pub fn disconnected() -> Self {
        let (sender, _receiver) = flume::unbounded();
        Self { sender }
    }

    /// Emit an event, surfacing a closed bus to the caller.
    pub fn emit(&self, event: Event) -> Result<(), EmitterError> {
        self.sender.send(event).map_err(|_| EmitterError::Closed)
    }

    /// Emit an event, logging (and otherwise swallowing) a closed bus.
    ///
    /// Lifecycle notifications must never fail the operation that produced
    /// them, so the hot paths use this variant.
    pub fn emit_or_log(&self, event: Event) {
        if self.sender.send(event).is_err() {
            tracing::warn!("event bus closed; dropping event");
        }
    }
}

/// Errors that can occur when emitting an event.
#[derive(Debug, Error)]
pub enum EmitterError {
    #[error("event bus closed")]
    Closed,
}
