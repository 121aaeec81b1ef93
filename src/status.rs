//! Delivery-status bookkeeping.
//!
//! The tracker consumes `statuses[]` callbacks from inbound webhooks and
//! maintains a capped, append-only timeline per message id. Timing metrics
//! are offsets from the first `sent` entry; running analytics keep
//! cumulative per-status counts and derived rates, monotonic until an
//! explicit [`reset`](StatusTracker::reset).

use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::event_bus::{Event, EventEmitter, StatusEvent};
use crate::message::DeliveryStatus;
use crate::webhook::{StatusCallback, WebhookEvent};

/// Tunables for the status tracker.
#[derive(Clone, Copy, Debug)]
pub struct StatusTrackerConfig {
    /// Maximum entries retained per message; oldest entries drop first.
    pub history_cap: usize,
    /// Retry ceiling for failed deliveries before
    /// [`max_retries_exceeded`](crate::event_bus::StatusEvent) fires.
    pub max_retries: u32,
}

impl Default for StatusTrackerConfig {
    fn default() -> Self {
        Self {
            history_cap: 50,
            max_retries: 3,
        }
    }
}

/// One recorded status transition.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusUpdate {
    pub status: DeliveryStatus,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipient_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&StatusCallback> for StatusUpdate {
    fn from(callback: &StatusCallback) -> Self {
        Self {
            status: callback.status,
            timestamp: callback.timestamp,
            recipient_id: callback.recipient_id.clone(),
            error: callback.error.clone(),
        }
    }
}

/// Append-only status timeline for one message.
///
/// The entry count only grows (until capped) and at most one terminal
/// status is ever recorded; later terminal updates still append but do not
/// replace the final status.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusHistory {
    entries: Vec<StatusUpdate>,
    final_status: Option<DeliveryStatus>,
    retry_count: u32,
}

impl StatusHistory {
    pub fn entries(&self) -> &[StatusUpdate] {
        &self.entries
    }

    pub fn final_status(&self) -> Option<DeliveryStatus> {
        self.final_status
    }

    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    fn first_timestamp_of(&self, status: DeliveryStatus) -> Option<DateTime<Utc>> {
        self.entries
            .iter()
            .find(|entry| entry.status == status)
            .map(|entry| entry.timestamp)
    }
}

/// Per-message timing view, derived from the history on demand.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DeliveryMetrics {
    /// Milliseconds from first `sent` to first `delivered`.
    pub delivery_time_ms: Option<i64>,
    /// Milliseconds from first `sent` to first `read`.
    pub read_time_ms: Option<i64>,
}

/// Cumulative counters and derived rates (percentages).
///
/// Rates only update while `sent > 0` (and `delivered > 0` for the read
/// rate), so they never divide by zero.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct StatusAnalytics {
    pub sent: u64,
    pub delivered: u64,
    pub read: u64,
    pub failed: u64,
    pub delivery_rate: f64,
    pub read_rate: f64,
    pub failure_rate: f64,
}

impl StatusAnalytics {
    fn record(&mut self, status: DeliveryStatus) {
        match status {
            DeliveryStatus::Sent => self.sent += 1,
            DeliveryStatus::Delivered => self.delivered += 1,
            DeliveryStatus::Read => self.read += 1,
            DeliveryStatus::Failed => self.failed += 1,
        }
        if self.sent > 0 {
            self.delivery_rate = self.delivered as f64 / self.sent as f64 * 100.0;
            self.failure_rate = self.failed as f64 / self.sent as f64 * 100.0;
        }
        if self.delivered > 0 {
            self.read_rate = self.read as f64 / self.delivered as f64 * 100.0;
        }
    }
}

#[derive(Default)]
struct TrackerState {
    histories: FxHashMap<String, StatusHistory>,
    analytics: StatusAnalytics,
}

/// Consumes delivery/read webhooks and maintains per-message histories.
pub struct StatusTracker {
    state: Mutex<TrackerState>,
    config: StatusTrackerConfig,
    emitter: EventEmitter,
}

impl Default for StatusTracker {
    fn default() -> Self {
        Self::new(StatusTrackerConfig::default(), EventEmitter::disconnected())
    }
}

impl StatusTracker {
    pub fn new(config: StatusTrackerConfig, emitter: EventEmitter) -> Self {
        Self {
            state: Mutex::new(TrackerState::default()),
            config,
            emitter,
        }
    }

    /// Extract every status callback from the webhook payload and apply
    /// each to its message's history. Returns how many were applied.
    pub fn process_status_update(&self, event: &WebhookEvent) -> usize {
        let mut applied = 0;
        for callback in event.statuses() {
            self.record(&callback.id, StatusUpdate::from(callback));
            applied += 1;
        }
        applied
    }

    /// Apply one status transition to a message's history.
    pub fn record(&self, message_id: &str, update: StatusUpdate) {
        let status = update.status;
        let timestamp = update.timestamp;
        let retry_count = {
            let mut state = self.state.lock().unwrap();
            let history = state.histories.entry(message_id.to_string()).or_default();

            history.entries.push(update);
            let cap = self.config.history_cap.max(1);
            if history.entries.len() > cap {
                let overflow = history.entries.len() - cap;
                history.entries.drain(..overflow);
            }

            if status.is_terminal() && history.final_status.is_none() {
                history.final_status = Some(status);
            }

            if status == DeliveryStatus::Failed {
                history.retry_count += 1;
            }
            let retry_count = history.retry_count;

            state.analytics.record(status);
            retry_count
        };

        tracing::debug!(message_id, status = %status, "status recorded");
        self.emitter
            .emit_or_log(Event::Status(StatusEvent::StatusRecorded {
                message_id: message_id.to_string(),
                status,
                timestamp,
            }));

        if status == DeliveryStatus::Failed {
            let event = if retry_count <= self.config.max_retries {
                StatusEvent::RetryRequested {
                    message_id: message_id.to_string(),
                    attempt: retry_count,
                }
            } else {
                StatusEvent::MaxRetriesExceeded {
                    message_id: message_id.to_string(),
                    attempts: retry_count,
                }
            };
            self.emitter.emit_or_log(Event::Status(event));
        }
    }

    /// The full recorded history for a message.
    pub fn history(&self, message_id: &str) -> Option<StatusHistory> {
        self.state
            .lock()
            .unwrap()
            .histories
            .get(message_id)
            .cloned()
    }

    /// Timing metrics for a message, offsets from its first `sent` entry.
    pub fn delivery_metrics(&self, message_id: &str) -> Option<DeliveryMetrics> {
        let state = self.state.lock().unwrap();
        let history = state.histories.get(message_id)?;
        let sent_at = history.first_timestamp_of(DeliveryStatus::Sent)?;
        Some(DeliveryMetrics {
            delivery_time_ms: history
                .first_timestamp_of(DeliveryStatus::Delivered)
                .map(|at| (at - sent_at).num_milliseconds()),
            read_time_ms: history
                .first_timestamp_of(DeliveryStatus::Read)
                .map(|at| (at - sent_at).num_milliseconds()),
        })
    }

    /// Current running analytics snapshot.
    pub fn analytics(&self) -> StatusAnalytics {
        self.state.lock().unwrap().analytics
    }

    /// Drop all histories and zero the analytics.
    pub fn reset(&self) {
        let mut state = self.state.lock().unwrap();
        state.histories.clear();
        state.analytics = StatusAnalytics::default();
    }
}
