//! Realtime presence, typing, and push delivery.
//!
//! The processor keeps the live-connection registry (phone number -> set of
//! host-supplied [`ConnectionHandle`]s), room membership, and the ephemeral
//! presence/typing maps. Two sweep tasks expire stale presence and typing
//! entries; a single-flight drain loop pushes queued outbound events to
//! connected clients, one event per poll.
//!
//! Every background task is cancellable: [`shutdown`](RealtimeEventProcessor::shutdown)
//! signals and joins all of them deterministically. A failure inside one
//! tick is logged and the tick skipped; the loops never die.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::event_bus::{Event, EventEmitter, RealtimeEvent};
use crate::transport::ConnectionHandle;

/// Tunables for sweeps and the outbound queue.
#[derive(Clone, Debug)]
pub struct RealtimeConfig {
    /// How long an online contact may sit without live connections before
    /// the sweep marks it offline.
    pub presence_timeout: Duration,
    /// Presence sweep interval.
    pub presence_check_interval: Duration,
    /// Typing indicators expire after this long without a refresh.
    pub typing_timeout: Duration,
    /// Typing sweep interval.
    pub typing_check_interval: Duration,
    /// Outbound queue capacity; a full queue drops the event.
    pub queue_capacity: usize,
    /// Poll interval of the single-flight drain loop.
    pub drain_poll_interval: Duration,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            presence_timeout: Duration::from_secs(300),
            presence_check_interval: Duration::from_secs(60),
            typing_timeout: Duration::from_secs(10),
            typing_check_interval: Duration::from_secs(5),
            queue_capacity: 1000,
            drain_poll_interval: Duration::from_millis(100),
        }
    }
}

/// A contact's live availability state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresenceState {
    Online,
    Offline,
    Away,
}

/// Public presence view for one phone number.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PresenceInfo {
    pub phone: String,
    pub state: PresenceState,
    pub last_seen: DateTime<Utc>,
}

struct PresenceEntry {
    state: PresenceState,
    last_seen: DateTime<Utc>,
    /// When the state last changed, on the sweep clock.
    since: Instant,
}

/// Where a queued outbound event should be delivered.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DeliveryScope {
    /// Every connection of every registered phone number.
    Broadcast,
    /// Only the listed phone numbers.
    Direct(Vec<String>),
}

/// An event bound for live clients.
#[derive(Clone, Debug, PartialEq)]
pub struct OutboundEvent {
    pub name: String,
    pub payload: Value,
    pub scope: DeliveryScope,
}

impl OutboundEvent {
    pub fn broadcast(name: impl Into<String>, payload: Value) -> Self {
        Self {
            name: name.into(),
            payload,
            scope: DeliveryScope::Broadcast,
        }
    }

    pub fn direct(name: impl Into<String>, payload: Value, recipients: Vec<String>) -> Self {
        Self {
            name: name.into(),
            payload,
            scope: DeliveryScope::Direct(recipients),
        }
    }
}

struct TaskState {
    shutdown_tx: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

#[derive(Default)]
struct Registry {
    connections: FxHashMap<String, Vec<Arc<dyn ConnectionHandle>>>,
    rooms: FxHashMap<String, FxHashSet<String>>,
}

/// Connection/presence/typing registry with an internal push queue.
///
/// Cheap to clone; clones share all maps and the queue.
#[derive(Clone)]
pub struct RealtimeEventProcessor {
    registry: Arc<Mutex<Registry>>,
    presence: Arc<Mutex<FxHashMap<String, PresenceEntry>>>,
    typing: Arc<Mutex<FxHashMap<(String, String), Instant>>>,
    queue: Arc<Mutex<VecDeque<OutboundEvent>>>,
    tasks: Arc<Mutex<Vec<TaskState>>>,
    config: RealtimeConfig,
    emitter: EventEmitter,
}

impl Default for RealtimeEventProcessor {
    fn default() -> Self {
        Self::new(RealtimeConfig::default(), EventEmitter::disconnected())
    }
}

impl RealtimeEventProcessor {
    pub fn new(config: RealtimeConfig, emitter: EventEmitter) -> Self {
        Self {
            registry: Arc::new(Mutex::new(Registry::default())),
            presence: Arc::new(Mutex::new(FxHashMap::default())),
            typing: Arc::new(Mutex::new(FxHashMap::default())),
            queue: Arc::new(Mutex::new(VecDeque::new())),
            tasks: Arc::new(Mutex::new(Vec::new())),
            config,
            emitter,
        }
    }

    // ------------------------------------------------------------------
    // Connections & rooms
    // ------------------------------------------------------------------

    /// Register a live connection for a phone number and mark the contact
    /// online. The identity is assumed authenticated by the host.
    pub fn register_connection(&self, phone: &str, handle: Arc<dyn ConnectionHandle>) {
        {
            let mut registry = self.registry.lock().unwrap();
            registry
                .connections
                .entry(phone.to_string())
                .or_default()
                .push(handle);
        }
        self.update_presence(phone, PresenceState::Online);
    }

    /// Drop one connection. Presence stays online until the sweep notices
    /// the contact has no connections past the timeout.
    pub fn unregister_connection(&self, phone: &str, connection_id: &str) {
        let mut registry = self.registry.lock().unwrap();
        if let Some(handles) = registry.connections.get_mut(phone) {
            handles.retain(|handle| handle.connection_id() != connection_id);
            if handles.is_empty() {
                registry.connections.remove(phone);
            }
        }
    }

    /// Live connection count for a phone number.
    pub fn connection_count(&self, phone: &str) -> usize {
        self.registry
            .lock()
            .unwrap()
            .connections
            .get(phone)
            .map_or(0, Vec::len)
    }

    pub fn join_room(&self, room_id: &str, phone: &str) {
        self.registry
            .lock()
            .unwrap()
            .rooms
            .entry(room_id.to_string())
            .or_default()
            .insert(phone.to_string());
    }

    pub fn leave_room(&self, room_id: &str, phone: &str) {
        let mut registry = self.registry.lock().unwrap();
        if let Some(members) = registry.rooms.get_mut(room_id) {
            members.remove(phone);
            if members.is_empty() {
                registry.rooms.remove(room_id);
            }
        }
    }

    /// Members of a room, sorted.
    pub fn room_members(&self, room_id: &str) -> Vec<String> {
        let registry = self.registry.lock().unwrap();
        let mut members: Vec<String> = registry
            .rooms
            .get(room_id)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default();
        members.sort();
        members
    }

    // ------------------------------------------------------------------
    // Presence & typing
    // ------------------------------------------------------------------

    /// Record a presence change, firing `contact_online`/`contact_offline`
    /// on transitions and broadcasting the update to live clients.
    pub fn update_presence(&self, phone: &str, state: PresenceState) {
        let now = Utc::now();
        let previous = {
            let mut presence = self.presence.lock().unwrap();
            let entry = presence
                .entry(phone.to_string())
                .or_insert_with(|| PresenceEntry {
                    state: PresenceState::Offline,
                    last_seen: now,
                    since: Instant::now(),
                });
            let previous = entry.state;
            entry.state = state;
            entry.last_seen = now;
            entry.since = Instant::now();
            previous
        };

        if previous != state {
            match state {
                PresenceState::Online => {
                    self.emitter
                        .emit_or_log(Event::Realtime(RealtimeEvent::ContactOnline {
                            phone: phone.to_string(),
                        }));
                }
                PresenceState::Offline => {
                    self.emitter
                        .emit_or_log(Event::Realtime(RealtimeEvent::ContactOffline {
                            phone: phone.to_string(),
                        }));
                }
                PresenceState::Away => {}
            }
        }

        self.enqueue(OutboundEvent::broadcast(
            "presence_update",
            serde_json::json!({ "phone": phone, "state": state, "last_seen": now.to_rfc3339() }),
        ));
    }

    /// Current presence for a phone number.
    pub fn presence(&self, phone: &str) -> Option<PresenceInfo> {
        self.presence
            .lock()
            .unwrap()
            .get(phone)
            .map(|entry| PresenceInfo {
                phone: phone.to_string(),
                state: entry.state,
                last_seen: entry.last_seen,
            })
    }

    /// Phone numbers currently online, sorted.
    pub fn online_contacts(&self) -> Vec<String> {
        let presence = self.presence.lock().unwrap();
        let mut online: Vec<String> = presence
            .iter()
            .filter(|(_, entry)| entry.state == PresenceState::Online)
            .map(|(phone, _)| phone.clone())
            .collect();
        online.sort();
        online
    }

    /// Start (or refresh) a typing indicator. It expires on its own after
    /// the configured timeout; peers never delete it explicitly.
    pub fn set_typing(&self, conversation_id: &str, phone: &str) {
        let fresh = self
            .typing
            .lock()
            .unwrap()
            .insert(
                (conversation_id.to_string(), phone.to_string()),
                Instant::now(),
            )
            .is_none();
        if fresh {
            self.emitter
                .emit_or_log(Event::Realtime(RealtimeEvent::TypingStart {
                    conversation_id: conversation_id.to_string(),
                    phone: phone.to_string(),
                }));
        }
    }

    /// Phones currently typing in a conversation, sorted.
    pub fn typing_in(&self, conversation_id: &str) -> Vec<String> {
        let typing = self.typing.lock().unwrap();
        let mut phones: Vec<String> = typing
            .keys()
            .filter(|(conv, _)| conv == conversation_id)
            .map(|(_, phone)| phone.clone())
            .collect();
        phones.sort();
        phones
    }

    // ------------------------------------------------------------------
    // Outbound queue
    // ------------------------------------------------------------------

    /// Queue an event for push delivery. Returns `false` (and emits
    /// `event_queue_full`) when the bounded queue drops it.
    pub fn enqueue(&self, event: OutboundEvent) -> bool {
        let mut queue = self.queue.lock().unwrap();
        if queue.len() >= self.config.queue_capacity {
            let dropped = event.name.clone();
            drop(queue);
            tracing::warn!(event = %dropped, "outbound queue full; dropping event");
            self.emitter
                .emit_or_log(Event::Realtime(RealtimeEvent::EventQueueFull {
                    dropped,
                }));
            return false;
        }
        queue.push_back(event);
        true
    }

    /// Queued events not yet drained.
    pub fn queue_depth(&self) -> usize {
        self.queue.lock().unwrap().len()
    }

    // ------------------------------------------------------------------
    // Background tasks
    // ------------------------------------------------------------------

    /// Start the typing sweep, presence sweep, and drain loop. Idempotent.
    pub fn start(&self) {
        let mut tasks = self.tasks.lock().unwrap();
        if !tasks.is_empty() {
            return;
        }
        tasks.push(self.spawn_typing_sweep());
        tasks.push(self.spawn_presence_sweep());
        tasks.push(self.spawn_drain_loop());
    }

    /// Signal every background task and wait for each to exit.
    pub async fn shutdown(&self) {
        let states: Vec<TaskState> = {
            let mut tasks = self.tasks.lock().unwrap();
            tasks.drain(..).collect()
        };
        for state in states {
            let _ = state.shutdown_tx.send(());
            let _ = state.handle.await;
        }
    }

    fn spawn_typing_sweep(&self) -> TaskState {
        let processor = self.clone();
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel();
        let period = self.config.typing_check_interval;
        let timeout = self.config.typing_timeout;

        let handle = tokio::spawn(async move {
            let mut interval =
                tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => break,
                    _ = interval.tick() => {
                        let now = Instant::now();
                        let expired: Vec<(String, String)> = {
                            let mut typing = processor.typing.lock().unwrap();
                            let stale: Vec<(String, String)> = typing
                                .iter()
                                .filter(|(_, started)| now.duration_since(**started) >= timeout)
                                .map(|(key, _)| key.clone())
                                .collect();
                            for key in &stale {
                                typing.remove(key);
                            }
                            stale
                        };
                        for (conversation_id, phone) in expired {
                            processor.emitter.emit_or_log(Event::Realtime(
                                RealtimeEvent::TypingStop {
                                    conversation_id,
                                    phone,
                                },
                            ));
                        }
                    }
                }
            }
        });

        TaskState {
            shutdown_tx,
            handle,
        }
    }

    fn spawn_presence_sweep(&self) -> TaskState {
        let processor = self.clone();
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel();
        let period = self.config.presence_check_interval;
        let timeout = self.config.presence_timeout;

        let handle = tokio::spawn(async move {
            let mut interval =
                tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => break,
                    _ = interval.tick() => {
                        let now = Instant::now();
                        let stale: Vec<String> = {
                            let presence = processor.presence.lock().unwrap();
                            let registry = processor.registry.lock().unwrap();
                            presence
                                .iter()
                                .filter(|(phone, entry)| {
                                    entry.state == PresenceState::Online
                                        && !registry.connections.contains_key(*phone)
                                        && now.duration_since(entry.since) >= timeout
                                })
                                .map(|(phone, _)| phone.clone())
                                .collect()
                        };
                        for phone in stale {
                            tracing::debug!(phone, "presence sweep: marking offline");
                            processor.update_presence(&phone, PresenceState::Offline);
                        }
                    }
                }
            }
        });

        TaskState {
            shutdown_tx,
            handle,
        }
    }

    /// Single-flight drain: one event per poll, delivered to its recipients
    /// then re-emitted on the bus for internal subscribers.
    fn spawn_drain_loop(&self) -> TaskState {
        let processor = self.clone();
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel();
        let period = self.config.drain_poll_interval;

        let handle = tokio::spawn(async move {
            let mut interval =
                tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => break,
                    _ = interval.tick() => {
                        let event = {
                            let mut queue = processor.queue.lock().unwrap();
                            queue.pop_front()
                        };
                        if let Some(event) = event {
                            processor.dispatch(event).await;
                        }
                    }
                }
            }
        });

        TaskState {
            shutdown_tx,
            handle,
        }
    }

    async fn dispatch(&self, event: OutboundEvent) {
        let targets: Vec<Arc<dyn ConnectionHandle>> = {
            let registry = self.registry.lock().unwrap();
            match &event.scope {
                DeliveryScope::Broadcast => registry
                    .connections
                    .values()
                    .flatten()
                    .cloned()
                    .collect(),
                DeliveryScope::Direct(phones) => phones
                    .iter()
                    .filter_map(|phone| registry.connections.get(phone))
                    .flatten()
                    .cloned()
                    .collect(),
            }
        };

        let outcomes =
            futures_util::future::join_all(targets.iter().map(|handle| handle.deliver(&event)))
                .await;
        let mut delivered = 0usize;
        for (handle, outcome) in targets.iter().zip(outcomes) {
            match outcome {
                Ok(()) => delivered += 1,
                Err(error) => {
                    tracing::warn!(
                        connection = handle.connection_id(),
                        event = %event.name,
                        %error,
                        "push delivery failed"
                    );
                }
            }
        }

        self.emitter
            .emit_or_log(Event::Realtime(RealtimeEvent::EventDispatched {
                name: event.name,
                recipients: delivered,
            }));
    }
}
