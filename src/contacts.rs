//! Contact reconciliation.
//!
//! The sync manager keeps one contact per normalized phone number and
//! reconciles incoming contact lists in three modes: `full_sync` (the
//! incoming list is authoritative; absentees are deleted), `incremental_sync`
//! (additions/updates only), and `single_contact`. Batches are best-effort:
//! one bad record is reported, never aborts the rest.
//!
//! An auto-sync task drains queued updates on a fixed interval;
//! [`stop_auto_sync`](ContactSyncManager::stop_auto_sync) cancels the task
//! deterministically, letting an in-flight tick finish.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::event_bus::{ContactEvent, Event, EventEmitter};

/// Lifecycle state of a contact record.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContactStatus {
    #[default]
    Active,
    Blocked,
    Deleted,
}

/// Free-form contact attributes.
///
/// Labels merge as a set union; custom fields merge last-writer-wins per
/// key; `last_seen` merges as the maximum of both sides.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ContactMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_seen: Option<DateTime<Utc>>,
    #[serde(default)]
    pub message_count: u64,
    #[serde(default)]
    pub is_business: bool,
    #[serde(default)]
    pub labels: BTreeSet<String>,
    #[serde(default)]
    pub custom_fields: FxHashMap<String, Value>,
}

/// One contact, keyed by normalized phone number.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    pub phone: String,
    pub name: String,
    #[serde(default)]
    pub status: ContactStatus,
    #[serde(default)]
    pub metadata: ContactMetadata,
    pub created_at: DateTime<Utc>,
    /// Absent on records from sources that do not track modification time;
    /// conflict resolution then falls back to keeping the existing record.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Contact {
    pub fn new(phone: impl Into<String>, name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            phone: phone.into(),
            name: name.into(),
            status: ContactStatus::Active,
            metadata: ContactMetadata::default(),
            created_at: now,
            updated_at: Some(now),
        }
    }

    #[must_use]
    pub fn with_updated_at(mut self, updated_at: Option<DateTime<Utc>>) -> Self {
        self.updated_at = updated_at;
        self
    }

    #[must_use]
    pub fn with_status(mut self, status: ContactStatus) -> Self {
        self.status = status;
        self
    }

    #[must_use]
    pub fn with_labels<I: IntoIterator<Item = S>, S: Into<String>>(mut self, labels: I) -> Self {
        self.metadata.labels = labels.into_iter().map(Into::into).collect();
        self
    }
}

/// How diverging records for the same phone number are reconciled.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictResolution {
    /// Keep whichever record has the newer `updated_at`; an incoming record
    /// without a timestamp always loses.
    #[default]
    KeepNewest,
    /// Union labels, last-writer-wins custom fields, maximum `last_seen`;
    /// scalar fields follow the newer record.
    Merge,
}

/// Which reconciliation mode a sync call ran in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncOperation {
    FullSync,
    IncrementalSync,
    SingleContact,
}

impl SyncOperation {
    pub fn name(&self) -> &'static str {
        match self {
            SyncOperation::FullSync => "full_sync",
            SyncOperation::IncrementalSync => "incremental_sync",
            SyncOperation::SingleContact => "single_contact",
        }
    }
}

/// Tunables for the sync manager.
#[derive(Clone, Debug)]
pub struct SyncConfig {
    pub conflict_resolution: ConflictResolution,
    /// Prefixed onto numbers that arrive without a country code.
    pub default_country_code: String,
    /// Interval for the auto-sync task.
    pub auto_sync_interval: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            conflict_resolution: ConflictResolution::KeepNewest,
            default_country_code: "1".to_string(),
            auto_sync_interval: Duration::from_secs(300),
        }
    }
}

/// A contact that could not be applied, with why.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SyncIssue {
    pub phone: String,
    pub reason: String,
}

/// Aggregate outcome of one sync call.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub added: usize,
    pub updated: usize,
    pub deleted: usize,
    pub duplicates: usize,
    pub conflicts: usize,
    pub errors: Vec<SyncIssue>,
}

enum Applied {
    Added,
    Updated,
    Duplicate,
    ConflictKeptExisting,
}

struct AutoSyncState {
    shutdown_tx: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

/// Reconciles contact lists against the normalized-phone registry.
///
/// Cheap to clone; clones share the same registry and pending queue.
#[derive(Clone)]
pub struct ContactSyncManager {
    contacts: Arc<Mutex<FxHashMap<String, Contact>>>,
    pending: Arc<Mutex<Vec<Contact>>>,
    auto_sync: Arc<Mutex<Option<AutoSyncState>>>,
    config: SyncConfig,
    emitter: EventEmitter,
}

impl Default for ContactSyncManager {
    fn default() -> Self {
        Self::new(SyncConfig::default(), EventEmitter::disconnected())
    }
}

impl ContactSyncManager {
    pub fn new(config: SyncConfig, emitter: EventEmitter) -> Self {
        Self {
            contacts: Arc::new(Mutex::new(FxHashMap::default())),
            pending: Arc::new(Mutex::new(Vec::new())),
            auto_sync: Arc::new(Mutex::new(None)),
            config,
            emitter,
        }
    }

    /// Strip a raw phone number down to digits and ensure a country-code
    /// prefix. Returns `None` when nothing usable remains.
    pub fn normalize_phone(&self, raw: &str) -> Option<String> {
        let mut digits: String = raw.chars().filter(char::is_ascii_digit).collect();
        if let Some(stripped) = digits.strip_prefix("00") {
            digits = stripped.to_string();
        }
        let digits = digits.trim_start_matches('0').to_string();
        if digits.is_empty() {
            return None;
        }
        if digits.len() <= 10 {
            return Some(format!("{}{digits}", self.config.default_country_code));
        }
        Some(digits)
    }

    /// Reconcile against an authoritative list: apply every record, then
    /// delete contacts absent from it.
    pub fn full_sync(&self, authoritative: Vec<Contact>) -> SyncReport {
        let mut report = SyncReport::default();
        let mut keep: BTreeSet<String> = BTreeSet::new();

        for contact in authoritative {
            if let Some(phone) = self.apply_one(contact, &mut report) {
                keep.insert(phone);
            }
        }

        let removed: Vec<(String, Contact)> = {
            let mut contacts = self.contacts.lock().unwrap();
            let stale: Vec<String> = contacts
                .keys()
                .filter(|phone| !keep.contains(*phone))
                .cloned()
                .collect();
            stale
                .into_iter()
                .filter_map(|phone| contacts.remove(&phone).map(|c| (phone, c)))
                .collect()
        };
        for (phone, _) in removed {
            report.deleted += 1;
            self.emitter
                .emit_or_log(Event::Contact(ContactEvent::ContactDeleted { phone }));
        }

        self.finish(SyncOperation::FullSync, report)
    }

    /// Apply additions and updates only; never deletes.
    pub fn incremental_sync(&self, updates: Vec<Contact>) -> SyncReport {
        let mut report = SyncReport::default();
        for contact in updates {
            self.apply_one(contact, &mut report);
        }
        self.finish(SyncOperation::IncrementalSync, report)
    }

    /// Apply a single record.
    pub fn single_contact(&self, contact: Contact) -> SyncReport {
        let mut report = SyncReport::default();
        self.apply_one(contact, &mut report);
        self.finish(SyncOperation::SingleContact, report)
    }

    /// Stage an update for the next auto-sync tick.
    pub fn queue_update(&self, contact: Contact) {
        self.pending.lock().unwrap().push(contact);
    }

    /// Look up a contact by raw phone number.
    pub fn contact(&self, raw_phone: &str) -> Option<Contact> {
        let phone = self.normalize_phone(raw_phone)?;
        self.contacts.lock().unwrap().get(&phone).cloned()
    }

    /// All active contacts, sorted by phone number.
    pub fn active_contacts(&self) -> Vec<Contact> {
        let contacts = self.contacts.lock().unwrap();
        let mut active: Vec<Contact> = contacts
            .values()
            .filter(|c| c.status == ContactStatus::Active)
            .cloned()
            .collect();
        active.sort_by(|a, b| a.phone.cmp(&b.phone));
        active
    }

    /// Number of contacts in the registry.
    pub fn len(&self) -> usize {
        self.contacts.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.contacts.lock().unwrap().is_empty()
    }

    /// Start the auto-sync task. Idempotent; a second call is a no-op.
    ///
    /// Each tick drains the queued updates into
    /// [`incremental_sync`](Self::incremental_sync). Tick failures are
    /// logged and the tick skipped; the loop never dies.
    pub fn start_auto_sync(&self) {
        let mut guard = self.auto_sync.lock().unwrap();
        if guard.is_some() {
            return;
        }

        let manager = self.clone();
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel();
        let period = self.config.auto_sync_interval;

        let handle = tokio::spawn(async move {
            let start = tokio::time::Instant::now() + period;
            let mut interval = tokio::time::interval_at(start, period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => break,
                    _ = interval.tick() => {
                        let updates: Vec<Contact> = {
                            let mut pending = manager.pending.lock().unwrap();
                            pending.drain(..).collect()
                        };
                        if updates.is_empty() {
                            continue;
                        }
                        let count = updates.len();
                        let report = manager.incremental_sync(updates);
                        tracing::debug!(
                            queued = count,
                            added = report.added,
                            updated = report.updated,
                            "auto-sync tick applied queued updates"
                        );
                    }
                }
            }
        });

        *guard = Some(AutoSyncState {
            shutdown_tx,
            handle,
        });
    }

    /// Stop the auto-sync task and wait for it to exit. An in-flight tick
    /// runs to completion; no further ticks fire.
    pub async fn stop_auto_sync(&self) {
        let state = {
            let mut guard = self.auto_sync.lock().unwrap();
            guard.take()
        };
        if let Some(state) = state {
            let _ = state.shutdown_tx.send(());
            let _ = state.handle.await;
        }
    }

    /// Apply one record, updating the report. Returns the normalized phone
    /// on success so `full_sync` can track survivors.
    fn apply_one(&self, incoming: Contact, report: &mut SyncReport) -> Option<String> {
        let Some(phone) = self.normalize_phone(&incoming.phone) else {
            report.errors.push(SyncIssue {
                phone: incoming.phone.clone(),
                reason: "phone number contains no usable digits".to_string(),
            });
            return None;
        };

        let outcome = {
            let mut contacts = self.contacts.lock().unwrap();
            match contacts.get_mut(&phone) {
                None => {
                    let mut fresh = incoming;
                    fresh.phone = phone.clone();
                    fresh.status = ContactStatus::Active;
                    fresh.metadata.message_count = 0;
                    contacts.insert(phone.clone(), fresh);
                    Applied::Added
                }
                Some(existing) => {
                    if existing.name == incoming.name {
                        // Same key, same display name: nothing to reconcile.
                        Applied::Duplicate
                    } else {
                        report.conflicts += 1;
                        self.resolve_conflict(existing, incoming, &phone)
                    }
                }
            }
        };

        match outcome {
            Applied::Added => {
                report.added += 1;
                self.emitter
                    .emit_or_log(Event::Contact(ContactEvent::ContactAdded {
                        phone: phone.clone(),
                    }));
            }
            Applied::Updated => {
                report.updated += 1;
                self.emitter
                    .emit_or_log(Event::Contact(ContactEvent::ContactUpdated {
                        phone: phone.clone(),
                    }));
            }
            Applied::Duplicate => report.duplicates += 1,
            Applied::ConflictKeptExisting => {}
        }
        Some(phone)
    }

    /// Reconcile a diverging record in place. Caller holds the registry
    /// lock and has already counted the conflict.
    fn resolve_conflict(&self, existing: &mut Contact, incoming: Contact, phone: &str) -> Applied {
        let incoming_newer = match (incoming.updated_at, existing.updated_at) {
            (None, _) => false,
            (Some(_), None) => true,
            (Some(theirs), Some(ours)) => theirs > ours,
        };

        match self.config.conflict_resolution {
            ConflictResolution::KeepNewest => {
                if !incoming_newer {
                    return Applied::ConflictKeptExisting;
                }
                let created_at = existing.created_at;
                let message_count = existing
                    .metadata
                    .message_count
                    .max(incoming.metadata.message_count);
                *existing = incoming;
                existing.phone = phone.to_string();
                existing.created_at = created_at;
                existing.metadata.message_count = message_count;
                Applied::Updated
            }
            ConflictResolution::Merge => {
                if incoming_newer {
                    existing.name = incoming.name;
                    existing.status = incoming.status;
                    existing.updated_at = incoming.updated_at;
                }
                existing.metadata.labels.extend(incoming.metadata.labels);
                existing
                    .metadata
                    .custom_fields
                    .extend(incoming.metadata.custom_fields);
                existing.metadata.last_seen =
                    existing.metadata.last_seen.max(incoming.metadata.last_seen);
                existing.metadata.is_business =
                    existing.metadata.is_business || incoming.metadata.is_business;
                Applied::Updated
            }
        }
    }

    fn finish(&self, operation: SyncOperation, report: SyncReport) -> SyncReport {
        tracing::debug!(
            operation = operation.name(),
            added = report.added,
            updated = report.updated,
            deleted = report.deleted,
            duplicates = report.duplicates,
            conflicts = report.conflicts,
            errors = report.errors.len(),
            "sync finished"
        );
        self.emitter
            .emit_or_log(Event::Contact(ContactEvent::SyncCompleted {
                operation: operation.name().to_string(),
                added: report.added,
                updated: report.updated,
                deleted: report.deleted,
                duplicates: report.duplicates,
                conflicts: report.conflicts,
                errors: report.errors.len(),
            }));
        report
    }
}
