use std::time::Duration;

use relaygraph::contacts::{Contact, ContactSyncManager, SyncConfig};
use relaygraph::event_bus::{ContactEvent, Event, EventBus, EventEmitter, MemorySink};

#[tokio::test(start_paused = true)]
async fn auto_sync_applies_queued_updates() {
    let manager = ContactSyncManager::new(
        SyncConfig {
            auto_sync_interval: Duration::from_secs(60),
            ..Default::default()
        },
        EventEmitter::disconnected(),
    );

    manager.queue_update(Contact::new("15551234567", "Ada"));
    manager.start_auto_sync();
    assert!(manager.contact("15551234567").is_none());

    // Let one interval elapse on the paused clock.
    tokio::time::sleep(Duration::from_secs(61)).await;
    assert_eq!(manager.contact("15551234567").unwrap().name, "Ada");

    manager.stop_auto_sync().await;
}

#[tokio::test(start_paused = true)]
async fn stop_auto_sync_prevents_future_ticks() {
    let manager = ContactSyncManager::new(
        SyncConfig {
            auto_sync_interval: Duration::from_secs(60),
            ..Default::default()
        },
        EventEmitter::disconnected(),
    );

    manager.start_auto_sync();
    manager.stop_auto_sync().await;

    manager.queue_update(Contact::new("15551234567", "Ada"));
    tokio::time::sleep(Duration::from_secs(120)).await;
    assert!(manager.contact("15551234567").is_none(), "tick fired after stop");

    // Stopping twice is harmless.
    manager.stop_auto_sync().await;
}

#[tokio::test]
async fn sync_lifecycle_is_published_on_the_bus() {
    let sink = MemorySink::new();
    let bus = EventBus::with_sink(sink.clone());
    bus.listen_for_events();

    let manager = ContactSyncManager::new(SyncConfig::default(), bus.emitter());
    manager.incremental_sync(vec![
        Contact::new("15551234567", "Ada"),
        Contact::new("15559876543", "Grace"),
    ]);
    manager.full_sync(vec![Contact::new("15551234567", "Ada")]);
    bus.stop_listener().await;

    let events = sink.snapshot();
    let added = events
        .iter()
        .filter(|event| matches!(event, Event::Contact(ContactEvent::ContactAdded { .. })))
        .count();
    assert_eq!(added, 2);

    assert!(events.iter().any(|event| matches!(
        event,
        Event::Contact(ContactEvent::ContactDeleted { phone }) if phone == "15559876543"
    )));
    assert!(events.iter().any(|event| matches!(
        event,
        Event::Contact(ContactEvent::SyncCompleted { operation, deleted: 1, .. })
            if operation == "full_sync"
    )));
}
