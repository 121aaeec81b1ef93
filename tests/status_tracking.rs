mod common;

use chrono::{TimeDelta, Utc};

use common::*;
use relaygraph::event_bus::{Event, EventBus, MemorySink, StatusEvent};
use relaygraph::message::DeliveryStatus;
use relaygraph::status::{StatusTracker, StatusTrackerConfig, StatusUpdate};
use relaygraph::webhook::WebhookEvent;

#[test]
fn webhook_statuses_build_history_and_metrics() {
    let tracker = StatusTracker::default();
    let t0 = Utc::now();

    let applied = tracker.process_status_update(&status_sequence_event("m1", t0));
    assert_eq!(applied, 3);

    let history = tracker.history("m1").unwrap();
    assert_eq!(history.entries().len(), 3);
    assert_eq!(history.final_status(), Some(DeliveryStatus::Read));

    let metrics = tracker.delivery_metrics("m1").unwrap();
    assert_eq!(metrics.delivery_time_ms, Some(200));
    assert_eq!(metrics.read_time_ms, Some(500));

    let analytics = tracker.analytics();
    assert_eq!(analytics.sent, 1);
    assert_eq!(analytics.delivery_rate, 100.0);
    assert_eq!(analytics.read_rate, 100.0);
    assert_eq!(analytics.failure_rate, 0.0);
}

#[test]
fn empty_payload_applies_nothing() {
    let tracker = StatusTracker::default();
    assert_eq!(tracker.process_status_update(&WebhookEvent::default()), 0);
    assert!(tracker.history("m1").is_none());
}

#[tokio::test]
async fn failed_updates_emit_retry_then_ceiling() {
    let sink = MemorySink::new();
    let bus = EventBus::with_sink(sink.clone());
    bus.listen_for_events();

    let tracker = StatusTracker::new(
        StatusTrackerConfig {
            history_cap: 50,
            max_retries: 2,
        },
        bus.emitter(),
    );

    let t0 = Utc::now();
    for i in 0..3 {
        tracker.record(
            "m1",
            StatusUpdate {
                status: DeliveryStatus::Failed,
                timestamp: t0 + TimeDelta::milliseconds(i),
                recipient_id: None,
                error: Some("provider 500".to_string()),
            },
        );
    }
    bus.stop_listener().await;

    let events = sink.snapshot();
    let retries: Vec<u32> = events
        .iter()
        .filter_map(|event| match event {
            Event::Status(StatusEvent::RetryRequested { attempt, .. }) => Some(*attempt),
            _ => None,
        })
        .collect();
    assert_eq!(retries, vec![1, 2]);

    assert!(events.iter().any(|event| matches!(
        event,
        Event::Status(StatusEvent::MaxRetriesExceeded { attempts: 3, .. })
    )));
}

#[test]
fn analytics_are_monotonic_until_reset() {
    let tracker = StatusTracker::default();
    let t0 = Utc::now();

    tracker.record(
        "m1",
        StatusUpdate {
            status: DeliveryStatus::Sent,
            timestamp: t0,
            recipient_id: None,
            error: None,
        },
    );
    tracker.record(
        "m2",
        StatusUpdate {
            status: DeliveryStatus::Sent,
            timestamp: t0,
            recipient_id: None,
            error: None,
        },
    );
    tracker.record(
        "m1",
        StatusUpdate {
            status: DeliveryStatus::Delivered,
            timestamp: t0 + TimeDelta::milliseconds(50),
            recipient_id: None,
            error: None,
        },
    );

    let analytics = tracker.analytics();
    assert_eq!(analytics.sent, 2);
    assert_eq!(analytics.delivered, 1);
    assert_eq!(analytics.delivery_rate, 50.0);

    tracker.reset();
    let cleared = tracker.analytics();
    assert_eq!(cleared.sent, 0);
    assert_eq!(cleared.delivery_rate, 0.0);
    assert!(tracker.history("m1").is_none());
}
