use relaygraph::message::{Message, MessageType};
use relaygraph::router::MessageRouter;
use relaygraph::types::{NodeId, Priority, RouteKind};
use relaygraph::webhook::WebhookEvent;

#[test]
fn webhook_messages_are_classified_independently() {
    let router = MessageRouter::default();
    let event = WebhookEvent::from_messages(vec![
        Message::text("m1", "15551234567", "15557654321", "hello"),
        Message::text("m2", "12025550143@g.us", "15557654321", "hi all"),
        Message::media(
            "m3",
            "15551234567",
            "15557654321",
            MessageType::Image,
            "https://cdn.example/photo.jpg",
            "image/jpeg",
        ),
    ]);

    let decisions = router.route(&event);
    assert_eq!(decisions.len(), 3);
    assert_eq!(decisions[0].route, RouteKind::DirectSend);
    assert_eq!(decisions[1].route, RouteKind::GroupSend);
    assert_eq!(decisions[2].route, RouteKind::MediaMessage);

    // Every path starts at the receiver and ends at the emitter.
    for decision in &decisions {
        assert_eq!(decision.node_path.first(), Some(&NodeId::from("receiver")));
        assert_eq!(decision.node_path.last(), Some(&NodeId::from("emitter")));
        assert!(decision.estimated_latency.as_millis() > 0);
    }

    let stats = router.stats();
    assert_eq!(stats.routed, 3);
    assert_eq!(stats.by_route[&RouteKind::GroupSend], 1);
}

#[test]
fn catch_all_is_normal_direct_send() {
    let router = MessageRouter::default();
    let msg = Message::text("m1", "15551234567", "15557654321", "plain");
    let decision = router.route_message(&msg);
    assert_eq!(decision.route, RouteKind::DirectSend);
    assert_eq!(decision.priority, Priority::Normal);
    assert!(!decision.requires_retry);
}

#[test]
fn media_and_group_routes_request_retry_staging() {
    let router = MessageRouter::default();
    let image = Message::media(
        "m1",
        "15551234567",
        "15557654321",
        MessageType::Image,
        "https://cdn.example/a.jpg",
        "image/jpeg",
    );
    assert!(router.route_message(&image).requires_retry);

    let group = Message::text("m2", "12025550143@g.us", "x", "hi");
    assert!(router.route_message(&group).requires_retry);
}

#[test]
fn reply_threads_and_forward_counts_are_recorded() {
    let router = MessageRouter::default();
    router.route_message(&Message::text("root", "a", "b", "first"));
    router.route_message(&Message::text("r1", "b", "a", "reply one").with_reply_to("root"));
    router.route_message(&Message::text("r2", "b", "a", "reply two").with_reply_to("root"));
    router.route_message(&Message::text("fwd", "a", "c", "look").with_forward_count(4));

    assert_eq!(router.thread_replies("root"), vec!["r1", "r2"]);
    assert_eq!(router.forward_count("fwd"), 4);
    assert_eq!(router.forward_count("root"), 0);
}

#[test]
fn routing_context_is_cached_per_message() {
    let router = MessageRouter::default();
    let msg = Message::text("m1", "12025550143@g.us", "15557654321", "hi");
    let decision = router.route_message(&msg);

    let context = router.context("m1").unwrap();
    assert_eq!(context.decision, decision);
    assert!(context.is_group);
    assert_eq!(context.message_type, MessageType::Text);
    assert!(router.context("unknown").is_none());
}

#[test]
fn validation_issues_are_collected_not_thrown() {
    let router = MessageRouter::default();

    let mut bad_media = Message::media(
        "m1",
        "15551234567",
        "15557654321",
        MessageType::Video,
        "",
        "",
    );
    bad_media.media_url = None;
    bad_media.media_mime_type = None;
    let issues = router.validate_message(&bad_media);
    let fields: Vec<&str> = issues.iter().map(|issue| issue.field).collect();
    assert!(fields.contains(&"media_url"));
    assert!(fields.contains(&"media_mime_type"));

    let empty_text = Message::text("m2", "15551234567", "15557654321", "   ");
    let issues = router.validate_message(&empty_text);
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].field, "content");

    let fine = Message::text("m3", "15551234567", "15557654321", "hello");
    assert!(router.validate_message(&fine).is_empty());
}

#[test]
fn contact_cards_route_to_the_sync_pipeline() {
    let router = MessageRouter::default();
    let mut card = Message::text("m1", "15551234567", "15557654321", "BEGIN:VCARD…");
    card.message_type = MessageType::Contact;

    let decision = router.route_message(&card);
    assert_eq!(decision.route, RouteKind::ContactUpdate);
    assert!(decision.node_path.contains(&NodeId::from("contact_sync")));
    assert!(decision.node_path.contains(&NodeId::from("state_store")));
}
