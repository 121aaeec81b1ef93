mod common;

use std::sync::{Arc, Mutex};
use std::sync::atomic::Ordering;
use std::time::Duration;

use async_trait::async_trait;

use common::*;
use relaygraph::config::EngineConfig;
use relaygraph::graph::{
    EdgeSpec, FailureReason, GraphError, NodeContext, NodeError, NodeHandler, NodeInput,
    NodePayload, NodeSpec, OperationalGraph, RateLimit,
};
use relaygraph::types::{NodeId, NodeStatus, NodeType};

fn graph() -> OperationalGraph {
    OperationalGraph::new(EngineConfig::default())
}

/// Captures the input its node received, for asserting edge transforms.
struct CaptureHandler {
    seen: Arc<Mutex<Option<NodeInput>>>,
}

impl CaptureHandler {
    fn new() -> (Self, Arc<Mutex<Option<NodeInput>>>) {
        let seen = Arc::new(Mutex::new(None));
        (Self { seen: seen.clone() }, seen)
    }
}

#[async_trait]
impl NodeHandler for CaptureHandler {
    async fn run(&self, input: NodeInput, _ctx: NodeContext) -> Result<NodePayload, NodeError> {
        *self.seen.lock().unwrap() = Some(input.clone());
        Ok(NodePayload::Snapshot(serde_json::json!({})))
    }
}

#[test]
fn duplicate_node_is_rejected() {
    let graph = graph();
    graph
        .add_node(NodeSpec::new("receiver", NodeType::Receiver, NoopHandler))
        .unwrap();
    let err = graph
        .add_node(NodeSpec::new("receiver", NodeType::Receiver, NoopHandler))
        .unwrap_err();
    assert!(matches!(err, GraphError::DuplicateNode { .. }));
}

#[test]
fn edge_endpoints_must_exist() {
    let graph = graph();
    graph
        .add_node(NodeSpec::new("receiver", NodeType::Receiver, NoopHandler))
        .unwrap();
    let err = graph
        .add_edge(EdgeSpec::data_flow("receiver", "ghost"))
        .unwrap_err();
    assert!(matches!(err, GraphError::NotFound { what: "node", .. }));
}

#[test]
fn removing_a_node_cascades_its_edges() {
    let graph = graph();
    graph
        .add_node(NodeSpec::new("a", NodeType::Receiver, NoopHandler))
        .unwrap();
    graph
        .add_node(NodeSpec::new("b", NodeType::Validator, NoopHandler))
        .unwrap();
    let edge = graph.add_edge(EdgeSpec::data_flow("a", "b")).unwrap();

    graph.remove_node(&NodeId::from("b")).unwrap();
    assert_eq!(graph.stats().edge_count, 0);
    assert!(matches!(
        graph.remove_edge(&edge).unwrap_err(),
        GraphError::NotFound { what: "edge", .. }
    ));
    assert!(matches!(
        graph.remove_node(&NodeId::from("b")).unwrap_err(),
        GraphError::NotFound { what: "node", .. }
    ));
}

#[tokio::test(start_paused = true)]
async fn linear_pipeline_completes_and_resets() {
    let graph = graph();
    graph
        .add_node(NodeSpec::new("receiver", NodeType::Receiver, ExtractHandler))
        .unwrap();
    graph
        .add_node(
            NodeSpec::new("validator", NodeType::Validator, NoopHandler)
                .with_dependencies(vec!["receiver".into()]),
        )
        .unwrap();
    graph
        .add_edge(EdgeSpec::data_flow("receiver", "validator"))
        .unwrap();

    let result = graph.execute(text_event("m1", "hello")).await.unwrap();

    assert!(result.is_success());
    assert_eq!(
        result.completed,
        vec![NodeId::from("receiver"), NodeId::from("validator")]
    );
    let output = result.output(&NodeId::from("receiver")).unwrap();
    assert_eq!(output.as_messages().unwrap().len(), 1);

    // Completed nodes reset to idle for the next event.
    assert_eq!(
        graph.node_status(&NodeId::from("receiver")),
        Some(NodeStatus::Idle)
    );
    assert_eq!(graph.stats().executions, 1);
}

#[tokio::test(start_paused = true)]
async fn flaky_node_recovers_within_retry_budget() {
    let graph = graph();
    let (handler, attempts) = FlakyHandler::new(2);
    graph
        .add_node(
            NodeSpec::new("receiver", NodeType::Receiver, handler).with_max_retries(3),
        )
        .unwrap();

    let result = graph.execute(text_event("m1", "hello")).await.unwrap();

    assert!(result.is_success());
    assert_eq!(attempts.load(Ordering::SeqCst), 3);
    // The two retries waited 2s then 4s on the paused clock.
    assert!(result.duration >= Duration::from_millis(6000));
}

#[tokio::test(start_paused = true)]
async fn exhausted_node_fails_and_cascades() {
    let graph = graph();
    let (never_runs, runs) = CountingHandler::new();
    graph
        .add_node(
            NodeSpec::new("receiver", NodeType::Receiver, AlwaysFailHandler)
                .with_max_retries(3),
        )
        .unwrap();
    graph
        .add_node(
            NodeSpec::new("validator", NodeType::Validator, NoopHandler)
                .with_dependencies(vec!["receiver".into()]),
        )
        .unwrap();
    graph
        .add_node(
            NodeSpec::new("sender", NodeType::Sender, never_runs)
                .with_dependencies(vec!["validator".into()]),
        )
        .unwrap();
    graph
        .add_edge(EdgeSpec::data_flow("receiver", "validator"))
        .unwrap();
    graph
        .add_edge(EdgeSpec::data_flow("validator", "sender"))
        .unwrap();

    let result = graph.execute(text_event("m1", "hello")).await.unwrap();

    assert!(result.completed.is_empty());
    assert_eq!(result.failed.len(), 3);

    let root = &result.failed[&NodeId::from("receiver")];
    assert_eq!(root.attempts, 4);
    assert!(matches!(root.reason, FailureReason::Handler(_)));
    // Backoff schedule on the paused clock: 2s + 4s + 8s.
    assert!(result.duration >= Duration::from_millis(14_000));

    for id in ["validator", "sender"] {
        let failure = &result.failed[&NodeId::from(id)];
        assert!(
            matches!(&failure.reason, FailureReason::Cascaded { dependency } if dependency == &NodeId::from("receiver"))
        );
        assert_eq!(failure.attempts, 0);
    }
    // Cascaded dependents were never executed.
    assert_eq!(runs.load(Ordering::SeqCst), 0);

    // Failed nodes are left for inspection; reset clears them.
    assert_eq!(
        graph.node_status(&NodeId::from("receiver")),
        Some(NodeStatus::Failed)
    );
    graph.reset_failed();
    assert_eq!(
        graph.node_status(&NodeId::from("receiver")),
        Some(NodeStatus::Idle)
    );
}

#[tokio::test(start_paused = true)]
async fn handler_timeout_fails_the_node() {
    let graph = graph();
    graph
        .add_node(
            NodeSpec::new(
                "receiver",
                NodeType::Receiver,
                SlowHandler {
                    delay: Duration::from_secs(120),
                },
            )
            .with_timeout(Duration::from_millis(50))
            .with_max_retries(0),
        )
        .unwrap();

    let result = graph.execute(text_event("m1", "hello")).await.unwrap();

    let failure = &result.failed[&NodeId::from("receiver")];
    assert!(matches!(
        failure.reason,
        FailureReason::Timeout { after_ms: 50 }
    ));
}

#[tokio::test(start_paused = true)]
async fn rate_limited_node_is_deferred_not_failed() {
    let graph = graph();
    graph
        .add_node(
            NodeSpec::new("receiver", NodeType::Receiver, NoopHandler)
                .with_rate_limit(RateLimit::per_ms(5, 1000)),
        )
        .unwrap();

    // Five passes fit the window; the sixth defers until the window
    // resets, then succeeds.
    for i in 0..6 {
        let result = graph
            .execute(text_event(&format!("m{i}"), "hello"))
            .await
            .unwrap();
        assert!(result.is_success(), "pass {i} should succeed");
    }
    assert_eq!(graph.stats().executions, 6);
}

#[tokio::test(start_paused = true)]
async fn guard_skips_edge_and_transform_rewrites_payload() {
    let graph = graph();
    let (capture, seen) = CaptureHandler::new();
    let (skipped, skipped_runs) = CountingHandler::new();

    graph
        .add_node(NodeSpec::new("receiver", NodeType::Receiver, ExtractHandler))
        .unwrap();
    graph
        .add_node(
            NodeSpec::new("capture", NodeType::StateStore, capture)
                .with_dependencies(vec!["receiver".into()]),
        )
        .unwrap();
    graph
        .add_node(NodeSpec::new("skipped", NodeType::Emitter, skipped))
        .unwrap();

    graph
        .add_edge(
            EdgeSpec::data_flow("receiver", "capture").with_transform(|payload| {
                let count = payload.as_messages().map_or(0, <[_]>::len);
                NodePayload::Snapshot(serde_json::json!({ "message_count": count }))
            }),
        )
        .unwrap();
    graph
        .add_edge(EdgeSpec::control_flow("receiver", "skipped").with_guard(|_| false))
        .unwrap();

    let result = graph.execute(text_event("m1", "hello")).await.unwrap();
    assert!(result.is_success());

    let seen = seen.lock().unwrap().clone().unwrap();
    let (source, payload) = &seen.upstream[0];
    assert_eq!(source, &NodeId::from("receiver"));
    assert_eq!(
        payload,
        &NodePayload::Snapshot(serde_json::json!({ "message_count": 1 }))
    );

    // The guarded edge never queued its target.
    assert_eq!(skipped_runs.load(Ordering::SeqCst), 0);
    assert!(!result.completed.contains(&NodeId::from("skipped")));
}

#[tokio::test(start_paused = true)]
async fn fan_in_waits_for_every_dependency() {
    let graph = graph();
    let (capture, seen) = CaptureHandler::new();

    graph
        .add_node(NodeSpec::new("rx_a", NodeType::Receiver, ExtractHandler))
        .unwrap();
    graph
        .add_node(NodeSpec::new("rx_b", NodeType::Receiver, ExtractHandler))
        .unwrap();
    graph
        .add_node(
            NodeSpec::new("merge", NodeType::StateStore, capture)
                .with_dependencies(vec!["rx_a".into(), "rx_b".into()]),
        )
        .unwrap();
    graph.add_edge(EdgeSpec::data_flow("rx_a", "merge")).unwrap();
    graph.add_edge(EdgeSpec::data_flow("rx_b", "merge")).unwrap();

    let result = graph.execute(text_event("m1", "hello")).await.unwrap();
    assert!(result.is_success());

    let seen = seen.lock().unwrap().clone().unwrap();
    assert_eq!(seen.upstream.len(), 2);
    assert_eq!(result.completed.last(), Some(&NodeId::from("merge")));
}

#[tokio::test(start_paused = true)]
async fn stats_track_statuses_and_types() {
    let graph = graph();
    graph
        .add_node(NodeSpec::new("receiver", NodeType::Receiver, NoopHandler))
        .unwrap();
    graph
        .add_node(
            NodeSpec::new("sender", NodeType::Sender, AlwaysFailHandler)
                .with_dependencies(vec!["receiver".into()])
                .with_max_retries(0),
        )
        .unwrap();
    graph
        .add_edge(EdgeSpec::control_flow("receiver", "sender"))
        .unwrap();

    graph.execute(text_event("m1", "hello")).await.unwrap();

    let stats = graph.stats();
    assert_eq!(stats.node_count, 2);
    assert_eq!(stats.edge_count, 1);
    assert_eq!(stats.status_counts[&NodeStatus::Idle], 1);
    assert_eq!(stats.status_counts[&NodeStatus::Failed], 1);
    assert_eq!(stats.type_counts[&NodeType::Receiver], 1);
    assert!(stats.total_failures >= 1);
}
