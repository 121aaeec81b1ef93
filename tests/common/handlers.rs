use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use relaygraph::graph::{NodeContext, NodeError, NodeHandler, NodeInput, NodePayload};
use relaygraph::realtime::OutboundEvent;
use relaygraph::transport::{ConnectionHandle, TransportError};

/// Succeeds immediately with an empty snapshot payload.
pub struct NoopHandler;

#[async_trait]
impl NodeHandler for NoopHandler {
    async fn run(&self, _input: NodeInput, _ctx: NodeContext) -> Result<NodePayload, NodeError> {
        Ok(NodePayload::Snapshot(serde_json::json!({})))
    }
}

/// Extracts the webhook's messages, the canonical receiver behavior.
pub struct ExtractHandler;

#[async_trait]
impl NodeHandler for ExtractHandler {
    async fn run(&self, input: NodeInput, _ctx: NodeContext) -> Result<NodePayload, NodeError> {
        Ok(NodePayload::Messages(
            input.event.messages().cloned().collect(),
        ))
    }
}

/// Fails every attempt.
pub struct AlwaysFailHandler;

#[async_trait]
impl NodeHandler for AlwaysFailHandler {
    async fn run(&self, _input: NodeInput, _ctx: NodeContext) -> Result<NodePayload, NodeError> {
        Err(NodeError::other("induced failure"))
    }
}

/// Fails the first `failures` attempts, then succeeds; counts attempts.
pub struct FlakyHandler {
    pub failures: u32,
    pub attempts: Arc<AtomicU32>,
}

impl FlakyHandler {
    pub fn new(failures: u32) -> (Self, Arc<AtomicU32>) {
        let attempts = Arc::new(AtomicU32::new(0));
        (
            Self {
                failures,
                attempts: attempts.clone(),
            },
            attempts,
        )
    }
}

#[async_trait]
impl NodeHandler for FlakyHandler {
    async fn run(&self, _input: NodeInput, _ctx: NodeContext) -> Result<NodePayload, NodeError> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        if attempt <= self.failures {
            Err(NodeError::other(format!("flaky attempt {attempt}")))
        } else {
            Ok(NodePayload::Snapshot(serde_json::json!({ "attempt": attempt })))
        }
    }
}

/// Sleeps longer than any sane timeout; used to trigger timeout failures.
pub struct SlowHandler {
    pub delay: Duration,
}

#[async_trait]
impl NodeHandler for SlowHandler {
    async fn run(&self, _input: NodeInput, _ctx: NodeContext) -> Result<NodePayload, NodeError> {
        tokio::time::sleep(self.delay).await;
        Ok(NodePayload::Snapshot(serde_json::json!({"slow": true})))
    }
}

/// Records every attempt count; always succeeds.
pub struct CountingHandler {
    pub runs: Arc<AtomicU32>,
}

impl CountingHandler {
    pub fn new() -> (Self, Arc<AtomicU32>) {
        let runs = Arc::new(AtomicU32::new(0));
        (Self { runs: runs.clone() }, runs)
    }
}

#[async_trait]
impl NodeHandler for CountingHandler {
    async fn run(&self, _input: NodeInput, _ctx: NodeContext) -> Result<NodePayload, NodeError> {
        let run = self.runs.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(NodePayload::Snapshot(serde_json::json!({ "run": run })))
    }
}

/// Test double for a live client connection; records delivered events.
pub struct RecordingConnection {
    pub id: String,
    pub delivered: std::sync::Mutex<Vec<OutboundEvent>>,
}

impl RecordingConnection {
    pub fn new(id: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            id: id.into(),
            delivered: std::sync::Mutex::new(Vec::new()),
        })
    }

    pub fn delivered_names(&self) -> Vec<String> {
        self.delivered
            .lock()
            .unwrap()
            .iter()
            .map(|event| event.name.clone())
            .collect()
    }
}

#[async_trait]
impl ConnectionHandle for RecordingConnection {
    fn connection_id(&self) -> &str {
        &self.id
    }

    async fn deliver(&self, event: &OutboundEvent) -> Result<(), TransportError> {
        self.delivered.lock().unwrap().push(event.clone());
        Ok(())
    }
}
