//! The operational graph execution engine.
//!
//! [`OperationalGraph`] owns the node/edge registries and runs one inbound
//! webhook event per [`execute`](OperationalGraph::execute) pass: receiver
//! nodes seed a work queue, dependents are queued as their inputs complete,
//! and every node runs under a hard timeout with fixed-window rate limiting
//! and exponential-backoff retries. A node that exhausts its retries fails
//! and drags every transitive dependent down with it, without executing
//! them.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use rustc_hash::{FxHashMap, FxHashSet};
use tokio::time::Instant;
use tracing::instrument;

use super::edge::{EdgeId, EdgeKind, EdgeSpec, GraphEdge};
use super::error::{FailureReason, GraphError, NodeFailure};
use super::node::{NodeContext, NodeError, NodeInput, NodePayload, NodeSpec};
use super::rate_limit::{RateLimit, RateLimiter};
use super::validation::{ValidationReport, connected_nodes, ensure_acyclic, find_cycle};
use crate::config::EngineConfig;
use crate::event_bus::{Event, EventEmitter, GraphEvent, GraphEventKind};
use crate::types::{NodeId, NodeStatus, NodeType};
use crate::webhook::WebhookEvent;

/// Per-run record of one `execute` pass.
///
/// Created per invocation and discarded after return; callers persist it
/// themselves if they need history.
#[derive(Clone, Debug, Default)]
pub struct ExecutionResult {
    /// Short random identifier for this pass, echoed in lifecycle events.
    pub run_id: String,
    /// Nodes that completed, in completion order.
    pub completed: Vec<NodeId>,
    /// Failed nodes with their failure records (handler exhaustion,
    /// timeout, or cascade).
    pub failed: FxHashMap<NodeId, NodeFailure>,
    /// Output payload per completed node.
    pub outputs: FxHashMap<NodeId, NodePayload>,
    /// Wall-clock duration of the pass.
    pub duration: Duration,
}

impl ExecutionResult {
    /// True when no node failed during the pass.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    /// Output of a specific node, if it completed.
    pub fn output(&self, node_id: &NodeId) -> Option<&NodePayload> {
        self.outputs.get(node_id)
    }
}

/// Aggregate registry statistics, exposed for dashboards and tests.
#[derive(Clone, Debug, Default)]
pub struct GraphStats {
    pub node_count: usize,
    pub edge_count: usize,
    pub status_counts: FxHashMap<NodeStatus, usize>,
    pub type_counts: FxHashMap<NodeType, usize>,
    pub executions: u64,
    pub total_failures: u64,
}

struct NodeState {
    node_type: NodeType,
    dependencies: Vec<NodeId>,
    handler: std::sync::Arc<dyn super::node::NodeHandler>,
    error_hook: Option<std::sync::Arc<dyn super::node::ErrorHook>>,
    max_retries: u32,
    timeout: Duration,
    rate_limit: Option<RateLimit>,
    status: NodeStatus,
    retry_count: u32,
    failure_count: u64,
    last_error: Option<String>,
}

#[derive(Default)]
struct Inner {
    nodes: FxHashMap<NodeId, NodeState>,
    edges: Vec<GraphEdge>,
}

impl Inner {
    /// Forward adjacency combining declared dependencies (dep -> node) and
    /// registered edges (from -> to). Used for cycle checks and cascades.
    fn combined_adjacency(&self) -> FxHashMap<NodeId, Vec<NodeId>> {
        let mut adjacency: FxHashMap<NodeId, Vec<NodeId>> = FxHashMap::default();
        for (id, state) in &self.nodes {
            for dep in &state.dependencies {
                adjacency.entry(dep.clone()).or_default().push(id.clone());
            }
        }
        for edge in &self.edges {
            adjacency
                .entry(edge.from.clone())
                .or_default()
                .push(edge.to.clone());
        }
        adjacency
    }
}

/// Dependency-resolving execution engine for one messaging pipeline.
///
/// All registries are guarded by whole-map mutexes: cascading failure and
/// input merging are multi-key updates that must be atomic, so there is no
/// per-key locking anywhere. `execute` passes are serialized by an async
/// lock; background components only touch their own maps.
///
/// # Examples
///
/// ```rust,no_run
/// use relaygraph::config::EngineConfig;
/// use relaygraph::graph::{EdgeSpec, NodeSpec, OperationalGraph};
/// use relaygraph::types::NodeType;
/// use relaygraph::webhook::WebhookEvent;
/// # use relaygraph::graph::{NodeContext, NodeError, NodeHandler, NodeInput, NodePayload};
/// # struct Extract;
/// # #[async_trait::async_trait]
/// # impl NodeHandler for Extract {
/// #     async fn run(&self, input: NodeInput, _: NodeContext) -> Result<NodePayload, NodeError> {
/// #         Ok(NodePayload::Messages(input.event.messages().cloned().collect()))
/// #     }
/// # }
///
/// # async fn example(event: WebhookEvent) -> Result<(), Box<dyn std::error::Error>> {
/// let graph = OperationalGraph::new(EngineConfig::default());
/// graph.add_node(NodeSpec::new("receiver", NodeType::Receiver, Extract))?;
/// graph.add_node(
///     NodeSpec::new("validator", NodeType::Validator, Extract)
///         .with_dependencies(vec!["receiver".into()]),
/// )?;
/// graph.add_edge(EdgeSpec::data_flow("receiver", "validator"))?;
///
/// let result = graph.execute(event).await?;
/// assert!(result.is_success());
/// # Ok(())
/// # }
/// ```
pub struct OperationalGraph {
    inner: Mutex<Inner>,
    limiter: Mutex<RateLimiter>,
    emitter: EventEmitter,
    config: EngineConfig,
    /// Serializes `execute` passes: one logical worker at a time.
    pass_lock: tokio::sync::Mutex<()>,
    executions: AtomicU64,
    total_failures: AtomicU64,
}

impl OperationalGraph {
    /// Create an engine that emits lifecycle events nowhere.
    pub fn new(config: EngineConfig) -> Self {
        Self::with_emitter(config, EventEmitter::disconnected())
    }

    /// Create an engine wired to an event bus.
    pub fn with_emitter(config: EngineConfig, emitter: EventEmitter) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            limiter: Mutex::new(RateLimiter::default()),
            emitter,
            config,
            pass_lock: tokio::sync::Mutex::new(()),
            executions: AtomicU64::new(0),
            total_failures: AtomicU64::new(0),
        }
    }

    /// Register a node. Fails with [`GraphError::DuplicateNode`] when the id
    /// is taken; otherwise the node starts `idle` with zeroed counters.
    pub fn add_node(&self, spec: NodeSpec) -> Result<(), GraphError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.nodes.contains_key(&spec.id) {
            return Err(GraphError::DuplicateNode { id: spec.id });
        }
        tracing::debug!(node = %spec.id, node_type = %spec.node_type, "node registered");
        inner.nodes.insert(
            spec.id,
            NodeState {
                node_type: spec.node_type,
                dependencies: spec.dependencies,
                handler: spec.handler,
                error_hook: spec.error_hook,
                max_retries: spec.max_retries.unwrap_or(self.config.default_max_retries),
                timeout: spec.timeout.unwrap_or(self.config.default_timeout),
                rate_limit: spec.rate_limit.or(self.config.default_rate_limit),
                status: NodeStatus::Idle,
                retry_count: 0,
                failure_count: 0,
                last_error: None,
            },
        );
        Ok(())
    }

    /// Remove a node and every edge touching it.
    pub fn remove_node(&self, id: &NodeId) -> Result<(), GraphError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.nodes.remove(id).is_none() {
            return Err(GraphError::NotFound {
                what: "node",
                id: id.to_string(),
            });
        }
        inner.edges.retain(|edge| edge.from != *id && edge.to != *id);
        self.limiter.lock().unwrap().forget(id);
        tracing::debug!(node = %id, "node removed");
        Ok(())
    }

    /// Register an edge between two existing nodes and return its id.
    pub fn add_edge(&self, spec: EdgeSpec) -> Result<EdgeId, GraphError> {
        let mut inner = self.inner.lock().unwrap();
        for endpoint in [&spec.from, &spec.to] {
            if !inner.nodes.contains_key(endpoint) {
                return Err(GraphError::NotFound {
                    what: "node",
                    id: endpoint.to_string(),
                });
            }
        }
        let edge = GraphEdge::from_spec(spec);
        let id = edge.id.clone();
        inner.edges.push(edge);
        Ok(id)
    }

    /// Remove an edge by id.
    pub fn remove_edge(&self, id: &EdgeId) -> Result<(), GraphError> {
        let mut inner = self.inner.lock().unwrap();
        let before = inner.edges.len();
        inner.edges.retain(|edge| edge.id != *id);
        if inner.edges.len() == before {
            return Err(GraphError::NotFound {
                what: "edge",
                id: id.to_string(),
            });
        }
        Ok(())
    }

    /// Current status of a node.
    pub fn node_status(&self, id: &NodeId) -> Option<NodeStatus> {
        self.inner.lock().unwrap().nodes.get(id).map(|n| n.status)
    }

    /// Last recorded handler error for a node, if any.
    pub fn node_last_error(&self, id: &NodeId) -> Option<String> {
        self.inner
            .lock()
            .unwrap()
            .nodes
            .get(id)
            .and_then(|n| n.last_error.clone())
    }

    /// Reset every failed node back to idle with a zeroed retry counter.
    pub fn reset_failed(&self) {
        let mut inner = self.inner.lock().unwrap();
        for state in inner.nodes.values_mut() {
            if state.status == NodeStatus::Failed {
                state.status = NodeStatus::Idle;
                state.retry_count = 0;
                state.last_error = None;
            }
        }
    }

    /// Structural validation: cycles, edges referencing missing nodes,
    /// dependencies referencing missing nodes, and orphaned non-receiver
    /// nodes with no edges at all.
    pub fn validate(&self) -> ValidationReport {
        let inner = self.inner.lock().unwrap();
        let mut report = ValidationReport::default();

        if let Some(cycle) = find_cycle(&inner.combined_adjacency()) {
            report.cycles.push(cycle);
        }

        for edge in &inner.edges {
            for endpoint in [&edge.from, &edge.to] {
                if !inner.nodes.contains_key(endpoint) {
                    report
                        .dangling_edges
                        .push((edge.id.to_string(), endpoint.clone()));
                }
            }
        }

        for (id, state) in &inner.nodes {
            for dep in &state.dependencies {
                if !inner.nodes.contains_key(dep) {
                    report.missing_dependencies.push((id.clone(), dep.clone()));
                }
            }
        }

        let connected = connected_nodes(inner.edges.iter().map(|e| (&e.from, &e.to)));
        let mut orphans: Vec<NodeId> = inner
            .nodes
            .iter()
            .filter(|(id, state)| !state.node_type.is_receiver() && !connected.contains(id))
            .map(|(id, _)| id.clone())
            .collect();
        orphans.sort();
        report.orphans = orphans;

        report
    }

    /// Registry statistics.
    pub fn stats(&self) -> GraphStats {
        let inner = self.inner.lock().unwrap();
        let mut stats = GraphStats {
            node_count: inner.nodes.len(),
            edge_count: inner.edges.len(),
            executions: self.executions.load(Ordering::Relaxed),
            total_failures: self.total_failures.load(Ordering::Relaxed),
            ..Default::default()
        };
        for state in inner.nodes.values() {
            *stats.status_counts.entry(state.status).or_insert(0) += 1;
            *stats.type_counts.entry(state.node_type).or_insert(0) += 1;
        }
        stats
    }

    /// Run one pass over the graph for one inbound event.
    ///
    /// The pass fails up front with [`GraphError::CircularDependency`] if the
    /// combined dependency/edge graph is cyclic; otherwise it always returns
    /// an [`ExecutionResult`]: node failures are recorded per node and never
    /// abort sibling branches.
    #[instrument(skip(self, event), fields(messages = event.messages().count()))]
    pub async fn execute(&self, event: WebhookEvent) -> Result<ExecutionResult, GraphError> {
        let _pass = self.pass_lock.lock().await;
        let started = Instant::now();

        {
            let inner = self.inner.lock().unwrap();
            ensure_acyclic(&inner.combined_adjacency())?;
        }

        let event = std::sync::Arc::new(event);
        let mut result = ExecutionResult {
            run_id: generate_run_id(),
            ..Default::default()
        };
        tracing::debug!(run_id = %result.run_id, "execution pass started");

        // Pass-local bookkeeping. `active` tracks ids currently in the
        // queue so fan-out never double-queues and skip detection can tell
        // whether a dependency still has a chance to run.
        let mut queue: VecDeque<NodeId> = VecDeque::new();
        let mut active: FxHashSet<NodeId> = FxHashSet::default();
        let mut completed_set: FxHashSet<NodeId> = FxHashSet::default();
        let mut pending_inputs: FxHashMap<NodeId, Vec<(NodeId, NodePayload)>> =
            FxHashMap::default();
        let mut retry_at: FxHashMap<NodeId, Instant> = FxHashMap::default();
        let mut deferred_streak = 0usize;

        // Seed: every idle receiver without dependencies.
        {
            let mut inner = self.inner.lock().unwrap();
            let mut seeds: Vec<NodeId> = inner
                .nodes
                .iter()
                .filter(|(_, state)| {
                    state.node_type.is_receiver()
                        && state.dependencies.is_empty()
                        && state.status == NodeStatus::Idle
                })
                .map(|(id, _)| id.clone())
                .collect();
            seeds.sort();
            for id in seeds {
                if let Some(state) = inner.nodes.get_mut(&id) {
                    state.status = NodeStatus::Pending;
                }
                active.insert(id.clone());
                queue.push_back(id);
            }
        }

        while let Some(id) = queue.pop_front() {
            active.remove(&id);

            enum Decision {
                Run {
                    handler: std::sync::Arc<dyn super::node::NodeHandler>,
                    node_type: NodeType,
                    timeout: Duration,
                    attempt: u32,
                },
                Defer,
                SkipFailed,
                SkipCompleted,
                SkipInactiveDependency,
                FailMissingDependency(NodeId),
                Gone,
            }

            let decision = {
                let inner = self.inner.lock().unwrap();
                match inner.nodes.get(&id) {
                    None => Decision::Gone,
                    Some(state) => match state.status {
                        NodeStatus::Failed => Decision::SkipFailed,
                        NodeStatus::Completed => Decision::SkipCompleted,
                        NodeStatus::Processing => Decision::Defer,
                        _ => {
                            if let Some(missing) = state
                                .dependencies
                                .iter()
                                .find(|dep| !inner.nodes.contains_key(*dep))
                            {
                                Decision::FailMissingDependency(missing.clone())
                            } else if let Some(blocking) = state
                                .dependencies
                                .iter()
                                .find(|dep| !completed_set.contains(*dep))
                            {
                                // A dependency that is neither queued nor
                                // running can no longer complete this pass.
                                let dep_state = &inner.nodes[blocking];
                                let dep_live = active.contains(blocking)
                                    || dep_state.status == NodeStatus::Processing;
                                if dep_state.status == NodeStatus::Failed {
                                    Decision::SkipFailed
                                } else if dep_live {
                                    Decision::Defer
                                } else {
                                    Decision::SkipInactiveDependency
                                }
                            } else if retry_at
                                .get(&id)
                                .is_some_and(|deadline| Instant::now() < *deadline)
                            {
                                Decision::Defer
                            } else if state.rate_limit.is_some_and(|limit| {
                                !self.limiter.lock().unwrap().try_acquire(&id, limit)
                            }) {
                                tracing::debug!(node = %id, "rate window exhausted; deferring");
                                Decision::Defer
                            } else {
                                Decision::Run {
                                    handler: state.handler.clone(),
                                    node_type: state.node_type,
                                    timeout: state.timeout,
                                    attempt: state.retry_count + 1,
                                }
                            }
                        }
                    },
                }
            };

            match decision {
                Decision::Gone | Decision::SkipCompleted | Decision::SkipFailed => {
                    deferred_streak = 0;
                }
                Decision::SkipInactiveDependency => {
                    deferred_streak = 0;
                    self.emit_graph(GraphEvent::node(
                        GraphEventKind::NodeSkipped,
                        id.clone(),
                        "dependency never activated this pass",
                    ));
                }
                Decision::FailMissingDependency(dependency) => {
                    deferred_streak = 0;
                    self.mark_failed(
                        &id,
                        NodeFailure {
                            attempts: 0,
                            reason: FailureReason::MissingDependency { dependency },
                        },
                        &mut result,
                    );
                    self.cascade_failure(&id, &mut result);
                }
                Decision::Defer => {
                    deferred_streak += 1;
                    active.insert(id.clone());
                    queue.push_back(id);
                    // A full rotation without progress means everything left
                    // is waiting on a clock; yield instead of spinning.
                    if deferred_streak >= queue.len() {
                        tokio::time::sleep(self.config.deferral_yield).await;
                        deferred_streak = 0;
                    }
                }
                Decision::Run {
                    handler,
                    node_type,
                    timeout,
                    attempt,
                } => {
                    deferred_streak = 0;
                    retry_at.remove(&id);
                    self.set_status(&id, NodeStatus::Processing);
                    self.emit_graph(GraphEvent::node(
                        GraphEventKind::NodeStarted,
                        id.clone(),
                        format!("attempt {attempt}"),
                    ));

                    let input = NodeInput::new(
                        event.clone(),
                        pending_inputs.remove(&id).unwrap_or_default(),
                    );
                    let ctx =
                        NodeContext::new(id.clone(), node_type, attempt, self.emitter.clone());

                    // The handler runs in its own task so a timeout abandons
                    // the work (the task keeps running detached) rather than
                    // cancelling it mid-effect.
                    let join = tokio::spawn(async move { handler.run(input, ctx).await });
                    let attempt_outcome = match tokio::time::timeout(timeout, join).await {
                        Ok(Ok(Ok(payload))) => Ok(payload),
                        Ok(Ok(Err(error))) => Err((error, false)),
                        Ok(Err(join_err)) => Err((
                            NodeError::other(format!("handler task failed: {join_err}")),
                            false,
                        )),
                        Err(_) => Err((
                            NodeError::other(format!(
                                "timed out after {}ms",
                                timeout.as_millis()
                            )),
                            true,
                        )),
                    };

                    match attempt_outcome {
                        Ok(payload) => {
                            self.complete_node(&id, &mut result, &mut completed_set);
                            self.fan_out(
                                &id,
                                &payload,
                                &mut queue,
                                &mut active,
                                &completed_set,
                                &result,
                                &mut pending_inputs,
                            );
                            result.outputs.insert(id.clone(), payload);
                        }
                        Err((error, timed_out)) => {
                            self.handle_failure(
                                &id,
                                error,
                                timed_out,
                                timeout,
                                &mut queue,
                                &mut active,
                                &mut retry_at,
                                &mut result,
                            )
                            .await;
                        }
                    }
                }
            }
        }

        // The graph is reusable for the next event: completed nodes go back
        // to idle, failed nodes stay for external inspection.
        {
            let mut inner = self.inner.lock().unwrap();
            for state in inner.nodes.values_mut() {
                if state.status != NodeStatus::Failed {
                    state.status = NodeStatus::Idle;
                }
            }
        }

        result.duration = started.elapsed();
        self.executions.fetch_add(1, Ordering::Relaxed);
        self.emit_graph(GraphEvent::pass(
            GraphEventKind::ExecutionCompleted,
            format!(
                "run {}: {} completed, {} failed in {}ms",
                result.run_id,
                result.completed.len(),
                result.failed.len(),
                result.duration.as_millis()
            ),
        ));
        Ok(result)
    }

    fn set_status(&self, id: &NodeId, status: NodeStatus) {
        if let Some(state) = self.inner.lock().unwrap().nodes.get_mut(id) {
            state.status = status;
        }
    }

    fn complete_node(
        &self,
        id: &NodeId,
        result: &mut ExecutionResult,
        completed_set: &mut FxHashSet<NodeId>,
    ) {
        {
            let mut inner = self.inner.lock().unwrap();
            if let Some(state) = inner.nodes.get_mut(id) {
                state.status = NodeStatus::Completed;
                state.retry_count = 0;
                state.last_error = None;
            }
        }
        completed_set.insert(id.clone());
        result.completed.push(id.clone());
        self.emit_graph(GraphEvent::node(
            GraphEventKind::NodeCompleted,
            id.clone(),
            "completed",
        ));
    }

    /// Queue dependents along outgoing edges, applying guards and
    /// transforms. Data-flow payloads merge into the target's pending input.
    #[allow(clippy::too_many_arguments)]
    fn fan_out(
        &self,
        id: &NodeId,
        payload: &NodePayload,
        queue: &mut VecDeque<NodeId>,
        active: &mut FxHashSet<NodeId>,
        completed_set: &FxHashSet<NodeId>,
        result: &ExecutionResult,
        pending_inputs: &mut FxHashMap<NodeId, Vec<(NodeId, NodePayload)>>,
    ) {
        let outgoing: Vec<GraphEdge> = {
            let inner = self.inner.lock().unwrap();
            inner
                .edges
                .iter()
                .filter(|edge| edge.from == *id)
                .cloned()
                .collect()
        };

        for edge in outgoing {
            if !edge.passes(payload) {
                tracing::debug!(edge = %edge.id, from = %edge.from, to = %edge.to, "edge guard rejected output");
                continue;
            }
            if edge.kind == EdgeKind::DataFlow {
                let transformed = edge.apply_transform(payload.clone());
                pending_inputs
                    .entry(edge.to.clone())
                    .or_default()
                    .push((id.clone(), transformed));
            }
            let already_done =
                completed_set.contains(&edge.to) || result.failed.contains_key(&edge.to);
            if !already_done && active.insert(edge.to.clone()) {
                self.set_status(&edge.to, NodeStatus::Pending);
                queue.push_back(edge.to.clone());
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn handle_failure(
        &self,
        id: &NodeId,
        error: NodeError,
        timed_out: bool,
        timeout: Duration,
        queue: &mut VecDeque<NodeId>,
        active: &mut FxHashSet<NodeId>,
        retry_at: &mut FxHashMap<NodeId, Instant>,
        result: &mut ExecutionResult,
    ) {
        self.total_failures.fetch_add(1, Ordering::Relaxed);

        let (retry_count, max_retries, hook) = {
            let mut inner = self.inner.lock().unwrap();
            match inner.nodes.get_mut(id) {
                Some(state) => {
                    state.failure_count += 1;
                    state.retry_count += 1;
                    state.last_error = Some(error.to_string());
                    (state.retry_count, state.max_retries, state.error_hook.clone())
                }
                None => return,
            }
        };

        if let Some(hook) = hook {
            if let Err(hook_err) = hook.on_error(id, &error).await {
                tracing::warn!(node = %id, error = %hook_err, "error hook failed");
            }
        }

        if retry_count <= max_retries {
            let delay = self.config.backoff_delay(retry_count);
            self.set_status(id, NodeStatus::Retrying);
            self.emit_graph(GraphEvent::node(
                GraphEventKind::NodeRetrying,
                id.clone(),
                format!("retry {retry_count}/{max_retries} in {}ms", delay.as_millis()),
            ));
            retry_at.insert(id.clone(), Instant::now() + delay);
            active.insert(id.clone());
            queue.push_back(id.clone());
        } else {
            let reason = if timed_out {
                FailureReason::Timeout {
                    after_ms: timeout.as_millis() as u64,
                }
            } else {
                FailureReason::Handler(error.to_string())
            };
            self.mark_failed(
                id,
                NodeFailure {
                    attempts: retry_count,
                    reason,
                },
                result,
            );
            self.cascade_failure(id, result);
        }
    }

    fn mark_failed(&self, id: &NodeId, failure: NodeFailure, result: &mut ExecutionResult) {
        self.set_status(id, NodeStatus::Failed);
        tracing::warn!(node = %id, failure = %failure, "node failed");
        self.emit_graph(GraphEvent::node(
            GraphEventKind::NodeFailed,
            id.clone(),
            failure.to_string(),
        ));
        result.failed.insert(id.clone(), failure);
    }

    /// Mark every transitive dependent of a failed node as failed, without
    /// executing them.
    fn cascade_failure(&self, failed_id: &NodeId, result: &mut ExecutionResult) {
        let adjacency = {
            let inner = self.inner.lock().unwrap();
            inner.combined_adjacency()
        };

        let mut frontier = vec![failed_id.clone()];
        let mut seen: FxHashSet<NodeId> = FxHashSet::default();
        seen.insert(failed_id.clone());

        while let Some(current) = frontier.pop() {
            let Some(dependents) = adjacency.get(&current) else {
                continue;
            };
            for dependent in dependents {
                if !seen.insert(dependent.clone()) || result.failed.contains_key(dependent) {
                    continue;
                }
                self.mark_failed(
                    dependent,
                    NodeFailure {
                        attempts: 0,
                        reason: FailureReason::Cascaded {
                            dependency: failed_id.clone(),
                        },
                    },
                    result,
                );
                frontier.push(dependent.clone());
            }
        }
    }

    fn emit_graph(&self, event: GraphEvent) {
        self.emitter.emit_or_log(Event::Graph(event));
    }
}

fn generate_run_id() -> String {
    use rand::RngExt;
    let mut rng = rand::rng();
    (0..10)
        .map(|_| rng.sample(rand::distr::Alphanumeric) as char)
        .collect()
}
