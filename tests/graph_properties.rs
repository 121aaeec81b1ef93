//! Property tests: for arbitrary DAGs, execution terminates and every node
//! reachable from a receiver ends completed or failed.

mod common;

use proptest::prelude::*;

use common::*;
use relaygraph::config::EngineConfig;
use relaygraph::graph::{EdgeSpec, NodeSpec, OperationalGraph};
use relaygraph::types::{NodeId, NodeType};

#[derive(Clone, Debug)]
struct DagSpec {
    node_count: usize,
    /// deps[j] holds indices < j, so the graph is acyclic by construction.
    deps: Vec<Vec<usize>>,
    failing: Vec<bool>,
}

fn dag_strategy() -> impl Strategy<Value = DagSpec> {
    (2usize..8).prop_flat_map(|node_count| {
        let deps = (0..node_count)
            .map(|j| {
                if j == 0 {
                    Just(Vec::new()).boxed()
                } else {
                    proptest::collection::vec(0..j, 0..=j.min(3)).boxed()
                }
            })
            .collect::<Vec<_>>();
        let failing = proptest::collection::vec(any::<bool>(), node_count);
        (Just(node_count), deps, failing).prop_map(|(node_count, mut deps, failing)| {
            for list in &mut deps {
                list.sort_unstable();
                list.dedup();
            }
            DagSpec {
                node_count,
                deps,
                failing,
            }
        })
    })
}

fn node_id(index: usize) -> NodeId {
    NodeId::from(format!("node_{index}"))
}

fn build_graph(spec: &DagSpec) -> OperationalGraph {
    let graph = OperationalGraph::new(EngineConfig::default());
    for j in 0..spec.node_count {
        let node_type = if spec.deps[j].is_empty() {
            NodeType::Receiver
        } else {
            NodeType::Validator
        };
        let dependencies: Vec<NodeId> = spec.deps[j].iter().map(|i| node_id(*i)).collect();
        let mut node = if spec.failing[j] {
            NodeSpec::new(node_id(j), node_type, AlwaysFailHandler)
        } else {
            NodeSpec::new(node_id(j), node_type, NoopHandler)
        }
        .with_dependencies(dependencies);
        node = node.with_max_retries(0);
        graph.add_node(node).unwrap();
    }
    for j in 0..spec.node_count {
        for i in &spec.deps[j] {
            graph
                .add_edge(EdgeSpec::data_flow(node_id(*i), node_id(j)))
                .unwrap();
        }
    }
    graph
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn execution_terminates_and_covers_reachable_nodes(spec in dag_strategy()) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .start_paused(true)
            .build()
            .unwrap();

        runtime.block_on(async {
            let graph = build_graph(&spec);
            prop_assert!(graph.validate().is_valid());

            let result = graph.execute(text_event("m1", "hello")).await.unwrap();

            // No node is both completed and failed.
            for id in &result.completed {
                prop_assert!(!result.failed.contains_key(id));
            }

            // Every receiver (no deps) resolved one way or the other.
            for j in 0..spec.node_count {
                if spec.deps[j].is_empty() {
                    let id = node_id(j);
                    prop_assert!(
                        result.completed.contains(&id) || result.failed.contains_key(&id),
                        "seed {id} unresolved"
                    );
                }
            }

            // Any node downstream of a completed dependency resolved too.
            for j in 0..spec.node_count {
                let id = node_id(j);
                let has_completed_parent = spec.deps[j]
                    .iter()
                    .any(|i| result.completed.contains(&node_id(*i)));
                if has_completed_parent {
                    prop_assert!(
                        result.completed.contains(&id) || result.failed.contains_key(&id),
                        "reachable node {id} unresolved"
                    );
                }
            }

            // Failing nodes that ran are recorded as failures.
            for j in 0..spec.node_count {
                if spec.failing[j] && spec.deps[j].is_empty() {
                    prop_assert!(result.failed.contains_key(&node_id(j)));
                }
            }

            Ok(())
        })?;
    }
}
