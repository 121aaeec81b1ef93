//! Structural validation for the operational graph.
//!
//! Cycle detection runs before every execution pass (a cyclic graph fails
//! with [`GraphError::CircularDependency`] before any node runs) and again
//! inside [`validate`](super::OperationalGraph::validate), which also scans
//! for edges referencing missing nodes and for orphaned nodes.

use rustc_hash::{FxHashMap, FxHashSet};

use super::error::GraphError;
use crate::types::NodeId;

/// Outcome of [`OperationalGraph::validate`](super::OperationalGraph::validate).
#[derive(Clone, Debug, Default)]
pub struct ValidationReport {
    /// Each detected cycle as the dependency path that closes it.
    pub cycles: Vec<Vec<NodeId>>,
    /// Edges (by display id) referencing node ids that are not registered.
    pub dangling_edges: Vec<(String, NodeId)>,
    /// Dependency references to node ids that are not registered.
    pub missing_dependencies: Vec<(NodeId, NodeId)>,
    /// Non-receiver nodes with neither incoming nor outgoing edges.
    pub orphans: Vec<NodeId>,
}

impl ValidationReport {
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.cycles.is_empty()
            && self.dangling_edges.is_empty()
            && self.missing_dependencies.is_empty()
            && self.orphans.is_empty()
    }
}

#[derive(Clone, Copy, PartialEq)]
enum Mark {
    Visiting,
    Done,
}

/// Depth-first cycle search over a combined adjacency map (declared
/// dependencies plus registered edges). Returns the first cycle found as a
/// path ending where it started.
///
/// Roots are visited in sorted order so the reported cycle is deterministic.
pub(crate) fn find_cycle(adjacency: &FxHashMap<NodeId, Vec<NodeId>>) -> Option<Vec<NodeId>> {
    let mut marks: FxHashMap<&NodeId, Mark> = FxHashMap::default();
    let mut roots: Vec<&NodeId> = adjacency.keys().collect();
    roots.sort();

    for root in roots {
        if marks.contains_key(root) {
            continue;
        }
        let mut stack: Vec<&NodeId> = Vec::new();
        if let Some(cycle) = visit(root, adjacency, &mut marks, &mut stack) {
            return Some(cycle);
        }
    }
    None
}

fn visit<'a>(
    node: &'a NodeId,
    adjacency: &'a FxHashMap<NodeId, Vec<NodeId>>,
    marks: &mut FxHashMap<&'a NodeId, Mark>,
    stack: &mut Vec<&'a NodeId>,
) -> Option<Vec<NodeId>> {
    match marks.get(node) {
        Some(Mark::Done) => return None,
        Some(Mark::Visiting) => {
            // Reached a node still on the current path: slice the stack
            // from its first occurrence and close the loop.
            let start = stack.iter().position(|n| *n == node).unwrap_or(0);
            let mut cycle: Vec<NodeId> = stack[start..].iter().map(|n| (*n).clone()).collect();
            cycle.push(node.clone());
            return Some(cycle);
        }
        None => {}
    }

    marks.insert(node, Mark::Visiting);
    stack.push(node);

    if let Some(next) = adjacency.get(node) {
        for target in next {
            if let Some(cycle) = visit(target, adjacency, marks, stack) {
                return Some(cycle);
            }
        }
    }

    stack.pop();
    marks.insert(node, Mark::Done);
    None
}

/// Cycle check used at the top of every execution pass.
pub(crate) fn ensure_acyclic(adjacency: &FxHashMap<NodeId, Vec<NodeId>>) -> Result<(), GraphError> {
    match find_cycle(adjacency) {
        Some(path) => Err(GraphError::CircularDependency { path }),
        None => Ok(()),
    }
}

/// Nodes with at least one incident edge, for orphan detection.
pub(crate) fn connected_nodes<'a>(
    edges: impl Iterator<Item = (&'a NodeId, &'a NodeId)>,
) -> FxHashSet<NodeId> {
    let mut connected = FxHashSet::default();
    for (from, to) in edges {
        connected.insert(from.clone());
        connected.insert(to.clone());
    }
    connected
}
