//! Shortest paths over a sewer graph.
//!
//! Dijkstra's algorithm on top of [`IndexedHeap`]: the frontier is a min-heap
//! keyed by best known distance, and every node that has ever entered the
//! frontier keeps a [`DistanceRecord`] until the search ends. This is the only
//! distance primitive in the crate; the escape planner, scoring and the
//! executor's failure diagnostics all route through [`shortest_path`] and
//! [`path_cost`].

use std::collections::HashMap;

use serde::Serialize;
use thiserror::Error;

use crate::graph::{Graph, NodeId};
use crate::heap::{HeapKind, IndexedHeap};

/// Errors from building a [`Path`] by hand.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    #[error("a path needs at least one node")]
    Empty,
    #[error("unknown node {0}")]
    UnknownNode(NodeId),
    #[error("{0} and {1} are not adjacent")]
    NotAdjacent(NodeId, NodeId),
    #[error("a path ending at {end} cannot continue from {start}")]
    Disjoint { end: NodeId, start: NodeId },
}

/// Ordered node ids from source to target, both inclusive. Consecutive nodes
/// are always adjacent in the graph the path was built for.
///
/// Only [`Path::from_nodes`], [`shortest_path`] and [`Path::extend`] create
/// or grow one; there is no `Deserialize`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Path(Vec<NodeId>);

impl Path {
    /// Validate `ids` against `graph` and wrap them.
    pub fn from_nodes(graph: &Graph, ids: Vec<NodeId>) -> Result<Self, PathError> {
        let first = *ids.first().ok_or(PathError::Empty)?;
        if !graph.contains(first) {
            return Err(PathError::UnknownNode(first));
        }
        for pair in ids.windows(2) {
            if !graph.contains(pair[1]) {
                return Err(PathError::UnknownNode(pair[1]));
            }
            if graph.edge_length(pair[0], pair[1]).is_none() {
                return Err(PathError::NotAdjacent(pair[0], pair[1]));
            }
        }
        Ok(Self(ids))
    }

    pub fn nodes(&self) -> &[NodeId] {
        &self.0
    }

    pub fn source(&self) -> NodeId {
        self.0[0]
    }

    pub fn target(&self) -> NodeId {
        self.0[self.0.len() - 1]
    }

    /// Number of edges.
    pub fn hops(&self) -> usize {
        self.0.len() - 1
    }

    /// Append `next`, dropping the shared junction node. Fails and leaves
    /// `self` untouched unless `next` starts where this path ends.
    pub fn extend(&mut self, next: &Path) -> Result<(), PathError> {
        if self.target() != next.source() {
            return Err(PathError::Disjoint {
                end: self.target(),
                start: next.source(),
            });
        }
        self.0.extend_from_slice(&next.0[1..]);
        Ok(())
    }

    pub fn into_nodes(self) -> Vec<NodeId> {
        self.0
    }
}

/// Best known distance to a node and the predecessor on that path.
#[derive(Debug, Clone, Copy)]
struct DistanceRecord {
    distance: u64,
    backpointer: Option<NodeId>,
}

/// Minimum-total-length path from `source` to `target`, or `None` when the
/// target is unreachable (or either id is not in the graph).
pub fn shortest_path(graph: &Graph, source: NodeId, target: NodeId) -> Option<Path> {
    if !graph.contains(source) || !graph.contains(target) {
        return None;
    }

    let mut frontier = IndexedHeap::new(HeapKind::Min);
    let mut records: HashMap<NodeId, DistanceRecord> = HashMap::new();

    frontier.insert(source, 0.0).ok()?;
    records.insert(
        source,
        DistanceRecord {
            distance: 0,
            backpointer: None,
        },
    );

    while let Ok(f) = frontier.poll() {
        if f == target {
            return Some(reconstruct(&records, target));
        }
        let f_dist = records[&f].distance;
        let Some(node) = graph.node(f) else {
            continue;
        };
        for edge in node.edges() {
            let candidate = f_dist + u64::from(edge.length);
            let record = DistanceRecord {
                distance: candidate,
                backpointer: Some(f),
            };
            match records.get(&edge.to).map(|r| r.distance) {
                None => {
                    records.insert(edge.to, record);
                    frontier.insert(edge.to, candidate as f64).ok()?;
                }
                Some(known) if candidate < known => {
                    records.insert(edge.to, record);
                    frontier.change_priority(&edge.to, candidate as f64).ok()?;
                }
                Some(_) => {}
            }
        }
    }

    None
}

/// Walk backpointers from `target` to the source and reverse.
fn reconstruct(records: &HashMap<NodeId, DistanceRecord>, target: NodeId) -> Path {
    let mut nodes = vec![target];
    let mut cur = target;
    while let Some(prev) = records.get(&cur).and_then(|r| r.backpointer) {
        nodes.push(prev);
        cur = prev;
    }
    nodes.reverse();
    Path(nodes)
}

/// Sum of edge lengths along `path`. A one-node path costs 0.
pub fn path_cost(graph: &Graph, path: &Path) -> u64 {
    path.0
        .windows(2)
        .map(|pair| u64::from(graph.edge_length(pair[0], pair[1]).unwrap_or(0)))
        .sum()
}

/// Cost of the shortest path, or `None` if unreachable.
pub fn distance(graph: &Graph, source: NodeId, target: NodeId) -> Option<u64> {
    shortest_path(graph, source, target).map(|p| path_cost(graph, &p))
}
