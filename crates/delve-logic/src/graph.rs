//! Sewer graph: an arena of nodes addressed by stable integer ids.
//!
//! Nodes own nothing but their adjacency list of `(neighbor id, length)`
//! pairs. Every cross-reference goes through the arena by [`NodeId`], so the
//! graph is a plain tree of owned vectors and can be shared read-only behind
//! an `Arc` by both phases, the planner and any number of runs.
//!
//! Node values (coins) stored here are the *initial* amounts. Collection never
//! mutates the graph; a run drains its own overlay (see
//! [`Graph::value_overlay`]).

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Stable identity of a node: its slot in the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u32);

impl NodeId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Grid position of a node. Only used for the Manhattan heuristic and to
/// line up the two sewers of one game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tile {
    pub row: i32,
    pub col: i32,
}

impl Tile {
    pub fn new(row: i32, col: i32) -> Self {
        Self { row, col }
    }

    /// Manhattan distance. Never overstates the true path length on a grid
    /// whose edges all have length >= 1.
    pub fn manhattan(self, other: Tile) -> u32 {
        self.row.abs_diff(other.row) + self.col.abs_diff(other.col)
    }
}

/// One undirected edge as seen from one endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edge {
    pub to: NodeId,
    pub length: u32,
}

#[derive(Debug, Clone)]
pub struct Node {
    pub id: NodeId,
    pub tile: Tile,
    /// Coins lying on this node when the game starts.
    pub value: u32,
    edges: Vec<Edge>,
}

impl Node {
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn neighbors(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.edges.iter().map(|e| e.to)
    }

    /// Length of the edge to `other`, if adjacent.
    pub fn edge_to(&self, other: NodeId) -> Option<u32> {
        self.edges.iter().find(|e| e.to == other).map(|e| e.length)
    }

    pub fn is_adjacent(&self, other: NodeId) -> bool {
        self.edge_to(other).is_some()
    }
}

/// Graph construction errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    #[error("unknown node {0}")]
    UnknownNode(NodeId),
    #[error("self loop on node {0}")]
    SelfLoop(NodeId),
    #[error("duplicate edge {0} - {1}")]
    DuplicateEdge(NodeId, NodeId),
    #[error("two nodes share tile ({row}, {col})")]
    DuplicateTile { row: i32, col: i32 },
    #[error("no node on tile ({row}, {col})")]
    UnknownTile { row: i32, col: i32 },
}

/// Immutable undirected graph with a designated entrance and target.
///
/// In a search sewer the target is the ring; in an escape sewer it is the
/// exit.
#[derive(Debug, Clone)]
pub struct Graph {
    nodes: Vec<Node>,
    entrance: NodeId,
    target: NodeId,
    by_tile: HashMap<Tile, NodeId>,
}

impl Graph {
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.index())
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn entrance(&self) -> NodeId {
        self.entrance
    }

    pub fn target(&self) -> NodeId {
        self.target
    }

    pub fn node_at(&self, tile: Tile) -> Option<NodeId> {
        self.by_tile.get(&tile).copied()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        id.index() < self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.nodes.iter().map(|n| n.edges.len()).sum::<usize>() / 2
    }

    /// Length of the edge `a - b`, if it exists.
    pub fn edge_length(&self, a: NodeId, b: NodeId) -> Option<u32> {
        self.node(a).and_then(|n| n.edge_to(b))
    }

    /// Fresh per-run value overlay: every node with coins → its amount.
    pub fn value_overlay(&self) -> HashMap<NodeId, u32> {
        self.nodes
            .iter()
            .filter(|n| n.value > 0)
            .map(|n| (n.id, n.value))
            .collect()
    }

    /// Sum of all initial values.
    pub fn total_value(&self) -> u64 {
        self.nodes.iter().map(|n| u64::from(n.value)).sum()
    }
}

/// Incremental builder. Validates each edge as it is added so a built
/// [`Graph`] is always symmetric and free of loops and parallel edges.
#[derive(Debug, Default)]
pub struct GraphBuilder {
    nodes: Vec<Node>,
    by_tile: HashMap<Tile, NodeId>,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node_at(&self, tile: Tile) -> Option<NodeId> {
        self.by_tile.get(&tile).copied()
    }

    pub fn add_node(&mut self, tile: Tile, value: u32) -> Result<NodeId, GraphError> {
        if self.by_tile.contains_key(&tile) {
            return Err(GraphError::DuplicateTile {
                row: tile.row,
                col: tile.col,
            });
        }
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node {
            id,
            tile,
            value,
            edges: Vec::new(),
        });
        self.by_tile.insert(tile, id);
        Ok(id)
    }

    pub fn set_value(&mut self, id: NodeId, value: u32) -> Result<(), GraphError> {
        let node = self
            .nodes
            .get_mut(id.index())
            .ok_or(GraphError::UnknownNode(id))?;
        node.value = value;
        Ok(())
    }

    pub fn has_edge(&self, a: NodeId, b: NodeId) -> bool {
        self.nodes
            .get(a.index())
            .is_some_and(|n| n.is_adjacent(b))
    }

    /// Connect `a` and `b` in both directions with the same length.
    pub fn add_edge(&mut self, a: NodeId, b: NodeId, length: u32) -> Result<(), GraphError> {
        for id in [a, b] {
            if id.index() >= self.nodes.len() {
                return Err(GraphError::UnknownNode(id));
            }
        }
        if a == b {
            return Err(GraphError::SelfLoop(a));
        }
        if self.has_edge(a, b) {
            return Err(GraphError::DuplicateEdge(a, b));
        }
        self.nodes[a.index()].edges.push(Edge { to: b, length });
        self.nodes[b.index()].edges.push(Edge { to: a, length });
        Ok(())
    }

    pub fn build(self, entrance: NodeId, target: NodeId) -> Result<Graph, GraphError> {
        for id in [entrance, target] {
            if id.index() >= self.nodes.len() {
                return Err(GraphError::UnknownNode(id));
            }
        }
        Ok(Graph {
            nodes: self.nodes,
            entrance,
            target,
            by_tile: self.by_tile,
        })
    }
}
