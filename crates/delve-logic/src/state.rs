//! Phase state: what a strategy may see and do, and the ledger that records it.
//!
//! A strategy never touches a [`Graph`] mutably and never sees the ledger
//! directly. It gets a role-scoped view:
//!
//! | View | Phase | Knows |
//! |------|-------|-------|
//! | [`SearchView`] | find | current node, neighbors, Manhattan distance to the ring |
//! | [`EscapeView`] | flee | the whole escape graph, remaining values, step budget |
//!
//! Both concrete states write into a shared [`PhaseLink`]: a ledger behind a
//! `parking_lot::Mutex` plus a [`CancelToken`]. The executor keeps the other
//! end of the link. When a phase ends (normally or by timeout) the executor
//! freezes the ledger and every later mutation fails under the same lock, so
//! the snapshot it scores can never change underneath it.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::graph::{Graph, Node, NodeId};

/// Shared cancellation flag. Cloning shares the flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, AtomicOrdering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(AtomicOrdering::SeqCst)
    }
}

/// Errors a view's `move_to` can return.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MoveError {
    #[error("{to} is not adjacent to {from}")]
    NotAdjacent { from: NodeId, to: NodeId },
    #[error("moving to {to} needs {needed} steps but only {remaining} remain")]
    BudgetExhausted {
        to: NodeId,
        needed: u32,
        remaining: u32,
    },
    #[error("phase was cancelled")]
    Cancelled,
    #[error("phase is already over")]
    WrongPhase,
}

/// A neighbor as seen during the search: its id and its Manhattan distance
/// to the ring. Orders by distance, then by id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NeighborStatus {
    pub id: NodeId,
    pub distance: u32,
}

impl Ord for NeighborStatus {
    fn cmp(&self, other: &Self) -> Ordering {
        self.distance
            .cmp(&other.distance)
            .then(self.id.cmp(&other.id))
    }
}

impl PartialOrd for NeighborStatus {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Read/move capability during the find phase.
pub trait SearchView {
    fn current_location(&self) -> NodeId;
    /// Neighbors of the current node, in adjacency order.
    fn neighbors(&self) -> Vec<NeighborStatus>;
    /// Manhattan distance from the current node to the ring; 0 exactly when
    /// standing on it.
    fn distance_to_target(&self) -> u32;
    fn move_to(&mut self, id: NodeId) -> Result<(), MoveError>;
    fn is_cancelled(&self) -> bool;
}

/// Read/move capability during the flee phase.
pub trait EscapeView {
    fn current_node(&self) -> &Node;
    fn exit_node(&self) -> &Node;
    fn all_nodes(&self) -> &[Node];
    fn graph(&self) -> &Graph;
    /// Value still lying on `id` in this run.
    fn value_at(&self, id: NodeId) -> u32;
    fn steps_remaining(&self) -> u32;
    fn coins_collected(&self) -> u32;
    /// Walk the edge to `id` and pick up whatever lies there.
    fn move_to(&mut self, id: NodeId) -> Result<(), MoveError>;
    fn is_cancelled(&self) -> bool;
}

/// Point-in-time copy of a phase ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub position: NodeId,
    /// Edges walked.
    pub moves: u32,
    /// Sum of walked edge lengths.
    pub steps_taken: u32,
    /// `None` for an unbudgeted phase.
    pub steps_remaining: Option<u32>,
    pub coins: u32,
    /// Set when a move was refused for lack of steps, even if the strategy
    /// then carried on.
    pub budget_exhausted: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Seal {
    Open,
    Finished,
    Cancelled,
}

#[derive(Debug)]
struct Ledger {
    snapshot: Snapshot,
    values: HashMap<NodeId, u32>,
    seal: Seal,
}

impl Ledger {
    fn check_open(&self) -> Result<(), MoveError> {
        match self.seal {
            Seal::Open => Ok(()),
            Seal::Finished => Err(MoveError::WrongPhase),
            Seal::Cancelled => Err(MoveError::Cancelled),
        }
    }

    fn collect(&mut self, id: NodeId) {
        if let Some(v) = self.values.remove(&id) {
            self.snapshot.coins = self.snapshot.coins.saturating_add(v);
        }
    }
}

/// The executor's and the state's shared handle on one phase.
#[derive(Debug, Clone)]
pub struct PhaseLink {
    ledger: Arc<Mutex<Ledger>>,
    cancel: CancelToken,
}

impl PhaseLink {
    /// Open a phase at `start`. `budget` is `None` for the search phase.
    pub fn new(start: NodeId, budget: Option<u32>, values: HashMap<NodeId, u32>) -> Self {
        let ledger = Ledger {
            snapshot: Snapshot {
                position: start,
                moves: 0,
                steps_taken: 0,
                steps_remaining: budget,
                coins: 0,
                budget_exhausted: false,
            },
            values,
            seal: Seal::Open,
        };
        Self {
            ledger: Arc::new(Mutex::new(ledger)),
            cancel: CancelToken::new(),
        }
    }

    /// Pick up the value on the current node without moving.
    pub fn collect_here(&self) {
        let mut ledger = self.ledger.lock();
        let here = ledger.snapshot.position;
        ledger.collect(here);
    }

    pub fn snapshot(&self) -> Snapshot {
        self.ledger.lock().snapshot.clone()
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Seal the ledger after the strategy returned. Later moves fail with
    /// [`MoveError::WrongPhase`].
    pub fn finish(&self) -> Snapshot {
        self.seal(Seal::Finished)
    }

    /// Raise the cancel flag and seal the ledger. Later moves fail with
    /// [`MoveError::Cancelled`].
    pub fn cancel(&self) -> Snapshot {
        self.cancel.cancel();
        self.seal(Seal::Cancelled)
    }

    fn seal(&self, seal: Seal) -> Snapshot {
        let mut ledger = self.ledger.lock();
        if ledger.seal == Seal::Open {
            ledger.seal = seal;
        }
        ledger.snapshot.clone()
    }

    fn value_at(&self, id: NodeId) -> u32 {
        self.ledger.lock().values.get(&id).copied().unwrap_or(0)
    }
}

/// Concrete [`SearchView`] over a search sewer.
#[derive(Debug, Clone)]
pub struct SearchState {
    graph: Arc<Graph>,
    link: PhaseLink,
}

impl SearchState {
    pub fn new(graph: Arc<Graph>, link: PhaseLink) -> Self {
        Self { graph, link }
    }

    fn ring_distance(&self, id: NodeId) -> u32 {
        match (self.graph.node(id), self.graph.node(self.graph.target())) {
            (Some(a), Some(b)) => a.tile.manhattan(b.tile),
            _ => u32::MAX,
        }
    }
}

impl SearchView for SearchState {
    fn current_location(&self) -> NodeId {
        self.link.ledger.lock().snapshot.position
    }

    fn neighbors(&self) -> Vec<NeighborStatus> {
        let here = self.current_location();
        self.graph
            .node(here)
            .map(|n| {
                n.neighbors()
                    .map(|id| NeighborStatus {
                        id,
                        distance: self.ring_distance(id),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    fn distance_to_target(&self) -> u32 {
        self.ring_distance(self.current_location())
    }

    fn move_to(&mut self, id: NodeId) -> Result<(), MoveError> {
        let mut ledger = self.link.ledger.lock();
        ledger.check_open()?;
        let from = ledger.snapshot.position;
        let length = self
            .graph
            .edge_length(from, id)
            .ok_or(MoveError::NotAdjacent { from, to: id })?;
        let s = &mut ledger.snapshot;
        s.position = id;
        s.moves += 1;
        s.steps_taken = s.steps_taken.saturating_add(length);
        Ok(())
    }

    fn is_cancelled(&self) -> bool {
        self.link.cancel.is_cancelled()
    }
}

/// Concrete [`EscapeView`] over an escape sewer.
#[derive(Debug, Clone)]
pub struct EscapeState {
    graph: Arc<Graph>,
    link: PhaseLink,
}

impl EscapeState {
    pub fn new(graph: Arc<Graph>, link: PhaseLink) -> Self {
        Self { graph, link }
    }

    fn node_or_entrance(&self, id: NodeId) -> &Node {
        // Positions always come from the graph, so the fallback is never hit.
        let nodes = self.graph.nodes();
        nodes
            .get(id.index())
            .unwrap_or(&nodes[self.graph.entrance().index()])
    }
}

impl EscapeView for EscapeState {
    fn current_node(&self) -> &Node {
        let here = self.link.ledger.lock().snapshot.position;
        self.node_or_entrance(here)
    }

    fn exit_node(&self) -> &Node {
        self.node_or_entrance(self.graph.target())
    }

    fn all_nodes(&self) -> &[Node] {
        self.graph.nodes()
    }

    fn graph(&self) -> &Graph {
        &self.graph
    }

    fn value_at(&self, id: NodeId) -> u32 {
        self.link.value_at(id)
    }

    fn steps_remaining(&self) -> u32 {
        self.link
            .ledger
            .lock()
            .snapshot
            .steps_remaining
            .unwrap_or(u32::MAX)
    }

    fn coins_collected(&self) -> u32 {
        self.link.ledger.lock().snapshot.coins
    }

    fn move_to(&mut self, id: NodeId) -> Result<(), MoveError> {
        let mut ledger = self.link.ledger.lock();
        ledger.check_open()?;
        let from = ledger.snapshot.position;
        let length = self
            .graph
            .edge_length(from, id)
            .ok_or(MoveError::NotAdjacent { from, to: id })?;
        if let Some(remaining) = ledger.snapshot.steps_remaining {
            if length > remaining {
                ledger.snapshot.budget_exhausted = true;
                return Err(MoveError::BudgetExhausted {
                    to: id,
                    needed: length,
                    remaining,
                });
            }
            ledger.snapshot.steps_remaining = Some(remaining - length);
        }
        let s = &mut ledger.snapshot;
        s.position = id;
        s.moves += 1;
        s.steps_taken = s.steps_taken.saturating_add(length);
        ledger.collect(id);
        Ok(())
    }

    fn is_cancelled(&self) -> bool {
        self.link.cancel.is_cancelled()
    }
}
