//! One game: a search sewer, an escape sewer and the numbers derived from them.

use std::sync::Arc;

use thiserror::Error;

use crate::graph::{Graph, GraphError, NodeId, Tile};
use crate::pathfinding::distance;

#[derive(Debug, Error)]
pub enum GameError {
    #[error(transparent)]
    Graph(#[from] GraphError),
    #[error("{axis} range {min}..={max} cannot be generated")]
    GridSize {
        axis: &'static str,
        min: u32,
        max: u32,
    },
    #[error("escape starts on {escape:?} but the ring lies on {ring:?}")]
    Misaligned { ring: Tile, escape: Tile },
    #[error("{sewer} sewer: {to} is unreachable from {from}")]
    Unreachable {
        sewer: &'static str,
        from: NodeId,
        to: NodeId,
    },
}

/// A ready-to-play pair of sewers. Cheap to clone; graphs are shared.
#[derive(Debug, Clone)]
pub struct Game {
    pub seed: u64,
    pub search: Arc<Graph>,
    pub escape: Arc<Graph>,
    /// Shortest entrance → ring distance in the search sewer.
    pub min_find_steps: u64,
    /// Shortest start → exit distance in the escape sewer.
    pub min_flee_steps: u64,
}

impl Game {
    /// Pair up two sewers. The escape sewer's entrance must sit on the ring's
    /// tile and both targets must be reachable.
    pub fn new(seed: u64, search: Graph, escape: Graph) -> Result<Self, GameError> {
        let ring = tile_of(&search, search.target())?;
        let start = tile_of(&escape, escape.entrance())?;
        if ring != start {
            return Err(GameError::Misaligned {
                ring,
                escape: start,
            });
        }
        let min_find_steps = reachable("search", &search)?;
        let min_flee_steps = reachable("escape", &escape)?;
        Ok(Self {
            seed,
            search: Arc::new(search),
            escape: Arc::new(escape),
            min_find_steps,
            min_flee_steps,
        })
    }
}

fn tile_of(graph: &Graph, id: NodeId) -> Result<Tile, GraphError> {
    graph
        .node(id)
        .map(|n| n.tile)
        .ok_or(GraphError::UnknownNode(id))
}

fn reachable(sewer: &'static str, graph: &Graph) -> Result<u64, GameError> {
    let (from, to) = (graph.entrance(), graph.target());
    distance(graph, from, to).ok_or(GameError::Unreachable { sewer, from, to })
}
