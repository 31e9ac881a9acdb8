//! Seeded sewer generation.
//!
//! Both sewers of a game share one grid. Each is dug by a randomized
//! depth-first carve from its start tile until the requested share of tiles
//! is open, then a few extra passages are knocked through between open
//! neighbors so the result is not a pure tree. Every open tile is reached by
//! the carve, so the graphs are connected by construction.

use std::collections::HashSet;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use tracing::debug;

use crate::config::{GameConfig, MAX_GRID_SIDE};
use crate::game::{Game, GameError};
use crate::graph::{Graph, GraphBuilder, GraphError, NodeId, Tile};

/// Seed for the run after `seed`. Deterministic, so a whole batch of runs is
/// reproducible from its first seed.
pub fn next_seed(seed: u64) -> u64 {
    StdRng::seed_from_u64(seed).gen()
}

/// Draw a fresh seed for an unseeded run. Never 0, which means "random".
pub fn random_seed() -> u64 {
    rand::thread_rng().gen_range(1..=u64::MAX)
}

impl Game {
    /// Build the search and escape sewers for `seed`.
    pub fn generate(seed: u64, config: &GameConfig) -> Result<Game, GameError> {
        let mut rng = StdRng::seed_from_u64(seed);
        let rows = grid_side(&mut rng, "rows", config.min_rows, config.max_rows)?;
        let cols = grid_side(&mut rng, "cols", config.min_cols, config.max_cols)?;
        let grid = Grid { rows, cols };

        let entrance = grid.random_tile(&mut rng);
        let search = dig_search(&grid, entrance, config, &mut rng)?;
        let ring = search
            .node(search.target())
            .map(|n| n.tile)
            .ok_or(GraphError::UnknownNode(search.target()))?;
        let escape = dig_escape(&grid, ring, config, &mut rng)?;

        debug!(
            seed,
            rows,
            cols,
            search_nodes = search.len(),
            escape_nodes = escape.len(),
            coins = escape.total_value(),
            "sewers dug"
        );
        Game::new(seed, search, escape)
    }
}

/// Draw one grid dimension. Ranges `validate_config` would reject are an
/// error here instead of a panic in `gen_range`.
fn grid_side(rng: &mut StdRng, axis: &'static str, min: u32, max: u32) -> Result<i32, GameError> {
    let bad = GameError::GridSize { axis, min, max };
    if min > max || max > MAX_GRID_SIDE {
        return Err(bad);
    }
    i32::try_from(rng.gen_range(min..=max)).map_err(|_| bad)
}

#[derive(Debug, Clone, Copy)]
struct Grid {
    rows: i32,
    cols: i32,
}

impl Grid {
    fn contains(&self, t: Tile) -> bool {
        (0..self.rows).contains(&t.row) && (0..self.cols).contains(&t.col)
    }

    fn area(&self) -> usize {
        self.rows as usize * self.cols as usize
    }

    fn random_tile(&self, rng: &mut StdRng) -> Tile {
        Tile::new(rng.gen_range(0..self.rows), rng.gen_range(0..self.cols))
    }

    fn around(&self, t: Tile) -> impl Iterator<Item = Tile> + '_ {
        [(-1, 0), (1, 0), (0, -1), (0, 1)]
            .into_iter()
            .map(move |(dr, dc)| Tile::new(t.row + dr, t.col + dc))
            .filter(|n| self.contains(*n))
    }
}

/// Open tiles in carve order (start first) and the passages between them.
struct Carving {
    tiles: Vec<Tile>,
    passages: Vec<(Tile, Tile)>,
}

fn carve(grid: &Grid, start: Tile, config: &GameConfig, rng: &mut StdRng) -> Carving {
    let wanted = ((grid.area() as f64 * config.open_fraction).ceil() as usize)
        .clamp(2, grid.area());
    let mut open = HashSet::from([start]);
    let mut tiles = vec![start];
    let mut passages = Vec::new();
    let mut stack = vec![start];

    while tiles.len() < wanted {
        let Some(&here) = stack.last() else {
            break;
        };
        let closed: Vec<Tile> = grid.around(here).filter(|t| !open.contains(t)).collect();
        match closed.choose(rng) {
            Some(&next) => {
                open.insert(next);
                tiles.push(next);
                passages.push((here, next));
                stack.push(next);
            }
            None => {
                stack.pop();
            }
        }
    }

    // Knock through a few extra walls between open neighbors.
    let existing: HashSet<(Tile, Tile)> = passages
        .iter()
        .flat_map(|&(a, b)| [(a, b), (b, a)])
        .collect();
    for &t in &tiles {
        for n in [Tile::new(t.row + 1, t.col), Tile::new(t.row, t.col + 1)] {
            if open.contains(&n) && !existing.contains(&(t, n)) && rng.gen_bool(config.loop_chance) {
                passages.push((t, n));
            }
        }
    }

    Carving { tiles, passages }
}

fn dig_search(
    grid: &Grid,
    entrance: Tile,
    config: &GameConfig,
    rng: &mut StdRng,
) -> Result<Graph, GraphError> {
    let carving = carve(grid, entrance, config, rng);
    let mut b = GraphBuilder::new();
    for &t in &carving.tiles {
        b.add_node(t, 0)?;
    }
    for &(x, y) in &carving.passages {
        connect(&mut b, x, y, 1)?;
    }
    let ring_tile = pick_other(&carving.tiles, rng);
    build(b, entrance, ring_tile)
}

fn dig_escape(
    grid: &Grid,
    start: Tile,
    config: &GameConfig,
    rng: &mut StdRng,
) -> Result<Graph, GraphError> {
    let carving = carve(grid, start, config, rng);
    let mut b = GraphBuilder::new();
    for &t in &carving.tiles {
        let value = if rng.gen_bool(config.coin_chance) {
            config.coin_values.choose(rng).copied().unwrap_or(0)
        } else {
            0
        };
        b.add_node(t, value)?;
    }
    for &(x, y) in &carving.passages {
        let length = rng.gen_range(1..=config.max_edge_weight.max(1));
        connect(&mut b, x, y, length)?;
    }
    let exit_tile = pick_other(&carving.tiles, rng);
    build(b, start, exit_tile)
}

/// Any tile but the first, or the first when it is alone.
fn pick_other(tiles: &[Tile], rng: &mut StdRng) -> Tile {
    match tiles.get(1..) {
        Some(rest) if !rest.is_empty() => rest[rng.gen_range(0..rest.len())],
        _ => tiles[0],
    }
}

fn connect(b: &mut GraphBuilder, x: Tile, y: Tile, length: u32) -> Result<(), GraphError> {
    let a = node_at(b, x)?;
    let z = node_at(b, y)?;
    b.add_edge(a, z, length)
}

fn build(b: GraphBuilder, entrance: Tile, target: Tile) -> Result<Graph, GraphError> {
    let e = node_at(&b, entrance)?;
    let t = node_at(&b, target)?;
    b.build(e, t)
}

fn node_at(b: &GraphBuilder, t: Tile) -> Result<NodeId, GraphError> {
    b.node_at(t).ok_or(GraphError::UnknownTile {
        row: t.row,
        col: t.col,
    })
}
