//! Strategies: the pluggable code that actually walks the sewers.
//!
//! A [`Diver`] gets one call per phase. It may return early, return an error,
//! panic or loop forever; the executor copes with all of these. Well-behaved
//! divers check `is_cancelled()` and propagate `move_to` errors with `?`.

use std::collections::{HashMap, HashSet};
use std::error::Error;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::graph::NodeId;
use crate::pathfinding::shortest_path;
use crate::planner::plan;
use crate::state::{EscapeView, NeighborStatus, SearchView};

/// Anything a strategy wants to report as a failure.
pub type StrategyError = Box<dyn Error + Send + Sync>;

pub trait Diver: Send + Sync {
    fn name(&self) -> &str;

    /// Walk from the entrance until standing on the ring.
    fn find(&self, view: &mut dyn SearchView) -> Result<(), StrategyError>;

    /// Walk from the ring's tile to the exit within the step budget.
    fn flee(&self, view: &mut dyn EscapeView) -> Result<(), StrategyError>;
}

/// Built-in strategies, selectable by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiverKind {
    #[default]
    Greedy,
    Direct,
}

impl DiverKind {
    pub fn build(self) -> Arc<dyn Diver> {
        match self {
            DiverKind::Greedy => Arc::new(GreedyDiver),
            DiverKind::Direct => Arc::new(DirectDiver),
        }
    }
}

/// Depth-first find, greedy value-collecting flee.
#[derive(Debug, Clone, Copy, Default)]
pub struct GreedyDiver;

impl Diver for GreedyDiver {
    fn name(&self) -> &str {
        "greedy"
    }

    fn find(&self, view: &mut dyn SearchView) -> Result<(), StrategyError> {
        depth_first_find(view)
    }

    fn flee(&self, view: &mut dyn EscapeView) -> Result<(), StrategyError> {
        let route = {
            let graph = view.graph();
            let values: HashMap<NodeId, u32> = graph
                .nodes()
                .iter()
                .filter_map(|n| {
                    let v = view.value_at(n.id);
                    (v > 0).then_some((n.id, v))
                })
                .collect();
            let escape = plan(
                graph,
                view.current_node().id,
                view.exit_node().id,
                &values,
                u64::from(view.steps_remaining()),
            )?;
            debug!(
                waypoints = escape.waypoints.len(),
                cost = escape.cost,
                value = escape.value,
                "escape planned"
            );
            escape.route
        };
        walk(view, &route)
    }
}

/// Depth-first find, then straight to the exit.
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectDiver;

impl Diver for DirectDiver {
    fn name(&self) -> &str {
        "direct"
    }

    fn find(&self, view: &mut dyn SearchView) -> Result<(), StrategyError> {
        depth_first_find(view)
    }

    fn flee(&self, view: &mut dyn EscapeView) -> Result<(), StrategyError> {
        let route = {
            let start = view.current_node().id;
            let exit = view.exit_node().id;
            shortest_path(view.graph(), start, exit)
                .ok_or_else(|| format!("no route from {start} to the exit {exit}"))?
                .into_nodes()
        };
        walk(view, &route)
    }
}

/// Follow `route` (which starts at the current node) to its end.
fn walk(view: &mut dyn EscapeView, route: &[NodeId]) -> Result<(), StrategyError> {
    for &id in route.iter().skip(1) {
        if view.is_cancelled() {
            return Err("cancelled".into());
        }
        view.move_to(id)?;
    }
    Ok(())
}

/// Depth-first walk that always tries the unvisited neighbor closest to the
/// ring first and physically walks back out of dead ends.
fn depth_first_find(view: &mut dyn SearchView) -> Result<(), StrategyError> {
    let start = view.current_location();
    let mut visited = HashSet::from([start]);
    // Each frame: a node on the current walk and its not yet tried neighbors,
    // farthest first so `pop` yields the closest.
    let mut stack = vec![(start, pending(view, &visited))];

    while view.distance_to_target() != 0 {
        if view.is_cancelled() {
            return Err("cancelled".into());
        }
        let next = match stack.last_mut() {
            Some((_, untried)) => loop {
                match untried.pop() {
                    Some(n) if visited.contains(&n.id) => continue,
                    other => break other,
                }
            },
            None => return Err("ring is unreachable from the entrance".into()),
        };
        match next {
            Some(n) => {
                view.move_to(n.id)?;
                visited.insert(n.id);
                let frame = (n.id, pending(view, &visited));
                stack.push(frame);
            }
            None => {
                stack.pop();
                if let Some(&(parent, _)) = stack.last() {
                    view.move_to(parent)?;
                }
            }
        }
    }
    Ok(())
}

fn pending(view: &dyn SearchView, visited: &HashSet<NodeId>) -> Vec<NeighborStatus> {
    let mut near: Vec<NeighborStatus> = view
        .neighbors()
        .into_iter()
        .filter(|n| !visited.contains(&n.id))
        .collect();
    near.sort_by(|a, b| b.cmp(a));
    near
}
