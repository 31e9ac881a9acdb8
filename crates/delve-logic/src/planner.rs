//! Greedy escape planning under a step budget.
//!
//! The planner walks the value-bearing nodes from richest to poorest and takes
//! the first one it can reach *and still make it to the exit from*, then
//! re-plans from there with the budget reduced by the walk. When nothing is
//! affordable it heads straight for the exit.
//!
//! The planner is myopic: an early cheap detour is never undone to free budget
//! for a better one later, so it can miss the best route (see
//! `test_greedy_is_not_optimal`).
//!
//! Every distance comes from [`shortest_path`]; the planner has no routing
//! logic of its own.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::graph::{Graph, NodeId};
use crate::pathfinding::{path_cost, shortest_path, Path};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanError {
    #[error("exit {exit} is unreachable from {start}")]
    ExitUnreachable { start: NodeId, exit: NodeId },
    #[error("shortest route to the exit costs {needed} but only {budget} steps remain")]
    BudgetTooSmall { needed: u64, budget: u64 },
}

/// A complete escape route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscapePlan {
    /// Accepted detour targets in visiting order, then the exit. Empty when
    /// the start already is the exit.
    pub waypoints: Vec<NodeId>,
    /// Every node walked, start first.
    pub route: Vec<NodeId>,
    /// Total edge length of `route`; never above the budget given to [`plan`].
    pub cost: u64,
    /// Value picked up along `route`, excluding anything on the start node.
    pub value: u64,
}

/// Plan a route from `start` to `exit` within `budget` steps.
///
/// `values` is the remaining value per node (a run's overlay). Nodes walked
/// through on the way to an accepted waypoint count as collected and drop out
/// of later passes.
pub fn plan(
    graph: &Graph,
    start: NodeId,
    exit: NodeId,
    values: &HashMap<NodeId, u32>,
    budget: u64,
) -> Result<EscapePlan, PlanError> {
    let direct = shortest_path(graph, start, exit)
        .ok_or(PlanError::ExitUnreachable { start, exit })?;
    let needed = path_cost(graph, &direct);
    if needed > budget {
        return Err(PlanError::BudgetTooSmall { needed, budget });
    }
    if start == exit {
        return Ok(EscapePlan {
            waypoints: Vec::new(),
            route: vec![start],
            cost: 0,
            value: 0,
        });
    }

    let mut remaining: HashMap<NodeId, u32> = values
        .iter()
        .filter(|&(&id, &v)| v > 0 && id != start)
        .map(|(&id, &v)| (id, v))
        .collect();
    // Costs back to the exit never change within one plan.
    let mut back_costs: HashMap<NodeId, Option<u64>> = HashMap::new();

    let mut here = start;
    let mut left = budget;
    let mut route = Path::from_nodes(graph, vec![start])
        .map_err(|_| PlanError::ExitUnreachable { start, exit })?;
    let mut waypoints = Vec::new();
    let mut value = 0u64;

    loop {
        let candidates = ranked_candidates(&remaining);
        let mut accepted = None;
        for c in candidates {
            let Some(out) = shortest_path(graph, here, c) else {
                continue;
            };
            let out_cost = path_cost(graph, &out);
            if out_cost > left {
                continue;
            }
            let back = *back_costs.entry(c).or_insert_with(|| {
                shortest_path(graph, c, exit).map(|p| path_cost(graph, &p))
            });
            match back {
                Some(back) if out_cost + back <= left => {
                    accepted = Some((c, out, out_cost));
                    break;
                }
                _ => {}
            }
        }

        let Some((c, out, out_cost)) = accepted else {
            break;
        };
        debug!(node = %c, cost = out_cost, left, "detour accepted");
        for id in out.nodes() {
            value += u64::from(remaining.remove(id).unwrap_or(0));
        }
        route
            .extend(&out)
            .map_err(|_| PlanError::ExitUnreachable { start: here, exit })?;
        waypoints.push(c);
        left -= out_cost;
        here = c;
    }

    // Feasibility of the last waypoint guarantees this path exists and fits.
    let home = shortest_path(graph, here, exit)
        .ok_or(PlanError::ExitUnreachable { start: here, exit })?;
    for id in home.nodes() {
        value += u64::from(remaining.remove(id).unwrap_or(0));
    }
    route
        .extend(&home)
        .map_err(|_| PlanError::ExitUnreachable { start: here, exit })?;
    if waypoints.last() != Some(&exit) {
        waypoints.push(exit);
    }
    let cost = path_cost(graph, &route);
    debug_assert!(cost <= budget);

    Ok(EscapePlan {
        waypoints,
        route: route.into_nodes(),
        cost,
        value,
    })
}

/// Value nodes richest first; equal values by ascending id.
fn ranked_candidates(remaining: &HashMap<NodeId, u32>) -> Vec<NodeId> {
    let mut ranked: Vec<(NodeId, u32)> = remaining.iter().map(|(&id, &v)| (id, v)).collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    ranked.into_iter().map(|(id, _)| id).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{GraphBuilder, Tile};

    fn graph_from(n: u32, edges: &[(u32, u32, u32)], values: &[(u32, u32)], exit: u32) -> Graph {
        let mut b = GraphBuilder::new();
        for i in 0..n {
            b.add_node(Tile::new(0, i as i32), 0).unwrap();
        }
        for &(id, v) in values {
            b.set_value(NodeId(id), v).unwrap();
        }
        for &(x, y, len) in edges {
            b.add_edge(NodeId(x), NodeId(y), len).unwrap();
        }
        b.build(NodeId(0), NodeId(exit)).unwrap()
    }

    /// Start 0, exit 1 (cost 4 direct), coin node 2 hanging off 0 at cost 3
    /// and off 1 at cost 3: the round trip 0→2→1 costs 6.
    fn one_coin() -> Graph {
        graph_from(3, &[(0, 1, 4), (0, 2, 3), (2, 1, 3)], &[(2, 10)], 1)
    }

    #[test]
    fn test_budget_exactly_covers_detour() {
        let g = one_coin();
        let plan = plan(&g, NodeId(0), NodeId(1), &g.value_overlay(), 6).unwrap();
        assert_eq!(plan.waypoints, vec![NodeId(2), NodeId(1)]);
        assert_eq!(plan.route, vec![NodeId(0), NodeId(2), NodeId(1)]);
        assert_eq!(plan.cost, 6);
        assert_eq!(plan.value, 10);
    }

    #[test]
    fn test_budget_one_short_goes_direct() {
        let g = one_coin();
        let plan = plan(&g, NodeId(0), NodeId(1), &g.value_overlay(), 5).unwrap();
        assert_eq!(plan.waypoints, vec![NodeId(1)]);
        assert_eq!(plan.route, vec![NodeId(0), NodeId(1)]);
        assert_eq!(plan.cost, 4);
        assert_eq!(plan.value, 0);
    }

    #[test]
    fn test_no_value_nodes() {
        let g = graph_from(3, &[(0, 1, 1), (1, 2, 1)], &[], 2);
        let plan = plan(&g, NodeId(0), NodeId(2), &g.value_overlay(), 100).unwrap();
        assert_eq!(plan.waypoints, vec![NodeId(2)]);
        assert_eq!(plan.route, vec![NodeId(0), NodeId(1), NodeId(2)]);
    }

    #[test]
    fn test_start_is_exit() {
        let g = graph_from(2, &[(0, 1, 1)], &[(1, 5)], 0);
        let plan = plan(&g, NodeId(0), NodeId(0), &g.value_overlay(), 50).unwrap();
        assert!(plan.waypoints.is_empty());
        assert_eq!(plan.route, vec![NodeId(0)]);
        assert_eq!(plan.cost, 0);
    }

    #[test]
    fn test_richest_first() {
        // 0 - 1 (exit), coins on 2 (value 3) and 3 (value 9), both spurs.
        let g = graph_from(
            4,
            &[(0, 1, 1), (0, 2, 1), (0, 3, 1)],
            &[(2, 3), (3, 9)],
            1,
        );
        let plan = plan(&g, NodeId(0), NodeId(1), &g.value_overlay(), 100).unwrap();
        assert_eq!(plan.waypoints, vec![NodeId(3), NodeId(2), NodeId(1)]);
        assert_eq!(plan.value, 12);
    }

    #[test]
    fn test_greedy_is_not_optimal() {
        // A rich coin far away crowds out two cheaper coins worth more in
        // total. The planner takes the rich one first and keeps it.
        //   exit=1 next to start 0; spur 0-2 (cost 5, value 10);
        //   spur 0-3 and 0-4 (cost 2 each, value 6 each). Budget 11.
        let g = graph_from(
            5,
            &[(0, 1, 1), (0, 2, 5), (0, 3, 2), (0, 4, 2)],
            &[(2, 10), (3, 6), (4, 6)],
            1,
        );
        let plan = plan(&g, NodeId(0), NodeId(1), &g.value_overlay(), 11).unwrap();
        assert_eq!(plan.value, 10);
        assert_eq!(plan.waypoints, vec![NodeId(2), NodeId(1)]);
        assert!(plan.cost <= 11);
    }

    #[test]
    fn test_unreachable_coin_is_skipped() {
        let g = graph_from(4, &[(0, 1, 1), (1, 2, 1)], &[(3, 50), (2, 1)], 1);
        let plan = plan(&g, NodeId(0), NodeId(1), &g.value_overlay(), 10).unwrap();
        assert_eq!(plan.waypoints, vec![NodeId(2), NodeId(1)]);
        assert_eq!(plan.value, 1);
    }

    #[test]
    fn test_pickups_on_the_way_are_counted_once() {
        // 0 - 2 - 3 chain with exit 1 hanging off 0; coins on 2 and 3.
        let g = graph_from(
            4,
            &[(0, 1, 1), (0, 2, 1), (2, 3, 1)],
            &[(2, 4), (3, 7)],
            1,
        );
        let plan = plan(&g, NodeId(0), NodeId(1), &g.value_overlay(), 20).unwrap();
        // 3 is richest; walking to it passes 2, which is then already taken.
        assert_eq!(plan.waypoints, vec![NodeId(3), NodeId(1)]);
        assert_eq!(plan.value, 11);
    }

    #[test]
    fn test_errors() {
        let g = graph_from(3, &[(0, 1, 5)], &[], 2);
        assert_eq!(
            plan(&g, NodeId(0), NodeId(2), &HashMap::new(), 10),
            Err(PlanError::ExitUnreachable {
                start: NodeId(0),
                exit: NodeId(2)
            })
        );
        assert_eq!(
            plan(&g, NodeId(0), NodeId(1), &HashMap::new(), 4),
            Err(PlanError::BudgetTooSmall {
                needed: 5,
                budget: 4
            })
        );
    }
}
