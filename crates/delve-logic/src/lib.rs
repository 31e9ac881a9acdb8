//! Pure game logic for Delve.
//!
//! A diver first searches an unknown sewer for a ring, seeing only its
//! neighbors and how far away the ring is, then flees through a fully known
//! sewer to the exit within a step budget, picking up as many coins as it can
//! on the way. Strategies are plugged in through the [`diver::Diver`] trait
//! and run under a timeout by the [`executor`].
//!
//! Nothing here renders or touches the terminal; the `delve-simtest` binary
//! is the command-line front end.
//!
//! # Module Overview
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | Game configuration, JSON loading and validation |
//! | [`diver`] | The strategy trait and the built-in greedy and direct divers |
//! | [`executor`] | Phase state machine, worker supervision, run reports |
//! | [`game`] | A search/escape sewer pair and its minimum distances |
//! | [`generation`] | Seeded sewer digging and seed chaining |
//! | [`graph`] | Node arena with stable ids and weighted undirected edges |
//! | [`heap`] | Indexed binary heap with priority updates |
//! | [`pathfinding`] | Dijkstra shortest paths and path costs |
//! | [`planner`] | Greedy coin-collecting escape planner |
//! | [`scoring`] | Flee budget, find bonus and final score |
//! | [`state`] | Role-scoped views, phase ledger and cancellation |

pub mod config;
pub mod diver;
pub mod executor;
pub mod game;
pub mod generation;
pub mod graph;
pub mod heap;
pub mod pathfinding;
pub mod planner;
pub mod scoring;
pub mod state;
