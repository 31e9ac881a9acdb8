//! Phase executor: runs a [`Diver`] through one game and classifies what it
//! did.
//!
//! ```text
//! Idle → Searching → SearchSucceeded → Fleeing → FleeSucceeded → Done
//!                  ↘ SearchFailed → Done       ↘ FleeFailed → Done
//! ```
//!
//! Each phase runs the strategy on its own named thread. The executor waits
//! for it on a channel with a timeout. On timeout it raises the phase's
//! cancel flag, freezes the ledger, scores the frozen snapshot and moves on
//! without joining the worker. A worker that ignores the flag can keep
//! spinning, but every move it tries is refused.

use std::any::Any;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::config::GameConfig;
use crate::diver::Diver;
use crate::game::Game;
use crate::graph::NodeId;
use crate::pathfinding::distance;
use crate::scoring;
use crate::state::{EscapeState, PhaseLink, SearchState, Snapshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stage {
    Idle,
    Searching,
    SearchSucceeded,
    SearchFailed,
    Fleeing,
    FleeSucceeded,
    FleeFailed,
    Done,
}

/// How a phase ended. Produced exactly once per phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PhaseOutcome {
    Succeeded,
    /// The strategy returned while not standing on the phase target.
    WrongTerminalNode,
    /// The strategy returned an error or panicked.
    Threw(String),
    TimedOut,
    /// The strategy tried a move it could not afford.
    BudgetExhausted,
}

impl PhaseOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, PhaseOutcome::Succeeded)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseReport {
    pub outcome: PhaseOutcome,
    pub terminal: NodeId,
    /// Sum of walked edge lengths.
    pub steps_taken: u32,
    /// Budget left; only for the flee phase.
    pub steps_remaining: Option<u32>,
    /// Shortest distance from the phase start to its target.
    pub min_distance: u64,
    /// Shortest distance still separating the terminal node from the target
    /// when the phase failed.
    pub distance_left: Option<u64>,
    pub elapsed_ms: u64,
}

/// Everything known about a finished run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub seed: u64,
    pub diver: String,
    pub search: PhaseReport,
    /// Absent when the search failed.
    pub flee: Option<PhaseReport>,
    pub coins: u32,
    pub bonus: f64,
    pub score: u64,
}

impl RunReport {
    pub fn search_succeeded(&self) -> bool {
        self.search.outcome.is_success()
    }

    pub fn flee_succeeded(&self) -> bool {
        self.flee.as_ref().is_some_and(|f| f.outcome.is_success())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecutorError {
    #[error("cannot {action} while {stage:?}")]
    InvalidTransition { stage: Stage, action: &'static str },
}

/// Drives one diver through one game.
pub struct PhaseExecutor {
    game: Game,
    diver: Arc<dyn Diver>,
    config: GameConfig,
    stage: Stage,
    search: Option<PhaseReport>,
    flee: Option<PhaseReport>,
    coins: u32,
    report: Option<RunReport>,
}

impl PhaseExecutor {
    pub fn new(game: Game, diver: Arc<dyn Diver>, config: &GameConfig) -> Self {
        Self {
            game,
            diver,
            config: config.clone(),
            stage: Stage::Idle,
            search: None,
            flee: None,
            coins: 0,
            report: None,
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// The finished report, once [`finish`](Self::finish) has run.
    pub fn report(&self) -> Option<&RunReport> {
        self.report.as_ref()
    }

    /// Drive the whole state machine and return the report.
    pub fn run(&mut self) -> Result<RunReport, ExecutorError> {
        if self.run_search_phase()?.is_success() {
            self.run_flee_phase()?;
        }
        Ok(self.finish()?.clone())
    }

    pub fn run_search_phase(&mut self) -> Result<PhaseOutcome, ExecutorError> {
        self.require_stage(Stage::Idle, "search")?;
        self.stage = Stage::Searching;

        let graph = Arc::clone(&self.game.search);
        let target = graph.target();
        let link = PhaseLink::new(graph.entrance(), None, Default::default());
        let mut view = SearchState::new(Arc::clone(&graph), link.clone());
        let diver = Arc::clone(&self.diver);

        let started = Instant::now();
        let ending = supervise("find", self.config.find_timeout(), &link, move || {
            diver.find(&mut view)
        });
        let snap = ending.snapshot();

        let outcome = match ending {
            Ending::Returned(_) if snap.position == target => PhaseOutcome::Succeeded,
            Ending::Returned(_) => PhaseOutcome::WrongTerminalNode,
            Ending::Failed(message, _) => PhaseOutcome::Threw(message),
            Ending::TimedOut(_) => PhaseOutcome::TimedOut,
        };
        let distance_left =
            (!outcome.is_success()).then(|| distance(&graph, snap.position, target).unwrap_or(0));
        log_phase("find", &outcome, &snap);

        self.stage = if outcome.is_success() {
            Stage::SearchSucceeded
        } else {
            Stage::SearchFailed
        };
        self.search = Some(PhaseReport {
            outcome: outcome.clone(),
            terminal: snap.position,
            steps_taken: snap.steps_taken,
            steps_remaining: None,
            min_distance: self.game.min_find_steps,
            distance_left,
            elapsed_ms: elapsed_ms(started),
        });
        Ok(outcome)
    }

    pub fn run_flee_phase(&mut self) -> Result<PhaseOutcome, ExecutorError> {
        self.require_stage(Stage::SearchSucceeded, "flee")?;
        self.stage = Stage::Fleeing;

        let graph = Arc::clone(&self.game.escape);
        let exit = graph.target();
        let budget = scoring::flee_budget(self.game.min_flee_steps, graph.len(), &self.config);
        let link = PhaseLink::new(graph.entrance(), Some(budget), graph.value_overlay());
        link.collect_here();
        let mut view = EscapeState::new(Arc::clone(&graph), link.clone());
        let diver = Arc::clone(&self.diver);

        let started = Instant::now();
        let ending = supervise("flee", self.config.flee_timeout(), &link, move || {
            diver.flee(&mut view)
        });
        let snap = ending.snapshot();

        let outcome = match ending {
            Ending::TimedOut(_) => PhaseOutcome::TimedOut,
            _ if snap.budget_exhausted => PhaseOutcome::BudgetExhausted,
            Ending::Returned(_) if snap.position == exit => PhaseOutcome::Succeeded,
            Ending::Returned(_) => PhaseOutcome::WrongTerminalNode,
            Ending::Failed(message, _) => PhaseOutcome::Threw(message),
        };
        let distance_left =
            (!outcome.is_success()).then(|| distance(&graph, snap.position, exit).unwrap_or(0));
        log_phase("flee", &outcome, &snap);

        self.stage = if outcome.is_success() {
            Stage::FleeSucceeded
        } else {
            Stage::FleeFailed
        };
        self.coins = snap.coins;
        self.flee = Some(PhaseReport {
            outcome: outcome.clone(),
            terminal: snap.position,
            steps_taken: snap.steps_taken,
            steps_remaining: snap.steps_remaining,
            min_distance: self.game.min_flee_steps,
            distance_left,
            elapsed_ms: elapsed_ms(started),
        });
        Ok(outcome)
    }

    /// Close the run and compute its score.
    pub fn finish(&mut self) -> Result<&RunReport, ExecutorError> {
        if !matches!(
            self.stage,
            Stage::SearchFailed | Stage::FleeSucceeded | Stage::FleeFailed
        ) {
            return Err(ExecutorError::InvalidTransition {
                stage: self.stage,
                action: "finish",
            });
        }
        let Some(search) = self.search.clone() else {
            return Err(ExecutorError::InvalidTransition {
                stage: self.stage,
                action: "finish",
            });
        };

        let bonus = scoring::bonus_factor(search.steps_taken, self.game.min_find_steps, &self.config);
        let fled = self.stage == Stage::FleeSucceeded;
        let score = scoring::score(bonus, self.coins, fled);
        self.stage = Stage::Done;

        info!(
            seed = self.game.seed,
            diver = self.diver.name(),
            coins = self.coins,
            bonus,
            score,
            "run finished"
        );
        Ok(self.report.insert(RunReport {
            seed: self.game.seed,
            diver: self.diver.name().to_string(),
            search,
            flee: self.flee.clone(),
            coins: self.coins,
            bonus,
            score,
        }))
    }

    fn require_stage(&self, stage: Stage, action: &'static str) -> Result<(), ExecutorError> {
        if self.stage == stage {
            Ok(())
        } else {
            Err(ExecutorError::InvalidTransition {
                stage: self.stage,
                action,
            })
        }
    }
}

/// How the worker ended, with the ledger snapshot frozen at that moment.
enum Ending {
    Returned(Snapshot),
    Failed(String, Snapshot),
    TimedOut(Snapshot),
}

impl Ending {
    fn snapshot(&self) -> Snapshot {
        match self {
            Ending::Returned(s) | Ending::Failed(_, s) | Ending::TimedOut(s) => s.clone(),
        }
    }
}

/// Run `job` on a worker thread and wait at most `timeout` for it.
fn supervise<F, E>(phase: &str, timeout: Option<Duration>, link: &PhaseLink, job: F) -> Ending
where
    F: FnOnce() -> Result<(), E> + Send + 'static,
    E: ToString + 'static,
{
    let (tx, rx) = mpsc::channel();
    let spawned = thread::Builder::new()
        .name(format!("delve-{phase}"))
        .spawn(move || {
            let result = job().map_err(|e| e.to_string());
            // The supervisor may have given up already.
            let _ = tx.send(result);
        });
    let handle = match spawned {
        Ok(handle) => handle,
        Err(e) => {
            return Ending::Failed(format!("cannot start {phase} worker: {e}"), link.finish());
        }
    };

    let received = match timeout {
        Some(limit) => rx.recv_timeout(limit),
        None => rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
    };
    match received {
        Ok(Ok(())) => {
            let snap = link.finish();
            let _ = handle.join();
            Ending::Returned(snap)
        }
        Ok(Err(message)) => {
            let snap = link.finish();
            let _ = handle.join();
            Ending::Failed(message, snap)
        }
        Err(RecvTimeoutError::Timeout) => {
            let snap = link.cancel();
            warn!(phase, "strategy timed out; abandoning worker");
            drop(handle);
            Ending::TimedOut(snap)
        }
        Err(RecvTimeoutError::Disconnected) => {
            let snap = link.finish();
            let message = match handle.join() {
                Err(payload) => panic_message(payload.as_ref()),
                Ok(()) => "worker exited without reporting".to_string(),
            };
            Ending::Failed(message, snap)
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panicked: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panicked: {s}")
    } else {
        "panicked".to_string()
    }
}

fn log_phase(phase: &str, outcome: &PhaseOutcome, snap: &Snapshot) {
    if outcome.is_success() {
        info!(phase, steps = snap.steps_taken, node = %snap.position, "phase succeeded");
    } else {
        warn!(phase, ?outcome, steps = snap.steps_taken, node = %snap.position, "phase failed");
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
