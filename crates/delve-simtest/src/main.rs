//! Delve headless run harness.
//!
//! Generates seeded games, runs a diver through each one under the phase
//! executor and prints per-run results plus an aggregate. Runs entirely
//! in-process with no rendering.
//!
//! Usage:
//!   cargo run -p delve-simtest
//!   cargo run -p delve-simtest -- -s 12345 -n 20 --strategy direct
//!   cargo run -p delve-simtest -- --config sewer.json --no-timeout --json

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use tracing_subscriber::EnvFilter;

use delve_logic::config::{validate_config, GameConfig};
use delve_logic::diver::DiverKind;
use delve_logic::executor::{PhaseExecutor, PhaseOutcome, PhaseReport, RunReport};
use delve_logic::game::Game;
use delve_logic::generation::{next_seed, random_seed};

#[derive(Debug, Parser)]
#[command(name = "delve-simtest")]
#[command(about = "Run a diver through seeded sewers and report its scores")]
struct Cli {
    /// First seed; 0 draws a random seed for every run
    #[arg(short, long, default_value_t = 0)]
    seed: u64,

    /// Number of runs (at least 1)
    #[arg(
        short = 'n',
        long,
        default_value_t = 1,
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    runs: u32,

    /// Which built-in diver to run
    #[arg(long, value_enum, default_value = "greedy")]
    strategy: Strategy,

    /// JSON game configuration; missing keys keep their defaults
    #[arg(long)]
    config: Option<PathBuf>,

    /// Find phase time limit in seconds
    #[arg(long)]
    find_timeout: Option<f64>,

    /// Flee phase time limit in seconds
    #[arg(long)]
    flee_timeout: Option<f64>,

    /// Run both phases without a time limit
    #[arg(long, conflicts_with_all = ["find_timeout", "flee_timeout"])]
    no_timeout: bool,

    /// Print the run reports as JSON instead of text
    #[arg(long)]
    json: bool,

    /// Debug logging (RUST_LOG overrides)
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Strategy {
    Greedy,
    Direct,
}

impl From<Strategy> for DiverKind {
    fn from(s: Strategy) -> Self {
        match s {
            Strategy::Greedy => DiverKind::Greedy,
            Strategy::Direct => DiverKind::Direct,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = load_config(&cli)?;
    let diver = DiverKind::from(cli.strategy).build();

    if !cli.json {
        println!("=== Delve Run Harness ===\n");
        println!("diver: {}, runs: {}", diver.name(), cli.runs);
    }

    let mut reports = Vec::new();
    let mut seed = cli.seed;
    for i in 0..cli.runs {
        let run_seed = if cli.seed == 0 {
            random_seed()
        } else {
            if i > 0 {
                seed = next_seed(seed);
            }
            seed
        };
        let game = match Game::generate(run_seed, &config) {
            Ok(game) => game,
            Err(e) => {
                tracing::error!(seed = run_seed, error = %e, "could not generate game");
                continue;
            }
        };
        let mut executor = PhaseExecutor::new(game, diver.clone(), &config);
        let report = executor
            .run()
            .with_context(|| format!("executor misuse on seed {run_seed}"))?;
        if !cli.json {
            print_run(i + 1, &report);
        }
        reports.push(report);
    }

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    } else {
        print_summary(&reports);
    }
    Ok(())
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// File (or defaults), then command-line overrides, then validation.
fn load_config(cli: &Cli) -> Result<GameConfig> {
    let mut config = match &cli.config {
        Some(path) => GameConfig::load(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => GameConfig::default(),
    };
    if cli.no_timeout {
        config.find_timeout_secs = None;
        config.flee_timeout_secs = None;
    }
    if let Some(secs) = cli.find_timeout {
        config.find_timeout_secs = Some(secs);
    }
    if let Some(secs) = cli.flee_timeout {
        config.flee_timeout_secs = Some(secs);
    }

    let problems = validate_config(&config);
    if !problems.is_empty() {
        for p in &problems {
            eprintln!("  ✗ {p}");
        }
        bail!("{} configuration problem(s)", problems.len());
    }
    Ok(config)
}

// ── Output ──────────────────────────────────────────────────────────────

fn print_run(index: u32, report: &RunReport) {
    println!("\n--- Run {index} (seed {}) ---", report.seed);
    print_phase("find", &report.search);
    match &report.flee {
        Some(flee) => print_phase("flee", flee),
        None => println!("  - flee: not attempted"),
    }
    println!(
        "  coins: {}, bonus: {:.3}, score: {}",
        report.coins, report.bonus, report.score
    );
}

fn print_phase(name: &str, phase: &PhaseReport) {
    let icon = if phase.outcome.is_success() { "✓" } else { "✗" };
    let outcome = match &phase.outcome {
        PhaseOutcome::Succeeded => "succeeded".to_string(),
        PhaseOutcome::WrongTerminalNode => "stopped short of the target".to_string(),
        PhaseOutcome::Threw(message) => format!("failed: {message}"),
        PhaseOutcome::TimedOut => "timed out".to_string(),
        PhaseOutcome::BudgetExhausted => "ran out of steps".to_string(),
    };
    println!(
        "  {icon} {name}: {outcome} ({} steps, minimum {}, {} ms)",
        phase.steps_taken, phase.min_distance, phase.elapsed_ms
    );
    if let Some(left) = phase.distance_left {
        println!("      {left} steps short of the target");
    }
}

fn print_summary(reports: &[RunReport]) {
    let runs = reports.len();
    let found = reports.iter().filter(|r| r.search_succeeded()).count();
    let fled = reports.iter().filter(|r| r.flee_succeeded()).count();
    let total: u64 = reports.iter().map(|r| r.score).sum();
    let average = if runs == 0 { 0 } else { total / runs as u64 };

    println!(
        "\n=== RESULT: {found}/{runs} found the ring, {fled}/{runs} escaped, average score {average} ==="
    );
}
