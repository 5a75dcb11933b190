//! Headless battle runner.
//!
//! This binary plays battle scenarios without graphics and writes the
//! results as JSON lines on stdout. Designed for CI, tooling and
//! determinism checks.
//!
//! # Usage
//!
//! ```bash
//! # Run the built-in head-on duel
//! cargo run -p duel_headless
//!
//! # Run a scenario file, emitting every animation frame at 30 fps
//! cargo run -p duel_headless -- run --scenario scenarios/flank_attack.ron --frames --fps 30
//!
//! # Verify determinism over 10 runs
//! cargo run -p duel_headless -- verify --scenario scenarios/flank_attack.ron --runs 10
//! ```
//!
//! # Output
//!
//! Output (stdout): JSON events, one per line
//! Logs (stderr): Debug information
//!
//! See the protocol module for the event format.

use std::io;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use duel_headless::{
    runner::{verify_determinism, BattleRunner, RunnerConfig},
    scenario::Scenario,
};

#[derive(Parser)]
#[command(name = "duel_headless")]
#[command(about = "Headless battle runner for scenario playback and determinism checks")]
#[command(version)]
struct Cli {
    /// Enable verbose logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Play a scenario and write events to stdout
    Run {
        /// Scenario file to load (defaults to the built-in head-on duel)
        #[arg(short, long)]
        scenario: Option<PathBuf>,

        /// Emit a frame event for every animation step
        #[arg(long)]
        frames: bool,

        /// Animation steps per second of simulated time
        #[arg(long, default_value = "60", value_parser = clap::value_parser!(u32).range(1..=1000))]
        fps: u32,
    },

    /// Verify determinism by running the same scenario multiple times
    Verify {
        /// Scenario file to test (defaults to the built-in head-on duel)
        #[arg(short, long)]
        scenario: Option<PathBuf>,

        /// Number of verification runs
        #[arg(short, long, default_value = "5")]
        runs: u32,
    },
}

fn main() {
    let cli = Cli::parse();

    // Initialize logging to stderr (stdout is for protocol)
    let log_level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(true),
        )
        .with(tracing_subscriber::filter::LevelFilter::from_level(
            log_level,
        ))
        .init();

    match cli.command {
        Some(Commands::Run {
            scenario,
            frames,
            fps,
        }) => {
            cmd_run(scenario, frames, fps);
        }
        Some(Commands::Verify { scenario, runs }) => {
            cmd_verify(scenario, runs);
        }
        None => {
            cmd_run(None, false, RunnerConfig::default().fps);
        }
    }
}

/// Load the scenario at `path`, or the built-in duel, exiting on failure.
fn load_scenario(path: Option<PathBuf>) -> Scenario {
    let Some(path) = path else {
        return Scenario::head_on_duel();
    };
    tracing::info!("Loading scenario: {}", path.display());
    match Scenario::load(&path) {
        Ok(scenario) => scenario,
        Err(e) => {
            eprintln!("Failed to load scenario: {}", e);
            std::process::exit(1);
        }
    }
}

/// Play a scenario
fn cmd_run(scenario: Option<PathBuf>, frames: bool, fps: u32) {
    let scenario = load_scenario(scenario);
    let config = RunnerConfig {
        emit_frames: frames,
        fps,
    };

    let runner = BattleRunner::with_config(scenario, config);
    let stdout = io::stdout();
    if let Err(e) = runner.run_to_writer(stdout.lock()) {
        tracing::error!(error = %e, "Scenario run failed");
        eprintln!("FATAL: {}", e);
        std::process::exit(1);
    }
}

/// Verify determinism
fn cmd_verify(scenario: Option<PathBuf>, runs: u32) {
    let scenario = load_scenario(scenario);
    tracing::info!(
        "Verifying determinism: {} ({} runs)",
        scenario.name,
        runs
    );

    let report = match verify_determinism(&scenario, runs) {
        Ok(report) => report,
        Err(e) => {
            eprintln!("FAIL: Error during verification: {}", e);
            std::process::exit(1);
        }
    };

    if report.is_deterministic() {
        eprintln!("PASS: All {} runs produced identical results", runs);
        if let Some(hash) = report.final_hashes.first() {
            eprintln!("  Final hash: {:016x}", hash);
        }
    } else {
        eprintln!("FAIL: Non-determinism detected!");
        if let Some((run, cycle)) = report.first_divergence {
            eprintln!("  Run {} diverged at cycle {}", run, cycle + 1);
        }
        std::process::exit(1);
    }
}
