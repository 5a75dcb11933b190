//! Headless battle runner for CI and tooling.
//!
//! This crate plays RON battle scenarios through the engine without
//! graphics and reports what happened as JSON lines. This enables:
//!
//! - **CI verification**: Automated checks of battle outcomes and determinism
//! - **Tooling**: Any consumer that can read JSON can follow a battle frame by frame
//!
//! # Protocol
//!
//! - **stdout**: Events (JSON, one object per line)
//! - **stderr**: Debug logs (human-readable)
//!
//! See [`protocol`] module for the full event format.
//!
//! # Example
//!
//! ```bash
//! # Run a scenario
//! cargo run -p duel_headless -- run --scenario scenarios/flank_attack.ron
//!
//! # Verify determinism
//! cargo run -p duel_headless -- verify --scenario scenarios/flank_attack.ron --runs 10
//! ```

pub mod protocol;
pub mod runner;
pub mod scenario;

pub use protocol::{Event, SideSummary, UnitState};
pub use runner::{verify_determinism, BattleRunner, RunSummary, RunnerConfig, VerifyReport};
pub use scenario::{OrderEntry, Round, Scenario, ScenarioError, UnitPlacement};
