//! JSON-lines output of the headless runner.
//!
//! Every event is one JSON object on its own line on stdout. Logs go to
//! stderr, so stdout can be piped straight into a consumer.
//!
//! # Event Flow
//!
//! 1. `ready` once the scenario roster is built
//! 2. Per round: `cycle_started`, optional `frame` events, `cycle_complete`
//! 3. `summary` after the last round, or as soon as one side is wiped out
//!
//! # Example Session
//!
//! ```text
//! <- {"type":"ready","version":"1.0","scenario":"Head-on Duel","units":2}
//! <- {"type":"cycle_started","cycle":1,"engagements":2,"retreating":0}
//! <- {"type":"cycle_complete","cycle":1,"removed":0,"merged":0,"engagements":2,"retreated":0,"roster":[...],"hash":1234}
//! <- {"type":"summary","scenario":"Head-on Duel","cycles":3,"player_one":{...},"player_two":{...},"hash":5678}
//! ```

use duel_core::prelude::*;
use std::result::Result;
use serde::{Deserialize, Serialize};

/// Protocol version reported in the `ready` event.
pub const PROTOCOL_VERSION: &str = "1.0";

// ============================================================================
// Events (Runner -> Consumer)
// ============================================================================

/// Events written by the headless runner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// The scenario roster is built and the first round is about to start.
    Ready {
        version: String,
        scenario: String,
        units: usize,
    },

    /// Targeting, combat and move planning finished for a cycle.
    CycleStarted {
        cycle: u64,
        engagements: usize,
        retreating: usize,
    },

    /// One animation frame.
    Frame {
        cycle: u64,
        progress: f64,
        units: Vec<UnitState>,
    },

    /// A cycle was committed and consolidated.
    CycleComplete {
        cycle: u64,
        removed: usize,
        merged: usize,
        engagements: usize,
        retreated: usize,
        roster: Vec<UnitState>,
        hash: u64,
    },

    /// The run is over.
    Summary {
        scenario: String,
        cycles: u64,
        player_one: SideSummary,
        player_two: SideSummary,
        hash: u64,
    },
}

// ============================================================================
// State Types
// ============================================================================

/// State of a single unit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UnitState {
    pub id: UnitId,
    pub owner: u8,
    pub x: f64,
    pub y: f64,
    pub facing_x: f64,
    pub facing_y: f64,
    pub strength: f64,
}

impl From<&Unit> for UnitState {
    fn from(unit: &Unit) -> Self {
        Self {
            id: unit.id(),
            owner: unit.owner().number(),
            x: unit.position.x,
            y: unit.position.y,
            facing_x: unit.facing().x,
            facing_y: unit.facing().y,
            strength: unit.strength(),
        }
    }
}

impl From<&RenderUnit> for UnitState {
    fn from(unit: &RenderUnit) -> Self {
        Self {
            id: unit.id,
            owner: unit.owner.number(),
            x: unit.position.x,
            y: unit.position.y,
            facing_x: unit.facing.x,
            facing_y: unit.facing.y,
            strength: unit.strength,
        }
    }
}

/// Remaining forces of one player.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SideSummary {
    pub units: usize,
    pub strength: f64,
}

impl SideSummary {
    /// Summarize `owner`'s units in `roster`.
    #[must_use]
    pub fn of(roster: &Roster, owner: PlayerId) -> Self {
        Self {
            units: roster.count_for(owner),
            strength: roster.total_strength(owner),
        }
    }
}

// ============================================================================
// Helpers
// ============================================================================

impl Event {
    /// Create a ready event.
    pub fn ready(scenario: &str, units: usize) -> Self {
        Self::Ready {
            version: PROTOCOL_VERSION.to_string(),
            scenario: scenario.to_string(),
            units,
        }
    }

    /// Create a frame event.
    pub fn frame(cycle: u64, frame: &FrameSnapshot) -> Self {
        Self::Frame {
            cycle,
            progress: frame.progress,
            units: frame.units.iter().map(UnitState::from).collect(),
        }
    }

    /// Create a cycle-complete event from a committed cycle.
    pub fn cycle_complete(result: &CycleResult, hash: u64) -> Self {
        Self::CycleComplete {
            cycle: result.cycle,
            removed: result.removed_count(),
            merged: result.merged_count(),
            engagements: result.engagements.len(),
            retreated: result.retreated.len(),
            roster: result.roster.iter().map(UnitState::from).collect(),
            hash,
        }
    }

    /// Event type name, as written in the `type` field.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Ready { .. } => "ready",
            Self::CycleStarted { .. } => "cycle_started",
            Self::Frame { .. } => "frame",
            Self::CycleComplete { .. } => "cycle_complete",
            Self::Summary { .. } => "summary",
        }
    }

    /// Serialize to JSON line (with newline).
    pub fn to_json_line(&self) -> String {
        let mut json = serde_json::to_string(self).unwrap_or_else(|e| {
            format!(
                r#"{{"type":"error","message":"Serialization failed: {}"}}"#,
                e
            )
        });
        json.push('\n');
        json
    }

    /// Parse from a JSON line.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
