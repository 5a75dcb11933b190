//! Scenario loading and configuration.
//!
//! Scenarios define the starting roster for a headless run and the orders
//! issued before each battle cycle. Units receive ids in the order they are
//! listed, starting at 1, and orders refer to units by those ids.

use std::path::Path;

use duel_core::prelude::*;
use std::result::Result;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error type for scenario operations.
#[derive(Error, Debug)]
pub enum ScenarioError {
    /// File not found.
    #[error("Scenario file not found: {0}")]
    FileNotFound(String),
    /// Failed to read a scenario or write output.
    #[error("Scenario IO failed: {0}")]
    Io(#[from] std::io::Error),
    /// Failed to parse RON.
    #[error("Failed to parse scenario: {0}")]
    ParseError(#[from] ron::error::SpannedError),
    /// The engine rejected the scenario's roster or configuration.
    #[error("Scenario rejected by engine: {0}")]
    Core(#[from] DuelError),
}

/// A complete scenario configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    /// Scenario name.
    pub name: String,
    /// Human-readable description.
    #[serde(default)]
    pub description: String,
    /// Engine configuration; engine defaults when absent.
    #[serde(default)]
    pub config: Option<BattleConfig>,
    /// Starting units in id order.
    pub units: Vec<UnitPlacement>,
    /// One entry per battle cycle.
    #[serde(default)]
    pub rounds: Vec<Round>,
}

/// A unit in the starting roster.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UnitPlacement {
    /// Owning player.
    pub owner: PlayerId,
    /// Starting position.
    pub position: Vec2,
    /// Starting strength.
    pub strength: f64,
    /// Starting facing; the owner's outward facing when absent.
    #[serde(default)]
    pub facing: Option<Vec2>,
}

impl UnitPlacement {
    /// Placement with the owner's outward facing.
    #[must_use]
    pub const fn new(owner: PlayerId, x: f64, y: f64, strength: f64) -> Self {
        Self {
            owner,
            position: Vec2::new(x, y),
            strength,
            facing: None,
        }
    }

    fn spawn_params(&self) -> UnitSpawnParams {
        let params = UnitSpawnParams::new(self.owner, self.position, self.strength);
        match self.facing {
            Some(facing) => params.facing(facing),
            None => params,
        }
    }
}

/// Orders issued before one battle cycle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Round {
    /// Orders, applied in listed order.
    #[serde(default)]
    pub orders: Vec<OrderEntry>,
}

/// A move order toward a target point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OrderEntry {
    /// Unit receiving the order.
    pub unit: UnitId,
    /// Point the unit should move toward.
    pub target: Vec2,
}

impl OrderEntry {
    /// Order `unit` toward `(x, y)`.
    #[must_use]
    pub const fn new(unit: UnitId, x: f64, y: f64) -> Self {
        Self {
            unit,
            target: Vec2::new(x, y),
        }
    }
}

impl Default for Scenario {
    fn default() -> Self {
        Self::head_on_duel()
    }
}

impl Scenario {
    /// Load a scenario from a RON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ScenarioError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ScenarioError::FileNotFound(path.display().to_string()));
        }
        let contents = std::fs::read_to_string(path)?;
        let scenario: Scenario = ron::from_str(&contents)?;
        Ok(scenario)
    }

    /// Load from a RON string (useful for embedded scenarios).
    pub fn from_ron_str(ron: &str) -> Result<Self, ScenarioError> {
        let scenario: Scenario = ron::from_str(ron)?;
        Ok(scenario)
    }

    /// Two strength-100 units 100 apart, facing each other, fighting three
    /// cycles without orders.
    #[must_use]
    pub fn head_on_duel() -> Self {
        Self {
            name: "Head-on Duel".to_string(),
            description: "Two equal units trading fire at close range".to_string(),
            config: None,
            units: vec![
                UnitPlacement::new(PlayerId::One, 100.0, 300.0, 100.0),
                UnitPlacement::new(PlayerId::Two, 200.0, 300.0, 100.0),
            ],
            rounds: vec![Round::default(); 3],
        }
    }

    /// Configuration the scenario runs with.
    #[must_use]
    pub fn battle_config(&self) -> BattleConfig {
        self.config.clone().unwrap_or_default()
    }

    /// Build a simulation holding the starting roster, ready for orders.
    pub fn build_simulation(&self) -> Result<BattleSimulation, ScenarioError> {
        let mut sim = BattleSimulation::new(self.battle_config())?;
        for placement in &self.units {
            sim.spawn_unit(placement.spawn_params())?;
        }
        sim.begin_orders()?;
        tracing::debug!(
            scenario = %self.name,
            units = self.units.len(),
            rounds = self.rounds.len(),
            "Scenario roster built"
        );
        Ok(sim)
    }
}
