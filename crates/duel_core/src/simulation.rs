//! Battle-cycle state machine.
//!
//! [`BattleSimulation`] owns the roster and configuration and advances
//! through the phases of a round:
//!
//! ```text
//! Idle -> AwaitingOrders -> Animating { elapsed } -> Consolidating -> AwaitingOrders
//! ```
//!
//! [`start_cycle`](BattleSimulation::start_cycle) freezes a
//! [`BattleSnapshot`] and runs targeting, combat resolution and retreat
//! planning against it. Nothing touches the roster until the animation
//! finishes; [`tick`](BattleSimulation::tick) then commits strengths,
//! positions and facings in one step and consolidates.
//!
//! # Determinism
//!
//! - Units are processed in id order
//! - No system randomness
//! - Frames are a pure function of elapsed time
//! - Same roster and orders always produce the same result
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//!
//! use duel_core::prelude::*;
//!
//! let mut sim = BattleSimulation::default();
//! sim.place_unit(PlayerId::One, Vec2::new(100.0, 300.0), 100.0).unwrap();
//! sim.place_unit(PlayerId::Two, Vec2::new(600.0, 300.0), 100.0).unwrap();
//! sim.begin_orders().unwrap();
//!
//! let result = sim.run_cycle(Duration::from_millis(16)).unwrap();
//! assert_eq!(result.roster.len(), 2);
//! assert_eq!(sim.phase(), Phase::AwaitingOrders);
//! ```

use std::collections::hash_map::DefaultHasher;
use std::collections::HashSet;
use std::hash::{Hash, Hasher};
use std::time::Duration;

use serde::Serialize;

use crate::animation::{Animator, FrameSnapshot};
use crate::combat::{resolve_combat, CombatBreakdown, CombatOutcome};
use crate::components::{MoveOrder, PlayerId, Unit, UnitId, UnitSpawnParams};
use crate::config::BattleConfig;
use crate::consolidation::{consolidate, MergeRecord};
use crate::error::{DuelError, Result};
use crate::math::Vec2;
use crate::retreat::{plan_moves, MovePlan};
use crate::roster::Roster;
use crate::snapshot::BattleSnapshot;
use crate::targeting::{build_engagements, Engagement, EngagementGraph};

/// Phase of the battle loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Phase {
    /// Deployment: units may be placed.
    Idle,
    /// Players are issuing orders for the next cycle.
    AwaitingOrders,
    /// A cycle is being animated.
    Animating {
        /// Time since the cycle started.
        elapsed: Duration,
    },
    /// Results are being committed and the roster consolidated.
    Consolidating,
}

/// Everything a finished cycle changed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CycleResult {
    /// Cycle number, starting at 1.
    pub cycle: u64,
    /// Roster after consolidation.
    pub roster: Roster,
    /// Units pruned below their survival floor (dead units included).
    pub removed: Vec<UnitId>,
    /// Absorptions performed by the merge pass.
    pub merged: Vec<MergeRecord>,
    /// Engagements the cycle was resolved from.
    pub engagements: Vec<Engagement>,
    /// Units that retreated.
    pub retreated: Vec<UnitId>,
    /// Per-unit combat bookkeeping in id order.
    pub combat: Vec<CombatBreakdown>,
}

impl CycleResult {
    /// Number of units removed.
    #[must_use]
    pub fn removed_count(&self) -> usize {
        self.removed.len()
    }

    /// Number of units absorbed by merging.
    #[must_use]
    pub fn merged_count(&self) -> usize {
        self.merged.len()
    }
}

/// Events produced by one [`BattleSimulation::tick`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickEvents {
    /// Frame to render, present while a cycle is animating.
    pub frame: Option<FrameSnapshot>,
    /// Present exactly once, on the tick that completes the cycle.
    pub result: Option<CycleResult>,
}

impl TickEvents {
    /// Whether this tick completed a cycle.
    #[must_use]
    pub fn is_cycle_complete(&self) -> bool {
        self.result.is_some()
    }
}

/// Frozen inputs and pending deltas of the cycle being animated.
#[derive(Debug, Clone)]
struct PendingCycle {
    graph: EngagementGraph,
    outcome: CombatOutcome,
    plans: Vec<MovePlan>,
    animator: Animator,
}

/// The battle engine.
///
/// Holds the roster, the configuration and the in-flight cycle. All state
/// lives here; components are plain functions over a snapshot.
#[derive(Debug, Clone)]
pub struct BattleSimulation {
    config: BattleConfig,
    roster: Roster,
    phase: Phase,
    cycle: u64,
    pending: Option<PendingCycle>,
}

impl BattleSimulation {
    /// Create an empty simulation in the `Idle` phase.
    pub fn new(config: BattleConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::with_valid_config(config))
    }

    fn with_valid_config(config: BattleConfig) -> Self {
        Self {
            config,
            roster: Roster::new(),
            phase: Phase::Idle,
            cycle: 0,
            pending: None,
        }
    }

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> &BattleConfig {
        &self.config
    }

    /// Current roster.
    #[must_use]
    pub const fn roster(&self) -> &Roster {
        &self.roster
    }

    /// Current phase.
    #[must_use]
    pub const fn phase(&self) -> Phase {
        self.phase
    }

    /// Number of completed cycles.
    #[must_use]
    pub const fn cycle(&self) -> u64 {
        self.cycle
    }

    /// Get a unit by id.
    pub fn unit(&self, id: UnitId) -> Result<&Unit> {
        self.roster.get(id)
    }

    fn require(&self, operation: &'static str, allowed: &[Phase]) -> Result<()> {
        if allowed.contains(&self.phase) {
            Ok(())
        } else {
            Err(DuelError::InvalidPhase {
                operation,
                phase: self.phase,
            })
        }
    }

    fn require_not_animating(&self, operation: &'static str) -> Result<()> {
        self.require(operation, &[Phase::Idle, Phase::AwaitingOrders])
    }

    /// Place a unit under the deployment rules. Only allowed while `Idle`.
    pub fn place_unit(&mut self, owner: PlayerId, position: Vec2, strength: f64) -> Result<UnitId> {
        self.require("place_unit", &[Phase::Idle])?;
        let id = self.roster.place(owner, position, strength, &self.config)?;
        tracing::debug!(id, owner = owner.number(), strength, "Unit placed");
        Ok(id)
    }

    /// Add a unit without placement rules.
    pub fn spawn_unit(&mut self, params: UnitSpawnParams) -> Result<UnitId> {
        self.require_not_animating("spawn_unit")?;
        self.roster.spawn(params)
    }

    /// End deployment and open order entry.
    pub fn begin_orders(&mut self) -> Result<()> {
        self.require("begin_orders", &[Phase::Idle])?;
        self.phase = Phase::AwaitingOrders;
        tracing::debug!(units = self.roster.len(), "Awaiting orders");
        Ok(())
    }

    /// Order a unit toward a target point. See [`Roster::issue_order`].
    pub fn issue_order(&mut self, id: UnitId, target: Vec2) -> Result<Option<MoveOrder>> {
        self.require("issue_order", &[Phase::AwaitingOrders])?;
        self.roster.issue_order(id, target, &self.config)
    }

    /// Attach a prepared order to a unit.
    ///
    /// The order distance must lie in `[min_order_distance, max_move_range]`
    /// of this simulation's config.
    pub fn set_order(&mut self, id: UnitId, order: MoveOrder) -> Result<()> {
        self.require("set_order", &[Phase::AwaitingOrders])?;
        let distance = order.distance();
        if distance < self.config.min_order_distance || distance > self.config.max_move_range {
            return Err(DuelError::InvalidOrderDistance {
                distance,
                min: self.config.min_order_distance,
                max: self.config.max_move_range,
            });
        }
        self.roster.set_order(id, order)
    }

    /// Drop a unit's order.
    pub fn clear_order(&mut self, id: UnitId) -> Result<()> {
        self.require("clear_order", &[Phase::AwaitingOrders])?;
        self.roster.clear_order(id)
    }

    /// Split a unit in two. See [`Roster::split`].
    pub fn split_unit(&mut self, id: UnitId, offset_direction: Vec2) -> Result<UnitId> {
        self.require_not_animating("split_unit")?;
        self.roster.split(id, offset_direction, &self.config)
    }

    /// Freeze the roster and resolve the cycle, then start animating.
    ///
    /// The roster is not modified until the animation completes.
    pub fn start_cycle(&mut self) -> Result<()> {
        self.require("start_cycle", &[Phase::AwaitingOrders])?;

        let snapshot = BattleSnapshot::capture(&self.roster);
        let graph = build_engagements(&snapshot, &self.config);
        let outcome = resolve_combat(&snapshot, &graph, &self.config);
        let plans = plan_moves(&snapshot, &graph, &outcome, &self.config);
        let animator = Animator::new(&snapshot, &plans, &self.config);

        tracing::debug!(
            cycle = self.cycle + 1,
            units = snapshot.len(),
            engagements = graph.engagements().len(),
            retreats = plans.iter().filter(|plan| plan.is_retreat()).count(),
            "Cycle started"
        );

        self.pending = Some(PendingCycle {
            graph,
            outcome,
            plans,
            animator,
        });
        self.phase = Phase::Animating {
            elapsed: Duration::ZERO,
        };
        Ok(())
    }

    /// Advance the animation by `dt`.
    ///
    /// Outside the `Animating` phase this does nothing. On the tick where
    /// elapsed time reaches the animation duration the cycle is committed
    /// and the result returned.
    pub fn tick(&mut self, dt: Duration) -> TickEvents {
        let Phase::Animating { elapsed } = self.phase else {
            return TickEvents::default();
        };
        let Some(pending) = self.pending.take() else {
            self.phase = Phase::AwaitingOrders;
            return TickEvents::default();
        };

        let elapsed = elapsed.saturating_add(dt);
        let frame = pending.animator.frame(elapsed);

        if !pending.animator.is_complete(elapsed) {
            self.phase = Phase::Animating { elapsed };
            self.pending = Some(pending);
            return TickEvents {
                frame: Some(frame),
                result: None,
            };
        }

        let result = self.commit(pending, &frame);
        TickEvents {
            frame: Some(frame),
            result: Some(result),
        }
    }

    /// Start a cycle and tick it to completion in steps of `step`.
    pub fn run_cycle(&mut self, step: Duration) -> Result<CycleResult> {
        self.start_cycle()?;
        let step = if step.is_zero() {
            self.config.animation_duration()
        } else {
            step
        };
        loop {
            if let Some(result) = self.tick(step).result {
                return Ok(result);
            }
        }
    }

    /// Discard the cycle being animated.
    ///
    /// Positions, facings and strengths stay at their last committed values
    /// and orders are kept, so the cycle can be started again.
    pub fn abort_cycle(&mut self) -> Result<()> {
        let Phase::Animating { elapsed } = self.phase else {
            return Err(DuelError::InvalidPhase {
                operation: "abort_cycle",
                phase: self.phase,
            });
        };
        self.pending = None;
        self.phase = Phase::AwaitingOrders;
        tracing::warn!(
            cycle = self.cycle + 1,
            elapsed_ms = elapsed.as_millis(),
            "Cycle aborted"
        );
        Ok(())
    }

    /// Frame at the current elapsed time, while animating.
    #[must_use]
    pub fn current_frame(&self) -> Option<FrameSnapshot> {
        match (self.phase, &self.pending) {
            (Phase::Animating { elapsed }, Some(pending)) => Some(pending.animator.frame(elapsed)),
            _ => None,
        }
    }

    /// Engagements of the cycle being animated.
    #[must_use]
    pub fn pending_engagements(&self) -> Option<&[Engagement]> {
        self.pending
            .as_ref()
            .map(|pending| pending.graph.engagements())
    }

    /// Move plans of the cycle being animated, in id order.
    #[must_use]
    pub fn pending_plans(&self) -> Option<&[MovePlan]> {
        self.pending.as_ref().map(|pending| pending.plans.as_slice())
    }

    fn commit(&mut self, pending: PendingCycle, frame: &FrameSnapshot) -> CycleResult {
        self.phase = Phase::Consolidating;

        pending.outcome.apply(&mut self.roster);
        for rendered in &frame.units {
            if let Ok(unit) = self.roster.get_mut(rendered.id) {
                unit.commit_motion(rendered.position, rendered.facing);
            }
        }
        self.roster.clear_all_orders();

        let report = consolidate(&mut self.roster, &self.config);

        #[cfg(feature = "debug-validation")]
        {
            if let Err(err) = validate_roster(&self.roster) {
                tracing::error!(%err, "Roster invariant violated after commit");
            }
        }

        self.cycle += 1;
        self.phase = Phase::AwaitingOrders;

        let result = CycleResult {
            cycle: self.cycle,
            roster: self.roster.clone(),
            removed: report.removed,
            merged: report.merges,
            engagements: pending.graph.engagements().to_vec(),
            retreated: pending
                .plans
                .iter()
                .filter(|plan| plan.is_retreat())
                .map(|plan| plan.unit)
                .collect(),
            combat: pending.outcome.breakdowns().to_vec(),
        };

        tracing::info!(
            cycle = self.cycle,
            removed = result.removed_count(),
            merged = result.merged_count(),
            retreated = result.retreated.len(),
            remaining = self.roster.len(),
            "Cycle complete"
        );

        #[cfg(debug_assertions)]
        {
            let hash = self.state_hash();
            tracing::debug!(cycle = self.cycle, state_hash = hash, "Battle state hash");
        }

        result
    }

    /// Compute a hash of the committed state for determinism checks.
    ///
    /// Covers the cycle counter and every unit, in roster order.
    #[must_use]
    pub fn state_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();

        self.cycle.hash(&mut hasher);
        self.roster.len().hash(&mut hasher);

        for unit in self.roster.iter() {
            unit.id().hash(&mut hasher);
            unit.owner().hash(&mut hasher);
            unit.position.x.to_bits().hash(&mut hasher);
            unit.position.y.to_bits().hash(&mut hasher);
            unit.strength().to_bits().hash(&mut hasher);
            unit.initial_strength().to_bits().hash(&mut hasher);
            unit.facing().x.to_bits().hash(&mut hasher);
            unit.facing().y.to_bits().hash(&mut hasher);
            if let Some(order) = unit.order() {
                order.direction().x.to_bits().hash(&mut hasher);
                order.direction().y.to_bits().hash(&mut hasher);
                order.distance().to_bits().hash(&mut hasher);
            }
        }

        hasher.finish()
    }
}

impl Default for BattleSimulation {
    fn default() -> Self {
        Self::with_valid_config(BattleConfig::default())
    }
}

/// Check the roster invariants: unique ids in increasing order,
/// non-negative finite strengths, positive initial strengths and unit-length
/// facings.
pub fn validate_roster(roster: &Roster) -> Result<()> {
    let mut seen = HashSet::new();
    let mut last = None;
    for unit in roster.iter() {
        let id = unit.id();
        if !seen.insert(id) || last.is_some_and(|previous| previous >= id) {
            return Err(DuelError::InvariantViolation(format!(
                "unit {id} out of id order"
            )));
        }
        last = Some(id);

        if !unit.strength().is_finite() || unit.strength() < 0.0 {
            return Err(DuelError::InvariantViolation(format!(
                "unit {id} has strength {}",
                unit.strength()
            )));
        }
        if unit.initial_strength() <= 0.0 {
            return Err(DuelError::InvariantViolation(format!(
                "unit {id} has initial strength {}",
                unit.initial_strength()
            )));
        }
        if (unit.facing().length() - 1.0).abs() > 1e-9 {
            return Err(DuelError::InvariantViolation(format!(
                "unit {id} facing is not a unit vector"
            )));
        }
    }
    Ok(())
}
