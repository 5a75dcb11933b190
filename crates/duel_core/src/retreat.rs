//! Retreat planner.
//!
//! Decides, for every unit, where it moves this cycle. The decision reads
//! the pre-cycle snapshot: a unit is overwhelmed when the summed incoming
//! contribution is strictly greater than its pre-cycle strength. Only an
//! overwhelmed unit whose retreat direction turns away from its intended
//! course by more than 90 degrees actually retreats.

use serde::Serialize;

use crate::combat::CombatOutcome;
use crate::components::UnitId;
use crate::config::BattleConfig;
use crate::math::Vec2;
use crate::snapshot::{BattleSnapshot, SnapshotUnit};
use crate::targeting::EngagementGraph;

/// Base retreat distance before the incoming-fire part.
pub const RETREAT_BASE_DISTANCE: f64 = 40.0;

/// Retreat distance added per point of incoming contribution.
pub const RETREAT_DISTANCE_PER_INCOMING: f64 = 0.2;

/// Shortest retreat.
pub const RETREAT_MIN_DISTANCE: f64 = 20.0;

/// Base forward distance of an overwhelmed unit without an order.
pub const ADVANCE_BASE_DISTANCE: f64 = 20.0;

/// Forward distance added per point of strength.
pub const ADVANCE_DISTANCE_PER_STRENGTH: f64 = 0.1;

/// Longest forward move of an overwhelmed unit without an order.
pub const ADVANCE_MAX_DISTANCE: f64 = 80.0;

/// Angle in degrees beyond which a retreat overrides the intended course.
const RETREAT_ANGLE_DEG: f64 = 90.0;

/// Why a unit moves the way it does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MoveKind {
    /// Destroyed in combat; stays put.
    Dead,
    /// No order and not overwhelmed.
    Hold,
    /// Follows its order.
    Order,
    /// Overwhelmed but pressing on without an order.
    Advance,
    /// Falls back from incoming fire.
    Retreat,
}

/// Motion of one unit for the cycle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MovePlan {
    /// Unit the plan belongs to.
    pub unit: UnitId,
    /// Unit vector of travel, zero for dead units.
    pub direction: Vec2,
    /// Distance to travel.
    pub distance: f64,
    /// Decision that produced the plan.
    pub kind: MoveKind,
}

impl MovePlan {
    /// Plan for a unit that does not move.
    #[must_use]
    pub const fn stationary(unit: UnitId, direction: Vec2, kind: MoveKind) -> Self {
        Self {
            unit,
            direction,
            distance: 0.0,
            kind,
        }
    }

    /// Displacement vector of the plan.
    #[must_use]
    pub fn displacement(&self) -> Vec2 {
        self.direction * self.distance
    }

    /// Whether the plan is a retreat.
    #[must_use]
    pub fn is_retreat(&self) -> bool {
        self.kind == MoveKind::Retreat
    }
}

/// Plan every unit's move, indexed like the snapshot.
#[must_use]
pub fn plan_moves(
    snapshot: &BattleSnapshot,
    graph: &EngagementGraph,
    outcome: &CombatOutcome,
    config: &BattleConfig,
) -> Vec<MovePlan> {
    let plans: Vec<MovePlan> = snapshot
        .units()
        .iter()
        .enumerate()
        .map(|(index, unit)| plan_unit(index, unit, graph, outcome, config))
        .collect();

    tracing::debug!(
        retreats = plans.iter().filter(|plan| plan.is_retreat()).count(),
        "Moves planned"
    );
    plans
}

fn plan_unit(
    index: usize,
    unit: &SnapshotUnit,
    graph: &EngagementGraph,
    outcome: &CombatOutcome,
    config: &BattleConfig,
) -> MovePlan {
    if outcome.strength_after(index) <= 0.0 {
        return MovePlan::stationary(unit.id, Vec2::ZERO, MoveKind::Dead);
    }

    let incoming = graph.incoming_sum(index);
    let assigned = unit.assigned_direction();

    if incoming <= unit.strength {
        return match unit.order {
            Some(order) => MovePlan {
                unit: unit.id,
                direction: order.direction(),
                distance: order.distance(),
                kind: MoveKind::Order,
            },
            None => MovePlan::stationary(unit.id, unit.facing, MoveKind::Hold),
        };
    }

    let retreat_direction = retreat_direction(graph, index, assigned);
    if retreat_direction.angle_between_deg(assigned) > RETREAT_ANGLE_DEG {
        let distance = (RETREAT_BASE_DISTANCE + RETREAT_DISTANCE_PER_INCOMING * incoming)
            .clamp(RETREAT_MIN_DISTANCE, config.max_move_range);
        return MovePlan {
            unit: unit.id,
            direction: retreat_direction,
            distance,
            kind: MoveKind::Retreat,
        };
    }

    match unit.order {
        Some(order) => MovePlan {
            unit: unit.id,
            direction: order.direction(),
            distance: order.distance(),
            kind: MoveKind::Order,
        },
        None => MovePlan {
            unit: unit.id,
            direction: assigned,
            distance: ADVANCE_MAX_DISTANCE
                .min(ADVANCE_BASE_DISTANCE + ADVANCE_DISTANCE_PER_STRENGTH * unit.strength),
            kind: MoveKind::Advance,
        },
    }
}

/// Normalized negation of the contribution-weighted sum of the attackers'
/// directions, or the negated assigned direction if that sum vanishes.
fn retreat_direction(graph: &EngagementGraph, index: usize, assigned: Vec2) -> Vec2 {
    let mut aggregate = Vec2::ZERO;
    for engagement in graph.incoming(index) {
        aggregate += engagement.attacker_direction * engagement.contribution;
    }
    if aggregate.is_near_zero() {
        -assigned
    } else {
        (-aggregate).normalize()
    }
}
