//! Targeting engine.
//!
//! Every live unit selects all live enemy units inside its engagement
//! range and attack cone. The cone is centred on the unit's assigned
//! direction (order direction if one is set, else its facing). Both
//! boundaries are inclusive. An attacker splits its full strength evenly
//! across its targets.

use serde::Serialize;

use crate::components::UnitId;
use crate::config::BattleConfig;
use crate::math::Vec2;
use crate::snapshot::BattleSnapshot;

/// Slack on the range boundary so that exactly-at-range targets survive
/// rounding in the distance computation.
const RANGE_TOLERANCE: f64 = 1e-6;

/// Slack, in degrees, on the cone boundary.
const ANGLE_TOLERANCE_DEG: f64 = 1e-9;

/// One attacker-to-defender relation of the current cycle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Engagement {
    /// Attacking unit.
    pub attacker: UnitId,
    /// Defending unit.
    pub defender: UnitId,
    /// Share of the attacker's strength directed at this defender.
    pub contribution: f64,
    /// Attacker's assigned direction (unit vector).
    pub attacker_direction: Vec2,
    #[serde(skip)]
    attacker_index: usize,
    #[serde(skip)]
    defender_index: usize,
}

impl Engagement {
    /// Snapshot index of the attacker.
    #[must_use]
    pub const fn attacker_index(&self) -> usize {
        self.attacker_index
    }

    /// Snapshot index of the defender.
    #[must_use]
    pub const fn defender_index(&self) -> usize {
        self.defender_index
    }
}

/// Who attacks whom in one cycle, indexed by snapshot position.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EngagementGraph {
    engagements: Vec<Engagement>,
    /// Engagement indices per attacker.
    outgoing: Vec<Vec<usize>>,
    /// Engagement indices per defender.
    incoming: Vec<Vec<usize>>,
}

impl EngagementGraph {
    /// All engagements, grouped by attacker in snapshot order.
    #[must_use]
    pub fn engagements(&self) -> &[Engagement] {
        &self.engagements
    }

    /// Engagements in which the unit at `index` attacks.
    pub fn outgoing(&self, index: usize) -> impl Iterator<Item = &Engagement> {
        self.outgoing[index].iter().map(|&e| &self.engagements[e])
    }

    /// Engagements in which the unit at `index` defends.
    pub fn incoming(&self, index: usize) -> impl Iterator<Item = &Engagement> {
        self.incoming[index].iter().map(|&e| &self.engagements[e])
    }

    /// Number of targets the unit at `index` selected.
    #[must_use]
    pub fn target_count(&self, index: usize) -> usize {
        self.outgoing[index].len()
    }

    /// Whether the unit at `index` attacks at least one enemy.
    #[must_use]
    pub fn is_attacking(&self, index: usize) -> bool {
        !self.outgoing[index].is_empty()
    }

    /// Sum of the contributions aimed at the unit at `index`.
    #[must_use]
    pub fn incoming_sum(&self, index: usize) -> f64 {
        self.incoming(index).map(|e| e.contribution).sum()
    }

    /// Number of units attacking at least one enemy.
    #[must_use]
    pub fn attacker_count(&self) -> usize {
        self.outgoing.iter().filter(|targets| !targets.is_empty()).count()
    }

    /// Check if no unit attacks.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.engagements.is_empty()
    }
}

/// Whether `defender_position` lies inside the range and cone of a unit at
/// `attacker_position` looking along `direction`.
#[must_use]
pub fn in_engagement_zone(
    attacker_position: Vec2,
    direction: Vec2,
    defender_position: Vec2,
    config: &BattleConfig,
) -> bool {
    let offset = defender_position - attacker_position;
    if offset.length() > config.max_move_range + RANGE_TOLERANCE {
        return false;
    }
    offset.angle_between_deg(direction) <= config.attack_cone_half_angle_deg + ANGLE_TOLERANCE_DEG
}

/// Build the engagement graph for a snapshot.
///
/// Dead units neither attack nor get attacked. Units with no targets are
/// non-attacking for the cycle.
#[must_use]
pub fn build_engagements(snapshot: &BattleSnapshot, config: &BattleConfig) -> EngagementGraph {
    let units = snapshot.units();
    let mut graph = EngagementGraph {
        engagements: Vec::new(),
        outgoing: vec![Vec::new(); units.len()],
        incoming: vec![Vec::new(); units.len()],
    };
    let mut targets = Vec::new();

    for (attacker_index, attacker) in units.iter().enumerate() {
        if !attacker.is_alive() {
            continue;
        }
        let direction = attacker.assigned_direction();

        targets.clear();
        targets.extend(units.iter().enumerate().filter_map(|(defender_index, defender)| {
            let eligible = defender_index != attacker_index
                && defender.owner != attacker.owner
                && defender.is_alive()
                && in_engagement_zone(attacker.position, direction, defender.position, config);
            eligible.then_some(defender_index)
        }));

        if targets.is_empty() {
            continue;
        }

        let contribution = attacker.strength / targets.len() as f64;
        for &defender_index in &targets {
            let engagement_index = graph.engagements.len();
            graph.engagements.push(Engagement {
                attacker: attacker.id,
                defender: units[defender_index].id,
                contribution,
                attacker_direction: direction,
                attacker_index,
                defender_index,
            });
            graph.outgoing[attacker_index].push(engagement_index);
            graph.incoming[defender_index].push(engagement_index);
        }
    }

    tracing::debug!(
        units = units.len(),
        attackers = graph.attacker_count(),
        engagements = graph.engagements.len(),
        "Engagement graph built"
    );

    graph
}
