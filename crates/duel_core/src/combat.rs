//! Combat resolution.
//!
//! Losses are computed from the cycle snapshot only and then applied in one
//! step, so the outcome never depends on the order units are visited in.
//!
//! For a defender with strength `s` receiving a summed contribution
//! `incoming`:
//!
//! * the defender loses `min(s, ceil(K * incoming))`;
//! * each attacker `i` with contribution `c_i` loses
//!   `ceil(c_i / incoming * K * eff)`, where `eff` is `s` if the defender is
//!   attacking this cycle and `0.1 * s` if it is not.
//!
//! A unit accumulates both kinds of loss across all of its engagements.

use serde::Serialize;

use crate::components::UnitId;
use crate::config::BattleConfig;
use crate::math::EPSILON;
use crate::roster::Roster;
use crate::snapshot::BattleSnapshot;
use crate::targeting::EngagementGraph;

/// Fraction of a passive defender's strength that counts when it strikes back.
pub const PASSIVE_DEFENCE_FACTOR: f64 = 0.1;

/// Round a loss up to a whole number.
///
/// Values within rounding noise of an integer stay on that integer instead
/// of jumping to the next one.
fn ceil_loss(value: f64) -> f64 {
    (value - EPSILON).ceil().max(0.0)
}

/// Loss bookkeeping for one unit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CombatBreakdown {
    /// Unit the numbers belong to.
    pub id: UnitId,
    /// Strength at cycle start.
    pub strength_before: f64,
    /// Summed contribution of all attackers aimed at this unit.
    pub incoming: f64,
    /// Loss taken as a defender.
    pub defender_loss: f64,
    /// Loss taken as an attacker, summed over all of its targets.
    pub attacker_loss: f64,
    /// Strength after the losses, clamped at zero.
    pub strength_after: f64,
}

impl CombatBreakdown {
    /// Total loss of the cycle.
    #[must_use]
    pub fn total_loss(&self) -> f64 {
        self.defender_loss + self.attacker_loss
    }

    /// Whether the unit is out of strength after the cycle.
    #[must_use]
    pub fn is_destroyed(&self) -> bool {
        self.strength_after <= 0.0
    }
}

/// Result of resolving one cycle's combat, indexed like the snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CombatOutcome {
    breakdowns: Vec<CombatBreakdown>,
}

impl CombatOutcome {
    /// Per-unit bookkeeping in snapshot order.
    #[must_use]
    pub fn breakdowns(&self) -> &[CombatBreakdown] {
        &self.breakdowns
    }

    /// Bookkeeping for the unit at a snapshot index.
    #[must_use]
    pub fn breakdown(&self, index: usize) -> &CombatBreakdown {
        &self.breakdowns[index]
    }

    /// Strength after combat for the unit at a snapshot index.
    #[must_use]
    pub fn strength_after(&self, index: usize) -> f64 {
        self.breakdowns[index].strength_after
    }

    /// Summed loss over every unit.
    #[must_use]
    pub fn total_loss(&self) -> f64 {
        self.breakdowns.iter().map(CombatBreakdown::total_loss).sum()
    }

    /// Write the post-combat strengths into the roster. Units that were not
    /// part of the snapshot are left alone.
    pub fn apply(&self, roster: &mut Roster) {
        for unit in roster.iter_mut() {
            if let Ok(index) = self
                .breakdowns
                .binary_search_by_key(&unit.id(), |breakdown| breakdown.id)
            {
                unit.commit_strength(self.breakdowns[index].strength_after);
            }
        }
    }
}

/// Compute every unit's losses for the cycle.
#[must_use]
pub fn resolve_combat(
    snapshot: &BattleSnapshot,
    graph: &EngagementGraph,
    config: &BattleConfig,
) -> CombatOutcome {
    let k = config.attrition_coefficient;
    let mut breakdowns: Vec<CombatBreakdown> = snapshot
        .units()
        .iter()
        .map(|unit| CombatBreakdown {
            id: unit.id,
            strength_before: unit.strength,
            incoming: 0.0,
            defender_loss: 0.0,
            attacker_loss: 0.0,
            strength_after: unit.strength,
        })
        .collect();

    for (defender_index, defender) in snapshot.units().iter().enumerate() {
        let incoming = graph.incoming_sum(defender_index);
        if incoming <= 0.0 {
            continue;
        }

        let strength = defender.strength;
        let breakdown = &mut breakdowns[defender_index];
        breakdown.incoming = incoming;
        breakdown.defender_loss = strength.min(ceil_loss(k * incoming));

        let effective_defence = if graph.is_attacking(defender_index) {
            strength
        } else {
            PASSIVE_DEFENCE_FACTOR * strength
        };
        for engagement in graph.incoming(defender_index) {
            let share = engagement.contribution / incoming;
            breakdowns[engagement.attacker_index()].attacker_loss +=
                ceil_loss(share * k * effective_defence);
        }
    }

    for breakdown in &mut breakdowns {
        breakdown.strength_after = (breakdown.strength_before - breakdown.total_loss()).max(0.0);
    }

    let outcome = CombatOutcome { breakdowns };
    tracing::debug!(total_loss = outcome.total_loss(), "Combat resolved");
    outcome
}
