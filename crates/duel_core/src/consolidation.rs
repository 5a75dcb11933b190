//! Post-battle consolidation: merge overlapping friendly units, then prune
//! units below their survival floor.

use serde::Serialize;

use crate::components::{Unit, UnitId};
use crate::config::BattleConfig;
use crate::roster::Roster;

/// One absorption performed by [`merge_overlaps`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MergeRecord {
    /// Unit that grew.
    pub base: UnitId,
    /// Unit that ceased to exist.
    pub absorbed: UnitId,
}

/// What consolidation changed.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ConsolidationReport {
    /// Absorptions in the order they happened.
    pub merges: Vec<MergeRecord>,
    /// Units pruned for falling below their survival floor.
    pub removed: Vec<UnitId>,
}

impl ConsolidationReport {
    /// Number of units absorbed into another unit.
    #[must_use]
    pub fn merged_count(&self) -> usize {
        self.merges.len()
    }

    /// Number of units pruned.
    #[must_use]
    pub fn removed_count(&self) -> usize {
        self.removed.len()
    }
}

/// Merge overlapping same-owner units.
///
/// Single forward greedy scan in roster order. Each unit not yet absorbed
/// becomes a base and absorbs every later, not yet absorbed unit of its
/// owner whose overlap `r_a + r_b - d` exceeds `min(r_a, r_b) * threshold`.
/// The base's radius grows with each absorption and its position does not
/// change.
///
/// Dead units take no part, neither as base nor as candidate. This departs
/// from a plain scan over every unit, which would fold a zero-strength unit
/// into a survivor and raise its `initial_strength`, and with it the
/// survival floor. Dead units are left for [`prune_weak`] instead.
pub fn merge_overlaps(units: &mut Vec<Unit>, config: &BattleConfig) -> Vec<MergeRecord> {
    let mut records = Vec::new();
    if !config.merge_enabled {
        return records;
    }

    let mut absorbed = vec![false; units.len()];
    for i in 0..units.len() {
        if absorbed[i] || !units[i].is_alive() {
            continue;
        }
        for j in (i + 1)..units.len() {
            if absorbed[j] || !units[j].is_alive() || units[j].owner() != units[i].owner() {
                continue;
            }
            let radius_a = config.unit_radius(units[i].strength());
            let radius_b = config.unit_radius(units[j].strength());
            let overlap = radius_a + radius_b - units[i].position.distance(units[j].position);
            if overlap > radius_a.min(radius_b) * config.merge_threshold {
                let other = units[j].clone();
                units[i].absorb(&other);
                absorbed[j] = true;
                records.push(MergeRecord {
                    base: units[i].id(),
                    absorbed: other.id(),
                });
            }
        }
    }

    let mut flags = absorbed.into_iter();
    units.retain(|_| !flags.next().unwrap_or(false));
    records
}

/// Whether a unit survives pruning. The floor itself survives.
#[must_use]
pub fn survives(unit: &Unit, config: &BattleConfig) -> bool {
    unit.is_alive() && unit.strength() >= unit.initial_strength() * config.min_survival_fraction
}

/// Remove units below `initial_strength * min_survival_fraction`, and
/// every dead unit.
pub fn prune_weak(units: &mut Vec<Unit>, config: &BattleConfig) -> Vec<UnitId> {
    let mut removed = Vec::new();
    units.retain(|unit| {
        let keep = survives(unit, config);
        if !keep {
            removed.push(unit.id());
        }
        keep
    });
    removed
}

/// Merge, then prune, in place.
pub fn consolidate(roster: &mut Roster, config: &BattleConfig) -> ConsolidationReport {
    let mut units = roster.take_units();
    let merges = merge_overlaps(&mut units, config);
    let removed = prune_weak(&mut units, config);
    roster.replace_units(units);

    let report = ConsolidationReport { merges, removed };
    tracing::debug!(
        merged = report.merged_count(),
        removed = report.removed_count(),
        remaining = roster.len(),
        "Roster consolidated"
    );
    report
}
