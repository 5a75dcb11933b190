//! Immutable battle-cycle snapshot.
//!
//! Targeting, combat resolution, retreat planning and the animator all read
//! the same [`BattleSnapshot`], captured once before anything is mutated.
//! Components refer to units by their index in the snapshot, so a
//! reference to a removed unit cannot exist within a cycle.

use serde::Serialize;

use crate::components::{MoveOrder, PlayerId, UnitId};
use crate::math::Vec2;
use crate::roster::Roster;

/// Frozen state of one unit at cycle start.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SnapshotUnit {
    /// Unit identifier.
    pub id: UnitId,
    /// Owning player.
    pub owner: PlayerId,
    /// Position at cycle start.
    pub position: Vec2,
    /// Strength at cycle start.
    pub strength: f64,
    /// Facing at cycle start.
    pub facing: Vec2,
    /// Pending order, if any.
    pub order: Option<MoveOrder>,
}

impl SnapshotUnit {
    /// Order direction if set, otherwise facing.
    #[must_use]
    pub fn assigned_direction(&self) -> Vec2 {
        self.order.map_or(self.facing, |order| order.direction())
    }

    /// Whether the unit had any strength at cycle start.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.strength > 0.0
    }
}

/// Frozen copy of the roster, ordered by unit id.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BattleSnapshot {
    units: Vec<SnapshotUnit>,
}

impl BattleSnapshot {
    /// Capture the roster. Units are sorted by id for deterministic iteration.
    #[must_use]
    pub fn capture(roster: &Roster) -> Self {
        let mut units: Vec<SnapshotUnit> = roster
            .iter()
            .map(|unit| SnapshotUnit {
                id: unit.id(),
                owner: unit.owner(),
                position: unit.position,
                strength: unit.strength(),
                facing: unit.facing(),
                order: unit.order().copied(),
            })
            .collect();
        units.sort_unstable_by_key(|unit| unit.id);
        Self { units }
    }

    /// Units in id order.
    #[must_use]
    pub fn units(&self) -> &[SnapshotUnit] {
        &self.units
    }

    /// Unit at a snapshot index.
    #[must_use]
    pub fn unit(&self, index: usize) -> &SnapshotUnit {
        &self.units[index]
    }

    /// Snapshot index of a unit id.
    #[must_use]
    pub fn index_of(&self, id: UnitId) -> Option<usize> {
        self.units.binary_search_by_key(&id, |unit| unit.id).ok()
    }

    /// Number of units.
    #[must_use]
    pub fn len(&self) -> usize {
        self.units.len()
    }

    /// Check if the snapshot is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::UnitSpawnParams;

    #[test]
    fn test_capture_freezes_roster() {
        let mut roster = Roster::new();
        let a = roster
            .spawn(UnitSpawnParams::new(PlayerId::One, Vec2::new(10.0, 20.0), 40.0))
            .unwrap();
        let snapshot = BattleSnapshot::capture(&roster);

        roster.get_mut(a).unwrap().set_strength(1.0).unwrap();
        roster.get_mut(a).unwrap().position = Vec2::ZERO;

        let frozen = snapshot.unit(snapshot.index_of(a).unwrap());
        assert_eq!(frozen.strength, 40.0);
        assert_eq!(frozen.position, Vec2::new(10.0, 20.0));
        assert_eq!(frozen.assigned_direction(), Vec2::X);
        assert!(snapshot.index_of(99).is_none());
    }
}
