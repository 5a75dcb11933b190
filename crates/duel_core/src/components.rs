//! Unit data definitions.
//!
//! Units are plain data. Every direction stored on a unit is a unit vector;
//! the constructors and setters normalize their input and reject inputs
//! that have no direction.

use serde::{Deserialize, Serialize};

use crate::error::{DuelError, Result};
use crate::math::Vec2;

/// Unique identifier for units. Never reused within a roster.
pub type UnitId = u64;

/// One of the two sides of the duel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PlayerId {
    /// Deploys on the left half, facing +x.
    One,
    /// Deploys on the right half, facing -x.
    Two,
}

impl PlayerId {
    /// Both players in turn order.
    pub const ALL: [PlayerId; 2] = [PlayerId::One, PlayerId::Two];

    /// The opposing player.
    #[must_use]
    pub const fn opponent(self) -> Self {
        match self {
            PlayerId::One => PlayerId::Two,
            PlayerId::Two => PlayerId::One,
        }
    }

    /// Facing a freshly placed unit starts with: toward the enemy half.
    #[must_use]
    pub const fn outward_facing(self) -> Vec2 {
        match self {
            PlayerId::One => Vec2::X,
            PlayerId::Two => Vec2::NEG_X,
        }
    }

    /// Numeric index used in logs and protocol output (1 or 2).
    #[must_use]
    pub const fn number(self) -> u8 {
        match self {
            PlayerId::One => 1,
            PlayerId::Two => 2,
        }
    }
}

/// Normalize a direction, rejecting zero-length or non-finite input.
pub fn unit_direction(direction: Vec2) -> Result<Vec2> {
    if !direction.is_finite() || direction.is_near_zero() {
        return Err(DuelError::InvalidDirection {
            x: direction.x,
            y: direction.y,
        });
    }
    Ok(direction.normalize())
}

/// A player-issued movement intent, executed during the next battle cycle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MoveOrder {
    direction: Vec2,
    distance: f64,
}

impl MoveOrder {
    /// Create an order. The direction is normalized; the distance is checked
    /// against `[min_distance, max_distance]`.
    pub fn new(direction: Vec2, distance: f64, min_distance: f64, max_distance: f64) -> Result<Self> {
        let direction = unit_direction(direction)?;
        if !distance.is_finite() || distance < min_distance || distance > max_distance {
            return Err(DuelError::InvalidOrderDistance {
                distance,
                min: min_distance,
                max: max_distance,
            });
        }
        Ok(Self {
            direction,
            distance,
        })
    }

    /// Unit direction of travel.
    #[must_use]
    pub const fn direction(&self) -> Vec2 {
        self.direction
    }

    /// Distance to travel.
    #[must_use]
    pub const fn distance(&self) -> f64 {
        self.distance
    }
}

/// One combat entity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Unit {
    id: UnitId,
    owner: PlayerId,
    /// Position in field coordinates.
    pub position: Vec2,
    strength: f64,
    initial_strength: f64,
    facing: Vec2,
    order: Option<MoveOrder>,
}

impl Unit {
    /// Create a unit at full strength.
    ///
    /// Rejects non-finite, negative or zero strength and facings without a
    /// direction.
    pub fn new(id: UnitId, owner: PlayerId, position: Vec2, strength: f64, facing: Vec2) -> Result<Self> {
        if !strength.is_finite() || strength <= 0.0 {
            return Err(DuelError::InvalidStrength(strength));
        }
        if !position.is_finite() {
            return Err(DuelError::PlacementRejected(format!(
                "position ({}, {}) is not finite",
                position.x, position.y
            )));
        }
        Ok(Self {
            id,
            owner,
            position,
            strength,
            initial_strength: strength,
            facing: unit_direction(facing)?,
            order: None,
        })
    }

    /// Unit identifier.
    #[must_use]
    pub const fn id(&self) -> UnitId {
        self.id
    }

    /// Owning player.
    #[must_use]
    pub const fn owner(&self) -> PlayerId {
        self.owner
    }

    /// Current strength.
    #[must_use]
    pub const fn strength(&self) -> f64 {
        self.strength
    }

    /// Strength at creation or at the last merge.
    #[must_use]
    pub const fn initial_strength(&self) -> f64 {
        self.initial_strength
    }

    /// Current facing, always a unit vector.
    #[must_use]
    pub const fn facing(&self) -> Vec2 {
        self.facing
    }

    /// Pending movement order.
    #[must_use]
    pub const fn order(&self) -> Option<&MoveOrder> {
        self.order.as_ref()
    }

    /// A strength of zero means the unit is dead.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.strength > 0.0
    }

    /// Direction the unit intends to act in: its order direction if it has
    /// one, otherwise its facing.
    #[must_use]
    pub fn assigned_direction(&self) -> Vec2 {
        self.order.map_or(self.facing, |order| order.direction())
    }

    /// Set strength, clamped at zero.
    pub fn set_strength(&mut self, strength: f64) -> Result<()> {
        if !strength.is_finite() {
            return Err(DuelError::InvalidStrength(strength));
        }
        self.strength = strength.max(0.0);
        Ok(())
    }

    /// Turn the unit. Zero-length input is rejected.
    pub fn set_facing(&mut self, facing: Vec2) -> Result<()> {
        self.facing = unit_direction(facing)?;
        Ok(())
    }

    /// Attach an order and turn the unit to face along it.
    pub fn set_order(&mut self, order: MoveOrder) {
        self.facing = order.direction();
        self.order = Some(order);
    }

    /// Drop any pending order.
    pub fn clear_order(&mut self) {
        self.order = None;
    }

    /// Take over another unit's strength. The survival floor reference
    /// becomes the larger of the two initial strengths.
    pub(crate) fn absorb(&mut self, other: &Unit) {
        self.strength += other.strength;
        self.initial_strength = self.initial_strength.max(other.initial_strength);
    }

    /// Split off `amount` of strength, leaving the remainder.
    pub(crate) fn detach(&mut self, amount: f64) {
        self.strength = (self.strength - amount).max(0.0);
    }

    /// Write a combat result. Combat strengths are finite by construction.
    pub(crate) fn commit_strength(&mut self, strength: f64) {
        self.strength = strength.max(0.0);
    }

    /// Write the end position and facing of an animation. The animator only
    /// produces unit-length facings.
    pub(crate) fn commit_motion(&mut self, position: Vec2, facing: Vec2) {
        self.position = position;
        self.facing = facing;
    }

    pub(crate) fn assign_id(&mut self, id: UnitId) {
        self.id = id;
    }

    pub(crate) fn with_initial_strength(mut self, initial_strength: f64) -> Self {
        self.initial_strength = initial_strength;
        self
    }
}

/// Parameters for spawning a new unit without placement rules.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UnitSpawnParams {
    /// Owning player.
    pub owner: PlayerId,
    /// Position in field coordinates.
    pub position: Vec2,
    /// Starting strength.
    pub strength: f64,
    /// Starting facing; defaults to the owner's outward facing.
    pub facing: Option<Vec2>,
}

impl UnitSpawnParams {
    /// Spawn parameters with the owner's outward facing.
    #[must_use]
    pub const fn new(owner: PlayerId, position: Vec2, strength: f64) -> Self {
        Self {
            owner,
            position,
            strength,
            facing: None,
        }
    }

    /// Builder method to set the facing.
    #[must_use]
    pub const fn facing(mut self, facing: Vec2) -> Self {
        self.facing = Some(facing);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_rejects_bad_strength() {
        for strength in [-1.0, 0.0, f64::NAN, f64::INFINITY] {
            let result = Unit::new(1, PlayerId::One, Vec2::ZERO, strength, Vec2::X);
            assert!(matches!(result, Err(DuelError::InvalidStrength(_))));
        }
    }

    #[test]
    fn test_unit_rejects_zero_facing() {
        let result = Unit::new(1, PlayerId::One, Vec2::ZERO, 10.0, Vec2::ZERO);
        assert!(matches!(result, Err(DuelError::InvalidDirection { .. })));
    }

    #[test]
    fn test_facing_is_normalized() {
        let mut unit = Unit::new(1, PlayerId::One, Vec2::ZERO, 10.0, Vec2::new(3.0, 4.0)).unwrap();
        assert!((unit.facing().length() - 1.0).abs() < 1e-12);
        unit.set_facing(Vec2::new(0.0, -7.0)).unwrap();
        assert_eq!(unit.facing(), Vec2::new(0.0, -1.0));
    }

    #[test]
    fn test_order_sets_facing_and_assigned_direction() {
        let mut unit = Unit::new(1, PlayerId::Two, Vec2::ZERO, 10.0, Vec2::NEG_X).unwrap();
        assert_eq!(unit.assigned_direction(), Vec2::NEG_X);

        let order = MoveOrder::new(Vec2::new(0.0, 2.0), 50.0, 10.0, 140.0).unwrap();
        unit.set_order(order);
        assert_eq!(unit.facing(), Vec2::new(0.0, 1.0));
        assert_eq!(unit.assigned_direction(), Vec2::new(0.0, 1.0));

        unit.clear_order();
        assert!(unit.order().is_none());
    }

    #[test]
    fn test_order_distance_bounds() {
        assert!(MoveOrder::new(Vec2::X, 10.0, 10.0, 140.0).is_ok());
        assert!(MoveOrder::new(Vec2::X, 140.0, 10.0, 140.0).is_ok());
        assert!(matches!(
            MoveOrder::new(Vec2::X, 9.9, 10.0, 140.0),
            Err(DuelError::InvalidOrderDistance { .. })
        ));
        assert!(MoveOrder::new(Vec2::X, 140.1, 10.0, 140.0).is_err());
    }

    #[test]
    fn test_absorb_takes_max_initial_strength() {
        let mut a = Unit::new(1, PlayerId::One, Vec2::ZERO, 100.0, Vec2::X).unwrap();
        let b = Unit::new(2, PlayerId::One, Vec2::ZERO, 150.0, Vec2::X).unwrap();
        a.set_strength(30.0).unwrap();
        a.absorb(&b);
        assert_eq!(a.strength(), 180.0);
        assert_eq!(a.initial_strength(), 150.0);
    }

    #[test]
    fn test_strength_clamps_at_zero() {
        let mut unit = Unit::new(1, PlayerId::One, Vec2::ZERO, 10.0, Vec2::X).unwrap();
        unit.set_strength(-5.0).unwrap();
        assert_eq!(unit.strength(), 0.0);
        assert!(!unit.is_alive());
    }

    #[test]
    fn test_player_helpers() {
        assert_eq!(PlayerId::One.opponent(), PlayerId::Two);
        assert_eq!(PlayerId::Two.outward_facing(), Vec2::NEG_X);
        assert_eq!(PlayerId::Two.number(), 2);
    }
}
