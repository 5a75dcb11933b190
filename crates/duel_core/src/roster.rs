//! Ordered unit storage and the session-side roster operations.
//!
//! The roster keeps units in insertion order. Ids are assigned from a
//! monotonically increasing counter, so insertion order is also id order
//! and consolidation (which only removes units) preserves it.

use serde::Serialize;

use crate::components::{unit_direction, MoveOrder, PlayerId, Unit, UnitId, UnitSpawnParams};
use crate::config::BattleConfig;
use crate::error::{DuelError, Result};
use crate::math::Vec2;

/// Largest distance a split-off unit is offset from its parent.
const SPLIT_MAX_OFFSET: f64 = 30.0;

/// Base offset of a split-off unit before the strength-dependent part.
const SPLIT_BASE_OFFSET: f64 = 10.0;

/// Distance a split-off unit keeps from the field edge.
const SPLIT_EDGE_MARGIN: f64 = 20.0;

/// Ordered collection of all units in the duel.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Roster {
    units: Vec<Unit>,
    next_id: UnitId,
}

impl Roster {
    /// Create an empty roster. The first unit gets id 1.
    #[must_use]
    pub fn new() -> Self {
        Self {
            units: Vec::new(),
            next_id: 1,
        }
    }

    fn allocate_id(&mut self) -> UnitId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Add a unit without placement rules and return its id.
    pub fn spawn(&mut self, params: UnitSpawnParams) -> Result<UnitId> {
        let facing = params
            .facing
            .unwrap_or_else(|| params.owner.outward_facing());
        // Validate before consuming an id so rejected spawns leave no gap.
        let unit = Unit::new(0, params.owner, params.position, params.strength, facing)?;
        let id = self.allocate_id();
        self.units.push(unit_with_id(unit, id));
        Ok(id)
    }

    /// Place a unit under the deployment rules: inside the owner's half of
    /// the field (keeping `placement_margin` from that half's left and right
    /// edges) and at least `placement_spacing` away from every own unit.
    /// The unit faces outward.
    pub fn place(
        &mut self,
        owner: PlayerId,
        position: Vec2,
        strength: f64,
        config: &BattleConfig,
    ) -> Result<UnitId> {
        let half = config.field.width / 2.0;
        let area_start = match owner {
            PlayerId::One => 0.0,
            PlayerId::Two => half,
        };
        let min_x = area_start + config.placement_margin;
        let max_x = area_start + half - config.placement_margin;
        if position.x < min_x || position.x > max_x {
            return Err(DuelError::PlacementRejected(format!(
                "x = {} outside deployment zone [{min_x}, {max_x}] of player {}",
                position.x,
                owner.number()
            )));
        }
        if position.y < 0.0 || position.y > config.field.height {
            return Err(DuelError::PlacementRejected(format!(
                "y = {} outside the field",
                position.y
            )));
        }
        if let Some(neighbour) = self
            .units
            .iter()
            .find(|u| u.owner() == owner && u.position.distance(position) < config.placement_spacing)
        {
            return Err(DuelError::PlacementRejected(format!(
                "too close to unit {}",
                neighbour.id()
            )));
        }
        self.spawn(UnitSpawnParams::new(owner, position, strength))
    }

    /// Issue an order toward a target point.
    ///
    /// A displacement shorter than `order_clear_threshold` clears the order.
    /// Otherwise the distance is clamped into `[min_order_distance,
    /// max_move_range]` and the unit turns to face the order direction.
    /// Returns the order now attached to the unit.
    pub fn issue_order(
        &mut self,
        id: UnitId,
        target: Vec2,
        config: &BattleConfig,
    ) -> Result<Option<MoveOrder>> {
        let unit = self.get_mut(id)?;
        let displacement = target - unit.position;
        let distance = displacement.length();
        if !distance.is_finite() || distance < config.order_clear_threshold {
            unit.clear_order();
            return Ok(None);
        }
        let order = MoveOrder::new(
            displacement,
            distance.clamp(config.min_order_distance, config.max_move_range),
            config.min_order_distance,
            config.max_move_range,
        )?;
        unit.set_order(order);
        Ok(Some(order))
    }

    /// Attach a prepared order to a unit.
    pub fn set_order(&mut self, id: UnitId, order: MoveOrder) -> Result<()> {
        self.get_mut(id)?.set_order(order);
        Ok(())
    }

    /// Drop a unit's pending order.
    pub fn clear_order(&mut self, id: UnitId) -> Result<()> {
        self.get_mut(id)?.clear_order();
        Ok(())
    }

    /// Drop every pending order.
    pub fn clear_all_orders(&mut self) {
        for unit in &mut self.units {
            unit.clear_order();
        }
    }

    /// Split a unit in two.
    ///
    /// `floor(strength / 2)` moves to a new unit placed along `offset_direction`;
    /// the remainder stays. Both halves keep the parent's initial strength,
    /// and a half must hold at least twice the survival floor.
    pub fn split(
        &mut self,
        id: UnitId,
        offset_direction: Vec2,
        config: &BattleConfig,
    ) -> Result<UnitId> {
        let direction = unit_direction(offset_direction)?;
        let parent = self.get(id)?.clone();
        let half = (parent.strength() / 2.0).floor();
        let minimum = 2.0 * parent.initial_strength() * config.min_survival_fraction;
        if half < minimum || half < 1.0 {
            return Err(DuelError::SplitRejected { id, half, minimum });
        }

        let offset = SPLIT_MAX_OFFSET.min(SPLIT_BASE_OFFSET + half.sqrt());
        let position = config
            .field
            .clamp(parent.position + direction * offset, SPLIT_EDGE_MARGIN);

        let child = Unit::new(0, parent.owner(), position, half, parent.facing())?
            .with_initial_strength(parent.initial_strength());
        let child_id = self.allocate_id();
        self.get_mut(id)?.detach(half);
        self.units.push(unit_with_id(child, child_id));

        tracing::debug!(parent = id, child = child_id, half, "Unit split");
        Ok(child_id)
    }

    /// Get a unit by id.
    pub fn get(&self, id: UnitId) -> Result<&Unit> {
        self.units
            .iter()
            .find(|u| u.id() == id)
            .ok_or(DuelError::UnitNotFound(id))
    }

    /// Get a mutable unit by id.
    pub fn get_mut(&mut self, id: UnitId) -> Result<&mut Unit> {
        self.units
            .iter_mut()
            .find(|u| u.id() == id)
            .ok_or(DuelError::UnitNotFound(id))
    }

    /// Check if a unit exists.
    #[must_use]
    pub fn contains(&self, id: UnitId) -> bool {
        self.units.iter().any(|u| u.id() == id)
    }

    /// Units in roster order.
    #[must_use]
    pub fn units(&self) -> &[Unit] {
        &self.units
    }

    /// Iterate over units in roster order.
    pub fn iter(&self) -> impl Iterator<Item = &Unit> {
        self.units.iter()
    }

    /// Iterate mutably over units in roster order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Unit> {
        self.units.iter_mut()
    }

    /// Number of units.
    #[must_use]
    pub fn len(&self) -> usize {
        self.units.len()
    }

    /// Check if the roster is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Number of units owned by `owner`.
    #[must_use]
    pub fn count_for(&self, owner: PlayerId) -> usize {
        self.units.iter().filter(|u| u.owner() == owner).count()
    }

    /// Summed strength of `owner`'s units.
    #[must_use]
    pub fn total_strength(&self, owner: PlayerId) -> f64 {
        self.units
            .iter()
            .filter(|u| u.owner() == owner)
            .map(Unit::strength)
            .sum()
    }

    /// Replace the unit list, keeping the id counter.
    pub(crate) fn replace_units(&mut self, units: Vec<Unit>) {
        self.units = units;
    }

    /// Take the unit list out for consolidation.
    pub(crate) fn take_units(&mut self) -> Vec<Unit> {
        std::mem::take(&mut self.units)
    }
}

impl Default for Roster {
    fn default() -> Self {
        Self::new()
    }
}

fn unit_with_id(mut unit: Unit, id: UnitId) -> Unit {
    unit.assign_id(id);
    unit
}
