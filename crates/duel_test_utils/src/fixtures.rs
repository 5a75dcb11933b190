//! Test fixtures and helpers.
//!
//! Pre-built battle states for consistent testing. Every fixture returns a
//! simulation in the `AwaitingOrders` phase, ready for
//! [`BattleSimulation::start_cycle`].

use std::time::Duration;

use duel_core::prelude::*;

/// Frame step used by tests, roughly 60 frames per second.
pub const FRAME: Duration = Duration::from_millis(16);

/// Spawn a unit with the owner's outward facing, panicking on invalid input.
///
/// # Panics
///
/// Panics if the unit is rejected.
pub fn spawn(sim: &mut BattleSimulation, owner: PlayerId, x: f64, y: f64, strength: f64) -> UnitId {
    sim.spawn_unit(UnitSpawnParams::new(owner, Vec2::new(x, y), strength))
        .expect("fixture unit should be valid")
}

/// Spawn a unit with an explicit facing.
///
/// # Panics
///
/// Panics if the unit is rejected.
pub fn spawn_facing(
    sim: &mut BattleSimulation,
    owner: PlayerId,
    position: Vec2,
    strength: f64,
    facing: Vec2,
) -> UnitId {
    sim.spawn_unit(UnitSpawnParams::new(owner, position, strength).facing(facing))
        .expect("fixture unit should be valid")
}

/// Move a fresh simulation into order entry.
///
/// # Panics
///
/// Panics if the simulation is not `Idle`.
pub fn ready(mut sim: BattleSimulation) -> BattleSimulation {
    sim.begin_orders().expect("fixture should start idle");
    sim
}

/// Two strength-100 units 100 apart, facing each other.
///
/// Unit 1 belongs to player one at (100, 300), unit 2 to player two at
/// (200, 300).
#[must_use]
pub fn head_on_duel() -> BattleSimulation {
    let mut sim = BattleSimulation::default();
    spawn(&mut sim, PlayerId::One, 100.0, 300.0, 100.0);
    spawn(&mut sim, PlayerId::Two, 200.0, 300.0, 100.0);
    ready(sim)
}

/// Two opposing lines of `per_side` units 140 apart, every unit ordered
/// forward by 100.
///
/// # Panics
///
/// Panics if `per_side` units do not fit on the field.
#[must_use]
pub fn battle_lines(per_side: u32) -> BattleSimulation {
    let mut sim = BattleSimulation::default();
    for i in 0..per_side {
        let y = 40.0 + f64::from(i) * 30.0;
        spawn(&mut sim, PlayerId::One, 420.0, y, 80.0);
        spawn(&mut sim, PlayerId::Two, 560.0, y, 80.0);
    }
    let mut sim = ready(sim);
    order_all_forward(&mut sim, 100.0);
    sim
}

/// Two units on a collision course, each ordered straight through the other.
#[must_use]
pub fn crossing_paths() -> BattleSimulation {
    let mut sim = BattleSimulation::default();
    let a = spawn(&mut sim, PlayerId::One, 430.0, 300.0, 100.0);
    let b = spawn(&mut sim, PlayerId::Two, 570.0, 300.0, 100.0);
    let mut sim = ready(sim);
    sim.issue_order(a, Vec2::new(570.0, 300.0))
        .expect("order should be valid");
    sim.issue_order(b, Vec2::new(430.0, 300.0))
        .expect("order should be valid");
    sim
}

/// Two units whose paths cross at right angles.
///
/// Unit 1 at (100, 300) is ordered 140 along +x, unit 2 at (150, 250) is
/// ordered 100 along +y across unit 1's path. Both belong to player one.
#[must_use]
pub fn perpendicular_crossing() -> BattleSimulation {
    let mut sim = BattleSimulation::default();
    let a = spawn(&mut sim, PlayerId::One, 100.0, 300.0, 100.0);
    let b = spawn(&mut sim, PlayerId::One, 150.0, 250.0, 100.0);
    let mut sim = ready(sim);
    sim.issue_order(a, Vec2::new(240.0, 300.0))
        .expect("order should be valid");
    sim.issue_order(b, Vec2::new(150.0, 350.0))
        .expect("order should be valid");
    sim
}

/// Order every unit `distance` along its owner's outward facing.
///
/// # Panics
///
/// Panics if the simulation is not awaiting orders.
pub fn order_all_forward(sim: &mut BattleSimulation, distance: f64) {
    let units: Vec<(UnitId, PlayerId, Vec2)> = sim
        .roster()
        .iter()
        .map(|unit| (unit.id(), unit.owner(), unit.position))
        .collect();
    for (id, owner, position) in units {
        sim.issue_order(id, position + owner.outward_facing() * distance)
            .expect("forward order should be valid");
    }
}
