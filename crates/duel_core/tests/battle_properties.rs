//! Battle-cycle properties checked against whole rosters.

use std::time::Duration;

use duel_core::animation::{minimum_separation, Animator};
use duel_core::combat::resolve_combat;
use duel_core::consolidation::{consolidate, merge_overlaps, prune_weak};
use duel_core::math::segment_distance;
use duel_core::prelude::*;
use duel_core::retreat::plan_moves;
use duel_core::targeting::{build_engagements, in_engagement_zone};
use duel_test_utils::determinism::strategies;
use duel_test_utils::fixtures::{
    crossing_paths, head_on_duel, perpendicular_crossing, spawn, spawn_facing, FRAME,
};
use duel_test_utils::proptest::prelude::*;

struct Cycle {
    snapshot: BattleSnapshot,
    graph: EngagementGraph,
    outcome: CombatOutcome,
    plans: Vec<MovePlan>,
}

fn resolve(sim: &BattleSimulation) -> Cycle {
    let config = sim.config();
    let snapshot = BattleSnapshot::capture(sim.roster());
    let graph = build_engagements(&snapshot, config);
    let outcome = resolve_combat(&snapshot, &graph, config);
    let plans = plan_moves(&snapshot, &graph, &outcome, config);
    Cycle {
        snapshot,
        graph,
        outcome,
        plans,
    }
}

// =========================================================================
// Range and cone exactness
// =========================================================================

#[test]
fn test_range_boundary_exact() {
    let mut sim = BattleSimulation::default();
    spawn(&mut sim, PlayerId::One, 100.0, 300.0, 50.0);
    spawn_facing(&mut sim, PlayerId::Two, Vec2::new(240.0, 300.0), 50.0, Vec2::X);
    spawn_facing(&mut sim, PlayerId::Two, Vec2::new(100.0, 440.5), 50.0, Vec2::X);

    let cycle = resolve(&sim);
    // Exactly 140 away on the facing axis: selected
    assert_eq!(cycle.graph.target_count(0), 1);
    assert_eq!(cycle.graph.engagements()[0].defender, 2);
}

#[test]
fn test_cone_boundary_exact() {
    let mut sim = BattleSimulation::default();
    spawn(&mut sim, PlayerId::One, 300.0, 300.0, 50.0);
    // Straight up and straight down: exactly 90 degrees off +x
    spawn_facing(&mut sim, PlayerId::Two, Vec2::new(300.0, 200.0), 50.0, Vec2::NEG_X);
    spawn_facing(&mut sim, PlayerId::Two, Vec2::new(300.0, 400.0), 50.0, Vec2::NEG_X);
    // Just behind the shoulder line
    spawn_facing(&mut sim, PlayerId::Two, Vec2::new(299.0, 420.0), 50.0, Vec2::NEG_X);

    let cycle = resolve(&sim);
    let defenders: Vec<UnitId> = cycle.graph.outgoing(0).map(|e| e.defender).collect();
    assert_eq!(defenders, vec![2, 3]);
}

proptest! {
    /// Selection matches the range and cone predicate for every pair.
    #[test]
    fn prop_targets_match_geometry(units in strategies::arb_roster(10)) {
        let sim = strategies::build_simulation(&units);
        let cycle = resolve(&sim);
        let config = sim.config();

        for (a, attacker) in cycle.snapshot.units().iter().enumerate() {
            let expected: Vec<usize> = cycle
                .snapshot
                .units()
                .iter()
                .enumerate()
                .filter(|(d, defender)| {
                    *d != a
                        && defender.owner != attacker.owner
                        && in_engagement_zone(
                            attacker.position,
                            attacker.assigned_direction(),
                            defender.position,
                            config,
                        )
                })
                .map(|(d, _)| d)
                .collect();
            let actual: Vec<usize> = cycle.graph.outgoing(a).map(|e| e.defender_index()).collect();
            prop_assert_eq!(actual, expected);

            for engagement in cycle.graph.outgoing(a) {
                let contribution = attacker.strength / cycle.graph.target_count(a) as f64;
                prop_assert_eq!(engagement.contribution, contribution);
            }
        }
    }

    /// Combat never adds strength, and uninvolved units lose nothing.
    #[test]
    fn prop_conservation_with_loss(units in strategies::arb_roster(12)) {
        let sim = strategies::build_simulation(&units);
        let cycle = resolve(&sim);

        let before: f64 = cycle.snapshot.units().iter().map(|u| u.strength).sum();
        let after: f64 = cycle.outcome.breakdowns().iter().map(|b| b.strength_after).sum();
        prop_assert!(after <= before);
        if !cycle.graph.is_empty() {
            prop_assert!(after < before);
        }

        for (index, breakdown) in cycle.outcome.breakdowns().iter().enumerate() {
            prop_assert!(breakdown.strength_after >= 0.0);
            if cycle.graph.incoming(index).next().is_none() {
                prop_assert_eq!(breakdown.defender_loss, 0.0);
                if !cycle.graph.is_attacking(index) {
                    prop_assert_eq!(breakdown.total_loss(), 0.0);
                }
            }
        }
    }

    /// Units never end a frame closer than the minimum separation unless
    /// they already started closer.
    #[test]
    fn prop_collision_non_penetration(units in strategies::arb_roster(8)) {
        let sim = strategies::build_simulation(&units);
        let config = sim.config().clone();
        let cycle = resolve(&sim);
        let animator = Animator::new(&cycle.snapshot, &cycle.plans, &config);
        let start = animator.frame(Duration::ZERO);

        for k in 0..=50u32 {
            let frame = animator.frame(animator.duration() * k / 50);
            for i in 0..frame.units.len() {
                for j in (i + 1)..frame.units.len() {
                    let limit = minimum_separation(
                        &config,
                        cycle.snapshot.unit(i).strength,
                        cycle.snapshot.unit(j).strength,
                    );
                    let initial = start.units[i].position.distance(start.units[j].position);
                    if initial < limit {
                        continue;
                    }
                    let gap = frame.units[i].position.distance(frame.units[j].position);
                    prop_assert!(gap >= limit - 1e-6, "frame {} pair ({}, {}): {} < {}", k, i, j, gap, limit);
                }
            }
        }
    }

    /// A unit whose path keeps the minimum separation from every other
    /// unit's path ends the cycle exactly on its target.
    #[test]
    fn prop_clear_path_reaches_target(units in strategies::arb_roster(8)) {
        let sim = strategies::build_simulation(&units);
        let config = sim.config().clone();
        let cycle = resolve(&sim);
        let animator = Animator::new(&cycle.snapshot, &cycle.plans, &config);
        let start = animator.frame(Duration::ZERO);
        let last = animator.final_frame();
        let targets: Vec<Vec2> = start
            .units
            .iter()
            .map(|unit| animator.target(unit.id).unwrap())
            .collect();

        for i in 0..targets.len() {
            let clear = (0..targets.len()).filter(|&j| j != i).all(|j| {
                let limit = minimum_separation(
                    &config,
                    cycle.snapshot.unit(i).strength,
                    cycle.snapshot.unit(j).strength,
                );
                let corridor = segment_distance(
                    start.units[i].position,
                    targets[i],
                    start.units[j].position,
                    targets[j],
                );
                corridor >= limit + 1e-6
            });
            if clear {
                prop_assert!(!animator.is_blocked(start.units[i].id));
                prop_assert_eq!(last.units[i].position, targets[i]);
            }
        }
    }
}

// =========================================================================
// Passive-defense asymmetry
// =========================================================================

#[test]
fn test_passive_defense_factor_of_ten() {
    let attacker_loss = |defender_facing: Vec2| {
        let mut sim = BattleSimulation::default();
        spawn(&mut sim, PlayerId::One, 100.0, 300.0, 100.0);
        spawn_facing(
            &mut sim,
            PlayerId::Two,
            Vec2::new(200.0, 300.0),
            1000.0,
            defender_facing,
        );
        resolve(&sim).outcome.breakdown(0).attacker_loss
    };

    let against_active = attacker_loss(Vec2::NEG_X);
    let against_passive = attacker_loss(Vec2::X);
    assert_eq!(against_active, 20.0);
    assert_eq!(against_passive, 2.0);
    assert_eq!(against_active, 10.0 * against_passive);
}

// =========================================================================
// Retreat threshold
// =========================================================================

#[test]
fn test_retreat_threshold_is_strict() {
    let plan_for = |attacker_strength: f64| {
        let mut sim = BattleSimulation::default();
        spawn(&mut sim, PlayerId::One, 100.0, 300.0, attacker_strength);
        spawn_facing(&mut sim, PlayerId::Two, Vec2::new(200.0, 300.0), 100.0, Vec2::X);
        resolve(&sim).plans[1]
    };

    let equal = plan_for(100.0);
    assert_eq!(equal.kind, MoveKind::Hold);
    assert_eq!(equal.distance, 0.0);

    let above = plan_for(101.0);
    assert_eq!(above.kind, MoveKind::Retreat);
    assert!((above.distance - 60.2).abs() < 1e-9);
}

#[test]
fn test_retreat_distance_clamped_to_range() {
    let mut sim = BattleSimulation::default();
    spawn(&mut sim, PlayerId::One, 100.0, 300.0, 2000.0);
    spawn_facing(&mut sim, PlayerId::Two, Vec2::new(200.0, 300.0), 1000.0, Vec2::X);
    let plan = resolve(&sim).plans[1];
    assert_eq!(plan.kind, MoveKind::Retreat);
    assert_eq!(plan.distance, 140.0);
}

// =========================================================================
// Survival floor and merging
// =========================================================================

#[test]
fn test_survival_floor_inclusive() {
    let config = BattleConfig::default();
    let mut roster = Roster::new();
    for (x, strength) in [(100.0, 5.0), (300.0, 4.999)] {
        let id = roster
            .spawn(UnitSpawnParams::new(PlayerId::One, Vec2::new(x, 300.0), 100.0))
            .unwrap();
        roster.get_mut(id).unwrap().set_strength(strength).unwrap();
    }
    let mut units = roster.units().to_vec();
    let removed = prune_weak(&mut units, &config);
    assert_eq!(removed, vec![2]);
    assert_eq!(units.len(), 1);
}

#[test]
fn test_merge_conservation() {
    let config = BattleConfig::default();
    let mut roster = Roster::new();
    let a = roster
        .spawn(UnitSpawnParams::new(PlayerId::Two, Vec2::new(700.0, 300.0), 300.0))
        .unwrap();
    let b = roster
        .spawn(UnitSpawnParams::new(PlayerId::Two, Vec2::new(715.0, 300.0), 120.0))
        .unwrap();
    roster.get_mut(a).unwrap().set_strength(37.5).unwrap();
    roster.get_mut(b).unwrap().set_strength(81.25).unwrap();

    let mut units = roster.units().to_vec();
    let merges = merge_overlaps(&mut units, &config);
    assert_eq!(merges.len(), 1);
    assert_eq!(units.len(), 1);
    assert_eq!(units[0].strength(), 37.5 + 81.25);
    assert_eq!(units[0].initial_strength(), 300.0);

    let report = consolidate(&mut roster, &config);
    assert_eq!(report.merged_count(), 1);
    assert_eq!(report.removed_count(), 0);
}

// =========================================================================
// Whole cycles
// =========================================================================

#[test]
fn test_end_to_end_head_on() {
    let mut sim = head_on_duel();
    let cycle = resolve(&sim);

    for index in 0..2 {
        assert_eq!(cycle.graph.incoming_sum(index), 100.0);
        assert_eq!(cycle.outcome.breakdown(index).defender_loss, 2.0);
        assert_eq!(cycle.plans[index].kind, MoveKind::Hold);
    }

    let result = sim.run_cycle(FRAME).unwrap();
    assert!(result.retreated.is_empty());
    assert_eq!(result.removed_count(), 0);
    for unit in sim.roster().iter() {
        // Defender loss 2 plus attacker loss 2
        assert_eq!(unit.strength(), 96.0);
    }
    assert_eq!(sim.unit(1).unwrap().position, Vec2::new(100.0, 300.0));
    assert_eq!(sim.unit(2).unwrap().position, Vec2::new(200.0, 300.0));
}

#[test]
fn test_crossing_units_never_pass_through() {
    let mut sim = crossing_paths();
    let limit = minimum_separation(sim.config(), 100.0, 100.0);
    sim.start_cycle().unwrap();

    loop {
        let events = sim.tick(FRAME);
        let frame = events.frame.as_ref().unwrap();
        let gap = frame.units[0].position.distance(frame.units[1].position);
        assert!(gap >= limit - 1e-6);
        assert!(frame.units[0].position.x < frame.units[1].position.x);
        if events.is_cycle_complete() {
            break;
        }
    }
}

#[test]
fn test_perpendicular_crossing_reaches_targets() {
    let mut sim = perpendicular_crossing();
    let limit = minimum_separation(sim.config(), 100.0, 100.0);
    sim.start_cycle().unwrap();

    loop {
        let events = sim.tick(FRAME);
        let frame = events.frame.as_ref().unwrap();
        let gap = frame.units[0].position.distance(frame.units[1].position);
        assert!(gap >= limit - 1e-6);
        if events.is_cycle_complete() {
            break;
        }
    }

    assert_eq!(sim.unit(1).unwrap().position, Vec2::new(240.0, 300.0));
    assert_eq!(sim.unit(2).unwrap().position, Vec2::new(150.0, 350.0));
}

#[test]
fn test_battle_grinds_down_over_cycles() {
    let mut sim = head_on_duel();
    let mut previous = sim.roster().total_strength(PlayerId::One);
    for _ in 0..5 {
        sim.run_cycle(FRAME).unwrap();
        let current = sim.roster().total_strength(PlayerId::One);
        assert!(current < previous);
        previous = current;
    }
    assert_eq!(sim.cycle(), 5);
}
