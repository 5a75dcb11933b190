//! Determinism testing utilities.
//!
//! Provides a harness for verifying that the battle engine produces
//! identical results given identical inputs.
//!
//! # Testing Strategy
//!
//! A battle cycle must replay bit for bit. Sources of non-determinism
//! include:
//!
//! - **Iteration order**: units are always processed in id order, and the
//!   collision sweep visits pairs in that order.
//!
//! - **Evaluation order of float math**: every formula is evaluated in one
//!   fixed order from the frozen snapshot, never from partially updated
//!   state.
//!
//! - **System randomness**: the engine never draws random numbers; split
//!   offsets are supplied by the caller.
//!
//! # Test Levels
//!
//! 1. **Unit tests**: each component in isolation (targeting, combat, ...)
//! 2. **Property tests**: random rosters still produce deterministic outputs
//! 3. **Integration tests**: multi-cycle battles are reproducible
//! 4. **Parallel tests**: running N simulations on threads all match

use std::thread;

use duel_core::simulation::BattleSimulation;

use crate::fixtures::FRAME;

/// Result of a determinism test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeterminismResult {
    /// Whether all runs produced identical results.
    pub is_deterministic: bool,
    /// Hashes from each run.
    pub hashes: Vec<u64>,
    /// Number of steps simulated.
    pub steps: u64,
}

impl DeterminismResult {
    /// Get all unique hashes (should be 1 for deterministic simulation).
    #[must_use]
    pub fn unique_hashes(&self) -> Vec<u64> {
        let mut unique: Vec<u64> = self.hashes.clone();
        unique.sort_unstable();
        unique.dedup();
        unique
    }

    /// Assert that the simulation was deterministic, with a detailed error message.
    ///
    /// # Panics
    ///
    /// Panics if the simulation produced different hashes across runs.
    pub fn assert_deterministic(&self) {
        if !self.is_deterministic {
            let unique = self.unique_hashes();
            panic!(
                "Simulation is non-deterministic!\n\
                 Runs: {}\n\
                 Steps: {}\n\
                 Unique hashes: {} (expected 1)\n\
                 All hashes: {:?}",
                self.hashes.len(),
                self.steps,
                unique.len(),
                self.hashes
            );
        }
    }
}

/// Result of parallel simulation runs.
#[derive(Debug, Clone)]
pub struct ParallelSimResult {
    /// Final state hash from each simulation.
    pub hashes: Vec<u64>,
    /// Number of cycles each simulation ran.
    pub cycles: u64,
    /// Number of simulations run.
    pub num_sims: usize,
}

impl ParallelSimResult {
    /// Check if all simulations produced identical results.
    #[must_use]
    pub fn is_deterministic(&self) -> bool {
        self.hashes.windows(2).all(|w| w[0] == w[1])
    }

    /// Assert all simulations matched.
    ///
    /// # Panics
    ///
    /// Panics if simulations produced different hashes.
    pub fn assert_deterministic(&self) {
        if !self.is_deterministic() {
            let mut unique: Vec<u64> = self.hashes.clone();
            unique.sort_unstable();
            unique.dedup();
            panic!(
                "Parallel simulations diverged!\n\
                 Simulations: {}\n\
                 Cycles: {}\n\
                 Unique hashes: {}\n\
                 All hashes: {:?}",
                self.num_sims,
                self.cycles,
                unique.len(),
                self.hashes
            );
        }
    }
}

/// Run a simulation multiple times and verify determinism.
///
/// # Arguments
///
/// * `runs` - Number of times to run the simulation
/// * `steps` - Number of steps to simulate per run
/// * `setup` - Function to create initial simulation state
/// * `step` - Function to advance the simulation by one step
/// * `hash` - Function to compute state hash
///
/// # Example
///
/// ```
/// use duel_test_utils::determinism::{advance_cycle, verify_determinism};
/// use duel_test_utils::fixtures::head_on_duel;
///
/// let result = verify_determinism(
///     3,  // Run 3 times
///     5,  // 5 cycles each
///     head_on_duel,
///     advance_cycle,
///     |sim| sim.state_hash(),
/// );
/// result.assert_deterministic();
/// ```
pub fn verify_determinism<S, Setup, Step, HashFn>(
    runs: usize,
    steps: u64,
    setup: Setup,
    step: Step,
    hash: HashFn,
) -> DeterminismResult
where
    Setup: Fn() -> S,
    Step: Fn(&mut S),
    HashFn: Fn(&S) -> u64,
{
    let mut hashes = Vec::with_capacity(runs);

    for _ in 0..runs {
        let mut state = setup();

        for _ in 0..steps {
            step(&mut state);
        }

        hashes.push(hash(&state));
    }

    let is_deterministic = hashes.windows(2).all(|w| w[0] == w[1]);

    DeterminismResult {
        is_deterministic,
        hashes,
        steps,
    }
}

/// Run one full battle cycle at [`FRAME`] steps.
///
/// Does nothing once the simulation cannot start a cycle (for example
/// when it is still `Idle`).
pub fn advance_cycle(sim: &mut BattleSimulation) {
    if let Err(err) = sim.run_cycle(FRAME) {
        tracing::debug!(%err, "Cycle not run");
    }
}

/// Simplified determinism verification for [`BattleSimulation`].
///
/// Runs the simulation twice with identical setup and verifies the final
/// state hashes match exactly.
///
/// # Returns
///
/// `true` if both runs produced identical state hashes.
pub fn verify_battle_determinism<F>(setup_fn: F, cycles: u64) -> bool
where
    F: Fn() -> BattleSimulation,
{
    let result = verify_determinism(2, cycles, &setup_fn, advance_cycle, |sim| {
        sim.state_hash()
    });
    result.is_deterministic
}

/// Run N simulations on scoped threads and collect final hashes.
///
/// Catches non-determinism that only shows up under thread scheduling or
/// memory layout differences.
///
/// # Example
///
/// ```
/// use duel_test_utils::determinism::run_parallel_simulations;
/// use duel_test_utils::fixtures::head_on_duel;
///
/// let result = run_parallel_simulations(head_on_duel, 4, 3);
/// result.assert_deterministic();
/// ```
pub fn run_parallel_simulations<F>(setup_fn: F, num_sims: usize, cycles: u64) -> ParallelSimResult
where
    F: Fn() -> BattleSimulation + Sync,
{
    let hashes = thread::scope(|s| {
        let handles: Vec<_> = (0..num_sims)
            .map(|_| {
                s.spawn(|| {
                    let mut sim = setup_fn();
                    for _ in 0..cycles {
                        advance_cycle(&mut sim);
                    }
                    sim.state_hash()
                })
            })
            .collect();

        handles
            .into_iter()
            .map(|h| h.join().expect("simulation thread panicked"))
            .collect()
    });

    ParallelSimResult {
        hashes,
        cycles,
        num_sims,
    }
}

/// Compare two simulation runs frame by frame, finding the first divergence.
///
/// Both runs execute `cycles` battle cycles. Every animation frame and the
/// committed state after each cycle are compared.
///
/// # Returns
///
/// `None` if the runs match, `Some(frame)` with the 1-based index of the
/// first frame that differs (0 if the initial states differ).
pub fn find_first_divergence<F>(setup_fn: F, cycles: u64) -> Option<u64>
where
    F: Fn() -> BattleSimulation,
{
    let mut sim1 = setup_fn();
    let mut sim2 = setup_fn();

    if sim1.state_hash() != sim2.state_hash() {
        return Some(0);
    }

    let mut frame = 0;
    for _ in 0..cycles {
        if sim1.start_cycle().is_err() || sim2.start_cycle().is_err() {
            break;
        }
        loop {
            frame += 1;
            let events1 = sim1.tick(FRAME);
            let events2 = sim2.tick(FRAME);
            if events1 != events2 || sim1.state_hash() != sim2.state_hash() {
                return Some(frame);
            }
            if events1.is_cycle_complete() {
                break;
            }
        }
    }

    None
}

/// Proptest strategies for battle testing.
///
/// These strategies generate random but reproducible rosters and orders
/// inside the default 1000x600 field.
pub mod strategies {
    use proptest::prelude::*;

    use duel_core::prelude::*;

    /// Generate a unit strength (1-400).
    pub fn arb_strength() -> impl Strategy<Value = f64> {
        (1u32..400u32).prop_map(f64::from)
    }

    /// Generate a position inside the default field, away from the edges.
    pub fn arb_position() -> impl Strategy<Value = Vec2> {
        (40u32..960u32, 40u32..560u32).prop_map(|(x, y)| Vec2::new(f64::from(x), f64::from(y)))
    }

    /// Generate a facing from a whole-degree angle.
    pub fn arb_facing() -> impl Strategy<Value = Vec2> {
        (0u32..360u32).prop_map(|deg| {
            let radians = f64::from(deg).to_radians();
            Vec2::new(radians.cos(), radians.sin())
        })
    }

    /// Generate either player.
    pub fn arb_owner() -> impl Strategy<Value = PlayerId> {
        prop_oneof![Just(PlayerId::One), Just(PlayerId::Two)]
    }

    /// Generate spawn parameters for one unit.
    pub fn arb_unit_params() -> impl Strategy<Value = UnitSpawnParams> {
        (arb_owner(), arb_position(), arb_strength(), arb_facing()).prop_map(
            |(owner, position, strength, facing)| {
                UnitSpawnParams::new(owner, position, strength).facing(facing)
            },
        )
    }

    /// Generate an order as an offset from the unit's position, or none.
    pub fn arb_order_offset() -> impl Strategy<Value = Option<Vec2>> {
        proptest::option::of(
            (-140i32..=140i32, -140i32..=140i32)
                .prop_map(|(x, y)| Vec2::new(f64::from(x), f64::from(y))),
        )
    }

    /// A unit together with its optional order offset.
    #[derive(Debug, Clone)]
    pub struct TestUnit {
        /// Spawn parameters.
        pub params: UnitSpawnParams,
        /// Order target relative to the unit's position.
        pub order_offset: Option<Vec2>,
    }

    /// Generate a unit with an optional order.
    pub fn arb_test_unit() -> impl Strategy<Value = TestUnit> {
        (arb_unit_params(), arb_order_offset())
            .prop_map(|(params, order_offset)| TestUnit { params, order_offset })
    }

    /// Generate a roster of up to `max_units` units (at least two).
    pub fn arb_roster(max_units: usize) -> impl Strategy<Value = Vec<TestUnit>> {
        proptest::collection::vec(arb_test_unit(), 2..max_units)
    }

    /// Build a simulation awaiting orders from generated units.
    ///
    /// Orders too short to be kept are simply cleared.
    ///
    /// # Panics
    ///
    /// Panics if a generated unit is rejected.
    #[must_use]
    pub fn build_simulation(units: &[TestUnit]) -> BattleSimulation {
        let mut sim = BattleSimulation::default();
        let mut ids = Vec::with_capacity(units.len());
        for unit in units {
            ids.push(
                sim.spawn_unit(unit.params)
                    .expect("generated unit should be valid"),
            );
        }
        sim.begin_orders().expect("fresh simulation is idle");
        for (id, unit) in ids.into_iter().zip(units) {
            if let Some(offset) = unit.order_offset {
                sim.issue_order(id, unit.params.position + offset)
                    .expect("generated order should be valid");
            }
        }
        sim
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{battle_lines, crossing_paths, head_on_duel};
    use proptest::prelude::*;

    // =========================================================================
    // Basic determinism tests
    // =========================================================================

    #[test]
    fn test_verify_determinism_simple() {
        let result = verify_determinism(3, 100, || 0u64, |n| *n += 1, |n| *n);

        assert!(result.is_deterministic);
        assert_eq!(result.hashes, vec![100, 100, 100]);
    }

    #[test]
    fn test_empty_simulation_determinism() {
        assert!(verify_battle_determinism(BattleSimulation::default, 5));
    }

    #[test]
    fn test_head_on_determinism() {
        assert!(verify_battle_determinism(head_on_duel, 10));
    }

    #[test]
    fn test_battle_lines_determinism() {
        let result = verify_determinism(3, 4, || battle_lines(6), advance_cycle, |sim| {
            sim.state_hash()
        });
        result.assert_deterministic();
    }

    #[test]
    fn test_find_divergence_on_deterministic_sim() {
        assert_eq!(find_first_divergence(crossing_paths, 3), None);
    }

    #[test]
    fn test_cycles_change_state() {
        let mut sim = head_on_duel();
        let before = sim.state_hash();
        advance_cycle(&mut sim);
        assert_ne!(sim.state_hash(), before);
    }

    #[test]
    fn test_parallel_battle_simulations() {
        let result = run_parallel_simulations(|| battle_lines(8), 4, 3);
        result.assert_deterministic();
        assert_eq!(result.hashes.len(), 4);
    }

    // =========================================================================
    // Property-based tests using proptest
    // =========================================================================

    proptest! {
        /// Any random roster replays to the same state.
        #[test]
        fn prop_random_rosters_are_deterministic(
            units in strategies::arb_roster(12),
        ) {
            let setup = || strategies::build_simulation(&units);
            let result = verify_determinism(2, 2, setup, advance_cycle, |s| s.state_hash());
            prop_assert!(result.is_deterministic);
        }

        /// Frames of a random cycle match frame for frame.
        #[test]
        fn prop_frames_are_replayable(
            units in strategies::arb_roster(8),
        ) {
            prop_assert_eq!(
                find_first_divergence(|| strategies::build_simulation(&units), 1),
                None
            );
        }
    }

    // =========================================================================
    // Stress tests (only run explicitly with --ignored)
    // =========================================================================

    #[test]
    #[ignore = "Long-running stress test"]
    fn stress_test_many_units() {
        let result = verify_determinism(5, 20, || battle_lines(18), advance_cycle, |s| {
            s.state_hash()
        });
        result.assert_deterministic();
    }
}
