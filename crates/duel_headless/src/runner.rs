//! Headless battle runner implementation.

use std::io::Write;
use std::time::Duration;

use duel_core::prelude::*;
use std::result::Result;

use crate::protocol::{Event, SideSummary};
use crate::scenario::{Round, Scenario, ScenarioError};

/// Headless runner configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunnerConfig {
    /// Emit a `frame` event for every animation step.
    pub emit_frames: bool,
    /// Animation steps per second of simulated time.
    pub fps: u32,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            emit_frames: false,
            fps: 60,
        }
    }
}

impl RunnerConfig {
    /// Simulated time advanced per animation step.
    #[must_use]
    pub fn frame_step(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.fps.max(1)))
    }
}

/// Outcome of one scenario run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    /// Scenario name.
    pub scenario: String,
    /// Cycles completed.
    pub cycles: u64,
    /// State hash after each completed cycle.
    pub cycle_hashes: Vec<u64>,
    /// State hash at the end of the run.
    pub final_hash: u64,
    /// Player one's remaining forces.
    pub player_one: SideSummary,
    /// Player two's remaining forces.
    pub player_two: SideSummary,
}

impl RunSummary {
    fn event(&self) -> Event {
        Event::Summary {
            scenario: self.scenario.clone(),
            cycles: self.cycles,
            player_one: self.player_one,
            player_two: self.player_two,
            hash: self.final_hash,
        }
    }
}

/// Plays a scenario round by round, one battle cycle per round.
pub struct BattleRunner {
    scenario: Scenario,
    config: RunnerConfig,
}

impl BattleRunner {
    /// Create a runner with default config.
    pub fn new(scenario: Scenario) -> Self {
        Self::with_config(scenario, RunnerConfig::default())
    }

    /// Create a runner with custom configuration.
    pub fn with_config(scenario: Scenario, config: RunnerConfig) -> Self {
        Self { scenario, config }
    }

    /// Scenario being played.
    pub fn scenario(&self) -> &Scenario {
        &self.scenario
    }

    /// Run every round, passing each event to `emit`.
    ///
    /// The run stops early once either player has no units left.
    pub fn run<F>(&self, mut emit: F) -> Result<RunSummary, ScenarioError>
    where
        F: FnMut(Event) -> Result<(), ScenarioError>,
    {
        let mut sim = self.scenario.build_simulation()?;
        let step = self.config.frame_step();
        let mut cycle_hashes = Vec::with_capacity(self.scenario.rounds.len());

        tracing::info!(
            scenario = %self.scenario.name,
            units = sim.roster().len(),
            rounds = self.scenario.rounds.len(),
            "Starting scenario run"
        );
        emit(Event::ready(&self.scenario.name, sim.roster().len()))?;

        for round in &self.scenario.rounds {
            if let Some(loser) = eliminated_side(sim.roster()) {
                tracing::info!(
                    player = loser.number(),
                    cycle = sim.cycle(),
                    "Side eliminated, ending run"
                );
                break;
            }

            apply_orders(&mut sim, round)?;
            sim.start_cycle()?;
            emit(Event::CycleStarted {
                cycle: sim.cycle() + 1,
                engagements: sim.pending_engagements().map_or(0, <[Engagement]>::len),
                retreating: sim
                    .pending_plans()
                    .map_or(0, |plans| plans.iter().filter(|p| p.is_retreat()).count()),
            })?;

            let result = loop {
                let events = sim.tick(step);
                if self.config.emit_frames {
                    if let Some(frame) = &events.frame {
                        emit(Event::frame(frame_cycle(&sim, &events), frame))?;
                    }
                }
                if let Some(result) = events.result {
                    break result;
                }
            };

            let hash = sim.state_hash();
            cycle_hashes.push(hash);
            emit(Event::cycle_complete(&result, hash))?;
        }

        let summary = RunSummary {
            scenario: self.scenario.name.clone(),
            cycles: sim.cycle(),
            cycle_hashes,
            final_hash: sim.state_hash(),
            player_one: SideSummary::of(sim.roster(), PlayerId::One),
            player_two: SideSummary::of(sim.roster(), PlayerId::Two),
        };
        emit(summary.event())?;
        tracing::info!(
            scenario = %summary.scenario,
            cycles = summary.cycles,
            hash = summary.final_hash,
            "Scenario run complete"
        );
        Ok(summary)
    }

    /// Run every round, writing events as JSON lines to `out`.
    pub fn run_to_writer<W: Write>(&self, mut out: W) -> Result<RunSummary, ScenarioError> {
        let summary = self.run(|event| {
            out.write_all(event.to_json_line().as_bytes())?;
            Ok(())
        })?;
        out.flush()?;
        Ok(summary)
    }

    /// Run every round, collecting the events in memory.
    pub fn collect_events(&self) -> Result<(Vec<Event>, RunSummary), ScenarioError> {
        let mut events = Vec::new();
        let summary = self.run(|event| {
            events.push(event);
            Ok(())
        })?;
        Ok((events, summary))
    }
}

/// Cycle number a tick belongs to. The completing tick has already bumped
/// the simulation's counter.
fn frame_cycle(sim: &BattleSimulation, events: &TickEvents) -> u64 {
    match &events.result {
        Some(result) => result.cycle,
        None => sim.cycle() + 1,
    }
}

fn eliminated_side(roster: &Roster) -> Option<PlayerId> {
    PlayerId::ALL
        .into_iter()
        .find(|&owner| roster.count_for(owner) == 0)
}

/// Issue a round's orders. Orders for units that were merged away or
/// pruned in an earlier cycle are skipped.
fn apply_orders(sim: &mut BattleSimulation, round: &Round) -> Result<(), ScenarioError> {
    for order in &round.orders {
        match sim.issue_order(order.unit, order.target) {
            Ok(_) => {}
            Err(DuelError::UnitNotFound(id)) => {
                tracing::warn!(unit = id, "Order for missing unit skipped");
            }
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

/// Result of running one scenario several times.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifyReport {
    /// Number of runs performed.
    pub runs: u32,
    /// Final state hash of each run.
    pub final_hashes: Vec<u64>,
    /// First run whose per-cycle hashes differ from run 0, with the cycle
    /// index where they first differ.
    pub first_divergence: Option<(u32, usize)>,
}

impl VerifyReport {
    /// Whether every run matched the first.
    pub fn is_deterministic(&self) -> bool {
        self.first_divergence.is_none()
    }
}

/// Run `scenario` `runs` times and compare the per-cycle state hashes.
pub fn verify_determinism(scenario: &Scenario, runs: u32) -> Result<VerifyReport, ScenarioError> {
    let runner = BattleRunner::new(scenario.clone());
    let mut reference: Option<Vec<u64>> = None;
    let mut final_hashes = Vec::with_capacity(runs as usize);
    let mut first_divergence = None;

    for run in 0..runs {
        let summary = runner.run(|_| Ok(()))?;
        final_hashes.push(summary.final_hash);
        match &reference {
            None => reference = Some(summary.cycle_hashes),
            Some(expected) => {
                if first_divergence.is_none() && *expected != summary.cycle_hashes {
                    let cycle = expected
                        .iter()
                        .zip(&summary.cycle_hashes)
                        .position(|(a, b)| a != b)
                        .unwrap_or_else(|| expected.len().min(summary.cycle_hashes.len()));
                    tracing::warn!(run, cycle, "Run diverged from the first run");
                    first_divergence = Some((run, cycle));
                }
            }
        }
    }

    Ok(VerifyReport {
        runs,
        final_hashes,
        first_divergence,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario::{OrderEntry, UnitPlacement};

    #[test]
    fn test_head_on_event_order() {
        let runner = BattleRunner::new(Scenario::head_on_duel());
        let (events, summary) = runner.collect_events().unwrap();

        let names: Vec<&str> = events.iter().map(Event::name).collect();
        assert_eq!(
            names,
            vec![
                "ready",
                "cycle_started",
                "cycle_complete",
                "cycle_started",
                "cycle_complete",
                "cycle_started",
                "cycle_complete",
                "summary",
            ]
        );
        assert_eq!(summary.cycles, 3);
        assert_eq!(summary.cycle_hashes.len(), 3);
        assert_eq!(summary.final_hash, summary.cycle_hashes[2]);
    }

    #[test]
    fn test_first_cycle_strengths() {
        let mut scenario = Scenario::head_on_duel();
        scenario.rounds.truncate(1);
        let (events, summary) = BattleRunner::new(scenario).collect_events().unwrap();

        let Event::CycleStarted { engagements, retreating, .. } = &events[1] else {
            panic!("expected cycle_started, got {:?}", events[1]);
        };
        assert_eq!((*engagements, *retreating), (2, 0));

        let Event::CycleComplete { cycle, roster, .. } = &events[2] else {
            panic!("expected cycle_complete, got {:?}", events[2]);
        };
        assert_eq!(*cycle, 1);
        assert!(roster.iter().all(|unit| unit.strength == 96.0));
        assert_eq!(summary.player_one.strength, 96.0);
        assert_eq!(summary.player_two.strength, 96.0);
    }

    #[test]
    fn test_frames_emitted_when_enabled() {
        let mut scenario = Scenario::head_on_duel();
        scenario.rounds.truncate(1);
        let config = RunnerConfig {
            emit_frames: true,
            fps: 10,
        };
        let (events, _) = BattleRunner::with_config(scenario, config)
            .collect_events()
            .unwrap();

        let progress: Vec<f64> = events
            .iter()
            .filter_map(|event| match event {
                Event::Frame { cycle, progress, units } => {
                    assert_eq!(*cycle, 1);
                    assert_eq!(units.len(), 2);
                    Some(*progress)
                }
                _ => None,
            })
            .collect();
        // 700 ms at 100 ms per frame
        assert_eq!(progress.len(), 7);
        assert!(progress.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(progress.last().copied(), Some(1.0));
    }

    #[test]
    fn test_run_stops_when_side_eliminated() {
        let scenario = Scenario {
            name: "Rout".to_string(),
            description: String::new(),
            config: None,
            units: vec![
                UnitPlacement::new(PlayerId::One, 100.0, 300.0, 1000.0),
                UnitPlacement::new(PlayerId::Two, 200.0, 300.0, 10.0),
            ],
            rounds: vec![Round::default(); 4],
        };
        let (events, summary) = BattleRunner::new(scenario).collect_events().unwrap();

        assert_eq!(summary.cycles, 1);
        assert_eq!(summary.player_two.units, 0);
        assert_eq!(summary.player_one.units, 1);
        assert!(matches!(events.last(), Some(Event::Summary { cycles: 1, .. })));
    }

    #[test]
    fn test_orders_for_missing_units_skipped() {
        let mut scenario = Scenario::head_on_duel();
        scenario.rounds = vec![Round {
            orders: vec![OrderEntry::new(99, 0.0, 0.0), OrderEntry::new(1, 100.0, 200.0)],
        }];
        let summary = BattleRunner::new(scenario).collect_events().unwrap().1;
        assert_eq!(summary.cycles, 1);
    }

    #[test]
    fn test_run_to_writer_emits_json_lines() {
        let mut out = Vec::new();
        let summary = BattleRunner::new(Scenario::head_on_duel())
            .run_to_writer(&mut out)
            .unwrap();

        let text = String::from_utf8(out).unwrap();
        let events: Vec<Event> = text
            .lines()
            .map(|line| Event::from_json(line).unwrap())
            .collect();
        assert_eq!(events.len(), 8);
        assert!(matches!(
            events.last(),
            Some(Event::Summary { hash, .. }) if *hash == summary.final_hash
        ));
    }

    #[test]
    fn test_verify_determinism() {
        let report = verify_determinism(&Scenario::head_on_duel(), 3).unwrap();
        assert!(report.is_deterministic());
        assert_eq!(report.final_hashes.len(), 3);
        assert!(report.final_hashes.windows(2).all(|w| w[0] == w[1]));
    }
}
