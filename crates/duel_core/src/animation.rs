//! Collision-aware animator.
//!
//! The animator moves every unit from its snapshot position toward its
//! plan target along a straight line, driven by the eased progress
//! `t * (2 - t)`. No two units may come closer than
//! `(r_a + r_b) * (1 - merge_threshold) + collide_buffer` while approaching
//! each other. A unit that would break that separation is held back on its
//! own start-to-target line, and moves on again as soon as the way is clear.
//!
//! Blocking is resolved once, when the animator is built, by sweeping the
//! eased progress range in fixed sub-steps. Units move in id order within a
//! sub-step; a unit only advances as far as it can without closing in on a
//! unit that already moved, a unit still waiting to move, or the remaining
//! path of a lower-id unit it is not already standing in front of.
//! Held-back units record their own progress per sub-step and catch up once
//! released. [`Animator::frame`] reads those timelines and is a pure
//! function of elapsed time.

use std::time::Duration;

use serde::Serialize;

use crate::components::{PlayerId, UnitId};
use crate::config::BattleConfig;
use crate::math::{point_segment_distance, segment_distance, Vec2};
use crate::retreat::MovePlan;
use crate::snapshot::BattleSnapshot;

/// Number of progress sub-steps swept when resolving collisions.
const SWEEP_STEPS: u32 = 240;

/// Sub-step lengths a released unit may cover per sub-step while catching up.
const CATCH_UP_RATE: f64 = 4.0;

/// Bisection rounds spent finding how far a held-back unit may still move.
const HOLD_SEARCH_ROUNDS: u32 = 12;

/// Displacement from start beyond which a unit turns to its direction of travel.
const FACING_UPDATE_THRESHOLD: f64 = 0.5;

/// Separation changes smaller than this are not treated as approaching.
const APPROACH_TOLERANCE: f64 = 1e-9;

/// Ease-out quadratic: fast start, slow finish.
#[must_use]
pub fn ease_out_quad(t: f64) -> f64 {
    let t = t.clamp(0.0, 1.0);
    t * (2.0 - t)
}

/// Smallest centre distance two units of the given strengths may approach to.
#[must_use]
pub fn minimum_separation(config: &BattleConfig, strength_a: f64, strength_b: f64) -> f64 {
    (config.unit_radius(strength_a) + config.unit_radius(strength_b))
        * (1.0 - config.merge_threshold)
        + config.collide_buffer
}

/// One unit as drawn in a frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RenderUnit {
    /// Unit identifier.
    pub id: UnitId,
    /// Owning player.
    pub owner: PlayerId,
    /// Interpolated position.
    pub position: Vec2,
    /// Facing, following the direction of travel once the unit has moved.
    pub facing: Vec2,
    /// Strength shown during the animation (pre-cycle value).
    pub strength: f64,
}

/// Everything a renderer needs for one animation frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrameSnapshot {
    /// Linear animation progress in `[0, 1]`.
    pub progress: f64,
    /// Units in id order.
    pub units: Vec<RenderUnit>,
}

impl FrameSnapshot {
    /// Look up a unit by id.
    #[must_use]
    pub fn unit(&self, id: UnitId) -> Option<&RenderUnit> {
        self.units.iter().find(|unit| unit.id == id)
    }

    /// Whether this is the last frame of the animation.
    #[must_use]
    pub fn is_final(&self) -> bool {
        self.progress >= 1.0
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Track {
    id: UnitId,
    owner: PlayerId,
    start: Vec2,
    target: Vec2,
    facing: Vec2,
    strength: f64,
    /// Own progress at every sweep sub-step, kept only for held-back units.
    timeline: Option<Vec<f64>>,
}

impl Track {
    fn is_moving(&self) -> bool {
        self.target != self.start
    }

    fn point_at(&self, progress: f64) -> Vec2 {
        if progress >= 1.0 {
            self.target
        } else {
            self.start.lerp(self.target, progress)
        }
    }

    fn progress_at(&self, eased: f64) -> f64 {
        let Some(timeline) = &self.timeline else {
            return eased;
        };
        let last = timeline.len() - 1;
        let scaled = eased.clamp(0.0, 1.0) * f64::from(SWEEP_STEPS);
        let index = scaled.floor() as usize;
        if index >= last {
            return timeline[last];
        }
        let fraction = scaled - index as f64;
        timeline[index] + (timeline[index + 1] - timeline[index]) * fraction
    }

    fn position_at(&self, eased: f64) -> Vec2 {
        self.point_at(self.progress_at(eased))
    }

    fn facing_at(&self, position: Vec2) -> Vec2 {
        let displacement = position - self.start;
        if displacement.length() > FACING_UPDATE_THRESHOLD {
            displacement.normalize()
        } else {
            self.facing
        }
    }
}

/// Positions around one sweep sub-step.
///
/// Units below the one being placed already hold their `next` position;
/// the rest still sit at `previous`.
struct SubStep<'a> {
    tracks: &'a [Track],
    separations: &'a [f64],
    previous: &'a [Vec2],
    next: &'a [Vec2],
}

impl SubStep<'_> {
    /// Whether unit `index` may move to `progress` during this sub-step.
    fn allows(&self, index: usize, progress: f64) -> bool {
        let count = self.tracks.len();
        let from = self.previous[index];
        let to = self.tracks[index].point_at(progress);

        (0..count).filter(|&other| other != index).all(|other| {
            let separation = self.separations[index * count + other];
            let moved = other < index;
            let other_from = self.previous[other];
            let other_to = if moved { self.next[other] } else { other_from };

            let before = from.distance(other_from);
            let closest = closest_approach(from, to, other_from, other_to);
            if closest < separation - APPROACH_TOLERANCE && closest < before - APPROACH_TOLERANCE
            {
                return false;
            }

            // Keep off the path a lower-id unit has yet to cover
            let other_target = self.tracks[other].target;
            if moved && other_to != other_target && !in_lane(from, other_to, other_target, separation)
            {
                let before = point_segment_distance(from, other_to, other_target);
                let closest = segment_distance(from, to, other_to, other_target);
                if closest < separation && closest < before - APPROACH_TOLERANCE {
                    return false;
                }
            }
            true
        })
    }
}

/// Frozen start and target positions of one battle cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct Animator {
    tracks: Vec<Track>,
    duration: Duration,
}

impl Animator {
    /// Build the animation for a cycle. `plans` are indexed like the snapshot.
    ///
    /// Targets are clamped into the field, keeping `field_margin` from the
    /// edges. Units with nowhere to go keep their exact start position.
    #[must_use]
    pub fn new(snapshot: &BattleSnapshot, plans: &[MovePlan], config: &BattleConfig) -> Self {
        debug_assert_eq!(snapshot.len(), plans.len());

        let tracks = snapshot
            .units()
            .iter()
            .zip(plans)
            .map(|(unit, plan)| {
                debug_assert_eq!(unit.id, plan.unit);
                let target = if plan.distance > 0.0 {
                    config
                        .field
                        .clamp(unit.position + plan.displacement(), config.field_margin)
                } else {
                    unit.position
                };
                Track {
                    id: unit.id,
                    owner: unit.owner,
                    start: unit.position,
                    target,
                    facing: unit.facing,
                    strength: unit.strength,
                    timeline: None,
                }
            })
            .collect();

        let mut animator = Self {
            tracks,
            duration: config.animation_duration(),
        };
        animator.resolve_blocking(config);

        tracing::debug!(
            units = animator.tracks.len(),
            blocked = animator.blocked_count(),
            "Animation prepared"
        );
        animator
    }

    /// Sweep the eased progress range, holding back units that would close
    /// in on another unit past the minimum separation.
    fn resolve_blocking(&mut self, config: &BattleConfig) {
        let count = self.tracks.len();
        if count < 2 {
            return;
        }

        let separations: Vec<f64> = (0..count * count)
            .map(|cell| {
                let (i, j) = (cell / count, cell % count);
                minimum_separation(config, self.tracks[i].strength, self.tracks[j].strength)
            })
            .collect();

        let step_size = 1.0 / f64::from(SWEEP_STEPS);
        let mut progress = vec![0.0; count];
        let mut held = vec![false; count];
        let mut timelines: Vec<Vec<f64>> = (0..count)
            .map(|_| {
                let mut timeline = Vec::with_capacity(SWEEP_STEPS as usize + 1);
                timeline.push(0.0);
                timeline
            })
            .collect();
        let mut previous: Vec<Vec2> = self.tracks.iter().map(|track| track.start).collect();

        for step in 1..=SWEEP_STEPS {
            let eased = f64::from(step) / f64::from(SWEEP_STEPS);
            let remaining = f64::from(SWEEP_STEPS - step + 1);
            let mut next = previous.clone();

            for index in 0..count {
                let track = &self.tracks[index];
                if track.is_moving() {
                    let current = progress[index];
                    let desired = if step == SWEEP_STEPS {
                        1.0
                    } else {
                        let catch_up =
                            (CATCH_UP_RATE * step_size).max((1.0 - current) / remaining);
                        eased.min(current + catch_up)
                    };

                    let sub_step = SubStep {
                        tracks: &self.tracks,
                        separations: &separations,
                        previous: &previous,
                        next: &next,
                    };
                    let reached = if sub_step.allows(index, desired) {
                        desired
                    } else {
                        held[index] = true;
                        let (mut low, mut high) = (current, desired);
                        for _ in 0..HOLD_SEARCH_ROUNDS {
                            let middle = (low + high) * 0.5;
                            if sub_step.allows(index, middle) {
                                low = middle;
                            } else {
                                high = middle;
                            }
                        }
                        low
                    };

                    progress[index] = reached;
                    next[index] = track.point_at(reached);
                }
                timelines[index].push(progress[index]);
            }

            previous = next;
        }

        for ((track, timeline), was_held) in self.tracks.iter_mut().zip(timelines).zip(held) {
            if was_held {
                track.timeline = Some(timeline);
            }
        }
    }

    /// Total animation length.
    #[must_use]
    pub const fn duration(&self) -> Duration {
        self.duration
    }

    /// Linear progress in `[0, 1]` after `elapsed`.
    #[must_use]
    pub fn progress(&self, elapsed: Duration) -> f64 {
        if self.duration.is_zero() {
            return 1.0;
        }
        (elapsed.as_secs_f64() / self.duration.as_secs_f64()).clamp(0.0, 1.0)
    }

    /// Whether `elapsed` reaches the end of the animation.
    #[must_use]
    pub fn is_complete(&self, elapsed: Duration) -> bool {
        elapsed >= self.duration
    }

    /// Number of units held back by another unit at some point.
    #[must_use]
    pub fn blocked_count(&self) -> usize {
        self.tracks
            .iter()
            .filter(|track| track.timeline.is_some())
            .count()
    }

    /// Whether the unit was held back by another unit at some point.
    #[must_use]
    pub fn is_blocked(&self, id: UnitId) -> bool {
        self.tracks
            .iter()
            .any(|track| track.id == id && track.timeline.is_some())
    }

    /// Clamped target of a unit.
    #[must_use]
    pub fn target(&self, id: UnitId) -> Option<Vec2> {
        self.tracks
            .iter()
            .find(|track| track.id == id)
            .map(|track| track.target)
    }

    /// Frame at `elapsed` time since the animation started.
    #[must_use]
    pub fn frame(&self, elapsed: Duration) -> FrameSnapshot {
        let progress = self.progress(elapsed);
        let eased = ease_out_quad(progress);
        let units = self
            .tracks
            .iter()
            .map(|track| {
                let position = track.position_at(eased);
                RenderUnit {
                    id: track.id,
                    owner: track.owner,
                    position,
                    facing: track.facing_at(position),
                    strength: track.strength,
                }
            })
            .collect();
        FrameSnapshot { progress, units }
    }

    /// Final frame, holding the positions that get committed.
    #[must_use]
    pub fn final_frame(&self) -> FrameSnapshot {
        self.frame(self.duration)
    }
}

/// Whether `point` lies ahead of a unit moving from `from` to `to`, within
/// half of `separation` of its line of travel.
fn in_lane(point: Vec2, from: Vec2, to: Vec2, separation: f64) -> bool {
    let heading = (to - from).normalize();
    let offset = point - from;
    offset.dot(heading) > 0.0 && heading.cross(offset).abs() < separation * 0.5
}

/// Smallest distance between two points moving linearly from `a0`/`b0` to
/// `a1`/`b1` over the same interval.
fn closest_approach(a0: Vec2, a1: Vec2, b0: Vec2, b1: Vec2) -> f64 {
    let start = a0 - b0;
    let drift = (a1 - b1) - start;
    let drift_squared = drift.dot(drift);
    if drift_squared <= 0.0 {
        return start.length();
    }
    let s = (-start.dot(drift) / drift_squared).clamp(0.0, 1.0);
    (start + drift * s).length()
}
