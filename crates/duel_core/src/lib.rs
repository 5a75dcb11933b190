//! # Duel Core
//!
//! Deterministic battle-cycle engine for a two-player Lanchester duel.
//!
//! This crate contains **only** the engine:
//! - No rendering
//! - No IO
//! - No system randomness
//!
//! One battle cycle reads a frozen snapshot of the roster, selects
//! targets by range and facing, resolves attrition simultaneously, plans
//! each unit's move (including retreats), animates the moves without
//! letting units pass through each other, and finally merges overlapping
//! friendly units and prunes the weak.
//!
//! ## Crate Structure
//!
//! - [`simulation`] - Phase state machine driving a cycle
//! - [`targeting`] - Engagement selection
//! - [`combat`] - Simultaneous attrition
//! - [`retreat`] - Move and retreat planning
//! - [`animation`] - Collision-aware interpolation
//! - [`consolidation`] - Merge and prune
//! - [`roster`] - Unit storage, placement, orders and splitting
//! - [`math`] - 2D vector utilities

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod animation;
pub mod combat;
pub mod components;
pub mod config;
pub mod consolidation;
pub mod error;
pub mod math;
pub mod retreat;
pub mod roster;
pub mod simulation;
pub mod snapshot;
pub mod targeting;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::animation::{FrameSnapshot, RenderUnit};
    pub use crate::combat::{CombatBreakdown, CombatOutcome};
    pub use crate::components::*;
    pub use crate::config::BattleConfig;
    pub use crate::consolidation::{ConsolidationReport, MergeRecord};
    pub use crate::error::{DuelError, Result};
    pub use crate::math::{FieldBounds, Vec2};
    pub use crate::retreat::{MoveKind, MovePlan};
    pub use crate::roster::Roster;
    pub use crate::simulation::{BattleSimulation, CycleResult, Phase, TickEvents};
    pub use crate::snapshot::BattleSnapshot;
    pub use crate::targeting::{Engagement, EngagementGraph};
}
