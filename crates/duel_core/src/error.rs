//! Error types for the battle engine.

use thiserror::Error;

use crate::components::UnitId;
use crate::simulation::Phase;

/// Result type alias using [`DuelError`].
pub type Result<T> = std::result::Result<T, DuelError>;

/// Top-level error type for all battle engine errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DuelError {
    /// Strength must be finite and non-negative.
    #[error("Invalid strength: {0}")]
    InvalidStrength(f64),

    /// A unit vector was required but the input had no direction.
    #[error("Invalid direction: ({x}, {y})")]
    InvalidDirection {
        /// X component.
        x: f64,
        /// Y component.
        y: f64,
    },

    /// Order distance outside the allowed range.
    #[error("Order distance {distance} outside [{min}, {max}]")]
    InvalidOrderDistance {
        /// Requested distance.
        distance: f64,
        /// Minimum allowed distance.
        min: f64,
        /// Maximum allowed distance.
        max: f64,
    },

    /// Invalid unit identifier.
    #[error("Unit not found: {0}")]
    UnitNotFound(UnitId),

    /// Configuration value out of range.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Operation not allowed in the current phase.
    #[error("Operation '{operation}' not allowed in phase {phase:?}")]
    InvalidPhase {
        /// Operation that was attempted.
        operation: &'static str,
        /// Phase the simulation was in.
        phase: Phase,
    },

    /// Placement rules rejected a new unit.
    #[error("Placement rejected: {0}")]
    PlacementRejected(String),

    /// Unit is too weak to split.
    #[error("Unit {id} cannot split: half strength {half} below minimum {minimum}")]
    SplitRejected {
        /// Unit that was asked to split.
        id: UnitId,
        /// Strength each half would have.
        half: f64,
        /// Minimum strength a half must keep.
        minimum: f64,
    },

    /// Roster state broke an engine invariant.
    #[error("Invariant violated: {0}")]
    InvariantViolation(String),
}
