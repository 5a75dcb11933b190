//! Battle configuration.
//!
//! Every tunable of the battle cycle lives in [`BattleConfig`]. The struct
//! deserializes with `#[serde(default)]`, so scenario files only need to
//! name the values they override.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{DuelError, Result};
use crate::math::FieldBounds;

/// Default maximum movement and engagement range.
pub const DEFAULT_MAX_MOVE_RANGE: f64 = 140.0;

/// Default half-angle of the attack cone, in degrees.
pub const DEFAULT_ATTACK_CONE_HALF_ANGLE_DEG: f64 = 90.0;

/// Default Lanchester attrition coefficient.
pub const DEFAULT_ATTRITION_COEFFICIENT: f64 = 0.02;

/// Default survival floor as a fraction of initial strength.
pub const DEFAULT_MIN_SURVIVAL_FRACTION: f64 = 1.0 / 20.0;

/// Default merge closeness threshold.
pub const DEFAULT_MERGE_THRESHOLD: f64 = 0.5;

/// Configuration for one battle simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BattleConfig {
    /// Maximum engagement range, also the maximum order/retreat distance.
    pub max_move_range: f64,
    /// Half-angle of the attack cone around a unit's facing, in degrees.
    pub attack_cone_half_angle_deg: f64,
    /// Attrition coefficient `K` of the loss formulas.
    pub attrition_coefficient: f64,
    /// Units below `initial_strength * min_survival_fraction` are pruned.
    pub min_survival_fraction: f64,
    /// Whether overlapping friendly units merge after a cycle.
    pub merge_enabled: bool,
    /// Merge closeness threshold in `[0, 1]`; also relaxes collision spacing.
    pub merge_threshold: f64,
    /// Extra spacing added to the collision separation.
    pub collide_buffer: f64,
    /// Duration of the movement animation in milliseconds.
    pub animation_duration_ms: u64,
    /// Playing field size.
    pub field: FieldBounds,
    /// Distance kept from the field edge when clamping move targets.
    pub field_margin: f64,
    /// Base radius of a unit before the strength-dependent part.
    pub size_base: f64,
    /// Shortest order distance.
    pub min_order_distance: f64,
    /// Order displacements shorter than this clear the order instead.
    pub order_clear_threshold: f64,
    /// Minimum spacing between own units at placement.
    pub placement_spacing: f64,
    /// Distance kept from the edges of a player's half at placement.
    pub placement_margin: f64,
}

impl Default for BattleConfig {
    fn default() -> Self {
        Self {
            max_move_range: DEFAULT_MAX_MOVE_RANGE,
            attack_cone_half_angle_deg: DEFAULT_ATTACK_CONE_HALF_ANGLE_DEG,
            attrition_coefficient: DEFAULT_ATTRITION_COEFFICIENT,
            min_survival_fraction: DEFAULT_MIN_SURVIVAL_FRACTION,
            merge_enabled: true,
            merge_threshold: DEFAULT_MERGE_THRESHOLD,
            collide_buffer: 4.0,
            animation_duration_ms: 700,
            field: FieldBounds::default(),
            field_margin: 16.0,
            size_base: 12.0,
            min_order_distance: 10.0,
            order_clear_threshold: 8.0,
            placement_spacing: 28.0,
            placement_margin: 20.0,
        }
    }
}

impl BattleConfig {
    /// Builder method to toggle merging.
    #[must_use]
    pub fn with_merge(mut self, enabled: bool) -> Self {
        self.merge_enabled = enabled;
        self
    }

    /// Builder method to set the merge threshold.
    #[must_use]
    pub fn with_merge_threshold(mut self, threshold: f64) -> Self {
        self.merge_threshold = threshold;
        self
    }

    /// Animation length as a [`Duration`].
    #[must_use]
    pub const fn animation_duration(&self) -> Duration {
        Duration::from_millis(self.animation_duration_ms)
    }

    /// Radius of a unit with the given strength, used for collision and merging.
    #[must_use]
    pub fn unit_radius(&self, strength: f64) -> f64 {
        self.size_base + strength.max(0.0).sqrt()
    }

    /// Check every value is inside its allowed range.
    pub fn validate(&self) -> Result<()> {
        fn check(ok: bool, message: impl FnOnce() -> String) -> Result<()> {
            if ok {
                Ok(())
            } else {
                Err(DuelError::InvalidConfig(message()))
            }
        }

        check(
            self.max_move_range.is_finite() && self.max_move_range > 0.0,
            || format!("max_move_range must be positive, got {}", self.max_move_range),
        )?;
        check(
            self.attack_cone_half_angle_deg > 0.0 && self.attack_cone_half_angle_deg <= 180.0,
            || {
                format!(
                    "attack_cone_half_angle_deg must be in (0, 180], got {}",
                    self.attack_cone_half_angle_deg
                )
            },
        )?;
        check(
            self.attrition_coefficient.is_finite() && self.attrition_coefficient >= 0.0,
            || {
                format!(
                    "attrition_coefficient must be non-negative, got {}",
                    self.attrition_coefficient
                )
            },
        )?;
        check(
            (0.0..1.0).contains(&self.min_survival_fraction),
            || {
                format!(
                    "min_survival_fraction must be in [0, 1), got {}",
                    self.min_survival_fraction
                )
            },
        )?;
        check((0.0..=1.0).contains(&self.merge_threshold), || {
            format!("merge_threshold must be in [0, 1], got {}", self.merge_threshold)
        })?;
        check(
            self.collide_buffer.is_finite() && self.collide_buffer >= 0.0,
            || format!("collide_buffer must be non-negative, got {}", self.collide_buffer),
        )?;
        check(
            self.field.width > 2.0 * self.field_margin
                && self.field.height > 2.0 * self.field_margin,
            || {
                format!(
                    "field {}x{} too small for margin {}",
                    self.field.width, self.field.height, self.field_margin
                )
            },
        )?;
        check(
            self.size_base.is_finite() && self.size_base >= 0.0,
            || format!("size_base must be non-negative, got {}", self.size_base),
        )?;
        check(
            self.min_order_distance > 0.0 && self.min_order_distance <= self.max_move_range,
            || {
                format!(
                    "min_order_distance must be in (0, max_move_range], got {}",
                    self.min_order_distance
                )
            },
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = BattleConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_move_range, 140.0);
        assert_eq!(config.attrition_coefficient, 0.02);
        assert_eq!(config.min_survival_fraction, 0.05);
        assert_eq!(config.animation_duration(), Duration::from_millis(700));
    }

    #[test]
    fn test_unit_radius() {
        let config = BattleConfig::default();
        assert_eq!(config.unit_radius(100.0), 22.0);
        assert_eq!(config.unit_radius(0.0), 12.0);
    }

    #[test]
    fn test_rejects_out_of_range_values() {
        let bad_threshold = BattleConfig::default().with_merge_threshold(1.5);
        assert!(matches!(
            bad_threshold.validate(),
            Err(DuelError::InvalidConfig(_))
        ));

        let bad_cone = BattleConfig {
            attack_cone_half_angle_deg: 0.0,
            ..BattleConfig::default()
        };
        assert!(bad_cone.validate().is_err());

        let bad_fraction = BattleConfig {
            min_survival_fraction: 1.0,
            ..BattleConfig::default()
        };
        assert!(bad_fraction.validate().is_err());
    }
}
