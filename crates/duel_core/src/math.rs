//! 2D vector math for the battle engine.
//!
//! The attrition law rounds losses up with `ceil`, so its boundaries are
//! defined over real arithmetic. All engine math is plain `f64`, evaluated
//! in a fixed order so that identical inputs produce bit-identical results.

use serde::{Deserialize, Serialize};

/// Tolerance below which a vector is treated as zero-length.
pub const EPSILON: f64 = 1e-9;

/// 2D vector / point in field coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec2 {
    /// X coordinate.
    pub x: f64,
    /// Y coordinate.
    pub y: f64,
}

impl Vec2 {
    /// Create a new vector.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Zero vector.
    pub const ZERO: Self = Self { x: 0.0, y: 0.0 };

    /// Unit vector along +x.
    pub const X: Self = Self { x: 1.0, y: 0.0 };

    /// Unit vector along -x.
    pub const NEG_X: Self = Self { x: -1.0, y: 0.0 };

    /// Euclidean length.
    #[must_use]
    pub fn length(self) -> f64 {
        self.x.hypot(self.y)
    }

    /// Calculate squared distance (avoids sqrt for comparisons).
    #[must_use]
    pub fn distance_squared(self, other: Self) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }

    /// Euclidean distance between two points.
    #[must_use]
    pub fn distance(self, other: Self) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    /// Dot product of two vectors.
    #[must_use]
    pub fn dot(self, other: Self) -> f64 {
        self.x * other.x + self.y * other.y
    }

    /// Z component of the 3D cross product.
    #[must_use]
    pub fn cross(self, other: Self) -> f64 {
        self.x * other.y - self.y * other.x
    }

    /// Linearly interpolate between two vectors.
    #[must_use]
    pub fn lerp(self, other: Self, t: f64) -> Self {
        Self {
            x: self.x + (other.x - self.x) * t,
            y: self.y + (other.y - self.y) * t,
        }
    }

    /// Normalize to unit length. The zero vector stays zero.
    #[must_use]
    pub fn normalize(self) -> Self {
        let len = self.length();
        if len == 0.0 {
            return Self::ZERO;
        }
        Self::new(self.x / len, self.y / len)
    }

    /// Whether the vector is shorter than [`EPSILON`].
    #[must_use]
    pub fn is_near_zero(self) -> bool {
        self.length() < EPSILON
    }

    /// Whether both components are finite.
    #[must_use]
    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    /// Angle between two directions in radians, in `[0, PI]`.
    ///
    /// Both operands are normalized first; a zero operand yields a right angle.
    #[must_use]
    pub fn angle_between(self, other: Self) -> f64 {
        let d = self.normalize().dot(other.normalize()).clamp(-1.0, 1.0);
        d.acos()
    }

    /// Angle between two directions in degrees, in `[0, 180]`.
    #[must_use]
    pub fn angle_between_deg(self, other: Self) -> f64 {
        self.angle_between(other).to_degrees()
    }
}

impl std::ops::Add for Vec2 {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self {
            x: self.x + rhs.x,
            y: self.y + rhs.y,
        }
    }
}

impl std::ops::AddAssign for Vec2 {
    fn add_assign(&mut self, rhs: Self) {
        self.x += rhs.x;
        self.y += rhs.y;
    }
}

impl std::ops::Sub for Vec2 {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self {
            x: self.x - rhs.x,
            y: self.y - rhs.y,
        }
    }
}

impl std::ops::Mul<f64> for Vec2 {
    type Output = Self;

    fn mul(self, rhs: f64) -> Self::Output {
        Self {
            x: self.x * rhs,
            y: self.y * rhs,
        }
    }
}

impl std::ops::Neg for Vec2 {
    type Output = Self;

    fn neg(self) -> Self::Output {
        Self {
            x: -self.x,
            y: -self.y,
        }
    }
}

/// Distance from `point` to the segment `a`-`b`.
#[must_use]
pub fn point_segment_distance(point: Vec2, a: Vec2, b: Vec2) -> f64 {
    let along = b - a;
    let length_squared = along.dot(along);
    if length_squared <= 0.0 {
        return point.distance(a);
    }
    let t = ((point - a).dot(along) / length_squared).clamp(0.0, 1.0);
    point.distance(a + along * t)
}

/// Smallest distance between any point of segment `a0`-`a1` and any point
/// of segment `b0`-`b1`.
#[must_use]
pub fn segment_distance(a0: Vec2, a1: Vec2, b0: Vec2, b1: Vec2) -> f64 {
    let side = |from: Vec2, to: Vec2, point: Vec2| (to - from).cross(point - from);
    let (d1, d2) = (side(b0, b1, a0), side(b0, b1, a1));
    let (d3, d4) = (side(a0, a1, b0), side(a0, a1, b1));
    if d1 * d2 < 0.0 && d3 * d4 < 0.0 {
        return 0.0;
    }
    point_segment_distance(a0, b0, b1)
        .min(point_segment_distance(a1, b0, b1))
        .min(point_segment_distance(b0, a0, a1))
        .min(point_segment_distance(b1, a0, a1))
}

/// Axis-aligned rectangle of the playing field.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FieldBounds {
    /// Field width.
    pub width: f64,
    /// Field height.
    pub height: f64,
}

impl FieldBounds {
    /// Create field bounds anchored at the origin.
    #[must_use]
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// Clamp a point into the field, keeping `margin` from every edge.
    #[must_use]
    pub fn clamp(&self, point: Vec2, margin: f64) -> Vec2 {
        Vec2::new(
            point.x.clamp(margin, (self.width - margin).max(margin)),
            point.y.clamp(margin, (self.height - margin).max(margin)),
        )
    }
}

impl Default for FieldBounds {
    fn default() -> Self {
        Self::new(1000.0, 600.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vec2_distance_squared() {
        let a = Vec2::new(3.0, 0.0);
        let b = Vec2::new(0.0, 4.0);
        // 3² + 4² = 25
        assert_eq!(a.distance_squared(b), 25.0);
        assert_eq!(a.distance(b), 5.0);
    }

    #[test]
    fn test_vec2_dot() {
        let a = Vec2::new(2.0, 3.0);
        let b = Vec2::new(4.0, -1.0);
        assert_eq!(a.dot(b), 5.0);
    }

    #[test]
    fn test_vec2_lerp() {
        let a = Vec2::ZERO;
        let b = Vec2::new(10.0, 20.0);
        assert_eq!(a.lerp(b, 0.5), Vec2::new(5.0, 10.0));
    }

    #[test]
    fn test_vec2_normalize() {
        let norm = Vec2::new(3.0, 4.0).normalize();
        assert!((norm.length() - 1.0).abs() < 1e-12);
        assert!((norm.x * 4.0 - norm.y * 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_normalize_zero_stays_zero() {
        assert_eq!(Vec2::ZERO.normalize(), Vec2::ZERO);
        assert!(Vec2::ZERO.is_near_zero());
    }

    #[test]
    fn test_angle_between() {
        assert_eq!(Vec2::X.angle_between_deg(Vec2::X), 0.0);
        assert!((Vec2::X.angle_between_deg(Vec2::new(0.0, 1.0)) - 90.0).abs() < 1e-9);
        assert!((Vec2::X.angle_between_deg(Vec2::NEG_X) - 180.0).abs() < 1e-9);
        // Unnormalized operands measure the same angle
        assert!((Vec2::new(5.0, 5.0).angle_between_deg(Vec2::new(0.0, 2.0)) - 45.0).abs() < 1e-9);
    }

    #[test]
    fn test_point_segment_distance() {
        let (a, b) = (Vec2::new(0.0, 0.0), Vec2::new(10.0, 0.0));
        assert_eq!(point_segment_distance(Vec2::new(5.0, 3.0), a, b), 3.0);
        // Beyond the end the nearest point is the endpoint
        assert_eq!(point_segment_distance(Vec2::new(13.0, 4.0), a, b), 5.0);
        assert_eq!(point_segment_distance(Vec2::new(3.0, 4.0), a, a), 5.0);
    }

    #[test]
    fn test_segment_distance() {
        let crossing = segment_distance(
            Vec2::new(0.0, 0.0),
            Vec2::new(10.0, 10.0),
            Vec2::new(0.0, 10.0),
            Vec2::new(10.0, 0.0),
        );
        assert_eq!(crossing, 0.0);

        let apart = segment_distance(
            Vec2::new(0.0, 0.0),
            Vec2::new(10.0, 0.0),
            Vec2::new(5.0, 2.0),
            Vec2::new(5.0, 8.0),
        );
        assert_eq!(apart, 2.0);

        let collinear = segment_distance(
            Vec2::new(0.0, 0.0),
            Vec2::new(4.0, 0.0),
            Vec2::new(7.0, 0.0),
            Vec2::new(9.0, 0.0),
        );
        assert_eq!(collinear, 3.0);
    }

    #[test]
    fn test_field_clamp() {
        let field = FieldBounds::default();
        let clamped = field.clamp(Vec2::new(-50.0, 900.0), 16.0);
        assert_eq!(clamped, Vec2::new(16.0, 584.0));
        let inside = field.clamp(Vec2::new(500.0, 300.0), 16.0);
        assert_eq!(inside, Vec2::new(500.0, 300.0));
    }
}
