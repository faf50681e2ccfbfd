//! 3D Vector
//!
//! World-space vector used for positions and velocities.
//! Y is up; gameplay distances are measured on the horizontal X/Z plane
//! so hover height and dungeon layering never block a hit.

use std::fmt;
use std::ops::{Add, AddAssign, Mul, Neg, Sub};
use serde::{Serialize, Deserialize};

/// Lengths below this are treated as zero when normalizing.
const EPSILON: f32 = 1e-6;

/// 3D vector with `f32` components.
#[derive(Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec3 {
    /// X component (east)
    pub x: f32,
    /// Y component (up)
    pub y: f32,
    /// Z component (north)
    pub z: f32,
}

impl Vec3 {
    /// Zero vector
    pub const ZERO: Self = Self { x: 0.0, y: 0.0, z: 0.0 };

    /// Unit vector along +X
    pub const X: Self = Self { x: 1.0, y: 0.0, z: 0.0 };

    /// Unit vector along +Z
    pub const Z: Self = Self { x: 0.0, y: 0.0, z: 1.0 };

    /// Create a new vector.
    #[inline]
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Vector on the ground plane (y = 0).
    #[inline]
    pub const fn flat(x: f32, z: f32) -> Self {
        Self { x, y: 0.0, z }
    }

    /// Unit direction on the ground plane for a yaw angle in radians.
    /// Yaw 0 faces +Z, positive yaw turns toward +X.
    #[inline]
    pub fn from_yaw(yaw: f32) -> Self {
        Self::flat(yaw.sin(), yaw.cos())
    }

    /// Yaw angle (radians) of the horizontal part of this vector.
    #[inline]
    pub fn yaw(self) -> f32 {
        self.x.atan2(self.z)
    }

    /// Scale by a scalar.
    #[inline]
    pub fn scale(self, s: f32) -> Self {
        Self::new(self.x * s, self.y * s, self.z * s)
    }

    /// Dot product (3D).
    #[inline]
    pub fn dot(self, other: Self) -> f32 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    /// Length (3D).
    #[inline]
    pub fn length(self) -> f32 {
        self.dot(self).sqrt()
    }

    /// Drop the vertical component.
    #[inline]
    pub fn horizontal(self) -> Self {
        Self::flat(self.x, self.z)
    }

    /// Squared length on the X/Z plane.
    #[inline]
    pub fn horizontal_length_squared(self) -> f32 {
        self.x * self.x + self.z * self.z
    }

    /// Length on the X/Z plane.
    #[inline]
    pub fn horizontal_length(self) -> f32 {
        self.horizontal_length_squared().sqrt()
    }

    /// Horizontal (X/Z) distance to another point.
    #[inline]
    pub fn distance_2d(self, other: Self) -> f32 {
        (other - self).horizontal_length()
    }

    /// Full 3D distance to another point.
    #[inline]
    pub fn distance_3d(self, other: Self) -> f32 {
        (other - self).length()
    }

    /// Normalize to unit length.
    /// Returns ZERO if length is (near) zero.
    #[inline]
    pub fn normalize(self) -> Self {
        let len = self.length();
        if len <= EPSILON {
            return Self::ZERO;
        }
        self.scale(1.0 / len)
    }

    /// Horizontal unit vector (y = 0), or ZERO for a vertical/zero vector.
    #[inline]
    pub fn normalize_2d(self) -> Self {
        self.horizontal().normalize()
    }

    /// Rotate 90 degrees on the ground plane (to the right of the facing).
    #[inline]
    pub fn perpendicular_right(self) -> Self {
        Self::flat(self.z, -self.x)
    }

    /// Move `self` toward `target` horizontally by at most `max_step`.
    pub fn step_toward(self, target: Self, max_step: f32) -> Self {
        let delta = (target - self).horizontal();
        let dist = delta.horizontal_length();
        if dist <= max_step || dist <= EPSILON {
            return Self::new(target.x, self.y, target.z);
        }
        self + delta.scale(max_step / dist)
    }

    /// True if every component is finite.
    #[inline]
    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

impl Add for Vec3 {
    type Output = Self;
    #[inline]
    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl AddAssign for Vec3 {
    #[inline]
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl Sub for Vec3 {
    type Output = Self;
    #[inline]
    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Mul<f32> for Vec3 {
    type Output = Self;
    #[inline]
    fn mul(self, rhs: f32) -> Self {
        self.scale(rhs)
    }
}

impl Neg for Vec3 {
    type Output = Self;
    #[inline]
    fn neg(self) -> Self {
        Self::new(-self.x, -self.y, -self.z)
    }
}

impl fmt::Debug for Vec3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Vec3({:.3}, {:.3}, {:.3})", self.x, self.y, self.z)
    }
}

impl fmt::Display for Vec3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.2}, {:.2}, {:.2})", self.x, self.y, self.z)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-4
    }

    #[test]
    fn test_horizontal_distance_ignores_height() {
        let a = Vec3::new(0.0, 0.0, 0.0);
        let b = Vec3::new(3.0, 50.0, 4.0);
        assert!(approx(a.distance_2d(b), 5.0));
        assert!(a.distance_3d(b) > 50.0);
    }

    #[test]
    fn test_normalize() {
        let v = Vec3::new(3.0, 0.0, 4.0).normalize();
        assert!(approx(v.length(), 1.0));
        assert_eq!(Vec3::ZERO.normalize(), Vec3::ZERO);
        assert_eq!(Vec3::new(0.0, 7.0, 0.0).normalize_2d(), Vec3::ZERO);
    }

    #[test]
    fn test_yaw_round_trip() {
        let yaw = 0.7_f32;
        let dir = Vec3::from_yaw(yaw);
        assert!(approx(dir.yaw(), yaw));
        assert!(approx(Vec3::Z.yaw(), 0.0));
    }

    #[test]
    fn test_perpendicular_right() {
        // Facing +Z, right hand points to +X
        let right = Vec3::Z.perpendicular_right();
        assert!(approx(right.x, 1.0));
        assert!(approx(right.z, 0.0));
    }

    #[test]
    fn test_step_toward() {
        let start = Vec3::new(0.0, 1.0, 0.0);
        let target = Vec3::new(10.0, 0.0, 0.0);

        let stepped = start.step_toward(target, 2.0);
        assert!(approx(stepped.x, 2.0));
        assert!(approx(stepped.y, 1.0));

        // Overshoot snaps to the target on the plane
        let arrived = start.step_toward(target, 20.0);
        assert!(approx(arrived.x, 10.0));
    }

    #[test]
    fn test_operators() {
        let a = Vec3::new(1.0, 2.0, 3.0);
        let b = Vec3::new(4.0, 5.0, 6.0);
        assert_eq!(a + b, Vec3::new(5.0, 7.0, 9.0));
        assert_eq!(b - a, Vec3::new(3.0, 3.0, 3.0));
        assert_eq!(a * 2.0, Vec3::new(2.0, 4.0, 6.0));
        assert_eq!(-a, Vec3::new(-1.0, -2.0, -3.0));
    }
}
