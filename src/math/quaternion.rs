//! Rotation quaternion
//!
//! Components are stored as `(w, x, y, z)`. Composition uses the Hamilton
//! product, so `(a * b).rotate(v)` applies `b` first, then `a`.

use crate::error::MathError;
use crate::math::Vect3;
use serde::{Deserialize, Serialize};
use std::ops::Mul;

/// Immutable quaternion value
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quaternion {
    pub w: f64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Default for Quaternion {
    fn default() -> Self {
        Self::identity()
    }
}

impl Quaternion {
    pub const fn new(w: f64, x: f64, y: f64, z: f64) -> Self {
        Self { w, x, y, z }
    }

    pub const fn identity() -> Self {
        Self::new(1.0, 0.0, 0.0, 0.0)
    }

    /// Rotation of `radians` around `axis` (need not be unit length)
    pub fn from_axis_angle(axis: Vect3, radians: f64) -> Result<Self, MathError> {
        let axis = axis.normalize()?;
        let half = radians * 0.5;
        let s = half.sin();
        Ok(Self::new(half.cos(), axis.x * s, axis.y * s, axis.z * s))
    }

    /// Rotation encoded as an axis-angle vector (direction = axis, length = angle)
    ///
    /// This is how the controller reports orientation. A zero vector means no
    /// rotation.
    pub fn from_rotation_vector(v: Vect3) -> Self {
        let angle = v.length();
        if angle <= f64::EPSILON {
            return Self::identity();
        }
        let half = angle * 0.5;
        let s = half.sin() / angle;
        Self::new(half.cos(), v.x * s, v.y * s, v.z * s)
    }

    pub fn conjugate(self) -> Self {
        Self::new(self.w, -self.x, -self.y, -self.z)
    }

    pub fn magnitude(self) -> f64 {
        (self.w * self.w + self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    pub fn normalize(self) -> Result<Self, MathError> {
        let m = self.magnitude();
        if m <= f64::EPSILON {
            return Err(MathError::ZeroMagnitude);
        }
        Ok(Self::new(self.w / m, self.x / m, self.y / m, self.z / m))
    }

    pub fn inverse(self) -> Result<Self, MathError> {
        let m = self.magnitude();
        if m <= f64::EPSILON {
            return Err(MathError::ZeroMagnitude);
        }
        let norm_sq = m * m;
        let c = self.conjugate();
        Ok(Self::new(c.w / norm_sq, c.x / norm_sq, c.y / norm_sq, c.z / norm_sq))
    }

    /// Rotate a vector by this (unit) quaternion
    pub fn rotate(self, v: Vect3) -> Vect3 {
        // v' = v + 2w(u x v) + 2(u x (u x v)), u = vector part
        let u = Vect3::new(self.x, self.y, self.z);
        let t = u.cross(v) * 2.0;
        v + t * self.w + u.cross(t)
    }

    /// Equality up to `eps`, treating `q` and `-q` as the same rotation
    pub fn approx_eq(self, other: Quaternion, eps: f64) -> bool {
        let same = (self.w - other.w).abs() <= eps
            && (self.x - other.x).abs() <= eps
            && (self.y - other.y).abs() <= eps
            && (self.z - other.z).abs() <= eps;
        let flipped = (self.w + other.w).abs() <= eps
            && (self.x + other.x).abs() <= eps
            && (self.y + other.y).abs() <= eps
            && (self.z + other.z).abs() <= eps;
        same || flipped
    }
}

impl Mul for Quaternion {
    type Output = Quaternion;

    fn mul(self, r: Quaternion) -> Quaternion {
        Quaternion::new(
            self.w * r.w - self.x * r.x - self.y * r.y - self.z * r.z,
            self.w * r.x + self.x * r.w + self.y * r.z - self.z * r.y,
            self.w * r.y - self.x * r.z + self.y * r.w + self.z * r.x,
            self.w * r.z + self.x * r.y - self.y * r.x + self.z * r.w,
        )
    }
}
