//! Three-component vector

use crate::error::MathError;
use serde::{Deserialize, Serialize};
use std::ops::{Add, Mul, Neg, Sub};

/// Immutable 3D vector
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vect3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vect3 {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub const fn zero() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }

    pub fn dot(self, other: Vect3) -> f64 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    pub fn cross(self, other: Vect3) -> Vect3 {
        Vect3::new(
            self.y * other.z - self.z * other.y,
            self.z * other.x - self.x * other.z,
            self.x * other.y - self.y * other.x,
        )
    }

    pub fn length(self) -> f64 {
        self.dot(self).sqrt()
    }

    /// Unit vector in the same direction
    pub fn normalize(self) -> Result<Vect3, MathError> {
        let len = self.length();
        if len <= f64::EPSILON {
            return Err(MathError::ZeroMagnitude);
        }
        Ok(self * (1.0 / len))
    }

    /// Component-wise comparison within `eps`
    pub fn approx_eq(self, other: Vect3, eps: f64) -> bool {
        (self.x - other.x).abs() <= eps
            && (self.y - other.y).abs() <= eps
            && (self.z - other.z).abs() <= eps
    }
}

impl Add for Vect3 {
    type Output = Vect3;

    fn add(self, rhs: Vect3) -> Vect3 {
        Vect3::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Vect3 {
    type Output = Vect3;

    fn sub(self, rhs: Vect3) -> Vect3 {
        Vect3::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Neg for Vect3 {
    type Output = Vect3;

    fn neg(self) -> Vect3 {
        Vect3::new(-self.x, -self.y, -self.z)
    }
}

impl Mul<f64> for Vect3 {
    type Output = Vect3;

    fn mul(self, factor: f64) -> Vect3 {
        Vect3::new(self.x * factor, self.y * factor, self.z * factor)
    }
}
