//! Patient-space geometry primitives.
//!
//! Slice geometry in DICOM is described by the _Image Orientation (Patient)_
//! row/column direction cosines and the _Image Position (Patient)_ origin.
//! The series assembler projects slice origins onto the slice normal to
//! order slices, so a minimal 3-D vector type is all the linear algebra
//! this library needs.

use std::ops::{Add, Mul, Sub};

/// A vector in patient space, in millimetres.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vector3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vector3 {
    pub const ZERO: Vector3 = Vector3 {
        x: 0.,
        y: 0.,
        z: 0.,
    };

    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Vector3 { x, y, z }
    }

    /// The dot product with another vector.
    pub fn dot(self, other: Vector3) -> f64 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    /// The cross product with another vector.
    pub fn cross(self, other: Vector3) -> Vector3 {
        Vector3 {
            x: self.y * other.z - self.z * other.y,
            y: self.z * other.x - self.x * other.z,
            z: self.x * other.y - self.y * other.x,
        }
    }

    /// The Euclidean norm.
    pub fn length(self) -> f64 {
        self.dot(self).sqrt()
    }

    /// A unit vector in the same direction, or the zero vector if the
    /// length is too small to divide by.
    pub fn normalized(self) -> Vector3 {
        let len = self.length();
        if len < 1e-12 {
            Vector3::ZERO
        } else {
            Vector3 {
                x: self.x / len,
                y: self.y / len,
                z: self.z / len,
            }
        }
    }

    /// Component-wise comparison within the given tolerance.
    pub fn approx_eq(self, other: Vector3, tol: f64) -> bool {
        (self.x - other.x).abs() <= tol
            && (self.y - other.y).abs() <= tol
            && (self.z - other.z).abs() <= tol
    }
}

impl Add for Vector3 {
    type Output = Vector3;
    fn add(self, o: Vector3) -> Vector3 {
        Vector3::new(self.x + o.x, self.y + o.y, self.z + o.z)
    }
}

impl Sub for Vector3 {
    type Output = Vector3;
    fn sub(self, o: Vector3) -> Vector3 {
        Vector3::new(self.x - o.x, self.y - o.y, self.z - o.z)
    }
}

impl Mul<f64> for Vector3 {
    type Output = Vector3;
    fn mul(self, s: f64) -> Vector3 {
        Vector3::new(self.x * s, self.y * s, self.z * s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cross_of_axes_gives_normal() {
        let row = Vector3::new(1., 0., 0.);
        let col = Vector3::new(0., 1., 0.);
        assert_eq!(row.cross(col), Vector3::new(0., 0., 1.));
    }

    #[test]
    fn normalization() {
        let v = Vector3::new(3., 0., 4.);
        let n = v.normalized();
        assert!((n.length() - 1.).abs() < 1e-12);
        assert!(n.approx_eq(Vector3::new(0.6, 0., 0.8), 1e-12));
        assert_eq!(Vector3::ZERO.normalized(), Vector3::ZERO);
    }

    #[test]
    fn projection_orders_positions() {
        let n = Vector3::new(0., 0., 1.);
        let a = Vector3::new(5., 5., 0.8).dot(n);
        let b = Vector3::new(5., 5., 1.6).dot(n);
        assert!(a < b);
    }
}
