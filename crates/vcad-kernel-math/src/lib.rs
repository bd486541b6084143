#![warn(missing_docs)]

//! Math types for the vcad spatial query kernel.
//!
//! Thin wrappers around nalgebra providing the point, vector and direction
//! types shared by the BVH tree and the mesh query crates, plus the
//! tolerance constants used by the intersection tests.

use nalgebra::{Unit, Vector3};
use serde::{Deserialize, Serialize};

/// A point in 3D space.
pub type Point3 = nalgebra::Point3<f64>;

/// A vector in 3D space.
pub type Vec3 = Vector3<f64>;

/// A unit (normalized) direction vector in 3D space.
pub type Dir3 = Unit<Vector3<f64>>;

/// One of the three coordinate axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    /// The X axis.
    X,
    /// The Y axis.
    Y,
    /// The Z axis.
    Z,
}

impl Axis {
    /// All axes in index order.
    pub const ALL: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];

    /// Component index of this axis (`0`, `1` or `2`).
    #[inline]
    pub fn index(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }
}

/// Thresholds used by the intersection and closest-point routines.
#[derive(Debug, Clone, Copy)]
pub struct Tolerance {
    /// Linear distance below which two points are coincident.
    pub linear: f64,
    /// Threshold for determinants and dot products treated as parallel.
    pub parallel: f64,
}

impl Tolerance {
    /// Query defaults.
    pub const DEFAULT: Self = Self {
        linear: 1e-9,
        parallel: 1e-12,
    };

    /// True when `a` and `b` are closer than [`Tolerance::linear`].
    pub fn coincident(&self, a: &Point3, b: &Point3) -> bool {
        nalgebra::distance_squared(a, b) < self.linear * self.linear
    }
}

impl Default for Tolerance {
    fn default() -> Self {
        Tolerance::DEFAULT
    }
}
