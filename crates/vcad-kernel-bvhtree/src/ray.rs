//! Ray representation and ray-box slab tests.

use vcad_kernel_math::{Point3, Vec3};

use crate::Aabb3;

/// A ray in 3D space, optionally thickened into a swept sphere.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    /// Start of the ray.
    pub origin: Point3,
    /// Direction of the ray. Not required to be normalized.
    pub direction: Vec3,
    /// Radius of the swept sphere, `0.0` for a thin ray.
    pub radius: f64,
}

impl Ray {
    /// Create a thin ray from origin and direction.
    pub fn new(origin: Point3, direction: Vec3) -> Self {
        Self {
            origin,
            direction,
            radius: 0.0,
        }
    }

    /// Thicken the ray into a sphere of `radius` swept along it.
    pub fn with_radius(mut self, radius: f64) -> Self {
        self.radius = radius.max(0.0);
        self
    }

    /// Copy of this ray with a unit direction.
    ///
    /// Returns `None` for a zero-length or non-finite direction.
    pub fn normalized(&self) -> Option<Self> {
        let len = self.direction.norm();
        if !len.is_finite() || len < 1e-300 {
            return None;
        }
        Some(Self {
            origin: self.origin,
            direction: self.direction / len,
            radius: self.radius,
        })
    }

    /// Point reached after travelling `t` direction lengths.
    #[inline]
    pub fn at(&self, t: f64) -> Point3 {
        self.origin + t * self.direction
    }
}

/// Ray state reused across every box test of one traversal.
#[derive(Debug, Clone, Copy)]
pub(crate) struct RaySlab {
    origin: Point3,
    inv_direction: Vec3,
    /// Per axis, whether the ray travels toward decreasing coordinates.
    negative: [bool; 3],
    radius: f64,
}

impl RaySlab {
    pub(crate) fn new(ray: &Ray) -> Self {
        let inv_direction = ray.direction.map(f64::recip);
        Self {
            origin: ray.origin,
            inv_direction,
            negative: [0, 1, 2].map(|axis| inv_direction[axis] < 0.0),
            radius: ray.radius,
        }
    }

    /// Test ray-AABB intersection using the slab method, with the box grown
    /// by the ray radius.
    ///
    /// Returns `Some((t_min, t_max))` clamped to `t >= 0`, or `None`.
    /// NaN products from axis-parallel rays lying on a slab plane are
    /// ignored by `f64::max`/`f64::min`.
    #[inline]
    pub(crate) fn intersect_aabb(&self, aabb: &Aabb3) -> Option<(f64, f64)> {
        let bounds = if self.radius > 0.0 {
            [aabb.min - Vec3::repeat(self.radius), aabb.max + Vec3::repeat(self.radius)]
        } else {
            [aabb.min, aabb.max]
        };

        let mut t_min = f64::NEG_INFINITY;
        let mut t_max = f64::INFINITY;

        for axis in 0..3 {
            let (near, far) = if self.negative[axis] { (1, 0) } else { (0, 1) };
            let o = self.origin[axis];
            let inv = self.inv_direction[axis];
            t_min = t_min.max((bounds[near][axis] - o) * inv);
            t_max = t_max.min((bounds[far][axis] - o) * inv);
        }

        (t_max >= t_min && t_max >= 0.0).then(|| (t_min.max(0.0), t_max))
    }
}
