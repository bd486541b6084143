//! Axis-aligned bounding boxes.

use vcad_kernel_math::{Point3, Vec3};

/// Axis-aligned bounding box in 3D.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb3 {
    /// Minimum corner.
    pub min: Point3,
    /// Maximum corner.
    pub max: Point3,
}

impl Aabb3 {
    /// Box spanning `min` to `max`. Corners are taken as given.
    pub fn new(min: Point3, max: Point3) -> Self {
        Self { min, max }
    }

    /// Inverted box that any included point replaces.
    pub fn empty() -> Self {
        Self {
            min: Point3::from(Vec3::repeat(f64::INFINITY)),
            max: Point3::from(Vec3::repeat(f64::NEG_INFINITY)),
        }
    }

    /// Degenerate box containing a single point.
    pub fn from_point(p: &Point3) -> Self {
        Self { min: *p, max: *p }
    }

    /// Smallest box containing all `points`. Empty for an empty slice.
    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a Point3>) -> Self {
        points.into_iter().fold(Self::empty(), |mut aabb, p| {
            aabb.include_point(p);
            aabb
        })
    }

    /// True if no point has been included yet.
    pub fn is_empty(&self) -> bool {
        (0..3).any(|axis| self.min[axis] > self.max[axis])
    }

    /// True if both corners have finite coordinates.
    pub fn is_finite(&self) -> bool {
        self.min.iter().chain(self.max.iter()).all(|c| c.is_finite())
    }

    /// Grow to cover `p`.
    pub fn include_point(&mut self, p: &Point3) {
        self.min = self.min.inf(p);
        self.max = self.max.sup(p);
    }

    /// Grow to cover `other`. Empty boxes change nothing.
    pub fn include_aabb(&mut self, other: &Aabb3) {
        if other.is_empty() {
            return;
        }
        self.min = self.min.inf(&other.min);
        self.max = self.max.sup(&other.max);
    }

    /// Push every face outward by `tol`.
    pub fn expand(&mut self, tol: f64) {
        let pad = Vec3::repeat(tol);
        self.min -= pad;
        self.max += pad;
    }

    /// Copy of this box expanded by `tol`.
    pub fn expanded(&self, tol: f64) -> Self {
        let mut aabb = *self;
        aabb.expand(tol);
        aabb
    }

    /// Midpoint of the two corners.
    pub fn center(&self) -> Point3 {
        Point3::from((self.min.coords + self.max.coords) * 0.5)
    }

    /// Index (0, 1, 2) of the axis with the largest extent.
    pub fn longest_axis(&self) -> usize {
        let d = self.max - self.min;
        if d.x >= d.y && d.x >= d.z {
            0
        } else if d.y >= d.z {
            1
        } else {
            2
        }
    }

    /// Squared distance from `p` to the closest point of the box (0 inside).
    pub fn distance_squared(&self, p: &Point3) -> f64 {
        let clamped = p.sup(&self.min).inf(&self.max);
        (p - clamped).norm_squared()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_empty_then_include() {
        let mut aabb = Aabb3::empty();
        assert!(aabb.is_empty());
        aabb.include_point(&Point3::new(1.0, 2.0, 3.0));
        assert!(!aabb.is_empty());
        assert_eq!(aabb.min, aabb.max);
    }

    #[test]
    fn test_degenerate_box_is_legal() {
        let aabb = Aabb3::from_points(&[Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 0.0, 0.0)]);
        assert!(!aabb.is_empty());
        assert_relative_eq!(aabb.distance_squared(&Point3::new(0.5, 0.0, 0.0)), 0.0);
        assert_eq!(aabb.longest_axis(), 0);
    }

    #[test]
    fn test_distance_squared() {
        let aabb = Aabb3::new(Point3::origin(), Point3::new(1.0, 1.0, 1.0));
        assert_relative_eq!(aabb.distance_squared(&Point3::new(0.5, 0.5, 0.5)), 0.0);
        assert_relative_eq!(aabb.distance_squared(&Point3::new(3.0, 0.5, 0.5)), 4.0);
        assert_relative_eq!(aabb.distance_squared(&Point3::new(2.0, 2.0, 0.5)), 2.0);
    }

    #[test]
    fn test_expanded_reaches_neighbor() {
        let a = Aabb3::from_point(&Point3::origin());
        let neighbor = Point3::new(0.1, 0.0, 0.0);
        assert!(a.distance_squared(&neighbor) > 0.0);
        assert_relative_eq!(a.expanded(0.1).distance_squared(&neighbor), 0.0);
        assert_eq!(a.expanded(0.05).center(), Point3::origin());
    }

    #[test]
    fn test_non_finite() {
        let aabb = Aabb3::from_point(&Point3::new(f64::NAN, 0.0, 0.0));
        assert!(!aabb.is_finite());
        assert!(Aabb3::new(Point3::origin(), Point3::new(1.0, 1.0, 1.0)).is_finite());
    }
}
