//! Leaf tests run by the tree traversal.
//!
//! A [`PrimitiveSource`] borrows the geometry a tree was built from and knows
//! how to compute the exact closest point and ray hit for one primitive. The
//! tree decides which leaves to visit; the source only refines the
//! accumulator it is handed.

use vcad_kernel_bvhtree::{BvhNearest, BvhRayHit, Ray};
use vcad_kernel_math::{Dir3, Point3};

use crate::intersect::{
    closest_point_on_segment, closest_point_on_tri, ray_point_closest, ray_segment_closest,
    ray_tri_intersection, sphereray_tri_intersection, tri_normal,
};
use crate::kind::PrimitiveKind;

/// Geometry views behind a tree, one variant per primitive kind.
///
/// Indices reaching the leaf tests were validated when the tree was built.
#[derive(Debug, Clone, Copy)]
pub enum PrimitiveSource<'a> {
    /// Points.
    Verts {
        /// Vertex positions.
        positions: &'a [Point3],
    },
    /// Line segments between two vertices.
    Edges {
        /// Vertex positions.
        positions: &'a [Point3],
        /// Vertex pairs.
        edges: &'a [[usize; 2]],
    },
    /// Triangles of three corners, each corner pointing at a vertex.
    CornerTris {
        /// Vertex positions.
        positions: &'a [Point3],
        /// Vertex of each face corner.
        corner_verts: &'a [usize],
        /// Corner triples.
        corner_tris: &'a [[usize; 3]],
    },
}

impl<'a> PrimitiveSource<'a> {
    /// Primitive kind of this source.
    pub fn kind(&self) -> PrimitiveKind {
        match self {
            PrimitiveSource::Verts { .. } => PrimitiveKind::Vert,
            PrimitiveSource::Edges { .. } => PrimitiveKind::Edge,
            PrimitiveSource::CornerTris { .. } => PrimitiveKind::Tri,
        }
    }

    /// Vertex positions shared by every kind.
    pub fn positions(&self) -> &'a [Point3] {
        match *self {
            PrimitiveSource::Verts { positions }
            | PrimitiveSource::Edges { positions, .. }
            | PrimitiveSource::CornerTris { positions, .. } => positions,
        }
    }

    /// Number of primitives in the source, active or not.
    pub fn len(&self) -> usize {
        match self {
            PrimitiveSource::Verts { positions } => positions.len(),
            PrimitiveSource::Edges { edges, .. } => edges.len(),
            PrimitiveSource::CornerTris { corner_tris, .. } => corner_tris.len(),
        }
    }

    /// True if the source has no primitives.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn edge(positions: &[Point3], edges: &[[usize; 2]], index: usize) -> (Point3, Point3) {
        let [a, b] = edges[index];
        (positions[a], positions[b])
    }

    fn tri(positions: &[Point3], corner_verts: &[usize], corner_tris: &[[usize; 3]], index: usize) -> [Point3; 3] {
        corner_tris[index].map(|corner| positions[corner_verts[corner]])
    }

    /// Refine `nearest` with primitive `index`.
    pub fn nearest_leaf(&self, index: usize, co: &Point3, nearest: &mut BvhNearest) {
        match *self {
            PrimitiveSource::Verts { positions } => {
                let p = positions[index];
                nearest.update(index, p, None, (p - co).norm_squared());
            }
            PrimitiveSource::Edges { positions, edges } => {
                let (a, b) = Self::edge(positions, edges, index);
                let p = closest_point_on_segment(co, &a, &b);
                let dist_sq = (p - co).norm_squared();
                if dist_sq <= nearest.dist_sq {
                    let no = Dir3::try_new(a - b, f64::EPSILON);
                    nearest.update(index, p, no, dist_sq);
                }
            }
            PrimitiveSource::CornerTris {
                positions,
                corner_verts,
                corner_tris,
            } => {
                let [a, b, c] = Self::tri(positions, corner_verts, corner_tris, index);
                let p = closest_point_on_tri(co, &a, &b, &c);
                let dist_sq = (p - co).norm_squared();
                if dist_sq <= nearest.dist_sq {
                    nearest.update(index, p, tri_normal(&a, &b, &c), dist_sq);
                }
            }
        }
    }

    /// Refine `hit` with primitive `index`. `ray` has a unit direction.
    pub fn raycast_leaf(&self, index: usize, ray: &Ray, hit: &mut BvhRayHit) {
        match *self {
            PrimitiveSource::Verts { positions } => {
                if let Some((dist, co)) =
                    ray_point_closest(&ray.origin, &ray.direction, ray.radius, &positions[index])
                {
                    hit.update(index, dist, co, None);
                }
            }
            PrimitiveSource::Edges { positions, edges } => {
                let (a, b) = Self::edge(positions, edges, index);
                if let Some((dist, co)) = ray_segment_closest(&ray.origin, &ray.direction, ray.radius, &a, &b) {
                    hit.update(index, dist, co, Dir3::try_new(a - b, f64::EPSILON));
                }
            }
            PrimitiveSource::CornerTris {
                positions,
                corner_verts,
                corner_tris,
            } => {
                let [a, b, c] = Self::tri(positions, corner_verts, corner_tris, index);
                let dist = if ray.radius == 0.0 {
                    ray_tri_intersection(&ray.origin, &ray.direction, hit.dist, &a, &b, &c)
                } else {
                    sphereray_tri_intersection(&ray.origin, &ray.direction, ray.radius, hit.dist, &a, &b, &c)
                };
                if let Some(dist) = dist {
                    hit.update(index, dist, ray.at(dist), tri_normal(&a, &b, &c));
                }
            }
        }
    }
}
