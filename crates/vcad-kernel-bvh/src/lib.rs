#![warn(missing_docs)]

//! Spatial queries over mesh and point cloud geometry for the vcad kernel.
//!
//! Builds bounding volume hierarchies over mesh vertices, edges and corner
//! triangles (or point cloud points) and answers nearest-point and ray
//! queries against them, including sphere-swept rays.
//!
//! # Architecture
//!
//! - [`Mesh`] / [`PointCloud`] - Geometry containers; a mesh caches one tree
//!   per [`TreeKind`]
//! - [`BvhTreeFromMesh`] - Query handle over a borrowed or owned tree
//! - [`BvhTreeFromPointCloud`] - Nearest-point handle over a point cloud
//! - [`PrimitiveSource`] - Per-primitive leaf tests
//! - [`intersect`] - Ray-triangle, swept sphere and closest point math
//! - [`BitMask`] / [`IndexMask`] - Element selection
//!
//! # Example
//!
//! ```
//! use vcad_kernel_bvh::{Mesh, Ray, TreeKind};
//! use vcad_kernel_math::{Point3, Vec3};
//!
//! let positions = vec![
//!     Point3::new(0.0, 0.0, 0.0),
//!     Point3::new(1.0, 0.0, 0.0),
//!     Point3::new(0.0, 1.0, 0.0),
//! ];
//! let mesh = Mesh::from_polygons(positions, &[vec![0, 1, 2]], &[]).unwrap();
//! let tris = mesh.bvh(TreeKind::CornerTris).unwrap();
//!
//! let ray = Ray::new(Point3::new(0.2, 0.2, 1.0), Vec3::new(0.0, 0.0, -1.0));
//! let hit = tris.raycast(&ray, 10.0).unwrap();
//! assert!((hit.distance - 1.0).abs() < 1e-12);
//! ```

mod cache;
mod error;
mod extract;
mod handle;
pub mod intersect;
mod kind;
mod mask;
mod mesh;
mod pointcloud;
mod source;

pub use cache::BvhCache;
pub use error::{BvhError, Result};
pub use extract::{
    active_count, extract_corner_tri_boxes, extract_edge_boxes, extract_vert_boxes, resolve_corner_tri,
    ExtractedBoxes,
};
pub use handle::{BvhTreeFromMesh, NearestHit, RayHit, TreeRef};
pub use kind::{PrimitiveKind, TreeKind};
pub use mask::{BitMask, IndexMask};
pub use mesh::Mesh;
pub use pointcloud::{BvhTreeFromPointCloud, PointCloud};
pub use source::PrimitiveSource;

pub use vcad_kernel_bvhtree::{BvhParams, BvhTree, Ray, SplitAxis};

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use vcad_kernel_math::{Point3, Vec3};

    fn single_tri() -> Mesh {
        let positions = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        ];
        Mesh::from_polygons(positions, &[vec![0, 1, 2]], &[]).unwrap()
    }

    /// An n x n grid of quads on z = 0 with a slight bump.
    fn grid(n: usize) -> Mesh {
        let mut positions = Vec::new();
        for j in 0..=n {
            for i in 0..=n {
                let (x, y) = (i as f64, j as f64);
                positions.push(Point3::new(x, y, 0.05 * (x * 0.7).sin() * (y * 0.3).cos()));
            }
        }
        let row = n + 1;
        let faces: Vec<Vec<usize>> = (0..n)
            .flat_map(|j| (0..n).map(move |i| vec![j * row + i, j * row + i + 1, (j + 1) * row + i + 1, (j + 1) * row + i]))
            .collect();
        Mesh::from_polygons(positions, &faces, &[]).unwrap()
    }

    #[test]
    fn test_ray_hits_triangle() {
        let mesh = single_tri();
        let tris = mesh.bvh(TreeKind::CornerTris).unwrap();
        let ray = Ray::new(Point3::new(0.2, 0.2, 1.0), Vec3::new(0.0, 0.0, -1.0));
        let hit = tris.raycast(&ray, 10.0).unwrap();
        assert_eq!(hit.index, 0);
        assert_relative_eq!(hit.distance, 1.0, max_relative = 1e-5);
        assert_relative_eq!(hit.position, Point3::new(0.2, 0.2, 0.0), epsilon = 1e-9);
        assert_relative_eq!(hit.normal.unwrap().z, 1.0);
    }

    #[test]
    fn test_ray_misses_triangle() {
        let mesh = single_tri();
        let tris = mesh.bvh(TreeKind::CornerTris).unwrap();
        let ray = Ray::new(Point3::new(2.0, 2.0, 1.0), Vec3::new(0.0, 0.0, -1.0));
        assert!(tris.raycast(&ray, 10.0).is_none());
    }

    #[test]
    fn test_edge_nearest() {
        let positions = vec![Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 0.0, 0.0)];
        let edges = vec![[0, 1]];
        let handle = BvhTreeFromMesh::from_edges(&positions, &edges, None, None, &BvhParams::default()).unwrap();
        let hit = handle.nearest(&Point3::new(0.5, 1.0, 0.0)).unwrap();
        assert_relative_eq!(hit.position, Point3::new(0.5, 0.0, 0.0), epsilon = 1e-12);
        assert_relative_eq!(hit.distance, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_single_vertex_nearest() {
        let positions = vec![Point3::new(1.0, 2.0, 3.0)];
        let handle = BvhTreeFromMesh::from_verts(&positions, None, None, &BvhParams::default()).unwrap();
        let hit = handle.nearest(&Point3::new(1.0, 2.0, 7.0)).unwrap();
        assert_eq!(hit.index, 0);
        assert_relative_eq!(hit.distance, 4.0);
    }

    #[test]
    fn test_edge_nearest_not_farther_than_endpoints() {
        let mesh = grid(6);
        let edges = mesh.bvh(TreeKind::Edges).unwrap();
        for q in [
            Point3::new(2.3, 4.1, 0.7),
            Point3::new(-1.0, 3.5, 0.0),
            Point3::new(5.5, 5.5, -2.0),
        ] {
            let hit = edges.nearest(&q).unwrap();
            let [a, b] = mesh.edges()[hit.index];
            let endpoint = (mesh.positions()[a] - q).norm().min((mesh.positions()[b] - q).norm());
            assert!(hit.distance <= endpoint + 1e-12);
            let brute = mesh
                .edges()
                .iter()
                .map(|&[a, b]| {
                    let p = intersect::closest_point_on_segment(&q, &mesh.positions()[a], &mesh.positions()[b]);
                    (p - q).norm()
                })
                .fold(f64::INFINITY, f64::min);
            assert_relative_eq!(hit.distance, brute, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_grid_raycast_matches_brute_force() {
        let mesh = grid(8);
        let tris = mesh.bvh(TreeKind::CornerTris).unwrap();
        for (x, y) in [(0.3, 0.4), (4.5, 2.2), (7.9, 7.1), (3.0, 3.0)] {
            let ray = Ray::new(Point3::new(x, y, 5.0), Vec3::new(0.01, -0.02, -1.0));
            let hit = tris.raycast(&ray, 100.0).unwrap();

            let dir = ray.direction.normalize();
            let brute = mesh
                .corner_tris()
                .iter()
                .filter_map(|tri| {
                    let [a, b, c] = resolve_corner_tri(mesh.positions(), mesh.corner_verts(), tri).unwrap();
                    intersect::ray_tri_intersection(&ray.origin, &dir, 100.0, &a, &b, &c)
                })
                .fold(f64::INFINITY, f64::min);
            assert_relative_eq!(hit.distance, brute, max_relative = 1e-9);
        }
    }

    #[test]
    fn test_sphere_ray_zero_radius_matches_thin_ray() {
        let mesh = grid(5);
        let tris = mesh.bvh(TreeKind::CornerTris).unwrap();
        let thin = Ray::new(Point3::new(2.4, 1.7, 3.0), Vec3::new(0.1, 0.05, -1.0));
        let swept = thin.with_radius(0.0);
        let a = tris.raycast(&thin, 50.0).unwrap();
        let b = tris.raycast(&swept, 50.0).unwrap();
        assert_eq!(a.index, b.index);
        assert_relative_eq!(a.distance, b.distance, max_relative = 1e-9);
    }

    #[test]
    fn test_sphere_ray_hits_earlier() {
        let mesh = grid(5);
        let tris = mesh.bvh(TreeKind::CornerTris).unwrap();
        let thin = Ray::new(Point3::new(2.4, 1.7, 3.0), Vec3::new(0.0, 0.0, -1.0));
        let a = tris.raycast(&thin, 50.0).unwrap();
        let b = tris.raycast(&thin.with_radius(0.2), 50.0).unwrap();
        assert!(b.distance < a.distance);
        assert!(b.distance > a.distance - 0.25);
    }

    #[test]
    fn test_all_true_mask_equals_no_mask() {
        let mesh = grid(4);
        let all = BitMask::new(mesh.corner_tris().len(), true);
        let masked = BvhTreeFromMesh::from_corner_tris(
            mesh.positions(),
            mesh.corner_verts(),
            mesh.corner_tris(),
            Some(&all),
            None,
            &BvhParams::triangles(),
        )
        .unwrap();
        let unmasked = mesh.bvh(TreeKind::CornerTris).unwrap();
        for q in [Point3::new(1.2, 3.3, 1.0), Point3::new(-2.0, 0.5, 0.0)] {
            assert_eq!(masked.nearest(&q), unmasked.nearest(&q));
        }
        let mut a = masked.tree().unwrap().leaf_indices();
        let mut b = unmasked.tree().unwrap().leaf_indices();
        a.sort_unstable();
        b.sort_unstable();
        assert_eq!(a, b);
    }

    #[test]
    fn test_masked_build_reports_masked_indices() {
        let mesh = grid(4);
        let faces = IndexMask::from_indices([0, 5, 15]);
        let handle = BvhTreeFromMesh::from_mesh_tris(&mesh, &faces).unwrap();
        for x in 0..8 {
            for y in 0..8 {
                let q = Point3::new(x as f64 * 0.5, y as f64 * 0.5, 1.0);
                let hit = handle.nearest(&q).unwrap();
                assert!(faces.contains(mesh.tri_faces()[hit.index]));
            }
        }
    }

    #[test]
    fn test_free_and_rebuild() {
        let mesh = grid(3);
        let verts = IndexMask::from_indices([1, 2, 5, 9, 14]);
        let q = Point3::new(1.4, 2.2, 0.3);

        let mut handle = BvhTreeFromMesh::from_mesh_verts(&mesh, &verts).unwrap();
        let before = handle.nearest(&q);
        handle.free();
        assert!(handle.nearest(&q).is_none());

        let rebuilt = BvhTreeFromMesh::from_mesh_verts(&mesh, &verts).unwrap();
        assert_eq!(rebuilt.nearest(&q), before);
    }

    #[test]
    fn test_loose_vert_used_only_by_hidden_edge() {
        let positions = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(5.0, 0.0, 0.0),
            Point3::new(6.0, 0.0, 0.0),
        ];
        let mut mesh = Mesh::from_polygons(positions, &[vec![0, 1, 2]], &[[3, 4]]).unwrap();
        let mut hide_edge = vec![false; mesh.edges_num()];
        hide_edge[3] = true;
        mesh.set_hide_edge(hide_edge).unwrap();

        let q = Point3::new(5.2, 0.0, 0.0);
        assert!(mesh.bvh(TreeKind::LooseVerts).unwrap().nearest(&q).is_none());
        let hit = mesh.bvh(TreeKind::LooseVertsNoHidden).unwrap().nearest(&q).unwrap();
        assert_eq!(hit.index, 3);

        // The hidden edge itself drops out of the no-hidden loose edges.
        assert!(mesh.bvh(TreeKind::LooseEdges).unwrap().nearest(&q).is_some());
        assert!(mesh.bvh(TreeKind::LooseEdgesNoHidden).unwrap().is_empty());
    }

    #[test]
    fn test_hidden_faces_skipped() {
        let mut mesh = grid(2);
        mesh.set_hide_poly(vec![true, false, false, false]).unwrap();
        let visible = mesh.bvh(TreeKind::CornerTrisNoHidden).unwrap();
        let ray = Ray::new(Point3::new(0.5, 0.5, 1.0), Vec3::new(0.0, 0.0, -1.0));
        assert!(visible.raycast(&ray, 10.0).is_none());
        assert!(mesh.bvh(TreeKind::CornerTris).unwrap().raycast(&ray, 10.0).is_some());
    }

    #[test]
    fn test_edge_raycast_with_radius() {
        let mesh = grid(2);
        let edges = mesh.bvh(TreeKind::Edges).unwrap();
        let ray = Ray::new(Point3::new(1.0, -3.0, 0.02), Vec3::new(0.0, 1.0, 0.0)).with_radius(0.1);
        let hit = edges.raycast(&ray, 10.0).unwrap();
        // First crossing is the bottom row of edges at y = 0.
        assert!(hit.distance <= 3.0 + 1e-9);
        assert!(hit.distance > 2.5);
    }
}
