//! Polygon mesh container with cached trees.
//!
//! Faces are stored as offsets into a corner array; each corner names a
//! vertex and the edge to the next corner. Faces are fan triangulated into
//! corner triangles, so face `f` with `n` corners owns the `n - 2`
//! triangles starting at `face_offsets[f] - 2 * f`.

use std::collections::HashMap;
use std::ops::Range;

use vcad_kernel_math::Point3;

use crate::cache::BvhCache;
use crate::error::{BvhError, Result};
use crate::handle::{build_source_tree, BvhTreeFromMesh};
use crate::kind::{PrimitiveKind, TreeKind};
use crate::mask::{BitMask, IndexMask};
use crate::source::PrimitiveSource;

fn edge_key(a: usize, b: usize) -> (usize, usize) {
    if a < b {
        (a, b)
    } else {
        (b, a)
    }
}

/// A polygon mesh: positions, edges, faces and optional hide flags.
#[derive(Debug)]
pub struct Mesh {
    positions: Vec<Point3>,
    edges: Vec<[usize; 2]>,
    face_offsets: Vec<usize>,
    corner_verts: Vec<usize>,
    corner_edges: Vec<usize>,
    corner_tris: Vec<[usize; 3]>,
    tri_faces: Vec<usize>,
    hide_vert: Option<Vec<bool>>,
    hide_edge: Option<Vec<bool>>,
    hide_poly: Option<Vec<bool>>,
    bvh_cache: BvhCache,
}

impl Mesh {
    /// Create a mesh from raw topology arrays.
    ///
    /// `face_offsets` has one entry per face plus a final entry equal to the
    /// corner count (an empty slice means no faces). Every face needs at
    /// least three corners and every pair of consecutive corners must be
    /// joined by an edge in `edges`.
    pub fn new(
        positions: Vec<Point3>,
        edges: Vec<[usize; 2]>,
        face_offsets: Vec<usize>,
        corner_verts: Vec<usize>,
    ) -> Result<Self> {
        let verts_num = positions.len();
        for &[a, b] in &edges {
            for v in [a, b] {
                if v >= verts_num {
                    return Err(BvhError::IndexOutOfBounds {
                        what: "edge vertex",
                        index: v,
                        len: verts_num,
                    });
                }
            }
        }
        for &v in &corner_verts {
            if v >= verts_num {
                return Err(BvhError::IndexOutOfBounds {
                    what: "corner vertex",
                    index: v,
                    len: verts_num,
                });
            }
        }

        let face_offsets = if face_offsets.is_empty() { vec![0] } else { face_offsets };
        if face_offsets[0] != 0 || face_offsets[face_offsets.len() - 1] != corner_verts.len() {
            return Err(BvhError::InvalidMesh(format!(
                "face offsets must run from 0 to {} corners",
                corner_verts.len()
            )));
        }
        if let Some(f) = face_offsets.windows(2).position(|w| w[1] < w[0] + 3) {
            return Err(BvhError::InvalidMesh(format!("face {f} has fewer than 3 corners")));
        }

        let mut edge_lookup: HashMap<(usize, usize), usize> = HashMap::with_capacity(edges.len());
        for (i, &[a, b]) in edges.iter().enumerate() {
            if let Some(first) = edge_lookup.insert(edge_key(a, b), i) {
                return Err(BvhError::InvalidMesh(format!("edges {first} and {i} both join {a}-{b}")));
            }
        }

        let mut corner_edges = Vec::with_capacity(corner_verts.len());
        let mut corner_tris = Vec::with_capacity(corner_verts.len().saturating_sub(2 * (face_offsets.len() - 1)));
        let mut tri_faces = Vec::with_capacity(corner_tris.capacity());
        for (f, w) in face_offsets.windows(2).enumerate() {
            let (start, end) = (w[0], w[1]);
            for c in start..end {
                let next = if c + 1 == end { start } else { c + 1 };
                let (a, b) = (corner_verts[c], corner_verts[next]);
                let edge = edge_lookup.get(&edge_key(a, b)).ok_or_else(|| {
                    BvhError::InvalidMesh(format!("face {f} uses edge {a}-{b} missing from the edge list"))
                })?;
                corner_edges.push(*edge);
            }
            for c in start + 1..end - 1 {
                corner_tris.push([start, c, c + 1]);
                tri_faces.push(f);
            }
        }

        log::debug!(
            "mesh: {} verts, {} edges, {} faces, {} tris",
            verts_num,
            edges.len(),
            face_offsets.len() - 1,
            corner_tris.len()
        );

        Ok(Self {
            positions,
            edges,
            face_offsets,
            corner_verts,
            corner_edges,
            corner_tris,
            tri_faces,
            hide_vert: None,
            hide_edge: None,
            hide_poly: None,
            bvh_cache: BvhCache::default(),
        })
    }

    /// Create a mesh from vertex loops, deriving the edge list.
    ///
    /// Edges are numbered in order of first use by the faces, followed by
    /// any `loose_edges` not already present.
    pub fn from_polygons(positions: Vec<Point3>, faces: &[Vec<usize>], loose_edges: &[[usize; 2]]) -> Result<Self> {
        let mut edges = Vec::new();
        let mut seen = HashMap::new();
        let mut add_edge = |a: usize, b: usize| {
            seen.entry(edge_key(a, b)).or_insert_with(|| {
                edges.push([a, b]);
                edges.len() - 1
            });
        };

        let mut face_offsets = vec![0];
        let mut corner_verts = Vec::new();
        for face in faces {
            for (i, &v) in face.iter().enumerate() {
                add_edge(v, face[(i + 1) % face.len()]);
            }
            corner_verts.extend_from_slice(face);
            face_offsets.push(corner_verts.len());
        }
        for &[a, b] in loose_edges {
            add_edge(a, b);
        }

        Self::new(positions, edges, face_offsets, corner_verts)
    }

    /// Vertex positions.
    pub fn positions(&self) -> &[Point3] {
        &self.positions
    }

    /// Edge vertex pairs.
    pub fn edges(&self) -> &[[usize; 2]] {
        &self.edges
    }

    /// Face offsets into the corner arrays, one more than the face count.
    pub fn face_offsets(&self) -> &[usize] {
        &self.face_offsets
    }

    /// Vertex of each corner.
    pub fn corner_verts(&self) -> &[usize] {
        &self.corner_verts
    }

    /// Edge from each corner to the next corner of its face.
    pub fn corner_edges(&self) -> &[usize] {
        &self.corner_edges
    }

    /// Corner triples of the face triangulation.
    pub fn corner_tris(&self) -> &[[usize; 3]] {
        &self.corner_tris
    }

    /// Face of each corner triangle.
    pub fn tri_faces(&self) -> &[usize] {
        &self.tri_faces
    }

    /// Number of vertices.
    pub fn verts_num(&self) -> usize {
        self.positions.len()
    }

    /// Number of edges.
    pub fn edges_num(&self) -> usize {
        self.edges.len()
    }

    /// Number of faces.
    pub fn faces_num(&self) -> usize {
        self.face_offsets.len() - 1
    }

    /// Corners of face `face`.
    pub fn face(&self, face: usize) -> Range<usize> {
        self.face_offsets[face]..self.face_offsets[face + 1]
    }

    /// Corner triangles of face `face`.
    pub fn face_tris(&self, face: usize) -> Range<usize> {
        let corners = self.face(face);
        let start = corners.start - 2 * face;
        start..start + corners.len() - 2
    }

    /// Tree cache of this mesh.
    pub fn bvh_cache(&self) -> &BvhCache {
        &self.bvh_cache
    }

    /// Replace the vertex positions, keeping the topology.
    pub fn set_positions(&mut self, positions: Vec<Point3>) -> Result<()> {
        check_len("position", self.positions.len(), positions.len())?;
        self.positions = positions;
        self.bvh_cache.clear();
        Ok(())
    }

    /// Set per-vertex hide flags.
    pub fn set_hide_vert(&mut self, hidden: Vec<bool>) -> Result<()> {
        check_len("hide_vert", self.verts_num(), hidden.len())?;
        self.hide_vert = Some(hidden);
        self.bvh_cache.clear();
        Ok(())
    }

    /// Set per-edge hide flags.
    pub fn set_hide_edge(&mut self, hidden: Vec<bool>) -> Result<()> {
        check_len("hide_edge", self.edges_num(), hidden.len())?;
        self.hide_edge = Some(hidden);
        self.bvh_cache.clear();
        Ok(())
    }

    /// Set per-face hide flags.
    pub fn set_hide_poly(&mut self, hidden: Vec<bool>) -> Result<()> {
        check_len("hide_poly", self.faces_num(), hidden.len())?;
        self.hide_poly = Some(hidden);
        self.bvh_cache.clear();
        Ok(())
    }

    fn flag(flags: &Option<Vec<bool>>, index: usize) -> bool {
        flags.as_ref().is_some_and(|flags| flags[index])
    }

    /// True if vertex `vert` is hidden.
    pub fn is_vert_hidden(&self, vert: usize) -> bool {
        Self::flag(&self.hide_vert, vert)
    }

    /// True if edge `edge` is hidden.
    pub fn is_edge_hidden(&self, edge: usize) -> bool {
        Self::flag(&self.hide_edge, edge)
    }

    /// True if face `face` is hidden.
    pub fn is_face_hidden(&self, face: usize) -> bool {
        Self::flag(&self.hide_poly, face)
    }

    /// Vertices not used by any edge.
    ///
    /// With `skip_hidden`, edges that are hidden do not count as users and
    /// hidden vertices are never loose.
    pub fn loose_verts(&self, skip_hidden: bool) -> BitMask {
        let mut loose = BitMask::new(self.verts_num(), true);
        for (e, &[a, b]) in self.edges.iter().enumerate() {
            if skip_hidden && self.is_edge_hidden(e) {
                continue;
            }
            loose.set(a, false);
            loose.set(b, false);
        }
        if skip_hidden {
            for v in 0..self.verts_num() {
                if self.is_vert_hidden(v) {
                    loose.set(v, false);
                }
            }
        }
        loose
    }

    /// Edges not used by any face.
    ///
    /// With `skip_hidden`, faces that are hidden do not count as users and
    /// hidden edges are never loose.
    pub fn loose_edges(&self, skip_hidden: bool) -> BitMask {
        let mut loose = BitMask::new(self.edges_num(), true);
        for f in 0..self.faces_num() {
            if skip_hidden && self.is_face_hidden(f) {
                continue;
            }
            for c in self.face(f) {
                loose.set(self.corner_edges[c], false);
            }
        }
        if skip_hidden {
            for e in 0..self.edges_num() {
                if self.is_edge_hidden(e) {
                    loose.set(e, false);
                }
            }
        }
        loose
    }

    /// Corner triangles whose face is not hidden.
    pub fn visible_tris(&self) -> BitMask {
        self.tri_faces.iter().map(|&f| !self.is_face_hidden(f)).collect()
    }

    fn kind_mask(&self, kind: TreeKind) -> Option<BitMask> {
        let skip_hidden = kind.skips_hidden();
        match kind {
            TreeKind::Verts | TreeKind::Edges | TreeKind::CornerTris => None,
            TreeKind::CornerTrisNoHidden => Some(self.visible_tris()),
            TreeKind::LooseVerts | TreeKind::LooseVertsNoHidden => Some(self.loose_verts(skip_hidden)),
            TreeKind::LooseEdges | TreeKind::LooseEdgesNoHidden => Some(self.loose_edges(skip_hidden)),
        }
    }

    /// Geometry view for trees over `primitive`.
    pub fn source(&self, primitive: PrimitiveKind) -> PrimitiveSource<'_> {
        match primitive {
            PrimitiveKind::Vert => PrimitiveSource::Verts {
                positions: &self.positions,
            },
            PrimitiveKind::Edge => PrimitiveSource::Edges {
                positions: &self.positions,
                edges: &self.edges,
            },
            PrimitiveKind::Tri => PrimitiveSource::CornerTris {
                positions: &self.positions,
                corner_verts: &self.corner_verts,
                corner_tris: &self.corner_tris,
            },
        }
    }

    /// Handle borrowing the cached tree of `kind`, built on first use.
    pub fn bvh(&self, kind: TreeKind) -> Result<BvhTreeFromMesh<'_>> {
        let source = self.source(kind.primitive());
        let tree = self.bvh_cache.get_or_build(kind, || {
            let mask = self.kind_mask(kind);
            build_source_tree(&source, mask.as_ref(), None, &kind.params())
        })?;
        Ok(BvhTreeFromMesh::borrowed(tree, source))
    }
}

fn check_len(name: &'static str, expected: usize, actual: usize) -> Result<()> {
    if expected != actual {
        return Err(BvhError::AttributeLength { name, expected, actual });
    }
    Ok(())
}

impl<'a> BvhTreeFromMesh<'a> {
    /// Tree over the triangles of the faces in `faces_mask`.
    ///
    /// A mask covering every face borrows the mesh's cached tree; any other
    /// mask builds a tree owned by the handle.
    pub fn from_mesh_tris(mesh: &'a Mesh, faces_mask: &IndexMask) -> Result<Self> {
        if faces_mask.is_full(mesh.faces_num()) {
            return mesh.bvh(TreeKind::CornerTris);
        }
        let faces = faces_mask.to_bits(mesh.faces_num())?;
        let mut tris = BitMask::new(mesh.corner_tris.len(), false);
        let mut active = 0;
        for face in faces.iter_ones() {
            for tri in mesh.face_tris(face) {
                tris.set(tri, true);
                active += 1;
            }
        }
        Self::from_corner_tris(
            &mesh.positions,
            &mesh.corner_verts,
            &mesh.corner_tris,
            Some(&tris),
            Some(active),
            &TreeKind::CornerTris.params(),
        )
    }

    /// Tree over the edges in `edges_mask`, borrowing the cache when full.
    pub fn from_mesh_edges(mesh: &'a Mesh, edges_mask: &IndexMask) -> Result<Self> {
        if edges_mask.is_full(mesh.edges_num()) {
            return mesh.bvh(TreeKind::Edges);
        }
        let edges = edges_mask.to_bits(mesh.edges_num())?;
        Self::from_edges(
            &mesh.positions,
            &mesh.edges,
            Some(&edges),
            Some(edges_mask.len()),
            &TreeKind::Edges.params(),
        )
    }

    /// Tree over the vertices in `verts_mask`, borrowing the cache when full.
    pub fn from_mesh_verts(mesh: &'a Mesh, verts_mask: &IndexMask) -> Result<Self> {
        if verts_mask.is_full(mesh.verts_num()) {
            return mesh.bvh(TreeKind::Verts);
        }
        let verts = verts_mask.to_bits(mesh.verts_num())?;
        Self::from_verts(&mesh.positions, Some(&verts), Some(verts_mask.len()), &TreeKind::Verts.params())
    }
}
