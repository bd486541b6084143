//! Query handles over mesh geometry.
//!
//! A handle pairs a tree with the [`PrimitiveSource`] it was built from. The
//! tree is either borrowed from a mesh cache or owned by the handle when it
//! was built for a subset of the elements.

use vcad_kernel_bvhtree::{BvhNearest, BvhParams, BvhRayHit, BvhTree, BvhTreeBuilder, Ray};
use vcad_kernel_math::{Dir3, Point3};

use crate::error::Result;
use crate::extract::{extract_corner_tri_boxes, extract_edge_boxes, extract_vert_boxes, ExtractedBoxes};
use crate::mask::BitMask;
use crate::source::PrimitiveSource;

/// Tree behind a handle.
#[derive(Debug, Default)]
pub enum TreeRef<'a> {
    /// No tree; every query misses.
    #[default]
    Empty,
    /// Tree owned by someone else, usually a mesh cache.
    Borrowed(&'a BvhTree),
    /// Tree built for, and released with, this handle.
    Owned(Box<BvhTree>),
}

impl<'a> TreeRef<'a> {
    /// The tree, if any.
    pub fn get(&self) -> Option<&BvhTree> {
        match self {
            TreeRef::Empty => None,
            TreeRef::Borrowed(tree) => Some(*tree),
            TreeRef::Owned(tree) => Some(tree.as_ref()),
        }
    }

    /// True if dropping this reference releases the tree.
    pub fn is_owned(&self) -> bool {
        matches!(self, TreeRef::Owned(_))
    }
}

/// Closest primitive to a query point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NearestHit {
    /// Primitive index in its source array.
    pub index: usize,
    /// Euclidean distance from the query point.
    pub distance: f64,
    /// Closest point on the primitive.
    pub position: Point3,
    /// Face normal or edge direction; `None` for points.
    pub normal: Option<Dir3>,
}

impl NearestHit {
    pub(crate) fn from_accumulator(nearest: &BvhNearest) -> Option<Self> {
        Some(Self {
            index: nearest.index?,
            distance: nearest.dist_sq.sqrt(),
            position: nearest.co,
            normal: nearest.no,
        })
    }
}

/// Primitive hit by a ray.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit {
    /// Primitive index in its source array.
    pub index: usize,
    /// Euclidean distance along the ray.
    pub distance: f64,
    /// Hit position; the sphere center for swept rays.
    pub position: Point3,
    /// Face normal or edge direction; `None` for points.
    pub normal: Option<Dir3>,
}

impl RayHit {
    fn from_accumulator(hit: &BvhRayHit) -> Option<Self> {
        Some(Self {
            index: hit.index?,
            distance: hit.dist,
            position: hit.co,
            normal: hit.no,
        })
    }
}

/// Balance extracted boxes into a tree.
pub(crate) fn build_tree(boxes: ExtractedBoxes, params: &BvhParams) -> Result<BvhTree> {
    let mut builder = BvhTreeBuilder::new(boxes.len(), *params)?;
    for (index, aabb) in boxes.indices.into_iter().zip(boxes.boxes) {
        builder.insert(index, aabb)?;
    }
    Ok(builder.balance())
}

/// Build a tree over the active primitives of `source`.
pub(crate) fn build_source_tree(
    source: &PrimitiveSource<'_>,
    mask: Option<&BitMask>,
    active: Option<usize>,
    params: &BvhParams,
) -> Result<BvhTree> {
    params.validate()?;
    let boxes = match *source {
        PrimitiveSource::Verts { positions } => extract_vert_boxes(positions, mask, active)?,
        PrimitiveSource::Edges { positions, edges } => extract_edge_boxes(positions, edges, mask, active)?,
        PrimitiveSource::CornerTris {
            positions,
            corner_verts,
            corner_tris,
        } => extract_corner_tri_boxes(positions, corner_verts, corner_tris, mask, active)?,
    };
    if boxes.is_empty() && !source.is_empty() {
        log::debug!("no active {:?} primitives, building empty tree", source.kind());
    }
    build_tree(boxes, params)
}

/// Nearest-point and ray queries over mesh vertices, edges or triangles.
#[derive(Debug)]
pub struct BvhTreeFromMesh<'a> {
    tree: TreeRef<'a>,
    source: PrimitiveSource<'a>,
}

impl<'a> BvhTreeFromMesh<'a> {
    fn owned(
        source: PrimitiveSource<'a>,
        mask: Option<&BitMask>,
        active: Option<usize>,
        params: &BvhParams,
    ) -> Result<Self> {
        let tree = build_source_tree(&source, mask, active, params)?;
        Ok(Self {
            tree: TreeRef::Owned(Box::new(tree)),
            source,
        })
    }

    /// Handle borrowing a cached tree built over `source`.
    pub(crate) fn borrowed(tree: &'a BvhTree, source: PrimitiveSource<'a>) -> Self {
        debug_assert!(tree.len() <= source.len());
        Self {
            tree: TreeRef::Borrowed(tree),
            source,
        }
    }

    /// Build an owned tree over the vertices selected by `mask`.
    ///
    /// `active`, when given, must equal the number of set bits in `mask`
    /// (or the vertex count without a mask).
    pub fn from_verts(
        positions: &'a [Point3],
        mask: Option<&BitMask>,
        active: Option<usize>,
        params: &BvhParams,
    ) -> Result<Self> {
        Self::owned(PrimitiveSource::Verts { positions }, mask, active, params)
    }

    /// Build an owned tree over the edges selected by `mask`.
    pub fn from_edges(
        positions: &'a [Point3],
        edges: &'a [[usize; 2]],
        mask: Option<&BitMask>,
        active: Option<usize>,
        params: &BvhParams,
    ) -> Result<Self> {
        Self::owned(PrimitiveSource::Edges { positions, edges }, mask, active, params)
    }

    /// Build an owned tree over the corner triangles selected by `mask`.
    pub fn from_corner_tris(
        positions: &'a [Point3],
        corner_verts: &'a [usize],
        corner_tris: &'a [[usize; 3]],
        mask: Option<&BitMask>,
        active: Option<usize>,
        params: &BvhParams,
    ) -> Result<Self> {
        let source = PrimitiveSource::CornerTris {
            positions,
            corner_verts,
            corner_tris,
        };
        Self::owned(source, mask, active, params)
    }

    /// The tree, unless the handle is empty.
    pub fn tree(&self) -> Option<&BvhTree> {
        self.tree.get()
    }

    /// Geometry the tree was built from.
    pub fn source(&self) -> &PrimitiveSource<'a> {
        &self.source
    }

    /// True if the handle releases its tree on `free` or drop.
    pub fn is_owned(&self) -> bool {
        self.tree.is_owned()
    }

    /// True if every query misses.
    pub fn is_empty(&self) -> bool {
        self.tree.get().map_or(true, BvhTree::is_empty)
    }

    /// Number of primitives in the tree.
    pub fn len(&self) -> usize {
        self.tree.get().map_or(0, BvhTree::len)
    }

    /// Release an owned tree and detach from a borrowed one.
    ///
    /// The geometry is never touched. Calling this again is a no-op.
    pub fn free(&mut self) {
        self.tree = TreeRef::Empty;
    }

    /// Closest primitive to `co`.
    pub fn nearest(&self, co: &Point3) -> Option<NearestHit> {
        self.nearest_within(co, f64::INFINITY)
    }

    /// Closest primitive to `co` no farther than `max_distance`.
    pub fn nearest_within(&self, co: &Point3, max_distance: f64) -> Option<NearestHit> {
        let tree = self.tree.get()?;
        let source = self.source;
        let mut nearest = BvhNearest::within(max_distance);
        tree.find_nearest(co, &mut nearest, |index, co, nearest| source.nearest_leaf(index, co, nearest))?;
        NearestHit::from_accumulator(&nearest)
    }

    /// Nearest primitive hit by `ray` within `max_distance`.
    ///
    /// Rays with a radius are swept spheres. Distances are measured along the
    /// normalized ray direction.
    pub fn raycast(&self, ray: &Ray, max_distance: f64) -> Option<RayHit> {
        let tree = self.tree.get()?;
        let source = self.source;
        let mut hit = BvhRayHit::new(max_distance);
        tree.ray_cast(ray, &mut hit, |index, ray, hit| source.raycast_leaf(index, ray, hit))?;
        RayHit::from_accumulator(&hit)
    }

    /// Every primitive hit by `ray` within `max_distance`, nearest first.
    pub fn raycast_all(&self, ray: &Ray, max_distance: f64) -> Vec<RayHit> {
        let Some(tree) = self.tree.get() else {
            return Vec::new();
        };
        let source = self.source;
        tree.ray_cast_all(ray, max_distance, |index, ray, hit| source.raycast_leaf(index, ray, hit))
            .iter()
            .filter_map(RayHit::from_accumulator)
            .collect()
    }

    /// Primitives with a point within `radius` of `co`, in index order.
    pub fn range_query(&self, co: &Point3, radius: f64) -> Vec<usize> {
        range_query(self.tree.get(), &self.source, co, radius)
    }
}

pub(crate) fn range_query(tree: Option<&BvhTree>, source: &PrimitiveSource<'_>, co: &Point3, radius: f64) -> Vec<usize> {
    let mut found = Vec::new();
    if let Some(tree) = tree {
        tree.range_query(co, radius, |index, co, _| {
            let mut nearest = BvhNearest::within(radius);
            source.nearest_leaf(index, co, &mut nearest);
            if nearest.index.is_some() {
                found.push(index);
            }
        });
    }
    found.sort_unstable();
    found
}
