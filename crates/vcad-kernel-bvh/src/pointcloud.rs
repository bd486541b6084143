//! Point clouds and their nearest-point trees.

use vcad_kernel_bvhtree::{BvhNearest, BvhParams, BvhTree};
use vcad_kernel_math::Point3;

use crate::error::Result;
use crate::handle::{build_source_tree, range_query, NearestHit, TreeRef};
use crate::mask::{BitMask, IndexMask};
use crate::source::PrimitiveSource;

/// Unconnected points.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PointCloud {
    positions: Vec<Point3>,
}

impl PointCloud {
    /// Create a point cloud.
    pub fn new(positions: Vec<Point3>) -> Self {
        Self { positions }
    }

    /// Point positions.
    pub fn positions(&self) -> &[Point3] {
        &self.positions
    }

    /// Number of points.
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    /// True if the cloud has no points.
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

impl FromIterator<Point3> for PointCloud {
    fn from_iter<I: IntoIterator<Item = Point3>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// Nearest-point queries over a point cloud. Always owns its tree.
#[derive(Debug)]
pub struct BvhTreeFromPointCloud<'a> {
    tree: TreeRef<'a>,
    positions: &'a [Point3],
}

impl<'a> BvhTreeFromPointCloud<'a> {
    /// Tree over the points of `pointcloud` selected by `points_mask`.
    pub fn from_pointcloud(pointcloud: &'a PointCloud, points_mask: &IndexMask) -> Result<Self> {
        let bits = points_mask.to_bits(pointcloud.len())?;
        Self::from_points(&pointcloud.positions, Some(&bits), Some(points_mask.len()), &BvhParams::default())
    }

    /// Tree over the points selected by `mask`.
    pub fn from_points(
        positions: &'a [Point3],
        mask: Option<&BitMask>,
        active: Option<usize>,
        params: &BvhParams,
    ) -> Result<Self> {
        let tree = build_source_tree(&PrimitiveSource::Verts { positions }, mask, active, params)?;
        Ok(Self {
            tree: TreeRef::Owned(Box::new(tree)),
            positions,
        })
    }

    /// The tree, unless freed.
    pub fn tree(&self) -> Option<&BvhTree> {
        self.tree.get()
    }

    /// True if every query misses.
    pub fn is_empty(&self) -> bool {
        self.tree.get().map_or(true, BvhTree::is_empty)
    }

    /// Release the tree. Calling this again is a no-op.
    pub fn free(&mut self) {
        self.tree = TreeRef::Empty;
    }

    /// Closest selected point to `co`.
    pub fn nearest(&self, co: &Point3) -> Option<NearestHit> {
        self.nearest_within(co, f64::INFINITY)
    }

    /// Closest selected point to `co` no farther than `max_distance`.
    pub fn nearest_within(&self, co: &Point3, max_distance: f64) -> Option<NearestHit> {
        let tree = self.tree.get()?;
        let source = PrimitiveSource::Verts {
            positions: self.positions,
        };
        let mut nearest = BvhNearest::within(max_distance);
        tree.find_nearest(co, &mut nearest, |index, co, nearest| source.nearest_leaf(index, co, nearest))?;
        NearestHit::from_accumulator(&nearest)
    }

    /// Selected points within `radius` of `co`, in index order.
    pub fn range_query(&self, co: &Point3, radius: f64) -> Vec<usize> {
        let source = PrimitiveSource::Verts {
            positions: self.positions,
        };
        range_query(self.tree.get(), &source, co, radius)
    }
}
