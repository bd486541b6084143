//! Bounding Volume Hierarchy over primitive boxes.
//!
//! Primitives are inserted as boxes tagged with a caller-chosen index, then
//! [`BvhTreeBuilder::balance`] sorts them along a split axis and partitions
//! each node into `tree_type` equally sized groups. Traversal prunes with the
//! boxes and hands every surviving leaf to a caller-supplied leaf test that
//! updates a "best so far" accumulator owned by the query.

use rayon::prelude::*;
use vcad_kernel_math::{Dir3, Point3};

use crate::error::{BvhTreeError, Result};
use crate::ray::RaySlab;
use crate::{Aabb3, BvhParams, Ray};

/// Subtrees with at least this many primitives are built on the rayon pool.
const PARALLEL_BUILD_THRESHOLD: usize = 4096;

/// A BVH node - either a leaf holding one primitive or an internal node with
/// up to `tree_type` children.
#[derive(Debug, Clone)]
pub enum BvhNode {
    /// Leaf node for a single primitive.
    Leaf {
        /// Epsilon-inflated box of the primitive.
        aabb: Aabb3,
        /// Index the primitive was inserted with.
        index: usize,
    },
    /// Internal node.
    Internal {
        /// Union of the children's boxes.
        aabb: Aabb3,
        /// Child nodes.
        children: Vec<BvhNode>,
    },
}

impl BvhNode {
    /// Bounding box of this node.
    pub fn aabb(&self) -> &Aabb3 {
        match self {
            BvhNode::Leaf { aabb, .. } => aabb,
            BvhNode::Internal { aabb, .. } => aabb,
        }
    }
}

/// Running best answer of a nearest-point query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BvhNearest {
    /// Primitive index of the best candidate so far.
    pub index: Option<usize>,
    /// Closest point found.
    pub co: Point3,
    /// Normal at the closest point, if the primitive has one.
    pub no: Option<Dir3>,
    /// Squared distance from the query point to `co`.
    pub dist_sq: f64,
}

impl BvhNearest {
    /// Unbounded accumulator.
    pub fn new() -> Self {
        Self::within(f64::INFINITY)
    }

    /// Accumulator that only accepts candidates within `max_dist`.
    ///
    /// A negative or NaN bound accepts nothing.
    pub fn within(max_dist: f64) -> Self {
        let dist_sq = if max_dist >= 0.0 {
            max_dist * max_dist
        } else {
            f64::NEG_INFINITY
        };
        Self {
            index: None,
            co: Point3::origin(),
            no: None,
            dist_sq,
        }
    }

    /// Record a candidate if it beats the current best.
    ///
    /// The first candidate is accepted at exactly the search bound; later
    /// ones must be strictly closer.
    pub fn update(&mut self, index: usize, co: Point3, no: Option<Dir3>, dist_sq: f64) -> bool {
        let improves = match self.index {
            None => dist_sq <= self.dist_sq,
            Some(_) => dist_sq < self.dist_sq,
        };
        if improves {
            self.index = Some(index);
            self.co = co;
            self.no = no;
            self.dist_sq = dist_sq;
        }
        improves
    }
}

impl Default for BvhNearest {
    fn default() -> Self {
        Self::new()
    }
}

/// Running nearest hit of a ray cast.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BvhRayHit {
    /// Primitive index of the nearest hit so far.
    pub index: Option<usize>,
    /// Hit position.
    pub co: Point3,
    /// Surface normal at the hit, if the primitive has one.
    pub no: Option<Dir3>,
    /// Distance along the ray; the search bound until something is hit.
    pub dist: f64,
}

impl BvhRayHit {
    /// Accumulator that only accepts hits up to `max_dist` along the ray.
    pub fn new(max_dist: f64) -> Self {
        Self {
            index: None,
            co: Point3::origin(),
            no: None,
            dist: max_dist,
        }
    }

    /// Record a hit if it is nearer than the current best.
    pub fn update(&mut self, index: usize, dist: f64, co: Point3, no: Option<Dir3>) -> bool {
        let improves = match self.index {
            None => dist <= self.dist,
            Some(_) => dist < self.dist,
        };
        if improves {
            self.index = Some(index);
            self.dist = dist;
            self.co = co;
            self.no = no;
        }
        improves
    }
}

#[derive(Debug, Clone, Copy)]
struct BuildItem {
    index: usize,
    aabb: Aabb3,
    centroid: Point3,
}

#[derive(Debug, Clone, Copy, Default)]
struct BuildStats {
    nodes: usize,
    depth: usize,
}

/// Collects primitive boxes and balances them into a [`BvhTree`].
#[derive(Debug)]
pub struct BvhTreeBuilder {
    items: Vec<BuildItem>,
    capacity: usize,
    params: BvhParams,
}

impl BvhTreeBuilder {
    /// Allocate a builder for at most `capacity` primitives.
    pub fn new(capacity: usize, params: BvhParams) -> Result<Self> {
        params.validate()?;
        Ok(Self {
            items: Vec::with_capacity(capacity),
            capacity,
            params,
        })
    }

    /// Insert a primitive box tagged with `index`, inflated by the epsilon.
    pub fn insert(&mut self, index: usize, aabb: Aabb3) -> Result<()> {
        if self.items.len() >= self.capacity {
            return Err(BvhTreeError::CapacityExceeded {
                capacity: self.capacity,
            });
        }
        if aabb.is_empty() || !aabb.is_finite() {
            return Err(BvhTreeError::NonFiniteBounds(index));
        }
        let aabb = aabb.expanded(self.params.epsilon);
        self.items.push(BuildItem {
            index,
            aabb,
            centroid: aabb.center(),
        });
        Ok(())
    }

    /// Insert the box enclosing `points`.
    pub fn insert_points(&mut self, index: usize, points: &[Point3]) -> Result<()> {
        self.insert(index, Aabb3::from_points(points))
    }

    /// Number of primitives inserted so far.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// True if nothing has been inserted.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Build the hierarchy.
    pub fn balance(mut self) -> BvhTree {
        let len = self.items.len();
        let (root, stats) = if self.items.is_empty() {
            (None, BuildStats::default())
        } else {
            let (node, stats) = build_node(&mut self.items, &self.params, 0);
            (Some(node), stats)
        };

        log::debug!(
            "balanced bvh: {} primitives, {} nodes, depth {}, tree_type {}",
            len,
            stats.nodes,
            stats.depth,
            self.params.tree_type
        );

        BvhTree {
            root,
            len,
            node_count: stats.nodes,
            depth: stats.depth,
            params: self.params,
        }
    }
}

/// Bounding Volume Hierarchy for nearest-point and ray queries.
#[derive(Debug, Clone)]
pub struct BvhTree {
    root: Option<BvhNode>,
    len: usize,
    node_count: usize,
    depth: usize,
    params: BvhParams,
}

impl BvhTree {
    /// A tree without primitives; every query misses.
    pub fn empty(params: BvhParams) -> Self {
        Self {
            root: None,
            len: 0,
            node_count: 0,
            depth: 0,
            params,
        }
    }

    /// Number of primitives.
    pub fn len(&self) -> usize {
        self.len
    }

    /// True if the tree holds no primitives.
    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// Total number of nodes, leaves included.
    pub fn node_count(&self) -> usize {
        self.node_count
    }

    /// Number of levels from the root to the deepest leaf.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Parameters the tree was built with.
    pub fn params(&self) -> &BvhParams {
        &self.params
    }

    /// Get a reference to the root node, if any.
    pub fn root(&self) -> Option<&BvhNode> {
        self.root.as_ref()
    }

    /// Box enclosing every primitive.
    pub fn bounds(&self) -> Option<Aabb3> {
        self.root.as_ref().map(|root| *root.aabb())
    }

    /// Indices of all primitives, in leaf order.
    pub fn leaf_indices(&self) -> Vec<usize> {
        let mut out = Vec::with_capacity(self.len);
        let mut stack: Vec<&BvhNode> = self.root.iter().collect();
        while let Some(node) = stack.pop() {
            match node {
                BvhNode::Leaf { index, .. } => out.push(*index),
                BvhNode::Internal { children, .. } => stack.extend(children.iter().rev()),
            }
        }
        out
    }

    /// Find the primitive closest to `co`.
    ///
    /// Nodes farther than the current best are pruned; `callback` computes
    /// the exact closest point of a candidate leaf and updates `nearest`.
    /// Returns the index of the best primitive.
    pub fn find_nearest<F>(&self, co: &Point3, nearest: &mut BvhNearest, mut callback: F) -> Option<usize>
    where
        F: FnMut(usize, &Point3, &mut BvhNearest),
    {
        if let Some(root) = &self.root {
            if root.aabb().distance_squared(co) <= nearest.dist_sq {
                nearest_node(root, co, nearest, &mut callback);
            }
        }
        nearest.index
    }

    /// Cast a ray and keep the nearest hit.
    ///
    /// The direction is normalized first, so `hit.dist` is a Euclidean
    /// distance. Nodes whose (radius-grown) box is entered beyond the
    /// current best are pruned. Returns the index of the nearest hit.
    pub fn ray_cast<F>(&self, ray: &Ray, hit: &mut BvhRayHit, mut callback: F) -> Option<usize>
    where
        F: FnMut(usize, &Ray, &mut BvhRayHit),
    {
        let (Some(root), Some(ray)) = (&self.root, ray.normalized()) else {
            return None;
        };
        let slab = RaySlab::new(&ray);
        if let Some((t_min, _)) = slab.intersect_aabb(root.aabb()) {
            if t_min <= hit.dist {
                ray_node(root, &ray, &slab, hit, &mut callback);
            }
        }
        hit.index
    }

    /// Cast a ray and report every primitive hit within `max_dist`,
    /// sorted by distance.
    ///
    /// `callback` is invoked with a fresh accumulator per candidate leaf.
    pub fn ray_cast_all<F>(&self, ray: &Ray, max_dist: f64, mut callback: F) -> Vec<BvhRayHit>
    where
        F: FnMut(usize, &Ray, &mut BvhRayHit),
    {
        let mut hits = Vec::new();
        let (Some(root), Some(ray)) = (&self.root, ray.normalized()) else {
            return hits;
        };
        let slab = RaySlab::new(&ray);

        let mut stack = vec![root];
        while let Some(node) = stack.pop() {
            match slab.intersect_aabb(node.aabb()) {
                Some((t_min, _)) if t_min <= max_dist => {}
                _ => continue,
            }
            match node {
                BvhNode::Leaf { index, .. } => {
                    let mut leaf_hit = BvhRayHit::new(max_dist);
                    callback(*index, &ray, &mut leaf_hit);
                    if leaf_hit.index.is_some() {
                        hits.push(leaf_hit);
                    }
                }
                BvhNode::Internal { children, .. } => stack.extend(children.iter()),
            }
        }

        hits.sort_by(|a, b| a.dist.total_cmp(&b.dist));
        hits
    }

    /// Visit every leaf whose box lies within `radius` of `co`.
    ///
    /// `callback` receives the primitive index, the query point and the
    /// squared distance to the leaf box. Returns the number of leaves visited;
    /// a negative or NaN radius visits none.
    pub fn range_query<F>(&self, co: &Point3, radius: f64, mut callback: F) -> usize
    where
        F: FnMut(usize, &Point3, f64),
    {
        if radius.is_nan() || radius < 0.0 {
            return 0;
        }
        let radius_sq = radius * radius;
        let mut visited = 0;
        let mut stack: Vec<&BvhNode> = self.root.iter().collect();
        while let Some(node) = stack.pop() {
            let d2 = node.aabb().distance_squared(co);
            if d2 > radius_sq {
                continue;
            }
            match node {
                BvhNode::Leaf { index, .. } => {
                    visited += 1;
                    callback(*index, co, d2);
                }
                BvhNode::Internal { children, .. } => stack.extend(children.iter()),
            }
        }
        visited
    }
}

/// Split `slice` into `groups` consecutive parts whose sizes differ by at most one.
fn split_even<T>(mut slice: &mut [T], groups: usize) -> Vec<&mut [T]> {
    let base = slice.len() / groups;
    let extra = slice.len() % groups;
    let mut parts = Vec::with_capacity(groups);
    for g in 0..groups {
        let size = base + usize::from(g < extra);
        let (head, tail) = std::mem::take(&mut slice).split_at_mut(size);
        parts.push(head);
        slice = tail;
    }
    parts
}

/// Build a node recursively by sorting along the split axis and
/// partitioning into `tree_type` groups.
fn build_node(items: &mut [BuildItem], params: &BvhParams, depth: usize) -> (BvhNode, BuildStats) {
    if items.len() == 1 {
        let item = items[0];
        return (
            BvhNode::Leaf {
                aabb: item.aabb,
                index: item.index,
            },
            BuildStats {
                nodes: 1,
                depth: depth + 1,
            },
        );
    }

    let mut aabb = Aabb3::empty();
    let mut centroid_bounds = Aabb3::empty();
    for item in items.iter() {
        aabb.include_aabb(&item.aabb);
        centroid_bounds.include_point(&item.centroid);
    }

    let axis = params.axis.resolve(depth, centroid_bounds.longest_axis());
    items.sort_unstable_by(|a, b| {
        a.centroid[axis]
            .total_cmp(&b.centroid[axis])
            .then(a.index.cmp(&b.index))
    });

    let len = items.len();
    let groups = params.tree_type.min(len);
    let parts = split_even(items, groups);

    let built: Vec<(BvhNode, BuildStats)> = if len >= PARALLEL_BUILD_THRESHOLD {
        parts
            .into_par_iter()
            .map(|part| build_node(part, params, depth + 1))
            .collect()
    } else {
        parts
            .into_iter()
            .map(|part| build_node(part, params, depth + 1))
            .collect()
    };

    let mut stats = BuildStats {
        nodes: 1,
        depth: depth + 1,
    };
    let mut children = Vec::with_capacity(built.len());
    for (child, child_stats) in built {
        stats.nodes += child_stats.nodes;
        stats.depth = stats.depth.max(child_stats.depth);
        children.push(child);
    }

    (BvhNode::Internal { aabb, children }, stats)
}

fn nearest_node<F>(node: &BvhNode, co: &Point3, nearest: &mut BvhNearest, callback: &mut F)
where
    F: FnMut(usize, &Point3, &mut BvhNearest),
{
    match node {
        BvhNode::Leaf { index, .. } => callback(*index, co, nearest),
        BvhNode::Internal { children, .. } => {
            // Visit children closest-box first
            let mut order: Vec<(f64, &BvhNode)> = children
                .iter()
                .map(|child| (child.aabb().distance_squared(co), child))
                .collect();
            order.sort_by(|a, b| a.0.total_cmp(&b.0));

            for (d2, child) in order {
                if d2 > nearest.dist_sq {
                    break;
                }
                nearest_node(child, co, nearest, callback);
            }
        }
    }
}

fn ray_node<F>(node: &BvhNode, ray: &Ray, slab: &RaySlab, hit: &mut BvhRayHit, callback: &mut F)
where
    F: FnMut(usize, &Ray, &mut BvhRayHit),
{
    match node {
        BvhNode::Leaf { index, .. } => callback(*index, ray, hit),
        BvhNode::Internal { children, .. } => {
            // Test children in order of AABB entry distance
            let mut order: Vec<(f64, &BvhNode)> = children
                .iter()
                .filter_map(|child| slab.intersect_aabb(child.aabb()).map(|(t, _)| (t, child)))
                .collect();
            order.sort_by(|a, b| a.0.total_cmp(&b.0));

            for (t_min, child) in order {
                if t_min > hit.dist {
                    break;
                }
                ray_node(child, ray, slab, hit, callback);
            }
        }
    }
}
