#![warn(missing_docs)]

//! Bounding volume hierarchy for the vcad spatial query kernel.
//!
//! A generic, geometry-agnostic tree over axis-aligned boxes. Callers insert
//! one box per primitive, balance the tree, then run nearest-point, ray and
//! range queries whose leaf-level tests they supply as closures.
//!
//! # Architecture
//!
//! - [`Aabb3`] - Axis-aligned bounding box
//! - [`Ray`] - Ray with origin, direction and sweep radius
//! - [`BvhTreeBuilder`] - Collects primitive boxes, then balances them
//! - [`BvhTree`] - The balanced hierarchy and its traversals
//! - [`BvhParams`] - Margin, branching factor and split axis
//!
//! # Example
//!
//! ```
//! use vcad_kernel_bvhtree::{BvhNearest, BvhParams, BvhTreeBuilder};
//! use vcad_kernel_math::Point3;
//!
//! let points = [Point3::new(0.0, 0.0, 0.0), Point3::new(4.0, 0.0, 0.0)];
//! let mut builder = BvhTreeBuilder::new(points.len(), BvhParams::default()).unwrap();
//! for (i, p) in points.iter().enumerate() {
//!     builder.insert_points(i, std::slice::from_ref(p)).unwrap();
//! }
//! let tree = builder.balance();
//!
//! let mut nearest = BvhNearest::new();
//! let index = tree.find_nearest(&Point3::new(3.0, 1.0, 0.0), &mut nearest, |i, co, best| {
//!     best.update(i, points[i], None, (points[i] - co).norm_squared());
//! });
//! assert_eq!(index, Some(1));
//! ```

mod aabb;
mod error;
mod params;
mod ray;
pub mod tree;

pub use aabb::Aabb3;
pub use error::{BvhTreeError, Result};
pub use params::{BvhParams, SplitAxis, MAX_TREE_TYPE, MIN_TREE_TYPE};
pub use ray::Ray;
pub use tree::{BvhNearest, BvhNode, BvhRayHit, BvhTree, BvhTreeBuilder};
