//! Tree construction parameters.

use serde::{Deserialize, Serialize};
use vcad_kernel_math::Axis;

use crate::error::{BvhTreeError, Result};

/// Smallest supported branching factor.
pub const MIN_TREE_TYPE: usize = 2;
/// Largest supported branching factor.
pub const MAX_TREE_TYPE: usize = 32;

/// How the builder picks the axis along which a node's primitives are split.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SplitAxis {
    /// Axis of largest extent of the node's centroids.
    #[default]
    Longest,
    /// X, Y, Z in turn by node depth.
    Cycle,
    /// Always the same axis.
    Fixed(Axis),
}

impl SplitAxis {
    /// Resolve to a component index for a node at `depth` whose centroid
    /// bounds have their longest extent along `longest`.
    pub fn resolve(self, depth: usize, longest: usize) -> usize {
        match self {
            SplitAxis::Longest => longest,
            SplitAxis::Cycle => depth % 3,
            SplitAxis::Fixed(axis) => axis.index(),
        }
    }
}

/// Parameters for building a [`BvhTree`](crate::BvhTree).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BvhParams {
    /// Margin added around every primitive box.
    pub epsilon: f64,
    /// Branching factor of internal nodes.
    pub tree_type: usize,
    /// Split axis selection.
    pub axis: SplitAxis,
}

impl BvhParams {
    /// Parameters used for triangle trees: wider nodes, no margin.
    pub fn triangles() -> Self {
        Self {
            tree_type: 4,
            ..Self::default()
        }
    }

    /// Replace the margin.
    pub fn with_epsilon(mut self, epsilon: f64) -> Self {
        self.epsilon = epsilon;
        self
    }

    /// Replace the branching factor.
    pub fn with_tree_type(mut self, tree_type: usize) -> Self {
        self.tree_type = tree_type;
        self
    }

    /// Replace the split axis selection.
    pub fn with_axis(mut self, axis: SplitAxis) -> Self {
        self.axis = axis;
        self
    }

    /// Check that the parameters can build a tree.
    pub fn validate(&self) -> Result<()> {
        if !(MIN_TREE_TYPE..=MAX_TREE_TYPE).contains(&self.tree_type) {
            return Err(BvhTreeError::InvalidTreeType {
                got: self.tree_type,
                min: MIN_TREE_TYPE,
                max: MAX_TREE_TYPE,
            });
        }
        if !self.epsilon.is_finite() || self.epsilon < 0.0 {
            return Err(BvhTreeError::InvalidEpsilon(self.epsilon));
        }
        Ok(())
    }
}

impl Default for BvhParams {
    fn default() -> Self {
        Self {
            epsilon: 0.0,
            tree_type: 2,
            axis: SplitAxis::Longest,
        }
    }
}
