//! Error types for tree construction.

use thiserror::Error;

/// Errors that can occur while building a [`BvhTree`](crate::BvhTree).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BvhTreeError {
    /// Branching factor outside the supported range.
    #[error("tree_type must be in {min}..={max}, got {got}")]
    InvalidTreeType {
        /// Requested branching factor.
        got: usize,
        /// Smallest supported branching factor.
        min: usize,
        /// Largest supported branching factor.
        max: usize,
    },

    /// Box inflation epsilon is negative or not finite.
    #[error("epsilon must be finite and non-negative, got {0}")]
    InvalidEpsilon(f64),

    /// More primitives inserted than the builder was sized for.
    #[error("builder sized for {capacity} primitives, cannot insert more")]
    CapacityExceeded {
        /// Number of primitives the builder was allocated for.
        capacity: usize,
    },

    /// A primitive's bounding box contains NaN or infinite coordinates.
    #[error("primitive {0} has non-finite bounds")]
    NonFiniteBounds(usize),
}

/// Result type for tree construction.
pub type Result<T> = std::result::Result<T, BvhTreeError>;
