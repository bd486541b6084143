//! Error types for mesh and point cloud tree construction.

use thiserror::Error;
use vcad_kernel_bvhtree::BvhTreeError;

/// Errors that can occur while building or fetching a BVH over mesh data.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BvhError {
    /// A mask does not cover the element array it filters.
    #[error("mask length {actual} does not match {expected} elements")]
    MaskLength {
        /// Number of elements the mask should cover.
        expected: usize,
        /// Length of the mask given.
        actual: usize,
    },

    /// A caller-supplied active count disagrees with the mask.
    #[error("active count {given} does not match {counted} set mask bits")]
    ActiveCount {
        /// Count passed by the caller.
        given: usize,
        /// Count of set bits in the mask.
        counted: usize,
    },

    /// An element refers to an index outside the array it indexes.
    #[error("{what} index {index} out of bounds (len {len})")]
    IndexOutOfBounds {
        /// What kind of index was out of range.
        what: &'static str,
        /// Offending index.
        index: usize,
        /// Length of the indexed array.
        len: usize,
    },

    /// Elements are active but the array they index is empty.
    #[error("{0} are active but there are no positions")]
    EmptySource(&'static str),

    /// Mesh topology arrays are inconsistent.
    #[error("invalid mesh: {0}")]
    InvalidMesh(String),

    /// A per-element attribute has the wrong length.
    #[error("attribute {name} has {actual} values, expected {expected}")]
    AttributeLength {
        /// Attribute name.
        name: &'static str,
        /// Number of elements in the domain.
        expected: usize,
        /// Number of values given.
        actual: usize,
    },

    /// Tree construction failed.
    #[error("bvh tree error: {0}")]
    Tree(#[from] BvhTreeError),
}

/// Result type for mesh BVH operations.
pub type Result<T> = std::result::Result<T, BvhError>;
