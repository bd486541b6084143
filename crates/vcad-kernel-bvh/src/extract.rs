//! Per-primitive box extraction.
//!
//! Each extractor walks the active elements of one primitive kind, validates
//! the indices it dereferences and produces one box per element. Boxes are
//! computed on the rayon pool and come back in increasing element order.

use rayon::prelude::*;
use vcad_kernel_bvhtree::Aabb3;
use vcad_kernel_math::Point3;

use crate::error::{BvhError, Result};
use crate::mask::BitMask;

/// Boxes of the active elements, parallel to their element indices.
#[derive(Debug, Clone, Default)]
pub struct ExtractedBoxes {
    /// One box per active element.
    pub boxes: Vec<Aabb3>,
    /// Element index of each box.
    pub indices: Vec<usize>,
}

impl ExtractedBoxes {
    /// Number of extracted elements.
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    /// True if no element was active.
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

/// Number of active elements among `universe`.
///
/// Without a mask every element is active. A caller-supplied `active` count
/// is checked against the mask instead of trusted.
pub fn active_count(universe: usize, mask: Option<&BitMask>, active: Option<usize>) -> Result<usize> {
    let counted = match mask {
        Some(mask) => {
            if mask.len() != universe {
                return Err(BvhError::MaskLength {
                    expected: universe,
                    actual: mask.len(),
                });
            }
            mask.count_ones()
        }
        None => universe,
    };
    match active {
        Some(given) if given != counted => Err(BvhError::ActiveCount { given, counted }),
        _ => Ok(counted),
    }
}

fn extract<F>(
    universe: usize,
    mask: Option<&BitMask>,
    active: Option<usize>,
    box_of: F,
) -> Result<ExtractedBoxes>
where
    F: Fn(usize) -> Result<Aabb3> + Sync,
{
    let count = active_count(universe, mask, active)?;
    let indices: Vec<usize> = match mask {
        Some(mask) => mask.iter_ones().collect(),
        None => (0..universe).collect(),
    };
    debug_assert_eq!(indices.len(), count);

    let boxes = indices
        .par_iter()
        .map(|&i| box_of(i))
        .collect::<Result<Vec<_>>>()?;
    Ok(ExtractedBoxes { boxes, indices })
}

fn position<'p>(positions: &'p [Point3], what: &'static str, index: usize) -> Result<&'p Point3> {
    positions.get(index).ok_or(BvhError::IndexOutOfBounds {
        what,
        index,
        len: positions.len(),
    })
}

/// Point boxes for the active vertices.
pub fn extract_vert_boxes(
    positions: &[Point3],
    mask: Option<&BitMask>,
    active: Option<usize>,
) -> Result<ExtractedBoxes> {
    extract(positions.len(), mask, active, |i| Ok(Aabb3::from_point(&positions[i])))
}

/// Segment boxes for the active edges.
pub fn extract_edge_boxes(
    positions: &[Point3],
    edges: &[[usize; 2]],
    mask: Option<&BitMask>,
    active: Option<usize>,
) -> Result<ExtractedBoxes> {
    let count = active_count(edges.len(), mask, active)?;
    if count > 0 && positions.is_empty() {
        return Err(BvhError::EmptySource("edges"));
    }
    extract(edges.len(), mask, Some(count), |i| {
        let [a, b] = edges[i];
        let a = position(positions, "edge vertex", a)?;
        let b = position(positions, "edge vertex", b)?;
        Ok(Aabb3::from_points([a, b]))
    })
}

/// Resolve corner triangle `tri` (three corner indices) to its positions.
pub fn resolve_corner_tri(
    positions: &[Point3],
    corner_verts: &[usize],
    tri: &[usize; 3],
) -> Result<[Point3; 3]> {
    let mut out = [Point3::origin(); 3];
    for (slot, &corner) in out.iter_mut().zip(tri) {
        let vert = *corner_verts.get(corner).ok_or(BvhError::IndexOutOfBounds {
            what: "corner",
            index: corner,
            len: corner_verts.len(),
        })?;
        *slot = *position(positions, "corner vertex", vert)?;
    }
    Ok(out)
}

/// Triangle boxes for the active corner triangles.
pub fn extract_corner_tri_boxes(
    positions: &[Point3],
    corner_verts: &[usize],
    corner_tris: &[[usize; 3]],
    mask: Option<&BitMask>,
    active: Option<usize>,
) -> Result<ExtractedBoxes> {
    let count = active_count(corner_tris.len(), mask, active)?;
    if count > 0 && positions.is_empty() {
        return Err(BvhError::EmptySource("triangles"));
    }
    extract(corner_tris.len(), mask, Some(count), |i| {
        let tri = resolve_corner_tri(positions, corner_verts, &corner_tris[i])?;
        Ok(Aabb3::from_points(&tri))
    })
}
