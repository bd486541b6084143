//! Per-mesh cache of trees, one slot per [`TreeKind`].

use std::sync::{Mutex, OnceLock, PoisonError};

use vcad_kernel_bvhtree::BvhTree;

use crate::error::Result;
use crate::kind::TreeKind;

/// Lazily built trees shared by every handle borrowing from one mesh.
///
/// Builds are serialized by a lock so concurrent requests for the same kind
/// build it once; reads of built slots never lock.
#[derive(Debug)]
pub struct BvhCache {
    trees: [OnceLock<BvhTree>; TreeKind::COUNT],
    build_lock: Mutex<()>,
}

impl Default for BvhCache {
    fn default() -> Self {
        Self {
            trees: std::array::from_fn(|_| OnceLock::new()),
            build_lock: Mutex::new(()),
        }
    }
}

impl BvhCache {
    /// Cached tree of `kind`, if already built.
    pub fn get(&self, kind: TreeKind) -> Option<&BvhTree> {
        self.trees[kind.index()].get()
    }

    /// True if the tree of `kind` has been built.
    pub fn is_cached(&self, kind: TreeKind) -> bool {
        self.get(kind).is_some()
    }

    /// Cached tree of `kind`, running `build` on first use.
    ///
    /// A failed build leaves the slot empty so a later call retries.
    pub fn get_or_build<F>(&self, kind: TreeKind, build: F) -> Result<&BvhTree>
    where
        F: FnOnce() -> Result<BvhTree>,
    {
        let slot = &self.trees[kind.index()];
        if let Some(tree) = slot.get() {
            log::trace!("bvh cache hit: {kind}");
            return Ok(tree);
        }

        let _guard = self.build_lock.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(tree) = slot.get() {
            log::trace!("bvh cache hit after wait: {kind}");
            return Ok(tree);
        }

        let tree = build()?;
        log::debug!("bvh cache built {kind}: {} primitives, depth {}", tree.len(), tree.depth());
        Ok(slot.get_or_init(|| tree))
    }

    /// Drop every cached tree.
    pub fn clear(&mut self) {
        for slot in &mut self.trees {
            slot.take();
        }
    }
}
