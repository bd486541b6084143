//! Element selection masks.
//!
//! [`BitMask`] is a dense per-element flag set used when building trees over
//! a subset of elements. [`IndexMask`] is the sparse form callers pass to the
//! mesh-level constructors: either a contiguous range or a sorted list.

use std::ops::Range;

use crate::error::{BvhError, Result};

const WORD_BITS: usize = u64::BITS as usize;

/// Fixed-length bit set.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BitMask {
    words: Vec<u64>,
    len: usize,
}

impl BitMask {
    /// Mask of `len` bits, all set to `value`.
    pub fn new(len: usize, value: bool) -> Self {
        let fill = if value { u64::MAX } else { 0 };
        let mut mask = Self {
            words: vec![fill; len.div_ceil(WORD_BITS)],
            len,
        };
        mask.clear_tail();
        mask
    }

    /// Mask from one flag per element.
    pub fn from_bools(flags: &[bool]) -> Self {
        flags.iter().copied().collect()
    }

    /// Number of bits.
    pub fn len(&self) -> usize {
        self.len
    }

    /// True if the mask covers no elements.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Value of bit `index`. Out-of-range bits read as unset.
    #[inline]
    pub fn get(&self, index: usize) -> bool {
        index < self.len && self.words[index / WORD_BITS] & (1 << (index % WORD_BITS)) != 0
    }

    /// Set bit `index` to `value`.
    ///
    /// # Panics
    ///
    /// Panics if `index >= len`.
    #[inline]
    pub fn set(&mut self, index: usize, value: bool) {
        assert!(index < self.len, "bit {index} out of range for mask of {}", self.len);
        let bit = 1 << (index % WORD_BITS);
        let word = &mut self.words[index / WORD_BITS];
        if value {
            *word |= bit;
        } else {
            *word &= !bit;
        }
    }

    /// Number of set bits.
    pub fn count_ones(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// True if every bit is set.
    pub fn all(&self) -> bool {
        self.count_ones() == self.len
    }

    /// Indices of set bits in increasing order.
    pub fn iter_ones(&self) -> impl Iterator<Item = usize> + '_ {
        self.words.iter().enumerate().flat_map(|(w, &word)| {
            let mut bits = word;
            std::iter::from_fn(move || {
                if bits == 0 {
                    return None;
                }
                let tz = bits.trailing_zeros() as usize;
                bits &= bits - 1;
                Some(w * WORD_BITS + tz)
            })
        })
    }

    fn clear_tail(&mut self) {
        let rem = self.len % WORD_BITS;
        if rem != 0 {
            if let Some(last) = self.words.last_mut() {
                *last &= (1u64 << rem) - 1;
            }
        }
    }
}

impl FromIterator<bool> for BitMask {
    fn from_iter<I: IntoIterator<Item = bool>>(iter: I) -> Self {
        let mut words = Vec::new();
        let mut len = 0;
        for flag in iter {
            if len % WORD_BITS == 0 {
                words.push(0);
            }
            if flag {
                if let Some(word) = words.last_mut() {
                    *word |= 1 << (len % WORD_BITS);
                }
            }
            len += 1;
        }
        Self { words, len }
    }
}

/// Sparse selection of element indices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexMask {
    /// Every index in a contiguous range.
    Range(Range<usize>),
    /// Sorted, deduplicated indices.
    Indices(Vec<usize>),
}

impl IndexMask {
    /// Selects `0..len`.
    pub fn all(len: usize) -> Self {
        IndexMask::Range(0..len)
    }

    /// Selects nothing.
    pub fn none() -> Self {
        IndexMask::Indices(Vec::new())
    }

    /// Selection from arbitrary indices; sorted and deduplicated.
    pub fn from_indices(indices: impl IntoIterator<Item = usize>) -> Self {
        let mut indices: Vec<usize> = indices.into_iter().collect();
        indices.sort_unstable();
        indices.dedup();
        IndexMask::Indices(indices)
    }

    /// Selection of the set bits of `bits`.
    pub fn from_bits(bits: &BitMask) -> Self {
        IndexMask::Indices(bits.iter_ones().collect())
    }

    /// Selection of `i in 0..len` for which `predicate(i)` holds.
    pub fn from_predicate(len: usize, predicate: impl Fn(usize) -> bool) -> Self {
        IndexMask::Indices((0..len).filter(|&i| predicate(i)).collect())
    }

    /// Number of selected indices.
    pub fn len(&self) -> usize {
        match self {
            IndexMask::Range(range) => range.len(),
            IndexMask::Indices(indices) => indices.len(),
        }
    }

    /// True if nothing is selected.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True if `index` is selected.
    pub fn contains(&self, index: usize) -> bool {
        match self {
            IndexMask::Range(range) => range.contains(&index),
            IndexMask::Indices(indices) => indices.binary_search(&index).is_ok(),
        }
    }

    /// Selected indices in increasing order.
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        let (range, list) = match self {
            IndexMask::Range(range) => (Some(range.clone()), None),
            IndexMask::Indices(indices) => (None, Some(indices.iter().copied())),
        };
        range.into_iter().flatten().chain(list.into_iter().flatten())
    }

    /// Largest selected index.
    pub fn last(&self) -> Option<usize> {
        match self {
            IndexMask::Range(range) => range.clone().next_back(),
            IndexMask::Indices(indices) => indices.last().copied(),
        }
    }

    /// True if the selection is exactly `0..universe`.
    pub fn is_full(&self, universe: usize) -> bool {
        self.len() == universe && self.last().map_or(true, |last| last < universe)
    }

    /// Dense form over `universe` elements.
    pub fn to_bits(&self, universe: usize) -> Result<BitMask> {
        if let Some(last) = self.last() {
            if last >= universe {
                return Err(BvhError::IndexOutOfBounds {
                    what: "mask",
                    index: last,
                    len: universe,
                });
            }
        }
        let mut bits = BitMask::new(universe, false);
        for index in self.iter() {
            bits.set(index, true);
        }
        Ok(bits)
    }
}

impl From<Range<usize>> for IndexMask {
    fn from(range: Range<usize>) -> Self {
        IndexMask::Range(range)
    }
}
