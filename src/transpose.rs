//! Transposed index: CSR-style inversion of a forward index array.
//!
//! A forward index maps E-vector positions to L-vector slots; the transpose
//! direction needs the inverse map so accumulation can be parallelized over
//! destination slots without write conflicts. [`TransposedIndex`] stores that
//! inverse in CSR form: `offsets[g]..offsets[g+1]` delimits the run of
//! forward-array positions that reference slot `g`, and `indices` holds those
//! positions grouped by slot.
//!
//! The build is a counting sort over the forward array: count per-slot
//! fan-in, prefix-sum the counts into starting cursors, place each position
//! at its slot's cursor, then shift the cursor array back down into offsets.

use itertools::Itertools;

use crate::debug_invariants::DebugInvariants;
use crate::error::RestrictError;

/// Inverse of a forward index array, grouped by destination L-slot.
///
/// # Determinism
/// The build is stable: within one slot's run, positions appear in the order
/// they occur in the forward array (ascending).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransposedIndex {
    /// `l_size + 1` monotone offsets into `indices`.
    offsets: Vec<u32>,
    /// Permutation of `0..forward.len()`, grouped by destination slot.
    indices: Vec<u32>,
}

impl TransposedIndex {
    /// Builds the transposed index of `forward` over an L-vector of
    /// `l_size` slots.
    ///
    /// Callers must have validated `forward` already: every entry in
    /// `[0, l_size)` and `forward.len() <= u32::MAX`.
    ///
    /// # Complexity
    /// `O(forward.len() + l_size)` time, one pass of each phase; no
    /// allocation beyond the two output arrays.
    pub fn build(forward: &[u32], l_size: usize) -> Self {
        let mut offsets = vec![0u32; l_size + 1];
        for &slot in forward {
            offsets[slot as usize + 1] += 1;
        }
        for g in 1..=l_size {
            offsets[g] += offsets[g - 1];
        }
        // Placement turns offsets into write cursors; the shift below
        // restores them.
        let mut indices = vec![0u32; forward.len()];
        for (position, &slot) in forward.iter().enumerate() {
            let cursor = offsets[slot as usize];
            indices[cursor as usize] = position as u32;
            offsets[slot as usize] = cursor + 1;
        }
        for g in (1..=l_size).rev() {
            offsets[g] = offsets[g - 1];
        }
        offsets[0] = 0;
        let built = Self { offsets, indices };
        built.debug_assert_invariants();
        built
    }

    /// Number of L-vector slots covered.
    #[inline]
    pub fn num_slots(&self) -> usize {
        self.offsets.len() - 1
    }

    /// Total number of forward-array positions (the E-side fan-in).
    #[inline]
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    /// Whether no position references any slot.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// The CSR offsets, length `num_slots() + 1`.
    #[inline]
    pub fn offsets(&self) -> &[u32] {
        &self.offsets
    }

    /// Forward-array positions grouped by destination slot.
    #[inline]
    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    /// Range of `indices()` holding the positions that reference slot `g`.
    #[inline]
    pub fn slot_range(&self, g: usize) -> std::ops::Range<usize> {
        self.offsets[g] as usize..self.offsets[g + 1] as usize
    }

    /// Positions referencing slot `g`, in forward-array order.
    #[inline]
    pub fn slot_positions(&self, g: usize) -> &[u32] {
        &self.indices[self.slot_range(g)]
    }
}

impl DebugInvariants for TransposedIndex {
    fn validate_invariants(&self) -> Result<(), RestrictError> {
        if self.offsets.is_empty() {
            return Err(RestrictError::CorruptTransposedIndex(
                "offsets array is empty",
            ));
        }
        if self.offsets.iter().tuple_windows().any(|(a, b)| a > b) {
            return Err(RestrictError::CorruptTransposedIndex(
                "offsets are not monotone nondecreasing",
            ));
        }
        if self.offsets[0] != 0 {
            return Err(RestrictError::CorruptTransposedIndex(
                "offsets do not start at zero",
            ));
        }
        let total = self.indices.len();
        if self.offsets[self.num_slots()] as usize != total {
            return Err(RestrictError::CorruptTransposedIndex(
                "final offset does not match position count",
            ));
        }
        let mut seen = vec![false; total];
        for &position in &self.indices {
            let p = position as usize;
            if p >= total || seen[p] {
                return Err(RestrictError::CorruptTransposedIndex(
                    "positions are not a permutation of the forward array",
                ));
            }
            seen[p] = true;
        }
        Ok(())
    }
}
