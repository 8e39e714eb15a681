//! Forward index arrays and the ownership decision made at construction.
//!
//! A restriction is created from a caller-supplied forward index array. The
//! caller states up front what may happen to that storage via [`IndexArray`]:
//! copy it, hand it over, or share it reference-counted. Construction resolves
//! the choice into a single [`StoredIndices`] on the handle; device backends
//! drop host storage they own once the data is uploaded.

use std::sync::Arc;

use crate::error::RestrictError;
use crate::layout::ElemLayout;

/// A forward index array together with its ownership contract.
///
/// Entries map element-local nodes to L-vector slots: position
/// `e * elem_size + i` holds the slot of node `i` of element `e`.
#[derive(Debug, Clone)]
pub enum IndexArray<'a> {
    /// Copy the slice; the caller keeps its storage.
    Copied(&'a [u32]),
    /// Move the vector into the restriction.
    Owned(Vec<u32>),
    /// Share reference-counted storage without copying.
    Shared(Arc<[u32]>),
}

impl IndexArray<'_> {
    /// View of the index entries regardless of ownership.
    #[inline]
    pub fn as_slice(&self) -> &[u32] {
        match self {
            IndexArray::Copied(s) => s,
            IndexArray::Owned(v) => v,
            IndexArray::Shared(a) => a,
        }
    }

    /// Resolve the ownership decision into storage held by the handle.
    pub(crate) fn into_stored(self) -> StoredIndices {
        match self {
            IndexArray::Copied(s) => StoredIndices::Owned(s.to_vec()),
            IndexArray::Owned(v) => StoredIndices::Owned(v),
            IndexArray::Shared(a) => StoredIndices::Shared(a),
        }
    }
}

impl<'a> From<&'a [u32]> for IndexArray<'a> {
    fn from(s: &'a [u32]) -> Self {
        IndexArray::Copied(s)
    }
}

impl From<Vec<u32>> for IndexArray<'_> {
    fn from(v: Vec<u32>) -> Self {
        IndexArray::Owned(v)
    }
}

impl From<Arc<[u32]>> for IndexArray<'_> {
    fn from(a: Arc<[u32]>) -> Self {
        IndexArray::Shared(a)
    }
}

/// Index storage resolved from [`IndexArray`], owned by a restriction handle.
#[derive(Debug, Clone)]
pub(crate) enum StoredIndices {
    Owned(Vec<u32>),
    Shared(Arc<[u32]>),
}

impl StoredIndices {
    #[inline]
    pub(crate) fn as_slice(&self) -> &[u32] {
        match self {
            StoredIndices::Owned(v) => v,
            StoredIndices::Shared(a) => a,
        }
    }
}

/// Validates a forward index array against an indexed layout.
///
/// Checks, in order: the entry count is `num_elem * elem_size`; every entry
/// addresses inside the L-vector; with multiple components, the highest slot
/// reached through the component stride stays inside the L-vector; and the
/// array is small enough for `u32` transposed-index storage.
///
/// # Errors
/// [`RestrictError::IndexCountMismatch`], [`RestrictError::IndexOutOfRange`]
/// (with the offending position), [`RestrictError::InvalidCompStride`], or
/// [`RestrictError::LayoutOverflow`].
pub(crate) fn validate_indices(
    layout: &ElemLayout,
    indices: &[u32],
) -> Result<(), RestrictError> {
    let expected = layout.index_len();
    if indices.len() != expected {
        return Err(RestrictError::IndexCountMismatch {
            expected,
            found: indices.len(),
        });
    }
    if indices.len() > u32::MAX as usize {
        return Err(RestrictError::LayoutOverflow);
    }
    let l_size = layout.lvector_size();
    let mut max_index = 0u32;
    for (position, &index) in indices.iter().enumerate() {
        if (index as usize) >= l_size {
            return Err(RestrictError::IndexOutOfRange {
                position,
                index,
                l_size,
            });
        }
        max_index = max_index.max(index);
    }
    let num_comp = layout.num_components();
    if num_comp > 1 && !indices.is_empty() {
        let comp_stride = layout.comp_stride();
        let max_addressed = (max_index as usize)
            .checked_add(
                (num_comp - 1)
                    .checked_mul(comp_stride)
                    .ok_or(RestrictError::LayoutOverflow)?,
            )
            .ok_or(RestrictError::LayoutOverflow)?;
        if max_addressed >= l_size {
            return Err(RestrictError::InvalidCompStride {
                comp_stride,
                num_comp,
                max_addressed,
                l_size,
            });
        }
    }
    Ok(())
}
