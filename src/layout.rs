//! Element layout descriptors: the shape of a restriction.
//!
//! An [`ElemLayout`] fixes everything about a restriction except the index
//! data itself: how many elements, how many nodes per element, how many
//! components per node, and how L-vector slots are addressed. Two addressing
//! schemes exist:
//!
//! - **Indexed**: a forward index array maps each element-local node to an
//!   L-vector slot; component `d` of slot `g` lives at `g + d * comp_stride`.
//! - **Strided**: no index array; element `e`, node `i`, component `d` reads
//!   L-slot `i * node + d * comp + e * elem` for a stride triple, either
//!   caller-supplied or the backend default.
//!
//! Layouts are validated at construction and immutable afterwards, so
//! backends can trust every derived extent without rechecking.

use serde::{Deserialize, Serialize};

use crate::debug_invariants::DebugInvariants;
use crate::error::RestrictError;

/// Stride triple addressing L-vector slots of a strided restriction.
///
/// `node` advances between the nodes of one element, `comp` between the
/// components of one node, `elem` between elements.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EStrides {
    /// Stride between consecutive nodes of one element, in scalars.
    pub node: usize,
    /// Stride between consecutive components of one node, in scalars.
    pub comp: usize,
    /// Stride between consecutive elements, in scalars.
    pub elem: usize,
}

impl EStrides {
    /// Creates a stride triple.
    #[inline]
    pub const fn new(node: usize, comp: usize, elem: usize) -> Self {
        Self { node, comp, elem }
    }

    /// The backend-default E-vector layout for a given element shape:
    /// nodes contiguous, then components, then elements.
    #[inline]
    pub const fn e_layout(elem_size: usize, num_comp: usize) -> Self {
        Self {
            node: 1,
            comp: elem_size,
            elem: elem_size * num_comp,
        }
    }

    /// Highest slot addressed by this triple over the given extents, or
    /// `None` when the extents are empty or the arithmetic overflows.
    fn max_addressed(
        &self,
        num_elem: usize,
        elem_size: usize,
        num_comp: usize,
    ) -> Result<Option<usize>, RestrictError> {
        if num_elem == 0 || elem_size == 0 || num_comp == 0 {
            return Ok(None);
        }
        let term = |count: usize, stride: usize| {
            (count - 1)
                .checked_mul(stride)
                .ok_or(RestrictError::LayoutOverflow)
        };
        let max = term(elem_size, self.node)?
            .checked_add(term(num_comp, self.comp)?)
            .and_then(|m| m.checked_add(term(num_elem, self.elem).ok()?))
            .ok_or(RestrictError::LayoutOverflow)?;
        Ok(Some(max))
    }
}

/// How a layout maps element-local nodes to L-vector slots.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
enum Addressing {
    /// Through a forward index array; components offset by `comp_stride`.
    Indexed { comp_stride: usize },
    /// Through a stride triple; `None` requests the backend default.
    Strided { strides: Option<EStrides> },
}

/// Immutable shape descriptor of an element restriction.
///
/// # Determinism
/// All derived extents (`evector_size`, `index_len`, `e_strides`) are pure
/// functions of the constructor arguments.
///
/// # Example
/// ```
/// use elem_restrict::layout::ElemLayout;
///
/// // 2 line elements with 3 nodes each over a 5-node L-vector.
/// let layout = ElemLayout::indexed(2, 3, 1, 1, 5).unwrap();
/// assert_eq!(layout.evector_size(), 6);
/// assert_eq!(layout.index_len(), 6);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElemLayout {
    num_elem: usize,
    elem_size: usize,
    num_comp: usize,
    l_size: usize,
    addressing: Addressing,
}

impl ElemLayout {
    /// Creates the layout of a forward-indexed restriction.
    ///
    /// `l_size` is the full L-vector length in scalars; forward indices
    /// address slots in `[0, l_size)` directly and component `d` of slot `g`
    /// lives at `g + d * comp_stride`.
    ///
    /// # Errors
    /// - [`RestrictError::ZeroComponents`] if `num_comp == 0`;
    /// - [`RestrictError::InvalidCompStride`] if `num_comp > 1` and
    ///   `comp_stride == 0`;
    /// - [`RestrictError::LayoutOverflow`] if any derived extent overflows.
    pub fn indexed(
        num_elem: usize,
        elem_size: usize,
        num_comp: usize,
        comp_stride: usize,
        l_size: usize,
    ) -> Result<Self, RestrictError> {
        let layout = Self {
            num_elem,
            elem_size,
            num_comp,
            l_size,
            addressing: Addressing::Indexed { comp_stride },
        };
        layout.validate_invariants()?;
        Ok(layout)
    }

    /// Creates the layout of a strided restriction.
    ///
    /// `strides = None` requests the backend-default E-layout
    /// (`{1, elem_size, elem_size * num_comp}`). Caller strides are checked
    /// against `l_size` so no apply can address out of bounds, and must map
    /// every `(node, comp, elem)` position to a distinct L-slot: transpose
    /// kernels parallelize over elements and rely on disjoint destinations
    /// for their race-free read-modify-write.
    ///
    /// # Errors
    /// - [`RestrictError::ZeroComponents`] if `num_comp == 0`;
    /// - [`RestrictError::StridesOutOfBounds`] if the highest addressed slot
    ///   reaches past `l_size`;
    /// - [`RestrictError::StridesAlias`] if two positions share an L-slot;
    /// - [`RestrictError::LayoutOverflow`] if any derived extent overflows.
    pub fn strided(
        num_elem: usize,
        elem_size: usize,
        num_comp: usize,
        l_size: usize,
        strides: Option<EStrides>,
    ) -> Result<Self, RestrictError> {
        let layout = Self {
            num_elem,
            elem_size,
            num_comp,
            l_size,
            addressing: Addressing::Strided { strides },
        };
        layout.validate_invariants()?;
        Ok(layout)
    }

    /// Number of elements.
    #[inline]
    pub fn num_elements(&self) -> usize {
        self.num_elem
    }

    /// Nodes per element.
    #[inline]
    pub fn elem_size(&self) -> usize {
        self.elem_size
    }

    /// Components per node.
    #[inline]
    pub fn num_components(&self) -> usize {
        self.num_comp
    }

    /// L-vector length in scalars.
    #[inline]
    pub fn lvector_size(&self) -> usize {
        self.l_size
    }

    /// E-vector length in scalars: `num_elem * elem_size * num_comp`.
    #[inline]
    pub fn evector_size(&self) -> usize {
        self.num_elem * self.elem_size * self.num_comp
    }

    /// Length of the forward index array: `num_elem * elem_size`.
    #[inline]
    pub fn index_len(&self) -> usize {
        self.num_elem * self.elem_size
    }

    /// Whether this layout addresses the L-vector through strides.
    #[inline]
    pub fn is_strided(&self) -> bool {
        matches!(self.addressing, Addressing::Strided { .. })
    }

    /// Component stride of an indexed layout; `1` for strided layouts.
    #[inline]
    pub fn comp_stride(&self) -> usize {
        match self.addressing {
            Addressing::Indexed { comp_stride } => comp_stride,
            Addressing::Strided { .. } => 1,
        }
    }

    /// Caller-supplied strides, if this is a strided layout with them.
    #[inline]
    pub fn strides(&self) -> Option<EStrides> {
        match self.addressing {
            Addressing::Indexed { .. } => None,
            Addressing::Strided { strides } => strides,
        }
    }

    /// The E-vector's own memory layout (always the backend default).
    #[inline]
    pub fn e_strides(&self) -> EStrides {
        EStrides::e_layout(self.elem_size, self.num_comp)
    }

    /// Strides used for L-vector addressing of a strided layout: the
    /// caller's triple or the backend default.
    #[inline]
    pub fn resolved_strides(&self) -> EStrides {
        match self.addressing {
            Addressing::Strided {
                strides: Some(strides),
            } => strides,
            _ => self.e_strides(),
        }
    }
}

impl DebugInvariants for ElemLayout {
    fn validate_invariants(&self) -> Result<(), RestrictError> {
        if self.num_comp == 0 {
            return Err(RestrictError::ZeroComponents);
        }
        self.num_elem
            .checked_mul(self.elem_size)
            .and_then(|n| n.checked_mul(self.num_comp))
            .ok_or(RestrictError::LayoutOverflow)?;
        match self.addressing {
            Addressing::Indexed { comp_stride } => {
                if self.num_comp > 1 && comp_stride == 0 {
                    return Err(RestrictError::InvalidCompStride {
                        comp_stride,
                        num_comp: self.num_comp,
                        max_addressed: 0,
                        l_size: self.l_size,
                    });
                }
            }
            Addressing::Strided { strides } => {
                let resolved = self.resolved_strides();
                if let Some(max) =
                    resolved.max_addressed(self.num_elem, self.elem_size, self.num_comp)?
                {
                    if max >= self.l_size {
                        return Err(RestrictError::StridesOutOfBounds {
                            max_addressed: max,
                            l_size: self.l_size,
                        });
                    }
                    // The backend-default triple is bijective by shape;
                    // caller triples must be proven injective so the
                    // transpose read-modify-write stays race-free.
                    if strides.is_some() {
                        let mut touched = vec![false; self.l_size];
                        for e in 0..self.num_elem {
                            for d in 0..self.num_comp {
                                for i in 0..self.elem_size {
                                    let slot =
                                        i * resolved.node + d * resolved.comp + e * resolved.elem;
                                    if touched[slot] {
                                        return Err(RestrictError::StridesAlias { slot });
                                    }
                                    touched[slot] = true;
                                }
                            }
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indexed_layout_extents() {
        let layout = ElemLayout::indexed(4, 3, 2, 10, 20).unwrap();
        assert_eq!(layout.num_elements(), 4);
        assert_eq!(layout.elem_size(), 3);
        assert_eq!(layout.num_components(), 2);
        assert_eq!(layout.comp_stride(), 10);
        assert_eq!(layout.lvector_size(), 20);
        assert_eq!(layout.evector_size(), 24);
        assert_eq!(layout.index_len(), 12);
        assert!(!layout.is_strided());
        assert_eq!(layout.e_strides(), EStrides::new(1, 3, 6));
    }

    #[test]
    fn zero_components_rejected() {
        assert_eq!(
            ElemLayout::indexed(1, 2, 0, 1, 4),
            Err(RestrictError::ZeroComponents)
        );
    }

    #[test]
    fn zero_comp_stride_rejected_for_multi() {
        let err = ElemLayout::indexed(1, 2, 3, 0, 12).unwrap_err();
        assert!(matches!(err, RestrictError::InvalidCompStride { .. }));
    }

    #[test]
    fn single_component_ignores_comp_stride() {
        assert!(ElemLayout::indexed(1, 2, 1, 0, 4).is_ok());
    }

    #[test]
    fn strided_default_needs_full_lvector() {
        // Backend-default strides make L and E the same length.
        assert!(ElemLayout::strided(2, 3, 2, 12, None).is_ok());
        let err = ElemLayout::strided(2, 3, 2, 11, None).unwrap_err();
        assert_eq!(
            err,
            RestrictError::StridesOutOfBounds {
                max_addressed: 11,
                l_size: 11
            }
        );
    }

    #[test]
    fn caller_strides_bounds_checked() {
        let strides = EStrides::new(1, 0, 3);
        // max slot = (3-1)*1 + 0 + (2-1)*3 = 5
        assert!(ElemLayout::strided(2, 3, 1, 6, Some(strides)).is_ok());
        assert!(ElemLayout::strided(2, 3, 1, 5, Some(strides)).is_err());
    }

    #[test]
    fn aliasing_caller_strides_rejected() {
        // Zero comp and elem strides park every element on slots 0..3.
        let err = ElemLayout::strided(2, 3, 1, 3, Some(EStrides::new(1, 0, 0))).unwrap_err();
        assert_eq!(err, RestrictError::StridesAlias { slot: 0 });
        // Overlapping windows alias even with all strides nonzero.
        let err = ElemLayout::strided(2, 3, 1, 6, Some(EStrides::new(1, 1, 1))).unwrap_err();
        assert_eq!(err, RestrictError::StridesAlias { slot: 1 });
    }

    #[test]
    fn empty_layouts_are_legal() {
        let layout = ElemLayout::indexed(0, 3, 1, 1, 0).unwrap();
        assert_eq!(layout.evector_size(), 0);
        let layout = ElemLayout::strided(0, 3, 2, 0, None).unwrap();
        assert_eq!(layout.evector_size(), 0);
    }

    #[test]
    fn resolved_strides_prefers_caller_triple() {
        let strides = EStrides::new(2, 1, 8);
        let layout = ElemLayout::strided(2, 3, 1, 16, Some(strides)).unwrap();
        assert_eq!(layout.resolved_strides(), strides);
        let layout = ElemLayout::strided(2, 3, 1, 6, None).unwrap();
        assert_eq!(layout.resolved_strides(), layout.e_strides());
    }

    #[test]
    fn serde_round_trip() {
        let layout = ElemLayout::strided(2, 3, 2, 12, Some(EStrides::new(1, 6, 3))).unwrap();
        let json = serde_json::to_string(&layout).unwrap();
        let back: ElemLayout = serde_json::from_str(&json).unwrap();
        assert_eq!(back, layout);
    }
}
