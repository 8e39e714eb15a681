//! Restriction operator handles.
//!
//! A [`Restriction`] maps between the two vector shapes of an element-wise
//! computation: the L-vector (assembled, each shared node stored once) and
//! the E-vector (element-local, shared nodes duplicated per element).
//! Forward application gathers L into E, overwriting every output slot;
//! transpose application scatters E back into L, *accumulating* into the
//! caller's data so duplicated nodes sum their contributions.
//!
//! Handles are backend-made (see [`crate::backend`]) and carry their kernel
//! state; this module holds the backend-independent surface: shape
//! accessors, pre-launch dimension checks, and the derived helpers
//! (vector creation, multiplicity).

use serde::{Deserialize, Serialize};

use crate::error::RestrictError;
use crate::layout::{ElemLayout, EStrides};
use crate::request::Request;
use crate::vector::Vector;

/// Direction of an apply.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransposeMode {
    /// Gather L-vector to E-vector, overwriting the output.
    NoTranspose,
    /// Scatter E-vector to L-vector, accumulating into the output.
    Transpose,
}

/// Backend-facing operator interface behind a [`Restriction`] handle.
pub trait RestrictionOps: Send + Sync {
    /// The shape this operator was built for.
    fn layout(&self) -> &ElemLayout;

    /// Registered name of the backend that built this operator.
    fn backend_name(&self) -> &'static str;

    /// Runs one restriction; dimensions were validated by the handle.
    fn apply(
        &self,
        mode: TransposeMode,
        u: &Vector,
        v: &mut Vector,
        request: &mut Request,
    ) -> Result<(), RestrictError>;

    /// Blocked apply; no provided backend implements it.
    fn apply_blocked(
        &self,
        block_size: usize,
        mode: TransposeMode,
        u: &Vector,
        v: &mut Vector,
        request: &mut Request,
    ) -> Result<(), RestrictError> {
        let _ = (block_size, mode, u, v, request);
        Err(RestrictError::Unsupported {
            backend: self.backend_name(),
            op: "blocked restriction apply",
        })
    }

    /// A vector of length `len` in this operator's memory space.
    fn create_vector(&self, len: usize) -> Result<Vector, RestrictError>;
}

/// An element restriction operator bound to one backend.
///
/// Dropping the handle releases everything it owns, including device
/// buffers, exactly once.
pub struct Restriction {
    ops: Box<dyn RestrictionOps>,
}

impl Restriction {
    pub(crate) fn from_ops(ops: Box<dyn RestrictionOps>) -> Self {
        Self { ops }
    }

    /// The shape this restriction was built for.
    #[inline]
    pub fn layout(&self) -> &ElemLayout {
        self.ops.layout()
    }

    /// Registered name of the backend that built this restriction.
    #[inline]
    pub fn backend_name(&self) -> &'static str {
        self.ops.backend_name()
    }

    /// Number of elements.
    #[inline]
    pub fn num_elements(&self) -> usize {
        self.layout().num_elements()
    }

    /// Nodes per element.
    #[inline]
    pub fn elem_size(&self) -> usize {
        self.layout().elem_size()
    }

    /// Components per node.
    #[inline]
    pub fn num_components(&self) -> usize {
        self.layout().num_components()
    }

    /// Component stride of the L-vector addressing.
    #[inline]
    pub fn comp_stride(&self) -> usize {
        self.layout().comp_stride()
    }

    /// L-vector length in scalars.
    #[inline]
    pub fn lvector_size(&self) -> usize {
        self.layout().lvector_size()
    }

    /// E-vector length in scalars.
    #[inline]
    pub fn evector_size(&self) -> usize {
        self.layout().evector_size()
    }

    /// The E-vector's memory layout.
    #[inline]
    pub fn e_strides(&self) -> EStrides {
        self.layout().e_strides()
    }

    /// Applies the restriction.
    ///
    /// Forward mode reads an L-vector `u` and overwrites an E-vector `v`;
    /// transpose mode reads an E-vector `u` and accumulates into an
    /// L-vector `v` (initialize `v` first). `request` states when
    /// completion is observed; see [`Request`].
    ///
    /// # Errors
    /// Size mismatches are rejected before any kernel launch
    /// ([`RestrictError::LVectorSizeMismatch`] /
    /// [`RestrictError::EVectorSizeMismatch`]); backends additionally
    /// reject vectors from the wrong memory space.
    pub fn apply(
        &self,
        mode: TransposeMode,
        u: &Vector,
        v: &mut Vector,
        request: &mut Request,
    ) -> Result<(), RestrictError> {
        self.check_shapes(mode, u.len(), v.len())?;
        self.ops.apply(mode, u, v, request)
    }

    /// Applies a blocked restriction. Always unsupported on the provided
    /// backends; the arguments are not inspected first.
    pub fn apply_blocked(
        &self,
        block_size: usize,
        mode: TransposeMode,
        u: &Vector,
        v: &mut Vector,
        request: &mut Request,
    ) -> Result<(), RestrictError> {
        self.ops.apply_blocked(block_size, mode, u, v, request)
    }

    /// A zero-filled L-vector in this restriction's memory space.
    pub fn create_lvector(&self) -> Result<Vector, RestrictError> {
        self.ops.create_vector(self.lvector_size())
    }

    /// A zero-filled E-vector in this restriction's memory space.
    pub fn create_evector(&self) -> Result<Vector, RestrictError> {
        self.ops.create_vector(self.evector_size())
    }

    /// Both working vectors of this restriction, L first.
    pub fn create_vectors(&self) -> Result<(Vector, Vector), RestrictError> {
        Ok((self.create_lvector()?, self.create_evector()?))
    }

    /// Writes into `mult` how many element nodes reference each L-slot.
    ///
    /// `mult` must be an L-sized vector in this restriction's memory space;
    /// it is zeroed first, then the transpose of an all-ones E-vector is
    /// accumulated into it.
    pub fn multiplicity(&self, mult: &mut Vector) -> Result<(), RestrictError> {
        if mult.len() != self.lvector_size() {
            return Err(RestrictError::LVectorSizeMismatch {
                role: "output",
                expected: self.lvector_size(),
                found: mult.len(),
            });
        }
        let mut ones = self.create_evector()?;
        ones.set_value(1.0)?;
        mult.set_value(0.0)?;
        self.apply(
            TransposeMode::Transpose,
            &ones,
            mult,
            &mut Request::immediate(),
        )
    }

    fn check_shapes(
        &self,
        mode: TransposeMode,
        u_len: usize,
        v_len: usize,
    ) -> Result<(), RestrictError> {
        let l_size = self.lvector_size();
        let e_size = self.evector_size();
        match mode {
            TransposeMode::NoTranspose => {
                if u_len != l_size {
                    return Err(RestrictError::LVectorSizeMismatch {
                        role: "input",
                        expected: l_size,
                        found: u_len,
                    });
                }
                if v_len != e_size {
                    return Err(RestrictError::EVectorSizeMismatch {
                        role: "output",
                        expected: e_size,
                        found: v_len,
                    });
                }
            }
            TransposeMode::Transpose => {
                if u_len != e_size {
                    return Err(RestrictError::EVectorSizeMismatch {
                        role: "input",
                        expected: e_size,
                        found: u_len,
                    });
                }
                if v_len != l_size {
                    return Err(RestrictError::LVectorSizeMismatch {
                        role: "output",
                        expected: l_size,
                        found: v_len,
                    });
                }
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for Restriction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Restriction")
            .field("backend", &self.backend_name())
            .field("layout", self.layout())
            .finish()
    }
}
