#![cfg_attr(docsrs, feature(doc_cfg))]
//! # elem-restrict
//!
//! elem-restrict is the element-restriction layer of a high-order finite
//! element stack: the operators that move degrees of freedom between the
//! assembled **L-vector** (one entry per global node) and the element-local
//! **E-vector** (shared nodes duplicated per element), with pluggable compute
//! backends behind one dispatch surface.
//!
//! ## Features
//! - Forward restriction (gather L→E) and transpose restriction
//!   (scatter-accumulate E→L) over indexed or purely strided layouts
//! - A host-side CSR transpose of the forward index so transpose-mode
//!   accumulation is race-free under device parallelism
//! - Six specialized kernel variants selected once at construction
//! - A serial `host` backend and a `wgpu` compute backend (default feature)
//!   compiled from one WGSL module with shape constants baked in
//! - A process-wide, name-keyed backend registry for external backends
//!
//! ## Semantics in one example
//! ```
//! use elem_restrict::prelude::*;
//!
//! // Two line elements [0,1,2] and [1,3,4] over a 5-node L-vector.
//! let layout = ElemLayout::indexed(2, 3, 1, 1, 5)?;
//! let backend = elem_restrict::backend::resolve("host")?;
//! let r = backend.create(&layout, MemType::Host, IndexArray::Copied(&[0, 1, 2, 1, 3, 4]))?;
//!
//! let u = Vector::from_slice(&[10.0, 20.0, 30.0, 40.0, 50.0]);
//! let mut v = r.create_evector()?;
//! r.apply(TransposeMode::NoTranspose, &u, &mut v, &mut Request::immediate())?;
//! // Shared node 1 is duplicated into both elements:
//! assert_eq!(v.to_vec()?, vec![10.0, 20.0, 30.0, 20.0, 40.0, 50.0]);
//!
//! // The transpose accumulates duplicated contributions back:
//! let e = Vector::from_slice(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
//! let mut l = r.create_lvector()?;
//! r.apply(TransposeMode::Transpose, &e, &mut l, &mut Request::immediate())?;
//! assert_eq!(l.to_vec()?, vec![1.0, 6.0, 3.0, 5.0, 6.0]);
//! # Ok::<(), elem_restrict::RestrictError>(())
//! ```
//!
//! ## Determinism
//! Construction is pure and host-side; the transposed index build is a
//! stable counting sort, so identical inputs always produce identical
//! structures. Kernels decompose work so that every output slot has exactly
//! one writer, which keeps device results independent of scheduling.
//!
//! ## Blocked restrictions
//! Blocked (element-batched) creation and apply are deliberately
//! unsupported on both provided backends and fail fast with
//! [`RestrictError::Unsupported`] rather than computing partial results.

pub mod backend;
pub mod debug_invariants;
pub mod error;
pub mod indices;
pub mod layout;
pub mod request;
pub mod restriction;
pub mod transpose;
pub mod vector;

pub use debug_invariants::DebugInvariants;
pub use error::RestrictError;

/// A convenient prelude to import the most-used traits & types:
pub mod prelude {
    pub use crate::backend::{Backend, KernelVariant};
    pub use crate::debug_invariants::DebugInvariants;
    pub use crate::error::RestrictError;
    pub use crate::indices::IndexArray;
    pub use crate::layout::{ElemLayout, EStrides};
    pub use crate::request::Request;
    pub use crate::restriction::{Restriction, TransposeMode};
    pub use crate::transpose::TransposedIndex;
    pub use crate::vector::{MemType, Scalar, Vector};
}
