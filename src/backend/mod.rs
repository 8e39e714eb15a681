//! Compute backends and the kernel variant they dispatch.
//!
//! A [`Backend`] turns layouts and index arrays into [`Restriction`]
//! handles. Two implementations ship with the crate: [`host::HostBackend`],
//! the serial reference path, and (behind the `wgpu` feature)
//! [`wgpu::WgpuBackend`], which compiles specialized compute kernels.
//! Backends are looked up by name through the [`registry`].

pub mod host;
mod registry;
#[cfg(feature = "wgpu")]
pub mod wgpu;

pub use registry::{backend_names, register, resolve};

use crate::error::RestrictError;
use crate::indices::IndexArray;
use crate::layout::ElemLayout;
use crate::restriction::{Restriction, TransposeMode};
use crate::vector::{MemType, Scalar, Vector};

/// One of the six restriction kernels, keyed by direction, component
/// arity, and addressing scheme.
///
/// Both backends resolve their forward and transpose variants once at
/// construction and dispatch in O(1) per apply.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum KernelVariant {
    /// Forward gather, one component, indexed.
    GatherSingle,
    /// Forward gather, multiple components, indexed.
    GatherMulti,
    /// Transpose scatter-add, one component, indexed.
    ScatterAddSingle,
    /// Transpose scatter-add, multiple components, indexed.
    ScatterAddMulti,
    /// Forward gather through strides.
    GatherStrided,
    /// Transpose scatter-add through strides.
    ScatterAddStrided,
}

impl KernelVariant {
    /// All variants, in pipeline-table order.
    pub const ALL: [KernelVariant; 6] = [
        KernelVariant::GatherSingle,
        KernelVariant::GatherMulti,
        KernelVariant::ScatterAddSingle,
        KernelVariant::ScatterAddMulti,
        KernelVariant::GatherStrided,
        KernelVariant::ScatterAddStrided,
    ];

    /// Selects the variant an apply in `mode` uses for `layout`.
    pub fn select(mode: TransposeMode, layout: &ElemLayout) -> Self {
        match (mode, layout.is_strided(), layout.num_components()) {
            (TransposeMode::NoTranspose, true, _) => KernelVariant::GatherStrided,
            (TransposeMode::Transpose, true, _) => KernelVariant::ScatterAddStrided,
            (TransposeMode::NoTranspose, false, 1) => KernelVariant::GatherSingle,
            (TransposeMode::NoTranspose, false, _) => KernelVariant::GatherMulti,
            (TransposeMode::Transpose, false, 1) => KernelVariant::ScatterAddSingle,
            (TransposeMode::Transpose, false, _) => KernelVariant::ScatterAddMulti,
        }
    }

    /// Position in [`KernelVariant::ALL`] (and in the pipeline table).
    #[inline]
    pub const fn index(self) -> usize {
        match self {
            KernelVariant::GatherSingle => 0,
            KernelVariant::GatherMulti => 1,
            KernelVariant::ScatterAddSingle => 2,
            KernelVariant::ScatterAddMulti => 3,
            KernelVariant::GatherStrided => 4,
            KernelVariant::ScatterAddStrided => 5,
        }
    }

    /// Name of the compute entry point implementing this variant.
    #[inline]
    pub const fn entry_point(self) -> &'static str {
        match self {
            KernelVariant::GatherSingle => "restrict_gather_single",
            KernelVariant::GatherMulti => "restrict_gather_multi",
            KernelVariant::ScatterAddSingle => "restrict_scatter_add_single",
            KernelVariant::ScatterAddMulti => "restrict_scatter_add_multi",
            KernelVariant::GatherStrided => "restrict_gather_strided",
            KernelVariant::ScatterAddStrided => "restrict_scatter_add_strided",
        }
    }

    /// Whether this variant accumulates rather than overwrites.
    #[inline]
    pub const fn is_scatter_add(self) -> bool {
        matches!(
            self,
            KernelVariant::ScatterAddSingle
                | KernelVariant::ScatterAddMulti
                | KernelVariant::ScatterAddStrided
        )
    }
}

/// A compute backend that builds restriction operators.
///
/// Implementations are registered under a unique name (see [`register`])
/// and shared behind `Arc<dyn Backend>`.
pub trait Backend: Send + Sync + std::fmt::Debug {
    /// Unique registered name.
    fn name(&self) -> &'static str;

    /// Builds an indexed restriction from a host forward index array.
    ///
    /// Only `MemType::Host` index input is accepted; the ownership decision
    /// travels in the [`IndexArray`] and is resolved here.
    fn create(
        &self,
        layout: &ElemLayout,
        mem_type: MemType,
        indices: IndexArray<'_>,
    ) -> Result<Restriction, RestrictError>;

    /// Builds a strided restriction; the layout carries the stride triple
    /// (or requests backend defaults).
    fn create_strided(&self, layout: &ElemLayout) -> Result<Restriction, RestrictError>;

    /// Builds a blocked restriction. No provided backend implements
    /// blocked restrictions; the default returns the canonical error.
    fn create_blocked(
        &self,
        layout: &ElemLayout,
        block_size: usize,
        mem_type: MemType,
        indices: IndexArray<'_>,
    ) -> Result<Restriction, RestrictError> {
        let _ = (layout, block_size, mem_type, indices);
        Err(RestrictError::Unsupported {
            backend: self.name(),
            op: "blocked restrictions",
        })
    }

    /// A zero-filled vector of length `len` in this backend's memory space.
    fn create_vector(&self, len: usize) -> Result<Vector, RestrictError>;

    /// A vector holding `data`, uploaded if this backend is device-resident.
    fn vector_from_slice(&self, data: &[Scalar]) -> Result<Vector, RestrictError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variant_selection_covers_the_table() {
        let single = ElemLayout::indexed(2, 3, 1, 1, 5).unwrap();
        let multi = ElemLayout::indexed(2, 3, 2, 10, 20).unwrap();
        let strided = ElemLayout::strided(2, 3, 2, 12, None).unwrap();
        use TransposeMode::*;
        assert_eq!(
            KernelVariant::select(NoTranspose, &single),
            KernelVariant::GatherSingle
        );
        assert_eq!(
            KernelVariant::select(Transpose, &single),
            KernelVariant::ScatterAddSingle
        );
        assert_eq!(
            KernelVariant::select(NoTranspose, &multi),
            KernelVariant::GatherMulti
        );
        assert_eq!(
            KernelVariant::select(Transpose, &multi),
            KernelVariant::ScatterAddMulti
        );
        assert_eq!(
            KernelVariant::select(NoTranspose, &strided),
            KernelVariant::GatherStrided
        );
        assert_eq!(
            KernelVariant::select(Transpose, &strided),
            KernelVariant::ScatterAddStrided
        );
    }

    #[test]
    fn indices_match_table_order() {
        for (i, v) in KernelVariant::ALL.iter().enumerate() {
            assert_eq!(v.index(), i);
        }
    }
}
