//! Host backend: the serial reference implementation.
//!
//! Implements the same six kernel variants as the device backends in plain
//! loops over host memory. It is the behavioral reference the device path
//! is tested against, and the fallback when no GPU exists.

use crate::backend::{Backend, KernelVariant};
use crate::error::RestrictError;
use crate::indices::{IndexArray, StoredIndices, validate_indices};
use crate::layout::ElemLayout;
use crate::request::Request;
use crate::restriction::{Restriction, RestrictionOps, TransposeMode};
use crate::transpose::TransposedIndex;
use crate::vector::{MemType, Scalar, Vector};

/// The built-in `"host"` backend.
#[derive(Debug, Default)]
pub struct HostBackend;

impl HostBackend {
    /// Registered name of this backend.
    pub const NAME: &'static str = "host";

    /// Creates the backend. Stateless; the registry holds one instance.
    pub fn new() -> Self {
        Self
    }
}

impl Backend for HostBackend {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn create(
        &self,
        layout: &ElemLayout,
        mem_type: MemType,
        indices: IndexArray<'_>,
    ) -> Result<Restriction, RestrictError> {
        if mem_type != MemType::Host {
            return Err(RestrictError::UnsupportedIndexMemType {
                backend: Self::NAME,
                found: mem_type,
            });
        }
        if layout.is_strided() {
            return Err(RestrictError::WrongLayoutKind {
                expected: "indexed",
            });
        }
        validate_indices(layout, indices.as_slice())?;
        let stored = indices.into_stored();
        let transposed = TransposedIndex::build(stored.as_slice(), layout.lvector_size());
        log::debug!(
            "host restriction: {} elems x {} nodes x {} comps, L-size {}",
            layout.num_elements(),
            layout.elem_size(),
            layout.num_components(),
            layout.lvector_size(),
        );
        Ok(Restriction::from_ops(Box::new(HostRestriction {
            forward: KernelVariant::select(TransposeMode::NoTranspose, layout),
            transpose: KernelVariant::select(TransposeMode::Transpose, layout),
            layout: layout.clone(),
            state: State::Indexed {
                indices: stored,
                transposed,
            },
        })))
    }

    fn create_strided(&self, layout: &ElemLayout) -> Result<Restriction, RestrictError> {
        if !layout.is_strided() {
            return Err(RestrictError::WrongLayoutKind {
                expected: "strided",
            });
        }
        log::debug!(
            "host strided restriction: {} elems x {} nodes x {} comps",
            layout.num_elements(),
            layout.elem_size(),
            layout.num_components(),
        );
        Ok(Restriction::from_ops(Box::new(HostRestriction {
            forward: KernelVariant::select(TransposeMode::NoTranspose, layout),
            transpose: KernelVariant::select(TransposeMode::Transpose, layout),
            layout: layout.clone(),
            state: State::Strided,
        })))
    }

    fn create_vector(&self, len: usize) -> Result<Vector, RestrictError> {
        Ok(Vector::zeros(len))
    }

    fn vector_from_slice(&self, data: &[Scalar]) -> Result<Vector, RestrictError> {
        Ok(Vector::from_slice(data))
    }
}

/// Per-addressing-scheme kernel inputs of a host restriction.
enum State {
    Indexed {
        indices: StoredIndices,
        transposed: TransposedIndex,
    },
    Strided,
}

struct HostRestriction {
    layout: ElemLayout,
    state: State,
    forward: KernelVariant,
    transpose: KernelVariant,
}

impl RestrictionOps for HostRestriction {
    fn layout(&self) -> &ElemLayout {
        &self.layout
    }

    fn backend_name(&self) -> &'static str {
        HostBackend::NAME
    }

    fn apply(
        &self,
        mode: TransposeMode,
        u: &Vector,
        v: &mut Vector,
        request: &mut Request,
    ) -> Result<(), RestrictError> {
        // A pending deferred submission from an earlier apply is fenced
        // first so program order holds across backends.
        if let Some(prior) = request.take_pending() {
            prior.wait()?;
        }
        let variant = match mode {
            TransposeMode::NoTranspose => self.forward,
            TransposeMode::Transpose => self.transpose,
        };
        log::trace!("host apply {}", variant.entry_point());
        let Some(src) = u.as_slice() else {
            return Err(RestrictError::WrongVectorSpace {
                backend: HostBackend::NAME,
                expected: MemType::Host,
                found: u.mem_type(),
            });
        };
        let Some(dst) = v.as_mut_slice() else {
            return Err(RestrictError::WrongVectorSpace {
                backend: HostBackend::NAME,
                expected: MemType::Host,
                found: MemType::Device,
            });
        };
        match (variant, &self.state) {
            (KernelVariant::GatherSingle, State::Indexed { indices, .. }) => {
                kernels::gather_single(indices.as_slice(), src, dst);
            }
            (KernelVariant::GatherMulti, State::Indexed { indices, .. }) => {
                kernels::gather_multi(&self.layout, indices.as_slice(), src, dst);
            }
            (KernelVariant::ScatterAddSingle, State::Indexed { transposed, .. }) => {
                kernels::scatter_add_single(transposed, src, dst);
            }
            (KernelVariant::ScatterAddMulti, State::Indexed { transposed, .. }) => {
                kernels::scatter_add_multi(&self.layout, transposed, src, dst);
            }
            (KernelVariant::GatherStrided, State::Strided) => {
                kernels::gather_strided(&self.layout, src, dst);
            }
            (KernelVariant::ScatterAddStrided, State::Strided) => {
                kernels::scatter_add_strided(&self.layout, src, dst);
            }
            _ => unreachable!("variant fixed at construction matches the stored state"),
        }
        Ok(())
    }

    fn create_vector(&self, len: usize) -> Result<Vector, RestrictError> {
        Ok(Vector::zeros(len))
    }
}

/// The six kernel bodies, shared formula-for-formula with the device WGSL.
mod kernels {
    use crate::layout::ElemLayout;
    use crate::transpose::TransposedIndex;
    use crate::vector::Scalar;

    pub fn gather_single(ind: &[u32], u: &[Scalar], v: &mut [Scalar]) {
        for (lid, &slot) in ind.iter().enumerate() {
            v[lid] = u[slot as usize];
        }
    }

    pub fn gather_multi(layout: &ElemLayout, ind: &[u32], u: &[Scalar], v: &mut [Scalar]) {
        let es = layout.elem_size();
        let nc = layout.num_components();
        let cs = layout.comp_stride();
        for e in 0..layout.num_elements() {
            for d in 0..nc {
                for i in 0..es {
                    v[i + es * (d + nc * e)] = u[ind[e * es + i] as usize + d * cs];
                }
            }
        }
    }

    pub fn scatter_add_single(t: &TransposedIndex, u: &[Scalar], v: &mut [Scalar]) {
        for (slot, out) in v.iter_mut().enumerate() {
            let mut sum = 0.0;
            for &position in t.slot_positions(slot) {
                sum += u[position as usize];
            }
            *out += sum;
        }
    }

    pub fn scatter_add_multi(
        layout: &ElemLayout,
        t: &TransposedIndex,
        u: &[Scalar],
        v: &mut [Scalar],
    ) {
        let es = layout.elem_size();
        let nc = layout.num_components();
        let cs = layout.comp_stride();
        for slot in 0..t.num_slots() {
            let run = t.slot_positions(slot);
            // Slots nothing references get no write at all; their strided
            // aliases may belong to other slots' components.
            if run.is_empty() {
                continue;
            }
            for d in 0..nc {
                let mut sum = 0.0;
                for &position in run {
                    let lid = position as usize;
                    let (e, i) = (lid / es, lid % es);
                    sum += u[i + es * (d + nc * e)];
                }
                v[slot + d * cs] += sum;
            }
        }
    }

    pub fn gather_strided(layout: &ElemLayout, u: &[Scalar], v: &mut [Scalar]) {
        let es = layout.elem_size();
        let nc = layout.num_components();
        let s = layout.resolved_strides();
        for e in 0..layout.num_elements() {
            for d in 0..nc {
                for i in 0..es {
                    v[i + es * (d + nc * e)] = u[i * s.node + d * s.comp + e * s.elem];
                }
            }
        }
    }

    pub fn scatter_add_strided(layout: &ElemLayout, u: &[Scalar], v: &mut [Scalar]) {
        let es = layout.elem_size();
        let nc = layout.num_components();
        let s = layout.resolved_strides();
        for e in 0..layout.num_elements() {
            for d in 0..nc {
                for i in 0..es {
                    v[i * s.node + d * s.comp + e * s.elem] += u[i + es * (d + nc * e)];
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line_pair() -> Restriction {
        let layout = ElemLayout::indexed(2, 3, 1, 1, 5).unwrap();
        HostBackend::new()
            .create(&layout, MemType::Host, IndexArray::Copied(&[0, 1, 2, 1, 3, 4]))
            .unwrap()
    }

    #[test]
    fn forward_gathers_shared_node_twice() {
        let r = line_pair();
        let u = Vector::from_slice(&[10.0, 20.0, 30.0, 40.0, 50.0]);
        let mut v = Vector::zeros(6);
        r.apply(
            TransposeMode::NoTranspose,
            &u,
            &mut v,
            &mut Request::immediate(),
        )
        .unwrap();
        assert_eq!(v.to_vec().unwrap(), vec![10.0, 20.0, 30.0, 20.0, 40.0, 50.0]);
    }

    #[test]
    fn transpose_accumulates_shared_node() {
        let r = line_pair();
        let u = Vector::from_slice(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        let mut v = Vector::zeros(5);
        r.apply(
            TransposeMode::Transpose,
            &u,
            &mut v,
            &mut Request::immediate(),
        )
        .unwrap();
        assert_eq!(v.to_vec().unwrap(), vec![1.0, 6.0, 3.0, 5.0, 6.0]);
    }

    #[test]
    fn transpose_adds_to_existing_values() {
        let r = line_pair();
        let u = Vector::from_slice(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        let mut v = Vector::from_slice(&[100.0; 5]);
        r.apply(
            TransposeMode::Transpose,
            &u,
            &mut v,
            &mut Request::immediate(),
        )
        .unwrap();
        assert_eq!(
            v.to_vec().unwrap(),
            vec![101.0, 106.0, 103.0, 105.0, 106.0]
        );
    }

    #[test]
    fn size_mismatch_rejected_before_launch() {
        let r = line_pair();
        let u = Vector::zeros(4);
        let mut v = Vector::zeros(6);
        let err = r
            .apply(
                TransposeMode::NoTranspose,
                &u,
                &mut v,
                &mut Request::immediate(),
            )
            .unwrap_err();
        assert_eq!(
            err,
            RestrictError::LVectorSizeMismatch {
                role: "input",
                expected: 5,
                found: 4
            }
        );
    }

    #[test]
    fn blocked_paths_are_unsupported() {
        let backend = HostBackend::new();
        let layout = ElemLayout::indexed(2, 3, 1, 1, 5).unwrap();
        let err = backend
            .create_blocked(&layout, 8, MemType::Host, IndexArray::Copied(&[0; 6]))
            .unwrap_err();
        assert_eq!(
            err,
            RestrictError::Unsupported {
                backend: "host",
                op: "blocked restrictions"
            }
        );
        let r = line_pair();
        let u = Vector::zeros(5);
        let mut v = Vector::zeros(6);
        let err = r
            .apply_blocked(
                8,
                TransposeMode::NoTranspose,
                &u,
                &mut v,
                &mut Request::immediate(),
            )
            .unwrap_err();
        assert_eq!(
            err,
            RestrictError::Unsupported {
                backend: "host",
                op: "blocked restriction apply"
            }
        );
    }

    #[test]
    fn device_index_input_rejected() {
        let backend = HostBackend::new();
        let layout = ElemLayout::indexed(2, 3, 1, 1, 5).unwrap();
        let err = backend
            .create(&layout, MemType::Device, IndexArray::Copied(&[0; 6]))
            .unwrap_err();
        assert_eq!(
            err,
            RestrictError::UnsupportedIndexMemType {
                backend: "host",
                found: MemType::Device
            }
        );
    }

    #[test]
    fn empty_restriction_is_a_no_op() {
        let layout = ElemLayout::indexed(0, 3, 1, 1, 0).unwrap();
        let r = HostBackend::new()
            .create(&layout, MemType::Host, IndexArray::Owned(vec![]))
            .unwrap();
        let u = Vector::zeros(0);
        let mut v = Vector::zeros(0);
        r.apply(
            TransposeMode::NoTranspose,
            &u,
            &mut v,
            &mut Request::immediate(),
        )
        .unwrap();
    }
}
