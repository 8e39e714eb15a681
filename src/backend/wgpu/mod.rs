//! GPU backend on top of `wgpu`.
//!
//! One [`WgpuContext`] owns a device and queue; restrictions built on the
//! same context share its submission order and allocation counters. The
//! backend itself brings the context up lazily, so resolving `"wgpu"` from
//! the registry never touches the GPU until a restriction or vector is
//! actually created.

pub(crate) mod buffers;
mod context;
mod kernels;
mod restriction;

pub use context::WgpuContext;

use std::sync::Arc;

use once_cell::sync::OnceCell;

use crate::backend::Backend;
use crate::backend::wgpu::buffers::DeviceVector;
use crate::backend::wgpu::restriction::WgpuRestriction;
use crate::error::RestrictError;
use crate::indices::{IndexArray, validate_indices};
use crate::layout::ElemLayout;
use crate::restriction::Restriction;
use crate::transpose::TransposedIndex;
use crate::vector::{MemType, Scalar, Vector};

/// The built-in `"wgpu"` backend.
#[derive(Debug, Default)]
pub struct WgpuBackend {
    ctx: OnceCell<Arc<WgpuContext>>,
}

impl WgpuBackend {
    /// Registered name of this backend.
    pub const NAME: &'static str = "wgpu";

    /// Creates the backend without touching the GPU.
    pub fn new() -> Self {
        Self {
            ctx: OnceCell::new(),
        }
    }

    /// Creates a backend bound to an existing device context.
    pub fn with_context(ctx: Arc<WgpuContext>) -> Self {
        let cell = OnceCell::new();
        let _ = cell.set(ctx);
        Self { ctx: cell }
    }

    /// The device context, bringing it up on first use.
    ///
    /// # Errors
    /// [`RestrictError::NoAdapter`] / [`RestrictError::DeviceInit`] when
    /// bring-up fails; the failure repeats on every call rather than being
    /// cached, so a later probe can still succeed.
    pub fn context(&self) -> Result<Arc<WgpuContext>, RestrictError> {
        self.ctx
            .get_or_try_init(|| WgpuContext::new().map(Arc::new))
            .map(Arc::clone)
    }
}

impl Backend for WgpuBackend {
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
        let ctx = self.context()?;
        let transposed = TransposedIndex::build(indices.as_slice(), layout.lvector_size());
        log::debug!(
            "wgpu restriction: {} elems x {} nodes x {} comps, L-size {}",
            layout.num_elements(),
            layout.elem_size(),
            layout.num_components(),
            layout.lvector_size(),
        );
        let ops = WgpuRestriction::indexed(ctx, layout.clone(), indices.as_slice(), &transposed)?;
        // The host copy (owned or shared) drops here; the device mirrors are
        // the only storage the handle keeps.
        drop(indices);
        Ok(Restriction::from_ops(Box::new(ops)))
    }

    fn create_strided(&self, layout: &ElemLayout) -> Result<Restriction, RestrictError> {
        if !layout.is_strided() {
            return Err(RestrictError::WrongLayoutKind {
                expected: "strided",
            });
        }
        let ctx = self.context()?;
        log::debug!(
            "wgpu strided restriction: {} elems x {} nodes x {} comps",
            layout.num_elements(),
            layout.elem_size(),
            layout.num_components(),
        );
        let ops = WgpuRestriction::strided(ctx, layout.clone())?;
        Ok(Restriction::from_ops(Box::new(ops)))
    }

    fn create_vector(&self, len: usize) -> Result<Vector, RestrictError> {
        let ctx = self.context()?;
        Ok(Vector::from_device(DeviceVector::zeroed(ctx, len)?))
    }

    fn vector_from_slice(&self, data: &[Scalar]) -> Result<Vector, RestrictError> {
        let ctx = self.context()?;
        Ok(Vector::from_device(DeviceVector::from_slice(ctx, data)?))
    }
}
