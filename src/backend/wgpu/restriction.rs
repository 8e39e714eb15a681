//! The device-resident restriction operator.
//!
//! Construction uploads the index mirrors and compiles the kernel set;
//! apply encodes one compute pass, binds the buffers the selected variant
//! actually reads, and submits. Completion is observed per the caller's
//! [`Request`]: immediate waits on the submission, ordered relies on queue
//! order, deferred hands the submission index back as a waitable.

use std::sync::Arc;

use crate::backend::KernelVariant;
use crate::backend::wgpu::WgpuBackend;
use crate::backend::wgpu::buffers::{DeviceArray, DeviceVector};
use crate::backend::wgpu::context::WgpuContext;
use crate::backend::wgpu::kernels::KernelSet;
use crate::error::RestrictError;
use crate::layout::ElemLayout;
use crate::request::{Mode, Request, Waitable};
use crate::restriction::{RestrictionOps, TransposeMode};
use crate::transpose::TransposedIndex;
use crate::vector::{MemType, Vector};

/// Device mirrors of the per-addressing-scheme kernel inputs.
enum State {
    Indexed {
        fwd_indices: DeviceArray<u32>,
        t_offsets: DeviceArray<u32>,
        t_indices: DeviceArray<u32>,
    },
    Strided,
}

pub(crate) struct WgpuRestriction {
    ctx: Arc<WgpuContext>,
    layout: ElemLayout,
    kernels: KernelSet,
    state: State,
    forward: KernelVariant,
    transpose: KernelVariant,
}

impl WgpuRestriction {
    /// Uploads the forward and transposed index arrays and compiles the
    /// kernel set. Any failure drops the arrays already uploaded.
    pub(crate) fn indexed(
        ctx: Arc<WgpuContext>,
        layout: ElemLayout,
        indices: &[u32],
        transposed: &TransposedIndex,
    ) -> Result<Self, RestrictError> {
        let fwd_indices = DeviceArray::from_slice(Arc::clone(&ctx), indices, "restrict fwd")?;
        let t_offsets =
            DeviceArray::from_slice(Arc::clone(&ctx), transposed.offsets(), "restrict t_off")?;
        let t_indices =
            DeviceArray::from_slice(Arc::clone(&ctx), transposed.indices(), "restrict t_ind")?;
        let kernels = KernelSet::build(&ctx, &layout)?;
        Ok(Self {
            forward: KernelVariant::select(TransposeMode::NoTranspose, &layout),
            transpose: KernelVariant::select(TransposeMode::Transpose, &layout),
            ctx,
            layout,
            kernels,
            state: State::Indexed {
                fwd_indices,
                t_offsets,
                t_indices,
            },
        })
    }

    /// Compiles the kernel set for a strided restriction; no index mirrors.
    pub(crate) fn strided(
        ctx: Arc<WgpuContext>,
        layout: ElemLayout,
    ) -> Result<Self, RestrictError> {
        let kernels = KernelSet::build(&ctx, &layout)?;
        Ok(Self {
            forward: KernelVariant::select(TransposeMode::NoTranspose, &layout),
            transpose: KernelVariant::select(TransposeMode::Transpose, &layout),
            ctx,
            layout,
            kernels,
            state: State::Strided,
        })
    }

    fn device_vector<'v>(&self, v: &'v Vector) -> Result<&'v DeviceVector, RestrictError> {
        let Some(dev) = v.device() else {
            return Err(RestrictError::WrongVectorSpace {
                backend: WgpuBackend::NAME,
                expected: MemType::Device,
                found: v.mem_type(),
            });
        };
        if !Arc::ptr_eq(dev.context(), &self.ctx) {
            return Err(RestrictError::ForeignDeviceVector);
        }
        Ok(dev)
    }

    /// Bind group covering exactly the bindings `variant`'s entry point
    /// declares; the pipeline layout is derived from the shader, so unused
    /// bindings must not appear here.
    fn bind_group(
        &self,
        variant: KernelVariant,
        src: &DeviceVector,
        dst: &DeviceVector,
    ) -> wgpu::BindGroup {
        let mut entries = Vec::with_capacity(4);
        if let State::Indexed {
            fwd_indices,
            t_offsets,
            t_indices,
        } = &self.state
        {
            if variant.is_scatter_add() {
                entries.push(wgpu::BindGroupEntry {
                    binding: 1,
                    resource: t_offsets.binding(),
                });
                entries.push(wgpu::BindGroupEntry {
                    binding: 2,
                    resource: t_indices.binding(),
                });
            } else {
                entries.push(wgpu::BindGroupEntry {
                    binding: 0,
                    resource: fwd_indices.binding(),
                });
            }
        }
        entries.push(wgpu::BindGroupEntry {
            binding: 3,
            resource: src.binding(),
        });
        entries.push(wgpu::BindGroupEntry {
            binding: 4,
            resource: dst.binding(),
        });
        self.ctx.device().create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(variant.entry_point()),
            layout: &self.kernels.pipeline(variant).get_bind_group_layout(0),
            entries: &entries,
        })
    }

    /// Threads the variant's dispatch covers: elements for the gathers and
    /// the strided scatter, L-slots for the indexed scatters.
    fn domain(&self, variant: KernelVariant) -> u32 {
        match variant {
            KernelVariant::ScatterAddSingle | KernelVariant::ScatterAddMulti => {
                self.layout.lvector_size() as u32
            }
            _ => self.layout.num_elements() as u32,
        }
    }
}

impl RestrictionOps for WgpuRestriction {
    fn layout(&self) -> &ElemLayout {
        &self.layout
    }

    fn backend_name(&self) -> &'static str {
        WgpuBackend::NAME
    }

    fn apply(
        &self,
        mode: TransposeMode,
        u: &Vector,
        v: &mut Vector,
        request: &mut Request,
    ) -> Result<(), RestrictError> {
        // Fence any earlier deferred submission on this handle first so the
        // caller sees program order.
        if let Some(prior) = request.take_pending() {
            prior.wait()?;
        }
        let variant = match mode {
            TransposeMode::NoTranspose => self.forward,
            TransposeMode::Transpose => self.transpose,
        };
        let src = self.device_vector(u)?;
        let dst = self.device_vector(v)?;
        let domain = self.domain(variant);
        if domain == 0 {
            return Ok(());
        }
        log::trace!("wgpu apply {} over {domain} threads", variant.entry_point());
        let bind_group = self.bind_group(variant, src, dst);
        let mut encoder = self
            .ctx
            .device()
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("restriction apply"),
            });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some(variant.entry_point()),
                timestamp_writes: None,
            });
            pass.set_pipeline(self.kernels.pipeline(variant));
            pass.set_bind_group(0, &bind_group, &[]);
            pass.dispatch_workgroups(self.kernels.workgroups(domain), 1, 1);
        }
        let submission = self.ctx.queue().submit(Some(encoder.finish()));
        match request.mode() {
            Mode::Immediate => {
                self.ctx
                    .device()
                    .poll(wgpu::Maintain::WaitForSubmissionIndex(submission));
            }
            Mode::Ordered => {}
            Mode::Deferred => {
                request.set_pending(Box::new(SubmissionWait {
                    ctx: Arc::clone(&self.ctx),
                    submission,
                }));
            }
        }
        Ok(())
    }

    fn create_vector(&self, len: usize) -> Result<Vector, RestrictError> {
        Ok(Vector::from_device(DeviceVector::zeroed(
            Arc::clone(&self.ctx),
            len,
        )?))
    }
}

struct SubmissionWait {
    ctx: Arc<WgpuContext>,
    submission: wgpu::SubmissionIndex,
}

impl Waitable for SubmissionWait {
    fn wait(self: Box<Self>) -> Result<(), RestrictError> {
        self.ctx
            .device()
            .poll(wgpu::Maintain::WaitForSubmissionIndex(self.submission));
        Ok(())
    }
}
