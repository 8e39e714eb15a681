//! Typed storage buffers with allocation tracking and host transfer.

use std::marker::PhantomData;
use std::sync::Arc;

use bytemuck::{Pod, Zeroable};

use crate::backend::wgpu::context::WgpuContext;
use crate::error::RestrictError;
use crate::vector::Scalar;

/// A device-resident array of `T` backed by one storage buffer.
///
/// Allocation failures surface as [`RestrictError::DeviceAlloc`] rather than
/// the process abort wgpu's uncaptured handler would otherwise raise. The
/// buffer is destroyed eagerly on drop and its bytes are subtracted from the
/// owning context's live counters.
pub(crate) struct DeviceArray<T> {
    ctx: Arc<WgpuContext>,
    buffer: wgpu::Buffer,
    len: usize,
    alloc_bytes: u64,
    _pd: PhantomData<T>,
}

impl<T> DeviceArray<T>
where
    T: Pod + Zeroable + Send + Sync + 'static,
{
    const ELEM: u64 = std::mem::size_of::<T>() as u64;

    /// Allocates a zero-filled array of `len` elements.
    pub(crate) fn zeroed(
        ctx: Arc<WgpuContext>,
        len: usize,
        label: &'static str,
    ) -> Result<Self, RestrictError> {
        let array = Self::alloc(ctx, len, label)?;
        if len > 0 {
            let zeros = vec![T::zeroed(); len];
            array
                .ctx
                .queue()
                .write_buffer(&array.buffer, 0, bytemuck::cast_slice(&zeros));
        }
        Ok(array)
    }

    /// Allocates an array holding a copy of `data`.
    pub(crate) fn from_slice(
        ctx: Arc<WgpuContext>,
        data: &[T],
        label: &'static str,
    ) -> Result<Self, RestrictError> {
        let array = Self::alloc(ctx, data.len(), label)?;
        if !data.is_empty() {
            array
                .ctx
                .queue()
                .write_buffer(&array.buffer, 0, bytemuck::cast_slice(data));
        }
        Ok(array)
    }

    fn alloc(
        ctx: Arc<WgpuContext>,
        len: usize,
        label: &'static str,
    ) -> Result<Self, RestrictError> {
        // Zero-length bindings are invalid; keep one element of slack and
        // track the logical length separately.
        let alloc_bytes = (len.max(1) as u64) * Self::ELEM;
        let limits = ctx.limits();
        if alloc_bytes > u64::from(limits.max_storage_buffer_binding_size)
            || alloc_bytes > limits.max_buffer_size
        {
            return Err(RestrictError::DeviceAlloc {
                label,
                message: format!("{alloc_bytes} bytes exceeds device buffer limits"),
            });
        }
        ctx.device().push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        let buffer = ctx.device().create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size: alloc_bytes,
            usage: wgpu::BufferUsages::STORAGE
                | wgpu::BufferUsages::COPY_SRC
                | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        if let Some(err) = pollster::block_on(ctx.device().pop_error_scope()) {
            buffer.destroy();
            return Err(RestrictError::DeviceAlloc {
                label,
                message: err.to_string(),
            });
        }
        ctx.stats.on_alloc(alloc_bytes);
        Ok(Self {
            ctx,
            buffer,
            len,
            alloc_bytes,
            _pd: PhantomData,
        })
    }

    /// Overwrites the array with `data`.
    ///
    /// # Errors
    /// [`RestrictError::VectorLengthMismatch`] when `data.len()` differs.
    pub(crate) fn write(&self, data: &[T]) -> Result<(), RestrictError> {
        if data.len() != self.len {
            return Err(RestrictError::VectorLengthMismatch {
                expected: self.len,
                found: data.len(),
            });
        }
        if !data.is_empty() {
            self.ctx
                .queue()
                .write_buffer(&self.buffer, 0, bytemuck::cast_slice(data));
        }
        Ok(())
    }

    /// Copies the array back to host memory, waiting for the device.
    pub(crate) fn read_to_vec(&self) -> Result<Vec<T>, RestrictError> {
        if self.len == 0 {
            return Ok(Vec::new());
        }
        let size_b = (self.len as u64) * Self::ELEM;
        let staging = self.ctx.device().create_buffer(&wgpu::BufferDescriptor {
            label: Some("DeviceArray[read] staging"),
            size: size_b,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let mut enc = self
            .ctx
            .device()
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("DeviceArray::read_to_vec"),
            });
        enc.copy_buffer_to_buffer(&self.buffer, 0, &staging, 0, size_b);
        self.ctx.queue().submit(Some(enc.finish()));
        let buffer_slice = staging.slice(..);
        let (sender, receiver) = futures_intrusive::channel::shared::oneshot_channel();
        buffer_slice.map_async(wgpu::MapMode::Read, move |res| {
            sender.send(res).ok();
        });
        self.ctx.device().poll(wgpu::Maintain::Wait);
        let res = pollster::block_on(receiver.receive());
        res.ok_or(RestrictError::GpuMappingFailed)?
            .map_err(|_| RestrictError::GpuMappingFailed)?;
        let data = buffer_slice.get_mapped_range();
        let mut out = vec![T::zeroed(); self.len];
        out.copy_from_slice(bytemuck::cast_slice(&data));
        drop(data);
        staging.unmap();
        Ok(out)
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub(crate) fn context(&self) -> &Arc<WgpuContext> {
        &self.ctx
    }

    #[inline]
    pub(crate) fn binding(&self) -> wgpu::BindingResource<'_> {
        self.buffer.as_entire_binding()
    }
}

impl<T> Drop for DeviceArray<T> {
    fn drop(&mut self) {
        self.buffer.destroy();
        self.ctx.stats.on_free(self.alloc_bytes);
    }
}

impl<T> std::fmt::Debug for DeviceArray<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceArray")
            .field("len", &self.len)
            .field("alloc_bytes", &self.alloc_bytes)
            .finish()
    }
}

/// Device-resident scalar vector, the payload behind a device [`crate::Vector`].
#[derive(Debug)]
pub struct DeviceVector {
    array: DeviceArray<Scalar>,
}

impl DeviceVector {
    /// Allocates a zeroed vector of `len` scalars.
    pub fn zeroed(ctx: Arc<WgpuContext>, len: usize) -> Result<Self, RestrictError> {
        Ok(Self {
            array: DeviceArray::zeroed(ctx, len, "Vector[device]")?,
        })
    }

    /// Allocates a vector holding a copy of `data`.
    pub fn from_slice(ctx: Arc<WgpuContext>, data: &[Scalar]) -> Result<Self, RestrictError> {
        Ok(Self {
            array: DeviceArray::from_slice(ctx, data, "Vector[device]")?,
        })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.array.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.array.len() == 0
    }

    /// Copies the vector back to the host.
    pub fn read_to_vec(&self) -> Result<Vec<Scalar>, RestrictError> {
        self.array.read_to_vec()
    }

    /// Overwrites the vector from a host slice of the same length.
    pub fn write(&self, data: &[Scalar]) -> Result<(), RestrictError> {
        self.array.write(data)
    }

    /// Sets every entry to `value`.
    pub fn fill(&self, value: Scalar) -> Result<(), RestrictError> {
        self.array.write(&vec![value; self.array.len()])
    }

    #[inline]
    pub(crate) fn context(&self) -> &Arc<WgpuContext> {
        self.array.context()
    }

    #[inline]
    pub(crate) fn binding(&self) -> wgpu::BindingResource<'_> {
        self.array.binding()
    }
}
