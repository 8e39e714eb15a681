//! Device context: adapter selection, device and queue, allocation stats.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use crate::error::RestrictError;

/// Live-allocation counters for leak checks.
#[derive(Debug, Default)]
pub(crate) struct AllocStats {
    live_buffers: AtomicUsize,
    live_bytes: AtomicU64,
}

impl AllocStats {
    pub(crate) fn on_alloc(&self, bytes: u64) {
        self.live_buffers.fetch_add(1, Ordering::Relaxed);
        self.live_bytes.fetch_add(bytes, Ordering::Relaxed);
    }

    pub(crate) fn on_free(&self, bytes: u64) {
        self.live_buffers.fetch_sub(1, Ordering::Relaxed);
        self.live_bytes.fetch_sub(bytes, Ordering::Relaxed);
    }
}

/// One GPU device plus its submission queue.
///
/// Create one context and share it (`Arc`) between every restriction and
/// vector that should live on the same device; submission order on the
/// queue is program order.
#[derive(Debug)]
pub struct WgpuContext {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    adapter_info: wgpu::AdapterInfo,
    limits: wgpu::Limits,
    pub(crate) stats: AllocStats,
}

impl WgpuContext {
    /// Brings up the best available adapter.
    ///
    /// # Errors
    /// [`RestrictError::NoAdapter`] when the system has no compatible GPU,
    /// [`RestrictError::DeviceInit`] when device creation fails.
    pub fn new() -> Result<Self, RestrictError> {
        Self::with_power_preference(wgpu::PowerPreference::HighPerformance)
    }

    /// Brings up an adapter with an explicit power preference.
    pub fn with_power_preference(
        power_preference: wgpu::PowerPreference,
    ) -> Result<Self, RestrictError> {
        pollster::block_on(Self::new_async(power_preference))
    }

    async fn new_async(power_preference: wgpu::PowerPreference) -> Result<Self, RestrictError> {
        let instance = wgpu::Instance::default();
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference,
                force_fallback_adapter: false,
                compatible_surface: None,
            })
            .await
            .ok_or(RestrictError::NoAdapter)?;
        let adapter_info = adapter.get_info();
        log::info!(
            "selected GPU adapter: {} ({:?})",
            adapter_info.name,
            adapter_info.backend
        );
        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("elem-restrict device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                },
                None,
            )
            .await
            .map_err(|e| RestrictError::DeviceInit(e.to_string()))?;
        let limits = device.limits();
        Ok(Self {
            device: Arc::new(device),
            queue: Arc::new(queue),
            adapter_info,
            limits,
            stats: AllocStats::default(),
        })
    }

    /// Whether any compatible adapter exists, without creating a device.
    pub fn is_available() -> bool {
        pollster::block_on(async {
            wgpu::Instance::default()
                .request_adapter(&wgpu::RequestAdapterOptions::default())
                .await
                .is_some()
        })
    }

    /// Name of the selected adapter.
    pub fn adapter_name(&self) -> &str {
        &self.adapter_info.name
    }

    /// Whether the adapter is a CPU rasterizer rather than real hardware.
    pub fn is_cpu_adapter(&self) -> bool {
        self.adapter_info.device_type == wgpu::DeviceType::Cpu
    }

    /// Number of live buffers allocated through this context.
    pub fn live_buffers(&self) -> usize {
        self.stats.live_buffers.load(Ordering::Relaxed)
    }

    /// Bytes held by live buffers allocated through this context.
    pub fn live_bytes(&self) -> u64 {
        self.stats.live_bytes.load(Ordering::Relaxed)
    }

    #[inline]
    pub(crate) fn device(&self) -> &Arc<wgpu::Device> {
        &self.device
    }

    #[inline]
    pub(crate) fn queue(&self) -> &Arc<wgpu::Queue> {
        &self.queue
    }

    #[inline]
    pub(crate) fn limits(&self) -> &wgpu::Limits {
        &self.limits
    }
}
