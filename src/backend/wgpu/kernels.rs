//! Shader specialization and the per-restriction pipeline set.
//!
//! The kernels in `restrict.wgsl` refer to their shape (element count, nodes
//! per element, strides) through module-scope constants. Those constants are
//! prepended to the shader source per restriction, so every loop bound the
//! compiler sees is a literal.

use std::sync::Arc;

use crate::backend::KernelVariant;
use crate::backend::wgpu::context::WgpuContext;
use crate::error::RestrictError;
use crate::layout::ElemLayout;

/// Widest workgroup the kernels are specialized to.
const MAX_TILE: u32 = 64;

/// Layout extents narrowed to the u32 arithmetic the shaders run on.
#[derive(Debug)]
struct ShapeConsts {
    num_elem: u32,
    elem_size: u32,
    num_comp: u32,
    comp_stride: u32,
    stride_node: u32,
    stride_comp: u32,
    stride_elem: u32,
    l_size: u32,
}

impl ShapeConsts {
    fn from_layout(layout: &ElemLayout) -> Result<Self, RestrictError> {
        let narrow = |n: usize| u32::try_from(n).map_err(|_| RestrictError::LayoutOverflow);
        // Every E-slot index must itself fit the shader's index type.
        narrow(layout.evector_size())?;
        let strides = layout.resolved_strides();
        Ok(Self {
            num_elem: narrow(layout.num_elements())?,
            elem_size: narrow(layout.elem_size())?,
            num_comp: narrow(layout.num_components())?,
            comp_stride: narrow(layout.comp_stride())?,
            stride_node: narrow(strides.node)?,
            stride_comp: narrow(strides.comp)?,
            stride_elem: narrow(strides.elem)?,
            l_size: narrow(layout.lvector_size())?,
        })
    }
}

fn specialize(shape: &ShapeConsts, tile: u32) -> String {
    let consts = [
        ("NUM_ELEM", shape.num_elem),
        ("ELEM_SIZE", shape.elem_size),
        ("NUM_COMP", shape.num_comp),
        ("COMP_STRIDE", shape.comp_stride),
        ("STRIDE_NODE", shape.stride_node),
        ("STRIDE_COMP", shape.stride_comp),
        ("STRIDE_ELEM", shape.stride_elem),
        ("L_SIZE", shape.l_size),
        ("TILE", tile),
    ];
    let mut source = String::new();
    for (name, value) in consts {
        source.push_str(&format!("const {name}: u32 = {value}u;\n"));
    }
    source.push('\n');
    source.push_str(include_str!("restrict.wgsl"));
    source
}

/// The six compiled pipelines of one restriction plus its dispatch geometry.
pub(crate) struct KernelSet {
    pipelines: [wgpu::ComputePipeline; 6],
    tile: u32,
}

impl KernelSet {
    /// Compiles the shader module and all six pipelines.
    ///
    /// Compilation errors are trapped with a validation scope and surface as
    /// [`RestrictError::KernelBuild`]. Shapes whose widest dispatch would
    /// exceed the device's workgroup limit are rejected here rather than at
    /// the first apply.
    pub(crate) fn build(
        ctx: &Arc<WgpuContext>,
        layout: &ElemLayout,
    ) -> Result<Self, RestrictError> {
        let shape = ShapeConsts::from_layout(layout)?;
        let tile = if ctx.is_cpu_adapter() {
            log::warn!(
                "adapter {} is a CPU rasterizer; using single-lane workgroups",
                ctx.adapter_name()
            );
            1
        } else {
            shape.num_elem.clamp(1, MAX_TILE)
        };
        let widest_domain = if layout.is_strided() {
            shape.num_elem
        } else {
            shape.num_elem.max(shape.l_size)
        };
        let limit = ctx.limits().max_compute_workgroups_per_dimension;
        let workgroups = widest_domain.div_ceil(tile);
        if workgroups > limit {
            return Err(RestrictError::DispatchTooLarge { workgroups, limit });
        }
        let source = specialize(&shape, tile);
        let device = ctx.device();
        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("restrict.wgsl"),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        });
        let pipelines = KernelVariant::ALL.map(|variant| {
            device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some(variant.entry_point()),
                layout: None,
                module: &module,
                entry_point: variant.entry_point(),
            })
        });
        if let Some(err) = pollster::block_on(device.pop_error_scope()) {
            return Err(RestrictError::KernelBuild {
                message: err.to_string(),
            });
        }
        log::debug!(
            "compiled restriction kernels: tile={tile}, widest dispatch={workgroups} workgroups"
        );
        Ok(Self { pipelines, tile })
    }

    #[inline]
    pub(crate) fn pipeline(&self, variant: KernelVariant) -> &wgpu::ComputePipeline {
        &self.pipelines[variant.index()]
    }

    /// Workgroup count covering `domain` threads at the compiled tile width.
    #[inline]
    pub(crate) fn workgroups(&self, domain: u32) -> u32 {
        domain.div_ceil(self.tile)
    }
}

impl std::fmt::Debug for KernelSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KernelSet").field("tile", &self.tile).finish()
    }
}
