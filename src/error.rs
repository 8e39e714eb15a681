//! RestrictError: unified error type for elem-restrict public APIs
//!
//! Every fallible operation in the crate returns this enum so callers get
//! structured, non-panicking failures: construction-time validation,
//! apply-time shape checks, device bring-up and kernel-build failures, and
//! registry misuse all surface here.

use thiserror::Error;

use crate::vector::MemType;

/// Unified error type for elem-restrict operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RestrictError {
    /// The backend does not implement the requested operation.
    #[error("backend `{backend}` does not implement {op}")]
    Unsupported {
        /// Registered name of the backend.
        backend: &'static str,
        /// Human-readable operation name, e.g. `"blocked restrictions"`.
        op: &'static str,
    },
    /// Index arrays may only be passed in host memory at creation.
    #[error("backend `{backend}` only accepts host-resident index arrays (got {found:?})")]
    UnsupportedIndexMemType {
        /// Registered name of the backend.
        backend: &'static str,
        /// The memory space the caller tried to pass.
        found: MemType,
    },
    /// An indexed constructor got a strided layout, or vice versa.
    #[error("constructor requires an {expected} layout")]
    WrongLayoutKind {
        /// `"indexed"` or `"strided"`.
        expected: &'static str,
    },
    /// The forward index array has the wrong length for the layout.
    #[error("forward index length mismatch: expected num_elem*elem_size = {expected}, found {found}")]
    IndexCountMismatch {
        /// `num_elem * elem_size` of the layout.
        expected: usize,
        /// Length of the supplied index array.
        found: usize,
    },
    /// A forward index addresses a slot outside the L-vector.
    #[error("forward index out of range at position {position}: {index} (L-vector size {l_size})")]
    IndexOutOfRange {
        /// Position of the offending entry in the forward index array.
        position: usize,
        /// The offending value.
        index: u32,
        /// L-vector length in scalars.
        l_size: usize,
    },
    /// A layout must describe at least one component.
    #[error("layout must have at least one component")]
    ZeroComponents,
    /// Layout extents overflow the address space.
    #[error("layout sizes overflow usize")]
    LayoutOverflow,
    /// The component stride would address slots outside the L-vector.
    #[error(
        "component stride {comp_stride} with {num_comp} components addresses up to slot \
         {max_addressed}, past L-vector size {l_size}"
    )]
    InvalidCompStride {
        /// Component stride in scalars.
        comp_stride: usize,
        /// Number of components.
        num_comp: usize,
        /// Highest slot the stride would touch.
        max_addressed: usize,
        /// L-vector length in scalars.
        l_size: usize,
    },
    /// Caller-supplied strides would address slots outside the L-vector.
    #[error("strides address up to slot {max_addressed}, past L-vector size {l_size}")]
    StridesOutOfBounds {
        /// Highest slot the strides would touch.
        max_addressed: usize,
        /// L-vector length in scalars.
        l_size: usize,
    },
    /// Caller-supplied strides alias one L-slot from several positions.
    #[error("strides alias L-slot {slot}: more than one (node, comp, elem) position addresses it")]
    StridesAlias {
        /// The first slot found with multiple addressers.
        slot: usize,
    },
    /// The transposed index failed self-validation.
    #[error("transposed index invariant violated: {0}")]
    CorruptTransposedIndex(&'static str),
    /// The L-side vector of an apply has the wrong length.
    #[error("L-vector length mismatch in {role}: expected {expected}, found {found}")]
    LVectorSizeMismatch {
        /// `"input"` or `"output"` depending on the transpose mode.
        role: &'static str,
        /// Expected length.
        expected: usize,
        /// Supplied length.
        found: usize,
    },
    /// The E-side vector of an apply has the wrong length.
    #[error("E-vector length mismatch in {role}: expected {expected}, found {found}")]
    EVectorSizeMismatch {
        /// `"input"` or `"output"` depending on the transpose mode.
        role: &'static str,
        /// Expected length.
        expected: usize,
        /// Supplied length.
        found: usize,
    },
    /// A vector was passed to a backend that cannot address its memory.
    #[error("backend `{backend}` expected a {expected:?}-memory vector, found {found:?}")]
    WrongVectorSpace {
        /// Registered name of the backend.
        backend: &'static str,
        /// Memory space the backend operates on.
        expected: MemType,
        /// Memory space of the supplied vector.
        found: MemType,
    },
    /// A device vector was created on a different device context.
    #[error("vector belongs to a different device context")]
    ForeignDeviceVector,
    /// A vector write received data of the wrong length.
    #[error("vector length mismatch: expected {expected}, found {found}")]
    VectorLengthMismatch {
        /// Length of the vector.
        expected: usize,
        /// Length of the supplied data.
        found: usize,
    },
    /// No compatible GPU adapter was found.
    #[error("no compatible GPU adapter available")]
    NoAdapter,
    /// Device initialization failed after an adapter was found.
    #[error("device initialization failed: {0}")]
    DeviceInit(String),
    /// A device buffer allocation failed.
    #[error("device allocation failed for {label}: {message}")]
    DeviceAlloc {
        /// Label of the buffer being allocated.
        label: &'static str,
        /// Message reported by the device layer.
        message: String,
    },
    /// Compiling the restriction kernels failed.
    #[error("kernel build failed: {message}")]
    KernelBuild {
        /// Message reported by the shader compiler or validator.
        message: String,
    },
    /// Mapping a staging buffer for readback failed.
    #[error("GPU buffer mapping failed")]
    GpuMappingFailed,
    /// The apply would dispatch more workgroups than the device allows.
    #[error("dispatch of {workgroups} workgroups exceeds device limit {limit}")]
    DispatchTooLarge {
        /// Workgroup count the apply would need.
        workgroups: u32,
        /// Device limit per dispatch dimension.
        limit: u32,
    },
    /// A backend with this name is already registered.
    #[error("backend `{0}` is already registered")]
    DuplicateBackend(String),
    /// No backend with this name is registered.
    #[error("unknown backend `{name}` (registered: {available})")]
    UnknownBackend {
        /// The name that failed to resolve.
        name: String,
        /// Comma-separated list of registered backend names.
        available: String,
    },
}
