//! Vectors in host or device memory.
//!
//! [`Vector`] is the single value type restrictions read and write. Host
//! vectors wrap a `Vec<Scalar>` and are cheap to inspect; device vectors wrap
//! a GPU buffer and move data only through explicit uploads
//! ([`Vector::copy_from_slice`]) and readbacks ([`Vector::to_vec`]).

use serde::{Deserialize, Serialize};

use crate::error::RestrictError;

/// Scalar element type of all vectors.
///
/// Storage-buffer kernels compute in `f32`; the host path uses the same type
/// so both backends produce bit-comparable results.
pub type Scalar = f32;

// The WGSL kernels declare their arrays as f32.
static_assertions::const_assert_eq!(std::mem::size_of::<Scalar>(), 4);

/// Memory space a vector (or an index array at creation) lives in.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MemType {
    /// Host-resident, directly addressable memory.
    Host,
    /// Device-resident memory, reachable only through a backend.
    Device,
}

#[derive(Debug)]
enum Inner {
    Host(Vec<Scalar>),
    #[cfg(feature = "wgpu")]
    Device(crate::backend::wgpu::buffers::DeviceVector),
}

/// A host- or device-resident vector of [`Scalar`]s.
#[derive(Debug)]
pub struct Vector {
    inner: Inner,
}

impl Vector {
    /// Creates a host vector holding a copy of `data`.
    pub fn from_slice(data: &[Scalar]) -> Self {
        Self {
            inner: Inner::Host(data.to_vec()),
        }
    }

    /// Creates a zero-filled host vector of length `len`.
    pub fn zeros(len: usize) -> Self {
        Self {
            inner: Inner::Host(vec![0.0; len]),
        }
    }

    #[cfg(feature = "wgpu")]
    pub(crate) fn from_device(device: crate::backend::wgpu::buffers::DeviceVector) -> Self {
        Self {
            inner: Inner::Device(device),
        }
    }

    /// Number of scalars.
    #[inline]
    pub fn len(&self) -> usize {
        match &self.inner {
            Inner::Host(v) => v.len(),
            #[cfg(feature = "wgpu")]
            Inner::Device(d) => d.len(),
        }
    }

    /// Whether the vector holds no scalars.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Memory space this vector lives in.
    #[inline]
    pub fn mem_type(&self) -> MemType {
        match &self.inner {
            Inner::Host(_) => MemType::Host,
            #[cfg(feature = "wgpu")]
            Inner::Device(_) => MemType::Device,
        }
    }

    /// Host view of the data, or `None` for device vectors.
    #[inline]
    pub fn as_slice(&self) -> Option<&[Scalar]> {
        match &self.inner {
            Inner::Host(v) => Some(v),
            #[cfg(feature = "wgpu")]
            Inner::Device(_) => None,
        }
    }

    /// Mutable host view of the data, or `None` for device vectors.
    #[inline]
    pub fn as_mut_slice(&mut self) -> Option<&mut [Scalar]> {
        match &mut self.inner {
            Inner::Host(v) => Some(v),
            #[cfg(feature = "wgpu")]
            Inner::Device(_) => None,
        }
    }

    /// Copies the contents into a host `Vec`, reading back from the device
    /// if needed.
    ///
    /// # Errors
    /// [`RestrictError::GpuMappingFailed`] if a device readback cannot map
    /// its staging buffer.
    pub fn to_vec(&self) -> Result<Vec<Scalar>, RestrictError> {
        match &self.inner {
            Inner::Host(v) => Ok(v.clone()),
            #[cfg(feature = "wgpu")]
            Inner::Device(d) => d.read_to_vec(),
        }
    }

    /// Overwrites the contents with `data`, uploading to the device if
    /// needed. `data` must match the vector's length.
    ///
    /// # Errors
    /// [`RestrictError::VectorLengthMismatch`] on a length mismatch.
    pub fn copy_from_slice(&mut self, data: &[Scalar]) -> Result<(), RestrictError> {
        if data.len() != self.len() {
            return Err(RestrictError::VectorLengthMismatch {
                expected: self.len(),
                found: data.len(),
            });
        }
        match &mut self.inner {
            Inner::Host(v) => {
                v.copy_from_slice(data);
                Ok(())
            }
            #[cfg(feature = "wgpu")]
            Inner::Device(d) => d.write(data),
        }
    }

    /// Sets every entry to `value`.
    pub fn set_value(&mut self, value: Scalar) -> Result<(), RestrictError> {
        match &mut self.inner {
            Inner::Host(v) => {
                v.fill(value);
                Ok(())
            }
            #[cfg(feature = "wgpu")]
            Inner::Device(d) => d.fill(value),
        }
    }

    #[cfg(feature = "wgpu")]
    #[inline]
    pub(crate) fn device(&self) -> Option<&crate::backend::wgpu::buffers::DeviceVector> {
        match &self.inner {
            Inner::Host(_) => None,
            Inner::Device(d) => Some(d),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_basics() {
        let mut v = Vector::zeros(4);
        assert_eq!(v.len(), 4);
        assert_eq!(v.mem_type(), MemType::Host);
        v.copy_from_slice(&[1.0, 2.0, 3.0, 4.0]).unwrap();
        assert_eq!(v.to_vec().unwrap(), vec![1.0, 2.0, 3.0, 4.0]);
        v.set_value(7.5).unwrap();
        assert_eq!(v.as_slice().unwrap(), &[7.5; 4]);
    }

    #[test]
    fn copy_from_slice_checks_length() {
        let mut v = Vector::zeros(3);
        let err = v.copy_from_slice(&[1.0]).unwrap_err();
        assert_eq!(
            err,
            RestrictError::VectorLengthMismatch {
                expected: 3,
                found: 1
            }
        );
    }

    #[test]
    fn from_slice_copies() {
        let data = [1.0, 2.0];
        let v = Vector::from_slice(&data);
        assert_eq!(v.as_slice().unwrap(), &data);
    }
}
