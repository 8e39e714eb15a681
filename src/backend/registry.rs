//! Process-wide backend registry.
//!
//! Backends are registered once, by name, and resolved at context-creation
//! time; handles created through a backend keep working regardless of later
//! registry changes. The built-in backends are installed when the registry
//! is first touched.

use std::sync::Arc;

use dashmap::DashMap;
use once_cell::sync::Lazy;

use crate::backend::Backend;
use crate::error::RestrictError;

static REGISTRY: Lazy<DashMap<&'static str, Arc<dyn Backend>>> = Lazy::new(|| {
    let map: DashMap<&'static str, Arc<dyn Backend>> = DashMap::new();
    let host = Arc::new(crate::backend::host::HostBackend::new());
    map.insert(host.name(), host as Arc<dyn Backend>);
    #[cfg(feature = "wgpu")]
    {
        // Device bring-up is lazy; resolving "wgpu" never touches the GPU.
        let gpu = Arc::new(crate::backend::wgpu::WgpuBackend::new());
        map.insert(gpu.name(), gpu as Arc<dyn Backend>);
    }
    map
});

/// Registers a backend under its [`Backend::name`].
///
/// # Errors
/// [`RestrictError::DuplicateBackend`] if the name is already taken
/// (including by a built-in).
pub fn register(backend: Arc<dyn Backend>) -> Result<(), RestrictError> {
    let name = backend.name();
    match REGISTRY.entry(name) {
        dashmap::mapref::entry::Entry::Occupied(_) => {
            Err(RestrictError::DuplicateBackend(name.to_string()))
        }
        dashmap::mapref::entry::Entry::Vacant(slot) => {
            log::debug!("registered backend `{name}`");
            slot.insert(backend);
            Ok(())
        }
    }
}

/// Resolves a backend by name.
///
/// # Errors
/// [`RestrictError::UnknownBackend`] naming the registered set.
pub fn resolve(name: &str) -> Result<Arc<dyn Backend>, RestrictError> {
    REGISTRY
        .get(name)
        .map(|entry| Arc::clone(entry.value()))
        .ok_or_else(|| RestrictError::UnknownBackend {
            name: name.to_string(),
            available: backend_names().join(", "),
        })
}

/// Names of all registered backends, sorted.
pub fn backend_names() -> Vec<&'static str> {
    let mut names: Vec<&'static str> = REGISTRY.iter().map(|entry| *entry.key()).collect();
    names.sort_unstable();
    names
}
