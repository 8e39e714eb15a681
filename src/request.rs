//! Completion handles for restriction applies.
//!
//! Every apply takes a `&mut Request` stating when the caller wants to
//! observe completion:
//!
//! - [`Request::immediate`] blocks inside the apply until the work finished;
//! - [`Request::ordered`] only enqueues; within one device context, queue
//!   order is program order, so a later immediate apply (or an explicit
//!   wait) fences everything before it;
//! - [`Request::deferred`] records the submitted work on the handle, to be
//!   drained by [`Request::wait`].
//!
//! The host backend completes synchronously under all three modes.

use std::fmt;

use crate::error::RestrictError;

/// Backend-recorded unit of outstanding work.
pub(crate) trait Waitable: Send {
    /// Blocks until the recorded work has completed on the device.
    fn wait(self: Box<Self>) -> Result<(), RestrictError>;
}

/// Requested completion semantics, visible to backends.
///
/// Only device backends branch on this; the host path completes
/// synchronously whatever the mode.
#[cfg_attr(not(feature = "wgpu"), allow(dead_code))]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum Mode {
    Immediate,
    Ordered,
    Deferred,
}

enum Inner {
    Immediate,
    Ordered,
    Deferred(Option<Box<dyn Waitable>>),
}

/// Completion handle passed to every apply.
pub struct Request {
    inner: Inner,
}

impl Request {
    /// The apply blocks until its work completed.
    pub const fn immediate() -> Self {
        Self {
            inner: Inner::Immediate,
        }
    }

    /// The apply only enqueues; completion is observed by a later fence.
    pub const fn ordered() -> Self {
        Self {
            inner: Inner::Ordered,
        }
    }

    /// The apply records its work here; drain it with [`Request::wait`].
    pub const fn deferred() -> Self {
        Self {
            inner: Inner::Deferred(None),
        }
    }

    /// Whether deferred work is recorded and not yet waited for.
    #[inline]
    pub fn is_pending(&self) -> bool {
        matches!(self.inner, Inner::Deferred(Some(_)))
    }

    /// Blocks until all work recorded on this handle has completed, then
    /// clears it. A no-op for immediate/ordered handles and for deferred
    /// handles with nothing outstanding.
    pub fn wait(&mut self) -> Result<(), RestrictError> {
        match self.take_pending() {
            Some(waitable) => waitable.wait(),
            None => Ok(()),
        }
    }

    #[cfg_attr(not(feature = "wgpu"), allow(dead_code))]
    #[inline]
    pub(crate) fn mode(&self) -> Mode {
        match self.inner {
            Inner::Immediate => Mode::Immediate,
            Inner::Ordered => Mode::Ordered,
            Inner::Deferred(_) => Mode::Deferred,
        }
    }

    pub(crate) fn take_pending(&mut self) -> Option<Box<dyn Waitable>> {
        match &mut self.inner {
            Inner::Deferred(pending) => pending.take(),
            _ => None,
        }
    }

    /// Records work on a deferred handle. Callers must have drained any
    /// prior pending work first.
    #[cfg_attr(not(feature = "wgpu"), allow(dead_code))]
    pub(crate) fn set_pending(&mut self, waitable: Box<dyn Waitable>) {
        if let Inner::Deferred(pending) = &mut self.inner {
            *pending = Some(waitable);
        }
    }
}

impl Default for Request {
    fn default() -> Self {
        Self::immediate()
    }
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.inner {
            Inner::Immediate => f.write_str("Request::Immediate"),
            Inner::Ordered => f.write_str("Request::Ordered"),
            Inner::Deferred(None) => f.write_str("Request::Deferred(idle)"),
            Inner::Deferred(Some(_)) => f.write_str("Request::Deferred(pending)"),
        }
    }
}
