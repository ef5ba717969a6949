//! Scoped ownership of remote handles.

use std::marker::PhantomData;
use std::rc::Rc;

use tracing::{debug, warn};

use crate::infra::host::{Host, RawHandle};

/// Owns at most one remote handle and releases it exactly once when dropped.
///
/// Guards are neither `Copy` nor `Clone`, and they are `!Send`: a handle must be released on
/// the thread that obtained it. Locals drop in reverse declaration order, so nested guards
/// release innermost-first without any explicit bookkeeping.
pub struct HandleGuard<'h, H: Host + ?Sized> {
    host: &'h H,
    handle: Option<RawHandle>,
    label: &'static str,
    _affinity: PhantomData<Rc<()>>,
}

impl<'h, H: Host + ?Sized> HandleGuard<'h, H> {
    /// Take ownership of a handle returned by the host.
    pub fn new(host: &'h H, handle: RawHandle, label: &'static str) -> Self {
        Self::from_option(host, Some(handle), label)
    }

    /// Wrap a handle that may be absent.
    pub fn from_option(host: &'h H, handle: Option<RawHandle>, label: &'static str) -> Self {
        if let Some(handle) = handle {
            debug!(%handle, label, "acquired handle");
        }
        Self {
            host,
            handle,
            label,
            _affinity: PhantomData,
        }
    }

    /// The wrapped handle, if present.
    pub fn handle(&self) -> Option<RawHandle> {
        self.handle
    }

    /// The host this guard releases into.
    pub fn host(&self) -> &'h H {
        self.host
    }

    /// Release now instead of at scope exit. Failures are logged, never returned.
    pub fn release(mut self) {
        self.release_inner();
    }

    fn release_inner(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        match self.host.release(handle) {
            Ok(()) => debug!(%handle, label = self.label, "released handle"),
            Err(error) => warn!(
                %handle,
                label = self.label,
                %error,
                "failed to release handle"
            ),
        }
    }
}

impl<H: Host + ?Sized> Drop for HandleGuard<'_, H> {
    fn drop(&mut self) {
        self.release_inner();
    }
}

impl<H: Host + ?Sized> std::fmt::Debug for HandleGuard<'_, H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandleGuard")
            .field("handle", &self.handle)
            .field("label", &self.label)
            .finish()
    }
}
