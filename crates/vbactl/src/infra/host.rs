//! The host automation surface.
//!
//! Every method that returns a [`RawHandle`] hands the caller one reference on a remote object;
//! the caller owns it until it is passed back to [`Host::release`]. Handles are apartment-affine
//! and must be used and released on the thread that obtained them.

use std::fmt;

use crate::domain::errors::HostResult;
use crate::domain::model::{ComponentKind, HostProcKind};

/// Opaque reference to a host-side object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RawHandle(u64);

impl RawHandle {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn id(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for RawHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Line-oriented automation interface exposed by a running office host.
pub trait Host {
    /// Look up the running application registered under `prog_id`.
    fn active_application(&self, prog_id: &str) -> HostResult<Option<RawHandle>>;

    /// The document currently open in the application, if any.
    fn current_document(&self, app: RawHandle) -> HostResult<Option<RawHandle>>;

    /// Full path of a document as the host reports it.
    fn document_path(&self, document: RawHandle) -> HostResult<String>;

    /// The embedded project of the open document.
    fn active_project(&self, app: RawHandle) -> HostResult<RawHandle>;

    /// The component collection of a project.
    fn components(&self, project: RawHandle) -> HostResult<RawHandle>;

    fn component_count(&self, components: RawHandle) -> HostResult<usize>;

    /// Component at a 1-based index.
    fn component(&self, components: RawHandle, index: usize) -> HostResult<RawHandle>;

    fn component_name(&self, component: RawHandle) -> HostResult<String>;

    fn component_kind(&self, component: RawHandle) -> HostResult<ComponentKind>;

    /// The code buffer behind a component.
    fn code_module(&self, component: RawHandle) -> HostResult<RawHandle>;

    fn count_of_lines(&self, module: RawHandle) -> HostResult<usize>;

    /// `count` lines starting at 1-based `start`, joined with CRLF.
    fn lines(&self, module: RawHandle, start: usize, count: usize) -> HostResult<String>;

    fn delete_lines(&self, module: RawHandle, start: usize, count: usize) -> HostResult<()>;

    /// Insert CRLF-separated `text` so that its first line becomes line `line`.
    fn insert_lines(&self, module: RawHandle, line: usize, text: &str) -> HostResult<()>;

    /// The procedure owning a 1-based line. Lines outside every procedure may fail.
    fn proc_of_line(&self, module: RawHandle, line: usize) -> HostResult<(String, HostProcKind)>;

    fn proc_start_line(&self, module: RawHandle, name: &str, kind: HostProcKind)
    -> HostResult<usize>;

    fn proc_count_lines(
        &self,
        module: RawHandle,
        name: &str,
        kind: HostProcKind,
    ) -> HostResult<usize>;

    /// Drop one reference on a handle.
    fn release(&self, handle: RawHandle) -> HostResult<()>;
}
