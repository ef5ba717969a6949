//! Module lookup inside a session's project.

use tracing::{debug, trace};

use crate::app::guard::HandleGuard;
use crate::app::session::Session;
use crate::domain::errors::{BridgeError, BridgeResult};
use crate::domain::model::{ComponentKind, ModuleInfo, names_match};
use crate::infra::host::{Host, RawHandle};

/// A resolved code buffer. The handle is released when the value is dropped.
#[derive(Debug)]
pub struct CodeModule<'h, H: Host + ?Sized> {
    guard: HandleGuard<'h, H>,
    handle: RawHandle,
    name: String,
    kind: ComponentKind,
}

impl<'h, H: Host + ?Sized> CodeModule<'h, H> {
    pub fn handle(&self) -> RawHandle {
        self.handle
    }

    pub fn host(&self) -> &'h H {
        self.guard.host()
    }

    /// Name as the project spells it.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ComponentKind {
        self.kind
    }
}

/// Find the code module called `module` (case-insensitive).
///
/// Every component inspected along the way is released before the next one is fetched; the
/// matching component is released as soon as its code module has been obtained.
pub fn locate<'h, H: Host + ?Sized>(
    session: &Session<'h, H>,
    module: &str,
) -> BridgeResult<CodeModule<'h, H>> {
    let host = session.host();
    let project_handle = host
        .active_project(session.application_handle())
        .map_err(|error| session.host_error("active_project", error))?;
    let _project = HandleGuard::new(host, project_handle, "project");
    let components_handle = host
        .components(project_handle)
        .map_err(|error| session.host_error("components", error))?;
    let _components = HandleGuard::new(host, components_handle, "components");

    let count = host
        .component_count(components_handle)
        .map_err(|error| session.host_error("component_count", error))?;
    for index in 1..=count {
        let component_handle = host
            .component(components_handle, index)
            .map_err(|error| session.host_error("component", error))?;
        let _component = HandleGuard::new(host, component_handle, "component");
        let name = host
            .component_name(component_handle)
            .map_err(|error| session.host_error("component_name", error))?;
        if !names_match(&name, module) {
            trace!(candidate = %name, "skipping component");
            continue;
        }

        let kind = host
            .component_kind(component_handle)
            .map_err(|error| session.host_error("component_kind", error))?;
        let code_handle = host
            .code_module(component_handle)
            .map_err(|error| session.host_error("code_module", error))?;
        debug!(module = %name, %kind, "located module");
        return Ok(CodeModule {
            guard: HandleGuard::new(host, code_handle, "code module"),
            handle: code_handle,
            name,
            kind,
        });
    }

    Err(BridgeError::ModuleNotFound {
        module: module.to_owned(),
    })
}

/// Name, kind and line count of every component in the project, in project order.
pub fn list_modules<H: Host + ?Sized>(session: &Session<'_, H>) -> BridgeResult<Vec<ModuleInfo>> {
    let host = session.host();
    let project_handle = host
        .active_project(session.application_handle())
        .map_err(|error| session.host_error("active_project", error))?;
    let _project = HandleGuard::new(host, project_handle, "project");
    let components_handle = host
        .components(project_handle)
        .map_err(|error| session.host_error("components", error))?;
    let _components = HandleGuard::new(host, components_handle, "components");

    let count = host
        .component_count(components_handle)
        .map_err(|error| session.host_error("component_count", error))?;
    let mut modules = Vec::with_capacity(count);
    for index in 1..=count {
        let component_handle = host
            .component(components_handle, index)
            .map_err(|error| session.host_error("component", error))?;
        let _component = HandleGuard::new(host, component_handle, "component");
        let name = host
            .component_name(component_handle)
            .map_err(|error| session.host_error("component_name", error))?;
        let kind = host
            .component_kind(component_handle)
            .map_err(|error| session.host_error("component_kind", error))?;
        let code_handle = host
            .code_module(component_handle)
            .map_err(|error| session.host_error("code_module", error))?;
        let _code = HandleGuard::new(host, code_handle, "code module");
        let line_count = host
            .count_of_lines(code_handle)
            .map_err(|error| session.host_error("count_of_lines", error))?;
        modules.push(ModuleInfo {
            name,
            kind,
            line_count,
        });
    }
    Ok(modules)
}
