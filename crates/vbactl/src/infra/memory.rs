//! In-process host used for offline editing and as the instrumented test double.

use std::cell::RefCell;
use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::domain::errors::{HostError, HostResult};
use crate::domain::model::{ComponentKind, HostProcKind, names_match};
use crate::domain::status::{DISP_E_BADINDEX, DISP_E_MEMBERNOTFOUND, E_ACCESSDENIED, E_FAIL};
use crate::infra::host::{Host, RawHandle};

static DECLARATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^\s*(?:(?:public|private|friend)\s+)?(?:static\s+)?(?:sub|function|property\s+(get|let|set))\s+([\p{L}_][\p{L}\p{N}_]*)",
    )
    .expect("declaration pattern compiles")
});

static END_OF_PROCEDURE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*end\s+(?:sub|function|property)\b").expect("end pattern compiles")
});

/// One code container held by a [`MemoryHost`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryModule {
    pub name: String,
    pub kind: ComponentKind,
    pub lines: Vec<String>,
}

impl MemoryModule {
    pub fn new(name: impl Into<String>, kind: ComponentKind, code: &str) -> Self {
        let lines = if code.is_empty() {
            Vec::new()
        } else {
            split_lines(code)
        };
        Self {
            name: name.into(),
            kind,
            lines,
        }
    }

    /// Module text joined with CRLF.
    pub fn code(&self) -> String {
        self.lines.join("\r\n")
    }
}

/// Acquire/release bookkeeping.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HandleStats {
    pub acquired: usize,
    /// Release calls issued, successful or not.
    pub released: usize,
    /// Release calls naming a handle that was no longer live.
    pub invalid_releases: usize,
    pub live: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Object {
    Application,
    Document,
    Project,
    Components,
    Component(usize),
    CodeModule(usize),
}

#[derive(Debug)]
struct State {
    application: String,
    running: bool,
    document: Option<String>,
    trust_project_access: bool,
    modules: Vec<MemoryModule>,
    live: HashMap<u64, Object>,
    next_id: u64,
    stats: HandleStats,
    release_log: Vec<RawHandle>,
    faults: HashMap<&'static str, HostError>,
}

impl State {
    fn acquire(&mut self, object: Object) -> RawHandle {
        self.next_id += 1;
        self.live.insert(self.next_id, object);
        self.stats.acquired += 1;
        RawHandle::new(self.next_id)
    }

    fn object(&self, handle: RawHandle) -> HostResult<Object> {
        self.live
            .get(&handle.id())
            .copied()
            .ok_or_else(|| HostError::new(E_FAIL, format!("handle {handle} is not live")))
    }

    fn check_fault(&self, operation: &'static str) -> HostResult<()> {
        match self.faults.get(operation) {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }

    fn module(&self, handle: RawHandle) -> HostResult<&MemoryModule> {
        match self.object(handle)? {
            Object::CodeModule(index) => Ok(&self.modules[index]),
            other => Err(wrong_object("code module", other)),
        }
    }

    fn module_mut(&mut self, handle: RawHandle) -> HostResult<&mut MemoryModule> {
        match self.object(handle)? {
            Object::CodeModule(index) => Ok(&mut self.modules[index]),
            other => Err(wrong_object("code module", other)),
        }
    }

    fn component(&self, handle: RawHandle) -> HostResult<&MemoryModule> {
        match self.object(handle)? {
            Object::Component(index) => Ok(&self.modules[index]),
            other => Err(wrong_object("component", other)),
        }
    }

    fn expect(&self, handle: RawHandle, wanted: Object) -> HostResult<()> {
        let actual = self.object(handle)?;
        if actual == wanted {
            Ok(())
        } else {
            Err(wrong_object(&format!("{wanted:?}"), actual))
        }
    }
}

/// A complete, deterministic [`Host`] living in process memory.
///
/// Procedures span from their declaration line through the matching `End` line; every other
/// line is outside any procedure and makes [`Host::proc_of_line`] fail the way the real host
/// does for declarations and blank lines.
#[derive(Debug)]
pub struct MemoryHost {
    state: RefCell<State>,
}

impl MemoryHost {
    /// A running application with no document open.
    pub fn new(application: impl Into<String>) -> Self {
        Self {
            state: RefCell::new(State {
                application: application.into(),
                running: true,
                document: None,
                trust_project_access: true,
                modules: Vec::new(),
                live: HashMap::new(),
                next_id: 0,
                stats: HandleStats::default(),
                release_log: Vec::new(),
                faults: HashMap::new(),
            }),
        }
    }

    pub fn with_document(self, path: impl Into<String>) -> Self {
        self.set_document(Some(path.into()));
        self
    }

    pub fn with_module(self, name: impl Into<String>, kind: ComponentKind, code: &str) -> Self {
        self.add_module(MemoryModule::new(name, kind, code));
        self
    }

    pub fn application(&self) -> String {
        self.state.borrow().application.clone()
    }

    pub fn is_running(&self) -> bool {
        self.state.borrow().running
    }

    pub fn set_running(&self, running: bool) {
        self.state.borrow_mut().running = running;
    }

    pub fn document(&self) -> Option<String> {
        self.state.borrow().document.clone()
    }

    pub fn set_document(&self, path: Option<String>) {
        self.state.borrow_mut().document = path;
    }

    pub fn trusts_project_access(&self) -> bool {
        self.state.borrow().trust_project_access
    }

    pub fn set_trust_project_access(&self, trusted: bool) {
        self.state.borrow_mut().trust_project_access = trusted;
    }

    pub fn add_module(&self, module: MemoryModule) {
        self.state.borrow_mut().modules.push(module);
    }

    pub fn modules(&self) -> Vec<MemoryModule> {
        self.state.borrow().modules.clone()
    }

    /// Current CRLF-joined text of a module, looked up case-insensitively.
    pub fn module_code(&self, name: &str) -> Option<String> {
        self.state
            .borrow()
            .modules
            .iter()
            .find(|module| names_match(&module.name, name))
            .map(MemoryModule::code)
    }

    pub fn module_lines(&self, name: &str) -> Option<Vec<String>> {
        self.state
            .borrow()
            .modules
            .iter()
            .find(|module| names_match(&module.name, name))
            .map(|module| module.lines.clone())
    }

    pub fn stats(&self) -> HandleStats {
        let state = self.state.borrow();
        HandleStats {
            live: state.live.len(),
            ..state.stats
        }
    }

    /// Handles in the order they were passed to [`Host::release`].
    pub fn release_log(&self) -> Vec<RawHandle> {
        self.state.borrow().release_log.clone()
    }

    /// Make every subsequent call to `operation` fail with `error`.
    ///
    /// A failing `release` still drops the reference before reporting the error.
    pub fn fail_on(&self, operation: &'static str, error: HostError) {
        self.state.borrow_mut().faults.insert(operation, error);
    }
}

impl Host for MemoryHost {
    fn active_application(&self, prog_id: &str) -> HostResult<Option<RawHandle>> {
        let mut state = self.state.borrow_mut();
        state.check_fault("active_application")?;
        if !state.running || !names_match(&state.application, prog_id) {
            return Ok(None);
        }
        Ok(Some(state.acquire(Object::Application)))
    }

    fn current_document(&self, app: RawHandle) -> HostResult<Option<RawHandle>> {
        let mut state = self.state.borrow_mut();
        state.check_fault("current_document")?;
        state.expect(app, Object::Application)?;
        if state.document.is_none() {
            return Ok(None);
        }
        Ok(Some(state.acquire(Object::Document)))
    }

    fn document_path(&self, document: RawHandle) -> HostResult<String> {
        let state = self.state.borrow();
        state.check_fault("document_path")?;
        state.expect(document, Object::Document)?;
        state
            .document
            .clone()
            .ok_or_else(|| HostError::new(E_FAIL, "the document has been closed"))
    }

    fn active_project(&self, app: RawHandle) -> HostResult<RawHandle> {
        let mut state = self.state.borrow_mut();
        state.check_fault("active_project")?;
        state.expect(app, Object::Application)?;
        if state.document.is_none() {
            return Err(HostError::new(E_FAIL, "no project is open"));
        }
        if !state.trust_project_access {
            return Err(HostError::new(
                E_ACCESSDENIED,
                "programmatic access to Visual Basic Project is not trusted",
            ));
        }
        Ok(state.acquire(Object::Project))
    }

    fn components(&self, project: RawHandle) -> HostResult<RawHandle> {
        let mut state = self.state.borrow_mut();
        state.check_fault("components")?;
        state.expect(project, Object::Project)?;
        Ok(state.acquire(Object::Components))
    }

    fn component_count(&self, components: RawHandle) -> HostResult<usize> {
        let state = self.state.borrow();
        state.check_fault("component_count")?;
        state.expect(components, Object::Components)?;
        Ok(state.modules.len())
    }

    fn component(&self, components: RawHandle, index: usize) -> HostResult<RawHandle> {
        let mut state = self.state.borrow_mut();
        state.check_fault("component")?;
        state.expect(components, Object::Components)?;
        if index == 0 || index > state.modules.len() {
            return Err(HostError::new(DISP_E_BADINDEX, "invalid index"));
        }
        Ok(state.acquire(Object::Component(index - 1)))
    }

    fn component_name(&self, component: RawHandle) -> HostResult<String> {
        let state = self.state.borrow();
        state.check_fault("component_name")?;
        Ok(state.component(component)?.name.clone())
    }

    fn component_kind(&self, component: RawHandle) -> HostResult<ComponentKind> {
        let state = self.state.borrow();
        state.check_fault("component_kind")?;
        Ok(state.component(component)?.kind)
    }

    fn code_module(&self, component: RawHandle) -> HostResult<RawHandle> {
        let mut state = self.state.borrow_mut();
        state.check_fault("code_module")?;
        let index = match state.object(component)? {
            Object::Component(index) => index,
            other => return Err(wrong_object("component", other)),
        };
        Ok(state.acquire(Object::CodeModule(index)))
    }

    fn count_of_lines(&self, module: RawHandle) -> HostResult<usize> {
        let state = self.state.borrow();
        state.check_fault("count_of_lines")?;
        Ok(state.module(module)?.lines.len())
    }

    fn lines(&self, module: RawHandle, start: usize, count: usize) -> HostResult<String> {
        let state = self.state.borrow();
        state.check_fault("lines")?;
        let module = state.module(module)?;
        let range = line_range(module.lines.len(), start, count)?;
        Ok(module.lines[range].join("\r\n"))
    }

    fn delete_lines(&self, module: RawHandle, start: usize, count: usize) -> HostResult<()> {
        let mut state = self.state.borrow_mut();
        state.check_fault("delete_lines")?;
        let module = state.module_mut(module)?;
        let range = line_range(module.lines.len(), start, count)?;
        module.lines.drain(range);
        Ok(())
    }

    fn insert_lines(&self, module: RawHandle, line: usize, text: &str) -> HostResult<()> {
        let mut state = self.state.borrow_mut();
        state.check_fault("insert_lines")?;
        let module = state.module_mut(module)?;
        if line == 0 || line > module.lines.len() + 1 {
            return Err(HostError::new(DISP_E_BADINDEX, format!("invalid line {line}")));
        }
        let at = line - 1;
        module.lines.splice(at..at, split_lines(text));
        Ok(())
    }

    fn proc_of_line(&self, module: RawHandle, line: usize) -> HostResult<(String, HostProcKind)> {
        let state = self.state.borrow();
        state.check_fault("proc_of_line")?;
        let module = state.module(module)?;
        if line == 0 || line > module.lines.len() {
            return Err(HostError::new(DISP_E_BADINDEX, format!("invalid line {line}")));
        }
        procedure_spans(&module.lines)
            .into_iter()
            .find(|span| span.start <= line && line <= span.end)
            .map(|span| (span.name, span.kind))
            .ok_or_else(|| HostError::new(E_FAIL, format!("line {line} is not inside a procedure")))
    }

    fn proc_start_line(
        &self,
        module: RawHandle,
        name: &str,
        kind: HostProcKind,
    ) -> HostResult<usize> {
        let state = self.state.borrow();
        state.check_fault("proc_start_line")?;
        find_span(&state.module(module)?.lines, name, kind).map(|span| span.start)
    }

    fn proc_count_lines(
        &self,
        module: RawHandle,
        name: &str,
        kind: HostProcKind,
    ) -> HostResult<usize> {
        let state = self.state.borrow();
        state.check_fault("proc_count_lines")?;
        find_span(&state.module(module)?.lines, name, kind).map(|span| span.end - span.start + 1)
    }

    fn release(&self, handle: RawHandle) -> HostResult<()> {
        let mut state = self.state.borrow_mut();
        state.stats.released += 1;
        state.release_log.push(handle);
        if state.live.remove(&handle.id()).is_none() {
            state.stats.invalid_releases += 1;
            return Err(HostError::new(
                E_FAIL,
                format!("handle {handle} released more than once"),
            ));
        }
        state.check_fault("release")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Span {
    name: String,
    kind: HostProcKind,
    start: usize,
    end: usize,
}

fn procedure_spans(lines: &[String]) -> Vec<Span> {
    let mut spans = Vec::new();
    let mut open: Option<Span> = None;

    for (idx, line) in lines.iter().enumerate() {
        let number = idx + 1;
        match open.take() {
            Some(mut span) => {
                if END_OF_PROCEDURE.is_match(line) {
                    span.end = number;
                    spans.push(span);
                } else {
                    open = Some(span);
                }
            }
            None => {
                if let Some(caps) = DECLARATION.captures(line) {
                    let kind = match caps.get(1).map(|m| m.as_str().to_ascii_lowercase()) {
                        Some(accessor) if accessor == "get" => HostProcKind::Get,
                        Some(accessor) if accessor == "let" => HostProcKind::Let,
                        Some(_) => HostProcKind::Set,
                        None => HostProcKind::Proc,
                    };
                    open = Some(Span {
                        name: caps[2].to_string(),
                        kind,
                        start: number,
                        end: number,
                    });
                }
            }
        }
    }

    if let Some(mut span) = open {
        span.end = lines.len();
        spans.push(span);
    }
    spans
}

fn find_span(lines: &[String], name: &str, kind: HostProcKind) -> HostResult<Span> {
    procedure_spans(lines)
        .into_iter()
        .find(|span| span.kind == kind && names_match(&span.name, name))
        .ok_or_else(|| {
            HostError::new(
                DISP_E_MEMBERNOTFOUND,
                format!("Sub or Function not defined: {name}"),
            )
        })
}

fn line_range(len: usize, start: usize, count: usize) -> HostResult<std::ops::Range<usize>> {
    if start == 0 || start + count > len + 1 {
        return Err(HostError::new(
            DISP_E_BADINDEX,
            format!("lines {start}+{count} out of range for {len} lines"),
        ));
    }
    Ok(start - 1..start - 1 + count)
}

fn split_lines(text: &str) -> Vec<String> {
    text.replace("\r\n", "\n")
        .replace('\r', "\n")
        .split('\n')
        .map(str::to_owned)
        .collect()
}

fn wrong_object(wanted: &str, actual: Object) -> HostError {
    HostError::new(
        DISP_E_MEMBERNOTFOUND,
        format!("expected a {wanted} handle, got {actual:?}"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    const MODULE: &str = "Option Explicit\r\n\r\nPublic Sub Alpha()\r\n    x = 1\r\nEnd Sub\r\n\r\nPrivate Function Beta() As Long\r\n    Beta = 2\r\nEnd Function";

    fn open_module(host: &MemoryHost) -> RawHandle {
        let app = host.active_application("Access.Application").unwrap().unwrap();
        let project = host.active_project(app).unwrap();
        let components = host.components(project).unwrap();
        let component = host.component(components, 1).unwrap();
        host.code_module(component).unwrap()
    }

    #[test]
    fn spans_follow_declarations_and_end_lines() {
        let module = MemoryModule::new("M", ComponentKind::Standard, MODULE);
        let spans = procedure_spans(&module.lines);
        assert_eq!(spans.len(), 2);
        assert_eq!((spans[0].name.as_str(), spans[0].start, spans[0].end), ("Alpha", 3, 5));
        assert_eq!((spans[1].name.as_str(), spans[1].start, spans[1].end), ("Beta", 7, 9));
    }

    #[test]
    fn insert_splits_crlf_and_blank_text_adds_one_line() {
        let host = MemoryHost::new("Access.Application")
            .with_document("C:\\db.accdb")
            .with_module("M", ComponentKind::Standard, "a");
        let module = open_module(&host);

        host.insert_lines(module, 2, "b\r\nc").unwrap();
        host.insert_lines(module, 2, "").unwrap();
        assert_eq!(host.module_lines("m").unwrap(), vec!["a", "", "b", "c"]);
        assert_eq!(host.lines(module, 3, 2).unwrap(), "b\r\nc");
    }

    #[test]
    fn proc_of_line_fails_outside_procedures() {
        let host = MemoryHost::new("Access.Application")
            .with_document("C:\\db.accdb")
            .with_module("M", ComponentKind::Standard, MODULE);
        let module = open_module(&host);

        assert!(host.proc_of_line(module, 1).is_err());
        assert_eq!(
            host.proc_of_line(module, 4).unwrap(),
            ("Alpha".to_string(), HostProcKind::Proc)
        );
        assert_eq!(host.proc_count_lines(module, "beta", HostProcKind::Proc).unwrap(), 3);
    }

    #[test]
    fn non_ascii_procedures_are_spanned_and_found() {
        let host = MemoryHost::new("Access.Application")
            .with_document("C:\\db.accdb")
            .with_module("Ärger", ComponentKind::Standard, "Sub Größe()\r\nEnd Sub");
        let module = open_module(&host);

        assert_eq!(
            host.proc_of_line(module, 2).unwrap(),
            ("Größe".to_string(), HostProcKind::Proc)
        );
        assert_eq!(host.proc_start_line(module, "GRÖßE", HostProcKind::Proc).unwrap(), 1);
        assert_eq!(host.proc_count_lines(module, "größe", HostProcKind::Proc).unwrap(), 2);
        assert_eq!(host.module_code("ärger").unwrap(), "Sub Größe()\r\nEnd Sub");
    }

    #[test]
    fn double_release_is_reported() {
        let host = MemoryHost::new("Access.Application");
        let app = host.active_application("access.application").unwrap().unwrap();
        host.release(app).unwrap();
        assert!(host.release(app).is_err());
        let stats = host.stats();
        assert_eq!(stats.acquired, 1);
        assert_eq!(stats.released, 2);
        assert_eq!(stats.invalid_releases, 1);
        assert_eq!(stats.live, 0);
    }

    #[test]
    fn untrusted_project_access_is_denied() {
        let host = MemoryHost::new("Access.Application").with_document("C:\\db.accdb");
        host.set_trust_project_access(false);
        let app = host.active_application("Access.Application").unwrap().unwrap();
        let err = host.active_project(app).unwrap_err();
        assert_eq!(err.status, E_ACCESSDENIED);
    }
}
