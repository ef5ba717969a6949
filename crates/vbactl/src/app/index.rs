//! Structural view over a module's line buffer.
//!
//! The host only answers line-oriented questions ("which procedure owns line 12?", "where does
//! `Foo` start?"). This module turns those answers into [`Procedure`] values. Nothing here is
//! cached: every query goes back to the host, because any edit (ours or a human's in the host's
//! own editor) moves the line numbers of everything after it.

use std::collections::HashSet;
use std::ops::ControlFlow;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::trace;

use crate::app::locator::CodeModule;
use crate::app::session::Session;
use crate::domain::errors::{BridgeError, BridgeResult, HostError};
use crate::domain::model::{
    HostProcKind, Procedure, ProcedureKind, Visibility, name_key, names_match,
};
use crate::infra::host::{Host, RawHandle};

const IDENTIFIER: &str = r"([\p{L}_][\p{L}\p{N}_]*)";
const MODIFIERS: &str = r"(?i)^\s*(?:(?:public|private|friend)\s+)?(?:static\s+)?";

static DECLARATION_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        format!(r"{MODIFIERS}sub\s+{IDENTIFIER}"),
        format!(r"{MODIFIERS}function\s+{IDENTIFIER}"),
        format!(r"{MODIFIERS}property\s+(?:get|let|set)\s+{IDENTIFIER}"),
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).expect("declaration pattern compiles"))
    .collect()
});

/// Read-only procedure queries against one code module.
pub struct ProcedureIndex<'a, 'h, H: Host + ?Sized> {
    session: &'a Session<'h, H>,
    host: &'h H,
    module: RawHandle,
}

impl<'a, 'h, H: Host + ?Sized> ProcedureIndex<'a, 'h, H> {
    pub fn new(session: &'a Session<'h, H>, module: &'a CodeModule<'h, H>) -> Self {
        Self {
            session,
            host: module.host(),
            module: module.handle(),
        }
    }

    fn host_error(&self, operation: &'static str, error: HostError) -> BridgeError {
        self.session.host_error(operation, error)
    }

    pub fn line_count(&self) -> BridgeResult<usize> {
        self.host
            .count_of_lines(self.module)
            .map_err(|error| self.host_error("count_of_lines", error))
    }

    /// Owning procedure of a 1-based line, or `None` for declarations and blank lines.
    pub fn procedure_at(&self, line: usize) -> BridgeResult<Option<(String, HostProcKind)>> {
        match self.host.proc_of_line(self.module, line) {
            Ok((name, _)) if name.trim().is_empty() => Ok(None),
            Ok(owner) => Ok(Some(owner)),
            Err(error) if error.category().is_expected_for_line_query() => {
                trace!(line, %error, "line is outside any procedure");
                Ok(None)
            }
            Err(error) => Err(self.host_error("proc_of_line", error)),
        }
    }

    /// `(start_line, line_count)` of a procedure as the host reports it.
    pub fn bounds_of(&self, name: &str, kind: HostProcKind) -> BridgeResult<(usize, usize)> {
        let start = self
            .host
            .proc_start_line(self.module, name, kind)
            .map_err(|error| self.host_error("proc_start_line", error))?;
        let count = self
            .host
            .proc_count_lines(self.module, name, kind)
            .map_err(|error| self.host_error("proc_count_lines", error))?;
        Ok((start, count))
    }

    /// Every distinct procedure in line order.
    pub fn procedures(&self) -> BridgeResult<Vec<Procedure>> {
        let mut found = Vec::new();
        self.scan(|procedure| {
            found.push(procedure);
            ControlFlow::Continue(())
        })?;
        Ok(found)
    }

    /// First procedure whose name matches case-insensitively.
    pub fn find(&self, name: &str) -> BridgeResult<Option<Procedure>> {
        let mut hit = None;
        self.scan(|procedure| {
            if names_match(&procedure.name, name) {
                hit = Some(procedure);
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        })?;
        Ok(hit)
    }

    /// Walk lines 1..=N and resolve each procedure name the first time it is seen.
    ///
    /// Every line of a procedure reports the same owner, so names are deduplicated before any
    /// bounds are requested. Property accessors sharing a name count once.
    fn scan(&self, mut visit: impl FnMut(Procedure) -> ControlFlow<()>) -> BridgeResult<()> {
        let total = self.line_count()?;
        let mut seen: HashSet<String> = HashSet::new();
        let mut line = 1;
        while line <= total {
            let Some((name, kind)) = self.procedure_at(line)? else {
                line += 1;
                continue;
            };
            if !seen.insert(name_key(&name)) {
                line += 1;
                continue;
            }

            let procedure = self.resolve(name, kind)?;
            let next = procedure.end_line() + 1;
            if visit(procedure).is_break() {
                return Ok(());
            }
            line = next.max(line + 1);
        }
        Ok(())
    }

    fn resolve(&self, name: String, host_kind: HostProcKind) -> BridgeResult<Procedure> {
        let (start_line, line_count) = self.bounds_of(&name, host_kind)?;
        let text = if line_count == 0 {
            String::new()
        } else {
            self.host
                .lines(self.module, start_line, line_count)
                .map_err(|error| self.host_error("lines", error))?
        };
        let header = declaration_line(&text);
        Ok(Procedure {
            name,
            kind: refine_kind(host_kind, header),
            visibility: detect_visibility(header),
            start_line,
            line_count,
        })
    }
}

/// Name declared by the first recognised `Sub`, `Function` or `Property` line in `code`.
pub fn declared_name(code: &str) -> Option<String> {
    code.lines().find_map(|line| {
        DECLARATION_PATTERNS
            .iter()
            .find_map(|pattern| pattern.captures(line))
            .map(|caps| caps[1].to_string())
    })
}

fn is_declaration(line: &str) -> bool {
    DECLARATION_PATTERNS
        .iter()
        .any(|pattern| pattern.is_match(line))
}

/// The declaration line of a procedure's text, falling back to its first non-blank line.
///
/// The host may attribute leading comments to the procedure that follows them.
pub fn declaration_line(text: &str) -> &str {
    text.lines()
        .find(|line| is_declaration(line))
        .or_else(|| text.lines().find(|line| !line.trim().is_empty()))
        .unwrap_or("")
}

/// Visibility keyword at the start of a declaration line; unqualified procedures are public.
pub fn detect_visibility(line: &str) -> Visibility {
    let line = line.trim().to_lowercase();
    if line.starts_with("private ") {
        Visibility::Private
    } else if line.starts_with("friend ") {
        Visibility::Friend
    } else {
        Visibility::Public
    }
}

/// Split the host's combined sub/function kind using the declaration keyword.
pub fn refine_kind(kind: HostProcKind, line: &str) -> ProcedureKind {
    match kind {
        HostProcKind::Get => ProcedureKind::PropertyGet,
        HostProcKind::Let => ProcedureKind::PropertyLet,
        HostProcKind::Set => ProcedureKind::PropertySet,
        HostProcKind::Proc => {
            let words: String = line
                .chars()
                .map(|c| {
                    if c.is_alphanumeric() || c == '_' {
                        c.to_ascii_lowercase()
                    } else {
                        ' '
                    }
                })
                .collect();
            let padded = format!(" {words} ");
            match (padded.find(" function "), padded.find(" sub ")) {
                (Some(function), Some(sub)) if function < sub => ProcedureKind::Function,
                (Some(_), None) => ProcedureKind::Function,
                _ => ProcedureKind::Sub,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;
    use crate::app::locator::locate;
    use crate::domain::model::ComponentKind;
    use crate::domain::status::{E_ACCESSDENIED, RPC_E_SERVERCALL_RETRYLATER};
    use crate::infra::memory::MemoryHost;

    const APP: &str = "Access.Application";
    const DOC: &str = "C:\\db.accdb";
    const CODE: &str = "Option Explicit\r\n\r\nPrivate mName As String\r\n\r\nPublic Function Total(a, b) As Long\r\n    Total = a + b\r\nEnd Function\r\n\r\nSub Log(msg)\r\n    Debug.Print msg\r\nEnd Sub\r\n\r\nFriend Property Get Name() As String\r\n    Name = mName\r\nEnd Property\r\n\r\nFriend Property Let Name(value As String)\r\n    mName = value\r\nEnd Property";

    fn host() -> MemoryHost {
        MemoryHost::new(APP)
            .with_document(DOC)
            .with_module("Customer", ComponentKind::Class, CODE)
    }

    #[test]
    fn enumerates_distinct_procedures_once() {
        let host = host();
        let session = Session::resolve(&host, APP, Path::new(DOC)).unwrap();
        let module = locate(&session, "Customer").unwrap();
        let index = ProcedureIndex::new(&session, &module);

        let procedures = index.procedures().unwrap();
        let summary: Vec<_> = procedures
            .iter()
            .map(|p| (p.name.as_str(), p.kind, p.visibility, p.start_line, p.line_count))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("Total", ProcedureKind::Function, Visibility::Public, 5, 3),
                ("Log", ProcedureKind::Sub, Visibility::Public, 9, 3),
                ("Name", ProcedureKind::PropertyGet, Visibility::Friend, 13, 3),
            ]
        );
    }

    #[test]
    fn find_matches_case_insensitively() {
        let host = host();
        let session = Session::resolve(&host, APP, Path::new(DOC)).unwrap();
        let module = locate(&session, "Customer").unwrap();
        let index = ProcedureIndex::new(&session, &module);

        let log = index.find("LOG").unwrap().unwrap();
        assert_eq!((log.start_line, log.end_line()), (9, 11));
        assert!(index.find("Missing").unwrap().is_none());
        assert_eq!(index.procedure_at(2).unwrap(), None);
    }

    #[test]
    fn unexpected_line_query_failures_propagate() {
        let host = host();
        let session = Session::resolve(&host, APP, Path::new(DOC)).unwrap();
        let module = locate(&session, "Customer").unwrap();
        let index = ProcedureIndex::new(&session, &module);

        host.fail_on("proc_of_line", HostError::new(E_ACCESSDENIED, "denied"));
        assert!(matches!(
            index.procedures(),
            Err(BridgeError::AccessDenied { .. })
        ));

        host.fail_on(
            "proc_of_line",
            HostError::new(RPC_E_SERVERCALL_RETRYLATER, "busy"),
        );
        let err = index.procedures().unwrap_err();
        assert!(err.is_transient());
    }

    #[test]
    fn extracts_declared_names() {
        assert_eq!(
            declared_name("' helper\r\nPrivate Static Function Foo_1(x)\r\nEnd Function"),
            Some("Foo_1".into())
        );
        assert_eq!(
            declared_name("Public Property Set Target(v)"),
            Some("Target".into())
        );
        assert_eq!(declared_name("Dim x As Long"), None);
        assert_eq!(declared_name("Submit = 1"), None);
    }

    #[test]
    fn declared_names_may_use_any_letters() {
        assert_eq!(declared_name("Sub 集計()\r\nEnd Sub"), Some("集計".into()));
        assert_eq!(
            declared_name("Private Function Größe2() As Long"),
            Some("Größe2".into())
        );
    }

    #[test]
    fn find_folds_non_ascii_names() {
        let host = MemoryHost::new(APP).with_document(DOC).with_module(
            "Ärger",
            ComponentKind::Standard,
            "Sub Größe()\r\nEnd Sub\r\nSub Übersicht()\r\nEnd Sub",
        );
        let session = Session::resolve(&host, APP, Path::new(DOC)).unwrap();
        let module = locate(&session, "ärger").unwrap();
        let index = ProcedureIndex::new(&session, &module);

        let names: Vec<_> = index.procedures().unwrap().into_iter().map(|p| p.name).collect();
        assert_eq!(names, vec!["Größe", "Übersicht"]);
        assert_eq!(index.find("ÜBERSICHT").unwrap().unwrap().start_line, 3);
    }

    #[test]
    fn refines_ambiguous_kind_from_keyword() {
        assert_eq!(
            refine_kind(HostProcKind::Proc, "Public Function SubTotal() As Long"),
            ProcedureKind::Function
        );
        assert_eq!(
            refine_kind(HostProcKind::Proc, "Sub Run() ' calls a function"),
            ProcedureKind::Sub
        );
        assert_eq!(
            refine_kind(HostProcKind::Proc, "private sub FunctionKeys()"),
            ProcedureKind::Sub
        );
        assert_eq!(
            refine_kind(HostProcKind::Set, "Property Set X(v)"),
            ProcedureKind::PropertySet
        );
    }

    #[test]
    fn visibility_defaults_to_public() {
        assert_eq!(detect_visibility("  Private Sub A()"), Visibility::Private);
        assert_eq!(detect_visibility("FRIEND Function B()"), Visibility::Friend);
        assert_eq!(detect_visibility("Sub C()"), Visibility::Public);
        assert_eq!(detect_visibility("Public Sub D()"), Visibility::Public);
    }

    #[test]
    fn declaration_line_skips_leading_comments() {
        let text = "' Adds numbers\r\nPrivate Function Add()\r\nEnd Function";
        assert_eq!(declaration_line(text), "Private Function Add()");
        assert_eq!(declaration_line("\r\n' only comment"), "' only comment");
    }
}
