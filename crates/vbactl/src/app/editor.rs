//! Whole-module and procedure-level edits expressed as host line operations.
//!
//! The host has no transactions and no undo: every delete and insert lands immediately. Each
//! write therefore takes one fresh [`ProcedureIndex`] query right before it mutates and never
//! reuses line numbers computed before an earlier mutation.

use serde::Serialize;
use tracing::{debug, info};

use crate::app::index::{ProcedureIndex, declared_name};
use crate::app::locator::CodeModule;
use crate::app::preprocess::preprocess;
use crate::app::session::Session;
use crate::domain::errors::{BridgeError, BridgeResult};
use crate::domain::model::{Disposition, Procedure};
use crate::infra::host::{Host, RawHandle};

/// Text of a procedure together with the range it was read from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcedureText {
    pub procedure: Procedure,
    pub code: String,
}

/// Where [`StructuralEditor::add_procedure`] put the new code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AddedProcedure {
    pub name: String,
    pub start_line: usize,
    pub line_count: usize,
}

/// What [`StructuralEditor::write_procedure`] did and how many lines it wrote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProcedureWrite {
    pub disposition: Disposition,
    pub line_count: usize,
}

/// Edits one code module through the host's line primitives.
pub struct StructuralEditor<'a, 'h, H: Host + ?Sized> {
    session: &'a Session<'h, H>,
    module: &'a CodeModule<'h, H>,
    host: &'h H,
    handle: RawHandle,
}

impl<'a, 'h, H: Host + ?Sized> StructuralEditor<'a, 'h, H> {
    pub fn new(session: &'a Session<'h, H>, module: &'a CodeModule<'h, H>) -> Self {
        Self {
            session,
            module,
            host: module.host(),
            handle: module.handle(),
        }
    }

    fn index(&self) -> ProcedureIndex<'a, 'h, H> {
        ProcedureIndex::new(self.session, self.module)
    }

    pub fn line_count(&self) -> BridgeResult<usize> {
        self.host
            .count_of_lines(self.handle)
            .map_err(|error| self.session.host_error("count_of_lines", error))
    }

    fn read_lines(&self, start: usize, count: usize) -> BridgeResult<String> {
        self.host
            .lines(self.handle, start, count)
            .map_err(|error| self.session.host_error("lines", error))
    }

    fn delete(&self, start: usize, count: usize) -> BridgeResult<()> {
        debug!(module = self.module.name(), start, count, "deleting lines");
        self.host
            .delete_lines(self.handle, start, count)
            .map_err(|error| self.session.host_error("delete_lines", error))
    }

    fn insert(&self, line: usize, text: &str) -> BridgeResult<()> {
        debug!(module = self.module.name(), line, "inserting lines");
        self.host
            .insert_lines(self.handle, line, text)
            .map_err(|error| self.session.host_error("insert_lines", error))
    }

    fn not_found(&self, procedure: &str) -> BridgeError {
        BridgeError::ProcedureNotFound {
            module: self.module.name().to_owned(),
            procedure: procedure.to_owned(),
        }
    }

    /// The whole module verbatim; empty when the module has no lines.
    pub fn read_module(&self) -> BridgeResult<String> {
        let count = self.line_count()?;
        if count == 0 {
            return Ok(String::new());
        }
        self.read_lines(1, count)
    }

    /// Replace the entire module with `code`. Returns the resulting line count.
    pub fn write_module(&self, code: &str) -> BridgeResult<usize> {
        let code = preprocess(code);
        let existing = self.line_count()?;
        if existing > 0 {
            self.delete(1, existing)?;
        }
        if !code.is_empty() {
            self.insert(1, &code)?;
        }
        let written = self.line_count()?;
        info!(module = self.module.name(), existing, written, "module replaced");
        Ok(written)
    }

    pub fn read_procedure(&self, name: &str) -> BridgeResult<ProcedureText> {
        if self.line_count()? == 0 {
            return Err(self.not_found(name));
        }
        let procedure = self.index().find(name)?.ok_or_else(|| self.not_found(name))?;
        let code = self.read_lines(procedure.start_line, procedure.line_count)?;
        Ok(ProcedureText { procedure, code })
    }

    /// Replace the procedure called `name` in place, or append `code` when it does not exist.
    pub fn write_procedure(&self, name: &str, code: &str) -> BridgeResult<ProcedureWrite> {
        let code = preprocess(code);
        let written = |disposition: Disposition| ProcedureWrite {
            disposition,
            line_count: code.split("\r\n").count(),
        };

        if self.line_count()? == 0 {
            self.insert(1, &code)?;
            info!(module = self.module.name(), procedure = name, "procedure added to empty module");
            return Ok(written(Disposition::Added));
        }

        if let Some(existing) = self.index().find(name)? {
            self.delete(existing.start_line, existing.line_count)?;
            self.insert(existing.start_line, &code)?;
            info!(
                module = self.module.name(),
                procedure = name,
                start_line = existing.start_line,
                "procedure replaced"
            );
            return Ok(written(Disposition::Replaced));
        }

        let current = self.line_count()?;
        let mut insert_line = current + 1;
        if current > 0 {
            self.insert(insert_line, "")?;
            insert_line += 1;
        }
        self.insert(insert_line, &code)?;
        info!(module = self.module.name(), procedure = name, insert_line, "procedure appended");
        Ok(written(Disposition::Added))
    }

    /// Insert a new procedure after `insert_after`, or at the end of the module.
    ///
    /// Fails when a procedure with the declared name already exists; replacing is
    /// [`write_procedure`](Self::write_procedure)'s job.
    pub fn add_procedure(
        &self,
        code: &str,
        insert_after: Option<&str>,
    ) -> BridgeResult<AddedProcedure> {
        let code = preprocess(code);
        let name = declared_name(&code).ok_or_else(|| BridgeError::MalformedProcedureDeclaration {
            first_line: code
                .lines()
                .find(|line| !line.trim().is_empty())
                .unwrap_or_default()
                .to_owned(),
        })?;

        let index = self.index();
        if index.find(&name)?.is_some() {
            return Err(BridgeError::ProcedureAlreadyExists {
                module: self.module.name().to_owned(),
                procedure: name,
            });
        }

        let current = self.line_count()?;
        let mut insert_line = match insert_after {
            Some(anchor) => {
                let anchor = index.find(anchor)?.ok_or_else(|| self.not_found(anchor))?;
                anchor.end_line() + 1
            }
            None => current + 1,
        };
        if current > 0 {
            self.insert(insert_line, "")?;
            insert_line += 1;
        }
        self.insert(insert_line, &code)?;

        let line_count = code.split("\r\n").count();
        info!(
            module = self.module.name(),
            procedure = %name,
            insert_line,
            "procedure added"
        );
        Ok(AddedProcedure {
            name,
            start_line: insert_line,
            line_count,
        })
    }

    /// Remove exactly the procedure's own lines. Separator lines around it are left in place.
    pub fn delete_procedure(&self, name: &str) -> BridgeResult<Procedure> {
        if self.line_count()? == 0 {
            return Err(self.not_found(name));
        }
        let procedure = self.index().find(name)?.ok_or_else(|| self.not_found(name))?;
        self.delete(procedure.start_line, procedure.line_count)?;
        info!(
            module = self.module.name(),
            procedure = %procedure.name,
            start_line = procedure.start_line,
            "procedure deleted"
        );
        Ok(procedure)
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;
    use crate::app::locator::locate;
    use crate::domain::model::ComponentKind;
    use crate::infra::memory::MemoryHost;

    const APP: &str = "Access.Application";
    const DOC: &str = "C:\\db.accdb";

    fn with_editor<T>(host: &MemoryHost, run: impl FnOnce(&StructuralEditor<'_, '_, MemoryHost>) -> T) -> T {
        let session = Session::resolve(host, APP, Path::new(DOC)).unwrap();
        let module = locate(&session, "Main").unwrap();
        let editor = StructuralEditor::new(&session, &module);
        run(&editor)
    }

    #[test]
    fn add_after_anchor_places_code_behind_it() {
        let host = MemoryHost::new(APP).with_document(DOC).with_module(
            "Main",
            ComponentKind::Standard,
            "Sub A()\r\nEnd Sub\r\n\r\nSub C()\r\nEnd Sub",
        );
        let added = with_editor(&host, |editor| {
            editor.add_procedure("Sub B()\nEnd Sub", Some("a")).unwrap()
        });
        assert_eq!(added.name, "B");
        assert_eq!(added.start_line, 4);
        assert_eq!(
            host.module_lines("Main").unwrap(),
            vec!["Sub A()", "End Sub", "", "Sub B()", "End Sub", "", "Sub C()", "End Sub"]
        );
    }

    #[test]
    fn add_to_empty_module_has_no_separator() {
        let host = MemoryHost::new(APP)
            .with_document(DOC)
            .with_module("Main", ComponentKind::Standard, "");
        with_editor(&host, |editor| {
            editor.add_procedure("Function F()\r\nEnd Function", None).unwrap()
        });
        assert_eq!(
            host.module_lines("Main").unwrap(),
            vec!["Function F()", "End Function"]
        );
    }

    #[test]
    fn add_rejects_undeclared_code() {
        let host = MemoryHost::new(APP)
            .with_document(DOC)
            .with_module("Main", ComponentKind::Standard, "Sub A()\r\nEnd Sub");
        let err = with_editor(&host, |editor| {
            editor.add_procedure("\r\nx = 1\r\n", None).unwrap_err()
        });
        assert!(
            matches!(err, BridgeError::MalformedProcedureDeclaration { first_line } if first_line == "x = 1")
        );
        assert_eq!(host.module_lines("Main").unwrap().len(), 2);
    }

    #[test]
    fn add_with_unknown_anchor_fails_without_mutation() {
        let host = MemoryHost::new(APP)
            .with_document(DOC)
            .with_module("Main", ComponentKind::Standard, "Sub A()\r\nEnd Sub");
        let err = with_editor(&host, |editor| {
            editor.add_procedure("Sub B()\r\nEnd Sub", Some("Nope")).unwrap_err()
        });
        assert!(matches!(err, BridgeError::ProcedureNotFound { procedure, .. } if procedure == "Nope"));
        assert_eq!(host.module_lines("Main").unwrap().len(), 2);
    }

    #[test]
    fn write_procedure_reports_preprocessed_length() {
        let host = MemoryHost::new(APP)
            .with_document(DOC)
            .with_module("Main", ComponentKind::Standard, "Sub A()\r\nEnd Sub");
        let written = with_editor(&host, |editor| {
            editor
                .write_procedure("a", "Sub A()\n  If x &amp;lt; 1 Then Beep\nEnd Sub")
                .unwrap()
        });
        assert_eq!(
            written,
            ProcedureWrite {
                disposition: Disposition::Replaced,
                line_count: 3,
            }
        );
        assert_eq!(host.module_lines("Main").unwrap()[1], "  If x < 1 Then Beep");
    }

    #[test]
    fn empty_module_has_no_procedures_to_read_or_delete() {
        let host = MemoryHost::new(APP)
            .with_document(DOC)
            .with_module("Main", ComponentKind::Standard, "");
        with_editor(&host, |editor| {
            assert_eq!(editor.read_module().unwrap(), "");
            assert!(matches!(
                editor.read_procedure("A"),
                Err(BridgeError::ProcedureNotFound { .. })
            ));
            assert!(matches!(
                editor.delete_procedure("A"),
                Err(BridgeError::ProcedureNotFound { .. })
            ));
        });
        assert_eq!(host.module_lines("Main").unwrap(), Vec::<String>::new());
    }

    #[test]
    fn delete_leaves_separator_lines() {
        let host = MemoryHost::new(APP).with_document(DOC).with_module(
            "Main",
            ComponentKind::Standard,
            "Sub A()\r\nEnd Sub\r\n\r\nSub B()\r\nEnd Sub",
        );
        let deleted = with_editor(&host, |editor| editor.delete_procedure("B").unwrap());
        assert_eq!((deleted.start_line, deleted.line_count), (4, 2));
        assert_eq!(host.module_lines("Main").unwrap(), vec!["Sub A()", "End Sub", ""]);
    }

    #[test]
    fn write_module_with_empty_code_clears_it() {
        let host = MemoryHost::new(APP)
            .with_document(DOC)
            .with_module("Main", ComponentKind::Standard, "Sub A()\r\nEnd Sub");
        let written = with_editor(&host, |editor| editor.write_module("").unwrap());
        assert_eq!(written, 0);
        assert!(host.module_lines("Main").unwrap().is_empty());
    }
}
