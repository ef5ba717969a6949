//! Per-call entry points: resolve, locate, edit, then back up and audit around the edit.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, warn};

use crate::app::editor::{AddedProcedure, ProcedureText, StructuralEditor};
use crate::app::index::ProcedureIndex;
use crate::app::locator::{self, CodeModule, locate};
use crate::app::session::Session;
use crate::domain::errors::BridgeResult;
use crate::domain::model::{Disposition, ModuleInfo, Procedure};
use crate::infra::audit::{AuditOperation, AuditRecord, AuditSink};
use crate::infra::backup::BackupStore;
use crate::infra::host::Host;

/// Outcome of [`Bridge::write_module`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModuleWrite {
    pub line_count: usize,
    pub backup: Option<PathBuf>,
}

/// Outcome of [`Bridge::delete_procedure`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcedureDeletion {
    pub procedure: Procedure,
    pub backup: Option<PathBuf>,
}

/// Named operations over one host.
///
/// Nothing is cached between calls: each method resolves a fresh session and module and
/// releases every handle before it returns, whether it succeeds or fails.
pub struct Bridge<'h, H: Host + ?Sized> {
    host: &'h H,
    application: String,
    backups: Option<Box<dyn BackupStore>>,
    audit: Option<Box<dyn AuditSink>>,
}

impl<'h, H: Host + ?Sized> Bridge<'h, H> {
    pub fn new(host: &'h H, application: impl Into<String>) -> Self {
        Self {
            host,
            application: application.into(),
            backups: None,
            audit: None,
        }
    }

    pub fn with_backups(mut self, store: impl BackupStore + 'static) -> Self {
        self.backups = Some(Box::new(store));
        self
    }

    pub fn with_audit(mut self, sink: impl AuditSink + 'static) -> Self {
        self.audit = Some(Box::new(sink));
        self
    }

    fn session(&self, document: &Path) -> BridgeResult<Session<'h, H>> {
        Session::resolve(self.host, &self.application, document)
    }

    pub fn list_modules(&self, document: &Path) -> BridgeResult<Vec<ModuleInfo>> {
        let session = self.session(document)?;
        locator::list_modules(&session)
    }

    pub fn read_module(&self, document: &Path, module: &str) -> BridgeResult<String> {
        let session = self.session(document)?;
        let module = locate(&session, module)?;
        let editor = StructuralEditor::new(&session, &module);
        let code = editor.read_module()?;
        self.audit(
            AuditRecord::new(
                AuditOperation::Read,
                session.document_path(),
                module.name(),
                line_total(&code),
            ),
        );
        Ok(code)
    }

    /// Replace the whole module. The previous text is backed up first when it is non-empty.
    pub fn write_module(
        &self,
        document: &Path,
        module: &str,
        code: &str,
    ) -> BridgeResult<ModuleWrite> {
        let session = self.session(document)?;
        let module = locate(&session, module)?;
        let editor = StructuralEditor::new(&session, &module);
        let backup = self.backup(&session, &module, &editor);
        let line_count = editor.write_module(code)?;
        self.audit(
            AuditRecord::new(
                AuditOperation::Write,
                session.document_path(),
                module.name(),
                line_count,
            )
            .with_backup(backup.as_deref()),
        );
        Ok(ModuleWrite { line_count, backup })
    }

    pub fn list_procedures(&self, document: &Path, module: &str) -> BridgeResult<Vec<Procedure>> {
        let session = self.session(document)?;
        let module = locate(&session, module)?;
        ProcedureIndex::new(&session, &module).procedures()
    }

    pub fn read_procedure(
        &self,
        document: &Path,
        module: &str,
        procedure: &str,
    ) -> BridgeResult<ProcedureText> {
        let session = self.session(document)?;
        let module = locate(&session, module)?;
        let text = StructuralEditor::new(&session, &module).read_procedure(procedure)?;
        self.audit(
            AuditRecord::new(
                AuditOperation::Read,
                session.document_path(),
                module.name(),
                text.procedure.line_count,
            )
            .with_procedure(&text.procedure.name),
        );
        Ok(text)
    }

    pub fn write_procedure(
        &self,
        document: &Path,
        module: &str,
        procedure: &str,
        code: &str,
    ) -> BridgeResult<Disposition> {
        let session = self.session(document)?;
        let module = locate(&session, module)?;
        let written = StructuralEditor::new(&session, &module).write_procedure(procedure, code)?;
        let operation = match written.disposition {
            Disposition::Replaced => AuditOperation::Write,
            Disposition::Added => AuditOperation::Create,
        };
        self.audit(
            AuditRecord::new(
                operation,
                session.document_path(),
                module.name(),
                written.line_count,
            )
            .with_procedure(procedure),
        );
        Ok(written.disposition)
    }

    pub fn add_procedure(
        &self,
        document: &Path,
        module: &str,
        code: &str,
        insert_after: Option<&str>,
    ) -> BridgeResult<AddedProcedure> {
        let session = self.session(document)?;
        let module = locate(&session, module)?;
        let added = StructuralEditor::new(&session, &module).add_procedure(code, insert_after)?;
        self.audit(
            AuditRecord::new(
                AuditOperation::Create,
                session.document_path(),
                module.name(),
                added.line_count,
            )
            .with_procedure(&added.name),
        );
        Ok(added)
    }

    /// Remove one procedure. The module text is backed up first.
    pub fn delete_procedure(
        &self,
        document: &Path,
        module: &str,
        procedure: &str,
    ) -> BridgeResult<ProcedureDeletion> {
        let session = self.session(document)?;
        let module = locate(&session, module)?;
        let editor = StructuralEditor::new(&session, &module);
        let backup = self.backup(&session, &module, &editor);
        let procedure = editor.delete_procedure(procedure)?;
        self.audit(
            AuditRecord::new(
                AuditOperation::Delete,
                session.document_path(),
                module.name(),
                procedure.line_count,
            )
            .with_procedure(&procedure.name)
            .with_backup(backup.as_deref()),
        );
        Ok(ProcedureDeletion { procedure, backup })
    }

    fn backup(
        &self,
        session: &Session<'h, H>,
        module: &CodeModule<'h, H>,
        editor: &StructuralEditor<'_, 'h, H>,
    ) -> Option<PathBuf> {
        let store = self.backups.as_ref()?;
        let code = match editor.read_module() {
            Ok(code) => code,
            Err(error) => {
                warn!(module = module.name(), %error, "skipping backup; module text unreadable");
                return None;
            }
        };
        if code.is_empty() {
            return None;
        }
        match store.backup(session.document_path(), module.name(), module.kind(), &code) {
            Ok(path) => {
                debug!(module = module.name(), path = %path.display(), "module backed up");
                Some(path)
            }
            Err(error) => {
                warn!(module = module.name(), error = %format!("{error:#}"), "backup failed");
                None
            }
        }
    }

    fn audit(&self, record: AuditRecord) {
        let Some(sink) = self.audit.as_ref() else {
            return;
        };
        if let Err(error) = sink.record(&record) {
            warn!(
                operation = ?record.operation,
                module = %record.module,
                error = %format!("{error:#}"),
                "audit record dropped"
            );
        }
    }
}

fn line_total(code: &str) -> usize {
    if code.is_empty() {
        0
    } else {
        code.split("\r\n").count()
    }
}
