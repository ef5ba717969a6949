//! Domain-specific errors.

use std::path::PathBuf;

use thiserror::Error;

use crate::domain::status::StatusCategory;

/// Host setting that gates programmatic access to a document's project.
pub const TRUST_SETTING: &str = "Trust Center > Macro Settings > Trust access to the VBA project object model";

/// A failure reported by the host automation surface, carrying the raw interop status.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} (status 0x{status:08X})")]
pub struct HostError {
    pub status: u32,
    pub message: String,
}

impl HostError {
    pub fn new(status: u32, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn category(&self) -> StatusCategory {
        StatusCategory::classify(self.status)
    }
}

/// Typed failures surfaced by every bridge operation.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("{application} is not running; start it and open the target document")]
    ApplicationNotRunning { application: String },

    #[error("document not found: no document is open in the host (wanted {})", requested.display())]
    NoDocumentOpen { requested: PathBuf },

    #[error(
        "document not found: {} is not the document open in the host (open: {open})",
        requested.display()
    )]
    DocumentMismatch { requested: PathBuf, open: String },

    #[error("programmatic access to the project is blocked; enable \"{setting}\"")]
    AccessDenied { setting: &'static str },

    #[error("module '{module}' not found in the project")]
    ModuleNotFound { module: String },

    #[error("procedure '{procedure}' not found in module '{module}'")]
    ProcedureNotFound { module: String, procedure: String },

    #[error(
        "procedure '{procedure}' already exists in module '{module}'; use write-proc to replace it"
    )]
    ProcedureAlreadyExists { module: String, procedure: String },

    #[error(
        "code does not start with a recognised Sub, Function or Property declaration: {first_line:?}"
    )]
    MalformedProcedureDeclaration { first_line: String },

    #[error("{operation} failed ({category}, status 0x{status:08X}): {message}")]
    InteropOperationFailed {
        operation: &'static str,
        status: u32,
        category: StatusCategory,
        message: String,
    },
}

impl BridgeError {
    /// Lift a host failure into the taxonomy using its classified status.
    pub fn from_host(operation: &'static str, application: &str, error: HostError) -> Self {
        match error.category() {
            StatusCategory::NotRunning => BridgeError::ApplicationNotRunning {
                application: application.to_owned(),
            },
            StatusCategory::AccessDenied => BridgeError::AccessDenied {
                setting: TRUST_SETTING,
            },
            category => BridgeError::InteropOperationFailed {
                operation,
                status: error.status,
                category,
                message: error.message,
            },
        }
    }

    /// Whether the failure names a document the host does not have open.
    pub fn is_document_not_found(&self) -> bool {
        matches!(
            self,
            BridgeError::NoDocumentOpen { .. } | BridgeError::DocumentMismatch { .. }
        )
    }

    /// Whether retrying later may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            BridgeError::InteropOperationFailed { category, .. } if category.is_transient()
        )
    }
}

/// Result alias for host automation calls.
pub type HostResult<T> = Result<T, HostError>;

/// Result alias for bridge operations.
pub type BridgeResult<T> = Result<T, BridgeError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::status::{E_ACCESSDENIED, E_FAIL, MK_E_UNAVAILABLE, RPC_E_CALL_REJECTED};

    #[test]
    fn not_running_status_becomes_typed_error() {
        let err = BridgeError::from_host(
            "get_active_object",
            "Access.Application",
            HostError::new(MK_E_UNAVAILABLE, "operation unavailable"),
        );
        assert!(matches!(err, BridgeError::ApplicationNotRunning { .. }));
        assert!(err.to_string().contains("Access.Application"));
    }

    #[test]
    fn access_denied_names_the_setting() {
        let err = BridgeError::from_host(
            "active_project",
            "Access.Application",
            HostError::new(E_ACCESSDENIED, "denied"),
        );
        assert!(err.to_string().contains("Trust access to the VBA project object model"));
    }

    #[test]
    fn other_statuses_are_wrapped_with_message() {
        let err = BridgeError::from_host("insert_lines", "X", HostError::new(E_FAIL, "boom"));
        match &err {
            BridgeError::InteropOperationFailed {
                operation,
                category,
                message,
                ..
            } => {
                assert_eq!(*operation, "insert_lines");
                assert_eq!(*category, StatusCategory::GenericFailure);
                assert_eq!(message, "boom");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(!err.is_transient());

        let busy = BridgeError::from_host("lines", "X", HostError::new(RPC_E_CALL_REJECTED, "busy"));
        assert!(busy.is_transient());
    }

    #[test]
    fn mismatch_reads_as_not_found() {
        let err = BridgeError::DocumentMismatch {
            requested: PathBuf::from("/docs/a.accdb"),
            open: "/docs/b.accdb".into(),
        };
        assert!(err.is_document_not_found());
        assert!(err.to_string().starts_with("document not found"));
    }
}
