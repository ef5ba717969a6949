//! Session resolution against the running host.

use std::env;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::app::guard::HandleGuard;
use crate::domain::errors::{BridgeError, BridgeResult, HostError};
use crate::infra::host::{Host, RawHandle};

/// A validated binding between a caller-supplied document path and the host's open document.
///
/// Sessions are created per call and never cached: the user may close the document or the
/// host between two calls.
#[derive(Debug)]
pub struct Session<'h, H: Host + ?Sized> {
    app: HandleGuard<'h, H>,
    app_handle: RawHandle,
    application: String,
    document_path: String,
}

impl<'h, H: Host + ?Sized> Session<'h, H> {
    /// Attach to the application registered as `application` and check that `requested` is the
    /// document it has open.
    pub fn resolve(host: &'h H, application: &str, requested: &Path) -> BridgeResult<Self> {
        let app = host
            .active_application(application)
            .map_err(|error| BridgeError::from_host("active_application", application, error))?;
        let app = HandleGuard::from_option(host, app, "application");
        let Some(app_handle) = app.handle() else {
            return Err(BridgeError::ApplicationNotRunning {
                application: application.to_owned(),
            });
        };

        let document_path = {
            let document = host
                .current_document(app_handle)
                .map_err(|error| BridgeError::from_host("current_document", application, error))?;
            let document = HandleGuard::from_option(host, document, "document");
            let Some(document_handle) = document.handle() else {
                return Err(BridgeError::NoDocumentOpen {
                    requested: requested.to_path_buf(),
                });
            };
            host.document_path(document_handle)
                .map_err(|error| BridgeError::from_host("document_path", application, error))?
        };

        let base = env::current_dir().unwrap_or_else(|_| PathBuf::from("/"));
        let base = base.to_string_lossy();
        let wanted = normalize_document_path(&requested.to_string_lossy(), &base);
        let open = normalize_document_path(&document_path, &base);
        if wanted != open {
            return Err(BridgeError::DocumentMismatch {
                requested: requested.to_path_buf(),
                open: document_path,
            });
        }

        debug!(application, document = %document_path, "session resolved");
        Ok(Self {
            app,
            app_handle,
            application: application.to_owned(),
            document_path,
        })
    }

    pub fn host(&self) -> &'h H {
        self.app.host()
    }

    pub fn application_handle(&self) -> RawHandle {
        self.app_handle
    }

    /// Registered application name the session is bound to.
    pub fn application(&self) -> &str {
        &self.application
    }

    /// Document path as the host reports it.
    pub fn document_path(&self) -> &str {
        &self.document_path
    }

    /// Map a host failure into the taxonomy for this session's application.
    pub fn host_error(&self, operation: &'static str, error: HostError) -> BridgeError {
        BridgeError::from_host(operation, &self.application, error)
    }
}

/// Absolute, case-folded form of a document path used for comparisons.
///
/// Both `\` and `/` separate components; drive-letter and UNC paths count as absolute on every
/// platform; `.` and `..` are resolved lexically.
pub fn normalize_document_path(raw: &str, base: &str) -> String {
    let raw = raw.trim().replace('\\', "/");
    let joined = if is_absolute(&raw) {
        raw
    } else {
        format!("{}/{}", base.replace('\\', "/").trim_end_matches('/'), raw)
    };

    let (prefix, rest) = if joined.starts_with("//") {
        ("/", &joined[1..])
    } else if has_drive(&joined) {
        joined.split_at(2)
    } else {
        ("", joined.as_str())
    };

    let mut parts: Vec<&str> = Vec::new();
    for part in rest.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }
    format!("{prefix}/{}", parts.join("/")).to_lowercase()
}

fn is_absolute(path: &str) -> bool {
    path.starts_with('/') || has_drive(path)
}

fn has_drive(path: &str) -> bool {
    let bytes = path.as_bytes();
    bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}
