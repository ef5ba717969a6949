//! Append-only audit trail of completed operations.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditOperation {
    Read,
    Write,
    Create,
    Delete,
}

/// One structured audit entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub timestamp: String,
    pub operation: AuditOperation,
    pub document: String,
    pub module: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub procedure: Option<String>,
    pub line_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backup: Option<String>,
}

impl AuditRecord {
    pub fn new(
        operation: AuditOperation,
        document: impl Into<String>,
        module: impl Into<String>,
        line_count: usize,
    ) -> Self {
        Self {
            timestamp: timestamp(OffsetDateTime::now_utc()),
            operation,
            document: document.into(),
            module: module.into(),
            procedure: None,
            line_count,
            backup: None,
        }
    }

    pub fn with_procedure(mut self, procedure: impl Into<String>) -> Self {
        self.procedure = Some(procedure.into());
        self
    }

    pub fn with_backup(mut self, backup: Option<&Path>) -> Self {
        self.backup = backup.map(|path| path.display().to_string());
        self
    }
}

/// Destination for audit records.
pub trait AuditSink {
    fn record(&self, record: &AuditRecord) -> Result<()>;
}

/// Appends one JSON object per line to a file.
#[derive(Debug, Clone)]
pub struct JsonlAuditLog {
    path: PathBuf,
}

impl JsonlAuditLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl AuditSink for JsonlAuditLog {
    fn record(&self, record: &AuditRecord) -> Result<()> {
        if let Some(dir) = self.path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            fs::create_dir_all(dir)
                .with_context(|| format!("failed to create audit directory {}", dir.display()))?;
        }
        let line = serde_json::to_string(record).context("failed to serialize audit record")?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("failed to open audit log {}", self.path.display()))?;
        writeln!(file, "{line}")
            .with_context(|| format!("failed to append to audit log {}", self.path.display()))?;
        Ok(())
    }
}

/// RFC 3339 form of `at`, or its Unix seconds when the offset cannot be expressed in RFC 3339.
fn timestamp(at: OffsetDateTime) -> String {
    match at.format(&Rfc3339) {
        Ok(formatted) => formatted,
        Err(error) => {
            warn!(%error, "audit timestamp not representable as RFC 3339");
            at.unix_timestamp().to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unformattable_timestamps_fall_back_to_unix_seconds() -> Result<()> {
        assert_eq!(timestamp(OffsetDateTime::UNIX_EPOCH), "1970-01-01T00:00:00Z");

        let odd_offset = time::UtcOffset::from_hms(1, 2, 3)?;
        let at = OffsetDateTime::UNIX_EPOCH.to_offset(odd_offset);
        assert_eq!(timestamp(at), "0");
        Ok(())
    }

    #[test]
    fn appends_json_lines() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let log = JsonlAuditLog::new(temp.path().join("logs/audit.jsonl"));

        log.record(&AuditRecord::new(AuditOperation::Read, "C:\\a.accdb", "Utils", 12))?;
        log.record(
            &AuditRecord::new(AuditOperation::Delete, "C:\\a.accdb", "Utils", 3)
                .with_procedure("Helper")
                .with_backup(Some(Path::new("/backups/Utils.bas"))),
        )?;

        let contents = fs::read_to_string(log.path())?;
        let records: Vec<AuditRecord> = contents
            .lines()
            .map(serde_json::from_str)
            .collect::<Result<_, _>>()?;
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].operation, AuditOperation::Read);
        assert_eq!(records[0].procedure, None);
        assert_eq!(records[1].procedure.as_deref(), Some("Helper"));
        assert_eq!(records[1].backup.as_deref(), Some("/backups/Utils.bas"));
        assert!(!contents.lines().next().unwrap_or_default().contains("backup"));
        Ok(())
    }
}
