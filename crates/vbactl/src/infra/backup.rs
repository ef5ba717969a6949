//! Module text snapshots taken before destructive writes.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use time::OffsetDateTime;
use time::macros::format_description;

use crate::domain::model::ComponentKind;

/// Persists the current text of a module under a timestamped name.
pub trait BackupStore {
    /// Store `code` and return where it went.
    fn backup(
        &self,
        document: &str,
        module: &str,
        kind: ComponentKind,
        code: &str,
    ) -> Result<PathBuf>;
}

/// Writes backups to `<root>/<document-stem>/<module>-<UTC timestamp>.<ext>`.
#[derive(Debug, Clone)]
pub struct FsBackupStore {
    root: PathBuf,
}

impl FsBackupStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl BackupStore for FsBackupStore {
    fn backup(
        &self,
        document: &str,
        module: &str,
        kind: ComponentKind,
        code: &str,
    ) -> Result<PathBuf> {
        let dir = self.root.join(sanitize(document_stem(document)));
        fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create backup directory {}", dir.display()))?;

        let stamp = OffsetDateTime::now_utc()
            .format(format_description!(
                "[year][month][day]T[hour][minute][second]Z"
            ))
            .context("failed to format backup timestamp")?;
        let module = sanitize(module);
        let extension = kind.extension();

        let mut path = dir.join(format!("{module}-{stamp}.{extension}"));
        let mut attempt = 1;
        while path.exists() {
            path = dir.join(format!("{module}-{stamp}-{attempt}.{extension}"));
            attempt += 1;
        }

        fs::write(&path, code)
            .with_context(|| format!("failed to write backup {}", path.display()))?;
        Ok(path)
    }
}

/// File name of a host-reported document path without its extension.
fn document_stem(document: &str) -> &str {
    let name = document
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(document);
    match name.rfind('.') {
        Some(dot) if dot > 0 => &name[..dot],
        _ => name,
    }
}

fn sanitize(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "unnamed".into()
    } else {
        cleaned
    }
}
