//! JSON snapshots of host state, used to drive [`MemoryHost`] from the command line.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::domain::model::ComponentKind;
use crate::infra::memory::{MemoryHost, MemoryModule};

/// Persisted form of everything a [`MemoryHost`] models except handle bookkeeping.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HostSnapshot {
    pub application: String,
    #[serde(default = "default_true")]
    pub running: bool,
    #[serde(default)]
    pub document: Option<String>,
    #[serde(default = "default_true")]
    pub trust_project_access: bool,
    #[serde(default)]
    pub modules: Vec<ModuleSnapshot>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ModuleSnapshot {
    pub name: String,
    pub kind: ComponentKind,
    #[serde(default)]
    pub lines: Vec<String>,
}

fn default_true() -> bool {
    true
}

impl HostSnapshot {
    pub fn load(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)
            .with_context(|| format!("failed to read snapshot file at {}", path.display()))?;
        serde_json::from_str(&data)
            .with_context(|| format!("invalid snapshot data in {}", path.display()))
    }

    /// Write the snapshot, creating parent directories as needed.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            fs::create_dir_all(parent).with_context(|| {
                format!("failed to create snapshot directory {}", parent.display())
            })?;
        }
        let json = serde_json::to_string_pretty(self).context("failed to serialize snapshot")?;
        fs::write(path, json)
            .with_context(|| format!("failed to write snapshot file at {}", path.display()))
    }

    pub fn capture(host: &MemoryHost) -> Self {
        Self {
            application: host.application(),
            running: host.is_running(),
            document: host.document(),
            trust_project_access: host.trusts_project_access(),
            modules: host
                .modules()
                .into_iter()
                .map(|module| ModuleSnapshot {
                    name: module.name,
                    kind: module.kind,
                    lines: module.lines,
                })
                .collect(),
        }
    }

    pub fn into_host(self) -> MemoryHost {
        let host = MemoryHost::new(self.application);
        host.set_running(self.running);
        host.set_document(self.document);
        host.set_trust_project_access(self.trust_project_access);
        for module in self.modules {
            host.add_module(MemoryModule {
                name: module.name,
                kind: module.kind,
                lines: module.lines,
            });
        }
        host
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fills_defaults_for_sparse_files() -> Result<()> {
        let snapshot: HostSnapshot = serde_json::from_str(
            r#"{"application":"Access.Application","modules":[{"name":"Utils","kind":"standard"}]}"#,
        )?;
        assert!(snapshot.running);
        assert!(snapshot.trust_project_access);
        assert_eq!(snapshot.document, None);
        assert!(snapshot.modules[0].lines.is_empty());
        Ok(())
    }

    #[test]
    fn save_then_load_preserves_host_state() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("nested/host.json");

        let host = MemoryHost::new("Access.Application")
            .with_document("C:\\Data\\db.accdb")
            .with_module("Utils", ComponentKind::Standard, "Sub A()\r\nEnd Sub")
            .with_module("Form_Main", ComponentKind::Document, "");
        host.set_trust_project_access(false);

        HostSnapshot::capture(&host).save(&path)?;
        let restored = HostSnapshot::load(&path)?.into_host();

        assert_eq!(restored.document().as_deref(), Some("C:\\Data\\db.accdb"));
        assert!(!restored.trusts_project_access());
        assert_eq!(restored.modules(), host.modules());
        Ok(())
    }

    #[test]
    fn malformed_snapshot_names_the_file() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("host.json");
        fs::write(&path, "{ not json")?;
        let err = HostSnapshot::load(&path).unwrap_err();
        assert!(err.to_string().contains("host.json"));
        Ok(())
    }
}
