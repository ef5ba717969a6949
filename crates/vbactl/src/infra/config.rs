//! Configuration management utilities.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use dirs_next::{config_dir, data_local_dir};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

static DEFAULT_CONFIG: Lazy<&'static str> =
    Lazy::new(|| include_str!("../../assets/default-config.toml"));
static DEFAULT_WORKSPACE_CONFIG_PATH: &str = ".vbactl/config.toml";

/// Layered configuration loaded from defaults, user, workspace, and env.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub host: HostSettings,
    #[serde(default)]
    pub backup: Backup,
    #[serde(default)]
    pub audit: Audit,
    #[serde(default)]
    pub logging: Logging,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostSettings {
    /// Registered name of the automation server, e.g. `Access.Application`.
    #[serde(default = "HostSettings::default_application")]
    pub application: String,
}

impl HostSettings {
    fn default_application() -> String {
        "Access.Application".to_owned()
    }
}

impl Default for HostSettings {
    fn default() -> Self {
        Self {
            application: Self::default_application(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Backup {
    #[serde(default)]
    enabled: Option<bool>,
    #[serde(default)]
    directory: Option<PathBuf>,
}

impl Backup {
    pub fn enabled(&self) -> bool {
        self.enabled.unwrap_or(false)
    }

    /// Configured directory, or `<local data dir>/vbactl/backups`.
    pub fn directory(&self) -> Option<PathBuf> {
        self.directory
            .clone()
            .or_else(|| data_local_dir().map(|base| base.join("vbactl/backups")))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Audit {
    #[serde(default)]
    enabled: Option<bool>,
    #[serde(default)]
    path: Option<PathBuf>,
}

impl Audit {
    pub fn enabled(&self) -> bool {
        self.enabled.unwrap_or(false)
    }

    /// Configured log file, or `<local data dir>/vbactl/audit.jsonl`.
    pub fn path(&self) -> Option<PathBuf> {
        self.path
            .clone()
            .or_else(|| data_local_dir().map(|base| base.join("vbactl/audit.jsonl")))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Logging {
    #[serde(default = "Logging::default_level")]
    pub level: String,
}

impl Logging {
    fn default_level() -> String {
        "warn".into()
    }
}

impl Default for Logging {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
        }
    }
}

/// Environment overrides for critical settings.
#[derive(Debug, Default, Clone)]
pub struct EnvOverrides {
    application: Option<String>,
    backup_dir: Option<PathBuf>,
    audit_log: Option<PathBuf>,
}

impl EnvOverrides {
    fn from_env() -> Self {
        Self {
            application: env::var("VBACTL_APPLICATION").ok(),
            backup_dir: env::var_os("VBACTL_BACKUP_DIR").map(PathBuf::from),
            audit_log: env::var_os("VBACTL_AUDIT_LOG").map(PathBuf::from),
        }
    }

    #[cfg(test)]
    fn for_tests(application: &str, backup_dir: &Path, audit_log: &Path) -> Self {
        Self {
            application: Some(application.to_owned()),
            backup_dir: Some(backup_dir.to_path_buf()),
            audit_log: Some(audit_log.to_path_buf()),
        }
    }
}

impl Config {
    /// Load configuration from defaults, user/global config, workspace config, and env overrides.
    ///
    /// An `explicit` path replaces the workspace layer and must exist.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let env = EnvOverrides::from_env();
        let global = global_config_path();
        let workspace = match explicit {
            Some(path) => {
                if !path.exists() {
                    anyhow::bail!("config file not found: {}", path.display());
                }
                Some(path.to_path_buf())
            }
            None => workspace_config_path()?,
        };
        Self::load_with_layers(global, workspace, env)
    }

    fn load_with_layers(
        global: Option<PathBuf>,
        workspace: Option<PathBuf>,
        env_overrides: EnvOverrides,
    ) -> Result<Self> {
        let mut layers: Vec<Config> = Vec::new();

        layers.push(Self::from_str(&DEFAULT_CONFIG)?);

        if let Some(global_path) = global.filter(|path| path.exists()) {
            layers.push(Self::from_file(&global_path)?);
        }

        if let Some(workspace_path) = workspace.filter(|path| path.exists()) {
            layers.push(Self::from_file(&workspace_path)?);
        }

        let merged = layers.into_iter().reduce(Config::merge).unwrap_or_default();
        Ok(apply_env_overrides(merged, env_overrides))
    }

    fn from_file(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        Self::from_str(&data)
            .with_context(|| format!("invalid config file: {}", path.display()))
    }

    fn from_str(contents: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(contents).with_context(|| "failed to parse TOML config".to_string())?;
        Ok(config)
    }

    fn merge(self, other: Self) -> Self {
        Self {
            host: merge_host(self.host, other.host),
            backup: Backup {
                enabled: other.backup.enabled.or(self.backup.enabled),
                directory: other.backup.directory.or(self.backup.directory),
            },
            audit: Audit {
                enabled: other.audit.enabled.or(self.audit.enabled),
                path: other.audit.path.or(self.audit.path),
            },
            logging: Logging {
                level: choose(self.logging.level, other.logging.level, Logging::default_level),
            },
        }
    }
}

fn merge_host(base: HostSettings, overlay: HostSettings) -> HostSettings {
    HostSettings {
        application: choose(
            base.application,
            overlay.application,
            HostSettings::default_application,
        ),
    }
}

fn choose(base: String, overlay: String, default_fn: fn() -> String) -> String {
    if overlay != default_fn() {
        overlay
    } else {
        base
    }
}

fn global_config_path() -> Option<PathBuf> {
    config_dir().map(|base| base.join("vbactl/config.toml"))
}

fn workspace_config_path() -> Result<Option<PathBuf>> {
    let cwd = env::current_dir()?;
    let root = find_repo_root(&cwd).unwrap_or(cwd);
    Ok(Some(root.join(DEFAULT_WORKSPACE_CONFIG_PATH)))
}

fn find_repo_root(start: &Path) -> Option<PathBuf> {
    let mut current = start;
    loop {
        if current.join(".git").exists() {
            return Some(current.to_path_buf());
        }
        match current.parent() {
            Some(parent) => current = parent,
            None => return None,
        }
    }
}

/// Setting a backup directory or audit log through the environment also enables it.
fn apply_env_overrides(mut config: Config, env: EnvOverrides) -> Config {
    if let Some(application) = env.application {
        config.host.application = application;
    }
    if let Some(directory) = env.backup_dir {
        config.backup.enabled = Some(true);
        config.backup.directory = Some(directory);
    }
    if let Some(path) = env.audit_log {
        config.audit.enabled = Some(true);
        config.audit.path = Some(path);
    }
    config
}
