//! Command-line front end over [`Bridge`].

use std::fmt::Write as _;
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{Shell, generate};
use tracing::debug;

use crate::app::bridge::Bridge;
use crate::domain::model::{ModuleInfo, Procedure};
use crate::infra::audit::JsonlAuditLog;
use crate::infra::backup::FsBackupStore;
use crate::infra::config::Config;
use crate::infra::logging;
use crate::infra::memory::MemoryHost;
use crate::infra::snapshot::HostSnapshot;

#[derive(Debug, Parser)]
#[command(
    name = "vbactl",
    author,
    version,
    about = "Read and edit VBA modules and procedures in an open Office document",
    long_about = None
)]
pub struct Cli {
    /// JSON host snapshot standing in for the running application
    #[arg(long, global = true, value_name = "FILE")]
    pub snapshot: Option<PathBuf>,
    /// Document the application must have open
    #[arg(long, global = true, value_name = "PATH")]
    pub document: Option<PathBuf>,
    /// Config file used instead of the workspace `.vbactl/config.toml`
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// List code modules with kind and line count
    Modules,
    /// Print a whole module
    Read { module: String },
    /// Replace a whole module with new code
    Write {
        module: String,
        /// Read code from this file instead of stdin
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// List the procedures of a module
    Procedures { module: String },
    /// Print one procedure
    ReadProc { module: String, procedure: String },
    /// Replace a procedure, or append it when it does not exist
    WriteProc {
        module: String,
        procedure: String,
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// Insert a new procedure, failing if its name is taken
    AddProc {
        module: String,
        /// Place the procedure after this one instead of at the end
        #[arg(long, value_name = "PROCEDURE")]
        after: Option<String>,
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// Remove a procedure
    DeleteProc { module: String, procedure: String },
    /// Print shell completions
    Completions { shell: Shell },
}

impl Commands {
    fn mutates(&self) -> bool {
        matches!(
            self,
            Commands::Write { .. }
                | Commands::WriteProc { .. }
                | Commands::AddProc { .. }
                | Commands::DeleteProc { .. }
        )
    }
}

/// Execute a parsed command line, writing results to stdout.
pub fn run(cli: Cli) -> Result<()> {
    if let Commands::Completions { shell } = cli.command {
        let mut cmd = Cli::command();
        generate(shell, &mut cmd, "vbactl", &mut io::stdout());
        return Ok(());
    }

    let config = Config::load(cli.config.as_deref())?;
    logging::init(&config.logging.level)?;

    let snapshot_path = cli
        .snapshot
        .as_deref()
        .context("--snapshot <FILE> is required")?;
    let document = cli
        .document
        .as_deref()
        .context("--document <PATH> is required")?;
    let host = HostSnapshot::load(snapshot_path)?.into_host();
    let bridge = build_bridge(&host, &config);

    let output = execute(&bridge, document, &cli.command)?;
    if cli.command.mutates() {
        HostSnapshot::capture(&host).save(snapshot_path)?;
        debug!(path = %snapshot_path.display(), "snapshot saved");
    }

    let mut stdout = io::stdout().lock();
    stdout.write_all(output.as_bytes())?;
    stdout.flush()?;
    Ok(())
}

fn build_bridge<'h>(host: &'h MemoryHost, config: &Config) -> Bridge<'h, MemoryHost> {
    let mut bridge = Bridge::new(host, config.host.application.clone());
    if config.backup.enabled() {
        if let Some(directory) = config.backup.directory() {
            bridge = bridge.with_backups(FsBackupStore::new(directory));
        }
    }
    if config.audit.enabled() {
        if let Some(path) = config.audit.path() {
            bridge = bridge.with_audit(JsonlAuditLog::new(path));
        }
    }
    bridge
}

fn execute(bridge: &Bridge<'_, MemoryHost>, document: &Path, command: &Commands) -> Result<String> {
    let output = match command {
        Commands::Modules => render_modules(&bridge.list_modules(document)?),
        Commands::Read { module } => with_newline(bridge.read_module(document, module)?),
        Commands::Write { module, file } => {
            let code = read_code(file.as_deref())?;
            let written = bridge.write_module(document, module, &code)?;
            let mut out = format!("wrote {} lines to {module}\n", written.line_count);
            if let Some(backup) = written.backup {
                writeln!(out, "backup: {}", backup.display())?;
            }
            out
        }
        Commands::Procedures { module } => {
            render_procedures(&bridge.list_procedures(document, module)?)
        }
        Commands::ReadProc { module, procedure } => {
            with_newline(bridge.read_procedure(document, module, procedure)?.code)
        }
        Commands::WriteProc {
            module,
            procedure,
            file,
        } => {
            let code = read_code(file.as_deref())?;
            let disposition = bridge.write_procedure(document, module, procedure, &code)?;
            format!("{disposition} {procedure} in {module}\n")
        }
        Commands::AddProc {
            module,
            after,
            file,
        } => {
            let code = read_code(file.as_deref())?;
            let added = bridge.add_procedure(document, module, &code, after.as_deref())?;
            format!(
                "added {} to {module} at line {} ({} lines)\n",
                added.name, added.start_line, added.line_count
            )
        }
        Commands::DeleteProc { module, procedure } => {
            let deleted = bridge.delete_procedure(document, module, procedure)?;
            let mut out = format!(
                "deleted {} from {module} (lines {}-{})\n",
                deleted.procedure.name,
                deleted.procedure.start_line,
                deleted.procedure.end_line()
            );
            if let Some(backup) = deleted.backup {
                writeln!(out, "backup: {}", backup.display())?;
            }
            out
        }
        Commands::Completions { .. } => String::new(),
    };
    Ok(output)
}

fn read_code(file: Option<&Path>) -> Result<String> {
    match file {
        Some(path) => fs::read_to_string(path)
            .with_context(|| format!("failed to read code from {}", path.display())),
        None => {
            let mut code = String::new();
            io::stdin()
                .read_to_string(&mut code)
                .context("failed to read code from stdin")?;
            Ok(code)
        }
    }
}

fn with_newline(mut text: String) -> String {
    if !text.is_empty() && !text.ends_with('\n') {
        text.push_str("\r\n");
    }
    text
}

/// Aligned `NAME KIND LINES` table.
pub fn render_modules(modules: &[ModuleInfo]) -> String {
    let width = column_width("NAME", modules.iter().map(|module| module.name.as_str()));
    let mut out = format!("{:<width$}  {:<8}  LINES\n", "NAME", "KIND");
    for module in modules {
        out.push_str(&format!(
            "{:<width$}  {:<8}  {}\n",
            module.name,
            module.kind.as_str(),
            module.line_count
        ));
    }
    out
}

/// Aligned procedure table in module order.
pub fn render_procedures(procedures: &[Procedure]) -> String {
    let width = column_width("NAME", procedures.iter().map(|proc| proc.name.as_str()));
    let mut out = format!(
        "{:<width$}  {:<12}  {:<10}  {:>5}  {:>5}\n",
        "NAME", "KIND", "VISIBILITY", "START", "LINES"
    );
    for proc in procedures {
        out.push_str(&format!(
            "{:<width$}  {:<12}  {:<10}  {:>5}  {:>5}\n",
            proc.name,
            proc.kind.as_str(),
            proc.visibility.as_str(),
            proc.start_line,
            proc.line_count
        ));
    }
    out
}

fn column_width<'a>(header: &str, values: impl Iterator<Item = &'a str>) -> usize {
    values
        .map(|value| value.chars().count())
        .chain(std::iter::once(header.len()))
        .max()
        .unwrap_or(header.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_add_proc_with_anchor() {
        let cli = Cli::try_parse_from([
            "vbactl",
            "--snapshot",
            "host.json",
            "--document",
            "C:\\db.accdb",
            "add-proc",
            "Utils",
            "--after",
            "Helper",
        ])
        .unwrap();
        assert!(cli.command.mutates());
        assert!(matches!(
            cli.command,
            Commands::AddProc { ref module, after: Some(ref after), file: None }
                if module == "Utils" && after == "Helper"
        ));
    }

    #[test]
    fn read_commands_do_not_save() {
        let cli = Cli::try_parse_from(["vbactl", "read-proc", "Utils", "Helper"]).unwrap();
        assert!(!cli.command.mutates());
    }

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }
}
