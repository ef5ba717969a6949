//! Tracing subscriber setup for the binary.

use std::io::{self, IsTerminal};

use anyhow::{Result, anyhow};
use once_cell::sync::OnceCell;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;

static INSTALLED: OnceCell<()> = OnceCell::new();

/// Install the global fmt subscriber once; later calls are no-ops.
///
/// `RUST_LOG` wins over `level` when it is set and parses.
pub fn init(level: &str) -> Result<()> {
    INSTALLED.get_or_try_init(|| install(level)).map(|_| ())
}

fn install(level: &str) -> Result<()> {
    let filter = filter_for(level)?;
    fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(io::stderr)
        .with_ansi(io::stderr().is_terminal())
        .try_init()
        .map_err(|error| anyhow!("failed to install tracing subscriber: {error}"))
}

fn filter_for(level: &str) -> Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(level).map_err(|error| anyhow!("invalid log level `{level}`: {error}"))
}
