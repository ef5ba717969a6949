//! Infrastructure adapters for the host, config, logging, backups, and the audit trail.

pub mod audit;
pub mod backup;
pub mod config;
pub mod host;
pub mod logging;
pub mod memory;
pub mod snapshot;
