//! CLI command implementations

pub mod backend;
pub mod logs;
pub mod report;
pub mod serve;

use std::path::PathBuf;

use anyhow::{Context, Result};
use storeledger_core::config::{default_data_dir, Config};
use storeledger_core::services::{EntryPoint, LogEvent, LoggingService};
use storeledger_core::LedgerContext;

/// Get the logging service for CLI operations
///
/// Returns None if logging fails to initialize (shouldn't block operations)
pub fn get_logger() -> Option<LoggingService> {
    LoggingService::new(&get_data_dir(), EntryPoint::Cli, env!("CARGO_PKG_VERSION")).ok()
}

/// Log an event, ignoring any errors (logging should never break the app)
pub fn log_event(logger: &Option<LoggingService>, event: LogEvent) {
    if let Some(l) = logger {
        let _ = l.log(event);
    }
}

/// Data directory from `STORELEDGER_DIR` or `~/.storeledger`
pub fn get_data_dir() -> PathBuf {
    default_data_dir()
}

pub fn get_config() -> Result<Config> {
    let data_dir = get_data_dir();
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("Failed to create data directory: {:?}", data_dir))?;
    Ok(Config::load(&data_dir)?)
}

/// Load config and connect to the selected backend
pub fn get_context() -> Result<LedgerContext> {
    let config = get_config()?;
    config.validate()?;
    LedgerContext::new(config).context("Failed to connect to the backend")
}
