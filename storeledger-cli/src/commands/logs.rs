//! Logs command - inspect the local event log

use anyhow::Result;
use chrono::{Duration, TimeZone, Utc};
use clap::Subcommand;
use colored::Colorize;

use super::get_data_dir;
use crate::output::{self, format_size};
use storeledger_core::services::{EntryPoint, LogEntry, LoggingService};

#[derive(Subcommand)]
pub enum LogsCommands {
    /// Show recent log entries
    List {
        /// Number of entries to show
        #[arg(short, long, default_value = "50")]
        limit: usize,
        /// Show only errors
        #[arg(long)]
        errors: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Clear old log entries
    Clear {
        /// Delete logs older than N days
        #[arg(long, default_value = "30")]
        older_than_days: i64,
        /// Delete every entry regardless of age
        #[arg(long, conflicts_with = "older_than_days")]
        all: bool,
        /// Skip confirmation prompt
        #[arg(long, short = 'f')]
        force: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show log statistics and database path
    Stats {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn get_logging_service() -> Result<LoggingService> {
    LoggingService::new(&get_data_dir(), EntryPoint::Cli, env!("CARGO_PKG_VERSION"))
}

fn format_timestamp(timestamp_ms: i64) -> String {
    Utc.timestamp_millis_opt(timestamp_ms)
        .single()
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| timestamp_ms.to_string())
}

/// Route for API events, command for CLI events
fn context(entry: &LogEntry) -> String {
    [entry.route.as_deref(), entry.command.as_deref()]
        .iter()
        .filter_map(|&s| s)
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn run(command: LogsCommands) -> Result<()> {
    match command {
        LogsCommands::List { limit, errors, json } => list(limit, errors, json),
        LogsCommands::Clear {
            older_than_days,
            all,
            force,
            json,
        } => clear(older_than_days, all, force, json),
        LogsCommands::Stats { json } => stats(json),
    }
}

fn list(limit: usize, errors: bool, json: bool) -> Result<()> {
    let service = get_logging_service()?;
    let entries = if errors {
        service.get_errors(limit)?
    } else {
        service.get_recent(limit)?
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    if entries.is_empty() {
        println!("No log entries found.");
        return Ok(());
    }

    let mut table = output::create_table();
    table.set_header(vec!["Time", "Entry", "Backend", "Event", "Context", "Error"]);

    for entry in &entries {
        let error = match (&entry.error_kind, &entry.error_message) {
            (Some(kind), _) => kind.red().to_string(),
            (None, Some(_)) => "!".red().to_string(),
            (None, None) => String::new(),
        };

        table.add_row(vec![
            format_timestamp(entry.timestamp),
            entry.entry_point.clone(),
            entry.backend.clone().unwrap_or_default(),
            entry.event.clone(),
            context(entry),
            error,
        ]);
    }

    println!("{}", table);

    if !errors {
        let recent_errors: Vec<&LogEntry> = entries
            .iter()
            .filter(|e| e.error_message.is_some())
            .take(3)
            .collect();
        if !recent_errors.is_empty() {
            println!();
            println!("{}", "Recent Errors:".red().bold());
            for err in recent_errors {
                println!(
                    "  {} [{}]: {}",
                    format_timestamp(err.timestamp).dimmed(),
                    context(err),
                    err.error_message.as_deref().unwrap_or("Unknown error")
                );
            }
        }
    }
    Ok(())
}

fn clear(older_than_days: i64, all: bool, force: bool, json: bool) -> Result<()> {
    let service = get_logging_service()?;

    if !force && !json {
        let prompt = if all {
            "Delete all log entries?".to_string()
        } else {
            format!("Delete logs older than {} days?", older_than_days)
        };
        if !dialoguer::Confirm::new()
            .with_prompt(prompt)
            .default(false)
            .interact()?
        {
            println!("Cancelled.");
            return Ok(());
        }
    }

    let deleted = if all {
        service.clear()?
    } else {
        let cutoff = Utc::now() - Duration::days(older_than_days);
        service.delete_before(cutoff.timestamp_millis())?
    };

    if json {
        println!("{}", serde_json::json!({ "deleted": deleted }));
    } else {
        println!("Deleted {} log entries", deleted);
    }
    Ok(())
}

fn stats(json: bool) -> Result<()> {
    let service = get_logging_service()?;
    let stats = service.stats()?;
    let db_path = service.db_path().to_path_buf();
    let size_bytes = std::fs::metadata(&db_path).map(|m| m.len()).unwrap_or(0);

    if json {
        println!(
            "{}",
            serde_json::json!({
                "stats": stats,
                "database_path": db_path.to_string_lossy(),
                "database_size_bytes": size_bytes
            })
        );
        return Ok(());
    }

    println!("{}", "Log Statistics".bold());
    println!("  Total entries: {}", stats.total);
    println!("  Errors: {}", stats.errors);
    if let (Some(oldest), Some(newest)) = (stats.oldest, stats.newest) {
        println!(
            "  Range: {} to {}",
            format_timestamp(oldest),
            format_timestamp(newest)
        );
    }
    println!("  Database: {}", db_path.display());
    println!("  Size: {}", format_size(size_bytes));

    if !stats.by_event.is_empty() {
        let mut table = output::create_table();
        table.set_header(vec!["Event", "Count"]);
        for row in &stats.by_event {
            table.add_row(vec![row.event.clone(), row.count.to_string()]);
        }
        println!();
        println!("{}", table);
    }
    Ok(())
}
