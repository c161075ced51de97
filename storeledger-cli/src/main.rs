//! StoreLedger CLI - run the API and read the books from a terminal

use std::process::ExitCode;

use anyhow::Result;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

mod commands;
mod output;

use commands::report::{ReportArgs, ReportKind};
use commands::{backend, logs, report, serve};

/// StoreLedger - multi-store bookkeeping for small businesses
#[derive(Parser)]
#[command(name = "sl", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API
    Serve {
        /// Address to bind (overrides config)
        #[arg(long)]
        host: Option<String>,
        /// Port to listen on (overrides config)
        #[arg(long, short)]
        port: Option<u16>,
    },

    /// Show the selected backend and configuration health
    Backend {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print a financial report
    Report {
        /// Report to print
        #[arg(value_enum)]
        kind: ReportKind,
        /// Account email
        #[arg(long, env = "STORELEDGER_EMAIL")]
        email: String,
        /// Account password (read from stdin or prompted when omitted)
        #[arg(long, env = "STORELEDGER_PASSWORD", hide_env_values = true)]
        password: Option<String>,
        /// Preset period: this_month, last_month, this_quarter, this_year, last_year
        #[arg(long, conflicts_with_all = ["start", "end"])]
        period: Option<String>,
        /// First day of a custom range (YYYY-MM-DD)
        #[arg(long, requires = "end")]
        start: Option<NaiveDate>,
        /// Last day of a custom range (YYYY-MM-DD)
        #[arg(long, requires = "start")]
        end: Option<NaiveDate>,
        /// Limit to one store id
        #[arg(long)]
        store: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Inspect the local event log
    Logs {
        #[command(subcommand)]
        command: logs::LogsCommands,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            output::error(&format!("{:#}", e));
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Serve { host, port } => serve::run(host, port).await,
        Commands::Backend { json } => backend::run(json),
        Commands::Report {
            kind,
            email,
            password,
            period,
            start,
            end,
            store,
            json,
        } => {
            report::run(ReportArgs {
                kind,
                email,
                password,
                period,
                start,
                end,
                store,
                json,
            })
            .await
        }
        Commands::Logs { command } => logs::run(command),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_report_rejects_half_range() {
        let result = Cli::try_parse_from([
            "sl", "report", "profit-loss", "--email", "a@b.test", "--start", "2026-01-01",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_report_parses_period() {
        let cli = Cli::try_parse_from([
            "sl", "report", "stores", "--email", "a@b.test", "--period", "last_month", "--json",
        ])
        .unwrap();
        match cli.command {
            Commands::Report { kind, period, json, .. } => {
                assert!(matches!(kind, ReportKind::Stores));
                assert_eq!(period.as_deref(), Some("last_month"));
                assert!(json);
            }
            _ => panic!("expected report command"),
        }
    }
}
