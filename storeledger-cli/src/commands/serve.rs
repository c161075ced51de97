//! Serve command - run the HTTP API

use std::net::SocketAddr;

use anyhow::{Context, Result};
use colored::Colorize;

use storeledger_core::services::{EntryPoint, LogEvent, LoggingService};
use storeledger_web::AppState;

use super::{get_context, get_data_dir, get_logger, log_event};

pub async fn run(host: Option<String>, port: Option<u16>) -> Result<()> {
    let mut ctx = get_context()?;
    if let Some(host) = host {
        ctx.config.server.host = host;
    }
    if let Some(port) = port {
        ctx.config.server.port = port;
    }

    let server = &ctx.config.server;
    let addr: SocketAddr = format!("{}:{}", server.host, server.port)
        .parse()
        .with_context(|| format!("Invalid listen address {}:{}", server.host, server.port))?;

    println!(
        "{} http://{} ({}{})",
        "StoreLedger API listening on".green(),
        addr,
        ctx.backend_kind(),
        if ctx.is_demo() { ", demo data" } else { "" }
    );

    log_event(&get_logger(), LogEvent::new("command_run").with_command("serve"));

    // API events are tagged with the web entry point
    let web_logger = LoggingService::new(&get_data_dir(), EntryPoint::Web, env!("CARGO_PKG_VERSION"))
        .map_err(|e| tracing::warn!("Event log unavailable: {}", e))
        .ok();

    storeledger_web::serve(AppState::new(ctx, web_logger), addr).await
}
