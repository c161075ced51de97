//! Report command - print financial reports for a signed-in user

use std::io::{self, BufRead};

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::ValueEnum;
use colored::Colorize;
use comfy_table::Cell;

use storeledger_core::domain::{Credentials, TransactionType};
use storeledger_core::services::reports::{ActivityFlow, ReportSection};
use storeledger_core::services::{
    CashFlowReport, LogEvent, ProfitLossReport, ReportQuery, StoreMetricsReport, UserContext,
};
use storeledger_core::LedgerContext;

use super::{get_context, get_logger, log_event};
use crate::output::{self, format_money, format_percent, money_cell, signed_money};

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ReportKind {
    /// Profit and loss statement
    ProfitLoss,
    /// Cash flow statement by activity
    CashFlow,
    /// Per-store performance
    Stores,
}

impl ReportKind {
    fn as_str(&self) -> &'static str {
        match self {
            ReportKind::ProfitLoss => "profit-loss",
            ReportKind::CashFlow => "cash-flow",
            ReportKind::Stores => "stores",
        }
    }
}

pub struct ReportArgs {
    pub kind: ReportKind,
    pub email: String,
    pub password: Option<String>,
    pub period: Option<String>,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub store: Option<String>,
    pub json: bool,
}

/// Password from the flag (or its env var), piped stdin, or a prompt
fn read_password(password: Option<String>) -> Result<String> {
    if let Some(password) = password {
        return Ok(password);
    }
    if atty::isnt(atty::Stream::Stdin) {
        let mut line = String::new();
        io::stdin().lock().read_line(&mut line)?;
        return Ok(line.trim_end_matches(['\r', '\n']).to_string());
    }
    dialoguer::Password::new()
        .with_prompt("Password")
        .interact()
        .context("Failed to read password")
}

async fn sign_in(ledger: &LedgerContext, email: String, password: String) -> Result<UserContext> {
    let auth = &ledger.auth_service;
    let signed_in = auth.sign_in(Credentials::new(email, password)).await?;
    let resolved = auth.resolve(signed_in.session).await?;
    Ok(resolved.context)
}

pub async fn run(args: ReportArgs) -> Result<()> {
    let logger = get_logger();
    let ledger = get_context()?;
    let password = read_password(args.password)?;

    let query = ReportQuery {
        period: args.period,
        start: args.start,
        end: args.end,
        store_id: args.store,
    };

    let ctx = sign_in(&ledger, args.email, password).await?;
    let result = print_report(&ledger, &ctx, args.kind, &query, args.json).await;

    if let Err(e) = ledger.auth_service.sign_out(&ctx.session).await {
        tracing::debug!("Sign-out after report failed: {}", e);
    }

    let mut event = LogEvent::new("command_run")
        .with_command(format!("report {}", args.kind.as_str()))
        .with_backend(ledger.backend_kind().as_str());
    if let Err(e) = &result {
        event = with_failure(event, e);
    }
    log_event(&logger, event);

    result
}

/// Domain errors keep their kind in the event log
fn with_failure(event: LogEvent, error: &anyhow::Error) -> LogEvent {
    match error.downcast_ref::<storeledger_core::Error>() {
        Some(err) => event.with_error(err),
        None => event.with_error_message(format!("{:#}", error)),
    }
}

async fn print_report(
    ledger: &LedgerContext,
    ctx: &UserContext,
    kind: ReportKind,
    query: &ReportQuery,
    json: bool,
) -> Result<()> {
    let reports = &ledger.report_service;
    match kind {
        ReportKind::ProfitLoss => {
            let report = reports.profit_loss(ctx, query).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_profit_loss(&report);
            }
        }
        ReportKind::CashFlow => {
            let report = reports.cash_flow(ctx, query).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_cash_flow(&report);
            }
        }
        ReportKind::Stores => {
            let report = reports.store_metrics(ctx, query).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_store_metrics(&report);
            }
        }
    }
    Ok(())
}

fn add_section(table: &mut comfy_table::Table, title: &str, section: &ReportSection) {
    table.add_row(vec![
        Cell::new(title.bold()),
        money_cell(section.total),
        Cell::new(""),
        Cell::new(""),
    ]);
    for line in &section.lines {
        table.add_row(vec![
            Cell::new(format!("  {}", line.category)),
            money_cell(line.amount),
            Cell::new(line.count),
            Cell::new(format!("{:.2}%", line.share)),
        ]);
    }
}

fn print_profit_loss(report: &ProfitLossReport) {
    println!(
        "{} {} to {}\n",
        "Profit & Loss".bold(),
        report.period.start,
        report.period.end
    );

    let mut table = output::create_table();
    table.set_header(vec!["Category", "Amount", "Count", "Share"]);
    add_section(&mut table, "Revenue", &report.revenue);
    add_section(&mut table, "Operating expenses", &report.operating_expenses);
    add_section(&mut table, "Non-operating income", &report.non_operating_income);
    add_section(&mut table, "Non-operating expenses", &report.non_operating_expenses);
    println!("{}", table);

    println!();
    println!("  Total income:     {}", format_money(report.total_income));
    println!("  Total expense:    {}", format_money(report.total_expense));
    println!("  Operating profit: {}", signed_money(report.operating_profit));
    println!("  Net profit:       {}", signed_money(report.net_profit));
    println!("  Profit margin:    {}", format_percent(report.profit_margin));
    if report.excluded_count > 0 {
        println!(
            "{}",
            format!(
                "  {} transaction(s) excluded from profit and loss",
                report.excluded_count
            )
            .dimmed()
        );
    }
}

fn add_activity(table: &mut comfy_table::Table, flow: &ActivityFlow) {
    table.add_row(vec![
        Cell::new(flow.activity.as_str().bold()),
        money_cell(flow.inflow),
        money_cell(flow.outflow),
        Cell::new(signed_money(flow.net)),
    ]);
    for line in &flow.lines {
        let (inflow, outflow) = if line.kind == TransactionType::Income {
            (money_cell(line.amount), Cell::new(""))
        } else {
            (Cell::new(""), money_cell(line.amount))
        };
        table.add_row(vec![
            Cell::new(format!("  {} ({})", line.category, line.count)),
            inflow,
            outflow,
            Cell::new(""),
        ]);
    }
}

fn print_cash_flow(report: &CashFlowReport) {
    println!(
        "{} {} to {}\n",
        "Cash Flow".bold(),
        report.period.start,
        report.period.end
    );
    println!("  Opening balance: {}\n", format_money(report.opening_balance));

    let mut table = output::create_table();
    table.set_header(vec!["Activity", "Inflow", "Outflow", "Net"]);
    for flow in &report.activities {
        add_activity(&mut table, flow);
    }
    println!("{}", table);

    println!();
    println!("  Net change:      {}", signed_money(report.net_change));
    println!("  Closing balance: {}", format_money(report.closing_balance));
}

fn print_store_metrics(report: &StoreMetricsReport) {
    println!(
        "{} {} to {}\n",
        "Store Performance".bold(),
        report.period.start,
        report.period.end
    );

    if report.stores.is_empty() {
        println!("No stores found.");
        return;
    }

    let mut table = output::create_table();
    table.set_header(vec![
        "Store", "Income", "Expense", "Net", "Count", "Average", "Margin", "Share",
    ]);
    for store in &report.stores {
        let is_top = store.store_id.is_some() && store.store_id == report.top_store_id;
        let name = if is_top {
            format!("{} *", store.store_name).green().to_string()
        } else {
            store.store_name.clone()
        };
        table.add_row(vec![
            Cell::new(name),
            money_cell(store.income),
            money_cell(store.expense),
            Cell::new(signed_money(store.net_profit)),
            Cell::new(store.transaction_count),
            money_cell(store.average_transaction),
            Cell::new(format_percent(store.profit_margin)),
            Cell::new(format_percent(store.income_share)),
        ]);
    }
    let totals = &report.totals;
    table.add_row(vec![
        Cell::new("Total".bold()),
        money_cell(totals.income),
        money_cell(totals.expense),
        Cell::new(signed_money(totals.net_profit)),
        Cell::new(totals.transaction_count),
        Cell::new(""),
        Cell::new(format_percent(totals.profit_margin)),
        Cell::new(""),
    ]);
    println!("{}", table);

    if report.top_store_id.is_some() {
        println!("{}", "* highest net profit".dimmed());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storeledger_core::Error;

    #[test]
    fn test_failure_keeps_domain_error_kind() {
        let forbidden = anyhow::Error::new(Error::forbidden("Only owners can manage members"));
        let event = with_failure(LogEvent::new("command_run"), &forbidden);
        assert_eq!(event.error_kind.as_deref(), Some("forbidden"));
        assert!(event.error_message.unwrap().contains("Only owners"));

        let other = anyhow::anyhow!("stdin closed");
        let event = with_failure(LogEvent::new("command_run"), &other);
        assert_eq!(event.error_kind, None);
        assert_eq!(event.error_message.as_deref(), Some("stdin closed"));
    }
}
