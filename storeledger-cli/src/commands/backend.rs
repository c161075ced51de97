//! Backend command - show which backend is selected and what is configured

use anyhow::Result;
use colored::Colorize;
use serde::Serialize;

use storeledger_core::config::Config;
use storeledger_core::domain::BackendKind;

use super::get_config;
use crate::output;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BackendStatus {
    backend: BackendKind,
    demo_mode: bool,
    data_dir: String,
    supabase_configured: bool,
    leancloud_configured: bool,
    privileged_key: bool,
    server_url: Option<String>,
    problem: Option<String>,
}

impl BackendStatus {
    fn from_config(config: &Config) -> Self {
        let server_url = match config.backend {
            BackendKind::Supabase => config.supabase.as_ref().map(|s| s.url.clone()),
            BackendKind::LeanCloud => config.leancloud.as_ref().map(|l| l.server_url.clone()),
        };
        Self {
            backend: config.backend,
            demo_mode: config.demo_mode,
            data_dir: config.data_dir.display().to_string(),
            supabase_configured: config.supabase.is_some(),
            leancloud_configured: config.leancloud.is_some(),
            privileged_key: config.has_privileged_key(),
            server_url,
            problem: config.validate().err().map(|e| e.to_string()),
        }
    }
}

fn yes_no(value: bool) -> String {
    if value {
        "yes".green().to_string()
    } else {
        "no".red().to_string()
    }
}

pub fn run(json: bool) -> Result<()> {
    let config = get_config()?;
    let status = BackendStatus::from_config(&config);

    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    println!("{}", "Backend".bold());
    println!();

    let mut table = output::create_table();
    table.add_row(vec!["Selected".to_string(), status.backend.to_string()]);
    table.add_row(vec!["Demo mode".to_string(), yes_no(status.demo_mode)]);
    table.add_row(vec!["Supabase credentials".to_string(), yes_no(status.supabase_configured)]);
    table.add_row(vec!["LeanCloud credentials".to_string(), yes_no(status.leancloud_configured)]);
    table.add_row(vec!["Privileged key".to_string(), yes_no(status.privileged_key)]);
    if let Some(url) = &status.server_url {
        table.add_row(vec!["Server".to_string(), url.clone()]);
    }
    table.add_row(vec!["Data directory".to_string(), status.data_dir.clone()]);
    println!("{}", table);

    match &status.problem {
        Some(problem) => output::warning(problem),
        None if !status.privileged_key && !status.demo_mode => {
            output::warning("No privileged key: joining companies by code will fail")
        }
        None => output::success("Ready"),
    }
    Ok(())
}
