//! History and statistics subcommands

use super::App;
use crate::error::Result;
use chrono::{Local, TimeZone};
use colored::Colorize;
use prettytable::{format, Table};

/// Show execution history, newest first
pub async fn show(app: &App, request_id: Option<&str>, limit: usize) -> Result<()> {
    let entries = app.store.get_history(request_id, Some(limit)).await?;

    if entries.is_empty() {
        println!("{}", "No execution history found.".yellow());
        return Ok(());
    }

    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_BORDERS_ONLY);

    table.add_row(prettytable::row![
        "When".bold(),
        "Request".bold(),
        "Method".bold(),
        "Status".bold(),
        "Time".bold(),
        "Result".bold()
    ]);

    for entry in entries {
        let when = Local
            .timestamp_millis_opt(entry.timestamp)
            .single()
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "-".to_string());
        let status = entry
            .status_code
            .map(|code| code.to_string())
            .unwrap_or_else(|| "-".to_string());
        let outcome = if entry.success {
            "ok".green()
        } else {
            entry.error.unwrap_or_else(|| "failed".to_string()).red()
        };

        table.add_row(prettytable::row![
            when,
            entry.request_name.cyan(),
            entry.method,
            status,
            format!("{}ms", entry.response_time_ms),
            outcome
        ]);
    }

    println!("\nExecution History:");
    table.printstd();
    println!();
    Ok(())
}

/// Clear history for one request or for all of them
pub async fn clear(app: &App, request_id: Option<&str>) -> Result<()> {
    app.store.clear_history(request_id).await?;
    match request_id {
        Some(id) => println!("{}", format!("Cleared history of {}", id).green()),
        None => println!("{}", "Cleared all history".green()),
    }
    Ok(())
}

/// Print aggregate statistics and the most executed requests
pub async fn stats(app: &App) -> Result<()> {
    let stats = app.dispatcher.requests().statistics().await?;

    println!("Requests:     {}", stats.total_requests);
    println!("Executions:   {}", stats.total_executions);
    println!("Success rate: {:.1}%", stats.success_rate);

    if stats.top_requests.is_empty() {
        return Ok(());
    }

    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_BORDERS_ONLY);
    table.add_row(prettytable::row![
        "Name".bold(),
        "Runs".bold(),
        "OK".bold(),
        "Avg ms".bold()
    ]);
    for top in stats.top_requests {
        table.add_row(prettytable::row![
            top.name.cyan(),
            top.execution_count,
            top.success_count,
            top.avg_response_time_ms
        ]);
    }
    println!("\nMost executed:");
    table.printstd();
    Ok(())
}
