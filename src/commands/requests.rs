//! Request subcommands: add, update, delete, list, match, exec, batch

use super::App;
use crate::error::Result;
use crate::executor::ExecutionResult;
use crate::requests::RequestInput;
use crate::storage::SavedRequest;
use chrono::{Local, TimeZone};
use colored::Colorize;
use prettytable::{format, Table};

/// Fields of `repeater add`
pub struct AddArgs {
    pub curl: String,
    pub name: Option<String>,
    pub pattern: Option<String>,
    pub replace_cookies: Vec<String>,
    pub group: Option<String>,
    pub chain: Option<String>,
}

pub async fn add(app: &App, args: AddArgs) -> Result<()> {
    let input = RequestInput {
        name: args.name,
        url_pattern: args.pattern,
        curl: Some(args.curl),
        cookie_replace: (!args.replace_cookies.is_empty()).then_some(args.replace_cookies),
        group_id: args.group.map(Some),
        chain_next_id: args.chain.map(Some),
    };
    let request = app.dispatcher.requests().create(input).await?;
    println!(
        "{} {} ({})",
        "Saved".green(),
        request.name.bold(),
        request.id.cyan()
    );
    Ok(())
}

pub async fn update(
    app: &App,
    id: &str,
    curl: Option<String>,
    name: Option<String>,
    pattern: Option<String>,
    chain: Option<String>,
    no_chain: bool,
) -> Result<()> {
    let chain_next_id = if no_chain {
        Some(None)
    } else {
        chain.map(Some)
    };
    let input = RequestInput {
        name,
        url_pattern: pattern,
        curl,
        chain_next_id,
        ..Default::default()
    };
    app.dispatcher.requests().update(id, input).await?;
    println!("{}", format!("Updated request {}", id).green());
    Ok(())
}

pub async fn delete(app: &App, id: &str) -> Result<()> {
    app.dispatcher.requests().delete(id).await?;
    println!("{}", format!("Deleted request {}", id).green());
    Ok(())
}

/// List all requests, or only those matching `url`
pub async fn list(app: &App, url: Option<&str>, json: bool) -> Result<()> {
    let manager = app.dispatcher.requests();
    let requests = match url {
        Some(url) => manager.requests_for_url(url).await?,
        None => manager.all_requests().await?,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&requests)?);
        return Ok(());
    }
    if requests.is_empty() {
        println!("{}", "No saved requests found.".yellow());
        return Ok(());
    }
    print_requests(&requests);
    Ok(())
}

fn print_requests(requests: &[SavedRequest]) {
    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_BORDERS_ONLY);
    table.add_row(prettytable::row![
        "ID".bold(),
        "Name".bold(),
        "Method".bold(),
        "Pattern".bold(),
        "Runs".bold(),
        "OK".bold(),
        "Avg ms".bold(),
        "Last Run".bold()
    ]);

    for request in requests {
        let last_run = request
            .last_executed_at
            .and_then(|ms| Local.timestamp_millis_opt(ms).single())
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "-".to_string());
        table.add_row(prettytable::row![
            short_id(&request.id).cyan(),
            truncate(&request.name, 30),
            request.parsed_request.method,
            truncate(&request.url_pattern, 40),
            request.statistics.execution_count,
            request.statistics.success_count,
            request.statistics.avg_response_time_ms,
            last_run
        ]);
    }
    table.printstd();
}

pub async fn exec(app: &App, id: &str, json: bool) -> Result<()> {
    let result = app.executor.execute(id).await;
    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_result(&result, 0);
    }
    Ok(())
}

pub async fn batch(app: &App, ids: &[String]) -> Result<()> {
    let results = app.executor.execute_batch(ids).await;
    for result in &results {
        print_result(result, 0);
    }
    let ok = results.iter().filter(|r| r.success).count();
    println!("\n{}/{} succeeded", ok, results.len());
    Ok(())
}

fn print_result(result: &ExecutionResult, depth: usize) {
    let indent = "  ".repeat(depth);
    let marker = if result.success {
        "OK".green()
    } else {
        "FAIL".red()
    };
    let status = match (result.status_code, &result.status_text) {
        (Some(code), Some(text)) => format!("{} {}", code, text),
        (Some(code), None) => code.to_string(),
        _ => "-".to_string(),
    };
    let elapsed = result
        .response_time_ms
        .map(|ms| format!("{}ms", ms))
        .unwrap_or_default();
    println!(
        "{}{} {} {} {}",
        indent,
        marker,
        short_id(&result.request_id).cyan(),
        status,
        elapsed
    );
    if let Some(error) = &result.error {
        println!("{}  {}", indent, error.red());
    }
    if let Some(next) = &result.chain_result {
        print_result(next, depth + 1);
    }
}

fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() > max {
        let head: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", head)
    } else {
        s.to_string()
    }
}
