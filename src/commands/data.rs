//! Export, import, groups and cron preview subcommands

use super::App;
use crate::cli::GroupCommand;
use crate::error::{RepeaterError, Result};
use crate::scheduler::CronExpression;
use crate::storage::ExportBundle;
use anyhow::Context;
use chrono::Local;
use colored::Colorize;
use prettytable::{format, Table};
use std::path::Path;

/// Write every collection except history as JSON
pub async fn export(app: &App, output: Option<&Path>) -> Result<()> {
    let bundle = app.store.export_all().await?;
    let json = serde_json::to_string_pretty(&bundle).map_err(RepeaterError::Serialization)?;
    match output {
        Some(path) => {
            tokio::fs::write(path, json)
                .await
                .map_err(RepeaterError::Io)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            eprintln!("{}", format!("Exported to {}", path.display()).green());
        }
        None => println!("{}", json),
    }
    Ok(())
}

/// Overwrite stored collections from an export file
///
/// Imported timers and cron schedules start on the next `serve`.
pub async fn import(app: &App, file: &Path) -> Result<()> {
    let bundle = read_bundle(file).await?;
    let count = bundle.requests.as_ref().map_or(0, Vec::len);
    app.store.import_all(bundle).await?;
    println!("{}", format!("Imported {} requests", count).green());
    Ok(())
}

async fn read_bundle(file: &Path) -> Result<ExportBundle> {
    let contents = tokio::fs::read_to_string(file)
        .await
        .map_err(RepeaterError::Io)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let bundle = serde_json::from_str(&contents)
        .map_err(RepeaterError::Serialization)
        .with_context(|| format!("Invalid export file {}", file.display()))?;
    Ok(bundle)
}

pub async fn groups(app: &App, command: GroupCommand) -> Result<()> {
    match command {
        GroupCommand::List => {
            let groups = app.store.get_all_groups().await?;
            if groups.is_empty() {
                println!("{}", "No groups found.".yellow());
                return Ok(());
            }
            let mut table = Table::new();
            table.set_format(*format::consts::FORMAT_BORDERS_ONLY);
            table.add_row(prettytable::row!["ID".bold(), "Name".bold(), "Color".bold()]);
            for group in groups {
                table.add_row(prettytable::row![group.id.cyan(), group.name, group.color]);
            }
            table.printstd();
        }
        GroupCommand::Create { name, color } => {
            let group = app.store.add_group(name, color).await?;
            println!(
                "{} {} ({})",
                "Created group".green(),
                group.name.bold(),
                group.id.cyan()
            );
        }
        GroupCommand::Delete { id } => {
            if !app.store.delete_group(&id).await? {
                return Err(RepeaterError::GroupNotFound(id).into());
            }
            println!("{}", format!("Deleted group {}", id).green());
        }
    }
    Ok(())
}

/// Print the next `count` local times `expression` fires at
pub fn cron_next(expression: &str, count: usize) -> Result<()> {
    let expr = CronExpression::parse(expression).map_err(RepeaterError::from)?;
    let mut from = Local::now();
    for _ in 0..count {
        let Some(next) = expr.next_run_after(&from) else {
            println!("{}", "No further runs within a year".yellow());
            break;
        };
        println!("{}", next.format("%Y-%m-%d %H:%M (%a)"));
        from = next;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::storage::Store;
    use std::sync::Arc;

    fn app() -> App {
        App::with_store(&Config::default(), Arc::new(Store::in_memory())).unwrap()
    }

    #[tokio::test]
    async fn test_import_missing_file_is_io_error() {
        let dir = crate::test_utils::temp_dir();
        let err = import(&app(), &dir.path().join("missing.json"))
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<RepeaterError>(),
            Some(RepeaterError::Io(_))
        ));
        assert!(err.to_string().contains("missing.json"));
    }

    #[tokio::test]
    async fn test_import_malformed_file_is_serialization_error() {
        let dir = crate::test_utils::temp_dir();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{not json").expect("write export");
        let err = import(&app(), &path).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<RepeaterError>(),
            Some(RepeaterError::Serialization(_))
        ));
    }

    #[tokio::test]
    async fn test_export_then_import_file() {
        let dir = crate::test_utils::temp_dir();
        let path = dir.path().join("export.json");
        let source = app();
        source.store.add_group("g".to_string(), None).await.unwrap();
        export(&source, Some(&path)).await.unwrap();

        let target = app();
        import(&target, &path).await.unwrap();
        assert_eq!(target.store.get_all_groups().await.unwrap().len(), 1);
    }
}
