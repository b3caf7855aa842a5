//! Repeater - save curl commands and replay them on demand or on a schedule
//!
#![doc = "Main entry point for the repeater CLI."]

use anyhow::Result;

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use repeater::cli::Cli;
use repeater::commands;
use repeater::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_args();

    // The output format lives in the config, so loading it logs through
    // a plain stderr subscriber scoped to the load.
    let config_path = cli.config.as_deref().unwrap_or("config/config.yaml");
    let config = tracing::subscriber::with_default(
        tracing_subscriber::registry()
            .with(env_filter(cli.verbose))
            .with(fmt::layer().with_writer(std::io::stderr)),
        || Config::load(config_path, &cli),
    )?;
    config.validate()?;

    init_tracing(cli.verbose, config.logging.json);
    tracing::debug!(config = config_path, "Configuration loaded");

    commands::run(cli.command, &config).await
}

fn env_filter(verbose: bool) -> EnvFilter {
    let default_filter = if verbose {
        "repeater=debug"
    } else {
        "repeater=info"
    };
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter))
}

/// Initialize tracing on stderr; stdout is reserved for command output
fn init_tracing(verbose: bool, json: bool) {
    let (plain, structured) = if json {
        (
            None,
            Some(fmt::layer().json().with_writer(std::io::stderr)),
        )
    } else {
        (Some(fmt::layer().with_writer(std::io::stderr)), None)
    };

    tracing_subscriber::registry()
        .with(env_filter(verbose))
        .with(plain)
        .with(structured)
        .init();
}
