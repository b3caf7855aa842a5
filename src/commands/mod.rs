//! Command handlers for the CLI
//!
//! Every subcommand builds the same [`App`] from the loaded configuration
//! and then drives it: `serve` through the JSON command protocol, the
//! others through the request manager, executor and store directly.

use crate::cli::Commands;
use crate::config::Config;
use crate::cookies::CookieJarFile;
use crate::dispatcher::CommandDispatcher;
use crate::error::Result;
use crate::executor::{RequestExecutor, ReqwestDispatcher};
use crate::scheduler::SchedulerRegistry;
use crate::storage::Store;
use std::sync::Arc;
use tracing::debug;

pub mod data;
pub mod history;
pub mod requests;
pub mod serve;

/// Fully wired service components
pub struct App {
    pub store: Arc<Store>,
    pub executor: Arc<RequestExecutor>,
    pub schedulers: Arc<SchedulerRegistry>,
    pub dispatcher: CommandDispatcher,
}

impl App {
    /// Open the store and wire the executor, schedulers and dispatcher
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or the HTTP
    /// client cannot be built
    pub fn from_config(config: &Config) -> Result<Self> {
        let path = config.storage_path()?;
        debug!(path = %path.display(), "Opening store");
        let store = Arc::new(Store::open(&path)?);
        Self::with_store(config, store)
    }

    /// Wire everything over an already opened store
    pub fn with_store(config: &Config, store: Arc<Store>) -> Result<Self> {
        let http = Arc::new(ReqwestDispatcher::new(
            config.http_timeout(),
            config.http.user_agent.as_deref(),
        )?);
        let mut executor = RequestExecutor::new(store.clone(), http)
            .with_max_chain_depth(config.executor.max_chain_depth);
        if let Some(jar) = &config.cookies.jar_path {
            debug!(jar = %jar.display(), "Using cookie jar");
            executor = executor.with_cookie_provider(Arc::new(CookieJarFile::new(jar)));
        }
        let executor = Arc::new(executor);
        let schedulers = Arc::new(SchedulerRegistry::new(executor.clone()));
        let dispatcher = CommandDispatcher::new(executor.clone(), schedulers.clone());
        Ok(Self {
            store,
            executor,
            schedulers,
            dispatcher,
        })
    }
}

/// Run one CLI command to completion
pub async fn run(command: Commands, config: &Config) -> Result<()> {
    // cron-next needs no storage
    if let Commands::CronNext { expression, count } = &command {
        return data::cron_next(expression, *count);
    }

    let app = App::from_config(config)?;
    match command {
        Commands::Serve => serve::run_stdio(&app).await,
        Commands::Add {
            curl,
            name,
            pattern,
            replace_cookies,
            group,
            chain,
        } => {
            requests::add(
                &app,
                requests::AddArgs {
                    curl,
                    name,
                    pattern,
                    replace_cookies,
                    group,
                    chain,
                },
            )
            .await
        }
        Commands::Update {
            id,
            curl,
            name,
            pattern,
            chain,
            no_chain,
        } => requests::update(&app, &id, curl, name, pattern, chain, no_chain).await,
        Commands::Delete { id } => requests::delete(&app, &id).await,
        Commands::List { json } => requests::list(&app, None, json).await,
        Commands::Match { url, json } => requests::list(&app, Some(&url), json).await,
        Commands::Exec { id, json } => requests::exec(&app, &id, json).await,
        Commands::Batch { ids } => requests::batch(&app, &ids).await,
        Commands::History { request, limit } => {
            history::show(&app, request.as_deref(), limit).await
        }
        Commands::ClearHistory { request } => history::clear(&app, request.as_deref()).await,
        Commands::Stats => history::stats(&app).await,
        Commands::Export { output } => data::export(&app, output.as_deref()).await,
        Commands::Import { file } => data::import(&app, &file).await,
        Commands::Groups { command } => data::groups(&app, command).await,
        Commands::CronNext { .. } => Ok(()),
    }
}
