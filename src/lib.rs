//! Repeater - saved HTTP request library
//!
//! Saves curl commands, replays them with live cookies, follows request
//! chains, and re-executes requests on fixed intervals or cron schedules.
//!
//! # Architecture
//!
//! - `curl_parser`: turns a curl command line into a structured request
//! - `url_pattern`: matches page URLs against saved request patterns
//! - `storage`: typed collections over a key-value backend
//! - `cookies`: live cookie lookup and merging
//! - `executor`: HTTP execution, statistics, history, chaining
//! - `scheduler`: interval timers and cron schedules
//! - `requests`: request CRUD on top of the store
//! - `dispatcher`: JSON command protocol
//! - `config`, `error`, `cli`, `commands`: the command-line application
//!
//! # Example
//!
//! ```no_run
//! use repeater::{RequestExecutor, Store};
//! use repeater::executor::ReqwestDispatcher;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let store = Arc::new(Store::open("repeater.db")?);
//!     let http = Arc::new(ReqwestDispatcher::new(None, None)?);
//!     let executor = RequestExecutor::new(store, http);
//!     let result = executor.execute("some-request-id").await;
//!     println!("{}", result.success);
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod commands;
pub mod config;
pub mod cookies;
pub mod curl_parser;
pub mod dispatcher;
pub mod error;
pub mod executor;
pub mod requests;
pub mod scheduler;
pub mod storage;
pub mod url_pattern;

pub use config::Config;
pub use dispatcher::CommandDispatcher;
pub use error::{RepeaterError, Result};
pub use executor::RequestExecutor;
pub use scheduler::SchedulerRegistry;
pub use storage::Store;

#[cfg(test)]
pub mod test_utils;
