//! Command-line interface definition for Repeater
//!
//! This module defines the CLI structure using clap's derive API: a
//! long-running `serve` mode speaking the JSON command protocol, plus
//! one-shot subcommands for managing and running saved requests.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Repeater - save curl commands and replay them
///
/// Bind captured curl commands to URL patterns, then run them on demand,
/// every N seconds, or on a cron schedule.
#[derive(Parser, Debug, Clone)]
#[command(name = "repeater")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/config.yaml")]
    pub config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Override the database location
    #[arg(long, global = true)]
    pub storage_path: Option<PathBuf>,

    /// Netscape cookie jar supplying live cookies
    #[arg(long, global = true)]
    pub cookie_jar: Option<PathBuf>,

    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands for Repeater
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Serve the JSON command protocol on stdin/stdout and run schedules
    Serve,

    /// Save a curl command
    Add {
        /// The curl command, quoted as one argument
        curl: String,

        /// Display name
        #[arg(short, long)]
        name: Option<String>,

        /// Wildcard URL pattern; defaults to the request URL
        #[arg(short = 'p', long)]
        pattern: Option<String>,

        /// Cookie names to refresh from the live jar (repeatable)
        #[arg(long = "replace-cookie")]
        replace_cookies: Vec<String>,

        /// Group id
        #[arg(short, long)]
        group: Option<String>,

        /// Request to run after this one succeeds
        #[arg(long)]
        chain: Option<String>,
    },

    /// Change fields of a saved request
    Update {
        /// Request id
        id: String,

        /// New curl command
        #[arg(long)]
        curl: Option<String>,

        #[arg(short, long)]
        name: Option<String>,

        #[arg(short = 'p', long)]
        pattern: Option<String>,

        /// Request to run after this one succeeds
        #[arg(long, conflicts_with = "no_chain")]
        chain: Option<String>,

        /// Remove the chain
        #[arg(long)]
        no_chain: bool,
    },

    /// Delete a saved request and stop its schedules
    Delete {
        /// Request id
        id: String,
    },

    /// List saved requests
    List {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// List requests whose pattern matches a URL
    Match {
        url: String,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Execute a saved request now
    Exec {
        /// Request id
        id: String,

        /// Print the full result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Execute several saved requests in order
    Batch {
        /// Request ids
        #[arg(required = true)]
        ids: Vec<String>,
    },

    /// Show execution history, newest first
    History {
        /// Only this request
        #[arg(short, long)]
        request: Option<String>,

        /// Maximum number of entries
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
    },

    /// Clear execution history
    ClearHistory {
        /// Only this request
        #[arg(short, long)]
        request: Option<String>,
    },

    /// Show aggregate statistics
    Stats,

    /// Write all data as JSON
    Export {
        /// Output file; stdout when omitted
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Replace stored data from an export file
    Import {
        /// Export file
        file: PathBuf,
    },

    /// Manage request groups
    Groups {
        #[command(subcommand)]
        command: GroupCommand,
    },

    /// Print the next runs of a cron expression
    CronNext {
        /// Five-field cron expression, quoted
        expression: String,

        /// Number of runs to print
        #[arg(short, long, default_value_t = 5)]
        count: usize,
    },
}

/// Group management subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum GroupCommand {
    /// List groups
    List,

    /// Create a group
    Create {
        name: String,

        /// Display color, e.g. #3b82f6
        #[arg(long)]
        color: Option<String>,
    },

    /// Delete a group; member requests are kept
    Delete { id: String },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_serve() {
        let cli = Cli::try_parse_from(["repeater", "serve"]).unwrap();
        assert!(matches!(cli.command, Commands::Serve));
        assert_eq!(cli.config, Some("config/config.yaml".to_string()));
        assert!(!cli.verbose);
    }

    #[test]
    fn test_cli_parse_add_with_options() {
        let cli = Cli::try_parse_from([
            "repeater",
            "add",
            "curl https://a.com",
            "--name",
            "ping",
            "--replace-cookie",
            "sid",
            "--replace-cookie",
            "csrf",
        ])
        .unwrap();
        if let Commands::Add {
            curl,
            name,
            replace_cookies,
            ..
        } = cli.command
        {
            assert_eq!(curl, "curl https://a.com");
            assert_eq!(name, Some("ping".to_string()));
            assert_eq!(replace_cookies, vec!["sid", "csrf"]);
        } else {
            panic!("Expected Add command");
        }
    }

    #[test]
    fn test_cli_global_overrides_after_subcommand() {
        let cli = Cli::try_parse_from([
            "repeater",
            "list",
            "--storage-path",
            "/tmp/x.db",
            "--cookie-jar",
            "/tmp/cookies.txt",
        ])
        .unwrap();
        assert_eq!(cli.storage_path, Some(PathBuf::from("/tmp/x.db")));
        assert_eq!(cli.cookie_jar, Some(PathBuf::from("/tmp/cookies.txt")));
    }

    #[test]
    fn test_cli_chain_flags_conflict() {
        let result = Cli::try_parse_from([
            "repeater",
            "update",
            "id1",
            "--chain",
            "id2",
            "--no-chain",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_batch_requires_ids() {
        assert!(Cli::try_parse_from(["repeater", "batch"]).is_err());
    }

    #[test]
    fn test_cli_parse_cron_next() {
        let cli = Cli::try_parse_from(["repeater", "cron-next", "*/5 * * * *", "-c", "3"]).unwrap();
        if let Commands::CronNext { expression, count } = cli.command {
            assert_eq!(expression, "*/5 * * * *");
            assert_eq!(count, 3);
        } else {
            panic!("Expected CronNext command");
        }
    }

    #[test]
    fn test_cli_parse_groups_create() {
        let cli = Cli::try_parse_from(["repeater", "groups", "create", "work"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Groups {
                command: GroupCommand::Create { .. }
            }
        ));
    }
}
