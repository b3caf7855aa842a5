//! Configuration management for Repeater
//!
//! This module handles loading, parsing, validating, and managing
//! configuration from files, environment variables, and CLI overrides.

use crate::error::{RepeaterError, Result};
use crate::executor::DEFAULT_MAX_CHAIN_DEPTH;
use anyhow::Context;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Upper bound accepted for `executor.max_chain_depth`
pub const MAX_CHAIN_DEPTH_LIMIT: u32 = 100;

/// Main configuration structure for Repeater
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Where the request database lives
    #[serde(default)]
    pub storage: StorageConfig,
    /// Outbound HTTP settings
    #[serde(default)]
    pub http: HttpConfig,
    /// Execution behavior
    #[serde(default)]
    pub executor: ExecutorConfig,
    /// Live cookie source
    #[serde(default)]
    pub cookies: CookieConfig,
    /// Log output
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Storage configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Database path; the platform data directory when unset
    #[serde(default)]
    pub path: Option<PathBuf>,
}

/// HTTP client configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Whole-request timeout; none when unset
    #[serde(default)]
    pub timeout_seconds: Option<u64>,
    /// User agent sent by requests that carry none
    #[serde(default)]
    pub user_agent: Option<String>,
}

/// Executor configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// Chain hops followed before an execution gives up
    #[serde(default = "default_max_chain_depth")]
    pub max_chain_depth: u32,
}

fn default_max_chain_depth() -> u32 {
    DEFAULT_MAX_CHAIN_DEPTH
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_chain_depth: default_max_chain_depth(),
        }
    }
}

/// Live cookie configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CookieConfig {
    /// Netscape cookie jar re-read before every execution
    #[serde(default)]
    pub jar_path: Option<PathBuf>,
}

/// Logging configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,
}

impl Config {
    /// Load configuration from file with environment and CLI overrides
    ///
    /// A missing file is not an error: defaults are used and a warning is
    /// logged.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to configuration file
    /// * `cli` - CLI arguments for overrides
    ///
    /// # Errors
    ///
    /// Returns `RepeaterError::Io` if the file exists but cannot be read,
    /// or `RepeaterError::Yaml` if it cannot be parsed
    pub fn load(path: &str, cli: &crate::cli::Cli) -> Result<Self> {
        let mut config = if Path::new(path).exists() {
            Self::from_file(path)?
        } else {
            tracing::warn!("Config file not found at {}, using defaults", path);
            Self::default()
        };

        config.apply_env_vars();
        config.apply_cli_overrides(cli);

        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(RepeaterError::Io)
            .with_context(|| format!("Failed to read config file {}", path))?;
        let config = serde_yaml::from_str(&contents)
            .map_err(RepeaterError::Yaml)
            .with_context(|| format!("Failed to parse config file {}", path))?;
        Ok(config)
    }

    fn apply_env_vars(&mut self) {
        if let Ok(path) = std::env::var("REPEATER_STORAGE_PATH") {
            self.storage.path = Some(PathBuf::from(path));
        }

        if let Ok(timeout) = std::env::var("REPEATER_HTTP_TIMEOUT_SECONDS") {
            if let Ok(value) = timeout.parse() {
                self.http.timeout_seconds = Some(value);
            } else {
                tracing::warn!("Invalid REPEATER_HTTP_TIMEOUT_SECONDS: {}", timeout);
            }
        }

        if let Ok(depth) = std::env::var("REPEATER_MAX_CHAIN_DEPTH") {
            if let Ok(value) = depth.parse() {
                self.executor.max_chain_depth = value;
            } else {
                tracing::warn!("Invalid REPEATER_MAX_CHAIN_DEPTH: {}", depth);
            }
        }

        if let Ok(jar) = std::env::var("REPEATER_COOKIE_JAR") {
            self.cookies.jar_path = Some(PathBuf::from(jar));
        }

        if let Ok(json) = std::env::var("REPEATER_LOG_JSON") {
            self.logging.json = matches!(json.to_lowercase().as_str(), "1" | "true" | "yes");
        }
    }

    fn apply_cli_overrides(&mut self, cli: &crate::cli::Cli) {
        if let Some(path) = &cli.storage_path {
            self.storage.path = Some(path.clone());
        }
        if let Some(jar) = &cli.cookie_jar {
            self.cookies.jar_path = Some(jar.clone());
        }
        if cli.verbose {
            tracing::debug!("Verbose mode enabled");
        }
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns `RepeaterError::Config` for a zero HTTP timeout or a chain
    /// depth above [`MAX_CHAIN_DEPTH_LIMIT`]
    pub fn validate(&self) -> Result<()> {
        if self.http.timeout_seconds == Some(0) {
            return Err(RepeaterError::Config(
                "http.timeout_seconds must be greater than 0".to_string(),
            )
            .into());
        }

        if self.executor.max_chain_depth > MAX_CHAIN_DEPTH_LIMIT {
            return Err(RepeaterError::Config(format!(
                "executor.max_chain_depth must be less than or equal to {}",
                MAX_CHAIN_DEPTH_LIMIT
            ))
            .into());
        }

        if matches!(&self.http.user_agent, Some(ua) if ua.trim().is_empty()) {
            return Err(
                RepeaterError::Config("http.user_agent cannot be empty".to_string()).into(),
            );
        }

        Ok(())
    }

    /// Database path, resolved against the platform data directory
    ///
    /// # Errors
    ///
    /// Returns `RepeaterError::Config` if no path is configured and the
    /// platform has no home directory
    pub fn storage_path(&self) -> Result<PathBuf> {
        if let Some(path) = &self.storage.path {
            return Ok(path.clone());
        }
        let dirs = ProjectDirs::from("dev", "repeater", "repeater").ok_or_else(|| {
            RepeaterError::Config("Could not determine a data directory".to_string())
        })?;
        Ok(dirs.data_dir().join("repeater.db"))
    }

    pub fn http_timeout(&self) -> Option<Duration> {
        self.http.timeout_seconds.map(Duration::from_secs)
    }
}
