use crate::curl_parser::ParsedRequest;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Schema version written into every export bundle
pub const EXPORT_VERSION: &str = "2.0.0";

/// Default color assigned to a group created without one
pub const DEFAULT_GROUP_COLOR: &str = "#3b82f6";

/// A saved curl command bound to a URL pattern
///
/// Field aliases accept the layout written by earlier releases
/// (`curl`, `cookieReplace`, `lastExecuted`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedRequest {
    /// Unique identifier (UUID v4)
    pub id: String,
    /// Display name
    pub name: String,
    /// Wildcard pattern of the pages this request belongs to
    pub url_pattern: String,
    /// The curl command exactly as entered
    #[serde(alias = "curl")]
    pub raw_command: String,
    /// Structured form of `raw_command`
    pub parsed_request: ParsedRequest,
    /// Cookies refreshed from the live jar; empty means all of them
    #[serde(default, alias = "cookieReplace")]
    pub cookie_replace_list: Vec<String>,
    /// Optional group membership
    #[serde(default)]
    pub group_id: Option<String>,
    /// Request executed after this one succeeds
    #[serde(default)]
    pub chain_next_id: Option<String>,
    /// Creation time (epoch milliseconds)
    pub created_at: i64,
    /// Last execution time (epoch milliseconds)
    #[serde(default, alias = "lastExecuted")]
    pub last_executed_at: Option<i64>,
    /// Running execution counters
    #[serde(default)]
    pub statistics: Statistics,
}

/// Running execution counters for one request
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Statistics {
    pub execution_count: u64,
    pub success_count: u64,
    pub failure_count: u64,
    #[serde(alias = "totalResponseTime")]
    pub total_response_time_ms: u64,
    #[serde(alias = "avgResponseTime")]
    pub avg_response_time_ms: u64,
}

/// Fields supplied when a request is first stored
#[derive(Debug, Clone)]
pub struct NewRequest {
    pub name: String,
    pub url_pattern: String,
    pub raw_command: String,
    pub parsed_request: ParsedRequest,
    pub cookie_replace_list: Vec<String>,
    pub group_id: Option<String>,
    pub chain_next_id: Option<String>,
}

/// Partial update of a stored request; `None` leaves a field untouched
#[derive(Debug, Clone, Default)]
pub struct RequestUpdate {
    pub name: Option<String>,
    pub url_pattern: Option<String>,
    pub raw_command: Option<String>,
    pub parsed_request: Option<ParsedRequest>,
    pub cookie_replace_list: Option<Vec<String>>,
    /// `Some(None)` clears the group
    pub group_id: Option<Option<String>>,
    /// `Some(None)` clears the chain
    pub chain_next_id: Option<Option<String>>,
}

impl RequestUpdate {
    /// Shallow-merge the present fields onto `request`
    pub fn apply(self, request: &mut SavedRequest) {
        if let Some(name) = self.name {
            request.name = name;
        }
        if let Some(url_pattern) = self.url_pattern {
            request.url_pattern = url_pattern;
        }
        if let Some(raw_command) = self.raw_command {
            request.raw_command = raw_command;
        }
        if let Some(parsed_request) = self.parsed_request {
            request.parsed_request = parsed_request;
        }
        if let Some(list) = self.cookie_replace_list {
            request.cookie_replace_list = list;
        }
        if let Some(group_id) = self.group_id {
            request.group_id = group_id;
        }
        if let Some(chain_next_id) = self.chain_next_id {
            request.chain_next_id = chain_next_id;
        }
    }
}

/// A label requests can reference
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    pub id: String,
    pub name: String,
    pub color: String,
}

/// Partial update of a group
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
}

/// One execution outcome, appended after every execution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub request_id: String,
    /// Request name at the time of execution
    pub request_name: String,
    /// Epoch milliseconds
    pub timestamp: i64,
    pub success: bool,
    #[serde(default)]
    pub status_code: Option<u16>,
    #[serde(default)]
    pub error: Option<String>,
    pub response_time_ms: u64,
    pub url: String,
    pub method: String,
}

/// Persisted form of a running timer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerRecord {
    /// Seconds between executions
    pub interval: u64,
}

/// Persisted form of a running cron schedule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CronRecord {
    pub expression: String,
}

/// User-level settings stored alongside the requests
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppSettings {
    /// Cookie replace list applied to requests created without one
    #[serde(default)]
    pub default_cookie_replace: Vec<String>,
    /// How long UI notifications stay visible
    #[serde(default = "default_notification_duration", alias = "notificationDuration")]
    pub notification_duration_ms: u64,
    #[serde(default = "default_enable_batch")]
    pub enable_batch_execution: bool,
}

fn default_notification_duration() -> u64 {
    5000
}

fn default_enable_batch() -> bool {
    true
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            default_cookie_replace: Vec::new(),
            notification_duration_ms: default_notification_duration(),
            enable_batch_execution: default_enable_batch(),
        }
    }
}

/// Full snapshot produced by export and consumed by import
///
/// Every section is optional on import; absent sections are left as they
/// are in the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportBundle {
    #[serde(default)]
    pub requests: Option<Vec<SavedRequest>>,
    #[serde(default)]
    pub groups: Option<Vec<Group>>,
    #[serde(default)]
    pub config: Option<AppSettings>,
    #[serde(default)]
    pub timers: Option<BTreeMap<String, TimerRecord>>,
    #[serde(default)]
    pub crons: Option<BTreeMap<String, CronRecord>>,
    /// Epoch milliseconds
    #[serde(default)]
    pub exported_at: i64,
    #[serde(default)]
    pub version: String,
}
