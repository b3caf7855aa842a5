//! Saved request management
//!
//! Validation and bookkeeping around the store: curl commands are parsed
//! before anything is written, deletions stop the request's schedules
//! first, and listings come back most recently executed first.

use crate::curl_parser;
use crate::error::{RepeaterError, Result};
use crate::scheduler::SchedulerRegistry;
use crate::storage::{NewRequest, RequestUpdate, SavedRequest, Store};
use crate::url_pattern;
use serde::{Deserialize, Deserializer, Serialize};
use std::sync::Arc;
use tracing::info;

/// Name given to requests saved without one
pub const UNNAMED_REQUEST: &str = "Unnamed Request";

/// Number of entries in [`RequestStatistics::top_requests`]
const TOP_REQUESTS: usize = 5;

/// Request fields as supplied by a client, for create and update alike
///
/// On update, absent fields are left untouched; `groupId` and
/// `chainNextId` may be sent as `null` to clear them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestInput {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub url_pattern: Option<String>,
    #[serde(default, alias = "rawCommand")]
    pub curl: Option<String>,
    #[serde(default, alias = "cookieReplaceList")]
    pub cookie_replace: Option<Vec<String>>,
    #[serde(
        default,
        deserialize_with = "double_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub group_id: Option<Option<String>>,
    #[serde(
        default,
        deserialize_with = "double_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub chain_next_id: Option<Option<String>>,
}

/// Distinguish an explicit `null` from an absent field
fn double_option<'de, T, D>(deserializer: D) -> std::result::Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Per-request summary used in [`RequestStatistics`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestSummary {
    pub id: String,
    pub name: String,
    pub execution_count: u64,
    pub success_count: u64,
    pub avg_response_time_ms: u64,
}

/// Aggregate execution statistics across all requests
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestStatistics {
    pub total_requests: usize,
    pub total_executions: u64,
    /// Percentage of successful executions, one decimal place
    pub success_rate: f64,
    /// Most executed requests, at most five
    pub top_requests: Vec<RequestSummary>,
}

/// CRUD and queries over saved requests
pub struct RequestManager {
    store: Arc<Store>,
    schedulers: Arc<SchedulerRegistry>,
}

impl RequestManager {
    pub fn new(store: Arc<Store>, schedulers: Arc<SchedulerRegistry>) -> Self {
        Self { store, schedulers }
    }

    /// Validate and save a new request
    ///
    /// The name defaults to [`UNNAMED_REQUEST`], the URL pattern to the
    /// request's own URL, and the cookie replace list to the stored
    /// default. Nothing is written if the curl command is rejected.
    ///
    /// # Errors
    ///
    /// Returns `RepeaterError::Parse` for an invalid curl command and
    /// `RepeaterError::Storage` if the write fails.
    pub async fn create(&self, input: RequestInput) -> Result<SavedRequest> {
        let raw = input.curl.unwrap_or_default();
        let parsed = curl_parser::validate(&raw).map_err(RepeaterError::from)?;

        let cookie_replace_list = match input.cookie_replace {
            Some(list) => list,
            None => self.store.get_config().await?.default_cookie_replace,
        };
        let url_pattern = input
            .url_pattern
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| url_pattern::strip_query(&parsed.url).to_string());

        let request = self
            .store
            .add_request(NewRequest {
                name: input
                    .name
                    .filter(|n| !n.is_empty())
                    .unwrap_or_else(|| UNNAMED_REQUEST.to_string()),
                url_pattern,
                raw_command: raw,
                parsed_request: parsed,
                cookie_replace_list,
                group_id: input.group_id.flatten(),
                chain_next_id: input.chain_next_id.flatten(),
            })
            .await?;
        info!(request_id = %request.id, name = %request.name, "Request created");
        Ok(request)
    }

    /// Merge `input` onto a stored request
    ///
    /// A new curl command is validated and re-parsed before anything is
    /// written.
    ///
    /// # Errors
    ///
    /// Returns `RepeaterError::Parse` for an invalid curl command and
    /// `RepeaterError::RequestNotFound` if `id` is not stored.
    pub async fn update(&self, id: &str, input: RequestInput) -> Result<()> {
        let mut update = RequestUpdate {
            name: input.name,
            url_pattern: input.url_pattern,
            cookie_replace_list: input.cookie_replace,
            group_id: input.group_id,
            chain_next_id: input.chain_next_id,
            ..Default::default()
        };
        if let Some(raw) = input.curl {
            update.parsed_request = Some(curl_parser::validate(&raw).map_err(RepeaterError::from)?);
            update.raw_command = Some(raw);
        }

        if !self.store.update_request(id, update).await? {
            return Err(RepeaterError::RequestNotFound(id.to_string()).into());
        }
        info!(request_id = %id, "Request updated");
        Ok(())
    }

    /// Stop the request's schedules, then delete it
    ///
    /// # Errors
    ///
    /// Returns `RepeaterError::RequestNotFound` if `id` is not stored.
    pub async fn delete(&self, id: &str) -> Result<()> {
        self.schedulers.stop_all_for(id).await?;
        if !self.store.delete_request(id).await? {
            return Err(RepeaterError::RequestNotFound(id.to_string()).into());
        }
        info!(request_id = %id, "Request deleted");
        Ok(())
    }

    /// Requests whose pattern matches `url`, most recently executed first
    pub async fn requests_for_url(&self, url: &str) -> Result<Vec<SavedRequest>> {
        let mut matched: Vec<SavedRequest> = self
            .store
            .get_all_requests()
            .await?
            .into_iter()
            .filter(|r| url_pattern::matches(url, &r.url_pattern))
            .collect();
        url_pattern::sort_by_last_executed(&mut matched);
        Ok(matched)
    }

    /// Every request, most recently executed first
    pub async fn all_requests(&self) -> Result<Vec<SavedRequest>> {
        let mut requests = self.store.get_all_requests().await?;
        url_pattern::sort_by_last_executed(&mut requests);
        Ok(requests)
    }

    pub async fn statistics(&self) -> Result<RequestStatistics> {
        let requests = self.store.get_all_requests().await?;
        Ok(summarize(&requests))
    }
}

/// Aggregate the counters of `requests`
pub fn summarize(requests: &[SavedRequest]) -> RequestStatistics {
    let total_executions: u64 = requests.iter().map(|r| r.statistics.execution_count).sum();
    let total_success: u64 = requests.iter().map(|r| r.statistics.success_count).sum();
    let success_rate = if total_executions > 0 {
        (total_success as f64 * 1000.0 / total_executions as f64).round() / 10.0
    } else {
        0.0
    };

    let mut ranked: Vec<&SavedRequest> = requests.iter().collect();
    ranked.sort_by(|a, b| {
        b.statistics
            .execution_count
            .cmp(&a.statistics.execution_count)
    });
    let top_requests = ranked
        .into_iter()
        .take(TOP_REQUESTS)
        .map(|r| RequestSummary {
            id: r.id.clone(),
            name: r.name.clone(),
            execution_count: r.statistics.execution_count,
            success_count: r.statistics.success_count,
            avg_response_time_ms: r.statistics.avg_response_time_ms,
        })
        .collect();

    RequestStatistics {
        total_requests: requests.len(),
        total_executions,
        success_rate,
        top_requests,
    }
}
