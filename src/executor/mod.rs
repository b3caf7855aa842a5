//! Request execution
//!
//! [`RequestExecutor`] replays a saved request: it merges live cookies into
//! the stored headers, dispatches the request, records statistics and
//! history, and follows the request's chain on success.
//!
//! Failures never escape as errors. A missing request, a network error or a
//! runaway chain all come back as an [`ExecutionResult`] with
//! `success == false` and an [`ErrorKind`].

use crate::cookies::CookieProvider;
use crate::storage::{HistoryEntry, SavedRequest, Store};
use chrono::Utc;
use futures::future::{BoxFuture, FutureExt};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

pub mod dispatch;
pub mod stats;

pub use dispatch::{DispatchRequest, DispatchResponse, HttpDispatcher, ReqwestDispatcher};
pub use stats::StatisticsTracker;

/// Default number of chain hops followed before giving up
pub const DEFAULT_MAX_CHAIN_DEPTH: u32 = 10;

/// Why an execution failed without producing an HTTP status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    RequestNotFound,
    ChainDepthExceeded,
    Network,
    Storage,
}

/// Outcome of executing one saved request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    pub request_id: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_time_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_body: Option<String>,
    #[serde(default)]
    pub response_headers: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    /// Result of the chained request, when one ran
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chain_result: Option<Box<ExecutionResult>>,
}

impl ExecutionResult {
    fn failure(request_id: &str, kind: ErrorKind, error: impl Into<String>) -> Self {
        Self {
            request_id: request_id.to_string(),
            success: false,
            error: Some(error.into()),
            error_kind: Some(kind),
            ..Default::default()
        }
    }

    /// Depth of the chain below this result, counting this one
    pub fn chain_len(&self) -> usize {
        1 + self.chain_result.as_ref().map_or(0, |next| next.chain_len())
    }

    /// The last result of the chain
    pub fn innermost(&self) -> &ExecutionResult {
        match &self.chain_result {
            Some(next) => next.innermost(),
            None => self,
        }
    }
}

/// Merge curl-embedded cookies with live ones
///
/// With an empty `replace_list` the live set is used as is. Otherwise the
/// curl cookies are kept and only the listed names that have a live value
/// are overridden.
pub fn merge_cookies(
    curl_cookies: &BTreeMap<String, String>,
    live: &BTreeMap<String, String>,
    replace_list: &[String],
) -> BTreeMap<String, String> {
    if replace_list.is_empty() {
        return live.clone();
    }
    let mut merged = curl_cookies.clone();
    for name in replace_list {
        if let Some(value) = live.get(name) {
            merged.insert(name.clone(), value.clone());
        }
    }
    merged
}

/// Render cookies as a `Cookie` header value
pub fn serialize_cookies(cookies: &BTreeMap<String, String>) -> String {
    cookies
        .iter()
        .map(|(name, value)| format!("{}={}", name, value))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Replays saved requests
pub struct RequestExecutor {
    store: Arc<Store>,
    dispatcher: Arc<dyn HttpDispatcher>,
    cookies: Option<Arc<dyn CookieProvider>>,
    stats: StatisticsTracker,
    max_chain_depth: u32,
}

impl RequestExecutor {
    /// Create an executor without a live cookie source
    pub fn new(store: Arc<Store>, dispatcher: Arc<dyn HttpDispatcher>) -> Self {
        Self {
            stats: StatisticsTracker::new(store.clone()),
            store,
            dispatcher,
            cookies: None,
            max_chain_depth: DEFAULT_MAX_CHAIN_DEPTH,
        }
    }

    /// Refresh cookies from `provider` before every dispatch
    pub fn with_cookie_provider(mut self, provider: Arc<dyn CookieProvider>) -> Self {
        self.cookies = Some(provider);
        self
    }

    pub fn with_max_chain_depth(mut self, depth: u32) -> Self {
        self.max_chain_depth = depth;
        self
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    /// Execute a saved request and any chain hanging off it
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use repeater::executor::{RequestExecutor, ReqwestDispatcher};
    /// use repeater::storage::Store;
    /// use std::sync::Arc;
    ///
    /// # async fn example() -> anyhow::Result<()> {
    /// let store = Arc::new(Store::in_memory());
    /// let dispatcher = Arc::new(ReqwestDispatcher::new(None, None)?);
    /// let executor = RequestExecutor::new(store, dispatcher);
    /// let result = executor.execute("some-id").await;
    /// assert!(!result.success);
    /// # Ok(())
    /// # }
    /// ```
    pub async fn execute(&self, request_id: &str) -> ExecutionResult {
        self.execute_at_depth(request_id, 0).await
    }

    /// Execute `ids` one after another, in order
    ///
    /// A failure never stops the batch.
    pub async fn execute_batch(&self, ids: &[String]) -> Vec<ExecutionResult> {
        let mut results = Vec::with_capacity(ids.len());
        for id in ids {
            results.push(self.execute(id).await);
        }
        results
    }

    /// Execute at a given position in a chain
    ///
    /// Boxed so that the chain can recurse.
    pub fn execute_at_depth<'a>(
        &'a self,
        request_id: &'a str,
        depth: u32,
    ) -> BoxFuture<'a, ExecutionResult> {
        async move {
            if depth > self.max_chain_depth {
                warn!(
                    request_id = %request_id,
                    limit = self.max_chain_depth,
                    "Chain depth exceeded"
                );
                return ExecutionResult::failure(
                    request_id,
                    ErrorKind::ChainDepthExceeded,
                    "Chain depth exceeded limit",
                );
            }

            let request = match self.store.get_request(request_id).await {
                Ok(Some(request)) => request,
                Ok(None) => {
                    return ExecutionResult::failure(
                        request_id,
                        ErrorKind::RequestNotFound,
                        "Request not found",
                    )
                }
                Err(e) => {
                    warn!(request_id = %request_id, error = %e, "Failed to load request");
                    return ExecutionResult::failure(request_id, ErrorKind::Storage, e.to_string());
                }
            };

            let mut result = self.run_once(&request).await;

            if result.success {
                if let Some(next_id) = request.chain_next_id.as_deref() {
                    debug!(request_id = %request_id, next = %next_id, depth, "Following chain");
                    let next = self.execute_at_depth(next_id, depth + 1).await;
                    result.chain_result = Some(Box::new(next));
                }
            }
            result
        }
        .boxed()
    }

    async fn run_once(&self, request: &SavedRequest) -> ExecutionResult {
        let parsed = &request.parsed_request;
        let headers = self.prepare_headers(request).await;
        let body = if parsed.method.eq_ignore_ascii_case("GET")
            || parsed.method.eq_ignore_ascii_case("HEAD")
        {
            None
        } else {
            parsed.body.clone()
        };
        let outbound = DispatchRequest {
            method: parsed.method.clone(),
            url: parsed.url.clone(),
            headers,
            body,
        };

        let started = Instant::now();
        let dispatched = self.dispatcher.dispatch(&outbound).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        let result = match dispatched {
            Ok(response) => {
                let success = (200..300).contains(&response.status);
                info!(
                    request_id = %request.id,
                    status = response.status,
                    elapsed_ms,
                    "Request executed"
                );
                ExecutionResult {
                    request_id: request.id.clone(),
                    success,
                    status_code: Some(response.status),
                    status_text: Some(response.status_text),
                    response_time_ms: Some(elapsed_ms),
                    response_body: Some(response.body),
                    response_headers: response.headers,
                    ..Default::default()
                }
            }
            Err(e) => {
                warn!(request_id = %request.id, error = %e, "Request failed");
                ExecutionResult {
                    response_time_ms: Some(elapsed_ms),
                    ..ExecutionResult::failure(&request.id, ErrorKind::Network, e.to_string())
                }
            }
        };

        if let Err(e) = self
            .stats
            .record(&request.id, result.success, elapsed_ms)
            .await
        {
            warn!(request_id = %request.id, error = %e, "Failed to record statistics");
        }

        let entry = HistoryEntry {
            request_id: request.id.clone(),
            request_name: request.name.clone(),
            timestamp: Utc::now().timestamp_millis(),
            success: result.success,
            status_code: result.status_code,
            error: result.error.clone(),
            response_time_ms: elapsed_ms,
            url: parsed.url.clone(),
            method: parsed.method.clone(),
        };
        if let Err(e) = self.store.append_history(entry).await {
            warn!(request_id = %request.id, error = %e, "Failed to append history");
        }

        result
    }

    async fn prepare_headers(&self, request: &SavedRequest) -> BTreeMap<String, String> {
        let parsed = &request.parsed_request;
        let mut headers = parsed.headers.clone();

        let Some(provider) = &self.cookies else {
            return headers;
        };
        let host = match url::Url::parse(&parsed.url) {
            Ok(url) => url.host_str().map(str::to_string),
            Err(_) => None,
        };
        let Some(host) = host else {
            return headers;
        };

        let live = match provider.cookies_for(&host).await {
            Ok(live) => live,
            Err(e) => {
                warn!(request_id = %request.id, error = %e, "Live cookie lookup failed");
                return headers;
            }
        };

        let merged = merge_cookies(&parsed.cookies, &live, &request.cookie_replace_list);
        let value = serialize_cookies(&merged);
        if !value.is_empty() {
            headers.retain(|name, _| !name.eq_ignore_ascii_case("cookie"));
            headers.insert("Cookie".to_string(), value);
        }
        headers
    }
}
