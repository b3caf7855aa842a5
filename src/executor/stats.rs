//! Per-request execution statistics
//!
//! Counters live on the stored request and are updated in one
//! read-modify-write under the store's request lock. Every update is also
//! reported through the `metrics` facade.
//!
//! # Metrics
//!
//! - `request_executions_total`: counter labelled by `outcome`
//! - `request_response_time_ms`: histogram of dispatch time

use crate::error::Result;
use crate::storage::{Statistics, Store};
use chrono::Utc;
use metrics::{histogram, increment_counter};
use std::sync::Arc;

/// Fold one execution into `stats`
///
/// The average is the rounded (half up) mean of all response times.
pub fn apply_execution(stats: &mut Statistics, success: bool, response_time_ms: u64) {
    stats.execution_count += 1;
    if success {
        stats.success_count += 1;
    } else {
        stats.failure_count += 1;
    }
    stats.total_response_time_ms += response_time_ms;
    stats.avg_response_time_ms =
        (stats.total_response_time_ms + stats.execution_count / 2) / stats.execution_count;
}

/// Persists execution counters for saved requests
#[derive(Clone)]
pub struct StatisticsTracker {
    store: Arc<Store>,
}

impl StatisticsTracker {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    /// Record one execution and stamp `last_executed_at`
    ///
    /// Returns the updated counters, or `None` if the request disappeared
    /// while it was executing.
    pub async fn record(
        &self,
        request_id: &str,
        success: bool,
        response_time_ms: u64,
    ) -> Result<Option<Statistics>> {
        let outcome = if success { "success" } else { "failure" };
        increment_counter!("request_executions_total", "outcome" => outcome);
        histogram!("request_response_time_ms", response_time_ms as f64);

        let now = Utc::now().timestamp_millis();
        let updated = self
            .store
            .modify_request(request_id, |request| {
                apply_execution(&mut request.statistics, success, response_time_ms);
                request.last_executed_at = Some(now);
            })
            .await?;
        Ok(updated.map(|request| request.statistics))
    }
}
