//! Command contract
//!
//! Clients talk to the service with JSON objects tagged by `type`
//! (`{"type": "EXECUTE_REQUEST", "requestId": "..."}`). Each one is decoded
//! into a [`Command`] and answered by [`CommandDispatcher::handle`] with a
//! JSON value. Failures of mutating commands are reported in-band as
//! `{"success": false, "error": "..."}`.

use crate::error::Result;
use crate::executor::RequestExecutor;
use crate::requests::{RequestInput, RequestManager};
use crate::scheduler::SchedulerRegistry;
use crate::storage::{AppSettings, ExportBundle, GroupUpdate, Store};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, warn};

/// Payload of `CREATE_GROUP`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewGroup {
    pub name: String,
    #[serde(default)]
    pub color: Option<String>,
}

/// Every request a client can make
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Command {
    #[serde(rename_all = "camelCase")]
    ExecuteRequest { request_id: String },
    #[serde(rename_all = "camelCase")]
    ExecuteBatch { request_ids: Vec<String> },
    #[serde(rename_all = "camelCase")]
    TimerStart {
        request_id: String,
        #[serde(default)]
        interval: Option<u64>,
    },
    #[serde(rename_all = "camelCase")]
    TimerStop { request_id: String },
    TimerGetAll,
    #[serde(rename_all = "camelCase")]
    CronStart {
        request_id: String,
        #[serde(default)]
        expression: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    CronStop { request_id: String },
    CronGetAll,
    CreateRequest { data: RequestInput },
    UpdateRequest { id: String, data: RequestInput },
    DeleteRequest { id: String },
    GetRequestsForUrl { url: String },
    GetAllRequests,
    GetStatistics,
    #[serde(rename_all = "camelCase")]
    GetHistory {
        #[serde(default)]
        request_id: Option<String>,
        #[serde(default)]
        limit: Option<usize>,
    },
    #[serde(rename_all = "camelCase")]
    ClearHistory {
        #[serde(default)]
        request_id: Option<String>,
    },
    ExportData,
    ImportData { data: ExportBundle },
    GetAllGroups,
    CreateGroup { data: NewGroup },
    UpdateGroup { id: String, data: GroupUpdate },
    DeleteGroup { id: String },
    GetConfig,
    SaveConfig { data: AppSettings },
}

impl Command {
    /// Wire name of the command, for logging
    pub fn name(&self) -> &'static str {
        match self {
            Command::ExecuteRequest { .. } => "EXECUTE_REQUEST",
            Command::ExecuteBatch { .. } => "EXECUTE_BATCH",
            Command::TimerStart { .. } => "TIMER_START",
            Command::TimerStop { .. } => "TIMER_STOP",
            Command::TimerGetAll => "TIMER_GET_ALL",
            Command::CronStart { .. } => "CRON_START",
            Command::CronStop { .. } => "CRON_STOP",
            Command::CronGetAll => "CRON_GET_ALL",
            Command::CreateRequest { .. } => "CREATE_REQUEST",
            Command::UpdateRequest { .. } => "UPDATE_REQUEST",
            Command::DeleteRequest { .. } => "DELETE_REQUEST",
            Command::GetRequestsForUrl { .. } => "GET_REQUESTS_FOR_URL",
            Command::GetAllRequests => "GET_ALL_REQUESTS",
            Command::GetStatistics => "GET_STATISTICS",
            Command::GetHistory { .. } => "GET_HISTORY",
            Command::ClearHistory { .. } => "CLEAR_HISTORY",
            Command::ExportData => "EXPORT_DATA",
            Command::ImportData { .. } => "IMPORT_DATA",
            Command::GetAllGroups => "GET_ALL_GROUPS",
            Command::CreateGroup { .. } => "CREATE_GROUP",
            Command::UpdateGroup { .. } => "UPDATE_GROUP",
            Command::DeleteGroup { .. } => "DELETE_GROUP",
            Command::GetConfig => "GET_CONFIG",
            Command::SaveConfig { .. } => "SAVE_CONFIG",
        }
    }
}

/// `{"success": ..}` with an optional error message
pub fn ack(success: bool, error: Option<String>) -> Value {
    match error {
        Some(error) => json!({ "success": success, "error": error }),
        None => json!({ "success": success }),
    }
}

fn failure(e: anyhow::Error) -> Value {
    ack(false, Some(e.to_string()))
}

fn to_value<T: Serialize>(value: Result<T>) -> Value {
    match value.and_then(|v| Ok(serde_json::to_value(v)?)) {
        Ok(value) => value,
        Err(e) => {
            warn!(error = %e, "Command failed");
            failure(e)
        }
    }
}

fn to_ack(result: Result<bool>) -> Value {
    match result {
        Ok(success) => ack(success, None),
        Err(e) => {
            warn!(error = %e, "Command failed");
            failure(e)
        }
    }
}

/// Routes decoded commands to the executor, schedulers, request manager
/// and store
pub struct CommandDispatcher {
    store: Arc<Store>,
    executor: Arc<RequestExecutor>,
    schedulers: Arc<SchedulerRegistry>,
    requests: RequestManager,
}

impl CommandDispatcher {
    pub fn new(executor: Arc<RequestExecutor>, schedulers: Arc<SchedulerRegistry>) -> Self {
        let store = executor.store().clone();
        Self {
            requests: RequestManager::new(store.clone(), schedulers.clone()),
            store,
            executor,
            schedulers,
        }
    }

    pub fn schedulers(&self) -> &Arc<SchedulerRegistry> {
        &self.schedulers
    }

    pub fn requests(&self) -> &RequestManager {
        &self.requests
    }

    /// Decode one JSON command and answer it
    ///
    /// An undecodable command is answered with `success: false`.
    pub async fn handle_json(&self, raw: &str) -> Value {
        match serde_json::from_str::<Command>(raw) {
            Ok(command) => self.handle(command).await,
            Err(e) => {
                warn!(error = %e, "Rejected malformed command");
                ack(false, Some(format!("Invalid command: {}", e)))
            }
        }
    }

    /// Answer one command
    pub async fn handle(&self, command: Command) -> Value {
        debug!(command = command.name(), "Handling command");
        match command {
            Command::ExecuteRequest { request_id } => {
                to_value(Ok(self.executor.execute(&request_id).await))
            }
            Command::ExecuteBatch { request_ids } => {
                to_value(Ok(self.executor.execute_batch(&request_ids).await))
            }
            Command::TimerStart {
                request_id,
                interval,
            } => to_ack(
                self.schedulers
                    .timers()
                    .start(&request_id, interval.unwrap_or(0), false)
                    .await,
            ),
            Command::TimerStop { request_id } => {
                to_ack(self.schedulers.timers().stop(&request_id).await)
            }
            Command::TimerGetAll => to_value(Ok(self.schedulers.timers().get_all().await)),
            Command::CronStart {
                request_id,
                expression,
            } => to_ack(
                self.schedulers
                    .crons()
                    .start(&request_id, expression.as_deref().unwrap_or(""))
                    .await,
            ),
            Command::CronStop { request_id } => {
                to_ack(self.schedulers.crons().stop(&request_id).await)
            }
            Command::CronGetAll => to_value(Ok(self.schedulers.crons().get_all().await)),
            Command::CreateRequest { data } => {
                to_ack(self.requests.create(data).await.map(|_| true))
            }
            Command::UpdateRequest { id, data } => {
                to_ack(self.requests.update(&id, data).await.map(|_| true))
            }
            Command::DeleteRequest { id } => to_ack(self.requests.delete(&id).await.map(|_| true)),
            Command::GetRequestsForUrl { url } => {
                to_value(self.requests.requests_for_url(&url).await)
            }
            Command::GetAllRequests => to_value(self.requests.all_requests().await),
            Command::GetStatistics => to_value(self.requests.statistics().await),
            Command::GetHistory { request_id, limit } => {
                to_value(self.store.get_history(request_id.as_deref(), limit).await)
            }
            Command::ClearHistory { request_id } => to_ack(
                self.store
                    .clear_history(request_id.as_deref())
                    .await
                    .map(|_| true),
            ),
            Command::ExportData => to_value(self.store.export_all().await),
            Command::ImportData { data } => to_ack(self.import(data).await),
            Command::GetAllGroups => to_value(self.store.get_all_groups().await),
            Command::CreateGroup { data } => {
                match self.store.add_group(data.name, data.color).await {
                    Ok(group) => json!({ "success": true, "group": group }),
                    Err(e) => failure(e),
                }
            }
            Command::UpdateGroup { id, data } => to_ack(self.store.update_group(&id, data).await),
            Command::DeleteGroup { id } => to_ack(self.store.delete_group(&id).await),
            Command::GetConfig => to_value(self.store.get_config().await),
            Command::SaveConfig { data } => {
                to_ack(self.store.save_config(&data).await.map(|_| true))
            }
        }
    }
}

impl CommandDispatcher {
    /// Replace stored state with `bundle` and re-arm schedules from it
    async fn import(&self, bundle: ExportBundle) -> Result<bool> {
        self.store.import_all(bundle).await?;
        self.schedulers.shutdown().await;
        self.schedulers.init().await?;
        Ok(true)
    }
}
