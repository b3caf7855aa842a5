//! Persistent store for saved requests and scheduler state
//!
//! Each collection (requests, groups, timers, crons, history) and the
//! settings blob is stored as one JSON value under a fixed key of a
//! key-value backend. Writes read the whole collection, mutate it in
//! memory and write it back. Every collection has its own writer lock
//! held across that read-modify-write, so two concurrent writers of the
//! same collection are serialized instead of overwriting each other.
//!
//! Lock order, when more than one is held: groups, requests, timers,
//! crons, history, config.

use crate::error::{RepeaterError, Result};
use async_trait::async_trait;
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;

pub mod types;
pub use types::{
    AppSettings, CronRecord, ExportBundle, Group, GroupUpdate, HistoryEntry, NewRequest,
    RequestUpdate, SavedRequest, Statistics, TimerRecord, DEFAULT_GROUP_COLOR, EXPORT_VERSION,
};

/// Fixed backend keys of the persisted collections
pub mod keys {
    pub const REQUESTS: &str = "requests";
    pub const GROUPS: &str = "groups";
    pub const TIMERS: &str = "timers";
    pub const CRONS: &str = "crons";
    pub const CONFIG: &str = "config";
    pub const HISTORY: &str = "history";
}

type HistoryMap = BTreeMap<String, Vec<HistoryEntry>>;

/// Byte-blob key-value backend behind the [`Store`]
#[async_trait]
pub trait KvBackend: Send + Sync {
    /// Read the blob stored under `key`
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Replace the blob stored under `key`
    async fn set(&self, key: &str, value: Vec<u8>) -> Result<()>;
}

/// On-disk backend using an embedded `sled` database
pub struct SledBackend {
    db: sled::Db,
}

impl SledBackend {
    /// Open or create the database at `path`
    ///
    /// # Errors
    ///
    /// Returns `RepeaterError::Storage` if the database cannot be opened
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                RepeaterError::Storage(format!("Failed to create data directory: {}", e))
            })?;
        }
        let db = sled::open(path)
            .map_err(|e| RepeaterError::Storage(format!("Failed to open database: {}", e)))?;
        Ok(Self { db })
    }
}

#[async_trait]
impl KvBackend for SledBackend {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let value = self
            .db
            .get(key.as_bytes())
            .map_err(|e| RepeaterError::Storage(format!("Get failed: {}", e)))?;
        Ok(value.map(|v| v.to_vec()))
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> Result<()> {
        self.db
            .insert(key.as_bytes(), value)
            .map_err(|e| RepeaterError::Storage(format!("Insert failed: {}", e)))?;
        self.db
            .flush_async()
            .await
            .map_err(|e| RepeaterError::Storage(format!("Flush failed: {}", e)))?;
        Ok(())
    }
}

/// Volatile backend, used by tests and dry runs
#[derive(Default)]
pub struct MemoryBackend {
    entries: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KvBackend for MemoryBackend {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.entries.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> Result<()> {
        self.entries.lock().await.insert(key.to_string(), value);
        Ok(())
    }
}

#[derive(Default)]
struct WriteLocks {
    requests: Mutex<()>,
    groups: Mutex<()>,
    timers: Mutex<()>,
    crons: Mutex<()>,
    history: Mutex<()>,
    config: Mutex<()>,
}

/// Typed CRUD surface over the persisted collections
pub struct Store {
    backend: Arc<dyn KvBackend>,
    locks: WriteLocks,
}

impl Store {
    /// Create a store over an arbitrary backend
    pub fn new(backend: Arc<dyn KvBackend>) -> Self {
        Self {
            backend,
            locks: WriteLocks::default(),
        }
    }

    /// Open a `sled`-backed store at `path`
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use repeater::storage::Store;
    ///
    /// let store = Store::open("/tmp/repeater.db").unwrap();
    /// ```
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::new(Arc::new(SledBackend::open(path)?)))
    }

    /// Create a store that keeps everything in memory
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryBackend::new()))
    }

    async fn load<T: DeserializeOwned + Default>(&self, key: &str) -> Result<T> {
        match self.backend.get(key).await? {
            Some(bytes) => Ok(serde_json::from_slice(&bytes).map_err(|e| {
                RepeaterError::Storage(format!("Failed to decode '{}': {}", key, e))
            })?),
            None => Ok(T::default()),
        }
    }

    async fn save<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec(value).map_err(|e| {
            RepeaterError::Storage(format!("Failed to encode '{}': {}", key, e))
        })?;
        self.backend.set(key, bytes).await
    }

    // ----------------------------------------------------------------------
    // Requests
    // ----------------------------------------------------------------------

    /// All stored requests, in insertion order
    pub async fn get_all_requests(&self) -> Result<Vec<SavedRequest>> {
        self.load(keys::REQUESTS).await
    }

    /// Look up one request
    pub async fn get_request(&self, id: &str) -> Result<Option<SavedRequest>> {
        Ok(self
            .get_all_requests()
            .await?
            .into_iter()
            .find(|r| r.id == id))
    }

    /// Store a new request with a fresh id and zeroed statistics
    pub async fn add_request(&self, new: NewRequest) -> Result<SavedRequest> {
        let _guard = self.locks.requests.lock().await;
        let mut requests: Vec<SavedRequest> = self.load(keys::REQUESTS).await?;
        let request = SavedRequest {
            id: Uuid::new_v4().to_string(),
            name: new.name,
            url_pattern: new.url_pattern,
            raw_command: new.raw_command,
            parsed_request: new.parsed_request,
            cookie_replace_list: new.cookie_replace_list,
            group_id: new.group_id,
            chain_next_id: new.chain_next_id,
            created_at: Utc::now().timestamp_millis(),
            last_executed_at: None,
            statistics: Statistics::default(),
        };
        requests.push(request.clone());
        self.save(keys::REQUESTS, &requests).await?;
        debug!(request_id = %request.id, "Request added");
        Ok(request)
    }

    /// Apply `f` to one request under the collection's writer lock
    ///
    /// Returns the modified request, or `None` if `id` is not stored.
    pub async fn modify_request<F>(&self, id: &str, f: F) -> Result<Option<SavedRequest>>
    where
        F: FnOnce(&mut SavedRequest),
    {
        let _guard = self.locks.requests.lock().await;
        let mut requests: Vec<SavedRequest> = self.load(keys::REQUESTS).await?;
        let Some(request) = requests.iter_mut().find(|r| r.id == id) else {
            return Ok(None);
        };
        f(request);
        let updated = request.clone();
        self.save(keys::REQUESTS, &requests).await?;
        Ok(Some(updated))
    }

    /// Shallow-merge `update` onto a stored request
    ///
    /// Returns `false` if the request does not exist.
    pub async fn update_request(&self, id: &str, update: RequestUpdate) -> Result<bool> {
        Ok(self
            .modify_request(id, |request| update.apply(request))
            .await?
            .is_some())
    }

    /// Remove a request; its history entries are kept
    ///
    /// Returns `false` if the request does not exist.
    pub async fn delete_request(&self, id: &str) -> Result<bool> {
        let _guard = self.locks.requests.lock().await;
        let mut requests: Vec<SavedRequest> = self.load(keys::REQUESTS).await?;
        let before = requests.len();
        requests.retain(|r| r.id != id);
        if requests.len() == before {
            return Ok(false);
        }
        self.save(keys::REQUESTS, &requests).await?;
        debug!(request_id = %id, "Request deleted");
        Ok(true)
    }

    // ----------------------------------------------------------------------
    // Groups
    // ----------------------------------------------------------------------

    pub async fn get_all_groups(&self) -> Result<Vec<Group>> {
        self.load(keys::GROUPS).await
    }

    /// Store a new group with a fresh id
    pub async fn add_group(&self, name: String, color: Option<String>) -> Result<Group> {
        let _guard = self.locks.groups.lock().await;
        let mut groups: Vec<Group> = self.load(keys::GROUPS).await?;
        let group = Group {
            id: Uuid::new_v4().to_string(),
            name,
            color: color.unwrap_or_else(|| DEFAULT_GROUP_COLOR.to_string()),
        };
        groups.push(group.clone());
        self.save(keys::GROUPS, &groups).await?;
        Ok(group)
    }

    /// Shallow-merge `update` onto a stored group
    pub async fn update_group(&self, id: &str, update: GroupUpdate) -> Result<bool> {
        let _guard = self.locks.groups.lock().await;
        let mut groups: Vec<Group> = self.load(keys::GROUPS).await?;
        let Some(group) = groups.iter_mut().find(|g| g.id == id) else {
            return Ok(false);
        };
        if let Some(name) = update.name {
            group.name = name;
        }
        if let Some(color) = update.color {
            group.color = color;
        }
        self.save(keys::GROUPS, &groups).await?;
        Ok(true)
    }

    /// Remove a group and clear it from every member request
    pub async fn delete_group(&self, id: &str) -> Result<bool> {
        let _groups = self.locks.groups.lock().await;
        let mut groups: Vec<Group> = self.load(keys::GROUPS).await?;
        let before = groups.len();
        groups.retain(|g| g.id != id);
        if groups.len() == before {
            return Ok(false);
        }
        self.save(keys::GROUPS, &groups).await?;

        let _requests = self.locks.requests.lock().await;
        let mut requests: Vec<SavedRequest> = self.load(keys::REQUESTS).await?;
        let mut cleared = 0;
        for request in requests
            .iter_mut()
            .filter(|r| r.group_id.as_deref() == Some(id))
        {
            request.group_id = None;
            cleared += 1;
        }
        if cleared > 0 {
            self.save(keys::REQUESTS, &requests).await?;
        }
        debug!(group_id = %id, cleared, "Group deleted");
        Ok(true)
    }

    // ----------------------------------------------------------------------
    // Scheduler state
    // ----------------------------------------------------------------------

    pub async fn get_timers(&self) -> Result<BTreeMap<String, TimerRecord>> {
        self.load(keys::TIMERS).await
    }

    pub async fn save_timers(&self, timers: &BTreeMap<String, TimerRecord>) -> Result<()> {
        let _guard = self.locks.timers.lock().await;
        self.save(keys::TIMERS, timers).await
    }

    pub async fn get_crons(&self) -> Result<BTreeMap<String, CronRecord>> {
        self.load(keys::CRONS).await
    }

    pub async fn save_crons(&self, crons: &BTreeMap<String, CronRecord>) -> Result<()> {
        let _guard = self.locks.crons.lock().await;
        self.save(keys::CRONS, crons).await
    }

    // ----------------------------------------------------------------------
    // History
    // ----------------------------------------------------------------------

    /// Append one execution outcome
    pub async fn append_history(&self, entry: HistoryEntry) -> Result<()> {
        let _guard = self.locks.history.lock().await;
        let mut history: HistoryMap = self.load(keys::HISTORY).await?;
        history
            .entry(entry.request_id.clone())
            .or_default()
            .push(entry);
        self.save(keys::HISTORY, &history).await
    }

    /// History entries newest first, for one request or for all of them
    pub async fn get_history(
        &self,
        request_id: Option<&str>,
        limit: Option<usize>,
    ) -> Result<Vec<HistoryEntry>> {
        let mut history: HistoryMap = self.load(keys::HISTORY).await?;
        let mut entries: Vec<HistoryEntry> = match request_id {
            Some(id) => history.remove(id).unwrap_or_default(),
            None => history.into_values().flatten().collect(),
        };
        // Stable sort keeps append order among equal timestamps; reverse
        // afterwards so the latest append comes first.
        entries.sort_by_key(|e| e.timestamp);
        entries.reverse();
        if let Some(limit) = limit {
            entries.truncate(limit);
        }
        Ok(entries)
    }

    /// Clear history for one request, or everything when `request_id` is `None`
    pub async fn clear_history(&self, request_id: Option<&str>) -> Result<()> {
        let _guard = self.locks.history.lock().await;
        let history = match request_id {
            Some(id) => {
                let mut history: HistoryMap = self.load(keys::HISTORY).await?;
                history.remove(id);
                history
            }
            None => HistoryMap::new(),
        };
        self.save(keys::HISTORY, &history).await
    }

    // ----------------------------------------------------------------------
    // Settings
    // ----------------------------------------------------------------------

    /// Stored settings; an unreadable blob falls back to defaults
    pub async fn get_config(&self) -> Result<AppSettings> {
        match self.load::<AppSettings>(keys::CONFIG).await {
            Ok(settings) => Ok(settings),
            Err(e) if is_decode_error(&e) => {
                warn!(error = %e, "Stored settings are unreadable, using defaults");
                Ok(AppSettings::default())
            }
            Err(e) => Err(e),
        }
    }

    pub async fn save_config(&self, settings: &AppSettings) -> Result<()> {
        let _guard = self.locks.config.lock().await;
        self.save(keys::CONFIG, settings).await
    }

    // ----------------------------------------------------------------------
    // Export / import
    // ----------------------------------------------------------------------

    /// Snapshot every collection except history
    pub async fn export_all(&self) -> Result<ExportBundle> {
        Ok(ExportBundle {
            requests: Some(self.get_all_requests().await?),
            groups: Some(self.get_all_groups().await?),
            config: Some(self.get_config().await?),
            timers: Some(self.get_timers().await?),
            crons: Some(self.get_crons().await?),
            exported_at: Utc::now().timestamp_millis(),
            version: EXPORT_VERSION.to_string(),
        })
    }

    /// Overwrite every collection present in `bundle`
    pub async fn import_all(&self, bundle: ExportBundle) -> Result<()> {
        let _groups = self.locks.groups.lock().await;
        let _requests = self.locks.requests.lock().await;
        let _timers = self.locks.timers.lock().await;
        let _crons = self.locks.crons.lock().await;
        let _config = self.locks.config.lock().await;

        if let Some(groups) = &bundle.groups {
            self.save(keys::GROUPS, groups).await?;
        }
        if let Some(requests) = &bundle.requests {
            self.save(keys::REQUESTS, requests).await?;
        }
        if let Some(timers) = &bundle.timers {
            self.save(keys::TIMERS, timers).await?;
        }
        if let Some(crons) = &bundle.crons {
            self.save(keys::CRONS, crons).await?;
        }
        if let Some(config) = &bundle.config {
            self.save(keys::CONFIG, config).await?;
        }
        debug!(version = %bundle.version, "Import complete");
        Ok(())
    }
}

fn is_decode_error(e: &anyhow::Error) -> bool {
    matches!(
        e.downcast_ref::<RepeaterError>(),
        Some(RepeaterError::Storage(msg)) if msg.starts_with("Failed to decode")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::curl_parser;
    use crate::test_utils::temp_dir;

    fn new_request(name: &str) -> NewRequest {
        NewRequest {
            name: name.to_string(),
            url_pattern: "https://a.com/*".to_string(),
            raw_command: "curl https://a.com/api".to_string(),
            parsed_request: curl_parser::parse("curl https://a.com/api").unwrap(),
            cookie_replace_list: vec![],
            group_id: None,
            chain_next_id: None,
        }
    }

    fn entry(request_id: &str, timestamp: i64) -> HistoryEntry {
        HistoryEntry {
            request_id: request_id.to_string(),
            request_name: "r".to_string(),
            timestamp,
            success: true,
            status_code: Some(200),
            error: None,
            response_time_ms: 5,
            url: "https://a.com/api".to_string(),
            method: "GET".to_string(),
        }
    }

    #[tokio::test]
    async fn test_add_request_assigns_unique_ids_and_zero_stats() {
        let store = Store::in_memory();
        let a = store.add_request(new_request("a")).await.unwrap();
        let b = store.add_request(new_request("b")).await.unwrap();
        assert_ne!(a.id, b.id);
        assert_eq!(a.statistics, Statistics::default());
        assert!(a.last_executed_at.is_none());
        assert_eq!(store.get_all_requests().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_update_request_merges_present_fields() {
        let store = Store::in_memory();
        let a = store.add_request(new_request("a")).await.unwrap();
        let updated = store
            .update_request(
                &a.id,
                RequestUpdate {
                    name: Some("renamed".to_string()),
                    chain_next_id: Some(Some("next".to_string())),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(updated);
        let stored = store.get_request(&a.id).await.unwrap().unwrap();
        assert_eq!(stored.name, "renamed");
        assert_eq!(stored.url_pattern, a.url_pattern);
        assert_eq!(stored.chain_next_id.as_deref(), Some("next"));
    }

    #[tokio::test]
    async fn test_update_missing_request_returns_false() {
        let store = Store::in_memory();
        assert!(!store
            .update_request("missing", RequestUpdate::default())
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_delete_request_keeps_history() {
        let store = Store::in_memory();
        let a = store.add_request(new_request("a")).await.unwrap();
        store.append_history(entry(&a.id, 1)).await.unwrap();
        assert!(store.delete_request(&a.id).await.unwrap());
        assert!(!store.delete_request(&a.id).await.unwrap());
        assert!(store.get_request(&a.id).await.unwrap().is_none());
        assert_eq!(store.get_history(Some(&a.id), None).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_delete_group_clears_member_references() {
        let store = Store::in_memory();
        let group = store.add_group("work".to_string(), None).await.unwrap();
        assert_eq!(group.color, DEFAULT_GROUP_COLOR);
        let mut req = new_request("a");
        req.group_id = Some(group.id.clone());
        let a = store.add_request(req).await.unwrap();

        assert!(store.delete_group(&group.id).await.unwrap());
        assert!(store.get_all_groups().await.unwrap().is_empty());
        let stored = store.get_request(&a.id).await.unwrap().unwrap();
        assert!(stored.group_id.is_none());
    }

    #[tokio::test]
    async fn test_update_group() {
        let store = Store::in_memory();
        let group = store
            .add_group("work".to_string(), Some("#000000".to_string()))
            .await
            .unwrap();
        let changed = store
            .update_group(
                &group.id,
                GroupUpdate {
                    name: Some("home".to_string()),
                    color: None,
                },
            )
            .await
            .unwrap();
        assert!(changed);
        let groups = store.get_all_groups().await.unwrap();
        assert_eq!(groups[0].name, "home");
        assert_eq!(groups[0].color, "#000000");
    }

    #[tokio::test]
    async fn test_history_newest_first_with_limit() {
        let store = Store::in_memory();
        for ts in [10, 30, 20] {
            store.append_history(entry("a", ts)).await.unwrap();
        }
        store.append_history(entry("b", 25)).await.unwrap();

        let for_a = store.get_history(Some("a"), Some(2)).await.unwrap();
        let stamps: Vec<i64> = for_a.iter().map(|e| e.timestamp).collect();
        assert_eq!(stamps, vec![30, 20]);

        let all = store.get_history(None, None).await.unwrap();
        assert_eq!(all.len(), 4);
        assert_eq!(all[1].request_id, "b");
    }

    #[tokio::test]
    async fn test_clear_history_per_request_and_all() {
        let store = Store::in_memory();
        store.append_history(entry("a", 1)).await.unwrap();
        store.append_history(entry("b", 2)).await.unwrap();

        store.clear_history(Some("a")).await.unwrap();
        assert!(store.get_history(Some("a"), None).await.unwrap().is_empty());
        assert_eq!(store.get_history(None, None).await.unwrap().len(), 1);

        store.clear_history(None).await.unwrap();
        assert!(store.get_history(None, None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_config_defaults_and_round_trip() {
        let store = Store::in_memory();
        assert_eq!(store.get_config().await.unwrap(), AppSettings::default());

        let settings = AppSettings {
            default_cookie_replace: vec!["sid".to_string()],
            notification_duration_ms: 1000,
            enable_batch_execution: false,
        };
        store.save_config(&settings).await.unwrap();
        assert_eq!(store.get_config().await.unwrap(), settings);
    }

    #[tokio::test]
    async fn test_unreadable_config_falls_back_to_defaults() {
        let backend = Arc::new(MemoryBackend::new());
        backend
            .set(keys::CONFIG, b"not json".to_vec())
            .await
            .unwrap();
        let store = Store::new(backend);
        assert_eq!(store.get_config().await.unwrap(), AppSettings::default());
    }

    #[tokio::test]
    async fn test_unreadable_requests_is_an_error() {
        let backend = Arc::new(MemoryBackend::new());
        backend
            .set(keys::REQUESTS, b"{".to_vec())
            .await
            .unwrap();
        let store = Store::new(backend);
        assert!(store.get_all_requests().await.is_err());
    }

    #[tokio::test]
    async fn test_export_import_round_trip() {
        let source = Store::in_memory();
        let group = source.add_group("g".to_string(), None).await.unwrap();
        let mut req = new_request("a");
        req.group_id = Some(group.id.clone());
        source.add_request(req).await.unwrap();
        source.add_request(new_request("b")).await.unwrap();

        let bundle = source.export_all().await.unwrap();
        assert_eq!(bundle.version, EXPORT_VERSION);

        let target = Store::in_memory();
        target.import_all(bundle.clone()).await.unwrap();
        assert_eq!(
            target.get_all_requests().await.unwrap(),
            source.get_all_requests().await.unwrap()
        );
        assert_eq!(
            target.get_all_groups().await.unwrap(),
            source.get_all_groups().await.unwrap()
        );

        // Importing into the source itself is a fixed point as well.
        source.import_all(bundle).await.unwrap();
        assert_eq!(source.get_all_requests().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_import_leaves_absent_sections() {
        let store = Store::in_memory();
        store.add_request(new_request("a")).await.unwrap();
        let bundle = ExportBundle {
            requests: None,
            groups: Some(vec![]),
            config: None,
            timers: None,
            crons: None,
            exported_at: 0,
            version: EXPORT_VERSION.to_string(),
        };
        store.import_all(bundle).await.unwrap();
        assert_eq!(store.get_all_requests().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_import_accepts_legacy_field_names() {
        let legacy = r#"{
            "requests": [{
                "id": "r1",
                "name": "legacy",
                "urlPattern": "https://a.com/*",
                "curl": "curl https://a.com",
                "parsedRequest": {"url": "https://a.com", "method": "GET", "headers": {}, "body": null, "cookies": {}},
                "cookieReplace": ["sid"],
                "createdAt": 1,
                "lastExecuted": 5,
                "statistics": {"executionCount": 2, "successCount": 1, "failureCount": 1, "totalResponseTime": 30, "avgResponseTime": 15}
            }],
            "config": {"defaultCookieReplace": [], "notificationDuration": 3000, "enableBatchExecution": true},
            "exportedAt": 1700000000000,
            "version": "2.0.0"
        }"#;
        let bundle: ExportBundle = serde_json::from_str(legacy).unwrap();
        let store = Store::in_memory();
        store.import_all(bundle).await.unwrap();

        let request = store.get_request("r1").await.unwrap().unwrap();
        assert_eq!(request.raw_command, "curl https://a.com");
        assert_eq!(request.cookie_replace_list, vec!["sid".to_string()]);
        assert_eq!(request.last_executed_at, Some(5));
        assert_eq!(request.statistics.avg_response_time_ms, 15);
        assert_eq!(
            store.get_config().await.unwrap().notification_duration_ms,
            3000
        );
    }

    #[tokio::test]
    async fn test_sled_backend_persists_across_reopen() {
        let dir = temp_dir();
        let path = dir.path().join("nested").join("repeater.db");
        let id = {
            let store = Store::open(&path).expect("open store");
            store.add_request(new_request("a")).await.unwrap().id
        };
        let store = Store::open(&path).expect("reopen store");
        let request = store.get_request(&id).await.unwrap();
        assert_eq!(request.map(|r| r.name), Some("a".to_string()));
    }
}
