//! Test utilities for Repeater
//!
//! Fake transports, request fixtures, and temporary directory helpers
//! shared by the unit tests.

use crate::curl_parser;
use crate::error::Result;
use crate::executor::{DispatchRequest, DispatchResponse, HttpDispatcher};
use crate::storage::{NewRequest, SavedRequest, Store};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::TempDir;

/// Create a temporary directory for testing
///
/// # Panics
///
/// Panics if the directory cannot be created
pub fn temp_dir() -> TempDir {
    TempDir::new().expect("Failed to create temporary directory")
}

/// Dispatcher that answers every request with a fixed status and counts
/// how many requests it saw
pub struct CountingDispatcher {
    status: u16,
    calls: AtomicUsize,
}

impl CountingDispatcher {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HttpDispatcher for CountingDispatcher {
    async fn dispatch(&self, _request: &DispatchRequest) -> Result<DispatchResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(DispatchResponse {
            status: self.status,
            status_text: "OK".to_string(),
            headers: BTreeMap::new(),
            body: String::new(),
        })
    }
}

/// Store a request built from `curl`
///
/// # Panics
///
/// Panics if `curl` does not parse or the store rejects the write
pub async fn save_request(store: &Store, name: &str, curl: &str) -> SavedRequest {
    store
        .add_request(NewRequest {
            name: name.to_string(),
            url_pattern: "*".to_string(),
            raw_command: curl.to_string(),
            parsed_request: curl_parser::parse(curl).expect("Failed to parse test curl"),
            cookie_replace_list: vec![],
            group_id: None,
            chain_next_id: None,
        })
        .await
        .expect("Failed to save test request")
}
