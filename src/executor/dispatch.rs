//! Outbound HTTP dispatch
//!
//! The executor talks to the network only through [`HttpDispatcher`], so
//! tests and embedders can substitute their own transport.

use crate::error::{RepeaterError, Result};
use async_trait::async_trait;
use reqwest::Method;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;

/// A fully prepared outbound request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchRequest {
    pub method: String,
    pub url: String,
    pub headers: BTreeMap<String, String>,
    /// Sent only for methods other than GET and HEAD
    pub body: Option<String>,
}

/// What came back from the server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchResponse {
    pub status: u16,
    pub status_text: String,
    /// Lower-cased header names
    pub headers: BTreeMap<String, String>,
    pub body: String,
}

/// Transport used by the executor
#[async_trait]
pub trait HttpDispatcher: Send + Sync {
    /// Send `request` and read the full response
    ///
    /// Any HTTP status is a successful dispatch; errors are reserved for
    /// transport failures (DNS, connect, TLS, timeout, body read).
    async fn dispatch(&self, request: &DispatchRequest) -> Result<DispatchResponse>;
}

/// `reqwest`-backed dispatcher
#[derive(Clone)]
pub struct ReqwestDispatcher {
    client: reqwest::Client,
}

impl ReqwestDispatcher {
    /// Build a dispatcher
    ///
    /// # Arguments
    ///
    /// * `timeout` - Whole-request timeout; `None` keeps the transport default
    /// * `user_agent` - Sent when a request carries no `User-Agent` of its own
    ///
    /// # Errors
    ///
    /// Returns `RepeaterError::Http` if the client cannot be built
    pub fn new(timeout: Option<Duration>, user_agent: Option<&str>) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        if let Some(user_agent) = user_agent {
            builder = builder.user_agent(user_agent.to_string());
        }
        let client = builder.build().map_err(RepeaterError::Http)?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpDispatcher for ReqwestDispatcher {
    async fn dispatch(&self, request: &DispatchRequest) -> Result<DispatchResponse> {
        let method = Method::from_bytes(request.method.as_bytes())
            .map_err(|e| anyhow::anyhow!("Invalid HTTP method '{}': {}", request.method, e))?;

        debug!(method = %method, url = %request.url, "Sending request");

        let mut builder = self.client.request(method, &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = builder.send().await.map_err(RepeaterError::Http)?;
        let status = response.status();
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    String::from_utf8_lossy(value.as_bytes()).to_string(),
                )
            })
            .collect();
        let body = response.text().await.map_err(RepeaterError::Http)?;

        debug!(status = status.as_u16(), "Response received");

        Ok(DispatchResponse {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
            headers,
            body,
        })
    }
}
