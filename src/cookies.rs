//! Live cookie sources
//!
//! At execution time the executor asks a [`CookieProvider`] for the
//! cookies currently valid for the request's host. Two sources ship with
//! the crate:
//!
//! - [`StaticCookieProvider`]: an in-memory domain → cookies table
//! - [`CookieJarFile`]: a Netscape `cookies.txt` file (the format written by
//!   `curl -c` and by browser cookie exporters), re-read on every lookup so
//!   that fresh values are always picked up

use crate::error::{RepeaterError, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tokio::sync::RwLock;
use tracing::debug;

/// Source of the cookies currently valid for a host
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CookieProvider: Send + Sync {
    /// Cookies that a client would send to `host`, keyed by name
    async fn cookies_for(&self, host: &str) -> Result<BTreeMap<String, String>>;
}

/// Whether a cookie scoped to `domain` applies to `host`
///
/// A leading dot on `domain` is ignored. Subdomains of `domain` match only
/// when `include_subdomains` is set.
pub fn domain_matches(host: &str, domain: &str, include_subdomains: bool) -> bool {
    let domain = domain.trim_start_matches('.');
    if domain.is_empty() {
        return false;
    }
    if host.eq_ignore_ascii_case(domain) {
        return true;
    }
    let (host, domain) = (host.as_bytes(), domain.as_bytes());
    include_subdomains
        && host.len() > domain.len()
        && host[host.len() - domain.len()..].eq_ignore_ascii_case(domain)
        && host[host.len() - domain.len() - 1] == b'.'
}

/// In-memory cookie table
#[derive(Default)]
pub struct StaticCookieProvider {
    by_domain: RwLock<BTreeMap<String, BTreeMap<String, String>>>,
}

impl StaticCookieProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert, for setup code and tests
    pub fn with_cookie(mut self, domain: &str, name: &str, value: &str) -> Self {
        self.by_domain
            .get_mut()
            .entry(domain.to_string())
            .or_default()
            .insert(name.to_string(), value.to_string());
        self
    }

    /// Insert or replace one cookie
    pub async fn set(&self, domain: &str, name: &str, value: &str) {
        self.by_domain
            .write()
            .await
            .entry(domain.to_string())
            .or_default()
            .insert(name.to_string(), value.to_string());
    }
}

#[async_trait]
impl CookieProvider for StaticCookieProvider {
    async fn cookies_for(&self, host: &str) -> Result<BTreeMap<String, String>> {
        let table = self.by_domain.read().await;
        let mut cookies = BTreeMap::new();
        for (domain, entries) in table.iter() {
            if domain_matches(host, domain, true) {
                cookies.extend(entries.iter().map(|(k, v)| (k.clone(), v.clone())));
            }
        }
        Ok(cookies)
    }
}

/// Netscape-format cookie jar on disk
#[derive(Debug, Clone)]
pub struct CookieJarFile {
    path: PathBuf,
}

/// One parsed line of a Netscape cookie jar
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JarCookie {
    pub domain: String,
    pub include_subdomains: bool,
    pub path: String,
    pub secure: bool,
    /// Expiry in epoch seconds; 0 for session cookies
    pub expires: i64,
    pub name: String,
    pub value: String,
}

impl CookieJarFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Parse the contents of a Netscape cookie jar
    ///
    /// Comment lines and lines with fewer than seven tab-separated fields
    /// are skipped. The `#HttpOnly_` domain prefix is recognised.
    pub fn parse(contents: &str) -> Vec<JarCookie> {
        contents
            .lines()
            .filter_map(|line| {
                let line = line.trim_end_matches('\r');
                let line = match line.strip_prefix("#HttpOnly_") {
                    Some(rest) => rest,
                    None if line.starts_with('#') || line.trim().is_empty() => return None,
                    None => line,
                };
                let fields: Vec<&str> = line.split('\t').collect();
                if fields.len() < 7 {
                    return None;
                }
                Some(JarCookie {
                    domain: fields[0].to_string(),
                    include_subdomains: fields[1].eq_ignore_ascii_case("TRUE"),
                    path: fields[2].to_string(),
                    secure: fields[3].eq_ignore_ascii_case("TRUE"),
                    expires: fields[4].parse().unwrap_or(0),
                    name: fields[5].to_string(),
                    value: fields[6..].join("\t"),
                })
            })
            .collect()
    }
}

#[async_trait]
impl CookieProvider for CookieJarFile {
    async fn cookies_for(&self, host: &str) -> Result<BTreeMap<String, String>> {
        let contents = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            RepeaterError::Cookie(format!(
                "Failed to read cookie jar {}: {}",
                self.path.display(),
                e
            ))
        })?;
        let now = Utc::now().timestamp();
        let cookies: BTreeMap<String, String> = Self::parse(&contents)
            .into_iter()
            .filter(|c| c.expires == 0 || c.expires > now)
            .filter(|c| {
                domain_matches(
                    host,
                    &c.domain,
                    c.include_subdomains || c.domain.starts_with('.'),
                )
            })
            .map(|c| (c.name, c.value))
            .collect();
        debug!(host = %host, count = cookies.len(), "Loaded cookies from jar");
        Ok(cookies)
    }
}
