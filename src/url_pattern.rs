//! Wildcard URL pattern matching
//!
//! A pattern is a literal URL in which `*` matches any run of characters.
//! Query strings are ignored on both sides, and the pattern must cover the
//! whole URL.
//!
//! # Examples
//!
//! ```
//! use repeater::url_pattern::matches;
//!
//! assert!(matches("https://x.com/a/b?x=1", "https://x.com/a/*"));
//! assert!(!matches("https://x.com/c", "https://x.com/a/*"));
//! ```

use crate::storage::SavedRequest;
use regex::Regex;
use std::cmp::Ordering;

/// Check whether `url` matches the wildcard `pattern`
pub fn matches(url: &str, pattern: &str) -> bool {
    match compile(pattern) {
        Some(re) => re.is_match(strip_query(url)),
        None => false,
    }
}

/// Compile a wildcard pattern into an anchored regex
///
/// Returns `None` only if the generated regex exceeds the engine's size
/// limit, which a pathological pattern could trigger.
pub fn compile(pattern: &str) -> Option<Regex> {
    let escaped = strip_query(pattern)
        .split('*')
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(".*");
    Regex::new(&format!("^{}$", escaped)).ok()
}

/// Sort requests by `last_executed_at` descending, never-executed last
pub fn sort_by_last_executed(requests: &mut [SavedRequest]) {
    requests.sort_by(|a, b| match (a.last_executed_at, b.last_executed_at) {
        (Some(a), Some(b)) => b.cmp(&a),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
}

/// Drop everything from the first `?`
pub fn strip_query(s: &str) -> &str {
    s.split('?').next().unwrap_or(s)
}
