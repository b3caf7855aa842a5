//! Curl command parser
//!
//! Turns a curl command line (as produced by a browser's "Copy as cURL")
//! into a [`ParsedRequest`]: URL, method, headers, body and the cookies
//! carried in a literal `Cookie` header.
//!
//! Extraction is flag-by-flag and order-insensitive. Values may be bare,
//! single-quoted, double-quoted, or ANSI-C quoted (`$'...'`).
//!
//! # Examples
//!
//! ```
//! use repeater::curl_parser::parse;
//!
//! let parsed = parse("curl 'https://a.com/x' -X POST -d 'a=1'").unwrap();
//! assert_eq!(parsed.url, "https://a.com/x");
//! assert_eq!(parsed.method, "POST");
//! assert_eq!(parsed.body.as_deref(), Some("a=1"));
//! ```

use crate::error::ParseError;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::OnceLock;
use url::Url;

/// Shell-quoted flag value: `$'...'`, `'...'`, `"..."` or a bare token.
const VALUE: &str = r#"(?:\$'((?:[^'\\]|\\.)*)'|'([^']*)'|"((?:[^"\\]|\\.)*)"|([^\s'"]\S*))"#;

const COMPRESSED_ENCODING: &str = "gzip, deflate, br";
const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Structured form of a curl command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedRequest {
    /// Target URL
    pub url: String,
    /// Upper-cased HTTP method
    pub method: String,
    /// Header name to value; last duplicate wins
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// Request body, if any data or form flag was present
    #[serde(default)]
    pub body: Option<String>,
    /// Cookies taken from a literal `Cookie` header
    #[serde(default)]
    pub cookies: BTreeMap<String, String>,
}

struct Patterns {
    line_continuation: Regex,
    whitespace: Regex,
    first_token: Regex,
    url_flag: Regex,
    http_url: Regex,
    method: Regex,
    header: Regex,
    data: [Regex; 4],
    form: Regex,
    compressed: Regex,
    user_agent: Regex,
    user: Regex,
    cookie: Regex,
}

fn flag(flags: &str) -> Regex {
    Regex::new(&format!(r"(?:^|\s)(?:{})\s+{}", flags, VALUE)).expect("static flag pattern")
}

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| Patterns {
        line_continuation: Regex::new(r"\\\r?\n").expect("static pattern"),
        whitespace: Regex::new(r"\s+").expect("static pattern"),
        first_token: Regex::new(&format!(r"(?i)^curl\s+{}", VALUE)).expect("static pattern"),
        url_flag: flag("--url"),
        http_url: Regex::new(r#"https?://[^\s'"]+"#).expect("static pattern"),
        method: flag("-X|--request"),
        header: flag("-H|--header"),
        data: [
            flag("--data-raw"),
            flag("--data"),
            flag("-d"),
            flag("--data-binary"),
        ],
        form: flag("-F|--form"),
        compressed: Regex::new(r"(?:^|\s)--compressed(?:\s|$)").expect("static pattern"),
        user_agent: flag("-A|--user-agent"),
        user: flag("-u|--user"),
        cookie: flag("-b|--cookie"),
    })
}

/// Parse a curl command into a [`ParsedRequest`]
///
/// # Errors
///
/// Returns [`ParseError::NotACurlCommand`] if the input is empty or does
/// not start with `curl` (case-insensitive) once trimmed. URL validity is
/// not checked here; see [`validate`].
pub fn parse(raw: &str) -> Result<ParsedRequest, ParseError> {
    let trimmed = raw.trim();
    if !trimmed
        .get(..4)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("curl"))
    {
        return Err(ParseError::NotACurlCommand);
    }

    let p = patterns();
    let joined = p.line_continuation.replace_all(trimmed, " ");
    let cmd = p.whitespace.replace_all(&joined, " ");
    let cmd = cmd.trim();

    let mut headers = BTreeMap::new();
    for caps in p.header.captures_iter(cmd) {
        let line = flag_value(&caps);
        if let Some((key, value)) = line.split_once(':') {
            let key = key.trim();
            if !key.is_empty() {
                headers.insert(key.to_string(), value.trim().to_string());
            }
        }
    }

    let mut method = p
        .method
        .captures(cmd)
        .map(|caps| flag_value(&caps).to_ascii_uppercase())
        .unwrap_or_else(|| "GET".to_string());

    let mut body = p
        .data
        .iter()
        .find_map(|re| re.captures(cmd).map(|caps| flag_value(&caps)));
    if body.is_some() && method == "GET" {
        method = "POST".to_string();
    }

    let fields: Vec<String> = p
        .form
        .captures_iter(cmd)
        .map(|caps| flag_value(&caps))
        .collect();
    if !fields.is_empty() {
        body = Some(fields.join("&"));
        if method == "GET" {
            method = "POST".to_string();
        }
        headers
            .entry("Content-Type".to_string())
            .or_insert_with(|| FORM_CONTENT_TYPE.to_string());
    }

    if p.compressed.is_match(cmd) {
        headers
            .entry("Accept-Encoding".to_string())
            .or_insert_with(|| COMPRESSED_ENCODING.to_string());
    }

    if let Some(caps) = p.user_agent.captures(cmd) {
        headers.insert("User-Agent".to_string(), flag_value(&caps));
    }

    if let Some(caps) = p.user.captures(cmd) {
        let credentials = flag_value(&caps);
        headers.insert(
            "Authorization".to_string(),
            format!("Basic {}", BASE64.encode(credentials.as_bytes())),
        );
    }

    // `-b 'a=1; b=2'` is curl's cookie flag; a literal header takes priority.
    if let Some(caps) = p.cookie.captures(cmd) {
        let value = flag_value(&caps);
        if value.contains('=') && cookie_header(&headers).is_none() {
            headers.insert("Cookie".to_string(), value);
        }
    }

    let cookies = cookie_header(&headers)
        .map(parse_cookie_string)
        .unwrap_or_default();

    Ok(ParsedRequest {
        url: extract_url(cmd, p),
        method,
        headers,
        body,
        cookies,
    })
}

/// Parse and additionally require an absolute URL
///
/// # Errors
///
/// Returns [`ParseError::NotACurlCommand`], [`ParseError::NoUrlFound`] or
/// [`ParseError::InvalidUrl`].
pub fn validate(raw: &str) -> Result<ParsedRequest, ParseError> {
    let parsed = parse(raw)?;
    if parsed.url.is_empty() {
        return Err(ParseError::NoUrlFound);
    }
    Url::parse(&parsed.url).map_err(|_| ParseError::InvalidUrl(parsed.url.clone()))?;
    Ok(parsed)
}

/// Split a `Cookie` header value into name/value pairs
///
/// Values may contain `=`; pairs with an empty name are skipped.
pub fn parse_cookie_string(header: &str) -> BTreeMap<String, String> {
    header
        .split(';')
        .filter_map(|pair| {
            let pair = pair.trim();
            let (name, value) = pair.split_once('=').unwrap_or((pair, ""));
            (!name.is_empty()).then(|| (name.to_string(), value.to_string()))
        })
        .collect()
}

fn cookie_header(headers: &BTreeMap<String, String>) -> Option<&str> {
    headers
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case("cookie"))
        .map(|(_, value)| value.as_str())
}

fn extract_url(cmd: &str, p: &Patterns) -> String {
    if let Some(caps) = p.first_token.captures(cmd) {
        let token = flag_value(&caps);
        if !token.starts_with('-') && !token.is_empty() {
            return token;
        }
    }
    if let Some(caps) = p.url_flag.captures(cmd) {
        return flag_value(&caps);
    }
    p.http_url
        .find(cmd)
        .map(|m| m.as_str().to_string())
        .unwrap_or_default()
}

fn flag_value(caps: &Captures<'_>) -> String {
    if let Some(m) = caps.get(1) {
        unescape(m.as_str(), true)
    } else if let Some(m) = caps.get(2) {
        m.as_str().to_string()
    } else if let Some(m) = caps.get(3) {
        unescape(m.as_str(), false)
    } else {
        caps.get(4)
            .map(|m| m.as_str().to_string())
            .unwrap_or_default()
    }
}

fn unescape(s: &str, ansi_c: bool) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') if ansi_c => out.push('\n'),
            Some('r') if ansi_c => out.push('\r'),
            Some('t') if ansi_c => out.push('\t'),
            Some(c @ ('\\' | '\'' | '"')) => out.push(c),
            Some(c @ ('$' | '`')) if !ansi_c => out.push(c),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}
