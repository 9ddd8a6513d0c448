//! Buffered responses, the duplicate primitive and synthesized responses

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::OfflineText;

/// HTTP-date format used by the `Date` header (IMF-fixdate)
const HTTP_DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";

/// A fully buffered response.
///
/// Network bodies are read into memory once, so the response can be
/// duplicated into independent copies (one for the cache, one for the page).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedResponse {
    pub status: u16,
    /// Header pairs in arrival order; names compare case-insensitively
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl CachedResponse {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// First value of a header, case-insensitive
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// 2xx status
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Split into two independent readable copies
    pub fn tee(self) -> (Self, Self) {
        let copy = self.clone();
        (self, copy)
    }

    /// Server-supplied `Date` header, if present and parseable
    pub fn date(&self) -> Option<DateTime<Utc>> {
        self.header("date").and_then(parse_http_date)
    }

    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Parse an HTTP `Date` header value.
///
/// Accepts the IMF-fixdate form and anything RFC 2822 parses.
pub fn parse_http_date(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(naive) = NaiveDateTime::parse_from_str(value, HTTP_DATE_FORMAT) {
        return Some(naive.and_utc());
    }
    DateTime::parse_from_rfc2822(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Format a timestamp as an HTTP `Date` header value
#[cfg(test)]
pub fn format_http_date(at: DateTime<Utc>) -> String {
    at.format(HTTP_DATE_FORMAT).to_string()
}

/// Body of the synthesized API offline response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfflinePayload {
    pub error: String,
    pub message: String,
    pub offline: bool,
}

/// 503 JSON response returned for API requests with no network and no cache
pub fn offline_api_response(text: &OfflineText) -> CachedResponse {
    let payload = OfflinePayload {
        error: text.error.clone(),
        message: text.message.clone(),
        offline: true,
    };
    // Serializing a struct of strings and a bool cannot fail
    let body = serde_json::to_vec(&payload).unwrap_or_default();

    CachedResponse::new(503)
        .with_header("Content-Type", "application/json")
        .with_header("Cache-Control", "no-store")
        .with_body(body)
}

/// 503 HTML page for navigations with no network and no cached root document
pub fn offline_page_response(text: &OfflineText) -> CachedResponse {
    let body = format!(
        "<!DOCTYPE html><html><head><meta charset=\"utf-8\"><title>{}</title></head>\
         <body><h1>{}</h1><p>{}</p></body></html>",
        text.error, text.error, text.message
    );

    CachedResponse::new(503)
        .with_header("Content-Type", "text/html; charset=utf-8")
        .with_header("Cache-Control", "no-store")
        .with_body(body.into_bytes())
}
