//! Verbatim response snapshots

use bytes::Bytes;
use reqwest::header::HeaderMap;

use super::request::parse_header;

/// A complete response as returned by the network or stored in a cache
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseSnapshot {
    pub status: u16,
    /// Raw header values, returned byte for byte
    pub headers: HeaderMap,
    pub body: Bytes,
    /// Final URL the response was served from
    pub url: String,
}

impl ResponseSnapshot {
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: body.into(),
            url: String::new(),
        }
    }

    /// Append a textual header; names or values that are not valid HTTP are skipped
    pub fn with_header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        if let Some((name, value)) = parse_header(name.as_ref(), value.as_ref()) {
            self.headers.append(name, value);
        }
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// HTTP-ok: 200..=299
    pub fn is_ok(&self) -> bool {
        (200..=299).contains(&self.status)
    }

    /// First value of `name` (case-insensitive), if it is visible ASCII
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }
}
