//! Intercepted request model and cache keys

use std::fmt;

use bytes::Bytes;
use reqwest::Method;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;
use url::Url;

/// Header carrying the browser's resource type for a request
pub const SEC_FETCH_DEST: &str = "sec-fetch-dest";

/// Resource type of a request, as reported by the platform
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum RequestDestination {
    Document,
    Script,
    Style,
    Image,
    Font,
    #[default]
    Empty,
    Other(String),
}

impl RequestDestination {
    /// Parse a `Sec-Fetch-Dest` header value; a missing header is `Empty`
    pub fn from_header_value(value: Option<&str>) -> Self {
        match value.map(|v| v.trim().to_ascii_lowercase()) {
            None => Self::Empty,
            Some(v) => match v.as_str() {
                "document" => Self::Document,
                "script" => Self::Script,
                "style" => Self::Style,
                "image" => Self::Image,
                "font" => Self::Font,
                "" | "empty" => Self::Empty,
                _ => Self::Other(v),
            },
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Document => "document",
            Self::Script => "script",
            Self::Style => "style",
            Self::Image => "image",
            Self::Font => "font",
            Self::Empty => "empty",
            Self::Other(value) => value,
        }
    }

    /// Document, script and style requests make up the app shell
    pub fn is_app_shell(&self) -> bool {
        matches!(self, Self::Document | Self::Script | Self::Style)
    }
}

impl fmt::Display for RequestDestination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A network request seen by the offline worker
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub method: Method,
    pub url: Url,
    pub destination: RequestDestination,
    /// Raw header values, forwarded byte for byte
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
}

impl FetchRequest {
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            destination: RequestDestination::Empty,
            headers: HeaderMap::new(),
            body: None,
        }
    }

    pub fn get(url: Url) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn with_destination(mut self, destination: RequestDestination) -> Self {
        self.destination = destination;
        self
    }

    /// Append a textual header; names or values that are not valid HTTP are skipped
    pub fn with_header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        if let Some((name, value)) = parse_header(name.as_ref(), value.as_ref()) {
            self.headers.append(name, value);
        }
        self
    }

    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// First value of `name` (case-insensitive), if it is visible ASCII
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn is_get(&self) -> bool {
        self.method == Method::GET
    }

    pub fn cache_key(&self) -> CacheKey {
        CacheKey::for_request(self)
    }
}

pub(crate) fn parse_header(name: &str, value: &str) -> Option<(HeaderName, HeaderValue)> {
    match (
        HeaderName::from_bytes(name.as_bytes()),
        HeaderValue::from_str(value),
    ) {
        (Ok(name), Ok(value)) => Some((name, value)),
        _ => {
            debug!("Skipping invalid header '{}'", name);
            None
        }
    }
}

/// Identity of a cache entry: method plus URL without its fragment
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey {
    pub method: String,
    pub url: String,
}

impl CacheKey {
    pub fn new(method: &Method, url: &Url) -> Self {
        let mut url = url.clone();
        url.set_fragment(None);
        Self {
            method: method.as_str().to_string(),
            url: url.to_string(),
        }
    }

    pub fn for_request(request: &FetchRequest) -> Self {
        Self::new(&request.method, &request.url)
    }

    /// Lowercase hex SHA-256 of the key, safe to use as a file stem
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.method.as_bytes());
        hasher.update(b" ");
        hasher.update(self.url.as_bytes());
        hex::encode(hasher.finalize())
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.url)
    }
}
