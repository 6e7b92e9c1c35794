//! Network access for the offline worker

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use tracing::trace;

use super::request::FetchRequest;
use super::response::ResponseSnapshot;
use crate::errors::{FetchError, FetchResult};
use crate::utils::UrlUtils;

/// Headers that only make sense for a single transport hop
const HOP_BY_HOP_HEADERS: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
    "host",
    "content-length",
];

pub(crate) fn is_hop_by_hop(name: &str) -> bool {
    HOP_BY_HOP_HEADERS
        .iter()
        .any(|h| h.eq_ignore_ascii_case(name))
}

/// Copy of `headers` without hop-by-hop fields; values are kept as raw bytes
pub(crate) fn end_to_end(headers: &HeaderMap) -> HeaderMap {
    headers
        .iter()
        .filter(|(name, _)| !is_hop_by_hop(name.as_str()))
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect()
}

/// Performs network fetches
///
/// An HTTP error status is a successful fetch; only a rejected request
/// (offline, DNS, connect, timeout) is an `Err`.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, request: &FetchRequest) -> FetchResult<ResponseSnapshot>;
}

/// `reqwest`-backed fetcher
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> FetchResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::limited(10))
            .user_agent(concat!("estela-pod/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| FetchError::InvalidRequest(e.to_string()))?;
        Ok(Self { client })
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, request: &FetchRequest) -> FetchResult<ResponseSnapshot> {
        let url = request.url.to_string();
        let safe_url = UrlUtils::obfuscate_credentials(&url);

        let mut builder = self
            .client
            .request(request.method.clone(), request.url.clone())
            .headers(end_to_end(&request.headers));
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let map_error = |e: reqwest::Error| {
            if e.is_timeout() {
                FetchError::Timeout {
                    url: safe_url.clone(),
                }
            } else if e.is_builder() {
                FetchError::InvalidRequest(e.to_string())
            } else {
                FetchError::network(safe_url.clone(), e)
            }
        };

        let response = builder.send().await.map_err(map_error)?;
        let status = response.status().as_u16();
        let final_url = response.url().to_string();
        let headers = end_to_end(response.headers());
        let body = response.bytes().await.map_err(map_error)?;

        trace!(
            "{} {} -> {} ({} bytes)",
            request.method,
            safe_url,
            status,
            body.len()
        );

        Ok(ResponseSnapshot {
            status,
            headers,
            body,
            url: final_url,
        })
    }
}
