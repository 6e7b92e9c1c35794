//! Per-request routing table for the offline worker
//!
//! Rules are evaluated in order and the first match wins:
//!
//! | Condition                                          | Strategy               |
//! |----------------------------------------------------|------------------------|
//! | scheme is not http/https                           | passthrough            |
//! | host contains the backend marker or path starts    | network-only           |
//! | with an API prefix                                 |                        |
//! | destination is document, script or style          | stale-while-revalidate |
//! | anything else                                      | network-first          |

use std::fmt;

use url::Url;

use super::request::FetchRequest;
use crate::config::WorkerConfig;
use crate::config::defaults::{DEFAULT_API_PREFIXES, DEFAULT_BACKEND_MARKER};
use crate::utils::UrlUtils;

/// Backend-API detection rules
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingRules {
    /// Hostname substring identifying the managed backend
    pub backend_marker: String,
    /// Path prefixes that are always network-only, checked in order
    pub api_prefixes: Vec<String>,
}

impl Default for RoutingRules {
    fn default() -> Self {
        Self {
            backend_marker: DEFAULT_BACKEND_MARKER.to_string(),
            api_prefixes: DEFAULT_API_PREFIXES.iter().map(|p| p.to_string()).collect(),
        }
    }
}

impl From<&WorkerConfig> for RoutingRules {
    fn from(config: &WorkerConfig) -> Self {
        Self {
            backend_marker: config.backend_marker.clone(),
            api_prefixes: config.api_prefixes.clone(),
        }
    }
}

impl RoutingRules {
    /// Whether `url` addresses the backend API
    pub fn is_backend_api(&self, url: &Url) -> bool {
        let marker_hit = !self.backend_marker.is_empty()
            && url
                .host_str()
                .is_some_and(|host| host.contains(self.backend_marker.as_str()));

        marker_hit
            || self
                .api_prefixes
                .iter()
                .any(|prefix| url.path().starts_with(prefix.as_str()))
    }
}

/// How a single intercepted request is served
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouteStrategy {
    /// Not intercepted at all
    Passthrough,
    /// Always the network; the cache is never read or written
    NetworkOnly,
    /// Cached copy immediately, refreshed in the background
    StaleWhileRevalidate,
    /// Network, falling back to the cache when the fetch rejects
    NetworkFirst,
}

impl RouteStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Passthrough => "passthrough",
            Self::NetworkOnly => "network-only",
            Self::StaleWhileRevalidate => "stale-while-revalidate",
            Self::NetworkFirst => "network-first",
        }
    }
}

impl fmt::Display for RouteStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify a request; a pure function of the request and the rules
pub fn classify(request: &FetchRequest, rules: &RoutingRules) -> RouteStrategy {
    if !UrlUtils::is_http_scheme(&request.url) {
        return RouteStrategy::Passthrough;
    }
    if rules.is_backend_api(&request.url) {
        return RouteStrategy::NetworkOnly;
    }
    if request.destination.is_app_shell() {
        return RouteStrategy::StaleWhileRevalidate;
    }
    RouteStrategy::NetworkFirst
}
