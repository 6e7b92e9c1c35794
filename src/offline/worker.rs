//! Versioned offline worker and its lifecycle
//!
//! ```text
//! Parsed -> Installing -> Installed -> Activating -> Activated
//!     \________\______________\____________\____________\---> Redundant
//! ```
//!
//! Install pre-caches the app shell all-or-nothing; activate evicts every other
//! cache namespace. Only an activated worker serves fetches.

use std::fmt;
use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::watch;
use tracing::{debug, info, warn};
use url::Url;
use uuid::Uuid;

use super::fetcher::Fetcher;
use super::request::{FetchRequest, RequestDestination};
use super::response::ResponseSnapshot;
use super::routing::{RouteStrategy, RoutingRules, classify};
use super::storage::{Cache, CacheStorage};
use super::strategy::{network_first, network_only, stale_while_revalidate};
use crate::config::WorkerConfig;
use crate::errors::{AppError, FetchError, WorkerError};
use crate::utils::UrlUtils;

/// Lifecycle position of a worker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkerState {
    Parsed,
    Installing,
    /// Installed and waiting to activate
    Installed,
    Activating,
    Activated,
    /// Failed to install or superseded by a newer worker
    Redundant,
}

impl WorkerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Parsed => "parsed",
            Self::Installing => "installing",
            Self::Installed => "installed",
            Self::Activating => "activating",
            Self::Activated => "activated",
            Self::Redundant => "redundant",
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, Self::Activated)
    }
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Construction parameters for a worker version
#[derive(Debug, Clone)]
pub struct WorkerOptions {
    /// Live cache namespace for this version
    pub cache_name: String,
    /// Paths pre-cached at install, resolved against `origin`
    pub app_shell: Vec<String>,
    pub origin: Url,
    pub rules: RoutingRules,
}

impl WorkerOptions {
    pub fn from_config(config: &WorkerConfig) -> Result<Self, AppError> {
        Ok(Self {
            cache_name: config.cache_name.clone(),
            app_shell: config.app_shell.clone(),
            origin: config.upstream()?,
            rules: RoutingRules::from(config),
        })
    }
}

/// Result of offering a request to the worker
#[derive(Debug)]
pub enum FetchOutcome {
    /// Not intercepted; the caller sends the request to the network untouched
    Passthrough(FetchRequest),
    /// The worker produced the response (or the failure to surface)
    Responded(Result<ResponseSnapshot, FetchError>),
}

/// One version of the offline worker
pub struct OfflineWorker {
    id: Uuid,
    options: WorkerOptions,
    fetcher: Arc<dyn Fetcher>,
    storage: Arc<dyn CacheStorage>,
    state: watch::Sender<WorkerState>,
}

impl fmt::Debug for OfflineWorker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OfflineWorker")
            .field("id", &self.id)
            .field("cache_name", &self.options.cache_name)
            .field("state", &self.state())
            .finish()
    }
}

impl OfflineWorker {
    pub fn new(
        options: WorkerOptions,
        fetcher: Arc<dyn Fetcher>,
        storage: Arc<dyn CacheStorage>,
    ) -> Self {
        let (state, _) = watch::channel(WorkerState::Parsed);
        Self {
            id: Uuid::new_v4(),
            options,
            fetcher,
            storage,
            state,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn cache_name(&self) -> &str {
        &self.options.cache_name
    }

    pub fn options(&self) -> &WorkerOptions {
        &self.options
    }

    pub fn state(&self) -> WorkerState {
        *self.state.borrow()
    }

    /// Observe state transitions
    pub fn subscribe(&self) -> watch::Receiver<WorkerState> {
        self.state.subscribe()
    }

    fn transition(&self, from: WorkerState, to: WorkerState) -> Result<(), WorkerError> {
        let mut result = Ok(());
        self.state.send_modify(|state| {
            if *state == from {
                *state = to;
            } else {
                result = Err(WorkerError::InvalidState {
                    expected: from.to_string(),
                    actual: state.to_string(),
                });
            }
        });
        if result.is_ok() {
            debug!("Worker {} ({}): {} -> {}", self.id, self.cache_name(), from, to);
        }
        result
    }

    /// Mark the worker as no longer usable
    pub fn mark_redundant(&self) {
        let previous = self.state.send_replace(WorkerState::Redundant);
        if previous != WorkerState::Redundant {
            info!(
                "Worker {} ({}) is now redundant (was {})",
                self.id,
                self.cache_name(),
                previous
            );
        }
    }

    fn fail<T>(&self, error: WorkerError) -> Result<T, WorkerError> {
        warn!("Worker {} ({}) failed: {}", self.id, self.cache_name(), error);
        self.mark_redundant();
        Err(error)
    }

    fn app_shell_requests(&self) -> Result<Vec<FetchRequest>, WorkerError> {
        self.options
            .app_shell
            .iter()
            .map(|path| {
                UrlUtils::resolve(&self.options.origin, path)
                    .map(|url| {
                        FetchRequest::get(url).with_destination(RequestDestination::Document)
                    })
                    .map_err(|e| WorkerError::InvalidUrl {
                        path: path.clone(),
                        reason: e.to_string(),
                    })
            })
            .collect()
    }

    /// Pre-cache the app shell into this version's namespace
    ///
    /// Every resource is fetched before anything is written. Any rejected
    /// fetch or non-2xx response leaves the cache untouched and the worker
    /// redundant.
    pub async fn install(&self) -> Result<(), WorkerError> {
        self.transition(WorkerState::Parsed, WorkerState::Installing)?;
        info!(
            "Installing worker {} into cache '{}'",
            self.id,
            self.cache_name()
        );

        let requests = match self.app_shell_requests() {
            Ok(requests) => requests,
            Err(e) => return self.fail(e),
        };

        let responses = join_all(requests.iter().map(|r| self.fetcher.fetch(r))).await;

        let mut entries = Vec::with_capacity(requests.len());
        for (request, response) in requests.into_iter().zip(responses) {
            let url = UrlUtils::obfuscate_credentials(request.url.as_str());
            match response {
                Ok(response) if response.is_ok() => entries.push((request, response)),
                Ok(response) => {
                    return self.fail(WorkerError::Install {
                        url,
                        reason: format!("HTTP status {}", response.status),
                    });
                }
                Err(e) => {
                    return self.fail(WorkerError::Install {
                        url,
                        reason: e.to_string(),
                    });
                }
            }
        }

        let count = entries.len();
        let stored = match self.storage.open(self.cache_name()).await {
            Ok(cache) => cache.put_all(entries).await,
            Err(e) => Err(e),
        };
        if let Err(e) = stored {
            return self.fail(WorkerError::Cache(e));
        }

        self.transition(WorkerState::Installing, WorkerState::Installed)?;
        info!(
            "Worker {} installed: {} app shell entries cached in '{}'",
            self.id,
            count,
            self.cache_name()
        );
        Ok(())
    }

    /// Evict every cache namespace other than this version's
    pub async fn activate(&self) -> Result<(), WorkerError> {
        self.transition(WorkerState::Installed, WorkerState::Activating)?;

        let names = match self.storage.keys().await {
            Ok(names) => names,
            Err(e) => return self.fail(WorkerError::Cache(e)),
        };

        let mut evicted = Vec::new();
        for name in names.into_iter().filter(|n| n != self.cache_name()) {
            match self.storage.delete(&name).await {
                Ok(true) => evicted.push(name),
                Ok(false) => {}
                Err(e) => return self.fail(WorkerError::Cache(e)),
            }
        }

        self.transition(WorkerState::Activating, WorkerState::Activated)?;
        if evicted.is_empty() {
            info!("Worker {} activated on '{}'", self.id, self.cache_name());
        } else {
            info!(
                "Worker {} activated on '{}', evicted stale caches: {}",
                self.id,
                self.cache_name(),
                evicted.join(", ")
            );
        }
        Ok(())
    }

    /// Take over a namespace populated by an earlier run without reinstalling
    ///
    /// Returns `false`, leaving the worker parsed, when the namespace does not exist.
    pub async fn resume(&self) -> Result<bool, WorkerError> {
        let state = self.state();
        if state != WorkerState::Parsed {
            return Err(WorkerError::InvalidState {
                expected: WorkerState::Parsed.to_string(),
                actual: state.to_string(),
            });
        }

        match self.storage.has(self.cache_name()).await {
            Ok(true) => {}
            Ok(false) => return Ok(false),
            Err(e) => return self.fail(WorkerError::Cache(e)),
        }

        self.transition(WorkerState::Parsed, WorkerState::Installed)?;
        info!(
            "Worker {} resuming existing cache '{}'",
            self.id,
            self.cache_name()
        );
        self.activate().await?;
        Ok(true)
    }

    /// The worker's namespace, if it still exists; never recreates an evicted one
    async fn open_cache(&self) -> Option<Arc<dyn Cache>> {
        match self.storage.open_existing(self.cache_name()).await {
            Ok(Some(cache)) => Some(cache),
            Ok(None) => {
                debug!(
                    "Cache '{}' was evicted, worker {} serving from network",
                    self.cache_name(),
                    self.id
                );
                None
            }
            Err(e) => {
                warn!(
                    "Cache '{}' unavailable, serving from network: {}",
                    self.cache_name(),
                    e
                );
                None
            }
        }
    }

    /// Serve one intercepted request according to the routing table
    pub async fn handle_fetch(&self, request: FetchRequest) -> FetchOutcome {
        if !self.state().is_active() {
            debug!(
                "Worker {} is {}, not intercepting {}",
                self.id,
                self.state(),
                request.url
            );
            return FetchOutcome::Passthrough(request);
        }

        let strategy = classify(&request, &self.options.rules);
        debug!(
            "{} {} [{}] -> {}",
            request.method,
            UrlUtils::obfuscate_credentials(request.url.as_str()),
            request.destination,
            strategy
        );

        let result = match strategy {
            RouteStrategy::Passthrough => return FetchOutcome::Passthrough(request),
            RouteStrategy::NetworkOnly => network_only(self.fetcher.as_ref(), &request).await,
            RouteStrategy::StaleWhileRevalidate => match self.open_cache().await {
                Some(cache) => {
                    stale_while_revalidate(Arc::clone(&self.fetcher), cache, request).await
                }
                None => network_only(self.fetcher.as_ref(), &request).await,
            },
            RouteStrategy::NetworkFirst => match self.open_cache().await {
                Some(cache) => network_first(self.fetcher.as_ref(), cache.as_ref(), &request).await,
                None => network_only(self.fetcher.as_ref(), &request).await,
            },
        };

        FetchOutcome::Responded(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::FetchResult;
    use crate::offline::storage::MemoryCacheStorage;
    use async_trait::async_trait;

    struct ShellFetcher {
        failing_path: Option<&'static str>,
    }

    #[async_trait]
    impl Fetcher for ShellFetcher {
        async fn fetch(&self, request: &FetchRequest) -> FetchResult<ResponseSnapshot> {
            if Some(request.url.path()) == self.failing_path {
                return Ok(ResponseSnapshot::new(404, "not found"));
            }
            Ok(ResponseSnapshot::new(200, format!("shell {}", request.url.path())))
        }
    }

    fn options(cache_name: &str) -> WorkerOptions {
        WorkerOptions {
            cache_name: cache_name.to_string(),
            app_shell: vec!["/".to_string(), "/index.html".to_string()],
            origin: Url::parse("https://pod.example").unwrap(),
            rules: RoutingRules::default(),
        }
    }

    #[tokio::test]
    async fn test_install_then_activate() {
        let storage = Arc::new(MemoryCacheStorage::new());
        let worker = OfflineWorker::new(
            options("estela-pod-v1"),
            Arc::new(ShellFetcher { failing_path: None }),
            storage.clone(),
        );
        assert_eq!(worker.state(), WorkerState::Parsed);

        worker.install().await.unwrap();
        assert_eq!(worker.state(), WorkerState::Installed);
        let cache = storage.open("estela-pod-v1").await.unwrap();
        assert_eq!(cache.len().await.unwrap(), 2);

        worker.activate().await.unwrap();
        assert!(worker.state().is_active());
    }

    #[tokio::test]
    async fn test_failed_install_writes_nothing() {
        let storage = Arc::new(MemoryCacheStorage::new());
        let worker = OfflineWorker::new(
            options("estela-pod-v1"),
            Arc::new(ShellFetcher {
                failing_path: Some("/index.html"),
            }),
            storage.clone(),
        );

        let err = worker.install().await.unwrap_err();
        assert!(matches!(err, WorkerError::Install { .. }));
        assert_eq!(worker.state(), WorkerState::Redundant);
        assert!(!storage.has("estela-pod-v1").await.unwrap());
    }

    #[tokio::test]
    async fn test_activate_requires_install() {
        let worker = OfflineWorker::new(
            options("v1"),
            Arc::new(ShellFetcher { failing_path: None }),
            Arc::new(MemoryCacheStorage::new()),
        );
        assert!(matches!(
            worker.activate().await,
            Err(WorkerError::InvalidState { .. })
        ));
    }

    #[tokio::test]
    async fn test_resume_requires_existing_namespace() {
        let storage = Arc::new(MemoryCacheStorage::new());
        let fresh = OfflineWorker::new(
            options("v1"),
            Arc::new(ShellFetcher { failing_path: None }),
            storage.clone(),
        );
        assert!(!fresh.resume().await.unwrap());
        assert_eq!(fresh.state(), WorkerState::Parsed);

        storage.open("v1").await.unwrap();
        storage.open("v0").await.unwrap();
        assert!(fresh.resume().await.unwrap());
        assert!(fresh.state().is_active());
        assert_eq!(storage.keys().await.unwrap(), vec!["v1".to_string()]);
    }

    #[tokio::test]
    async fn test_inactive_worker_passes_requests_through() {
        let worker = OfflineWorker::new(
            options("v1"),
            Arc::new(ShellFetcher { failing_path: None }),
            Arc::new(MemoryCacheStorage::new()),
        );
        let request = FetchRequest::get(Url::parse("https://pod.example/").unwrap());
        assert!(matches!(
            worker.handle_fetch(request).await,
            FetchOutcome::Passthrough(_)
        ));
    }
}
