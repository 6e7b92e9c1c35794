//! Offline cache worker
//!
//! Sits between the application and the network, serving every request by one
//! of three strategies chosen from the routing table:
//!
//! - **network-only** for backend API calls (auth, REST, storage)
//! - **stale-while-revalidate** for app shell documents, scripts and styles
//! - **network-first** with cache fallback for everything else
//!
//! A worker owns exactly one versioned cache namespace. Registering a new
//! version through [`WorkerHost`] installs it, evicts every other namespace and
//! claims the connected clients.

pub mod fetcher;
pub mod host;
pub mod request;
pub mod response;
pub mod routing;
pub mod storage;
pub mod strategy;
pub mod worker;

pub use fetcher::{Fetcher, HttpFetcher};
pub use host::{ClientId, WorkerHost};
pub use request::{CacheKey, FetchRequest, RequestDestination, SEC_FETCH_DEST};
pub use response::ResponseSnapshot;
pub use routing::{RouteStrategy, RoutingRules, classify};
pub use storage::{Cache, CacheStorage, DiskCacheStorage, MemoryCacheStorage};
pub use worker::{FetchOutcome, OfflineWorker, WorkerOptions, WorkerState};
