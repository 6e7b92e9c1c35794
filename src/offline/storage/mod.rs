//! Versioned cache storage
//!
//! A `CacheStorage` holds named namespaces; each namespace is a `Cache` of
//! request/response pairs keyed by [`CacheKey`]. Only GET requests are ever
//! matched or stored, and entries are full replacements (last writer wins).

use std::sync::Arc;

use async_trait::async_trait;

use super::request::FetchRequest;
use super::response::ResponseSnapshot;
use crate::errors::{CacheError, CacheResult};

pub mod disk;
pub mod memory;

pub use disk::DiskCacheStorage;
pub use memory::MemoryCacheStorage;

/// One named cache namespace
#[async_trait]
pub trait Cache: Send + Sync {
    fn name(&self) -> &str;

    /// Stored response for `request`; non-GET requests never match
    async fn lookup(&self, request: &FetchRequest) -> CacheResult<Option<ResponseSnapshot>>;

    /// Store `response` for `request`, replacing any previous entry
    async fn put(&self, request: &FetchRequest, response: ResponseSnapshot) -> CacheResult<()>;

    /// Store every entry or none of them
    async fn put_all(&self, entries: Vec<(FetchRequest, ResponseSnapshot)>) -> CacheResult<()>;

    async fn delete(&self, request: &FetchRequest) -> CacheResult<bool>;

    async fn len(&self) -> CacheResult<usize>;

    async fn is_empty(&self) -> CacheResult<bool> {
        Ok(self.len().await? == 0)
    }
}

/// The set of cache namespaces available to a worker
#[async_trait]
pub trait CacheStorage: Send + Sync {
    /// Open a namespace, creating it if needed
    async fn open(&self, name: &str) -> CacheResult<Arc<dyn Cache>>;

    /// Open a namespace only if it already exists
    async fn open_existing(&self, name: &str) -> CacheResult<Option<Arc<dyn Cache>>>;

    async fn has(&self, name: &str) -> CacheResult<bool>;

    /// Names of every existing namespace
    async fn keys(&self) -> CacheResult<Vec<String>>;

    /// Remove a namespace and all of its entries; `false` if it did not exist
    async fn delete(&self, name: &str) -> CacheResult<bool>;
}

/// Reject requests the cache cannot store
pub(crate) fn ensure_storable(request: &FetchRequest) -> CacheResult<()> {
    if request.is_get() {
        Ok(())
    } else {
        Err(CacheError::UnsupportedMethod {
            method: request.method.to_string(),
        })
    }
}
