//! In-memory cache storage

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{Cache, CacheStorage, ensure_storable};
use crate::errors::{CacheError, CacheResult};
use crate::offline::request::{CacheKey, FetchRequest};
use crate::offline::response::ResponseSnapshot;

/// Namespace held entirely in memory
#[derive(Debug)]
pub struct MemoryCache {
    name: String,
    entries: RwLock<HashMap<CacheKey, ResponseSnapshot>>,
    deleted: AtomicBool,
}

impl MemoryCache {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            entries: RwLock::new(HashMap::new()),
            deleted: AtomicBool::new(false),
        }
    }

    fn ensure_live(&self) -> CacheResult<()> {
        if self.deleted.load(Ordering::Acquire) {
            Err(CacheError::NamespaceMissing {
                name: self.name.clone(),
            })
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl Cache for MemoryCache {
    fn name(&self) -> &str {
        &self.name
    }

    async fn lookup(&self, request: &FetchRequest) -> CacheResult<Option<ResponseSnapshot>> {
        if !request.is_get() || self.deleted.load(Ordering::Acquire) {
            return Ok(None);
        }
        Ok(self.entries.read().await.get(&request.cache_key()).cloned())
    }

    async fn put(&self, request: &FetchRequest, response: ResponseSnapshot) -> CacheResult<()> {
        ensure_storable(request)?;
        self.ensure_live()?;
        self.entries
            .write()
            .await
            .insert(request.cache_key(), response);
        Ok(())
    }

    async fn put_all(&self, entries: Vec<(FetchRequest, ResponseSnapshot)>) -> CacheResult<()> {
        for (request, _) in &entries {
            ensure_storable(request)?;
        }
        self.ensure_live()?;

        let mut stored = self.entries.write().await;
        for (request, response) in entries {
            stored.insert(request.cache_key(), response);
        }
        Ok(())
    }

    async fn delete(&self, request: &FetchRequest) -> CacheResult<bool> {
        Ok(self
            .entries
            .write()
            .await
            .remove(&request.cache_key())
            .is_some())
    }

    async fn len(&self) -> CacheResult<usize> {
        Ok(self.entries.read().await.len())
    }
}

/// Cache storage whose namespaces live for the lifetime of the process
#[derive(Debug, Clone, Default)]
pub struct MemoryCacheStorage {
    namespaces: Arc<RwLock<HashMap<String, Arc<MemoryCache>>>>,
}

impl MemoryCacheStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheStorage for MemoryCacheStorage {
    async fn open(&self, name: &str) -> CacheResult<Arc<dyn Cache>> {
        if let Some(cache) = self.namespaces.read().await.get(name) {
            let cache: Arc<dyn Cache> = cache.clone();
            return Ok(cache);
        }

        let mut namespaces = self.namespaces.write().await;
        let cache: Arc<dyn Cache> = namespaces
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(MemoryCache::new(name)))
            .clone();
        Ok(cache)
    }

    async fn open_existing(&self, name: &str) -> CacheResult<Option<Arc<dyn Cache>>> {
        Ok(self
            .namespaces
            .read()
            .await
            .get(name)
            .map(|cache| -> Arc<dyn Cache> { cache.clone() }))
    }

    async fn has(&self, name: &str) -> CacheResult<bool> {
        Ok(self.namespaces.read().await.contains_key(name))
    }

    async fn keys(&self) -> CacheResult<Vec<String>> {
        let mut names: Vec<String> = self.namespaces.read().await.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    async fn delete(&self, name: &str) -> CacheResult<bool> {
        match self.namespaces.write().await.remove(name) {
            Some(cache) => {
                cache.deleted.store(true, Ordering::Release);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
