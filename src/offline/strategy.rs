//! Request-serving strategies
//!
//! Every strategy returns the network's or the cache's response verbatim.
//! Cache trouble never fails a request: lookup errors count as misses and
//! write errors are logged and dropped.

use std::sync::Arc;

use tracing::{debug, warn};

use super::fetcher::Fetcher;
use super::request::FetchRequest;
use super::response::ResponseSnapshot;
use super::storage::Cache;
use crate::errors::{FetchError, FetchResult};

/// Store `response` if it is HTTP-ok; failures are logged, never returned
pub(crate) async fn store_if_ok(
    cache: &dyn Cache,
    request: &FetchRequest,
    response: &ResponseSnapshot,
) {
    if !response.is_ok() {
        debug!(
            "Not caching {} response for {}",
            response.status,
            request.cache_key()
        );
        return;
    }
    if let Err(e) = cache.put(request, response.clone()).await {
        warn!(
            "Failed to cache {} in '{}': {}",
            request.cache_key(),
            cache.name(),
            e
        );
    }
}

async fn lookup_or_miss(cache: &dyn Cache, request: &FetchRequest) -> Option<ResponseSnapshot> {
    match cache.lookup(request).await {
        Ok(hit) => hit,
        Err(e) => {
            warn!(
                "Cache lookup for {} in '{}' failed, treating as miss: {}",
                request.cache_key(),
                cache.name(),
                e
            );
            None
        }
    }
}

/// Always the network; the cache is neither read nor written
pub async fn network_only(
    fetcher: &dyn Fetcher,
    request: &FetchRequest,
) -> FetchResult<ResponseSnapshot> {
    fetcher.fetch(request).await
}

/// Cached response immediately if present, refreshed from the network in the background
///
/// The network fetch is spawned before the cache is consulted so both run
/// concurrently. On a hit the spawned task is left running and writes its
/// HTTP-ok response when it settles; nothing waits for it. On a miss the
/// task is awaited, so the write has landed by the time this returns.
pub async fn stale_while_revalidate(
    fetcher: Arc<dyn Fetcher>,
    cache: Arc<dyn Cache>,
    request: FetchRequest,
) -> FetchResult<ResponseSnapshot> {
    let refresh = {
        let cache = Arc::clone(&cache);
        let request = request.clone();
        tokio::spawn(async move {
            let result = fetcher.fetch(&request).await;
            match &result {
                Ok(response) => store_if_ok(cache.as_ref(), &request, response).await,
                Err(e) => debug!("Background refresh of {} failed: {}", request.url, e),
            }
            result
        })
    };

    if let Some(cached) = lookup_or_miss(cache.as_ref(), &request).await {
        debug!("Cache hit for {}; revalidating in background", request.cache_key());
        return Ok(cached);
    }

    debug!("Cache miss for {}; waiting on network", request.cache_key());
    refresh
        .await
        .map_err(|e| FetchError::network(request.url.as_str(), e))?
}

/// Network, falling back to the cache only when the fetch rejects
///
/// Responses are never written here. If the cache has nothing either, the
/// original network error is returned.
pub async fn network_first(
    fetcher: &dyn Fetcher,
    cache: &dyn Cache,
    request: &FetchRequest,
) -> FetchResult<ResponseSnapshot> {
    match fetcher.fetch(request).await {
        Ok(response) => Ok(response),
        Err(error) => match lookup_or_miss(cache, request).await {
            Some(cached) => {
                debug!(
                    "Network failed for {} ({}); serving cached copy",
                    request.cache_key(),
                    error
                );
                Ok(cached)
            }
            None => Err(error),
        },
    }
}
