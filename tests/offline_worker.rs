//! Offline worker lifecycle and routing through the worker host

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{Reply, ScriptedFetcher, asset, document, shell_network, url, worker};
use estela_pod::errors::{FetchError, WorkerError};
use estela_pod::offline::{
    CacheStorage, FetchOutcome, FetchRequest, MemoryCacheStorage, RequestDestination,
    WorkerHost, WorkerState,
};
use tokio_test::assert_ok;

async fn activated(
    cache_name: &str,
    network: Arc<ScriptedFetcher>,
    storage: Arc<dyn CacheStorage>,
) -> (WorkerHost, estela_pod::offline::ClientId) {
    let host = WorkerHost::new(network.clone());
    let client = host.connect().await;
    assert_ok!(host.register(worker(cache_name, network, storage)).await);
    (host, client)
}

/// Poll until the cached body for `path` equals `expected`
async fn wait_for_cached(storage: &dyn CacheStorage, cache_name: &str, path: &str, expected: &str) {
    let cache = storage.open(cache_name).await.unwrap();
    let request = FetchRequest::get(url(path));
    tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            if let Some(hit) = cache.lookup(&request).await.unwrap()
                && hit.body == expected
            {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("cache never held '{expected}' for {path}"));
}

#[tokio::test]
async fn test_backend_api_is_network_only() {
    let network = shell_network().with("/rest/v1/boats", Reply::Status(200, "[{\"id\":1}]"));
    let storage: Arc<dyn CacheStorage> = Arc::new(MemoryCacheStorage::new());
    let (host, client) = activated("estela-pod-v1", network.clone(), storage.clone()).await;

    for destination in [
        RequestDestination::Empty,
        RequestDestination::Document,
        RequestDestination::Image,
    ] {
        let response = host
            .fetch(client, asset("/rest/v1/boats", destination))
            .await
            .unwrap();
        assert_eq!(response.body, "[{\"id\":1}]");
    }
    assert_eq!(network.calls_to("/rest/v1/boats"), 3);

    let cache = storage.open("estela-pod-v1").await.unwrap();
    assert!(
        cache
            .lookup(&FetchRequest::get(url("/rest/v1/boats")))
            .await
            .unwrap()
            .is_none()
    );

    // offline, the API has no fallback
    network.set("/rest/v1/boats", Reply::Offline);
    let result = host.fetch(client, document("/rest/v1/boats")).await;
    assert!(matches!(result, Err(FetchError::Network { .. })));
}

#[tokio::test]
async fn test_root_document_served_from_cache_while_offline() {
    let network = shell_network();
    let storage: Arc<dyn CacheStorage> = Arc::new(MemoryCacheStorage::new());
    let (host, client) = activated("estela-pod-v1", network.clone(), storage).await;

    network.set_all(Reply::Offline);
    let response = host.fetch(client, document("/")).await.unwrap();
    assert_eq!(response.status, 200);
    assert_eq!(response.body, "<html>shell</html>");
}

#[tokio::test]
async fn test_stale_while_revalidate_does_not_wait_for_network() {
    let network = shell_network();
    let storage: Arc<dyn CacheStorage> = Arc::new(MemoryCacheStorage::new());
    let (host, client) = activated("estela-pod-v1", network.clone(), storage).await;

    network.set("/", Reply::Hang);
    let response = tokio::time::timeout(
        Duration::from_millis(500),
        host.fetch(client, document("/")),
    )
    .await
    .expect("cached response should not wait on a hanging network")
    .unwrap();

    assert_eq!(response.body, "<html>shell</html>");
}

#[tokio::test]
async fn test_background_refresh_updates_cache() {
    let network = shell_network();
    let storage: Arc<dyn CacheStorage> = Arc::new(MemoryCacheStorage::new());
    let (host, client) = activated("estela-pod-v1", network.clone(), storage.clone()).await;

    network.set("/", Reply::Status(200, "<html>v2</html>"));
    let stale = host.fetch(client, document("/")).await.unwrap();
    assert_eq!(stale.body, "<html>shell</html>");

    wait_for_cached(storage.as_ref(), "estela-pod-v1", "/", "<html>v2</html>").await;
    let fresh = host.fetch(client, document("/")).await.unwrap();
    assert_eq!(fresh.body, "<html>v2</html>");
}

#[tokio::test]
async fn test_error_status_never_replaces_cached_entry() {
    let network = shell_network();
    let storage: Arc<dyn CacheStorage> = Arc::new(MemoryCacheStorage::new());
    let (host, client) = activated("estela-pod-v1", network.clone(), storage.clone()).await;

    network.set("/", Reply::Status(500, "upstream exploded"));
    let response = host.fetch(client, document("/")).await.unwrap();
    assert_eq!(response.body, "<html>shell</html>");

    // let the background refresh settle
    tokio::time::sleep(Duration::from_millis(50)).await;
    let response = host.fetch(client, document("/")).await.unwrap();
    assert_eq!(response.status, 200);
    assert_eq!(response.body, "<html>shell</html>");
}

#[tokio::test]
async fn test_error_status_on_miss_is_returned_not_cached() {
    let network = shell_network().with("/styles.css", Reply::Status(500, "oops"));
    let storage: Arc<dyn CacheStorage> = Arc::new(MemoryCacheStorage::new());
    let (host, client) = activated("estela-pod-v1", network.clone(), storage.clone()).await;

    let request = asset("/styles.css", RequestDestination::Style);
    let response = host.fetch(client, request.clone()).await.unwrap();
    assert_eq!(response.status, 500);

    let cache = storage.open("estela-pod-v1").await.unwrap();
    assert!(cache.lookup(&request).await.unwrap().is_none());

    network.set("/styles.css", Reply::Offline);
    assert!(host.fetch(client, request).await.is_err());
}

#[tokio::test]
async fn test_other_assets_prefer_network_and_fall_back() {
    let network = shell_network().with("/logo.png", Reply::Status(200, "png-v1"));
    let storage: Arc<dyn CacheStorage> = Arc::new(MemoryCacheStorage::new());
    let (host, client) = activated("estela-pod-v1", network.clone(), storage.clone()).await;

    let image = asset("/logo.png", RequestDestination::Image);
    let cache = storage.open("estela-pod-v1").await.unwrap();
    cache
        .put(&image, estela_pod::offline::ResponseSnapshot::new(200, "png-cached"))
        .await
        .unwrap();

    let online = host.fetch(client, image.clone()).await.unwrap();
    assert_eq!(online.body, "png-v1");
    // network-first never writes
    let stored = cache.lookup(&image).await.unwrap().unwrap();
    assert_eq!(stored.body, "png-cached");

    network.set("/logo.png", Reply::Offline);
    let offline = host.fetch(client, image).await.unwrap();
    assert_eq!(offline.body, "png-cached");

    let uncached = host
        .fetch(client, asset("/missing.png", RequestDestination::Image))
        .await;
    assert!(uncached.is_ok(), "404 from the network is a valid response");
}

#[tokio::test]
async fn test_non_get_requests_bypass_worker() {
    let network = shell_network();
    let storage: Arc<dyn CacheStorage> = Arc::new(MemoryCacheStorage::new());
    let registered = common::worker("estela-pod-v1", network.clone(), storage.clone());
    assert_ok!(registered.install().await);
    assert_ok!(registered.activate().await);

    let post = FetchRequest::new(reqwest::Method::POST, url("/"))
        .with_destination(RequestDestination::Document)
        .with_body("form=1");
    assert!(matches!(
        registered.handle_fetch(post).await,
        FetchOutcome::Passthrough(_)
    ));
}

#[tokio::test]
async fn test_activation_evicts_every_other_namespace() {
    let storage: Arc<dyn CacheStorage> = Arc::new(MemoryCacheStorage::new());
    storage.open("estela-pod-v1").await.unwrap();
    storage.open("estela-pod-v2").await.unwrap();

    let (_host, _client) = activated("estela-pod-v3", shell_network(), storage.clone()).await;

    assert_eq!(storage.keys().await.unwrap(), vec!["estela-pod-v3".to_string()]);
}

#[tokio::test]
async fn test_superseded_worker_does_not_recreate_evicted_cache() {
    let storage: Arc<dyn CacheStorage> = Arc::new(MemoryCacheStorage::new());
    let network = shell_network();
    let (host, client) = activated("estela-pod-v1", network.clone(), storage.clone()).await;
    let v1 = host.active_worker().await.unwrap();

    let v2 = worker("estela-pod-v2", network.clone(), storage.clone());
    assert_ok!(v2.install().await);
    assert_ok!(v2.activate().await);
    assert_eq!(storage.keys().await.unwrap(), vec!["estela-pod-v2".to_string()]);

    // v1 still controls the client until the host promotes v2
    assert_eq!(host.controller(client).await.unwrap().id(), v1.id());
    let response = host.fetch(client, document("/")).await.unwrap();
    assert_eq!(response.body, "<html>shell</html>");
    let response = host
        .fetch(client, asset("/logo.png", RequestDestination::Image))
        .await
        .unwrap();
    assert_eq!(response.status, 404);

    assert_eq!(storage.keys().await.unwrap(), vec!["estela-pod-v2".to_string()]);
}

#[tokio::test]
async fn test_failed_install_keeps_previous_worker() {
    let storage: Arc<dyn CacheStorage> = Arc::new(MemoryCacheStorage::new());
    let network = shell_network();
    let (host, client) = activated("estela-pod-v1", network.clone(), storage.clone()).await;
    let v1 = host.active_worker().await.unwrap();

    network.set("/manifest.json", Reply::Offline);
    let v2 = worker("estela-pod-v2", network.clone(), storage.clone());
    let err = host.register(v2.clone()).await.unwrap_err();

    assert!(matches!(err, WorkerError::Install { .. }));
    assert_eq!(v2.state(), WorkerState::Redundant);
    assert_eq!(v1.state(), WorkerState::Activated);
    assert_eq!(host.controller(client).await.unwrap().id(), v1.id());
    assert_eq!(storage.keys().await.unwrap(), vec!["estela-pod-v1".to_string()]);
}

#[tokio::test]
async fn test_install_all_or_nothing_on_http_error() {
    let storage: Arc<dyn CacheStorage> = Arc::new(MemoryCacheStorage::new());
    let network = shell_network().with("/index.html", Reply::Status(404, "gone"));
    let fresh = worker("estela-pod-v1", network, storage.clone());

    assert!(fresh.install().await.is_err());
    assert!(!storage.has("estela-pod-v1").await.unwrap());
}

#[tokio::test]
async fn test_lifecycle_transitions_are_observable() {
    let storage: Arc<dyn CacheStorage> = Arc::new(MemoryCacheStorage::new());
    let fresh = worker("estela-pod-v1", shell_network(), storage);
    let mut states = fresh.subscribe();
    assert_eq!(*states.borrow_and_update(), WorkerState::Parsed);

    fresh.install().await.unwrap();
    assert_eq!(*states.borrow_and_update(), WorkerState::Installed);
    fresh.activate().await.unwrap();
    assert_eq!(*states.borrow_and_update(), WorkerState::Activated);

    // install is one-shot
    assert!(matches!(
        fresh.install().await,
        Err(WorkerError::InvalidState { .. })
    ));
}

#[tokio::test]
async fn test_late_client_is_controlled_and_disconnect_releases() {
    let storage: Arc<dyn CacheStorage> = Arc::new(MemoryCacheStorage::new());
    let (host, early) = activated("estela-pod-v1", shell_network(), storage).await;

    let late = host.connect().await;
    assert!(host.controller(late).await.is_some());
    assert_eq!(host.client_count().await, 2);

    assert!(host.disconnect(early).await);
    assert!(!host.disconnect(early).await);
    assert_eq!(host.client_count().await, 1);
}
