//! Worker registration and client control

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use super::fetcher::Fetcher;
use super::request::FetchRequest;
use super::response::ResponseSnapshot;
use super::worker::{FetchOutcome, OfflineWorker, WorkerState};
use crate::errors::{FetchResult, WorkerError};

/// Handle for a connected client (an open application page)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClientId(Uuid);

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Owns the active worker registration and routes client fetches through it
///
/// A newly registered worker is installed and activated immediately, the
/// previous one becomes redundant, and every connected client is claimed so
/// its next request goes through the new version.
pub struct WorkerHost {
    network: Arc<dyn Fetcher>,
    active: RwLock<Option<Arc<OfflineWorker>>>,
    clients: RwLock<HashMap<ClientId, Option<Arc<OfflineWorker>>>>,
}

impl WorkerHost {
    /// `network` serves uncontrolled clients and passthrough requests
    pub fn new(network: Arc<dyn Fetcher>) -> Self {
        Self {
            network,
            active: RwLock::new(None),
            clients: RwLock::new(HashMap::new()),
        }
    }

    /// Install and activate `worker`, replacing any previous version
    ///
    /// On failure the previous worker stays active and keeps its clients.
    pub async fn register(&self, worker: Arc<OfflineWorker>) -> Result<(), WorkerError> {
        worker.install().await?;
        worker.activate().await?;
        self.promote(worker).await;
        Ok(())
    }

    /// Activate `worker` on the cache a previous run left behind
    ///
    /// Used when installation is impossible (the upstream is unreachable at
    /// startup). Returns `false` if there is nothing to resume.
    pub async fn resume(&self, worker: Arc<OfflineWorker>) -> Result<bool, WorkerError> {
        if !worker.resume().await? {
            return Ok(false);
        }
        self.promote(worker).await;
        Ok(true)
    }

    async fn promote(&self, worker: Arc<OfflineWorker>) {
        let previous = self.active.write().await.replace(Arc::clone(&worker));
        if let Some(previous) = previous
            && previous.id() != worker.id()
        {
            previous.mark_redundant();
        }

        let claimed = self.claim(&worker).await;
        info!(
            "Worker {} is active on '{}' and controls {} client(s)",
            worker.id(),
            worker.cache_name(),
            claimed
        );
    }

    /// Put every connected client under `worker`'s control
    async fn claim(&self, worker: &Arc<OfflineWorker>) -> usize {
        let mut clients = self.clients.write().await;
        for controller in clients.values_mut() {
            *controller = Some(Arc::clone(worker));
        }
        clients.len()
    }

    pub async fn active_worker(&self) -> Option<Arc<OfflineWorker>> {
        self.active.read().await.clone()
    }

    /// State of the active worker, if any
    pub async fn state(&self) -> Option<WorkerState> {
        self.active.read().await.as_ref().map(|w| w.state())
    }

    /// Open a client; it is controlled by whichever worker is active right now
    pub async fn connect(&self) -> ClientId {
        let id = ClientId(Uuid::new_v4());
        let controller = self.active_worker().await;
        debug!(
            "Client {} connected ({})",
            id,
            if controller.is_some() {
                "controlled"
            } else {
                "uncontrolled"
            }
        );
        self.clients.write().await.insert(id, controller);
        id
    }

    pub async fn disconnect(&self, client: ClientId) -> bool {
        self.clients.write().await.remove(&client).is_some()
    }

    pub async fn controller(&self, client: ClientId) -> Option<Arc<OfflineWorker>> {
        self.clients.read().await.get(&client).cloned().flatten()
    }

    pub async fn client_count(&self) -> usize {
        self.clients.read().await.len()
    }

    /// Fetch on behalf of `client`
    pub async fn fetch(
        &self,
        client: ClientId,
        request: FetchRequest,
    ) -> FetchResult<ResponseSnapshot> {
        let Some(worker) = self.controller(client).await else {
            return self.network.fetch(&request).await;
        };

        match worker.handle_fetch(request).await {
            FetchOutcome::Responded(result) => result,
            FetchOutcome::Passthrough(request) => self.network.fetch(&request).await,
        }
    }
}
