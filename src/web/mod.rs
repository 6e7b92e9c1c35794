//! Web layer module
//!
//! HTTP surface of the service. Photo endpoints live under `/api/v1`; every
//! other request is proxied to the upstream origin through the offline worker,
//! so the app keeps loading from cache when the upstream is unreachable.
//!
//! # Architecture
//!
//! - **Handlers**: thin request handlers organized by concern
//! - **Responses**: standardized JSON envelope and error-to-status mapping
//! - **Middleware**: request logging

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer};
use url::Url;

use crate::{
    compression::ImageCompressor,
    config::Config,
    offline::{ClientId, WorkerHost},
    upload::PhotoUploader,
};

pub mod handlers;
pub mod middleware;
pub mod responses;

pub use responses::{ApiResponse, handle_error};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub host: Arc<WorkerHost>,
    /// Client identity the proxy uses for all forwarded traffic
    pub client: ClientId,
    pub upstream: Url,
    pub compressor: ImageCompressor,
    pub uploader: Option<Arc<PhotoUploader>>,
    pub start_time: chrono::DateTime<chrono::Utc>,
}

/// Web server configuration and setup
pub struct WebServer {
    app: Router,
    addr: SocketAddr,
}

impl WebServer {
    pub async fn new(
        config: Config,
        host: Arc<WorkerHost>,
        compressor: ImageCompressor,
        uploader: Option<PhotoUploader>,
    ) -> Result<Self> {
        let addr: SocketAddr = format!("{}:{}", config.web.host, config.web.port).parse()?;
        let upstream = config.worker.upstream()?;
        let client = host.connect().await;

        let app = Self::create_router(AppState {
            config: Arc::new(config),
            host,
            client,
            upstream,
            compressor,
            uploader: uploader.map(Arc::new),
            start_time: chrono::Utc::now(),
        });

        Ok(Self { app, addr })
    }

    /// Create the router with all routes and middleware
    pub fn create_router(state: AppState) -> Router {
        let max_request_size = state.config.web.max_request_size;

        Router::new()
            .route("/health", get(handlers::health::health_check))
            .nest("/api/v1", Self::api_v1_routes())
            // Everything else is application traffic for the offline worker
            .fallback(handlers::proxy::proxy_request)
            // Middleware (applied in reverse order)
            .layer(DefaultBodyLimit::disable())
            .layer(RequestBodyLimitLayer::new(max_request_size))
            .layer(CorsLayer::permissive())
            .layer(axum::middleware::from_fn(
                middleware::request_logging_middleware,
            ))
            .with_state(state)
    }

    fn api_v1_routes() -> Router<AppState> {
        Router::new()
            .route("/photos/compress", post(handlers::photos::compress_photo))
            .route(
                "/photos/{folder}/{parcel_id}",
                post(handlers::photos::upload_photo),
            )
    }

    /// The configured router, for serving on a custom listener or in tests
    pub fn into_router(self) -> Router {
        self.app
    }

    /// Start the web server
    pub async fn serve(self) -> Result<()> {
        let listener = tokio::net::TcpListener::bind(&self.addr).await?;
        axum::serve(listener, self.app).await?;
        Ok(())
    }

    /// Serve with a notification when the server is actually listening or fails to bind
    ///
    /// Shuts down gracefully on SIGTERM or SIGINT.
    pub async fn serve_with_signal(
        self,
        ready_signal: tokio::sync::oneshot::Sender<Result<()>>,
    ) -> Result<()> {
        match tokio::net::TcpListener::bind(&self.addr).await {
            Ok(listener) => {
                let _ = ready_signal.send(Ok(()));

                axum::serve(listener, self.app)
                    .with_graceful_shutdown(shutdown_signal())
                    .await?;
                Ok(())
            }
            Err(bind_error) => {
                let bind_err_msg = format!("Failed to bind to {}: {}", self.addr, bind_error);
                let _ = ready_signal.send(Err(anyhow::anyhow!("{}", bind_err_msg)));
                Err(anyhow::anyhow!("{}", bind_err_msg))
            }
        }
    }

    pub fn host(&self) -> String {
        self.addr.ip().to_string()
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match (
            signal(SignalKind::terminate()),
            signal(SignalKind::interrupt()),
        ) {
            (Ok(mut sigterm), Ok(mut sigint)) => {
                tokio::select! {
                    _ = sigterm.recv() => {
                        tracing::info!("Received SIGTERM, shutting down gracefully");
                    }
                    _ = sigint.recv() => {
                        tracing::info!("Received SIGINT (Ctrl+C), shutting down gracefully");
                    }
                }
            }
            _ => {
                tracing::warn!("Failed to install signal handlers, falling back to Ctrl+C");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Received Ctrl+C, shutting down gracefully");
        }
    }
}
