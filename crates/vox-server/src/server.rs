//! `VoxServer`: Axum HTTP server in front of the recognizer.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use vox_recognition::Recognizer;

use crate::config::ServerConfig;
use crate::handlers;
use crate::shutdown::{ShutdownCoordinator, ShutdownOutcome};

/// Path of the recognition endpoint.
pub const RECOGNIZE_PATH: &str = "/api/recognize/audio";

/// Shared state accessible from Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Recognition orchestrator.
    pub recognizer: Arc<Recognizer>,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Prometheus handle, when a recorder is installed.
    pub metrics: Option<PrometheusHandle>,
    /// When the server started.
    pub start_time: Instant,
}

/// The vox HTTP server.
pub struct VoxServer {
    config: Arc<ServerConfig>,
    recognizer: Arc<Recognizer>,
    metrics: Option<PrometheusHandle>,
    shutdown: Arc<ShutdownCoordinator>,
    start_time: Instant,
}

impl VoxServer {
    /// Create a new server.
    pub fn new(config: ServerConfig, recognizer: Arc<Recognizer>) -> Self {
        Self {
            config: Arc::new(config),
            recognizer,
            metrics: None,
            shutdown: Arc::new(ShutdownCoordinator::new()),
            start_time: Instant::now(),
        }
    }

    /// Serve `/metrics` from `handle`.
    #[must_use]
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    /// Build the Axum router with all routes.
    pub fn router(&self) -> Router {
        let state = AppState {
            recognizer: Arc::clone(&self.recognizer),
            config: Arc::clone(&self.config),
            metrics: self.metrics.clone(),
            start_time: self.start_time,
        };

        let router = Router::new()
            .route(RECOGNIZE_PATH, post(handlers::recognize_audio))
            .route("/health", get(handlers::health_handler))
            .route("/metrics", get(handlers::metrics_handler))
            .with_state(state)
            .layer(DefaultBodyLimit::disable());

        let router = match self.config.max_body_bytes {
            Some(limit) => router.layer(RequestBodyLimitLayer::new(limit)),
            None => router,
        };
        router.layer(TraceLayer::new_for_http())
    }

    /// Bind and serve until the shutdown token is cancelled.
    pub async fn listen(&self) -> io::Result<ServerHandle> {
        let listener = TcpListener::bind(self.config.bind_addr()).await?;
        let local_addr = listener.local_addr()?;
        let router = self.router();
        let token = self.shutdown.token();

        let task = tokio::spawn(async move {
            let result = axum::serve(listener, router)
                .with_graceful_shutdown(async move { token.cancelled().await })
                .await;
            if let Err(e) = result {
                error!(error = %e, "server stopped with error");
            }
        });

        info!(
            %local_addr,
            capacity = self.recognizer.capacity(),
            "vox server listening"
        );
        Ok(ServerHandle { local_addr, task })
    }

    /// Stop the listener behind `handle` and wait for in-flight sessions.
    pub async fn graceful_shutdown(&self, handle: ServerHandle, timeout: Option<Duration>) -> ShutdownOutcome {
        self.shutdown
            .drain(handle.into_task(), self.recognizer.gate(), timeout)
            .await
    }

    /// Get the shutdown coordinator.
    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.shutdown
    }

    /// Get the server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Get the recognizer.
    pub fn recognizer(&self) -> &Arc<Recognizer> {
        &self.recognizer
    }
}

/// Running listener returned by [`VoxServer::listen`].
#[derive(Debug)]
pub struct ServerHandle {
    local_addr: SocketAddr,
    task: JoinHandle<()>,
}

impl ServerHandle {
    /// Address the listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Bound port.
    pub fn port(&self) -> u16 {
        self.local_addr.port()
    }

    /// Serving task, for graceful shutdown.
    pub fn into_task(self) -> JoinHandle<()> {
        self.task
    }
}
