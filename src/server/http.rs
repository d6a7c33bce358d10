//! HTTP server implementation for kaf.

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tokio::signal;

use super::config::ServerConfig;
use super::handlers::{
    handle_archive, handle_get, handle_healthy, handle_metrics, handle_put, AppState,
};
use super::metrics::Metrics;
use crate::registry::Registry;

/// HTTP server for the log engine.
pub struct KafServer {
    registry: Registry,
    config: ServerConfig,
}

impl KafServer {
    /// Create a new server over a booted registry.
    pub fn new(registry: Registry, config: ServerConfig) -> Self {
        Self { registry, config }
    }

    /// Build the route table over the given state.
    pub fn router(state: AppState) -> Router {
        Router::new()
            // put enforces its own Content-Length bounds, so the framework
            // default (2 MiB) must not reject payloads first
            .route(
                "/put/{logname}",
                post(handle_put).layer(DefaultBodyLimit::disable()),
            )
            .route("/get/{logname}", get(handle_get))
            .route("/archive/{logname}", post(handle_archive))
            .route("/metrics", get(handle_metrics))
            .route("/-/healthy", get(handle_healthy))
            .with_state(state)
    }

    /// Run the HTTP server until SIGINT or SIGTERM.
    pub async fn run(self) {
        let state = AppState {
            registry: self.registry,
            metrics: Arc::new(Metrics::new()),
        };
        let app = Self::router(state);

        tracing::info!(
            "starting kaf server on {} writing to {}",
            self.config.addr,
            self.config.data_dir.display()
        );

        let listener = tokio::net::TcpListener::bind(&self.config.addr)
            .await
            .expect("failed binding listen address");
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .unwrap();

        tracing::info!("server shut down gracefully");
    }
}

/// Listen for SIGTERM (service manager shutdown) and SIGINT (Ctrl+C).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received SIGINT, starting graceful shutdown"),
        _ = terminate => tracing::info!("received SIGTERM, starting graceful shutdown"),
    }
}
