//! Main application server.
//!
//! Runs the crawl loop and the HTTP server side by side, with signal
//! handling and graceful shutdown coordination.

use std::net::SocketAddr;
use std::time::Duration;

use axum::Router;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::observability::spans;
use super::rest::create_rest_router;
use super::state::AppState;
use super::stream::create_stream_router;
use crate::crawler::Crawler;
use crate::Result;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host address to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// How long to wait for the crawler to stop after shutdown
    pub shutdown_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            shutdown_timeout: Duration::from_secs(30),
        }
    }
}

/// Application server.
pub struct App {
    config: ServerConfig,
    state: AppState,
    crawler: Crawler,
    shutdown: CancellationToken,
}

impl App {
    /// Create a new application around a ready crawler.
    ///
    /// The HTTP state is wired to the crawler's cache and stats.
    #[must_use]
    pub fn new(config: ServerConfig, state: AppState, crawler: Crawler) -> Self {
        let shutdown = state.shutdown.clone();
        let state = AppState {
            cache: crawler.cache(),
            stats: crawler.stats(),
            ..state
        };
        Self {
            config,
            state,
            crawler,
            shutdown,
        }
    }

    /// Token that stops the crawler and the server when cancelled.
    #[must_use]
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Build the router with all endpoints.
    fn router(&self) -> Router {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        Router::new()
            .merge(create_stream_router(self.state.clone()))
            .merge(create_rest_router(self.state.clone()))
            .layer(
                TraceLayer::new_for_http()
                    .make_span_with(|request: &axum::http::Request<_>| {
                        let request_id = request
                            .headers()
                            .get("x-request-id")
                            .and_then(|v| v.to_str().ok())
                            .unwrap_or("unknown");

                        spans::request_span(
                            request.method().as_str(),
                            &request.uri().to_string(),
                            request_id,
                        )
                    })
                    .on_response(
                        |response: &axum::response::Response,
                         _latency: std::time::Duration,
                         _span: &tracing::Span| {
                            tracing::info!(
                                status = %response.status(),
                                "Request completed"
                            );
                        },
                    ),
            )
            .layer(cors)
    }

    /// Run the crawler and the server until a shutdown signal.
    ///
    /// The server listens for SIGTERM (Unix) and Ctrl+C signals, then
    /// cancels the crawl loop, ends open event streams and drains
    /// connections.
    ///
    /// # Errors
    ///
    /// Returns an error if the server cannot start or encounters
    /// a fatal error during execution.
    pub async fn run(self) -> Result<()> {
        let addr: SocketAddr = format!("{}:{}", self.config.host, self.config.port)
            .parse()
            .map_err(|e| crate::Error::config(format!("invalid address: {e}")))?;

        let listener = tokio::net::TcpListener::bind(addr).await.map_err(|e| {
            crate::error::ServerError::BindFailed {
                address: addr.to_string(),
                reason: e.to_string(),
            }
        })?;

        tracing::info!(%addr, "Server listening");

        let router = self.router();
        let shutdown = self.shutdown.clone();
        let crawl = tokio::spawn(self.crawler.run(shutdown.clone()));

        let signals = shutdown.clone();
        tokio::spawn(async move {
            tokio::select! {
                () = shutdown_signal() => signals.cancel(),
                () = signals.cancelled() => {}
            }
        });

        let served = axum::serve(listener, router)
            .with_graceful_shutdown(shutdown.clone().cancelled_owned())
            .await
            .map_err(|e| crate::error::ServerError::Request(e.to_string()));

        // Stop the crawler even if the server failed on its own.
        shutdown.cancel();
        match tokio::time::timeout(self.config.shutdown_timeout, crawl).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::error!(error = %e, "Crawl task panicked"),
            Err(_) => tracing::warn!("Crawler did not stop within the shutdown timeout"),
        }

        served?;
        tracing::info!("Server shut down gracefully");
        Ok(())
    }
}

/// Wait for shutdown signal (SIGTERM or Ctrl+C).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
    }
}
